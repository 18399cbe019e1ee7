//! Local adapters for running without a cloud record store.

pub mod fs;

pub use fs::JsonFileStore;
