//! Ports - traits for everything the pipeline and coordinator talk to.

pub mod classifier;
pub mod moderator;
pub mod repository;
pub mod transport;
