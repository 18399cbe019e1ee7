//! Adapters - Concrete implementations of ports.

#[cfg(feature = "firestore")]
pub mod firestore;

pub mod http;
pub mod local;
pub mod openai;
