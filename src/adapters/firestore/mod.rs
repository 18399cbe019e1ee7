//! Firestore record store over the REST API.

pub mod auth;
pub mod repository;
pub mod values;

pub use repository::FirestoreStore;
