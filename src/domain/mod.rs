//! Domain layer - Pure business logic.

pub mod frames;
pub mod moderation;
pub mod policy;
pub mod records;
pub mod report;
