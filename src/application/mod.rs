//! Application layer - Generic services that use ports.

pub mod coordinator;
pub mod pipeline;
