//! Lessonguard - Video Moderation Library
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (frames, moderation results, records, reports)
//! - ports/: Trait definitions
//! - adapters/: Concrete implementations
//! - application/: Pipeline and batch coordinator
//! - config: Environment configuration
//!
//! # Features
//! - `firestore` (default): Firestore REST record store

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod telemetry;

// Re-exports for convenience
pub use application::coordinator::{BatchCoordinator, BatchSettings, BatchSummary};
pub use application::pipeline::{ModerationPipeline, PipelineSettings};
pub use config::{BatchConfig, ModerationConfig};
pub use domain::moderation::{ModerationResult, ModerationStatus};
pub use error::{ConfigError, ModerationError, StoreError};
