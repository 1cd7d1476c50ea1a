//! WoodVision: generation studio for wooden products
//!
//! Turns one product photo into a master redesign plus eight derived scenes,
//! writes listing metadata for it and stores the result with per-user
//! history. The generation service and the persistence store are external
//! collaborators reached through the `provider` and `gateway` traits.

pub mod catalog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod generation;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod provider;
pub mod refinement;
pub mod studio;
pub mod types;

pub use error::{ApiError, GatewayError, GenerationError, PipelineError};
pub use studio::{Studio, StudioSession};
