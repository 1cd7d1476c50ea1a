//! Pipeline Orchestrator
//!
//! Drives a run through analysis, master generation, the sequential fan-out
//! over the scene catalog, metadata generation and persistence. Only the
//! first two steps can abort a run; every later failure is recorded on the
//! run and the pipeline moves on.

pub mod orchestrator;
pub mod retry;
pub mod run;
pub mod state;

pub use orchestrator::{PipelineOrchestrator, RunRequest};
pub use retry::RetryPolicy;
pub use run::{Run, RunStep, RunView, StepOutcome, StepRecord};
pub use state::{allowed_transitions, validate_transition, AbortReason, IllegalTransition, RunState};
