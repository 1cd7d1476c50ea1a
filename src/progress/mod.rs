//! Progress observability primitives.

pub mod event;
pub mod runtime;

pub use event::{
    ArtifactEventData, ProgressEnvelope, ProgressEvent, RunStartedData, RunSummaryData,
    StateChangedData, StepFailedData,
};
pub use runtime::{new_session_id, ProgressRuntime};
