//! Run state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The step whose failure aborted a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    AnalysisFailed,
    MasterGenerationFailed,
}

impl AbortReason {
    pub fn as_str(self) -> &'static str {
        match self {
            AbortReason::AnalysisFailed => "analysis_failed",
            AbortReason::MasterGenerationFailed => "master_generation_failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Analyzing,
    MasterGenerating,
    FanOutGenerating,
    MetadataGenerating,
    Persisting,
    Complete,
    Aborted(AbortReason),
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Analyzing => "analyzing",
            RunState::MasterGenerating => "master_generating",
            RunState::FanOutGenerating => "fan_out_generating",
            RunState::MetadataGenerating => "metadata_generating",
            RunState::Persisting => "persisting",
            RunState::Complete => "complete",
            RunState::Aborted(_) => "aborted",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Complete | RunState::Aborted(_))
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Aborted(reason) => write!(f, "aborted({})", reason.as_str()),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Illegal run state transition: {from} -> {to}")]
pub struct IllegalTransition {
    pub from: RunState,
    pub to: RunState,
}

pub fn allowed_transitions(from: RunState) -> Vec<RunState> {
    use RunState::*;
    match from {
        Idle => vec![Analyzing],
        Analyzing => vec![MasterGenerating, Aborted(AbortReason::AnalysisFailed)],
        MasterGenerating => vec![
            FanOutGenerating,
            Aborted(AbortReason::MasterGenerationFailed),
        ],
        FanOutGenerating => vec![MetadataGenerating],
        MetadataGenerating => vec![Persisting],
        Persisting => vec![Complete],
        Complete => vec![],
        Aborted(_) => vec![],
    }
}

pub fn validate_transition(from: RunState, to: RunState) -> Result<(), IllegalTransition> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(IllegalTransition { from, to })
    }
}
