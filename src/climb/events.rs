use serde::Serialize;
use uuid::Uuid;

use crate::analysis::ScoreReport;

/// Notifications published by a climb session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClimbEvent {
    /// `begun == false` means a provisional attempt was discarded during the debounce window.
    #[serde(rename_all = "camelCase")]
    ClimbBegun {
        attempt_id: Uuid,
        begun: bool,
        start_time_ms: i64,
    },
    #[serde(rename_all = "camelCase")]
    ClimbInProgress { attempt_id: Uuid, in_progress: bool },
    #[serde(rename_all = "camelCase")]
    ClimbFinished { attempt_id: Uuid, successful: bool },
    ForceLinkChanged { connected: bool },
    AttemptScored { report: Box<ScoreReport> },
}

impl ClimbEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClimbEvent::ClimbBegun { .. } => "climb-begun",
            ClimbEvent::ClimbInProgress { .. } => "climb-in-progress",
            ClimbEvent::ClimbFinished { .. } => "climb-finished",
            ClimbEvent::ForceLinkChanged { .. } => "force-link-changed",
            ClimbEvent::AttemptScored { .. } => "attempt-scored",
        }
    }
}
