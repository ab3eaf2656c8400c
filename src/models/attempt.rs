use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::force::ForceLog;
use super::observation::LoggedFrame;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AttemptOutcome {
    Successful,
    Unsuccessful,
}

impl AttemptOutcome {
    pub fn is_successful(&self) -> bool {
        matches!(self, AttemptOutcome::Successful)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Successful => "Successful",
            AttemptOutcome::Unsuccessful => "Unsuccessful",
        }
    }
}

/// Append-only pose record of one attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameLog {
    frames: Vec<LoggedFrame>,
}

impl FrameLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_frames(frames: Vec<LoggedFrame>) -> Self {
        Self { frames }
    }

    pub fn push(&mut self, frame: LoggedFrame) {
        self.frames.push(frame);
    }

    pub fn frames(&self) -> &[LoggedFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Last timestamp minus first, 0 for fewer than two frames.
    pub fn duration_ms(&self) -> i64 {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) => last.timestamp_ms - first.timestamp_ms,
            _ => 0,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoggedFrame> {
        self.frames.iter()
    }
}

/// Everything recorded for one finished attempt; handed by value to the metric pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub id: Uuid,
    pub climber_name: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
    pub frame_log: FrameLog,
    pub force_log: ForceLog,
}
