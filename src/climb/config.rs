use serde::{Deserialize, Serialize};

use crate::geometry::DEFAULT_MIN_DETECTION_CONFIDENCE;

/// Thresholds and timings for attempt detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// A keypoint counts as observed only above this confidence.
    pub confidence_threshold: f64,

    /// Slack added to a hold's row (fraction of frame height) for the start and finish checks.
    pub position_buffer: f64,

    /// How long a start position must hold before the attempt is confirmed.
    pub debounce_ms: u64,

    /// Watchdog for attempts that never finish; `None` leaves it to an external caller.
    pub attempt_timeout_ms: Option<u64>,

    /// Hold detections below this confidence are ignored when loading geometry.
    pub min_hold_confidence: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.3,
            position_buffer: 0.05,
            debounce_ms: 2_000,
            attempt_timeout_ms: Some(120_000),
            min_hold_confidence: DEFAULT_MIN_DETECTION_CONFIDENCE,
        }
    }
}
