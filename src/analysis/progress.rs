use crate::geometry::GeometryStore;
use crate::models::{AttemptRecord, FrameLog, KeypointId};
use crate::utils::numeric::round_to;

use super::config::ProgressConfig;
use super::pressure::cleaned_channels;
use super::scoring::{MetricResult, SubmetricScore};

pub const HOLD_SCORE: &str = "hold_score";
pub const PATHFINDING: &str = "pathfinding";
pub const TIME: &str = "time";

pub fn score_progress(
    record: &AttemptRecord,
    geometry: &GeometryStore,
    config: &ProgressConfig,
    spike_threshold: f64,
) -> MetricResult {
    let hold_score = if record.outcome.is_successful() {
        100.0
    } else {
        reach_score(&record.frame_log, geometry, config)
    };

    let holds_used = cleaned_channels(&record.force_log, spike_threshold)
        .iter()
        .filter(|channel| {
            channel
                .iter()
                .any(|force| *force > config.pathfinding_force_threshold)
        })
        .count();
    let pathfinding = (holds_used as f64 * 10.0 + 10.0).min(100.0);

    let seconds = round_to(record.frame_log.duration_ms() as f64 / 1_000.0, 2);

    MetricResult::from_submetrics(vec![
        SubmetricScore::new(HOLD_SCORE, hold_score, config.weight_hold_score),
        SubmetricScore::new(PATHFINDING, pathfinding, config.weight_pathfinding),
        SubmetricScore::new(TIME, seconds, config.weight_time),
    ])
}

/// Partial credit for how close the best confident wrist got to the top hold.
fn reach_score(frame_log: &FrameLog, geometry: &GeometryStore, config: &ProgressConfig) -> f64 {
    let Some(highest) = geometry.highest() else {
        return 0.0;
    };

    let best_row = frame_log
        .iter()
        .flat_map(|frame| {
            [KeypointId::LeftWrist, KeypointId::RightWrist]
                .into_iter()
                .filter_map(|id| frame.confident_point(id, config.confidence_threshold))
        })
        .map(|point| point.y)
        .reduce(f64::min);

    match best_row {
        Some(row) => {
            let gap = (row - highest.row()).max(0.0);
            (100.0 - gap * config.completion_scale).clamp(0.0, 100.0)
        }
        None => 0.0,
    }
}
