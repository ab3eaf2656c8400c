pub mod config;
pub mod positioning;
pub mod pressure;
pub mod progress;
pub mod scoring;

use rand::Rng;

use crate::geometry::GeometryStore;
use crate::models::AttemptRecord;
use crate::tips::TipBook;

pub use config::{AnalysisConfig, CategoryWeights, PositioningConfig, PressureConfig, ProgressConfig};
pub use scoring::{
    is_sentinel, LeaderboardEntry, MetricResult, ScoreAggregator, ScoreReport, SubmetricScore,
    INSUFFICIENT_DATA,
};

const ANONYMOUS_CLIMBER: &str = "Anonymous";

/// Run the three scorers over a finished attempt and aggregate them into a report.
pub fn analyse_attempt(
    record: &AttemptRecord,
    geometry: &GeometryStore,
    config: &AnalysisConfig,
    tips: &TipBook,
) -> ScoreReport {
    analyse_attempt_with_rng(record, geometry, config, tips, &mut rand::thread_rng())
}

pub fn analyse_attempt_with_rng<R: Rng + ?Sized>(
    record: &AttemptRecord,
    geometry: &GeometryStore,
    config: &AnalysisConfig,
    tips: &TipBook,
    rng: &mut R,
) -> ScoreReport {
    let pressure = pressure::score_pressure(&record.force_log, &config.pressure);
    let positioning =
        positioning::score_positioning(&record.frame_log, geometry, &config.positioning);
    let progress = progress::score_progress(
        record,
        geometry,
        &config.progress,
        config.pressure.spike_threshold,
    );

    let aggregator = ScoreAggregator::new(config.weights.clone());
    let overall_score = aggregator.overall_score(&pressure, &positioning, &progress);
    let weakest_submetric = aggregator.weakest_submetric(&pressure, &positioning, &progress);
    let tip = tips.pick(weakest_submetric.as_deref(), rng);

    let leaderboard = LeaderboardEntry {
        climber_name: record
            .climber_name
            .clone()
            .unwrap_or_else(|| ANONYMOUS_CLIMBER.to_string()),
        overall_score,
        pressure: pressure.combined_score,
        positioning: positioning.combined_score,
        progress: progress.combined_score,
    };

    ScoreReport {
        attempt_id: record.id,
        outcome: record.outcome,
        overall_score,
        pressure,
        positioning,
        progress,
        weakest_submetric,
        tip,
        leaderboard,
    }
}
