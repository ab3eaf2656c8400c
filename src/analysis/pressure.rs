use crate::models::ForceLog;
use crate::utils::numeric::std_dev;

use super::config::PressureConfig;
use super::scoring::{MetricResult, SubmetricScore, INSUFFICIENT_DATA};

pub const EFFICIENCY: &str = "efficiency";
pub const ADJUSTMENT: &str = "adjustment";

/// Replace single-sample glitches: a value further than `threshold` from both of its
/// neighbours takes its successor's value. The first and last samples are kept as-is.
pub fn despike(series: &[f64], threshold: f64) -> Vec<f64> {
    let mut cleaned = series.to_vec();
    for i in 1..series.len().saturating_sub(1) {
        let (prev, current, next) = (series[i - 1], series[i], series[i + 1]);
        if (current - prev).abs() > threshold && (current - next).abs() > threshold {
            cleaned[i] = next;
        }
    }
    cleaned
}

/// Despiked force trace of every hold column.
pub fn cleaned_channels(force_log: &ForceLog, threshold: f64) -> Vec<Vec<f64>> {
    force_log
        .channels()
        .iter()
        .map(|channel| despike(channel, threshold))
        .collect()
}

pub fn score_pressure(force_log: &ForceLog, config: &PressureConfig) -> MetricResult {
    let channels = cleaned_channels(force_log, config.spike_threshold);

    MetricResult::from_submetrics(vec![
        SubmetricScore::new(
            EFFICIENCY,
            efficiency(&channels, &config.early_columns),
            config.weight_efficiency,
        ),
        SubmetricScore::new(ADJUSTMENT, adjustment(&channels, config), config.weight_adjustment),
    ])
    .rounded()
}

/// Share of all applied force that went through the early holds, in percent.
fn efficiency(channels: &[Vec<f64>], early_columns: &[usize]) -> f64 {
    let total: f64 = channels.iter().flatten().sum();
    if total <= 0.0 {
        return INSUFFICIENT_DATA;
    }

    let early: f64 = early_columns
        .iter()
        .filter_map(|column| channels.get(*column))
        .flatten()
        .sum();

    (early / total * 100.0).clamp(0.0, 100.0)
}

/// Steadiness of each grip: the worst standard deviation over any sustained non-zero run.
fn adjustment(channels: &[Vec<f64>], config: &PressureConfig) -> f64 {
    let worst = channels
        .iter()
        .flat_map(|channel| nonzero_runs(channel, config.min_run_samples))
        .filter_map(std_dev)
        .fold(None, |worst: Option<f64>, deviation| {
            Some(worst.map_or(deviation, |current| current.max(deviation)))
        });

    match worst {
        Some(deviation) => {
            (100.0 - deviation).clamp(config.adjustment_floor, config.adjustment_ceiling)
        }
        None => INSUFFICIENT_DATA,
    }
}

fn nonzero_runs(channel: &[f64], min_len: usize) -> Vec<&[f64]> {
    channel
        .split(|force| *force <= 0.0)
        .filter(|run| run.len() >= min_len.max(1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ForceSample;

    fn log_from_columns(columns: &[Vec<f64>]) -> ForceLog {
        let rows = columns.first().map_or(0, Vec::len);
        let samples = (0..rows)
            .map(|row| ForceSample {
                timestamp_ms: row as i64 * 50,
                forces: columns.iter().map(|column| column[row]).collect(),
            })
            .collect();
        ForceLog::from_samples(columns.len(), samples)
    }

    #[test]
    fn despike_replaces_isolated_glitch() {
        assert_eq!(
            despike(&[1000.0, 20000.0, 1000.0], 8000.0),
            vec![1000.0, 1000.0, 1000.0]
        );
    }

    #[test]
    fn despike_keeps_real_steps_and_edges() {
        let step = [0.0, 0.0, 9000.0, 9000.0, 9000.0];
        assert_eq!(despike(&step, 8000.0), step.to_vec());

        let edges = [20000.0, 1000.0, 1000.0, 20000.0];
        assert_eq!(despike(&edges, 8000.0), edges.to_vec());
        assert!(despike(&[], 8000.0).is_empty());
    }

    #[test]
    fn adjustment_uses_despiked_series() {
        let mut steady = vec![1000.0; 12];
        steady[5] = 20000.0;
        let log = log_from_columns(&[steady]);

        let result = score_pressure(&log, &PressureConfig::default());
        // a flat grip once the glitch is gone
        assert_eq!(result.submetric(ADJUSTMENT).unwrap().score, 98.0);
    }

    #[test]
    fn short_runs_do_not_count_as_grips() {
        let mut column = vec![0.0; 20];
        for (i, value) in column.iter_mut().enumerate().take(5) {
            *value = 100.0 * (i + 1) as f64;
        }
        let log = log_from_columns(&[column]);

        let result = score_pressure(&log, &PressureConfig::default());
        assert_eq!(result.submetric(ADJUSTMENT).unwrap().score, INSUFFICIENT_DATA);
        assert_eq!(result.combined_score, INSUFFICIENT_DATA);
    }

    #[test]
    fn wobbly_grip_lowers_adjustment() {
        // alternating 90 / 110: population std of 10
        let column: Vec<f64> = (0..10).map(|i| if i % 2 == 0 { 90.0 } else { 110.0 }).collect();
        let log = log_from_columns(&[column]);

        let result = score_pressure(&log, &PressureConfig::default());
        assert_eq!(result.submetric(ADJUSTMENT).unwrap().score, 90.0);
    }

    #[test]
    fn efficiency_is_early_share_of_total_force() {
        let config = PressureConfig {
            early_columns: vec![0],
            ..PressureConfig::default()
        };
        let log = log_from_columns(&[vec![100.0; 10], vec![300.0; 10]]);

        let result = score_pressure(&log, &config);
        assert_eq!(result.submetric(EFFICIENCY).unwrap().score, 25.0);
        // (25 + 98) / 2 = 61.5
        assert_eq!(result.combined_score, 62.0);
    }

    #[test]
    fn no_force_at_all_has_no_pressure_score() {
        let log = ForceLog::new(4);
        let result = score_pressure(&log, &PressureConfig::default());
        assert_eq!(result.combined_score, INSUFFICIENT_DATA);
        assert_eq!(result.submetric(EFFICIENCY).unwrap().score, INSUFFICIENT_DATA);
    }

    #[test]
    fn runs_are_never_empty() {
        let channel = [0.0, 5.0, 0.0, 0.0, 7.0, 8.0];
        let runs = nonzero_runs(&channel, 0);
        assert_eq!(runs, vec![&[5.0][..], &[7.0, 8.0][..]]);
        assert_eq!(nonzero_runs(&channel, 2), vec![&[7.0, 8.0][..]]);
    }
}
