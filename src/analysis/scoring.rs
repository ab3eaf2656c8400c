use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::AttemptOutcome;

use super::config::CategoryWeights;

/// Score reported when a submetric or category has nothing to measure.
pub const INSUFFICIENT_DATA: f64 = -1.0;

pub fn is_sentinel(score: f64) -> bool {
    score < 0.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmetricScore {
    pub label: String,
    pub score: f64,
    pub weight: f64,
}

impl SubmetricScore {
    pub fn new(label: &str, score: f64, weight: f64) -> Self {
        Self {
            label: label.to_string(),
            score,
            weight,
        }
    }
}

/// One category's score and the submetrics it was combined from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricResult {
    pub combined_score: f64,
    pub submetrics: Vec<SubmetricScore>,
}

impl MetricResult {
    /// Weighted mean of the submetrics. Any weighted submetric without data makes the
    /// whole category `INSUFFICIENT_DATA`; zero-weight submetrics are informational.
    pub fn from_submetrics(submetrics: Vec<SubmetricScore>) -> Self {
        let weighted: Vec<&SubmetricScore> =
            submetrics.iter().filter(|sub| sub.weight > 0.0).collect();
        let total_weight: f64 = weighted.iter().map(|sub| sub.weight).sum();

        let combined_score = if total_weight <= 0.0
            || weighted.iter().any(|sub| is_sentinel(sub.score))
        {
            INSUFFICIENT_DATA
        } else {
            weighted
                .iter()
                .map(|sub| sub.weight * sub.score)
                .sum::<f64>()
                / total_weight
        };

        Self {
            combined_score,
            submetrics,
        }
    }

    /// Round the combined score and every scored submetric to whole points.
    pub fn rounded(mut self) -> Self {
        if !is_sentinel(self.combined_score) {
            self.combined_score = self.combined_score.round();
        }
        for sub in &mut self.submetrics {
            if !is_sentinel(sub.score) {
                sub.score = sub.score.round();
            }
        }
        self
    }

    pub fn is_sentinel(&self) -> bool {
        is_sentinel(self.combined_score)
    }

    pub fn submetric(&self, label: &str) -> Option<&SubmetricScore> {
        self.submetrics.iter().find(|sub| sub.label == label)
    }
}

/// Row handed to the leaderboard collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub climber_name: String,
    pub overall_score: i32,
    pub pressure: f64,
    pub positioning: f64,
    pub progress: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    pub attempt_id: Uuid,
    pub outcome: AttemptOutcome,
    pub overall_score: i32,
    pub pressure: MetricResult,
    pub positioning: MetricResult,
    pub progress: MetricResult,
    pub weakest_submetric: Option<String>,
    pub tip: String,
    pub leaderboard: LeaderboardEntry,
}

/// Combines the three category results into the overall score and the weakest link.
#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    weights: CategoryWeights,
}

impl ScoreAggregator {
    pub fn new(weights: CategoryWeights) -> Self {
        Self { weights }
    }

    fn categories<'a>(
        &self,
        pressure: &'a MetricResult,
        positioning: &'a MetricResult,
        progress: &'a MetricResult,
    ) -> [(f64, &'a MetricResult); 3] {
        [
            (self.weights.pressure, pressure),
            (self.weights.positioning, positioning),
            (self.weights.progress, progress),
        ]
    }

    /// Weighted sum of the category scores, rounded to the nearest point.
    ///
    /// Categories without data are left out and the remaining weights scaled up to the
    /// configured total; when none has data the result is `-1`.
    pub fn overall_score(
        &self,
        pressure: &MetricResult,
        positioning: &MetricResult,
        progress: &MetricResult,
    ) -> i32 {
        let weighted: Vec<(f64, &MetricResult)> = self
            .categories(pressure, positioning, progress)
            .into_iter()
            .filter(|(weight, _)| *weight > 0.0)
            .collect();
        let scored: Vec<(f64, f64)> = weighted
            .iter()
            .filter(|(_, result)| !result.is_sentinel())
            .map(|(weight, result)| (*weight, result.combined_score))
            .collect();

        if scored.is_empty() {
            return INSUFFICIENT_DATA as i32;
        }

        let sum: f64 = scored.iter().map(|(weight, score)| weight * score).sum();
        let overall = if scored.len() == weighted.len() {
            sum
        } else {
            let configured: f64 = weighted.iter().map(|(weight, _)| weight).sum();
            let kept: f64 = scored.iter().map(|(weight, _)| weight).sum();
            sum * configured / kept
        };
        overall.round() as i32
    }

    /// Label of the submetric with the lowest `category weight × submetric weight × score`.
    /// Ties go to the first one in pressure, positioning, progress order.
    pub fn weakest_submetric(
        &self,
        pressure: &MetricResult,
        positioning: &MetricResult,
        progress: &MetricResult,
    ) -> Option<String> {
        let mut weakest: Option<(f64, &str)> = None;

        for (category_weight, result) in self.categories(pressure, positioning, progress) {
            for sub in &result.submetrics {
                if sub.weight <= 0.0 || is_sentinel(sub.score) {
                    continue;
                }
                let contribution = category_weight * sub.weight * sub.score;
                match weakest {
                    Some((lowest, _)) if contribution >= lowest => {}
                    _ => weakest = Some((contribution, sub.label.as_str())),
                }
            }
        }

        weakest.map(|(_, label)| label.to_string())
    }
}
