use serde::{Deserialize, Serialize};

/// Tunable constants for the post-attempt metric pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalysisConfig {
    pub weights: CategoryWeights,
    pub pressure: PressureConfig,
    pub positioning: PositioningConfig,
    pub progress: ProgressConfig,
}

/// Share of each category in the overall score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub pressure: f64,
    pub positioning: f64,
    pub progress: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            pressure: 0.3,
            positioning: 0.4,
            progress: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PressureConfig {
    /// A sample further than this from both neighbours is a sensor glitch.
    pub spike_threshold: f64,

    /// Force-log columns counted as early holds for the efficiency ratio.
    pub early_columns: Vec<usize>,

    /// Shortest non-zero run that counts as a grip for the adjustment submetric.
    pub min_run_samples: usize,

    pub adjustment_floor: f64,
    pub adjustment_ceiling: f64,

    pub weight_efficiency: f64,
    pub weight_adjustment: f64,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            spike_threshold: 8_000.0,
            early_columns: vec![0, 1, 2],
            min_run_samples: 10,
            adjustment_floor: 2.0,
            adjustment_ceiling: 98.0,
            weight_efficiency: 0.5,
            weight_adjustment: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositioningConfig {
    pub confidence_threshold: f64,

    /// Mean elbow angle (degrees) at or above which arms count as straight.
    pub straight_arm_degrees: f64,

    /// Normalized coordinates are multiplied by this to get frame units.
    pub frame_scale: f64,

    /// Wrist-to-hold-centre distance (frame units) that counts as gripping the hold.
    pub hold_distance_threshold: f64,

    /// Penalty per frame unit of centre-of-gravity deviation while both hands are set.
    pub smoothness_scale: f64,

    pub weight_arm_angle: f64,
    pub weight_smoothness: f64,
}

impl Default for PositioningConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.3,
            straight_arm_degrees: 170.0,
            frame_scale: 100.0,
            hold_distance_threshold: 10.0,
            smoothness_scale: 2.0,
            weight_arm_angle: 0.5,
            weight_smoothness: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub confidence_threshold: f64,

    /// Points lost per unit of normalized height left between the best reach and the top hold.
    pub completion_scale: f64,

    /// A hold counts as used once its peak force passes this.
    pub pathfinding_force_threshold: f64,

    pub weight_hold_score: f64,
    pub weight_pathfinding: f64,
    pub weight_time: f64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.3,
            completion_scale: 100.0,
            pathfinding_force_threshold: 3_000.0,
            weight_hold_score: 0.6,
            weight_pathfinding: 0.4,
            weight_time: 0.0,
        }
    }
}
