use crate::geometry::GeometryStore;
use crate::models::{FrameLog, KeypointId, Point};
use crate::utils::numeric::{mean, std_dev};

use super::config::PositioningConfig;
use super::scoring::{MetricResult, SubmetricScore, INSUFFICIENT_DATA};

pub const ARM_ANGLE: &str = "arm_angle";
pub const SMOOTHNESS: &str = "smoothness";

/// Frame index range, both ends inclusive.
type Interval = (usize, usize);

pub fn score_positioning(
    frame_log: &FrameLog,
    geometry: &GeometryStore,
    config: &PositioningConfig,
) -> MetricResult {
    MetricResult::from_submetrics(vec![
        SubmetricScore::new(ARM_ANGLE, arm_angle(frame_log, config), config.weight_arm_angle),
        SubmetricScore::new(
            SMOOTHNESS,
            smoothness(frame_log, geometry, config),
            config.weight_smoothness,
        ),
    ])
}

/// Straighter arms rest on the skeleton instead of the biceps.
fn arm_angle(frame_log: &FrameLog, config: &PositioningConfig) -> f64 {
    let per_frame: Vec<f64> = frame_log
        .iter()
        .filter_map(|frame| frame.arm_angles.both())
        .map(|(left, right)| (left + right) / 2.0)
        .collect();

    match mean(&per_frame) {
        Some(average) if average >= config.straight_arm_degrees => 100.0,
        Some(average) => (average / 180.0 * 100.0).clamp(0.0, 100.0),
        None => INSUFFICIENT_DATA,
    }
}

/// How still the centre of gravity stays while both hands are set on holds.
fn smoothness(frame_log: &FrameLog, geometry: &GeometryStore, config: &PositioningConfig) -> f64 {
    let scale = config.frame_scale;
    let mut deviations = Vec::new();

    for hold in geometry.holds() {
        let centre = scaled(hold.center(), scale);
        let left = grip_intervals(frame_log, KeypointId::LeftWrist, centre, config);
        let right = grip_intervals(frame_log, KeypointId::RightWrist, centre, config);

        for &(left_start, left_end) in &left {
            for &(right_start, right_end) in &right {
                let start = left_start.max(right_start);
                let end = left_end.min(right_end);
                if start > end {
                    continue;
                }
                if let Some(deviation) = window_deviation(frame_log, (start, end), scale) {
                    deviations.push(deviation);
                }
            }
        }
    }

    match mean(&deviations) {
        Some(average) => (100.0 - average * config.smoothness_scale).clamp(0.0, 100.0),
        None => INSUFFICIENT_DATA,
    }
}

/// Runs of consecutive frames in which `wrist` is confidently within reach of `centre`.
fn grip_intervals(
    frame_log: &FrameLog,
    wrist: KeypointId,
    centre: Point,
    config: &PositioningConfig,
) -> Vec<Interval> {
    let mut intervals = Vec::new();
    let mut open: Option<usize> = None;

    for (index, frame) in frame_log.iter().enumerate() {
        let on_hold = frame
            .confident_point(wrist, config.confidence_threshold)
            .map(|point| scaled(point, config.frame_scale).distance_to(&centre))
            .is_some_and(|distance| distance <= config.hold_distance_threshold);

        match (on_hold, open) {
            (true, None) => open = Some(index),
            (false, Some(start)) => {
                intervals.push((start, index - 1));
                open = None;
            }
            _ => {}
        }
    }

    if let Some(start) = open {
        intervals.push((start, frame_log.len() - 1));
    }

    intervals
}

/// Mean of the x and y centre-of-gravity deviations inside the window, in frame units.
fn window_deviation(frame_log: &FrameLog, (start, end): Interval, scale: f64) -> Option<f64> {
    let points: Vec<Point> = frame_log.frames()[start..=end]
        .iter()
        .filter_map(|frame| frame.center_of_gravity)
        .map(|point| scaled(point, scale))
        .collect();

    if points.len() < 2 {
        return None;
    }

    let xs: Vec<f64> = points.iter().map(|point| point.x).collect();
    let ys: Vec<f64> = points.iter().map(|point| point.y).collect();
    Some((std_dev(&xs)? + std_dev(&ys)?) / 2.0)
}

fn scaled(point: Point, scale: f64) -> Point {
    Point::new(point.x * scale, point.y * scale)
}
