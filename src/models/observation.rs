use serde::{Deserialize, Serialize};

use crate::error::ClimbError;
use crate::utils::numeric::{finite_or_none, round_to};

use super::keypoint::{Keypoint, KeypointId, Point, KEYPOINT_COUNT, TRACKED_KEYPOINTS};

/// Coordinates and confidences are stored with this many decimals.
pub const COORDINATE_DECIMALS: i32 = 5;
/// Elbow angles are stored with this many decimals.
pub const ANGLE_DECIMALS: i32 = 2;

/// Landmarks averaged into the center of gravity.
const GRAVITY_KEYPOINTS: [KeypointId; 4] = [
    KeypointId::LeftShoulder,
    KeypointId::RightShoulder,
    KeypointId::LeftHip,
    KeypointId::RightHip,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ArmAngles {
    pub left: Option<f64>,
    pub right: Option<f64>,
}

impl ArmAngles {
    pub fn both(&self) -> Option<(f64, f64)> {
        Some((self.left?, self.right?))
    }
}

/// One pose inference result, normalized into the record the state machine consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameObservation {
    pub timestamp_ms: i64,
    pub keypoints: [Keypoint; KEYPOINT_COUNT],
    pub center_of_gravity: Option<Point>,
    pub arm_angles: ArmAngles,
}

impl FrameObservation {
    /// Build an observation from raw `[row, col, confidence]` triples in model order.
    ///
    /// Non-finite values make that keypoint unobservable (confidence 0) rather than
    /// failing the frame; only a wrong keypoint count is an error.
    pub fn from_inference(
        timestamp_ms: i64,
        raw: &[[f64; 3]],
        confidence_threshold: f64,
    ) -> Result<Self, ClimbError> {
        if raw.len() != KEYPOINT_COUNT {
            return Err(ClimbError::MalformedObservation {
                expected: KEYPOINT_COUNT,
                actual: raw.len(),
            });
        }

        let mut keypoints = [Keypoint::new(0.0, 0.0, 0.0); KEYPOINT_COUNT];
        for (slot, triple) in keypoints.iter_mut().zip(raw) {
            *slot = sanitize(Keypoint::from(*triple));
        }

        Ok(Self::from_keypoints(
            timestamp_ms,
            keypoints,
            confidence_threshold,
        ))
    }

    pub fn from_keypoints(
        timestamp_ms: i64,
        keypoints: [Keypoint; KEYPOINT_COUNT],
        confidence_threshold: f64,
    ) -> Self {
        let center_of_gravity = center_of_gravity(&keypoints, confidence_threshold);
        let arm_angles = ArmAngles {
            left: elbow_angle(
                &keypoints,
                [
                    KeypointId::LeftShoulder,
                    KeypointId::LeftElbow,
                    KeypointId::LeftWrist,
                ],
                confidence_threshold,
            ),
            right: elbow_angle(
                &keypoints,
                [
                    KeypointId::RightShoulder,
                    KeypointId::RightElbow,
                    KeypointId::RightWrist,
                ],
                confidence_threshold,
            ),
        };

        Self {
            timestamp_ms,
            keypoints,
            center_of_gravity,
            arm_angles,
        }
    }

    pub fn keypoint(&self, id: KeypointId) -> &Keypoint {
        &self.keypoints[id.index()]
    }
}

/// A frame as recorded in an attempt's log: timestamp relative to the attempt start,
/// derived fields, and the tracked landmarks only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedFrame {
    pub timestamp_ms: i64,
    pub center_of_gravity: Option<Point>,
    pub arm_angles: ArmAngles,
    pub keypoints: [Keypoint; TRACKED_KEYPOINTS.len()],
}

impl LoggedFrame {
    pub fn from_observation(observation: &FrameObservation, start_time_ms: i64) -> Self {
        let mut keypoints = [Keypoint::new(0.0, 0.0, 0.0); TRACKED_KEYPOINTS.len()];
        for (slot, id) in keypoints.iter_mut().zip(TRACKED_KEYPOINTS) {
            *slot = *observation.keypoint(id);
        }

        Self {
            timestamp_ms: observation.timestamp_ms - start_time_ms,
            center_of_gravity: observation.center_of_gravity,
            arm_angles: observation.arm_angles,
            keypoints,
        }
    }

    /// Tracked landmark lookup; `None` for the face landmarks that are not logged.
    pub fn keypoint(&self, id: KeypointId) -> Option<&Keypoint> {
        TRACKED_KEYPOINTS
            .iter()
            .position(|tracked| *tracked == id)
            .map(|column| &self.keypoints[column])
    }

    /// Landmark position if its confidence clears `threshold`.
    pub fn confident_point(&self, id: KeypointId, threshold: f64) -> Option<Point> {
        self.keypoint(id)
            .filter(|keypoint| keypoint.is_confident(threshold))
            .map(Keypoint::point)
    }
}

fn sanitize(keypoint: Keypoint) -> Keypoint {
    match (
        finite_or_none(keypoint.row),
        finite_or_none(keypoint.col),
        finite_or_none(keypoint.confidence),
    ) {
        (Some(row), Some(col), Some(confidence)) => Keypoint::new(
            round_to(row, COORDINATE_DECIMALS),
            round_to(col, COORDINATE_DECIMALS),
            round_to(confidence.clamp(0.0, 1.0), COORDINATE_DECIMALS),
        ),
        _ => Keypoint::new(0.0, 0.0, 0.0),
    }
}

fn center_of_gravity(keypoints: &[Keypoint; KEYPOINT_COUNT], threshold: f64) -> Option<Point> {
    let qualifying: Vec<Point> = GRAVITY_KEYPOINTS
        .iter()
        .map(|id| keypoints[id.index()])
        .filter(|keypoint| keypoint.is_confident(threshold))
        .map(|keypoint| keypoint.point())
        .collect();

    if qualifying.is_empty() {
        return None;
    }

    let count = qualifying.len() as f64;
    let x = qualifying.iter().map(|point| point.x).sum::<f64>() / count;
    let y = qualifying.iter().map(|point| point.y).sum::<f64>() / count;
    Some(Point::new(
        round_to(x, COORDINATE_DECIMALS),
        round_to(y, COORDINATE_DECIMALS),
    ))
}

/// Interior angle at the elbow in degrees: 180 is a straight arm, 0 a fully folded one.
fn elbow_angle(
    keypoints: &[Keypoint; KEYPOINT_COUNT],
    [shoulder, elbow, wrist]: [KeypointId; 3],
    threshold: f64,
) -> Option<f64> {
    let shoulder = keypoints[shoulder.index()];
    let elbow = keypoints[elbow.index()];
    let wrist = keypoints[wrist.index()];

    if ![shoulder, elbow, wrist]
        .iter()
        .all(|keypoint| keypoint.is_confident(threshold))
    {
        return None;
    }

    let upper = (shoulder.col - elbow.col, shoulder.row - elbow.row);
    let fore = (wrist.col - elbow.col, wrist.row - elbow.row);
    let upper_len = (upper.0 * upper.0 + upper.1 * upper.1).sqrt();
    let fore_len = (fore.0 * fore.0 + fore.1 * fore.1).sqrt();

    if upper_len < f64::EPSILON || fore_len < f64::EPSILON {
        return None;
    }

    let cosine = ((upper.0 * fore.0 + upper.1 * fore.1) / (upper_len * fore_len)).clamp(-1.0, 1.0);
    finite_or_none(cosine.acos().to_degrees()).map(|angle| round_to(angle, ANGLE_DECIMALS))
}
