use serde::{Deserialize, Serialize};

/// Number of landmarks produced per frame by the pose model.
pub const KEYPOINT_COUNT: usize = 17;

/// Landmarks persisted in the frame log, in column order.
pub const TRACKED_KEYPOINTS: [KeypointId; 12] = [
    KeypointId::LeftShoulder,
    KeypointId::RightShoulder,
    KeypointId::LeftElbow,
    KeypointId::RightElbow,
    KeypointId::LeftWrist,
    KeypointId::RightWrist,
    KeypointId::LeftHip,
    KeypointId::RightHip,
    KeypointId::LeftKnee,
    KeypointId::RightKnee,
    KeypointId::LeftAnkle,
    KeypointId::RightAnkle,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeypointId {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointId {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KeypointId::Nose => "nose",
            KeypointId::LeftEye => "left_eye",
            KeypointId::RightEye => "right_eye",
            KeypointId::LeftEar => "left_ear",
            KeypointId::RightEar => "right_ear",
            KeypointId::LeftShoulder => "left_shoulder",
            KeypointId::RightShoulder => "right_shoulder",
            KeypointId::LeftElbow => "left_elbow",
            KeypointId::RightElbow => "right_elbow",
            KeypointId::LeftWrist => "left_wrist",
            KeypointId::RightWrist => "right_wrist",
            KeypointId::LeftHip => "left_hip",
            KeypointId::RightHip => "right_hip",
            KeypointId::LeftKnee => "left_knee",
            KeypointId::RightKnee => "right_knee",
            KeypointId::LeftAnkle => "left_ankle",
            KeypointId::RightAnkle => "right_ankle",
        }
    }
}

/// A position in normalized frame space; `x` is horizontal (column), `y` vertical (row, 0 at the top).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// One body landmark as reported by the pose model: `(row, col)` normalized to [0, 1] plus confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub row: f64,
    pub col: f64,
    pub confidence: f64,
}

impl Keypoint {
    pub fn new(row: f64, col: f64, confidence: f64) -> Self {
        Self {
            row,
            col,
            confidence,
        }
    }

    pub fn is_confident(&self, threshold: f64) -> bool {
        self.confidence > threshold
    }

    pub fn point(&self) -> Point {
        Point::new(self.col, self.row)
    }
}

impl From<[f64; 3]> for Keypoint {
    fn from(raw: [f64; 3]) -> Self {
        Keypoint::new(raw[0], raw[1], raw[2])
    }
}
