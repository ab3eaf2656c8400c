pub mod attempt;
pub mod force;
pub mod hold;
pub mod keypoint;
pub mod observation;

pub use attempt::{AttemptOutcome, AttemptRecord, FrameLog};
pub use force::{ForceLog, ForceSample, ForceTick};
pub use hold::{BoundingBox, Hold, HoldDetection};
pub use keypoint::{Keypoint, KeypointId, Point, KEYPOINT_COUNT, TRACKED_KEYPOINTS};
pub use observation::{ArmAngles, FrameObservation, LoggedFrame};
