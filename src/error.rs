use thiserror::Error;

// Errors surfaced by the pose adapter, hold geometry and the climb state machine.

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClimbError {
    #[error("Configuration Error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Malformed observation: expected {expected} keypoints, got {actual}")]
    MalformedObservation { expected: usize, actual: usize },
    #[error("Malformed force tick: expected {expected} readings, got {actual}")]
    MalformedForceTick { expected: usize, actual: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("hold geometry has not been loaded")]
    MissingHoldGeometry,
    #[error("no hold detection passed the confidence threshold of {0}")]
    NoConfidentHolds(f64),
    #[error("hold {id} has a malformed bounding box ({reason})")]
    MalformedHold { id: u32, reason: &'static str },
}
