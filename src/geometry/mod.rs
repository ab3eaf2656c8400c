pub mod store;

pub use store::{GeometryStore, DEFAULT_MIN_DETECTION_CONFIDENCE};
