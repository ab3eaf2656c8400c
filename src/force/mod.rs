mod recorder;

pub use recorder::ForceRecorder;
