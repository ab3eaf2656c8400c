pub mod attempts;
pub mod scores;

pub use attempts::AttemptSummary;
