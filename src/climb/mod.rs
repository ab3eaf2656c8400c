pub mod config;
pub mod events;
pub mod machine;
pub mod session;
pub mod state;

pub use config::DetectionConfig;
pub use events::ClimbEvent;
pub use machine::{ClimbStateMachine, Effect, FinishedAttempt};
pub use session::{ClimbSession, SessionHandle};
pub use state::{ClimbState, PositionCheck, Trigger};
