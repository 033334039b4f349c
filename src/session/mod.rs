pub mod commands;
pub mod controller;
pub mod state;

pub use controller::{ControllerConfig, SessionController, SessionEvent, SessionSnapshot};
pub use state::{MeditationSession, SessionStart, SessionStatus, SessionSummary, TickOutcome};
