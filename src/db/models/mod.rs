pub mod session;

pub use session::{HistoryEntry, HistoryStatus};
