//! Stored session history rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionSummary;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum HistoryStatus {
    /// Written at start; replaced when the session ends.
    Running,
    Completed,
    Stopped,
    /// The process exited before the session ended.
    Interrupted,
}

impl HistoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryStatus::Running => "Running",
            HistoryStatus::Completed => "Completed",
            HistoryStatus::Stopped => "Stopped",
            HistoryStatus::Interrupted => "Interrupted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub script_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: HistoryStatus,
    pub planned_seconds: u64,
    pub elapsed_seconds: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&SessionSummary> for HistoryEntry {
    fn from(summary: &SessionSummary) -> Self {
        Self {
            id: summary.session_id.clone(),
            script_id: summary.script_id.clone(),
            started_at: summary.started_at,
            ended_at: Some(summary.ended_at),
            status: if summary.completed {
                HistoryStatus::Completed
            } else {
                HistoryStatus::Stopped
            },
            planned_seconds: summary.planned_duration_seconds,
            elapsed_seconds: summary.elapsed_seconds,
            created_at: summary.started_at,
            updated_at: summary.ended_at,
        }
    }
}
