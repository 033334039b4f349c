use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
    Stopped,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Stopped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Running => "running",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Stopped => "stopped",
        }
    }
}

/// Record handed to the history store when a session reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub script_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub elapsed_seconds: u64,
    pub planned_duration_seconds: u64,
    pub completed: bool,
}

/// Emitted when a session begins so an in-progress row can be checkpointed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStart {
    pub session_id: String,
    pub script_id: String,
    pub started_at: DateTime<Utc>,
    pub planned_duration_seconds: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The session was not running; nothing changed.
    Ignored,
    Advanced { elapsed_seconds: u64 },
    Completed(SessionSummary),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeditationSession {
    id: Option<String>,
    script_id: Option<String>,
    status: SessionStatus,
    planned_duration_seconds: u64,
    elapsed_seconds: u64,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    muted: bool,
    volume: f32,
}

impl Default for MeditationSession {
    fn default() -> Self {
        Self {
            id: None,
            script_id: None,
            status: SessionStatus::Idle,
            planned_duration_seconds: 0,
            elapsed_seconds: 0,
            started_at: None,
            ended_at: None,
            muted: false,
            volume: 1.0,
        }
    }
}

impl MeditationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn script_id(&self) -> Option<&str> {
        self.script_id.as_deref()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn planned_duration_seconds(&self) -> u64 {
        self.planned_duration_seconds
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Volume actually applied to playback, zero while muted.
    pub fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }

    pub fn remaining_seconds(&self) -> u64 {
        match self.status {
            SessionStatus::Idle => 0,
            _ => self
                .planned_duration_seconds
                .saturating_sub(self.elapsed_seconds),
        }
    }

    pub fn start(
        &mut self,
        session_id: String,
        script_id: String,
        planned_duration_seconds: u64,
        now: DateTime<Utc>,
    ) -> Result<SessionStart> {
        if self.status != SessionStatus::Idle {
            return Err(Error::invalid_state(format!(
                "cannot start a session while {}",
                self.status.as_str()
            )));
        }
        if planned_duration_seconds == 0 {
            return Err(Error::invalid_argument(format!(
                "script '{script_id}' has zero duration"
            )));
        }

        // Playback attributes chosen before start carry over.
        *self = Self {
            id: Some(session_id.clone()),
            script_id: Some(script_id.clone()),
            status: SessionStatus::Running,
            planned_duration_seconds,
            elapsed_seconds: 0,
            started_at: Some(now),
            ended_at: None,
            muted: self.muted,
            volume: self.volume,
        };

        Ok(SessionStart {
            session_id,
            script_id,
            started_at: now,
            planned_duration_seconds,
        })
    }

    /// Returns `true` if the session moved to `Paused`.
    pub fn pause(&mut self) -> bool {
        if self.status != SessionStatus::Running {
            return false;
        }
        self.status = SessionStatus::Paused;
        true
    }

    /// Returns `true` if the session moved back to `Running`.
    pub fn resume(&mut self) -> bool {
        if self.status != SessionStatus::Paused {
            return false;
        }
        self.status = SessionStatus::Running;
        true
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if self.status != SessionStatus::Running {
            return TickOutcome::Ignored;
        }

        self.elapsed_seconds = (self.elapsed_seconds + 1).min(self.planned_duration_seconds);
        if self.elapsed_seconds < self.planned_duration_seconds {
            return TickOutcome::Advanced {
                elapsed_seconds: self.elapsed_seconds,
            };
        }

        match self.finish(SessionStatus::Completed, now) {
            Some(summary) => TickOutcome::Completed(summary),
            None => TickOutcome::Ignored,
        }
    }

    /// Ends a running or paused session as stopped. No-op from any other
    /// state. Full-length sessions never get here: `tick` completes them on
    /// the second that reaches the planned duration.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<SessionSummary> {
        if !matches!(self.status, SessionStatus::Running | SessionStatus::Paused) {
            return None;
        }
        self.finish(SessionStatus::Stopped, now)
    }

    pub fn set_muted(&mut self, muted: bool) -> Result<()> {
        self.ensure_mutable("change mute")?;
        self.muted = muted;
        Ok(())
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<()> {
        if !volume.is_finite() || !(0.0..=1.0).contains(&volume) {
            return Err(Error::invalid_argument(format!(
                "volume {volume} is outside 0..=1"
            )));
        }
        self.ensure_mutable("change volume")?;
        self.volume = volume;
        Ok(())
    }

    /// Record of a finished session; `None` until a terminal state is reached.
    pub fn summary(&self) -> Option<SessionSummary> {
        if !self.status.is_terminal() {
            return None;
        }
        Some(SessionSummary {
            session_id: self.id.clone()?,
            script_id: self.script_id.clone()?,
            started_at: self.started_at?,
            ended_at: self.ended_at?,
            elapsed_seconds: self.elapsed_seconds,
            planned_duration_seconds: self.planned_duration_seconds,
            completed: self.status == SessionStatus::Completed,
        })
    }

    /// Clears a finished session so the next one can start.
    pub fn reset(&mut self) -> Result<()> {
        match self.status {
            SessionStatus::Idle => Ok(()),
            status if status.is_terminal() => {
                *self = Self {
                    muted: self.muted,
                    volume: self.volume,
                    ..Self::default()
                };
                Ok(())
            }
            status => Err(Error::invalid_state(format!(
                "cannot reset a {} session; stop it first",
                status.as_str()
            ))),
        }
    }

    fn finish(&mut self, status: SessionStatus, now: DateTime<Utc>) -> Option<SessionSummary> {
        self.status = status;
        if self.ended_at.is_none() {
            self.ended_at = Some(now);
        }
        self.summary()
    }

    fn ensure_mutable(&self, action: &str) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::invalid_state(format!(
                "cannot {action} on a {} session",
                self.status.as_str()
            )));
        }
        Ok(())
    }
}
