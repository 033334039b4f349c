use std::{sync::Arc, time::Duration};

use chrono::Utc;
use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex, MutexGuard},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    audio::Playback,
    catalog::ScriptCatalog,
    error::{Error, Result},
    history::{HistoryMessage, HistorySender},
    ui::SessionView,
};

use super::state::{MeditationSession, SessionStatus, SessionSummary, TickOutcome};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session: MeditationSession,
    pub remaining_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum SessionEvent {
    StateChanged(SessionSnapshot),
    Completed(SessionSummary),
    Stopped(SessionSummary),
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub tick_interval: Duration,
    /// Progress is checkpointed to history every this many ticks.
    pub checkpoint_every_ticks: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            checkpoint_every_ticks: 10,
        }
    }
}

struct Ticker {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Ticker {
    fn cancel(self) {
        self.cancel_token.cancel();
        // The handle is only dropped: the ticker may be the caller.
        drop(self.handle);
    }
}

#[derive(Default)]
struct ControllerState {
    session: MeditationSession,
    ticker: Option<Ticker>,
    /// Bumped whenever the tick source is replaced or frozen; a tick carrying
    /// an older generation is stale and ignored.
    generation: u64,
}

#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<ControllerState>>,
    catalog: Arc<dyn ScriptCatalog>,
    playback: Arc<dyn Playback>,
    history: HistorySender,
    events: broadcast::Sender<SessionEvent>,
    config: ControllerConfig,
}

impl SessionController {
    pub fn new(
        catalog: Arc<dyn ScriptCatalog>,
        playback: Arc<dyn Playback>,
        history: HistorySender,
        config: ControllerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(ControllerState::default())),
            catalog,
            playback,
            history,
            events,
            config,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let guard = self.state.lock().await;
        snapshot_of(&guard.session)
    }

    /// Capability view of the controls the UI should offer right now.
    pub async fn view(&self) -> SessionView {
        let guard = self.state.lock().await;
        SessionView::from_session(&guard.session)
    }

    pub async fn start(&self, script_id: &str) -> Result<SessionSnapshot> {
        let mut guard = self.state.lock().await;
        if guard.session.status() != SessionStatus::Idle {
            return Err(Error::invalid_state(format!(
                "a session is already {}",
                guard.session.status().as_str()
            )));
        }

        let script = self.catalog.get_script(script_id)?;
        let start = guard.session.start(
            Uuid::new_v4().to_string(),
            script.id.clone(),
            script.duration_seconds,
            Utc::now(),
        )?;

        log_info!(
            "session {} started: '{}' for {}s",
            start.session_id,
            script.id,
            start.planned_duration_seconds
        );
        self.history.send(HistoryMessage::Started(start));

        self.drive_playback("load", self.playback.load(&script.audio_ref));
        self.drive_playback(
            "set volume",
            self.playback.set_volume(guard.session.effective_volume()),
        );
        self.drive_playback("play", self.playback.play());

        self.spawn_ticker(&mut guard);
        Ok(self.emit_state(&guard))
    }

    /// No-op unless running.
    pub async fn pause(&self) -> SessionSnapshot {
        let mut guard = self.state.lock().await;
        if guard.session.pause() {
            Self::freeze_ticker(&mut guard);
            self.drive_playback("pause", self.playback.pause());
            log_debug!("session paused at {}s", guard.session.elapsed_seconds());
        }
        self.emit_state(&guard)
    }

    /// No-op unless paused.
    pub async fn resume(&self) -> SessionSnapshot {
        let mut guard = self.state.lock().await;
        if guard.session.resume() {
            self.spawn_ticker(&mut guard);
            self.drive_playback("play", self.playback.play());
            log_debug!("session resumed at {}s", guard.session.elapsed_seconds());
        }
        self.emit_state(&guard)
    }

    /// Ends a running or paused session; `None` if there was nothing to stop.
    pub async fn stop(&self) -> Option<SessionSummary> {
        let mut guard = self.state.lock().await;
        let summary = guard.session.stop(Utc::now())?;
        self.finish(&mut guard, summary.clone());
        Some(summary)
    }

    /// Advances the clock by one second. The tick source calls this through
    /// [`Self::tick_from`]; exposed for callers that drive time themselves.
    pub async fn tick(&self) -> TickOutcome {
        let mut guard = self.state.lock().await;
        self.apply_tick(&mut guard)
    }

    pub async fn set_muted(&self, muted: bool) -> Result<SessionSnapshot> {
        let mut guard = self.state.lock().await;
        guard.session.set_muted(muted)?;
        self.drive_playback(
            "set volume",
            self.playback.set_volume(guard.session.effective_volume()),
        );
        Ok(self.emit_state(&guard))
    }

    pub async fn set_volume(&self, volume: f32) -> Result<SessionSnapshot> {
        let mut guard = self.state.lock().await;
        guard.session.set_volume(volume)?;
        self.drive_playback(
            "set volume",
            self.playback.set_volume(guard.session.effective_volume()),
        );
        Ok(self.emit_state(&guard))
    }

    /// Returns a finished controller to idle so a new session can start.
    pub async fn reset(&self) -> Result<SessionSnapshot> {
        let mut guard = self.state.lock().await;
        guard.session.reset()?;
        Ok(self.emit_state(&guard))
    }

    /// Cancels the tick source without ending the session. Used on exit; the
    /// in-progress row is recovered as interrupted on the next launch.
    pub async fn shutdown(&self) {
        let mut guard = self.state.lock().await;
        Self::freeze_ticker(&mut guard);
        self.drive_playback("stop", self.playback.stop());
    }

    /// Tick delivered by the ticker of `generation`. Returns `false` once that
    /// ticker should exit.
    async fn tick_from(&self, generation: u64) -> bool {
        let mut guard = self.state.lock().await;
        if guard.generation != generation {
            log_debug!("dropping stale tick from generation {generation}");
            return false;
        }
        self.apply_tick(&mut guard);
        guard.session.status() == SessionStatus::Running
    }

    fn apply_tick(&self, guard: &mut MutexGuard<'_, ControllerState>) -> TickOutcome {
        let outcome = guard.session.tick(Utc::now());
        match &outcome {
            TickOutcome::Ignored => {}
            TickOutcome::Advanced { elapsed_seconds } => {
                let every = u64::from(self.config.checkpoint_every_ticks.max(1));
                if elapsed_seconds % every == 0 {
                    if let Some(session_id) = guard.session.id() {
                        self.history.send(HistoryMessage::Progress {
                            session_id: session_id.to_string(),
                            elapsed_seconds: *elapsed_seconds,
                        });
                    }
                }
                self.emit_state(guard);
            }
            TickOutcome::Completed(summary) => {
                self.finish(guard, summary.clone());
            }
        }
        outcome
    }

    fn finish(&self, guard: &mut MutexGuard<'_, ControllerState>, summary: SessionSummary) {
        Self::freeze_ticker(guard);
        self.drive_playback("stop", self.playback.stop());

        log_info!(
            "session {} {} after {}s",
            summary.session_id,
            if summary.completed { "completed" } else { "stopped" },
            summary.elapsed_seconds
        );

        // The confirmation goes out regardless of how the history write fares.
        self.history.send(HistoryMessage::Finished(summary.clone()));
        self.emit_state(guard);
        let event = if summary.completed {
            SessionEvent::Completed(summary)
        } else {
            SessionEvent::Stopped(summary)
        };
        let _ = self.events.send(event);
    }

    fn spawn_ticker(&self, guard: &mut MutexGuard<'_, ControllerState>) {
        Self::freeze_ticker(guard);
        let generation = guard.generation;

        let controller = self.clone();
        let period = self.config.tick_interval;
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        if !controller.tick_from(generation).await {
                            break;
                        }
                    }
                }
            }
        });

        guard.ticker = Some(Ticker {
            cancel_token,
            handle,
        });
    }

    fn freeze_ticker(guard: &mut MutexGuard<'_, ControllerState>) {
        guard.generation = guard.generation.wrapping_add(1);
        if let Some(ticker) = guard.ticker.take() {
            ticker.cancel();
        }
    }

    fn emit_state(&self, guard: &MutexGuard<'_, ControllerState>) -> SessionSnapshot {
        let snapshot = snapshot_of(&guard.session);
        let _ = self.events.send(SessionEvent::StateChanged(snapshot.clone()));
        snapshot
    }

    fn drive_playback(&self, action: &str, result: std::result::Result<(), String>) {
        if let Err(err) = result {
            log_warn!("playback {action} failed: {err}");
        }
    }
}

fn snapshot_of(session: &MeditationSession) -> SessionSnapshot {
    SessionSnapshot {
        remaining_seconds: session.remaining_seconds(),
        session: session.clone(),
    }
}
