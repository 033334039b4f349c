//! Fire-and-forget handoff of session records to persistent history.
//!
//! The session controller never awaits a store. It drops a [`HistoryMessage`]
//! into an unbounded channel and a single worker task applies them in order,
//! logging failures.

use async_trait::async_trait;
use chrono::Utc;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};

use crate::{
    db::{Database, SessionLock},
    error::{Error, Result},
    session::{SessionStart, SessionSummary},
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[async_trait]
pub trait HistoryStore: Send + Sync + 'static {
    async fn record_session(&self, summary: &SessionSummary) -> Result<()>;

    async fn begin_session(&self, _start: &SessionStart) -> Result<()> {
        Ok(())
    }

    async fn update_progress(&self, _session_id: &str, _elapsed_seconds: u64) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for Database {
    async fn record_session(&self, summary: &SessionSummary) -> Result<()> {
        self.finalize_session(summary)
            .await
            .map_err(Error::Persistence)
    }

    async fn begin_session(&self, start: &SessionStart) -> Result<()> {
        self.insert_running_session(start)
            .await
            .map_err(Error::Persistence)
    }

    async fn update_progress(&self, session_id: &str, elapsed_seconds: u64) -> Result<()> {
        self.update_session_progress(session_id, elapsed_seconds, Utc::now())
            .await
            .map_err(Error::Persistence)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryMessage {
    Started(SessionStart),
    Progress {
        session_id: String,
        elapsed_seconds: u64,
    },
    Finished(SessionSummary),
}

/// Cheap, cloneable sending side of the history worker.
#[derive(Clone)]
pub struct HistorySender {
    tx: Option<UnboundedSender<HistoryMessage>>,
}

impl HistorySender {
    /// A sender that discards everything; used when history is not wanted.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn send(&self, message: HistoryMessage) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(message).is_err() {
            log_warn!("history worker is gone; dropping session record");
        }
    }
}

pub struct HistoryWorker {
    handle: JoinHandle<()>,
}

impl HistoryWorker {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn<S: HistoryStore>(store: S) -> (HistorySender, HistoryWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(store, rx));
        (HistorySender { tx: Some(tx) }, HistoryWorker { handle })
    }

    /// Waits for queued messages to drain. Every sender must be dropped first.
    pub async fn shutdown(self) {
        if let Err(err) = self.handle.await {
            log_error!("history worker panicked: {err}");
        }
    }
}

async fn run_worker<S: HistoryStore>(store: S, mut rx: UnboundedReceiver<HistoryMessage>) {
    while let Some(message) = rx.recv().await {
        let result = match &message {
            HistoryMessage::Started(start) => store.begin_session(start).await,
            HistoryMessage::Progress {
                session_id,
                elapsed_seconds,
            } => store.update_progress(session_id, *elapsed_seconds).await,
            HistoryMessage::Finished(summary) => {
                let result = store.record_session(summary).await;
                if result.is_ok() {
                    log_info!(
                        "recorded session {} ({}s, completed={})",
                        summary.session_id,
                        summary.elapsed_seconds,
                        summary.completed
                    );
                }
                result
            }
        };

        if let Err(err) = result {
            log_error!("failed to persist {message:?}: {err}");
        }
    }
}

/// Marks sessions left `Running` by a previous process as interrupted.
///
/// Skipped while another process holds the session lock: its `Running` row
/// is live, not left over. Interrupted rows end at their last checkpoint.
pub async fn recover_interrupted(db: &Database) -> anyhow::Result<usize> {
    let Some(_lock) = SessionLock::try_acquire(&db.session_lock_path())? else {
        log_info!("A session is active in another process; skipping recovery");
        return Ok(0);
    };

    let stale = db.get_incomplete_sessions().await?;
    for entry in &stale {
        log_warn!(
            "Recovered incomplete session {}; marking as Interrupted",
            entry.id
        );
        db.mark_session_interrupted(&entry.id, entry.updated_at).await?;
    }
    Ok(stale.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::HistoryStatus;
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct FlakyStore {
        seen: Arc<Mutex<Vec<HistoryMessage>>>,
        fail_begin: bool,
    }

    #[async_trait]
    impl HistoryStore for FlakyStore {
        async fn record_session(&self, summary: &SessionSummary) -> Result<()> {
            self.seen
                .lock()
                .unwrap()
                .push(HistoryMessage::Finished(summary.clone()));
            Ok(())
        }

        async fn begin_session(&self, _start: &SessionStart) -> Result<()> {
            if self.fail_begin {
                return Err(Error::Persistence(anyhow::anyhow!("disk full")));
            }
            Ok(())
        }
    }

    fn summary() -> SessionSummary {
        SessionSummary {
            session_id: "s".into(),
            script_id: "breathing-3".into(),
            started_at: Utc::now(),
            ended_at: Utc::now(),
            elapsed_seconds: 3,
            planned_duration_seconds: 3,
            completed: true,
        }
    }

    #[tokio::test]
    async fn failed_write_does_not_stop_the_worker() {
        let store = FlakyStore {
            fail_begin: true,
            ..FlakyStore::default()
        };
        let seen = store.seen.clone();
        let (sender, worker) = HistoryWorker::spawn(store);

        sender.send(HistoryMessage::Started(SessionStart {
            session_id: "s".into(),
            script_id: "breathing-3".into(),
            started_at: Utc::now(),
            planned_duration_seconds: 3,
        }));
        sender.send(HistoryMessage::Finished(summary()));
        drop(sender);
        worker.shutdown().await;

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn recovery_marks_running_rows_interrupted() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("h.sqlite3")).unwrap();
        db.insert_running_session(&SessionStart {
            session_id: "left-over".into(),
            script_id: "sleep-20".into(),
            started_at: Utc::now(),
            planned_duration_seconds: 1200,
        })
        .await
        .unwrap();

        assert_eq!(recover_interrupted(&db).await.unwrap(), 1);
        assert_eq!(recover_interrupted(&db).await.unwrap(), 0);
        assert_eq!(db.list_sessions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn interrupted_rows_end_at_their_last_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("h.sqlite3")).unwrap();
        let started_at = Utc.with_ymd_and_hms(2026, 3, 1, 7, 0, 0).unwrap();
        let checkpoint = started_at + chrono::Duration::seconds(40);

        db.insert_running_session(&SessionStart {
            session_id: "crashed".into(),
            script_id: "body-scan-10".into(),
            started_at,
            planned_duration_seconds: 600,
        })
        .await
        .unwrap();
        db.update_session_progress("crashed", 40, checkpoint)
            .await
            .unwrap();

        assert_eq!(recover_interrupted(&db).await.unwrap(), 1);
        let entry = db.get_session("crashed").await.unwrap().unwrap();
        assert_eq!(entry.status, HistoryStatus::Interrupted);
        assert_eq!(entry.ended_at, Some(checkpoint));
        assert_eq!(entry.elapsed_seconds, 40);
    }

    #[tokio::test]
    async fn live_session_in_another_process_is_not_recovered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.sqlite3");
        let owner = Database::new(path.clone()).unwrap();
        let other = Database::new(path).unwrap();

        let lock = SessionLock::try_acquire(&owner.session_lock_path())
            .unwrap()
            .expect("lock is free");
        owner
            .insert_running_session(&SessionStart {
                session_id: "live".into(),
                script_id: "sleep-20".into(),
                started_at: Utc::now(),
                planned_duration_seconds: 1200,
            })
            .await
            .unwrap();
        owner
            .update_session_progress("live", 10, Utc::now())
            .await
            .unwrap();

        assert_eq!(recover_interrupted(&other).await.unwrap(), 0);
        owner
            .update_session_progress("live", 30, Utc::now())
            .await
            .unwrap();
        let entry = other.get_session("live").await.unwrap().unwrap();
        assert_eq!(entry.status, HistoryStatus::Running);
        assert_eq!(entry.elapsed_seconds, 30);

        // Once the owner is gone the row really is left over.
        drop(lock);
        drop(owner);
        assert_eq!(recover_interrupted(&other).await.unwrap(), 1);
        let entry = other.get_session("live").await.unwrap().unwrap();
        assert_eq!(entry.status, HistoryStatus::Interrupted);
        assert_eq!(entry.elapsed_seconds, 30);
    }

    #[test]
    fn disabled_sender_swallows_messages() {
        HistorySender::disabled().send(HistoryMessage::Finished(summary()));
    }
}
