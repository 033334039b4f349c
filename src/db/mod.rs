//! SQLite-backed session history.
//!
//! `rusqlite::Connection` is not `Sync`, so one worker thread owns it and
//! async callers hand it closures through a channel.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex, PoisonError},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

pub mod helpers;
mod lock;
mod migrations;
pub mod models;
mod repositories;

use migrations::run_migrations;

pub use lock::SessionLock;
pub use models::{HistoryEntry, HistoryStatus};

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum Message {
    Run(Job),
    Close,
}

/// Owns the worker thread; joined when the last `Database` clone drops.
struct Worker {
    jobs: mpsc::Sender<Message>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let Some(thread) = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        if self.jobs.send(Message::Close).is_err() {
            error!("History database thread already gone at shutdown");
        }
        if let Err(panic) = thread.join() {
            error!("History database thread panicked: {panic:?}");
        }
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open history database {}", path.display()))?;

    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        error!("Failed to enable WAL mode: {err}");
    }

    run_migrations(&mut conn).context("failed to migrate history database")?;
    Ok(conn)
}

#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    path: Arc<PathBuf>,
}

impl Database {
    /// Opens (creating if needed) the database at `path` and waits until
    /// migrations have run.
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (jobs_tx, jobs_rx) = mpsc::channel::<Message>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let thread_path = path.clone();

        let thread = thread::Builder::new()
            .name("mindful-db".into())
            .spawn(move || {
                let mut conn = match open_connection(&thread_path) {
                    Ok(conn) => {
                        if ready_tx.send(Ok(())).is_err() {
                            return;
                        }
                        conn
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                for message in jobs_rx {
                    match message {
                        Message::Run(job) => job(&mut conn),
                        Message::Close => break,
                    }
                }
                debug!("History database thread exiting");
            })
            .context("failed to spawn history database thread")?;

        ready_rx
            .recv()
            .context("history database thread exited during startup")??;

        info!("History database ready at {}", path.display());

        Ok(Self {
            worker: Arc::new(Worker {
                jobs: jobs_tx,
                thread: Mutex::new(Some(thread)),
            }),
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock file next to the database, held by whichever process is running
    /// a session against it.
    pub fn session_lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    /// Runs `task` on the database thread and awaits its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let job: Job = Box::new(move |conn| {
            if reply_tx.send(task(conn)).is_err() {
                debug!("History query finished after its caller went away");
            }
        });

        self.worker
            .jobs
            .send(Message::Run(job))
            .map_err(|_| anyhow!("history database thread is not running"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("history database thread dropped a query"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_parent_directories_and_runs_queries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mindful.sqlite3");
        let db = Database::new(path.clone()).unwrap();
        assert_eq!(db.path(), path.as_path());

        let version: i64 = db
            .execute(|conn| Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert!(version > 0);
    }

    #[tokio::test]
    async fn task_errors_reach_the_caller() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("h.sqlite3")).unwrap();
        let result: Result<()> = db.execute(|_| Err(anyhow!("boom"))).await;
        assert_eq!(result.unwrap_err().to_string(), "boom");
    }
}
