use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    helpers::{parse_datetime, parse_optional_datetime, parse_status, to_i64, to_u64},
    models::{HistoryEntry, HistoryStatus},
    Database,
};
use crate::session::{SessionStart, SessionSummary};

const SESSION_COLUMNS: &str = "id, script_id, started_at, ended_at, status, planned_seconds, elapsed_seconds, created_at, updated_at";

fn row_to_entry(row: &Row) -> Result<HistoryEntry> {
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let status: String = row.get("status")?;
    let planned_seconds: i64 = row.get("planned_seconds")?;
    let elapsed_seconds: i64 = row.get("elapsed_seconds")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(HistoryEntry {
        id: row.get("id")?,
        script_id: row.get("script_id")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
        status: parse_status(&status)?,
        planned_seconds: to_u64(planned_seconds, "planned_seconds")?,
        elapsed_seconds: to_u64(elapsed_seconds, "elapsed_seconds")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    pub async fn insert_running_session(&self, start: &SessionStart) -> Result<()> {
        let record = start.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, script_id, started_at, ended_at, status, planned_seconds, elapsed_seconds, created_at, updated_at)
                 VALUES (?1, ?2, ?3, NULL, ?4, ?5, 0, ?3, ?3)",
                params![
                    record.session_id,
                    record.script_id,
                    record.started_at.to_rfc3339(),
                    HistoryStatus::Running.as_str(),
                    to_i64(record.planned_duration_seconds)?,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Checkpoints a running session. Rows that already ended are left alone.
    pub async fn update_session_progress(
        &self,
        session_id: &str,
        elapsed_seconds: u64,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE sessions
                 SET elapsed_seconds = ?1,
                     updated_at = ?2
                 WHERE id = ?3 AND status = 'Running'",
                params![to_i64(elapsed_seconds)?, updated_at.to_rfc3339(), session_id],
            )?;
            Ok(())
        })
        .await
    }

    /// Writes the final record, inserting it if the start row never landed.
    pub async fn finalize_session(&self, summary: &SessionSummary) -> Result<()> {
        let entry = HistoryEntry::from(summary);
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, script_id, started_at, ended_at, status, planned_seconds, elapsed_seconds, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                     ended_at = excluded.ended_at,
                     status = excluded.status,
                     elapsed_seconds = excluded.elapsed_seconds,
                     updated_at = excluded.updated_at",
                params![
                    entry.id,
                    entry.script_id,
                    entry.started_at.to_rfc3339(),
                    entry.ended_at.map(|dt| dt.to_rfc3339()),
                    entry.status.as_str(),
                    to_i64(entry.planned_seconds)?,
                    to_i64(entry.elapsed_seconds)?,
                    entry.created_at.to_rfc3339(),
                    entry.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<HistoryEntry>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let entry = stmt
                .query_row(params![session_id], |row| Ok(row_to_entry(row)))
                .optional()?
                .transpose()?;
            Ok(entry)
        })
        .await
    }

    pub async fn get_incomplete_sessions(&self) -> Result<Vec<HistoryEntry>> {
        self.execute(|conn| {
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE status = 'Running'
                 ORDER BY started_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                entries.push(row_to_entry(row)?);
            }
            Ok(entries)
        })
        .await
    }

    pub async fn mark_session_interrupted(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE sessions
                 SET status = ?1,
                     ended_at = ?2,
                     updated_at = ?2
                 WHERE id = ?3",
                params![
                    HistoryStatus::Interrupted.as_str(),
                    ended_at.to_rfc3339(),
                    session_id,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Finished sessions, newest first.
    pub async fn list_sessions(&self) -> Result<Vec<HistoryEntry>> {
        self.list_sessions_paginated(usize::MAX, 0).await
    }

    pub async fn list_sessions_paginated(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<HistoryEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE status IN ('Completed', 'Stopped', 'Interrupted')
                 ORDER BY started_at DESC
                 LIMIT ?1 OFFSET ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![limit, offset])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                entries.push(row_to_entry(row)?);
            }
            Ok(entries)
        })
        .await
    }

    /// Returns `false` if no row had that id.
    pub async fn delete_session(&self, session_id: &str) -> Result<bool> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let rows_affected =
                conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
            Ok(rows_affected > 0)
        })
        .await
    }
}
