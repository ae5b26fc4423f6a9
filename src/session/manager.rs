use anyhow::Result;
use chrono::Utc;
use log::{debug, info};
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::db::models::{SessionDetail, SetEntry, SetLog, WorkoutSession};
use crate::db::operations::{
    active_session_exists, delete_session, delete_set_log, end_active_sessions,
    find_active_session, get_exercise_logs, insert_session, insert_set_log, resolve_session,
    set_session_end_time, update_set_log_result,
};

/// Owns the invariant that at most one session is active at a time.
///
/// The invariant is enforced by application logic, not a storage constraint:
/// the read-then-write sections of the lifecycle transitions run under a
/// process-local mutex. "Not found" outcomes surface as `None`, never as an
/// error.
pub struct SessionManager {
    pool: SqlitePool,
    lifecycle: Mutex<()>,
}

impl SessionManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            lifecycle: Mutex::new(()),
        }
    }

    /// Starts a session for the given routine day. Any session still active is
    /// silently force-ended first; the caller never has to end it explicitly.
    /// Returns the new session with its day and templates resolved.
    pub async fn start_session(&self, routine_day_id: i64) -> Result<SessionDetail> {
        let _guard = self.lifecycle.lock().await;

        let ended = end_active_sessions(&self.pool, Utc::now()).await?;
        if ended > 0 {
            info!("Force-ended {} active session(s) before starting a new one", ended);
        }

        let session = insert_session(&self.pool, routine_day_id, Utc::now()).await?;
        debug!("Started session {} for routine day {}", session.id, routine_day_id);
        resolve_session(&self.pool, session).await
    }

    /// The session with no end time, fully resolved, or `None` when idle.
    pub async fn active_session(&self) -> Result<Option<SessionDetail>> {
        match find_active_session(&self.pool).await? {
            Some(session) => Ok(Some(resolve_session(&self.pool, session).await?)),
            None => Ok(None),
        }
    }

    /// Ends the active session by stamping its end time. A soft transition:
    /// the session and its logs are preserved. `None` when nothing is active.
    pub async fn end_session(&self) -> Result<Option<SessionDetail>> {
        let _guard = self.lifecycle.lock().await;

        let Some(active) = find_active_session(&self.pool).await? else {
            return Ok(None);
        };
        let Some(ended) = set_session_end_time(&self.pool, active.id, Utc::now()).await? else {
            return Ok(None);
        };
        info!("Ended session {}", ended.id);
        Ok(Some(resolve_session(&self.pool, ended).await?))
    }

    /// Discards the active session and all of its set logs. Unlike
    /// [`end_session`](Self::end_session) this is a hard delete. Returns the
    /// discarded record, or `None` when nothing is active.
    pub async fn cancel_session(&self) -> Result<Option<WorkoutSession>> {
        let _guard = self.lifecycle.lock().await;

        let Some(active) = find_active_session(&self.pool).await? else {
            return Ok(None);
        };
        delete_session(&self.pool, active.id).await?;
        info!("Cancelled session {}, set logs discarded", active.id);
        Ok(Some(active))
    }

    /// Upserts a set log keyed on identity. A new entry is inserted with the
    /// completion time stamped now; an existing one has only reps and weight
    /// updated, preserving its original timestamp. The session's active state
    /// is deliberately not checked, so ended sessions remain editable.
    pub async fn save_set(&self, entry: SetEntry) -> Result<Option<SetLog>> {
        match entry.id {
            None => {
                let log = insert_set_log(
                    &self.pool,
                    entry.session_id,
                    &entry.exercise_name,
                    entry.set_number,
                    entry.reps_performed,
                    entry.weight_used,
                    Utc::now(),
                )
                .await?;
                debug!(
                    "Logged set {} of {} for session {}",
                    log.set_number, log.exercise_name, log.session_id
                );
                Ok(Some(log))
            }
            Some(id) => {
                update_set_log_result(&self.pool, id, entry.reps_performed, entry.weight_used)
                    .await
            }
        }
    }

    /// A session's logs for one exercise, ordered by set number.
    pub async fn exercise_logs(&self, session_id: i64, exercise_name: &str) -> Result<Vec<SetLog>> {
        get_exercise_logs(&self.pool, session_id, exercise_name).await
    }

    /// Idempotent hard delete; returns the number of rows removed (0 or 1).
    pub async fn delete_set(&self, set_log_id: i64) -> Result<u64> {
        delete_set_log(&self.pool, set_log_id).await
    }

    /// Cheap existence probe, no child resolution.
    pub async fn has_active_session(&self) -> Result<bool> {
        active_session_exists(&self.pool).await
    }
}
