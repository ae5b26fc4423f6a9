//! High-level workout service combining the storage surface, the session
//! lifecycle manager and the analytics queries behind one handle.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::analytics::{self, DashboardStats};
use crate::db::models::{
    DayWithExercises, ExerciseTemplate, NewExerciseTemplate, NewRoutine, NewRoutineDay, Routine,
    RoutineDay, RoutineWithDays, SessionDetail, SetEntry, SetLog, WorkoutSession,
};
use crate::db::operations;
use crate::db::{init_database, open_pool};
use crate::session::SessionManager;

pub struct WorkoutService {
    pool: SqlitePool,
    sessions: SessionManager,
}

impl WorkoutService {
    /// Opens (and if necessary creates) the database at `path` and runs any
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self> {
        let pool = open_pool(path).await?;
        init_database(&pool).await?;
        Ok(Self::with_pool(pool))
    }

    /// Wraps an existing pool; the schema is assumed to be in place.
    pub fn with_pool(pool: SqlitePool) -> Self {
        let sessions = SessionManager::new(pool.clone());
        Self { pool, sessions }
    }

    // Session lifecycle

    /// Returns the active session when it already targets `routine_day_id`,
    /// avoiding a pointless forced restart when resuming the same day;
    /// otherwise starts a new session.
    pub async fn get_or_start_session(&self, routine_day_id: i64) -> Result<SessionDetail> {
        if let Some(active) = self.sessions.active_session().await? {
            if active.session.routine_day_id == Some(routine_day_id) {
                return Ok(active);
            }
        }
        self.sessions.start_session(routine_day_id).await
    }

    pub async fn start_session(&self, routine_day_id: i64) -> Result<SessionDetail> {
        self.sessions.start_session(routine_day_id).await
    }

    pub async fn active_session(&self) -> Result<Option<SessionDetail>> {
        self.sessions.active_session().await
    }

    pub async fn end_session(&self) -> Result<Option<SessionDetail>> {
        self.sessions.end_session().await
    }

    pub async fn cancel_session(&self) -> Result<Option<WorkoutSession>> {
        self.sessions.cancel_session().await
    }

    pub async fn has_active_session(&self) -> Result<bool> {
        self.sessions.has_active_session().await
    }

    /// Records a freshly completed set during a session.
    pub async fn save_set(
        &self,
        session_id: i64,
        exercise_name: &str,
        set_number: i64,
        reps: i64,
        weight: f64,
    ) -> Result<Option<SetLog>> {
        self.sessions
            .save_set(SetEntry {
                id: None,
                session_id,
                exercise_name: exercise_name.to_string(),
                set_number,
                reps_performed: reps,
                weight_used: weight,
            })
            .await
    }

    /// Upsert with full control over identity, see
    /// [`SessionManager::save_set`].
    pub async fn save_set_entry(&self, entry: SetEntry) -> Result<Option<SetLog>> {
        self.sessions.save_set(entry).await
    }

    pub async fn exercise_logs(&self, session_id: i64, exercise_name: &str) -> Result<Vec<SetLog>> {
        self.sessions.exercise_logs(session_id, exercise_name).await
    }

    pub async fn delete_set(&self, set_log_id: i64) -> Result<u64> {
        self.sessions.delete_set(set_log_id).await
    }

    // Analytics

    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        analytics::dashboard_stats(&self.pool).await
    }

    pub async fn consecutive_day_streak(&self) -> Result<u32> {
        analytics::consecutive_day_streak(&self.pool).await
    }

    pub async fn weekly_volume(&self, weeks_back: u32) -> Result<BTreeMap<NaiveDate, f64>> {
        analytics::weekly_volume(&self.pool, weeks_back).await
    }

    pub async fn last_weights_for_exercise(
        &self,
        exercise_name: &str,
    ) -> Result<HashMap<i64, f64>> {
        analytics::last_weights_for_exercise(&self.pool, exercise_name).await
    }

    /// Session history within [from, to] inclusive, newest first, with
    /// children resolved.
    pub async fn session_history(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SessionDetail>> {
        let sessions = operations::get_sessions_in_range(&self.pool, from, to).await?;
        let mut resolved = Vec::with_capacity(sessions.len());
        for session in sessions {
            resolved.push(operations::resolve_session(&self.pool, session).await?);
        }
        Ok(resolved)
    }

    // Routine CRUD pass-through

    pub async fn routines(&self) -> Result<Vec<RoutineWithDays>> {
        operations::get_routines(&self.pool).await
    }

    pub async fn routine(&self, routine_id: i64) -> Result<Option<RoutineWithDays>> {
        operations::get_routine(&self.pool, routine_id).await
    }

    pub async fn create_routine(&self, routine: &NewRoutine) -> Result<Routine> {
        operations::create_routine(&self.pool, routine).await
    }

    pub async fn update_routine(&self, routine: &Routine) -> Result<Option<Routine>> {
        operations::update_routine(&self.pool, routine).await
    }

    pub async fn delete_routine(&self, routine_id: i64) -> Result<u64> {
        operations::delete_routine(&self.pool, routine_id).await
    }

    pub async fn routine_day(&self, day_id: i64) -> Result<Option<DayWithExercises>> {
        operations::get_routine_day(&self.pool, day_id).await
    }

    pub async fn add_routine_day(&self, day: &NewRoutineDay) -> Result<RoutineDay> {
        operations::add_routine_day(&self.pool, day).await
    }

    pub async fn update_routine_day(&self, day: &RoutineDay) -> Result<Option<RoutineDay>> {
        operations::update_routine_day(&self.pool, day).await
    }

    pub async fn delete_routine_day(&self, day_id: i64) -> Result<u64> {
        operations::delete_routine_day(&self.pool, day_id).await
    }

    pub async fn add_exercise(&self, exercise: &NewExerciseTemplate) -> Result<ExerciseTemplate> {
        operations::add_exercise_template(&self.pool, exercise).await
    }

    pub async fn update_exercise(
        &self,
        exercise: &ExerciseTemplate,
    ) -> Result<Option<ExerciseTemplate>> {
        operations::update_exercise_template(&self.pool, exercise).await
    }

    pub async fn delete_exercise(&self, exercise_id: i64) -> Result<u64> {
        operations::delete_exercise_template(&self.pool, exercise_id).await
    }
}
