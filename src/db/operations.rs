//! Storage surface for the workout core. Every SQL statement lives here;
//! callers get back fully resolved values and never trigger I/O themselves.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::db::models::{
    DayWithExercises, ExerciseTemplate, NewExerciseTemplate, NewRoutine, NewRoutineDay, Routine,
    RoutineDay, RoutineWithDays, SessionDetail, SetLog, WorkoutSession,
};

const MAX_NAME_LEN: usize = 100;

fn validate_routine_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("routine name must not be empty");
    }
    if name.len() > MAX_NAME_LEN {
        bail!("routine name must be at most {} characters", MAX_NAME_LEN);
    }
    Ok(())
}

// Routines

pub async fn create_routine(pool: &SqlitePool, routine: &NewRoutine) -> Result<Routine> {
    validate_routine_name(&routine.name)?;
    sqlx::query_as::<_, Routine>(
        "INSERT INTO routines (name, description, created_at) VALUES (?1, ?2, ?3) RETURNING *",
    )
    .bind(&routine.name)
    .bind(&routine.description)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

pub async fn update_routine(pool: &SqlitePool, routine: &Routine) -> Result<Option<Routine>> {
    validate_routine_name(&routine.name)?;
    sqlx::query_as::<_, Routine>(
        "UPDATE routines SET name = ?1, description = ?2 WHERE id = ?3 RETURNING *",
    )
    .bind(&routine.name)
    .bind(&routine.description)
    .bind(routine.id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

/// Deletes a routine; days and templates go with it via the schema cascades.
/// Historical sessions keep existing with their day reference cleared.
pub async fn delete_routine(pool: &SqlitePool, routine_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM routines WHERE id = ?1")
        .bind(routine_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn get_routine(pool: &SqlitePool, routine_id: i64) -> Result<Option<RoutineWithDays>> {
    let routine = sqlx::query_as::<_, Routine>("SELECT * FROM routines WHERE id = ?1")
        .bind(routine_id)
        .fetch_optional(pool)
        .await?;
    match routine {
        Some(routine) => Ok(Some(resolve_routine(pool, routine).await?)),
        None => Ok(None),
    }
}

pub async fn get_routines(pool: &SqlitePool) -> Result<Vec<RoutineWithDays>> {
    let routines = sqlx::query_as::<_, Routine>("SELECT * FROM routines ORDER BY name")
        .fetch_all(pool)
        .await?;
    let mut resolved = Vec::with_capacity(routines.len());
    for routine in routines {
        resolved.push(resolve_routine(pool, routine).await?);
    }
    Ok(resolved)
}

async fn resolve_routine(pool: &SqlitePool, routine: Routine) -> Result<RoutineWithDays> {
    let days = sqlx::query_as::<_, RoutineDay>(
        "SELECT * FROM routine_days WHERE routine_id = ?1 ORDER BY sort_order",
    )
    .bind(routine.id)
    .fetch_all(pool)
    .await?;

    let mut resolved_days = Vec::with_capacity(days.len());
    for day in days {
        let exercises = get_exercises_for_day(pool, day.id).await?;
        resolved_days.push(DayWithExercises { day, exercises });
    }
    Ok(RoutineWithDays {
        routine,
        days: resolved_days,
    })
}

// Routine days

pub async fn add_routine_day(pool: &SqlitePool, day: &NewRoutineDay) -> Result<RoutineDay> {
    sqlx::query_as::<_, RoutineDay>(
        "INSERT INTO routine_days (routine_id, name, sort_order) VALUES (?1, ?2, ?3) RETURNING *",
    )
    .bind(day.routine_id)
    .bind(&day.name)
    .bind(day.sort_order)
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

pub async fn update_routine_day(pool: &SqlitePool, day: &RoutineDay) -> Result<Option<RoutineDay>> {
    sqlx::query_as::<_, RoutineDay>(
        "UPDATE routine_days SET name = ?1, sort_order = ?2 WHERE id = ?3 RETURNING *",
    )
    .bind(&day.name)
    .bind(day.sort_order)
    .bind(day.id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

pub async fn delete_routine_day(pool: &SqlitePool, day_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM routine_days WHERE id = ?1")
        .bind(day_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn get_routine_day(pool: &SqlitePool, day_id: i64) -> Result<Option<DayWithExercises>> {
    let day = sqlx::query_as::<_, RoutineDay>("SELECT * FROM routine_days WHERE id = ?1")
        .bind(day_id)
        .fetch_optional(pool)
        .await?;
    match day {
        Some(day) => {
            let exercises = get_exercises_for_day(pool, day.id).await?;
            Ok(Some(DayWithExercises { day, exercises }))
        }
        None => Ok(None),
    }
}

// Exercise templates

pub async fn add_exercise_template(
    pool: &SqlitePool,
    exercise: &NewExerciseTemplate,
) -> Result<ExerciseTemplate> {
    sqlx::query_as::<_, ExerciseTemplate>(
        "INSERT INTO exercise_templates (routine_day_id, name, target_config, target_weights, sort_order)
         VALUES (?1, ?2, ?3, ?4, ?5) RETURNING *",
    )
    .bind(exercise.routine_day_id)
    .bind(&exercise.name)
    .bind(&exercise.target_config)
    .bind(&exercise.target_weights)
    .bind(exercise.sort_order)
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

pub async fn update_exercise_template(
    pool: &SqlitePool,
    exercise: &ExerciseTemplate,
) -> Result<Option<ExerciseTemplate>> {
    sqlx::query_as::<_, ExerciseTemplate>(
        "UPDATE exercise_templates
         SET name = ?1, target_config = ?2, target_weights = ?3, sort_order = ?4
         WHERE id = ?5 RETURNING *",
    )
    .bind(&exercise.name)
    .bind(&exercise.target_config)
    .bind(&exercise.target_weights)
    .bind(exercise.sort_order)
    .bind(exercise.id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

pub async fn delete_exercise_template(pool: &SqlitePool, exercise_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM exercise_templates WHERE id = ?1")
        .bind(exercise_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

async fn get_exercises_for_day(pool: &SqlitePool, day_id: i64) -> Result<Vec<ExerciseTemplate>> {
    sqlx::query_as::<_, ExerciseTemplate>(
        "SELECT * FROM exercise_templates WHERE routine_day_id = ?1 ORDER BY sort_order",
    )
    .bind(day_id)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

// Workout sessions

pub async fn insert_session(
    pool: &SqlitePool,
    routine_day_id: i64,
    start_time: DateTime<Utc>,
) -> Result<WorkoutSession> {
    sqlx::query_as::<_, WorkoutSession>(
        "INSERT INTO workout_sessions (routine_day_id, start_time) VALUES (?1, ?2) RETURNING *",
    )
    .bind(routine_day_id)
    .bind(start_time)
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

pub async fn get_session(pool: &SqlitePool, session_id: i64) -> Result<Option<WorkoutSession>> {
    sqlx::query_as::<_, WorkoutSession>("SELECT * FROM workout_sessions WHERE id = ?1")
        .bind(session_id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
}

pub async fn find_active_session(pool: &SqlitePool) -> Result<Option<WorkoutSession>> {
    sqlx::query_as::<_, WorkoutSession>(
        "SELECT * FROM workout_sessions WHERE end_time IS NULL LIMIT 1",
    )
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

pub async fn active_session_exists(pool: &SqlitePool) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM workout_sessions WHERE end_time IS NULL")
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

/// Stamps an end time onto every session that is still open. Returns how many
/// were closed; normally 0 or 1.
pub async fn end_active_sessions(pool: &SqlitePool, end_time: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("UPDATE workout_sessions SET end_time = ?1 WHERE end_time IS NULL")
        .bind(end_time)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn set_session_end_time(
    pool: &SqlitePool,
    session_id: i64,
    end_time: DateTime<Utc>,
) -> Result<Option<WorkoutSession>> {
    sqlx::query_as::<_, WorkoutSession>(
        "UPDATE workout_sessions SET end_time = ?1 WHERE id = ?2 RETURNING *",
    )
    .bind(end_time)
    .bind(session_id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

/// Hard delete of a session and its logs. The explicit log delete keeps the
/// behavior independent of the foreign_keys pragma.
pub async fn delete_session(pool: &SqlitePool, session_id: i64) -> Result<u64> {
    sqlx::query("DELETE FROM set_logs WHERE session_id = ?1")
        .bind(session_id)
        .execute(pool)
        .await?;
    let result = sqlx::query("DELETE FROM workout_sessions WHERE id = ?1")
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Sessions whose start time falls within [from, to], newest first.
pub async fn get_sessions_in_range(
    pool: &SqlitePool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<WorkoutSession>> {
    sqlx::query_as::<_, WorkoutSession>(
        "SELECT * FROM workout_sessions
         WHERE start_time >= ?1 AND start_time <= ?2
         ORDER BY start_time DESC",
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn get_recent_completed_sessions(
    pool: &SqlitePool,
    limit: i64,
) -> Result<Vec<WorkoutSession>> {
    sqlx::query_as::<_, WorkoutSession>(
        "SELECT * FROM workout_sessions
         WHERE end_time IS NOT NULL
         ORDER BY start_time DESC
         LIMIT ?1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

/// Start times of completed sessions, newest first. Feeds the streak
/// computation, which only needs dates.
pub async fn get_completed_session_starts(pool: &SqlitePool) -> Result<Vec<DateTime<Utc>>> {
    sqlx::query_scalar(
        "SELECT start_time FROM workout_sessions
         WHERE end_time IS NOT NULL
         ORDER BY start_time DESC",
    )
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

/// Resolves a session's children: routine day (when it still exists), its
/// templates in sort order, and the session's logs.
pub async fn resolve_session(pool: &SqlitePool, session: WorkoutSession) -> Result<SessionDetail> {
    let day = match session.routine_day_id {
        Some(day_id) => {
            sqlx::query_as::<_, RoutineDay>("SELECT * FROM routine_days WHERE id = ?1")
                .bind(day_id)
                .fetch_optional(pool)
                .await?
        }
        None => None,
    };
    let exercises = match &day {
        Some(day) => get_exercises_for_day(pool, day.id).await?,
        None => Vec::new(),
    };
    let set_logs = get_set_logs_for_session(pool, session.id).await?;
    Ok(SessionDetail {
        session,
        day,
        exercises,
        set_logs,
    })
}

// Set logs

pub async fn insert_set_log(
    pool: &SqlitePool,
    session_id: i64,
    exercise_name: &str,
    set_number: i64,
    reps_performed: i64,
    weight_used: f64,
    completed_at: DateTime<Utc>,
) -> Result<SetLog> {
    sqlx::query_as::<_, SetLog>(
        "INSERT INTO set_logs (session_id, exercise_name, set_number, reps_performed, weight_used, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING *",
    )
    .bind(session_id)
    .bind(exercise_name)
    .bind(set_number)
    .bind(reps_performed)
    .bind(weight_used)
    .bind(completed_at)
    .fetch_one(pool)
    .await
    .map_err(Into::into)
}

/// Updates only the performed reps and weight; identity, position and the
/// original completion timestamp stay untouched.
pub async fn update_set_log_result(
    pool: &SqlitePool,
    set_log_id: i64,
    reps_performed: i64,
    weight_used: f64,
) -> Result<Option<SetLog>> {
    sqlx::query_as::<_, SetLog>(
        "UPDATE set_logs SET reps_performed = ?1, weight_used = ?2 WHERE id = ?3 RETURNING *",
    )
    .bind(reps_performed)
    .bind(weight_used)
    .bind(set_log_id)
    .fetch_optional(pool)
    .await
    .map_err(Into::into)
}

pub async fn delete_set_log(pool: &SqlitePool, set_log_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM set_logs WHERE id = ?1")
        .bind(set_log_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn get_set_logs_for_session(pool: &SqlitePool, session_id: i64) -> Result<Vec<SetLog>> {
    sqlx::query_as::<_, SetLog>(
        "SELECT * FROM set_logs WHERE session_id = ?1 ORDER BY exercise_name, set_number",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn get_exercise_logs(
    pool: &SqlitePool,
    session_id: i64,
    exercise_name: &str,
) -> Result<Vec<SetLog>> {
    sqlx::query_as::<_, SetLog>(
        "SELECT * FROM set_logs
         WHERE session_id = ?1 AND exercise_name = ?2
         ORDER BY set_number",
    )
    .bind(session_id)
    .bind(exercise_name)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

/// Newest logs for an exercise across all sessions, limited.
pub async fn get_recent_logs_for_exercise(
    pool: &SqlitePool,
    exercise_name: &str,
    limit: i64,
) -> Result<Vec<SetLog>> {
    sqlx::query_as::<_, SetLog>(
        "SELECT * FROM set_logs
         WHERE exercise_name = ?1
         ORDER BY completed_at DESC
         LIMIT ?2",
    )
    .bind(exercise_name)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(Into::into)
}

pub async fn get_set_logs_since(pool: &SqlitePool, cutoff: DateTime<Utc>) -> Result<Vec<SetLog>> {
    sqlx::query_as::<_, SetLog>("SELECT * FROM set_logs WHERE completed_at >= ?1")
        .bind(cutoff)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
}
