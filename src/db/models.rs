use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A named training program made up of ordered days.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Routine {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRoutine {
    pub name: String,
    pub description: Option<String>,
}

/// A single training day within a routine (e.g. "Push", "Leg Day").
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RoutineDay {
    pub id: i64,
    pub routine_id: i64,
    pub name: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone)]
pub struct NewRoutineDay {
    pub routine_id: i64,
    pub name: String,
    pub sort_order: i64,
}

/// Planned exercise within a routine day. `target_config` encodes per-set rep
/// goals as a hyphen-delimited list ("15-12-10-8" = 4 sets); `target_weights`
/// follows the same convention in pounds.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExerciseTemplate {
    pub id: i64,
    pub routine_day_id: i64,
    pub name: String,
    pub target_config: String,
    pub target_weights: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone)]
pub struct NewExerciseTemplate {
    pub routine_day_id: i64,
    pub name: String,
    pub target_config: String,
    pub target_weights: String,
    pub sort_order: i64,
}

impl ExerciseTemplate {
    /// Per-set rep targets. Empty tokens are skipped; non-numeric tokens
    /// degrade to 0 so legacy data never hard-fails on display.
    pub fn target_reps(&self) -> Vec<i64> {
        parse_target_tokens(&self.target_config)
    }

    /// Per-set weight targets in pounds, same token convention as reps.
    pub fn parsed_target_weights(&self) -> Vec<f64> {
        split_tokens(&self.target_weights)
            .map(|t| t.parse::<f64>().unwrap_or(0.0))
            .collect()
    }

    /// Number of planned sets, derived from the rep targets.
    pub fn set_count(&self) -> usize {
        self.target_reps().len()
    }
}

fn split_tokens(config: &str) -> impl Iterator<Item = &str> {
    config
        .split('-')
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn parse_target_tokens(config: &str) -> Vec<i64> {
    split_tokens(config)
        .map(|t| t.parse::<i64>().unwrap_or(0))
        .collect()
}

/// A live or historical workout. A missing `end_time` is what makes a session
/// active; there is no separate status flag to drift out of sync.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkoutSession {
    pub id: i64,
    pub routine_day_id: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl WorkoutSession {
    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }

    /// Elapsed time of the session, defined only once it has ended.
    pub fn duration(&self) -> Option<Duration> {
        self.end_time.map(|end| end - self.start_time)
    }
}

/// One completed set. The exercise name is a denormalized string copy so
/// historical reports survive template renames and deletions.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SetLog {
    pub id: i64,
    pub session_id: i64,
    pub exercise_name: String,
    pub set_number: i64,
    pub reps_performed: i64,
    pub weight_used: f64,
    pub completed_at: DateTime<Utc>,
}

impl SetLog {
    pub fn volume(&self) -> f64 {
        self.reps_performed as f64 * self.weight_used
    }
}

/// Caller-supplied set data for [`crate::session::SessionManager::save_set`].
/// `id == None` inserts a fresh log; `id == Some` updates reps and weight on
/// the existing one.
#[derive(Debug, Clone)]
pub struct SetEntry {
    pub id: Option<i64>,
    pub session_id: i64,
    pub exercise_name: String,
    pub set_number: i64,
    pub reps_performed: i64,
    pub weight_used: f64,
}

/// A routine with its days and their exercise templates fully resolved.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RoutineWithDays {
    pub routine: Routine,
    pub days: Vec<DayWithExercises>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DayWithExercises {
    pub day: RoutineDay,
    pub exercises: Vec<ExerciseTemplate>,
}

/// A session with its children eagerly resolved: the routine day (if it still
/// exists), the day's templates ordered by sort order, and the set logs
/// ordered by (exercise name, set number).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionDetail {
    pub session: WorkoutSession,
    pub day: Option<RoutineDay>,
    pub exercises: Vec<ExerciseTemplate>,
    pub set_logs: Vec<SetLog>,
}

impl SessionDetail {
    /// Sum of reps x weight over every logged set.
    pub fn total_volume(&self) -> f64 {
        self.set_logs.iter().map(SetLog::volume).sum()
    }

    pub fn day_name(&self) -> Option<&str> {
        self.day.as_ref().map(|d| d.name.as_str())
    }
}
