//! Rolling performance statistics over historical session and set data.
//!
//! Everything here is read-only. Timestamps are stored in UTC; conversion to
//! the caller's local calendar happens in this module and nowhere else. The
//! temporal logic lives in pure functions so it can be tested without a clock
//! or a database.

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::Result;
use chrono::{DateTime, Datelike, Days, Duration, Local, NaiveDate, NaiveTime, Utc};
use log::debug;
use sqlx::SqlitePool;

use crate::db::models::SessionDetail;
use crate::db::operations::{
    get_completed_session_starts, get_recent_completed_sessions, get_recent_logs_for_exercise,
    get_sessions_in_range, get_set_logs_since, resolve_session,
};

/// Trailing window, in weeks, used by the dashboard's volume chart.
pub const DEFAULT_WEEKS_BACK: u32 = 5;

/// How many recently completed sessions the dashboard carries.
const RECENT_SESSION_COUNT: i64 = 5;

/// Window size for the last-weights lookup. Ten logs is enough to cover one
/// session's worth of sets for a single exercise in practice; sets interleaved
/// with more than ten unrelated entries fall outside it.
const LAST_WEIGHTS_WINDOW: i64 = 10;

const ROLLING_WINDOW_DAYS: u64 = 30;

/// Rolling statistics for the dashboard, recomputed on every query.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    pub consecutive_day_streak: u32,
    pub weekly_volume: BTreeMap<NaiveDate, f64>,
    pub recent_sessions: Vec<SessionDetail>,
    pub workouts_this_month: usize,
    pub volume_this_month: f64,
    pub average_duration: Duration,
    pub favorite_routine_name: Option<String>,
    pub training_frequency: f64,
}

/// Monday-aligned start of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

/// Count of consecutive calendar days with at least one completed session,
/// anchored at `today` or yesterday. A chain that does not reach either of
/// those is worth 0; the walk stops at the first gap.
pub fn streak_from_dates(dates: &[NaiveDate], today: NaiveDate) -> u32 {
    let mut dates = dates.to_vec();
    dates.sort_unstable_by(|a, b| b.cmp(a));
    dates.dedup();

    let Some(&most_recent) = dates.first() else {
        return 0;
    };

    let mut expected = today;
    if most_recent != expected {
        expected = expected - Days::new(1);
        if most_recent != expected {
            return 0;
        }
    }

    let mut streak = 0;
    for date in dates {
        if date == expected {
            streak += 1;
            expected = expected - Days::new(1);
        } else if date < expected {
            break;
        }
    }
    streak
}

/// Sums per-set volume into Monday-keyed week buckets. Weeks without entries
/// are simply absent, never zero-filled.
pub fn bucket_weekly_volume(
    entries: impl IntoIterator<Item = (NaiveDate, f64)>,
) -> BTreeMap<NaiveDate, f64> {
    let mut buckets = BTreeMap::new();
    for (date, volume) in entries {
        *buckets.entry(week_start(date)).or_insert(0.0) += volume;
    }
    buckets
}

fn local_day_start(date: NaiveDate) -> Result<DateTime<Utc>> {
    date.and_time(NaiveTime::MIN)
        .and_local_timezone(Local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow::anyhow!("no valid local midnight on {}", date))
}

/// Most-sessions day name over a newest-first history. Grouping is stable, so
/// ties go to the name encountered first.
fn favorite_day_name(sessions: &[SessionDetail]) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for session in sessions {
        let Some(name) = session.day_name() else {
            continue;
        };
        match counts.iter_mut().find(|(n, _)| *n == name) {
            Some((_, count)) => *count += 1,
            None => counts.push((name, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (name, count) in counts {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((name, count)),
        }
    }
    best.map(|(name, _)| name.to_string())
}

/// Streak of consecutive local calendar days ending today or yesterday.
pub async fn consecutive_day_streak(pool: &SqlitePool) -> Result<u32> {
    let starts = get_completed_session_starts(pool).await?;
    if starts.is_empty() {
        return Ok(0);
    }
    let dates: Vec<NaiveDate> = starts
        .iter()
        .map(|start| start.with_timezone(&Local).date_naive())
        .collect();
    Ok(streak_from_dates(&dates, Local::now().date_naive()))
}

/// Per-week training volume over a trailing window of `weeks_back` weeks,
/// keyed by the Monday of each local week.
pub async fn weekly_volume(
    pool: &SqlitePool,
    weeks_back: u32,
) -> Result<BTreeMap<NaiveDate, f64>> {
    let cutoff = Utc::now() - Duration::days(i64::from(weeks_back) * 7);
    let logs = get_set_logs_since(pool, cutoff).await?;
    debug!("Bucketing {} set logs into weekly volume", logs.len());
    Ok(bucket_weekly_volume(logs.iter().map(|log| {
        (
            log.completed_at.with_timezone(&Local).date_naive(),
            log.volume(),
        )
    })))
}

/// Weights used the last time an exercise was performed, keyed by set number.
///
/// Looks at the newest [`LAST_WEIGHTS_WINDOW`] logs for the name and keeps
/// only those from the single most recent session among them. An
/// approximation rather than a guarantee: heavy interleaving with other
/// entries can push earlier sets of that session out of the window.
pub async fn last_weights_for_exercise(
    pool: &SqlitePool,
    exercise_name: &str,
) -> Result<HashMap<i64, f64>> {
    let recent = get_recent_logs_for_exercise(pool, exercise_name, LAST_WEIGHTS_WINDOW).await?;
    let Some(most_recent) = recent.first() else {
        return Ok(HashMap::new());
    };
    let session_id = most_recent.session_id;
    Ok(recent
        .iter()
        .filter(|log| log.session_id == session_id)
        .map(|log| (log.set_number, log.weight_used))
        .collect())
}

/// Computes the full dashboard over a rolling 30-day local window.
pub async fn dashboard_stats(pool: &SqlitePool) -> Result<DashboardStats> {
    let consecutive_day_streak = consecutive_day_streak(pool).await?;
    let weekly_volume = weekly_volume(pool, DEFAULT_WEEKS_BACK).await?;

    let mut recent_sessions = Vec::new();
    for session in get_recent_completed_sessions(pool, RECENT_SESSION_COUNT).await? {
        recent_sessions.push(resolve_session(pool, session).await?);
    }

    // [today - 30d, today + 1d) in local time, translated to UTC bounds for
    // the inclusive range query.
    let today = Local::now().date_naive();
    let from = local_day_start(today - Days::new(ROLLING_WINDOW_DAYS))?;
    let to = local_day_start(today + Days::new(1))? - Duration::milliseconds(1);

    let mut sessions = Vec::new();
    for session in get_sessions_in_range(pool, from, to).await? {
        sessions.push(resolve_session(pool, session).await?);
    }

    // Every session started in the window counts, and its volume counts even
    // if it was never formally ended.
    let workouts_this_month = sessions.len();
    let volume_this_month = sessions.iter().map(SessionDetail::total_volume).sum();

    // Duration is only meaningful for sessions that have ended.
    let durations: Vec<i64> = sessions
        .iter()
        .filter_map(|detail| detail.session.duration())
        .map(|duration| duration.num_seconds())
        .collect();
    let average_duration = if durations.is_empty() {
        Duration::zero()
    } else {
        Duration::seconds(durations.iter().sum::<i64>() / durations.len() as i64)
    };

    let favorite_routine_name = favorite_day_name(&sessions);

    let distinct_days: HashSet<NaiveDate> = sessions
        .iter()
        .map(|detail| detail.session.start_time.with_timezone(&Local).date_naive())
        .collect();
    let training_frequency = distinct_days.len() as f64 / ROLLING_WINDOW_DAYS as f64 * 100.0;

    Ok(DashboardStats {
        consecutive_day_streak,
        weekly_volume,
        recent_sessions,
        workouts_this_month,
        volume_this_month,
        average_duration,
        favorite_routine_name,
        training_frequency,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::db::models::{
        NewRoutine, NewRoutineDay, RoutineDay, SetLog, WorkoutSession,
    };
    use crate::db::operations::{
        add_routine_day, create_routine, insert_session, insert_set_log, set_session_end_time,
    };
    use crate::db::testing::memory_pool;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    // today, yesterday, then a gap on day -2: streak stops at 2
    #[case(vec![date(2024, 6, 15), date(2024, 6, 14), date(2024, 6, 12)], 2)]
    #[case(vec![], 0)]
    // most recent activity two days ago never anchors
    #[case(vec![date(2024, 6, 13)], 0)]
    #[case(vec![date(2024, 6, 15)], 1)]
    // chain ending yesterday still counts
    #[case(vec![date(2024, 6, 14), date(2024, 6, 13)], 2)]
    // duplicate days collapse
    #[case(vec![date(2024, 6, 15), date(2024, 6, 15), date(2024, 6, 14)], 2)]
    #[case(vec![date(2024, 6, 15), date(2024, 6, 14), date(2024, 6, 13), date(2024, 6, 12)], 4)]
    fn streak_cases(#[case] dates: Vec<NaiveDate>, #[case] expected: u32) {
        assert_eq!(streak_from_dates(&dates, date(2024, 6, 15)), expected);
    }

    #[rstest]
    #[case(date(2024, 1, 3), date(2024, 1, 1))] // Wednesday
    #[case(date(2024, 1, 1), date(2024, 1, 1))] // Monday maps to itself
    #[case(date(2024, 1, 7), date(2024, 1, 1))] // Sunday belongs to the past Monday
    fn week_start_is_monday_aligned(#[case] input: NaiveDate, #[case] expected: NaiveDate) {
        assert_eq!(week_start(input), expected);
    }

    #[test]
    fn weekly_buckets_sum_within_a_week() {
        let wednesday = date(2024, 1, 3);
        let friday = date(2024, 1, 5);
        let next_tuesday = date(2024, 1, 9);

        let buckets =
            bucket_weekly_volume([(wednesday, 1000.0), (friday, 500.0), (next_tuesday, 200.0)]);
        assert_eq!(
            buckets,
            BTreeMap::from([(date(2024, 1, 1), 1500.0), (date(2024, 1, 8), 200.0)])
        );
    }

    #[test]
    fn empty_weeks_are_absent_not_zero() {
        assert_eq!(bucket_weekly_volume([]), BTreeMap::new());
    }

    fn detail(day_name: Option<&str>, start: DateTime<Utc>) -> SessionDetail {
        SessionDetail {
            session: WorkoutSession {
                id: 0,
                routine_day_id: day_name.map(|_| 1),
                start_time: start,
                end_time: None,
                notes: None,
            },
            day: day_name.map(|name| RoutineDay {
                id: 1,
                routine_id: 1,
                name: name.to_string(),
                sort_order: 0,
            }),
            exercises: Vec::new(),
            set_logs: Vec::new(),
        }
    }

    #[test]
    fn favorite_day_prefers_highest_count() {
        let now = Utc::now();
        let sessions = vec![
            detail(Some("Push"), now),
            detail(Some("Pull"), now),
            detail(Some("Pull"), now),
        ];
        assert_eq!(favorite_day_name(&sessions), Some(String::from("Pull")));
    }

    #[test]
    fn favorite_day_tie_goes_to_first_encountered() {
        let now = Utc::now();
        let sessions = vec![
            detail(Some("Push"), now),
            detail(Some("Pull"), now),
            detail(Some("Push"), now),
            detail(Some("Pull"), now),
        ];
        assert_eq!(favorite_day_name(&sessions), Some(String::from("Push")));
    }

    #[test]
    fn favorite_day_ignores_orphaned_sessions() {
        assert_eq!(favorite_day_name(&[detail(None, Utc::now())]), None);
    }

    async fn seed_day(pool: &SqlitePool, routine_name: &str, day_name: &str) -> RoutineDay {
        let routine = create_routine(
            pool,
            &NewRoutine {
                name: routine_name.to_string(),
                description: None,
            },
        )
        .await
        .unwrap();
        add_routine_day(
            pool,
            &NewRoutineDay {
                routine_id: routine.id,
                name: day_name.to_string(),
                sort_order: 0,
            },
        )
        .await
        .unwrap()
    }

    async fn completed_session(
        pool: &SqlitePool,
        day_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> WorkoutSession {
        let session = insert_session(pool, day_id, start).await.unwrap();
        set_session_end_time(pool, session.id, end)
            .await
            .unwrap()
            .unwrap()
    }

    async fn log_set(
        pool: &SqlitePool,
        session_id: i64,
        name: &str,
        set_number: i64,
        reps: i64,
        weight: f64,
        completed_at: DateTime<Utc>,
    ) -> SetLog {
        insert_set_log(pool, session_id, name, set_number, reps, weight, completed_at)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn streak_is_zero_without_completed_sessions() {
        let pool = memory_pool().await;
        assert_eq!(consecutive_day_streak(&pool).await.unwrap(), 0);

        // An active session alone does not count either.
        let day = seed_day(&pool, "Full Body", "Day 1").await;
        insert_session(&pool, day.id, Utc::now()).await.unwrap();
        assert_eq!(consecutive_day_streak(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn streak_counts_back_from_recent_days() {
        let pool = memory_pool().await;
        let day = seed_day(&pool, "Full Body", "Day 1").await;

        let now = Utc::now();
        // Sessions today, yesterday and three days ago; the gap at -2 ends
        // the chain.
        for days_ago in [0i64, 1, 3] {
            let start = now - Duration::days(days_ago);
            completed_session(&pool, day.id, start, start + Duration::minutes(45)).await;
        }
        assert_eq!(consecutive_day_streak(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn weekly_volume_groups_by_local_week() {
        let pool = memory_pool().await;
        let day = seed_day(&pool, "Full Body", "Day 1").await;
        let session = insert_session(&pool, day.id, Utc::now()).await.unwrap();

        let now = Utc::now();
        log_set(&pool, session.id, "Squat", 1, 10, 100.0, now).await;
        log_set(&pool, session.id, "Squat", 2, 5, 100.0, now).await;

        let buckets = weekly_volume(&pool, DEFAULT_WEEKS_BACK).await.unwrap();
        let this_week = week_start(now.with_timezone(&Local).date_naive());
        assert_eq!(buckets, BTreeMap::from([(this_week, 1500.0)]));
    }

    #[tokio::test]
    async fn weekly_volume_ignores_logs_outside_the_window() {
        let pool = memory_pool().await;
        let day = seed_day(&pool, "Full Body", "Day 1").await;
        let session = insert_session(&pool, day.id, Utc::now()).await.unwrap();

        let stale = Utc::now() - Duration::days(6 * 7);
        log_set(&pool, session.id, "Squat", 1, 10, 100.0, stale).await;

        let buckets = weekly_volume(&pool, DEFAULT_WEEKS_BACK).await.unwrap();
        assert_eq!(buckets, BTreeMap::new());
    }

    #[tokio::test]
    async fn last_weights_is_empty_for_unknown_exercise() {
        let pool = memory_pool().await;
        assert_eq!(
            last_weights_for_exercise(&pool, "Zercher Squat")
                .await
                .unwrap(),
            HashMap::new()
        );
    }

    #[tokio::test]
    async fn last_weights_come_from_the_most_recent_session_only() {
        let pool = memory_pool().await;
        let day = seed_day(&pool, "Full Body", "Day 1").await;
        let now = Utc::now();

        let older = completed_session(
            &pool,
            day.id,
            now - Duration::days(7),
            now - Duration::days(7) + Duration::minutes(40),
        )
        .await;
        for (set_number, weight) in [(1, 95.0), (2, 100.0)] {
            log_set(
                &pool,
                older.id,
                "Bench Press",
                set_number,
                10,
                weight,
                now - Duration::days(7),
            )
            .await;
        }

        let newer =
            completed_session(&pool, day.id, now - Duration::days(1), now - Duration::hours(23))
                .await;
        for (set_number, weight) in [(1, 105.0), (2, 110.0), (3, 115.0)] {
            log_set(
                &pool,
                newer.id,
                "Bench Press",
                set_number,
                8,
                weight,
                now - Duration::days(1),
            )
            .await;
        }

        let weights = last_weights_for_exercise(&pool, "Bench Press").await.unwrap();
        assert_eq!(
            weights,
            HashMap::from([(1, 105.0), (2, 110.0), (3, 115.0)])
        );
    }

    #[tokio::test]
    async fn last_weights_window_caps_at_ten_sets() {
        // Known limitation of the fixed ten-log window: sets of the most
        // recent session that fall outside it are silently dropped.
        let pool = memory_pool().await;
        let day = seed_day(&pool, "Full Body", "Day 1").await;
        let now = Utc::now();
        let session = insert_session(&pool, day.id, now).await.unwrap();

        for set_number in 1..=12i64 {
            log_set(
                &pool,
                session.id,
                "Curl",
                set_number,
                10,
                30.0,
                now + Duration::seconds(set_number),
            )
            .await;
        }

        let weights = last_weights_for_exercise(&pool, "Curl").await.unwrap();
        assert_eq!(weights.len(), 10);
        assert!(!weights.contains_key(&1));
        assert!(!weights.contains_key(&2));
    }

    #[tokio::test]
    async fn dashboard_stats_over_a_mixed_window() {
        let pool = memory_pool().await;
        let push = seed_day(&pool, "Push Pull Legs", "Push").await;
        let pull = seed_day(&pool, "Bro Split", "Pull").await;
        let now = Utc::now();

        // Two completed push sessions of 60 and 30 minutes, one still-active
        // pull session with logged volume.
        let first = completed_session(
            &pool,
            push.id,
            now - Duration::hours(3),
            now - Duration::hours(2),
        )
        .await;
        log_set(&pool, first.id, "Bench Press", 1, 10, 100.0, now - Duration::hours(3)).await;

        completed_session(
            &pool,
            push.id,
            now - Duration::days(2),
            now - Duration::days(2) + Duration::minutes(30),
        )
        .await;

        let active = insert_session(&pool, pull.id, now - Duration::minutes(20))
            .await
            .unwrap();
        log_set(&pool, active.id, "Row", 1, 10, 50.0, now - Duration::minutes(10)).await;

        let stats = dashboard_stats(&pool).await.unwrap();
        assert_eq!(stats.workouts_this_month, 3);
        assert_eq!(stats.volume_this_month, 1500.0);
        assert_eq!(stats.average_duration, Duration::minutes(45));
        assert_eq!(stats.favorite_routine_name, Some(String::from("Push")));
        assert!(stats.training_frequency > 0.0);
        assert_eq!(stats.recent_sessions.len(), 2);
    }

    #[tokio::test]
    async fn dashboard_duration_is_zero_when_nothing_ended() {
        let pool = memory_pool().await;
        let day = seed_day(&pool, "Full Body", "Day 1").await;
        insert_session(&pool, day.id, Utc::now()).await.unwrap();

        let stats = dashboard_stats(&pool).await.unwrap();
        assert_eq!(stats.average_duration, Duration::zero());
        assert_eq!(stats.workouts_this_month, 1);
        assert_eq!(stats.consecutive_day_streak, 0);
    }
}
