pub mod report;

use crate::analytics::report::{BurnoutRisk, CHART_DAYS, DaySummary};
use crate::db::UserRow;
use crate::db::activities;
use crate::engine::Engine;
use crate::engine::curve::LevelProgress;
use crate::error::TrackerResult;
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

pub const DEFAULT_WINDOW_DAYS: i64 = 30;
pub const MAX_WINDOW_DAYS: i64 = 365;

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub window_days: i64,
    pub total_tasks: i64,
    pub pending_tasks: i64,
    pub tasks_in_window: u64,
    pub focus_minutes_in_window: u64,
    pub variant: &'static str,
    pub level: u32,
    pub total_xp: u64,
    pub progress: LevelProgress,
    pub current_streak: i64,
    pub longest_streak: i64,
    pub discipline_score: i64,
    pub skill_breakdown: BTreeMap<String, u64>,
    pub burnout_risk: BurnoutRisk,
    pub weekly: Vec<DaySummary>,
}

pub fn dashboard(
    conn: &Connection,
    engine: &Engine,
    user: &UserRow,
    window_days: Option<i64>,
    now: DateTime<Utc>,
) -> TrackerResult<Dashboard> {
    let window_days = window_days
        .unwrap_or(DEFAULT_WINDOW_DAYS)
        .clamp(1, MAX_WINDOW_DAYS);
    let since = (now - Duration::days(window_days)).timestamp();

    let tasks = activities::completed_tasks_since(conn, &user.id, since)?;
    let focus = activities::completed_focus_since(conn, &user.id, since)?;

    let tasks_in_window = tasks.len() as u64;
    let focus_minutes_in_window = focus
        .iter()
        .map(|session| session.duration_minutes.max(0) as u64)
        .sum::<u64>();

    let standing = user.standing();

    Ok(Dashboard {
        window_days,
        total_tasks: activities::count_tasks(conn, &user.id, true)?,
        pending_tasks: activities::count_tasks(conn, &user.id, false)?,
        tasks_in_window,
        focus_minutes_in_window,
        variant: engine.variant().as_str(),
        level: standing.level,
        total_xp: standing.xp,
        progress: engine.progress(standing),
        current_streak: user.current_streak,
        longest_streak: user.longest_streak,
        discipline_score: user.discipline_score,
        skill_breakdown: report::skill_breakdown(activities::skill_tree_counts(conn, &user.id)?),
        burnout_risk: report::burnout_risk(focus_minutes_in_window, tasks_in_window),
        weekly: report::build_daily_series(now.date_naive(), CHART_DAYS, &tasks, &focus),
    })
}

pub fn weekly(
    conn: &Connection,
    user_id: &str,
    now: DateTime<Utc>,
) -> TrackerResult<Vec<DaySummary>> {
    let since = (now - Duration::days(CHART_DAYS)).timestamp();
    let tasks = activities::completed_tasks_since(conn, user_id, since)?;
    let focus = activities::completed_focus_since(conn, user_id, since)?;

    Ok(report::build_daily_series(now.date_naive(), CHART_DAYS, &tasks, &focus))
}
