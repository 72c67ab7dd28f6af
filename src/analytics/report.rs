use crate::db::activities::{FocusSessionRow, TaskRow};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub const CHART_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub tasks_completed: u64,
    pub focus_minutes: u64,
    pub xp_earned: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BurnoutRisk {
    pub risk_level: RiskLevel,
    pub message: &'static str,
}

fn day_of(timestamp: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(|moment| moment.date_naive())
}

/// One entry per day ending at `today`, oldest first. Days without activity
/// are present with zeros.
pub fn build_daily_series(
    today: NaiveDate,
    days: i64,
    tasks: &[TaskRow],
    focus: &[FocusSessionRow],
) -> Vec<DaySummary> {
    let task_totals = tasks
        .iter()
        .filter_map(|task| {
            let day = task.completed_at.and_then(day_of)?;
            Some((day, task.xp_reward.max(0) as u64))
        })
        .fold(HashMap::new(), |mut acc, (day, xp)| {
            let entry = acc.entry(day).or_insert((0_u64, 0_u64));
            entry.0 += 1;
            entry.1 += xp;
            acc
        });

    let focus_totals = focus
        .iter()
        .filter_map(|session| {
            let day = day_of(session.started_at)?;
            Some((day, session.duration_minutes.max(0) as u64, session.xp_earned.max(0) as u64))
        })
        .fold(HashMap::new(), |mut acc, (day, minutes, xp)| {
            let entry = acc.entry(day).or_insert((0_u64, 0_u64));
            entry.0 += minutes;
            entry.1 += xp;
            acc
        });

    (0..days.max(1))
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            let (tasks_completed, task_xp) = task_totals.get(&date).copied().unwrap_or_default();
            let (focus_minutes, focus_xp) = focus_totals.get(&date).copied().unwrap_or_default();
            DaySummary {
                date,
                tasks_completed,
                focus_minutes,
                xp_earned: task_xp + focus_xp,
            }
        })
        .collect()
}

pub fn burnout_risk(focus_minutes: u64, tasks_completed: u64) -> BurnoutRisk {
    let risk_level = if focus_minutes > 8 * 60 && tasks_completed > 20 {
        RiskLevel::High
    } else if focus_minutes > 5 * 60 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    let message = match risk_level {
        RiskLevel::Low => "You are pacing well. Keep consistency.",
        RiskLevel::Medium => "High output detected. Schedule recovery blocks.",
        RiskLevel::High => "Burnout risk is high. Reduce load and prioritize sleep.",
    };

    BurnoutRisk {
        risk_level,
        message,
    }
}

pub fn skill_breakdown(counts: Vec<(String, i64)>) -> BTreeMap<String, u64> {
    counts
        .into_iter()
        .map(|(skill_tree, count)| (skill_tree, count.max(0) as u64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{RiskLevel, build_daily_series, burnout_risk};
    use crate::db::activities::{FocusSessionRow, TaskRow};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn ts(day: u32, hour: u32) -> i64 {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0)
            .single()
            .expect("valid timestamp")
            .timestamp()
    }

    fn task(completed_at: i64, xp_reward: i64) -> TaskRow {
        TaskRow {
            id: format!("t{completed_at}"),
            user_id: "u".to_string(),
            title: "t".to_string(),
            description: String::new(),
            skill_tree: "Mind".to_string(),
            difficulty: 1,
            estimated_minutes: 10,
            xp_reward,
            completed: true,
            completed_at: Some(completed_at),
            created_at: completed_at,
        }
    }

    fn focus(started_at: i64, minutes: i64) -> FocusSessionRow {
        FocusSessionRow {
            id: format!("f{started_at}"),
            user_id: "u".to_string(),
            task_id: None,
            duration_minutes: minutes,
            completed: true,
            xp_earned: minutes * 2,
            started_at,
            completed_at: Some(started_at + minutes * 60),
        }
    }

    #[test]
    fn series_covers_every_day_oldest_first() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).expect("valid date");
        let tasks = vec![task(ts(10, 9), 40), task(ts(10, 15), 20), task(ts(8, 9), 35)];
        let sessions = vec![focus(ts(9, 10), 25)];

        let series = build_daily_series(today, 7, &tasks, &sessions);

        assert_eq!(series.len(), 7);
        assert_eq!(series[0].date, NaiveDate::from_ymd_opt(2026, 3, 4).expect("valid date"));
        assert_eq!(series[6].date, today);
        assert_eq!(series[6].tasks_completed, 2);
        assert_eq!(series[6].xp_earned, 60);
        assert_eq!(series[5].focus_minutes, 25);
        assert_eq!(series[5].xp_earned, 50);
        assert_eq!(series[4].tasks_completed, 1);
        assert_eq!(series[0].tasks_completed, 0);
    }

    #[test]
    fn burnout_heuristic_thresholds() {
        assert_eq!(burnout_risk(100, 50).risk_level, RiskLevel::Low);
        assert_eq!(burnout_risk(301, 5).risk_level, RiskLevel::Medium);
        assert_eq!(burnout_risk(481, 20).risk_level, RiskLevel::Medium);
        assert_eq!(burnout_risk(481, 21).risk_level, RiskLevel::High);
    }
}
