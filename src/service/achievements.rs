use crate::db::{self, activities};
use crate::error::{TrackerError, TrackerResult};
use crate::service::require_user;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AchievementKind {
    Tasks,
    Streak,
    Level,
    Focus,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    /// Shown to the user only; unlocking does not grant XP.
    pub xp_reward: u64,
    pub threshold: i64,
    pub kind: AchievementKind,
}

pub const ACHIEVEMENTS: [Achievement; 10] = [
    Achievement {
        id: "first_task",
        name: "First Blood",
        description: "Complete your first task",
        icon: "Sword",
        xp_reward: 50,
        threshold: 1,
        kind: AchievementKind::Tasks,
    },
    Achievement {
        id: "task_10",
        name: "Warrior",
        description: "Complete 10 tasks",
        icon: "Shield",
        xp_reward: 100,
        threshold: 10,
        kind: AchievementKind::Tasks,
    },
    Achievement {
        id: "task_50",
        name: "Champion",
        description: "Complete 50 tasks",
        icon: "Trophy",
        xp_reward: 250,
        threshold: 50,
        kind: AchievementKind::Tasks,
    },
    Achievement {
        id: "task_100",
        name: "Legend",
        description: "Complete 100 tasks",
        icon: "Crown",
        xp_reward: 500,
        threshold: 100,
        kind: AchievementKind::Tasks,
    },
    Achievement {
        id: "streak_3",
        name: "Consistent",
        description: "Maintain a 3-day streak",
        icon: "Flame",
        xp_reward: 75,
        threshold: 3,
        kind: AchievementKind::Streak,
    },
    Achievement {
        id: "streak_7",
        name: "On Fire",
        description: "Maintain a 7-day streak",
        icon: "Zap",
        xp_reward: 150,
        threshold: 7,
        kind: AchievementKind::Streak,
    },
    Achievement {
        id: "streak_30",
        name: "Unstoppable",
        description: "Maintain a 30-day streak",
        icon: "Star",
        xp_reward: 500,
        threshold: 30,
        kind: AchievementKind::Streak,
    },
    Achievement {
        id: "level_5",
        name: "Rising Star",
        description: "Reach level 5",
        icon: "TrendingUp",
        xp_reward: 100,
        threshold: 5,
        kind: AchievementKind::Level,
    },
    Achievement {
        id: "level_10",
        name: "Elite",
        description: "Reach level 10",
        icon: "Award",
        xp_reward: 250,
        threshold: 10,
        kind: AchievementKind::Level,
    },
    Achievement {
        id: "focus_60",
        name: "Deep Work",
        description: "Complete a 60-minute focus session",
        icon: "Target",
        xp_reward: 100,
        threshold: 60,
        kind: AchievementKind::Focus,
    },
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total_tasks: i64,
    pub current_streak: i64,
    pub level: i64,
    pub longest_focus_minutes: i64,
}

impl Achievement {
    pub fn earned(&self, snapshot: &ProgressSnapshot) -> bool {
        let value = match self.kind {
            AchievementKind::Tasks => snapshot.total_tasks,
            AchievementKind::Streak => snapshot.current_streak,
            AchievementKind::Level => snapshot.level,
            AchievementKind::Focus => snapshot.longest_focus_minutes,
        };
        value >= self.threshold
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AchievementView {
    #[serde(flatten)]
    pub achievement: Achievement,
    pub unlocked: bool,
    pub unlocked_at: Option<i64>,
}

fn snapshot(conn: &Connection, user_id: &str) -> TrackerResult<ProgressSnapshot> {
    let user = require_user(conn, user_id)?;
    Ok(ProgressSnapshot {
        total_tasks: user.total_tasks_completed,
        current_streak: user.current_streak,
        level: user.level,
        longest_focus_minutes: activities::longest_completed_focus(conn, user_id)?,
    })
}

/// Records every achievement the user now qualifies for. Returns the ids that
/// were newly unlocked by this call.
pub fn unlock_earned(conn: &Connection, user_id: &str, now: i64) -> TrackerResult<Vec<String>> {
    let snapshot = snapshot(conn, user_id)?;

    ACHIEVEMENTS
        .iter()
        .filter(|achievement| achievement.earned(&snapshot))
        .filter_map(|achievement| {
            match db::unlock_achievement(conn, user_id, achievement.id, now) {
                Ok(true) => Some(Ok(achievement.id.to_string())),
                Ok(false) => None,
                Err(error) => Some(Err(TrackerError::from(error))),
            }
        })
        .collect()
}

pub fn list(conn: &Connection, user_id: &str) -> TrackerResult<Vec<AchievementView>> {
    let unlocked = db::unlocked_achievements(conn, user_id)?
        .into_iter()
        .collect::<HashMap<_, _>>();

    Ok(ACHIEVEMENTS
        .iter()
        .map(|achievement| {
            let unlocked_at = unlocked.get(achievement.id).copied();
            AchievementView {
                achievement: *achievement,
                unlocked: unlocked_at.is_some(),
                unlocked_at,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{ACHIEVEMENTS, ProgressSnapshot, list, unlock_earned};
    use crate::db::test_support::temp_database;
    use crate::service::test_support::register_user;

    #[test]
    fn thresholds_follow_snapshot_values() {
        let snapshot = ProgressSnapshot {
            total_tasks: 10,
            current_streak: 2,
            level: 5,
            longest_focus_minutes: 45,
        };

        let earned = ACHIEVEMENTS
            .iter()
            .filter(|achievement| achievement.earned(&snapshot))
            .map(|achievement| achievement.id)
            .collect::<Vec<_>>();

        assert_eq!(earned, vec!["first_task", "task_10", "level_5"]);
    }

    #[test]
    fn unlocking_is_recorded_once() {
        let (_dir, mut database) = temp_database();
        let session = register_user(&mut database, "cy@example.com");

        let first = unlock_earned(database.conn(), &session.user.id, 100).expect("unlock");
        let second = unlock_earned(database.conn(), &session.user.id, 200).expect("unlock");
        assert!(first.is_empty());
        assert!(second.is_empty());

        database
            .conn()
            .execute(
                "UPDATE users SET current_streak = 3 WHERE id = ?1",
                [&session.user.id],
            )
            .expect("bump streak");
        let unlocked = unlock_earned(database.conn(), &session.user.id, 300).expect("unlock");
        assert_eq!(unlocked, vec!["streak_3".to_string()]);

        let views = list(database.conn(), &session.user.id).expect("list achievements");
        assert_eq!(views.len(), ACHIEVEMENTS.len());
        let streak = views
            .iter()
            .find(|view| view.achievement.id == "streak_3")
            .expect("streak achievement");
        assert!(streak.unlocked);
        assert_eq!(streak.unlocked_at, Some(300));
    }
}
