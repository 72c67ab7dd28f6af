pub mod achievements;
pub mod auth;
pub mod boss;
pub mod focus;
pub mod learning;
pub mod quests;
pub mod tasks;

use crate::db::{self, UserProgress, UserRow};
use crate::engine::Engine;
use crate::engine::discipline::DisciplineEvent;
use crate::error::{TrackerError, TrackerResult};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

/// One XP movement caused by a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Award {
    pub xp_delta: i64,
    pub event: DisciplineEvent,
}

#[derive(Debug, Clone, Serialize)]
pub struct AwardOutcome {
    pub success: bool,
    pub xp_earned: i64,
    pub level_up: bool,
    pub new_level: u32,
    pub total_xp: u64,
    pub current_streak: u32,
    pub discipline_score: i64,
    pub unlocked_achievements: Vec<String>,
}

impl AwardOutcome {
    /// Zero-XP success for activities that were already completed.
    pub fn unchanged(user: &UserRow) -> Self {
        let standing = user.standing();
        Self {
            success: true,
            xp_earned: 0,
            level_up: false,
            new_level: standing.level,
            total_xp: standing.xp,
            current_streak: user.streak().current_streak,
            discipline_score: user.discipline_score,
            unlocked_achievements: Vec::new(),
        }
    }
}

pub fn require_user(conn: &Connection, user_id: &str) -> TrackerResult<UserRow> {
    db::user_by_id(conn, user_id)?.ok_or_else(|| TrackerError::NotFound("User".to_string()))
}

/// Applies `award` to the owning user. Must run inside the same transaction
/// that flipped the activity's completed flag.
pub fn apply_award(
    conn: &Connection,
    engine: &Engine,
    user_id: &str,
    award: Award,
    now: DateTime<Utc>,
) -> TrackerResult<AwardOutcome> {
    let user = require_user(conn, user_id)?;

    let (streak, _) = user.streak().touch(now.date_naive());
    let change = engine.apply(user.standing(), award.xp_delta);
    let progress = UserProgress {
        xp: change.total_xp,
        level: change.new_level,
        streak,
        discipline_score: award.event.apply(user.discipline_score),
        total_tasks_completed: user.total_tasks_completed
            + i64::from(award.event == DisciplineEvent::Task),
    };
    db::update_user_progress(conn, user_id, &progress)?;

    let unlocked_achievements = achievements::unlock_earned(conn, user_id, now.timestamp())?;

    if change.level_up {
        info!(
            user_id,
            xp_earned = award.xp_delta,
            level = change.new_level,
            "Level up"
        );
    } else if change.new_level < change.previous_level {
        info!(
            user_id,
            xp_earned = award.xp_delta,
            level = change.new_level,
            "Level lowered by penalty"
        );
    }

    Ok(AwardOutcome {
        success: true,
        xp_earned: award.xp_delta,
        level_up: change.level_up,
        new_level: change.new_level,
        total_xp: change.total_xp,
        current_streak: progress.streak.current_streak,
        discipline_score: progress.discipline_score,
        unlocked_achievements,
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::{at, register_user};
    use super::{Award, apply_award};
    use crate::db::{self, test_support::temp_database};
    use crate::engine::discipline::DisciplineEvent;
    use crate::engine::{Engine, Variant};

    #[test]
    fn award_updates_standing_streak_and_discipline_together() {
        let (_dir, mut database) = temp_database();
        let session = register_user(&mut database, "ada@example.com");
        let engine = Engine::new(Variant::Threshold);

        let outcome = database
            .write(|tx| {
                apply_award(
                    tx,
                    &engine,
                    &session.user.id,
                    Award {
                        xp_delta: 120,
                        event: DisciplineEvent::Task,
                    },
                    at(2026, 3, 11, 8),
                )
            })
            .expect("apply award");

        assert!(outcome.level_up);
        assert_eq!(outcome.new_level, 2);
        assert_eq!(outcome.current_streak, 2);
        assert_eq!(outcome.discipline_score, 51);
        assert!(outcome.unlocked_achievements.contains(&"first_task".to_string()));

        let user = db::user_by_id(database.conn(), &session.user.id)
            .expect("load user")
            .expect("user exists");
        assert_eq!(user.xp, 120);
        assert_eq!(user.level, 2);
        assert_eq!(user.total_tasks_completed, 1);
    }

    #[test]
    fn penalty_never_drives_balance_negative() {
        let (_dir, mut database) = temp_database();
        let session = register_user(&mut database, "bo@example.com");
        let engine = Engine::new(Variant::Quadratic);

        let outcome = database
            .write(|tx| {
                apply_award(
                    tx,
                    &engine,
                    &session.user.id,
                    Award {
                        xp_delta: -500,
                        event: DisciplineEvent::FailedExam,
                    },
                    at(2026, 3, 10, 12),
                )
            })
            .expect("apply penalty");

        assert_eq!(outcome.total_xp, 0);
        assert_eq!(outcome.new_level, 1);
        assert_eq!(outcome.discipline_score, 50);
    }
}
