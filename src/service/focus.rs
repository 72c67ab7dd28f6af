use crate::db::activities::{self, FocusSessionRow};
use crate::db::{Database, stored_i64};
use crate::engine::Engine;
use crate::engine::discipline::DisciplineEvent;
use crate::engine::rewards;
use crate::error::{TrackerError, TrackerResult};
use crate::service::{Award, AwardOutcome, apply_award, require_user};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_FOCUS_MINUTES: u32 = 480;
const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct StartFocus {
    pub duration_minutes: u32,
    #[serde(default)]
    pub task_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FocusCompletion {
    pub session: FocusSessionRow,
    #[serde(flatten)]
    pub award: AwardOutcome,
}

pub fn start_session(
    database: &mut Database,
    user_id: &str,
    input: &StartFocus,
    now: DateTime<Utc>,
) -> TrackerResult<FocusSessionRow> {
    if !(1..=MAX_FOCUS_MINUTES).contains(&input.duration_minutes) {
        return Err(TrackerError::invalid(format!(
            "duration_minutes must be between 1 and {MAX_FOCUS_MINUTES}"
        )));
    }

    database.write(|tx| {
        require_user(tx, user_id)?;
        if let Some(task_id) = &input.task_id {
            activities::task_for_user(tx, task_id, user_id)?
                .ok_or_else(|| TrackerError::NotFound("Task".to_string()))?;
        }

        let session = FocusSessionRow {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            task_id: input.task_id.clone(),
            duration_minutes: i64::from(input.duration_minutes),
            completed: false,
            xp_earned: 0,
            started_at: now.timestamp(),
            completed_at: None,
        };
        activities::insert_focus_session(tx, &session)?;
        Ok(session)
    })
}

/// Rewards are paid here, never on start.
pub fn complete_session(
    database: &mut Database,
    engine: &Engine,
    user_id: &str,
    session_id: &str,
    now: DateTime<Utc>,
) -> TrackerResult<FocusCompletion> {
    database.write(|tx| {
        let session = activities::focus_session_for_user(tx, session_id, user_id)?
            .ok_or_else(|| TrackerError::NotFound("Focus session".to_string()))?;

        let minutes = u32::try_from(session.duration_minutes.max(0)).unwrap_or(MAX_FOCUS_MINUTES);
        let xp_earned = stored_i64(rewards::focus_reward(minutes));
        let flipped =
            activities::mark_focus_completed(tx, session_id, user_id, xp_earned, now.timestamp())?;
        if session.completed || flipped != 1 {
            return Err(TrackerError::AlreadyCompleted("Focus session".to_string()));
        }

        let award = apply_award(
            tx,
            engine,
            user_id,
            Award {
                xp_delta: xp_earned,
                event: DisciplineEvent::FocusSession,
            },
            now,
        )?;

        let session = activities::focus_session_for_user(tx, session_id, user_id)?
            .ok_or_else(|| TrackerError::NotFound("Focus session".to_string()))?;
        Ok(FocusCompletion { session, award })
    })
}

pub fn history(conn: &Connection, user_id: &str) -> TrackerResult<Vec<FocusSessionRow>> {
    Ok(activities::focus_history(conn, user_id, HISTORY_LIMIT)?)
}

#[cfg(test)]
mod tests {
    use super::{StartFocus, complete_session, history, start_session};
    use crate::db::test_support::temp_database;
    use crate::engine::{Engine, Variant};
    use crate::error::TrackerError;
    use crate::service::test_support::{at, register_user};

    #[test]
    fn completion_pays_two_xp_per_minute_once() {
        let (_dir, mut database) = temp_database();
        let session = register_user(&mut database, "ola@example.com");
        let engine = Engine::new(Variant::Threshold);

        let focus = start_session(
            &mut database,
            &session.user.id,
            &StartFocus {
                duration_minutes: 60,
                task_id: None,
            },
            at(2026, 3, 10, 10),
        )
        .expect("start focus");
        assert_eq!(focus.xp_earned, 0);

        let done = complete_session(
            &mut database,
            &engine,
            &session.user.id,
            &focus.id,
            at(2026, 3, 10, 11),
        )
        .expect("complete focus");
        assert_eq!(done.award.xp_earned, 120);
        assert_eq!(done.session.xp_earned, 120);
        assert_eq!(done.award.discipline_score, 52);
        assert!(done.award.unlocked_achievements.contains(&"focus_60".to_string()));

        let again = complete_session(
            &mut database,
            &engine,
            &session.user.id,
            &focus.id,
            at(2026, 3, 10, 12),
        )
        .expect_err("already completed");
        assert!(matches!(again, TrackerError::AlreadyCompleted(_)));

        let sessions = history(database.conn(), &session.user.id).expect("history");
        assert_eq!(sessions.len(), 1);
        assert!(sessions[0].completed);
    }

    #[test]
    fn duration_and_task_are_validated() {
        let (_dir, mut database) = temp_database();
        let session = register_user(&mut database, "pia@example.com");

        let too_long = start_session(
            &mut database,
            &session.user.id,
            &StartFocus {
                duration_minutes: 481,
                task_id: None,
            },
            at(2026, 3, 10, 10),
        );
        assert!(matches!(too_long, Err(TrackerError::InvalidInput(_))));

        let unknown_task = start_session(
            &mut database,
            &session.user.id,
            &StartFocus {
                duration_minutes: 25,
                task_id: Some("missing".to_string()),
            },
            at(2026, 3, 10, 10),
        );
        assert!(matches!(unknown_task, Err(TrackerError::NotFound(_))));
    }
}
