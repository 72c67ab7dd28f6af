use crate::db::activities::{self, LearningContentRow};
use crate::db::{Database, stored_i64};
use crate::engine::Engine;
use crate::engine::discipline::DisciplineEvent;
use crate::engine::rewards;
use crate::error::{TrackerError, TrackerResult};
use crate::service::{Award, AwardOutcome, apply_award, require_user};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize)]
pub struct LearningItem {
    #[serde(flatten)]
    pub content: LearningContentRow,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LearningCompletion {
    pub content_id: String,
    pub already_completed: bool,
    #[serde(flatten)]
    pub award: AwardOutcome,
}

pub fn catalog(
    conn: &Connection,
    user_id: &str,
    category: Option<&str>,
) -> TrackerResult<Vec<LearningItem>> {
    let done = activities::completed_learning_ids(conn, user_id)?
        .into_iter()
        .collect::<HashSet<_>>();

    Ok(activities::list_learning_content(conn, category)?
        .into_iter()
        .map(|content| LearningItem {
            completed: done.contains(&content.id),
            content,
        })
        .collect())
}

/// Pays `estimated_minutes * 2` the first time a user completes an item.
/// Later attempts succeed with zero XP.
pub fn complete(
    database: &mut Database,
    engine: &Engine,
    user_id: &str,
    content_id: &str,
    now: DateTime<Utc>,
) -> TrackerResult<LearningCompletion> {
    database.write(|tx| {
        let content = activities::learning_content_by_id(tx, content_id)?
            .ok_or_else(|| TrackerError::NotFound("Learning content".to_string()))?;

        let minutes = u32::try_from(content.estimated_minutes.max(0)).unwrap_or(u32::MAX);
        let xp_earned = stored_i64(rewards::learning_reward(minutes));

        let recorded = activities::insert_learning_completion(
            tx,
            user_id,
            content_id,
            xp_earned,
            now.timestamp(),
        )?;
        if !recorded {
            let user = require_user(tx, user_id)?;
            return Ok(LearningCompletion {
                content_id: content.id,
                already_completed: true,
                award: AwardOutcome::unchanged(&user),
            });
        }

        let award = apply_award(
            tx,
            engine,
            user_id,
            Award {
                xp_delta: xp_earned,
                event: DisciplineEvent::Learning,
            },
            now,
        )?;

        Ok(LearningCompletion {
            content_id: content.id,
            already_completed: false,
            award,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::{catalog, complete};
    use crate::db::test_support::temp_database;
    use crate::engine::{Engine, Variant};
    use crate::error::TrackerError;
    use crate::service::test_support::{at, register_user};

    #[test]
    fn completion_is_idempotent_per_user() {
        let (_dir, mut database) = temp_database();
        let session = register_user(&mut database, "abe@example.com");
        let engine = Engine::new(Variant::Threshold);

        let first = complete(
            &mut database,
            &engine,
            &session.user.id,
            "timeboxing-101",
            at(2026, 3, 10, 10),
        )
        .expect("first completion");
        assert!(!first.already_completed);
        assert_eq!(first.award.xp_earned, 30);
        assert_eq!(first.award.discipline_score, 50);

        let second = complete(
            &mut database,
            &engine,
            &session.user.id,
            "timeboxing-101",
            at(2026, 3, 10, 11),
        )
        .expect("second completion");
        assert!(second.already_completed);
        assert_eq!(second.award.xp_earned, 0);
        assert_eq!(second.award.total_xp, 30);

        let items =
            catalog(database.conn(), &session.user.id, Some("productivity")).expect("catalog");
        assert!(items.iter().all(|item| item.content.category == "productivity"));
        assert!(items.iter().any(|item| item.content.id == "timeboxing-101" && item.completed));
    }

    #[test]
    fn unknown_content_is_not_found() {
        let (_dir, mut database) = temp_database();
        let session = register_user(&mut database, "bea@example.com");
        let engine = Engine::new(Variant::Threshold);

        let error = complete(&mut database, &engine, &session.user.id, "nope", at(2026, 3, 10, 10))
            .expect_err("missing content");
        assert!(matches!(error, TrackerError::NotFound(_)));
    }
}
