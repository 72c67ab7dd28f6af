use crate::db::activities::{self, QuestQuestion, QuestRow};
use crate::db::{Database, non_negative_u64, stored_i64};
use crate::engine::Engine;
use crate::engine::discipline::DisciplineEvent;
use crate::engine::rewards::{self, EXAM_CHOICES};
use crate::error::{TrackerError, TrackerResult};
use crate::service::{Award, AwardOutcome, apply_award, require_user};
use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

const REMEDIAL_XP: u64 = 40;
const REMEDIAL_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestType {
    Daily,
    Weekly,
    Monthly,
    Micro,
    Beginner,
    Remedial,
}

impl QuestType {
    pub fn parse(raw: &str) -> TrackerResult<Self> {
        match raw.trim().to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "micro" => Ok(Self::Micro),
            "beginner" => Ok(Self::Beginner),
            "remedial" => Ok(Self::Remedial),
            other => Err(TrackerError::invalid(format!("unknown quest type: {other}"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Micro => "micro",
            Self::Beginner => "beginner",
            Self::Remedial => "remedial",
        }
    }

    /// When a batch generated at `now` stops being completable.
    pub fn expires_at(self, now: DateTime<Utc>) -> Option<i64> {
        match self {
            Self::Daily => Some(
                now.date_naive()
                    .succ_opt()
                    .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0))
                    .map(|midnight| midnight.and_utc().timestamp())
                    .unwrap_or_else(|| (now + Duration::days(1)).timestamp()),
            ),
            Self::Weekly => Some((now + Duration::days(7)).timestamp()),
            Self::Monthly => Some((now + Duration::days(30)).timestamp()),
            Self::Micro => Some((now + Duration::hours(6)).timestamp()),
            Self::Remedial => Some((now + Duration::hours(REMEDIAL_HOURS)).timestamp()),
            Self::Beginner => None,
        }
    }

    fn templates(self) -> &'static [QuestTemplate] {
        match self {
            Self::Daily => &DAILY,
            Self::Weekly => &WEEKLY,
            Self::Monthly => &MONTHLY,
            Self::Micro => &MICRO,
            Self::Beginner => &BEGINNER,
            Self::Remedial => &[],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QuestTemplate {
    pub title: &'static str,
    pub description: &'static str,
    pub xp_reward: u64,
    pub category: &'static str,
    pub difficulty: &'static str,
}

const fn template(
    title: &'static str,
    description: &'static str,
    xp_reward: u64,
    category: &'static str,
    difficulty: &'static str,
) -> QuestTemplate {
    QuestTemplate {
        title,
        description,
        xp_reward,
        category,
        difficulty,
    }
}

const DAILY: [QuestTemplate; 3] = [
    template("Win the morning", "Complete 1 focused task", 80, "productivity", "easy"),
    template("Deep work burst", "Do 25 minutes of focus", 120, "discipline", "medium"),
    template("Health check", "Drink water and stretch", 60, "wellness", "easy"),
];

const WEEKLY: [QuestTemplate; 2] = [
    template("Weekly conquest", "Complete 10 tasks", 500, "productivity", "hard"),
    template("Streak builder", "Maintain a 3-day streak", 350, "discipline", "medium"),
];

const MONTHLY: [QuestTemplate; 1] = [template(
    "Monthly mastery",
    "Complete 60 tasks",
    2500,
    "productivity",
    "legendary",
)];

const MICRO: [QuestTemplate; 2] = [
    template("Micro win", "Do 5 minutes of planning", 30, "learning", "easy"),
    template("Micro win", "Tidy workspace", 30, "wellness", "easy"),
];

const BEGINNER: [QuestTemplate; 2] = [
    template("First mission", "Create your first task", 100, "productivity", "easy"),
    template("First focus", "Start a focus session", 120, "discipline", "easy"),
];

#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub prompt: String,
    pub options: Vec<String>,
}

/// Quest as shown to its owner; answers stay server-side.
#[derive(Debug, Clone, Serialize)]
pub struct QuestView {
    pub id: String,
    pub quest_type: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: String,
    pub xp_reward: i64,
    pub completed: bool,
    pub xp_earned: i64,
    pub expires_at: Option<i64>,
    pub questions: Vec<PublicQuestion>,
}

impl From<QuestRow> for QuestView {
    fn from(row: QuestRow) -> Self {
        Self {
            id: row.id,
            quest_type: row.quest_type,
            title: row.title,
            description: row.description,
            category: row.category,
            difficulty: row.difficulty,
            xp_reward: row.xp_reward,
            completed: row.completed,
            xp_earned: row.xp_earned,
            expires_at: row.expires_at,
            questions: row
                .questions
                .into_iter()
                .map(|question| PublicQuestion {
                    prompt: question.prompt,
                    options: question.options,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestSubmission {
    #[serde(default)]
    pub answers: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestCompletion {
    pub quest_id: String,
    pub already_completed: bool,
    pub correct_answers: u32,
    pub total_questions: u32,
    #[serde(flatten)]
    pub award: AwardOutcome,
}

fn quest_from_template(
    user_id: &str,
    quest_type: QuestType,
    template: &QuestTemplate,
    now: DateTime<Utc>,
) -> QuestRow {
    QuestRow {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        quest_type: quest_type.as_str().to_string(),
        title: template.title.to_string(),
        description: template.description.to_string(),
        category: template.category.to_string(),
        difficulty: template.difficulty.to_string(),
        xp_reward: stored_i64(template.xp_reward),
        questions: Vec::new(),
        completed: false,
        xp_earned: 0,
        created_at: now.timestamp(),
        expires_at: quest_type.expires_at(now),
        completed_at: None,
    }
}

/// Live quests of one type, generating a fresh batch from the templates when
/// none are live. Beginner quests never expire, so they are generated once.
pub fn list_quests(
    database: &mut Database,
    user_id: &str,
    quest_type: QuestType,
    now: DateTime<Utc>,
) -> TrackerResult<Vec<QuestView>> {
    database.write(|tx| {
        require_user(tx, user_id)?;
        let live =
            activities::live_quests_of_type(tx, user_id, quest_type.as_str(), now.timestamp())?;
        if !live.is_empty() || quest_type.templates().is_empty() {
            return Ok(live.into_iter().map(QuestView::from).collect());
        }

        let batch = quest_type
            .templates()
            .iter()
            .map(|template| quest_from_template(user_id, quest_type, template, now))
            .collect::<Vec<_>>();
        batch
            .iter()
            .try_for_each(|quest| activities::insert_quest(tx, quest))?;
        debug!(user_id, quest_type = quest_type.as_str(), count = batch.len(), "Generated quests");

        Ok(batch.into_iter().map(QuestView::from).collect())
    })
}

/// Creates `count` remedial quests, each carrying review questions. Runs in
/// the caller's transaction.
pub fn create_remedial(
    conn: &Connection,
    user_id: &str,
    count: u32,
    review: &[QuestQuestion],
    now: DateTime<Utc>,
) -> TrackerResult<Vec<String>> {
    (0..count)
        .map(|index| {
            let questions = review
                .iter()
                .cycle()
                .skip(index as usize)
                .take(review.len().min(2))
                .cloned()
                .collect::<Vec<_>>();

            let quest = QuestRow {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                quest_type: QuestType::Remedial.as_str().to_string(),
                title: format!("Remedial drill {}", index + 1),
                description: "Review the boss exam material and answer the check questions"
                    .to_string(),
                category: "learning".to_string(),
                difficulty: "medium".to_string(),
                xp_reward: stored_i64(REMEDIAL_XP),
                questions,
                completed: false,
                xp_earned: 0,
                created_at: now.timestamp(),
                expires_at: QuestType::Remedial.expires_at(now),
                completed_at: None,
            };
            activities::insert_quest(conn, &quest)?;
            Ok(quest.id)
        })
        .collect()
}

fn answer_key(questions: &[QuestQuestion]) -> TrackerResult<Vec<char>> {
    questions
        .iter()
        .map(|question| {
            EXAM_CHOICES.get(question.answer).copied().ok_or_else(|| {
                TrackerError::Internal(anyhow!(
                    "quest answer index {} out of range",
                    question.answer
                ))
            })
        })
        .collect()
}

/// Completes a quest. A quest that is already completed yields a zero-XP
/// success; an expired one is rejected.
pub fn complete_quest(
    database: &mut Database,
    engine: &Engine,
    user_id: &str,
    quest_id: &str,
    submission: &QuestSubmission,
    now: DateTime<Utc>,
) -> TrackerResult<QuestCompletion> {
    database.write(|tx| {
        let quest = activities::quest_for_user(tx, quest_id, user_id)?
            .ok_or_else(|| TrackerError::NotFound("Quest".to_string()))?;
        let total_questions = u32::try_from(quest.questions.len()).unwrap_or(u32::MAX);

        if quest.completed {
            let user = require_user(tx, user_id)?;
            return Ok(QuestCompletion {
                quest_id: quest.id,
                already_completed: true,
                correct_answers: 0,
                total_questions,
                award: AwardOutcome::unchanged(&user),
            });
        }

        if quest.expires_at.is_some_and(|expires_at| expires_at <= now.timestamp()) {
            return Err(TrackerError::Expired("Quest".to_string()));
        }

        if total_questions > 0 && submission.answers.is_empty() {
            return Err(TrackerError::invalid("this quest requires answers"));
        }

        let key = answer_key(&quest.questions)?;
        let correct_answers =
            u32::try_from(rewards::count_correct(&key, &submission.answers)).unwrap_or(u32::MAX);
        let xp_earned = stored_i64(rewards::quest_reward(
            non_negative_u64(quest.xp_reward),
            correct_answers,
            total_questions,
        ));

        let flipped =
            activities::mark_quest_completed(tx, quest_id, user_id, xp_earned, now.timestamp())?;
        if flipped != 1 {
            let user = require_user(tx, user_id)?;
            return Ok(QuestCompletion {
                quest_id: quest.id,
                already_completed: true,
                correct_answers: 0,
                total_questions,
                award: AwardOutcome::unchanged(&user),
            });
        }

        let award = apply_award(
            tx,
            engine,
            user_id,
            Award {
                xp_delta: xp_earned,
                event: DisciplineEvent::Quest,
            },
            now,
        )?;

        Ok(QuestCompletion {
            quest_id: quest.id,
            already_completed: false,
            correct_answers,
            total_questions,
            award,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::{QuestSubmission, QuestType, complete_quest, create_remedial, list_quests};
    use crate::db::activities::QuestQuestion;
    use crate::db::test_support::temp_database;
    use crate::db::{self, Database};
    use crate::engine::{Engine, Variant};
    use crate::error::TrackerError;
    use crate::service::test_support::{at, register_user};

    fn question(prompt: &str, answer: usize) -> QuestQuestion {
        QuestQuestion {
            prompt: prompt.to_string(),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            answer,
        }
    }

    fn answers(values: &[&str]) -> QuestSubmission {
        QuestSubmission {
            answers: values.iter().map(|value| value.to_string()).collect(),
        }
    }

    fn scored_quest(database: &mut Database, user_id: &str, xp_reward: i64) -> String {
        let ids = database
            .write(|tx| {
                create_remedial(
                    tx,
                    user_id,
                    1,
                    &[question("one", 0), question("two", 1)],
                    at(2026, 3, 10, 10),
                )
            })
            .expect("create quest");
        let id = ids.into_iter().next().expect("one quest");

        database
            .conn()
            .execute(
                "UPDATE quests SET xp_reward = ?1, questions = ?2 WHERE id = ?3",
                rusqlite::params![
                    xp_reward,
                    serde_json::to_string(&vec![
                        question("q1", 1),
                        question("q2", 1),
                        question("q3", 2),
                        question("q4", 0),
                    ])
                    .expect("serialize questions"),
                    id
                ],
            )
            .expect("reshape quest");
        id
    }

    #[test]
    fn daily_batch_is_generated_once_until_it_expires() {
        let (_dir, mut database) = temp_database();
        let session = register_user(&mut database, "quinn@example.com");

        let first = list_quests(
            &mut database,
            &session.user.id,
            QuestType::Daily,
            at(2026, 3, 10, 10),
        )
        .expect("daily quests");
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].expires_at, Some(at(2026, 3, 11, 0).timestamp()));

        let again = list_quests(
            &mut database,
            &session.user.id,
            QuestType::Daily,
            at(2026, 3, 10, 18),
        )
        .expect("daily quests");
        assert_eq!(again.len(), 3);
        assert!(again.iter().all(|quest| first.iter().any(|old| old.id == quest.id)));

        let next_day = list_quests(
            &mut database,
            &session.user.id,
            QuestType::Daily,
            at(2026, 3, 11, 9),
        )
        .expect("daily quests");
        assert_eq!(next_day.len(), 3);
        assert!(next_day.iter().all(|quest| first.iter().all(|old| old.id != quest.id)));
    }

    #[test]
    fn partial_credit_truncates() {
        let (_dir, mut database) = temp_database();
        let session = register_user(&mut database, "rae@example.com");
        let engine = Engine::new(Variant::Threshold);
        let quest_id = scored_quest(&mut database, &session.user.id, 100);

        let result = complete_quest(
            &mut database,
            &engine,
            &session.user.id,
            &quest_id,
            &answers(&["B", "b", "D", "A"]),
            at(2026, 3, 10, 12),
        )
        .expect("complete quest");

        assert_eq!(result.correct_answers, 3);
        assert_eq!(result.total_questions, 4);
        assert_eq!(result.award.xp_earned, 75);
        assert!(!result.already_completed);
    }

    #[test]
    fn second_completion_is_zero_xp_success() {
        let (_dir, mut database) = temp_database();
        let session = register_user(&mut database, "sam@example.com");
        let engine = Engine::new(Variant::Quadratic);
        let quests = list_quests(
            &mut database,
            &session.user.id,
            QuestType::Beginner,
            at(2026, 3, 10, 10),
        )
        .expect("beginner quests");
        let quest = &quests[0];
        assert_eq!(quest.expires_at, None);

        let first = complete_quest(
            &mut database,
            &engine,
            &session.user.id,
            &quest.id,
            &QuestSubmission::default(),
            at(2026, 3, 10, 11),
        )
        .expect("first completion");
        assert_eq!(first.award.xp_earned, 100);
        assert!(first.award.level_up);

        let second = complete_quest(
            &mut database,
            &engine,
            &session.user.id,
            &quest.id,
            &QuestSubmission::default(),
            at(2026, 3, 10, 12),
        )
        .expect("second completion");
        assert!(second.already_completed);
        assert_eq!(second.award.xp_earned, 0);
        assert_eq!(second.award.new_level, 2);

        let user = db::user_by_id(database.conn(), &session.user.id)
            .expect("load user")
            .expect("user exists");
        assert_eq!(user.xp, 100);
    }

    #[test]
    fn expired_quest_is_rejected() {
        let (_dir, mut database) = temp_database();
        let session = register_user(&mut database, "tia@example.com");
        let engine = Engine::new(Variant::Threshold);
        let quests = list_quests(
            &mut database,
            &session.user.id,
            QuestType::Micro,
            at(2026, 3, 10, 10),
        )
        .expect("micro quests");

        let error = complete_quest(
            &mut database,
            &engine,
            &session.user.id,
            &quests[0].id,
            &QuestSubmission::default(),
            at(2026, 3, 10, 17),
        )
        .expect_err("expired");
        assert!(matches!(error, TrackerError::Expired(_)));
    }

    #[test]
    fn scored_quest_requires_answers() {
        let (_dir, mut database) = temp_database();
        let session = register_user(&mut database, "uma@example.com");
        let engine = Engine::new(Variant::Threshold);
        let quest_id = scored_quest(&mut database, &session.user.id, 100);

        let error = complete_quest(
            &mut database,
            &engine,
            &session.user.id,
            &quest_id,
            &QuestSubmission::default(),
            at(2026, 3, 10, 12),
        )
        .expect_err("answers required");
        assert!(matches!(error, TrackerError::InvalidInput(_)));
    }

    #[test]
    fn unknown_quest_type_is_invalid() {
        assert!(QuestType::parse("global").is_err());
        assert_eq!(QuestType::parse("Weekly").expect("parse"), QuestType::Weekly);
    }
}
