use crate::db::activities::{self, BossChallengeRow, BossExamRow, QuestQuestion};
use crate::db::{Database, stored_i64};
use crate::engine::{Engine, Variant};
use crate::engine::discipline::DisciplineEvent;
use crate::engine::rewards::{self, EXAM_CHOICES, EXAM_QUESTION_COUNT, ExamOutcome};
use crate::error::{TrackerError, TrackerResult};
use crate::service::{Award, AwardOutcome, apply_award, quests, require_user};
use chrono::{DateTime, Utc};
use rand::Rng;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

struct ExamItem {
    prompt: &'static str,
    correct: &'static str,
    distractors: [&'static str; 3],
}

const EXAM_BANK: [ExamItem; EXAM_QUESTION_COUNT] = [
    ExamItem {
        prompt: "What is the primary benefit of breaking tasks into micro-wins?",
        correct: "Instant rewards that reinforce positive habits",
        distractors: ["Less work overall", "Avoiding responsibility", "Making tasks harder"],
    },
    ExamItem {
        prompt: "How does the streak multiplier work?",
        correct: "10% per day up to 3x maximum",
        distractors: ["5% per day", "20% per day", "No multiplier exists"],
    },
    ExamItem {
        prompt: "What happens when you score below 50% on a boss exam?",
        correct: "XP penalty and extra remedial quests",
        distractors: ["Nothing", "Account deletion", "Level reset to 1"],
    },
    ExamItem {
        prompt: "Which skill tree focuses on mental agility?",
        correct: "Mind",
        distractors: ["Knowledge", "Discipline", "Fitness"],
    },
    ExamItem {
        prompt: "What is the maximum level on the quadratic curve?",
        correct: "1000",
        distractors: ["100", "500", "Unlimited"],
    },
];

#[derive(Debug, Clone, Serialize)]
pub struct ExamQuestion {
    pub number: usize,
    pub prompt: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamSheet {
    pub exam_id: String,
    pub challenge_id: String,
    pub questions: Vec<ExamQuestion>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExamSubmission {
    /// One letter per question, in order. Empty means a simulated score.
    #[serde(default)]
    pub answers: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamResult {
    pub exam_id: String,
    pub score: f64,
    pub grade: &'static str,
    pub passed: bool,
    pub xp_gained: u64,
    pub xp_penalty: u64,
    pub extra_quests: u32,
    pub remedial_quest_ids: Vec<String>,
    #[serde(flatten)]
    pub award: AwardOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct BossCompletion {
    pub challenge: BossChallengeRow,
    #[serde(flatten)]
    pub award: AwardOutcome,
}

fn require_challenge(
    conn: &Connection,
    user_id: &str,
    challenge_id: &str,
) -> TrackerResult<BossChallengeRow> {
    activities::boss_challenge_for_user(conn, challenge_id, user_id)?
        .ok_or_else(|| TrackerError::NotFound("Boss challenge".to_string()))
}

/// Exams belong to the quadratic rules only.
fn require_exam_variant(engine: &Engine) -> TrackerResult<()> {
    if engine.variant() == Variant::Quadratic {
        Ok(())
    } else {
        Err(TrackerError::Unavailable(format!(
            "Boss exams are not part of the {} rules",
            engine.variant().as_str()
        )))
    }
}

/// Today's challenge, drawn on first request of the UTC day.
pub fn today_challenge<R: Rng + ?Sized>(
    database: &mut Database,
    user_id: &str,
    rng: &mut R,
    now: DateTime<Utc>,
) -> TrackerResult<BossChallengeRow> {
    let today = now.date_naive();

    database.write(|tx| {
        require_user(tx, user_id)?;
        if let Some(existing) = activities::boss_challenge_for_date(tx, user_id, today)? {
            return Ok(existing);
        }

        let draft = rewards::draw_boss_challenge(rng);
        let challenge = BossChallengeRow {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            date: today,
            challenge_text: draft.challenge_text,
            difficulty: i64::from(draft.difficulty),
            xp_reward: stored_i64(draft.xp_reward),
            completed: false,
            completed_at: None,
        };
        activities::insert_boss_challenge(tx, &challenge)?;

        activities::boss_challenge_for_date(tx, user_id, today)?
            .ok_or_else(|| TrackerError::NotFound("Boss challenge".to_string()))
    })
}

pub fn complete_challenge(
    database: &mut Database,
    engine: &Engine,
    user_id: &str,
    challenge_id: &str,
    now: DateTime<Utc>,
) -> TrackerResult<BossCompletion> {
    database.write(|tx| {
        let challenge = require_challenge(tx, user_id, challenge_id)?;
        if challenge.completed
            || activities::mark_boss_completed(tx, challenge_id, user_id, now.timestamp())? != 1
        {
            return Err(TrackerError::AlreadyCompleted("Boss challenge".to_string()));
        }

        let award = apply_award(
            tx,
            engine,
            user_id,
            Award {
                xp_delta: challenge.xp_reward,
                event: DisciplineEvent::BossChallenge,
            },
            now,
        )?;

        Ok(BossCompletion {
            challenge: require_challenge(tx, user_id, challenge_id)?,
            award,
        })
    })
}

pub fn generate_exam<R: Rng + ?Sized>(
    database: &mut Database,
    engine: &Engine,
    user_id: &str,
    challenge_id: &str,
    rng: &mut R,
    now: DateTime<Utc>,
) -> TrackerResult<ExamSheet> {
    require_exam_variant(engine)?;

    database.write(|tx| {
        let challenge = require_challenge(tx, user_id, challenge_id)?;
        if challenge.completed {
            return Err(TrackerError::AlreadyCompleted("Boss challenge".to_string()));
        }

        let (questions, key): (Vec<_>, String) = EXAM_BANK
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let (options, key) = rewards::shuffle_choices(rng, item.correct, &item.distractors);
                let question = ExamQuestion {
                    number: index + 1,
                    prompt: item.prompt.to_string(),
                    options,
                };
                (question, key)
            })
            .unzip();

        let exam = BossExamRow {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            challenge_id: challenge.id.clone(),
            answer_key: key,
            submitted: false,
            score: None,
            grade: None,
            created_at: now.timestamp(),
            submitted_at: None,
        };
        activities::insert_exam(tx, &exam)?;

        Ok(ExamSheet {
            exam_id: exam.id,
            challenge_id: challenge.id,
            questions,
        })
    })
}

/// Review questions for remedial quests. The correct option keeps the slot it
/// had on the exam sheet.
fn review_questions(exam: &BossExamRow) -> Vec<QuestQuestion> {
    EXAM_BANK
        .iter()
        .zip(exam.key())
        .map(|(item, key)| {
            let mut options = vec![item.correct.to_string()];
            options.extend(item.distractors.iter().map(|option| option.to_string()));
            let answer = EXAM_CHOICES.iter().position(|choice| *choice == key).unwrap_or(0);
            options.swap(0, answer);
            QuestQuestion {
                prompt: item.prompt.to_string(),
                options,
                answer,
            }
        })
        .collect()
}

/// Grades the exam (or simulates a score when no answers are given), settles
/// the challenge and applies the bonus or penalty in one transaction.
pub fn submit_exam<R: Rng + ?Sized>(
    database: &mut Database,
    engine: &Engine,
    user_id: &str,
    exam_id: &str,
    submission: &ExamSubmission,
    rng: &mut R,
    now: DateTime<Utc>,
) -> TrackerResult<ExamResult> {
    require_exam_variant(engine)?;
    if submission.answers.len() > EXAM_QUESTION_COUNT {
        return Err(TrackerError::invalid(format!(
            "at most {EXAM_QUESTION_COUNT} answers are accepted"
        )));
    }

    database.write(|tx| {
        let exam = activities::exam_for_user(tx, exam_id, user_id)?
            .ok_or_else(|| TrackerError::NotFound("Exam".to_string()))?;
        if exam.submitted {
            return Err(TrackerError::AlreadyCompleted("Exam".to_string()));
        }

        let score = if submission.answers.is_empty() {
            rewards::simulate_exam_score(rng)
        } else {
            rewards::grade_answers(&exam.key(), &submission.answers)
        };
        let outcome = ExamOutcome::from_score(score);

        let submitted = activities::mark_exam_submitted(
            tx,
            exam_id,
            user_id,
            outcome.score,
            outcome.grade.as_str(),
            now.timestamp(),
        )?;
        if submitted != 1 {
            return Err(TrackerError::AlreadyCompleted("Exam".to_string()));
        }
        if activities::mark_boss_completed(tx, &exam.challenge_id, user_id, now.timestamp())? != 1 {
            return Err(TrackerError::AlreadyCompleted("Boss challenge".to_string()));
        }

        let event = if outcome.passed {
            DisciplineEvent::BossChallenge
        } else {
            DisciplineEvent::FailedExam
        };
        let award = apply_award(
            tx,
            engine,
            user_id,
            Award {
                xp_delta: outcome.xp_delta(),
                event,
            },
            now,
        )?;

        let remedial_quest_ids = if outcome.extra_quests > 0 {
            let review = review_questions(&exam);
            quests::create_remedial(tx, user_id, outcome.extra_quests, &review, now)?
        } else {
            Vec::new()
        };

        info!(
            user_id,
            score = outcome.score,
            grade = outcome.grade.as_str(),
            xp_earned = outcome.xp_delta(),
            "Boss exam submitted"
        );

        Ok(ExamResult {
            exam_id: exam.id,
            score: outcome.score,
            grade: outcome.grade.as_str(),
            passed: outcome.passed,
            xp_gained: outcome.xp_gained,
            xp_penalty: outcome.xp_penalty,
            extra_quests: outcome.extra_quests,
            remedial_quest_ids,
            award,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::{
        EXAM_BANK, ExamSubmission, complete_challenge, generate_exam, submit_exam, today_challenge,
    };
    use crate::db::test_support::temp_database;
    use crate::db::{self, activities};
    use crate::engine::rewards::{BOSS_MAX_DIFFICULTY, BOSS_MIN_DIFFICULTY, EXAM_CHOICES};
    use crate::engine::{Engine, Variant};
    use crate::error::TrackerError;
    use crate::service::test_support::{at, register_user};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn one_challenge_per_day() {
        let (_dir, mut database) = temp_database();
        let session = register_user(&mut database, "vic@example.com");
        let user_id = session.user.id.as_str();
        let mut rng = StdRng::seed_from_u64(5);

        let morning = today_challenge(&mut database, user_id, &mut rng, at(2026, 3, 10, 8))
            .expect("morning challenge");
        let evening = today_challenge(&mut database, user_id, &mut rng, at(2026, 3, 10, 21))
            .expect("evening challenge");
        assert_eq!(morning.id, evening.id);
        let difficulties = i64::from(BOSS_MIN_DIFFICULTY)..=i64::from(BOSS_MAX_DIFFICULTY);
        assert!(difficulties.contains(&morning.difficulty));
        assert_eq!(morning.xp_reward, morning.difficulty * 50);

        let tomorrow = today_challenge(&mut database, user_id, &mut rng, at(2026, 3, 11, 8))
            .expect("next challenge");
        assert_ne!(tomorrow.id, morning.id);
    }

    #[test]
    fn direct_completion_pays_once_and_blocks_exam() {
        let (_dir, mut database) = temp_database();
        let session = register_user(&mut database, "wes@example.com");
        let user_id = session.user.id.as_str();
        let engine = Engine::new(Variant::Quadratic);
        let mut rng = StdRng::seed_from_u64(9);
        let challenge = today_challenge(&mut database, user_id, &mut rng, at(2026, 3, 10, 8))
            .expect("challenge");

        let done =
            complete_challenge(&mut database, &engine, user_id, &challenge.id, at(2026, 3, 10, 9))
                .expect("complete challenge");
        assert_eq!(done.award.xp_earned, challenge.xp_reward);
        assert_eq!(done.award.discipline_score, 55);

        let again =
            complete_challenge(&mut database, &engine, user_id, &challenge.id, at(2026, 3, 10, 10))
                .expect_err("second completion");
        assert!(matches!(again, TrackerError::AlreadyCompleted(_)));

        let exam = generate_exam(
            &mut database,
            &engine,
            user_id,
            &challenge.id,
            &mut rng,
            at(2026, 3, 10, 10),
        );
        assert!(matches!(exam, Err(TrackerError::AlreadyCompleted(_))));
    }

    #[test]
    fn exams_are_refused_under_threshold_rules() {
        let (_dir, mut database) = temp_database();
        let session = register_user(&mut database, "uma@example.com");
        let user_id = session.user.id.as_str();
        let threshold = Engine::new(Variant::Threshold);
        let quadratic = Engine::new(Variant::Quadratic);
        let mut rng = StdRng::seed_from_u64(13);
        let challenge = today_challenge(&mut database, user_id, &mut rng, at(2026, 3, 10, 8))
            .expect("challenge");

        let refused = generate_exam(
            &mut database,
            &threshold,
            user_id,
            &challenge.id,
            &mut rng,
            at(2026, 3, 10, 9),
        );
        assert!(matches!(refused, Err(TrackerError::Unavailable(_))));

        let sheet = generate_exam(
            &mut database,
            &quadratic,
            user_id,
            &challenge.id,
            &mut rng,
            at(2026, 3, 10, 9),
        )
        .expect("exam");
        let submission = ExamSubmission {
            answers: vec!["Z".to_string()],
        };
        let refused = submit_exam(
            &mut database,
            &threshold,
            user_id,
            &sheet.exam_id,
            &submission,
            &mut rng,
            at(2026, 3, 10, 10),
        );
        assert!(matches!(refused, Err(TrackerError::Unavailable(_))));

        let exam = activities::exam_for_user(database.conn(), &sheet.exam_id, user_id)
            .expect("load exam")
            .expect("exam exists");
        assert!(!exam.submitted);
        let challenge = activities::boss_challenge_for_user(database.conn(), &challenge.id, user_id)
            .expect("load challenge")
            .expect("challenge exists");
        assert!(!challenge.completed);
        let user = db::user_by_id(database.conn(), user_id)
            .expect("load user")
            .expect("user exists");
        assert_eq!(user.xp, 0);
    }

    #[test]
    fn perfect_answers_pass_with_bonus() {
        let (_dir, mut database) = temp_database();
        let session = register_user(&mut database, "xia@example.com");
        let user_id = session.user.id.as_str();
        let engine = Engine::new(Variant::Quadratic);
        let mut rng = StdRng::seed_from_u64(21);
        let challenge = today_challenge(&mut database, user_id, &mut rng, at(2026, 3, 10, 8))
            .expect("challenge");
        let sheet = generate_exam(
            &mut database,
            &engine,
            user_id,
            &challenge.id,
            &mut rng,
            at(2026, 3, 10, 9),
        )
        .expect("exam");
        assert_eq!(sheet.questions.len(), EXAM_BANK.len());

        let answers = sheet
            .questions
            .iter()
            .zip(EXAM_BANK.iter())
            .map(|(question, item)| {
                let index = question
                    .options
                    .iter()
                    .position(|option| option == item.correct)
                    .expect("correct option present");
                EXAM_CHOICES[index].to_string()
            })
            .collect::<Vec<_>>();

        let result = submit_exam(
            &mut database,
            &engine,
            user_id,
            &sheet.exam_id,
            &ExamSubmission { answers },
            &mut rng,
            at(2026, 3, 10, 10),
        )
        .expect("submit exam");

        assert_eq!(result.score, 100.0);
        assert_eq!(result.grade, "A*");
        assert!(result.passed);
        assert_eq!(result.award.xp_earned, 250);
        assert_eq!(result.award.new_level, 2);
        assert!(result.remedial_quest_ids.is_empty());

        let challenge = activities::boss_challenge_for_user(database.conn(), &challenge.id, user_id)
            .expect("load challenge")
            .expect("challenge exists");
        assert!(challenge.completed);
    }

    #[test]
    fn failed_exam_applies_penalty_and_remedial_quests() {
        let (_dir, mut database) = temp_database();
        let session = register_user(&mut database, "yan@example.com");
        let user_id = session.user.id.as_str();
        let engine = Engine::new(Variant::Quadratic);
        let mut rng = StdRng::seed_from_u64(33);
        database
            .conn()
            .execute("UPDATE users SET xp = 150, level = 2 WHERE id = ?1", [user_id])
            .expect("seed xp");

        let challenge = today_challenge(&mut database, user_id, &mut rng, at(2026, 3, 10, 8))
            .expect("challenge");
        let sheet = generate_exam(
            &mut database,
            &engine,
            user_id,
            &challenge.id,
            &mut rng,
            at(2026, 3, 10, 9),
        )
        .expect("exam");

        let wrong = sheet
            .questions
            .iter()
            .zip(EXAM_BANK.iter())
            .map(|(question, item)| {
                let index = question
                    .options
                    .iter()
                    .position(|option| option != item.correct)
                    .expect("wrong option present");
                EXAM_CHOICES[index].to_string()
            })
            .collect::<Vec<_>>();

        let result = submit_exam(
            &mut database,
            &engine,
            user_id,
            &sheet.exam_id,
            &ExamSubmission { answers: wrong },
            &mut rng,
            at(2026, 3, 10, 10),
        )
        .expect("submit exam");

        assert_eq!(result.score, 0.0);
        assert!(!result.passed);
        assert_eq!(result.xp_penalty, 500);
        assert_eq!(result.extra_quests, 5);
        assert_eq!(result.remedial_quest_ids.len(), 5);
        assert_eq!(result.award.total_xp, 0);
        assert_eq!(result.award.new_level, 1);
        assert_eq!(result.award.discipline_score, 50);

        let user = db::user_by_id(database.conn(), user_id)
            .expect("load user")
            .expect("user exists");
        assert_eq!(user.xp, 0);

        let resubmit = submit_exam(
            &mut database,
            &engine,
            user_id,
            &sheet.exam_id,
            &ExamSubmission::default(),
            &mut rng,
            at(2026, 3, 10, 11),
        );
        assert!(matches!(resubmit, Err(TrackerError::AlreadyCompleted(_))));
    }

    #[test]
    fn remedial_quests_keep_the_exam_answer_positions() {
        let (_dir, mut database) = temp_database();
        let session = register_user(&mut database, "zed@example.com");
        let user_id = session.user.id.as_str();
        let engine = Engine::new(Variant::Quadratic);
        let mut rng = StdRng::seed_from_u64(77);
        let challenge = today_challenge(&mut database, user_id, &mut rng, at(2026, 3, 10, 8))
            .expect("challenge");
        let sheet = generate_exam(
            &mut database,
            &engine,
            user_id,
            &challenge.id,
            &mut rng,
            at(2026, 3, 10, 9),
        )
        .expect("exam");

        let result = submit_exam(
            &mut database,
            &engine,
            user_id,
            &sheet.exam_id,
            &ExamSubmission {
                answers: vec!["Z".to_string()],
            },
            &mut rng,
            at(2026, 3, 10, 10),
        )
        .expect("submit exam");
        let quest_id = result.remedial_quest_ids.first().expect("remedial quest");

        let quest = activities::quest_for_user(database.conn(), quest_id, user_id)
            .expect("load quest")
            .expect("quest exists");
        let first = &quest.questions[0];
        assert_eq!(first.prompt, EXAM_BANK[0].prompt);
        assert_eq!(first.options[first.answer], EXAM_BANK[0].correct);
        assert_eq!(sheet.questions[0].options[first.answer], EXAM_BANK[0].correct);
    }
}
