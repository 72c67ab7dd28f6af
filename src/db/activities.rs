use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct TaskRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub skill_tree: String,
    pub difficulty: i64,
    pub estimated_minutes: i64,
    pub xp_reward: i64,
    pub completed: bool,
    pub completed_at: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default)]
pub struct TaskEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub skill_tree: Option<String>,
    pub difficulty: Option<u32>,
    pub estimated_minutes: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FocusSessionRow {
    pub id: String,
    pub user_id: String,
    pub task_id: Option<String>,
    pub duration_minutes: i64,
    pub completed: bool,
    pub xp_earned: i64,
    pub started_at: i64,
    pub completed_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BossChallengeRow {
    pub id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub challenge_text: String,
    pub difficulty: i64,
    pub xp_reward: i64,
    pub completed: bool,
    pub completed_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct BossExamRow {
    pub id: String,
    pub user_id: String,
    pub challenge_id: String,
    pub answer_key: String,
    pub submitted: bool,
    pub score: Option<f64>,
    pub grade: Option<String>,
    pub created_at: i64,
    pub submitted_at: Option<i64>,
}

impl BossExamRow {
    pub fn key(&self) -> Vec<char> {
        self.answer_key.chars().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    pub answer: usize,
}

#[derive(Debug, Clone)]
pub struct QuestRow {
    pub id: String,
    pub user_id: String,
    pub quest_type: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: String,
    pub xp_reward: i64,
    pub questions: Vec<QuestQuestion>,
    pub completed: bool,
    pub xp_earned: i64,
    pub created_at: i64,
    pub expires_at: Option<i64>,
    pub completed_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningContentRow {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub difficulty: String,
    pub estimated_minutes: i64,
    #[serde(default)]
    pub url: Option<String>,
}

const TASK_COLUMNS: &str = "id, user_id, title, description, skill_tree, difficulty, estimated_minutes, xp_reward, completed, completed_at, created_at";

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        skill_tree: row.get(4)?,
        difficulty: row.get(5)?,
        estimated_minutes: row.get(6)?,
        xp_reward: row.get(7)?,
        completed: row.get(8)?,
        completed_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

pub fn insert_task(conn: &Connection, task: &TaskRow) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO tasks (id, user_id, title, description, skill_tree, difficulty, estimated_minutes, xp_reward, completed, completed_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            task.id,
            task.user_id,
            task.title,
            task.description,
            task.skill_tree,
            task.difficulty,
            task.estimated_minutes,
            task.xp_reward,
            task.completed,
            task.completed_at,
            task.created_at
        ],
    )?;
    Ok(())
}

pub fn task_for_user(
    conn: &Connection,
    task_id: &str,
    user_id: &str,
) -> rusqlite::Result<Option<TaskRow>> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND user_id = ?2"),
        params![task_id, user_id],
        task_from_row,
    )
    .optional()
}

pub fn list_tasks(
    conn: &Connection,
    user_id: &str,
    completed: Option<bool>,
    limit: usize,
) -> rusqlite::Result<Vec<TaskRow>> {
    let mut statement = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE user_id = ?1 AND (?2 IS NULL OR completed = ?2)
         ORDER BY created_at DESC
         LIMIT ?3"
    ))?;

    statement
        .query_map(params![user_id, completed, limit as i64], task_from_row)?
        .collect()
}

pub fn completed_tasks_since(
    conn: &Connection,
    user_id: &str,
    since: i64,
) -> rusqlite::Result<Vec<TaskRow>> {
    let mut statement = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE user_id = ?1 AND completed = 1 AND completed_at >= ?2
         ORDER BY completed_at ASC"
    ))?;

    statement
        .query_map(params![user_id, since], task_from_row)?
        .collect()
}

pub fn count_tasks(conn: &Connection, user_id: &str, completed: bool) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM tasks WHERE user_id = ?1 AND completed = ?2",
        params![user_id, completed],
        |row| row.get(0),
    )
}

/// Completed-task counts per skill tree, across the user's whole history.
pub fn skill_tree_counts(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<(String, i64)>> {
    let mut statement = conn.prepare(
        "SELECT skill_tree, COUNT(*) FROM tasks
         WHERE user_id = ?1 AND completed = 1
         GROUP BY skill_tree
         ORDER BY skill_tree",
    )?;

    statement
        .query_map(params![user_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect()
}

pub fn update_task_fields(
    conn: &Connection,
    task_id: &str,
    user_id: &str,
    edit: &TaskEdit,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE tasks
         SET title = COALESCE(?3, title),
             description = COALESCE(?4, description),
             skill_tree = COALESCE(?5, skill_tree),
             difficulty = COALESCE(?6, difficulty),
             estimated_minutes = COALESCE(?7, estimated_minutes)
         WHERE id = ?1 AND user_id = ?2",
        params![
            task_id,
            user_id,
            edit.title,
            edit.description,
            edit.skill_tree,
            edit.difficulty,
            edit.estimated_minutes
        ],
    )
}

pub fn delete_task(conn: &Connection, task_id: &str, user_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
        params![task_id, user_id],
    )
}

/// Flips `completed` only if it is still unset. Returns 1 for the caller that
/// won the transition, 0 otherwise.
pub fn mark_task_completed(
    conn: &Connection,
    task_id: &str,
    user_id: &str,
    completed_at: i64,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE tasks SET completed = 1, completed_at = ?3
         WHERE id = ?1 AND user_id = ?2 AND completed = 0",
        params![task_id, user_id, completed_at],
    )
}

const FOCUS_COLUMNS: &str =
    "id, user_id, task_id, duration_minutes, completed, xp_earned, started_at, completed_at";

fn focus_from_row(row: &Row<'_>) -> rusqlite::Result<FocusSessionRow> {
    Ok(FocusSessionRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        task_id: row.get(2)?,
        duration_minutes: row.get(3)?,
        completed: row.get(4)?,
        xp_earned: row.get(5)?,
        started_at: row.get(6)?,
        completed_at: row.get(7)?,
    })
}

pub fn insert_focus_session(conn: &Connection, session: &FocusSessionRow) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO focus_sessions (id, user_id, task_id, duration_minutes, completed, xp_earned, started_at, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            session.id,
            session.user_id,
            session.task_id,
            session.duration_minutes,
            session.completed,
            session.xp_earned,
            session.started_at,
            session.completed_at
        ],
    )?;
    Ok(())
}

pub fn focus_session_for_user(
    conn: &Connection,
    session_id: &str,
    user_id: &str,
) -> rusqlite::Result<Option<FocusSessionRow>> {
    conn.query_row(
        &format!("SELECT {FOCUS_COLUMNS} FROM focus_sessions WHERE id = ?1 AND user_id = ?2"),
        params![session_id, user_id],
        focus_from_row,
    )
    .optional()
}

pub fn mark_focus_completed(
    conn: &Connection,
    session_id: &str,
    user_id: &str,
    xp_earned: i64,
    completed_at: i64,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE focus_sessions SET completed = 1, xp_earned = ?3, completed_at = ?4
         WHERE id = ?1 AND user_id = ?2 AND completed = 0",
        params![session_id, user_id, xp_earned, completed_at],
    )
}

pub fn focus_history(
    conn: &Connection,
    user_id: &str,
    limit: usize,
) -> rusqlite::Result<Vec<FocusSessionRow>> {
    let mut statement = conn.prepare(&format!(
        "SELECT {FOCUS_COLUMNS} FROM focus_sessions
         WHERE user_id = ?1
         ORDER BY started_at DESC
         LIMIT ?2"
    ))?;

    statement
        .query_map(params![user_id, limit as i64], focus_from_row)?
        .collect()
}

pub fn completed_focus_since(
    conn: &Connection,
    user_id: &str,
    since: i64,
) -> rusqlite::Result<Vec<FocusSessionRow>> {
    let mut statement = conn.prepare(&format!(
        "SELECT {FOCUS_COLUMNS} FROM focus_sessions
         WHERE user_id = ?1 AND completed = 1 AND started_at >= ?2
         ORDER BY started_at ASC"
    ))?;

    statement
        .query_map(params![user_id, since], focus_from_row)?
        .collect()
}

pub fn longest_completed_focus(conn: &Connection, user_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(duration_minutes), 0) FROM focus_sessions WHERE user_id = ?1 AND completed = 1",
        params![user_id],
        |row| row.get(0),
    )
}

const BOSS_COLUMNS: &str =
    "id, user_id, date, challenge_text, difficulty, xp_reward, completed, completed_at";

fn boss_from_row(row: &Row<'_>) -> rusqlite::Result<BossChallengeRow> {
    Ok(BossChallengeRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: row.get(2)?,
        challenge_text: row.get(3)?,
        difficulty: row.get(4)?,
        xp_reward: row.get(5)?,
        completed: row.get(6)?,
        completed_at: row.get(7)?,
    })
}

/// Inserts unless the user already has a challenge for that date.
pub fn insert_boss_challenge(
    conn: &Connection,
    challenge: &BossChallengeRow,
) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO boss_challenges (id, user_id, date, challenge_text, difficulty, xp_reward, completed, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            challenge.id,
            challenge.user_id,
            challenge.date,
            challenge.challenge_text,
            challenge.difficulty,
            challenge.xp_reward,
            challenge.completed,
            challenge.completed_at
        ],
    )?;
    Ok(inserted == 1)
}

pub fn boss_challenge_for_date(
    conn: &Connection,
    user_id: &str,
    date: NaiveDate,
) -> rusqlite::Result<Option<BossChallengeRow>> {
    conn.query_row(
        &format!("SELECT {BOSS_COLUMNS} FROM boss_challenges WHERE user_id = ?1 AND date = ?2"),
        params![user_id, date],
        boss_from_row,
    )
    .optional()
}

pub fn boss_challenge_for_user(
    conn: &Connection,
    challenge_id: &str,
    user_id: &str,
) -> rusqlite::Result<Option<BossChallengeRow>> {
    conn.query_row(
        &format!("SELECT {BOSS_COLUMNS} FROM boss_challenges WHERE id = ?1 AND user_id = ?2"),
        params![challenge_id, user_id],
        boss_from_row,
    )
    .optional()
}

pub fn mark_boss_completed(
    conn: &Connection,
    challenge_id: &str,
    user_id: &str,
    completed_at: i64,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE boss_challenges SET completed = 1, completed_at = ?3
         WHERE id = ?1 AND user_id = ?2 AND completed = 0",
        params![challenge_id, user_id, completed_at],
    )
}

pub fn insert_exam(conn: &Connection, exam: &BossExamRow) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO boss_exams (id, user_id, challenge_id, answer_key, submitted, score, grade, created_at, submitted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            exam.id,
            exam.user_id,
            exam.challenge_id,
            exam.answer_key,
            exam.submitted,
            exam.score,
            exam.grade,
            exam.created_at,
            exam.submitted_at
        ],
    )?;
    Ok(())
}

pub fn exam_for_user(
    conn: &Connection,
    exam_id: &str,
    user_id: &str,
) -> rusqlite::Result<Option<BossExamRow>> {
    conn.query_row(
        "SELECT id, user_id, challenge_id, answer_key, submitted, score, grade, created_at, submitted_at
         FROM boss_exams WHERE id = ?1 AND user_id = ?2",
        params![exam_id, user_id],
        |row| {
            Ok(BossExamRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                challenge_id: row.get(2)?,
                answer_key: row.get(3)?,
                submitted: row.get(4)?,
                score: row.get(5)?,
                grade: row.get(6)?,
                created_at: row.get(7)?,
                submitted_at: row.get(8)?,
            })
        },
    )
    .optional()
}

pub fn mark_exam_submitted(
    conn: &Connection,
    exam_id: &str,
    user_id: &str,
    score: f64,
    grade: &str,
    submitted_at: i64,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE boss_exams SET submitted = 1, score = ?3, grade = ?4, submitted_at = ?5
         WHERE id = ?1 AND user_id = ?2 AND submitted = 0",
        params![exam_id, user_id, score, grade, submitted_at],
    )
}

const QUEST_COLUMNS: &str = "id, user_id, quest_type, title, description, category, difficulty, xp_reward, questions, completed, xp_earned, created_at, expires_at, completed_at";

fn quest_from_row(row: &Row<'_>) -> rusqlite::Result<QuestRow> {
    let raw_questions: String = row.get(8)?;
    let questions = serde_json::from_str(&raw_questions).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(error))
    })?;

    Ok(QuestRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        quest_type: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        category: row.get(5)?,
        difficulty: row.get(6)?,
        xp_reward: row.get(7)?,
        questions,
        completed: row.get(9)?,
        xp_earned: row.get(10)?,
        created_at: row.get(11)?,
        expires_at: row.get(12)?,
        completed_at: row.get(13)?,
    })
}

pub fn insert_quest(conn: &Connection, quest: &QuestRow) -> rusqlite::Result<()> {
    let questions = serde_json::to_string(&quest.questions)
        .map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))?;

    conn.execute(
        "INSERT INTO quests (id, user_id, quest_type, title, description, category, difficulty, xp_reward, questions, completed, xp_earned, created_at, expires_at, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            quest.id,
            quest.user_id,
            quest.quest_type,
            quest.title,
            quest.description,
            quest.category,
            quest.difficulty,
            quest.xp_reward,
            questions,
            quest.completed,
            quest.xp_earned,
            quest.created_at,
            quest.expires_at,
            quest.completed_at
        ],
    )?;
    Ok(())
}

/// Quests of one type that have not expired at `now`, newest batch first.
pub fn live_quests_of_type(
    conn: &Connection,
    user_id: &str,
    quest_type: &str,
    now: i64,
) -> rusqlite::Result<Vec<QuestRow>> {
    let mut statement = conn.prepare(&format!(
        "SELECT {QUEST_COLUMNS} FROM quests
         WHERE user_id = ?1 AND quest_type = ?2 AND (expires_at IS NULL OR expires_at > ?3)
         ORDER BY created_at DESC, title ASC"
    ))?;

    statement
        .query_map(params![user_id, quest_type, now], quest_from_row)?
        .collect()
}

pub fn quest_for_user(
    conn: &Connection,
    quest_id: &str,
    user_id: &str,
) -> rusqlite::Result<Option<QuestRow>> {
    conn.query_row(
        &format!("SELECT {QUEST_COLUMNS} FROM quests WHERE id = ?1 AND user_id = ?2"),
        params![quest_id, user_id],
        quest_from_row,
    )
    .optional()
}

pub fn mark_quest_completed(
    conn: &Connection,
    quest_id: &str,
    user_id: &str,
    xp_earned: i64,
    completed_at: i64,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE quests SET completed = 1, xp_earned = ?3, completed_at = ?4
         WHERE id = ?1 AND user_id = ?2 AND completed = 0",
        params![quest_id, user_id, xp_earned, completed_at],
    )
}

pub fn list_learning_content(
    conn: &Connection,
    category: Option<&str>,
) -> rusqlite::Result<Vec<LearningContentRow>> {
    let mut statement = conn.prepare(
        "SELECT id, title, description, category, difficulty, estimated_minutes, url
         FROM learning_content
         WHERE ?1 IS NULL OR category = ?1
         ORDER BY category, title",
    )?;

    statement
        .query_map(params![category], |row| {
            Ok(LearningContentRow {
                id: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                category: row.get(3)?,
                difficulty: row.get(4)?,
                estimated_minutes: row.get(5)?,
                url: row.get(6)?,
            })
        })?
        .collect()
}

pub fn learning_content_by_id(
    conn: &Connection,
    content_id: &str,
) -> rusqlite::Result<Option<LearningContentRow>> {
    conn.query_row(
        "SELECT id, title, description, category, difficulty, estimated_minutes, url
         FROM learning_content WHERE id = ?1",
        params![content_id],
        |row| {
            Ok(LearningContentRow {
                id: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                category: row.get(3)?,
                difficulty: row.get(4)?,
                estimated_minutes: row.get(5)?,
                url: row.get(6)?,
            })
        },
    )
    .optional()
}

/// Records a completion once per (user, content). Returns false when the
/// pair was already recorded.
pub fn insert_learning_completion(
    conn: &Connection,
    user_id: &str,
    content_id: &str,
    xp_earned: i64,
    completed_at: i64,
) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO learning_completions (user_id, content_id, xp_earned, completed_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![user_id, content_id, xp_earned, completed_at],
    )?;
    Ok(inserted == 1)
}

pub fn completed_learning_ids(conn: &Connection, user_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut statement =
        conn.prepare("SELECT content_id FROM learning_completions WHERE user_id = ?1")?;

    statement
        .query_map(params![user_id], |row| row.get(0))?
        .collect()
}
