use crate::db::activities::{self, TaskEdit, TaskRow};
use crate::db::{Database, non_negative_u32, stored_i64};
use crate::engine::Engine;
use crate::engine::discipline::DisciplineEvent;
use crate::engine::rewards;
use crate::error::{TrackerError, TrackerResult};
use crate::service::{Award, AwardOutcome, apply_award, require_user};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_DIFFICULTY: u32 = 5;
pub const MAX_ESTIMATED_MINUTES: u32 = 1440;
const LIST_LIMIT: usize = 500;

fn default_skill_tree() -> String {
    "General".to_string()
}

fn default_difficulty() -> u32 {
    1
}

fn default_estimated_minutes() -> u32 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_skill_tree")]
    pub skill_tree: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
    #[serde(default = "default_estimated_minutes")]
    pub estimated_minutes: u32,
    #[serde(default)]
    pub xp_reward: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub skill_tree: Option<String>,
    pub difficulty: Option<u32>,
    pub estimated_minutes: Option<u32>,
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskCompletion {
    pub task: TaskRow,
    #[serde(flatten)]
    pub award: AwardOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskUpdateResult {
    pub task: TaskRow,
    #[serde(flatten)]
    pub completion: Option<AwardOutcome>,
}

fn validate_title(title: &str) -> TrackerResult<()> {
    if title.trim().is_empty() {
        return Err(TrackerError::invalid("title must not be empty"));
    }
    Ok(())
}

fn validate_difficulty(difficulty: u32) -> TrackerResult<()> {
    if !(1..=MAX_DIFFICULTY).contains(&difficulty) {
        return Err(TrackerError::invalid(format!(
            "difficulty must be between 1 and {MAX_DIFFICULTY}"
        )));
    }
    Ok(())
}

fn validate_minutes(minutes: u32) -> TrackerResult<()> {
    if !(1..=MAX_ESTIMATED_MINUTES).contains(&minutes) {
        return Err(TrackerError::invalid(format!(
            "estimated_minutes must be between 1 and {MAX_ESTIMATED_MINUTES}"
        )));
    }
    Ok(())
}

fn require_task(conn: &Connection, user_id: &str, task_id: &str) -> TrackerResult<TaskRow> {
    activities::task_for_user(conn, task_id, user_id)?
        .ok_or_else(|| TrackerError::NotFound("Task".to_string()))
}

pub fn create_task(
    database: &mut Database,
    engine: &Engine,
    user_id: &str,
    input: &NewTask,
    now: DateTime<Utc>,
) -> TrackerResult<TaskRow> {
    validate_title(&input.title)?;
    validate_difficulty(input.difficulty)?;
    validate_minutes(input.estimated_minutes)?;

    database.write(|tx| {
        let user = require_user(tx, user_id)?;
        let xp_reward = rewards::task_reward(
            engine.task_rule(),
            input.xp_reward,
            input.difficulty,
            input.estimated_minutes,
            non_negative_u32(user.current_streak),
        );

        let task = TaskRow {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: input.title.trim().to_string(),
            description: input.description.clone(),
            skill_tree: input.skill_tree.clone(),
            difficulty: i64::from(input.difficulty),
            estimated_minutes: i64::from(input.estimated_minutes),
            xp_reward: stored_i64(xp_reward),
            completed: false,
            completed_at: None,
            created_at: now.timestamp(),
        };
        activities::insert_task(tx, &task)?;
        Ok(task)
    })
}

pub fn list_tasks(
    conn: &Connection,
    user_id: &str,
    completed: Option<bool>,
) -> TrackerResult<Vec<TaskRow>> {
    Ok(activities::list_tasks(conn, user_id, completed, LIST_LIMIT)?)
}

/// Flips the task to completed and awards its reward, all inside `conn`'s
/// open transaction. Losing the compare-and-swap means someone else already
/// completed it.
fn complete_in(
    conn: &Connection,
    engine: &Engine,
    user_id: &str,
    task: &TaskRow,
    now: DateTime<Utc>,
) -> TrackerResult<AwardOutcome> {
    if task.completed
        || activities::mark_task_completed(conn, &task.id, user_id, now.timestamp())? != 1
    {
        return Err(TrackerError::AlreadyCompleted("Task".to_string()));
    }

    apply_award(
        conn,
        engine,
        user_id,
        Award {
            xp_delta: task.xp_reward,
            event: DisciplineEvent::Task,
        },
        now,
    )
}

pub fn complete_task(
    database: &mut Database,
    engine: &Engine,
    user_id: &str,
    task_id: &str,
    now: DateTime<Utc>,
) -> TrackerResult<TaskCompletion> {
    database.write(|tx| {
        let task = require_task(tx, user_id, task_id)?;
        let award = complete_in(tx, engine, user_id, &task, now)?;
        Ok(TaskCompletion {
            task: require_task(tx, user_id, task_id)?,
            award,
        })
    })
}

pub fn update_task(
    database: &mut Database,
    engine: &Engine,
    user_id: &str,
    task_id: &str,
    update: &TaskUpdate,
    now: DateTime<Utc>,
) -> TrackerResult<TaskUpdateResult> {
    if let Some(title) = &update.title {
        validate_title(title)?;
    }
    if let Some(difficulty) = update.difficulty {
        validate_difficulty(difficulty)?;
    }
    if let Some(minutes) = update.estimated_minutes {
        validate_minutes(minutes)?;
    }

    database.write(|tx| {
        let task = require_task(tx, user_id, task_id)?;
        if task.completed && update.completed == Some(false) {
            return Err(TrackerError::invalid("a completed task cannot be reopened"));
        }

        let edit = TaskEdit {
            title: update.title.as_ref().map(|title| title.trim().to_string()),
            description: update.description.clone(),
            skill_tree: update.skill_tree.clone(),
            difficulty: update.difficulty,
            estimated_minutes: update.estimated_minutes,
        };
        activities::update_task_fields(tx, task_id, user_id, &edit)?;

        let completion = match update.completed {
            Some(true) => Some(complete_in(tx, engine, user_id, &task, now)?),
            _ => None,
        };

        Ok(TaskUpdateResult {
            task: require_task(tx, user_id, task_id)?,
            completion,
        })
    })
}

pub fn delete_task(conn: &Connection, user_id: &str, task_id: &str) -> TrackerResult<()> {
    if activities::delete_task(conn, task_id, user_id)? == 0 {
        return Err(TrackerError::NotFound("Task".to_string()));
    }
    Ok(())
}
