pub mod activities;
pub mod queries;

use crate::engine::Standing;
use crate::engine::discipline::STARTING_DISCIPLINE;
use crate::engine::streak::StreakState;
use crate::error::TrackerResult;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub xp: i64,
    pub level: i64,
    pub current_streak: i64,
    pub longest_streak: i64,
    pub last_active_date: Option<NaiveDate>,
    pub discipline_score: i64,
    pub total_tasks_completed: i64,
    pub created_at: i64,
}

impl UserRow {
    pub fn standing(&self) -> Standing {
        Standing {
            xp: non_negative_u64(self.xp),
            level: non_negative_u32(self.level).max(1),
        }
    }

    pub fn streak(&self) -> StreakState {
        StreakState {
            current_streak: non_negative_u32(self.current_streak),
            longest_streak: non_negative_u32(self.longest_streak),
            last_active_date: self.last_active_date,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: String,
    pub password_hash: String,
    pub password_salt: String,
}

#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub password_salt: &'a str,
    pub created_at: i64,
}

/// Everything a completion may change on the owning user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserProgress {
    pub xp: u64,
    pub level: u32,
    pub streak: StreakState,
    pub discipline_score: i64,
    pub total_tasks_completed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub username: String,
    pub level: i64,
    pub xp: i64,
    pub current_streak: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageRow {
    pub role: String,
    pub content: String,
    pub created_at: i64,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("Failed to set SQLite busy timeout")?;
        conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get::<_, String>(0))
            .context("Failed to enable WAL journal")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .context("Failed to enable foreign keys")?;

        let database = Self { conn };
        database.init_schema()?;
        database.seed_learning_catalog()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    fn seed_learning_catalog(&self) -> Result<()> {
        let existing: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM learning_content", [], |row| row.get(0))
            .context("Failed to count learning content")?;
        if existing > 0 {
            return Ok(());
        }

        let catalog: Vec<activities::LearningContentRow> =
            serde_json::from_str(include_str!("../../assets/learning.json"))
                .context("Failed to parse bundled learning catalog")?;

        catalog.iter().try_for_each(|content| {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO learning_content (id, title, description, category, difficulty, estimated_minutes, url)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        content.id,
                        content.title,
                        content.description,
                        content.category,
                        content.difficulty,
                        content.estimated_minutes,
                        content.url
                    ],
                )
                .context("Failed to seed learning content")
                .map(|_| ())
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Runs `work` inside an IMMEDIATE transaction: the write lock is taken
    /// before the first read, so read-modify-write sequences from concurrent
    /// connections serialize. Commits only when `work` succeeds.
    pub fn write<T, F>(&mut self, work: F) -> TrackerResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> TrackerResult<T>,
    {
        let transaction = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = work(&transaction)?;
        transaction.commit()?;
        Ok(value)
    }

    pub fn count_users(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .context("Failed to count users")
    }
}

const USER_COLUMNS: &str = "id, username, email, xp, level, current_streak, longest_streak, last_active_date, discipline_score, total_tasks_completed, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        xp: row.get(3)?,
        level: row.get(4)?,
        current_streak: row.get(5)?,
        longest_streak: row.get(6)?,
        last_active_date: row.get(7)?,
        discipline_score: row.get(8)?,
        total_tasks_completed: row.get(9)?,
        created_at: row.get(10)?,
    })
}

pub fn insert_user(conn: &Connection, user: &NewUser<'_>) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO users
           (id, username, email, password_hash, password_salt, discipline_score, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.id,
            user.username,
            user.email,
            user.password_hash,
            user.password_salt,
            STARTING_DISCIPLINE,
            user.created_at
        ],
    )?;
    Ok(())
}

pub fn user_by_id(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<UserRow>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![user_id],
        user_from_row,
    )
    .optional()
}

pub fn email_exists(conn: &Connection, email: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
        params![email],
        |row| row.get(0),
    )
}

pub fn credentials_by_email(
    conn: &Connection,
    email: &str,
) -> rusqlite::Result<Option<UserCredentials>> {
    conn.query_row(
        "SELECT id, password_hash, password_salt FROM users WHERE email = ?1",
        params![email],
        |row| {
            Ok(UserCredentials {
                user_id: row.get(0)?,
                password_hash: row.get(1)?,
                password_salt: row.get(2)?,
            })
        },
    )
    .optional()
}

pub fn update_user_progress(
    conn: &Connection,
    user_id: &str,
    progress: &UserProgress,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users
         SET xp = ?1, level = ?2, current_streak = ?3, longest_streak = ?4,
             last_active_date = ?5, discipline_score = ?6, total_tasks_completed = ?7
         WHERE id = ?8",
        params![
            i64::try_from(progress.xp).unwrap_or(i64::MAX),
            progress.level,
            progress.streak.current_streak,
            progress.streak.longest_streak,
            progress.streak.last_active_date,
            progress.discipline_score,
            progress.total_tasks_completed,
            user_id
        ],
    )?;
    Ok(())
}

pub fn update_user_streak(
    conn: &Connection,
    user_id: &str,
    streak: &StreakState,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET current_streak = ?1, longest_streak = ?2, last_active_date = ?3 WHERE id = ?4",
        params![
            streak.current_streak,
            streak.longest_streak,
            streak.last_active_date,
            user_id
        ],
    )?;
    Ok(())
}

pub fn leaderboard(conn: &Connection, limit: usize) -> rusqlite::Result<Vec<LeaderboardRow>> {
    let mut statement = conn.prepare(
        "SELECT username, level, xp, current_streak
         FROM users
         ORDER BY xp DESC, created_at ASC
         LIMIT ?1",
    )?;

    let rows = statement
        .query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(index, (username, level, xp, current_streak))| LeaderboardRow {
            rank: index + 1,
            username,
            level,
            xp,
            current_streak,
        })
        .collect())
}

pub fn insert_session(
    conn: &Connection,
    token_hash: &str,
    user_id: &str,
    created_at: i64,
    expires_at: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![token_hash, user_id, created_at, expires_at],
    )?;
    Ok(())
}

pub fn user_for_session(
    conn: &Connection,
    token_hash: &str,
    now: i64,
) -> rusqlite::Result<Option<UserRow>> {
    let columns = USER_COLUMNS
        .split(", ")
        .map(|column| format!("u.{column}"))
        .collect::<Vec<_>>()
        .join(", ");

    conn.query_row(
        &format!(
            "SELECT {columns} FROM sessions s JOIN users u ON u.id = s.user_id
             WHERE s.token_hash = ?1 AND s.expires_at > ?2"
        ),
        params![token_hash, now],
        user_from_row,
    )
    .optional()
}

pub fn delete_session(conn: &Connection, token_hash: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM sessions WHERE token_hash = ?1",
        params![token_hash],
    )
}

pub fn purge_expired_sessions(conn: &Connection, now: i64) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])
}

pub fn insert_chat_message(
    conn: &Connection,
    user_id: &str,
    role: &str,
    content: &str,
    created_at: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO chat_history (user_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, role, content, created_at],
    )?;
    Ok(())
}

/// Most recent `limit` messages, oldest first.
pub fn recent_chat_messages(
    conn: &Connection,
    user_id: &str,
    limit: usize,
) -> rusqlite::Result<Vec<ChatMessageRow>> {
    let mut statement = conn.prepare(
        "SELECT role, content, created_at FROM chat_history
         WHERE user_id = ?1
         ORDER BY id DESC
         LIMIT ?2",
    )?;

    let mut rows = statement
        .query_map(params![user_id, limit as i64], |row| {
            Ok(ChatMessageRow {
                role: row.get(0)?,
                content: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.reverse();

    Ok(rows)
}

pub fn unlocked_achievements(
    conn: &Connection,
    user_id: &str,
) -> rusqlite::Result<Vec<(String, i64)>> {
    let mut statement = conn.prepare(
        "SELECT achievement_id, unlocked_at FROM achievements WHERE user_id = ?1",
    )?;

    statement
        .query_map(params![user_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect()
}

pub fn unlock_achievement(
    conn: &Connection,
    user_id: &str,
    achievement_id: &str,
    unlocked_at: i64,
) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO achievements (user_id, achievement_id, unlocked_at) VALUES (?1, ?2, ?3)",
        params![user_id, achievement_id, unlocked_at],
    )?;
    Ok(inserted == 1)
}

pub fn non_negative_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

pub fn non_negative_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

pub fn stored_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Database;
    use tempfile::TempDir;

    pub fn temp_database() -> (TempDir, Database) {
        let dir = TempDir::new().expect("temp dir");
        let database = Database::open(&dir.path().join("levelup.db")).expect("open database");
        (dir, database)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::temp_database;

    #[test]
    fn open_creates_schema_and_seeds_learning_catalog() {
        let (_dir, database) = temp_database();

        let content_count: i64 = database
            .conn()
            .query_row("SELECT COUNT(*) FROM learning_content", [], |row| row.get(0))
            .expect("count content");
        assert!(content_count > 0);
        assert_eq!(database.count_users().expect("count users"), 0);
    }
}
