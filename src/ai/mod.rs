use crate::config::{API_KEY_ENV, Config};
use crate::db::{self, ChatMessageRow, Database, UserRow};
use crate::error::{TrackerError, TrackerResult};
use crate::service::require_user;
use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::warn;

pub const HISTORY_CONTEXT: usize = 10;
const HISTORY_PAGE: usize = 50;
pub const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Debug, Clone, Deserialize)]
pub struct CoachMessage {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoachReply {
    pub response: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ChatTurn {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Sends `message` to the coach with the user's stats and recent history,
/// then stores both sides of the exchange.
pub fn chat(
    config: &Config,
    database: &mut Database,
    user_id: &str,
    input: &CoachMessage,
    now: DateTime<Utc>,
) -> TrackerResult<CoachReply> {
    let message = input.message.trim();
    if message.is_empty() {
        return Err(TrackerError::invalid("message must not be empty"));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(TrackerError::invalid(format!(
            "message must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }
    if !config.ai_enabled {
        return Err(TrackerError::Unavailable("AI coach is disabled".to_string()));
    }
    let api_key = config
        .resolve_api_key()
        .ok_or_else(|| TrackerError::Unavailable("AI coach is not configured".to_string()))?;

    let user = require_user(database.conn(), user_id)?;
    let history = db::recent_chat_messages(database.conn(), user_id, HISTORY_CONTEXT)?;
    let turns = build_turns(&user, &history, message);

    let response = chat_completion(config, &api_key, turns).map_err(|error| {
        warn!(user_id, error = %error, "AI coach request failed");
        TrackerError::Unavailable("AI coach request failed".to_string())
    })?;

    let created_at = now.timestamp();
    database.write(|tx| {
        db::insert_chat_message(tx, user_id, "user", message, created_at)?;
        db::insert_chat_message(tx, user_id, "assistant", &response, created_at)?;
        Ok(())
    })?;

    Ok(CoachReply {
        response,
        created_at,
    })
}

pub fn history(conn: &Connection, user_id: &str) -> TrackerResult<Vec<ChatMessageRow>> {
    Ok(db::recent_chat_messages(conn, user_id, HISTORY_PAGE)?)
}

pub fn test_connection(config: &Config) -> Result<String> {
    let api_key = config.resolve_api_key().with_context(|| {
        format!(
            "AI API key is missing. Set `levelup config set ai.api_key <KEY>` or `{API_KEY_ENV}`."
        )
    })?;

    let turns = vec![
        ChatTurn {
            role: "system".to_string(),
            content: "Return exactly one short sentence indicating AI API connectivity is healthy."
                .to_string(),
        },
        ChatTurn {
            role: "user".to_string(),
            content: "Health check for LevelUp.".to_string(),
        },
    ];

    chat_completion(config, &api_key, turns)
}

pub fn has_api_key(config: &Config) -> bool {
    config.resolve_api_key().is_some()
}

fn system_prompt(user: &UserRow) -> String {
    format!(
        "You are the LevelUp coach, an AI productivity coach inside a gamified task tracker.\n\n\
         User stats:\n\
         - Username: {}\n\
         - Level: {}\n\
         - XP: {}\n\
         - Current streak: {} days\n\
         - Discipline score: {}\n\
         - Tasks completed: {}\n\n\
         Give practical productivity advice, celebrate wins and streaks, and keep answers short. \
         RPG metaphors are welcome.",
        user.username,
        user.level,
        user.xp,
        user.current_streak,
        user.discipline_score,
        user.total_tasks_completed,
    )
}

fn build_turns(user: &UserRow, history: &[ChatMessageRow], message: &str) -> Vec<ChatTurn> {
    let system = ChatTurn {
        role: "system".to_string(),
        content: system_prompt(user),
    };

    let past = history.iter().map(|entry| ChatTurn {
        role: if entry.role == "assistant" {
            "assistant".to_string()
        } else {
            "user".to_string()
        },
        content: entry.content.clone(),
    });

    let current = ChatTurn {
        role: "user".to_string(),
        content: message.to_string(),
    };

    std::iter::once(system)
        .chain(past)
        .chain(std::iter::once(current))
        .collect()
}

fn chat_completion(config: &Config, api_key: &str, turns: Vec<ChatTurn>) -> Result<String> {
    let base_url = config.ai_api_base_url.clone();
    let model = config.ai_model.clone();
    let timeout_seconds = config.ai_timeout_seconds.max(5);
    let api_key = api_key.to_string();

    std::thread::spawn(move || {
        chat_completion_blocking(&base_url, &model, timeout_seconds, &api_key, &turns)
    })
    .join()
    .map_err(|_| anyhow!("AI worker thread panicked"))?
}

fn chat_completion_blocking(
    base_url: &str,
    model: &str,
    timeout_seconds: u64,
    api_key: &str,
    turns: &[ChatTurn],
) -> Result<String> {
    if api_key.trim().is_empty() {
        bail!("AI API key is empty");
    }

    let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {api_key}"))
            .context("Failed to build Authorization header")?,
    );

    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .default_headers(headers)
        .build()
        .context("Failed to create AI HTTP client")?;

    let request_body = json!({
        "model": model,
        "temperature": 0.7,
        "messages": turns,
    });

    let response = client
        .post(endpoint)
        .json(&request_body)
        .send()
        .context("AI API request failed")?;

    let status = response.status();
    let body = response.text().context("Failed to read AI response body")?;

    if !status.is_success() {
        bail!("AI API error {}: {}", status, body);
    }

    parse_completion(&body)
}

fn parse_completion(body: &str) -> Result<String> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .with_context(|| format!("Failed to parse AI response: {body}"))?;

    parsed
        .choices
        .first()
        .and_then(|choice| choice.message.content.clone())
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| anyhow!("AI response did not include message.content"))
}
