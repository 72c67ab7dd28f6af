use crate::ai::{self, CoachMessage, CoachReply};
use crate::analytics::{self, Dashboard, report::DaySummary};
use crate::api::{ApiResult, ApiState, AuthUser};
use crate::db::activities::{BossChallengeRow, FocusSessionRow, TaskRow};
use crate::db::{self, ChatMessageRow, LeaderboardRow, UserRow};
use crate::error::TrackerError;
use crate::service::achievements::{self, AchievementView};
use crate::service::auth::{self, AuthSession, Credentials, Registration};
use crate::service::boss::{self, BossCompletion, ExamResult, ExamSheet, ExamSubmission};
use crate::service::focus::{self, FocusCompletion, StartFocus};
use crate::service::learning::{self, LearningCompletion, LearningItem};
use crate::service::quests::{self, QuestCompletion, QuestSubmission, QuestType, QuestView};
use crate::service::tasks::{self, NewTask, TaskCompletion, TaskUpdate, TaskUpdateResult};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

const LEADERBOARD_DEFAULT: usize = 10;
const LEADERBOARD_MAX: usize = 100;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/me", get(me))
        .route("/api/v1/tasks", get(task_list).post(task_create))
        .route("/api/v1/tasks/:id", patch(task_update).delete(task_delete))
        .route("/api/v1/tasks/:id/complete", post(task_complete))
        .route("/api/v1/focus/start", post(focus_start))
        .route("/api/v1/focus/history", get(focus_history))
        .route("/api/v1/focus/:id/complete", post(focus_complete))
        .route("/api/v1/boss-challenge/today", get(boss_today))
        .route("/api/v1/boss-challenge/submit-exam", post(boss_submit_exam))
        .route("/api/v1/boss-challenge/:id/complete", post(boss_complete))
        .route("/api/v1/boss-challenge/:id/generate-exam", post(boss_generate_exam))
        .route("/api/v1/quests/:id", get(quest_list))
        .route("/api/v1/quests/:id/complete", post(quest_complete))
        .route("/api/v1/learning", get(learning_list))
        .route("/api/v1/learning/:id/complete", post(learning_complete))
        .route("/api/v1/analytics/dashboard", get(analytics_dashboard))
        .route("/api/v1/analytics/weekly", get(analytics_weekly))
        .route("/api/v1/achievements", get(achievement_list))
        .route("/api/v1/leaderboard", get(leaderboard))
        .route("/api/v1/ai-coach/chat", post(coach_chat))
        .route("/api/v1/ai-coach/history", get(coach_history))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct TaskQuery {
    completed: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct LearningQuery {
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DashboardQuery {
    days: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ExamSubmitPayload {
    exam_id: String,
    #[serde(default)]
    answers: Vec<String>,
}

#[derive(Debug, Serialize)]
struct HealthPayload {
    status: &'static str,
    variant: &'static str,
    version: &'static str,
}

async fn health(State(state): State<ApiState>) -> Json<HealthPayload> {
    Json(HealthPayload {
        status: "healthy",
        variant: state.engine.variant().as_str(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn register(
    State(state): State<ApiState>,
    Json(payload): Json<Registration>,
) -> ApiResult<(StatusCode, Json<AuthSession>)> {
    let session = state
        .blocking(move |database, _, config| {
            auth::register(database, &payload, config.session_ttl_hours, Utc::now())
        })
        .await?;

    Ok((StatusCode::CREATED, Json(session)))
}

async fn login(
    State(state): State<ApiState>,
    Json(payload): Json<Credentials>,
) -> ApiResult<Json<AuthSession>> {
    let session = state
        .blocking(move |database, _, config| {
            auth::login(database, &payload, config.session_ttl_hours, Utc::now())
        })
        .await?;

    Ok(Json(session))
}

async fn logout(State(state): State<ApiState>, caller: AuthUser) -> ApiResult<Json<Value>> {
    let token = caller.token;
    state
        .blocking(move |database, _, _| auth::logout(database.conn(), &token))
        .await?;

    Ok(Json(json!({ "logged_out": true })))
}

async fn me(caller: AuthUser) -> Json<UserRow> {
    Json(caller.user)
}

async fn task_list(
    State(state): State<ApiState>,
    caller: AuthUser,
    Query(query): Query<TaskQuery>,
) -> ApiResult<Json<Vec<TaskRow>>> {
    let user_id = caller.user.id;
    let rows = state
        .blocking(move |database, _, _| {
            tasks::list_tasks(database.conn(), &user_id, query.completed)
        })
        .await?;

    Ok(Json(rows))
}

async fn task_create(
    State(state): State<ApiState>,
    caller: AuthUser,
    Json(payload): Json<NewTask>,
) -> ApiResult<(StatusCode, Json<TaskRow>)> {
    let user_id = caller.user.id;
    let task = state
        .blocking(move |database, engine, _| {
            tasks::create_task(database, engine, &user_id, &payload, Utc::now())
        })
        .await?;

    Ok((StatusCode::CREATED, Json(task)))
}

async fn task_update(
    State(state): State<ApiState>,
    caller: AuthUser,
    Path(task_id): Path<String>,
    Json(payload): Json<TaskUpdate>,
) -> ApiResult<Json<TaskUpdateResult>> {
    let user_id = caller.user.id;
    let result = state
        .blocking(move |database, engine, _| {
            tasks::update_task(database, engine, &user_id, &task_id, &payload, Utc::now())
        })
        .await?;

    Ok(Json(result))
}

async fn task_delete(
    State(state): State<ApiState>,
    caller: AuthUser,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let user_id = caller.user.id;
    state
        .blocking(move |database, _, _| tasks::delete_task(database.conn(), &user_id, &task_id))
        .await?;

    Ok(Json(json!({ "deleted": true })))
}

async fn task_complete(
    State(state): State<ApiState>,
    caller: AuthUser,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskCompletion>> {
    let user_id = caller.user.id;
    let completion = state
        .blocking(move |database, engine, _| {
            tasks::complete_task(database, engine, &user_id, &task_id, Utc::now())
        })
        .await?;

    Ok(Json(completion))
}

async fn focus_start(
    State(state): State<ApiState>,
    caller: AuthUser,
    Json(payload): Json<StartFocus>,
) -> ApiResult<(StatusCode, Json<FocusSessionRow>)> {
    let user_id = caller.user.id;
    let session = state
        .blocking(move |database, _, _| {
            focus::start_session(database, &user_id, &payload, Utc::now())
        })
        .await?;

    Ok((StatusCode::CREATED, Json(session)))
}

async fn focus_complete(
    State(state): State<ApiState>,
    caller: AuthUser,
    Path(session_id): Path<String>,
) -> ApiResult<Json<FocusCompletion>> {
    let user_id = caller.user.id;
    let completion = state
        .blocking(move |database, engine, _| {
            focus::complete_session(database, engine, &user_id, &session_id, Utc::now())
        })
        .await?;

    Ok(Json(completion))
}

async fn focus_history(
    State(state): State<ApiState>,
    caller: AuthUser,
) -> ApiResult<Json<Vec<FocusSessionRow>>> {
    let user_id = caller.user.id;
    let rows = state
        .blocking(move |database, _, _| focus::history(database.conn(), &user_id))
        .await?;

    Ok(Json(rows))
}

async fn boss_today(
    State(state): State<ApiState>,
    caller: AuthUser,
) -> ApiResult<Json<BossChallengeRow>> {
    let user_id = caller.user.id;
    let challenge = state
        .blocking(move |database, _, _| {
            boss::today_challenge(database, &user_id, &mut rand::thread_rng(), Utc::now())
        })
        .await?;

    Ok(Json(challenge))
}

async fn boss_complete(
    State(state): State<ApiState>,
    caller: AuthUser,
    Path(challenge_id): Path<String>,
) -> ApiResult<Json<BossCompletion>> {
    let user_id = caller.user.id;
    let completion = state
        .blocking(move |database, engine, _| {
            boss::complete_challenge(database, engine, &user_id, &challenge_id, Utc::now())
        })
        .await?;

    Ok(Json(completion))
}

async fn boss_generate_exam(
    State(state): State<ApiState>,
    caller: AuthUser,
    Path(challenge_id): Path<String>,
) -> ApiResult<Json<ExamSheet>> {
    let user_id = caller.user.id;
    let sheet = state
        .blocking(move |database, engine, _| {
            boss::generate_exam(
                database,
                engine,
                &user_id,
                &challenge_id,
                &mut rand::thread_rng(),
                Utc::now(),
            )
        })
        .await?;

    Ok(Json(sheet))
}

async fn boss_submit_exam(
    State(state): State<ApiState>,
    caller: AuthUser,
    Json(payload): Json<ExamSubmitPayload>,
) -> ApiResult<Json<ExamResult>> {
    let user_id = caller.user.id;
    let submission = ExamSubmission {
        answers: payload.answers,
    };
    let exam_id = payload.exam_id;

    let result = state
        .blocking(move |database, engine, _| {
            boss::submit_exam(
                database,
                engine,
                &user_id,
                &exam_id,
                &submission,
                &mut rand::thread_rng(),
                Utc::now(),
            )
        })
        .await?;

    Ok(Json(result))
}

async fn quest_list(
    State(state): State<ApiState>,
    caller: AuthUser,
    Path(quest_type): Path<String>,
) -> ApiResult<Json<Vec<QuestView>>> {
    let quest_type = QuestType::parse(&quest_type)?;
    let user_id = caller.user.id;
    let views = state
        .blocking(move |database, _, _| {
            quests::list_quests(database, &user_id, quest_type, Utc::now())
        })
        .await?;

    Ok(Json(views))
}

async fn quest_complete(
    State(state): State<ApiState>,
    caller: AuthUser,
    Path(quest_id): Path<String>,
    payload: Option<Json<QuestSubmission>>,
) -> ApiResult<Json<QuestCompletion>> {
    let user_id = caller.user.id;
    let submission = payload.map(|Json(body)| body).unwrap_or_default();
    let completion = state
        .blocking(move |database, engine, _| {
            quests::complete_quest(database, engine, &user_id, &quest_id, &submission, Utc::now())
        })
        .await?;

    Ok(Json(completion))
}

async fn learning_list(
    State(state): State<ApiState>,
    caller: AuthUser,
    Query(query): Query<LearningQuery>,
) -> ApiResult<Json<Vec<LearningItem>>> {
    let user_id = caller.user.id;
    let items = state
        .blocking(move |database, _, _| {
            learning::catalog(database.conn(), &user_id, query.category.as_deref())
        })
        .await?;

    Ok(Json(items))
}

async fn learning_complete(
    State(state): State<ApiState>,
    caller: AuthUser,
    Path(content_id): Path<String>,
) -> ApiResult<Json<LearningCompletion>> {
    let user_id = caller.user.id;
    let completion = state
        .blocking(move |database, engine, _| {
            learning::complete(database, engine, &user_id, &content_id, Utc::now())
        })
        .await?;

    Ok(Json(completion))
}

async fn analytics_dashboard(
    State(state): State<ApiState>,
    caller: AuthUser,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<Dashboard>> {
    let user = caller.user;
    let dashboard = state
        .blocking(move |database, engine, _| {
            analytics::dashboard(database.conn(), engine, &user, query.days, Utc::now())
        })
        .await?;

    Ok(Json(dashboard))
}

async fn analytics_weekly(
    State(state): State<ApiState>,
    caller: AuthUser,
) -> ApiResult<Json<Vec<DaySummary>>> {
    let user_id = caller.user.id;
    let series = state
        .blocking(move |database, _, _| analytics::weekly(database.conn(), &user_id, Utc::now()))
        .await?;

    Ok(Json(series))
}

async fn achievement_list(
    State(state): State<ApiState>,
    caller: AuthUser,
) -> ApiResult<Json<Vec<AchievementView>>> {
    let user_id = caller.user.id;
    let views = state
        .blocking(move |database, _, _| achievements::list(database.conn(), &user_id))
        .await?;

    Ok(Json(views))
}

async fn leaderboard(
    State(state): State<ApiState>,
    _caller: AuthUser,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Json<Vec<LeaderboardRow>>> {
    let limit = query
        .limit
        .unwrap_or(LEADERBOARD_DEFAULT)
        .clamp(1, LEADERBOARD_MAX);
    let rows = state
        .blocking(move |database, _, _| {
            db::leaderboard(database.conn(), limit).map_err(TrackerError::from)
        })
        .await?;

    Ok(Json(rows))
}

async fn coach_chat(
    State(state): State<ApiState>,
    caller: AuthUser,
    Json(payload): Json<CoachMessage>,
) -> ApiResult<Json<CoachReply>> {
    let user_id = caller.user.id;
    let reply = state
        .blocking(move |database, _, config| {
            ai::chat(config, database, &user_id, &payload, Utc::now())
        })
        .await?;

    Ok(Json(reply))
}

async fn coach_history(
    State(state): State<ApiState>,
    caller: AuthUser,
) -> ApiResult<Json<Vec<ChatMessageRow>>> {
    let user_id = caller.user.id;
    let rows = state
        .blocking(move |database, _, _| ai::history(database.conn(), &user_id))
        .await?;

    Ok(Json(rows))
}
