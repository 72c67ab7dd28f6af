pub mod routes;

use crate::config::Config;
use crate::db::{Database, UserRow};
use crate::engine::Engine;
use crate::error::{TrackerError, TrackerResult};
use crate::service::auth;
use anyhow::{Context, Result, anyhow};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    pub engine: Arc<Engine>,
}

impl ApiState {
    pub fn new(config: Arc<Config>) -> Self {
        let engine = Arc::new(Engine::new(config.variant));
        Self { config, engine }
    }

    /// Runs `work` on the blocking pool with a fresh connection.
    pub async fn blocking<T, F>(&self, work: F) -> ApiResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Database, &Engine, &Config) -> TrackerResult<T> + Send + 'static,
    {
        let config = Arc::clone(&self.config);
        let engine = Arc::clone(&self.engine);

        let outcome = tokio::task::spawn_blocking(move || {
            let mut database = Database::open(&config.db_path)?;
            work(&mut database, &engine, &config)
        })
        .await
        .map_err(|join_error| {
            TrackerError::Internal(anyhow!("blocking task failed: {join_error}"))
        })?;

        outcome.map_err(ApiError::from)
    }
}

pub async fn run_server(config: Arc<Config>) -> Result<()> {
    config.ensure_bootstrap_files()?;
    Database::open(&config.db_path)?;

    let addr = SocketAddr::new(config.bind_ip()?, config.api_port);
    let state = ApiState::new(Arc::clone(&config));
    let app: Router = routes::router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server: {addr}"))?;

    info!(address = %addr, variant = config.variant.as_str(), "LevelUp API server started");

    axum::serve(listener, app)
        .await
        .context("API server failed")?;

    Ok(())
}

/// Caller resolved from the `Authorization: Bearer <token>` header.
pub struct AuthUser {
    pub user: UserRow,
    pub token: String,
}

#[axum::async_trait]
impl FromRequestParts<ApiState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> ApiResult<Self> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| TrackerError::Unauthorized("Missing bearer token".to_string()))?
            .to_string();

        let lookup = token.clone();
        let user = state
            .blocking(move |database, _, _| {
                auth::authenticate(database.conn(), &lookup, Utc::now())
            })
            .await?;

        Ok(Self { user, token })
    }
}

fn bearer_token(raw: &str) -> Option<&str> {
    let (scheme, token) = raw.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
pub struct ApiError(TrackerError);

impl<E> From<E> for ApiError
where
    E: Into<TrackerError>,
{
    fn from(value: E) -> Self {
        Self(value.into())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            TrackerError::NotFound(_) => StatusCode::NOT_FOUND,
            TrackerError::AlreadyCompleted(_) | TrackerError::Conflict(_) => StatusCode::CONFLICT,
            TrackerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            TrackerError::Expired(_) => StatusCode::GONE,
            TrackerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            TrackerError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            TrackerError::Storage(_) | TrackerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.0, "request failed");
            "Internal server error".to_string()
        } else {
            self.0.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiError, bearer_token};
    use crate::error::TrackerError;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(bearer_token("bearer   abc123 "), Some("abc123"));
        assert_eq!(bearer_token("Basic abc123"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc123"), None);
    }

    #[test]
    fn domain_errors_map_to_status_codes() {
        let cases = [
            (TrackerError::NotFound("Task".to_string()), StatusCode::NOT_FOUND),
            (TrackerError::AlreadyCompleted("Task".to_string()), StatusCode::CONFLICT),
            (TrackerError::invalid("bad"), StatusCode::BAD_REQUEST),
            (TrackerError::Expired("Quest".to_string()), StatusCode::GONE),
            (TrackerError::Unauthorized("no".to_string()), StatusCode::UNAUTHORIZED),
            (TrackerError::Conflict("taken".to_string()), StatusCode::CONFLICT),
            (TrackerError::Unavailable("off".to_string()), StatusCode::SERVICE_UNAVAILABLE),
            (TrackerError::Internal(anyhow::anyhow!("boom")), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).into_response().status(), expected);
        }
    }
}
