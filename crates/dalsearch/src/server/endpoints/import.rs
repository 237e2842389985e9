//! Endpoints that pull a student's timetable from the records portal.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::import::{fold_records, Credentials, ImportError, SessionToken};
use crate::server::types::ApiErrorType;
use crate::types::AppState;

/// How the portal session is obtained for an import.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ImportAuth {
    Token { token: SessionToken },
    Credentials(Credentials),
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    #[serde(flatten)]
    pub auth: ImportAuth,
    /// Any day in the week to import; defaults to today
    pub date: Option<NaiveDate>,
    /// Term the imported sessions belong to; defaults to the active term
    pub term: Option<String>,
    /// Overrides the configured import deadline
    pub timeout_secs: Option<u64>,
}

/// Picks the import deadline. Zero is rejected and longer requests are capped
/// at the configured deadline.
fn resolve_deadline(requested: Option<u64>, configured: Duration) -> Result<Duration, ApiErrorType> {
    match requested {
        None => Ok(configured),
        Some(0) => Err(ApiErrorType::from((
            StatusCode::BAD_REQUEST,
            "Invalid timeout_secs",
            Some("timeout_secs must be at least 1".to_string()),
        ))),
        Some(secs) => Ok(Duration::from_secs(secs).min(configured)),
    }
}

/// Converts ImportError to API response.
fn import_error_to_response(error: ImportError) -> Response {
    let (status, message) = match &error {
        ImportError::Authentication { .. } => {
            (StatusCode::UNAUTHORIZED, "Portal authentication failed")
        }
        ImportError::TableNotFound => (
            StatusCode::BAD_GATEWAY,
            "Portal page did not contain a timetable",
        ),
        ImportError::Network { .. } | ImportError::UnexpectedResponse { .. } => {
            (StatusCode::BAD_GATEWAY, "Portal request failed")
        }
        ImportError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "Portal import timed out"),
        ImportError::CircuitBreakerOpen => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Service temporarily unavailable due to repeated failures",
        ),
        ImportError::UrlError { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Portal URL is misconfigured",
        ),
    };

    ApiErrorType::from((status, message, Some(error.to_string()))).into_response()
}

/// POST /import
///
/// Fetches the portal timetable and replaces the whole selection with it.
/// The body carries either `netid` and `password` or a `token` from
/// `POST /import/login`.
pub async fn post_import(
    State(s): State<Arc<AppState>>,
    Json(request): Json<ImportRequest>,
) -> Response {
    info!("POST /import date={:?} term={:?}", request.date, request.term);

    let deadline = match resolve_deadline(request.timeout_secs, s.portal.default_deadline()) {
        Ok(deadline) => deadline,
        Err(e) => return e.into_response(),
    };
    if let Some(term) = &request.term {
        if !s.config.is_known_term(term) {
            return ApiErrorType::from((
                StatusCode::BAD_REQUEST,
                "Unknown term",
                Some(format!("Term {} is not configured", term)),
            ))
            .into_response();
        }
    }

    let result = match &request.auth {
        ImportAuth::Credentials(credentials) => {
            s.portal
                .import_schedule(credentials, request.date, deadline)
                .await
        }
        ImportAuth::Token { token } => {
            s.portal
                .import_with_token(token, request.date, deadline)
                .await
        }
    };

    let records = match result {
        Ok(records) => records,
        Err(e) => {
            error!("Schedule import failed: {}", e);
            return import_error_to_response(e);
        }
    };

    let mut store = s.store();
    let term = request
        .term
        .unwrap_or_else(|| store.active_term().to_string());
    let sessions = fold_records(records, &term);
    let imported = sessions.len();

    match store.replace_all(sessions) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "imported": imported,
                "term": term,
                "entries": store.list(),
            })),
        )
            .into_response(),
        Err(e) => ApiErrorType::from((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to save imported schedule",
            Some(e.to_string()),
        ))
        .into_response(),
    }
}

/// POST /import/login
///
/// Logs in to the portal and returns the session token for later imports.
pub async fn post_login(
    State(s): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Response {
    info!("POST /import/login netid={}", credentials.netid);

    let login = s.portal.login(&credentials);
    match tokio::time::timeout(s.portal.default_deadline(), login).await {
        Ok(Ok(token)) => (StatusCode::OK, Json(json!({ "token": token }))).into_response(),
        Ok(Err(e)) => import_error_to_response(e),
        Err(_) => import_error_to_response(ImportError::Timeout(s.portal.default_deadline())),
    }
}

/// GET /import/cache_stats
///
/// Returns cache statistics for monitoring.
pub async fn get_cache_stats(State(s): State<Arc<AppState>>) -> Response {
    let cache_state = s.portal.cache_state();
    let stats = cache_state.cache.stats();
    (
        StatusCode::OK,
        Json(json!({
            "total_entries": stats.total_entries,
            "active_entries": stats.active_entries,
            "expired_entries": stats.expired_entries,
            "circuit_breaker_open": cache_state.circuit_breaker.is_open(),
            "recent_failures": cache_state.circuit_breaker.failure_count(),
        })),
    )
        .into_response()
}

/// POST /import/invalidate_cache
///
/// Clears cached timetables and closes the circuit breaker.
pub async fn invalidate_cache(State(s): State<Arc<AppState>>) -> Response {
    info!("POST /import/invalidate_cache");

    let cache_state = s.portal.cache_state();
    cache_state.cache.clear();
    cache_state.circuit_breaker.reset();

    (StatusCode::OK, Json(json!({ "message": "Cache invalidated" }))).into_response()
}
