use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::types::AppState;

/// GET /health
pub async fn get_health(State(s): State<Arc<AppState>>) -> Response {
    let entries = s.store().len();
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "catalog_courses": s.catalog.len(),
            "selected_sessions": entries,
        })),
    )
        .into_response()
}

/// GET /terms
/// Returns the term table and the default term
pub async fn get_terms(State(s): State<Arc<AppState>>) -> Response {
    info!("GET /terms");
    let terms: Vec<_> = s
        .config
        .terms
        .iter()
        .map(|(code, name)| json!({ "code": code, "name": name }))
        .collect();

    (
        StatusCode::OK,
        Json(json!({
            "terms": terms,
            "default": s.config.default_term,
        })),
    )
        .into_response()
}

/// GET /grid
/// Returns the grid dimensions and its row labels
pub async fn get_grid(State(s): State<Arc<AppState>>) -> Response {
    info!("GET /grid");
    let rows: Vec<_> = s
        .grid
        .labels()
        .iter()
        .enumerate()
        .map(|(row, time)| {
            json!({
                "row": row,
                "time": time,
                "label": time.to_12_hour(),
            })
        })
        .collect();

    (
        StatusCode::OK,
        Json(json!({
            "config": s.grid.config(),
            "rows": rows,
        })),
    )
        .into_response()
}
