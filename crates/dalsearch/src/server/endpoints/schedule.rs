use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::schedule::{export, layout_view, ClassSession, Day, StorageError, ViewMode};
use crate::server::types::ApiErrorType;
use crate::types::AppState;

fn storage_error_response(e: StorageError) -> Response {
    error!("Failed to persist schedule: {}", e);
    ApiErrorType::from((
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to save schedule",
        Some(e.to_string()),
    ))
    .into_response()
}

/// GET /schedule
/// Returns every selected session with its colour, in insertion order
pub async fn get_schedule(State(s): State<Arc<AppState>>) -> Response {
    info!("GET /schedule");
    let store = s.store();
    (StatusCode::OK, Json(store.list())).into_response()
}

/// PUT /schedule
/// Replaces the whole selection with the given sessions
pub async fn put_schedule(
    State(s): State<Arc<AppState>>,
    Json(sessions): Json<Vec<ClassSession>>,
) -> Response {
    info!("PUT /schedule ({} sessions)", sessions.len());
    let mut store = s.store();
    match store.replace_all(sessions) {
        Ok(()) => (StatusCode::OK, Json(store.list())).into_response(),
        Err(e) => storage_error_response(e),
    }
}

fn add_session(s: &AppState, session: ClassSession) -> Response {
    let crn = session.crn.clone();
    let mut store = s.store();
    match store.add(session) {
        Ok(added) => {
            let status = if added { StatusCode::CREATED } else { StatusCode::OK };
            let entry = store.list().iter().find(|e| e.session.crn == crn);
            (status, Json(json!({ "added": added, "entry": entry }))).into_response()
        }
        Err(e) => storage_error_response(e),
    }
}

/// POST /schedule/sessions
/// Adds a session; adding a CRN that is already selected changes nothing
pub async fn post_session(
    State(s): State<Arc<AppState>>,
    Json(session): Json<ClassSession>,
) -> Response {
    info!("POST /schedule/sessions crn={}", session.crn);
    add_session(&s, session)
}

/// POST /schedule/crn/:crn
/// Adds the catalog section with this CRN
pub async fn post_session_by_crn(
    Path(crn): Path<String>,
    State(s): State<Arc<AppState>>,
) -> Response {
    info!("POST /schedule/crn/{}", crn);
    let Some(session) = s.catalog.find_session(&crn).cloned() else {
        return ApiErrorType::from((
            StatusCode::NOT_FOUND,
            "Section not found in catalog",
            Some(format!("No section with CRN {}", crn)),
        ))
        .into_response();
    };
    add_session(&s, session)
}

/// DELETE /schedule/sessions/:crn
/// Removing a CRN that is not selected is a no-op
pub async fn delete_session(
    Path(crn): Path<String>,
    State(s): State<Arc<AppState>>,
) -> Response {
    info!("DELETE /schedule/sessions/{}", crn);
    let mut store = s.store();
    match store.remove(&crn) {
        Ok(removed) => (StatusCode::OK, Json(json!({ "removed": removed }))).into_response(),
        Err(e) => storage_error_response(e),
    }
}

/// GET /schedule/term
pub async fn get_active_term(State(s): State<Arc<AppState>>) -> Response {
    let term = s.store().active_term().to_string();
    let name = s.config.terms.get(&term);
    (StatusCode::OK, Json(json!({ "term": term, "name": name }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct TermBody {
    pub term: String,
}

/// PUT /schedule/term
pub async fn put_active_term(
    State(s): State<Arc<AppState>>,
    Json(body): Json<TermBody>,
) -> Response {
    info!("PUT /schedule/term term={}", body.term);
    if !s.config.is_known_term(&body.term) {
        warn!("Rejected unknown term {}", body.term);
        return ApiErrorType::from((
            StatusCode::BAD_REQUEST,
            "Unknown term",
            Some(format!("Term {} is not in the term table", body.term)),
        ))
        .into_response();
    }
    s.store().set_active_term(body.term.clone());
    let name = s.config.terms.get(&body.term);
    (StatusCode::OK, Json(json!({ "term": body.term, "name": name }))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct LayoutQuery {
    /// `week` (default) or `day`
    pub view: Option<String>,
    pub day: Option<Day>,
    /// Defaults to the active term
    pub term: Option<String>,
}

/// Reads the `view` and `day` query parameters.
pub(crate) fn parse_view(view: Option<&str>, day: Option<Day>) -> Result<ViewMode, ApiErrorType> {
    match (view.unwrap_or("week"), day) {
        ("week", _) => Ok(ViewMode::Week),
        ("day", Some(day)) => Ok(ViewMode::Day(day)),
        ("day", None) => Err(ApiErrorType::from((
            StatusCode::BAD_REQUEST,
            "Day view needs a day",
            Some("Pass day=M|T|W|R|F|S".to_string()),
        ))),
        (other, _) => Err(ApiErrorType::from((
            StatusCode::BAD_REQUEST,
            "Unknown view",
            Some(format!("Expected week or day, got {}", other)),
        ))),
    }
}

/// GET /schedule/layout?view=&day=&term=
/// Returns grid geometry for every placed session
pub async fn get_layout(
    State(s): State<Arc<AppState>>,
    Query(query): Query<LayoutQuery>,
) -> Response {
    info!(
        "GET /schedule/layout view={:?} day={:?} term={:?}",
        query.view, query.day, query.term
    );

    let view = match parse_view(query.view.as_deref(), query.day) {
        Ok(view) => view,
        Err(e) => return e.into_response(),
    };

    let store = s.store();
    let term = query
        .term
        .unwrap_or_else(|| store.active_term().to_string());
    let slots = layout_view(store.list(), &term, view, &s.grid);

    (
        StatusCode::OK,
        Json(json!({
            "term": term,
            "view": view,
            "rows": s.grid.num_rows(),
            "slots": slots,
        })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub term: Option<String>,
}

/// GET /schedule/export.ics?term=
/// Returns the term's sessions as an iCalendar file
pub async fn get_export(
    State(s): State<Arc<AppState>>,
    Query(query): Query<ExportQuery>,
) -> Response {
    let entries = {
        let store = s.store();
        let term = query
            .term
            .unwrap_or_else(|| store.active_term().to_string());
        info!("GET /schedule/export.ics term={}", term);
        store.entries_in_term(&term)
    };

    let calendar = export::to_ics(
        entries.iter().map(|e| &e.session),
        &s.config.calendar_time_zone,
    );
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"schedule.ics\"",
            ),
        ],
        calendar,
    )
        .into_response()
}

/// GET /schedule/exams?term=
/// Lists the final exam of every selected session, `null` when none is known
pub async fn get_exams(
    State(s): State<Arc<AppState>>,
    Query(query): Query<ExportQuery>,
) -> Response {
    let entries = {
        let store = s.store();
        let term = query
            .term
            .unwrap_or_else(|| store.active_term().to_string());
        info!("GET /schedule/exams term={}", term);
        store.entries_in_term(&term)
    };

    let exams: Vec<_> = entries
        .iter()
        .map(|entry| {
            let session = &entry.session;
            json!({
                "crn": session.crn,
                "course": session.course,
                "section": session.section,
                "exam": s.catalog.exam_for(session),
            })
        })
        .collect();

    (StatusCode::OK, Json(exams)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_view() {
        assert_eq!(parse_view(None, None).unwrap(), ViewMode::Week);
        assert_eq!(
            parse_view(Some("day"), Some(Day::Wednesday)).unwrap(),
            ViewMode::Day(Day::Wednesday)
        );
        let err = parse_view(Some("day"), None).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        let err = parse_view(Some("month"), None).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
