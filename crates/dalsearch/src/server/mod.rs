use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::server::endpoints::{catalog, import, schedule, status};
use crate::types::AppState;

mod endpoints;
mod types;

pub use types::{ApiErrorBody, ApiErrorType};

/// Creates a router that can be used by `axum`.
///
/// # Parameters
/// - `app_state`: The app server state.
///
/// # Returns
/// The router.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let schedule_router = Router::new()
        .route(
            "/schedule",
            get(schedule::get_schedule).put(schedule::put_schedule),
        )
        .route("/schedule/sessions", post(schedule::post_session))
        .route("/schedule/sessions/:crn", delete(schedule::delete_session))
        .route("/schedule/crn/:crn", post(schedule::post_session_by_crn))
        .route(
            "/schedule/term",
            get(schedule::get_active_term).put(schedule::put_active_term),
        )
        .route("/schedule/layout", get(schedule::get_layout))
        .route("/schedule/export.ics", get(schedule::get_export))
        .route("/schedule/exams", get(schedule::get_exams));

    let import_router = Router::new()
        .route("/import", post(import::post_import))
        .route("/import/login", post(import::post_login))
        .route("/import/cache_stats", get(import::get_cache_stats))
        .route("/import/invalidate_cache", post(import::invalidate_cache));

    let catalog_router = Router::new()
        .route("/catalog/courses", get(catalog::get_courses))
        .route("/catalog/courses/:code", get(catalog::get_course))
        .route("/catalog/rooms", get(catalog::get_rooms))
        .route("/catalog/rooms/layout", get(catalog::get_room_layout));

    Router::new()
        .route("/health", get(status::get_health))
        .route("/terms", get(status::get_terms))
        .route("/grid", get(status::get_grid))
        .merge(schedule_router)
        .merge(import_router)
        .merge(catalog_router)
        .with_state(app_state)
}
