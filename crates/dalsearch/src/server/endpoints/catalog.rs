use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

use crate::catalog::{CourseFilter, CourseOrderBy, Direction, OrderKey};
use crate::schedule::{layout_view, Day};
use crate::server::endpoints::schedule::parse_view;
use crate::server::types::ApiErrorType;
use crate::types::AppState;

const DEFAULT_LIMIT: usize = 100;
/// Most values accepted in any one list parameter
const LIST_LIMIT: usize = 50;

/// Query parameters for catalog search. List parameters are comma-separated.
#[derive(Debug, Default, Deserialize)]
pub struct CourseQuery {
    pub q: Option<String>,
    pub terms: Option<String>,
    pub levels: Option<String>,
    pub subjects: Option<String>,
    pub credit_hours: Option<String>,
    pub order_by: Option<OrderKey>,
    pub direction: Option<Direction>,
    pub limit: Option<usize>,
}

fn split_list(raw: &Option<String>) -> Result<Option<Vec<String>>, ApiErrorType> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let values: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    if values.len() > LIST_LIMIT {
        return Err(ApiErrorType::from((
            StatusCode::PAYLOAD_TOO_LARGE,
            "Payload too large",
            Some(format!("At most {} values per list", LIST_LIMIT)),
        )));
    }
    Ok(Some(values))
}

fn to_set(values: Option<Vec<String>>, upper: bool) -> Option<HashSet<String>> {
    values.map(|values| {
        values
            .into_iter()
            .map(|v| if upper { v.to_uppercase() } else { v })
            .collect()
    })
}

impl CourseQuery {
    fn to_filter(&self) -> Result<CourseFilter, ApiErrorType> {
        let credit_hours = match split_list(&self.credit_hours)? {
            None => None,
            Some(values) => Some(
                values
                    .iter()
                    .map(|v| v.parse::<f64>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| {
                        ApiErrorType::from((
                            StatusCode::BAD_REQUEST,
                            "Invalid credit_hours",
                            Some(e.to_string()),
                        ))
                    })?,
            ),
        };

        Ok(CourseFilter {
            search_term: self.q.clone().unwrap_or_default(),
            terms: to_set(split_list(&self.terms)?, false),
            course_levels: to_set(split_list(&self.levels)?, false),
            subject_codes: to_set(split_list(&self.subjects)?, true),
            credit_hours,
        })
    }

    fn order_by(&self) -> CourseOrderBy {
        CourseOrderBy {
            key: self.order_by.unwrap_or_default(),
            direction: self.direction.unwrap_or_default(),
        }
    }
}

/// GET /catalog/courses
/// Filters and orders the catalog
pub async fn get_courses(
    State(s): State<Arc<AppState>>,
    Query(query): Query<CourseQuery>,
) -> Response {
    info!("GET /catalog/courses {:?}", query);

    let filter = match query.to_filter() {
        Ok(filter) => filter,
        Err(e) => return e.into_response(),
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    let courses = s.catalog.filter(&filter, query.order_by(), limit);

    (StatusCode::OK, Json(courses)).into_response()
}

/// GET /catalog/courses/:code
pub async fn get_course(Path(code): Path<String>, State(s): State<Arc<AppState>>) -> Response {
    info!("GET /catalog/courses/{}", code);

    match s.catalog.get(&code) {
        Some(course) => (StatusCode::OK, Json(course)).into_response(),
        None => ApiErrorType::from((
            StatusCode::NOT_FOUND,
            "Course not found",
            Some(format!("No course with code {}", code)),
        ))
        .into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RoomQuery {
    /// Case-insensitive substring of the room or building name
    pub q: Option<String>,
    /// Only count sessions in this term
    pub term: Option<String>,
}

/// GET /catalog/rooms?q=&term=
/// Lists rooms that host timed sessions, with how many they host
pub async fn get_rooms(
    State(s): State<Arc<AppState>>,
    Query(query): Query<RoomQuery>,
) -> Response {
    info!("GET /catalog/rooms {:?}", query);

    let needle = query.q.as_deref().unwrap_or_default().to_lowercase();
    let rooms: Vec<_> = s
        .catalog
        .sessions_by_room()
        .into_iter()
        .filter(|(room, _)| room.to_lowercase().contains(&needle))
        .filter_map(|(room, sessions)| {
            let count = sessions
                .iter()
                .filter(|session| query.term.as_ref().map_or(true, |t| &session.term == t))
                .count();
            (count > 0).then(|| json!({ "room": room, "sessions": count }))
        })
        .collect();

    (StatusCode::OK, Json(rooms)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct RoomLayoutQuery {
    pub room: String,
    /// `week` (default) or `day`
    pub view: Option<String>,
    pub day: Option<Day>,
    /// Defaults to the active term
    pub term: Option<String>,
}

/// GET /catalog/rooms/layout?room=&view=&day=&term=
/// Lays out everything booked in one room the same way as a student's grid
pub async fn get_room_layout(
    State(s): State<Arc<AppState>>,
    Query(query): Query<RoomLayoutQuery>,
) -> Response {
    info!(
        "GET /catalog/rooms/layout room={} view={:?} day={:?} term={:?}",
        query.room, query.view, query.day, query.term
    );

    let view = match parse_view(query.view.as_deref(), query.day) {
        Ok(view) => view,
        Err(e) => return e.into_response(),
    };
    let entries = s.catalog.room_entries(&query.room);
    if entries.is_empty() {
        return ApiErrorType::from((
            StatusCode::NOT_FOUND,
            "Room not found",
            Some(format!("No timed sessions in {}", query.room)),
        ))
        .into_response();
    }
    let term = query
        .term
        .unwrap_or_else(|| s.store().active_term().to_string());
    let slots = layout_view(&entries, &term, view, &s.grid);

    (
        StatusCode::OK,
        Json(json!({
            "room": query.room,
            "term": term,
            "view": view,
            "rows": s.grid.num_rows(),
            "slots": slots,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_to_filter() {
        let query = CourseQuery {
            q: Some("data".to_string()),
            terms: Some("202520, 202610".to_string()),
            subjects: Some("csci,math".to_string()),
            credit_hours: Some("3,1.5".to_string()),
            ..Default::default()
        };
        let filter = query.to_filter().unwrap();
        assert_eq!(filter.search_term, "data");
        assert_eq!(filter.terms.unwrap().len(), 2);
        assert!(filter.subject_codes.unwrap().contains("CSCI"));
        assert_eq!(filter.credit_hours, Some(vec![3.0, 1.5]));
        assert!(filter.course_levels.is_none());
    }

    #[test]
    fn test_query_rejects_bad_credit_hours() {
        let query = CourseQuery {
            credit_hours: Some("three".to_string()),
            ..Default::default()
        };
        let err = query.to_filter().unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_query_rejects_long_lists() {
        let query = CourseQuery {
            subjects: Some(vec!["CSCI"; LIST_LIMIT + 1].join(",")),
            ..Default::default()
        };
        let err = query.to_filter().unwrap_err();
        assert_eq!(err.status, StatusCode::PAYLOAD_TOO_LARGE);
    }
}
