use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::AppState;
use crate::models::generation_model::{generate_schedule, GenerateRequest, GenerateResponse};
use crate::models::meeting_model::{conflict_report, ConflictReportResponse};
use crate::models::schedule_model::{
    group_delete, group_get, group_timetable, groups_get, ScheduleError, ScheduleGroup,
};
use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

#[utoipa::path(
    post,
    path = "/api/v1/schedules/generate",
    request_body(
        content = inline(GenerateRequest),
        description = "Course rows to place"
    ),
    responses(
        (status = 200, description = "Generated schedule group", body = GenerateResponse),
        (status = 400, description = "Bad request", body = ScheduleError),
    )
)]
#[debug_handler]
/// Generates a schedule
///
/// This function is a handler for the route `POST /api/v1/schedules/generate`.
/// It creates a new schedule group and runs the slot-allocation engine over
/// the uploaded course rows.
///
/// # Parameters
/// - `app_state` - Thread-safe shared state wrapped in an Arc and RwLock
/// - `request` - The course rows with term information
///
/// # Returns
/// `Response` with a status code of 200 OK and the generation outcome, or
/// an error response when setup fails (e.g. no input rows).
///
/// # Errors
/// If the generation run cannot even start, a schedule error response with
/// a status code of 400 Bad Request is returned.
pub async fn generate(
    State(app_state): State<Arc<RwLock<AppState>>>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    let app_state_lock = app_state.read().await;
    let db_pool = &app_state_lock.timetable_data.read().await.timetable_db;
    match generate_schedule(db_pool, request).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => ScheduleError::response(StatusCode::BAD_REQUEST, e),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/schedules",
    responses(
        (status = 200, description = "List schedule groups", body = Vec<ScheduleGroup>),
        (status = 400, description = "Bad request", body = ScheduleError),
    )
)]
#[debug_handler]
/// Lists schedule groups
///
/// This function is a handler for the route `GET /api/v1/schedules`. It
/// lists every generation run, newest first, so operators can pick a
/// version to inspect or edit.
pub async fn groups(State(app_state): State<Arc<RwLock<AppState>>>) -> Response {
    let app_state_lock = app_state.read().await;
    let db_pool = &app_state_lock.timetable_data.read().await.timetable_db;
    match groups_get(db_pool).await {
        Ok(groups) => Json(groups).into_response(),
        Err(e) => ScheduleError::response(StatusCode::BAD_REQUEST, e),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/schedules/{id}",
    responses(
        (status = 200, description = "The group's timetable"),
        (status = 404, description = "Group not found", body = ScheduleError),
    )
)]
#[debug_handler]
/// Retrieves one schedule group with its timetable
///
/// This function is a handler for the route `GET /api/v1/schedules/{id}`.
/// It returns the group and its entries joined with their meetings.
pub async fn get_group(
    State(app_state): State<Arc<RwLock<AppState>>>,
    Path(group_id): Path<i32>,
) -> Response {
    let app_state_lock = app_state.read().await;
    let db_pool = &app_state_lock.timetable_data.read().await.timetable_db;

    let group = match group_get(db_pool, group_id).await {
        Ok(Some(group)) => group,
        Ok(None) => {
            return ScheduleError::response(
                StatusCode::NOT_FOUND,
                format!("schedule group {group_id} doesn't exist").into(),
            );
        }
        Err(e) => return ScheduleError::response(StatusCode::BAD_REQUEST, e),
    };

    match group_timetable(db_pool, group_id).await {
        Ok(entries) => Json(serde_json::json!({
            "group": group,
            "entries": entries,
        }))
        .into_response(),
        Err(e) => ScheduleError::response(StatusCode::BAD_REQUEST, e),
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/schedules/{id}",
    responses(
        (status = 200, description = "Deleted schedule group"),
        (status = 400, description = "Bad request", body = ScheduleError),
    )
)]
#[debug_handler]
/// Deletes a schedule group
///
/// This function is a handler for the route `DELETE /api/v1/schedules/{id}`.
/// Dropping a draft version removes its entries and meetings with it.
pub async fn delete_group(
    State(app_state): State<Arc<RwLock<AppState>>>,
    Path(group_id): Path<i32>,
) -> Response {
    let app_state_lock = app_state.read().await;
    let db_pool = &app_state_lock.timetable_data.read().await.timetable_db;
    match group_delete(db_pool, group_id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => ScheduleError::response(StatusCode::BAD_REQUEST, e),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/schedules/{id}/conflicts",
    responses(
        (status = 200, description = "Clustered conflicts for the group", body = ConflictReportResponse),
        (status = 400, description = "Bad request", body = ScheduleError),
    )
)]
#[debug_handler]
/// Reports clustered conflicts for a group
///
/// This function is a handler for the route
/// `GET /api/v1/schedules/{id}/conflicts`. It groups mutually overlapping
/// meetings per instructor, room and section for reporting.
pub async fn conflicts(
    State(app_state): State<Arc<RwLock<AppState>>>,
    Path(group_id): Path<i32>,
) -> Response {
    let app_state_lock = app_state.read().await;
    let db_pool = &app_state_lock.timetable_data.read().await.timetable_db;
    match conflict_report(db_pool, group_id).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => ScheduleError::response(StatusCode::BAD_REQUEST, e),
    }
}
