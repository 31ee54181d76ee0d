use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::AppState;
use crate::models::meeting_model::{
    suggest_for_edit, update_meeting_checked, validate_meeting_edit, SuggestForm, SuggestResponse,
    UpdateMeetingForm, UpdateMeetingResponse, ValidateEditForm, ValidateEditResponse,
};
use crate::models::schedule_model::ScheduleError;
use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

#[utoipa::path(
    post,
    path = "/api/v1/schedules/validate-edit",
    request_body(
        content = inline(ValidateEditForm),
        description = "Proposed meeting change"
    ),
    responses(
        (status = 200, description = "Validation outcome", body = ValidateEditResponse),
        (status = 400, description = "Bad request", body = ScheduleError),
        (status = 404, description = "Meeting or entry not found", body = ScheduleError),
    )
)]
#[debug_handler]
/// Validates a proposed edit
///
/// This function is a handler for the route
/// `POST /api/v1/schedules/validate-edit`. Time rules are checked first;
/// when they pass, the proposal is compared against every other meeting in
/// the group. Business-rule failures come back as `ok: false`, never as
/// HTTP errors.
///
/// # Parameters
/// - `app_state` - Thread-safe shared state wrapped in an Arc and RwLock
/// - `form` - The proposed change with its context ids
///
/// # Returns
/// `Response` with a status code of 200 OK and the `{ok, conflicts,
/// details}` outcome, or an error response when the context cannot be
/// resolved at all.
pub async fn validate_edit(
    State(app_state): State<Arc<RwLock<AppState>>>,
    Json(form): Json<ValidateEditForm>,
) -> Response {
    let app_state_lock = app_state.read().await;
    let db_pool = &app_state_lock.timetable_data.read().await.timetable_db;
    match validate_meeting_edit(db_pool, &form).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => ScheduleError::response(StatusCode::BAD_REQUEST, e),
    }
}

#[utoipa::path(
    put,
    path = "/api/v1/meetings/{id}",
    request_body(
        content = inline(UpdateMeetingForm),
        description = "The new day, window and optional room/instructor"
    ),
    responses(
        (status = 200, description = "Update outcome", body = UpdateMeetingResponse),
        (status = 400, description = "Bad request", body = ScheduleError),
    )
)]
#[debug_handler]
/// Updates one meeting
///
/// This function is a handler for the route `PUT /api/v1/meetings/{id}`.
/// A suggestion computed earlier can be stale by the time it is submitted,
/// so the change is validated again against current data before being
/// committed.
///
/// # Parameters
/// - `app_state` - Thread-safe shared state wrapped in an Arc and RwLock
/// - `meeting_id` - The meeting to change
/// - `form` - The new day, window and optional room/instructor
///
/// # Returns
/// `Response` with a status code of 200 OK and either the updated meeting
/// or the conflicts that blocked the change.
pub async fn update_meeting(
    State(app_state): State<Arc<RwLock<AppState>>>,
    Path(meeting_id): Path<i32>,
    Json(form): Json<UpdateMeetingForm>,
) -> Response {
    let app_state_lock = app_state.read().await;
    let db_pool = &app_state_lock.timetable_data.read().await.timetable_db;
    match update_meeting_checked(db_pool, meeting_id, &form).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => ScheduleError::response(StatusCode::BAD_REQUEST, e),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/schedules/suggestions",
    request_body(
        content = inline(SuggestForm),
        description = "The conflicted edit to find alternatives for"
    ),
    responses(
        (status = 200, description = "Ranked alternative slots", body = SuggestResponse),
        (status = 400, description = "Bad request", body = ScheduleError),
    )
)]
#[debug_handler]
/// Suggests alternative slots
///
/// This function is a handler for the route
/// `POST /api/v1/schedules/suggestions`. Every suggestion returned has
/// already passed the validator against the current schedule.
///
/// # Parameters
/// - `app_state` - Thread-safe shared state wrapped in an Arc and RwLock
/// - `form` - The edit context and target duration
///
/// # Returns
/// `Response` with a status code of 200 OK and `{suggestions, count}`.
pub async fn suggest(
    State(app_state): State<Arc<RwLock<AppState>>>,
    Json(form): Json<SuggestForm>,
) -> Response {
    let app_state_lock = app_state.read().await;
    let db_pool = &app_state_lock.timetable_data.read().await.timetable_db;
    match suggest_for_edit(db_pool, &form).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => ScheduleError::response(StatusCode::BAD_REQUEST, e),
    }
}
