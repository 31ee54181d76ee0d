use axum::extract::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::AppState;
use crate::models::room_model::{
    room_delete, room_update, rooms_add, rooms_get, CreateRoomsForm, Room, RoomErr, RoomError,
};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::trace;

#[utoipa::path(
    get,
    path = "/api/v1/rooms",
    responses(
        (status = 200, description = "List rooms", body = Vec<Room>),
        (status = 404, description = "No rooms", body = RoomError),
    )
)]
/// Retrieves the room catalog
pub async fn rooms(State(app_state): State<Arc<RwLock<AppState>>>) -> Response {
    let app_state_lock = app_state.read().await;
    let db_pool = &app_state_lock.timetable_data.read().await.timetable_db;
    match rooms_get(db_pool).await {
        Ok(res) => Json(res).into_response(),
        Err(e) => RoomError::response(
            StatusCode::NOT_FOUND,
            Box::new(RoomErr::DoesNotExist(e.to_string())),
        ),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/rooms/add",
    request_body(
        content = inline(CreateRoomsForm),
        description = "Rooms to add"
    ),
    responses(
        (status = 201, description = "Added rooms"),
        (status = 400, description = "Bad request", body = RoomError)
    )
)]
/// Adds rooms to the catalog
pub async fn post_rooms(
    State(app_state): State<Arc<RwLock<AppState>>>,
    Json(rooms_form): Json<CreateRoomsForm>,
) -> Response {
    let app_state_lock = app_state.read().await;
    let db_pool = &app_state_lock.timetable_data.read().await.timetable_db;
    match rooms_add(db_pool, rooms_form).await {
        Ok(ids) => {
            trace!("room ids: {:?}", ids);
            StatusCode::CREATED.into_response()
        }
        Err(e) => RoomError::response(StatusCode::BAD_REQUEST, e),
    }
}

#[utoipa::path(
    put,
    path = "/api/v1/rooms/{id}",
    request_body(
        content = inline(Room),
        description = "New room data"
    ),
    responses(
        (status = 200, description = "Updated room", body = Room),
        (status = 404, description = "No room with this id", body = RoomError),
    )
)]
/// Updates a room
pub async fn put_room(
    State(app_state): State<Arc<RwLock<AppState>>>,
    Path(room_id): Path<i32>,
    Json(room): Json<Room>,
) -> Response {
    let app_state_lock = app_state.read().await;
    let db_pool = &app_state_lock.timetable_data.read().await.timetable_db;
    match room_update(db_pool, room_id, room).await {
        Ok(Some(updated)) => Json(updated).into_response(),
        Ok(None) => RoomError::response(
            StatusCode::NOT_FOUND,
            Box::new(RoomErr::DoesNotExist(room_id.to_string())),
        ),
        Err(e) => RoomError::response(StatusCode::BAD_REQUEST, e),
    }
}

#[utoipa::path(
    delete,
    path = "/api/v1/rooms/{id}",
    responses(
        (status = 200, description = "Deleted or deactivated room"),
        (status = 400, description = "Bad request", body = RoomError),
    )
)]
/// Removes a room, deactivating it when meetings still reference it
pub async fn delete_room(
    State(app_state): State<Arc<RwLock<AppState>>>,
    Path(room_id): Path<i32>,
) -> Response {
    let app_state_lock = app_state.read().await;
    let db_pool = &app_state_lock.timetable_data.read().await.timetable_db;
    match room_delete(db_pool, room_id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => RoomError::response(StatusCode::BAD_REQUEST, e),
    }
}
