use crate::config::AppState;
use crate::controllers::{
    meeting_handler::{suggest, update_meeting, validate_edit},
    room_handler::{delete_room, post_rooms, put_room, rooms},
    schedule_handler::{conflicts, delete_group, generate, get_group, groups},
};
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Returns a router with all the routes for the API
///
/// This function returns a router with all the routes for the API. It
/// includes routes for rooms, schedule groups, generation, conflict
/// reporting, and interactive meeting edits.
///
/// # Returns
/// A router with all the routes for the API
pub fn get_routes() -> Router<Arc<RwLock<AppState>>> {
    Router::new()
        .route("/rooms", get(rooms))
        .route("/rooms/add", post(post_rooms))
        .route("/rooms/{id}", put(put_room))
        .route("/rooms/{id}", delete(delete_room))
        .route("/schedules", get(groups))
        .route("/schedules/generate", post(generate))
        .route("/schedules/validate-edit", post(validate_edit))
        .route("/schedules/suggestions", post(suggest))
        .route("/schedules/{id}", get(get_group))
        .route("/schedules/{id}", delete(delete_group))
        .route("/schedules/{id}/conflicts", get(conflicts))
        .route("/meetings/{id}", put(update_meeting))
}
