use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scheduler::RoomInfo;
use serde::{ser::SerializeStruct, Deserialize, Serialize, Serializer};
use sqlx::{FromRow, Pool, Postgres};
use std::error::Error;
use tracing::debug;
use utoipa::ToSchema;

use crate::models::schedule_model::BoxedError;

/// An enumeration of errors that may occur
#[derive(Debug, thiserror::Error, ToSchema, Serialize)]
pub enum RoomErr {
    #[error("Room io failed: {0}")]
    IoError(String),
    #[error("Room {0} doesn't exist")]
    DoesNotExist(String),
}

impl From<sqlx::Error> for RoomErr {
    fn from(e: sqlx::Error) -> Self {
        RoomErr::IoError(e.to_string())
    }
}

/// struct that represents a Room error, but include a `StatusCode`
/// in addition to a `RoomErr`
#[derive(Debug)]
pub struct RoomError {
    pub status: StatusCode,
    pub error: String,
}

/// Implements `ToSchema` for `RoomError` generating a JSON schema
/// for the error type
impl utoipa::PartialSchema for RoomError {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        use utoipa::openapi::schema::{ObjectBuilder, Type};
        ObjectBuilder::new()
            .property("status", ObjectBuilder::new().schema_type(Type::String))
            .property("error", ObjectBuilder::new().schema_type(Type::String))
            .examples([serde_json::json!({
                "status":"404","error":"no room"
            })])
            .into()
    }
}

impl ToSchema for RoomError {}

/// Implements the `Serialize` trait for `RoomError`
impl Serialize for RoomError {
    /// Serializes a `RoomError`
    ///
    /// The serialized JSON object will have two properties:
    ///
    /// * `status`: A string for the HTTP status code
    /// * `error`: A string describing the error
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let status: String = self.status.to_string();
        let mut state = serializer.serialize_struct("RoomError", 2)?;
        state.serialize_field("status", &status)?;
        state.serialize_field("error", &self.error)?;
        state.end()
    }
}

impl RoomError {
    /// Creates a `Response` instance from a `StatusCode` and an error.
    ///
    /// # Parameters
    ///
    /// * `status`: The HTTP status code.
    /// * `error`: The error to report.
    ///
    /// # Returns
    ///
    /// `Response` instance with the status code and JSON body containing the error.
    pub fn response(status: StatusCode, error: Box<dyn Error>) -> Response {
        let error = RoomError {
            status,
            error: error.to_string(),
        };
        (status, Json(error)).into_response()
    }
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Room {
    #[serde(skip_deserializing)]
    pub id: Option<i32>,
    pub name: String,
    pub capacity: i32,
    pub is_lab: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateRoomsForm {
    pub rooms: Vec<Room>,
}

/// Retrieves the whole room catalog.
///
/// # Returns
///
/// A vector of Room's or None
pub async fn rooms_get(db_pool: &Pool<Postgres>) -> Result<Option<Vec<Room>>, BoxedError> {
    let rooms = Some(
        sqlx::query_as::<Postgres, Room>(
            r#"
        SELECT * FROM rooms
        ORDER BY id"#,
        )
        .fetch_all(db_pool)
        .await?,
    );

    Ok(rooms.filter(|res| !res.is_empty()))
}

/// The active rooms in the engine's catalog form, ready to hand to the
/// allocator and the suggester.
pub async fn active_rooms(db_pool: &Pool<Postgres>) -> Result<Vec<RoomInfo>, BoxedError> {
    let rooms = sqlx::query_as::<Postgres, RoomInfo>(
        r#"
        SELECT id, name, capacity, is_lab, is_active
        FROM rooms
        WHERE is_active = TRUE
        ORDER BY id"#,
    )
    .fetch_all(db_pool)
    .await?;

    Ok(rooms)
}

/// Resolves a room by its display name, case-insensitively.
pub async fn room_find_by_name(
    db_pool: &Pool<Postgres>,
    name: &str,
) -> Result<Option<i32>, BoxedError> {
    let id: Option<(i32,)> =
        sqlx::query_as("SELECT id FROM rooms WHERE LOWER(name) = LOWER($1)")
            .bind(name)
            .fetch_optional(db_pool)
            .await?;

    Ok(id.map(|(id,)| id))
}

/// Adds new rooms.
///
/// # Parameters
///
/// * `rooms_form`: The rooms to add
///
/// # Returns
///
/// The ids of the inserted rooms.
pub async fn rooms_add(
    db_pool: &Pool<Postgres>,
    rooms_form: CreateRoomsForm,
) -> Result<Vec<i32>, BoxedError> {
    let mut ids = Vec::with_capacity(rooms_form.rooms.len());
    for room in rooms_form.rooms {
        let (id,): (i32,) = sqlx::query_as(
            r#"INSERT INTO rooms (name, capacity, is_lab, is_active)
            VALUES ($1, $2, $3, $4) RETURNING id"#,
        )
        .bind(room.name)
        .bind(room.capacity)
        .bind(room.is_lab)
        .bind(room.is_active)
        .fetch_one(db_pool)
        .await?;
        ids.push(id);
    }

    Ok(ids)
}

/// Updates a room's reference data.
pub async fn room_update(
    db_pool: &Pool<Postgres>,
    room_id: i32,
    room: Room,
) -> Result<Option<Room>, BoxedError> {
    let updated = sqlx::query_as::<Postgres, Room>(
        r#"
        UPDATE rooms
        SET name = $1, capacity = $2, is_lab = $3, is_active = $4
        WHERE id = $5
        RETURNING *"#,
    )
    .bind(room.name)
    .bind(room.capacity)
    .bind(room.is_lab)
    .bind(room.is_active)
    .bind(room_id)
    .fetch_optional(db_pool)
    .await?;

    Ok(updated)
}

/// Removes a room by its ID.
///
/// A room that meetings still reference is deactivated instead of
/// deleted, so existing timetables keep resolving.
///
/// # Parameters
///
/// * `room_id`: The ID of the room.
pub async fn room_delete(db_pool: &Pool<Postgres>, room_id: i32) -> Result<(), BoxedError> {
    let referenced: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM schedule_meetings WHERE room_id = $1")
            .bind(room_id)
            .fetch_one(db_pool)
            .await?;

    if referenced > 0 {
        debug!(
            "room {} still referenced by {} meetings, deactivating",
            room_id, referenced
        );
        sqlx::query("UPDATE rooms SET is_active = FALSE WHERE id = $1")
            .bind(room_id)
            .execute(db_pool)
            .await?;
        return Ok(());
    }

    sqlx::query(
        r#"
        DELETE FROM rooms
        WHERE id = $1
        "#,
    )
    .bind(room_id)
    .execute(db_pool)
    .await?;

    Ok(())
}
