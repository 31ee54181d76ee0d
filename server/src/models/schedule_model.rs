use chrono::{DateTime, NaiveTime, Utc};
use scheduler::{naive_to_minutes, parse_combined, MeetingRecord};
use serde::{ser::SerializeStruct, Deserialize, Serialize, Serializer};
use sqlx::{FromRow, Pool, Postgres};
use std::error::Error;
use tracing::{debug, trace};
use utoipa::ToSchema;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub type BoxedError = Box<dyn Error + Send + Sync>;

/// An enumeration of errors that may occur
#[derive(Debug, thiserror::Error, ToSchema, Serialize)]
pub enum ScheduleErr {
    #[error("Schedule io failed: {0}")]
    IoError(String),
    #[error("Schedule {0} doesn't exist")]
    DoesNotExist(String),
    #[error("Invalid time value: {0}")]
    InvalidTimeFormat(String),
    #[error("Invalid day value: {0}")]
    InvalidDay(String),
    #[error("No course rows to schedule")]
    NoInputRows,
}

impl From<sqlx::Error> for ScheduleErr {
    fn from(e: sqlx::Error) -> Self {
        ScheduleErr::IoError(e.to_string())
    }
}

/// struct that represents a Schedule error, but include a `StatusCode`
/// in addition to a `ScheduleErr`
#[derive(Debug)]
pub struct ScheduleError {
    pub status: StatusCode,
    pub error: String,
}

/// Implements `ToSchema` for `ScheduleError` generating a JSON schema
/// for the error type
impl utoipa::PartialSchema for ScheduleError {
    /// Returns a JSON schema for `ScheduleError`
    ///
    /// The schema defines two properties:
    ///
    /// * `status`: A string representing the HTTP status code associated with the error.
    /// * `error`: A string describing the specific error that occurred.
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        use utoipa::openapi::schema::{ObjectBuilder, Type};
        ObjectBuilder::new()
            .property("status", ObjectBuilder::new().schema_type(Type::String))
            .property("error", ObjectBuilder::new().schema_type(Type::String))
            .examples([serde_json::json!({
                "status":"404","error":"no schedule group"
            })])
            .into()
    }
}

impl ToSchema for ScheduleError {}

/// Implements the `Serialize` trait for `ScheduleError`
impl Serialize for ScheduleError {
    /// Serializes a `ScheduleError`
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
        let mut state = serializer.serialize_struct("ScheduleError", 2)?;
        state.serialize_field("status", &status)?;
        state.serialize_field("error", &self.error)?;
        state.end()
    }
}

impl ScheduleError {
    /// Creates a `Response` instance from a `StatusCode` and an error.
    ///
    /// # Parameters
    ///
    /// * `status`: The HTTP status code.
    /// * `error`: The error to report.
    ///
    /// # Returns
    ///
    /// `Response` instance with the status code and JSON body containing
    /// the error.
    pub fn response(status: StatusCode, error: Box<dyn Error>) -> Response {
        let error = ScheduleError {
            status,
            error: error.to_string(),
        };
        (status, Json(error)).into_response()
    }
}

/// One versioned generation run for a department and term. Immutable once
/// created; several groups may coexist for the same term as drafts to
/// compare.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct ScheduleGroup {
    #[serde(skip_deserializing)]
    pub id: Option<i32>,
    pub department: String,
    pub school_year: String,
    pub semester: String,
    #[serde(skip_deserializing)]
    pub created_at: Option<DateTime<Utc>>,
}

/// One (subject, section) assignment within a group.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct ScheduleEntry {
    pub id: Option<i32>,
    pub group_id: i32,
    pub subject_id: i32,
    pub section_id: i32,
    pub status: String,
}

/// One atomic occurrence under an entry.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct ScheduleMeeting {
    pub id: Option<i32>,
    pub entry_id: i32,
    pub instructor_id: i32,
    pub room_id: i32,
    pub day: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub meeting_type: String,
}

/// Flattened meeting row joined with its entry, as the engine wants it.
#[derive(Debug, Clone, FromRow)]
pub struct MeetingDetailRow {
    pub id: i32,
    pub entry_id: i32,
    pub group_id: i32,
    pub subject_id: i32,
    pub section_id: i32,
    pub instructor_id: i32,
    pub room_id: i32,
    pub day: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl MeetingDetailRow {
    /// Converts the stored row into the engine's record form, expanding
    /// the day string into its day set.
    pub fn to_record(&self) -> MeetingRecord {
        MeetingRecord {
            id: self.id,
            entry_id: self.entry_id,
            subject_id: self.subject_id,
            section_id: self.section_id,
            instructor_id: self.instructor_id,
            room_id: self.room_id,
            days: parse_combined(&self.day),
            start_min: naive_to_minutes(self.start_time),
            end_min: naive_to_minutes(self.end_time),
        }
    }
}

/// An entry and its meetings, nested for API responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EntryWithMeetings {
    pub entry: ScheduleEntry,
    pub meetings: Vec<ScheduleMeeting>,
}

/// Creates a new schedule group.
///
/// # Parameters
///
/// * `department`: The owning department
/// * `school_year`: e.g. "2025-2026"
/// * `semester`: e.g. "1st"
///
/// # Returns
///
/// The id of the new group.
pub async fn group_create(
    db_pool: &Pool<Postgres>,
    department: &str,
    school_year: &str,
    semester: &str,
) -> Result<i32, BoxedError> {
    let row: (i32,) = sqlx::query_as(
        r#"INSERT INTO schedule_groups (department, school_year, semester)
        VALUES ($1, $2, $3) RETURNING id"#,
    )
    .bind(department)
    .bind(school_year)
    .bind(semester)
    .fetch_one(db_pool)
    .await?;

    debug!("created schedule group {}", row.0);
    Ok(row.0)
}

/// Retrieves all schedule groups, newest first.
pub async fn groups_get(db_pool: &Pool<Postgres>) -> Result<Vec<ScheduleGroup>, BoxedError> {
    let groups = sqlx::query_as::<Postgres, ScheduleGroup>(
        r#"
        SELECT * FROM schedule_groups
        ORDER BY created_at DESC, id DESC"#,
    )
    .fetch_all(db_pool)
    .await?;
    trace!("groups get: {:?}", &groups);

    Ok(groups)
}

/// Retrieves one schedule group by its ID.
///
/// # Returns
///
/// The `ScheduleGroup`, or `None` when the group does not exist.
pub async fn group_get(
    db_pool: &Pool<Postgres>,
    group_id: i32,
) -> Result<Option<ScheduleGroup>, BoxedError> {
    let group = sqlx::query_as::<Postgres, ScheduleGroup>(
        "SELECT * FROM schedule_groups WHERE id = $1",
    )
    .bind(group_id)
    .fetch_optional(db_pool)
    .await?;

    Ok(group)
}

/// Removes a schedule group and, via cascade, everything it owns.
pub async fn group_delete(db_pool: &Pool<Postgres>, group_id: i32) -> Result<(), BoxedError> {
    sqlx::query(
        r#"
        DELETE FROM schedule_groups
        WHERE id = $1
        "#,
    )
    .bind(group_id)
    .execute(db_pool)
    .await?;

    Ok(())
}

/// The persisted timetable of a group: entries joined with their meetings,
/// nested for display.
pub async fn group_timetable(
    db_pool: &Pool<Postgres>,
    group_id: i32,
) -> Result<Vec<EntryWithMeetings>, BoxedError> {
    let entries = sqlx::query_as::<Postgres, ScheduleEntry>(
        "SELECT * FROM schedule_entries WHERE group_id = $1 ORDER BY id",
    )
    .bind(group_id)
    .fetch_all(db_pool)
    .await?;

    let mut timetable = Vec::with_capacity(entries.len());
    for entry in entries {
        let meetings = sqlx::query_as::<Postgres, ScheduleMeeting>(
            "SELECT * FROM schedule_meetings WHERE entry_id = $1 ORDER BY id",
        )
        .bind(entry.id)
        .fetch_all(db_pool)
        .await?;
        timetable.push(EntryWithMeetings { entry, meetings });
    }

    Ok(timetable)
}

/// Loads every meeting of a group in the engine's flattened record form.
/// All conflict work is scoped to one group, so this is the snapshot the
/// engine runs against.
pub async fn load_group_records(
    db_pool: &Pool<Postgres>,
    group_id: i32,
) -> Result<Vec<MeetingRecord>, BoxedError> {
    let rows = sqlx::query_as::<Postgres, MeetingDetailRow>(
        r#"
        SELECT m.id, m.entry_id, e.group_id, e.subject_id, e.section_id,
               m.instructor_id, m.room_id, m.day, m.start_time, m.end_time
        FROM schedule_meetings m
        JOIN schedule_entries e ON e.id = m.entry_id
        WHERE e.group_id = $1
        ORDER BY m.id"#,
    )
    .bind(group_id)
    .fetch_all(db_pool)
    .await?;

    Ok(rows.iter().map(MeetingDetailRow::to_record).collect())
}

/// One meeting joined with its entry, or `None` when it does not exist.
pub async fn meeting_detail(
    db_pool: &Pool<Postgres>,
    meeting_id: i32,
) -> Result<Option<MeetingDetailRow>, BoxedError> {
    let row = sqlx::query_as::<Postgres, MeetingDetailRow>(
        r#"
        SELECT m.id, m.entry_id, e.group_id, e.subject_id, e.section_id,
               m.instructor_id, m.room_id, m.day, m.start_time, m.end_time
        FROM schedule_meetings m
        JOIN schedule_entries e ON e.id = m.entry_id
        WHERE m.id = $1"#,
    )
    .bind(meeting_id)
    .fetch_optional(db_pool)
    .await?;

    Ok(row)
}

/// Finds the entry for a (group, subject, section) triple, creating it on
/// first use. Reuse over duplication: every later meeting of the triple
/// hangs off the same entry.
pub async fn entry_find_or_create(
    db_pool: &Pool<Postgres>,
    group_id: i32,
    subject_id: i32,
    section_id: i32,
) -> Result<i32, BoxedError> {
    let row: (i32,) = sqlx::query_as(
        r#"
        INSERT INTO schedule_entries (group_id, subject_id, section_id, status)
        VALUES ($1, $2, $3, 'active')
        ON CONFLICT (group_id, subject_id, section_id)
        DO UPDATE SET status = schedule_entries.status
        RETURNING id"#,
    )
    .bind(group_id)
    .bind(subject_id)
    .bind(section_id)
    .fetch_one(db_pool)
    .await?;

    Ok(row.0)
}

/// Deletes the entry when it ended an allocation pass owning zero
/// meetings, so no orphan assignment records linger.
///
/// # Returns
///
/// `true` when the entry was deleted.
pub async fn entry_delete_if_empty(
    db_pool: &Pool<Postgres>,
    entry_id: i32,
) -> Result<bool, BoxedError> {
    let deleted = sqlx::query(
        r#"
        DELETE FROM schedule_entries e
        WHERE e.id = $1
        AND NOT EXISTS (SELECT 1 FROM schedule_meetings m WHERE m.entry_id = e.id)
        "#,
    )
    .bind(entry_id)
    .execute(db_pool)
    .await?
    .rows_affected();

    if deleted > 0 {
        debug!("deleted empty schedule entry {}", entry_id);
    }
    Ok(deleted > 0)
}

/// Inserts one meeting with insert-or-ignore semantics on the
/// `(entry_id, day, start_time, end_time)` uniqueness key, so a retried
/// batch cannot create duplicates.
///
/// # Returns
///
/// The new meeting id, or the existing one when the row was already there.
pub async fn meeting_insert(
    executor: &mut sqlx::PgConnection,
    meeting: &ScheduleMeeting,
) -> Result<i32, BoxedError> {
    let inserted: Option<(i32,)> = sqlx::query_as(
        r#"
        INSERT INTO schedule_meetings
            (entry_id, instructor_id, room_id, day, start_time, end_time, meeting_type)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (entry_id, day, start_time, end_time) DO NOTHING
        RETURNING id"#,
    )
    .bind(meeting.entry_id)
    .bind(meeting.instructor_id)
    .bind(meeting.room_id)
    .bind(&meeting.day)
    .bind(meeting.start_time)
    .bind(meeting.end_time)
    .bind(&meeting.meeting_type)
    .fetch_optional(&mut *executor)
    .await?;

    match inserted {
        Some((id,)) => Ok(id),
        None => {
            // Duplicate key: the meeting already exists, reuse its id.
            let existing: (i32,) = sqlx::query_as(
                r#"
                SELECT id FROM schedule_meetings
                WHERE entry_id = $1 AND day = $2 AND start_time = $3 AND end_time = $4"#,
            )
            .bind(meeting.entry_id)
            .bind(&meeting.day)
            .bind(meeting.start_time)
            .bind(meeting.end_time)
            .fetch_one(&mut *executor)
            .await?;
            Ok(existing.0)
        }
    }
}

/// Moves a meeting to a new day, window and room. Used by eviction
/// relocations and the post-save repair pass.
pub async fn meeting_move(
    executor: &mut sqlx::PgConnection,
    meeting_id: i32,
    day: &str,
    start_time: NaiveTime,
    end_time: NaiveTime,
    room_id: i32,
) -> Result<(), BoxedError> {
    sqlx::query(
        r#"
        UPDATE schedule_meetings
        SET day = $1, start_time = $2, end_time = $3, room_id = $4
        WHERE id = $5
        "#,
    )
    .bind(day)
    .bind(start_time)
    .bind(end_time)
    .bind(room_id)
    .bind(meeting_id)
    .execute(&mut *executor)
    .await?;

    Ok(())
}

/// Applies a validated interactive edit to one meeting.
pub async fn meeting_update(
    db_pool: &Pool<Postgres>,
    meeting_id: i32,
    day: &str,
    start_time: NaiveTime,
    end_time: NaiveTime,
    room_id: Option<i32>,
    instructor_id: Option<i32>,
) -> Result<Option<ScheduleMeeting>, BoxedError> {
    let updated = sqlx::query_as::<Postgres, ScheduleMeeting>(
        r#"
        UPDATE schedule_meetings
        SET day = $1,
            start_time = $2,
            end_time = $3,
            room_id = COALESCE($4, room_id),
            instructor_id = COALESCE($5, instructor_id)
        WHERE id = $6
        RETURNING *"#,
    )
    .bind(day)
    .bind(start_time)
    .bind(end_time)
    .bind(room_id)
    .bind(instructor_id)
    .bind(meeting_id)
    .fetch_optional(db_pool)
    .await?;

    debug!("meeting {} updated: {:?}", meeting_id, updated);
    Ok(updated)
}
