use scheduler::{
    cluster_conflicts, combine, minutes_to_label, minutes_to_naive, normalize_day, parse_combined,
    session_durations_min, suggest_alternatives, to_minutes, validate_edit, ConflictDetail,
    EditKind, EditProposal, MeetingRecord, OffendingMeeting, ResourceKind, SuggestionQuery,
    TimetableSnapshot, Weekday,
};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Postgres};
use tracing::{debug, trace};
use utoipa::ToSchema;

use crate::models::instructor_model::instructor_employment;
use crate::models::room_model::active_rooms;
use crate::models::schedule_model::{
    load_group_records, meeting_detail, meeting_update, BoxedError, MeetingDetailRow, ScheduleErr,
    ScheduleMeeting,
};
use crate::models::subject_model::subject_units;

/// A proposed change to one meeting (or a whole entry), in wire form.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ValidateEditForm {
    #[serde(default)]
    pub group_id: Option<i32>,
    #[serde(default)]
    pub meeting_id: Option<i32>,
    #[serde(default)]
    pub entry_id: Option<i32>,
    pub day: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub instructor_id: Option<i32>,
    #[serde(default)]
    pub room_id: Option<i32>,
    #[serde(default)]
    pub section_id: Option<i32>,
}

/// The resolved context a validation ran against, echoed to the caller.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EditDetails {
    pub group_id: i32,
    pub day: String,
    pub start_time: String,
    pub end_time: String,
    pub instructor_id: Option<i32>,
    pub room_id: Option<i32>,
    pub section_id: Option<i32>,
    pub joint_legs: usize,
    pub allowed_durations_min: Vec<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ValidateEditResponse {
    pub ok: bool,
    #[schema(value_type = Vec<Object>)]
    pub conflicts: Vec<ConflictDetail>,
    pub details: EditDetails,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateMeetingForm {
    pub day: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub room_id: Option<i32>,
    #[serde(default)]
    pub instructor_id: Option<i32>,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateMeetingResponse {
    pub ok: bool,
    pub meeting: Option<ScheduleMeeting>,
    #[schema(value_type = Option<Vec<Object>>)]
    pub conflicts: Option<Vec<ConflictDetail>>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SuggestForm {
    pub group_id: i32,
    #[serde(default)]
    pub meeting_id: Option<i32>,
    #[serde(default)]
    pub instructor_id: Option<i32>,
    #[serde(default)]
    pub room_id: Option<i32>,
    #[serde(default)]
    pub section_id: Option<i32>,
    #[serde(default)]
    pub preferred_day: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub edit_type: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SuggestionDto {
    pub day: String,
    pub start_time: String,
    pub end_time: String,
    pub room_id: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SuggestResponse {
    pub suggestions: Vec<SuggestionDto>,
    pub count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConflictClusterDto {
    pub resource_id: i32,
    #[schema(value_type = Vec<Object>)]
    pub meetings: Vec<OffendingMeeting>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConflictReportResponse {
    pub group_id: i32,
    pub instructor: Vec<ConflictClusterDto>,
    pub room: Vec<ConflictClusterDto>,
    pub section: Vec<ConflictClusterDto>,
    pub total: usize,
}

/// Everything a validation or suggestion needs, resolved from a meeting,
/// an entry, or the raw form fields.
struct EditContext {
    group_id: i32,
    entry_id: Option<i32>,
    instructor_id: Option<i32>,
    room_id: Option<i32>,
    section_id: Option<i32>,
    subject_id: Option<i32>,
    exclude_meeting: Option<i32>,
    exclude_entry: Option<i32>,
    joint_legs: usize,
    joint_days: Vec<Weekday>,
    original_day: Option<Weekday>,
    original_start: Option<i32>,
    original_duration: Option<i32>,
    allowed_durations_min: Vec<i32>,
    weekly_load_min: Option<i32>,
}

/// Counts how many meetings under the entry share the given window: the
/// legs of a joint session, 1 for a solo meeting.
async fn joint_legs_of(
    db_pool: &Pool<Postgres>,
    entry_id: i32,
    row: &MeetingDetailRow,
) -> Result<(usize, Vec<Weekday>), BoxedError> {
    let siblings = sqlx::query_as::<Postgres, MeetingDetailRow>(
        r#"
        SELECT m.id, m.entry_id, e.group_id, e.subject_id, e.section_id,
               m.instructor_id, m.room_id, m.day, m.start_time, m.end_time
        FROM schedule_meetings m
        JOIN schedule_entries e ON e.id = m.entry_id
        WHERE m.entry_id = $1 AND m.start_time = $2 AND m.end_time = $3"#,
    )
    .bind(entry_id)
    .bind(row.start_time)
    .bind(row.end_time)
    .fetch_all(db_pool)
    .await?;

    let mut days: Vec<Weekday> = Vec::new();
    for sibling in &siblings {
        for day in parse_combined(&sibling.day) {
            if !days.contains(&day) {
                days.push(day);
            }
        }
    }
    scheduler::sort_weekly(&mut days);

    Ok((siblings.len().max(1), days))
}

async fn resolve_context(
    db_pool: &Pool<Postgres>,
    group_id: Option<i32>,
    meeting_id: Option<i32>,
    entry_id: Option<i32>,
) -> Result<EditContext, BoxedError> {
    let mut ctx = EditContext {
        group_id: 0,
        entry_id: None,
        instructor_id: None,
        room_id: None,
        section_id: None,
        subject_id: None,
        exclude_meeting: None,
        exclude_entry: None,
        joint_legs: 1,
        joint_days: Vec::new(),
        original_day: None,
        original_start: None,
        original_duration: None,
        allowed_durations_min: Vec::new(),
        weekly_load_min: None,
    };

    if let Some(id) = meeting_id {
        let row = meeting_detail(db_pool, id)
            .await?
            .ok_or_else(|| ScheduleErr::DoesNotExist(id.to_string()))?;
        let record = row.to_record();
        ctx.group_id = row.group_id;
        ctx.entry_id = Some(row.entry_id);
        ctx.instructor_id = Some(row.instructor_id);
        ctx.room_id = Some(row.room_id);
        ctx.section_id = Some(row.section_id);
        ctx.subject_id = Some(row.subject_id);
        ctx.exclude_meeting = Some(id);
        ctx.original_day = record.days.first().copied();
        ctx.original_start = Some(record.start_min);
        ctx.original_duration = Some(record.end_min - record.start_min);
        let (legs, joint_days) = joint_legs_of(db_pool, row.entry_id, &row).await?;
        ctx.joint_legs = legs;
        ctx.joint_days = joint_days;
    } else if let Some(id) = entry_id {
        let rows = sqlx::query_as::<Postgres, MeetingDetailRow>(
            r#"
            SELECT m.id, m.entry_id, e.group_id, e.subject_id, e.section_id,
                   m.instructor_id, m.room_id, m.day, m.start_time, m.end_time
            FROM schedule_meetings m
            JOIN schedule_entries e ON e.id = m.entry_id
            WHERE m.entry_id = $1
            ORDER BY m.id"#,
        )
        .bind(id)
        .fetch_all(db_pool)
        .await?;
        let first = rows
            .first()
            .ok_or_else(|| ScheduleErr::DoesNotExist(format!("entry {id}")))?;
        ctx.group_id = first.group_id;
        ctx.entry_id = Some(id);
        ctx.instructor_id = Some(first.instructor_id);
        ctx.room_id = Some(first.room_id);
        ctx.section_id = Some(first.section_id);
        ctx.subject_id = Some(first.subject_id);
        ctx.exclude_entry = Some(id);
        let record = first.to_record();
        ctx.original_day = record.days.first().copied();
        ctx.original_start = Some(record.start_min);
        ctx.original_duration = Some(record.end_min - record.start_min);
        let (legs, joint_days) = joint_legs_of(db_pool, id, first).await?;
        ctx.joint_legs = legs;
        ctx.joint_days = joint_days;
    } else {
        ctx.group_id = group_id.ok_or_else(|| {
            ScheduleErr::DoesNotExist("no group, meeting or entry to validate against".into())
        })?;
    }

    // Duration rules come from the subject's units and the instructor's
    // employment type, when both are resolvable.
    if let Some(subject_id) = ctx.subject_id {
        let units = subject_units(db_pool, subject_id).await?;
        let employment = match ctx.instructor_id {
            Some(instructor_id) => instructor_employment(db_pool, instructor_id).await?,
            None => scheduler::EmploymentType::FullTime,
        };
        ctx.allowed_durations_min = session_durations_min(units, employment);
        ctx.weekly_load_min = Some(units * 60);
    }

    Ok(ctx)
}

/// Validates a proposed edit against every other meeting in its group.
///
/// # Returns
/// The structured `{ok, conflicts, details}` outcome; business-rule
/// failures always come back as `ok: false` rather than errors.
pub async fn validate_meeting_edit(
    db_pool: &Pool<Postgres>,
    form: &ValidateEditForm,
) -> Result<ValidateEditResponse, BoxedError> {
    let ctx = resolve_context(db_pool, form.group_id, form.meeting_id, form.entry_id).await?;

    let days = parse_combined(&form.day);
    if days.is_empty() {
        return Err(Box::new(ScheduleErr::InvalidDay(form.day.clone())));
    }
    let start_min = to_minutes(&form.start_time)
        .ok_or_else(|| ScheduleErr::InvalidTimeFormat(form.start_time.clone()))?;
    let end_min = to_minutes(&form.end_time)
        .ok_or_else(|| ScheduleErr::InvalidTimeFormat(form.end_time.clone()))?;

    let snapshot = TimetableSnapshot::new(load_group_records(db_pool, ctx.group_id).await?);

    let proposal = EditProposal {
        days: days.clone(),
        start_min,
        end_min,
        instructor_id: form.instructor_id.or(ctx.instructor_id),
        room_id: form.room_id.or(ctx.room_id),
        section_id: form.section_id.or(ctx.section_id),
        subject_id: ctx.subject_id,
        exclude_entry: ctx.exclude_entry,
        exclude_meeting: ctx.exclude_meeting,
        allowed_durations_min: ctx.allowed_durations_min.clone(),
        weekly_load_min: ctx.weekly_load_min,
        joint_legs: ctx.joint_legs,
    };
    let outcome = validate_edit(&snapshot, &proposal);
    trace!("validated edit {:?}: {:?}", form, outcome.ok);

    Ok(ValidateEditResponse {
        ok: outcome.ok,
        conflicts: outcome.conflicts,
        details: EditDetails {
            group_id: ctx.group_id,
            day: combine(&days),
            start_time: minutes_to_label(start_min),
            end_time: minutes_to_label(end_min),
            instructor_id: proposal.instructor_id,
            room_id: proposal.room_id,
            section_id: proposal.section_id,
            joint_legs: ctx.joint_legs,
            allowed_durations_min: ctx.allowed_durations_min,
        },
    })
}

/// Re-validates and applies an interactive edit to one meeting.
///
/// The validation that produced the edit may be stale by the time it is
/// submitted, so the update path always validates again against current
/// data before committing.
pub async fn update_meeting_checked(
    db_pool: &Pool<Postgres>,
    meeting_id: i32,
    form: &UpdateMeetingForm,
) -> Result<UpdateMeetingResponse, BoxedError> {
    let validation = validate_meeting_edit(
        db_pool,
        &ValidateEditForm {
            group_id: None,
            meeting_id: Some(meeting_id),
            entry_id: None,
            day: form.day.clone(),
            start_time: form.start_time.clone(),
            end_time: form.end_time.clone(),
            instructor_id: form.instructor_id,
            room_id: form.room_id,
            section_id: None,
        },
    )
    .await?;

    if !validation.ok {
        return Ok(UpdateMeetingResponse {
            ok: false,
            meeting: None,
            conflicts: Some(validation.conflicts),
            message: Some("the proposed change conflicts with the current schedule".to_string()),
        });
    }

    let day_label = combine(&parse_combined(&form.day));
    let start = minutes_to_naive(
        to_minutes(&form.start_time)
            .ok_or_else(|| ScheduleErr::InvalidTimeFormat(form.start_time.clone()))?,
    );
    let end = minutes_to_naive(
        to_minutes(&form.end_time)
            .ok_or_else(|| ScheduleErr::InvalidTimeFormat(form.end_time.clone()))?,
    );

    let updated = meeting_update(
        db_pool,
        meeting_id,
        &day_label,
        start,
        end,
        form.room_id,
        form.instructor_id,
    )
    .await?
    .ok_or_else(|| ScheduleErr::DoesNotExist(meeting_id.to_string()))?;

    debug!("meeting {} updated interactively", meeting_id);
    Ok(UpdateMeetingResponse {
        ok: true,
        meeting: Some(updated),
        conflicts: None,
        message: None,
    })
}

/// Builds ranked alternative slots for a conflicted edit.
pub async fn suggest_for_edit(
    db_pool: &Pool<Postgres>,
    form: &SuggestForm,
) -> Result<SuggestResponse, BoxedError> {
    let ctx = resolve_context(db_pool, Some(form.group_id), form.meeting_id, None).await?;

    let edit = match form.edit_type.as_deref() {
        Some(t) if t.eq_ignore_ascii_case("day") => EditKind::Day,
        Some(t) if t.eq_ignore_ascii_case("room") => EditKind::Room,
        _ => EditKind::Time,
    };

    let duration_min = form
        .duration_minutes
        .or(ctx.original_duration)
        .ok_or_else(|| {
            ScheduleErr::InvalidTimeFormat("no duration to search with".to_string())
        })?;

    let original_day = form
        .preferred_day
        .as_deref()
        .and_then(normalize_day)
        .or(ctx.original_day);

    // A joint session edited by time moves as a whole entry; anything else
    // edits the single meeting.
    let joint_time_edit = edit == EditKind::Time && ctx.joint_days.len() > 1;
    let (exclude_meeting, exclude_entry) = if joint_time_edit {
        // The whole joint session moves together, so every leg of its
        // entry is out of the comparison.
        (None, ctx.entry_id)
    } else {
        (ctx.exclude_meeting, ctx.exclude_entry)
    };

    let query = SuggestionQuery {
        duration_min,
        instructor_id: form.instructor_id.or(ctx.instructor_id),
        room_id: form.room_id.or(ctx.room_id),
        section_id: form.section_id.or(ctx.section_id),
        subject_id: ctx.subject_id,
        exclude_meeting,
        exclude_entry,
        original_day,
        original_start: ctx.original_start,
        joint_days: if joint_time_edit {
            ctx.joint_days.clone()
        } else {
            Vec::new()
        },
        edit,
        allowed_durations_min: ctx.allowed_durations_min.clone(),
        weekly_load_min: ctx.weekly_load_min,
        joint_legs: ctx.joint_legs,
    };

    let rooms = active_rooms(db_pool).await?;
    let snapshot = TimetableSnapshot::new(load_group_records(db_pool, ctx.group_id).await?);
    let suggestions = suggest_alternatives(&snapshot, &rooms, &query);

    let dtos: Vec<SuggestionDto> = suggestions
        .iter()
        .map(|s| SuggestionDto {
            day: s.day_label.clone(),
            start_time: minutes_to_label(s.start_min),
            end_time: minutes_to_label(s.end_min),
            room_id: s.room_id,
        })
        .collect();

    Ok(SuggestResponse {
        count: dtos.len(),
        suggestions: dtos,
    })
}

/// The clustered conflict report for one group, grouped per resource
/// kind.
pub async fn conflict_report(
    db_pool: &Pool<Postgres>,
    group_id: i32,
) -> Result<ConflictReportResponse, BoxedError> {
    let records = load_group_records(db_pool, group_id).await?;
    let clusters = cluster_conflicts(&records);

    let mut report = ConflictReportResponse {
        group_id,
        instructor: Vec::new(),
        room: Vec::new(),
        section: Vec::new(),
        total: clusters.len(),
    };

    for cluster in clusters {
        let dto = ConflictClusterDto {
            resource_id: cluster.resource_id,
            meetings: cluster.meetings.iter().map(meeting_summary).collect(),
        };
        match cluster.kind {
            ResourceKind::Instructor => report.instructor.push(dto),
            ResourceKind::Room => report.room.push(dto),
            ResourceKind::Section => report.section.push(dto),
        }
    }

    Ok(report)
}

fn meeting_summary(record: &MeetingRecord) -> OffendingMeeting {
    OffendingMeeting {
        meeting_id: record.id,
        entry_id: record.entry_id,
        day: combine(&record.days),
        start_time: minutes_to_label(record.start_min),
        end_time: minutes_to_label(record.end_min),
        room_id: record.room_id,
        instructor_id: record.instructor_id,
        section_id: record.section_id,
    }
}
