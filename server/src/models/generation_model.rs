use scheduler::{
    combine, minutes_to_naive, parse_combined, repair_section_overlaps, session_durations_min,
    to_minutes, CourseNeeds, EmploymentType, PlacementRequest, RoomInfo, TimetableSnapshot,
    TimetableState,
};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Postgres};
use std::collections::HashMap;
use std::env;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::models::instructor_model::resolve_instructor;
use crate::models::room_model::{active_rooms, room_find_by_name};
use crate::models::schedule_model::{
    entry_delete_if_empty, entry_find_or_create, group_create, group_timetable, meeting_insert,
    meeting_move, BoxedError, EntryWithMeetings, ScheduleErr, ScheduleMeeting,
};
use crate::models::section_model::resolve_section;
use crate::models::subject_model::resolve_subject;

const DEFAULT_TIME_BUDGET_SECS: u64 = 30;

/// One course meeting request as uploaded: free-text identities plus the
/// desired days, window and room.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseRow {
    pub instructor_name: String,
    #[serde(default)]
    pub employment_type: String,
    pub subject_code: String,
    #[serde(default)]
    pub subject_description: Option<String>,
    pub units: i32,
    pub year_level: String,
    pub block: String,
    /// Single or combined day string, e.g. "Mon" or "MonThu".
    pub days: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub requires_lab: bool,
    #[serde(default)]
    pub estimated_students: Option<i32>,
    #[serde(default)]
    pub meeting_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GenerateRequest {
    pub department: String,
    pub school_year: String,
    pub semester: String,
    pub rows: Vec<CourseRow>,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct GenerateStats {
    pub requested_rows: usize,
    pub meetings_placed: usize,
    pub meetings_skipped: usize,
    pub evictions: usize,
    pub repairs_applied: usize,
    pub repairs_unresolved: usize,
    pub rows_failed: usize,
    /// True when the wall-clock budget ran out and the response carries
    /// the partial result gathered so far.
    pub partial: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GenerateResponse {
    pub success: bool,
    pub group_id: i32,
    pub schedules: Vec<EntryWithMeetings>,
    pub algorithm: String,
    pub stats: GenerateStats,
}

fn time_budget() -> Duration {
    let secs = env::var("GENERATION_TIME_BUDGET_SECS")
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TIME_BUDGET_SECS);
    Duration::from_secs(secs)
}

/// Runs one full generation pass: creates a new schedule group, places
/// every course row through the allocation engine, persists the outcome,
/// and finishes with the post-save local repair pass.
///
/// Failures scoped to one row or one meeting never abort the run; only
/// setup-level failures (no rows, no group) surface as errors. A run that
/// exceeds its wall-clock budget stops where it is and returns the
/// partial result with the `partial` flag set.
pub async fn generate_schedule(
    db_pool: &Pool<Postgres>,
    request: GenerateRequest,
) -> Result<GenerateResponse, BoxedError> {
    if request.rows.is_empty() {
        return Err(Box::new(ScheduleErr::NoInputRows));
    }

    let group_id = group_create(
        db_pool,
        &request.department,
        &request.school_year,
        &request.semester,
    )
    .await?;

    let rooms: Vec<RoomInfo> = active_rooms(db_pool).await?;
    let mut state = TimetableState::new(TimetableSnapshot::default(), rooms);

    let mut run = RunContext::default();
    let mut stats = GenerateStats {
        requested_rows: request.rows.len(),
        ..Default::default()
    };

    let budget = time_budget();
    let started = Instant::now();
    info!(
        group_id,
        rows = request.rows.len(),
        "starting schedule generation"
    );

    for (index, row) in request.rows.iter().enumerate() {
        if started.elapsed() >= budget {
            warn!(
                group_id,
                processed = index,
                "generation time budget exhausted, returning partial result"
            );
            stats.partial = true;
            break;
        }

        match schedule_row(db_pool, &mut state, &mut run, group_id, &request.department, row).await
        {
            Ok(row_outcome) => {
                stats.meetings_placed += row_outcome.placed;
                stats.meetings_skipped += row_outcome.skipped;
                stats.evictions += row_outcome.evictions;
            }
            Err(e) => {
                // One bad row must not abort the whole run.
                warn!(group_id, row = index, error = %e, "course row failed, continuing");
                stats.rows_failed += 1;
            }
        }
    }

    let report = repair_section_overlaps(&mut state.snapshot);
    for shift in &report.shifts {
        let meeting_id = match run.db_id(shift.meeting_id) {
            Some(id) => id,
            None => {
                warn!(
                    provisional = shift.meeting_id,
                    "repair shift references an unpersisted meeting, skipped"
                );
                continue;
            }
        };
        let Some(record) = state.snapshot.meeting(shift.meeting_id) else {
            continue;
        };
        let day = combine(&record.days);
        let room_id = record.room_id;
        let mut conn = match db_pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(meeting_id, error = %e, "repair shift not persisted");
                continue;
            }
        };
        if let Err(e) = meeting_move(
            &mut *conn,
            meeting_id,
            &day,
            minutes_to_naive(shift.new_start_min),
            minutes_to_naive(shift.new_end_min),
            room_id,
        )
        .await
        {
            warn!(meeting_id, error = %e, "repair shift not persisted");
        } else {
            stats.repairs_applied += 1;
        }
    }
    stats.repairs_unresolved = report.unresolved.len();

    let schedules = group_timetable(db_pool, group_id).await?;
    let elapsed = started.elapsed();
    info!(
        group_id,
        placed = stats.meetings_placed,
        skipped = stats.meetings_skipped,
        ?elapsed,
        "generation finished"
    );

    Ok(GenerateResponse {
        success: stats.meetings_placed > 0,
        group_id,
        schedules,
        algorithm: "slot-allocation/local-repair".to_string(),
        stats,
    })
}

/// Per-run caches and the provisional-to-database meeting id map. Built
/// fresh for every generation request and dropped with it; nothing here
/// outlives or crosses a run.
#[derive(Default)]
struct RunContext {
    instructors: HashMap<String, i32>,
    subjects: HashMap<String, (i32, i32)>,
    sections: HashMap<(String, i32, String), i32>,
    meeting_ids: HashMap<i32, i32>,
}

impl RunContext {
    /// Translates an engine meeting id into the persisted row id.
    /// Provisional (negative) ids map through the insert bookkeeping;
    /// non-negative ids are already database ids.
    fn db_id(&self, engine_id: i32) -> Option<i32> {
        if engine_id >= 0 {
            Some(engine_id)
        } else {
            self.meeting_ids.get(&engine_id).copied()
        }
    }
}

struct RowOutcome {
    placed: usize,
    skipped: usize,
    evictions: usize,
}

async fn schedule_row(
    db_pool: &Pool<Postgres>,
    state: &mut TimetableState,
    run: &mut RunContext,
    group_id: i32,
    department: &str,
    row: &CourseRow,
) -> Result<RowOutcome, BoxedError> {
    let days = parse_combined(&row.days);
    if days.is_empty() {
        return Err(Box::new(ScheduleErr::InvalidDay(row.days.clone())));
    }
    let start_min = to_minutes(&row.start_time)
        .ok_or_else(|| ScheduleErr::InvalidTimeFormat(row.start_time.clone()))?;
    let end_min = to_minutes(&row.end_time)
        .ok_or_else(|| ScheduleErr::InvalidTimeFormat(row.end_time.clone()))?;

    let instructor_id = resolve_instructor(
        db_pool,
        &mut run.instructors,
        &row.instructor_name,
        &row.employment_type,
    )
    .await?;
    let (subject_id, units) = resolve_subject(
        db_pool,
        &mut run.subjects,
        &row.subject_code,
        row.subject_description.as_deref(),
        row.units,
    )
    .await?;
    let Some(section_id) = resolve_section(
        db_pool,
        &mut run.sections,
        department,
        &row.year_level,
        &row.block,
    )
    .await?
    else {
        return Err(Box::new(ScheduleErr::InvalidDay(format!(
            "unparseable year level {:?}",
            row.year_level
        ))));
    };

    // Wrong session lengths are rejected up front and never auto-repaired.
    let employment = EmploymentType::from_raw(&row.employment_type);
    let durations = session_durations_min(units, employment);
    let duration = end_min - start_min;
    let legs = days.len() as i32;
    let duration_ok =
        durations.contains(&duration) && duration * legs == units * 60;
    if !duration_ok {
        warn!(
            subject = %row.subject_code,
            duration,
            legs,
            units,
            "session duration violates the unit rules, row skipped"
        );
        return Ok(RowOutcome {
            placed: 0,
            skipped: days.len(),
            evictions: 0,
        });
    }

    let preferred_room = match &row.room {
        Some(name) => room_find_by_name(db_pool, name).await?,
        None => None,
    };
    let requires_lab = row.requires_lab
        || row
            .meeting_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("lab"));

    let entry_id = entry_find_or_create(db_pool, group_id, subject_id, section_id).await?;
    let request = PlacementRequest {
        entry_id,
        subject_id,
        section_id,
        instructor_id,
        days,
        start_min,
        end_min,
        preferred_room,
        needs: CourseNeeds {
            requires_lab,
            estimated_students: row.estimated_students.unwrap_or(0),
        },
    };

    // Snapshot checkpoint: a persistence failure rolls the in-memory view
    // back so it keeps matching the database.
    let checkpoint = state.snapshot.clone();
    let plan = state.place(&request);

    let meeting_type = row
        .meeting_type
        .clone()
        .unwrap_or_else(|| "lecture".to_string());
    let persisted = persist_plan(db_pool, run, entry_id, &plan, &meeting_type).await;
    if let Err(e) = persisted {
        warn!(entry_id, error = %e, "persisting placements failed, placements dropped");
        state.snapshot = checkpoint;
        entry_delete_if_empty(db_pool, entry_id).await?;
        return Ok(RowOutcome {
            placed: 0,
            skipped: request.days.len(),
            evictions: 0,
        });
    }

    if plan.placed.is_empty() {
        // An entry that ends the pass without meetings is removed rather
        // than left as an orphan.
        entry_delete_if_empty(db_pool, entry_id).await?;
    }

    for (day, reason) in &plan.skipped {
        debug!(entry_id, %day, ?reason, "meeting skipped");
    }

    Ok(RowOutcome {
        placed: plan.placed.len(),
        skipped: plan.skipped.len(),
        evictions: plan.moved.len(),
    })
}

/// Persists one placement plan inside a single transaction: eviction
/// moves first, then the inserts, all keyed on the
/// `(entry_id, day, start_time, end_time)` uniqueness constraint.
async fn persist_plan(
    db_pool: &Pool<Postgres>,
    run: &mut RunContext,
    entry_id: i32,
    plan: &scheduler::PlacementPlan,
    meeting_type: &str,
) -> Result<(), BoxedError> {
    let mut tx = db_pool.begin().await?;

    for moved in &plan.moved {
        let Some(db_id) = run.db_id(moved.meeting_id) else {
            warn!(
                provisional = moved.meeting_id,
                "eviction moved an unpersisted meeting, skipping its update"
            );
            continue;
        };
        meeting_move(
            &mut *tx,
            db_id,
            moved.day.abbrev(),
            minutes_to_naive(moved.start_min),
            minutes_to_naive(moved.end_min),
            moved.room_id,
        )
        .await?;
    }

    for record in &plan.placed {
        let meeting = ScheduleMeeting {
            id: None,
            entry_id,
            instructor_id: record.instructor_id,
            room_id: record.room_id,
            day: combine(&record.days),
            start_time: minutes_to_naive(record.start_min),
            end_time: minutes_to_naive(record.end_min),
            meeting_type: meeting_type.to_string(),
        };
        let db_id = meeting_insert(&mut *tx, &meeting).await?;
        run.meeting_ids.insert(record.id, db_id);
    }

    tx.commit().await?;
    Ok(())
}
