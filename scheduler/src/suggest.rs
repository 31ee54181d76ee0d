use crate::calendar::{
    candidate_slots, combine, violates_lunch, Weekday, DAY_CUTOFF_MIN, DAY_START_MIN, SLOT_STEP_MIN,
};
use crate::conflicts::{ConflictSpec, TimetableSnapshot};
use crate::rooms::RoomInfo;
use crate::validator::{validate_edit, EditProposal};
use serde::Serialize;
use tracing::debug;

/// Which field of the meeting the operator is editing. Day edits exclude
/// the original day and dedupe per day; time edits on a joint session
/// search all of its days at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Time,
    Day,
    Room,
}

pub const SUGGESTION_CAP: usize = 10;
pub const JOINT_SUGGESTION_CAP: usize = 30;

#[derive(Debug, Clone)]
pub struct SuggestionQuery {
    pub duration_min: i32,
    pub instructor_id: Option<i32>,
    pub room_id: Option<i32>,
    pub section_id: Option<i32>,
    pub subject_id: Option<i32>,
    pub exclude_meeting: Option<i32>,
    pub exclude_entry: Option<i32>,
    pub original_day: Option<Weekday>,
    pub original_start: Option<i32>,
    /// All days of the joint session when a joint time edit is underway;
    /// empty otherwise.
    pub joint_days: Vec<Weekday>,
    pub edit: EditKind,
    pub allowed_durations_min: Vec<i32>,
    pub weekly_load_min: Option<i32>,
    pub joint_legs: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub days: Vec<Weekday>,
    pub day_label: String,
    pub start_min: i32,
    pub end_min: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<i32>,
}

/// Proposes ranked alternative slots for a conflicted edit.
///
/// Candidates come from the day-by-half-hour grid inside the teaching
/// window; each surviving candidate is run back through the validator as
/// a final gate, so a suggestion handed to the caller is one the
/// validator would accept.
pub fn suggest_alternatives(
    snapshot: &TimetableSnapshot,
    rooms: &[RoomInfo],
    query: &SuggestionQuery,
) -> Vec<Suggestion> {
    let raw = if query.joint_days.len() > 1 && query.edit == EditKind::Time {
        joint_time_candidates(snapshot, query)
    } else {
        single_leg_candidates(snapshot, rooms, query)
    };

    // Final gate: everything returned must validate.
    let accepted: Vec<Suggestion> = raw
        .into_iter()
        .filter(|s| {
            let proposal = EditProposal {
                days: s.days.clone(),
                start_min: s.start_min,
                end_min: s.end_min,
                instructor_id: query.instructor_id,
                room_id: s.room_id,
                section_id: query.section_id,
                subject_id: query.subject_id,
                exclude_entry: query.exclude_entry,
                exclude_meeting: query.exclude_meeting,
                allowed_durations_min: query.allowed_durations_min.clone(),
                weekly_load_min: query.weekly_load_min,
                joint_legs: query.joint_legs,
            };
            let outcome = validate_edit(snapshot, &proposal);
            if !outcome.ok {
                debug!(?s, "suggestion dropped by the validator gate");
            }
            outcome.ok
        })
        .collect();

    accepted
}

/// Joint-session time edit: a candidate time must be simultaneously free
/// on every day of the session, and is reported once under the combined
/// day label with the room kept as is.
fn joint_time_candidates(snapshot: &TimetableSnapshot, query: &SuggestionQuery) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();
    let mut start = DAY_START_MIN;
    while start + query.duration_min < DAY_CUTOFF_MIN {
        let end = start + query.duration_min;
        if violates_lunch(start, end) || query.original_start == Some(start) {
            start += SLOT_STEP_MIN;
            continue;
        }

        let spec = ConflictSpec {
            days: query.joint_days.clone(),
            start_min: start,
            end_min: end,
            instructor_id: query.instructor_id,
            room_id: query.room_id,
            section_id: query.section_id,
            same_subject_exempt: query.subject_id,
            exclude_entry: query.exclude_entry,
            exclude_meeting: query.exclude_meeting,
        };
        if !snapshot.has_conflict(&spec) {
            suggestions.push(Suggestion {
                days: query.joint_days.clone(),
                day_label: combine(&query.joint_days),
                start_min: start,
                end_min: end,
                room_id: query.room_id,
            });
            if suggestions.len() >= JOINT_SUGGESTION_CAP {
                break;
            }
        }
        start += SLOT_STEP_MIN;
    }
    suggestions
}

/// Ordinary edit: walk the grid, trying the currently assigned room first
/// and the other active rooms after it, keeping the first conflict-free
/// room per viable slot.
fn single_leg_candidates(
    snapshot: &TimetableSnapshot,
    rooms: &[RoomInfo],
    query: &SuggestionQuery,
) -> Vec<Suggestion> {
    let mut room_order: Vec<i32> = Vec::with_capacity(rooms.len());
    if let Some(current) = query.room_id {
        room_order.push(current);
    }
    for room in rooms.iter().filter(|r| r.is_active) {
        if !room_order.contains(&room.id) {
            room_order.push(room.id);
        }
    }

    let mut suggestions: Vec<Suggestion> = Vec::new();
    for (day, start) in candidate_slots(query.duration_min) {
        if query.edit == EditKind::Day {
            // Day edits never suggest the day being moved away from, and
            // one suggestion per day is enough.
            if query.original_day == Some(day) {
                continue;
            }
            if suggestions.iter().any(|s| s.days == vec![day]) {
                continue;
            }
        } else if query.original_day == Some(day) && query.original_start == Some(start) {
            // The slot identical to the original is not an alternative.
            continue;
        }

        let end = start + query.duration_min;
        for &room in &room_order {
            let spec = ConflictSpec {
                days: vec![day],
                start_min: start,
                end_min: end,
                instructor_id: query.instructor_id,
                room_id: Some(room),
                section_id: query.section_id,
                same_subject_exempt: query.subject_id,
                exclude_entry: query.exclude_entry,
                exclude_meeting: query.exclude_meeting,
            };
            if snapshot.has_conflict(&spec) {
                continue;
            }
            let duplicate = suggestions
                .iter()
                .any(|s| s.days == vec![day] && s.start_min == start && s.room_id == Some(room));
            if !duplicate {
                suggestions.push(Suggestion {
                    days: vec![day],
                    day_label: day.abbrev().to_string(),
                    start_min: start,
                    end_min: end,
                    room_id: Some(room),
                });
            }
            break;
        }

        if suggestions.len() >= SUGGESTION_CAP {
            break;
        }
    }
    suggestions
}
