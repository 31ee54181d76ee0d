use crate::calendar::{minutes_to_label, violates_lunch, Weekday, DAY_CUTOFF_MIN, DAY_START_MIN};
use crate::calendar::combine;
use crate::conflicts::{ConflictSpec, ResourceKind, TimetableSnapshot};
use serde::Serialize;

/// The conflict vocabulary reported to operators. The first four are time
/// rules; the rest are resource collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    StartTime,
    Lunch,
    Cutoff,
    Duration,
    Instructor,
    Room,
    Section,
}

/// The meeting a resource conflict collides with, in display-ready form.
#[derive(Debug, Clone, Serialize)]
pub struct OffendingMeeting {
    pub meeting_id: i32,
    pub entry_id: i32,
    pub day: String,
    pub start_time: String,
    pub end_time: String,
    pub room_id: i32,
    pub instructor_id: i32,
    pub section_id: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConflictDetail {
    pub kind: ConflictKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting: Option<OffendingMeeting>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub ok: bool,
    pub conflicts: Vec<ConflictDetail>,
}

impl ValidationOutcome {
    fn rejected(conflicts: Vec<ConflictDetail>) -> Self {
        Self {
            ok: false,
            conflicts,
        }
    }
}

/// A proposed single-meeting change with its resolved context. The
/// resource ids are optional: what is absent is not checked. Duration
/// rules come pre-derived from the subject's units and the instructor's
/// employment type.
#[derive(Debug, Clone, Default)]
pub struct EditProposal {
    pub days: Vec<Weekday>,
    pub start_min: i32,
    pub end_min: i32,
    pub instructor_id: Option<i32>,
    pub room_id: Option<i32>,
    pub section_id: Option<i32>,
    pub subject_id: Option<i32>,
    pub exclude_entry: Option<i32>,
    pub exclude_meeting: Option<i32>,
    pub allowed_durations_min: Vec<i32>,
    pub weekly_load_min: Option<i32>,
    /// Meetings sharing the entry's time window; above 1 the duration is
    /// judged per session instead of as the whole weekly load.
    pub joint_legs: usize,
}

/// Validates a proposed edit. Time rules are checked first and all of
/// their violations are reported together; any time-rule failure
/// short-circuits the resource checks entirely. Business-rule failures
/// are values, never errors.
pub fn validate_edit(snapshot: &TimetableSnapshot, proposal: &EditProposal) -> ValidationOutcome {
    let mut violations = Vec::new();
    let start = proposal.start_min;
    let end = proposal.end_min;

    if start < DAY_START_MIN {
        violations.push(ConflictDetail {
            kind: ConflictKind::StartTime,
            message: format!(
                "start {} is before the {} opening",
                minutes_to_label(start),
                minutes_to_label(DAY_START_MIN)
            ),
            meeting: None,
        });
    }
    if violates_lunch(start, end) {
        violations.push(ConflictDetail {
            kind: ConflictKind::Lunch,
            message: format!(
                "{}-{} intersects the lunch break",
                minutes_to_label(start),
                minutes_to_label(end)
            ),
            meeting: None,
        });
    }
    if end >= DAY_CUTOFF_MIN {
        violations.push(ConflictDetail {
            kind: ConflictKind::Cutoff,
            message: format!(
                "end {} is past the {} cutoff",
                minutes_to_label(end),
                minutes_to_label(DAY_CUTOFF_MIN)
            ),
            meeting: None,
        });
    }
    if let Some(detail) = duration_violation(proposal) {
        violations.push(detail);
    }

    if !violations.is_empty() {
        return ValidationOutcome::rejected(violations);
    }

    let spec = ConflictSpec {
        days: proposal.days.clone(),
        start_min: start,
        end_min: end,
        instructor_id: proposal.instructor_id,
        room_id: proposal.room_id,
        section_id: proposal.section_id,
        same_subject_exempt: proposal.subject_id,
        exclude_entry: proposal.exclude_entry,
        exclude_meeting: proposal.exclude_meeting,
    };
    let conflicts: Vec<ConflictDetail> = snapshot
        .conflicts(&spec)
        .into_iter()
        .map(|hit| {
            let kind = match hit.kind {
                ResourceKind::Instructor => ConflictKind::Instructor,
                ResourceKind::Room => ConflictKind::Room,
                ResourceKind::Section => ConflictKind::Section,
            };
            let m = hit.meeting;
            ConflictDetail {
                kind,
                message: format!(
                    "collides with meeting {} on {} {}-{}",
                    m.id,
                    combine(&m.days),
                    minutes_to_label(m.start_min),
                    minutes_to_label(m.end_min)
                ),
                meeting: Some(OffendingMeeting {
                    meeting_id: m.id,
                    entry_id: m.entry_id,
                    day: combine(&m.days),
                    start_time: minutes_to_label(m.start_min),
                    end_time: minutes_to_label(m.end_min),
                    room_id: m.room_id,
                    instructor_id: m.instructor_id,
                    section_id: m.section_id,
                }),
            }
        })
        .collect();

    ValidationOutcome {
        ok: conflicts.is_empty(),
        conflicts,
    }
}

/// The duration rule: a solo meeting carries the whole weekly load in one
/// valid session length; a joint-session leg carries an equal share of it.
/// With no derived durations available the rule is not enforced.
fn duration_violation(proposal: &EditProposal) -> Option<ConflictDetail> {
    if proposal.allowed_durations_min.is_empty() {
        return None;
    }
    let duration = proposal.end_min - proposal.start_min;
    let legs = proposal.joint_legs.max(1) as i32;

    let mut valid = proposal.allowed_durations_min.contains(&duration);
    if let Some(load) = proposal.weekly_load_min {
        valid = valid && duration * legs == load;
    }
    if valid {
        return None;
    }

    Some(ConflictDetail {
        kind: ConflictKind::Duration,
        message: format!(
            "{duration} minutes is not a valid session length (allowed: {:?})",
            proposal.allowed_durations_min
        ),
        meeting: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Weekday::*;
    use crate::conflicts::MeetingRecord;

    fn occupied_snapshot() -> TimetableSnapshot {
        TimetableSnapshot::new(vec![MeetingRecord {
            id: 1,
            entry_id: 1,
            subject_id: 101,
            section_id: 11,
            instructor_id: 21,
            room_id: 31,
            days: vec![Mon],
            start_min: 480,
            end_min: 570,
        }])
    }

    fn proposal(days: Vec<Weekday>, start_min: i32, end_min: i32) -> EditProposal {
        EditProposal {
            days,
            start_min,
            end_min,
            allowed_durations_min: vec![90, 180],
            weekly_load_min: Some(180),
            joint_legs: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_scenario_c_lunch_edit_rejected_before_resource_checks() {
        // 11:45-13:15 crosses lunch; with a 3-unit load the 90-minute solo
        // duration is wrong too. Resource availability is never consulted.
        let snapshot = occupied_snapshot();
        let mut p = proposal(vec![Mon], 705, 795);
        // Deliberately aim at the occupied instructor: the lunch rejection
        // must fire without an instructor conflict appearing.
        p.instructor_id = Some(21);

        let outcome = validate_edit(&snapshot, &p);
        assert!(!outcome.ok);
        let kinds: Vec<ConflictKind> = outcome.conflicts.iter().map(|c| c.kind).collect();
        assert!(kinds.contains(&ConflictKind::Lunch));
        assert!(kinds.contains(&ConflictKind::Duration));
        assert!(!kinds.contains(&ConflictKind::Instructor));
    }

    #[test]
    fn test_early_start_and_late_end_rejected() {
        let snapshot = TimetableSnapshot::default();
        let outcome = validate_edit(&snapshot, &proposal(vec![Mon], 390, 570));
        assert!(!outcome.ok);
        assert_eq!(outcome.conflicts[0].kind, ConflictKind::StartTime);

        let outcome = validate_edit(&snapshot, &proposal(vec![Mon], 1110, 1290));
        assert!(!outcome.ok);
        assert!(outcome
            .conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::Cutoff));

        // Ending exactly at the cutoff is already out.
        let outcome = validate_edit(&snapshot, &proposal(vec![Mon], 1065, 1245));
        assert!(outcome
            .conflicts
            .iter()
            .any(|c| c.kind == ConflictKind::Cutoff));
    }

    #[test]
    fn test_solo_duration_must_cover_weekly_load() {
        let snapshot = TimetableSnapshot::default();
        // 90 minutes is a valid session length but only half the load.
        let outcome = validate_edit(&snapshot, &proposal(vec![Mon], 480, 570));
        assert!(!outcome.ok);
        assert_eq!(outcome.conflicts[0].kind, ConflictKind::Duration);

        // The full 3 hours passes.
        let outcome = validate_edit(&snapshot, &proposal(vec![Mon], 840, 1020));
        assert!(outcome.ok, "{:?}", outcome.conflicts);
    }

    #[test]
    fn test_joint_legs_validate_per_session() {
        let snapshot = TimetableSnapshot::default();
        let mut p = proposal(vec![Mon, Thu], 480, 570);
        p.joint_legs = 2;
        let outcome = validate_edit(&snapshot, &p);
        assert!(outcome.ok, "{:?}", outcome.conflicts);

        // Two three-hour legs would double the load.
        let mut p = proposal(vec![Mon, Thu], 840, 1020);
        p.joint_legs = 2;
        let outcome = validate_edit(&snapshot, &p);
        assert!(!outcome.ok);
        assert_eq!(outcome.conflicts[0].kind, ConflictKind::Duration);
    }

    #[test]
    fn test_unknown_durations_skip_the_rule() {
        let snapshot = TimetableSnapshot::default();
        let mut p = proposal(vec![Mon], 480, 555);
        p.allowed_durations_min = Vec::new();
        p.weekly_load_min = None;
        let outcome = validate_edit(&snapshot, &p);
        assert!(outcome.ok);
    }

    #[test]
    fn test_resource_conflicts_reported_with_offender() {
        let snapshot = occupied_snapshot();
        let mut p = proposal(vec![Mon], 480, 660);
        p.instructor_id = Some(21);
        p.room_id = Some(31);
        p.section_id = Some(11);

        let outcome = validate_edit(&snapshot, &p);
        assert!(!outcome.ok);
        let kinds: Vec<ConflictKind> = outcome.conflicts.iter().map(|c| c.kind).collect();
        assert!(kinds.contains(&ConflictKind::Instructor));
        assert!(kinds.contains(&ConflictKind::Room));
        assert!(kinds.contains(&ConflictKind::Section));
        let offender = outcome.conflicts[0].meeting.as_ref().unwrap();
        assert_eq!(offender.meeting_id, 1);
        assert_eq!(offender.day, "Mon");
        assert_eq!(offender.start_time, "08:00");
    }

    #[test]
    fn test_excluded_meeting_does_not_conflict_with_itself() {
        let snapshot = occupied_snapshot();
        let mut p = proposal(vec![Mon], 480, 660);
        p.instructor_id = Some(21);
        p.room_id = Some(31);
        p.section_id = Some(11);
        p.exclude_meeting = Some(1);

        let outcome = validate_edit(&snapshot, &p);
        assert!(outcome.ok, "{:?}", outcome.conflicts);
    }
}
