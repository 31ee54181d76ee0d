use crate::calendar::{Weekday, DAY_START_MIN, REPAIR_CEILING_MIN};
use crate::conflicts::{overlaps, ConflictSpec, TimetableSnapshot};
use tracing::{debug, warn};

/// One time shift the repair pass decided on. The meeting keeps its day
/// and room; only the window slides.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairShift {
    pub meeting_id: i32,
    pub new_start_min: i32,
    pub new_end_min: i32,
}

#[derive(Debug, Clone, Default)]
pub struct RepairReport {
    pub shifts: Vec<RepairShift>,
    /// Pairs of meeting ids left overlapping because neither shift
    /// validated.
    pub unresolved: Vec<(i32, i32)>,
}

/// Post-save local repair: walks every (section, day) bucket sorted by
/// start time and resolves adjacent overlaps by sliding one of the pair.
///
/// The later meeting is right-shifted to start exactly where the earlier
/// one ends, unless that pushes its end past 21:00 or collides with
/// another resource; failing that the earlier meeting is left-shifted to
/// end where the later one starts, floored at 07:00. Pairs where neither
/// shift validates are reported and left alone. The bucket is re-examined
/// from a fresh sort after every applied shift, since ordering may change.
pub fn repair_section_overlaps(snapshot: &mut TimetableSnapshot) -> RepairReport {
    let mut report = RepairReport::default();

    let mut buckets: Vec<(i32, Weekday)> = Vec::new();
    for meeting in &snapshot.meetings {
        for day in &meeting.days {
            if !buckets.contains(&(meeting.section_id, *day)) {
                buckets.push((meeting.section_id, *day));
            }
        }
    }

    for (section_id, day) in buckets {
        repair_bucket(snapshot, section_id, day, &mut report);
    }

    report
}

fn repair_bucket(
    snapshot: &mut TimetableSnapshot,
    section_id: i32,
    day: Weekday,
    report: &mut RepairReport,
) {
    loop {
        // (id, start, end) for the bucket, freshly sorted: shifts applied
        // in a prior pass may have reordered it.
        let mut items: Vec<(i32, i32, i32)> = snapshot
            .meetings
            .iter()
            .filter(|m| m.section_id == section_id && m.days.contains(&day))
            .map(|m| {
                let (s, e) = m.ordered_interval();
                (m.id, s, e)
            })
            .collect();
        items.sort_by_key(|(_, start, _)| *start);

        let mut shifted = false;
        for pair in items.windows(2) {
            let (a_id, a_start, a_end) = pair[0];
            let (b_id, b_start, b_end) = pair[1];
            if !overlaps(a_start, a_end, b_start, b_end) {
                continue;
            }
            if report.unresolved.contains(&(a_id, b_id)) {
                continue;
            }

            // Right-shift the later meeting flush against the earlier one.
            let b_duration = b_end - b_start;
            let shifted_b = (a_end, a_end + b_duration);
            if shifted_b.1 <= REPAIR_CEILING_MIN && fits(snapshot, b_id, shifted_b) {
                apply_shift(snapshot, b_id, shifted_b, report);
                debug!(
                    meeting_id = b_id,
                    new_start = shifted_b.0,
                    "repair: right-shifted overlapping meeting"
                );
                shifted = true;
                break;
            }

            // Left-shift the earlier meeting flush against the later one.
            let a_duration = a_end - a_start;
            let shifted_a = (b_start - a_duration, b_start);
            if shifted_a.0 >= DAY_START_MIN && fits(snapshot, a_id, shifted_a) {
                apply_shift(snapshot, a_id, shifted_a, report);
                debug!(
                    meeting_id = a_id,
                    new_start = shifted_a.0,
                    "repair: left-shifted overlapping meeting"
                );
                shifted = true;
                break;
            }

            warn!(
                earlier = a_id,
                later = b_id,
                section_id,
                %day,
                "repair: overlap left unresolved, neither shift validates"
            );
            report.unresolved.push((a_id, b_id));
        }

        if !shifted {
            break;
        }
    }
}

/// Availability of the meeting's instructor, room and section at the
/// candidate window, across every day the meeting occurs on.
fn fits(snapshot: &TimetableSnapshot, meeting_id: i32, window: (i32, i32)) -> bool {
    let Some(meeting) = snapshot.meeting(meeting_id) else {
        return false;
    };
    let spec = ConflictSpec {
        days: meeting.days.clone(),
        start_min: window.0,
        end_min: window.1,
        instructor_id: Some(meeting.instructor_id),
        room_id: Some(meeting.room_id),
        section_id: Some(meeting.section_id),
        same_subject_exempt: Some(meeting.subject_id),
        exclude_meeting: Some(meeting_id),
        ..Default::default()
    };
    !snapshot.has_conflict(&spec)
}

fn apply_shift(
    snapshot: &mut TimetableSnapshot,
    meeting_id: i32,
    window: (i32, i32),
    report: &mut RepairReport,
) {
    if let Some(meeting) = snapshot.meetings.iter_mut().find(|m| m.id == meeting_id) {
        meeting.start_min = window.0;
        meeting.end_min = window.1;
    }
    report.shifts.push(RepairShift {
        meeting_id,
        new_start_min: window.0,
        new_end_min: window.1,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Weekday::*;
    use crate::conflicts::MeetingRecord;

    fn meeting(
        id: i32,
        section_id: i32,
        instructor_id: i32,
        room_id: i32,
        day: Weekday,
        start_min: i32,
        end_min: i32,
    ) -> MeetingRecord {
        MeetingRecord {
            id,
            entry_id: id,
            subject_id: 100 + id,
            section_id,
            instructor_id,
            room_id,
            days: vec![day],
            start_min,
            end_min,
        }
    }

    #[test]
    fn test_scenario_e_right_shift_when_slot_free() {
        // Section 1: Mon 09:00-10:00 and Mon 09:30-10:30, overlapping by
        // mistake. The later one slides to 10:00-11:00.
        let mut snapshot = TimetableSnapshot::new(vec![
            meeting(1, 1, 1, 101, Mon, 540, 600),
            meeting(2, 1, 2, 102, Mon, 570, 630),
        ]);
        let report = repair_section_overlaps(&mut snapshot);

        assert_eq!(
            report.shifts,
            vec![RepairShift {
                meeting_id: 2,
                new_start_min: 600,
                new_end_min: 660,
            }]
        );
        assert!(report.unresolved.is_empty());
        let moved = snapshot.meeting(2).unwrap();
        assert_eq!((moved.start_min, moved.end_min), (600, 660));
    }

    #[test]
    fn test_scenario_e_left_shift_when_right_blocked() {
        // The right-shift target 10:00-11:00 is taken by the later
        // meeting's instructor elsewhere, so the earlier meeting slides
        // back to 08:00-09:00 instead.
        let mut snapshot = TimetableSnapshot::new(vec![
            meeting(1, 1, 1, 101, Mon, 540, 600),
            meeting(2, 1, 2, 102, Mon, 570, 630),
            // Instructor 2 teaches section 9 at Mon 10:00-11:00.
            meeting(3, 9, 2, 103, Mon, 600, 660),
        ]);
        let report = repair_section_overlaps(&mut snapshot);

        assert_eq!(
            report.shifts,
            vec![RepairShift {
                meeting_id: 1,
                new_start_min: 510,
                new_end_min: 570,
            }]
        );
        assert!(report.unresolved.is_empty());
        let moved = snapshot.meeting(1).unwrap();
        assert_eq!((moved.start_min, moved.end_min), (510, 570));
        let untouched = snapshot.meeting(2).unwrap();
        assert_eq!((untouched.start_min, untouched.end_min), (570, 630));
    }

    #[test]
    fn test_scenario_e_unresolved_when_both_shifts_blocked() {
        let mut snapshot = TimetableSnapshot::new(vec![
            meeting(1, 1, 1, 101, Mon, 540, 600),
            meeting(2, 1, 2, 102, Mon, 570, 630),
            // Blocks the right shift of meeting 2.
            meeting(3, 9, 2, 103, Mon, 600, 660),
            // Blocks the left shift of meeting 1 (room 101 busy 08:30-09:00).
            meeting(4, 8, 3, 101, Mon, 510, 540),
        ]);
        let before: Vec<(i32, i32, i32)> = snapshot
            .meetings
            .iter()
            .map(|m| (m.id, m.start_min, m.end_min))
            .collect();

        let report = repair_section_overlaps(&mut snapshot);

        assert!(report.shifts.is_empty());
        assert_eq!(report.unresolved, vec![(1, 2)]);
        let after: Vec<(i32, i32, i32)> = snapshot
            .meetings
            .iter()
            .map(|m| (m.id, m.start_min, m.end_min))
            .collect();
        assert_eq!(before, after, "unresolved pairs must stay untouched");
    }

    #[test]
    fn test_right_shift_capped_at_ceiling() {
        // Overlap late in the evening: right-shifting 2 would end past
        // 21:00, so the earlier meeting shifts left instead.
        let mut snapshot = TimetableSnapshot::new(vec![
            meeting(1, 1, 1, 101, Mon, 1140, 1230),
            meeting(2, 1, 2, 102, Mon, 1170, 1260),
        ]);
        let report = repair_section_overlaps(&mut snapshot);

        assert_eq!(report.shifts.len(), 1);
        assert_eq!(report.shifts[0].meeting_id, 1);
        assert_eq!(report.shifts[0].new_end_min, 1170);
        assert_eq!(report.shifts[0].new_start_min, 1080);
    }

    #[test]
    fn test_cascading_overlaps_resolve_in_order() {
        // Three stacked meetings: 09:00-10:00, 09:30-10:30, 10:00-11:00.
        // First shift moves 2 to 10:00-11:00, which now overlaps 3; the
        // pass re-sorts and resolves that too.
        let mut snapshot = TimetableSnapshot::new(vec![
            meeting(1, 1, 1, 101, Mon, 540, 600),
            meeting(2, 1, 2, 102, Mon, 570, 630),
            meeting(3, 1, 3, 103, Mon, 600, 660),
        ]);
        let report = repair_section_overlaps(&mut snapshot);

        assert!(report.unresolved.is_empty());
        // Final layout must be overlap-free within the section.
        let mut windows: Vec<(i32, i32)> = snapshot
            .meetings
            .iter()
            .map(|m| (m.start_min, m.end_min))
            .collect();
        windows.sort();
        for pair in windows.windows(2) {
            assert!(
                pair[0].1 <= pair[1].0,
                "section still overlaps after repair: {windows:?}"
            );
        }
    }

    #[test]
    fn test_different_days_never_considered_overlapping() {
        let mut snapshot = TimetableSnapshot::new(vec![
            meeting(1, 1, 1, 101, Mon, 540, 600),
            meeting(2, 1, 2, 102, Thu, 540, 600),
        ]);
        let report = repair_section_overlaps(&mut snapshot);
        assert!(report.shifts.is_empty());
        assert!(report.unresolved.is_empty());
    }
}
