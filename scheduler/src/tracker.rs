use crate::calendar::Weekday;
use crate::conflicts::{overlaps, ResourceKind};
use std::collections::HashMap;

/// Run-scoped index of bookings committed during the current generation
/// pass: `(resource kind, resource id, day)` to the intervals already
/// taken. Built fresh per run, consulted before persistence, and discarded
/// with the run. It also feeds the room-selection score with booking
/// counts.
#[derive(Debug, Default)]
pub struct ResourceTracker {
    booked: HashMap<(ResourceKind, i32, Weekday), Vec<(i32, i32)>>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one committed interval for a resource on a day.
    pub fn record(&mut self, kind: ResourceKind, id: i32, day: Weekday, start_min: i32, end_min: i32) {
        self.booked
            .entry((kind, id, day))
            .or_default()
            .push((start_min, end_min));
    }

    /// Records a whole placement: instructor, room and section at once.
    pub fn record_meeting(
        &mut self,
        instructor_id: i32,
        room_id: i32,
        section_id: i32,
        day: Weekday,
        start_min: i32,
        end_min: i32,
    ) {
        self.record(ResourceKind::Instructor, instructor_id, day, start_min, end_min);
        self.record(ResourceKind::Room, room_id, day, start_min, end_min);
        self.record(ResourceKind::Section, section_id, day, start_min, end_min);
    }

    /// True when the resource has no committed interval overlapping
    /// `[start, end)` on the day.
    pub fn is_free(&self, kind: ResourceKind, id: i32, day: Weekday, start_min: i32, end_min: i32) -> bool {
        match self.booked.get(&(kind, id, day)) {
            Some(intervals) => !intervals
                .iter()
                .any(|(s, e)| overlaps(start_min, end_min, *s, *e)),
            None => true,
        }
    }

    /// Committed bookings for a room across the whole week.
    pub fn room_bookings_total(&self, room_id: i32) -> usize {
        self.booked
            .iter()
            .filter(|((kind, id, _), _)| *kind == ResourceKind::Room && *id == room_id)
            .map(|(_, intervals)| intervals.len())
            .sum()
    }

    /// Committed bookings for a room on one day.
    pub fn room_bookings_on(&self, room_id: i32, day: Weekday) -> usize {
        self.booked
            .get(&(ResourceKind::Room, room_id, day))
            .map(Vec::len)
            .unwrap_or(0)
    }
}
