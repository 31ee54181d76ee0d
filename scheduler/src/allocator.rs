use crate::calendar::{candidate_slots, sort_weekly, within_day_window, Weekday};
use crate::conflicts::{ConflictSpec, MeetingRecord, ResourceKind, TimetableSnapshot};
use crate::rooms::{room_is_suitable, CourseNeeds, RoomInfo, RoomPicker};
use crate::tracker::ResourceTracker;
use serde::Serialize;
use tracing::debug;

/// One course meeting the caller wants placed: the desired days, window and
/// room for a (subject, section) entry. The engine treats these as a wish,
/// not a command; the plan it returns says what actually fit.
#[derive(Debug, Clone)]
pub struct PlacementRequest {
    pub entry_id: i32,
    pub subject_id: i32,
    pub section_id: i32,
    pub instructor_id: i32,
    pub days: Vec<Weekday>,
    pub start_min: i32,
    pub end_min: i32,
    pub preferred_room: Option<i32>,
    pub needs: CourseNeeds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoSuitableRoom,
    ResourceConflict,
    InvalidWindow,
}

/// Relocation of an already-committed meeting, produced by eviction.
#[derive(Debug, Clone, PartialEq)]
pub struct MovedMeeting {
    pub meeting_id: i32,
    pub day: Weekday,
    pub start_min: i32,
    pub end_min: i32,
    pub room_id: i32,
}

/// What one `place` call decided. Placed records carry provisional
/// (negative) ids until the caller persists them and learns the real ones.
#[derive(Debug, Clone, Default)]
pub struct PlacementPlan {
    pub placed: Vec<MeetingRecord>,
    pub moved: Vec<MovedMeeting>,
    pub skipped: Vec<(Weekday, SkipReason)>,
}

/// Mutable working state for one generation run: the group snapshot, the
/// room catalog, the run-scoped tracker and the load-balancing picker.
/// Built fresh per run and never shared across runs.
#[derive(Debug)]
pub struct TimetableState {
    pub snapshot: TimetableSnapshot,
    pub rooms: Vec<RoomInfo>,
    pub tracker: ResourceTracker,
    pub picker: RoomPicker,
    provisional_seq: i32,
}

impl TimetableState {
    pub fn new(snapshot: TimetableSnapshot, rooms: Vec<RoomInfo>) -> Self {
        Self {
            snapshot,
            rooms,
            tracker: ResourceTracker::new(),
            picker: RoomPicker::new(),
            provisional_seq: 0,
        }
    }

    fn next_provisional_id(&mut self) -> i32 {
        self.provisional_seq -= 1;
        self.provisional_seq
    }

    /// Places one course meeting per requested day.
    ///
    /// Per day: inherit the entry's canonical window and locked room if one
    /// exists, test the desired slot, and on conflict walk the fallback
    /// chain (same-time alternative, next-available-slot scan, backtracking
    /// eviction) before giving up on that day alone. A day that cannot be
    /// placed never fails the rest of the entry.
    pub fn place(&mut self, req: &PlacementRequest) -> PlacementPlan {
        let mut plan = PlacementPlan::default();

        // The canonical meeting is set by the entry's first placement,
        // whether from a prior call or earlier in this loop, and is only
        // consulted afterwards. It locks start/end/room for every later
        // day of the entry.
        let mut canonical: Option<(i32, i32, i32)> = self
            .snapshot
            .meetings_for_entry(req.entry_id)
            .next()
            .map(|m| (m.start_min, m.end_min, m.room_id));

        let mut days = req.days.clone();
        sort_weekly(&mut days);
        days.dedup();

        for day in days {
            let (start, end, room_pref) = match canonical {
                Some((s, e, locked)) => {
                    if req.preferred_room.is_some() && req.preferred_room != Some(locked) {
                        debug!(
                            entry_id = req.entry_id,
                            locked_room = locked,
                            caller_room = ?req.preferred_room,
                            "room locked by entry's first meeting, caller choice overridden"
                        );
                    }
                    (s, e, Some(locked))
                }
                None => (req.start_min, req.end_min, req.preferred_room),
            };
            let duration = end - start;
            if duration <= 0 || !within_day_window(start, end) {
                debug!(entry_id = req.entry_id, %day, start, end, "window violates time rules, skipped");
                plan.skipped.push((day, SkipReason::InvalidWindow));
                continue;
            }

            // Idempotence: an identical meeting already under this entry is
            // reused, not duplicated.
            if self
                .snapshot
                .meetings_for_entry(req.entry_id)
                .any(|m| m.days.contains(&day) && m.start_min == start && m.end_min == end)
            {
                continue;
            }

            if let Some((p_day, p_start, p_end, p_room, room_booked)) =
                self.place_one_day(req, day, start, end, room_pref, &mut plan)
            {
                let record = MeetingRecord {
                    id: self.next_provisional_id(),
                    entry_id: req.entry_id,
                    subject_id: req.subject_id,
                    section_id: req.section_id,
                    instructor_id: req.instructor_id,
                    room_id: p_room,
                    days: vec![p_day],
                    start_min: p_start,
                    end_min: p_end,
                };
                self.tracker.record(
                    ResourceKind::Instructor,
                    req.instructor_id,
                    p_day,
                    p_start,
                    p_end,
                );
                self.tracker
                    .record(ResourceKind::Section, req.section_id, p_day, p_start, p_end);
                if !room_booked {
                    self.tracker
                        .record(ResourceKind::Room, p_room, p_day, p_start, p_end);
                }
                if canonical.is_none() {
                    canonical = Some((p_start, p_end, p_room));
                }
                self.snapshot.meetings.push(record.clone());
                plan.placed.push(record);
            }
        }

        plan
    }

    /// Tries to land one meeting on (or near) the desired slot. Returns the
    /// placement plus whether the room booking already hit the tracker.
    fn place_one_day(
        &mut self,
        req: &PlacementRequest,
        day: Weekday,
        start: i32,
        end: i32,
        room_pref: Option<i32>,
        plan: &mut PlacementPlan,
    ) -> Option<(Weekday, i32, i32, i32, bool)> {
        // Instructor and section are checked before any room exists to
        // check against.
        let pre_spec = ConflictSpec {
            days: vec![day],
            start_min: start,
            end_min: end,
            instructor_id: Some(req.instructor_id),
            section_id: Some(req.section_id),
            same_subject_exempt: Some(req.subject_id),
            ..Default::default()
        };

        if !self.snapshot.has_conflict(&pre_spec) {
            let preferred_room = room_pref.and_then(|pref| {
                self.rooms
                    .iter()
                    .find(|r| r.id == pref && r.is_active && room_is_suitable(r, &req.needs))
            });

            match preferred_room {
                Some(room) => {
                    // The conflict engine, not the tracker, judges the
                    // preferred room: a same-subject joint session may share
                    // a room the tracker already shows booked.
                    let spec = ConflictSpec {
                        room_id: Some(room.id),
                        ..pre_spec.clone()
                    };
                    if !self.snapshot.has_conflict(&spec) {
                        let room_id = room.id;
                        self.tracker
                            .record(ResourceKind::Room, room_id, day, start, end);
                        return Some((day, start, end, room_id, true));
                    }
                    // Preferred room collides: fall through to the
                    // alternative search rather than the picker.
                }
                None => {
                    match self.picker.pick(
                        &self.rooms,
                        &mut self.tracker,
                        day,
                        start,
                        end,
                        &req.needs,
                        room_pref,
                    ) {
                        Some(room) => {
                            let spec = ConflictSpec {
                                room_id: Some(room),
                                ..pre_spec.clone()
                            };
                            if !self.snapshot.has_conflict(&spec) {
                                return Some((day, start, end, room, true));
                            }
                            // Picked room collides with a pre-existing row;
                            // fall through to the alternative search.
                        }
                        None => {
                            plan.skipped.push((day, SkipReason::NoSuitableRoom));
                            debug!(entry_id = req.entry_id, %day, "no suitable room, meeting skipped");
                            return None;
                        }
                    }
                }
            }
        }

        // Same-time alternative: duration and time of day fixed, search
        // days then rooms.
        if let Some((alt_day, alt_room)) =
            self.find_same_time_alternative(req, day, start, end, room_pref)
        {
            debug!(
                entry_id = req.entry_id,
                from = %day,
                to = %alt_day,
                room = alt_room,
                "same-time alternative placement"
            );
            return Some((alt_day, start, end, alt_room, false));
        }

        // Next-available-slot scan over the whole grid.
        let duration = end - start;
        if let Some((slot_day, slot_start, slot_room)) = self.scan_grid(
            req.instructor_id,
            req.subject_id,
            req.section_id,
            duration,
            &req.needs,
            room_pref,
        ) {
            debug!(
                entry_id = req.entry_id,
                %slot_day,
                slot_start,
                "next-available-slot placement"
            );
            return Some((slot_day, slot_start, slot_start + duration, slot_room, false));
        }

        // Last resort: evict one colliding placement, re-place it
        // elsewhere, and take the freed slot.
        if let Some((freed, moved)) = self.evict_and_replace(req, duration) {
            debug!(
                entry_id = req.entry_id,
                evicted = moved.meeting_id,
                "placed by evicting a colliding meeting"
            );
            plan.moved.push(moved);
            let (f_day, f_start, f_room) = freed;
            return Some((f_day, f_start, f_start + duration, f_room, false));
        }

        plan.skipped.push((day, SkipReason::ResourceConflict));
        debug!(entry_id = req.entry_id, %day, start, end, "no conflict-free slot found, meeting skipped");
        None
    }

    /// Searches days (the conflicted day first, then the rest of the week
    /// in order) crossed with rooms (preferred or locked room first, then
    /// the other active rooms of matching kind) for a slot at the same
    /// time of day with zero conflicts.
    fn find_same_time_alternative(
        &self,
        req: &PlacementRequest,
        current_day: Weekday,
        start: i32,
        end: i32,
        room_pref: Option<i32>,
    ) -> Option<(Weekday, i32)> {
        let mut day_order = vec![current_day];
        for d in Weekday::TEACHING {
            if d != current_day {
                day_order.push(d);
            }
        }

        for day in day_order {
            for room in self.room_order(room_pref, &req.needs) {
                let spec = ConflictSpec {
                    days: vec![day],
                    start_min: start,
                    end_min: end,
                    instructor_id: Some(req.instructor_id),
                    room_id: Some(room),
                    section_id: Some(req.section_id),
                    same_subject_exempt: Some(req.subject_id),
                    ..Default::default()
                };
                if !self.snapshot.has_conflict(&spec) {
                    return Some((day, room));
                }
            }
        }
        None
    }

    /// First conflict-free combination across the full candidate grid,
    /// ordered by weekday then slot start, rooms preferred-first.
    fn scan_grid(
        &self,
        instructor_id: i32,
        subject_id: i32,
        section_id: i32,
        duration: i32,
        needs: &CourseNeeds,
        room_pref: Option<i32>,
    ) -> Option<(Weekday, i32, i32)> {
        for (day, slot_start) in candidate_slots(duration) {
            for room in self.room_order(room_pref, needs) {
                let spec = ConflictSpec {
                    days: vec![day],
                    start_min: slot_start,
                    end_min: slot_start + duration,
                    instructor_id: Some(instructor_id),
                    room_id: Some(room),
                    section_id: Some(section_id),
                    same_subject_exempt: Some(subject_id),
                    ..Default::default()
                };
                if !self.snapshot.has_conflict(&spec) {
                    return Some((day, slot_start, room));
                }
            }
        }
        None
    }

    /// Backtracking eviction: find a grid slot blocked by exactly one
    /// other placement, tentatively pull that placement out, and keep the
    /// swap only if the evictee finds a new home and the requester fits
    /// the freed slot. On any failure the evictee is restored exactly as
    /// it was.
    fn evict_and_replace(
        &mut self,
        req: &PlacementRequest,
        duration: i32,
    ) -> Option<((Weekday, i32, i32), MovedMeeting)> {
        for (day, slot_start) in candidate_slots(duration) {
            for room in self.room_order(req.preferred_room, &req.needs) {
                let spec = ConflictSpec {
                    days: vec![day],
                    start_min: slot_start,
                    end_min: slot_start + duration,
                    instructor_id: Some(req.instructor_id),
                    room_id: Some(room),
                    section_id: Some(req.section_id),
                    same_subject_exempt: Some(req.subject_id),
                    ..Default::default()
                };
                let hits = self.snapshot.conflicts(&spec);
                // Only a slot blocked by a single other single-day meeting
                // is worth a swap attempt.
                let victim_id = match hits.first() {
                    Some(first)
                        if hits.iter().all(|h| h.meeting.id == first.meeting.id)
                            && first.meeting.entry_id != req.entry_id
                            && first.meeting.days.len() == 1 =>
                    {
                        first.meeting.id
                    }
                    _ => continue,
                };

                let evicted = match self.snapshot.remove(victim_id) {
                    Some(m) => m,
                    None => continue,
                };
                if self.snapshot.has_conflict(&spec) {
                    // Something else still blocks the slot; undo.
                    self.snapshot.meetings.push(evicted);
                    continue;
                }

                // A probe standing in for the requester keeps the evictee
                // from being re-placed straight back into the slot being
                // freed.
                let probe_id = self.next_provisional_id();
                self.snapshot.meetings.push(MeetingRecord {
                    id: probe_id,
                    entry_id: req.entry_id,
                    subject_id: req.subject_id,
                    section_id: req.section_id,
                    instructor_id: req.instructor_id,
                    room_id: room,
                    days: vec![day],
                    start_min: slot_start,
                    end_min: slot_start + duration,
                });

                let victim_duration = {
                    let (s, e) = evicted.ordered_interval();
                    e - s
                };
                let victim_needs = CourseNeeds {
                    requires_lab: self
                        .rooms
                        .iter()
                        .find(|r| r.id == evicted.room_id)
                        .map(|r| r.is_lab)
                        .unwrap_or(false),
                    estimated_students: 0,
                };

                let relocation = self.scan_grid(
                    evicted.instructor_id,
                    evicted.subject_id,
                    evicted.section_id,
                    victim_duration,
                    &victim_needs,
                    Some(evicted.room_id),
                );
                self.snapshot.remove(probe_id);

                match relocation {
                    Some((new_day, new_start, new_room)) => {
                        let mut relocated = evicted;
                        relocated.days = vec![new_day];
                        relocated.start_min = new_start;
                        relocated.end_min = new_start + victim_duration;
                        relocated.room_id = new_room;
                        self.tracker.record_meeting(
                            relocated.instructor_id,
                            new_room,
                            relocated.section_id,
                            new_day,
                            new_start,
                            new_start + victim_duration,
                        );
                        let moved = MovedMeeting {
                            meeting_id: relocated.id,
                            day: new_day,
                            start_min: new_start,
                            end_min: new_start + victim_duration,
                            room_id: new_room,
                        };
                        self.snapshot.meetings.push(relocated);
                        return Some(((day, slot_start, room), moved));
                    }
                    None => {
                        // No new home for the evictee: restore it exactly,
                        // no net state change.
                        self.snapshot.meetings.push(evicted);
                    }
                }
            }
        }
        None
    }

    /// Room iteration order for the fallback searches: preferred or locked
    /// room first, then the remaining active rooms of the matching kind.
    fn room_order(&self, room_pref: Option<i32>, needs: &CourseNeeds) -> Vec<i32> {
        let mut order = Vec::with_capacity(self.rooms.len());
        if let Some(pref) = room_pref {
            if self.rooms.iter().any(|r| r.id == pref && r.is_active) {
                order.push(pref);
            }
        }
        for room in &self.rooms {
            if room.is_active && room.is_lab == needs.requires_lab && !order.contains(&room.id) {
                order.push(room.id);
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Weekday::*;

    mod common {
        use super::*;

        pub(crate) fn lecture_room(id: i32) -> RoomInfo {
            RoomInfo {
                id,
                name: format!("Room {id}"),
                capacity: 45,
                is_lab: false,
                is_active: true,
            }
        }

        pub(crate) fn lab_room(id: i32) -> RoomInfo {
            RoomInfo {
                id,
                name: format!("Lab {id}"),
                capacity: 30,
                is_lab: true,
                is_active: true,
            }
        }

        pub(crate) fn request(
            entry_id: i32,
            instructor_id: i32,
            section_id: i32,
            days: Vec<Weekday>,
            start_min: i32,
            end_min: i32,
            preferred_room: Option<i32>,
        ) -> PlacementRequest {
            PlacementRequest {
                entry_id,
                subject_id: 1000 + entry_id,
                section_id,
                instructor_id,
                days,
                start_min,
                end_min,
                preferred_room,
                needs: CourseNeeds {
                    requires_lab: false,
                    estimated_students: 30,
                },
            }
        }

        pub(crate) fn seeded_meeting(
            id: i32,
            instructor_id: i32,
            section_id: i32,
            room_id: i32,
            day: Weekday,
            start_min: i32,
            end_min: i32,
        ) -> MeetingRecord {
            MeetingRecord {
                id,
                entry_id: 9000 + id,
                subject_id: 7000 + id,
                section_id,
                instructor_id,
                room_id,
                days: vec![day],
                start_min,
                end_min,
            }
        }

        /// Asserts the placement invariants over the whole snapshot:
        /// meetings sharing a section never overlap, and meetings sharing
        /// an instructor or room only overlap for the same subject (joint
        /// sessions).
        pub(crate) fn assert_no_self_overlap(snapshot: &TimetableSnapshot) {
            for (i, a) in snapshot.meetings.iter().enumerate() {
                for b in snapshot.meetings.iter().skip(i + 1) {
                    if !b.shares_day(&a.days) {
                        continue;
                    }
                    let (a_start, a_end) = a.ordered_interval();
                    let (b_start, b_end) = b.ordered_interval();
                    if !crate::conflicts::overlaps(a_start, a_end, b_start, b_end) {
                        continue;
                    }
                    assert_ne!(
                        a.section_id, b.section_id,
                        "section double-booked: {a:?} vs {b:?}"
                    );
                    if a.subject_id != b.subject_id {
                        assert_ne!(
                            a.instructor_id, b.instructor_id,
                            "instructor double-booked: {a:?} vs {b:?}"
                        );
                        assert_ne!(a.room_id, b.room_id, "room double-booked: {a:?} vs {b:?}");
                    }
                }
            }
        }
    }

    mod unit_tests {
        use super::common::*;
        use super::*;

        #[test]
        fn test_direct_placement_on_free_slot() {
            let rooms = vec![lecture_room(101), lecture_room(102)];
            let mut state = TimetableState::new(TimetableSnapshot::default(), rooms);
            let req = request(1, 1, 1, vec![Mon], 480, 570, Some(101));

            let plan = state.place(&req);
            assert_eq!(plan.placed.len(), 1);
            assert!(plan.skipped.is_empty());
            assert!(plan.moved.is_empty());
            let placed = &plan.placed[0];
            assert_eq!(placed.days, vec![Mon]);
            assert_eq!(placed.start_min, 480);
            assert_eq!(placed.end_min, 570);
            assert_eq!(placed.room_id, 101);
            assert!(placed.id < 0, "provisional ids are negative");
        }

        #[test]
        fn test_scenario_a_conflicting_request_lands_elsewhere() {
            // Instructor 1 already holds Mon 08:00-09:30 in room 101.
            let rooms = vec![lecture_room(101), lecture_room(102)];
            let mut state = TimetableState::new(TimetableSnapshot::default(), rooms);
            let first = request(1, 1, 1, vec![Mon], 480, 570, Some(101));
            assert_eq!(state.place(&first).placed.len(), 1);

            // Different subject, same instructor, Mon 08:30-10:00,
            // preferred room 101: must not land on the requested slot.
            let second = request(2, 1, 2, vec![Mon], 510, 600, Some(101));
            let plan = state.place(&second);
            assert_eq!(plan.placed.len(), 1);
            let placed = &plan.placed[0];
            let moved_off_slot = placed.days != vec![Mon]
                || !crate::conflicts::overlaps(placed.start_min, placed.end_min, 480, 570);
            assert!(
                moved_off_slot,
                "placement must dodge the instructor conflict: {placed:?}"
            );
            assert_no_self_overlap(&state.snapshot);
        }

        #[test]
        fn test_scenario_b_lab_course_lands_in_the_lab() {
            let rooms = vec![lecture_room(101), lab_room(201)];
            let mut state = TimetableState::new(TimetableSnapshot::default(), rooms);
            let mut req = request(1, 1, 1, vec![Mon], 420, 510, None);
            req.needs = CourseNeeds {
                requires_lab: true,
                estimated_students: 25,
            };

            let plan = state.place(&req);
            assert_eq!(plan.placed.len(), 1);
            assert_eq!(plan.placed[0].room_id, 201);
            assert_eq!(plan.placed[0].start_min, 420);
        }

        #[test]
        fn test_no_lab_anywhere_skips_with_reason() {
            let rooms = vec![lecture_room(101)];
            let mut state = TimetableState::new(TimetableSnapshot::default(), rooms);
            let mut req = request(1, 1, 1, vec![Mon], 480, 570, None);
            req.needs = CourseNeeds {
                requires_lab: true,
                estimated_students: 25,
            };

            let plan = state.place(&req);
            assert!(plan.placed.is_empty());
            assert_eq!(plan.skipped, vec![(Mon, SkipReason::NoSuitableRoom)]);
        }

        #[test]
        fn test_joint_session_inherits_time_and_locks_room() {
            let rooms = vec![lecture_room(101), lecture_room(102)];
            let mut state = TimetableState::new(TimetableSnapshot::default(), rooms);
            let req = request(1, 1, 1, vec![Mon, Thu], 780, 870, Some(102));

            let plan = state.place(&req);
            assert_eq!(plan.placed.len(), 2);
            let mon = plan.placed.iter().find(|m| m.days == vec![Mon]).unwrap();
            let thu = plan.placed.iter().find(|m| m.days == vec![Thu]).unwrap();
            assert_eq!(mon.start_min, thu.start_min);
            assert_eq!(mon.end_min, thu.end_min);
            assert_eq!(mon.room_id, thu.room_id, "room locks to the first leg");
        }

        #[test]
        fn test_room_lock_overrides_caller_room_on_later_days() {
            let rooms = vec![lecture_room(101), lecture_room(102)];
            let mut state = TimetableState::new(TimetableSnapshot::default(), rooms);
            // First leg of the entry placed in room 101 on Monday.
            let first = request(1, 1, 1, vec![Mon], 480, 570, Some(101));
            assert_eq!(state.place(&first).placed[0].room_id, 101);

            // A later call for the same entry asks for room 102 on
            // Thursday; the lock wins.
            let second = request(1, 1, 1, vec![Thu], 480, 570, Some(102));
            let plan = state.place(&second);
            assert_eq!(plan.placed.len(), 1);
            assert_eq!(plan.placed[0].room_id, 101);
        }

        #[test]
        fn test_idempotent_replay_creates_nothing() {
            let rooms = vec![lecture_room(101)];
            let mut state = TimetableState::new(TimetableSnapshot::default(), rooms);
            let req = request(1, 1, 1, vec![Mon], 480, 570, Some(101));

            assert_eq!(state.place(&req).placed.len(), 1);
            let replay = state.place(&req);
            assert!(replay.placed.is_empty());
            assert!(replay.skipped.is_empty());
            assert_eq!(state.snapshot.meetings.len(), 1);
        }

        #[test]
        fn test_invalid_window_skipped_not_repaired() {
            let rooms = vec![lecture_room(101)];
            let mut state = TimetableState::new(TimetableSnapshot::default(), rooms);
            // Crosses lunch.
            let req = request(1, 1, 1, vec![Mon], 700, 790, Some(101));
            let plan = state.place(&req);
            assert!(plan.placed.is_empty());
            assert_eq!(plan.skipped, vec![(Mon, SkipReason::InvalidWindow)]);

            // Before opening.
            let early = request(2, 1, 1, vec![Mon], 360, 450, Some(101));
            assert_eq!(
                state.place(&early).skipped,
                vec![(Mon, SkipReason::InvalidWindow)]
            );
        }

        #[test]
        fn test_joint_subject_shares_instructor_room_across_sections() {
            let rooms = vec![lecture_room(101)];
            let mut state = TimetableState::new(TimetableSnapshot::default(), rooms);
            // Section 1 and section 2 take the same subject from the same
            // instructor at the same time in the same room.
            let mut a = request(1, 1, 1, vec![Mon], 480, 570, Some(101));
            let mut b = request(2, 1, 2, vec![Mon], 480, 570, Some(101));
            a.subject_id = 5000;
            b.subject_id = 5000;

            assert_eq!(state.place(&a).placed.len(), 1);
            let plan = state.place(&b);
            assert_eq!(plan.placed.len(), 1);
            assert_eq!(plan.placed[0].room_id, 101);
            assert_eq!(plan.placed[0].start_min, 480);
            assert_eq!(plan.placed[0].days, vec![Mon]);
        }

        #[test]
        fn test_same_time_alternative_prefers_day_shift() {
            // One room only: a second course at the same Monday time must
            // move to another day at the same time of day.
            let rooms = vec![lecture_room(101)];
            let mut state = TimetableState::new(TimetableSnapshot::default(), rooms);
            let a = request(1, 1, 1, vec![Mon], 480, 570, Some(101));
            assert_eq!(state.place(&a).placed.len(), 1);

            let b = request(2, 2, 2, vec![Mon], 480, 570, Some(101));
            let plan = state.place(&b);
            assert_eq!(plan.placed.len(), 1);
            let placed = &plan.placed[0];
            assert_ne!(placed.days, vec![Mon]);
            assert_eq!(placed.start_min, 480);
            assert_eq!(placed.end_min, 570);
            assert_no_self_overlap(&state.snapshot);
        }
    }

    mod eviction_tests {
        use super::common::*;
        use super::*;

        /// Seeds one all-day blocker per teaching day for the given
        /// section, leaving optional gaps open on one day.
        fn wall_off_section(
            snapshot: &mut TimetableSnapshot,
            section_id: i32,
            gap: Option<(Weekday, i32, i32)>,
        ) {
            let mut id = 500;
            for day in Weekday::TEACHING {
                match gap {
                    Some((gap_day, gap_start, gap_end)) if gap_day == day => {
                        if gap_start > 420 {
                            snapshot.meetings.push(seeded_meeting(
                                id, 70, section_id, 999, day, 420, gap_start,
                            ));
                            id += 1;
                        }
                        if gap_end < 1245 {
                            snapshot.meetings.push(seeded_meeting(
                                id, 70, section_id, 999, day, gap_end, 1245,
                            ));
                            id += 1;
                        }
                    }
                    _ => {
                        snapshot.meetings.push(seeded_meeting(
                            id, 70, section_id, 999, day, 420, 1245,
                        ));
                        id += 1;
                    }
                }
            }
        }

        #[test]
        fn test_eviction_fails_cleanly_when_nothing_can_move() {
            // The requester's section is busy all week, so every grid slot
            // conflicts; the all-day blockers themselves can never be
            // re-placed (no slot fits an 825-minute meeting), so every
            // eviction attempt must back out without a trace.
            let mut snapshot = TimetableSnapshot::default();
            wall_off_section(&mut snapshot, 60, None);
            let rooms = vec![lecture_room(101)];
            let mut state = TimetableState::new(snapshot, rooms);

            let before = {
                let mut m = state.snapshot.meetings.clone();
                m.sort_by_key(|r| r.id);
                m
            };

            let req = request(999, 61, 60, vec![Mon], 480, 570, Some(101));
            let plan = state.place(&req);
            assert!(plan.placed.is_empty());
            assert!(plan.moved.is_empty());
            assert_eq!(plan.skipped, vec![(Mon, SkipReason::ResourceConflict)]);

            // Eviction safety: failed backtracking leaves no net change.
            let mut after = state.snapshot.meetings.clone();
            after.sort_by_key(|r| r.id);
            assert_eq!(before, after);
        }

        #[test]
        fn test_eviction_relocates_victim_and_places_requester() {
            // The requester's section is walled off everywhere except
            // Mon 07:00-08:30, where a lone victim occupies the only room.
            // Direct placement, alternatives and the grid scan all fail;
            // only evicting the victim frees the slot.
            let mut snapshot = TimetableSnapshot::default();
            wall_off_section(&mut snapshot, 60, Some((Mon, 420, 510)));
            let victim = seeded_meeting(7, 10, 10, 101, Mon, 420, 510);
            snapshot.meetings.push(victim);
            let rooms = vec![lecture_room(101)];
            let mut state = TimetableState::new(snapshot, rooms);

            let req = request(999, 61, 60, vec![Mon], 420, 510, Some(101));
            let plan = state.place(&req);

            assert_eq!(plan.placed.len(), 1, "requester should be placed");
            assert_eq!(plan.placed[0].days, vec![Mon]);
            assert_eq!(plan.placed[0].start_min, 420);
            assert_eq!(plan.placed[0].room_id, 101);

            assert_eq!(plan.moved.len(), 1);
            assert_eq!(plan.moved[0].meeting_id, 7);
            let relocated = state.snapshot.meeting(7).unwrap();
            assert!(
                relocated.days != vec![Mon] || relocated.start_min != 420,
                "victim must not stay in the freed slot: {relocated:?}"
            );
            assert_no_self_overlap(&state.snapshot);
        }
    }
}
