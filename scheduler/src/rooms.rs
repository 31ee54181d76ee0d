use crate::calendar::Weekday;
use crate::conflicts::ResourceKind;
use crate::tracker::ResourceTracker;
use serde::Serialize;
use sqlx::FromRow;
use tracing::debug;

/// Room reference data, hydrated straight from the catalog query.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RoomInfo {
    pub id: i32,
    pub name: String,
    pub capacity: i32,
    pub is_lab: bool,
    pub is_active: bool,
}

/// What the course being placed demands of a room.
#[derive(Debug, Clone, Copy, Default)]
pub struct CourseNeeds {
    pub requires_lab: bool,
    pub estimated_students: i32,
}

/// Minimum seat count for a class of the given size: a floor of 20 plus a
/// 20% headroom over the estimate.
pub fn required_capacity(estimated_students: i32) -> i32 {
    let padded = (estimated_students as f32 * 1.2).ceil() as i32;
    padded.max(20)
}

/// Active, matching lab kind, and big enough for the padded class size.
pub fn room_is_suitable(room: &RoomInfo, needs: &CourseNeeds) -> bool {
    room.is_active
        && room.is_lab == needs.requires_lab
        && room.capacity >= required_capacity(needs.estimated_students)
}

fn load_score(room: &RoomInfo, tracker: &ResourceTracker, day: Weekday) -> f32 {
    let total = tracker.room_bookings_total(room.id) as f32;
    let today = tracker.room_bookings_on(room.id, day) as f32;
    let capacity_bonus = (room.capacity as f32 / 50.0).min(1.0) * 20.0;
    (100.0 - total) + (50.0 - today) + capacity_bonus
}

/// Load-balancing room chooser. Scoring favors rooms with few bookings,
/// and a round-robin counter over the top three keeps one well-scored room
/// from absorbing every class.
#[derive(Debug, Default)]
pub struct RoomPicker {
    round_robin: usize,
}

impl RoomPicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Picks a room for the window, or `None` when no room can host the
    /// class. The chosen room's booking is recorded in the tracker before
    /// returning.
    pub fn pick(
        &mut self,
        rooms: &[RoomInfo],
        tracker: &mut ResourceTracker,
        day: Weekday,
        start_min: i32,
        end_min: i32,
        needs: &CourseNeeds,
        preferred: Option<i32>,
    ) -> Option<i32> {
        fn free(
            tracker: &ResourceTracker,
            room: &RoomInfo,
            day: Weekday,
            start_min: i32,
            end_min: i32,
        ) -> bool {
            tracker.is_free(ResourceKind::Room, room.id, day, start_min, end_min)
        }

        // A suitable, free preferred room short-circuits the search.
        if let Some(preferred_id) = preferred {
            if let Some(room) = rooms.iter().find(|r| r.id == preferred_id) {
                if room_is_suitable(room, needs) && free(tracker, room, day, start_min, end_min) {
                    tracker.record(ResourceKind::Room, room.id, day, start_min, end_min);
                    return Some(room.id);
                }
            }
        }

        let mut candidates: Vec<&RoomInfo> = rooms
            .iter()
            .filter(|r| room_is_suitable(r, needs) && free(tracker, r, day, start_min, end_min))
            .collect();

        // Lab sections take any free lab over nothing; capacity fit is
        // sacrificed before the lab requirement is. Non-lab sections fall
        // back the same way onto free lecture rooms.
        if candidates.is_empty() {
            candidates = rooms
                .iter()
                .filter(|r| {
                    r.is_active
                        && r.is_lab == needs.requires_lab
                        && free(tracker, r, day, start_min, end_min)
                })
                .collect();
        }
        if candidates.is_empty() {
            debug!(day = %day, start_min, end_min, requires_lab = needs.requires_lab, "no room available");
            return None;
        }

        let chosen = if candidates.len() == 1 {
            candidates[0]
        } else {
            candidates.sort_by(|a, b| {
                load_score(b, tracker, day)
                    .partial_cmp(&load_score(a, tracker, day))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let top = &candidates[..candidates.len().min(3)];
            let chosen = top[self.round_robin % top.len()];
            self.round_robin += 1;
            chosen
        };

        tracker.record(ResourceKind::Room, chosen.id, day, start_min, end_min);
        Some(chosen.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) fn make_room(id: i32, capacity: i32, is_lab: bool) -> RoomInfo {
        RoomInfo {
            id,
            name: format!("R{id}"),
            capacity,
            is_lab,
            is_active: true,
        }
    }

    fn lecture_needs(students: i32) -> CourseNeeds {
        CourseNeeds {
            requires_lab: false,
            estimated_students: students,
        }
    }

    #[test]
    fn test_required_capacity_floor_and_headroom() {
        assert_eq!(required_capacity(0), 20);
        assert_eq!(required_capacity(10), 20);
        assert_eq!(required_capacity(40), 48);
        assert_eq!(required_capacity(50), 60);
    }

    #[test]
    fn test_load_score_formula() {
        let room = make_room(1, 50, false);
        let mut tracker = ResourceTracker::new();
        tracker.record(ResourceKind::Room, 1, Weekday::Mon, 480, 570);
        tracker.record(ResourceKind::Room, 1, Weekday::Tue, 480, 570);

        // total = 2, today(Mon) = 1, capacity bonus = 20.
        let score = load_score(&room, &tracker, Weekday::Mon);
        assert_relative_eq!(score, 98.0 + 49.0 + 20.0);

        // Smaller room earns a proportional bonus.
        let small = make_room(2, 25, false);
        let score_small = load_score(&small, &ResourceTracker::new(), Weekday::Mon);
        assert_relative_eq!(score_small, 100.0 + 50.0 + 10.0);
    }

    #[test]
    fn test_preferred_room_wins_when_suitable_and_free() {
        let rooms = vec![make_room(1, 40, false), make_room(2, 40, false)];
        let mut tracker = ResourceTracker::new();
        let mut picker = RoomPicker::new();
        let chosen = picker.pick(
            &rooms,
            &mut tracker,
            Weekday::Mon,
            480,
            570,
            &lecture_needs(30),
            Some(2),
        );
        assert_eq!(chosen, Some(2));
        // Booking is recorded before returning.
        assert!(!tracker.is_free(ResourceKind::Room, 2, Weekday::Mon, 480, 570));
    }

    #[test]
    fn test_busy_preferred_room_falls_through_to_candidates() {
        let rooms = vec![make_room(1, 40, false), make_room(2, 40, false)];
        let mut tracker = ResourceTracker::new();
        tracker.record(ResourceKind::Room, 2, Weekday::Mon, 480, 570);
        let mut picker = RoomPicker::new();
        let chosen = picker.pick(
            &rooms,
            &mut tracker,
            Weekday::Mon,
            480,
            570,
            &lecture_needs(30),
            Some(2),
        );
        assert_eq!(chosen, Some(1));
    }

    #[test]
    fn test_lab_requirement_falls_back_to_any_free_lab() {
        // Only lab is too small for the class, but it is still a lab.
        let rooms = vec![make_room(1, 15, true), make_room(2, 100, false)];
        let mut tracker = ResourceTracker::new();
        let mut picker = RoomPicker::new();
        let needs = CourseNeeds {
            requires_lab: true,
            estimated_students: 40,
        };
        let chosen = picker.pick(&rooms, &mut tracker, Weekday::Mon, 480, 570, &needs, None);
        assert_eq!(chosen, Some(1));
    }

    #[test]
    fn test_no_suitable_room_returns_none() {
        // Lab required, no lab in the catalog at all.
        let rooms = vec![make_room(1, 60, false)];
        let mut tracker = ResourceTracker::new();
        let mut picker = RoomPicker::new();
        let needs = CourseNeeds {
            requires_lab: true,
            estimated_students: 10,
        };
        assert_eq!(
            picker.pick(&rooms, &mut tracker, Weekday::Mon, 480, 570, &needs, None),
            None
        );

        // Single lecture room already taken: nothing left either.
        let rooms = vec![make_room(1, 60, false)];
        tracker.record(ResourceKind::Room, 1, Weekday::Mon, 480, 570);
        assert_eq!(
            picker.pick(
                &rooms,
                &mut tracker,
                Weekday::Mon,
                480,
                570,
                &lecture_needs(10),
                None
            ),
            None
        );
    }

    #[test]
    fn test_inactive_rooms_never_chosen() {
        let mut room = make_room(1, 60, false);
        room.is_active = false;
        let mut tracker = ResourceTracker::new();
        let mut picker = RoomPicker::new();
        assert_eq!(
            picker.pick(
                &[room],
                &mut tracker,
                Weekday::Mon,
                480,
                570,
                &lecture_needs(10),
                None
            ),
            None
        );
    }

    #[test]
    fn test_round_robin_spreads_equal_rooms() {
        let rooms = vec![
            make_room(1, 40, false),
            make_room(2, 40, false),
            make_room(3, 40, false),
        ];
        let mut picker = RoomPicker::new();
        let mut seen = std::collections::HashSet::new();
        for i in 0..3 {
            // Fresh tracker per pick so scores stay tied and only the
            // counter advances.
            let mut tracker = ResourceTracker::new();
            let chosen = picker
                .pick(
                    &rooms,
                    &mut tracker,
                    Weekday::Mon,
                    480 + i, // irrelevant to scoring
                    570 + i,
                    &lecture_needs(30),
                    None,
                )
                .unwrap();
            seen.insert(chosen);
        }
        assert_eq!(seen.len(), 3, "round robin should rotate the top three");
    }
}
