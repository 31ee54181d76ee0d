//! Timetable construction and conflict-management engine.
//!
//! Pure, synchronous scheduling core: no HTTP and no database I/O. The
//! server crate hydrates a [`TimetableSnapshot`] for one schedule group,
//! drives the [`TimetableState`] allocator over it, and persists the plans
//! the engine returns. Interactive editing goes through [`validate_edit`]
//! and [`suggest_alternatives`] against the same snapshot and the same
//! conflict predicate, so generation, repair and manual edits can never
//! disagree about what counts as a collision.

pub mod allocator;
pub mod calendar;
pub mod conflicts;
pub mod repair;
pub mod rooms;
pub mod suggest;
pub mod tracker;
pub mod validator;

pub use allocator::{MovedMeeting, PlacementPlan, PlacementRequest, SkipReason, TimetableState};
pub use calendar::{
    candidate_slots, combine, minutes_to_label, minutes_to_naive, naive_to_minutes, normalize_day,
    parse_combined, session_durations_min, sort_weekly, to_minutes, violates_lunch,
    within_day_window, EmploymentType, Weekday, DAY_CUTOFF_MIN, DAY_START_MIN, LUNCH_END_MIN,
    LUNCH_START_MIN, REPAIR_CEILING_MIN,
};
pub use conflicts::{
    cluster_conflicts, overlaps, ConflictCluster, ConflictHit, ConflictSpec, MeetingRecord,
    ResourceKind, TimetableSnapshot,
};
pub use repair::{repair_section_overlaps, RepairReport, RepairShift};
pub use rooms::{required_capacity, room_is_suitable, CourseNeeds, RoomInfo, RoomPicker};
pub use suggest::{
    suggest_alternatives, EditKind, Suggestion, SuggestionQuery, JOINT_SUGGESTION_CAP,
    SUGGESTION_CAP,
};
pub use tracker::ResourceTracker;
pub use validator::{
    validate_edit, ConflictDetail, ConflictKind, EditProposal, OffendingMeeting, ValidationOutcome,
};
