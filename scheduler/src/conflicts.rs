use crate::calendar::Weekday;
use serde::Serialize;
use tracing::warn;

/// One persisted (or run-committed) meeting, flattened with the entry
/// fields the conflict checks need. `days` is the expanded day set; a
/// normal row carries a single day.
#[derive(Debug, Clone, PartialEq)]
pub struct MeetingRecord {
    pub id: i32,
    pub entry_id: i32,
    pub subject_id: i32,
    pub section_id: i32,
    pub instructor_id: i32,
    pub room_id: i32,
    pub days: Vec<Weekday>,
    pub start_min: i32,
    pub end_min: i32,
}

impl MeetingRecord {
    /// The interval with endpoints in order. Stored rows occasionally
    /// arrive inverted; comparisons always run on the swapped pair and the
    /// corruption is logged, never propagated as an error.
    pub fn ordered_interval(&self) -> (i32, i32) {
        if self.start_min >= self.end_min {
            warn!(
                meeting_id = self.id,
                start = self.start_min,
                end = self.end_min,
                "corrupted interval, comparing with endpoints swapped"
            );
            (self.end_min, self.start_min)
        } else {
            (self.start_min, self.end_min)
        }
    }

    pub fn shares_day(&self, days: &[Weekday]) -> bool {
        self.days.iter().any(|d| days.contains(d))
    }
}

/// Half-open interval overlap: `[a_start, a_end)` intersects
/// `[b_start, b_end)`. Back-to-back meetings do not overlap.
pub fn overlaps(a_start: i32, a_end: i32, b_start: i32, b_end: i32) -> bool {
    a_start < b_end && b_start < a_end
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Instructor,
    Room,
    Section,
}

/// The one conflict contract shared by generation, repair, validation and
/// suggestion. Optional resources are simply not checked; the optional
/// subject exempts same-subject hits from the instructor and room checks so
/// intentional joint sessions pass.
#[derive(Debug, Clone, Default)]
pub struct ConflictSpec {
    pub days: Vec<Weekday>,
    pub start_min: i32,
    pub end_min: i32,
    pub instructor_id: Option<i32>,
    pub room_id: Option<i32>,
    pub section_id: Option<i32>,
    pub same_subject_exempt: Option<i32>,
    pub exclude_entry: Option<i32>,
    pub exclude_meeting: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct ConflictHit {
    pub kind: ResourceKind,
    pub meeting: MeetingRecord,
}

/// In-memory view of every meeting in one schedule group. All conflict
/// queries are scoped to a single group, so the snapshot is too.
#[derive(Debug, Clone, Default)]
pub struct TimetableSnapshot {
    pub meetings: Vec<MeetingRecord>,
}

impl TimetableSnapshot {
    pub fn new(meetings: Vec<MeetingRecord>) -> Self {
        Self { meetings }
    }

    pub fn meetings_for_entry(&self, entry_id: i32) -> impl Iterator<Item = &MeetingRecord> {
        self.meetings.iter().filter(move |m| m.entry_id == entry_id)
    }

    pub fn meeting(&self, id: i32) -> Option<&MeetingRecord> {
        self.meetings.iter().find(|m| m.id == id)
    }

    pub fn remove(&mut self, id: i32) -> Option<MeetingRecord> {
        let idx = self.meetings.iter().position(|m| m.id == id)?;
        Some(self.meetings.swap_remove(idx))
    }

    pub fn has_conflict(&self, spec: &ConflictSpec) -> bool {
        !self.conflicts(spec).is_empty()
    }

    /// Every meeting colliding with the proposed interval, tagged by the
    /// resource that collides. A single meeting can hit on more than one
    /// resource and is reported once per kind.
    pub fn conflicts(&self, spec: &ConflictSpec) -> Vec<ConflictHit> {
        let mut hits = Vec::new();
        let (q_start, q_end) = if spec.start_min >= spec.end_min {
            (spec.end_min, spec.start_min)
        } else {
            (spec.start_min, spec.end_min)
        };

        for meeting in &self.meetings {
            if spec.exclude_meeting == Some(meeting.id) {
                continue;
            }
            if spec.exclude_entry == Some(meeting.entry_id) {
                continue;
            }
            if !meeting.shares_day(&spec.days) {
                continue;
            }
            let (m_start, m_end) = meeting.ordered_interval();
            if !overlaps(q_start, q_end, m_start, m_end) {
                continue;
            }

            let subject_exempt = spec.same_subject_exempt == Some(meeting.subject_id);

            if let Some(instructor_id) = spec.instructor_id {
                if meeting.instructor_id == instructor_id && !subject_exempt {
                    hits.push(ConflictHit {
                        kind: ResourceKind::Instructor,
                        meeting: meeting.clone(),
                    });
                }
            }
            if let Some(room_id) = spec.room_id {
                if meeting.room_id == room_id && !subject_exempt {
                    hits.push(ConflictHit {
                        kind: ResourceKind::Room,
                        meeting: meeting.clone(),
                    });
                }
            }
            if let Some(section_id) = spec.section_id {
                // Section collisions are never exempted: a section cannot sit
                // in two meetings at once, joint subject or not.
                if meeting.section_id == section_id {
                    hits.push(ConflictHit {
                        kind: ResourceKind::Section,
                        meeting: meeting.clone(),
                    });
                }
            }
        }

        hits
    }
}

/// A maximal group of meetings contending for one resource, used for
/// reporting. Only clusters of two or more meetings are emitted.
#[derive(Debug, Clone)]
pub struct ConflictCluster {
    pub kind: ResourceKind,
    pub resource_id: i32,
    pub meetings: Vec<MeetingRecord>,
}

/// Clusters mutually overlapping meetings per resource kind.
///
/// Meetings are grouped by resource id, then each unprocessed meeting seeds
/// a cluster that absorbs every other unprocessed meeting overlapping it on
/// a shared day. Room clusters require equal room ids; the grouping key
/// already guarantees that, as it does for instructors and sections.
pub fn cluster_conflicts(meetings: &[MeetingRecord]) -> Vec<ConflictCluster> {
    use itertools::Itertools;

    let mut clusters = Vec::new();
    for kind in [
        ResourceKind::Instructor,
        ResourceKind::Room,
        ResourceKind::Section,
    ] {
        let by_resource = meetings
            .iter()
            .map(|meeting| {
                let resource_id = match kind {
                    ResourceKind::Instructor => meeting.instructor_id,
                    ResourceKind::Room => meeting.room_id,
                    ResourceKind::Section => meeting.section_id,
                };
                (resource_id, meeting)
            })
            .into_group_map()
            .into_iter()
            .sorted_by_key(|(resource_id, _)| *resource_id);

        for (resource_id, group) in by_resource {
            let mut processed = vec![false; group.len()];
            for seed_idx in 0..group.len() {
                if processed[seed_idx] {
                    continue;
                }
                processed[seed_idx] = true;
                let seed = group[seed_idx];
                let (seed_start, seed_end) = seed.ordered_interval();
                let mut cluster = vec![seed.clone()];

                for other_idx in 0..group.len() {
                    if processed[other_idx] {
                        continue;
                    }
                    let other = group[other_idx];
                    if !other.shares_day(&seed.days) {
                        continue;
                    }
                    let (o_start, o_end) = other.ordered_interval();
                    if overlaps(seed_start, seed_end, o_start, o_end) {
                        processed[other_idx] = true;
                        cluster.push(other.clone());
                    }
                }

                if cluster.len() >= 2 {
                    clusters.push(ConflictCluster {
                        kind,
                        resource_id,
                        meetings: cluster,
                    });
                }
            }
        }
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn make_meeting(id: i32, day: Weekday, start_min: i32, end_min: i32) -> MeetingRecord {
        MeetingRecord {
            id,
            entry_id: id,
            subject_id: 100 + id,
            section_id: 10,
            instructor_id: 1,
            room_id: 101,
            days: vec![day],
            start_min,
            end_min,
        }
    }

    #[test]
    fn test_overlap_predicate() {
        assert!(overlaps(480, 570, 510, 600));
        assert!(overlaps(480, 570, 480, 570));
        // Half-open: touching endpoints do not overlap.
        assert!(!overlaps(480, 570, 570, 660));
        assert!(!overlaps(570, 660, 480, 570));
        assert!(!overlaps(480, 510, 540, 600));
    }

    #[test]
    fn test_instructor_conflict_detected() {
        let snapshot = TimetableSnapshot::new(vec![make_meeting(1, Weekday::Mon, 480, 570)]);
        let spec = ConflictSpec {
            days: vec![Weekday::Mon],
            start_min: 510,
            end_min: 600,
            instructor_id: Some(1),
            ..Default::default()
        };
        let hits = snapshot.conflicts(&spec);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, ResourceKind::Instructor);
    }

    #[test]
    fn test_no_conflict_on_disjoint_day() {
        let snapshot = TimetableSnapshot::new(vec![make_meeting(1, Weekday::Mon, 480, 570)]);
        let spec = ConflictSpec {
            days: vec![Weekday::Thu],
            start_min: 480,
            end_min: 570,
            instructor_id: Some(1),
            room_id: Some(101),
            section_id: Some(10),
            ..Default::default()
        };
        assert!(!snapshot.has_conflict(&spec));
    }

    #[test]
    fn test_same_subject_exempts_instructor_and_room_but_not_section() {
        let existing = make_meeting(1, Weekday::Mon, 480, 570);
        let subject_id = existing.subject_id;
        let snapshot = TimetableSnapshot::new(vec![existing]);

        // Joint session: same subject taught to another section at the same
        // time in the same room by the same instructor.
        let joint = ConflictSpec {
            days: vec![Weekday::Mon],
            start_min: 480,
            end_min: 570,
            instructor_id: Some(1),
            room_id: Some(101),
            section_id: Some(99),
            same_subject_exempt: Some(subject_id),
            ..Default::default()
        };
        assert!(!snapshot.has_conflict(&joint));

        // The same slot for the same section stays a conflict regardless.
        let same_section = ConflictSpec {
            section_id: Some(10),
            ..joint.clone()
        };
        let hits = snapshot.conflicts(&same_section);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, ResourceKind::Section);
    }

    #[test]
    fn test_exclusions_skip_edited_rows() {
        let snapshot = TimetableSnapshot::new(vec![
            make_meeting(1, Weekday::Mon, 480, 570),
            make_meeting(2, Weekday::Mon, 600, 690),
        ]);
        let spec = ConflictSpec {
            days: vec![Weekday::Mon],
            start_min: 480,
            end_min: 570,
            instructor_id: Some(1),
            exclude_meeting: Some(1),
            ..Default::default()
        };
        assert!(!snapshot.has_conflict(&spec));

        let spec_entry = ConflictSpec {
            exclude_meeting: None,
            exclude_entry: Some(1),
            ..spec
        };
        assert!(!snapshot.has_conflict(&spec_entry));
    }

    #[test]
    fn test_corrupted_interval_swapped_not_fatal() {
        let mut corrupted = make_meeting(1, Weekday::Mon, 570, 480);
        corrupted.instructor_id = 7;
        let snapshot = TimetableSnapshot::new(vec![corrupted]);
        let spec = ConflictSpec {
            days: vec![Weekday::Mon],
            start_min: 500,
            end_min: 530,
            instructor_id: Some(7),
            ..Default::default()
        };
        assert!(snapshot.has_conflict(&spec));
    }

    #[test]
    fn test_cluster_absorbs_all_overlapping() {
        // Three meetings for one instructor piling onto Monday morning, one
        // clear of them in the afternoon.
        let mut meetings = vec![
            make_meeting(1, Weekday::Mon, 480, 570),
            make_meeting(2, Weekday::Mon, 510, 600),
            make_meeting(3, Weekday::Mon, 540, 630),
            make_meeting(4, Weekday::Mon, 840, 930),
        ];
        for m in &mut meetings {
            m.section_id = m.id; // keep section clustering out of the way
            m.room_id = 200 + m.id;
        }
        let clusters = cluster_conflicts(&meetings);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].kind, ResourceKind::Instructor);
        assert_eq!(clusters[0].resource_id, 1);
        assert_eq!(clusters[0].meetings.len(), 3);
    }

    #[test]
    fn test_room_clusters_require_same_room() {
        let mut a = make_meeting(1, Weekday::Tue, 480, 570);
        let mut b = make_meeting(2, Weekday::Tue, 500, 590);
        a.instructor_id = 1;
        b.instructor_id = 2;
        a.section_id = 1;
        b.section_id = 2;
        a.room_id = 301;
        b.room_id = 302;
        // Different rooms, instructors and sections: overlap alone is fine.
        assert!(cluster_conflicts(&[a.clone(), b.clone()]).is_empty());

        b.room_id = 301;
        let clusters = cluster_conflicts(&[a, b]);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].kind, ResourceKind::Room);
        assert_eq!(clusters[0].resource_id, 301);
    }

    #[test]
    fn test_cluster_shared_day_via_combined_days() {
        let mut a = make_meeting(1, Weekday::Mon, 480, 570);
        a.days = vec![Weekday::Mon, Weekday::Thu];
        let b = make_meeting(2, Weekday::Thu, 480, 570);
        let mut meetings = vec![a, b];
        for m in &mut meetings {
            m.section_id = m.id;
            m.room_id = 200 + m.id;
        }
        let clusters = cluster_conflicts(&meetings);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].kind, ResourceKind::Instructor);
    }
}
