use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Earliest minute of the teaching day (07:00).
pub const DAY_START_MIN: i32 = 7 * 60;
/// Cutoff minute for regular placements (20:45). Meetings must end before it.
pub const DAY_CUTOFF_MIN: i32 = 20 * 60 + 45;
/// Lunch window, half-open: [12:00, 13:00).
pub const LUNCH_START_MIN: i32 = 12 * 60;
pub const LUNCH_END_MIN: i32 = 13 * 60;
/// Ceiling used only by the post-save repair pass (21:00).
pub const REPAIR_CEILING_MIN: i32 = 21 * 60;
/// Candidate grid step: starts on the hour and half hour.
pub const SLOT_STEP_MIN: i32 = 30;

/// Canonical weekday. Sunday parses but is never offered by the candidate
/// grid since no classes are held on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    /// Days eligible for automatic placement, in week order.
    pub const TEACHING: [Weekday; 6] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ];

    pub fn abbrev(self) -> &'static str {
        match self {
            Weekday::Mon => "Mon",
            Weekday::Tue => "Tue",
            Weekday::Wed => "Wed",
            Weekday::Thu => "Thu",
            Weekday::Fri => "Fri",
            Weekday::Sat => "Sat",
            Weekday::Sun => "Sun",
        }
    }
}

impl std::fmt::Display for Weekday {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.abbrev())
    }
}

/// Normalizes a free-form day name ("monday", "MON", "Tues") to its
/// canonical weekday, or `None` if the text names no weekday.
pub fn normalize_day(raw: &str) -> Option<Weekday> {
    let lowered = raw.trim().to_lowercase();
    let key = lowered.get(0..3)?;
    match key {
        "mon" => Some(Weekday::Mon),
        "tue" => Some(Weekday::Tue),
        "wed" => Some(Weekday::Wed),
        "thu" => Some(Weekday::Thu),
        "fri" => Some(Weekday::Fri),
        "sat" => Some(Weekday::Sat),
        "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Expands a combined day string ("MonThu", "Mon/Thu", "monday,thursday")
/// into the distinct weekdays it encodes, sorted in week order.
///
/// Unrecognized fragments are dropped rather than treated as errors; the
/// storage format only ever carries disjoint canonical days, so anything
/// else is noise from upstream imports.
pub fn parse_combined(raw: &str) -> Vec<Weekday> {
    let mut days = Vec::new();
    let cleaned = raw.to_lowercase();
    let mut rest = cleaned.as_str();

    while !rest.is_empty() {
        let trimmed = rest.trim_start_matches(|c: char| !c.is_ascii_alphabetic());
        if trimmed.is_empty() {
            break;
        }
        let word_len = trimmed
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(trimmed.len());
        let (word, tail) = trimmed.split_at(word_len);
        rest = tail;

        // A fragment may itself be a run of 3-letter abbreviations
        // ("monthu"), or a full day name ("monday").
        if let Some(day) = match_full_name(word) {
            if !days.contains(&day) {
                days.push(day);
            }
            continue;
        }
        let mut cursor = word;
        while cursor.len() >= 3 {
            match normalize_day(&cursor[0..3]) {
                Some(day) => {
                    if !days.contains(&day) {
                        days.push(day);
                    }
                    cursor = &cursor[3..];
                }
                None => break,
            }
        }
    }

    sort_weekly(&mut days);
    days
}

fn match_full_name(word: &str) -> Option<Weekday> {
    match word {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Collapses a day set back into the combined storage form ("MonThu").
pub fn combine(days: &[Weekday]) -> String {
    let mut distinct: Vec<Weekday> = Vec::new();
    for day in days {
        if !distinct.contains(day) {
            distinct.push(*day);
        }
    }
    sort_weekly(&mut distinct);
    distinct.iter().map(|d| d.abbrev()).collect()
}

/// Sorts days in week order, Monday first.
pub fn sort_weekly(days: &mut [Weekday]) {
    days.sort();
}

/// Parses "HH:MM" or "HH:MM:SS" into minutes since midnight.
pub fn to_minutes(raw: &str) -> Option<i32> {
    let mut parts = raw.trim().split(':');
    let hours: i32 = parts.next()?.parse().ok()?;
    let minutes: i32 = parts.next()?.parse().ok()?;
    if let Some(seconds) = parts.next() {
        let _: i32 = seconds.parse().ok()?;
    }
    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    Some(hours * 60 + minutes)
}

pub fn naive_to_minutes(time: NaiveTime) -> i32 {
    (time.hour() * 60 + time.minute()) as i32
}

pub fn minutes_to_naive(minutes: i32) -> NaiveTime {
    let clamped = minutes.clamp(0, 24 * 60 - 1) as u32;
    NaiveTime::from_hms_opt(clamped / 60, clamped % 60, 0)
        .unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap())
}

/// Formats minutes since midnight as "HH:MM".
pub fn minutes_to_label(minutes: i32) -> String {
    let clamped = minutes.clamp(0, 24 * 60 - 1);
    format!("{:02}:{:02}", clamped / 60, clamped % 60)
}

/// True when `[start, end)` intersects the lunch window.
pub fn violates_lunch(start_min: i32, end_min: i32) -> bool {
    start_min < LUNCH_END_MIN && end_min > LUNCH_START_MIN
}

/// True when the interval sits inside the teaching day and clear of lunch.
pub fn within_day_window(start_min: i32, end_min: i32) -> bool {
    start_min >= DAY_START_MIN && end_min < DAY_CUTOFF_MIN && !violates_lunch(start_min, end_min)
}

/// Instructor employment status, normalized from free text at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmploymentType {
    FullTime,
    PartTime,
}

impl EmploymentType {
    /// Anything mentioning "part" is part-time; everything else, including
    /// unknown or blank text, defaults to full-time.
    pub fn from_raw(raw: &str) -> Self {
        if raw.to_lowercase().contains("part") {
            EmploymentType::PartTime
        } else {
            EmploymentType::FullTime
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EmploymentType::FullTime => "FULL-TIME",
            EmploymentType::PartTime => "PART-TIME",
        }
    }
}

/// Valid single-session lengths, in minutes, for a subject of `units` units
/// taught by an instructor with the given employment type.
///
/// A subject's weekly load equals its unit count in hours. The load may be
/// taken whole in one session, or split exactly in half across a two-day
/// joint session when each half is at least an hour. Part-time instructors
/// do not take sessions longer than three hours.
pub fn session_durations_min(units: i32, employment: EmploymentType) -> Vec<i32> {
    if units <= 0 {
        return Vec::new();
    }
    let total = units * 60;
    let mut durations = vec![total];
    if total >= 120 {
        durations.push(total / 2);
    }
    if employment == EmploymentType::PartTime {
        durations.retain(|d| *d <= 180);
    }
    durations.sort_unstable();
    durations.dedup();
    durations
}

/// The full candidate grid for a session of the given length: teaching days
/// crossed with half-hour starts whose interval stays inside the day window
/// and clear of lunch. Ordered by weekday, then by start.
pub fn candidate_slots(duration_min: i32) -> Vec<(Weekday, i32)> {
    let mut slots = Vec::new();
    if duration_min <= 0 {
        return slots;
    }
    for day in Weekday::TEACHING {
        let mut start = DAY_START_MIN;
        while start + duration_min < DAY_CUTOFF_MIN {
            if !violates_lunch(start, start + duration_min) {
                slots.push((day, start));
            }
            start += SLOT_STEP_MIN;
        }
    }
    slots
}
