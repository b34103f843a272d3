use serde::{Deserialize, Serialize};

use crate::field::{AggregateCounters, EventKind};

/// Tags offered before the scout types their own
pub const DEFAULT_TAGS: [&str; 2] = ["penalties", "defense"];

/// How scoring is entered for a session: typed counters or field clicks
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum InputMode {
    #[default]
    Form,
    Field,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum AllianceColour {
    Blue,
    Red,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchMeta {
    pub team_number: Option<i64>,
    pub qualification: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alliance_colour: Option<AllianceColour>,
}

/// The scouting form as the scout sees it
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoutingForm {
    pub meta: MatchMeta,
    pub autonomous_missed: u32,
    pub autonomous_made: u32,
    pub teleop_missed: u32,
    pub teleop_made: u32,
    pub tags: Vec<String>,
}

impl ScoutingForm {
    pub fn counter(&self, kind: EventKind) -> u32 {
        match kind {
            EventKind::AutonomousMade => self.autonomous_made,
            EventKind::AutonomousMissed => self.autonomous_missed,
            EventKind::TeleopMade => self.teleop_made,
            EventKind::TeleopMissed => self.teleop_missed,
        }
    }

    fn counter_mut(&mut self, kind: EventKind) -> &mut u32 {
        match kind {
            EventKind::AutonomousMade => &mut self.autonomous_made,
            EventKind::AutonomousMissed => &mut self.autonomous_missed,
            EventKind::TeleopMade => &mut self.teleop_made,
            EventKind::TeleopMissed => &mut self.teleop_missed,
        }
    }

    pub fn set_counter(&mut self, kind: EventKind, value: u32) {
        *self.counter_mut(kind) = value;
    }

    pub fn add_to_counter(&mut self, kind: EventKind, count: u32) {
        let slot = self.counter_mut(kind);
        *slot = slot.saturating_add(count);
    }

    pub fn subtract_from_counter(&mut self, kind: EventKind, count: u32) {
        let slot = self.counter_mut(kind);
        *slot = slot.saturating_sub(count);
    }

    pub fn counters(&self) -> AggregateCounters {
        AggregateCounters {
            autonomous_made: self.autonomous_made,
            autonomous_missed: self.autonomous_missed,
            teleop_made: self.teleop_made,
            teleop_missed: self.teleop_missed,
        }
    }

    /// Adds a normalized tag; returns false for blanks and duplicates
    pub fn add_tag(&mut self, raw: &str) -> bool {
        let tag = create_tag(raw);
        if tag.is_empty() || self.tags.contains(&tag) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    pub fn remove_tag(&mut self, raw: &str) -> bool {
        let tag = create_tag(raw);
        let before = self.tags.len();
        self.tags.retain(|t| *t != tag);
        self.tags.len() != before
    }
}

/// Counter bumped by a manual-entry shortcut key
pub fn increment_key_kind(key: char) -> Option<EventKind> {
    match key.to_ascii_lowercase() {
        'q' => Some(EventKind::AutonomousMissed),
        'w' => Some(EventKind::AutonomousMade),
        'e' => Some(EventKind::TeleopMissed),
        'r' => Some(EventKind::TeleopMade),
        _ => None,
    }
}

/// Lenient integer parse for typed form input: leading whitespace and sign
/// are accepted and trailing junk is ignored. Empty or digit-less input
/// yields `empty_value`.
pub fn coerce_number_value(raw: &str, empty_value: Option<i64>) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return empty_value;
    }
    match digits[..end].parse::<i64>() {
        Ok(n) if negative => Some(-n),
        Ok(n) => Some(n),
        Err(_) => empty_value,
    }
}

pub fn create_tag(input: &str) -> String {
    input.trim().to_lowercase()
}
