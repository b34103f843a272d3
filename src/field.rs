use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::timer::MatchPhase;

/// Side length of the reference field image; positions are stored in this
/// square coordinate space regardless of the size it was rendered at.
pub const FIELD_IMAGE_SIZE: f64 = 2547.0;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    AutonomousMade,
    AutonomousMissed,
    TeleopMade,
    TeleopMissed,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::AutonomousMade,
        EventKind::AutonomousMissed,
        EventKind::TeleopMade,
        EventKind::TeleopMissed,
    ];

    pub const AUTONOMOUS: [EventKind; 2] = [EventKind::AutonomousMade, EventKind::AutonomousMissed];

    pub const TELEOP: [EventKind; 2] = [EventKind::TeleopMade, EventKind::TeleopMissed];

    pub fn label(&self) -> &'static str {
        match self {
            EventKind::AutonomousMade => "Autonomous Made",
            EventKind::AutonomousMissed => "Autonomous Missed",
            EventKind::TeleopMade => "Teleop Made",
            EventKind::TeleopMissed => "Teleop Missed",
        }
    }

    /// Name of the scouting form field this kind feeds
    pub fn form_key(&self) -> &'static str {
        match self {
            EventKind::AutonomousMade => "autonomousMade",
            EventKind::AutonomousMissed => "autonomousMissed",
            EventKind::TeleopMade => "teleopMade",
            EventKind::TeleopMissed => "teleopMissed",
        }
    }

    pub fn phase(&self) -> MatchPhase {
        match self {
            EventKind::AutonomousMade | EventKind::AutonomousMissed => MatchPhase::Autonomous,
            EventKind::TeleopMade | EventKind::TeleopMissed => MatchPhase::Teleop,
        }
    }
}

/// Kinds a new event may be recorded as. Before the timer starts every kind
/// is allowed; afterwards only the current phase's kinds are.
pub fn available_kinds(phase: Option<MatchPhase>) -> &'static [EventKind] {
    match phase {
        None => &EventKind::ALL,
        Some(MatchPhase::Autonomous) => &EventKind::AUTONOMOUS,
        Some(MatchPhase::Teleop) => &EventKind::TELEOP,
    }
}

pub fn default_kind(phase: Option<MatchPhase>) -> EventKind {
    match phase {
        Some(MatchPhase::Autonomous) => EventKind::AutonomousMade,
        _ => EventKind::TeleopMade,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldPosition {
    pub x: f64,
    pub y: f64,
}

impl FieldPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Normalize a click at `(click_x, click_y)` on a field rendered at
    /// `width` x `height`. Returns `None` for an empty render surface.
    pub fn from_click(click_x: f64, click_y: f64, width: f64, height: f64) -> Option<Self> {
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        Some(Self {
            x: (click_x / width) * FIELD_IMAGE_SIZE,
            y: (click_y / height) * FIELD_IMAGE_SIZE,
        })
    }

    /// Position as left/top percentages of the rendered field
    pub fn to_percent(&self) -> (f64, f64) {
        (
            (self.x / FIELD_IMAGE_SIZE) * 100.0,
            (self.y / FIELD_IMAGE_SIZE) * 100.0,
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredEvent {
    pub event: EventKind,
    pub coordinates: FieldPosition,
    pub timestamp: String,
    pub count: u32,
}

impl ScoredEvent {
    pub fn display_label(&self) -> String {
        if self.count > 1 {
            format!("{} ×{}", self.event.label(), self.count)
        } else {
            self.event.label().to_string()
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateCounters {
    pub autonomous_made: u32,
    pub autonomous_missed: u32,
    pub teleop_made: u32,
    pub teleop_missed: u32,
}

impl AggregateCounters {
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a ScoredEvent>) -> Self {
        events.into_iter().fold(Self::default(), |mut acc, e| {
            acc.add(e.event, e.count);
            acc
        })
    }

    pub fn get(&self, kind: EventKind) -> u32 {
        match kind {
            EventKind::AutonomousMade => self.autonomous_made,
            EventKind::AutonomousMissed => self.autonomous_missed,
            EventKind::TeleopMade => self.teleop_made,
            EventKind::TeleopMissed => self.teleop_missed,
        }
    }

    fn slot(&mut self, kind: EventKind) -> &mut u32 {
        match kind {
            EventKind::AutonomousMade => &mut self.autonomous_made,
            EventKind::AutonomousMissed => &mut self.autonomous_missed,
            EventKind::TeleopMade => &mut self.teleop_made,
            EventKind::TeleopMissed => &mut self.teleop_missed,
        }
    }

    pub fn add(&mut self, kind: EventKind, count: u32) {
        let slot = self.slot(kind);
        *slot = slot.saturating_add(count);
    }

    /// Subtract, flooring at zero
    pub fn subtract(&mut self, kind: EventKind, count: u32) {
        let slot = self.slot(kind);
        *slot = slot.saturating_sub(count);
    }
}

/// Ordered log of scored events with per-kind totals kept in lockstep.
/// Both halves only change together through `record` and `remove`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventLog {
    events: Vec<ScoredEvent>,
    counters: AggregateCounters,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from stored events, deriving the counters
    pub fn from_events(events: Vec<ScoredEvent>) -> Self {
        let counters = AggregateCounters::from_events(&events);
        Self { events, counters }
    }

    pub fn record(&mut self, event: ScoredEvent) -> usize {
        self.counters.add(event.event, event.count);
        self.events.push(event);
        self.events.len() - 1
    }

    /// Out-of-range indices are ignored and yield `None`.
    pub fn remove(&mut self, index: usize) -> Option<ScoredEvent> {
        if index >= self.events.len() {
            warn!(index, len = self.events.len(), "ignoring removal of missing event");
            return None;
        }
        let removed = self.events.remove(index);
        self.counters.subtract(removed.event, removed.count);
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.counters = AggregateCounters::default();
    }

    pub fn counters(&self) -> &AggregateCounters {
        &self.counters
    }

    pub fn events(&self) -> &[ScoredEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// An event waiting on the add-event dialog: kind and count can still be
/// changed; position and timestamp are fixed at click time.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingEvent {
    pub position: FieldPosition,
    pub timestamp: String,
    pub kind: EventKind,
    pub count: u32,
}

impl PendingEvent {
    pub fn new(position: FieldPosition, timestamp: String, phase: Option<MatchPhase>) -> Self {
        Self {
            position,
            timestamp,
            kind: default_kind(phase),
            count: 1,
        }
    }

    /// Returns false if `kind` is not offered in `phase`
    pub fn select_kind(&mut self, kind: EventKind, phase: Option<MatchPhase>) -> bool {
        if !available_kinds(phase).contains(&kind) {
            return false;
        }
        self.kind = kind;
        true
    }

    pub fn select_count(&mut self, count: u32) -> bool {
        if count == 0 {
            return false;
        }
        self.count = count;
        true
    }

    /// Fall back to the phase default when the phase moved under the dialog
    pub fn revalidate(&mut self, phase: Option<MatchPhase>) -> bool {
        if phase.is_none() || available_kinds(phase).contains(&self.kind) {
            return false;
        }
        self.kind = default_kind(phase);
        true
    }

    pub fn into_event(self) -> ScoredEvent {
        ScoredEvent {
            event: self.kind,
            coordinates: self.position,
            timestamp: self.timestamp,
            count: self.count,
        }
    }
}

/// True for `M:SS` / `MM:SS` timestamps
pub fn is_valid_timestamp(timestamp: &str) -> bool {
    let Some((mins, secs)) = timestamp.split_once(':') else {
        return false;
    };
    (1..=2).contains(&mins.len())
        && secs.len() == 2
        && mins.chars().all(|c| c.is_ascii_digit())
        && secs.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn event(kind: EventKind, count: u32) -> ScoredEvent {
        ScoredEvent {
            event: kind,
            coordinates: FieldPosition::new(100.0, 200.0),
            timestamp: "1:05".to_string(),
            count,
        }
    }

    #[test]
    fn test_event_kind_names() {
        assert_eq!(EventKind::TeleopMade.to_string(), "teleop_made");
        assert_eq!(
            EventKind::from_str("autonomous_missed").unwrap(),
            EventKind::AutonomousMissed
        );
        assert!(EventKind::from_str("endgame").is_err());
        assert_eq!(EventKind::AutonomousMade.label(), "Autonomous Made");
        assert_eq!(EventKind::TeleopMissed.form_key(), "teleopMissed");
    }

    #[test]
    fn test_available_kinds_by_phase() {
        assert_eq!(available_kinds(None).len(), 4);
        assert_eq!(
            available_kinds(Some(MatchPhase::Autonomous)),
            &[EventKind::AutonomousMade, EventKind::AutonomousMissed]
        );
        assert_eq!(
            available_kinds(Some(MatchPhase::Teleop)),
            &[EventKind::TeleopMade, EventKind::TeleopMissed]
        );
    }

    #[test]
    fn test_default_kind() {
        assert_eq!(default_kind(None), EventKind::TeleopMade);
        assert_eq!(default_kind(Some(MatchPhase::Autonomous)), EventKind::AutonomousMade);
        assert_eq!(default_kind(Some(MatchPhase::Teleop)), EventKind::TeleopMade);
    }

    #[test]
    fn test_position_normalization() {
        let pos = FieldPosition::from_click(300.0, 150.0, 600.0, 600.0).unwrap();
        assert_eq!(pos.x, 1273.5);
        assert_eq!(pos.y, 636.75);
        assert_eq!(pos.to_percent(), (50.0, 25.0));

        assert!(FieldPosition::from_click(1.0, 1.0, 0.0, 100.0).is_none());
    }

    #[test]
    fn test_position_is_resolution_independent() {
        let small = FieldPosition::from_click(50.0, 25.0, 100.0, 100.0).unwrap();
        let large = FieldPosition::from_click(500.0, 250.0, 1000.0, 1000.0).unwrap();
        assert_eq!(small, large);
    }

    #[test]
    fn test_record_and_remove_keep_counters_in_lockstep() {
        let mut log = EventLog::new();
        log.record(event(EventKind::TeleopMade, 2));
        log.record(event(EventKind::AutonomousMissed, 1));
        log.record(event(EventKind::TeleopMade, 3));

        assert_eq!(log.counters().teleop_made, 5);
        assert_eq!(log.counters().autonomous_missed, 1);

        let removed = log.remove(0).unwrap();
        assert_eq!(removed.count, 2);
        assert_eq!(log.counters().teleop_made, 3);
        assert_eq!(*log.counters(), AggregateCounters::from_events(log.events()));
    }

    #[test]
    fn test_remove_out_of_range_is_noop() {
        let mut log = EventLog::new();
        log.record(event(EventKind::TeleopMade, 1));

        assert!(log.remove(1).is_none());
        assert!(log.remove(usize::MAX).is_none());
        assert_eq!(log.len(), 1);
        assert_eq!(log.counters().teleop_made, 1);
    }

    #[test]
    fn test_subtract_floors_at_zero() {
        let mut counters = AggregateCounters::default();
        counters.add(EventKind::TeleopMissed, 1);
        counters.subtract(EventKind::TeleopMissed, 5);
        assert_eq!(counters.teleop_missed, 0);
    }

    #[test]
    fn test_clear_resets_counters() {
        let mut log = EventLog::new();
        log.record(event(EventKind::AutonomousMade, 3));
        log.clear();
        assert!(log.is_empty());
        assert_eq!(*log.counters(), AggregateCounters::default());
    }

    #[test]
    fn test_from_events_derives_counters() {
        let log = EventLog::from_events(vec![
            event(EventKind::TeleopMissed, 2),
            event(EventKind::TeleopMissed, 2),
        ]);
        assert_eq!(log.counters().teleop_missed, 4);
    }

    #[test]
    fn test_scored_event_json_shape() {
        let json = serde_json::to_value(event(EventKind::TeleopMade, 2)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "event": "teleop_made",
                "coordinates": { "x": 100.0, "y": 200.0 },
                "timestamp": "1:05",
                "count": 2
            })
        );
    }

    #[test]
    fn test_unknown_kind_is_rejected_on_load() {
        let raw = r#"{"event":"endgame","coordinates":{"x":1,"y":2},"timestamp":"0:01","count":1}"#;
        assert!(serde_json::from_str::<ScoredEvent>(raw).is_err());
    }

    #[test]
    fn test_display_label() {
        assert_eq!(event(EventKind::TeleopMade, 1).display_label(), "Teleop Made");
        assert_eq!(event(EventKind::TeleopMade, 3).display_label(), "Teleop Made ×3");
    }

    #[test]
    fn test_pending_event_selection_is_phase_gated() {
        let mut pending = PendingEvent::new(
            FieldPosition::new(1.0, 1.0),
            "0:12".into(),
            Some(MatchPhase::Autonomous),
        );
        assert_eq!(pending.kind, EventKind::AutonomousMade);
        assert_eq!(pending.count, 1);

        assert!(!pending.select_kind(EventKind::TeleopMade, Some(MatchPhase::Autonomous)));
        assert!(pending.select_kind(EventKind::AutonomousMissed, Some(MatchPhase::Autonomous)));
        assert!(!pending.select_count(0));
        assert!(pending.select_count(3));

        let scored = pending.into_event();
        assert_eq!(scored.event, EventKind::AutonomousMissed);
        assert_eq!(scored.count, 3);
        assert_eq!(scored.timestamp, "0:12");
    }

    #[test]
    fn test_pending_event_revalidates_on_phase_change() {
        let mut pending = PendingEvent::new(
            FieldPosition::new(1.0, 1.0),
            "0:29".into(),
            Some(MatchPhase::Autonomous),
        );

        assert!(pending.revalidate(Some(MatchPhase::Teleop)));
        assert_eq!(pending.kind, EventKind::TeleopMade);
        assert!(!pending.revalidate(Some(MatchPhase::Teleop)));
    }

    #[test]
    fn test_timestamp_validation() {
        assert!(is_valid_timestamp("0:00"));
        assert!(is_valid_timestamp("12:34"));
        assert!(!is_valid_timestamp("123:45"));
        assert!(!is_valid_timestamp("1:5"));
        assert!(!is_valid_timestamp("a:bc"));
        assert!(!is_valid_timestamp("105"));
    }
}
