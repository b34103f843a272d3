use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::team_name_for;
use crate::error::{ScoutError, ScoutResult};
use crate::field::{available_kinds, EventKind, EventLog, FieldPosition, PendingEvent, ScoredEvent};
use crate::form::{increment_key_kind, AllianceColour, InputMode, ScoutingForm};
use crate::runtime::TickScheduler;
use crate::submission::{Submission, SubmissionResult, Submitter};
use crate::timer::{MatchPhase, MatchTimer, TickOutcome, TimerConfig, TimerPhase};

/// Notification sent to session subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionChange {
    InputMode(InputMode),
    TimerPhase(TimerPhase),
    /// Whole-second display moved; carries the formatted remaining time
    TimerDisplay(String),
    EventRecorded { index: usize, event: ScoredEvent },
    EventRemoved { index: usize, event: ScoredEvent },
    Reset,
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&SessionChange)>;

/// One scout's match: timer, field event log, and the form it feeds.
///
/// The four stat counters on the form are written only through
/// `record_event`/`remove_event` while field input is active; manual entry
/// is reserved for form input mode.
pub struct ScoutingSession<C: Clock, S: TickScheduler> {
    timer: MatchTimer<C, S>,
    log: EventLog,
    form: ScoutingForm,
    input_mode: InputMode,
    pending: Option<PendingEvent>,
    teams: BTreeMap<String, String>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl<C: Clock, S: TickScheduler> ScoutingSession<C, S> {
    pub fn new(timer_config: TimerConfig, clock: C, scheduler: S) -> Self {
        Self {
            timer: MatchTimer::new(timer_config, clock, scheduler),
            log: EventLog::new(),
            form: ScoutingForm::default(),
            input_mode: InputMode::default(),
            pending: None,
            teams: BTreeMap::new(),
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn with_teams(mut self, teams: BTreeMap<String, String>) -> Self {
        self.teams = teams;
        self
    }

    pub fn with_input_mode(mut self, mode: InputMode) -> Self {
        self.input_mode = mode;
        self
    }

    pub fn timer(&self) -> &MatchTimer<C, S> {
        &self.timer
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn form(&self) -> &ScoutingForm {
        &self.form
    }

    pub fn input_mode(&self) -> InputMode {
        self.input_mode
    }

    pub fn pending_event(&self) -> Option<&PendingEvent> {
        self.pending.as_ref()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&SessionChange) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    fn notify(&mut self, change: SessionChange) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(&change);
        }
    }

    pub fn set_input_mode(&mut self, mode: InputMode) {
        if mode == self.input_mode {
            return;
        }
        self.input_mode = mode;
        self.pending = None;
        debug!(%mode, "input mode changed");
        self.notify(SessionChange::InputMode(mode));
    }

    // --- timer ---

    pub fn start_timer(&mut self) {
        self.with_phase_tracking(|timer| timer.start());
    }

    pub fn pause_timer(&mut self) {
        let outcome = self.timer.pause();
        self.publish(outcome);
    }

    pub fn resume_timer(&mut self) {
        self.with_phase_tracking(|timer| timer.resume());
    }

    pub fn reset_timer(&mut self) {
        self.with_phase_tracking(|timer| timer.reset());
    }

    /// Drive one scheduled tick through the timer and fan out the result
    pub fn tick(&mut self) {
        let outcome = self.timer.tick();
        self.publish(outcome);
    }

    fn publish(&mut self, outcome: TickOutcome) {
        if outcome.display_changed {
            let display = self.timer.display();
            self.notify(SessionChange::TimerDisplay(display));
        }
        if let Some(phase) = outcome.transition {
            self.notify(SessionChange::TimerPhase(phase));
        }
        self.revalidate_pending();
    }

    fn with_phase_tracking(&mut self, op: impl FnOnce(&mut MatchTimer<C, S>)) {
        let before = self.timer.phase();
        op(&mut self.timer);
        let after = self.timer.phase();
        if before != after {
            self.notify(SessionChange::TimerPhase(after));
        }
        self.revalidate_pending();
    }

    fn revalidate_pending(&mut self) {
        let phase = self.timer.match_phase();
        if let Some(pending) = self.pending.as_mut() {
            if pending.revalidate(phase) {
                debug!(kind = %pending.kind, "pending event kind reset for new phase");
            }
        }
    }

    // --- field events ---

    /// Kinds a new event may be recorded as right now
    pub fn available_kinds(&self) -> &'static [EventKind] {
        available_kinds(self.timer.match_phase())
    }

    pub fn match_phase(&self) -> Option<MatchPhase> {
        self.timer.match_phase()
    }

    /// Append an event stamped with the current match time and bump the
    /// matching form counter in the same call. Only field input records
    /// events, and every event counts at least once.
    pub fn record_event(
        &mut self,
        kind: EventKind,
        position: FieldPosition,
        count: u32,
    ) -> ScoutResult<usize> {
        self.ensure_field_input()?;
        if count == 0 {
            return Err(ScoutError::Validation("event count must be at least 1".into()));
        }
        self.tick();
        let event = ScoredEvent {
            event: kind,
            coordinates: position,
            timestamp: self.timer.event_timestamp(),
            count,
        };
        Ok(self.push_event(event))
    }

    fn push_event(&mut self, event: ScoredEvent) -> usize {
        self.form.add_to_counter(event.event, event.count);
        let index = self.log.record(event.clone());
        debug!(index, kind = %event.event, count = event.count, timestamp = %event.timestamp, "event recorded");
        self.notify(SessionChange::EventRecorded { index, event });
        index
    }

    /// Remove the event at `index` and take its count back off the form
    /// counter, never below zero. Missing indices are ignored.
    pub fn remove_event(&mut self, index: usize) -> Option<ScoredEvent> {
        let event = self.log.remove(index)?;
        self.form.subtract_from_counter(event.event, event.count);
        debug!(index, kind = %event.event, "event removed");
        self.notify(SessionChange::EventRemoved {
            index,
            event: event.clone(),
        });
        Some(event)
    }

    /// Open the add-event dialog for a click. The timestamp is taken now.
    pub fn begin_event(&mut self, position: FieldPosition) -> ScoutResult<&PendingEvent> {
        self.ensure_field_input()?;
        self.tick();
        let pending = PendingEvent::new(
            position,
            self.timer.event_timestamp(),
            self.timer.match_phase(),
        );
        Ok(self.pending.insert(pending))
    }

    pub fn select_event_kind(&mut self, kind: EventKind) -> bool {
        let phase = self.timer.match_phase();
        self.pending
            .as_mut()
            .is_some_and(|p| p.select_kind(kind, phase))
    }

    pub fn select_event_count(&mut self, count: u32) -> bool {
        self.pending.as_mut().is_some_and(|p| p.select_count(count))
    }

    /// Record the open dialog's event; `None` when no dialog is open
    pub fn confirm_event(&mut self) -> ScoutResult<Option<usize>> {
        self.ensure_field_input()?;
        Ok(self
            .pending
            .take()
            .map(|pending| self.push_event(pending.into_event())))
    }

    pub fn cancel_event(&mut self) -> bool {
        self.pending.take().is_some()
    }

    // --- manual form entry ---

    pub fn set_counter(&mut self, kind: EventKind, value: u32) -> ScoutResult<()> {
        self.ensure_manual_entry(kind)?;
        self.form.set_counter(kind, value);
        Ok(())
    }

    /// Bump a counter by one through its shortcut key (q/w/e/r)
    pub fn increment_by_key(&mut self, key: char) -> ScoutResult<EventKind> {
        let kind = increment_key_kind(key)
            .ok_or_else(|| ScoutError::Command(format!("no counter bound to '{key}'")))?;
        self.ensure_manual_entry(kind)?;
        self.form.add_to_counter(kind, 1);
        Ok(kind)
    }

    fn ensure_manual_entry(&self, kind: EventKind) -> ScoutResult<()> {
        if self.input_mode == InputMode::Field {
            return Err(ScoutError::ManualEntryLocked(kind.form_key()));
        }
        Ok(())
    }

    fn ensure_field_input(&self) -> ScoutResult<()> {
        if self.input_mode != InputMode::Field {
            return Err(ScoutError::FieldInputLocked);
        }
        Ok(())
    }

    /// Sets the team number and fills the team name from the team map
    pub fn set_team_number(&mut self, team_number: i64) {
        self.form.meta.team_number = Some(team_number);
        if let Some(name) = team_name_for(&self.teams, team_number) {
            self.form.meta.team_name = Some(name.to_string());
        }
    }

    pub fn set_qualification(&mut self, qualification: i64) {
        self.form.meta.qualification = Some(qualification);
    }

    pub fn set_team_name(&mut self, name: &str) {
        let name = name.trim();
        self.form.meta.team_name = (!name.is_empty()).then(|| name.to_string());
    }

    pub fn set_alliance_colour(&mut self, colour: Option<AllianceColour>) {
        self.form.meta.alliance_colour = colour;
    }

    pub fn add_tag(&mut self, tag: &str) -> bool {
        self.form.add_tag(tag)
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.form.remove_tag(tag)
    }

    // --- lifecycle ---

    pub fn submission(&self) -> Submission {
        let field_events = (self.input_mode == InputMode::Field && !self.log.is_empty())
            .then(|| self.log.events().to_vec());
        Submission::from_form(&self.form, field_events)
    }

    /// Hand the session to the submitter. Success clears the session;
    /// failure leaves it untouched so the scout can press submit again.
    pub fn submit<T: Submitter + ?Sized>(&mut self, submitter: &T) -> SubmissionResult {
        let result = submitter.submit(&self.submission());
        if result.success {
            info!(events = self.log.len(), "session submitted");
            self.clear();
            self.notify(SessionChange::Submitted);
        } else {
            info!(message = %result.message, "submission not accepted");
        }
        result
    }

    /// Discard everything recorded in this session
    pub fn reset(&mut self) {
        self.clear();
        self.notify(SessionChange::Reset);
    }

    fn clear(&mut self) {
        self.timer.reset();
        self.log.clear();
        self.form = ScoutingForm::default();
        self.pending = None;
    }
}
