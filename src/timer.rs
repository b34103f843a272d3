use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::runtime::TickScheduler;

/// Lifecycle of one timer run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimerPhase {
    Idle,
    Running,
    Paused,
    Finished,
}

/// Portion of the match the timer is currently in
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum MatchPhase {
    Autonomous,
    Teleop,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimerConfig {
    pub total_secs: f64,
    pub pause_threshold_secs: f64,
    pub tick_interval_ms: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            total_secs: 150.0,
            pause_threshold_secs: 120.0,
            tick_interval_ms: 100,
        }
    }
}

impl TimerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimerSnapshot {
    pub seconds_remaining: f64,
    pub phase: TimerPhase,
    pub started_at_wall_clock: Option<DateTime<Utc>>,
}

/// What a single [`MatchTimer::tick`] changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// The whole-second display value moved
    pub display_changed: bool,
    /// The phase the tick moved the timer into, if any
    pub transition: Option<TimerPhase>,
}

/// Format seconds as `M:SS`, flooring fractional seconds
pub fn format_time(seconds: f64) -> String {
    let rounded = seconds.max(0.0).floor() as u64;
    format!("{}:{:02}", rounded / 60, rounded % 60)
}

/// Countdown for a single match: autonomous, one automatic pause at the
/// teleop boundary, then teleop until zero.
///
/// Remaining time is always derived from the clock (`banked` seconds from
/// earlier running segments plus the current segment), never accumulated
/// per tick. While running, a repeating tick is held in `tick_task`; every
/// path out of `Running` drops it.
pub struct MatchTimer<C: Clock, S: TickScheduler> {
    config: TimerConfig,
    clock: C,
    scheduler: S,
    phase: TimerPhase,
    segment_started_at: Option<Instant>,
    banked: f64,
    remaining: f64,
    has_auto_paused: bool,
    last_displayed_second: i64,
    started_at_wall_clock: Option<DateTime<Utc>>,
    tick_task: Option<S::Handle>,
}

impl<C: Clock, S: TickScheduler> MatchTimer<C, S> {
    pub fn new(config: TimerConfig, clock: C, scheduler: S) -> Self {
        Self {
            remaining: config.total_secs,
            last_displayed_second: config.total_secs.floor() as i64,
            config,
            clock,
            scheduler,
            phase: TimerPhase::Idle,
            segment_started_at: None,
            banked: 0.0,
            has_auto_paused: false,
            started_at_wall_clock: None,
            tick_task: None,
        }
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn has_started(&self) -> bool {
        self.phase != TimerPhase::Idle
    }

    pub fn is_ticking(&self) -> bool {
        self.tick_task.is_some()
    }

    pub fn started_at_wall_clock(&self) -> Option<DateTime<Utc>> {
        self.started_at_wall_clock
    }

    pub fn start(&mut self) {
        if self.phase != TimerPhase::Idle {
            return;
        }

        self.started_at_wall_clock = Some(Utc::now());
        self.has_auto_paused = false;
        self.last_displayed_second = self.config.total_secs.floor() as i64;
        self.banked = 0.0;
        self.begin_segment();
        info!(total_secs = self.config.total_secs, "match timer started");
    }

    /// Freeze the clock. The outcome includes an auto-pause or finish that
    /// fell due before the pause landed.
    pub fn pause(&mut self) -> TickOutcome {
        let mut outcome = self.advance();
        if self.phase != TimerPhase::Running {
            return outcome;
        }

        self.banked = self.running_elapsed();
        self.remaining = (self.config.total_secs - self.banked).max(0.0);
        self.end_segment(TimerPhase::Paused);
        outcome.transition = Some(TimerPhase::Paused);
        outcome.display_changed |= self.mark_displayed();
        debug!(remaining = self.remaining, "match timer paused");
        outcome
    }

    pub fn resume(&mut self) {
        if self.phase != TimerPhase::Paused {
            return;
        }

        self.begin_segment();
        debug!(remaining = self.remaining, "match timer resumed");
    }

    /// Valid from any phase: back to idle with the full duration.
    pub fn reset(&mut self) {
        self.tick_task = None;
        self.phase = TimerPhase::Idle;
        self.segment_started_at = None;
        self.banked = 0.0;
        self.remaining = self.config.total_secs;
        self.has_auto_paused = false;
        self.last_displayed_second = self.config.total_secs.floor() as i64;
        self.started_at_wall_clock = None;
        debug!("match timer reset");
    }

    /// Recompute remaining time from the clock and apply auto-pause and
    /// auto-finish. Called for every scheduled tick.
    pub fn tick(&mut self) -> TickOutcome {
        self.advance()
    }

    /// Seconds left, clamped to `[0, total]`. While running this reads the
    /// clock directly but never shows less than the pause threshold until
    /// the auto-pause has happened.
    pub fn time_remaining(&self) -> f64 {
        match self.phase {
            TimerPhase::Running => {
                let raw = self.config.total_secs - self.running_elapsed();
                self.clamp_running(raw)
            }
            _ => self.remaining,
        }
    }

    pub fn elapsed(&self) -> f64 {
        (self.config.total_secs - self.time_remaining()).clamp(0.0, self.config.total_secs)
    }

    /// Match time elapsed as `M:SS`, valid in every phase
    pub fn event_timestamp(&self) -> String {
        format_time(self.elapsed())
    }

    pub fn display(&self) -> String {
        format_time(self.time_remaining())
    }

    /// `None` before the timer has been started
    pub fn match_phase(&self) -> Option<MatchPhase> {
        if !self.has_started() {
            return None;
        }
        if self.time_remaining() > self.config.pause_threshold_secs {
            Some(MatchPhase::Autonomous)
        } else {
            Some(MatchPhase::Teleop)
        }
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            seconds_remaining: self.time_remaining(),
            phase: self.phase,
            started_at_wall_clock: self.started_at_wall_clock,
        }
    }

    fn running_elapsed(&self) -> f64 {
        let segment = self
            .segment_started_at
            .map(|at| self.clock.now().saturating_duration_since(at).as_secs_f64())
            .unwrap_or(0.0);
        self.banked + segment
    }

    fn clamp_running(&self, raw: f64) -> f64 {
        let floor = if !self.has_auto_paused && raw > 0.0 {
            self.config.pause_threshold_secs.min(self.config.total_secs)
        } else {
            0.0
        };
        raw.max(floor).min(self.config.total_secs)
    }

    fn begin_segment(&mut self) {
        self.segment_started_at = Some(self.clock.now());
        self.phase = TimerPhase::Running;
        self.tick_task = Some(self.scheduler.schedule(self.config.tick_interval()));
    }

    fn end_segment(&mut self, phase: TimerPhase) {
        self.tick_task = None;
        self.segment_started_at = None;
        self.phase = phase;
    }

    fn advance(&mut self) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if self.phase != TimerPhase::Running {
            return outcome;
        }

        let raw = self.config.total_secs - self.running_elapsed();
        let threshold = self.config.pause_threshold_secs;

        if raw <= 0.0 {
            self.remaining = 0.0;
            self.banked = self.config.total_secs;
            self.end_segment(TimerPhase::Finished);
            outcome.transition = Some(TimerPhase::Finished);
            info!("match timer finished");
        } else if !self.has_auto_paused && raw <= threshold {
            // resume continues from the boundary itself
            self.remaining = threshold;
            self.banked = self.config.total_secs - threshold;
            self.has_auto_paused = true;
            self.end_segment(TimerPhase::Paused);
            outcome.transition = Some(TimerPhase::Paused);
            info!(remaining = threshold, "auto-paused at teleop boundary");
        } else {
            self.remaining = raw;
        }

        outcome.display_changed = self.mark_displayed();
        outcome
    }

    fn mark_displayed(&mut self) -> bool {
        let displayed = self.remaining.floor() as i64;
        if displayed == self.last_displayed_second {
            return false;
        }
        self.last_displayed_second = displayed;
        true
    }
}
