// Library surface for the binary, headless integration tests, and reuse.
pub mod app_dirs;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod field;
pub mod form;
pub mod runtime;
pub mod session;
pub mod submission;
pub mod timer;

pub use error::{ScoutError, ScoutResult};
pub use field::{AggregateCounters, EventKind, EventLog, FieldPosition, ScoredEvent};
pub use session::{ScoutingSession, SessionChange};
pub use timer::{format_time, MatchTimer, TimerConfig, TimerPhase};
