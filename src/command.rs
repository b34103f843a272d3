use std::str::FromStr;

use itertools::Itertools;

use crate::clock::Clock;
use crate::error::{ScoutError, ScoutResult};
use crate::field::{EventKind, FieldPosition, FIELD_IMAGE_SIZE};
use crate::form::{coerce_number_value, AllianceColour, InputMode};
use crate::runtime::TickScheduler;
use crate::session::ScoutingSession;
use crate::submission::Submitter;

pub const HELP: &str = "\
timer:   start | pause | resume | reset | status
field:   click <x> <y> [w h] | kind <kind> | count <n> | confirm | cancel
         record <kind> <x> <y> [n] | remove <index> | events
form:    mode <form|field> | set <kind> <n> | inc <q|w|e|r>
         team <n> | qual <n> | name <text> | alliance <blue|red|none>
         tag <text> | untag <text>
session: submit | clear | help | quit
kinds:   autonomous_made autonomous_missed teleop_made teleop_missed";

/// One line of driver input
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Pause,
    Resume,
    Reset,
    Status,
    Mode(InputMode),
    Click { x: f64, y: f64, width: f64, height: f64 },
    Kind(EventKind),
    Count(u32),
    Confirm,
    Cancel,
    Record { kind: EventKind, x: f64, y: f64, count: u32 },
    Remove(usize),
    Events,
    Set { kind: EventKind, value: u32 },
    Increment(char),
    Team(i64),
    Qual(i64),
    Name(String),
    Alliance(Option<AllianceColour>),
    Tag(String),
    Untag(String),
    Submit,
    Clear,
    Help,
    Quit,
}

fn arg<'a>(args: &[&'a str], idx: usize, what: &str) -> ScoutResult<&'a str> {
    args.get(idx)
        .copied()
        .ok_or_else(|| ScoutError::Command(format!("missing {what}")))
}

fn parse_arg<T: FromStr>(args: &[&str], idx: usize, what: &str) -> ScoutResult<T> {
    let raw = arg(args, idx, what)?;
    raw.parse()
        .map_err(|_| ScoutError::Command(format!("invalid {what}: '{raw}'")))
}

/// Numeric form fields read the leading integer and ignore trailing junk
fn parse_number<T: TryFrom<i64>>(args: &[&str], idx: usize, what: &str) -> ScoutResult<T> {
    let raw = arg(args, idx, what)?;
    coerce_number_value(raw, None)
        .and_then(|n| T::try_from(n).ok())
        .ok_or_else(|| ScoutError::Command(format!("invalid {what}: '{raw}'")))
}

fn parse_opt<T: FromStr>(args: &[&str], idx: usize, what: &str, default: T) -> ScoutResult<T> {
    if args.len() > idx {
        parse_arg(args, idx, what)
    } else {
        Ok(default)
    }
}

impl FromStr for Command {
    type Err = ScoutError;

    fn from_str(line: &str) -> ScoutResult<Self> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let args: Vec<&str> = rest.split_whitespace().collect();

        let cmd = match word.to_ascii_lowercase().as_str() {
            "start" => Command::Start,
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "reset" => Command::Reset,
            "status" => Command::Status,
            "mode" => Command::Mode(parse_arg(&args, 0, "mode")?),
            "click" => Command::Click {
                x: parse_arg(&args, 0, "x")?,
                y: parse_arg(&args, 1, "y")?,
                width: parse_opt(&args, 2, "width", FIELD_IMAGE_SIZE)?,
                height: parse_opt(&args, 3, "height", FIELD_IMAGE_SIZE)?,
            },
            "kind" => Command::Kind(parse_arg(&args, 0, "event kind")?),
            "count" => Command::Count(parse_arg(&args, 0, "count")?),
            "confirm" => Command::Confirm,
            "cancel" => Command::Cancel,
            "record" => Command::Record {
                kind: parse_arg(&args, 0, "event kind")?,
                x: parse_arg(&args, 1, "x")?,
                y: parse_arg(&args, 2, "y")?,
                count: parse_opt(&args, 3, "count", 1)?,
            },
            "remove" => Command::Remove(parse_arg(&args, 0, "index")?),
            "events" => Command::Events,
            "set" => Command::Set {
                kind: parse_arg(&args, 0, "event kind")?,
                value: parse_number(&args, 1, "value")?,
            },
            "inc" => Command::Increment(parse_arg(&args, 0, "key")?),
            "team" => Command::Team(parse_number(&args, 0, "team number")?),
            "qual" => Command::Qual(parse_number(&args, 0, "qualification number")?),
            "name" => Command::Name(rest.to_string()),
            "alliance" => match arg(&args, 0, "alliance colour")? {
                none if none.eq_ignore_ascii_case("none") => Command::Alliance(None),
                _ => Command::Alliance(Some(parse_arg(&args, 0, "alliance colour")?)),
            },
            "tag" => Command::Tag(rest.to_string()),
            "untag" => Command::Untag(rest.to_string()),
            "submit" => Command::Submit,
            "clear" => Command::Clear,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(ScoutError::Command(format!("unknown command '{other}'"))),
        };
        Ok(cmd)
    }
}

impl Command {
    /// Apply to the session and describe the result for the scout
    pub fn execute<C, S, T>(
        self,
        session: &mut ScoutingSession<C, S>,
        submitter: &T,
    ) -> ScoutResult<String>
    where
        C: Clock,
        S: TickScheduler,
        T: Submitter + ?Sized,
    {
        let reply = match self {
            Command::Start => {
                session.start_timer();
                status_line(session)
            }
            Command::Pause => {
                session.pause_timer();
                status_line(session)
            }
            Command::Resume => {
                session.resume_timer();
                status_line(session)
            }
            Command::Reset => {
                session.reset_timer();
                status_line(session)
            }
            Command::Status => status_line(session),
            Command::Mode(mode) => {
                session.set_input_mode(mode);
                format!("input mode: {}", session.input_mode())
            }
            Command::Click { x, y, width, height } => {
                let position = FieldPosition::from_click(x, y, width, height)
                    .ok_or_else(|| ScoutError::Command("field has no size".into()))?;
                let offered = session.available_kinds().iter().join(", ");
                let pending = session.begin_event(position)?;
                format!(
                    "add event at {} ({:.0}, {:.0}): {} x{} [offered: {offered}]",
                    pending.timestamp, pending.position.x, pending.position.y, pending.kind, pending.count
                )
            }
            Command::Kind(kind) => {
                if session.pending_event().is_none() {
                    return Err(ScoutError::Command("no event in progress".into()));
                }
                if !session.select_event_kind(kind) {
                    return Err(ScoutError::Command(format!("{kind} is not available now")));
                }
                format!("kind: {kind}")
            }
            Command::Count(count) => {
                if !session.select_event_count(count) {
                    return Err(ScoutError::Command("count must be at least 1 with an event in progress".into()));
                }
                format!("count: {count}")
            }
            Command::Confirm => {
                let index = session
                    .confirm_event()?
                    .ok_or_else(|| ScoutError::Command("no event in progress".into()))?;
                event_line(session, index)
            }
            Command::Cancel => {
                session.cancel_event();
                "cancelled".to_string()
            }
            Command::Record { kind, x, y, count } => {
                if !session.available_kinds().contains(&kind) {
                    return Err(ScoutError::Command(format!("{kind} is not available now")));
                }
                let index = session.record_event(kind, FieldPosition::new(x, y), count)?;
                event_line(session, index)
            }
            Command::Remove(index) => match session.remove_event(index) {
                Some(event) => format!("removed {}", event.display_label()),
                None => format!("no event at {index}"),
            },
            Command::Events => {
                if session.log().is_empty() {
                    "no events".to_string()
                } else {
                    let view: &ScoutingSession<C, S> = session;
                    (0..view.log().len())
                        .map(|i| event_line(view, i))
                        .join("\n")
                }
            }
            Command::Set { kind, value } => {
                session.set_counter(kind, value)?;
                format!("{}: {value}", kind.form_key())
            }
            Command::Increment(key) => {
                let kind = session.increment_by_key(key)?;
                format!("{}: {}", kind.form_key(), session.form().counter(kind))
            }
            Command::Team(number) => {
                session.set_team_number(number);
                match &session.form().meta.team_name {
                    Some(name) => format!("team {number} ({name})"),
                    None => format!("team {number}"),
                }
            }
            Command::Qual(number) => {
                session.set_qualification(number);
                format!("qualification {number}")
            }
            Command::Name(name) => {
                session.set_team_name(&name);
                format!("team name: {}", session.form().meta.team_name.as_deref().unwrap_or("-"))
            }
            Command::Alliance(colour) => {
                session.set_alliance_colour(colour);
                format!("alliance: {}", colour.map(|c| c.to_string()).unwrap_or_else(|| "-".into()))
            }
            Command::Tag(tag) => {
                session.add_tag(&tag);
                format!("tags: [{}]", session.form().tags.iter().join(", "))
            }
            Command::Untag(tag) => {
                session.remove_tag(&tag);
                format!("tags: [{}]", session.form().tags.iter().join(", "))
            }
            Command::Submit => {
                let result = session.submit(submitter);
                if result.success {
                    result.message
                } else {
                    format!("error: {}", result.message)
                }
            }
            Command::Clear => {
                session.reset();
                "session cleared".to_string()
            }
            Command::Help => HELP.to_string(),
            Command::Quit => String::new(),
        };
        Ok(reply)
    }
}

fn status_line<C: Clock, S: TickScheduler>(session: &ScoutingSession<C, S>) -> String {
    let timer = session.timer();
    let form = session.form();
    format!(
        "{} {} | auto {}/{} teleop {}/{} | {} events",
        timer.phase(),
        timer.display(),
        form.autonomous_made,
        form.autonomous_missed,
        form.teleop_made,
        form.teleop_missed,
        session.log().len()
    )
}

fn event_line<C: Clock, S: TickScheduler>(session: &ScoutingSession<C, S>, index: usize) -> String {
    match session.log().events().get(index) {
        Some(e) => format!(
            "{index}: {} @ {} ({:.0}, {:.0})",
            e.display_label(),
            e.timestamp,
            e.coordinates.x,
            e.coordinates.y
        ),
        None => format!("no event at {index}"),
    }
}
