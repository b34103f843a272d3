use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc;
use std::time::Duration;

use matchscout::clock::{ManualClock, SystemClock};
use matchscout::command::Command;
use matchscout::form::InputMode;
use matchscout::runtime::{LineEventSource, ManualTicker, Runner, ScoutEvent, TestEventSource};
use matchscout::submission::{Submission, SubmissionResult, Submitter};
use matchscout::{AggregateCounters, ScoutingSession, SessionChange, TimerConfig, TimerPhase};

struct Accept(RefCell<Vec<Submission>>);

impl Submitter for Accept {
    fn submit(&self, submission: &Submission) -> SubmissionResult {
        self.0.borrow_mut().push(submission.clone());
        SubmissionResult::ok("Data submitted successfully")
    }
}

// Headless run of a whole match through the runner, with a manual clock so
// the autonomous/teleop boundary lands exactly where the script puts it.
#[test]
fn scripted_match_through_runner() {
    let clock = ManualClock::new();
    let ticker = ManualTicker::new();
    let mut session = ScoutingSession::new(TimerConfig::default(), clock.clone(), ticker.clone())
        .with_input_mode(InputMode::Field);
    let submitter = Accept(RefCell::new(Vec::new()));

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(TestEventSource::new(rx), Duration::from_millis(5));

    let script = [
        "team 1234",
        "qual 12",
        "start",
        "record autonomous_made 100 100 2",
        "record autonomous_missed 200 200",
    ];
    for line in script {
        tx.send(ScoutEvent::Line(line.to_string())).unwrap();
    }
    tx.send(ScoutEvent::Tick).unwrap();

    let drive = |session: &mut ScoutingSession<ManualClock, ManualTicker>| {
        while let Some(ev) = runner.step() {
            match ev {
                ScoutEvent::Tick => session.tick(),
                ScoutEvent::Line(line) => {
                    line.parse::<Command>()
                        .unwrap()
                        .execute(session, &submitter)
                        .unwrap();
                }
                ScoutEvent::Closed => break,
            }
        }
    };
    drive(&mut session);
    assert_eq!(session.timer().phase(), TimerPhase::Running);
    assert_eq!(session.log().len(), 2);

    // autonomous runs out; the next tick pauses at 2:00
    clock.advance_secs(30.5);
    tx.send(ScoutEvent::Tick).unwrap();
    drive(&mut session);
    assert_eq!(session.timer().phase(), TimerPhase::Paused);
    assert_eq!(session.timer().display(), "2:00");
    assert_eq!(ticker.active(), 0);

    tx.send(ScoutEvent::Line("resume".into())).unwrap();
    drive(&mut session);
    clock.advance_secs(35.0);
    tx.send(ScoutEvent::Line("record teleop_made 300 300 2".into()))
        .unwrap();
    tx.send(ScoutEvent::Line("record teleop_missed 300 300".into()))
        .unwrap();
    tx.send(ScoutEvent::Line("remove 3".into())).unwrap();
    drive(&mut session);

    let events = session.log().events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[2].timestamp, "1:05");
    assert_eq!(
        session.form().counters(),
        AggregateCounters {
            autonomous_made: 2,
            autonomous_missed: 1,
            teleop_made: 2,
            teleop_missed: 0,
        }
    );

    tx.send(ScoutEvent::Line("submit".into())).unwrap();
    drive(&mut session);

    let sent = submitter.0.borrow();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].meta.team_number, Some(1234));
    assert_eq!(sent[0].field_events.as_ref().map(Vec::len), Some(3));
    assert!(session.log().is_empty());
    assert_eq!(session.timer().phase(), TimerPhase::Idle);
}

// Real clock and thread ticker on a shortened match: the tick must pause the
// timer at the boundary, finish it at zero, and stop firing afterwards.
#[test]
fn short_real_time_match_runs_to_completion() {
    let config = TimerConfig {
        total_secs: 0.3,
        pause_threshold_secs: 0.2,
        tick_interval_ms: 5,
    };
    let source = LineEventSource::new(std::io::Cursor::new(""));
    let ticker = source.ticker();
    let runner = Runner::new(source, Duration::from_millis(50));
    let mut session = ScoutingSession::new(config, SystemClock, ticker);

    let phases = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&phases);
    session.subscribe(move |change| {
        if let SessionChange::TimerPhase(phase) = change {
            sink.borrow_mut().push(*phase);
        }
    });

    session.start_timer();
    for _ in 0..200u32 {
        if let Some(ScoutEvent::Tick) = runner.step() {
            session.tick();
        }
        if session.timer().phase() == TimerPhase::Paused {
            break;
        }
    }
    assert_eq!(session.timer().phase(), TimerPhase::Paused);
    assert!(!session.timer().is_ticking());
    assert!((session.timer().time_remaining() - 0.2).abs() < f64::EPSILON);

    session.resume_timer();
    for _ in 0..400u32 {
        if let Some(ScoutEvent::Tick) = runner.step() {
            session.tick();
        }
        if session.timer().phase() == TimerPhase::Finished {
            break;
        }
    }

    assert_eq!(session.timer().phase(), TimerPhase::Finished);
    assert_eq!(session.timer().time_remaining(), 0.0);
    assert!(!session.timer().is_ticking());
    assert_eq!(
        *phases.borrow(),
        vec![
            TimerPhase::Running,
            TimerPhase::Paused,
            TimerPhase::Running,
            TimerPhase::Finished
        ]
    );
}
