use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{info, Level};

use matchscout::clock::SystemClock;
use matchscout::command::{Command, HELP};
use matchscout::config::{load_team_map, ConfigStore, FileConfigStore, SpreadsheetConfig};
use matchscout::form::InputMode;
use matchscout::runtime::{LineEventSource, Runner, ScoutEvent};
use matchscout::session::{ScoutingSession, SessionChange};
use matchscout::submission::CsvSheetSubmitter;

/// match timer and field event scouting for robotics competitions
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Scout one match at a time from the terminal: run the match timer, record scored events on the field, and submit the totals to a local sheet. Commands are read line by line from stdin; type `help` for the list."
)]
pub struct Cli {
    /// config file to use instead of the default location
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// directory submissions are written under
    #[clap(short = 'o', long)]
    output: Option<PathBuf>,

    /// spreadsheet id or sheets URL to submit to (saved to config)
    #[clap(long, requires = "sheet")]
    spreadsheet: Option<String>,

    /// sheet id within the spreadsheet (saved to config)
    #[clap(long, requires = "spreadsheet")]
    sheet: Option<String>,

    /// JSON file mapping team numbers to team names, merged into config
    #[clap(short = 't', long)]
    teams: Option<PathBuf>,

    /// how scoring is entered for this session
    #[clap(short = 'm', long, value_enum)]
    mode: Option<InputMode>,

    /// timer tick interval in milliseconds
    #[clap(long)]
    tick_ms: Option<u64>,

    /// log debug output to stderr
    #[clap(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let store = cli
        .config
        .as_ref()
        .map(FileConfigStore::with_path)
        .unwrap_or_default();
    let mut config = store.load();
    let mut dirty = false;

    if let (Some(spreadsheet), Some(sheet)) = (&cli.spreadsheet, &cli.sheet) {
        config.spreadsheet = Some(SpreadsheetConfig::new(spreadsheet, sheet)?);
        dirty = true;
    }
    if let Some(path) = &cli.teams {
        let teams = load_team_map(path)?;
        let loaded = config.merge_teams(teams);
        println!("Loaded {loaded} team{}", if loaded == 1 { "" } else { "s" });
        dirty = true;
    }
    if let Some(output) = &cli.output {
        config.output_dir = Some(output.clone());
    }
    if let Some(ms) = cli.tick_ms {
        config.timer.tick_interval_ms = ms;
    }
    if dirty {
        store.save(&config)?;
        info!(path = %store.path().display(), "config saved");
    }

    let events = LineEventSource::stdin();
    let mut session = ScoutingSession::new(config.timer, SystemClock, events.ticker())
        .with_teams(config.teams.clone())
        .with_input_mode(cli.mode.unwrap_or(config.input_mode));
    session.subscribe(|change| match change {
        SessionChange::TimerDisplay(remaining) => println!("⏱ {remaining}"),
        SessionChange::TimerPhase(phase) => println!("timer {phase}"),
        _ => {}
    });

    let submitter = CsvSheetSubmitter::new(config.output_dir(), config.spreadsheet.clone());
    let runner = Runner::new(events, Duration::from_secs(1));

    println!("matchscout ready ({} input). Type `help` for commands.", session.input_mode());

    loop {
        match runner.step() {
            None => {}
            Some(ScoutEvent::Tick) => session.tick(),
            Some(ScoutEvent::Closed) => break,
            Some(ScoutEvent::Line(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(Command::Quit) => break,
                    Ok(Command::Help) => println!("{HELP}"),
                    Ok(cmd) => match cmd.execute(&mut session, &submitter) {
                        Ok(reply) => println!("{reply}"),
                        Err(e) => println!("error: {e}"),
                    },
                    Err(e) => println!("error: {e}"),
                }
            }
        }
    }

    Ok(())
}
