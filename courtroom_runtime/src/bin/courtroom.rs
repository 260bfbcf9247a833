//! Courtroom CLI
//!
//! Usage:
//!   courtroom export <scenario.json> [-o out.html] [--embed-root DIR]
//!   courtroom play <scenario.json> [--record [DIR]]
//!   courtroom replay <session-dir>
//!   courtroom verify <session-dir>
//!   courtroom conform <scenario.json> <trace.json>

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use courtroom_engine::{Action, Clock, SystemClock};
use courtroom_runtime::config::RuntimeConfig;
use courtroom_runtime::conformance::{self, ScriptTrace};
use courtroom_runtime::export::{embed_local_images, export_html};
use courtroom_runtime::live::render_text;
use courtroom_runtime::recording::load_recording;
use courtroom_runtime::scenario_file::load_scenario;
use courtroom_runtime::{replay, Result, RuntimeError, Session};

#[derive(Parser, Debug)]
#[command(name = "courtroom")]
#[command(about = "Play, export, record and verify courtroom scenarios")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a self-contained HTML document for a scenario
    Export {
        scenario: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory that site-relative image URLs resolve against
        #[arg(long = "embed-root")]
        embed_root: Option<PathBuf>,
    },
    /// Play a scenario in the terminal
    Play {
        scenario: PathBuf,

        /// Record the session under DIR (COURTROOM_SESSION_DIR when no DIR is given)
        #[arg(long, value_name = "DIR")]
        record: Option<Option<PathBuf>>,
    },
    /// Rebuild a recorded session and print its summary and hash
    Replay { dir: PathBuf },
    /// Check a recorded session for determinism and snapshot integrity
    Verify { dir: PathBuf },
    /// Compare a trace captured by an exported page against the engine
    Conform { scenario: PathBuf, trace: PathBuf },
}

fn main() {
    courtroom_runtime::init_logging();

    let cli = Cli::parse();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Export {
            scenario,
            output,
            embed_root,
        } => run_export(&config, &scenario, output.as_deref(), embed_root.as_deref()),
        Commands::Play { scenario, record } => run_play(&config, &scenario, record),
        Commands::Replay { dir } => run_replay(&dir),
        Commands::Verify { dir } => run_verify(&dir),
        Commands::Conform { scenario, trace } => run_conform(&config, &scenario, &trace),
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}

fn load_config() -> Result<RuntimeConfig> {
    let parsed = RuntimeConfig::from_env_with_diagnostics();
    if !parsed.errors.is_empty() {
        return Err(RuntimeError::Config(parsed.errors));
    }
    parsed.config.validate().map_err(RuntimeError::Config)?;
    Ok(parsed.config)
}

fn run_export(
    config: &RuntimeConfig,
    scenario_path: &Path,
    output: Option<&Path>,
    embed_root: Option<&Path>,
) -> Result<()> {
    let mut scenario = load_scenario(scenario_path)?;
    if let Some(root) = embed_root {
        let n = embed_local_images(&mut scenario, root)?;
        info!("Embedded {} image(s) from {}", n, root.display());
    }

    let html = export_html(&scenario, &config.constants)?;
    match output {
        Some(path) => {
            fs::write(path, html)?;
            info!("Wrote {}", path.display());
        }
        None => io::stdout().write_all(html.as_bytes())?,
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Interactive play
// ---------------------------------------------------------------------------

enum Command {
    Actions(Vec<Action>),
    Quit,
    Help,
}

fn parse_command(line: &str) -> std::result::Result<Command, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let id = |what: &str| {
        if rest.is_empty() {
            Err(format!("usage: {} <id>", what))
        } else {
            Ok(rest.to_string())
        }
    };

    let actions = match word {
        "start" => vec![Action::Start],
        "stop" => vec![Action::Stop],
        "reset" => vec![Action::Reset],
        "ok" => vec![Action::DismissVerdict],
        "exit" => vec![Action::ExitCritical],
        "open" => vec![Action::ToggleOpen { item_id: id("open")? }],
        "dismiss" => vec![Action::Dismiss { item_id: id("dismiss")? }],
        "resolve" => vec![Action::Resolve { item_id: id("resolve")? }],
        "skip" => vec![Action::SkipTask { task_id: id("skip")? }],
        "answer" => {
            let (task_id, text) = rest
                .split_once(' ')
                .ok_or_else(|| "usage: answer <task-id> <text>".to_string())?;
            vec![
                Action::DraftTask {
                    task_id: task_id.to_string(),
                    text: text.to_string(),
                },
                Action::SubmitTask {
                    task_id: task_id.to_string(),
                },
            ]
        }
        "submit" => vec![
            Action::DraftCritical {
                text: rest.to_string(),
            },
            Action::SubmitCritical,
        ],
        "quit" | "q" => return Ok(Command::Quit),
        "help" | "?" | "" => return Ok(Command::Help),
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(Command::Actions(actions))
}

fn run_play(config: &RuntimeConfig, scenario_path: &Path, record: Option<Option<PathBuf>>) -> Result<()> {
    let scenario = load_scenario(scenario_path)?;
    let clock = SystemClock::new();

    let mut session = if let Some(dir) = record {
        let base_dir = dir.unwrap_or_else(|| config.session_dir.clone());
        let id = format!(
            "session-{}",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default()
        );
        Session::recorded(
            &scenario,
            &config.constants,
            clock,
            &base_dir,
            &id,
            config.snapshot_interval,
        )?
    } else {
        Session::new(&scenario, &config.constants, clock)
    };

    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    println!("Type 'help' for commands.");
    loop {
        session.pump()?;
        if let Some(view) = session.changed_view() {
            println!("\n{}", render_text(&view));
        }

        let wait = session
            .next_due()
            .map(|due| due.saturating_sub(session.clock().now_ms()))
            .unwrap_or(1_000)
            .clamp(1, 1_000);

        match rx.recv_timeout(Duration::from_millis(wait)) {
            Ok(line) => match parse_command(&line) {
                Ok(Command::Quit) => break,
                Ok(Command::Help) => println!(
                    "commands: start, stop, reset, open <id>, dismiss <id>, resolve <id>, \
                     answer <task-id> <text>, skip <task-id>, submit <text>, exit, ok, quit"
                ),
                Ok(Command::Actions(actions)) => {
                    for action in actions {
                        let report = session.dispatch(action)?;
                        if !report.accepted {
                            println!("! {}", report.reason);
                        } else if report.answer_correct == Some(false) {
                            println!("! Incorrect answer");
                        }
                    }
                }
                Err(msg) => println!("! {}", msg),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    for line in session.state().stats.summary_lines() {
        println!("{}", line);
    }
    if let Some(dir) = session.recording_dir() {
        info!("Recorded {} actions to {}", session.sequence(), dir.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Recorded sessions and traces
// ---------------------------------------------------------------------------

fn run_replay(dir: &Path) -> Result<()> {
    let recording = load_recording(dir)?;
    let (state, hash) = replay::rebuild_state(&recording.header, &recording.actions)?;

    println!("session: {}", recording.header.session_id);
    println!("actions: {}", recording.actions.len());
    for line in state.stats.summary_lines() {
        println!("{}", line);
    }
    println!("hash: {}", hash);
    Ok(())
}

fn run_verify(dir: &Path) -> Result<()> {
    let recording = load_recording(dir)?;
    let hash = conformance::verify_determinism(&recording)?;
    let snapshots = conformance::verify_snapshots(&recording)?;
    if snapshots == 0 {
        warn!("No snapshots to check in {}", dir.display());
    }
    info!(
        "Verified {} actions, {} snapshot(s), hash {}",
        recording.actions.len(),
        snapshots,
        hash
    );
    Ok(())
}

fn run_conform(config: &RuntimeConfig, scenario_path: &Path, trace_path: &Path) -> Result<()> {
    let scenario = load_scenario(scenario_path)?;
    let trace: ScriptTrace = serde_json::from_str(&fs::read_to_string(trace_path)?)?;

    let report = conformance::conform(&scenario, &config.constants, &trace)?;
    match report.divergence {
        None => {
            info!("Trace conforms ({} frames)", report.frames_compared);
            Ok(())
        }
        Some(d) => {
            error!(
                "Divergence at seq {} ({}): field '{}' script={} engine={}",
                d.seq, d.action, d.field, d.script, d.engine
            );
            process::exit(2);
        }
    }
}
