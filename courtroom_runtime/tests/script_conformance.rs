//! The exported page's engine script must agree with the Rust engine.
//!
//! Each test drives `assets/engine.js` under Node with an action stream,
//! collects the page-shaped trace and replays it through `conform`. Tests
//! return early when `node` is not installed.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use courtroom_engine::domain::{CourtOutcome, Message, MessageCategory, Severity};
use courtroom_engine::{Action, ActionEnvelope, EngineConstants, Scenario};

use courtroom_runtime::conformance::{self, ScriptTrace};
use courtroom_runtime::export::headless_script;

/// Appended to the headless script: apply every step, emit the trace.
const DRIVER: &str = r#"
const steps = JSON.parse(require('fs').readFileSync(process.argv[2], 'utf8'));
const state = createInitialState(0);
const entries = steps.map(step => {
  applyAction(state, step.action, step.at);
  return { seq: step.sequence, at: step.at, action: step.action, frame: captureFrame(state, step.sequence) };
});
process.stdout.write(JSON.stringify({ startedAt: 0, constants: C, entries }));
"#;

fn run_script(scenario: &Scenario, constants: &EngineConstants, steps: &[ActionEnvelope]) -> Option<ScriptTrace> {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = dir.path().join("drive.js");
    let body = headless_script(scenario, constants).expect("headless script");
    fs::write(&script, format!("{}\n{}", body, DRIVER)).expect("write script");
    let steps_path = dir.path().join("steps.json");
    fs::write(&steps_path, serde_json::to_string(steps).expect("steps JSON")).expect("write steps");

    let output = match Command::new("node").arg(&script).arg(&steps_path).output() {
        Ok(output) => output,
        Err(e) => {
            eprintln!("node not available ({}), skipping", e);
            return None;
        }
    };
    assert!(
        output.status.success(),
        "node failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    Some(serde_json::from_slice(&output.stdout).expect("trace JSON"))
}

fn assert_conforms(scenario: &Scenario, constants: &EngineConstants, steps: &[ActionEnvelope]) {
    let Some(trace) = run_script(scenario, constants, steps) else {
        return;
    };
    assert_eq!(trace.entries.len(), steps.len());
    assert_eq!(trace.constants.as_ref(), Some(constants));

    // The fallback is deliberately wrong: the embedded constants must win.
    let fallback = EngineConstants {
        stage_ms: constants.stage_ms + 7_000,
        ..constants.clone()
    };
    let report = conformance::conform(scenario, &fallback, &trace).expect("conform");
    assert!(report.conforms(), "{:?}", report.divergence);
    assert_eq!(report.frames_compared, steps.len());
}

/// Player actions merged with both timers firing from 0 to `until`.
/// Ties go countdown, then engine tick, then player input.
fn with_timers(constants: &EngineConstants, player: &[(u64, Action)], until: u64) -> Vec<ActionEnvelope> {
    let mut timed: Vec<(u64, u8, Action)> = Vec::new();
    let mut at = constants.countdown_tick_ms;
    while at <= until {
        timed.push((at, 0, Action::CountdownTick));
        at += constants.countdown_tick_ms;
    }
    let mut at = constants.engine_tick_ms;
    while at <= until {
        timed.push((at, 1, Action::Advance));
        at += constants.engine_tick_ms;
    }
    timed.extend(player.iter().map(|(at, action)| (*at, 2, action.clone())));
    timed.sort_by_key(|(at, rank, _)| (*at, *rank));

    timed
        .into_iter()
        .enumerate()
        .map(|(i, (at, _, action))| ActionEnvelope::new(i as u64 + 1, at, action))
        .collect()
}

fn msg(category: MessageCategory, severity: Option<Severity>, text: &str, answer: &str) -> Message {
    Message {
        id: None,
        category,
        severity,
        text: text.to_string(),
        answer: Some(answer.to_string()),
        court_outcome: None,
    }
}

fn scenario(messages: Vec<Message>) -> Scenario {
    Scenario {
        messages,
        ..Scenario::empty()
    }
}

fn item(n: u64) -> String {
    format!("i{}", n)
}

// ─────────────────────────────────────────────────────────────
// Behavioural scenarios
// ─────────────────────────────────────────────────────────────

#[test]
fn single_task_answered_in_other_case() {
    let s = scenario(vec![msg(MessageCategory::Task, None, "Say ok", "ok")]);
    let c = EngineConstants::default();
    let steps = with_timers(
        &c,
        &[
            (0, Action::Start),
            (500, Action::DraftTask { task_id: item(1), text: " OK".to_string() }),
            (600, Action::SubmitTask { task_id: item(1) }),
        ],
        3_000,
    );
    assert_conforms(&s, &c, &steps);
}

#[test]
fn unattended_major_critical_goes_to_court() {
    let s = scenario(vec![msg(MessageCategory::Critical, Some(Severity::Major), "Fix it", "done")]);
    let c = EngineConstants::default();
    let steps = with_timers(&c, &[(0, Action::Start), (275_000, Action::DismissVerdict)], 280_000);
    assert_conforms(&s, &c, &steps);
}

#[test]
fn dismissed_critical_returns_urgent() {
    let s = scenario(vec![msg(MessageCategory::Critical, Some(Severity::Minor), "Later", "ok")]);
    let c = EngineConstants::default();
    let steps = with_timers(
        &c,
        &[(0, Action::Start), (31_000, Action::Dismiss { item_id: item(1) })],
        400_000,
    );
    assert_conforms(&s, &c, &steps);
}

#[test]
fn mixed_play_with_dialogs_verdicts_and_reset() {
    let mut no_return = msg(MessageCategory::Critical, Some(Severity::Minor), "Twin", "ok");
    no_return.court_outcome = Some(CourtOutcome {
        can_return: Some(false),
        ..CourtOutcome::default()
    });
    let s = scenario(vec![
        msg(MessageCategory::Task, None, "t1", "ok"),
        msg(MessageCategory::Interruption, None, "n1", ""),
        msg(MessageCategory::Critical, Some(Severity::Major), "c1", "ok"),
        msg(MessageCategory::Interruption, None, "n2", ""),
        msg(MessageCategory::Critical, Some(Severity::Minor), "Twin", "ok"),
        no_return,
        msg(MessageCategory::Interruption, None, "n3", ""),
    ]);
    let c = EngineConstants::default();
    let player = [
        (0, Action::Start),
        (31_000, Action::Resolve { item_id: item(3) }),
        (32_000, Action::DraftCritical { text: "nope".to_string() }),
        (32_100, Action::SubmitCritical),
        (33_000, Action::DraftCritical { text: "OK ".to_string() }),
        (33_100, Action::SubmitCritical),
        (35_000, Action::Start),
        (95_000, Action::ToggleOpen { item_id: item(2) }),
        (95_500, Action::Dismiss { item_id: item(2) }),
        (130_000, Action::Resolve { item_id: item(5) }),
        (131_000, Action::ExitCritical),
        (132_000, Action::DismissVerdict),
        (133_000, Action::Start),
        (200_000, Action::Reset),
        (201_000, Action::Start),
        (202_000, Action::SkipTask { task_id: item(1) }),
        (420_000, Action::DismissVerdict),
        (421_000, Action::Start),
    ];
    let steps = with_timers(&c, &player, 900_000);
    assert_conforms(&s, &c, &steps);
}

#[test]
fn injected_constants_drive_the_script() {
    let s = scenario(vec![
        msg(MessageCategory::Interruption, None, "n1", ""),
        msg(MessageCategory::Critical, Some(Severity::Major), "c1", "ok"),
        msg(MessageCategory::Critical, Some(Severity::Minor), "c2", "ok"),
    ]);
    let c = EngineConstants {
        stage_ms: 45_000,
        next_item_interval_ms: 10_000,
        crit_min_noncrit_gap: 1,
        crit_min_time_gap_ms: 20_000,
        enforce_fail_limits: true,
        ..EngineConstants::default()
    };
    let steps = with_timers(
        &c,
        &[(0, Action::Start), (101_000, Action::DismissVerdict), (102_000, Action::Start)],
        300_000,
    );
    assert_conforms(&s, &c, &steps);
}

// ─────────────────────────────────────────────────────────────
// Golden and pseudo-random streams
// ─────────────────────────────────────────────────────────────

#[test]
fn golden_stream_conforms() {
    let golden = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("courtroom_engine")
        .join("tests")
        .join("golden");
    let s: Scenario =
        serde_json::from_str(&fs::read_to_string(golden.join("scenario.json")).expect("scenario")).expect("parse");
    let steps: Vec<ActionEnvelope> =
        serde_json::from_str(&fs::read_to_string(golden.join("actions.json")).expect("actions")).expect("parse");
    assert_conforms(&s, &EngineConstants::default(), &steps);
}

/// xorshift64, enough to vary player input reproducibly.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

fn random_player(seed: u64, count: usize, until: u64) -> Vec<(u64, Action)> {
    let mut rng = Rng(seed);
    let mut out: Vec<(u64, Action)> = (0..count)
        .map(|_| {
            let at = rng.below(until);
            let id = item(1 + rng.below(14));
            let text = if rng.below(2) == 0 { "ok" } else { "nope" }.to_string();
            let action = match rng.below(14) {
                0 => Action::Start,
                1 => Action::Stop,
                2 => Action::Reset,
                3 => Action::ToggleOpen { item_id: id },
                4 => Action::DraftTask { task_id: id, text },
                5 => Action::SubmitTask { task_id: id },
                6 => Action::SkipTask { task_id: id },
                7 | 8 => Action::Dismiss { item_id: id },
                9 | 10 => Action::Resolve { item_id: id },
                11 => Action::DraftCritical { text },
                12 => Action::SubmitCritical,
                _ => {
                    if rng.below(2) == 0 {
                        Action::ExitCritical
                    } else {
                        Action::DismissVerdict
                    }
                }
            };
            (at, action)
        })
        .collect();
    out.push((0, Action::Start));
    out.sort_by_key(|(at, _)| *at);
    out
}

#[test]
fn random_streams_conform() {
    let s = scenario(vec![
        msg(MessageCategory::Task, None, "t1", "ok"),
        msg(MessageCategory::Interruption, None, "n1", ""),
        msg(MessageCategory::Critical, Some(Severity::Major), "c1", "ok"),
        msg(MessageCategory::Interruption, None, "n2", ""),
        msg(MessageCategory::Critical, Some(Severity::Minor), "c2", "ok"),
        msg(MessageCategory::Critical, Some(Severity::Minor), "c2", "ok"),
        msg(MessageCategory::Interruption, None, "n3", ""),
        msg(MessageCategory::Critical, None, "c3", ""),
        msg(MessageCategory::Task, None, "t2", "ok"),
    ]);
    let c = EngineConstants::default();
    for seed in [0x9e37_79b9_7f4a_7c15, 42, 7, 1_234_567] {
        let player = random_player(seed, 250, 600_000);
        let steps = with_timers(&c, &player, 600_000);
        assert_conforms(&s, &c, &steps);
    }
}
