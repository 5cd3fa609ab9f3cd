/// Branch engine integration tests — playback of the ransomware fixture
/// through the engine and through an exercise run.

use chrono::{Duration, TimeZone, Utc};
use std::path::Path;
use tabletop_engine::core::branch::{BranchEngine, BranchError, Choice, Cursor, RunState};
use tabletop_engine::core::clock::FixedClock;
use tabletop_engine::core::persist::ScenarioFile;
use tabletop_engine::core::run::{ExerciseRun, RunError};
use tabletop_engine::schema::decision::DecidedBy;
use tabletop_engine::schema::ids::{InjectId, ModuleId};
use tabletop_engine::schema::scenario::Scenario;

fn drill() -> Scenario {
    ScenarioFile::load_from_path(Path::new("tests/fixtures/ransomware_drill.json"))
        .unwrap()
        .into_scenario()
}

fn active(module_id: &str, inject_id: &str) -> Cursor {
    Cursor::Active {
        module_id: ModuleId::new(module_id),
        inject_id: Some(InjectId::new(inject_id)),
    }
}

fn at(cursor: Cursor) -> RunState {
    RunState {
        cursor,
        detour: None,
        log: Vec::new(),
        exits: Vec::new(),
    }
}

#[test]
fn default_branch_is_deterministic() {
    let scenario = drill();
    let engine = BranchEngine::new(&scenario);
    let now = Utc.with_ymd_and_hms(2026, 3, 6, 19, 0, 0).unwrap();
    let state = at(active("mod-detect", "inj-ransom-note"));

    let first = engine.advance(&state, None, now).unwrap();
    let second = engine.advance(&state, None, now).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.cursor, active("mod-contain", "inj-backups"));
    assert_eq!(first.log.len(), 1);
    assert_eq!(first.log[0].decided_by, DecidedBy::Automatic);
}

#[test]
fn unknown_choice_leaves_state_untouched() {
    let scenario = drill();
    let engine = BranchEngine::new(&scenario);
    let now = Utc::now();
    let state = at(active("mod-detect", "inj-ransom-note"));
    let snapshot = state.clone();

    let err = engine
        .advance(&state, Some(&Choice::facilitator("nonexistent-id")), now)
        .unwrap_err();
    assert!(matches!(err, BranchError::InvalidChoice { .. }));
    assert_eq!(state, snapshot);
}

#[test]
fn default_path_plays_to_terminal() {
    let scenario = drill();
    let engine = BranchEngine::new(&scenario);
    let now = Utc::now();
    let mut state = engine.start();
    let mut injects = Vec::new();
    while state.cursor != Cursor::Terminal {
        if let Some(id) = state.cursor.inject_id() {
            injects.push(id.to_string());
        }
        state = engine.advance(&state, None, now).unwrap();
    }
    assert_eq!(
        injects,
        vec![
            "inj-alert",
            "inj-ransom-note",
            "inj-backups",
            "inj-press",
            "inj-restore"
        ]
    );
    assert_eq!(
        engine.path_summary(&state.log),
        vec!["Isolate the file servers", "Issue a holding statement"]
    );
}

#[test]
fn investigation_detour_resumes_in_module() {
    let scenario = drill();
    let engine = BranchEngine::new(&scenario);
    let now = Utc::now();
    let state = at(active("mod-detect", "inj-ransom-note"));

    let state = engine
        .advance(&state, Some(&Choice::vote("opt-investigate")), now)
        .unwrap();
    assert_eq!(state.cursor, active("mod-detect", "inj-forensics"));
    assert_eq!(
        engine.active_inject(&state).unwrap().unwrap().title,
        "Forensics finds lateral movement"
    );

    let state = engine.advance(&state, None, now).unwrap();
    assert_eq!(state.cursor, active("mod-detect", "inj-exec"));
    let state = engine.advance(&state, None, now).unwrap();
    assert_eq!(
        state.cursor,
        Cursor::ModuleBoundary {
            module_id: ModuleId::new("mod-detect")
        }
    );
}

#[test]
fn revert_replay_matches_fresh_run() {
    let scenario = drill();
    let clock_start = Utc.with_ymd_and_hms(2026, 3, 6, 19, 0, 0).unwrap();
    let clock = || FixedClock::ticking(clock_start, Duration::seconds(30));

    // Fresh run stopping right after the first decision.
    let mut fresh = ExerciseRun::builder(scenario.clone()).clock(clock()).build();
    fresh.advance(None).unwrap();
    fresh.choose("opt-isolate", DecidedBy::Facilitator).unwrap();

    // Longer run: same first decision, then loop back and pay.
    let mut long = ExerciseRun::builder(scenario).clock(clock()).build();
    long.advance(None).unwrap();
    long.choose("opt-isolate", DecidedBy::Facilitator).unwrap();
    long.advance(None).unwrap();
    long.choose("opt-recheck", DecidedBy::Facilitator).unwrap();
    assert_eq!(long.cursor(), &active("mod-detect", "inj-alert"));
    long.advance(None).unwrap();
    long.choose("opt-pay", DecidedBy::ParticipantVote).unwrap();
    assert!(long.is_finished());
    assert_eq!(long.decision_log().len(), 3);

    long.revert_to(1).unwrap();
    assert_eq!(long.state(), fresh.state());
    assert_eq!(long.decision_log()[0].decided_at, fresh.decision_log()[0].decided_at);
}

#[test]
fn revert_after_skipped_module_replays_the_skip() {
    let scenario = drill();
    let clock_start = Utc.with_ymd_and_hms(2026, 3, 6, 19, 0, 0).unwrap();
    let clock = || FixedClock::ticking(clock_start, Duration::seconds(30));

    // Skip detection, then close containment with a statement.
    let mut fresh = ExerciseRun::builder(scenario.clone()).clock(clock()).build();
    fresh.end_module();
    fresh.advance(None).unwrap();
    assert_eq!(fresh.cursor(), &active("mod-contain", "inj-backups"));
    fresh.advance(None).unwrap();
    fresh.choose("opt-statement", DecidedBy::Facilitator).unwrap();
    assert_eq!(fresh.decision_log().len(), 1);
    let after_statement = fresh.state().clone();

    // Same opening, then play on into recovery and skip it too.
    let mut long = ExerciseRun::builder(scenario).clock(clock()).build();
    long.end_module();
    long.advance(None).unwrap();
    long.advance(None).unwrap();
    long.choose("opt-statement", DecidedBy::Facilitator).unwrap();
    long.advance(None).unwrap();
    assert_eq!(long.cursor(), &active("mod-recover", "inj-restore"));
    long.end_module();
    assert_eq!(long.state().exits.len(), 2);

    long.revert_to(1).unwrap();
    assert_eq!(long.state(), &after_statement);

    long.revert_to(0).unwrap();
    assert_eq!(long.state(), &BranchEngine::new(long.scenario()).start());
}

#[test]
fn revert_index_past_log_is_rejected() {
    let mut run = ExerciseRun::builder(drill()).clock(FixedClock::at(Utc::now())).build();
    let err = run.revert_to(3).unwrap_err();
    assert!(matches!(
        err,
        RunError::Branch(BranchError::DecisionOutOfRange { index: 3, len: 0 })
    ));
}

#[test]
fn run_state_survives_json() {
    let scenario = drill();
    let engine = BranchEngine::new(&scenario);
    let state = engine
        .advance(
            &at(active("mod-detect", "inj-ransom-note")),
            Some(&Choice::facilitator("opt-investigate")),
            Utc::now(),
        )
        .unwrap();
    let json = serde_json::to_string(&state).unwrap();
    let back: RunState = serde_json::from_str(&json).unwrap();
    assert_eq!(back, state);
}
