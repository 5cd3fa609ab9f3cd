/// Ransomware drill example — authors a small branching scenario through the
/// store, then plays it twice: once on defaults, once with a detour and a
/// revert.
///
/// Run with: cargo run --example ransomware_drill

use tabletop_engine::core::persist::ScenarioFile;
use tabletop_engine::core::run::ExerciseRun;
use tabletop_engine::core::store::ScenarioStore;
use tabletop_engine::core::validate::validate;
use tabletop_engine::schema::decision::DecidedBy;
use tabletop_engine::schema::inject::{BranchTarget, InjectType, Severity};
use tabletop_engine::schema::module::Phase;

fn main() {
    // --- Author ---
    let mut store = ScenarioStore::builder().seed(2026).build();
    store.create_new();
    store.update_scenario(|s| {
        s.title = "Friday Night Ransomware".to_string();
        s.estimated_duration = 60;
        s.tags.insert("ransomware".to_string());
    });

    let detect = store.add_module().expect("document is open");
    store.update_module(&detect, |m| {
        m.title = "First Signs".to_string();
        m.phase = Phase::Detection;
    });
    let contain = store.add_module().expect("document is open");
    store.update_module(&contain, |m| {
        m.title = "Containment".to_string();
        m.phase = Phase::Containment;
    });

    let alert = store.add_inject(&detect).expect("module exists");
    store.update_inject(&detect, &alert, |i| {
        i.title = "EDR alert on FS-02".to_string();
        i.inject_type = InjectType::Technical;
        i.severity = Severity::Medium;
    });

    let note = store.add_inject(&detect).expect("module exists");
    store.update_inject(&detect, &note, |i| {
        i.title = "Ransom note found".to_string();
        i.inject_type = InjectType::DecisionPoint;
        i.severity = Severity::Critical;
        i.trigger_time = 10;
    });
    let isolate = store.add_branch_option(&detect, &note).expect("inject exists");
    let contain_target = contain.clone();
    store.update_branch_option(&detect, &note, &isolate, |o| {
        o.label = "Isolate the file servers".to_string();
        o.is_default = true;
        o.target = BranchTarget::Module {
            module_id: contain_target,
        };
    });
    let investigate = store.add_branch_option(&detect, &note).expect("inject exists");
    store.update_branch_option(&detect, &note, &investigate, |o| {
        o.label = "Investigate first".to_string();
        o.target = BranchTarget::EndModule;
    });

    let backups = store.add_inject(&contain).expect("module exists");
    store.update_inject(&contain, &backups, |i| {
        i.title = "Backup status".to_string();
    });

    // Undo a stray edit.
    store.add_inject(&contain);
    store.undo();

    let scenario = store.current().expect("document is open").clone();
    let report = validate(&scenario);
    println!("=== {} ===", scenario.title);
    println!(
        "{} modules, {} injects, {} history entries, {} errors, {} warnings\n",
        scenario.modules.len(),
        scenario.total_inject_count(),
        store.history_len(),
        report.errors.len(),
        report.warnings.len()
    );

    // --- Play on defaults ---
    let mut run = ExerciseRun::new(scenario.clone());
    while !run.is_finished() {
        if let Some(inject) = run.current_inject() {
            println!("[T+{:>2}m] {}", inject.trigger_time, inject.title);
        }
        run.advance(None).expect("default path is playable");
    }
    println!("Path: {:?}\n", run.path_summary());

    // --- Play with an explicit choice, then revert ---
    let mut run = ExerciseRun::new(scenario.clone());
    run.advance(None).expect("linear step");
    run.choose(investigate.clone(), DecidedBy::ParticipantVote)
        .expect("option exists");
    println!("After vote: {:?}", run.cursor());
    run.revert_to(0).expect("backtracking is on");
    println!("After revert: {:?}", run.cursor());

    // --- Envelope ---
    let json = ScenarioFile::from_scenario(&scenario)
        .to_json_pretty()
        .expect("scenario serializes");
    println!("\nEnvelope is {} bytes", json.len());
}
