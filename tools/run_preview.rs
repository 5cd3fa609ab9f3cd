/// Run Preview — interactive playback shell for a scenario file.
///
/// Usage: run_preview <scenario.json> [--config <engine.ron>] [--no-backtrack]
///
/// Commands:
///   next             advance (takes the default option at a decision)
///   choose <n|id>    pick a branch option by number or id
///   vote <n|id>      same, recorded as a participant vote
///   back <n>         undo decision n and everything after it
///   skip             end the current module
///   path             show decisions taken so far
///   end              end the run
///   help             list commands
///   quit             exit

use std::io::{self, BufRead, Write};
use std::path::Path;
use tabletop_engine::core::branch::Cursor;
use tabletop_engine::core::config::EngineConfig;
use tabletop_engine::core::persist::ScenarioFile;
use tabletop_engine::core::run::ExerciseRun;
use tabletop_engine::schema::decision::DecidedBy;
use tabletop_engine::schema::ids::BranchOptionId;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let scenario_path = args[1].clone();
    let mut config = EngineConfig::default();

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                i += 1;
                config = match EngineConfig::load_from_ron(Path::new(&args[i])) {
                    Ok(config) => config,
                    Err(e) => {
                        eprintln!("ERROR: Failed to load config: {}", e);
                        std::process::exit(1);
                    }
                };
            }
            "--no-backtrack" => config.allow_backtracking = false,
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let scenario = match ScenarioFile::load_from_path(Path::new(&scenario_path)) {
        Ok(file) => file.into_scenario(),
        Err(e) => {
            eprintln!("ERROR: Failed to load scenario: {}", e);
            std::process::exit(1);
        }
    };

    println!(
        "{} ({} modules, {} injects)",
        scenario.title,
        scenario.modules.len(),
        scenario.total_inject_count()
    );
    println!("Type 'help' for commands.\n");

    let mut run = ExerciseRun::builder(scenario).config(&config).build();
    show(&run);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("run> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(first) = parts.first() else {
            continue;
        };
        let cmd = first.to_lowercase();

        let result = match cmd.as_str() {
            "quit" | "exit" | "q" => break,
            "help" | "h" | "?" => {
                print_help();
                continue;
            }
            "next" | "n" => {
                if matches!(run.cursor(), Cursor::ModuleBoundary { .. }) {
                    run.continue_to_next_module().map(|_| ())
                } else {
                    run.advance(None).map(|_| ())
                }
            }
            "choose" | "c" | "vote" | "v" => {
                let Some(arg) = parts.get(1) else {
                    println!("Usage: {} <n|id>", cmd);
                    continue;
                };
                let Some(option_id) = resolve_option(&run, arg) else {
                    println!("No option '{}' here", arg);
                    continue;
                };
                let decided_by = if cmd.starts_with('v') {
                    DecidedBy::ParticipantVote
                } else {
                    DecidedBy::Facilitator
                };
                run.choose(option_id, decided_by).map(|_| ())
            }
            "back" | "b" => {
                let Some(number) = parts
                    .get(1)
                    .and_then(|s| s.parse::<usize>().ok())
                    .filter(|&n| n > 0)
                else {
                    println!("Usage: back <decision number, from 1>");
                    continue;
                };
                run.revert_to(number - 1).map(|_| ())
            }
            "skip" => {
                run.end_module();
                Ok(())
            }
            "path" | "p" => {
                print_path(&run);
                continue;
            }
            "end" => {
                run.end_run();
                Ok(())
            }
            other => {
                println!("Unknown command: {}", other);
                continue;
            }
        };

        match result {
            Ok(()) => show(&run),
            Err(e) => println!("ERROR: {}", e),
        }
    }
}

fn resolve_option(run: &ExerciseRun, arg: &str) -> Option<BranchOptionId> {
    let options = run.pending_options();
    if let Ok(n) = arg.parse::<usize>() {
        return options.get(n.checked_sub(1)?).map(|o| o.id.clone());
    }
    options
        .iter()
        .find(|o| o.id.as_str() == arg)
        .map(|o| o.id.clone())
}

fn show(run: &ExerciseRun) {
    match run.cursor() {
        Cursor::Terminal => {
            println!("--- Exercise complete ---");
            print_path(run);
        }
        Cursor::ModuleBoundary { .. } => {
            if let Some(module) = run.current_module() {
                println!("--- End of module: {} ---", module.title);
                if let Some(guidance) = &module.transition_guidance {
                    println!("{}", guidance);
                }
                for question in &module.discussion_questions {
                    println!("  ? {}", question.question);
                }
            }
            println!("('next' to continue)");
        }
        Cursor::Active { .. } => {
            let module = run.current_module().map_or("?", |m| m.title.as_str());
            let Some(inject) = run.current_inject() else {
                println!("[{}] (module start)", module);
                return;
            };
            println!(
                "\n[{} | T+{}m] {} — {} ({})",
                module,
                inject.trigger_time,
                inject.severity.label(),
                inject.title,
                inject.inject_type.label()
            );
            if !inject.content.is_empty() {
                println!("{}", inject.content);
            }
            for (n, option) in run.pending_options().iter().enumerate() {
                let marker = if option.is_default { " (default)" } else { "" };
                println!("  {}. {}{}", n + 1, option.label, marker);
            }
        }
    }
}

fn print_path(run: &ExerciseRun) {
    let path = run.path_summary();
    if path.is_empty() {
        println!("No decisions yet.");
        return;
    }
    for (n, label) in path.iter().enumerate() {
        println!("  {}. {}", n + 1, label);
    }
}

fn print_usage() {
    println!("Run Preview — interactive playback shell for a scenario file.");
    println!();
    println!("Usage: run_preview <scenario.json> [--config <engine.ron>] [--no-backtrack]");
    println!();
    println!("  --config <path>   Engine config in RON");
    println!("  --no-backtrack    Refuse 'back' commands");
}

fn print_help() {
    println!("Commands:");
    println!("  next             Advance (default option at a decision)");
    println!("  choose <n|id>    Pick a branch option");
    println!("  vote <n|id>      Pick a branch option as a participant vote");
    println!("  back <n>         Undo decision n and everything after it");
    println!("  skip             End the current module");
    println!("  path             Show decisions taken so far");
    println!("  end              End the run");
    println!("  help             Show this help");
    println!("  quit             Exit");
}
