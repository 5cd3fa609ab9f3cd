/// Scenario Linter — structural checks over scenario files.
///
/// Usage: scenario_linter <file_or_dir> [--strict]
///
/// Exits non-zero when any file fails to load or has errors. With
/// `--strict`, warnings count as failures too.

use std::path::{Path, PathBuf};
use std::process;
use tabletop_engine::core::persist::ScenarioFile;
use tabletop_engine::core::validate::validate;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: scenario_linter <file_or_dir> [--strict]");
        process::exit(0);
    }

    let target = Path::new(&args[1]);
    let mut strict = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--strict" => strict = true,
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(2);
            }
        }
        i += 1;
    }

    let files = if target.is_file() {
        vec![target.to_path_buf()]
    } else if target.is_dir() {
        let mut files = Vec::new();
        collect_json_recursive(target, &mut files);
        files.sort();
        files
    } else {
        eprintln!("ERROR: Path '{}' does not exist", target.display());
        process::exit(1);
    };

    let mut total_errors = 0;
    let mut total_warnings = 0;

    for path in &files {
        println!("\n=== {} ===", path.display());
        let file = match ScenarioFile::load_from_path(path) {
            Ok(file) => file,
            Err(e) => {
                println!("ERROR: failed to load: {}", e);
                total_errors += 1;
                continue;
            }
        };
        let scenario = file.into_scenario();
        let report = validate(&scenario);

        println!(
            "{} — {} modules, {} injects",
            scenario.title,
            scenario.modules.len(),
            scenario.total_inject_count()
        );
        if report.errors.is_empty() && report.warnings.is_empty() {
            println!("All checks passed!");
        }
        for warning in &report.warnings {
            println!("WARNING: {}", warning);
        }
        for error in &report.errors {
            println!("ERROR: {}", error);
        }
        if !report.is_ok() {
            warn!(path = %path.display(), errors = report.errors.len(), "scenario failed lint");
        }

        total_errors += report.errors.len();
        total_warnings += report.warnings.len();
    }

    println!(
        "\nSummary: {} files, {} errors, {} warnings",
        files.len(),
        total_errors,
        total_warnings
    );

    if total_errors > 0 || (strict && total_warnings > 0) {
        process::exit(1);
    }
}

fn collect_json_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        warn!(dir = %dir.display(), "could not read directory");
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_json_recursive(&path, files);
        } else if path.extension().and_then(|s| s.to_str()) == Some("json") {
            debug!(path = %path.display(), "found scenario file");
            files.push(path);
        }
    }
}
