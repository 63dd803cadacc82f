//! livequery-replay: replays JSON fixtures through live queries.
//!
//! Usage: livequery-replay [FIXTURE.json ...]
//! With no arguments, looks for the golden fixture next to the crate.

use std::path::{Path, PathBuf};

use log::info;

use query_runtime::fixture::{self, Fixture};

const DEFAULT_FIXTURES: [&str; 2] = [
    "tests/golden/fixture.json",
    "query_runtime/tests/golden/fixture.json",
];

fn fixture_paths() -> Vec<PathBuf> {
    let args: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if !args.is_empty() {
        return args;
    }
    DEFAULT_FIXTURES
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(|p| vec![p.to_path_buf()])
        .unwrap_or_default()
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let paths = fixture_paths();
    if paths.is_empty() {
        eprintln!("no fixture given and no golden fixture found");
        std::process::exit(2);
    }

    let mut total = 0;
    let mut passed = 0;
    let mut all_passed = true;

    for path in &paths {
        info!("loading fixture {}", path.display());
        let outcomes = match Fixture::load(path) {
            Ok(f) => fixture::run(&f).await,
            Err(err) => Err(err),
        };
        let outcomes = match outcomes {
            Ok(o) => o,
            Err(err) => {
                all_passed = false;
                println!("[FAIL] {}: {}", path.display(), err);
                continue;
            }
        };

        for outcome in outcomes {
            total += 1;
            if outcome.passed() {
                passed += 1;
                println!(
                    "[PASS] {}: matching={}, hash={}",
                    outcome.name,
                    outcome.final_matching.len(),
                    outcome.hash
                );
            } else {
                all_passed = false;
                println!("[FAIL] {}:", outcome.name);
                for failure in &outcome.failures {
                    println!("  {}", failure);
                }
            }
        }
    }

    println!("\n===========================================");
    println!("Results: {}/{} passed", passed, total);
    if all_passed {
        println!("[OK] All fixture checks PASSED.");
    } else {
        println!("[FAIL] Some checks failed.");
        std::process::exit(1);
    }
}
