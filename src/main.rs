//! sweeper-evo CLI - Run evolution from JSON configuration.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use sweeper_evo::engine::{EvolutionManager, WeightStats};
use sweeper_evo::schema::{Curriculum, Genome, RunConfig, RunSummary};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <run.json> [generations]", args[0]);
        eprintln!("       {} --curriculum [run.json]", args[0]);
        eprintln!();
        eprintln!("Evolve neural minesweeper policies from a JSON run configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  run.json     Path to run configuration file");
        eprintln!("  generations  Generation limit override");
        eprintln!();
        eprintln!("Modes:");
        eprintln!("  --curriculum   Climb the difficulty ladder, carrying the");
        eprintln!("                 champion across levels");
        eprintln!("  --example      Print an example configuration");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    if args[1] == "--curriculum" {
        let config = args
            .get(2)
            .map(|path| load_config(&PathBuf::from(path)))
            .unwrap_or_default();
        run_curriculum(config);
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let mut config = load_config(&config_path);
    if let Some(limit) = args.get(2).and_then(|s| s.parse().ok()) {
        config.max_generations = Some(limit);
    }

    println!("sweeper-evo");
    println!("===========");
    println!(
        "Board: {}x{} ({} mines)",
        config.env.rows, config.env.cols, config.env.mines
    );
    println!("Population: {}", config.population_size);
    println!("Elite capacity: {}", config.elite_size);
    println!();

    let mut manager = EvolutionManager::new(config).unwrap_or_else(|e| {
        eprintln!("Error starting run: {}", e);
        std::process::exit(1);
    });

    let summary = manager
        .run_with_callback(|report| {
            println!(
                "  Gen {}: best={:.1}, archive top={:.1}, mean={:.1}, wins={}/{}",
                report.generation,
                report.best_score,
                report.archive_top_score,
                report.mean_score,
                report.victories,
                report.evaluated
            );
        })
        .unwrap_or_else(|e| {
            eprintln!("Run failed: {}", e);
            std::process::exit(1);
        });

    print_summary(&summary);
}

fn run_curriculum(base: RunConfig) {
    let mut curriculum = Curriculum::default();
    let master = curriculum.final_level().env;

    println!("sweeper-evo curriculum");
    println!("======================");
    println!(
        "Ladder ends at {}x{} with {} mines",
        master.rows, master.cols, master.mines
    );
    println!();

    let mut carried: Option<Genome> = None;

    loop {
        let level = curriculum.level().clone();
        println!(
            "Level {}: {}x{} with {} mines ({} wins to advance)",
            level.name, level.env.rows, level.env.cols, level.env.mines, level.wins_needed
        );

        let config = RunConfig {
            env: level.env,
            // One master-sized brain for the whole ladder; smaller boards
            // play through input padding.
            policy_board: Some((master.rows, master.cols)),
            ..base.clone()
        };

        let mut manager = EvolutionManager::new(config).unwrap_or_else(|e| {
            eprintln!("Error starting level: {}", e);
            std::process::exit(1);
        });
        if let Some(genome) = carried.take() {
            manager = manager.with_initial_genome(genome).unwrap_or_else(|e| {
                eprintln!("Champion does not fit the master topology: {}", e);
                std::process::exit(1);
            });
        }

        let stop = manager.stop_handle();
        let mut wins = 0u32;
        let summary = manager
            .run_with_callback(|report| {
                wins += report.victories as u32;
                println!(
                    "  Gen {}: archive top={:.1}, wins so far={}/{}",
                    report.generation, report.archive_top_score, wins, level.wins_needed
                );
                if wins >= level.wins_needed {
                    stop.store(true, Ordering::Relaxed);
                }
            })
            .unwrap_or_else(|e| {
                eprintln!("Level failed: {}", e);
                std::process::exit(1);
            });

        carried = summary.champion.clone();
        print_summary(&summary);

        if curriculum.is_final() {
            println!("Curriculum complete: {}", curriculum.progress());
            break;
        }
        for _ in 0..wins.min(level.wins_needed) {
            if curriculum.record_win() {
                break;
            }
        }
        if curriculum.level().name == level.name {
            // Not enough wins to advance; the run stopped for another
            // reason, so stop climbing.
            println!("Stopping ladder at {}", curriculum.progress());
            break;
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("Run finished: {:?}", summary.stop_reason);
    println!("  Generations: {}", summary.generations);
    println!("  Evaluations: {}", summary.total_evaluations);
    println!("  Best score: {:.1}", summary.best_score);
    println!(
        "  Time: {:.2}s ({:.1} evals/s)",
        summary.elapsed_seconds,
        summary.total_evaluations as f64 / summary.elapsed_seconds.max(1e-9)
    );

    if let Some(champion) = &summary.champion {
        let stats = WeightStats::from_genome(champion);
        println!(
            "  Champion weights: {} values, mean {:.6}, std {:.6}, range [{:.4}, {:.4}]",
            stats.count, stats.mean, stats.std_dev, stats.min, stats.max
        );
        if stats.is_stagnant() {
            println!("  Verdict: weights stagnated, consider widening exploration");
        }
    }
    println!();
}

fn load_config(path: &PathBuf) -> RunConfig {
    let content = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });
    serde_json::from_str(&content).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    })
}

fn print_example_config() {
    let config = RunConfig {
        max_generations: Some(500),
        checkpoint_path: Some("checkpoint.json".to_string()),
        ..Default::default()
    };
    println!("Example configuration (run.json):");
    println!(
        "{}",
        serde_json::to_string_pretty(&config).expect("example config serializes")
    );
}
