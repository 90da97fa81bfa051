//! Headless Hyper Dragon runner.
//!
//! This binary runs battles without any UI, controlled via JSON on
//! stdin/stdout. Designed for bots, CI testing, and balance work.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read requests from stdin
//! cargo run -p dragon_headless -- play --difficulty warrior --seed 7
//!
//! # Run batch balance test
//! cargo run -p dragon_headless -- batch --difficulty legend --count 1000 --output results/
//!
//! # Check that a seed replays identically
//! cargo run -p dragon_headless -- verify --seed 12345 --runs 5
//!
//! # Validate a catalog before shipping it
//! cargo run -p dragon_headless -- validate --catalog assets/data/catalog.ron
//!
//! # Buy an ability with coins from a progress file
//! cargo run -p dragon_headless -- shop --store progress.json --buy health_boost
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON requests, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dragon_core::catalog::Catalog;
use dragon_core::replay::Replay;
use dragon_core::session::{GameSession, MemoryStore, ProgressStore, PurchaseRecord};
use dragon_core::shop::next_price;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dragon_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    error::{HeadlessError, Result},
    runner::{HeadlessConfig, HeadlessRunner},
    store::JsonFileStore,
    strategies::Strategy,
    validate::validate_catalog_file,
};

#[derive(Parser)]
#[command(name = "dragon_headless")]
#[command(about = "Headless Hyper Dragon runner for bots, balance batches and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// RON catalog to use instead of the built-in tables
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one session over JSON lines on stdin/stdout
    Play {
        /// Difficulty preset id
        #[arg(short, long, default_value = "novice")]
        difficulty: String,

        /// Viewport width in CSS pixels (sizes the field)
        #[arg(long, default_value = "1920")]
        viewport: u32,

        /// Seed for the first battle
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Progress file for coins and abilities (in-memory if omitted)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Resolve enemy turns automatically after each move
        #[arg(long)]
        auto_end_turn: bool,
    },

    /// Run batch of bot games for balance testing
    Batch {
        /// Difficulty preset id
        #[arg(short, long, default_value = "novice")]
        difficulty: String,

        /// Number of games to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel games (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Viewport width in CSS pixels (sizes the field)
        #[arg(long, default_value = "1920")]
        viewport: u32,

        /// Bot strategy
        #[arg(short, long, value_enum, default_value_t = Strategy::Greedy)]
        strategy: Strategy,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Write a replay file per game
        #[arg(long)]
        replays: bool,

        /// Start every game with the abilities owned in this progress file
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Verify determinism by running same seed multiple times
    Verify {
        /// Difficulty preset id
        #[arg(short, long, default_value = "novice")]
        difficulty: String,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Bot strategy
        #[arg(short, long, value_enum, default_value_t = Strategy::Random)]
        strategy: Strategy,

        /// Viewport width in CSS pixels (sizes the field)
        #[arg(long, default_value = "1920")]
        viewport: u32,
    },

    /// Replay a recorded game and check its final hash
    Replay {
        /// Replay file path
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Validate a catalog file
    Validate {
        /// Catalog to check
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List ability prices or buy the next level of one
    Shop {
        /// Progress file for coins and abilities
        #[arg(long)]
        store: PathBuf,

        /// Ability id to buy
        #[arg(long)]
        buy: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = load_catalog(cli.catalog.as_deref()).and_then(|catalog| match cli.command {
        Some(Commands::Play {
            difficulty,
            viewport,
            seed,
            store,
            auto_end_turn,
        }) => {
            let config = HeadlessConfig {
                difficulty,
                viewport_width: viewport,
                seed,
                auto_end_turn,
            };
            cmd_play(catalog, config, store)
        }
        Some(Commands::Batch {
            difficulty,
            count,
            parallel,
            seed,
            viewport,
            strategy,
            output,
            replays,
            store,
        }) => {
            let mut config = BatchConfig::new(&difficulty, count)
                .with_seed(seed)
                .with_viewport(viewport)
                .with_strategy(strategy);
            config.parallel_games = parallel;
            if replays {
                config = config.with_replay_dir(output.join("replays"));
            }
            if let Some(path) = store {
                config = config.with_abilities(JsonFileStore::new(path).load_ability_progress()?);
            }
            cmd_batch(&catalog, config, &output)
        }
        Some(Commands::Verify {
            difficulty,
            seed,
            runs,
            strategy,
            viewport,
        }) => {
            let config = BatchConfig::new(&difficulty, 1)
                .with_seed(seed)
                .with_viewport(viewport)
                .with_strategy(strategy);
            cmd_verify(&catalog, &config, runs)
        }
        Some(Commands::Replay { file }) => cmd_replay(catalog, &file),
        Some(Commands::Validate { file }) => cmd_validate(&file),
        Some(Commands::Shop { store, buy }) => cmd_shop(catalog, store, buy.as_deref()),
        None => {
            // Default: interactive mode
            cmd_play(catalog, HeadlessConfig::default(), None)
        }
    });

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    match path {
        Some(path) => {
            let catalog = Catalog::load(path)?;
            tracing::info!(path = %path.display(), "Loaded catalog");
            Ok(catalog)
        }
        None => Ok(Catalog::standard()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run a session over stdin/stdout
fn cmd_play(catalog: Catalog, config: HeadlessConfig, store: Option<PathBuf>) -> Result<ExitCode> {
    tracing::info!(difficulty = %config.difficulty, seed = config.seed, "Starting interactive session");
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();

    match store {
        Some(path) => {
            let session = GameSession::load(JsonFileStore::new(path), catalog)?;
            HeadlessRunner::new(session, config)?.run(stdin.lock(), stdout.lock())?;
        }
        None => {
            let session = GameSession::load(MemoryStore::default(), catalog)?;
            HeadlessRunner::new(session, config)?.run(stdin.lock(), stdout.lock())?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Run batch of games for balance testing
fn cmd_batch(catalog: &Catalog, config: BatchConfig, output: &Path) -> Result<ExitCode> {
    std::fs::create_dir_all(output).map_err(|e| HeadlessError::io(output, e))?;

    let results = run_batch(catalog, config)?;
    let results_path = output.join("batch_results.json");
    results
        .save(&results_path)
        .map_err(|e| HeadlessError::io(&results_path, e))?;

    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Games played: {}", summary.total_games);
    if !results.errors.is_empty() {
        eprintln!("Games failed: {}", results.errors.len());
    }
    eprintln!("Survival rate: {:.1}%", summary.survival_rate * 100.0);
    eprintln!("Average score: {:.1}", summary.avg_score);
    eprintln!("Average reward: {:.1}", summary.avg_reward);
    eprintln!("Average kills: {:.2}", summary.avg_kills);
    if let Some(seed) = summary.best_seed {
        eprintln!("Best score: {} (seed {})", summary.max_score, seed);
    }
    eprintln!("Results saved to: {}", results_path.display());

    print_json(summary)?;
    Ok(if results.errors.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Verify determinism by running the same seed several times
fn cmd_verify(catalog: &Catalog, config: &BatchConfig, runs: u32) -> Result<ExitCode> {
    tracing::info!(seed = config.seed_start, runs, "Verifying determinism");
    let report = verify_determinism(catalog, config, runs)?;
    print_json(&report)?;

    if report.deterministic {
        tracing::info!("All {} runs produced identical results", report.hashes.len());
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::error!("Determinism check failed");
        Ok(ExitCode::FAILURE)
    }
}

#[derive(Serialize)]
struct ReplayCheck {
    difficulty: String,
    seed: u64,
    commands: usize,
    final_turn: u32,
    expected_hash: u64,
    actual_hash: u64,
    matches: bool,
}

/// Replay a recorded game
fn cmd_replay(catalog: Catalog, file: &Path) -> Result<ExitCode> {
    tracing::info!(file = %file.display(), "Loading replay");
    let replay = Replay::load(file)?;
    let sim = replay.play(catalog)?;
    let actual_hash = sim.state_hash();
    let check = ReplayCheck {
        difficulty: replay.difficulty_id.clone(),
        seed: replay.seed,
        commands: replay.commands.len(),
        final_turn: sim.turn(),
        expected_hash: replay.final_hash,
        actual_hash,
        matches: actual_hash == replay.final_hash && sim.turn() == replay.final_turn,
    };
    print_json(&check)?;

    if check.matches {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::error!(
            expected = replay.final_hash,
            actual = actual_hash,
            "Replay diverged"
        );
        Ok(ExitCode::FAILURE)
    }
}

/// Validate a catalog file
fn cmd_validate(file: &Path) -> Result<ExitCode> {
    let report = validate_catalog_file(file);
    print_json(&report)?;
    Ok(if report.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[derive(Serialize)]
struct ShopEntry {
    id: String,
    name: String,
    level: u32,
    max_level: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_price: Option<u64>,
}

#[derive(Serialize)]
struct ShopListing {
    coins: u64,
    abilities: Vec<ShopEntry>,
    history: Vec<PurchaseRecord>,
}

/// List prices or buy an ability
fn cmd_shop(catalog: Catalog, store: PathBuf, buy: Option<&str>) -> Result<ExitCode> {
    let mut session = GameSession::load(JsonFileStore::new(store), catalog)?;

    if let Some(id) = buy {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let bought = session.purchase_ability(id, timestamp)?;
        tracing::info!(ability = id, price = bought.price, level = bought.new_level, "Purchased");
    }

    let abilities = session
        .simulator()
        .catalog()
        .abilities
        .iter()
        .map(|def| {
            let level = session.progress().get(&def.id).map_or(0, |owned| owned.level);
            ShopEntry {
                id: def.id.clone(),
                name: def.name.clone(),
                level,
                max_level: def.max_level,
                next_price: (level < def.max_level).then(|| next_price(def, level)),
            }
        })
        .collect();
    print_json(&ShopListing {
        coins: session.coins(),
        abilities,
        history: session.history().to_vec(),
    })?;
    Ok(ExitCode::SUCCESS)
}
