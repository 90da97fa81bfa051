//! Batch bot runs for balance testing.
//!
//! Plays many seeds in parallel using rayon. Every game is recorded as a
//! replay, so any interesting seed can be reproduced exactly.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use dragon_core::catalog::Catalog;
use dragon_core::error::GameError;
use dragon_core::field_generation::field_size_for_viewport;
use dragon_core::player::Loadout;
use dragon_core::replay::{Command, Replay, ReplayRecorder};
use dragon_core::rewards::compute_reward;
use dragon_core::session::AbilityProgress;
use dragon_core::simulation::GamePhase;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{HeadlessError, Result};
use crate::metrics::{BatchSummary, GameMetrics};
use crate::strategies::Strategy;

/// Mixed into the game seed to seed the bot's own rolls.
const BOT_SEED_SALT: u64 = 0x5EED_B07;

/// Commands a single game may issue before it is cut off.
pub const DEFAULT_MAX_COMMANDS: u32 = 500;

/// Configuration for a batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Difficulty preset id
    pub difficulty: String,
    /// Number of games to run
    pub game_count: u32,
    /// Maximum parallel games (0 = use rayon default)
    pub parallel_games: u32,
    /// Starting seed; game `i` uses `seed_start + i`
    pub seed_start: u64,
    /// Viewport width used to size the field
    pub viewport_width: u32,
    /// Bot strategy
    pub strategy: Strategy,
    /// Owned ability levels the bot starts with
    #[serde(default)]
    pub abilities: AbilityProgress,
    /// Cut-off for games that stop making progress
    pub max_commands: u32,
    /// Write one replay file per game here
    #[serde(default)]
    pub replay_dir: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            difficulty: "novice".to_string(),
            game_count: 100,
            parallel_games: 0,
            seed_start: 0,
            viewport_width: 1920,
            strategy: Strategy::Greedy,
            abilities: AbilityProgress::new(),
            max_commands: DEFAULT_MAX_COMMANDS,
            replay_dir: None,
        }
    }
}

impl BatchConfig {
    /// Create config for a difficulty
    pub fn new(difficulty: &str, game_count: u32) -> Self {
        Self {
            difficulty: difficulty.to_string(),
            game_count,
            ..Default::default()
        }
    }

    /// Set seed start
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set strategy
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set viewport width
    pub fn with_viewport(mut self, width: u32) -> Self {
        self.viewport_width = width;
        self
    }

    /// Set owned abilities
    pub fn with_abilities(mut self, abilities: AbilityProgress) -> Self {
        self.abilities = abilities;
        self
    }

    /// Set replay output directory
    pub fn with_replay_dir(mut self, dir: PathBuf) -> Self {
        self.replay_dir = Some(dir);
        self
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual game metrics, in seed order
    pub games: Vec<GameMetrics>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Error during batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    /// Game index
    pub game_index: u32,
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Resolved per-game parameters shared by every game of a batch.
#[derive(Debug, Clone)]
pub struct GameSetup {
    /// Difficulty preset id
    pub difficulty: String,
    /// Field edge length
    pub field_size: usize,
    /// Starting loadout
    pub loadout: Loadout,
    /// Bot strategy
    pub strategy: Strategy,
    /// Command cut-off
    pub max_commands: u32,
}

impl GameSetup {
    /// Resolve the field size and loadout for `config`.
    ///
    /// # Errors
    ///
    /// `UnknownDifficulty` when the preset does not exist.
    pub fn resolve(catalog: &Catalog, config: &BatchConfig) -> Result<Self> {
        let preset = catalog.difficulty(&config.difficulty).ok_or_else(|| {
            GameError::UnknownDifficulty(config.difficulty.clone())
        })?;
        Ok(Self {
            difficulty: config.difficulty.clone(),
            field_size: field_size_for_viewport(config.viewport_width, preset),
            loadout: Loadout::from_progress(catalog, &config.abilities),
            strategy: config.strategy,
            max_commands: config.max_commands,
        })
    }
}

/// Play one seed to the end with a bot.
///
/// # Errors
///
/// Returns an error if the game cannot start, a command is rejected, or
/// the game has not finished after `max_commands` commands.
pub fn play_game(catalog: &Catalog, setup: &GameSetup, seed: u64) -> Result<(GameMetrics, Replay)> {
    let mut recorder = ReplayRecorder::start(
        catalog.clone(),
        &setup.difficulty,
        setup.field_size,
        seed,
        setup.loadout.clone(),
    )?;
    let mut bot_rng = Pcg64Mcg::seed_from_u64(seed ^ BOT_SEED_SALT);
    let mut commands = 0u32;
    let mut abilities_used = 0u32;

    while recorder.is_playing() && commands < setup.max_commands {
        let Some(command) = setup.strategy.decide(recorder.simulator(), &mut bot_rng) else {
            debug!(seed, "Bot has no legal move");
            break;
        };
        if matches!(command, Command::Ability(_)) {
            abilities_used += 1;
        }
        recorder.apply(command)?;
        commands += 1;
    }

    let (replay, sim) = recorder.finish();
    let (Some(outcome), Some(preset), Some(player)) = (sim.outcome(), sim.preset(), sim.player())
    else {
        return Err(HeadlessError::Game(
            GameError::InvalidPhase {
                expected: GamePhase::Finished,
                actual: sim.phase(),
            },
        ));
    };

    let metrics = GameMetrics {
        seed,
        strategy: setup.strategy,
        outcome,
        reward: compute_reward(preset, &outcome),
        commands,
        abilities_used,
        final_health: player.health,
        final_state_hash: sim.state_hash(),
    };
    Ok((metrics, replay))
}

/// Run a batch of games
///
/// # Errors
///
/// Fails up front on an unknown difficulty or when the thread pool
/// cannot be built. Individual game failures land in
/// [`BatchResults::errors`].
pub fn run_batch(catalog: &Catalog, config: BatchConfig) -> Result<BatchResults> {
    let start = Instant::now();
    let setup = GameSetup::resolve(catalog, &config)?;
    let completed = AtomicU32::new(0);

    info!(
        difficulty = %config.difficulty,
        games = config.game_count,
        strategy = %config.strategy,
        field_size = setup.field_size,
        "Starting batch run"
    );

    let mut builder = rayon::ThreadPoolBuilder::new();
    if config.parallel_games > 0 {
        builder = builder.num_threads(config.parallel_games as usize);
    }
    let pool = builder
        .build()
        .map_err(|e| HeadlessError::ThreadPool(e.to_string()))?;

    let results: Vec<std::result::Result<(GameMetrics, Replay), BatchError>> = pool.install(|| {
        (0..config.game_count)
            .into_par_iter()
            .map(|i| {
                let seed = config.seed_start.wrapping_add(u64::from(i));
                let result = play_game(catalog, &setup, seed).map_err(|e| {
                    warn!(game = i, seed, error = %e, "Game failed");
                    BatchError {
                        game_index: i,
                        seed,
                        message: e.to_string(),
                    }
                });
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % 100 == 0 {
                    debug!("Progress: {}/{}", done, config.game_count);
                }
                result
            })
            .collect()
    });

    let mut games = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok((metrics, replay)) => {
                if let Some(dir) = &config.replay_dir {
                    let path = dir.join(format!("seed_{}.replay", metrics.seed));
                    std::fs::create_dir_all(dir).map_err(|e| HeadlessError::io(dir, e))?;
                    replay.save(&path)?;
                }
                games.push(metrics);
            }
            Err(e) => errors.push(e),
        }
    }

    let summary = BatchSummary::from_games(&games);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} games in {:.1}s ({:.1} games/sec)",
        games.len(),
        duration_seconds,
        games.len() as f64 / duration_seconds.max(f64::EPSILON)
    );

    Ok(BatchResults {
        config,
        games,
        summary,
        duration_seconds,
        errors,
    })
}

/// Outcome of replaying one seed several times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Seed checked
    pub seed: u64,
    /// Final state hash of every run
    pub hashes: Vec<u64>,
    /// Whether every run agreed
    pub deterministic: bool,
}

/// Verify determinism by running the same seed several times in parallel
///
/// # Errors
///
/// Propagates the first game failure.
pub fn verify_determinism(catalog: &Catalog, config: &BatchConfig, runs: u32) -> Result<VerifyReport> {
    let setup = GameSetup::resolve(catalog, config)?;
    let seed = config.seed_start;
    let hashes = (0..runs.max(1))
        .into_par_iter()
        .map(|_| play_game(catalog, &setup, seed).map(|(metrics, _)| metrics.final_state_hash))
        .collect::<Result<Vec<u64>>>()?;
    let deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    if !deterministic {
        warn!(seed, ?hashes, "Runs diverged");
    }
    Ok(VerifyReport {
        seed,
        hashes,
        deterministic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::new("legend", 500)
            .with_seed(12345)
            .with_strategy(Strategy::Cautious)
            .with_viewport(500);

        assert_eq!(config.difficulty, "legend");
        assert_eq!(config.game_count, 500);
        assert_eq!(config.seed_start, 12345);
        assert_eq!(config.strategy, Strategy::Cautious);
        assert_eq!(config.viewport_width, 500);
    }

    #[test]
    fn test_setup_sizes_field_for_viewport() {
        let catalog = Catalog::standard();
        let setup =
            GameSetup::resolve(&catalog, &BatchConfig::new("legend", 1).with_viewport(500))
                .unwrap();
        assert_eq!(setup.field_size, 10);
        assert!(GameSetup::resolve(&catalog, &BatchConfig::new("nightmare", 1)).is_err());
    }

    #[test]
    fn test_every_strategy_finishes() {
        let catalog = Catalog::standard();
        for strategy in Strategy::ALL {
            let config = BatchConfig::new("novice", 1).with_strategy(strategy);
            let setup = GameSetup::resolve(&catalog, &config).unwrap();
            let (metrics, replay) = play_game(&catalog, &setup, 21).unwrap();
            assert!(metrics.commands > 0);
            assert!(metrics.outcome.turns_elapsed > 0);
            assert_eq!(replay.final_hash, metrics.final_state_hash);
            assert!(replay.verify(catalog.clone()).unwrap());
        }
    }

    #[test]
    fn test_run_batch_small() {
        let catalog = Catalog::standard();
        let config = BatchConfig::new("veteran", 8).with_seed(100);
        let results = run_batch(&catalog, config).unwrap();

        assert_eq!(results.games.len() + results.errors.len(), 8);
        assert!(results.errors.is_empty());
        let seeds: Vec<u64> = results.games.iter().map(|g| g.seed).collect();
        assert_eq!(seeds, (100..108).collect::<Vec<_>>());
        assert_eq!(results.summary.total_games, 8);
    }

    #[test]
    fn test_unknown_difficulty_fails_up_front() {
        let catalog = Catalog::standard();
        assert!(run_batch(&catalog, BatchConfig::new("nightmare", 4)).is_err());
    }

    #[test]
    fn test_verify_determinism() {
        let catalog = Catalog::standard();
        let config = BatchConfig::new("legend", 1)
            .with_seed(12345)
            .with_strategy(Strategy::Random);
        let report = verify_determinism(&catalog, &config, 4).unwrap();
        assert!(report.deterministic);
        assert_eq!(report.hashes.len(), 4);
    }

    #[test]
    fn test_batch_results_save_load_with_replays() {
        let catalog = Catalog::standard();
        let dir = tempfile::tempdir().unwrap();
        let config = BatchConfig::new("novice", 3).with_replay_dir(dir.path().join("replays"));
        let results = run_batch(&catalog, config).unwrap();

        let path = dir.path().join("results.json");
        results.save(&path).unwrap();
        let loaded = BatchResults::load(&path).unwrap();
        assert_eq!(loaded.games, results.games);
        assert_eq!(loaded.config.difficulty, "novice");

        let replay = Replay::load(dir.path().join("replays").join("seed_1.replay")).unwrap();
        assert!(replay.verify(catalog).unwrap());
    }
}
