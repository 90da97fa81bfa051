//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the battle simulator
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Replays and balance batches only mean something if a seed fully
//! determines a game. Sources of non-determinism include:
//!
//! - **Floating-point math**: score uses fixed-point via
//!   [`dragon_core::math::Fixed`]. Field generation compares one `f64`
//!   sample against fixed thresholds, which is exact for a given seed.
//!
//! - **HashMap iteration order**: cooldowns and ability levels live in
//!   `BTreeMap`s; grid scans are row-major.
//!
//! - **System randomness**: every roll comes from the simulator's seeded
//!   PCG stream.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual rules (spawning, pathing, effects)
//! 2. **Property tests**: random command streams still reproduce
//! 3. **Integration tests**: full games are reproducible and replayable
//! 4. **Parallel tests**: running N games on threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use dragon_core::error::Result;
use dragon_core::math::Direction;
use dragon_core::simulation::{BattleSimulator, GamePhase, StepReport};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of steps applied per run.
    pub steps: usize,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the runs matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Battle is non-deterministic!\n\
                 Runs: {}\n\
                 Steps: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.steps,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a setup/step loop multiple times and compare final hashes.
///
/// # Example
///
/// ```
/// use dragon_test_utils::determinism::{verify_determinism, walk};
/// use dragon_test_utils::fixtures::generated_sim;
/// use dragon_core::math::Direction;
///
/// let result = verify_determinism(
///     3,
///     10,
///     || generated_sim("novice", 10, 42),
///     |sim, i| { let _ = walk(sim, Direction::ALL[i % 4]); },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    steps: usize,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S, usize),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for i in 0..steps {
            step(&mut state, i);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        steps,
    }
}

/// Step the player one cell in `direction`.
///
/// Returns `Ok(None)` without touching the simulator when the game is
/// not running or the step would leave the grid.
///
/// # Errors
///
/// Whatever [`BattleSimulator::step`] rejects.
pub fn walk(sim: &mut BattleSimulator, direction: Direction) -> Result<Option<StepReport>> {
    if sim.phase() != GamePhase::Playing {
        return Ok(None);
    }
    let (Some(pos), Some(size)) = (sim.player_position(), sim.grid().map(|g| g.size())) else {
        return Ok(None);
    };
    match pos.step(direction, size) {
        Some(target) => sim.step(target).map(Some),
        None => Ok(None),
    }
}

/// Walk `directions` in order, stopping early when the game ends.
///
/// # Errors
///
/// Whatever [`BattleSimulator::step`] rejects.
pub fn walk_all(sim: &mut BattleSimulator, directions: &[Direction]) -> Result<()> {
    for &direction in directions {
        if sim.phase() != GamePhase::Playing {
            break;
        }
        walk(sim, direction)?;
    }
    Ok(())
}

/// Play the same walk on two fresh simulators and return the index of
/// the first step after which their hashes differ.
///
/// `None` means the two runs stayed identical.
pub fn find_first_divergence<F>(setup_fn: F, directions: &[Direction]) -> Option<usize>
where
    F: Fn() -> BattleSimulator,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for (i, &direction) in directions.iter().enumerate() {
        let a = walk(&mut sim1, direction).is_ok();
        let b = walk(&mut sim2, direction).is_ok();

        if a != b || sim1.state_hash() != sim2.state_hash() {
            return Some(i + 1);
        }
    }

    None
}

/// Verify that a snapshot round-trip preserves the game exactly,
/// including the RNG position: the restored copy must stay in lockstep
/// with the original for the rest of the walk.
pub fn verify_snapshot_determinism<F>(setup_fn: F, directions: &[Direction]) -> bool
where
    F: Fn() -> BattleSimulator,
{
    let mut sim = setup_fn();
    let (before, after) = directions.split_at(directions.len() / 2);
    if walk_all(&mut sim, before).is_err() {
        return false;
    }

    let Ok(bytes) = sim.snapshot() else {
        return false;
    };
    let Ok(mut restored) = BattleSimulator::restore(&bytes) else {
        return false;
    };
    if restored.state_hash() != sim.state_hash() {
        return false;
    }

    let original = walk_all(&mut sim, after).is_ok();
    let copy = walk_all(&mut restored, after).is_ok();
    original == copy && sim.state_hash() == restored.state_hash()
}

/// Run `num_games` copies of the same walk on scoped threads and collect
/// the final hashes.
pub fn run_parallel_games<F>(setup_fn: F, directions: &[Direction], num_games: usize) -> Vec<u64>
where
    F: Fn() -> BattleSimulator + Sync,
{
    thread::scope(|s| {
        let handles: Vec<_> = (0..num_games)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    let _ = walk_all(&mut sim, directions);
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_default())
            .collect()
    })
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of the simulator.
pub mod strategies {
    use dragon_core::catalog::FIELD_SIZES;
    use dragon_core::math::Direction;
    use proptest::prelude::*;

    /// Any generator seed.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }

    /// One of the built-in difficulty ids.
    pub fn arb_difficulty_id() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec!["novice", "warrior", "veteran", "legend"])
    }

    /// A supported field edge length.
    pub fn arb_field_size() -> impl Strategy<Value = usize> {
        prop::sample::select(FIELD_SIZES.to_vec())
    }

    /// A step direction.
    pub fn arb_direction() -> impl Strategy<Value = Direction> {
        prop::sample::select(Direction::ALL.to_vec())
    }

    /// A walk of up to `max_len` steps.
    pub fn arb_walk(max_len: usize) -> impl Strategy<Value = Vec<Direction>> {
        prop::collection::vec(arb_direction(), 0..=max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{generated_sim, sim_with_layout, OPEN_10};

    const WALK: [Direction; 8] = [
        Direction::Up,
        Direction::Up,
        Direction::Left,
        Direction::Down,
        Direction::Right,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    #[test]
    fn test_verify_determinism_generated_game() {
        let result = verify_determinism(
            3,
            20,
            || generated_sim("veteran", 14, 99),
            |sim, i| {
                let _ = walk(sim, WALK[i % WALK.len()]);
            },
            |sim| sim.state_hash(),
        );
        result.assert_deterministic();
        assert_eq!(result.unique_hashes().len(), 1);
    }

    #[test]
    fn test_no_divergence() {
        assert_eq!(
            find_first_divergence(|| generated_sim("legend", 16, 5), &WALK),
            None
        );
    }

    #[test]
    fn test_snapshot_keeps_lockstep() {
        assert!(verify_snapshot_determinism(
            || generated_sim("warrior", 12, 21),
            &WALK
        ));
    }

    #[test]
    fn test_parallel_games_match() {
        let hashes = run_parallel_games(|| generated_sim("novice", 10, 8), &WALK, 4);
        assert_eq!(hashes.len(), 4);
        assert!(hashes.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_walk_off_grid_is_noop() {
        let rows: Vec<&str> = OPEN_10.to_vec();
        let mut sim = sim_with_layout(&rows);
        for _ in 0..5 {
            walk(&mut sim, Direction::Up).unwrap();
        }
        let before = sim.state_hash();
        assert!(walk(&mut sim, Direction::Up).unwrap().is_none());
        assert_eq!(sim.state_hash(), before);
    }

    #[test]
    fn test_compute_hash_stable() {
        assert_eq!(compute_hash(&(1u32, "a")), compute_hash(&(1u32, "a")));
    }
}
