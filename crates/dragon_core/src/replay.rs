//! Recording and playing back games.
//!
//! A replay stores what is needed to start the game again (difficulty,
//! field size, seed and loadout) plus the player's command stream. Since
//! the simulator is deterministic, re-running the commands reproduces the
//! game exactly; the stored final hash confirms it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{GameError, Result};
use crate::math::Position;
use crate::player::Loadout;
use crate::simulation::{BattleSimulator, GamePhase};

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// A player input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Move (or inspect) via [`BattleSimulator::step`].
    Move(Position),
    /// Activate an ability by id.
    Ability(String),
}

impl Command {
    /// Apply to a simulator.
    ///
    /// # Errors
    ///
    /// Whatever the simulator rejects.
    pub fn apply(&self, sim: &mut BattleSimulator) -> Result<()> {
        match self {
            Command::Move(target) => sim.step(*target).map(|_| ()),
            Command::Ability(id) => sim.use_ability(id).map(|_| ()),
        }
    }
}

/// Complete replay data structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Difficulty preset id.
    pub difficulty_id: String,
    /// Field edge length.
    pub field_size: usize,
    /// Seed for field generation and every later roll.
    pub seed: u64,
    /// Loadout the game started with.
    pub loadout: Loadout,
    /// Commands in the order they were issued.
    pub commands: Vec<Command>,
    /// Turn counter when recording stopped.
    pub final_turn: u32,
    /// State hash when recording stopped.
    pub final_hash: u64,
}

impl Replay {
    /// An empty replay for a game started with these parameters.
    #[must_use]
    pub fn new(difficulty_id: impl Into<String>, field_size: usize, seed: u64, loadout: Loadout) -> Self {
        Self {
            version: REPLAY_VERSION,
            difficulty_id: difficulty_id.into(),
            field_size,
            seed,
            loadout,
            commands: Vec::new(),
            final_turn: 0,
            final_hash: 0,
        }
    }

    /// Record a command.
    pub fn record(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Store the end state to verify against.
    pub fn finalize(&mut self, sim: &BattleSimulator) {
        self.final_turn = sim.turn();
        self.final_hash = sim.state_hash();
    }

    /// A simulator at the start of the recorded game.
    ///
    /// # Errors
    ///
    /// Any start error from the simulator.
    pub fn start(&self, catalog: Catalog) -> Result<BattleSimulator> {
        let mut sim = BattleSimulator::new(catalog);
        sim.start(
            &self.difficulty_id,
            self.field_size,
            self.seed,
            self.loadout.clone(),
        )?;
        Ok(sim)
    }

    /// Re-run every command and return the final simulator.
    ///
    /// # Errors
    ///
    /// Returns an error if the game cannot start or a recorded command is
    /// rejected, which means the replay diverged.
    pub fn play(&self, catalog: Catalog) -> Result<BattleSimulator> {
        let mut player = ReplayPlayer::new(self.clone(), catalog)?;
        while player.advance()? {}
        Ok(player.simulator)
    }

    /// Whether re-running the commands reproduces the recorded end state.
    ///
    /// # Errors
    ///
    /// See [`play`](Self::play).
    pub fn verify(&self, catalog: Catalog) -> Result<bool> {
        let sim = self.play(catalog)?;
        Ok(sim.turn() == self.final_turn && sim.state_hash() == self.final_hash)
    }

    /// Save the replay to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize replay: {e}")))?;
        std::fs::write(path.as_ref(), bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to write replay file: {e}")))?;
        Ok(())
    }

    /// Load a replay from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if file reading or deserialization fails, or the
    /// file was written by a different format version.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| GameError::InvalidState(format!("Failed to read replay file: {e}")))?;
        let replay: Self = bincode::deserialize(&bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize replay: {e}")))?;

        if replay.version != REPLAY_VERSION {
            return Err(GameError::InvalidState(format!(
                "Replay version mismatch: expected {REPLAY_VERSION}, got {}",
                replay.version
            )));
        }

        Ok(replay)
    }
}

/// Steps through a replay one command at a time.
#[derive(Debug)]
pub struct ReplayPlayer {
    replay: Replay,
    catalog: Catalog,
    simulator: BattleSimulator,
    command_index: usize,
}

impl ReplayPlayer {
    /// Start the recorded game.
    ///
    /// # Errors
    ///
    /// Returns an error if the game cannot start.
    pub fn new(replay: Replay, catalog: Catalog) -> Result<Self> {
        let simulator = replay.start(catalog.clone())?;
        Ok(Self {
            replay,
            catalog,
            simulator,
            command_index: 0,
        })
    }

    /// Apply the next command. Returns whether commands remain.
    ///
    /// # Errors
    ///
    /// Returns an error if the simulator rejects the command.
    pub fn advance(&mut self) -> Result<bool> {
        if let Some(command) = self.replay.commands.get(self.command_index) {
            command.apply(&mut self.simulator)?;
            self.command_index += 1;
        }
        Ok(!self.is_finished())
    }

    /// Restart and apply the first `index` commands.
    ///
    /// # Errors
    ///
    /// Returns an error if restarting or a command fails.
    pub fn seek(&mut self, index: usize) -> Result<()> {
        self.simulator = self.replay.start(self.catalog.clone())?;
        self.command_index = 0;
        while self.command_index < index.min(self.replay.commands.len()) {
            self.advance()?;
        }
        Ok(())
    }

    /// Commands applied so far.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.command_index
    }

    /// Whether every command has been applied.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.command_index >= self.replay.commands.len()
    }

    /// The simulator at the current position.
    #[must_use]
    pub const fn simulator(&self) -> &BattleSimulator {
        &self.simulator
    }

    /// The replay being played.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }
}

/// Records commands while forwarding them to a live simulator.
#[derive(Debug)]
pub struct ReplayRecorder {
    replay: Replay,
    simulator: BattleSimulator,
}

impl ReplayRecorder {
    /// Start a game and begin recording.
    ///
    /// # Errors
    ///
    /// Any start error from the simulator.
    pub fn start(
        catalog: Catalog,
        difficulty_id: &str,
        field_size: usize,
        seed: u64,
        loadout: Loadout,
    ) -> Result<Self> {
        let replay = Replay::new(difficulty_id, field_size, seed, loadout);
        let simulator = replay.start(catalog)?;
        Ok(Self { replay, simulator })
    }

    /// Apply a command; it is recorded only if the simulator accepts it.
    ///
    /// # Errors
    ///
    /// Whatever the simulator rejects.
    pub fn apply(&mut self, command: Command) -> Result<()> {
        command.apply(&mut self.simulator)?;
        self.replay.record(command);
        Ok(())
    }

    /// Whether the recorded game is still running.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.simulator.phase() == GamePhase::Playing
    }

    /// The live simulator.
    #[must_use]
    pub const fn simulator(&self) -> &BattleSimulator {
        &self.simulator
    }

    /// Stop recording and return the finalized replay.
    #[must_use]
    pub fn finish(mut self) -> (Replay, BattleSimulator) {
        self.replay.finalize(&self.simulator);
        (self.replay, self.simulator)
    }
}
