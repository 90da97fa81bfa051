//! Game sessions and the persistence contract.
//!
//! A [`GameSession`] owns the coin balance and ability progress for one
//! player. It reads both from a [`ProgressStore`] once when loaded and
//! writes back only when something changes: after a finished battle and
//! after a shop purchase. The simulator itself never touches storage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Catalog;
use crate::error::{GameError, Result};
use crate::field_generation::field_size_for_viewport;
use crate::player::Loadout;
use crate::rewards::compute_reward;
use crate::shop::{self, Purchase};
use crate::simulation::{BattleSimulator, GameOutcome, GamePhase};

/// Persistence failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A value could not be read.
    #[error("Failed to read '{key}': {message}")]
    Read {
        /// Storage key.
        key: String,
        /// Error message.
        message: String,
    },

    /// A value could not be written.
    #[error("Failed to write '{key}': {message}")]
    Write {
        /// Storage key.
        key: String,
        /// Error message.
        message: String,
    },

    /// A stored value exists but does not parse.
    #[error("Corrupt value under '{key}': {message}")]
    Corrupt {
        /// Storage key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Owned level of one ability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityLevel {
    /// Levels bought so far.
    #[serde(default)]
    pub level: u32,
}

/// Owned levels keyed by ability id.
pub type AbilityProgress = BTreeMap<String, AbilityLevel>;

/// One entry of the shop's purchase log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    /// Display name of the ability bought.
    pub ability: String,
    /// Level owned after the purchase.
    pub level: u32,
    /// Coins spent.
    pub price: u64,
    /// When it happened, as supplied by the caller.
    #[serde(default)]
    pub timestamp: String,
}

/// Durable storage for currency and ability progress.
pub trait ProgressStore {
    /// Current coin balance (0 when nothing is stored).
    fn load_currency(&self) -> std::result::Result<u64, StoreError>;

    /// Persist the coin balance.
    fn save_currency(&mut self, coins: u64) -> std::result::Result<(), StoreError>;

    /// Owned ability levels (empty when nothing is stored).
    fn load_ability_progress(&self) -> std::result::Result<AbilityProgress, StoreError>;

    /// Persist owned ability levels.
    fn save_ability_progress(
        &mut self,
        progress: &AbilityProgress,
    ) -> std::result::Result<(), StoreError>;

    /// Past purchases, oldest first (empty when nothing is stored).
    fn load_purchase_history(&self) -> std::result::Result<Vec<PurchaseRecord>, StoreError>;

    /// Persist the purchase log.
    fn save_purchase_history(
        &mut self,
        history: &[PurchaseRecord],
    ) -> std::result::Result<(), StoreError>;
}

/// In-memory store for tests and bots. Counts writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    /// Stored balance.
    pub coins: u64,
    /// Stored progress.
    pub abilities: AbilityProgress,
    /// Stored purchase log.
    pub history: Vec<PurchaseRecord>,
    /// Number of save calls received.
    pub writes: u32,
}

impl MemoryStore {
    /// A store holding `coins` and no abilities.
    #[must_use]
    pub fn with_coins(coins: u64) -> Self {
        Self {
            coins,
            ..Self::default()
        }
    }
}

impl ProgressStore for MemoryStore {
    fn load_currency(&self) -> std::result::Result<u64, StoreError> {
        Ok(self.coins)
    }

    fn save_currency(&mut self, coins: u64) -> std::result::Result<(), StoreError> {
        self.coins = coins;
        self.writes += 1;
        Ok(())
    }

    fn load_ability_progress(&self) -> std::result::Result<AbilityProgress, StoreError> {
        Ok(self.abilities.clone())
    }

    fn save_ability_progress(
        &mut self,
        progress: &AbilityProgress,
    ) -> std::result::Result<(), StoreError> {
        self.abilities = progress.clone();
        self.writes += 1;
        Ok(())
    }

    fn load_purchase_history(&self) -> std::result::Result<Vec<PurchaseRecord>, StoreError> {
        Ok(self.history.clone())
    }

    fn save_purchase_history(
        &mut self,
        history: &[PurchaseRecord],
    ) -> std::result::Result<(), StoreError> {
        self.history = history.to_vec();
        self.writes += 1;
        Ok(())
    }
}

/// What a finished battle paid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleSummary {
    /// Difficulty played.
    pub difficulty_id: String,
    /// Terminal state of the game.
    pub outcome: GameOutcome,
    /// Coins earned.
    pub reward: u64,
    /// Balance after the payout.
    pub balance: u64,
}

/// One player's progression plus the battle simulator.
#[derive(Debug)]
pub struct GameSession<S: ProgressStore> {
    store: S,
    simulator: BattleSimulator,
    coins: u64,
    progress: AbilityProgress,
    history: Vec<PurchaseRecord>,
}

impl<S: ProgressStore> GameSession<S> {
    /// Read the balance, ability progress and purchase log once.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn load(store: S, catalog: Catalog) -> Result<Self> {
        let coins = store.load_currency()?;
        let progress = store.load_ability_progress()?;
        let history = store.load_purchase_history()?;
        tracing::debug!(
            coins,
            abilities = progress.len(),
            purchases = history.len(),
            "Session loaded"
        );
        Ok(Self {
            store,
            simulator: BattleSimulator::new(catalog),
            coins,
            progress,
            history,
        })
    }

    /// Start a battle sized for `viewport_width`, with every owned
    /// upgrade applied.
    ///
    /// # Errors
    ///
    /// `UnknownDifficulty`, or any start error from the simulator.
    pub fn start_battle(&mut self, difficulty_id: &str, viewport_width: u32, seed: u64) -> Result<()> {
        let catalog = self.simulator.catalog();
        let preset = catalog
            .difficulty(difficulty_id)
            .ok_or_else(|| GameError::UnknownDifficulty(difficulty_id.to_string()))?;
        let field_size = field_size_for_viewport(viewport_width, preset);
        let loadout = Loadout::from_progress(catalog, &self.progress);
        self.simulator.start(difficulty_id, field_size, seed, loadout)
    }

    /// Pay out a finished battle, persist the new balance and return to
    /// the menu.
    ///
    /// # Errors
    ///
    /// `InvalidPhase` unless the battle is `Finished`; store errors leave
    /// the balance and the finished battle untouched.
    pub fn finish_battle(&mut self) -> Result<BattleSummary> {
        let phase = self.simulator.phase();
        let (Some(outcome), Some(preset)) = (self.simulator.outcome(), self.simulator.preset())
        else {
            return Err(GameError::InvalidPhase {
                expected: GamePhase::Finished,
                actual: phase,
            });
        };

        let reward = compute_reward(preset, &outcome);
        let balance = self.coins.saturating_add(reward);
        let difficulty_id = preset.id.clone();
        self.store.save_currency(balance)?;
        self.coins = balance;
        self.simulator.reset();

        tracing::info!(difficulty = %difficulty_id, reward, balance, "Battle paid out");
        Ok(BattleSummary {
            difficulty_id,
            outcome,
            reward,
            balance,
        })
    }

    /// Leave a running battle without payout.
    pub fn abandon_battle(&mut self) {
        self.simulator.abandon();
    }

    /// Buy the next level of an ability and persist the balance, the
    /// progress and the purchase log. `timestamp` is stored verbatim in
    /// the new [`PurchaseRecord`].
    ///
    /// # Errors
    ///
    /// `InvalidPhase` during a battle, `Purchase` when the shop refuses
    /// and `Store` when saving fails (nothing changes in that case).
    pub fn purchase_ability(&mut self, id: &str, timestamp: impl Into<String>) -> Result<Purchase> {
        if self.simulator.phase() == GamePhase::Playing {
            return Err(GameError::InvalidPhase {
                expected: GamePhase::Menu,
                actual: GamePhase::Playing,
            });
        }

        let mut coins = self.coins;
        let mut progress = self.progress.clone();
        let catalog = self.simulator.catalog();
        let bought = shop::purchase(catalog, &mut coins, &mut progress, id)?;
        let mut history = self.history.clone();
        history.push(PurchaseRecord {
            ability: catalog
                .ability(id)
                .map_or_else(|| id.to_string(), |def| def.name.clone()),
            level: bought.new_level,
            price: bought.price,
            timestamp: timestamp.into(),
        });

        self.store.save_currency(coins)?;
        self.store.save_ability_progress(&progress)?;
        self.store.save_purchase_history(&history)?;
        self.coins = coins;
        self.progress = progress;
        self.history = history;
        Ok(bought)
    }

    /// Current balance.
    #[must_use]
    pub const fn coins(&self) -> u64 {
        self.coins
    }

    /// Owned ability levels.
    #[must_use]
    pub const fn progress(&self) -> &AbilityProgress {
        &self.progress
    }

    /// Past purchases, oldest first.
    #[must_use]
    pub fn history(&self) -> &[PurchaseRecord] {
        &self.history
    }

    /// The simulator, for reading state.
    #[must_use]
    pub const fn simulator(&self) -> &BattleSimulator {
        &self.simulator
    }

    /// The simulator, for issuing moves and abilities.
    pub fn simulator_mut(&mut self) -> &mut BattleSimulator {
        &mut self.simulator
    }

    /// The backing store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Consume the session and return the store.
    #[must_use]
    pub fn into_store(self) -> S {
        self.store
    }
}
