//! # Dragon Core
//!
//! Deterministic simulation core for the Hyper Dragon grid battle.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO beyond explicit save/load helpers
//! - No system randomness (every roll comes from a seeded PCG stream)
//! - No floating-point score math (uses fixed-point)
//!
//! This separation enables:
//! - Headless bot runs and balance batches
//! - Replay files that reproduce a game bit-for-bit
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`catalog`] - Tile, difficulty and ability tables
//! - [`grid`] - The battle field and ASCII layouts
//! - [`field_generation`] - Procedural field generation
//! - [`simulation`] - The turn state machine
//! - [`enemy_ai`] - Spawner and enemy behavior
//! - [`rewards`] - Coin payout for finished games
//! - [`session`] - Persistence contract, ability shop and game sessions
//! - [`replay`] - Recorded command streams

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod catalog;
pub mod effects;
pub mod enemy_ai;
pub mod error;
pub mod field_generation;
pub mod grid;
pub mod math;
pub mod player;
pub mod replay;
pub mod rewards;
pub mod session;
pub mod shop;
pub mod simulation;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::catalog::{
        AbilityDef, AbilityKind, ActiveEffect, Catalog, DifficultyPreset, Rarity, StatBonus,
        TileKind, TileType,
    };
    pub use crate::effects::{Cooldowns, EffectKind, StatusEffect};
    pub use crate::error::{GameError, Result};
    pub use crate::field_generation::{field_size_for_viewport, generate_field, GeneratedField};
    pub use crate::grid::Grid;
    pub use crate::math::{Direction, Fixed, Position};
    pub use crate::player::{BaseStats, Loadout, PlayerState};
    pub use crate::rewards::compute_reward;
    pub use crate::session::{
        AbilityLevel, AbilityProgress, BattleSummary, GameSession, MemoryStore, ProgressStore,
        PurchaseRecord,
    };
    pub use crate::simulation::{
        BattleSimulator, EnemyTurnReport, GameOutcome, GamePhase, MoveOutcome, StepReport,
    };
}
