//! Error types for the battle simulation.

use thiserror::Error;

use crate::math::Position;
use crate::session::StoreError;
use crate::shop::PurchaseError;
use crate::simulation::GamePhase;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all simulation errors.
///
/// Invalid moves (non-adjacent targets, walls) are not errors; they are
/// reported through [`crate::simulation::MoveOutcome`].
#[derive(Debug, Error)]
pub enum GameError {
    /// Operation is not allowed in the current phase.
    #[error("Operation requires phase {expected:?}, current phase is {actual:?}")]
    InvalidPhase {
        /// Phase the operation needs.
        expected: GamePhase,
        /// Phase the simulator is in.
        actual: GamePhase,
    },

    /// The enemy turn must be resolved before the player can move again.
    #[error("Enemy turn is pending")]
    TurnPending,

    /// `resolve_enemy_turn` was called without a preceding player move.
    #[error("No enemy turn is pending")]
    NoPendingTurn,

    /// The turn budget is exhausted.
    #[error("No turns left")]
    NoTurnsLeft,

    /// Target cell is outside the grid.
    #[error("Position {0} is outside the grid")]
    OutOfBounds(Position),

    /// Ability id is not in the catalog.
    #[error("Unknown ability: {0}")]
    UnknownAbility(String),

    /// Ability exists but is a permanent upgrade, not a battle action.
    #[error("Ability '{0}' cannot be activated")]
    AbilityNotActive(String),

    /// Ability exists but the player has not unlocked it.
    #[error("Ability '{0}' is locked")]
    AbilityLocked(String),

    /// Ability is still cooling down.
    #[error("Ability '{id}' is on cooldown for {remaining} more turns")]
    AbilityOnCooldown {
        /// Ability id.
        id: String,
        /// Turns until the ability can be used again.
        remaining: u32,
    },

    /// Difficulty id is not in the catalog.
    #[error("Unknown difficulty: {0}")]
    UnknownDifficulty(String),

    /// Difficulty preset failed validation.
    #[error("Invalid difficulty preset '{id}': {reason}")]
    InvalidPreset {
        /// Preset id.
        id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Field construction produced an unusable grid.
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    /// Catalog data failed to parse or validate.
    #[error("Failed to load catalog '{path}': {message}")]
    CatalogLoad {
        /// Source of the catalog.
        path: String,
        /// Error message.
        message: String,
    },

    /// Persistence shell failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Ability shop failure.
    #[error(transparent)]
    Purchase(#[from] PurchaseError),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}
