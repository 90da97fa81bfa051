//! Player stats and the ability loadout a game starts with.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{AbilityKind, Catalog};
use crate::effects::ActiveEffects;
use crate::math::{fixed_serde, Fixed};
use crate::session::AbilityProgress;

/// Starting stats before a game begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BaseStats {
    /// Maximum (and starting) health.
    pub max_health: u32,
    /// Flat damage reduction.
    pub armor: u32,
    /// Attack rating.
    pub attack: u32,
}

impl Default for BaseStats {
    fn default() -> Self {
        Self {
            max_health: 100,
            armor: 0,
            attack: 10,
        }
    }
}

/// Stats plus owned ability levels, derived from persisted progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Loadout {
    /// Stats after permanent upgrades.
    pub stats: BaseStats,
    /// Owned level per ability id.
    pub levels: BTreeMap<String, u32>,
}

impl Loadout {
    /// Apply every owned permanent upgrade to the default stats.
    ///
    /// Levels above the catalog's `max_level` are clamped; ids the
    /// catalog does not know are dropped.
    #[must_use]
    pub fn from_progress(catalog: &Catalog, progress: &AbilityProgress) -> Self {
        let mut loadout = Self::default();
        for (id, owned) in progress {
            let Some(def) = catalog.ability(id) else {
                tracing::debug!(ability = %id, "Ignoring unknown ability in saved progress");
                continue;
            };
            let level = owned.level.min(def.max_level);
            if level == 0 {
                continue;
            }
            if let AbilityKind::Permanent(bonus) = def.kind {
                loadout.stats.attack += bonus.attack * level;
                loadout.stats.max_health += bonus.max_health * level;
                loadout.stats.armor += bonus.armor * level;
            }
            loadout.levels.insert(id.clone(), level);
        }
        loadout
    }

    /// Builder-style override of the starting stats.
    #[must_use]
    pub fn with_stats(mut self, stats: BaseStats) -> Self {
        self.stats = stats;
        self
    }

    /// Builder-style grant of an ability level.
    #[must_use]
    pub fn with_ability(mut self, id: &str, level: u32) -> Self {
        self.levels.insert(id.to_string(), level);
        self
    }

    /// Owned level of `id` (0 if not owned).
    #[must_use]
    pub fn level(&self, id: &str) -> u32 {
        self.levels.get(id).copied().unwrap_or(0)
    }
}

/// Mutable per-game player state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerState {
    /// Current health, always within `0..=max_health`.
    pub health: u32,
    /// Health cap.
    pub max_health: u32,
    /// Flat damage reduction.
    pub armor: u32,
    /// Attack rating.
    pub attack: u32,
    /// Moves remaining.
    pub turns_left: u32,
    /// Turn budget the game started with.
    pub total_turns: u32,
    /// Score; fractional because of combo multipliers.
    #[serde(with = "fixed_serde")]
    pub score: Fixed,
    /// Enemies and bosses defeated.
    pub kills: u32,
    /// Current streak.
    pub combo: u32,
    /// Longest streak reached this game.
    pub max_combo: u32,
    /// Active status effects.
    pub effects: ActiveEffects,
}

impl PlayerState {
    /// Fresh state at full health.
    #[must_use]
    pub fn new(stats: &BaseStats, total_turns: u32) -> Self {
        Self {
            health: stats.max_health,
            max_health: stats.max_health,
            armor: stats.armor,
            attack: stats.attack,
            turns_left: total_turns,
            total_turns,
            score: Fixed::ZERO,
            kills: 0,
            combo: 0,
            max_combo: 0,
            effects: ActiveEffects::default(),
        }
    }

    /// Whether health is above zero.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Lose up to `amount` health, flooring at zero. Returns health lost.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        let lost = amount.min(self.health);
        self.health -= lost;
        lost
    }

    /// Gain up to `amount` health, capped at `max_health`. Returns health gained.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let gained = amount.min(self.max_health.saturating_sub(self.health));
        self.health += gained;
        gained
    }

    /// Extend the streak.
    pub fn add_combo(&mut self, steps: u32) {
        self.combo += steps;
        self.max_combo = self.max_combo.max(self.combo);
    }

    /// Break the streak.
    pub fn reset_combo(&mut self) {
        self.combo = 0;
    }

    /// Score rounded down, as displayed.
    #[must_use]
    pub fn display_score(&self) -> u64 {
        self.score.saturating_to_num::<u64>()
    }
}

/// `max(floor, damage - armor)`.
#[must_use]
pub fn mitigated(damage: u32, armor: u32, floor: u32) -> u32 {
    damage.saturating_sub(armor).max(floor)
}
