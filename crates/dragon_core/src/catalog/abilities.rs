//! Ability definitions: permanent stat upgrades and battle actives.

use serde::{Deserialize, Serialize};

use super::Rarity;

/// Stat increase granted per level of a permanent upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatBonus {
    /// Added attack.
    #[serde(default)]
    pub attack: u32,
    /// Added maximum health.
    #[serde(default)]
    pub max_health: u32,
    /// Added armor.
    #[serde(default)]
    pub armor: u32,
}

/// What an active ability does when used in battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActiveEffect {
    /// Enemies may skip their move while the effect lasts.
    Slow {
        /// Turns the slow lasts.
        slow_duration: u32,
    },
    /// The next qualifying enemy contact is multiplied.
    DoubleDamage {
        /// Damage multiplier.
        multiplier: u32,
    },
    /// Heals a share of maximum health now and on each tick.
    HealingAura {
        /// Percent of maximum health restored per heal.
        heal_percent: u32,
        /// Turns the aura lasts.
        duration: u32,
    },
}

/// Permanent upgrade or battle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityKind {
    /// Applies its bonus once per owned level at game start.
    Permanent(StatBonus),
    /// Usable in battle, then locked for `cooldown` turns.
    Active {
        /// Turns before reuse.
        cooldown: u32,
        /// Effect when used.
        effect: ActiveEffect,
    },
}

/// Data-driven ability definition.
///
/// # Example RON
///
/// ```ron
/// AbilityDef(
///     id: "double_strike",
///     name: "Двойной Удар",
///     icon: "⚡",
///     rarity: Rare,
///     price: 1200,
///     max_level: 2,
///     kind: Active(cooldown: 5, effect: DoubleDamage(multiplier: 2)),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityDef {
    /// Stable identifier, also the persistence key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Display icon.
    pub icon: String,
    /// Rarity tier.
    #[serde(default)]
    pub rarity: Rarity,
    /// Base price; level `n + 1` costs `price × (n + 1)`.
    pub price: u64,
    /// Highest purchasable level.
    pub max_level: u32,
    /// Behavior.
    pub kind: AbilityKind,
}

impl AbilityDef {
    /// Cooldown and effect if this is an active ability.
    #[must_use]
    pub fn active(&self) -> Option<(u32, ActiveEffect)> {
        match self.kind {
            AbilityKind::Active { cooldown, effect } => Some((cooldown, effect)),
            AbilityKind::Permanent(_) => None,
        }
    }
}

/// The built-in ability shop.
#[must_use]
pub fn standard_abilities() -> Vec<AbilityDef> {
    let def = |id: &str, name: &str, icon: &str, rarity, price, max_level, kind| AbilityDef {
        id: id.to_string(),
        name: name.to_string(),
        icon: icon.to_string(),
        rarity,
        price,
        max_level,
        kind,
    };

    vec![
        def(
            "damage_boost",
            "Усиление Атаки",
            "⚔️",
            Rarity::Common,
            200,
            10,
            AbilityKind::Permanent(StatBonus {
                attack: 5,
                ..StatBonus::default()
            }),
        ),
        def(
            "health_boost",
            "Усиление Здоровья",
            "❤️",
            Rarity::Common,
            250,
            10,
            AbilityKind::Permanent(StatBonus {
                max_health: 20,
                ..StatBonus::default()
            }),
        ),
        def(
            "shield_boost",
            "Энергетический Щит",
            "🛡️",
            Rarity::Common,
            300,
            8,
            AbilityKind::Permanent(StatBonus {
                armor: 5,
                ..StatBonus::default()
            }),
        ),
        def(
            "time_slow",
            "Замедление Времени",
            "⏰",
            Rarity::Rare,
            800,
            3,
            AbilityKind::Active {
                cooldown: 8,
                effect: ActiveEffect::Slow { slow_duration: 3 },
            },
        ),
        def(
            "double_strike",
            "Двойной Удар",
            "⚡",
            Rarity::Rare,
            1200,
            2,
            AbilityKind::Active {
                cooldown: 5,
                effect: ActiveEffect::DoubleDamage { multiplier: 2 },
            },
        ),
        def(
            "healing_aura",
            "Аура Исцеления",
            "💫",
            Rarity::Epic,
            2000,
            1,
            AbilityKind::Active {
                cooldown: 10,
                effect: ActiveEffect::HealingAura {
                    heal_percent: 15,
                    duration: 5,
                },
            },
        ),
    ]
}
