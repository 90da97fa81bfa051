//! Timed status effects and ability cooldowns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Kind of a timed modifier on the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// Enemies may skip movement.
    Slow,
    /// The next regular enemy contact is multiplied; consumed on use.
    DoubleDamage,
    /// Heals each tick while more than one turn remains.
    HealingAura,
}

/// A timed modifier created by an ability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusEffect {
    /// Ability that created the effect.
    pub ability_id: String,
    /// What the effect does.
    pub kind: EffectKind,
    /// Turns remaining.
    pub duration: u32,
    /// Multiplier for DoubleDamage, heal percent for HealingAura.
    pub magnitude: u32,
}

/// The player's active effects, in activation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActiveEffects {
    effects: Vec<StatusEffect>,
}

impl ActiveEffects {
    /// Add an effect.
    pub fn push(&mut self, effect: StatusEffect) {
        self.effects.push(effect);
    }

    /// Whether any effect of `kind` is active.
    #[must_use]
    pub fn has(&self, kind: EffectKind) -> bool {
        self.effects.iter().any(|e| e.kind == kind)
    }

    /// Remove and return the oldest effect of `kind`.
    pub fn consume(&mut self, kind: EffectKind) -> Option<StatusEffect> {
        let idx = self.effects.iter().position(|e| e.kind == kind)?;
        Some(self.effects.remove(idx))
    }

    /// Advance every effect by one turn.
    ///
    /// Healing auras with more than one turn left contribute
    /// `max_health × magnitude / 100` (floored) before decrementing;
    /// effects reaching zero are dropped. Returns the total heal.
    pub fn tick(&mut self, max_health: u32) -> u32 {
        let mut heal = 0;
        for effect in &mut self.effects {
            if effect.kind == EffectKind::HealingAura && effect.duration > 1 {
                heal += percent_of(max_health, effect.magnitude);
            }
            effect.duration = effect.duration.saturating_sub(1);
        }
        self.effects.retain(|e| e.duration > 0);
        heal
    }

    /// Iterate over active effects.
    pub fn iter(&self) -> impl Iterator<Item = &StatusEffect> {
        self.effects.iter()
    }

    /// Number of active effects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Whether no effect is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

/// `floor(value × percent / 100)`.
#[must_use]
pub fn percent_of(value: u32, percent: u32) -> u32 {
    (u64::from(value) * u64::from(percent) / 100) as u32
}

/// Remaining turns before each ability can be used again.
///
/// Ordered by ability id so iteration and hashing are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cooldowns {
    remaining: BTreeMap<String, u32>,
}

impl Cooldowns {
    /// Turns until `id` is ready (0 when ready or never used).
    #[must_use]
    pub fn remaining(&self, id: &str) -> u32 {
        self.remaining.get(id).copied().unwrap_or(0)
    }

    /// Start a cooldown.
    pub fn set(&mut self, id: &str, turns: u32) {
        self.remaining.insert(id.to_string(), turns);
    }

    /// Decrement every cooldown by one, flooring at zero.
    pub fn tick(&mut self) {
        for turns in self.remaining.values_mut() {
            *turns = turns.saturating_sub(1);
        }
    }

    /// Iterate over `(id, turns)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.remaining.iter().map(|(id, turns)| (id.as_str(), *turns))
    }
}
