//! Difficulty presets controlling turn budget, payout and field density.

use serde::{Deserialize, Serialize};

/// Field edge lengths the generator supports.
pub const FIELD_SIZES: [usize; 5] = [8, 10, 12, 14, 16];

/// Probability mass of the fixed bands ahead of the enemy band
/// (Empty 70 %, TreasureSmall 5 %, TreasureMedium 3 %, TreasureLarge 1 %).
pub const LEADING_BAND_MASS: f64 = 0.79;

/// Probability mass of the fixed pickup bands between traps and walls
/// (HealSmall 4 %, HealLarge 2 %, Armor 1 %, Weapon 1 %, Quest 0.2 %,
/// Portal 0.2 %, Boss 0.1 %).
pub const PICKUP_BAND_MASS: f64 = 0.085;

/// A named bundle of turn budget, reward, field size and hazard densities.
///
/// # Example RON
///
/// ```ron
/// DifficultyPreset(
///     id: "novice",
///     name: "Новичок",
///     total_turns: 25,
///     reward: 100,
///     field_size: 10,
///     enemy_ratio: 0.05,
///     trap_ratio: 0.02,
///     wall_ratio: 0.03,
///     spawner_count: 1,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyPreset {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Moves available per game.
    pub total_turns: u32,
    /// Base coin reward for surviving.
    pub reward: u64,
    /// Largest field edge this preset uses on wide viewports.
    pub field_size: usize,
    /// Width of the enemy band in the weighted draw.
    pub enemy_ratio: f64,
    /// Width of the trap band in the weighted draw.
    pub trap_ratio: f64,
    /// Width of the wall band in the weighted draw.
    pub wall_ratio: f64,
    /// Spawners guaranteed on the field.
    pub spawner_count: u32,
}

impl DifficultyPreset {
    /// Total probability mass covered by every band of the weighted draw.
    ///
    /// Anything above this resolves to Empty.
    #[must_use]
    pub fn probability_mass(&self) -> f64 {
        LEADING_BAND_MASS + self.enemy_ratio + self.trap_ratio + PICKUP_BAND_MASS + self.wall_ratio
    }

    /// Check the preset's invariants, returning a reason on failure.
    pub fn check(&self) -> std::result::Result<(), String> {
        if self.total_turns == 0 {
            return Err("total_turns must be positive".to_string());
        }
        if !FIELD_SIZES.contains(&self.field_size) {
            return Err(format!(
                "field_size {} is not one of {FIELD_SIZES:?}",
                self.field_size
            ));
        }
        for (name, ratio) in [
            ("enemy_ratio", self.enemy_ratio),
            ("trap_ratio", self.trap_ratio),
            ("wall_ratio", self.wall_ratio),
        ] {
            if !(ratio >= 0.0) {
                return Err(format!("{name} must be non-negative"));
            }
        }
        let mass = self.probability_mass();
        if mass > 1.0 + f64::EPSILON {
            return Err(format!("probability mass {mass:.3} exceeds 1"));
        }
        Ok(())
    }
}

/// The built-in difficulty ladder.
#[must_use]
pub fn standard_difficulties() -> Vec<DifficultyPreset> {
    vec![
        DifficultyPreset {
            id: "novice".to_string(),
            name: "Новичок".to_string(),
            total_turns: 25,
            reward: 100,
            field_size: 10,
            enemy_ratio: 0.05,
            trap_ratio: 0.02,
            wall_ratio: 0.03,
            spawner_count: 1,
        },
        DifficultyPreset {
            id: "warrior".to_string(),
            name: "Воин".to_string(),
            total_turns: 30,
            reward: 250,
            field_size: 12,
            enemy_ratio: 0.07,
            trap_ratio: 0.03,
            wall_ratio: 0.025,
            spawner_count: 2,
        },
        DifficultyPreset {
            id: "veteran".to_string(),
            name: "Ветеран".to_string(),
            total_turns: 35,
            reward: 500,
            field_size: 14,
            enemy_ratio: 0.08,
            trap_ratio: 0.03,
            wall_ratio: 0.015,
            spawner_count: 3,
        },
        DifficultyPreset {
            id: "legend".to_string(),
            name: "Легенда".to_string(),
            total_turns: 40,
            reward: 1000,
            field_size: 16,
            enemy_ratio: 0.09,
            trap_ratio: 0.025,
            wall_ratio: 0.01,
            spawner_count: 4,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_presets_are_valid() {
        for preset in standard_difficulties() {
            assert_eq!(preset.check(), Ok(()), "{}", preset.id);
        }
    }

    #[test]
    fn test_hazards_grow_with_difficulty() {
        let presets = standard_difficulties();
        for pair in presets.windows(2) {
            assert!(pair[1].enemy_ratio > pair[0].enemy_ratio);
            assert!(pair[1].total_turns > pair[0].total_turns);
            assert!(pair[1].reward > pair[0].reward);
        }
    }

    #[test]
    fn test_overfull_preset_rejected() {
        let mut preset = standard_difficulties().remove(0);
        preset.enemy_ratio = 0.5;
        assert!(preset.check().unwrap_err().contains("probability mass"));
    }

    #[test]
    fn test_bad_field_size_rejected() {
        let mut preset = standard_difficulties().remove(0);
        preset.field_size = 9;
        assert!(preset.check().is_err());
    }
}
