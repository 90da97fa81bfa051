//! Static catalog tables: tiles, difficulty presets and abilities.
//!
//! This module contains pure data structures. The built-in tables come
//! from [`Catalog::standard`]; alternative tables can be deserialized
//! from RON for balance experiments.

mod abilities;
mod difficulty;
mod tiles;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

pub use abilities::{standard_abilities, AbilityDef, AbilityKind, ActiveEffect, StatBonus};
pub use difficulty::{
    standard_difficulties, DifficultyPreset, FIELD_SIZES, LEADING_BAND_MASS, PICKUP_BAND_MASS,
};
pub use tiles::{standard_tiles, Rarity, TileKind, TileType};

/// All process-wide constant data the simulator consults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// One entry per [`TileKind`].
    pub tiles: Vec<TileType>,
    /// Difficulty ladder, easiest first.
    pub difficulties: Vec<DifficultyPreset>,
    /// Ability shop.
    pub abilities: Vec<AbilityDef>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl Catalog {
    /// The built-in tables.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            tiles: standard_tiles(),
            difficulties: standard_difficulties(),
            abilities: standard_abilities(),
        }
    }

    /// Parse a catalog from RON text and validate it.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let catalog: Self = ron::from_str(source).map_err(|e| GameError::CatalogLoad {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load and validate a RON catalog file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| GameError::CatalogLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let catalog: Self = ron::from_str(&source).map_err(|e| GameError::CatalogLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Render the catalog as pretty RON.
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize catalog: {e}")))
    }

    /// Check that every tile kind has exactly one entry, every preset
    /// passes [`DifficultyPreset::check`] and ids are unique.
    pub fn validate(&self) -> Result<()> {
        for kind in TileKind::ALL {
            let count = self.tiles.iter().filter(|t| t.kind == kind).count();
            if count != 1 {
                return Err(GameError::CatalogLoad {
                    path: "tiles".to_string(),
                    message: format!("expected one entry for {kind:?}, found {count}"),
                });
            }
        }

        for (i, preset) in self.difficulties.iter().enumerate() {
            preset.check().map_err(|reason| GameError::InvalidPreset {
                id: preset.id.clone(),
                reason,
            })?;
            if self.difficulties[..i].iter().any(|p| p.id == preset.id) {
                return Err(GameError::InvalidPreset {
                    id: preset.id.clone(),
                    reason: "duplicate id".to_string(),
                });
            }
        }

        for (i, ability) in self.abilities.iter().enumerate() {
            if self.abilities[..i].iter().any(|a| a.id == ability.id) {
                return Err(GameError::CatalogLoad {
                    path: "abilities".to_string(),
                    message: format!("duplicate ability id '{}'", ability.id),
                });
            }
        }

        Ok(())
    }

    /// A copy of the catalog entry for `kind`.
    ///
    /// Falls back to a bare placeholder if the table lacks the kind;
    /// validated catalogs never do.
    #[must_use]
    pub fn tile(&self, kind: TileKind) -> TileType {
        self.tiles
            .iter()
            .find(|t| t.kind == kind)
            .cloned()
            .unwrap_or_else(|| TileType::placeholder(kind))
    }

    /// Look up a difficulty preset by id.
    #[must_use]
    pub fn difficulty(&self, id: &str) -> Option<&DifficultyPreset> {
        self.difficulties.iter().find(|d| d.id == id)
    }

    /// Look up an ability by id.
    #[must_use]
    pub fn ability(&self, id: &str) -> Option<&AbilityDef> {
        self.abilities.iter().find(|a| a.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_catalog_validates() {
        assert!(Catalog::standard().validate().is_ok());
    }

    #[test]
    fn test_ron_round_trip() {
        let catalog = Catalog::standard();
        let text = catalog.to_ron_string().unwrap();
        let parsed = Catalog::from_ron_str(&text).unwrap();
        assert_eq!(parsed, catalog);
    }

    #[test]
    fn test_missing_tile_rejected() {
        let mut catalog = Catalog::standard();
        catalog.tiles.retain(|t| t.kind != TileKind::Portal);
        let err = catalog.validate().unwrap_err();
        assert!(err.to_string().contains("Portal"));
        assert_eq!(catalog.tile(TileKind::Portal).kind, TileKind::Portal);
    }

    #[test]
    fn test_duplicate_difficulty_rejected() {
        let mut catalog = Catalog::standard();
        let first = catalog.difficulties[0].clone();
        catalog.difficulties.push(first);
        assert!(matches!(
            catalog.validate(),
            Err(GameError::InvalidPreset { .. })
        ));
    }

    #[test]
    fn test_lookups() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.difficulty("novice").unwrap().total_turns, 25);
        assert!(catalog.difficulty("nightmare").is_none());
        assert_eq!(
            catalog.ability("double_strike").unwrap().active(),
            Some((5, ActiveEffect::DoubleDamage { multiplier: 2 }))
        );
        assert_eq!(catalog.tile(TileKind::EnemyWeak).damage, Some(5));
    }
}
