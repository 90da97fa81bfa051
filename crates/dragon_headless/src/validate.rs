//! Catalog file validation.
//!
//! Loads a RON catalog, runs the core checks and then generates one
//! field per preset so balance edits that parse but cannot build a field
//! are caught before they ship.

use std::path::Path;

use dragon_core::catalog::{AbilityKind, Catalog, TileKind};
use dragon_core::field_generation::generate_field;
use dragon_core::shop::next_price;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};

/// Seed for the sample fields.
const SAMPLE_SEED: u64 = 0;

/// Result of validating one catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogReport {
    /// Where the catalog came from.
    pub source: String,
    /// Whether every check passed.
    pub valid: bool,
    /// First failure, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Per-preset details (empty when the catalog did not load).
    pub difficulties: Vec<PresetReport>,
    /// Per-ability shop details.
    pub abilities: Vec<AbilityReport>,
}

/// What a difficulty preset produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetReport {
    pub id: String,
    pub field_size: usize,
    pub total_turns: u32,
    pub reward: u64,
    /// Mass covered by every band of the weighted draw.
    pub probability_mass: f64,
    /// Residual mass that resolves to floor.
    pub empty_share: f64,
    /// Enemies on the sample field.
    pub sample_enemies: usize,
    /// Spawners on the sample field.
    pub sample_spawners: usize,
    /// Guaranteed objects the sample field had to skip.
    pub sample_skipped: Vec<TileKind>,
}

/// Shop data for one ability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityReport {
    pub id: String,
    /// `permanent` or `active`.
    pub kind: String,
    pub max_level: u32,
    /// Price of the first level.
    pub first_price: u64,
    /// Price of every level together.
    pub full_cost: u64,
}

/// Validate a catalog file. Never fails; problems end up in the report.
pub fn validate_catalog_file(path: &Path) -> CatalogReport {
    let source = path.display().to_string();
    match Catalog::load(path) {
        Ok(catalog) => describe(&catalog, source),
        Err(e) => {
            tracing::warn!(path = %source, error = %e, "Catalog rejected");
            CatalogReport {
                source,
                valid: false,
                error: Some(e.to_string()),
                difficulties: Vec::new(),
                abilities: Vec::new(),
            }
        }
    }
}

/// Describe an already validated catalog.
pub fn describe(catalog: &Catalog, source: impl Into<String>) -> CatalogReport {
    let difficulties = catalog
        .difficulties
        .iter()
        .map(|preset| {
            let mut rng = Pcg64Mcg::seed_from_u64(SAMPLE_SEED);
            let sample = generate_field(catalog, preset, preset.field_size, &mut rng);
            let mass = preset.probability_mass();
            PresetReport {
                id: preset.id.clone(),
                field_size: preset.field_size,
                total_turns: preset.total_turns,
                reward: preset.reward,
                probability_mass: mass,
                empty_share: (1.0 - mass).max(0.0),
                sample_enemies: TileKind::ENEMIES
                    .iter()
                    .map(|kind| sample.grid.count(*kind))
                    .sum(),
                sample_spawners: sample.grid.count(TileKind::Spawner),
                sample_skipped: sample.skipped,
            }
        })
        .collect();

    let abilities = catalog
        .abilities
        .iter()
        .map(|def| AbilityReport {
            id: def.id.clone(),
            kind: match def.kind {
                AbilityKind::Permanent(_) => "permanent",
                AbilityKind::Active { .. } => "active",
            }
            .to_string(),
            max_level: def.max_level,
            first_price: next_price(def, 0),
            full_cost: (0..def.max_level).map(|owned| next_price(def, owned)).sum(),
        })
        .collect();

    CatalogReport {
        source: source.into(),
        valid: true,
        error: None,
        difficulties,
        abilities,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn bundled_catalog() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../assets/data/catalog.ron")
    }

    #[test]
    fn test_bundled_catalog_matches_builtin() {
        let loaded = Catalog::load(bundled_catalog()).unwrap();
        assert_eq!(loaded, Catalog::standard());
    }

    #[test]
    fn test_bundled_catalog_report() {
        let report = validate_catalog_file(&bundled_catalog());
        assert!(report.valid, "{:?}", report.error);
        let ids: Vec<&str> = report.difficulties.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["novice", "warrior", "veteran", "legend"]);
        for preset in &report.difficulties {
            assert!(preset.probability_mass <= 1.0);
            assert!(preset.sample_spawners >= 1);
        }

        let aura = report
            .abilities
            .iter()
            .find(|a| a.id == "healing_aura")
            .unwrap();
        assert_eq!(aura.kind, "active");
        assert_eq!(aura.full_cost, 2000);

        // 200 × (1 + 2 + ... + 10)
        let damage = &report.abilities[0];
        assert_eq!(damage.full_cost, 11_000);
    }

    #[test]
    fn test_invalid_preset_reported() {
        let mut catalog = Catalog::standard();
        catalog.difficulties[0].enemy_ratio = 0.5;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ron");
        std::fs::write(&path, catalog.to_ron_string().unwrap()).unwrap();

        let report = validate_catalog_file(&path);
        assert!(!report.valid);
        assert!(report.error.unwrap().contains("novice"));
        assert!(report.difficulties.is_empty());
    }

    #[test]
    fn test_missing_file_reported() {
        let report = validate_catalog_file(Path::new("/nonexistent/catalog.ron"));
        assert!(!report.valid);
        assert!(report.error.is_some());
    }
}
