//! Procedural field generation.
//!
//! Generates a battle field with:
//! - A safety bubble of empty cells around the centered player
//! - A weighted random tile for every other cell
//! - Guaranteed spawners, potions and treasure placed by rejection sampling
//!
//! The weighted draw evaluates cumulative thresholds in a fixed order
//! against a single uniform sample, so raising a preset's hazard ratios
//! adds hazards without changing pickup rates.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, DifficultyPreset, TileKind, FIELD_SIZES};
use crate::grid::Grid;
use crate::math::Position;

/// Cells within this Manhattan distance of the center stay empty.
pub const SAFETY_RADIUS: usize = 2;

/// Spawners must be farther than this from the player.
pub const SPAWNER_MIN_DISTANCE: usize = 3;

/// Attempts per guaranteed placement before giving up.
pub const PLACEMENT_ATTEMPTS: u32 = 100;

/// Pickups every field receives regardless of the random draw.
pub const GUARANTEED_PICKUPS: [(TileKind, u32); 4] = [
    (TileKind::HealSmall, 2),
    (TileKind::HealLarge, 1),
    (TileKind::TreasureMedium, 2),
    (TileKind::TreasureLarge, 1),
];

/// Output of [`generate_field`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedField {
    /// The field.
    pub grid: Grid,
    /// Where the player stands (the center cell).
    pub player: Position,
    /// Guaranteed objects that could not be placed.
    pub skipped: Vec<TileKind>,
}

/// Pick the field edge for a viewport width in CSS pixels.
///
/// Mobile-first: narrow screens get small fields. The result never
/// exceeds the preset's configured size.
#[must_use]
pub fn field_size_for_viewport(viewport_width: u32, preset: &DifficultyPreset) -> usize {
    let by_viewport = match viewport_width {
        0..=399 => 8,
        400..=599 => 10,
        600..=899 => 12,
        900..=1199 => 14,
        _ => 16,
    };
    let cap = FIELD_SIZES
        .iter()
        .copied()
        .filter(|&s| s <= preset.field_size)
        .max()
        .unwrap_or(FIELD_SIZES[0]);
    by_viewport.min(cap)
}

/// Map one uniform sample in `[0, 1)` to a tile kind.
///
/// Bands, in order: Empty 70 %, TreasureSmall 5 %, TreasureMedium 3 %,
/// TreasureLarge 1 %, the enemy band (`enemy_ratio` wide, split
/// 15:10:10:10:5 across Weak/Medium/Strong/Archer/Mage), the trap band
/// (`trap_ratio` wide, 60 % visible), HealSmall 4 %, HealLarge 2 %,
/// Armor 1 %, Weapon 1 %, Quest 0.2 %, Portal 0.2 %, Boss 0.1 %, then
/// the wall band (`wall_ratio` wide). Anything past the last band is
/// Empty.
#[must_use]
pub fn draw_tile_kind(preset: &DifficultyPreset, roll: f64) -> TileKind {
    let enemy = preset.enemy_ratio;
    let trap = preset.trap_ratio;
    let bands = [
        (TileKind::Empty, 0.70),
        (TileKind::TreasureSmall, 0.05),
        (TileKind::TreasureMedium, 0.03),
        (TileKind::TreasureLarge, 0.01),
        (TileKind::EnemyWeak, enemy * 0.30),
        (TileKind::EnemyMedium, enemy * 0.20),
        (TileKind::EnemyStrong, enemy * 0.20),
        (TileKind::EnemyArcher, enemy * 0.20),
        (TileKind::EnemyMage, enemy * 0.10),
        (TileKind::TrapVisible, trap * 0.60),
        (TileKind::TrapHidden, trap * 0.40),
        (TileKind::HealSmall, 0.04),
        (TileKind::HealLarge, 0.02),
        (TileKind::Armor, 0.01),
        (TileKind::Weapon, 0.01),
        (TileKind::Quest, 0.002),
        (TileKind::Portal, 0.002),
        (TileKind::Boss, 0.001),
        (TileKind::Wall, preset.wall_ratio),
    ];

    let mut threshold = 0.0;
    for (kind, width) in bands {
        threshold += width;
        if roll < threshold {
            return kind;
        }
    }
    TileKind::Empty
}

/// Generate a `field_size × field_size` field for `preset`.
///
/// Never fails: guaranteed objects that cannot be placed within
/// [`PLACEMENT_ATTEMPTS`] tries are skipped and listed in
/// [`GeneratedField::skipped`].
pub fn generate_field<R: Rng + ?Sized>(
    catalog: &Catalog,
    preset: &DifficultyPreset,
    field_size: usize,
    rng: &mut R,
) -> GeneratedField {
    let mut grid = Grid::filled(field_size, &catalog.tile(TileKind::Empty));
    let center = grid.center();

    for y in 0..field_size {
        for x in 0..field_size {
            let pos = Position::new(x, y);
            if pos.manhattan(center) > SAFETY_RADIUS {
                let kind = draw_tile_kind(preset, rng.gen::<f64>());
                if kind != TileKind::Empty {
                    grid.set(pos, catalog.tile(kind));
                }
            }
        }
    }

    grid.set(center, catalog.tile(TileKind::Player));

    let mut skipped = Vec::new();
    let spawners = (TileKind::Spawner, preset.spawner_count, SPAWNER_MIN_DISTANCE);
    let pickups = GUARANTEED_PICKUPS
        .iter()
        .map(|&(kind, count)| (kind, count, SAFETY_RADIUS));

    for (kind, count, min_distance) in std::iter::once(spawners).chain(pickups) {
        for _ in 0..count {
            if !place_guaranteed(&mut grid, catalog, kind, center, min_distance, rng) {
                tracing::debug!(?kind, "Skipped guaranteed placement");
                skipped.push(kind);
            }
        }
    }

    tracing::debug!(
        size = field_size,
        preset = %preset.id,
        skipped = skipped.len(),
        "Generated field"
    );

    GeneratedField {
        grid,
        player: center,
        skipped,
    }
}

/// Uniformly random cell, or `None` for an empty grid.
pub(crate) fn random_cell<R: Rng + ?Sized>(rng: &mut R, size: usize) -> Option<Position> {
    (size > 0).then(|| Position::new(rng.gen_range(0..size), rng.gen_range(0..size)))
}

fn place_guaranteed<R: Rng + ?Sized>(
    grid: &mut Grid,
    catalog: &Catalog,
    kind: TileKind,
    spawn: Position,
    min_distance: usize,
    rng: &mut R,
) -> bool {
    for _ in 0..PLACEMENT_ATTEMPTS {
        let Some(pos) = random_cell(rng, grid.size()) else {
            return false;
        };
        if grid.kind_at(pos) == Some(TileKind::Empty) && pos.manhattan(spawn) > min_distance {
            grid.set(pos, catalog.tile(kind));
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    fn novice() -> DifficultyPreset {
        Catalog::standard().difficulty("novice").unwrap().clone()
    }

    #[test]
    fn test_draw_band_order() {
        let preset = novice();
        assert_eq!(draw_tile_kind(&preset, 0.0), TileKind::Empty);
        assert_eq!(draw_tile_kind(&preset, 0.699), TileKind::Empty);
        assert_eq!(draw_tile_kind(&preset, 0.70), TileKind::TreasureSmall);
        assert_eq!(draw_tile_kind(&preset, 0.76), TileKind::TreasureMedium);
        assert_eq!(draw_tile_kind(&preset, 0.785), TileKind::TreasureLarge);
        // Enemy band starts at 0.79 and is 0.05 wide for novice.
        assert_eq!(draw_tile_kind(&preset, 0.791), TileKind::EnemyWeak);
        assert_eq!(draw_tile_kind(&preset, 0.8385), TileKind::EnemyMage);
        // Traps: 0.84 .. 0.86
        assert_eq!(draw_tile_kind(&preset, 0.841), TileKind::TrapVisible);
        assert_eq!(draw_tile_kind(&preset, 0.855), TileKind::TrapHidden);
        assert_eq!(draw_tile_kind(&preset, 0.861), TileKind::HealSmall);
        // Walls: 0.945 .. 0.975, then residual Empty.
        assert_eq!(draw_tile_kind(&preset, 0.95), TileKind::Wall);
        assert_eq!(draw_tile_kind(&preset, 0.99), TileKind::Empty);
    }

    #[test]
    fn test_hazard_ratio_does_not_shift_pickups() {
        let calm = novice();
        let mut harsh = novice();
        harsh.enemy_ratio = 0.0;
        // Treasure bands are ahead of the enemy band and unaffected.
        for roll in [0.72, 0.77, 0.785] {
            assert_eq!(draw_tile_kind(&calm, roll), draw_tile_kind(&harsh, roll));
        }
    }

    #[test]
    fn test_viewport_sizes() {
        let legend = Catalog::standard().difficulty("legend").unwrap().clone();
        assert_eq!(field_size_for_viewport(360, &legend), 8);
        assert_eq!(field_size_for_viewport(500, &legend), 10);
        assert_eq!(field_size_for_viewport(800, &legend), 12);
        assert_eq!(field_size_for_viewport(1000, &legend), 14);
        assert_eq!(field_size_for_viewport(1920, &legend), 16);

        // Novice caps at 10 on wide screens.
        assert_eq!(field_size_for_viewport(1920, &novice()), 10);
        assert_eq!(field_size_for_viewport(360, &novice()), 8);
    }

    #[test]
    fn test_safety_bubble_and_player() {
        let catalog = Catalog::standard();
        for seed in 0..20 {
            let mut rng = Pcg64Mcg::seed_from_u64(seed);
            let field = generate_field(&catalog, &novice(), 10, &mut rng);
            assert_eq!(field.player, Position::new(5, 5));
            assert_eq!(field.grid.validate().unwrap(), field.player);
            for pos in field.grid.positions() {
                let d = pos.manhattan(field.player);
                if d > 0 && d <= SAFETY_RADIUS {
                    assert_eq!(field.grid.kind_at(pos), Some(TileKind::Empty), "seed {seed}");
                }
            }
        }
    }

    #[test]
    fn test_guaranteed_objects_present() {
        let catalog = Catalog::standard();
        let preset = catalog.difficulty("veteran").unwrap().clone();
        let mut rng = Pcg64Mcg::seed_from_u64(7);
        let field = generate_field(&catalog, &preset, 14, &mut rng);
        assert!(field.skipped.is_empty());

        let spawners = field.grid.find_all(TileKind::Spawner);
        assert!(spawners.len() >= 3);
        assert!(field.grid.count(TileKind::HealSmall) >= 2);
        assert!(field.grid.count(TileKind::HealLarge) >= 1);
        assert!(field.grid.count(TileKind::TreasureMedium) >= 2);
        assert!(field.grid.count(TileKind::TreasureLarge) >= 1);
        assert!(spawners
            .iter()
            .all(|p| p.manhattan(field.player) > SPAWNER_MIN_DISTANCE));
    }

    #[test]
    fn test_crowded_field_skips_silently() {
        let catalog = Catalog::standard();
        let mut rng = Pcg64Mcg::seed_from_u64(3);
        // On a 2x2 field no cell is farther than the safety radius.
        let field = generate_field(&catalog, &novice(), 2, &mut rng);
        assert_eq!(field.player, Position::new(1, 1));
        assert_eq!(field.grid.count(TileKind::Player), 1);
        assert_eq!(field.skipped.len(), 1 + 2 + 1 + 2 + 1);
        assert_eq!(field.grid.count(TileKind::Empty), 3);
    }

    #[test]
    fn test_same_seed_same_field() {
        let catalog = Catalog::standard();
        let preset = novice();
        let a = generate_field(&catalog, &preset, 10, &mut Pcg64Mcg::seed_from_u64(99));
        let b = generate_field(&catalog, &preset, 10, &mut Pcg64Mcg::seed_from_u64(99));
        let c = generate_field(&catalog, &preset, 10, &mut Pcg64Mcg::seed_from_u64(100));
        assert_eq!(a, b);
        assert_ne!(a.grid, c.grid);
    }
}
