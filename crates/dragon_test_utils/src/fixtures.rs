//! Test fixtures and helpers.
//!
//! Layouts are written as rows of tile glyphs (see
//! [`TileKind::glyph`](dragon_core::catalog::TileKind::glyph)); spaces are
//! ignored so wide layouts stay readable.

use dragon_core::catalog::{Catalog, TileKind};
use dragon_core::grid::Grid;
use dragon_core::math::Position;
use dragon_core::player::Loadout;
use dragon_core::simulation::BattleSimulator;

/// Seed used by fixtures unless a test asks for another.
pub const FIXTURE_SEED: u64 = 7;

/// A 10×10 empty field with the player at the center (5, 5).
pub const OPEN_10: [&str; 10] = [
    "..........",
    "..........",
    "..........",
    "..........",
    "..........",
    ".....@....",
    "..........",
    "..........",
    "..........",
    "..........",
];

/// Parse `rows` against the standard catalog.
///
/// # Panics
///
/// Panics on a malformed layout.
#[must_use]
pub fn layout(rows: &[&str]) -> Grid {
    Grid::parse(&Catalog::standard(), rows).expect("fixture layout must parse")
}

/// [`OPEN_10`] with single tiles placed at the given cells.
///
/// # Panics
///
/// Panics if a cell is outside the grid.
#[must_use]
pub fn open_field_with(tiles: &[(Position, TileKind)]) -> Grid {
    let catalog = Catalog::standard();
    let mut grid = layout(&OPEN_10);
    for &(pos, kind) in tiles {
        assert!(grid.contains(pos), "fixture tile {pos} outside grid");
        grid.set(pos, catalog.tile(kind));
    }
    grid
}

/// A playing simulator on `grid` at difficulty `difficulty_id`.
///
/// # Panics
///
/// Panics if the game cannot start.
#[must_use]
pub fn sim_on(difficulty_id: &str, grid: Grid, loadout: Loadout) -> BattleSimulator {
    let mut sim = BattleSimulator::new(Catalog::standard());
    sim.start_with_field(difficulty_id, grid, FIXTURE_SEED, loadout)
        .expect("fixture battle must start");
    sim
}

/// A playing novice simulator on a parsed layout with the default loadout.
#[must_use]
pub fn sim_with_layout(rows: &[&str]) -> BattleSimulator {
    sim_on("novice", layout(rows), Loadout::default())
}

/// A playing simulator on a generated field.
///
/// # Panics
///
/// Panics if the game cannot start.
#[must_use]
pub fn generated_sim(difficulty_id: &str, field_size: usize, seed: u64) -> BattleSimulator {
    let mut sim = BattleSimulator::new(Catalog::standard());
    sim.start(difficulty_id, field_size, seed, Loadout::default())
        .expect("generated battle must start");
    sim
}

/// Cell one step from the player in each direction, in bounds only.
///
/// # Panics
///
/// Panics if no game is running.
#[must_use]
pub fn player_neighbours(sim: &BattleSimulator) -> Vec<Position> {
    let pos = sim.player_position().expect("no running game");
    let size = sim.grid().map_or(0, Grid::size);
    pos.neighbours(size).collect()
}
