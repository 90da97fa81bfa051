//! Spawner and enemy behavior for the enemy phase.
//!
//! Both passes scan the grid in row-major order and draw from the
//! simulator's seeded RNG in that order, so a given seed always yields
//! the same spawns and the same skipped moves.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, TileKind};
use crate::grid::Grid;
use crate::math::Position;
use crate::player::{mitigated, PlayerState};

/// Chance that a spawner fills one empty neighbour.
pub const SPAWN_CHANCE: f64 = 0.6;

/// Most enemies all spawners together may create in one enemy phase.
pub const SPAWN_CAP: usize = 3;

/// Chance that a slowed enemy skips its move.
pub const SLOW_SKIP_CHANCE: f64 = 0.5;

/// Minimum damage any enemy contact deals.
pub const ENEMY_DAMAGE_FLOOR: u32 = 1;

/// An enemy created by a spawner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spawn {
    /// Spawner that produced it.
    pub spawner: Position,
    /// Where it appeared.
    pub at: Position,
    /// What appeared.
    pub kind: TileKind,
}

/// What a single enemy did during the enemy phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnemyAction {
    /// Hit the player from a distance and held position.
    Ranged {
        /// Attacker position.
        from: Position,
        /// Health lost.
        damage: u32,
    },
    /// Hit the player from an adjacent cell.
    Melee {
        /// Attacker position.
        from: Position,
        /// Health lost.
        damage: u32,
    },
    /// Stepped one cell closer.
    Moved {
        /// Old position.
        from: Position,
        /// New position.
        to: Position,
    },
    /// Lost its move to the Slow effect.
    Slowed {
        /// Position.
        at: Position,
    },
}

impl EnemyAction {
    /// Health the player lost from this action.
    #[must_use]
    pub const fn damage(&self) -> u32 {
        match self {
            EnemyAction::Ranged { damage, .. } | EnemyAction::Melee { damage, .. } => *damage,
            EnemyAction::Moved { .. } | EnemyAction::Slowed { .. } => 0,
        }
    }
}

/// Let every spawner try to populate its empty orthogonal neighbours.
///
/// Each empty neighbour is filled with probability [`SPAWN_CHANCE`] by a
/// uniformly chosen [`TileKind::SPAWNABLE`] kind. The whole pass stops
/// once [`SPAWN_CAP`] enemies have appeared.
pub fn spawn_from_spawners<R: Rng + ?Sized>(
    grid: &mut Grid,
    catalog: &Catalog,
    rng: &mut R,
) -> Vec<Spawn> {
    let mut spawns = Vec::new();
    let size = grid.size();

    'spawners: for spawner in grid.find_all(TileKind::Spawner) {
        for at in spawner.neighbours(size) {
            if grid.kind_at(at) != Some(TileKind::Empty) {
                continue;
            }
            if !rng.gen_bool(SPAWN_CHANCE) {
                continue;
            }
            let kind = TileKind::SPAWNABLE[rng.gen_range(0..TileKind::SPAWNABLE.len())];
            grid.set(at, catalog.tile(kind));
            spawns.push(Spawn { spawner, at, kind });
            if spawns.len() >= SPAWN_CAP {
                break 'spawners;
            }
        }
    }

    spawns
}

/// Move or attack with every regular enemy, in row-major order.
///
/// The enemy list is captured before anyone moves, so an enemy that
/// steps onto a later cell is not processed twice. Processing stops as
/// soon as the player's health reaches zero.
pub fn run_enemy_actions<R: Rng + ?Sized>(
    grid: &mut Grid,
    catalog: &Catalog,
    player_pos: Position,
    player: &mut PlayerState,
    slowed: bool,
    rng: &mut R,
) -> Vec<EnemyAction> {
    let size = grid.size();
    let enemies: Vec<Position> = grid
        .positions()
        .filter(|&p| grid.kind_at(p).is_some_and(TileKind::is_enemy))
        .collect();

    let mut actions = Vec::new();

    for pos in enemies {
        if !player.is_alive() {
            break;
        }
        let Some(enemy) = grid.get(pos).cloned() else {
            continue;
        };
        let damage = enemy.damage.unwrap_or(0);
        let distance = pos.manhattan(player_pos);

        if let Some(range) = enemy.range {
            if distance > 1 && distance <= range as usize {
                let dealt = player.take_damage(mitigated(damage, player.armor, ENEMY_DAMAGE_FLOOR));
                tracing::debug!(from = %pos, dealt, "Ranged attack");
                actions.push(EnemyAction::Ranged { from: pos, damage: dealt });
                continue;
            }
        }

        if slowed && rng.gen_bool(SLOW_SKIP_CHANCE) {
            actions.push(EnemyAction::Slowed { at: pos });
            continue;
        }

        let mut candidates: Vec<Position> = pos.neighbours(size).collect();
        // Stable sort keeps direction order on ties.
        candidates.sort_by_key(|c| c.manhattan(player_pos));

        if candidates.contains(&player_pos) {
            let dealt = player.take_damage(mitigated(damage, player.armor, ENEMY_DAMAGE_FLOOR));
            tracing::debug!(from = %pos, dealt, "Melee attack");
            actions.push(EnemyAction::Melee { from: pos, damage: dealt });
            continue;
        }

        if let Some(&to) = candidates
            .iter()
            .find(|&&c| grid.kind_at(c) == Some(TileKind::Empty))
        {
            grid.set(to, enemy);
            grid.set(pos, catalog.tile(TileKind::Empty));
            actions.push(EnemyAction::Moved { from: pos, to });
        }
    }

    actions
}
