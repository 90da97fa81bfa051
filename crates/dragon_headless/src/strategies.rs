//! Scripted bot strategies for headless playtesting.
//!
//! A strategy looks at what a player could see (hidden traps read as
//! floor) and picks the next command. Bots only ever issue orthogonal
//! moves, so every move they choose consumes a turn unless it hits a
//! wall, which they avoid.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use dragon_core::catalog::{ActiveEffect, TileKind, TileType};
use dragon_core::effects::EffectKind;
use dragon_core::math::Position;
use dragon_core::player::{mitigated, PlayerState};
use dragon_core::replay::Command;
use dragon_core::simulation::{
    BattleSimulator, GamePhase, BOSS_DAMAGE_FLOOR, CONTACT_DAMAGE_FLOOR, ENEMY_KILL_POINTS,
};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Value assigned to a move that would kill the dragon.
const LETHAL: i64 = -10_000;

/// Enemies this close make the cautious bot slow time.
const THREAT_RADIUS: usize = 3;

/// How a bot picks its moves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Grab the most valuable neighbour; fight anything survivable.
    #[default]
    Greedy,
    /// Avoid damage, heal early and slow nearby enemies.
    Cautious,
    /// Uniformly random non-wall neighbour.
    Random,
}

impl Strategy {
    /// Every strategy, for batch sweeps.
    pub const ALL: [Strategy; 3] = [Strategy::Greedy, Strategy::Cautious, Strategy::Random];

    /// Stable name used in results files.
    pub const fn name(self) -> &'static str {
        match self {
            Strategy::Greedy => "greedy",
            Strategy::Cautious => "cautious",
            Strategy::Random => "random",
        }
    }

    /// Pick the next command, or `None` when no battle is running or the
    /// dragon is boxed in by walls.
    pub fn decide<R: Rng + ?Sized>(self, sim: &BattleSimulator, rng: &mut R) -> Option<Command> {
        if sim.phase() != GamePhase::Playing {
            return None;
        }
        let grid = sim.grid()?;
        let player = sim.player()?;
        let pos = sim.player_position()?;

        if self != Strategy::Random {
            if let Some(id) = self.pick_ability(sim, player, pos) {
                return Some(Command::Ability(id));
            }
        }

        let options: Vec<(Position, &TileType)> = pos
            .neighbours(grid.size())
            .filter_map(|n| grid.get(n).map(|tile| (n, tile)))
            .filter(|(_, tile)| tile.kind != TileKind::Wall)
            .collect();

        let target = match self {
            Strategy::Random => options.choose(rng).map(|(n, _)| *n),
            Strategy::Greedy | Strategy::Cautious => {
                let cautious = self == Strategy::Cautious;
                let mut best: Option<(i64, Position)> = None;
                for (n, tile) in &options {
                    let value = tile_value(tile, player, cautious);
                    // Ties keep the earlier neighbour so runs are repeatable.
                    if best.map_or(true, |(v, _)| value > v) {
                        best = Some((value, *n));
                    }
                }
                best.map(|(_, n)| n)
            }
        }?;
        Some(Command::Move(target))
    }

    /// An owned, ready active ability worth using now.
    fn pick_ability(self, sim: &BattleSimulator, player: &PlayerState, pos: Position) -> Option<String> {
        let loadout = sim.loadout()?;
        let cooldowns = sim.cooldowns()?;
        let grid = sim.grid()?;
        let heal_below = match self {
            Strategy::Cautious => 70,
            _ => 40,
        };

        for (id, level) in &loadout.levels {
            if *level == 0 || cooldowns.remaining(id) > 0 {
                continue;
            }
            let Some((_, effect)) = sim.catalog().ability(id).and_then(|def| def.active()) else {
                continue;
            };
            let wanted = match effect {
                ActiveEffect::HealingAura { .. } => {
                    player.health * 100 < player.max_health * heal_below
                        && !player.effects.has(EffectKind::HealingAura)
                }
                ActiveEffect::Slow { .. } => {
                    self == Strategy::Cautious
                        && !player.effects.has(EffectKind::Slow)
                        && grid
                            .positions()
                            .filter(|p| grid.kind_at(*p).is_some_and(TileKind::is_enemy))
                            .any(|p| p.manhattan(pos) <= THREAT_RADIUS)
                }
                // Multiplies contact damage taken, never worth it for a bot.
                ActiveEffect::DoubleDamage { .. } => false,
            };
            if wanted {
                return Some(id.clone());
            }
        }
        None
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.name() == s)
            .ok_or_else(|| format!("Unknown strategy '{s}' (expected greedy, cautious or random)"))
    }
}

/// Heuristic worth of stepping onto `tile`.
fn tile_value(tile: &TileType, player: &PlayerState, cautious: bool) -> i64 {
    let points = i64::from(tile.points.unwrap_or(0));
    let hurt = i64::from(player.max_health - player.health);
    let health = player.health;
    let contact = |floor: u32| {
        let mut damage = mitigated(tile.damage.unwrap_or(0), player.armor, floor);
        if tile.kind != TileKind::Boss {
            if let Some(effect) = player.effects.iter().find(|e| e.kind == EffectKind::DoubleDamage) {
                damage = damage.saturating_mul(effect.magnitude.max(1));
            }
        }
        damage
    };
    let pain = if cautious { 3 } else { 1 };

    match tile.kind {
        TileKind::TreasureSmall
        | TileKind::TreasureMedium
        | TileKind::TreasureLarge
        | TileKind::Quest => points,
        TileKind::HealSmall | TileKind::HealLarge => {
            let gain = i64::from(tile.heal.unwrap_or(0)).min(hurt);
            if cautious {
                gain * 3
            } else {
                gain
            }
        }
        TileKind::Armor => i64::from(tile.armor.unwrap_or(0)) * 4,
        TileKind::Weapon => i64::from(tile.attack.unwrap_or(0)) * 2,
        TileKind::EnemyWeak
        | TileKind::EnemyMedium
        | TileKind::EnemyStrong
        | TileKind::EnemyArcher
        | TileKind::EnemyMage => {
            let damage = contact(CONTACT_DAMAGE_FLOOR);
            if damage >= health {
                LETHAL
            } else {
                i64::from(ENEMY_KILL_POINTS) - i64::from(damage) * pain
            }
        }
        TileKind::Boss => {
            let damage = contact(BOSS_DAMAGE_FLOOR);
            if damage >= health || (cautious && damage * 2 >= health) {
                LETHAL
            } else {
                points - i64::from(damage) * pain
            }
        }
        TileKind::TrapVisible => {
            let damage = mitigated(tile.damage.unwrap_or(0), player.armor, CONTACT_DAMAGE_FLOOR);
            if damage >= health {
                LETHAL
            } else {
                -i64::from(damage) * pain
            }
        }
        TileKind::Spawner => 5,
        TileKind::Portal => {
            if cautious {
                2
            } else {
                1
            }
        }
        // Hidden traps look like floor.
        TileKind::Empty | TileKind::TrapHidden | TileKind::Player => 0,
        TileKind::Wall => LETHAL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dragon_core::catalog::Catalog;
    use dragon_core::grid::Grid;
    use dragon_core::player::Loadout;
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    fn sim(rows: &[&str], loadout: Loadout) -> BattleSimulator {
        let catalog = Catalog::standard();
        let grid = Grid::parse(&catalog, rows).unwrap();
        let mut sim = BattleSimulator::new(catalog);
        sim.start_with_field("novice", grid, 3, loadout).unwrap();
        sim
    }

    const ROWS: [&str; 10] = [
        "..........",
        "..........",
        "..........",
        "..........",
        ".....$....",
        "....#@w...",
        ".....~....",
        "..........",
        "..........",
        "..........",
    ];

    #[test]
    fn test_parse_names() {
        for strategy in Strategy::ALL {
            assert_eq!(strategy.name().parse::<Strategy>().unwrap(), strategy);
        }
        assert!("reckless".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_greedy_takes_treasure() {
        let sim = sim(&ROWS, Loadout::default());
        let mut rng = Pcg64Mcg::seed_from_u64(0);
        assert_eq!(
            Strategy::Greedy.decide(&sim, &mut rng),
            Some(Command::Move(Position::new(5, 4)))
        );
    }

    #[test]
    fn test_random_never_picks_walls() {
        let sim = sim(&ROWS, Loadout::default());
        let mut rng = Pcg64Mcg::seed_from_u64(9);
        for _ in 0..50 {
            let Some(Command::Move(target)) = Strategy::Random.decide(&sim, &mut rng) else {
                panic!("random bot must move");
            };
            assert_ne!(target, Position::new(4, 5));
        }
    }

    #[test]
    fn test_lethal_enemy_avoided() {
        let mut sim = sim(&ROWS, Loadout::default());
        // Drain health so the weak enemy would be fatal.
        let stats = dragon_core::player::BaseStats {
            max_health: 5,
            armor: 0,
            attack: 10,
        };
        let grid = sim.grid().unwrap().clone();
        sim.abandon();
        sim.start_with_field("novice", grid, 3, Loadout::default().with_stats(stats))
            .unwrap();

        let mut rng = Pcg64Mcg::seed_from_u64(0);
        let Some(Command::Move(target)) = Strategy::Greedy.decide(&sim, &mut rng) else {
            panic!("greedy bot must move");
        };
        assert_ne!(target, Position::new(6, 5));
    }

    #[test]
    fn test_cautious_slows_nearby_enemies() {
        let loadout = Loadout::default().with_ability("time_slow", 1);
        let sim = sim(&ROWS, loadout);
        let mut rng = Pcg64Mcg::seed_from_u64(0);
        assert_eq!(
            Strategy::Cautious.decide(&sim, &mut rng),
            Some(Command::Ability("time_slow".to_string()))
        );
        // Greedy keeps moving.
        assert!(matches!(
            Strategy::Greedy.decide(&sim, &mut rng),
            Some(Command::Move(_))
        ));
    }

    #[test]
    fn test_no_decision_outside_battle() {
        let sim = BattleSimulator::new(Catalog::standard());
        let mut rng = Pcg64Mcg::seed_from_u64(0);
        assert_eq!(Strategy::Greedy.decide(&sim, &mut rng), None);
    }
}
