//! The turn state machine driving one grid battle.
//!
//! A game moves through `Menu → Playing → Finished` and can be dropped
//! back to `Menu` at any point. Each accepted player move is followed by
//! exactly one enemy phase:
//!
//! 1. Player move and tile effect ([`BattleSimulator::attempt_move`])
//! 2. Enemy phase ([`BattleSimulator::resolve_enemy_turn`]): effect tick,
//!    spawning, then enemy movement and attacks
//!
//! The two are separate calls so a presentation layer can pause between
//! them for [`pacing::ENEMY_TURN_DELAY_MS`]. [`BattleSimulator::step`] runs
//! both back to back.
//!
//! # Determinism
//!
//! All operations in this module are fully deterministic:
//! - Every roll comes from one [`Pcg64Mcg`] stream seeded at game start
//! - Score math is fixed-point (see [`Fixed`])
//! - Grid scans are row-major, neighbours are checked in [`Direction`] order
//!
//! # Example
//!
//! ```
//! use dragon_core::catalog::Catalog;
//! use dragon_core::math::Position;
//! use dragon_core::player::Loadout;
//! use dragon_core::simulation::{BattleSimulator, GamePhase};
//!
//! let mut sim = BattleSimulator::new(Catalog::standard());
//! sim.start("novice", 10, 42, Loadout::default()).unwrap();
//! assert_eq!(sim.phase(), GamePhase::Playing);
//!
//! let player = sim.player_position().unwrap();
//! let target = Position::new(player.x + 1, player.y);
//! let report = sim.step(target).unwrap();
//! assert!(report.enemy.is_some());
//! assert_eq!(sim.turn(), 1);
//! ```
//!
//! [`Direction`]: crate::math::Direction

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};

use crate::catalog::{ActiveEffect, Catalog, DifficultyPreset, TileKind, TileType};
use crate::effects::{percent_of, Cooldowns, EffectKind, StatusEffect};
use crate::enemy_ai::{run_enemy_actions, spawn_from_spawners, EnemyAction, Spawn};
use crate::error::{GameError, Result};
use crate::field_generation::{generate_field, random_cell, PLACEMENT_ATTEMPTS};
use crate::grid::Grid;
use crate::math::{combo_scaled, fixed_serde, Fixed, Position};
use crate::player::{mitigated, Loadout, PlayerState};

/// Fixed delays a presentation layer inserts between phases.
///
/// The simulator never waits on these; they only document the intended
/// cadence so front ends and bots agree on it.
pub mod pacing {
    /// Pause between an accepted move and the enemy phase.
    pub const ENEMY_TURN_DELAY_MS: u64 = 500;
    /// How long a damage flash lasts.
    pub const HIT_FEEDBACK_MS: u64 = 300;
}

/// Minimum damage from regular enemies and traps.
pub const CONTACT_DAMAGE_FLOOR: u32 = 1;

/// Minimum damage from a boss.
pub const BOSS_DAMAGE_FLOOR: u32 = 5;

/// Base score for defeating a regular enemy.
pub const ENEMY_KILL_POINTS: u32 = 10;

/// Top-level simulator phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GamePhase {
    /// No game in progress.
    #[default]
    Menu,
    /// A game is running.
    Playing,
    /// The game ended; the outcome is available.
    Finished,
}

/// Terminal summary of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameOutcome {
    /// Whether the turn budget ran out with the player alive.
    pub survived: bool,
    /// Final score, rounded down.
    pub score: u64,
    /// Enemies and bosses defeated.
    pub kills: u32,
    /// Longest combo reached.
    pub max_combo: u32,
    /// Accepted moves before the game ended.
    pub turns_elapsed: u32,
}

/// Effects of an accepted move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveReport {
    /// Cell the player left.
    pub from: Position,
    /// Cell the player ended on (differs from the target after a portal).
    pub to: Position,
    /// Tile that was resolved.
    pub tile: TileKind,
    /// Health lost.
    pub damage: u32,
    /// Health gained.
    pub healed: u32,
    /// Score gained.
    #[serde(with = "fixed_serde")]
    pub score_gained: Fixed,
    /// A hidden trap was revealed under the player.
    pub revealed: bool,
    /// A portal moved the player elsewhere.
    pub teleported: bool,
}

/// Result of [`BattleSimulator::attempt_move`].
///
/// Non-adjacent targets and walls are not errors; they leave every piece
/// of state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveOutcome {
    /// The target is not one orthogonal step away; nothing happened.
    Inspected {
        /// Inspected cell.
        target: Position,
        /// What is there.
        kind: TileKind,
    },
    /// The target is a wall; no turn was consumed.
    Blocked {
        /// The wall.
        target: Position,
    },
    /// The move was applied.
    Moved(MoveReport),
}

impl MoveOutcome {
    /// Whether a turn was consumed.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, MoveOutcome::Moved(_))
    }
}

/// Everything that happened during one enemy phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyTurnReport {
    /// Health restored by healing auras.
    pub healed: u32,
    /// Enemies created by spawners.
    pub spawned: Vec<Spawn>,
    /// Per-enemy actions, in scan order.
    pub actions: Vec<EnemyAction>,
    /// Total health lost to enemies.
    pub damage_taken: u32,
}

impl EnemyTurnReport {
    /// Whether any enemy contact hurt the player (drives hit feedback).
    #[must_use]
    pub const fn player_hit(&self) -> bool {
        self.damage_taken > 0
    }
}

/// Result of [`BattleSimulator::step`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    /// The player's move.
    pub movement: MoveOutcome,
    /// The enemy phase, if one ran.
    pub enemy: Option<EnemyTurnReport>,
}

/// Result of [`BattleSimulator::use_ability`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityUse {
    /// The effect pushed onto the player.
    pub effect: StatusEffect,
    /// Health restored on activation.
    pub healed: u32,
}

/// State of a running or finished game.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Battle {
    preset: DifficultyPreset,
    grid: Grid,
    player_pos: Position,
    player: PlayerState,
    cooldowns: Cooldowns,
    loadout: Loadout,
    turn: u32,
    enemy_turn_pending: bool,
    /// Tile the player is standing on, restored when they leave.
    underfoot: Option<TileType>,
    outcome: Option<GameOutcome>,
    rng: Pcg64Mcg,
}

/// The grid battle state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleSimulator {
    catalog: Catalog,
    phase: GamePhase,
    battle: Option<Battle>,
}

impl BattleSimulator {
    /// Create a simulator in the `Menu` phase.
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            phase: GamePhase::Menu,
            battle: None,
        }
    }

    /// Start a game on a freshly generated field.
    ///
    /// The seed drives both field generation and every later roll. If the
    /// generated field fails validation the simulator stays in `Menu` and
    /// the error is returned.
    ///
    /// # Errors
    ///
    /// `InvalidPhase` while a game is running, `UnknownDifficulty` for an
    /// unknown id and `InvalidGrid` when the field cannot be used.
    pub fn start(
        &mut self,
        difficulty_id: &str,
        field_size: usize,
        seed: u64,
        loadout: Loadout,
    ) -> Result<()> {
        let preset = self.preset_for_start(difficulty_id)?;
        let mut rng = Pcg64Mcg::seed_from_u64(seed);
        let generated = generate_field(&self.catalog, &preset, field_size, &mut rng);
        self.begin(preset, generated.grid, rng, loadout)
    }

    /// Start a game on a prebuilt field.
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub fn start_with_field(
        &mut self,
        difficulty_id: &str,
        grid: Grid,
        seed: u64,
        loadout: Loadout,
    ) -> Result<()> {
        let preset = self.preset_for_start(difficulty_id)?;
        self.begin(preset, grid, Pcg64Mcg::seed_from_u64(seed), loadout)
    }

    fn preset_for_start(&self, difficulty_id: &str) -> Result<DifficultyPreset> {
        if self.phase == GamePhase::Playing {
            return Err(GameError::InvalidPhase {
                expected: GamePhase::Menu,
                actual: self.phase,
            });
        }
        self.catalog
            .difficulty(difficulty_id)
            .cloned()
            .ok_or_else(|| GameError::UnknownDifficulty(difficulty_id.to_string()))
    }

    fn begin(
        &mut self,
        preset: DifficultyPreset,
        grid: Grid,
        rng: Pcg64Mcg,
        loadout: Loadout,
    ) -> Result<()> {
        let player_pos = match grid.validate() {
            Ok(pos) => pos,
            Err(err) => {
                tracing::warn!(preset = %preset.id, error = %err, "Field construction failed");
                self.reset();
                return Err(err);
            }
        };

        let player = PlayerState::new(&loadout.stats, preset.total_turns);
        tracing::info!(
            preset = %preset.id,
            size = grid.size(),
            health = player.health,
            turns = player.total_turns,
            "Battle started"
        );

        self.battle = Some(Battle {
            preset,
            grid,
            player_pos,
            player,
            cooldowns: Cooldowns::default(),
            loadout,
            turn: 0,
            enemy_turn_pending: false,
            underfoot: None,
            outcome: None,
            rng,
        });
        self.phase = GamePhase::Playing;

        if self.battle.as_ref().is_some_and(|b| b.player.turns_left == 0) {
            self.finish();
        }
        Ok(())
    }

    /// Try to move the player onto `target`.
    ///
    /// # Errors
    ///
    /// `InvalidPhase` outside `Playing`, `TurnPending` before the enemy
    /// phase was resolved, `NoTurnsLeft` and `OutOfBounds`.
    pub fn attempt_move(&mut self, target: Position) -> Result<MoveOutcome> {
        self.expect_phase(GamePhase::Playing)?;
        let catalog = &self.catalog;
        let battle = self
            .battle
            .as_mut()
            .ok_or_else(|| GameError::InvalidState("Playing without a battle".to_string()))?;

        if battle.enemy_turn_pending {
            return Err(GameError::TurnPending);
        }
        if battle.player.turns_left == 0 {
            return Err(GameError::NoTurnsLeft);
        }
        let tile = battle
            .grid
            .get(target)
            .cloned()
            .ok_or(GameError::OutOfBounds(target))?;

        if target.manhattan(battle.player_pos) != 1 {
            return Ok(MoveOutcome::Inspected {
                target,
                kind: tile.kind,
            });
        }
        if tile.kind == TileKind::Wall {
            tracing::debug!(%target, "Move blocked by wall");
            return Ok(MoveOutcome::Blocked { target });
        }

        let report = battle.apply_move(catalog, target, &tile);
        tracing::debug!(
            turn = battle.turn,
            tile = ?report.tile,
            to = %report.to,
            damage = report.damage,
            health = battle.player.health,
            "Player moved"
        );

        if !battle.player.is_alive() || battle.player.turns_left == 0 {
            self.finish();
        }
        self.debug_validate();

        Ok(MoveOutcome::Moved(report))
    }

    /// Run the enemy phase owed after an accepted move.
    ///
    /// # Phase Order
    ///
    /// 1. Effect tick (healing auras) and cooldown tick
    /// 2. Spawning, on even turns only
    /// 3. Enemy ranged attacks, melee attacks and movement
    ///
    /// # Errors
    ///
    /// `InvalidPhase` outside `Playing` and `NoPendingTurn` when no move
    /// is waiting for a response.
    pub fn resolve_enemy_turn(&mut self) -> Result<EnemyTurnReport> {
        self.expect_phase(GamePhase::Playing)?;
        let catalog = &self.catalog;
        let battle = self
            .battle
            .as_mut()
            .ok_or_else(|| GameError::InvalidState("Playing without a battle".to_string()))?;

        if !battle.enemy_turn_pending {
            return Err(GameError::NoPendingTurn);
        }

        let mut report = EnemyTurnReport::default();

        // 1. Effects and cooldowns
        let aura = battle.player.effects.tick(battle.player.max_health);
        report.healed = battle.player.heal(aura);
        battle.cooldowns.tick();

        // 2. Spawning
        if battle.turn % 2 == 0 {
            report.spawned = spawn_from_spawners(&mut battle.grid, catalog, &mut battle.rng);
        }

        // 3. Enemy actions
        let slowed = battle.player.effects.has(EffectKind::Slow);
        report.actions = run_enemy_actions(
            &mut battle.grid,
            catalog,
            battle.player_pos,
            &mut battle.player,
            slowed,
            &mut battle.rng,
        );
        report.damage_taken = report.actions.iter().map(EnemyAction::damage).sum();

        battle.enemy_turn_pending = false;
        tracing::debug!(
            turn = battle.turn,
            spawned = report.spawned.len(),
            damage = report.damage_taken,
            health = battle.player.health,
            "Enemy turn resolved"
        );

        if !battle.player.is_alive() {
            self.finish();
        }

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(turn = self.turn(), state_hash = hash, "Battle state hash");
        }
        self.debug_validate();

        Ok(report)
    }

    /// Move and, when the move was accepted and the game continues,
    /// resolve the enemy phase.
    ///
    /// # Errors
    ///
    /// Any error from [`attempt_move`](Self::attempt_move).
    pub fn step(&mut self, target: Position) -> Result<StepReport> {
        let movement = self.attempt_move(target)?;
        let enemy = if movement.is_accepted() && self.enemy_turn_pending() {
            Some(self.resolve_enemy_turn()?)
        } else {
            None
        };
        Ok(StepReport { movement, enemy })
    }

    /// Activate an owned active ability.
    ///
    /// # Errors
    ///
    /// `InvalidPhase` outside `Playing`, `UnknownAbility`,
    /// `AbilityNotActive` for permanent upgrades, `AbilityLocked` when
    /// not owned and `AbilityOnCooldown`.
    pub fn use_ability(&mut self, id: &str) -> Result<AbilityUse> {
        self.expect_phase(GamePhase::Playing)?;
        let def = self
            .catalog
            .ability(id)
            .ok_or_else(|| GameError::UnknownAbility(id.to_string()))?;
        let (cooldown, active) = def
            .active()
            .ok_or_else(|| GameError::AbilityNotActive(id.to_string()))?;
        let battle = self
            .battle
            .as_mut()
            .ok_or_else(|| GameError::InvalidState("Playing without a battle".to_string()))?;

        if battle.loadout.level(id) == 0 {
            return Err(GameError::AbilityLocked(id.to_string()));
        }
        let remaining = battle.cooldowns.remaining(id);
        if remaining > 0 {
            return Err(GameError::AbilityOnCooldown {
                id: id.to_string(),
                remaining,
            });
        }

        let (kind, duration, magnitude) = match active {
            ActiveEffect::Slow { slow_duration } => (EffectKind::Slow, slow_duration, 0),
            ActiveEffect::DoubleDamage { multiplier } => (EffectKind::DoubleDamage, 1, multiplier),
            ActiveEffect::HealingAura {
                heal_percent,
                duration,
            } => (EffectKind::HealingAura, duration, heal_percent),
        };
        let healed = if kind == EffectKind::HealingAura {
            let amount = percent_of(battle.player.max_health, magnitude);
            battle.player.heal(amount)
        } else {
            0
        };

        let effect = StatusEffect {
            ability_id: id.to_string(),
            kind,
            duration,
            magnitude,
        };
        battle.player.effects.push(effect.clone());
        battle.cooldowns.set(id, cooldown);
        tracing::debug!(ability = %id, ?kind, duration, healed, "Ability used");

        Ok(AbilityUse { effect, healed })
    }

    /// Drop any game in progress and return to `Menu`.
    pub fn abandon(&mut self) {
        if self.phase == GamePhase::Playing {
            tracing::info!(turn = self.turn(), "Battle abandoned");
        }
        self.reset();
    }

    /// Return to `Menu`, discarding all game state.
    pub fn reset(&mut self) {
        self.phase = GamePhase::Menu;
        self.battle = None;
    }

    fn finish(&mut self) {
        let Some(battle) = self.battle.as_mut() else {
            return;
        };
        let outcome = GameOutcome {
            survived: battle.player.is_alive(),
            score: battle.player.display_score(),
            kills: battle.player.kills,
            max_combo: battle.player.max_combo,
            turns_elapsed: battle.turn,
        };
        battle.enemy_turn_pending = false;
        battle.outcome = Some(outcome);
        self.phase = GamePhase::Finished;
        tracing::info!(
            survived = outcome.survived,
            score = outcome.score,
            kills = outcome.kills,
            turns = outcome.turns_elapsed,
            "Battle finished"
        );
    }

    fn expect_phase(&self, expected: GamePhase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(GameError::InvalidPhase {
                expected,
                actual: self.phase,
            })
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> GamePhase {
        self.phase
    }

    /// The catalog this simulator reads.
    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The field, while a game is running or finished.
    #[must_use]
    pub fn grid(&self) -> Option<&Grid> {
        self.battle.as_ref().map(|b| &b.grid)
    }

    /// The player's stats.
    #[must_use]
    pub fn player(&self) -> Option<&PlayerState> {
        self.battle.as_ref().map(|b| &b.player)
    }

    /// The player's cell.
    #[must_use]
    pub fn player_position(&self) -> Option<Position> {
        self.battle.as_ref().map(|b| b.player_pos)
    }

    /// The running game's difficulty.
    #[must_use]
    pub fn preset(&self) -> Option<&DifficultyPreset> {
        self.battle.as_ref().map(|b| &b.preset)
    }

    /// Ability cooldowns.
    #[must_use]
    pub fn cooldowns(&self) -> Option<&Cooldowns> {
        self.battle.as_ref().map(|b| &b.cooldowns)
    }

    /// The loadout the game started with.
    #[must_use]
    pub fn loadout(&self) -> Option<&Loadout> {
        self.battle.as_ref().map(|b| &b.loadout)
    }

    /// Accepted moves so far.
    #[must_use]
    pub fn turn(&self) -> u32 {
        self.battle.as_ref().map_or(0, |b| b.turn)
    }

    /// Whether an enemy phase is owed.
    #[must_use]
    pub fn enemy_turn_pending(&self) -> bool {
        self.battle.as_ref().is_some_and(|b| b.enemy_turn_pending)
    }

    /// The terminal summary, once `Finished`.
    #[must_use]
    pub fn outcome(&self) -> Option<GameOutcome> {
        self.battle.as_ref().and_then(|b| b.outcome)
    }

    /// Calculate a hash of the current game state.
    ///
    /// Two simulators that received the same seed and commands produce
    /// the same hash.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.phase.hash(&mut hasher);

        if let Some(battle) = &self.battle {
            battle.turn.hash(&mut hasher);
            battle.enemy_turn_pending.hash(&mut hasher);
            battle.grid.hash(&mut hasher);
            battle.player_pos.hash(&mut hasher);
            battle.player.hash(&mut hasher);
            battle.cooldowns.hash(&mut hasher);
            battle.underfoot.hash(&mut hasher);
            battle.outcome.hash(&mut hasher);
        }

        hasher.finish()
    }

    /// Serialize the simulator, including the RNG position.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize simulator: {e}")))
    }

    /// Rebuild a simulator from [`snapshot`](Self::snapshot) bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn restore(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize simulator: {e}")))
    }

    #[cfg(feature = "debug-validation")]
    fn debug_validate(&self) {
        if let Some(battle) = &self.battle {
            let players = battle.grid.find_all(TileKind::Player);
            assert_eq!(players, vec![battle.player_pos], "player tile out of sync");
            assert!(battle.player.health <= battle.player.max_health);
        }
    }

    #[cfg(not(feature = "debug-validation"))]
    #[allow(clippy::unused_self)]
    fn debug_validate(&self) {}
}

impl Default for BattleSimulator {
    fn default() -> Self {
        Self::new(Catalog::standard())
    }
}

impl Battle {
    /// Vacate the current cell, resolve `tile` and place the player.
    fn apply_move(&mut self, catalog: &Catalog, target: Position, tile: &TileType) -> MoveReport {
        let from = self.player_pos;
        let left_behind = self
            .underfoot
            .take()
            .unwrap_or_else(|| catalog.tile(TileKind::Empty));
        self.grid.set(from, left_behind);

        let mut report = MoveReport {
            from,
            to: target,
            tile: tile.kind,
            damage: 0,
            healed: 0,
            score_gained: Fixed::ZERO,
            revealed: false,
            teleported: false,
        };
        let player = &mut self.player;
        let combo = player.combo;

        match tile.kind {
            TileKind::TreasureSmall | TileKind::TreasureMedium | TileKind::TreasureLarge => {
                report.score_gained = combo_scaled(tile.points.unwrap_or(0), combo, 1);
                player.add_combo(1);
            }
            TileKind::EnemyWeak
            | TileKind::EnemyMedium
            | TileKind::EnemyStrong
            | TileKind::EnemyArcher
            | TileKind::EnemyMage => {
                let mut damage =
                    mitigated(tile.damage.unwrap_or(0), player.armor, CONTACT_DAMAGE_FLOOR);
                if let Some(effect) = player.effects.consume(EffectKind::DoubleDamage) {
                    damage = damage.saturating_mul(effect.magnitude.max(1));
                }
                report.damage = player.take_damage(damage);
                if player.is_alive() {
                    player.kills += 1;
                    report.score_gained = combo_scaled(ENEMY_KILL_POINTS, combo, 2);
                    player.add_combo(1);
                }
            }
            TileKind::TrapVisible => {
                let damage = mitigated(tile.damage.unwrap_or(0), player.armor, CONTACT_DAMAGE_FLOOR);
                report.damage = player.take_damage(damage);
                player.reset_combo();
            }
            TileKind::TrapHidden => {
                let damage = mitigated(tile.damage.unwrap_or(0), player.armor, CONTACT_DAMAGE_FLOOR);
                report.damage = player.take_damage(damage);
                player.reset_combo();
                self.underfoot = Some(catalog.tile(TileKind::TrapVisible));
                report.revealed = true;
            }
            TileKind::HealSmall | TileKind::HealLarge => {
                report.healed = player.heal(tile.heal.unwrap_or(0));
                player.add_combo(1);
            }
            TileKind::Boss => {
                let damage = mitigated(tile.damage.unwrap_or(0), player.armor, BOSS_DAMAGE_FLOOR);
                report.damage = player.take_damage(damage);
                if player.is_alive() {
                    player.kills += 1;
                    report.score_gained = combo_scaled(tile.points.unwrap_or(0), combo, 3);
                    player.add_combo(3);
                }
            }
            TileKind::Quest => {
                report.score_gained = combo_scaled(tile.points.unwrap_or(0), combo, 2);
                player.add_combo(2);
            }
            TileKind::Armor => {
                player.armor += tile.armor.unwrap_or(0);
                player.add_combo(1);
            }
            TileKind::Weapon => {
                player.attack += tile.attack.unwrap_or(0);
                player.add_combo(1);
            }
            TileKind::Spawner => player.add_combo(2),
            TileKind::Portal | TileKind::Empty | TileKind::Player | TileKind::Wall => {
                player.reset_combo();
            }
        }
        player.score = player.score.saturating_add(report.score_gained);

        let mut destination = target;
        if tile.kind == TileKind::Portal {
            self.grid.set(target, catalog.tile(TileKind::Empty));
            if let Some(exit) = self.portal_exit(&[from, target]) {
                destination = exit;
                report.teleported = true;
            }
        }

        self.grid.set(destination, catalog.tile(TileKind::Player));
        self.player_pos = destination;
        report.to = destination;

        self.player.turns_left -= 1;
        self.turn += 1;
        self.enemy_turn_pending = true;

        report
    }

    /// A random empty cell other than the `excluded` ones.
    fn portal_exit(&mut self, excluded: &[Position]) -> Option<Position> {
        let size = self.grid.size();
        for _ in 0..PLACEMENT_ATTEMPTS {
            let pos = random_cell(&mut self.rng, size)?;
            if !excluded.contains(&pos) && self.grid.kind_at(pos) == Some(TileKind::Empty) {
                return Some(pos);
            }
        }
        tracing::debug!("Portal found no empty exit");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN: [&str; 10] = [
        "..........",
        "..........",
        "..........",
        "..........",
        "..........",
        ".....@t...",
        "..........",
        "..........",
        "..........",
        "..........",
    ];

    fn sim_with(rows: &[&str], loadout: Loadout) -> BattleSimulator {
        let catalog = Catalog::standard();
        let grid = Grid::parse(&catalog, rows).unwrap();
        let mut sim = BattleSimulator::new(catalog);
        sim.start_with_field("novice", grid, 7, loadout).unwrap();
        sim
    }

    #[test]
    fn test_new_simulator_in_menu() {
        let sim = BattleSimulator::default();
        assert_eq!(sim.phase(), GamePhase::Menu);
        assert!(sim.grid().is_none());
        assert_eq!(sim.turn(), 0);
    }

    #[test]
    fn test_start_generates_valid_field() {
        let mut sim = BattleSimulator::default();
        sim.start("warrior", 12, 3, Loadout::default()).unwrap();
        let grid = sim.grid().unwrap();
        assert_eq!(grid.size(), 12);
        assert_eq!(grid.find_all(TileKind::Player), vec![Position::new(6, 6)]);
        assert_eq!(sim.player().unwrap().turns_left, 30);
    }

    #[test]
    fn test_start_failure_reverts_to_menu() {
        let mut sim = BattleSimulator::default();
        let err = sim.start("novice", 9, 1, Loadout::default()).unwrap_err();
        assert!(matches!(err, GameError::InvalidGrid(_)));
        assert_eq!(sim.phase(), GamePhase::Menu);
        assert!(sim.grid().is_none());
    }

    #[test]
    fn test_unknown_difficulty() {
        let mut sim = BattleSimulator::default();
        assert!(matches!(
            sim.start("nightmare", 10, 1, Loadout::default()),
            Err(GameError::UnknownDifficulty(_))
        ));
    }

    #[test]
    fn test_cannot_start_twice() {
        let mut sim = sim_with(&OPEN, Loadout::default());
        assert!(matches!(
            sim.start("novice", 10, 1, Loadout::default()),
            Err(GameError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn test_move_requires_playing() {
        let mut sim = BattleSimulator::default();
        assert!(matches!(
            sim.attempt_move(Position::new(0, 0)),
            Err(GameError::InvalidPhase {
                expected: GamePhase::Playing,
                actual: GamePhase::Menu
            })
        ));
    }

    #[test]
    fn test_treasure_move_sets_pending() {
        let mut sim = sim_with(&OPEN, Loadout::default());
        let outcome = sim.attempt_move(Position::new(6, 5)).unwrap();
        let MoveOutcome::Moved(report) = outcome else {
            panic!("expected a move");
        };
        assert_eq!(report.score_gained, Fixed::from_num(25));
        assert!(sim.enemy_turn_pending());
        assert!(matches!(
            sim.attempt_move(Position::new(7, 5)),
            Err(GameError::TurnPending)
        ));
        sim.resolve_enemy_turn().unwrap();
        assert!(matches!(
            sim.resolve_enemy_turn(),
            Err(GameError::NoPendingTurn)
        ));
    }

    #[test]
    fn test_inspect_and_out_of_bounds() {
        let mut sim = sim_with(&OPEN, Loadout::default());
        let before = sim.state_hash();
        assert_eq!(
            sim.attempt_move(Position::new(0, 0)).unwrap(),
            MoveOutcome::Inspected {
                target: Position::new(0, 0),
                kind: TileKind::Empty
            }
        );
        assert!(matches!(
            sim.attempt_move(Position::new(10, 5)),
            Err(GameError::OutOfBounds(_))
        ));
        assert_eq!(sim.state_hash(), before);
    }

    #[test]
    fn test_hidden_trap_left_visible() {
        let rows = [
            "..........",
            "..........",
            "..........",
            "..........",
            "..........",
            ".....@~...",
            "..........",
            "..........",
            "..........",
            "..........",
        ];
        let mut sim = sim_with(&rows, Loadout::default());
        sim.step(Position::new(6, 5)).unwrap();
        assert_eq!(sim.player().unwrap().health, 85);
        sim.step(Position::new(7, 5)).unwrap();
        assert_eq!(
            sim.grid().unwrap().kind_at(Position::new(6, 5)),
            Some(TileKind::TrapVisible)
        );
        sim.step(Position::new(6, 5)).unwrap();
        assert_eq!(sim.player().unwrap().health, 75);
    }

    #[test]
    fn test_ability_errors() {
        let mut sim = sim_with(&OPEN, Loadout::default().with_ability("time_slow", 1));
        assert!(matches!(sim.use_ability("fireball"), Err(GameError::UnknownAbility(_))));
        assert!(matches!(
            sim.use_ability("damage_boost"),
            Err(GameError::AbilityNotActive(_))
        ));
        assert!(matches!(
            sim.use_ability("double_strike"),
            Err(GameError::AbilityLocked(_))
        ));
        let used = sim.use_ability("time_slow").unwrap();
        assert_eq!(used.effect.kind, EffectKind::Slow);
        assert_eq!(used.effect.duration, 3);
        assert!(matches!(
            sim.use_ability("time_slow"),
            Err(GameError::AbilityOnCooldown { remaining: 8, .. })
        ));
    }

    #[test]
    fn test_healing_aura_heals_on_activation() {
        let mut sim = sim_with(&OPEN, Loadout::default().with_ability("healing_aura", 1));
        if let Some(battle) = sim.battle.as_mut() {
            battle.player.health = 50;
        }
        let used = sim.use_ability("healing_aura").unwrap();
        assert_eq!(used.healed, 15);
        assert_eq!(sim.player().unwrap().health, 65);

        // First tick: duration 5 > 1, heals again.
        let report = sim.step(Position::new(6, 5)).unwrap();
        assert_eq!(report.enemy.unwrap().healed, 15);
    }

    #[test]
    fn test_abandon_returns_to_menu() {
        let mut sim = sim_with(&OPEN, Loadout::default());
        sim.abandon();
        assert_eq!(sim.phase(), GamePhase::Menu);
        assert!(sim.player().is_none());
        sim.start("novice", 10, 5, Loadout::default()).unwrap();
        assert_eq!(sim.phase(), GamePhase::Playing);
    }

    #[test]
    fn test_portal_teleports_to_empty_cell() {
        let rows = [
            "..........",
            "..........",
            "..........",
            "..........",
            "..........",
            ".....@O...",
            "..........",
            "..........",
            "..........",
            "..........",
        ];
        let mut sim = sim_with(&rows, Loadout::default());
        let MoveOutcome::Moved(report) = sim.attempt_move(Position::new(6, 5)).unwrap() else {
            panic!("expected a move");
        };
        assert!(report.teleported);
        let grid = sim.grid().unwrap();
        assert_eq!(grid.count(TileKind::Portal), 0);
        assert_eq!(grid.find_all(TileKind::Player), vec![report.to]);
        assert_eq!(sim.player_position(), Some(report.to));
    }

    #[test]
    fn test_portal_never_exits_on_itself_or_origin() {
        let rows = [
            "..........",
            "..........",
            "..........",
            "..........",
            "..........",
            ".....@O...",
            "..........",
            "..........",
            "..........",
            "..........",
        ];
        let catalog = Catalog::standard();
        let portal = Position::new(6, 5);
        let origin = Position::new(5, 5);
        for seed in 0..500 {
            let grid = Grid::parse(&catalog, &rows).unwrap();
            let mut sim = BattleSimulator::new(catalog.clone());
            sim.start_with_field("novice", grid, seed, Loadout::default())
                .unwrap();
            let MoveOutcome::Moved(report) = sim.attempt_move(portal).unwrap() else {
                panic!("expected a move");
            };
            assert!(report.teleported, "seed {seed} found no exit");
            assert_ne!(report.to, portal, "seed {seed}");
            assert_ne!(report.to, origin, "seed {seed}");
            assert_eq!(sim.grid().unwrap().kind_at(origin), Some(TileKind::Empty));
        }
    }

    #[test]
    fn test_huge_points_saturate_score() {
        let mut catalog = Catalog::standard();
        for tile in &mut catalog.tiles {
            if tile.kind == TileKind::Quest {
                tile.points = Some(2_000_000_000);
            }
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rich.ron");
        std::fs::write(&path, catalog.to_ron_string().unwrap()).unwrap();
        let catalog = Catalog::load(&path).unwrap();
        let rows = [
            "..........",
            "..........",
            "..........",
            "..........",
            "..........",
            ".....@?...",
            "......?...",
            "..........",
            "..........",
            "..........",
        ];
        let grid = Grid::parse(&catalog, &rows).unwrap();
        let mut sim = BattleSimulator::new(catalog);
        sim.start_with_field("novice", grid, 7, Loadout::default())
            .unwrap();

        sim.step(Position::new(6, 5)).unwrap();
        assert_eq!(sim.player().unwrap().display_score(), 2_000_000_000);

        // Combo 2 pushes the second scroll past the fixed-point range.
        let MoveOutcome::Moved(report) = sim.attempt_move(Position::new(6, 6)).unwrap() else {
            panic!("expected a move");
        };
        assert_eq!(report.score_gained, Fixed::MAX);
        let player = sim.player().unwrap();
        assert_eq!(player.score, Fixed::MAX);
        assert_eq!(player.display_score(), 2_147_483_647);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut sim = sim_with(&OPEN, Loadout::default());
        sim.step(Position::new(6, 5)).unwrap();
        let data = sim.snapshot().unwrap();
        let mut restored = BattleSimulator::restore(&data).unwrap();
        assert_eq!(restored.state_hash(), sim.state_hash());

        sim.step(Position::new(6, 4)).unwrap();
        restored.step(Position::new(6, 4)).unwrap();
        assert_eq!(restored.state_hash(), sim.state_hash());
    }

    #[test]
    fn test_last_move_finishes_without_enemy_turn() {
        let rows = [
            "..........",
            "..........",
            "..........",
            "..........",
            "....w.....",
            "....w@....",
            "..........",
            "..........",
            "..........",
            "..........",
        ];
        let mut sim = sim_with(&rows, Loadout::default());
        if let Some(battle) = sim.battle.as_mut() {
            battle.player.turns_left = 1;
        }
        let report = sim.step(Position::new(6, 5)).unwrap();
        assert!(report.enemy.is_none());
        assert_eq!(sim.phase(), GamePhase::Finished);
        let outcome = sim.outcome().unwrap();
        assert!(outcome.survived);
        assert_eq!(outcome.turns_elapsed, 1);
        assert!(!sim.enemy_turn_pending());
    }
}
