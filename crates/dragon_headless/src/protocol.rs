//! JSON protocol for headless play.
//!
//! The runner talks JSON lines (one JSON object per line):
//!
//! **Input (stdin):** Requests from the controlling bot
//! **Output (stdout):** Responses and state updates
//!
//! # Protocol Flow
//!
//! 1. Runner starts a battle and outputs `{"type":"ready",...}` with the
//!    initial state
//! 2. The bot sends `move` requests; an accepted move answers `moved`
//! 3. Unless the runner resolves enemy turns itself, the bot sends
//!    `end_turn` and receives `enemy_turn`
//! 4. When the battle ends the runner outputs `game_over` with the payout
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","state":{...}}
//! -> {"cmd":"move","x":5,"y":4}
//! <- {"type":"moved","report":{...},"turns_left":19,"health":100}
//! -> {"cmd":"end_turn"}
//! <- {"type":"enemy_turn","report":{...},"health":100}
//! -> {"cmd":"move","x":3,"y":3}
//! <- {"type":"inspected","x":3,"y":3,"kind":"TreasureSmall"}
//! -> {"cmd":"hash"}
//! <- {"type":"state_hash","turn":1,"hash":1234567}
//! ```

use dragon_core::prelude::*;
use dragon_core::simulation::{AbilityUse, MoveReport};
use serde::{Deserialize, Serialize};

/// Protocol version reported in `ready`.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Requests (Bot -> Runner)
// ============================================================================

/// Requests a bot can send to the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    /// Move to (or inspect) a cell.
    Move { x: usize, y: usize },

    /// Activate an owned ability.
    Ability { id: String },

    /// Resolve the pending enemy phase.
    EndTurn,

    /// Report the current state without changing it.
    Query,

    /// Report the state hash (for determinism checks).
    Hash,

    /// Start another battle after the previous one ended.
    Start {
        #[serde(default)]
        difficulty: Option<String>,
        #[serde(default)]
        seed: Option<u64>,
    },

    /// Stop the runner.
    Quit,
}

impl Request {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Request name, echoed in error responses.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Ability { .. } => "ability",
            Self::EndTurn => "end_turn",
            Self::Query => "query",
            Self::Hash => "hash",
            Self::Start { .. } => "start",
            Self::Quit => "quit",
        }
    }
}

// ============================================================================
// Output Responses (Runner -> Bot)
// ============================================================================

/// Responses sent by the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// A battle is running and requests are accepted.
    Ready { version: String, state: BattleState },

    /// A move was applied.
    Moved {
        report: MoveReport,
        turns_left: u32,
        health: u32,
    },

    /// The target is a wall; nothing changed.
    Blocked { x: usize, y: usize },

    /// The target is not adjacent; nothing changed.
    Inspected { x: usize, y: usize, kind: TileKind },

    /// An ability was activated.
    AbilityUsed { usage: AbilityUse },

    /// The enemy phase ran.
    EnemyTurn {
        report: EnemyTurnReport,
        health: u32,
    },

    /// Current battle state.
    State { state: BattleState },

    /// State hash for determinism verification.
    StateHash { turn: u32, hash: u64 },

    /// The battle ended and was paid out.
    GameOver {
        outcome: GameOutcome,
        reward: u64,
        balance: u64,
    },

    /// A request could not be processed.
    Error {
        message: String,
        cmd: Option<String>,
    },

    /// Goodbye message before shutdown.
    Bye,
}

// ============================================================================
// State Types
// ============================================================================

/// Snapshot of a battle as seen by a bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleState {
    pub phase: GamePhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    pub turn: u32,
    pub enemy_turn_pending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerView>,
    /// Rows of glyphs, top row first. Hidden traps show as floor.
    pub field: Vec<String>,
    pub hash: u64,
}

/// The dragon's visible stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub x: usize,
    pub y: usize,
    pub health: u32,
    pub max_health: u32,
    pub armor: u32,
    pub attack: u32,
    pub turns_left: u32,
    pub score: u64,
    pub kills: u32,
    pub combo: u32,
    pub cooldowns: Vec<CooldownView>,
}

/// Remaining cooldown of one ability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownView {
    pub id: String,
    pub remaining: u32,
}

impl BattleState {
    /// Capture what a bot may see of the simulator.
    pub fn capture(sim: &BattleSimulator) -> Self {
        let player = match (sim.player(), sim.player_position()) {
            (Some(p), Some(pos)) => Some(PlayerView {
                x: pos.x,
                y: pos.y,
                health: p.health,
                max_health: p.max_health,
                armor: p.armor,
                attack: p.attack,
                turns_left: p.turns_left,
                score: p.display_score(),
                kills: p.kills,
                combo: p.combo,
                cooldowns: sim
                    .cooldowns()
                    .map(|c| {
                        c.iter()
                            .filter(|(_, remaining)| *remaining > 0)
                            .map(|(id, remaining)| CooldownView {
                                id: id.to_string(),
                                remaining,
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            }),
            _ => None,
        };

        Self {
            phase: sim.phase(),
            difficulty: sim.preset().map(|p| p.id.clone()),
            turn: sim.turn(),
            enemy_turn_pending: sim.enemy_turn_pending(),
            player,
            field: sim.grid().map(visible_rows).unwrap_or_default(),
            hash: sim.state_hash(),
        }
    }
}

/// Grid rows with hidden traps drawn as floor.
fn visible_rows(grid: &Grid) -> Vec<String> {
    let size = grid.size();
    (0..size)
        .map(|y| {
            (0..size)
                .map(|x| match grid.kind_at(Position::new(x, y)) {
                    Some(TileKind::TrapHidden) | None => TileKind::Empty.glyph(),
                    Some(kind) => kind.glyph(),
                })
                .collect()
        })
        .collect()
}

// ============================================================================
// Helpers
// ============================================================================

impl Response {
    /// Create a ready response.
    pub fn ready(sim: &BattleSimulator) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            state: BattleState::capture(sim),
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_move_request() {
        let req = Request::from_json(r#"{"cmd":"move","x":4,"y":5}"#).unwrap();
        assert_eq!(req, Request::Move { x: 4, y: 5 });
        assert_eq!(req.name(), "move");
    }

    #[test]
    fn test_parse_unit_requests() {
        assert_eq!(
            Request::from_json(r#"{"cmd":"end_turn"}"#).unwrap(),
            Request::EndTurn
        );
        assert_eq!(Request::from_json(r#"{"cmd":"quit"}"#).unwrap(), Request::Quit);
    }

    #[test]
    fn test_start_fields_default() {
        let req = Request::from_json(r#"{"cmd":"start"}"#).unwrap();
        assert_eq!(
            req,
            Request::Start {
                difficulty: None,
                seed: None
            }
        );
    }

    #[test]
    fn test_unknown_request_rejected() {
        assert!(Request::from_json(r#"{"cmd":"teleport"}"#).is_err());
    }

    #[test]
    fn test_error_line_format() {
        let line = Response::error("bad", Some("move")).to_json_line();
        assert!(line.ends_with('\n'));
        assert!(line.contains(r#""type":"error""#));
        assert!(line.contains(r#""cmd":"move""#));
    }

    #[test]
    fn test_state_hides_hidden_traps() {
        let catalog = Catalog::standard();
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
        let grid = Grid::parse(&catalog, &rows).unwrap();
        assert_eq!(grid.kind_at(Position::new(6, 5)), Some(TileKind::TrapHidden));

        let mut sim = BattleSimulator::new(catalog);
        sim.start_with_field("novice", grid, 1, Loadout::default())
            .unwrap();
        let state = BattleState::capture(&sim);
        assert_eq!(state.field[5], ".....@....");
        assert_eq!(state.player.as_ref().map(|p| (p.x, p.y)), Some((5, 5)));
        assert_eq!(state.hash, sim.state_hash());
    }
}
