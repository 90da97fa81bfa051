//! Headless game runner implementation.

use std::io::{BufRead, Write};

use dragon_core::math::Position;
use dragon_core::session::{GameSession, ProgressStore};
use dragon_core::simulation::{GamePhase, MoveOutcome};
use tracing::{debug, info, warn};

use crate::error::{HeadlessError, Result};
use crate::protocol::{BattleState, Request, Response};

/// Headless runner configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessConfig {
    /// Difficulty for the first battle (and `start` without one).
    pub difficulty: String,
    /// Viewport width used to size the field.
    pub viewport_width: u32,
    /// Seed of the first battle; later battles count up from it.
    pub seed: u64,
    /// Resolve the enemy phase right after every accepted move instead
    /// of waiting for `end_turn`.
    pub auto_end_turn: bool,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            difficulty: "novice".to_string(),
            viewport_width: 1920,
            seed: 0,
            auto_end_turn: false,
        }
    }
}

/// Drives one [`GameSession`] from JSON requests.
pub struct HeadlessRunner<S: ProgressStore> {
    config: HeadlessConfig,
    session: GameSession<S>,
    battles_started: u64,
}

impl<S: ProgressStore> HeadlessRunner<S> {
    /// Start the first battle.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured battle cannot start.
    pub fn new(session: GameSession<S>, config: HeadlessConfig) -> Result<Self> {
        let mut runner = Self {
            config,
            session,
            battles_started: 0,
        };
        let difficulty = runner.config.difficulty.clone();
        runner.start_battle(&difficulty, runner.config.seed)?;
        Ok(runner)
    }

    /// Run the request loop until `quit` or end of input.
    ///
    /// Writes `ready` first, then one or more responses per request.
    ///
    /// # Errors
    ///
    /// Only IO failures on the streams end the loop early; bad requests
    /// are answered with `error` responses.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> Result<()> {
        let stream_err = |e| HeadlessError::io("<stdio>", e);
        output
            .write_all(Response::ready(self.session.simulator()).to_json_line().as_bytes())
            .map_err(stream_err)?;
        output.flush().map_err(stream_err)?;

        for line in input.lines() {
            let line = line.map_err(stream_err)?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (responses, quit) = match Request::from_json(line) {
                Ok(request) => self.handle(request),
                Err(e) => {
                    warn!(error = %e, "Unparseable request");
                    (
                        vec![Response::error(format!("Invalid request: {e}"), None)],
                        false,
                    )
                }
            };
            for response in responses {
                output
                    .write_all(response.to_json_line().as_bytes())
                    .map_err(stream_err)?;
            }
            output.flush().map_err(stream_err)?;

            if quit {
                break;
            }
        }
        info!(battles = self.battles_started, "Runner stopped");
        Ok(())
    }

    /// Process one request. Returns the responses and whether to stop.
    pub fn handle(&mut self, request: Request) -> (Vec<Response>, bool) {
        let name = request.name();
        debug!(cmd = name, "Request");
        match self.dispatch(request) {
            Ok(result) => result,
            Err(e) => (vec![Response::error(e.to_string(), Some(name))], false),
        }
    }

    fn dispatch(&mut self, request: Request) -> Result<(Vec<Response>, bool)> {
        let mut responses = Vec::new();
        match request {
            Request::Move { x, y } => {
                let sim = self.session.simulator_mut();
                match sim.attempt_move(Position::new(x, y))? {
                    MoveOutcome::Inspected { target, kind } => {
                        responses.push(Response::Inspected {
                            x: target.x,
                            y: target.y,
                            kind,
                        });
                    }
                    MoveOutcome::Blocked { target } => {
                        responses.push(Response::Blocked {
                            x: target.x,
                            y: target.y,
                        });
                    }
                    MoveOutcome::Moved(report) => {
                        let player = sim.player();
                        responses.push(Response::Moved {
                            report,
                            turns_left: player.map_or(0, |p| p.turns_left),
                            health: player.map_or(0, |p| p.health),
                        });
                        if self.config.auto_end_turn && sim.enemy_turn_pending() {
                            responses.push(self.enemy_turn()?);
                        }
                    }
                }
            }
            Request::Ability { id } => {
                let usage = self.session.simulator_mut().use_ability(&id)?;
                responses.push(Response::AbilityUsed { usage });
            }
            Request::EndTurn => responses.push(self.enemy_turn()?),
            Request::Query => responses.push(Response::State {
                state: BattleState::capture(self.session.simulator()),
            }),
            Request::Hash => {
                let sim = self.session.simulator();
                responses.push(Response::StateHash {
                    turn: sim.turn(),
                    hash: sim.state_hash(),
                });
            }
            Request::Start { difficulty, seed } => {
                let difficulty = difficulty.unwrap_or_else(|| self.config.difficulty.clone());
                let seed = seed.unwrap_or_else(|| self.config.seed.wrapping_add(self.battles_started));
                self.start_battle(&difficulty, seed)?;
                responses.push(Response::ready(self.session.simulator()));
            }
            Request::Quit => return Ok((vec![Response::Bye], true)),
        }

        if self.session.simulator().phase() == GamePhase::Finished {
            let summary = self.session.finish_battle()?;
            info!(
                survived = summary.outcome.survived,
                score = summary.outcome.score,
                reward = summary.reward,
                balance = summary.balance,
                "Battle over"
            );
            responses.push(Response::GameOver {
                outcome: summary.outcome,
                reward: summary.reward,
                balance: summary.balance,
            });
        }
        Ok((responses, false))
    }

    fn enemy_turn(&mut self) -> Result<Response> {
        let sim = self.session.simulator_mut();
        let report = sim.resolve_enemy_turn()?;
        Ok(Response::EnemyTurn {
            report,
            health: sim.player().map_or(0, |p| p.health),
        })
    }

    fn start_battle(&mut self, difficulty: &str, seed: u64) -> Result<()> {
        self.session
            .start_battle(difficulty, self.config.viewport_width, seed)?;
        self.battles_started += 1;
        info!(difficulty, seed, "Battle started");
        Ok(())
    }

    /// The session being driven.
    pub fn session(&self) -> &GameSession<S> {
        &self.session
    }

    /// Stop and hand back the session.
    pub fn into_session(self) -> GameSession<S> {
        self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dragon_core::catalog::Catalog;
    use dragon_core::session::MemoryStore;

    fn runner(auto_end_turn: bool) -> HeadlessRunner<MemoryStore> {
        let session = GameSession::load(MemoryStore::with_coins(10), Catalog::standard()).unwrap();
        let config = HeadlessConfig {
            seed: 42,
            auto_end_turn,
            ..HeadlessConfig::default()
        };
        HeadlessRunner::new(session, config).unwrap()
    }

    fn player_xy(runner: &HeadlessRunner<MemoryStore>) -> (usize, usize) {
        let pos = runner.session().simulator().player_position().unwrap();
        (pos.x, pos.y)
    }

    #[test]
    fn test_move_then_end_turn() {
        let mut runner = runner(false);
        let (x, y) = player_xy(&runner);

        let (responses, quit) = runner.handle(Request::Move { x: x + 1, y });
        assert!(!quit);
        assert!(matches!(responses[0], Response::Moved { turns_left, .. } if turns_left == 24));

        // A second move before the enemy phase is refused.
        let (responses, _) = runner.handle(Request::Move { x, y });
        assert!(matches!(&responses[0], Response::Error { cmd: Some(cmd), .. } if cmd == "move"));

        let (responses, _) = runner.handle(Request::EndTurn);
        assert!(matches!(responses[0], Response::EnemyTurn { .. }));
    }

    #[test]
    fn test_auto_end_turn() {
        let mut runner = runner(true);
        let (x, y) = player_xy(&runner);
        let (responses, _) = runner.handle(Request::Move { x, y: y - 1 });
        assert_eq!(responses.len(), 2);
        assert!(matches!(responses[1], Response::EnemyTurn { .. }));
        assert!(!runner.session().simulator().enemy_turn_pending());
    }

    #[test]
    fn test_inspect_and_hash_leave_state_alone() {
        let mut runner = runner(false);
        let before = runner.session().simulator().state_hash();
        let (responses, _) = runner.handle(Request::Move { x: 0, y: 0 });
        assert!(matches!(responses[0], Response::Inspected { x: 0, y: 0, .. }));
        let (responses, _) = runner.handle(Request::Hash);
        assert_eq!(
            responses,
            vec![Response::StateHash {
                turn: 0,
                hash: before
            }]
        );
    }

    #[test]
    fn test_full_game_pays_out() {
        let mut runner = runner(true);
        let mut game_over = None;
        let mut forward = true;
        for _ in 0..25 {
            let (x, y) = player_xy(&runner);
            let target = if forward { (x + 1, y) } else { (x - 1, y) };
            forward = !forward;
            let (responses, _) = runner.handle(Request::Move {
                x: target.0,
                y: target.1,
            });
            if let Some(Response::GameOver { reward, balance, .. }) = responses.last() {
                game_over = Some((*reward, *balance));
                break;
            }
        }
        let (reward, balance) = game_over.expect("novice ends after 25 moves");
        assert_eq!(balance, 10 + reward);
        assert_eq!(runner.session().coins(), balance);
        assert_eq!(runner.session().simulator().phase(), GamePhase::Menu);

        // The next battle needs an explicit start.
        let (responses, _) = runner.handle(Request::Query);
        assert!(matches!(&responses[0], Response::State { state } if state.phase == GamePhase::Menu));
        let (responses, _) = runner.handle(Request::Start {
            difficulty: Some("warrior".to_string()),
            seed: None,
        });
        assert!(matches!(responses[0], Response::Ready { .. }));
    }

    #[test]
    fn test_run_loop_over_streams() {
        let mut runner = runner(false);
        let input = "{\"cmd\":\"query\"}\n\nnot json\n{\"cmd\":\"quit\"}\n{\"cmd\":\"query\"}\n";
        let mut output = Vec::new();
        runner.run(input.as_bytes(), &mut output).unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains(r#""type":"ready""#));
        assert!(lines[1].contains(r#""type":"state""#));
        assert!(lines[2].contains(r#""type":"error""#));
        assert!(lines[3].contains(r#""type":"bye""#));
    }
}
