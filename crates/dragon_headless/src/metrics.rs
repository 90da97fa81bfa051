//! Per-game metrics and batch aggregates.

use dragon_core::simulation::GameOutcome;
use serde::{Deserialize, Serialize};

use crate::strategies::Strategy;

/// What one bot game produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameMetrics {
    /// Seed the game was generated from.
    pub seed: u64,
    /// Bot that played.
    pub strategy: Strategy,
    /// Terminal state.
    pub outcome: GameOutcome,
    /// Coins the game paid out.
    pub reward: u64,
    /// Commands the bot issued, abilities included.
    pub commands: u32,
    /// Abilities activated.
    pub abilities_used: u32,
    /// Health left at the end.
    pub final_health: u32,
    /// State hash at the end.
    pub final_state_hash: u64,
}

/// Aggregate statistics over a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Games that finished.
    pub total_games: u32,
    /// Games survived to the last turn.
    pub survived: u32,
    /// `survived / total_games`.
    pub survival_rate: f64,
    /// Mean final score.
    pub avg_score: f64,
    /// Mean payout.
    pub avg_reward: f64,
    /// Mean kills.
    pub avg_kills: f64,
    /// Mean turns played.
    pub avg_turns: f64,
    /// Best score seen.
    pub max_score: u64,
    /// Seed of the best-scoring game.
    pub best_seed: Option<u64>,
}

impl BatchSummary {
    /// Calculate summary from a list of game metrics.
    #[must_use]
    pub fn from_games(games: &[GameMetrics]) -> Self {
        if games.is_empty() {
            return Self::default();
        }

        let n = games.len() as f64;
        let mean = |f: fn(&GameMetrics) -> f64| games.iter().map(f).sum::<f64>() / n;
        let survived = games.iter().filter(|g| g.outcome.survived).count() as u32;
        let best = games
            .iter()
            .max_by(|a, b| {
                a.outcome
                    .score
                    .cmp(&b.outcome.score)
                    .then(b.seed.cmp(&a.seed))
            });

        Self {
            total_games: games.len() as u32,
            survived,
            survival_rate: f64::from(survived) / n,
            avg_score: mean(|g: &GameMetrics| g.outcome.score as f64),
            avg_reward: mean(|g: &GameMetrics| g.reward as f64),
            avg_kills: mean(|g: &GameMetrics| f64::from(g.outcome.kills)),
            avg_turns: mean(|g: &GameMetrics| f64::from(g.outcome.turns_elapsed)),
            max_score: best.map_or(0, |g| g.outcome.score),
            best_seed: best.map(|g| g.seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(seed: u64, survived: bool, score: u64, reward: u64) -> GameMetrics {
        GameMetrics {
            seed,
            strategy: Strategy::Greedy,
            outcome: GameOutcome {
                survived,
                score,
                kills: 2,
                max_combo: 1,
                turns_elapsed: 20,
            },
            reward,
            commands: 20,
            abilities_used: 0,
            final_health: if survived { 50 } else { 0 },
            final_state_hash: seed,
        }
    }

    #[test]
    fn test_empty_summary() {
        let summary = BatchSummary::from_games(&[]);
        assert_eq!(summary.total_games, 0);
        assert_eq!(summary.best_seed, None);
    }

    #[test]
    fn test_summary_aggregates() {
        let games = [
            game(1, true, 300, 200),
            game(2, false, 100, 30),
            game(3, true, 300, 220),
            game(4, true, 200, 150),
        ];
        let summary = BatchSummary::from_games(&games);
        assert_eq!(summary.total_games, 4);
        assert_eq!(summary.survived, 3);
        assert!((summary.survival_rate - 0.75).abs() < 1e-9);
        assert!((summary.avg_score - 225.0).abs() < 1e-9);
        assert!((summary.avg_reward - 150.0).abs() < 1e-9);
        assert!((summary.avg_kills - 2.0).abs() < 1e-9);
        assert_eq!(summary.max_score, 300);
        // Ties go to the lower seed.
        assert_eq!(summary.best_seed, Some(1));
    }
}
