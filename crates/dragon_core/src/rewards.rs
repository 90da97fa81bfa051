//! Coin payout for a finished game.
//!
//! All calculations use integer math: a survivor's score bonus is half the
//! floored score, and a failed run earns 30 % of the preset reward scaled
//! by how much of the turn budget was used.

use crate::catalog::DifficultyPreset;
use crate::simulation::GameOutcome;

/// Coins per kill for a survivor.
pub const KILL_BONUS: u64 = 20;

/// Coins per point of max combo for a survivor.
pub const COMBO_BONUS: u64 = 10;

/// Partial-credit share of the preset reward, in tenths.
pub const PARTIAL_CREDIT_TENTHS: u64 = 3;

/// Coins earned for `outcome`.
///
/// Survivors get `reward + score / 2 + kills × 20 + max_combo × 10`.
/// Everyone else gets `reward × turns_elapsed / total_turns × 0.3`,
/// rounded down, with no score, kill or combo bonus.
#[must_use]
pub fn compute_reward(preset: &DifficultyPreset, outcome: &GameOutcome) -> u64 {
    if outcome.survived {
        preset
            .reward
            .saturating_add(outcome.score / 2)
            .saturating_add(u64::from(outcome.kills) * KILL_BONUS)
            .saturating_add(u64::from(outcome.max_combo) * COMBO_BONUS)
    } else {
        partial_credit(preset.reward, outcome.turns_elapsed, preset.total_turns)
    }
}

fn partial_credit(reward: u64, turns_elapsed: u32, total_turns: u32) -> u64 {
    if total_turns == 0 {
        return 0;
    }
    let numerator = u128::from(reward) * u128::from(turns_elapsed) * u128::from(PARTIAL_CREDIT_TENTHS);
    let denominator = u128::from(total_turns) * 10;
    u64::try_from(numerator / denominator).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn outcome(survived: bool, score: u64, kills: u32, max_combo: u32, turns: u32) -> GameOutcome {
        GameOutcome {
            survived,
            score,
            kills,
            max_combo,
            turns_elapsed: turns,
        }
    }

    #[test]
    fn test_survivor_reward() {
        let catalog = Catalog::standard();
        let novice = catalog.difficulty("novice").unwrap();
        // 100 + 137 / 2 + 3 × 20 + 4 × 10
        assert_eq!(compute_reward(novice, &outcome(true, 137, 3, 4, 25)), 268);
    }

    #[test]
    fn test_failure_reward_is_partial_credit() {
        let catalog = Catalog::standard();
        let warrior = catalog.difficulty("warrior").unwrap();
        // floor(250 × 12 / 30 × 0.3) = 30, bonuses ignored
        assert_eq!(compute_reward(warrior, &outcome(false, 900, 9, 9, 12)), 30);

        let legend = catalog.difficulty("legend").unwrap();
        // floor(1000 × 7 / 40 × 0.3) = floor(52.5)
        assert_eq!(compute_reward(legend, &outcome(false, 0, 0, 0, 7)), 52);
    }

    #[test]
    fn test_failure_on_first_turn_can_pay_nothing() {
        let catalog = Catalog::standard();
        let novice = catalog.difficulty("novice").unwrap();
        // floor(100 × 1 / 25 × 0.3) = floor(1.2)
        assert_eq!(compute_reward(novice, &outcome(false, 0, 0, 0, 1)), 1);
        assert_eq!(compute_reward(novice, &outcome(false, 0, 0, 0, 0)), 0);
    }

    #[test]
    fn test_zero_turn_budget() {
        let mut preset = Catalog::standard().difficulties[0].clone();
        preset.total_turns = 0;
        assert_eq!(compute_reward(&preset, &outcome(false, 0, 0, 0, 0)), 0);
    }
}
