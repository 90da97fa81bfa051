//! End-to-end flows: protocol play against a progress file, the shop,
//! and bot determinism across seeds.

use dragon_core::catalog::Catalog;
use dragon_core::session::{GameSession, ProgressStore};
use dragon_headless::batch::{play_game, BatchConfig, GameSetup};
use dragon_headless::protocol::{Request, Response};
use dragon_headless::runner::{HeadlessConfig, HeadlessRunner};
use dragon_headless::store::JsonFileStore;
use dragon_headless::strategies::Strategy;
use dragon_test_utils::determinism::strategies::{arb_difficulty_id, arb_seed};
use dragon_test_utils::determinism::verify_determinism;
use dragon_test_utils::proptest::prelude::*;

/// Drive a whole battle over the protocol and return the final reward.
fn play_out(runner: &mut HeadlessRunner<JsonFileStore>) -> u64 {
    let mut forward = true;
    for _ in 0..100 {
        let pos = runner
            .session()
            .simulator()
            .player_position()
            .expect("battle running");
        let x = if forward { pos.x + 1 } else { pos.x - 1 };
        forward = !forward;
        let (responses, _) = runner.handle(Request::Move { x, y: pos.y });
        if let Some(Response::GameOver { reward, .. }) = responses.last() {
            return *reward;
        }
    }
    panic!("battle did not end");
}

#[test]
fn test_rewards_persist_between_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progress.json");
    let config = HeadlessConfig {
        seed: 5,
        auto_end_turn: true,
        ..HeadlessConfig::default()
    };

    let session = GameSession::load(JsonFileStore::new(&path), Catalog::standard()).unwrap();
    let mut runner = HeadlessRunner::new(session, config).unwrap();
    let reward = play_out(&mut runner);

    let reopened = JsonFileStore::new(&path);
    assert_eq!(reopened.load_currency().unwrap(), reward);
}

#[test]
fn test_purchase_changes_next_battle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progress.json");
    let mut store = JsonFileStore::new(&path);
    store.save_currency(1_000).unwrap();

    let mut session = GameSession::load(store, Catalog::standard()).unwrap();
    let bought = session.purchase_ability("health_boost", "2026-10-17 12:00:00").unwrap();
    assert_eq!(bought.price, 250);
    drop(session);

    let session = GameSession::load(JsonFileStore::new(&path), Catalog::standard()).unwrap();
    assert_eq!(session.coins(), 750);
    let history = session.history();
    assert_eq!(history.len(), 1);
    assert_eq!((history[0].level, history[0].price), (1, 250));
    assert_eq!(history[0].timestamp, "2026-10-17 12:00:00");
    let runner = HeadlessRunner::new(session, HeadlessConfig::default()).unwrap();
    let player = runner.session().simulator().player().unwrap();
    assert_eq!(player.max_health, 120);
}

#[test]
fn test_bot_games_repeat_exactly() {
    let catalog = Catalog::standard();
    let setup = GameSetup::resolve(
        &catalog,
        &BatchConfig::new("warrior", 1).with_strategy(Strategy::Random),
    )
    .unwrap();

    let result = verify_determinism(
        3,
        1,
        || None,
        |slot: &mut Option<u64>, _| {
            let (metrics, _) = play_game(&catalog, &setup, 99).unwrap();
            *slot = Some(metrics.final_state_hash);
        },
        |slot| slot.unwrap_or(0),
    );
    result.assert_deterministic();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Every strategy finishes every seed and its replay verifies.
    #[test]
    fn prop_bots_finish_and_replay(difficulty in arb_difficulty_id(), seed in arb_seed()) {
        let catalog = Catalog::standard();
        for strategy in Strategy::ALL {
            let config = BatchConfig::new(difficulty, 1).with_strategy(strategy);
            let setup = GameSetup::resolve(&catalog, &config).unwrap();
            let (metrics, replay) = play_game(&catalog, &setup, seed).unwrap();
            let preset = catalog.difficulty(difficulty).unwrap();
            prop_assert!(metrics.outcome.turns_elapsed <= preset.total_turns);
            prop_assert!(replay.verify(catalog.clone()).unwrap());
        }
    }
}
