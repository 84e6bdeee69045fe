//! Smoke tests: full seeded matches driven through the reducer.
//!
//! Each test replays a complete match (pre-match countdowns plus five
//! rounds) with a fixed RNG seed and checks the engine-wide guarantees
//! hold at every tick, not just at the end.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;

use bvb_engine::engine::reducer::{reduce, Command, Effect, Event};
use bvb_engine::engine::state::{Config, MatchState, Phase};
use bvb_engine::results;

fn seeded(seed: u64) -> (MatchState, Config, StdRng) {
    let cfg = Config::default();
    let state = MatchState::with_config(&cfg);
    (state, cfg, StdRng::seed_from_u64(seed))
}

fn send(state: &mut MatchState, cfg: &Config, rng: &mut StdRng, cmd: Command) -> Vec<Effect> {
    reduce(state, Event::Cmd(cmd), cfg, rng).effects
}

fn tick(state: &mut MatchState, cfg: &Config, rng: &mut StdRng) -> Vec<Effect> {
    reduce(state, Event::Tick, cfg, rng).effects
}

fn join(state: &mut MatchState, cfg: &Config, rng: &mut StdRng, id: &str, name: &str) {
    send(state, cfg, rng, Command::Join { conn_id: id.into(), name: name.into() });
}

fn buy(state: &mut MatchState, cfg: &Config, rng: &mut StdRng, id: &str, asset: &str, qty: f64) {
    send(
        state,
        cfg,
        rng,
        Command::Buy { conn_id: id.into(), asset_id: asset.into(), quantity: qty },
    );
}

/// Tick through the pre-match countdowns into round 1.
fn into_round_one(state: &mut MatchState, cfg: &Config, rng: &mut StdRng) {
    let pre = cfg.intro_secs + cfg.avatar_secs + cfg.strategy_secs + cfg.teaser_secs;
    for _ in 0..pre + 1 {
        tick(state, cfg, rng);
    }
    assert_eq!(state.phase, Phase::Playing);
    assert_eq!(state.current_round, 1);
    assert!(state.active_scenario.is_some());
}

/// Tick to FINISHED, asserting per-tick invariants along the way.
fn run_to_finish(state: &mut MatchState, cfg: &Config, rng: &mut StdRng) -> u32 {
    let mut finished = 0;
    for _ in 0..cfg.max_rounds * cfg.round_ticks + 20 {
        let effects = tick(state, cfg, rng);
        if effects.contains(&Effect::Finished) {
            finished += 1;
        }
        for player in &state.players {
            assert!(player.cash >= 0.0, "negative cash: {}", player.cash);
            assert!(player.risk_score <= 100);
        }
        for asset in &state.assets {
            assert!(asset.current_price >= cfg.min_price);
            assert!(asset.history.len() <= cfg.history_len);
            if state.phase == Phase::Playing {
                if let Some(base) = state.round_start_prices.get(&asset.id) {
                    assert!(
                        asset.current_price <= base * (1.0 + cfg.max_round_move) + 1e-9,
                        "{} broke the upper rail",
                        asset.id
                    );
                    assert!(
                        asset.current_price
                            >= (base * (1.0 - cfg.max_round_move)).max(cfg.min_price) - 1e-9,
                        "{} broke the lower rail",
                        asset.id
                    );
                }
            }
        }
    }
    assert_eq!(state.phase, Phase::Finished);
    finished
}

// ---------------------------------------------------------------------------
// S01: A full passive match runs to FINISHED exactly once
// ---------------------------------------------------------------------------
#[test]
fn s01_full_match_finishes_once() {
    let (mut state, cfg, mut rng) = seeded(1);
    join(&mut state, &cfg, &mut rng, "c1", "ada");
    join(&mut state, &cfg, &mut rng, "c2", "bob");
    into_round_one(&mut state, &cfg, &mut rng);
    let finished = run_to_finish(&mut state, &cfg, &mut rng);
    assert_eq!(finished, 1);
    // Further ticks are inert.
    let hash = state.state_hash();
    for _ in 0..5 {
        assert!(tick(&mut state, &cfg, &mut rng).is_empty());
    }
    assert_eq!(state.state_hash(), hash);
}

// ---------------------------------------------------------------------------
// S02: Invariants hold under active trading
// ---------------------------------------------------------------------------
#[test]
fn s02_invariants_hold_while_trading() {
    let (mut state, cfg, mut rng) = seeded(2);
    join(&mut state, &cfg, &mut rng, "c1", "ada");
    into_round_one(&mut state, &cfg, &mut rng);

    let assets = ["tcs", "sol", "gold-bees", "us-treasury", "doge"];
    for round in 0..cfg.max_rounds {
        for t in 0..cfg.round_ticks {
            tick(&mut state, &cfg, &mut rng);
            if state.phase != Phase::Playing {
                break;
            }
            // Alternate small buys and full sells through the round.
            let asset = assets[(round + t) as usize % assets.len()];
            if t % 7 == 0 {
                buy(&mut state, &cfg, &mut rng, "c1", asset, 1.0);
            } else if t % 11 == 0 {
                let qty = state.players[0].holding(asset).map(|h| h.quantity).unwrap_or(0.0);
                if qty > 0.0 {
                    send(
                        &mut state,
                        &cfg,
                        &mut rng,
                        Command::Sell {
                            conn_id: "c1".into(),
                            asset_id: asset.into(),
                            quantity: qty,
                        },
                    );
                }
            }
            let p = &state.players[0];
            assert!(p.cash >= 0.0);
            assert!(p.risk_score <= 100);
            let marked: f64 = p
                .holdings
                .iter()
                .map(|h| h.quantity * state.asset(&h.asset_id).unwrap().current_price)
                .sum();
            assert!((p.total_value - (p.cash + marked)).abs() < 1e-6);
        }
    }
}

// ---------------------------------------------------------------------------
// S03: The documented trade scenario, end to end through the reducer
// ---------------------------------------------------------------------------
#[test]
fn s03_buy_sell_scenario() {
    let (mut state, cfg, mut rng) = seeded(3);
    join(&mut state, &cfg, &mut rng, "c1", "ada");
    into_round_one(&mut state, &cfg, &mut rng);

    // Pin the price during the news phase, where ticks don't move it.
    state.asset_mut("tcs").unwrap().current_price = 50.0;
    buy(&mut state, &cfg, &mut rng, "c1", "tcs", 10.0);
    {
        let p = &state.players[0];
        assert!((p.cash - 9_500.0).abs() < 1e-9);
        let h = p.holding("tcs").unwrap();
        assert_eq!(h.quantity, 10.0);
        assert!((h.avg_buy_price - 50.0).abs() < 1e-9);
    }

    state.asset_mut("tcs").unwrap().current_price = 55.0;
    send(
        &mut state,
        &cfg,
        &mut rng,
        Command::Sell { conn_id: "c1".into(), asset_id: "tcs".into(), quantity: 10.0 },
    );
    let p = &state.players[0];
    assert!((p.cash - 10_050.0).abs() < 1e-9);
    assert!(p.holdings.is_empty());
}

// ---------------------------------------------------------------------------
// S04: Rejected commands leave the state hash untouched
// ---------------------------------------------------------------------------
#[test]
fn s04_rejections_do_not_perturb_state() {
    let (mut state, cfg, mut rng) = seeded(4);
    join(&mut state, &cfg, &mut rng, "c1", "ada");
    into_round_one(&mut state, &cfg, &mut rng);

    let before = state.state_hash();
    let rejects = [
        Command::Buy { conn_id: "c1".into(), asset_id: "tcs".into(), quantity: 1e12 },
        Command::Buy { conn_id: "ghost".into(), asset_id: "tcs".into(), quantity: 1.0 },
        Command::Buy { conn_id: "c1".into(), asset_id: "nope".into(), quantity: 1.0 },
        Command::Sell { conn_id: "c1".into(), asset_id: "tcs".into(), quantity: 1.0 },
        Command::SelectAvatar {
            conn_id: "c1".into(),
            avatar: bvb_engine::catalog::AvatarId::Bull,
        },
    ];
    for cmd in rejects {
        let effects = send(&mut state, &cfg, &mut rng, cmd);
        assert!(effects.is_empty());
        assert_eq!(state.state_hash(), before);
    }
}

// ---------------------------------------------------------------------------
// S05: Same seed, same match; different seed, different match
// ---------------------------------------------------------------------------
#[test]
fn s05_seeded_replay_is_identical() {
    let run = |seed: u64| {
        let (mut state, cfg, mut rng) = seeded(seed);
        join(&mut state, &cfg, &mut rng, "c1", "ada");
        into_round_one(&mut state, &cfg, &mut rng);
        let mut hashes = Vec::new();
        for _ in 0..cfg.max_rounds * cfg.round_ticks {
            hashes.push(reduce(&mut state, Event::Tick, &cfg, &mut rng).state_hash);
        }
        hashes
    };
    assert_eq!(run(5), run(5));
    assert_ne!(run(5), run(6));
}

// ---------------------------------------------------------------------------
// S06: Results compose after a finished match with sane ranking
// ---------------------------------------------------------------------------
#[test]
fn s06_results_rank_a_finished_match() {
    let (mut state, cfg, mut rng) = seeded(7);
    join(&mut state, &cfg, &mut rng, "c1", "ada");
    join(&mut state, &cfg, &mut rng, "c2", "bob");
    into_round_one(&mut state, &cfg, &mut rng);

    // ada trades, bob stays passive.
    buy(&mut state, &cfg, &mut rng, "c1", "tcs", 5.0);
    buy(&mut state, &cfg, &mut rng, "c1", "us-treasury", 5.0);
    run_to_finish(&mut state, &cfg, &mut rng);

    let ranking = results::compose(&state, &cfg, &HashMap::new());
    assert_eq!(ranking.len(), 2);
    assert_eq!(ranking[0].rank, 1);
    assert_eq!(ranking[1].rank, 2);
    assert!(ranking[0].risk_adjusted_score >= ranking[1].risk_adjusted_score);
    for row in &ranking {
        assert!(row.final_value > 0.0);
        assert_eq!(row.learning_cards.len(), 2);
        assert!(!row.player_summary.improvement_suggestions.is_empty());
    }
}

// ---------------------------------------------------------------------------
// S07: Reconnection by name preserves the portfolio mid-match
// ---------------------------------------------------------------------------
#[test]
fn s07_rejoin_preserves_portfolio() {
    let (mut state, cfg, mut rng) = seeded(8);
    join(&mut state, &cfg, &mut rng, "c1", "ada");
    join(&mut state, &cfg, &mut rng, "c2", "bob");
    into_round_one(&mut state, &cfg, &mut rng);

    buy(&mut state, &cfg, &mut rng, "c1", "tcs", 2.0);
    let cash_before = state.players[0].cash;

    // Same name, new connection id.
    join(&mut state, &cfg, &mut rng, "c9", "ada");
    assert_eq!(state.players.len(), 2);
    assert_eq!(state.players[0].id, "c9");
    assert_eq!(state.players[0].cash, cash_before);
    assert!(state.players[0].holding("tcs").is_some());

    // The new id can keep trading.
    buy(&mut state, &cfg, &mut rng, "c9", "tcs", 1.0);
    assert_eq!(state.players[0].holding("tcs").unwrap().quantity, 3.0);
}

// ---------------------------------------------------------------------------
// S08: Reset mid-match restores a clean lobby with the same players
// ---------------------------------------------------------------------------
#[test]
fn s08_reset_mid_match() {
    let (mut state, cfg, mut rng) = seeded(9);
    join(&mut state, &cfg, &mut rng, "c1", "ada");
    into_round_one(&mut state, &cfg, &mut rng);
    buy(&mut state, &cfg, &mut rng, "c1", "sol", 3.0);

    send(&mut state, &cfg, &mut rng, Command::Reset);
    assert_eq!(state.phase, Phase::PreMatch);
    assert!(state.active_scenario.is_none());
    assert_eq!(state.players[0].cash, cfg.starting_cash);
    assert!(state.players[0].holdings.is_empty());
    for asset in &state.assets {
        let def = bvb_engine::catalog::ASSETS.iter().find(|d| d.id == asset.id).unwrap();
        assert_eq!(asset.current_price, def.starting_price);
    }

    // The reset match plays through cleanly again.
    into_round_one(&mut state, &cfg, &mut rng);
    assert_eq!(run_to_finish(&mut state, &cfg, &mut rng), 1);
}
