//! Phase machine: pre-match countdowns, round lifecycle, and the per-tick
//! market update. One clock drives everything; a tick means one thing per
//! phase, so a countdown and a round can never run concurrently.

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::Value;

use crate::catalog::{self, AvatarId, StrategyKind};
use crate::engine::state::{Config, MatchState, Phase, SubPhase};
use crate::logging::{log, obj, v_num, v_str, Domain, Level};
use crate::{pricing, sentiment, valuation};

/// What a tick did, from the driver's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing is running; no broadcast needed.
    Idle,
    /// State advanced; broadcast a snapshot.
    Advanced,
    /// This tick ended the final round; compose results.
    MatchEnded,
}

/// Register a connection under `name`. A known name rebinds to the new
/// connection id (reconnection); a new name joins fresh. The first join on
/// an idle match kicks off the intro countdown.
pub fn on_join(state: &mut MatchState, cfg: &Config, conn_id: &str, name: &str) {
    match state.players.iter_mut().find(|p| p.name == name) {
        Some(player) => {
            log(
                Level::Info,
                Domain::Phase,
                "player_rebound",
                obj(&[("name", v_str(name)), ("conn_id", v_str(conn_id))]),
            );
            player.id = conn_id.to_string();
        }
        None => {
            log(
                Level::Info,
                Domain::Phase,
                "player_joined",
                obj(&[("name", v_str(name)), ("conn_id", v_str(conn_id))]),
            );
            state
                .players
                .push(crate::engine::state::Player::new(conn_id.to_string(), name.to_string(), cfg));
        }
    }
    if state.phase == Phase::PreMatch && state.is_idle() {
        enter_sub_phase(state, cfg, SubPhase::Intro);
    }
}

/// Drop a connection. The last player leaving resets the match outright.
pub fn on_leave(state: &mut MatchState, cfg: &Config, conn_id: &str) {
    let before = state.players.len();
    state.players.retain(|p| p.id != conn_id);
    if state.players.len() < before {
        log(
            Level::Info,
            Domain::Phase,
            "player_left",
            obj(&[("conn_id", v_str(conn_id)), ("remaining", v_num(state.players.len() as f64))]),
        );
    }
    if state.players.is_empty() {
        state.reset(cfg);
    }
}

/// Avatar pick, only honored during AVATAR_SELECTION. When every player
/// has picked, the countdown is cut short.
pub fn on_select_avatar<R: Rng>(
    state: &mut MatchState,
    cfg: &Config,
    conn_id: &str,
    avatar: AvatarId,
    rng: &mut R,
) -> bool {
    if state.phase != Phase::PreMatch || state.sub_phase != SubPhase::AvatarSelection {
        return false;
    }
    let Some(player) = state.player_mut(conn_id) else {
        return false;
    };
    player.avatar = Some(avatar);
    if !state.players.is_empty() && state.players.iter().all(|p| p.avatar.is_some()) {
        advance_sub_phase(state, cfg, rng);
    }
    true
}

/// Strategy pick, only honored during STRATEGY_SELECTION.
pub fn on_select_strategy<R: Rng>(
    state: &mut MatchState,
    cfg: &Config,
    conn_id: &str,
    strategy: StrategyKind,
    rng: &mut R,
) -> bool {
    if state.phase != Phase::PreMatch || state.sub_phase != SubPhase::StrategySelection {
        return false;
    }
    let Some(player) = state.player_mut(conn_id) else {
        return false;
    };
    player.strategy = Some(strategy);
    if !state.players.is_empty() && state.players.iter().all(|p| p.strategy.is_some()) {
        advance_sub_phase(state, cfg, rng);
    }
    true
}

/// Play-again: wholesale state replacement keeping connected players, then
/// straight into a fresh intro countdown.
pub fn on_reset(state: &mut MatchState, cfg: &Config) {
    log(
        Level::Info,
        Domain::Phase,
        "match_reset",
        obj(&[("players", v_num(state.players.len() as f64))]),
    );
    state.reset(cfg);
    if !state.players.is_empty() {
        enter_sub_phase(state, cfg, SubPhase::Intro);
    }
}

fn enter_sub_phase(state: &mut MatchState, cfg: &Config, sub: SubPhase) {
    state.sub_phase = sub;
    state.time_remaining = match sub {
        SubPhase::Intro => cfg.intro_secs,
        SubPhase::AvatarSelection => cfg.avatar_secs,
        SubPhase::StrategySelection => cfg.strategy_secs,
        SubPhase::ScenarioTeaser => cfg.teaser_secs,
    };
    log(
        Level::Info,
        Domain::Phase,
        "sub_phase",
        obj(&[
            ("sub_phase", serde_json::to_value(sub).unwrap_or(Value::Null)),
            ("secs", v_num(state.time_remaining as f64)),
        ]),
    );
}

/// Move to the next pre-match stage, or into PLAYING after the teaser.
/// The scenario is drawn on entering the teaser so players see it during
/// the countdown; it stays active for the whole match and only a reset
/// clears it. Starting the first round is deferred to the next tick.
fn advance_sub_phase<R: Rng>(state: &mut MatchState, cfg: &Config, rng: &mut R) {
    match state.sub_phase {
        SubPhase::Intro => enter_sub_phase(state, cfg, SubPhase::AvatarSelection),
        SubPhase::AvatarSelection => enter_sub_phase(state, cfg, SubPhase::StrategySelection),
        SubPhase::StrategySelection => {
            let scenario = catalog::SCENARIOS
                .choose(rng)
                .cloned()
                .unwrap_or_else(|| catalog::SCENARIOS[0].clone());
            log(
                Level::Info,
                Domain::Phase,
                "scenario_drawn",
                obj(&[("scenario", v_str(scenario.id))]),
            );
            state.active_scenario = Some(scenario);
            enter_sub_phase(state, cfg, SubPhase::ScenarioTeaser);
        }
        SubPhase::ScenarioTeaser => {
            state.phase = Phase::Playing;
            state.current_round = 0;
            state.fear_zone_active = false;
            state.time_remaining = 0;
        }
    }
}

fn start_round<R: Rng>(state: &mut MatchState, cfg: &Config, rng: &mut R) {
    if state.current_round == state.max_rounds {
        state.fear_zone_active = true;
    }

    state.round_start_prices =
        state.assets.iter().map(|a| (a.id.clone(), a.current_price)).collect();

    let card = catalog::NEWS_CARDS
        .choose(rng)
        .cloned()
        .unwrap_or_else(|| catalog::NEWS_CARDS[0].clone());
    state
        .round_news
        .push(crate::engine::state::RoundNews { round: state.current_round, card: card.clone() });
    sentiment::track_polarity(state, &card);
    log(
        Level::Info,
        Domain::Market,
        "round_news",
        obj(&[
            ("round", v_num(state.current_round as f64)),
            ("card", v_str(card.id)),
            ("sentiment", v_str(card.sentiment.as_str())),
            ("streak", v_num(state.consecutive_same_sentiment as f64)),
        ]),
    );
    sentiment::apply_news(state, &card);
    sentiment::apply_rotation(state, &card, rng);
    state.active_event = Some(card);

    state.tick_in_round = 0;
    state.time_remaining = cfg.round_ticks;
}

/// Advance the clock by one second.
pub fn tick<R: Rng>(state: &mut MatchState, cfg: &Config, rng: &mut R) -> TickOutcome {
    match state.phase {
        Phase::Finished => TickOutcome::Idle,
        Phase::PreMatch => {
            if state.is_idle() {
                return TickOutcome::Idle;
            }
            state.time_remaining = state.time_remaining.saturating_sub(1);
            if state.time_remaining == 0 {
                advance_sub_phase(state, cfg, rng);
            }
            TickOutcome::Advanced
        }
        Phase::Playing => {
            if state.tick_in_round == 0 && state.time_remaining == 0 {
                // Round boundary: this tick opens a fresh round and counts
                // as its first news-phase second.
                state.current_round += 1;
                start_round(state, cfg, rng);
            }

            state.tick_in_round += 1;
            state.time_remaining = cfg.round_ticks.saturating_sub(state.tick_in_round);

            if state.tick_in_round > cfg.news_phase_ticks {
                let elapsed = state.tick_in_round - cfg.news_phase_ticks;
                update_prices(state, cfg, rng, elapsed);
            }
            valuation::recompute_all(state);

            if state.tick_in_round >= cfg.round_ticks {
                if state.current_round < state.max_rounds {
                    // Next tick opens the next round.
                    state.tick_in_round = 0;
                    state.time_remaining = 0;
                } else {
                    state.phase = Phase::Finished;
                    state.active_event = None;
                    return TickOutcome::MatchEnded;
                }
            }
            TickOutcome::Advanced
        }
    }
}

fn update_prices<R: Rng>(state: &mut MatchState, cfg: &Config, rng: &mut R, elapsed: u32) {
    let card = state.active_event.clone();
    let MatchState { assets, round_start_prices, .. } = state;
    for asset in assets.iter_mut() {
        let base = round_start_prices.get(&asset.id).copied().unwrap_or(asset.current_price);
        let s = sentiment::sentiment_term(asset.sector, card.as_ref(), elapsed);
        pricing::update_asset(asset, base, s, cfg, rng);
    }
}
