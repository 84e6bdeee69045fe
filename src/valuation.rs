//! Portfolio valuation, risk scoring, and one-shot power-ups.
//!
//! Both valuation and risk are recomputed from scratch every trading tick
//! rather than maintained incrementally, so a missed update can never
//! accumulate drift. The risk shield's effect is therefore transient by
//! construction: it lowers the current score and the next recompute
//! reflects the portfolio again.

use crate::catalog::{ClassParams, PowerUpKind, StrategyKind};
use crate::engine::state::{Asset, Config, MatchState, Phase, Player};

fn asset_price(assets: &[Asset], id: &str) -> f64 {
    assets
        .iter()
        .find(|a| a.id == id)
        .map(|a| a.current_price)
        .unwrap_or(0.0)
}

/// Cash plus holdings marked to current prices.
pub fn portfolio_value(player: &Player, assets: &[Asset]) -> f64 {
    let holdings: f64 = player
        .holdings
        .iter()
        .map(|h| h.quantity * asset_price(assets, &h.asset_id))
        .sum();
    player.cash + holdings
}

/// Volatility-weighted exposure as a 0-100 score.
///
/// Each holding contributes its market value times its class volatility
/// factor times 500; the sum is expressed as a share of total portfolio
/// value and capped at 100. An all-cash portfolio scores 0. SAFETY_FIRST
/// players get a flat 10-point discount, floored at 0.
pub fn risk_score(player: &Player, assets: &[Asset]) -> u8 {
    let portfolio = portfolio_value(player, assets);
    if portfolio <= 0.0 {
        return 0;
    }
    let weighted: f64 = player
        .holdings
        .iter()
        .map(|h| {
            let asset = assets.iter().find(|a| a.id == h.asset_id);
            let (price, sensitivity) = match asset {
                Some(a) => (a.current_price, ClassParams::for_class(a.class).sensitivity),
                None => (0.0, 0.0),
            };
            h.quantity * price * sensitivity * 500.0
        })
        .sum();
    let raw = ((weighted / portfolio) * 100.0).round().min(100.0) as u8;
    if player.strategy == Some(StrategyKind::SafetyFirst) {
        raw.saturating_sub(10)
    } else {
        raw
    }
}

/// Refresh every player's total value and risk score against current
/// prices. Called once per trading tick after prices move.
pub fn recompute_all(state: &mut MatchState) {
    let MatchState { assets, players, .. } = state;
    for player in players.iter_mut() {
        player.total_value = portfolio_value(player, assets);
        player.risk_score = risk_score(player, assets);
    }
}

/// Consume a power-up charge and apply its effect. Returns false without
/// any state change when the match isn't live, the player is unknown, or
/// the charge is already spent.
pub fn use_power_up(
    state: &mut MatchState,
    player_id: &str,
    kind: PowerUpKind,
    cfg: &Config,
) -> bool {
    if state.phase != Phase::Playing {
        return false;
    }
    let relief = cfg.risk_shield_relief;
    let bailout = cfg.bailout_cash;
    let Some(player) = state.player_mut(player_id) else {
        return false;
    };
    let Some(power_up) = player
        .power_ups
        .iter_mut()
        .find(|p| p.kind == kind && p.uses_left > 0)
    else {
        return false;
    };
    power_up.uses_left -= 1;
    match kind {
        PowerUpKind::RiskShield => player.risk_score = player.risk_score.saturating_sub(relief),
        PowerUpKind::Bailout => player.cash += bailout,
    }
    true
}
