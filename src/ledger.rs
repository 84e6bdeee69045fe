//! Trade arbitration: validates and applies buy/sell orders against a
//! player's cash and holdings, with step slippage on notional value.
//!
//! Rejections are silent no-ops per the engine's error policy: no state
//! change, no log entry, nothing surfaced to other players. Accepted
//! orders apply cash, holding, and log entry together or not at all.

use crate::engine::state::{Holding, MatchState, Phase, TradeSide, TransactionEntry};

/// Step slippage on order notional, applied adversely to the player. Caps
/// any single player's ability to move the market in their own favor.
pub fn slippage(notional: f64) -> f64 {
    if notional > 5000.0 {
        0.02
    } else if notional > 2000.0 {
        0.01
    } else if notional > 1000.0 {
        0.005
    } else {
        0.0
    }
}

/// Buy `quantity` of `asset_id` for `player_id`. Returns true iff the order
/// was accepted and applied.
pub fn buy(state: &mut MatchState, player_id: &str, asset_id: &str, quantity: f64) -> bool {
    if state.phase != Phase::Playing || !quantity.is_finite() || quantity <= 0.0 {
        return false;
    }
    let Some(asset) = state.asset(asset_id) else {
        return false;
    };
    let (price, class) = (asset.current_price, asset.class);
    let effective_price = price * (1.0 + slippage(quantity * price));
    let cost = quantity * effective_price;

    let round = state.current_round;
    let event_active = state.active_event.as_ref().map(|c| c.id.to_string());
    let sentiment_at_time = state.sentiment.get(class);

    let Some(player) = state.player_mut(player_id) else {
        return false;
    };
    if player.cash < cost {
        return false;
    }

    player.cash -= cost;
    match player.holdings.iter_mut().find(|h| h.asset_id == asset_id) {
        Some(holding) => {
            let total_cost = holding.quantity * holding.avg_buy_price + cost;
            holding.quantity += quantity;
            holding.avg_buy_price = total_cost / holding.quantity;
        }
        None => player.holdings.push(Holding {
            asset_id: asset_id.to_string(),
            quantity,
            avg_buy_price: effective_price,
        }),
    }
    player.transaction_log.push(TransactionEntry {
        round,
        side: TradeSide::Buy,
        asset_id: asset_id.to_string(),
        asset_class: class,
        quantity,
        price: effective_price,
        total_value: cost,
        event_active,
        sentiment_at_time,
    });
    true
}

/// Sell `quantity` of `asset_id` held by `player_id`. Symmetric to [`buy`]
/// with slippage applied against the seller; a holding that reaches zero is
/// removed.
pub fn sell(state: &mut MatchState, player_id: &str, asset_id: &str, quantity: f64) -> bool {
    if state.phase != Phase::Playing || !quantity.is_finite() || quantity <= 0.0 {
        return false;
    }
    let Some(asset) = state.asset(asset_id) else {
        return false;
    };
    let (price, class) = (asset.current_price, asset.class);
    let effective_price = price * (1.0 - slippage(quantity * price));
    let revenue = quantity * effective_price;

    let round = state.current_round;
    let event_active = state.active_event.as_ref().map(|c| c.id.to_string());
    let sentiment_at_time = state.sentiment.get(class);

    let Some(player) = state.player_mut(player_id) else {
        return false;
    };
    let Some(idx) = player.holdings.iter().position(|h| h.asset_id == asset_id) else {
        return false;
    };
    if player.holdings[idx].quantity < quantity {
        return false;
    }

    player.cash += revenue;
    player.holdings[idx].quantity -= quantity;
    if player.holdings[idx].quantity <= 1e-9 {
        player.holdings.remove(idx);
    }
    player.transaction_log.push(TransactionEntry {
        round,
        side: TradeSide::Sell,
        asset_id: asset_id.to_string(),
        asset_class: class,
        quantity,
        price: effective_price,
        total_value: revenue,
        event_active,
        sentiment_at_time,
    });
    true
}
