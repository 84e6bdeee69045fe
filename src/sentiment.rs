//! Sentiment propagation: news → per-class board shifts at round start,
//! sector rotation on net-negative news, and the decayed per-asset term the
//! price model consumes during the trading phase.

use rand::Rng;

use crate::catalog::{sector_correlation, NewsCard, Polarity, Sector};
use crate::engine::state::MatchState;

/// Direct sentiment-level update, fired once at round start before the news
/// phase: every class mapped to an affected sector shifts by
/// `score * weight * 20`, clamped by the board.
pub fn apply_news(state: &mut MatchState, card: &NewsCard) {
    let score = card.sentiment.score();
    for &sector in card.affected_sectors {
        let change = score * sector.impact_weight() * 20.0;
        for &class in sector.asset_classes() {
            state.sentiment.shift(class, change);
        }
    }
}

/// Rotation effect: net-negative news gives every unaffected sector's
/// classes a small random positive drift (1-2 sentiment points), so one bad
/// headline cannot drag the whole board down.
pub fn apply_rotation<R: Rng>(state: &mut MatchState, card: &NewsCard, rng: &mut R) {
    if card.sentiment.polarity() != Polarity::Negative {
        return;
    }
    for sector in Sector::ALL {
        if card.affected_sectors.contains(&sector) {
            continue;
        }
        for &class in sector.asset_classes() {
            let drift = (rng.gen::<f64>() * 0.01 + 0.01) * 100.0;
            state.sentiment.shift(class, drift);
        }
    }
}

/// Track consecutive rounds sharing a coarse polarity. Diagnostic state
/// only; nothing downstream branches on it.
pub fn track_polarity(state: &mut MatchState, card: &NewsCard) {
    let polarity = card.sentiment.polarity();
    if polarity == state.last_polarity {
        state.consecutive_same_sentiment += 1;
    } else {
        state.consecutive_same_sentiment = 0;
    }
    state.last_polarity = polarity;
}

/// Impact weight of the active news on an asset's sector: 1.0 (per-sector
/// table) on a direct hit, otherwise half-weighted correlation summed over
/// the affected sectors. Correlations are asymmetric and may be negative.
pub fn impact_weight(asset_sector: Sector, card: &NewsCard) -> f64 {
    if card.affected_sectors.contains(&asset_sector) {
        return asset_sector.impact_weight();
    }
    card.affected_sectors
        .iter()
        .map(|&affected| sector_correlation(affected, asset_sector) * 0.5)
        .sum()
}

/// Time decay across the 30s trading window: full impact for the first 10
/// elapsed trading seconds, 0.6 for the next 10, 0.3 thereafter.
pub fn time_decay(trading_secs_elapsed: u32) -> f64 {
    if trading_secs_elapsed > 20 {
        0.3
    } else if trading_secs_elapsed > 10 {
        0.6
    } else {
        1.0
    }
}

/// The sentiment term `S` fed to the price model for one asset on one
/// trading tick.
pub fn sentiment_term(asset_sector: Sector, card: Option<&NewsCard>, trading_secs_elapsed: u32) -> f64 {
    let Some(card) = card else { return 0.0 };
    card.sentiment.score() * impact_weight(asset_sector, card) * time_decay(trading_secs_elapsed)
}
