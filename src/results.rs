//! End-of-match results: final valuation with strategy bonuses, ROI and
//! risk-adjusted ranking, and the trading-context digest handed to the
//! narrative analyst.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::catalog::StrategyKind;
use crate::engine::state::{Config, MatchState, Player, RoundNews, TradeSide};

/// Educational card attached to a player's debrief.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningCard {
    pub title: String,
    pub text: String,
    pub deep_dive: String,
    pub search_query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub what_you_did_well: Vec<String>,
    pub mistakes_and_opportunities: Vec<String>,
    pub improvement_suggestions: Vec<String>,
}

/// Narrative debrief for one player, produced by an analyst backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub player_summary: PlayerSummary,
    pub learning_cards: Vec<LearningCard>,
}

/// One row of the final scoreboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResult {
    pub player_id: String,
    pub player_name: String,
    pub final_value: f64,
    pub risk_score: u8,
    pub roi: f64,
    pub risk_adjusted_score: f64,
    pub rank: u32,
    pub insights: Vec<String>,
    pub player_summary: PlayerSummary,
    pub learning_cards: Vec<LearningCard>,
}

/// Pre-rendered match context for the analyst: human-readable news
/// timeline, per-round trade listing, and extracted behavior patterns.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingContext {
    pub news_history: String,
    pub trade_analysis: String,
    pub patterns: String,
}

/// Total value with the DIVERSIFIER bonus applied: holding 4+ distinct
/// assets at match end earns a flat 5% on final value.
pub fn final_value(player: &Player) -> f64 {
    let mut value = player.total_value;
    if player.strategy == Some(StrategyKind::Diversifier) {
        let unique: HashSet<&str> =
            player.holdings.iter().map(|h| h.asset_id.as_str()).collect();
        if unique.len() >= 4 {
            value += value * 0.05;
        }
    }
    value
}

pub fn trading_context(player: &Player, round_news: &[RoundNews]) -> TradingContext {
    let news_history = round_news
        .iter()
        .map(|rn| {
            let sectors: Vec<&str> =
                rn.card.affected_sectors.iter().map(|s| s.as_str()).collect();
            format!(
                "Round {}: \"{}\" ({}) - Affected: {}",
                rn.round,
                rn.card.title,
                rn.card.sentiment.as_str(),
                sectors.join(", ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut by_round: Vec<(u32, Vec<String>)> = Vec::new();
    for trade in &player.transaction_log {
        let line = format!(
            "  - {:?} {:.2} {} @ ${:.2} ({})",
            trade.side, trade.quantity, trade.asset_id, trade.price, trade.asset_class.as_str()
        );
        match by_round.iter_mut().find(|(r, _)| *r == trade.round) {
            Some((_, lines)) => lines.push(line),
            None => by_round.push((trade.round, vec![line])),
        }
    }
    let trade_analysis = if by_round.is_empty() {
        "No trades made".to_string()
    } else {
        by_round
            .iter()
            .map(|(round, lines)| {
                let news = round_news
                    .iter()
                    .find(|rn| rn.round == *round)
                    .map(|rn| {
                        format!("News: \"{}\" ({})", rn.card.title, rn.card.sentiment.as_str())
                    })
                    .unwrap_or_else(|| "No news".to_string());
                format!("Round {} - {}\n{}", round, news, lines.join("\n"))
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    TradingContext {
        news_history,
        trade_analysis,
        patterns: identify_patterns(player).join("\n"),
    }
}

/// Extract coarse behavior patterns from the transaction log.
pub fn identify_patterns(player: &Player) -> Vec<String> {
    let trades = &player.transaction_log;
    if trades.is_empty() {
        return vec!["- No trades made (passive strategy)".to_string()];
    }
    let mut patterns = Vec::new();
    let total = trades.len() as f64;

    let with_news = trades.iter().filter(|t| t.event_active.is_some()).count() as f64;
    if with_news > total * 0.7 {
        patterns.push("- Highly reactive to news (70%+ trades during news events)".to_string());
    } else if with_news < total * 0.3 {
        patterns.push("- Ignored news signals (less than 30% trades aligned with news)".to_string());
    }

    let unique: HashSet<&str> = trades.iter().map(|t| t.asset_id.as_str()).collect();
    if unique.len() >= 5 {
        patterns.push(format!("- Well diversified (traded {} different assets)", unique.len()));
    } else if unique.len() <= 2 {
        patterns.push(format!("- Concentrated portfolio (only {} assets)", unique.len()));
    }

    let mut class_counts: HashMap<&str, usize> = HashMap::new();
    for t in trades {
        *class_counts.entry(t.asset_class.as_str()).or_insert(0) += 1;
    }
    if let Some((class, count)) = class_counts.into_iter().max_by_key(|(_, c)| *c) {
        if count as f64 > total * 0.6 {
            patterns.push(format!(
                "- Heavy focus on {} ({:.0}% of trades)",
                class,
                count as f64 / total * 100.0
            ));
        }
    }

    let buys = trades.iter().filter(|t| t.side == TradeSide::Buy).count();
    let sells = trades.len() - buys;
    if buys > sells * 2 {
        patterns.push("- Aggressive buyer (bought much more than sold)".to_string());
    } else if sells > buys * 2 {
        patterns.push("- Frequent profit-taker (sold much more than bought)".to_string());
    }

    let early = trades.iter().filter(|t| t.round <= 2).count();
    let late = trades.iter().filter(|t| t.round >= 4).count();
    if early > late * 2 {
        patterns.push("- Early mover (most trades in first 2 rounds)".to_string());
    } else if late > early * 2 {
        patterns.push("- Late trader (most activity in final rounds)".to_string());
    }

    patterns
}

/// Deterministic narrative debrief, used when no remote analyst is
/// configured or the remote call fails.
pub fn heuristic_report(player: &Player, cfg: &Config) -> AnalysisReport {
    let trades = &player.transaction_log;
    let roi = (player.total_value - cfg.starting_cash) / cfg.starting_cash * 100.0;

    let mut well = Vec::new();
    let mut mistakes = Vec::new();
    let mut suggestions = Vec::new();

    if !trades.is_empty() {
        well.push("You actively participated in the market and made trades".to_string());
    }
    if roi > 5.0 {
        well.push(format!("You achieved a positive ROI of {:.1}%", roi));
    }

    let unique: HashSet<&str> = trades.iter().map(|t| t.asset_id.as_str()).collect();
    if unique.len() >= 4 {
        well.push(format!("You diversified across {} different assets", unique.len()));
    } else if unique.len() <= 2 && !trades.is_empty() {
        mistakes.push(format!("Limited diversification - you only traded {} assets", unique.len()));
    }

    if player.risk_score > 70 {
        mistakes.push("Your portfolio had high risk exposure (70+ risk score)".to_string());
    }

    if trades.is_empty() {
        mistakes.push("You didn't make any trades - missed all opportunities".to_string());
        suggestions.push("React to news events by buying affected assets".to_string());
    }

    let with_news = trades.iter().filter(|t| t.event_active.is_some()).count() as f64;
    if !trades.is_empty() && with_news < trades.len() as f64 * 0.3 {
        mistakes.push(
            "You ignored most news signals - only 30% of trades aligned with news".to_string(),
        );
        suggestions.push("Pay attention to news cards and trade the affected sectors".to_string());
    }

    if roi < 0.0 {
        suggestions.push(
            "Focus on buying during negative news and selling during positive news".to_string(),
        );
    }
    suggestions
        .push("Study the relationship between news sentiment and price movements".to_string());

    AnalysisReport {
        player_summary: PlayerSummary {
            what_you_did_well: if well.is_empty() {
                vec!["You completed the game".to_string()]
            } else {
                well
            },
            mistakes_and_opportunities: if mistakes.is_empty() {
                vec!["Consider being more active in trading".to_string()]
            } else {
                mistakes
            },
            improvement_suggestions: suggestions,
        },
        learning_cards: default_learning_cards(),
    }
}

fn default_learning_cards() -> Vec<LearningCard> {
    vec![
        LearningCard {
            title: "News-Driven Trading".to_string(),
            text: "Markets react strongly to news. Positive news drives prices up, negative news drives them down.".to_string(),
            deep_dive: "Professional traders monitor news constantly. The key is to act quickly when news breaks, but also understand that news impact fades over time (time decay). Buy the rumor, sell the news.".to_string(),
            search_query: "how news affects stock prices".to_string(),
        },
        LearningCard {
            title: "Diversification".to_string(),
            text: "Don't put all your eggs in one basket. Spread investments across different asset types.".to_string(),
            deep_dive: "Diversification reduces risk because different assets react differently to the same news. When stocks fall, bonds might rise. When crypto crashes, gold might rally. A balanced portfolio protects you from sector-specific crashes.".to_string(),
            search_query: "portfolio diversification strategy".to_string(),
        },
    ]
}

/// Assemble the final scoreboard. `reports` maps player id to that
/// player's debrief; any player without one falls back to the heuristic.
/// Ranked by risk-adjusted score descending, ties keeping join order.
pub fn compose(
    state: &MatchState,
    cfg: &Config,
    reports: &HashMap<String, AnalysisReport>,
) -> Vec<PlayerResult> {
    let mut rows: Vec<PlayerResult> = state
        .players
        .iter()
        .map(|player| {
            let value = final_value(player);
            let roi = (value - cfg.starting_cash) / cfg.starting_cash * 100.0;
            let risk_adjusted_score = roi - player.risk_score as f64 * 0.5;
            let report = reports
                .get(&player.id)
                .cloned()
                .unwrap_or_else(|| heuristic_report(player, cfg));
            let insights = report
                .player_summary
                .what_you_did_well
                .iter()
                .chain(&report.player_summary.mistakes_and_opportunities)
                .cloned()
                .collect();
            PlayerResult {
                player_id: player.id.clone(),
                player_name: player.name.clone(),
                final_value: value,
                risk_score: player.risk_score,
                roi,
                risk_adjusted_score,
                rank: 0,
                insights,
                player_summary: report.player_summary,
                learning_cards: report.learning_cards,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.risk_adjusted_score
            .partial_cmp(&a.risk_adjusted_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i as u32 + 1;
    }
    rows
}
