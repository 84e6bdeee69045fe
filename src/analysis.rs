//! Narrative analyst backends. The engine asks an [`Analyst`] for each
//! player's debrief at match end; the remote backend is optional and every
//! failure path lands on the deterministic heuristic.

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::engine::state::{Config, Player};
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::results::{heuristic_report, AnalysisReport, TradingContext};

#[async_trait::async_trait]
pub trait Analyst: Send + Sync {
    async fn analyze(
        &self,
        player: &Player,
        ctx: &TradingContext,
        cfg: &Config,
    ) -> Result<AnalysisReport>;
}

/// Pure local analyst. Always succeeds.
pub struct HeuristicAnalyst;

#[async_trait::async_trait]
impl Analyst for HeuristicAnalyst {
    async fn analyze(
        &self,
        player: &Player,
        _ctx: &TradingContext,
        cfg: &Config,
    ) -> Result<AnalysisReport> {
        Ok(heuristic_report(player, cfg))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalystRequest<'a> {
    player_name: &'a str,
    final_value: f64,
    roi: f64,
    risk_score: u8,
    strategy: Option<&'a str>,
    news_history: &'a str,
    trade_analysis: &'a str,
    patterns: &'a str,
}

/// Posts the player's match context to an external coaching service and
/// expects an [`AnalysisReport`] back as JSON. Markdown code fences around
/// the JSON body are tolerated.
pub struct RemoteAnalyst {
    client: Client,
    url: String,
}

impl RemoteAnalyst {
    pub fn new(url: String) -> Self {
        Self { client: Client::new(), url }
    }

    fn strip_fences(text: &str) -> &str {
        text.trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
    }
}

#[async_trait::async_trait]
impl Analyst for RemoteAnalyst {
    async fn analyze(
        &self,
        player: &Player,
        ctx: &TradingContext,
        cfg: &Config,
    ) -> Result<AnalysisReport> {
        let roi = (player.total_value - cfg.starting_cash) / cfg.starting_cash * 100.0;
        let body = AnalystRequest {
            player_name: &player.name,
            final_value: player.total_value,
            roi,
            risk_score: player.risk_score,
            strategy: player.strategy.map(|s| s.as_str()),
            news_history: &ctx.news_history,
            trade_analysis: &ctx.trade_analysis,
            patterns: &ctx.patterns,
        };
        let resp = self.client.post(&self.url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("analyst returned {}", status));
        }
        let text = resp.text().await?;
        let report: AnalysisReport = serde_json::from_str(Self::strip_fences(&text))
            .map_err(|e| anyhow!("analyst response unparseable: {}", e))?;
        Ok(report)
    }
}

/// Run the configured analyst for one player under the configured timeout,
/// falling back to the heuristic on timeout or error.
pub async fn analyze_with_fallback(
    analyst: &dyn Analyst,
    player: &Player,
    ctx: &TradingContext,
    cfg: &Config,
) -> AnalysisReport {
    let deadline = std::time::Duration::from_millis(cfg.analyst_timeout_ms);
    match tokio::time::timeout(deadline, analyst.analyze(player, ctx, cfg)).await {
        Ok(Ok(report)) => report,
        Ok(Err(e)) => {
            log(
                Level::Warn,
                Domain::Results,
                "analyst_failed",
                obj(&[
                    ("player", v_str(&player.name)),
                    ("error", v_str(&e.to_string())),
                ]),
            );
            heuristic_report(player, cfg)
        }
        Err(_) => {
            log(
                Level::Warn,
                Domain::Results,
                "analyst_timeout",
                obj(&[
                    ("player", v_str(&player.name)),
                    ("timeout_ms", Value::from(cfg.analyst_timeout_ms)),
                ]),
            );
            heuristic_report(player, cfg)
        }
    }
}

/// Build the analyst for the current config: remote when ANALYST_URL is
/// set, otherwise local.
pub fn analyst_for(cfg: &Config) -> Box<dyn Analyst> {
    match &cfg.analyst_url {
        Some(url) => Box::new(RemoteAnalyst::new(url.clone())),
        None => Box::new(HeuristicAnalyst),
    }
}
