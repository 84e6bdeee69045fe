//! Match state with deterministic hashing for replay validation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::catalog::{
    self, AssetClass, AvatarId, NewsCard, Polarity, PowerUpKind, Scenario, Sector, StrategyKind,
};

/// Engine configuration. Everything has a sensible default; env vars exist
/// for tuning and for seeding deterministic replays in tests.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub starting_cash: f64,
    pub max_rounds: u32,
    pub round_ticks: u32,
    pub news_phase_ticks: u32,
    pub max_round_move: f64,
    pub min_price: f64,
    pub history_len: usize,
    pub intro_secs: u32,
    pub avatar_secs: u32,
    pub strategy_secs: u32,
    pub teaser_secs: u32,
    pub bailout_cash: f64,
    pub risk_shield_relief: u8,
    pub analyst_url: Option<String>,
    pub analyst_timeout_ms: u64,
    /// Fixed RNG seed for replay-stable runs; None seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            starting_cash: 10_000.0,
            max_rounds: 5,
            round_ticks: 35,
            news_phase_ticks: 5,
            max_round_move: 0.25,
            min_price: 0.01,
            history_len: 50,
            intro_secs: 3,
            avatar_secs: 15,
            strategy_secs: 15,
            teaser_secs: 8,
            bailout_cash: 1000.0,
            risk_shield_relief: 20,
            analyst_url: None,
            analyst_timeout_ms: 4000,
            seed: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Config::default();
        Self {
            starting_cash: env_f64("STARTING_CASH", d.starting_cash),
            max_rounds: env_u32("MAX_ROUNDS", d.max_rounds),
            round_ticks: env_u32("ROUND_TICKS", d.round_ticks),
            news_phase_ticks: env_u32("NEWS_PHASE_TICKS", d.news_phase_ticks),
            max_round_move: env_f64("MAX_ROUND_MOVE", d.max_round_move),
            min_price: env_f64("MIN_PRICE", d.min_price),
            history_len: env_u32("HISTORY_LEN", d.history_len as u32) as usize,
            intro_secs: env_u32("INTRO_SECS", d.intro_secs),
            avatar_secs: env_u32("AVATAR_SECS", d.avatar_secs),
            strategy_secs: env_u32("STRATEGY_SECS", d.strategy_secs),
            teaser_secs: env_u32("TEASER_SECS", d.teaser_secs),
            bailout_cash: env_f64("BAILOUT_CASH", d.bailout_cash),
            risk_shield_relief: env_u32("RISK_SHIELD_RELIEF", d.risk_shield_relief as u32) as u8,
            analyst_url: std::env::var("ANALYST_URL").ok().filter(|s| !s.is_empty()),
            analyst_timeout_ms: std::env::var("ANALYST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(d.analyst_timeout_ms),
            seed: std::env::var("MATCH_SEED").ok().and_then(|v| v.parse().ok()),
        }
    }

    /// Identifies a parameterization for run correlation in logs.
    pub fn config_hash(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        hex::encode(hasher.finalize())
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    PreMatch,
    Playing,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubPhase {
    Intro,
    AvatarSelection,
    StrategySelection,
    ScenarioTeaser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Per-class market mood, bounded [-100, 100].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentimentBoard {
    #[serde(rename = "STOCK")]
    pub stock: f64,
    #[serde(rename = "CRYPTO")]
    pub crypto: f64,
    #[serde(rename = "BOND")]
    pub bond: f64,
    #[serde(rename = "ETF")]
    pub etf: f64,
}

impl SentimentBoard {
    pub fn get(&self, class: AssetClass) -> f64 {
        match class {
            AssetClass::Stock => self.stock,
            AssetClass::Crypto => self.crypto,
            AssetClass::Bond => self.bond,
            AssetClass::Etf => self.etf,
        }
    }

    /// Shift a class's score, clamping to [-100, 100].
    pub fn shift(&mut self, class: AssetClass, delta: f64) {
        let slot = match class {
            AssetClass::Stock => &mut self.stock,
            AssetClass::Crypto => &mut self.crypto,
            AssetClass::Bond => &mut self.bond,
            AssetClass::Etf => &mut self.etf,
        };
        *slot = (*slot + delta).clamp(-100.0, 100.0);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Asset {
    pub id: String,
    pub class: AssetClass,
    pub sector: Sector,
    pub current_price: f64,
    /// Last 50 post-clamp prices, oldest first.
    pub history: Vec<f64>,
}

impl Asset {
    fn from_catalog(def: &catalog::AssetDef) -> Self {
        Self {
            id: def.id.to_string(),
            class: def.class,
            sector: def.sector,
            current_price: def.starting_price,
            history: vec![def.starting_price],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub asset_id: String,
    pub quantity: f64,
    pub avg_buy_price: f64,
}

/// Immutable forensic record of an executed trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionEntry {
    pub round: u32,
    pub side: TradeSide,
    pub asset_id: String,
    pub asset_class: AssetClass,
    pub quantity: f64,
    /// Post-slippage execution price.
    pub price: f64,
    pub total_value: f64,
    pub event_active: Option<String>,
    pub sentiment_at_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerUp {
    pub kind: PowerUpKind,
    pub uses_left: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct Player {
    /// Connection id; rebound when the same name rejoins.
    pub id: String,
    pub name: String,
    pub cash: f64,
    pub holdings: Vec<Holding>,
    pub risk_score: u8,
    pub power_ups: Vec<PowerUp>,
    pub total_value: f64,
    pub avatar: Option<AvatarId>,
    pub strategy: Option<StrategyKind>,
    pub ready: bool,
    pub transaction_log: Vec<TransactionEntry>,
}

impl Player {
    pub fn new(id: String, name: String, cfg: &Config) -> Self {
        Self {
            id,
            name,
            cash: cfg.starting_cash,
            holdings: Vec::new(),
            risk_score: 0,
            power_ups: vec![
                PowerUp { kind: PowerUpKind::RiskShield, uses_left: 1 },
                PowerUp { kind: PowerUpKind::Bailout, uses_left: 1 },
            ],
            total_value: cfg.starting_cash,
            avatar: None,
            strategy: None,
            ready: false,
            transaction_log: Vec::new(),
        }
    }

    pub fn holding(&self, asset_id: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.asset_id == asset_id)
    }
}

/// News drawn for a round, retained for the results composer.
#[derive(Debug, Clone, Serialize)]
pub struct RoundNews {
    pub round: u32,
    pub card: NewsCard,
}

/// The single shared game state, owned and exclusively mutated by the
/// engine's serialized command/tick loop.
#[derive(Debug, Clone, Serialize)]
pub struct MatchState {
    pub phase: Phase,
    pub sub_phase: SubPhase,
    pub current_round: u32,
    pub max_rounds: u32,
    pub time_remaining: u32,
    pub fear_zone_active: bool,
    pub active_event: Option<NewsCard>,
    pub active_scenario: Option<Scenario>,
    pub sentiment: SentimentBoard,
    pub players: Vec<Player>,
    pub assets: Vec<Asset>,
    /// Diagnostic only: coarse polarity of the current round's news and how
    /// many consecutive rounds shared it.
    pub last_polarity: Polarity,
    pub consecutive_same_sentiment: u32,
    /// Tick counter within the current round (0 before the first tick).
    #[serde(skip)]
    pub tick_in_round: u32,
    /// Price of each asset at the start of the current round (safety rail
    /// anchor).
    #[serde(skip)]
    pub round_start_prices: HashMap<String, f64>,
    #[serde(skip)]
    pub round_news: Vec<RoundNews>,
}

impl MatchState {
    pub fn new() -> Self {
        Self {
            phase: Phase::PreMatch,
            sub_phase: SubPhase::Intro,
            current_round: 0,
            max_rounds: Config::default().max_rounds,
            time_remaining: 0,
            fear_zone_active: false,
            active_event: None,
            active_scenario: None,
            sentiment: SentimentBoard::default(),
            players: Vec::new(),
            assets: catalog::ASSETS.iter().map(Asset::from_catalog).collect(),
            last_polarity: Polarity::Neutral,
            consecutive_same_sentiment: 0,
            tick_in_round: 0,
            round_start_prices: HashMap::new(),
            round_news: Vec::new(),
        }
    }

    pub fn with_config(cfg: &Config) -> Self {
        let mut s = Self::new();
        s.max_rounds = cfg.max_rounds;
        s
    }

    /// Wholesale reset: fresh assets and board, connected players restored
    /// at starting balances. There is no partial teardown.
    pub fn reset(&mut self, cfg: &Config) {
        let survivors: Vec<(String, String)> = self
            .players
            .iter()
            .map(|p| (p.id.clone(), p.name.clone()))
            .collect();
        *self = Self::with_config(cfg);
        self.players = survivors
            .into_iter()
            .map(|(id, name)| Player::new(id, name, cfg))
            .collect();
    }

    /// Idle means no countdown or round is in flight; the first join (or a
    /// reset) kicks off the intro countdown.
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::PreMatch
            && self.sub_phase == SubPhase::Intro
            && self.time_remaining == 0
            && self.current_round == 0
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn asset(&self, id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == id)
    }

    pub fn asset_mut(&mut self, id: &str) -> Option<&mut Asset> {
        self.assets.iter_mut().find(|a| a.id == id)
    }

    /// Deterministic state hash for replay validation. Floats are quantized
    /// so equal-looking states hash equally.
    pub fn state_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut h = DefaultHasher::new();
        (self.phase as u8).hash(&mut h);
        (self.sub_phase as u8).hash(&mut h);
        self.current_round.hash(&mut h);
        self.tick_in_round.hash(&mut h);
        self.time_remaining.hash(&mut h);
        self.fear_zone_active.hash(&mut h);
        self.active_event.as_ref().map(|c| c.id).hash(&mut h);
        self.active_scenario.as_ref().map(|s| s.id).hash(&mut h);

        for q in [
            self.sentiment.stock,
            self.sentiment.crypto,
            self.sentiment.bond,
            self.sentiment.etf,
        ] {
            ((q * 1e6) as i64).hash(&mut h);
        }

        for asset in &self.assets {
            asset.id.hash(&mut h);
            ((asset.current_price * 1e8) as i64).hash(&mut h);
        }

        for player in &self.players {
            player.id.hash(&mut h);
            player.name.hash(&mut h);
            ((player.cash * 1e8) as i64).hash(&mut h);
            ((player.total_value * 1e8) as i64).hash(&mut h);
            player.risk_score.hash(&mut h);
            player.avatar.hash(&mut h);
            player.strategy.hash(&mut h);
            for power_up in &player.power_ups {
                power_up.kind.hash(&mut h);
                power_up.uses_left.hash(&mut h);
            }
            player.transaction_log.len().hash(&mut h);
            for holding in &player.holdings {
                holding.asset_id.hash(&mut h);
                ((holding.quantity * 1e8) as i64).hash(&mut h);
                ((holding.avg_buy_price * 1e8) as i64).hash(&mut h);
            }
        }

        h.finish()
    }
}

impl Default for MatchState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_is_idle() {
        let s = MatchState::new();
        assert!(s.is_idle());
        assert_eq!(s.phase, Phase::PreMatch);
        assert_eq!(s.current_round, 0);
        assert!(!s.assets.is_empty());
    }

    #[test]
    fn sentiment_board_clamps() {
        let mut b = SentimentBoard::default();
        b.shift(AssetClass::Stock, 250.0);
        assert_eq!(b.get(AssetClass::Stock), 100.0);
        b.shift(AssetClass::Stock, -500.0);
        assert_eq!(b.get(AssetClass::Stock), -100.0);
    }

    #[test]
    fn reset_restores_players_with_starting_balances() {
        let cfg = Config::default();
        let mut s = MatchState::with_config(&cfg);
        let mut p = Player::new("c1".into(), "ada".into(), &cfg);
        p.cash = 5.0;
        p.risk_score = 80;
        p.avatar = Some(AvatarId::Bull);
        s.players.push(p);
        s.current_round = 3;
        s.phase = Phase::Playing;

        s.reset(&cfg);
        assert_eq!(s.players.len(), 1);
        assert_eq!(s.players[0].cash, cfg.starting_cash);
        assert_eq!(s.players[0].risk_score, 0);
        assert_eq!(s.players[0].avatar, None);
        assert!(s.is_idle());
    }

    #[test]
    fn reset_is_idempotent_by_hash() {
        let cfg = Config::default();
        let mut s = MatchState::with_config(&cfg);
        s.players.push(Player::new("c1".into(), "ada".into(), &cfg));
        s.reset(&cfg);
        let h1 = s.state_hash();
        s.reset(&cfg);
        assert_eq!(h1, s.state_hash());
    }

    #[test]
    fn config_hash_is_stable() {
        let cfg = Config::default();
        assert_eq!(cfg.config_hash(), cfg.config_hash());
        assert_eq!(cfg.config_hash().len(), 64);
    }

    #[test]
    fn state_hash_tracks_selections_power_ups_and_scenario() {
        let cfg = Config::default();
        let mut base = MatchState::with_config(&cfg);
        base.players.push(Player::new("c1".into(), "ada".into(), &cfg));
        let h0 = base.state_hash();

        let mut s = base.clone();
        s.players[0].avatar = Some(AvatarId::Owl);
        assert_ne!(h0, s.state_hash());

        let mut s = base.clone();
        s.players[0].strategy = Some(StrategyKind::Momentum);
        assert_ne!(h0, s.state_hash());

        let mut s = base.clone();
        s.players[0].power_ups[0].uses_left = 0;
        assert_ne!(h0, s.state_hash());

        let mut s = base.clone();
        s.players[0].total_value += 1.0;
        assert_ne!(h0, s.state_hash());

        let mut s = base.clone();
        s.active_scenario = Some(catalog::SCENARIOS[0].clone());
        assert_ne!(h0, s.state_hash());
    }

    #[test]
    fn state_hash_tracks_price_changes() {
        let s = MatchState::new();
        let h1 = s.state_hash();
        let mut s2 = s.clone();
        s2.assets[0].current_price += 0.5;
        assert_ne!(h1, s2.state_hash());
    }
}
