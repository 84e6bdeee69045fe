//! Immutable reference data: assets, avatars, strategies, scenarios, news
//! cards, and the sector/class tables the pricing and sentiment models read.
//!
//! Everything here is totality-checked at startup by [`validate`]: every
//! enum value has a defined table entry, every asset declares its sector
//! explicitly. There is no use-time fallback.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetClass {
    Stock,
    Crypto,
    Bond,
    Etf,
}

impl AssetClass {
    pub const ALL: [AssetClass; 4] = [
        AssetClass::Stock,
        AssetClass::Crypto,
        AssetClass::Bond,
        AssetClass::Etf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Stock => "STOCK",
            AssetClass::Crypto => "CRYPTO",
            AssetClass::Bond => "BOND",
            AssetClass::Etf => "ETF",
        }
    }
}

/// Per-class price-formation parameters.
///
/// `new = price * (1 + drift + sensitivity * S + noise)`, where noise is
/// Gaussian scaled so ~99.7% of draws land within `±noise_range`.
#[derive(Debug, Clone, Copy)]
pub struct ClassParams {
    /// Natural per-tick growth/decay (r_base).
    pub drift: f64,
    /// News impact weight (alpha); doubles as the volatility factor in the
    /// risk score.
    pub sensitivity: f64,
    /// Noise band: ~99.7% of per-tick noise draws stay within ±this.
    pub noise_range: f64,
}

impl ClassParams {
    pub fn for_class(class: AssetClass) -> ClassParams {
        match class {
            AssetClass::Stock => ClassParams { drift: 0.0015, sensitivity: 0.04, noise_range: 0.008 },
            AssetClass::Crypto => ClassParams { drift: 0.0005, sensitivity: 0.08, noise_range: 0.015 },
            AssetClass::Bond => ClassParams { drift: 0.0002, sensitivity: 0.02, noise_range: 0.003 },
            AssetClass::Etf => ClassParams { drift: 0.0012, sensitivity: 0.03, noise_range: 0.006 },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    Technology,
    Finance,
    Energy,
    Crypto,
    Bonds,
    Gold,
}

impl Sector {
    pub const ALL: [Sector; 6] = [
        Sector::Technology,
        Sector::Finance,
        Sector::Energy,
        Sector::Crypto,
        Sector::Bonds,
        Sector::Gold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Technology => "technology",
            Sector::Finance => "finance",
            Sector::Energy => "energy",
            Sector::Crypto => "crypto",
            Sector::Bonds => "bonds",
            Sector::Gold => "gold",
        }
    }

    /// Asset classes a sector's news routes to.
    pub fn asset_classes(&self) -> &'static [AssetClass] {
        match self {
            Sector::Technology => &[AssetClass::Stock],
            Sector::Finance => &[AssetClass::Stock, AssetClass::Etf, AssetClass::Bond],
            Sector::Energy => &[AssetClass::Stock, AssetClass::Etf],
            Sector::Crypto => &[AssetClass::Crypto],
            Sector::Bonds => &[AssetClass::Bond],
            Sector::Gold => &[AssetClass::Etf],
        }
    }

    /// Direct-hit impact weight. Kept as an explicit table even though every
    /// entry is currently 1.0, so per-sector tuning stays a data change.
    pub fn impact_weight(&self) -> f64 {
        match self {
            Sector::Technology => 1.0,
            Sector::Finance => 1.0,
            Sector::Energy => 1.0,
            Sector::Crypto => 1.0,
            Sector::Bonds => 1.0,
            Sector::Gold => 1.0,
        }
    }
}

/// Asymmetric sector correlation: how much news hitting `from` bleeds into
/// `to`. Negative entries model flight-to-safety (bonds/gold).
pub fn sector_correlation(from: Sector, to: Sector) -> f64 {
    use Sector::*;
    match (from, to) {
        (Technology, Finance) => 0.3,
        (Technology, Crypto) => 0.2,
        (Finance, Technology) => 0.3,
        (Finance, Bonds) => 0.4,
        (Finance, Energy) => 0.2,
        (Energy, Finance) => 0.2,
        (Crypto, Technology) => 0.2,
        (Bonds, Finance) => 0.4,
        (Bonds, Gold) => -0.3,
        (Gold, Bonds) => -0.3,
        (Gold, Finance) => -0.2,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    VeryNegative,
    Negative,
    Neutral,
    Positive,
    VeryPositive,
}

impl SentimentLabel {
    /// Normalized score in [-1, 1].
    pub fn score(&self) -> f64 {
        match self {
            SentimentLabel::VeryNegative => -1.0,
            SentimentLabel::Negative => -0.5,
            SentimentLabel::Neutral => 0.0,
            SentimentLabel::Positive => 0.5,
            SentimentLabel::VeryPositive => 1.0,
        }
    }

    pub fn polarity(&self) -> Polarity {
        match self {
            SentimentLabel::VeryNegative | SentimentLabel::Negative => Polarity::Negative,
            SentimentLabel::Neutral => Polarity::Neutral,
            SentimentLabel::Positive | SentimentLabel::VeryPositive => Polarity::Positive,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::VeryNegative => "very_negative",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Positive => "positive",
            SentimentLabel::VeryPositive => "very_positive",
        }
    }
}

/// Coarse round-level sentiment polarity, tracked across rounds as
/// diagnostic state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvatarId {
    Bull,
    Bear,
    Wolf,
    Owl,
}

#[derive(Debug, Clone, Serialize)]
pub struct Avatar {
    pub id: AvatarId,
    pub name: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyKind {
    Diversifier,
    SafetyFirst,
    Momentum,
    Contrarian,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Diversifier => "DIVERSIFIER",
            StrategyKind::SafetyFirst => "SAFETY_FIRST",
            StrategyKind::Momentum => "MOMENTUM",
            StrategyKind::Contrarian => "CONTRARIAN",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyDef {
    pub kind: StrategyKind,
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKind {
    /// One-shot: subtract 20 from the current risk score (floor 0).
    RiskShield,
    /// One-shot: add $1000 cash.
    Bailout,
}

impl PowerUpKind {
    pub fn name(&self) -> &'static str {
        match self {
            PowerUpKind::RiskShield => "Risk Shield",
            PowerUpKind::Bailout => "Bailout",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PowerUpKind::RiskShield => "-20 Risk Score",
            PowerUpKind::Bailout => "+$1000 Cash",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Scenario {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewsCard {
    pub id: &'static str,
    pub title: &'static str,
    pub sentiment: SentimentLabel,
    pub affected_sectors: &'static [Sector],
}

/// Catalog asset definition. Sector membership is declared here, not
/// inferred from the id at use time.
#[derive(Debug, Clone, Serialize)]
pub struct AssetDef {
    pub id: &'static str,
    pub class: AssetClass,
    pub sector: Sector,
    pub starting_price: f64,
}

pub const ASSETS: &[AssetDef] = &[
    AssetDef { id: "tcs", class: AssetClass::Stock, sector: Sector::Technology, starting_price: 150.0 },
    AssetDef { id: "infy", class: AssetClass::Stock, sector: Sector::Technology, starting_price: 80.0 },
    AssetDef { id: "hdfc", class: AssetClass::Stock, sector: Sector::Finance, starting_price: 60.0 },
    AssetDef { id: "icici", class: AssetClass::Stock, sector: Sector::Finance, starting_price: 45.0 },
    AssetDef { id: "reliance", class: AssetClass::Stock, sector: Sector::Energy, starting_price: 120.0 },
    AssetDef { id: "it-bees", class: AssetClass::Etf, sector: Sector::Technology, starting_price: 35.0 },
    AssetDef { id: "bank-bees", class: AssetClass::Etf, sector: Sector::Finance, starting_price: 40.0 },
    AssetDef { id: "infra-bees", class: AssetClass::Etf, sector: Sector::Energy, starting_price: 28.0 },
    AssetDef { id: "gold-bees", class: AssetClass::Etf, sector: Sector::Gold, starting_price: 55.0 },
    AssetDef { id: "us-treasury", class: AssetClass::Bond, sector: Sector::Bonds, starting_price: 100.0 },
    AssetDef { id: "corp-bond-aaa", class: AssetClass::Bond, sector: Sector::Bonds, starting_price: 98.0 },
    AssetDef { id: "green-bond", class: AssetClass::Bond, sector: Sector::Energy, starting_price: 102.0 },
    AssetDef { id: "sov-gold-bond", class: AssetClass::Bond, sector: Sector::Gold, starting_price: 105.0 },
    AssetDef { id: "sol", class: AssetClass::Crypto, sector: Sector::Crypto, starting_price: 140.0 },
    AssetDef { id: "ltc", class: AssetClass::Crypto, sector: Sector::Crypto, starting_price: 70.0 },
    AssetDef { id: "doge", class: AssetClass::Crypto, sector: Sector::Crypto, starting_price: 0.12 },
];

pub const AVATARS: &[Avatar] = &[
    Avatar { id: AvatarId::Bull, name: "Raging Bull" },
    Avatar { id: AvatarId::Bear, name: "Patient Bear" },
    Avatar { id: AvatarId::Wolf, name: "Lone Wolf" },
    Avatar { id: AvatarId::Owl, name: "Night Owl" },
];

pub const STRATEGIES: &[StrategyDef] = &[
    StrategyDef {
        kind: StrategyKind::Diversifier,
        name: "Diversifier",
        description: "End-of-match bonus for holding 4+ distinct assets",
    },
    StrategyDef {
        kind: StrategyKind::SafetyFirst,
        name: "Safety First",
        description: "Risk score reduced by 10 every tick",
    },
    StrategyDef {
        kind: StrategyKind::Momentum,
        name: "Momentum Rider",
        description: "No modifier; ride the trend",
    },
    StrategyDef {
        kind: StrategyKind::Contrarian,
        name: "Contrarian",
        description: "No modifier; fade the crowd",
    },
];

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        id: "rate-storm",
        name: "Rate Storm",
        description: "Central banks are on the move. Bonds whipsaw, banks sweat.",
    },
    Scenario {
        id: "tech-mania",
        name: "Tech Mania",
        description: "A product cycle for the ages. Every headline moves tech.",
    },
    Scenario {
        id: "crypto-winter",
        name: "Crypto Winter",
        description: "Leverage is unwinding. Only the hardened survive.",
    },
    Scenario {
        id: "commodity-crunch",
        name: "Commodity Crunch",
        description: "Supply shocks ripple from energy into everything else.",
    },
];

pub const NEWS_CARDS: &[NewsCard] = &[
    NewsCard {
        id: "chip-breakthrough",
        title: "Domestic fab announces 2nm chip breakthrough",
        sentiment: SentimentLabel::VeryPositive,
        affected_sectors: &[Sector::Technology],
    },
    NewsCard {
        id: "it-export-slump",
        title: "IT services exports miss estimates for third quarter",
        sentiment: SentimentLabel::Negative,
        affected_sectors: &[Sector::Technology],
    },
    NewsCard {
        id: "data-breach",
        title: "Massive data breach at top software exporter",
        sentiment: SentimentLabel::VeryNegative,
        affected_sectors: &[Sector::Technology],
    },
    NewsCard {
        id: "rate-cut",
        title: "Central bank surprises with 50bp rate cut",
        sentiment: SentimentLabel::VeryPositive,
        affected_sectors: &[Sector::Finance, Sector::Bonds],
    },
    NewsCard {
        id: "bank-fraud",
        title: "Mid-size lender hit by loan fraud investigation",
        sentiment: SentimentLabel::VeryNegative,
        affected_sectors: &[Sector::Finance],
    },
    NewsCard {
        id: "bond-auction",
        title: "Sovereign bond auction sees record demand",
        sentiment: SentimentLabel::Positive,
        affected_sectors: &[Sector::Bonds],
    },
    NewsCard {
        id: "oil-spike",
        title: "Supply disruption sends crude 8% higher",
        sentiment: SentimentLabel::Negative,
        affected_sectors: &[Sector::Energy, Sector::Finance],
    },
    NewsCard {
        id: "green-subsidy",
        title: "Government doubles renewable energy subsidies",
        sentiment: SentimentLabel::Positive,
        affected_sectors: &[Sector::Energy],
    },
    NewsCard {
        id: "etf-inflows",
        title: "Crypto ETF approval triggers record inflows",
        sentiment: SentimentLabel::VeryPositive,
        affected_sectors: &[Sector::Crypto],
    },
    NewsCard {
        id: "exchange-hack",
        title: "Major exchange halts withdrawals after exploit",
        sentiment: SentimentLabel::VeryNegative,
        affected_sectors: &[Sector::Crypto],
    },
    NewsCard {
        id: "gold-rally",
        title: "Safe-haven demand lifts gold to all-time high",
        sentiment: SentimentLabel::Positive,
        affected_sectors: &[Sector::Gold],
    },
    NewsCard {
        id: "quiet-session",
        title: "Markets drift in holiday-thinned trade",
        sentiment: SentimentLabel::Neutral,
        affected_sectors: &[Sector::Finance],
    },
];

/// Startup totality check. Any violation here is unrecoverable reference
/// data exhaustion, not an in-match condition.
pub fn validate() -> Result<()> {
    if ASSETS.is_empty() {
        bail!("asset catalog is empty");
    }
    let mut ids = HashSet::new();
    for a in ASSETS {
        if !ids.insert(a.id) {
            bail!("duplicate asset id: {}", a.id);
        }
        if a.starting_price <= 0.0 {
            bail!("asset {} has non-positive starting price", a.id);
        }
    }
    if NEWS_CARDS.is_empty() {
        bail!("news catalog is empty");
    }
    for card in NEWS_CARDS {
        if card.affected_sectors.is_empty() {
            bail!("news card {} affects no sectors", card.id);
        }
    }
    if SCENARIOS.is_empty() || AVATARS.is_empty() || STRATEGIES.is_empty() {
        bail!("scenario/avatar/strategy catalog is empty");
    }
    for sector in Sector::ALL {
        if sector.asset_classes().is_empty() {
            bail!("sector {} maps to no asset classes", sector.as_str());
        }
    }
    Ok(())
}
