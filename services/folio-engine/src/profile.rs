//! Risk profiles and portfolio mix types.
//!
//! Both enumerations parse from their canonical kebab-case names as well as
//! the Traditional Chinese labels used by the upstream market-data exports.

use serde::{Deserialize, Serialize};

// ============================================================================
// Risk Profile
// ============================================================================

/// User-declared risk tolerance. Selects stock tier, thresholds and weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskProfile {
    Conservative,
    Moderate,
    Aggressive,
}

impl RiskProfile {
    /// All profiles, lowest risk first.
    pub const ALL: [RiskProfile; 3] = [Self::Conservative, Self::Moderate, Self::Aggressive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Moderate => "moderate",
            Self::Aggressive => "aggressive",
        }
    }
}

impl std::fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conservative" | "保守型" => Ok(Self::Conservative),
            "moderate" | "balanced" | "穩健型" | "稳健型" => Ok(Self::Moderate),
            "aggressive" | "積極型" | "积极型" => Ok(Self::Aggressive),
            _ => Err(format!("Unknown risk profile: {}", s)),
        }
    }
}

// ============================================================================
// Mix Type
// ============================================================================

/// Asset-mix strategy requested for a portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MixType {
    /// Individual equities only
    PureEquity,
    /// Funds only
    PureFund,
    /// Fund core plus equity satellite
    Hybrid,
}

impl MixType {
    pub const ALL: [MixType; 3] = [Self::PureEquity, Self::PureFund, Self::Hybrid];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PureEquity => "pure-equity",
            Self::PureFund => "pure-fund",
            Self::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for MixType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MixType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "pure-equity" | "equity" | "stocks" | "純個股" => Ok(Self::PureEquity),
            "pure-fund" | "fund" | "funds" | "etf" | "純-etf" | "純etf" => Ok(Self::PureFund),
            "hybrid" | "混合型" => Ok(Self::Hybrid),
            _ => Err(format!("Unknown portfolio mix type: {}", s)),
        }
    }
}
