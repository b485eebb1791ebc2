//! Reward shaping strategies
//!
//! Three monotonic transforms map a normalized contribution score onto a
//! reward:
//!
//! ```text
//! LINEAR       r = base × s
//! EXPONENTIAL  r = base × s²
//! SIGMOID      r = base / (1 + e^(−k·(s − m)))
//! ```
//!
//! Unrecognized strategy names resolve to LINEAR rather than failing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Selectable reward shaping strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ShapingStrategy {
    /// Reward proportional to the score
    #[default]
    Linear,
    /// Reward proportional to the squared score; penalizes low contributors
    Exponential,
    /// Logistic curve centred on a configurable midpoint
    Sigmoid,
}

impl ShapingStrategy {
    /// All valid strategies
    pub const ALL: [ShapingStrategy; 3] = [
        ShapingStrategy::Linear,
        ShapingStrategy::Exponential,
        ShapingStrategy::Sigmoid,
    ];

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapingStrategy::Linear => "linear",
            ShapingStrategy::Exponential => "exponential",
            ShapingStrategy::Sigmoid => "sigmoid",
        }
    }

    /// Look up a strategy by name (case-insensitive); `None` if unrecognized
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "linear" => Some(ShapingStrategy::Linear),
            "exponential" => Some(ShapingStrategy::Exponential),
            "sigmoid" => Some(ShapingStrategy::Sigmoid),
            _ => None,
        }
    }
}

impl fmt::Display for ShapingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lenient conversion: unknown names become LINEAR
impl From<&str> for ShapingStrategy {
    fn from(name: &str) -> Self {
        Self::from_name(name).unwrap_or_default()
    }
}

impl From<String> for ShapingStrategy {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<ShapingStrategy> for String {
    fn from(strategy: ShapingStrategy) -> Self {
        strategy.as_str().to_string()
    }
}

/// Strategy recorded on an attribution report
///
/// `None` marks a degenerate report where no shaping was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliedStrategy {
    None,
    Linear,
    Exponential,
    Sigmoid,
}

impl AppliedStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppliedStrategy::None => "none",
            AppliedStrategy::Linear => "linear",
            AppliedStrategy::Exponential => "exponential",
            AppliedStrategy::Sigmoid => "sigmoid",
        }
    }
}

impl From<ShapingStrategy> for AppliedStrategy {
    fn from(strategy: ShapingStrategy) -> Self {
        match strategy {
            ShapingStrategy::Linear => AppliedStrategy::Linear,
            ShapingStrategy::Exponential => AppliedStrategy::Exponential,
            ShapingStrategy::Sigmoid => AppliedStrategy::Sigmoid,
        }
    }
}

impl fmt::Display for AppliedStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate statistics over a shaper's bounded reward history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyStats {
    /// Number of shaped rewards in history
    pub count: usize,
    /// Mean shaped reward
    pub avg_reward: f64,
    /// Mean input contribution score
    pub avg_contribution: f64,
    /// Largest shaped reward
    pub max_reward: f64,
    /// Smallest shaped reward
    pub min_reward: f64,
    /// Strategy active when the stats were taken
    pub strategy: ShapingStrategy,
}

impl StrategyStats {
    /// Stats for an empty history
    pub fn empty(strategy: ShapingStrategy) -> Self {
        Self {
            count: 0,
            avg_reward: 0.0,
            avg_contribution: 0.0,
            max_reward: 0.0,
            min_reward: 0.0,
            strategy,
        }
    }
}
