//! # Concord Common
//!
//! Shared records, errors, and constants for Concord credit attribution.
//!
//! ## Core Types
//!
//! - [`AgentContribution`]: one agent's observed quality improvement on one task
//! - [`AttributionReport`]: normalized attribution and reward split for one task
//! - [`ShapingStrategy`]: reward shaping transform (linear, exponential, sigmoid)
//! - [`StrategyStats`]: summary of a shaper's reward history

pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ConcordError, ConfigError, InputError, Result};
pub use types::{
    contribution::{AgentContribution, QUALITY_SCALE},
    report::AttributionReport,
    strategy::{AppliedStrategy, ShapingStrategy, StrategyStats},
};

/// Concord version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Per-agent contribution history cap
pub const MAX_CONTRIBUTION_HISTORY: usize = 100_000;

/// Reward shaper history cap
pub const MAX_REWARD_HISTORY: usize = 10_000;

/// Attribution report history cap
pub const MAX_REPORT_HISTORY: usize = 10_000;

/// Default Monte Carlo permutation rounds
pub const DEFAULT_SHAPLEY_ITERATIONS: usize = 100;

/// Default logistic steepness (k)
pub const DEFAULT_SIGMOID_STEEPNESS: f64 = 10.0;

/// Default logistic midpoint (m)
pub const DEFAULT_SIGMOID_MIDPOINT: f64 = 0.5;

/// Tolerance for "attribution values sum to one"
pub const NORMALIZATION_TOLERANCE: f64 = 1e-6;

/// Replace NaN and ±Infinity with 0.0
///
/// Returns the sanitized value and whether a replacement happened.
#[inline]
pub fn finite_or_zero(value: f64) -> (f64, bool) {
    if value.is_finite() {
        (value, false)
    } else {
        (0.0, true)
    }
}
