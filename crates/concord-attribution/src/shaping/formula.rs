//! Shaping formulas
//!
//! ```text
//! LINEAR       r = base × s
//! EXPONENTIAL  r = base × s²
//! SIGMOID      r = base × 1 / (1 + e^(−k·(s − m)))
//! ```

use concord_common::ShapingStrategy;

/// Logistic curve parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmoidParams {
    /// Steepness (k)
    pub steepness: f64,
    /// Midpoint (m)
    pub midpoint: f64,
}

/// Apply a shaping strategy to a score
#[inline]
pub fn shape(strategy: ShapingStrategy, score: f64, base: f64, params: SigmoidParams) -> f64 {
    match strategy {
        ShapingStrategy::Linear => linear(score, base),
        ShapingStrategy::Exponential => exponential(score, base),
        ShapingStrategy::Sigmoid => sigmoid(score, base, params),
    }
}

#[inline]
pub fn linear(score: f64, base: f64) -> f64 {
    base * score
}

#[inline]
pub fn exponential(score: f64, base: f64) -> f64 {
    base * score * score
}

#[inline]
pub fn sigmoid(score: f64, base: f64, params: SigmoidParams) -> f64 {
    base * (1.0 / (1.0 + (-params.steepness * (score - params.midpoint)).exp()))
}
