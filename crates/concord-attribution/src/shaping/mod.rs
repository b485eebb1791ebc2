//! Reward shaping module
//!
//! Provides monotonic reward transforms and proportional pool allocation:
//! - formula: the LINEAR / EXPONENTIAL / SIGMOID transforms
//! - RewardShaper: strategy selection, bounded history, pool splitting

pub mod formula;
pub mod shaper;

pub use formula::SigmoidParams;
pub use shaper::{RewardShaper, ShapedReward};
