//! Attribution engine module
//!
//! - shapley: Monte Carlo permutation sampling over an additive game
//! - actor: the engine state and its single-consumer command loop
//! - handle: cloneable async client for a spawned engine

pub mod actor;
pub mod handle;
pub mod shapley;

pub use actor::{AttributionEngine, DEFAULT_EXPORT_LIMIT, DEFAULT_RANKING_WINDOW};
pub use handle::AttributionHandle;
