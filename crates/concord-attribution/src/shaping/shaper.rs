//! Reward shaper
//!
//! Maps normalized contribution scores onto rewards and splits a reward
//! pool proportionally to the shaped values.
//!
//! The shaper is not internally synchronized. It is owned by exactly one
//! [`AttributionEngine`](crate::engine::AttributionEngine) and only touched
//! from that engine's task.

use concord_common::{finite_or_zero, ShapingStrategy, StrategyStats};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, instrument, warn};

use super::formula::{self, SigmoidParams};
use crate::config::ShaperSettings;

/// One entry of the shaper's reward history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapedReward {
    pub agent_id: String,
    pub contribution_score: f64,
    pub reward: f64,
}

/// Strategy-driven reward shaper with bounded history
pub struct RewardShaper {
    settings: ShaperSettings,
    history: VecDeque<ShapedReward>,
}

impl RewardShaper {
    /// Create a shaper from settings
    pub fn new(settings: ShaperSettings) -> Self {
        Self {
            history: VecDeque::with_capacity(settings.max_history.min(1024)),
            settings,
        }
    }

    /// Create a shaper using `strategy` and default parameters
    pub fn with_strategy(strategy: ShapingStrategy) -> Self {
        Self::new(ShaperSettings {
            strategy,
            ..ShaperSettings::default()
        })
    }

    /// Active strategy
    pub fn strategy(&self) -> ShapingStrategy {
        self.settings.strategy
    }

    /// Replace the active strategy
    pub fn set_strategy(&mut self, strategy: ShapingStrategy) {
        if strategy != self.settings.strategy {
            debug!(from = %self.settings.strategy, to = %strategy, "Switching shaping strategy");
        }
        self.settings.strategy = strategy;
    }

    /// Select a strategy by name; unknown names select LINEAR
    pub fn set_strategy_name(&mut self, name: &str) -> ShapingStrategy {
        let strategy = match ShapingStrategy::from_name(name) {
            Some(strategy) => strategy,
            None => {
                warn!(strategy = %name, "Unknown shaping strategy, using linear");
                ShapingStrategy::Linear
            }
        };
        self.set_strategy(strategy);
        strategy
    }

    /// Current settings
    pub fn settings(&self) -> &ShaperSettings {
        &self.settings
    }

    /// Number of shaped rewards retained
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn sigmoid_params(&self) -> SigmoidParams {
        SigmoidParams {
            steepness: self.settings.sigmoid_steepness,
            midpoint: self.settings.sigmoid_midpoint,
        }
    }

    /// Shape one score under the active strategy and record it
    ///
    /// `custom_base_reward` replaces the configured base reward for this call.
    /// Scores are clamped to [0, 1]; non-finite input counts as 0.0.
    pub fn compute_shaped_reward(
        &mut self,
        agent_id: &str,
        contribution_score: f64,
        custom_base_reward: Option<f64>,
    ) -> f64 {
        let (score, replaced) = finite_or_zero(contribution_score);
        if replaced {
            warn!(agent_id, "Non-finite contribution score coerced to 0.0");
        }
        let score = score.clamp(0.0, 1.0);

        let base = match custom_base_reward.map(finite_or_zero) {
            Some((base, false)) => base,
            Some((_, true)) => {
                warn!(agent_id, "Non-finite base reward coerced to 0.0");
                0.0
            }
            None => self.settings.base_reward,
        };

        let reward = formula::shape(self.settings.strategy, score, base, self.sigmoid_params());

        self.history.push_back(ShapedReward {
            agent_id: agent_id.to_string(),
            contribution_score: score,
            reward,
        });
        while self.history.len() > self.settings.max_history {
            self.history.pop_front();
        }

        reward
    }

    /// Split `total_reward_pool` proportionally to shaped contributions
    ///
    /// Shapes with a base of 1.0, then allocates
    /// `shaped[agent] / Σ shaped × pool`. When no agent has a positive
    /// contribution, or the shaped values sum to zero, every agent gets 0.0.
    /// There is no equal-split fallback.
    #[instrument(skip(self, contributions), fields(agents = contributions.len()))]
    pub fn get_reward_distribution(
        &mut self,
        contributions: &BTreeMap<String, f64>,
        total_reward_pool: f64,
    ) -> BTreeMap<String, f64> {
        let (pool, replaced) = finite_or_zero(total_reward_pool);
        if replaced {
            warn!("Non-finite reward pool coerced to 0.0");
        }

        // SIGMOID gives a non-zero floor to zero scores; a map with nothing
        // positive must still pay nothing.
        if !contributions.values().any(|score| *score > 0.0) {
            debug!("No positive contribution, distributing nothing");
            return zero_rewards(contributions);
        }

        let shaped: BTreeMap<String, f64> = contributions
            .iter()
            .map(|(agent_id, score)| {
                let value = self.compute_shaped_reward(agent_id, *score, Some(1.0));
                (agent_id.clone(), value)
            })
            .collect();

        let total_shaped: f64 = shaped.values().sum();
        if total_shaped == 0.0 || !total_shaped.is_finite() {
            debug!(total_shaped, "Shaped values sum to zero, distributing nothing");
            return zero_rewards(contributions);
        }

        shaped
            .into_iter()
            .map(|(agent_id, value)| (agent_id, value / total_shaped * pool))
            .collect()
    }

    /// Summary over the bounded reward history
    pub fn get_strategy_stats(&self) -> StrategyStats {
        if self.history.is_empty() {
            return StrategyStats::empty(self.settings.strategy);
        }

        let count = self.history.len();
        let mut reward_sum = 0.0;
        let mut score_sum = 0.0;
        let mut max_reward = f64::NEG_INFINITY;
        let mut min_reward = f64::INFINITY;
        for entry in &self.history {
            reward_sum += entry.reward;
            score_sum += entry.contribution_score;
            max_reward = max_reward.max(entry.reward);
            min_reward = min_reward.min(entry.reward);
        }

        StrategyStats {
            count,
            avg_reward: reward_sum / count as f64,
            avg_contribution: score_sum / count as f64,
            max_reward,
            min_reward,
            strategy: self.settings.strategy,
        }
    }
}

impl Default for RewardShaper {
    fn default() -> Self {
        Self::new(ShaperSettings::default())
    }
}

fn zero_rewards(contributions: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    contributions.keys().map(|agent_id| (agent_id.clone(), 0.0)).collect()
}
