//! Concord attribution configuration

use concord_common::{
    ConfigError, Result, ShapingStrategy, DEFAULT_SHAPLEY_ITERATIONS, DEFAULT_SIGMOID_MIDPOINT,
    DEFAULT_SIGMOID_STEEPNESS, MAX_CONTRIBUTION_HISTORY, MAX_REPORT_HISTORY, MAX_REWARD_HISTORY,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

/// Attribution subsystem configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributionConfig {
    /// Contribution tracker settings
    pub tracker: TrackerSettings,
    /// Reward shaper settings
    pub shaper: ShaperSettings,
    /// Attribution engine settings
    pub engine: EngineSettings,
}

impl AttributionConfig {
    /// Load configuration from `.env` and `CONCORD_*` environment variables
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// Unset keys keep their defaults. The result is validated.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        // Tracker settings
        if let Some(v) = parse_var(&lookup, "CONCORD_MAX_HISTORY_SIZE")? {
            cfg.tracker.max_history_size = v;
        }

        // Shaper settings
        if let Some(name) = lookup("CONCORD_REWARD_STRATEGY") {
            cfg.shaper.strategy = match ShapingStrategy::from_name(&name) {
                Some(strategy) => strategy,
                None => {
                    warn!(strategy = %name, "Unknown reward strategy, using linear");
                    ShapingStrategy::Linear
                }
            };
        }
        if let Some(v) = parse_var(&lookup, "CONCORD_BASE_REWARD")? {
            cfg.shaper.base_reward = v;
        }
        if let Some(v) = parse_var(&lookup, "CONCORD_SIGMOID_STEEPNESS")? {
            cfg.shaper.sigmoid_steepness = v;
        }
        if let Some(v) = parse_var(&lookup, "CONCORD_SIGMOID_MIDPOINT")? {
            cfg.shaper.sigmoid_midpoint = v;
        }
        if let Some(v) = parse_var(&lookup, "CONCORD_REWARD_HISTORY_SIZE")? {
            cfg.shaper.max_history = v;
        }

        // Engine settings
        if let Some(v) = parse_var(&lookup, "CONCORD_SHAPLEY_ITERATIONS")? {
            cfg.engine.shapley_iterations = v;
        }
        if let Some(v) = parse_var(&lookup, "CONCORD_REPORT_HISTORY_SIZE")? {
            cfg.engine.max_report_history = v;
        }
        if let Some(v) = parse_var(&lookup, "CONCORD_RNG_SEED")? {
            cfg.engine.rng_seed = Some(v);
        }
        if let Some(v) = parse_var(&lookup, "CONCORD_SINK_TIMEOUT_MS")? {
            cfg.engine.sink_timeout_ms = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Check invariants across all sections
    pub fn validate(&self) -> Result<()> {
        self.tracker.validate()?;
        self.shaper.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }
            .into()
        }),
    }
}

/// Contribution tracker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSettings {
    /// Maximum contributions kept per agent (FIFO eviction)
    pub max_history_size: usize,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            max_history_size: MAX_CONTRIBUTION_HISTORY,
        }
    }
}

impl TrackerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_history_size == 0 {
            return Err(ConfigError::ZeroCapacity {
                name: "max_history_size",
            }
            .into());
        }
        Ok(())
    }
}

/// Reward shaper settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaperSettings {
    /// Active shaping strategy
    pub strategy: ShapingStrategy,
    /// Reward for a full score when no custom base is given
    pub base_reward: f64,
    /// Logistic steepness (k)
    pub sigmoid_steepness: f64,
    /// Logistic midpoint (m), in [0, 1]
    pub sigmoid_midpoint: f64,
    /// Maximum shaped rewards kept for statistics
    pub max_history: usize,
}

impl Default for ShaperSettings {
    fn default() -> Self {
        Self {
            strategy: ShapingStrategy::Linear,
            base_reward: 1.0,
            sigmoid_steepness: DEFAULT_SIGMOID_STEEPNESS,
            sigmoid_midpoint: DEFAULT_SIGMOID_MIDPOINT,
            max_history: MAX_REWARD_HISTORY,
        }
    }
}

impl ShaperSettings {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("base_reward", self.base_reward),
            ("sigmoid_steepness", self.sigmoid_steepness),
            ("sigmoid_midpoint", self.sigmoid_midpoint),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { name, value }.into());
            }
        }
        if !(0.0..=1.0).contains(&self.sigmoid_midpoint) {
            return Err(ConfigError::MidpointOutOfRange(self.sigmoid_midpoint).into());
        }
        if self.max_history == 0 {
            return Err(ConfigError::ZeroCapacity {
                name: "reward history",
            }
            .into());
        }
        Ok(())
    }
}

/// Attribution engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Monte Carlo permutation rounds
    pub shapley_iterations: usize,
    /// Maximum reports kept in history
    pub max_report_history: usize,
    /// Command queue depth of the engine actor
    pub channel_buffer: usize,
    /// Fixed RNG seed for reproducible sampling
    pub rng_seed: Option<u64>,
    /// Upper bound on one report sink call
    pub sink_timeout_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            shapley_iterations: DEFAULT_SHAPLEY_ITERATIONS,
            max_report_history: MAX_REPORT_HISTORY,
            channel_buffer: 256,
            rng_seed: None,
            sink_timeout_ms: 5_000,
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<()> {
        if self.shapley_iterations == 0 {
            return Err(ConfigError::ZeroIterations.into());
        }
        if self.max_report_history == 0 {
            return Err(ConfigError::ZeroCapacity {
                name: "report history",
            }
            .into());
        }
        if self.channel_buffer == 0 {
            return Err(ConfigError::ZeroCapacity {
                name: "channel_buffer",
            }
            .into());
        }
        if self.sink_timeout_ms == 0 {
            return Err(ConfigError::ZeroCapacity {
                name: "sink_timeout_ms",
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_common::ConcordError;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AttributionConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.tracker.max_history_size, 100_000);
        assert_eq!(cfg.engine.shapley_iterations, 100);
        assert_eq!(cfg.shaper.max_history, 10_000);
        assert_eq!(cfg.engine.max_report_history, 10_000);
    }

    #[test]
    fn test_env_overrides() {
        let cfg = AttributionConfig::from_lookup(lookup_from(&[
            ("CONCORD_SHAPLEY_ITERATIONS", "5000"),
            ("CONCORD_REWARD_STRATEGY", "sigmoid"),
            ("CONCORD_SIGMOID_MIDPOINT", "0.3"),
            ("CONCORD_RNG_SEED", "42"),
            ("CONCORD_SINK_TIMEOUT_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(cfg.engine.shapley_iterations, 5000);
        assert_eq!(cfg.shaper.strategy, ShapingStrategy::Sigmoid);
        assert_eq!(cfg.shaper.sigmoid_midpoint, 0.3);
        assert_eq!(cfg.engine.rng_seed, Some(42));
        assert_eq!(cfg.engine.sink_timeout_ms, 250);
    }

    #[test]
    fn test_unknown_strategy_falls_back() {
        let cfg =
            AttributionConfig::from_lookup(lookup_from(&[("CONCORD_REWARD_STRATEGY", "cubic")]))
                .unwrap();
        assert_eq!(cfg.shaper.strategy, ShapingStrategy::Linear);
    }

    #[test]
    fn test_unparsable_value_is_rejected() {
        let err = AttributionConfig::from_lookup(lookup_from(&[(
            "CONCORD_SHAPLEY_ITERATIONS",
            "lots",
        )]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConcordError::Config(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validation_failures() {
        let mut cfg = AttributionConfig::default();
        cfg.engine.shapley_iterations = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AttributionConfig::default();
        cfg.shaper.sigmoid_midpoint = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = AttributionConfig::default();
        cfg.shaper.sigmoid_steepness = f64::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = AttributionConfig::default();
        cfg.tracker.max_history_size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AttributionConfig::default();
        cfg.engine.sink_timeout_ms = 0;
        assert!(cfg.validate().is_err());
    }
}
