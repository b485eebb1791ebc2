//! AttributionReport - the outcome of one multi-agent attribution
//!
//! Reports are the only externally visible artefact of the attribution
//! core. Downstream collaborators persist them as append-only records and
//! read `rewards` to pay agents out.
//!
//! Degraded outcomes are encoded in the values, never as errors:
//!
//! | Case | `agents` | `contributions` / `rewards` | `strategy_used` |
//! |---|---|---|---|
//! | EmptyInput | empty | empty | `none` |
//! | ZeroTotalValue | non-empty | all `0.0` | the active strategy |
//! | Normal | non-empty | contributions sum to 1 | the active strategy |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::strategy::AppliedStrategy;
use crate::Result;

/// Immutable attribution report for one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionReport {
    /// Unique report ID (UUIDv7, time-ordered)
    pub report_id: Uuid,
    /// Task the report attributes
    pub task_id: String,
    /// Participating agents, sorted by ID
    pub agents: Vec<String>,
    /// Normalized attribution value per agent
    pub contributions: BTreeMap<String, f64>,
    /// Reward allocated per agent
    pub rewards: BTreeMap<String, f64>,
    /// Reward pool that was split
    pub total_reward: f64,
    /// Shaping strategy applied
    pub strategy_used: AppliedStrategy,
    /// Wall-clock cost of the computation
    pub computation_time_ms: f64,
    /// When the report was produced
    pub timestamp: DateTime<Utc>,
}

impl AttributionReport {
    /// Degenerate report for an attribution with no agents
    pub fn empty(task_id: impl Into<String>) -> Self {
        Self {
            report_id: Uuid::now_v7(),
            task_id: task_id.into(),
            agents: Vec::new(),
            contributions: BTreeMap::new(),
            rewards: BTreeMap::new(),
            total_reward: 0.0,
            strategy_used: AppliedStrategy::None,
            computation_time_ms: 0.0,
            timestamp: Utc::now(),
        }
    }

    /// Build a fully populated report
    pub fn new(
        task_id: impl Into<String>,
        agents: Vec<String>,
        contributions: BTreeMap<String, f64>,
        rewards: BTreeMap<String, f64>,
        total_reward: f64,
        strategy_used: AppliedStrategy,
        computation_time_ms: f64,
    ) -> Self {
        Self {
            report_id: Uuid::now_v7(),
            task_id: task_id.into(),
            agents,
            contributions,
            rewards,
            total_reward,
            strategy_used,
            computation_time_ms,
            timestamp: Utc::now(),
        }
    }

    /// True for the EmptyInput case
    pub fn is_degenerate(&self) -> bool {
        self.agents.is_empty()
    }

    /// True if at least one agent received positive attribution
    pub fn has_attribution(&self) -> bool {
        self.contributions.values().any(|v| *v > 0.0)
    }

    /// Sum of all allocated rewards
    pub fn total_distributed(&self) -> f64 {
        self.rewards.values().sum()
    }

    /// Attribution value for an agent (0.0 if absent)
    pub fn contribution_of(&self, agent_id: &str) -> f64 {
        self.contributions.get(agent_id).copied().unwrap_or(0.0)
    }

    /// Reward for an agent (0.0 if absent)
    pub fn reward_of(&self, agent_id: &str) -> f64 {
        self.rewards.get(agent_id).copied().unwrap_or(0.0)
    }

    /// Serialize to a JSON value
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> AttributionReport {
        let contributions: BTreeMap<_, _> =
            [("a".to_string(), 0.75), ("b".to_string(), 0.25)].into_iter().collect();
        let rewards: BTreeMap<_, _> =
            [("a".to_string(), 75.0), ("b".to_string(), 25.0)].into_iter().collect();

        AttributionReport::new(
            "task-1",
            vec!["a".into(), "b".into()],
            contributions,
            rewards,
            100.0,
            AppliedStrategy::Linear,
            0.4,
        )
    }

    #[test]
    fn test_empty_report() {
        let report = AttributionReport::empty("task-0");
        assert!(report.is_degenerate());
        assert!(!report.has_attribution());
        assert_eq!(report.total_reward, 0.0);
        assert_eq!(report.strategy_used, AppliedStrategy::None);
        assert_eq!(report.computation_time_ms, 0.0);
    }

    #[test]
    fn test_accessors() {
        let report = sample_report();
        assert!(!report.is_degenerate());
        assert!(report.has_attribution());
        assert_eq!(report.total_distributed(), 100.0);
        assert_eq!(report.contribution_of("a"), 0.75);
        assert_eq!(report.reward_of("b"), 25.0);
        assert_eq!(report.reward_of("missing"), 0.0);
    }

    #[test]
    fn test_json_schema_fields() {
        let json = sample_report().to_json().unwrap();
        for field in [
            "task_id",
            "agents",
            "contributions",
            "rewards",
            "total_reward",
            "strategy_used",
            "computation_time_ms",
            "timestamp",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(json["strategy_used"], "linear");
        assert_eq!(json["rewards"]["a"], 75.0);
    }

    #[test]
    fn test_report_ids_are_unique() {
        let a = AttributionReport::empty("t");
        let b = AttributionReport::empty("t");
        assert_ne!(a.report_id, b.report_id);
    }
}
