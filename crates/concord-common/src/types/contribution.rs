//! AgentContribution - one observed unit of work by one agent on one task
//!
//! ## Quality scale contract
//!
//! Quality scores handed to Concord are on a **0–100 scale**. The score of a
//! contribution is
//!
//! ```text
//! quality_delta      = max(0, quality_after − quality_before)
//! raw_score          = quality_delta × effort_ratio × impact_multiplier
//! contribution_score = clamp(raw_score / 100, 0, 1)
//! ```
//!
//! A collaborator scoring quality on 0–1 will see every contribution
//! collapse towards zero; rescale before recording.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Divisor mapping a 0–100 quality delta onto [0, 1]
pub const QUALITY_SCALE: f64 = 100.0;

/// Immutable contribution record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentContribution {
    /// Contributing agent
    pub agent_id: String,
    /// Task the work belongs to
    pub task_id: String,
    /// Normalized score in [0, 1]
    pub contribution_score: f64,
    /// Non-negative quality improvement
    pub quality_delta: f64,
    /// Relative effort spent on the work unit
    pub effort_ratio: f64,
    /// Task-specific impact weighting
    pub impact_multiplier: f64,
    /// When the contribution was recorded
    pub timestamp: DateTime<Utc>,
}

impl AgentContribution {
    /// Build a contribution from a quality-before/after observation
    ///
    /// Inputs are expected to be finite; a non-finite product is mapped to
    /// the nearest bound (NaN counts as no improvement).
    pub fn from_quality(
        agent_id: impl Into<String>,
        task_id: impl Into<String>,
        quality_before: f64,
        quality_after: f64,
        effort_ratio: f64,
        impact_multiplier: f64,
    ) -> Self {
        let quality_delta = (quality_after - quality_before).max(0.0);
        let contribution_score =
            Self::score(quality_delta * effort_ratio * impact_multiplier);

        Self {
            agent_id: agent_id.into(),
            task_id: task_id.into(),
            contribution_score,
            quality_delta,
            effort_ratio,
            impact_multiplier,
            timestamp: Utc::now(),
        }
    }

    /// Map a raw score onto [0, 1]
    #[inline]
    pub fn score(raw_score: f64) -> f64 {
        if raw_score.is_nan() {
            return 0.0;
        }
        (raw_score / QUALITY_SCALE).clamp(0.0, 1.0)
    }
}
