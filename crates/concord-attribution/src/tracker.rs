//! Contribution tracking
//!
//! Turns quality-before/quality-after observations into a bounded,
//! queryable per-agent contribution record.
//!
//! One mutex guards the whole per-agent map. Every critical section is
//! bounded by `max_history_size`, so the lock is coarse but cheap.

use concord_common::{finite_or_zero, AgentContribution, InputError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, instrument, warn};

use crate::config::TrackerSettings;
use crate::telemetry::AttributionMetrics;

/// Default window for [`ContributionTracker::get_contribution_score`]
pub const DEFAULT_SCORE_WINDOW: usize = 100;

/// Default window for [`ContributionTracker::get_all_agents_scores`]
pub const DEFAULT_ALL_AGENTS_WINDOW: usize = 50;

/// Statistics about the tracker contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerStats {
    pub total_records: usize,
    pub unique_agents: usize,
    pub max_records_per_agent: usize,
}

/// Per-agent contribution history
pub struct ContributionTracker {
    /// Contribution history by agent, oldest first
    histories: Mutex<HashMap<String, VecDeque<AgentContribution>>>,
    /// Maximum contributions kept per agent
    max_history_size: usize,
    /// Optional prometheus collectors
    metrics: Option<AttributionMetrics>,
}

impl ContributionTracker {
    /// Create a tracker keeping at most `max_history_size` records per agent
    pub fn new(max_history_size: usize) -> Self {
        Self {
            histories: Mutex::new(HashMap::new()),
            max_history_size: max_history_size.max(1),
            metrics: None,
        }
    }

    /// Create from settings
    pub fn with_settings(settings: &TrackerSettings) -> Self {
        Self::new(settings.max_history_size)
    }

    /// Attach prometheus collectors
    pub fn with_metrics(mut self, metrics: AttributionMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Configured per-agent cap
    pub fn max_history_size(&self) -> usize {
        self.max_history_size
    }

    /// Record one observation and return its contribution score
    ///
    /// Quality is on a 0–100 scale (see [`AgentContribution`]). Non-finite
    /// numbers are treated as 0.0. Blank identifiers are rejected.
    #[instrument(skip(self))]
    pub fn record_contribution(
        &self,
        agent_id: &str,
        task_id: &str,
        quality_before: f64,
        quality_after: f64,
        effort_ratio: f64,
        impact_multiplier: f64,
    ) -> Result<f64> {
        InputError::require("agent_id", agent_id)?;
        InputError::require("task_id", task_id)?;

        let quality_before = sanitize("quality_before", quality_before);
        let quality_after = sanitize("quality_after", quality_after);
        let effort_ratio = sanitize("effort_ratio", effort_ratio);
        let impact_multiplier = sanitize("impact_multiplier", impact_multiplier);

        let contribution = AgentContribution::from_quality(
            agent_id,
            task_id,
            quality_before,
            quality_after,
            effort_ratio,
            impact_multiplier,
        );
        let score = contribution.contribution_score;

        let evicted = {
            let mut histories = self.histories.lock();
            let history = histories.entry(agent_id.to_string()).or_default();
            history.push_back(contribution);

            let mut evicted = 0usize;
            while history.len() > self.max_history_size {
                history.pop_front();
                evicted += 1;
            }
            evicted
        };

        if let Some(metrics) = &self.metrics {
            metrics.contributions_recorded.inc();
        }
        debug!(agent_id, task_id, score, evicted, "Recorded contribution");
        Ok(score)
    }

    /// Record with neutral effort and impact
    pub fn record_quality(
        &self,
        agent_id: &str,
        task_id: &str,
        quality_before: f64,
        quality_after: f64,
    ) -> Result<f64> {
        self.record_contribution(agent_id, task_id, quality_before, quality_after, 1.0, 1.0)
    }

    /// Contribution score for an agent
    ///
    /// With a `task_id`, the newest record for that task (0.0 if none).
    /// Without one, the mean over the last `window_size` records (0.0 if the
    /// agent has no history). A window of 0 is read as 1.
    pub fn get_contribution_score(
        &self,
        agent_id: &str,
        task_id: Option<&str>,
        window_size: usize,
    ) -> f64 {
        let histories = self.histories.lock();
        let Some(history) = histories.get(agent_id) else {
            return 0.0;
        };

        match task_id {
            Some(task_id) => history
                .iter()
                .rev()
                .find(|c| c.task_id == task_id)
                .map(|c| c.contribution_score)
                .unwrap_or(0.0),
            None => windowed_mean(history, window_size),
        }
    }

    /// Up to `limit` records for an agent, most recent first
    pub fn get_contribution_history(&self, agent_id: &str, limit: usize) -> Vec<AgentContribution> {
        self.histories
            .lock()
            .get(agent_id)
            .map(|history| history.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Windowed mean score of every known agent (a window of 0 is read as 1)
    pub fn get_all_agents_scores(&self, window_size: usize) -> BTreeMap<String, f64> {
        self.histories
            .lock()
            .iter()
            .map(|(agent_id, history)| (agent_id.clone(), windowed_mean(history, window_size)))
            .collect()
    }

    /// Newest score of each of `agents` for `task_id` (0.0 where absent)
    ///
    /// Taken under a single lock acquisition, so the map is a consistent
    /// snapshot.
    pub fn task_scores(&self, task_id: &str, agents: &[String]) -> BTreeMap<String, f64> {
        let histories = self.histories.lock();
        agents
            .iter()
            .map(|agent_id| {
                let score = histories
                    .get(agent_id)
                    .and_then(|history| history.iter().rev().find(|c| c.task_id == task_id))
                    .map(|c| c.contribution_score)
                    .unwrap_or(0.0);
                (agent_id.clone(), score)
            })
            .collect()
    }

    /// All agents with at least one record
    pub fn known_agents(&self) -> Vec<String> {
        let mut agents: Vec<String> = self.histories.lock().keys().cloned().collect();
        agents.sort();
        agents
    }

    /// Number of records held for an agent
    pub fn history_len(&self, agent_id: &str) -> usize {
        self.histories
            .lock()
            .get(agent_id)
            .map(|history| history.len())
            .unwrap_or(0)
    }

    /// Drop all records for an agent, returning how many were removed
    pub fn clear_agent(&self, agent_id: &str) -> usize {
        let removed = self
            .histories
            .lock()
            .remove(agent_id)
            .map(|history| history.len())
            .unwrap_or(0);
        debug!(agent_id, removed, "Cleared agent history");
        removed
    }

    /// Get statistics about the tracker
    pub fn stats(&self) -> TrackerStats {
        let histories = self.histories.lock();
        TrackerStats {
            total_records: histories.values().map(|h| h.len()).sum(),
            unique_agents: histories.len(),
            max_records_per_agent: histories.values().map(|h| h.len()).max().unwrap_or(0),
        }
    }
}

impl Default for ContributionTracker {
    fn default() -> Self {
        Self::with_settings(&TrackerSettings::default())
    }
}

/// Mean score over the newest `window_size` records
fn windowed_mean(history: &VecDeque<AgentContribution>, window_size: usize) -> f64 {
    let window = history.len().min(window_size.max(1));
    if window == 0 {
        return 0.0;
    }
    let sum: f64 = history
        .iter()
        .skip(history.len() - window)
        .map(|c| c.contribution_score)
        .sum();
    sum / window as f64
}

fn sanitize(name: &'static str, value: f64) -> f64 {
    let (value, replaced) = finite_or_zero(value);
    if replaced {
        warn!(field = name, "Non-finite input coerced to 0.0");
    }
    value
}
