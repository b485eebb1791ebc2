//! Client handle for a running attribution engine

use concord_common::{AttributionReport, ConcordError, Result, ShapingStrategy, StrategyStats};
use std::collections::BTreeMap;
use tokio::sync::{mpsc, oneshot};

use super::actor::EngineCommand;
use crate::tracker::ContributionTracker;

/// Cloneable handle to an [`AttributionEngine`](super::AttributionEngine) actor
///
/// Requests from all clones share one queue and are served in arrival
/// order, one at a time.
#[derive(Clone)]
pub struct AttributionHandle {
    tx: mpsc::Sender<EngineCommand>,
}

impl AttributionHandle {
    pub(crate) fn new(tx: mpsc::Sender<EngineCommand>) -> Self {
        Self { tx }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| ConcordError::EngineUnavailable("command queue closed".into()))?;
        rx.await
            .map_err(|_| ConcordError::EngineUnavailable("engine dropped the request".into()))
    }

    /// See [`AttributionEngine::attribute_multi_agent_task`](super::AttributionEngine::attribute_multi_agent_task)
    pub async fn attribute_multi_agent_task(
        &self,
        task_id: impl Into<String>,
        agent_contributions: BTreeMap<String, f64>,
        total_reward: f64,
        strategy_override: Option<ShapingStrategy>,
    ) -> Result<AttributionReport> {
        let task_id = task_id.into();
        self.request(|reply| EngineCommand::Attribute {
            task_id,
            contributions: agent_contributions,
            total_reward,
            strategy_override,
            reply,
        })
        .await?
    }

    /// Attribute a task using the scores `tracker` holds for it
    ///
    /// Each agent's score is its newest recorded contribution to `task_id`,
    /// or 0.0 if it has none.
    pub async fn attribute_from_tracker(
        &self,
        tracker: &ContributionTracker,
        task_id: impl Into<String>,
        agents: &[String],
        total_reward: f64,
        strategy_override: Option<ShapingStrategy>,
    ) -> Result<AttributionReport> {
        let task_id = task_id.into();
        let contributions = tracker.task_scores(&task_id, agents);
        self.attribute_multi_agent_task(task_id, contributions, total_reward, strategy_override)
            .await
    }

    /// Newest report overall, or newest report for `task_id`
    pub async fn get_attribution_report(
        &self,
        task_id: Option<&str>,
    ) -> Result<Option<AttributionReport>> {
        let task_id = task_id.map(str::to_string);
        self.request(|reply| EngineCommand::GetReport { task_id, reply })
            .await
    }

    /// Agents ranked by mean attribution over the last `window_size` reports
    pub async fn get_agent_ranking(&self, window_size: usize) -> Result<Vec<(String, f64)>> {
        self.request(|reply| EngineCommand::Ranking { window_size, reply })
            .await
    }

    /// The newest `limit` reports, oldest first
    pub async fn export_attribution_history(&self, limit: usize) -> Result<Vec<AttributionReport>> {
        self.request(|reply| EngineCommand::Export { limit, reply })
            .await
    }

    /// Reward statistics of the engine's shaper
    pub async fn get_strategy_stats(&self) -> Result<StrategyStats> {
        self.request(|reply| EngineCommand::StrategyStats { reply })
            .await
    }

    /// Number of reports retained
    pub async fn report_count(&self) -> Result<usize> {
        self.request(|reply| EngineCommand::ReportCount { reply })
            .await
    }

    /// Stop accepting commands; queued commands are still served
    pub async fn shutdown(&self) -> Result<()> {
        self.tx
            .send(EngineCommand::Shutdown)
            .await
            .map_err(|_| ConcordError::EngineUnavailable("command queue closed".into()))
    }

    /// Whether the engine has stopped accepting commands
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
