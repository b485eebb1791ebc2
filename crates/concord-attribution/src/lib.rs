//! # Concord Attribution
//!
//! Fair credit attribution and reward distribution for agents that jointly
//! produced a task outcome.
//!
//! ## Pipeline
//!
//! ```text
//! record_contribution ──► ContributionTracker
//!                              │ per-agent scores
//!                              ▼
//! attribute_multi_agent_task ─► AttributionEngine ──► Shapley values φ
//!                              │                        │
//!                              │                        ▼
//!                              │                  RewardShaper ──► rewards
//!                              ▼
//!                        AttributionReport ──► ReportSink (optional)
//! ```
//!
//! ## Attribution Formula
//!
//! ```text
//! φ_i = c_i / Σ c          (additive coalition value)
//! r_i = f(φ_i) / Σ f(φ) × pool
//! ```
//!
//! Where `f` is the active shaping strategy (linear, exponential, sigmoid).
//! A task where nobody contributed pays nobody.

pub mod config;
pub mod engine;
pub mod shaping;
pub mod sink;
pub mod telemetry;
pub mod tracker;

pub use config::{AttributionConfig, EngineSettings, ShaperSettings, TrackerSettings};
pub use engine::{AttributionEngine, AttributionHandle};
pub use shaping::RewardShaper;
pub use sink::{ReportSink, TracingReportSink};
pub use telemetry::AttributionMetrics;
pub use tracker::{ContributionTracker, TrackerStats};

use concord_common::{ConcordError, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Tracker plus a running engine, wired from one configuration
pub struct AttributionService {
    config: AttributionConfig,
    tracker: Arc<ContributionTracker>,
    engine: AttributionHandle,
    task: JoinHandle<()>,
}

impl AttributionService {
    /// Start a service with no sink and no metrics
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: AttributionConfig) -> Result<Self> {
        Self::start_with(config, None, None)
    }

    /// Start a service, optionally forwarding reports and exporting metrics
    pub fn start_with(
        config: AttributionConfig,
        sink: Option<Arc<dyn ReportSink>>,
        registry: Option<&prometheus::Registry>,
    ) -> Result<Self> {
        config.validate()?;

        let metrics = match registry {
            Some(registry) => {
                let metrics = AttributionMetrics::new()?;
                metrics.register(registry)?;
                Some(metrics)
            }
            None => None,
        };

        let mut tracker = ContributionTracker::with_settings(&config.tracker);
        let mut engine = AttributionEngine::new(&config)?;
        if let Some(metrics) = metrics {
            tracker = tracker.with_metrics(metrics.clone());
            engine = engine.with_metrics(metrics);
        }
        if let Some(sink) = sink {
            engine = engine.with_sink(sink);
        }

        let (handle, task) = engine.spawn();
        info!(
            max_history_size = config.tracker.max_history_size,
            strategy = %config.shaper.strategy,
            "Attribution service started"
        );

        Ok(Self {
            config,
            tracker: Arc::new(tracker),
            engine: handle,
            task,
        })
    }

    /// Shared contribution tracker
    pub fn tracker(&self) -> &Arc<ContributionTracker> {
        &self.tracker
    }

    /// Handle to the attribution engine
    pub fn engine(&self) -> &AttributionHandle {
        &self.engine
    }

    /// Configuration the service was started with
    pub fn config(&self) -> &AttributionConfig {
        &self.config
    }

    /// Stop the engine and wait for queued requests to finish
    pub async fn shutdown(self) -> Result<()> {
        self.engine.shutdown().await?;
        self.task
            .await
            .map_err(|e| ConcordError::Internal(format!("engine task failed: {}", e)))
    }
}
