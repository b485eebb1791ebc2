//! Report sinks
//!
//! The attribution core does not persist reports. A collaborator that
//! wants to log, store or forward them implements [`ReportSink`] and hands
//! it to the engine; every report is offered to the sink after it has been
//! appended to history.

use async_trait::async_trait;
use concord_common::{AttributionReport, Result};
use tracing::info;

/// Consumer of finished attribution reports
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Accept one report. Errors are logged by the engine and never fail
    /// the attribution that produced the report.
    async fn accept(&self, report: &AttributionReport) -> Result<()>;
}

/// Sink that emits each report as a structured log event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReportSink;

#[async_trait]
impl ReportSink for TracingReportSink {
    async fn accept(&self, report: &AttributionReport) -> Result<()> {
        info!(
            report_id = %report.report_id,
            task_id = %report.task_id,
            agents = report.agents.len(),
            total_reward = report.total_reward,
            distributed = report.total_distributed(),
            strategy = %report.strategy_used,
            computation_time_ms = report.computation_time_ms,
            "Attribution report"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tracing_sink_accepts_degenerate_report() {
        let sink = TracingReportSink;
        assert!(sink.accept(&AttributionReport::empty("task-0")).await.is_ok());
    }
}
