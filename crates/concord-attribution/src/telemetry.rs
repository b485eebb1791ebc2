//! Prometheus metrics for the attribution subsystem

use concord_common::Result;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};

/// Prometheus collectors shared by the tracker and the engine
///
/// Cloning shares the underlying collectors.
#[derive(Clone)]
pub struct AttributionMetrics {
    pub attributions_total: IntCounter,
    pub degenerate_attributions: IntCounter,
    pub strategy_overrides: IntCounter,
    pub attribution_duration_ms: Histogram,
    pub report_history_len: IntGauge,
    pub contributions_recorded: IntCounter,
}

impl AttributionMetrics {
    pub fn new() -> Result<Self> {
        Ok(Self {
            attributions_total: IntCounter::new(
                "concord_attributions_total",
                "Total multi-agent attributions computed",
            )?,
            degenerate_attributions: IntCounter::new(
                "concord_degenerate_attributions_total",
                "Attributions with no agents or no positive contribution",
            )?,
            strategy_overrides: IntCounter::new(
                "concord_strategy_overrides_total",
                "Attributions that temporarily swapped the shaping strategy",
            )?,
            attribution_duration_ms: Histogram::with_opts(
                HistogramOpts::new(
                    "concord_attribution_duration_ms",
                    "Attribution computation time in milliseconds",
                )
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 50.0, 100.0, 500.0]),
            )?,
            report_history_len: IntGauge::new(
                "concord_report_history_len",
                "Attribution reports currently retained",
            )?,
            contributions_recorded: IntCounter::new(
                "concord_contributions_recorded_total",
                "Contribution observations recorded",
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.attributions_total.clone()))?;
        registry.register(Box::new(self.degenerate_attributions.clone()))?;
        registry.register(Box::new(self.strategy_overrides.clone()))?;
        registry.register(Box::new(self.attribution_duration_ms.clone()))?;
        registry.register(Box::new(self.report_history_len.clone()))?;
        registry.register(Box::new(self.contributions_recorded.clone()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_once() {
        let registry = Registry::new();
        let metrics = AttributionMetrics::new().unwrap();
        metrics.register(&registry).unwrap();

        metrics.attributions_total.inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "concord_attributions_total"));

        // Same names cannot be registered twice
        assert!(metrics.register(&registry).is_err());
    }
}
