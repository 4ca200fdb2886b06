use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

// ============================================================================
// Metrics Module - Prometheus metrics for the order workflow
// ============================================================================
//
// - Transitions fired, by transition and trigger (manual / auto)
// - Transitions refused, by transition and reason
// - Optimistic-concurrency conflicts hit while persisting orders
//
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub transitions_fired: IntCounterVec,
    pub transitions_rejected: IntCounterVec,
    pub persist_conflicts: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let transitions_fired = IntCounterVec::new(
            Opts::new("order_transitions_fired_total", "Workflow transitions fired"),
            &["transition", "trigger"],
        )?;
        registry.register(Box::new(transitions_fired.clone()))?;

        let transitions_rejected = IntCounterVec::new(
            Opts::new("order_transitions_rejected_total", "Workflow transitions refused"),
            &["transition", "reason"],
        )?;
        registry.register(Box::new(transitions_rejected.clone()))?;

        let persist_conflicts = IntCounter::new(
            "order_persist_conflicts_total",
            "Optimistic concurrency conflicts while persisting orders",
        )?;
        registry.register(Box::new(persist_conflicts.clone()))?;

        Ok(Self {
            registry,
            transitions_fired,
            transitions_rejected,
            persist_conflicts,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_transition(&self, transition: &str, automatic: bool) {
        let trigger = if automatic { "auto" } else { "manual" };
        self.transitions_fired.with_label_values(&[transition, trigger]).inc();
    }

    pub fn record_rejection(&self, transition: &str, reason: &str) {
        self.transitions_rejected.with_label_values(&[transition, reason]).inc();
    }

    pub fn record_conflict(&self) {
        self.persist_conflicts.inc();
    }

    /// Prometheus text exposition of every registered metric
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_conflict();
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_transition_by_trigger() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transition("acknowledge_prepayment", true);
        metrics.record_transition("awaiting_payment", false);
        metrics.record_transition("awaiting_payment", false);

        assert_eq!(
            metrics.transitions_fired.with_label_values(&["awaiting_payment", "manual"]).get(),
            2
        );
        assert_eq!(
            metrics.transitions_fired.with_label_values(&["acknowledge_prepayment", "auto"]).get(),
            1
        );
    }

    #[test]
    fn test_record_rejection() {
        let metrics = Metrics::new().unwrap();
        metrics.record_rejection("pick_goods", "source_mismatch");

        assert_eq!(
            metrics.transitions_rejected.with_label_values(&["pick_goods", "source_mismatch"]).get(),
            1
        );
    }

    #[test]
    fn test_render_text_format() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transition("pack_goods", false);

        let text = metrics.render().unwrap();
        assert!(text.contains("order_transitions_fired_total"));
        assert!(text.contains("pack_goods"));
    }
}
