// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Covers the asynchronous half of the service:
// - Outbox relay throughput per routing key
// - Reconciliation outcomes, retry attempts and latency per queue
// - Dead-lettered messages per queue
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Outbox relay
    pub outbox_published: IntCounterVec,
    pub outbox_publish_failures: IntCounterVec,

    // Reconciliation consumer
    pub reconciliation_processed: IntCounterVec,
    pub reconciliation_retry_attempts: IntCounterVec,
    pub reconciliation_duration: HistogramVec,

    // Dead letters
    pub dlq_messages: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let outbox_published = IntCounterVec::new(
            Opts::new("outbox_published_total", "Outbox events published to the broker"),
            &["routing_key"],
        )?;
        registry.register(Box::new(outbox_published.clone()))?;

        let outbox_publish_failures = IntCounterVec::new(
            Opts::new("outbox_publish_failures_total", "Outbox publish attempts that failed"),
            &["routing_key"],
        )?;
        registry.register(Box::new(outbox_publish_failures.clone()))?;

        let reconciliation_processed = IntCounterVec::new(
            Opts::new(
                "reconciliation_processed_total",
                "Lifecycle events handled by the reconciliation consumer",
            ),
            &["queue", "outcome"],
        )?;
        registry.register(Box::new(reconciliation_processed.clone()))?;

        let reconciliation_retry_attempts = IntCounterVec::new(
            Opts::new(
                "reconciliation_retry_attempts_total",
                "Reconciliation attempts beyond the first",
            ),
            &["queue"],
        )?;
        registry.register(Box::new(reconciliation_retry_attempts.clone()))?;

        let reconciliation_duration = HistogramVec::new(
            HistogramOpts::new(
                "reconciliation_duration_seconds",
                "Time from receipt to acknowledgement, retries included",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0]),
            &["queue"],
        )?;
        registry.register(Box::new(reconciliation_duration.clone()))?;

        let dlq_messages = IntCounterVec::new(
            Opts::new("dlq_messages_total", "Messages routed to a dead-letter queue"),
            &["queue"],
        )?;
        registry.register(Box::new(dlq_messages.clone()))?;

        Ok(Self {
            registry,
            outbox_published,
            outbox_publish_failures,
            reconciliation_processed,
            reconciliation_retry_attempts,
            reconciliation_duration,
            dlq_messages,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_outbox_publish(&self, routing_key: &str, success: bool) {
        if success {
            self.outbox_published.with_label_values(&[routing_key]).inc();
        } else {
            self.outbox_publish_failures.with_label_values(&[routing_key]).inc();
        }
    }

    pub fn record_reconciliation(&self, queue: &str, outcome: &str, duration_secs: f64) {
        self.reconciliation_processed
            .with_label_values(&[queue, outcome])
            .inc();
        self.reconciliation_duration
            .with_label_values(&[queue])
            .observe(duration_secs);
    }

    pub fn record_retry_attempt(&self, queue: &str) {
        self.reconciliation_retry_attempts
            .with_label_values(&[queue])
            .inc();
    }

    pub fn record_dlq_message(&self, queue: &str) {
        self.dlq_messages.with_label_values(&[queue]).inc();
    }
}
