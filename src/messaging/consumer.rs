use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::{Offset, TopicPartitionList};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use super::kafka::MessagePublisher;
use super::reconciliation::{MessageHandler, Outcome};
use super::topology::{Route, ATTEMPTS_HEADER, ERROR_HEADER, ORIGINAL_QUEUE_HEADER};
use super::MessagingError;
use crate::metrics::Metrics;
use crate::utils::{retry_on_transient, RetryConfig, RetryResult};

// ============================================================================
// Reconciliation consumer
// ============================================================================
//
// One consumer per queue. Each delivery gets `max_attempts` tries with
// capped exponential backoff between them. A delivery is acknowledged once
// it was handled or dead-lettered. A failed dead-letter publish keeps the
// delivery unacknowledged and only the dead-letter publish is repeated,
// every `max_delay`, until the broker takes it.
//
// ============================================================================

/// Final state of one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Handled(Outcome),
    DeadLettered { attempts: u32 },
}

/// Broker-independent half of a queue consumer: retries, then dead-letters.
pub struct QueueProcessor {
    route: &'static Route,
    handler: Arc<dyn MessageHandler>,
    publisher: Arc<dyn MessagePublisher>,
    metrics: Arc<Metrics>,
    retry: RetryConfig,
}

impl QueueProcessor {
    pub fn new(
        route: &'static Route,
        handler: Arc<dyn MessageHandler>,
        publisher: Arc<dyn MessagePublisher>,
        metrics: Arc<Metrics>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            route,
            handler,
            publisher,
            metrics,
            retry,
        }
    }

    pub fn route(&self) -> &'static Route {
        self.route
    }

    /// Runs the handler within the retry budget, then settles the delivery.
    /// Returns only once the delivery is handled or safely dead-lettered.
    pub async fn process(&self, key: &str, payload: &[u8]) -> Disposition {
        let started = Instant::now();
        let queue = self.route.queue;

        let result = retry_on_transient(&self.retry, |attempt| {
            if attempt > 1 {
                self.metrics.record_retry_attempt(queue);
            }
            self.handler.handle(self.route.kind, payload)
        })
        .await;

        let (error, attempts) = match result {
            RetryResult::Success(outcome) => {
                self.metrics
                    .record_reconciliation(queue, outcome.as_str(), started.elapsed().as_secs_f64());
                return Disposition::Handled(outcome);
            }
            RetryResult::Failed { error, attempts }
            | RetryResult::PermanentFailure { error, attempts } => (error, attempts),
        };

        let reason = error.to_string();
        while let Err(e) = self.dead_letter(key, payload, &reason, attempts).await {
            tracing::error!(queue, key = %key, error = %e, "Dead-letter publish failed, delivery left unacknowledged");
            sleep(self.retry.max_delay).await;
        }

        self.metrics
            .record_reconciliation(queue, "dead_lettered", started.elapsed().as_secs_f64());
        Disposition::DeadLettered { attempts }
    }

    async fn dead_letter(
        &self,
        key: &str,
        payload: &[u8],
        reason: &str,
        attempts: u32,
    ) -> Result<(), MessagingError> {
        let headers = [
            (ORIGINAL_QUEUE_HEADER, self.route.queue.to_string()),
            (ERROR_HEADER, reason.to_string()),
            (ATTEMPTS_HEADER, attempts.to_string()),
        ];

        self.publisher
            .publish(self.route.dead_letter_queue, key, payload, &headers)
            .await
            .map_err(|e| MessagingError::DeadLetter {
                queue: self.route.dead_letter_queue.to_string(),
                reason: e.to_string(),
            })?;

        self.metrics.record_dlq_message(self.route.queue);
        tracing::warn!(
            queue = self.route.queue,
            dlq = self.route.dead_letter_queue,
            key = %key,
            attempts,
            error = %reason,
            "☠️ Message moved to dead-letter queue"
        );
        Ok(())
    }
}

/// Kafka side: subscribes to the route's topic and commits after each
/// delivery reaches a final state.
pub struct QueueConsumer {
    consumer: StreamConsumer,
    processor: QueueProcessor,
}

impl QueueConsumer {
    pub fn new(brokers: &str, group_id: &str, processor: QueueProcessor) -> Result<Self, MessagingError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false")
            .set("session.timeout.ms", "30000")
            .create()?;

        consumer.subscribe(&[processor.route().queue])?;

        tracing::info!(
            queue = processor.route().queue,
            group_id = %group_id,
            "📥 Subscribed reconciliation consumer"
        );

        Ok(Self { consumer, processor })
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(&self) {
        let queue = self.processor.route().queue;
        let mut stream = self.consumer.stream();

        while let Some(result) = stream.next().await {
            let message = match result {
                Ok(message) => message,
                Err(e) => {
                    tracing::error!(queue, error = %e, "Error receiving message");
                    continue;
                }
            };

            let key = message
                .key()
                .map(|k| String::from_utf8_lossy(k).into_owned())
                .unwrap_or_default();
            let payload = message.payload().unwrap_or_default();

            let disposition = self.processor.process(&key, payload).await;
            tracing::debug!(queue, key = %key, ?disposition, "Delivery settled");

            if let Err(e) = self.commit(&message) {
                tracing::error!(queue, error = %e, "Failed to commit offset");
            }
        }

        tracing::info!(queue, "Consumer loop ended");
    }

    fn commit(&self, message: &BorrowedMessage<'_>) -> Result<(), MessagingError> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            message.topic(),
            message.partition(),
            Offset::Offset(message.offset() + 1),
        )?;
        self.consumer.commit(&tpl, CommitMode::Async)?;
        Ok(())
    }
}
