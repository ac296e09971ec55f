use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use super::kafka::MessagePublisher;
use super::topology::{Route, EVENT_TYPE_HEADER, EXCHANGE, MESSAGE_ID_HEADER, ROUTING_KEY_HEADER};
use super::MessagingError;
use crate::metrics::Metrics;
use crate::store::OutboxStore;

// ============================================================================
// Outbox Relay - polls outbox_messages and publishes to the broker
// ============================================================================
//
// 1. Fetch unpublished rows, oldest first
// 2. Publish each to the topic its routing key is bound to
// 3. Mark the row published
//
// A publish failure ends the pass so later events never overtake earlier
// ones; the next poll starts again from the oldest unpublished row. A crash
// between publish and mark yields a duplicate, which consumers tolerate.
//
// Published rows are kept for `retention` and then pruned, at most once
// per `PRUNE_INTERVAL`.
//
// ============================================================================

const PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

pub struct OutboxRelay {
    outbox: Arc<dyn OutboxStore>,
    publisher: Arc<dyn MessagePublisher>,
    metrics: Arc<Metrics>,
    poll_interval: Duration,
    batch_size: i64,
    retention: chrono::Duration,
}

impl OutboxRelay {
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        publisher: Arc<dyn MessagePublisher>,
        metrics: Arc<Metrics>,
        poll_interval: Duration,
        batch_size: i64,
        retention: chrono::Duration,
    ) -> Self {
        Self {
            outbox,
            publisher,
            metrics,
            poll_interval,
            batch_size,
            retention,
        }
    }

    /// One polling pass. Returns how many messages were published.
    pub async fn relay_pending(&self) -> Result<usize, MessagingError> {
        let messages = self.outbox.pending(self.batch_size).await?;
        if !messages.is_empty() {
            tracing::info!(message_count = messages.len(), "📬 Fetched pending outbox messages");
        }

        let mut published = 0;
        for msg in messages {
            let Some(route) = Route::for_routing_key(&msg.routing_key) else {
                tracing::error!(
                    event_id = %msg.id,
                    routing_key = %msg.routing_key,
                    "Outbox message has no bound queue, leaving it unpublished"
                );
                continue;
            };

            let headers = [
                (ROUTING_KEY_HEADER, msg.routing_key.clone()),
                (EVENT_TYPE_HEADER, msg.event_type.clone()),
                (MESSAGE_ID_HEADER, msg.id.to_string()),
            ];
            let key = msg.aggregate_id.to_string();

            if let Err(e) = self
                .publisher
                .publish(route.queue, &key, msg.payload.as_bytes(), &headers)
                .await
            {
                tracing::error!(
                    error = %e,
                    event_id = %msg.id,
                    routing_key = %msg.routing_key,
                    "❌ Failed to publish outbox message, will retry on next poll"
                );
                self.metrics.record_outbox_publish(&msg.routing_key, false);
                return Err(e);
            }

            self.outbox.mark_published(msg.id).await?;
            self.metrics.record_outbox_publish(&msg.routing_key, true);
            published += 1;

            tracing::info!(
                event_id = %msg.id,
                customer_id = msg.aggregate_id,
                exchange = EXCHANGE,
                queue = route.queue,
                "✅ Published lifecycle event"
            );
        }

        Ok(published)
    }

    /// Delete rows published longer than `retention` ago.
    pub async fn prune_published(&self) -> Result<u64, MessagingError> {
        let cutoff = Utc::now() - self.retention;
        let pruned = self.outbox.prune_published(cutoff).await?;
        if pruned > 0 {
            tracing::info!(pruned, cutoff = %cutoff, "🧹 Pruned published outbox messages");
        }
        Ok(pruned)
    }

    /// Poll forever on a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            batch_size = self.batch_size,
            retention_days = self.retention.num_days(),
            "🔄 Starting outbox relay"
        );

        tokio::spawn(async move {
            let mut next_prune = Instant::now();
            loop {
                if let Err(e) = self.relay_pending().await {
                    tracing::error!(error = %e, "Outbox relay pass failed");
                }
                if Instant::now() >= next_prune {
                    if let Err(e) = self.prune_published().await {
                        tracing::error!(error = %e, "Outbox prune failed");
                    }
                    next_prune = Instant::now() + PRUNE_INTERVAL;
                }
                sleep(self.poll_interval).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::customer::{CustomerDeletedEvent, CustomerUpdatedEvent, LifecycleEvent};
    use crate::messaging::kafka::fake::RecordingPublisher;
    use crate::store::{CustomerStore, MemoryStore};
    use crate::application::testing::customer;

    async fn store_with_two_events() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let updated = LifecycleEvent::Updated(CustomerUpdatedEvent {
            customer_id: 1,
            name: "Ana".to_string(),
            last_name: "Lima".to_string(),
        });
        store.insert(&customer(1, "ana@x.com", "11111111111"), &updated).await.unwrap();

        let deleted = LifecycleEvent::Deleted(CustomerDeletedEvent {
            customer_id: 1,
            external_id: None,
        });
        CustomerStore::delete(store.as_ref(), 1, &deleted).await.unwrap();
        store
    }

    fn relay_keeping(
        store: Arc<MemoryStore>,
        publisher: Arc<RecordingPublisher>,
        retention: chrono::Duration,
    ) -> OutboxRelay {
        OutboxRelay::new(
            store,
            publisher,
            Arc::new(Metrics::new().unwrap()),
            Duration::from_millis(10),
            100,
            retention,
        )
    }

    fn relay(store: Arc<MemoryStore>, publisher: Arc<RecordingPublisher>) -> OutboxRelay {
        relay_keeping(store, publisher, chrono::Duration::days(7))
    }

    #[tokio::test]
    async fn test_publishes_in_order_to_bound_queues() {
        let store = store_with_two_events().await;
        let publisher = Arc::new(RecordingPublisher::new());
        let relay = relay(store.clone(), publisher.clone());

        assert_eq!(relay.relay_pending().await.unwrap(), 2);

        let published = publisher.published();
        assert_eq!(published[0].topic, "CustomerUpdateQueue");
        assert_eq!(published[1].topic, "CustomerDeleteQueue");
        assert_eq!(published[1].key, "1");
        assert_eq!(published[1].header(ROUTING_KEY_HEADER), Some("customer.deleted"));
        assert_eq!(published[1].payload, br#"{"customerId":1}"#.to_vec());

        // Nothing left for the next pass
        assert_eq!(relay.relay_pending().await.unwrap(), 0);
        assert_eq!(publisher.published().len(), 2);
    }

    #[tokio::test]
    async fn test_broker_outage_keeps_messages_pending() {
        let store = store_with_two_events().await;
        let publisher = Arc::new(RecordingPublisher::new());
        let relay = relay(store.clone(), publisher.clone());

        publisher.set_unavailable(true);
        assert!(relay.relay_pending().await.is_err());
        assert_eq!(store.pending(10).await.unwrap().len(), 2);

        publisher.set_unavailable(false);
        assert_eq!(relay.relay_pending().await.unwrap(), 2);
        assert!(store.pending(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prune_drops_only_expired_published_rows() {
        let store = store_with_two_events().await;
        let publisher = Arc::new(RecordingPublisher::new());

        // A week of retention keeps freshly published rows
        let keeping = relay(store.clone(), publisher.clone());
        assert_eq!(keeping.relay_pending().await.unwrap(), 2);
        assert_eq!(keeping.prune_published().await.unwrap(), 0);
        assert_eq!(store.staged_events().await.len(), 2);

        // Rows still waiting for the broker survive any retention
        let updated = LifecycleEvent::Updated(CustomerUpdatedEvent {
            customer_id: 2,
            name: "Bia".to_string(),
            last_name: "Souza".to_string(),
        });
        store.insert(&customer(2, "bia@x.com", "52998224725"), &updated).await.unwrap();

        let expiring = relay_keeping(store.clone(), publisher, chrono::Duration::seconds(-1));
        assert_eq!(expiring.prune_published().await.unwrap(), 2);

        let left = store.staged_events().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].aggregate_id, 2);
        assert_eq!(store.pending(10).await.unwrap().len(), 1);
    }
}
