// ============================================================================
// Messaging - outbox relay, queue consumers, identity reconciliation
// ============================================================================
//
// Flow: outbox_messages → OutboxRelay → topic per queue → QueueConsumer
//       → IdentityReconciler → identity provider, with bounded retries and
//       a dead-letter topic per queue.
//
// ============================================================================

pub mod consumer;
pub mod kafka;
pub mod outbox_relay;
pub mod reconciliation;
pub mod topology;

pub use consumer::{QueueConsumer, QueueProcessor};
pub use kafka::{KafkaPublisher, MessagePublisher};
pub use outbox_relay::OutboxRelay;
pub use reconciliation::{IdentityReconciler, MessageHandler};
pub use topology::ROUTES;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Outbox store error: {0}")]
    Store(#[from] StoreError),

    #[error("Dead-letter publish to {queue} failed: {reason}")]
    DeadLetter { queue: String, reason: String },
}
