use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::address::{Address, AddressDraft};
use crate::domain::customer::{Customer, LifecycleEvent};

// ============================================================================
// Persistence boundary
// ============================================================================
//
// Every customer mutation takes the lifecycle event it produces and writes
// both in one transaction: the event lands in `outbox_messages` and the
// outbox relay publishes it afterwards. Addresses produce no events.
//
// ============================================================================

#[cfg(test)]
mod memory;
mod postgres;

#[cfg(test)]
pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Failed to encode outbox payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("{entity} {id} no longer exists")]
    Missing { entity: &'static str, id: i64 },
}

#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Reserve an id so the creation event can be built before inserting.
    async fn next_id(&self) -> Result<i64, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Customer>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError>;

    async fn find_by_cpf(&self, cpf: &str) -> Result<Option<Customer>, StoreError>;

    /// Any customer other than `excluded_id` holding `cpf`.
    async fn find_by_cpf_excluding(
        &self,
        cpf: &str,
        excluded_id: i64,
    ) -> Result<Option<Customer>, StoreError>;

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Customer>, StoreError>;

    async fn exists(&self, id: i64) -> Result<bool, StoreError>;

    async fn insert(&self, customer: &Customer, event: &LifecycleEvent) -> Result<(), StoreError>;

    async fn update(&self, customer: &Customer, event: &LifecycleEvent) -> Result<(), StoreError>;

    /// Removes the customer (and its addresses).
    async fn delete(&self, id: i64, event: &LifecycleEvent) -> Result<(), StoreError>;

    /// Store the identity-provider reference. Emits no event.
    async fn link_external_id(&self, id: i64, external_id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AddressStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Address>, StoreError>;

    async fn find_by_customer(&self, customer_id: i64) -> Result<Vec<Address>, StoreError>;

    async fn insert(&self, customer_id: i64, draft: &AddressDraft) -> Result<Address, StoreError>;

    async fn update(&self, address: &Address) -> Result<(), StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Unpublished messages, oldest first.
    async fn pending(&self, limit: i64) -> Result<Vec<OutboxMessage>, StoreError>;

    async fn mark_published(&self, id: Uuid) -> Result<(), StoreError>;

    /// Drop rows published before `cutoff`. Unpublished rows are never touched.
    async fn prune_published(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

// ============================================================================
// Outbox row
// ============================================================================

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub aggregate_id: i64,
    pub event_type: String,
    pub routing_key: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

impl OutboxMessage {
    pub fn from_event(event: &LifecycleEvent) -> Result<Self, StoreError> {
        let kind = event.kind();
        Ok(Self {
            id: Uuid::new_v4(),
            aggregate_id: event.customer_id(),
            event_type: kind.event_type().to_string(),
            routing_key: kind.routing_key().to_string(),
            payload: event.to_payload()?,
            created_at: Utc::now(),
        })
    }
}
