use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::customer::{
    CustomerCreatedEvent, CustomerDeletedEvent, CustomerUpdatedEvent, EventKind, LifecycleMessage,
};
use crate::identity::{IdentityProvider, IdentityProviderError};
use crate::store::{CustomerStore, StoreError};
use crate::utils::IsTransient;

// ============================================================================
// Identity reconciliation
// ============================================================================
//
// Brings the identity provider in line with customer rows that already
// committed. Every handler is idempotent: a redelivered Created finds the
// reference already stored, and Updated/Deleted that overtake their Created
// find no reference yet. Both cases are skips, never errors.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ReconciliationError {
    #[error("Undecodable {kind:?} payload: {source}")]
    Decode {
        kind: EventKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("Identity provider operation failed: {0}")]
    IdentityProvider(#[from] IdentityProviderError),

    #[error("Store failure during reconciliation: {0}")]
    Store(#[from] StoreError),
}

impl IsTransient for ReconciliationError {
    /// Only a payload we cannot read is hopeless; everything else gets the
    /// full redelivery budget.
    fn is_transient(&self) -> bool {
        !matches!(self, ReconciliationError::Decode { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Reconciled,
    Skipped,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Reconciled => "reconciled",
            Outcome::Skipped => "skipped",
        }
    }
}

/// What a queue consumer hands each delivery to.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, kind: EventKind, payload: &[u8]) -> Result<Outcome, ReconciliationError>;
}

pub struct IdentityReconciler {
    customers: Arc<dyn CustomerStore>,
    identity: Arc<dyn IdentityProvider>,
}

fn decode<M: LifecycleMessage>(payload: &[u8]) -> Result<M, ReconciliationError> {
    serde_json::from_slice(payload).map_err(|source| ReconciliationError::Decode {
        kind: M::KIND,
        source,
    })
}

impl IdentityReconciler {
    pub fn new(customers: Arc<dyn CustomerStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            customers,
            identity,
        }
    }

    pub async fn on_created(&self, event: &CustomerCreatedEvent) -> Result<Outcome, ReconciliationError> {
        let Some(customer) = self.customers.find_by_id(event.customer_id).await? else {
            // Deleted before its creation was reconciled
            tracing::warn!(customer_id = event.customer_id, "Customer gone, skipping identity creation");
            return Ok(Outcome::Skipped);
        };

        if customer.external_id.is_some() {
            tracing::warn!(
                customer_id = event.customer_id,
                "Customer already linked to an identity, skipping creation"
            );
            return Ok(Outcome::Skipped);
        }

        let external_id = self
            .identity
            .create_user(&event.email, &event.name, &event.last_name, &event.password)
            .await?;
        self.customers
            .link_external_id(customer.id, &external_id)
            .await?;

        tracing::info!(
            customer_id = event.customer_id,
            external_id = %external_id,
            "Identity created and linked"
        );
        Ok(Outcome::Reconciled)
    }

    pub async fn on_updated(&self, event: &CustomerUpdatedEvent) -> Result<Outcome, ReconciliationError> {
        let external_id = self
            .customers
            .find_by_id(event.customer_id)
            .await?
            .and_then(|c| c.external_id);

        let Some(external_id) = external_id else {
            tracing::warn!(
                customer_id = event.customer_id,
                "Customer has no identity yet, skipping update"
            );
            return Ok(Outcome::Skipped);
        };

        self.identity
            .edit_user(&external_id, &event.name, &event.last_name)
            .await?;

        tracing::info!(customer_id = event.customer_id, "Identity updated");
        Ok(Outcome::Reconciled)
    }

    pub async fn on_deleted(&self, event: &CustomerDeletedEvent) -> Result<Outcome, ReconciliationError> {
        // The row is normally gone already; prefer the reference the event carries
        let external_id = match &event.external_id {
            Some(id) => Some(id.clone()),
            None => self
                .customers
                .find_by_id(event.customer_id)
                .await?
                .and_then(|c| c.external_id),
        };

        let Some(external_id) = external_id else {
            tracing::warn!(
                customer_id = event.customer_id,
                "Customer has no identity, skipping deletion"
            );
            return Ok(Outcome::Skipped);
        };

        self.identity.delete_user(&external_id).await?;

        tracing::info!(customer_id = event.customer_id, "Identity deleted");
        Ok(Outcome::Reconciled)
    }
}

#[async_trait]
impl MessageHandler for IdentityReconciler {
    async fn handle(&self, kind: EventKind, payload: &[u8]) -> Result<Outcome, ReconciliationError> {
        let result = match kind {
            EventKind::Created => self.on_created(&decode::<CustomerCreatedEvent>(payload)?).await,
            EventKind::Updated => self.on_updated(&decode::<CustomerUpdatedEvent>(payload)?).await,
            EventKind::Deleted => self.on_deleted(&decode::<CustomerDeletedEvent>(payload)?).await,
        };

        if let Err(e) = &result {
            tracing::error!(kind = ?kind, error = %e, "Reconciliation failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{customer, linked_customer};
    use crate::domain::customer::LifecycleEvent;
    use crate::identity::fake::RecordingIdentityProvider;
    use crate::store::MemoryStore;

    fn touch(id: i64) -> LifecycleEvent {
        LifecycleEvent::Updated(CustomerUpdatedEvent {
            customer_id: id,
            name: "Ana".to_string(),
            last_name: "Lima".to_string(),
        })
    }

    fn created(id: i64) -> CustomerCreatedEvent {
        CustomerCreatedEvent {
            customer_id: id,
            name: "Ana".to_string(),
            last_name: "Lima".to_string(),
            email: "ana@x.com".to_string(),
            password: "p1".to_string(),
        }
    }

    async fn setup() -> (Arc<MemoryStore>, Arc<RecordingIdentityProvider>, IdentityReconciler) {
        let store = Arc::new(MemoryStore::new());
        store.insert(&customer(1, "ana@x.com", "11111111111"), &touch(1)).await.unwrap();
        store
            .insert(&linked_customer(2, "bia@x.com", "52998224725", "kc-2"), &touch(2))
            .await
            .unwrap();

        let identity = Arc::new(RecordingIdentityProvider::new());
        let reconciler = IdentityReconciler::new(store.clone(), identity.clone());
        (store, identity, reconciler)
    }

    #[tokio::test]
    async fn test_created_links_new_identity() {
        let (store, identity, reconciler) = setup().await;

        let outcome = reconciler.on_created(&created(1)).await.unwrap();

        assert_eq!(outcome, Outcome::Reconciled);
        assert_eq!(identity.calls(), vec!["create:ana@x.com".to_string()]);
        let linked = store.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(linked.external_id.as_deref(), Some("kc-ana@x.com"));
    }

    #[tokio::test]
    async fn test_created_redelivery_is_noop() {
        let (_, identity, reconciler) = setup().await;

        assert_eq!(reconciler.on_created(&created(2)).await.unwrap(), Outcome::Skipped);
        assert!(identity.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_without_identity_is_skipped() {
        let (_, identity, reconciler) = setup().await;
        let event = CustomerUpdatedEvent {
            customer_id: 1,
            name: "Ana".to_string(),
            last_name: "Souza".to_string(),
        };

        assert_eq!(reconciler.on_updated(&event).await.unwrap(), Outcome::Skipped);
        assert!(identity.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_edits_linked_identity() {
        let (_, identity, reconciler) = setup().await;
        let event = CustomerUpdatedEvent {
            customer_id: 2,
            name: "Bia".to_string(),
            last_name: "Souza".to_string(),
        };

        assert_eq!(reconciler.on_updated(&event).await.unwrap(), Outcome::Reconciled);
        assert_eq!(identity.calls(), vec!["edit:kc-2:Bia Souza".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_uses_carried_reference() {
        let (_, identity, reconciler) = setup().await;
        // Row 9 never existed; the event alone is enough
        let event = CustomerDeletedEvent {
            customer_id: 9,
            external_id: Some("kc-9".to_string()),
        };

        assert_eq!(reconciler.on_deleted(&event).await.unwrap(), Outcome::Reconciled);
        assert_eq!(identity.calls(), vec!["delete:kc-9".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_without_reference_is_skipped() {
        let (_, identity, reconciler) = setup().await;
        let event = CustomerDeletedEvent {
            customer_id: 1,
            external_id: None,
        };

        assert_eq!(reconciler.on_deleted(&event).await.unwrap(), Outcome::Skipped);
        assert!(identity.calls().is_empty());
    }

    #[tokio::test]
    async fn test_identity_failures_propagate() {
        let store = Arc::new(MemoryStore::new());
        store.insert(&customer(1, "ana@x.com", "11111111111"), &touch(1)).await.unwrap();
        let identity = Arc::new(RecordingIdentityProvider::failing(1));
        let reconciler = IdentityReconciler::new(store.clone(), identity);

        let err = reconciler.on_created(&created(1)).await.unwrap_err();
        assert!(matches!(err, ReconciliationError::IdentityProvider(_)));
        assert!(err.is_transient());
        assert!(store.find_by_id(1).await.unwrap().unwrap().external_id.is_none());
    }

    #[tokio::test]
    async fn test_garbage_payload_is_permanent() {
        let (_, _, reconciler) = setup().await;

        let err = reconciler
            .handle(EventKind::Created, b"{not json")
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }
}
