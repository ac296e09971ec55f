use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AddressStore, CustomerStore, OutboxMessage, OutboxStore, StoreError};
use crate::domain::address::{Address, AddressDraft};
use crate::domain::customer::{Customer, LifecycleEvent};

// ============================================================================
// In-memory Store
// ============================================================================
//
// Same contract as `PgStore`, including unique email/cpf/external_id and
// the outbox staging, held behind one async mutex. Backs the test suites.
//
// ============================================================================

#[derive(Default)]
struct State {
    customers: BTreeMap<i64, Customer>,
    addresses: BTreeMap<i64, Address>,
    outbox: Vec<(OutboxMessage, Option<DateTime<Utc>>)>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    customer_seq: Arc<AtomicI64>,
    address_seq: Arc<AtomicI64>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, to exercise rollback paths.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Every staged event still held, published or not, oldest first.
    pub async fn staged_events(&self) -> Vec<OutboxMessage> {
        let state = self.state.lock().await;
        state.outbox.iter().map(|(m, _)| m.clone()).collect()
    }

    pub async fn customer_count(&self) -> usize {
        self.state.lock().await.customers.len()
    }

    pub async fn address_count(&self) -> usize {
        self.state.lock().await.addresses.len()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

impl State {
    fn check_unique(&self, customer: &Customer) -> Result<(), StoreError> {
        for other in self.customers.values().filter(|c| c.id != customer.id) {
            if other.email == customer.email {
                return Err(StoreError::Conflict("uk_customers_email".to_string()));
            }
            if other.cpf == customer.cpf {
                return Err(StoreError::Conflict("uk_customers_cpf".to_string()));
            }
            if other.external_id.is_some() && other.external_id == customer.external_id {
                return Err(StoreError::Conflict("uk_customers_external_id".to_string()));
            }
        }
        Ok(())
    }

    fn stage(&mut self, event: &LifecycleEvent) -> Result<(), StoreError> {
        let message = OutboxMessage::from_event(event)?;
        self.outbox.push((message, None));
        Ok(())
    }

    fn find_customer(&self, predicate: impl Fn(&Customer) -> bool) -> Option<Customer> {
        self.customers.values().find(|c| predicate(c)).cloned()
    }
}

#[async_trait]
impl CustomerStore for MemoryStore {
    async fn next_id(&self) -> Result<i64, StoreError> {
        Ok(self.customer_seq.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Customer>, StoreError> {
        Ok(self.state.lock().await.customers.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self.state.lock().await.find_customer(|c| c.email == email))
    }

    async fn find_by_cpf(&self, cpf: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self.state.lock().await.find_customer(|c| c.cpf == cpf))
    }

    async fn find_by_cpf_excluding(
        &self,
        cpf: &str,
        excluded_id: i64,
    ) -> Result<Option<Customer>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .find_customer(|c| c.cpf == cpf && c.id != excluded_id))
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .find_customer(|c| c.external_id.as_deref() == Some(external_id)))
    }

    async fn exists(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.customers.contains_key(&id))
    }

    async fn insert(&self, customer: &Customer, event: &LifecycleEvent) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        if state.customers.contains_key(&customer.id) {
            return Err(StoreError::Conflict("customers_pkey".to_string()));
        }
        state.check_unique(customer)?;
        state.stage(event)?;
        state.customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn update(&self, customer: &Customer, event: &LifecycleEvent) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        if !state.customers.contains_key(&customer.id) {
            return Err(StoreError::Missing { entity: "customer", id: customer.id });
        }
        state.check_unique(customer)?;
        state.stage(event)?;

        // Email and external id are not part of an edit
        if let Some(stored) = state.customers.get_mut(&customer.id) {
            stored.name = customer.name.clone();
            stored.last_name = customer.last_name.clone();
            stored.cpf = customer.cpf.clone();
            stored.birth_date = customer.birth_date;
        }
        Ok(())
    }

    async fn delete(&self, id: i64, event: &LifecycleEvent) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        if !state.customers.contains_key(&id) {
            return Err(StoreError::Missing { entity: "customer", id });
        }
        state.stage(event)?;
        state.customers.remove(&id);
        state.addresses.retain(|_, a| a.customer_id != id);
        Ok(())
    }

    async fn link_external_id(&self, id: i64, external_id: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let taken = state
            .customers
            .values()
            .any(|c| c.id != id && c.external_id.as_deref() == Some(external_id));
        if taken {
            return Err(StoreError::Conflict("uk_customers_external_id".to_string()));
        }

        match state.customers.get_mut(&id) {
            Some(customer) => {
                customer.external_id = Some(external_id.to_string());
                Ok(())
            }
            None => Err(StoreError::Missing { entity: "customer", id }),
        }
    }
}

#[async_trait]
impl AddressStore for MemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Address>, StoreError> {
        Ok(self.state.lock().await.addresses.get(&id).cloned())
    }

    async fn find_by_customer(&self, customer_id: i64) -> Result<Vec<Address>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .addresses
            .values()
            .filter(|a| a.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, customer_id: i64, draft: &AddressDraft) -> Result<Address, StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        if !state.customers.contains_key(&customer_id) {
            return Err(StoreError::Missing { entity: "customer", id: customer_id });
        }

        let id = self.address_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let address = draft.clone().into_address(id, customer_id);
        state.addresses.insert(id, address.clone());
        Ok(address)
    }

    async fn update(&self, address: &Address) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        match state.addresses.get_mut(&address.id) {
            Some(stored) => {
                *stored = address.clone();
                Ok(())
            }
            None => Err(StoreError::Missing { entity: "address", id: address.id }),
        }
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.check_writable()?;
        match self.state.lock().await.addresses.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::Missing { entity: "address", id }),
        }
    }
}

#[async_trait]
impl OutboxStore for MemoryStore {
    async fn pending(&self, limit: i64) -> Result<Vec<OutboxMessage>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .outbox
            .iter()
            .filter(|(_, published_at)| published_at.is_none())
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|(m, _)| m.clone())
            .collect())
    }

    async fn mark_published(&self, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.outbox.iter_mut().find(|(m, _)| m.id == id) {
            entry.1 = Some(Utc::now());
        }
        Ok(())
    }

    async fn prune_published(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.outbox.len();
        state
            .outbox
            .retain(|(_, published_at)| !matches!(published_at, Some(at) if *at < cutoff));
        Ok((before - state.outbox.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::customer::{CustomerDeletedEvent, CustomerUpdatedEvent};
    use chrono::NaiveDate;

    fn customer(id: i64, email: &str, cpf: &str) -> Customer {
        Customer {
            id,
            name: "Ana".to_string(),
            last_name: "Lima".to_string(),
            email: email.to_string(),
            cpf: cpf.to_string(),
            cep: "70000000".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            external_id: None,
        }
    }

    fn updated(id: i64) -> LifecycleEvent {
        LifecycleEvent::Updated(CustomerUpdatedEvent {
            customer_id: id,
            name: "Ana".to_string(),
            last_name: "Lima".to_string(),
        })
    }

    fn draft() -> AddressDraft {
        AddressDraft {
            contact_name: "Ana".to_string(),
            contact_last_name: "Lima".to_string(),
            contact_phone: "61999998888".to_string(),
            address: "Rua A".to_string(),
            number: "1".to_string(),
            neighborhood: "Centro".to_string(),
            city: "Brasilia".to_string(),
            state: "DF".to_string(),
            cep: "70000000".to_string(),
            complement: None,
        }
    }

    #[tokio::test]
    async fn test_unique_email_and_cpf() {
        let store = MemoryStore::new();
        CustomerStore::insert(&store, &customer(1, "a@x.com", "11111111111"), &updated(1)).await.unwrap();

        let err = CustomerStore::insert(&store, &customer(2, "a@x.com", "52998224725"), &updated(2))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref c) if c.contains("email")));

        let err = CustomerStore::insert(&store, &customer(3, "b@x.com", "11111111111"), &updated(3))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref c) if c.contains("cpf")));

        // Failed inserts stage nothing
        assert_eq!(store.staged_events().await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_cascades_addresses() {
        let store = MemoryStore::new();
        CustomerStore::insert(&store, &customer(1, "a@x.com", "11111111111"), &updated(1)).await.unwrap();
        CustomerStore::insert(&store, &customer(2, "b@x.com", "52998224725"), &updated(2)).await.unwrap();
        AddressStore::insert(&store, 1, &draft()).await.unwrap();
        AddressStore::insert(&store, 2, &draft()).await.unwrap();

        let event = LifecycleEvent::Deleted(CustomerDeletedEvent {
            customer_id: 1,
            external_id: None,
        });
        CustomerStore::delete(&store, 1, &event).await.unwrap();

        assert_eq!(store.address_count().await, 1);
        assert!(store.find_by_customer(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_outbox_pending_and_published() {
        let store = MemoryStore::new();
        CustomerStore::insert(&store, &customer(1, "a@x.com", "11111111111"), &updated(1)).await.unwrap();
        CustomerStore::insert(&store, &customer(2, "b@x.com", "52998224725"), &updated(2)).await.unwrap();

        let pending = store.pending(10).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].aggregate_id, 1);

        store.mark_published(pending[0].id).await.unwrap();
        let pending = store.pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].aggregate_id, 2);
    }

    #[tokio::test]
    async fn test_prune_keeps_unpublished_and_recent_rows() {
        let store = MemoryStore::new();
        CustomerStore::insert(&store, &customer(1, "a@x.com", "11111111111"), &updated(1)).await.unwrap();
        CustomerStore::insert(&store, &customer(2, "b@x.com", "52998224725"), &updated(2)).await.unwrap();
        let first = store.pending(10).await.unwrap()[0].id;
        store.mark_published(first).await.unwrap();

        let an_hour_ago = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(store.prune_published(an_hour_ago).await.unwrap(), 0);
        assert_eq!(store.staged_events().await.len(), 2);

        let soon = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(store.prune_published(soon).await.unwrap(), 1);
        let left = store.staged_events().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].aggregate_id, 2);
        assert_eq!(store.pending(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_writes_leave_state_untouched() {
        let store = MemoryStore::new();
        store.fail_writes(true);

        assert!(CustomerStore::insert(&store, &customer(1, "a@x.com", "11111111111"), &updated(1)).await.is_err());
        assert_eq!(store.customer_count().await, 0);
        assert!(store.staged_events().await.is_empty());
    }
}
