use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::{AddressStore, CustomerStore, OutboxMessage, OutboxStore, StoreError};
use crate::domain::address::{Address, AddressDraft};
use crate::domain::customer::{Customer, LifecycleEvent};

// ============================================================================
// Postgres Store
// ============================================================================
//
// Tables (see migrations/):
// - customers         unique email, unique cpf, unique external_id
// - addresses         customer_id FK, ON DELETE CASCADE
// - outbox_messages   staged lifecycle events, published_at set by the relay
//
// ============================================================================

const CUSTOMER_COLUMNS: &str =
    "id, name, last_name, email, cpf, cep, birth_date, external_id";

const ADDRESS_COLUMNS: &str = "id, customer_id, contact_name, contact_last_name, contact_phone, \
     address, number, neighborhood, city, state, cep, complement";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        tracing::info!(max_connections, "Connected to Postgres");
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await?;

        tracing::info!("Database migrations applied");
        Ok(())
    }

    async fn find_customer_where(
        &self,
        clause: &str,
        value: &str,
    ) -> Result<Option<Customer>, StoreError> {
        let sql = format!("SELECT {} FROM customers WHERE {} = $1", CUSTOMER_COLUMNS, clause);
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    async fn stage_event(
        tx: &mut Transaction<'_, Postgres>,
        event: &LifecycleEvent,
    ) -> Result<(), StoreError> {
        let message = OutboxMessage::from_event(event)?;

        sqlx::query(
            "INSERT INTO outbox_messages (id, aggregate_id, event_type, routing_key, payload, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(message.id)
        .bind(message.aggregate_id)
        .bind(&message.event_type)
        .bind(&message.routing_key)
        .bind(&message.payload)
        .bind(message.created_at)
        .execute(&mut **tx)
        .await?;

        tracing::debug!(
            outbox_id = %message.id,
            customer_id = message.aggregate_id,
            routing_key = %message.routing_key,
            "Staged lifecycle event in outbox"
        );

        Ok(())
    }
}

/// Unique violations surface as `Conflict` so callers can report duplicates.
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Conflict(db.constraint().unwrap_or("unique").to_string());
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl CustomerStore for PgStore {
    async fn next_id(&self) -> Result<i64, StoreError> {
        let (id,): (i64,) = sqlx::query_as("SELECT nextval('customer_id_seq')")
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Customer>, StoreError> {
        let sql = format!("SELECT {} FROM customers WHERE id = $1", CUSTOMER_COLUMNS);
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        self.find_customer_where("email", email).await
    }

    async fn find_by_cpf(&self, cpf: &str) -> Result<Option<Customer>, StoreError> {
        self.find_customer_where("cpf", cpf).await
    }

    async fn find_by_cpf_excluding(
        &self,
        cpf: &str,
        excluded_id: i64,
    ) -> Result<Option<Customer>, StoreError> {
        let sql = format!(
            "SELECT {} FROM customers WHERE cpf = $1 AND id <> $2",
            CUSTOMER_COLUMNS
        );
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(cpf)
            .bind(excluded_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Customer>, StoreError> {
        self.find_customer_where("external_id", external_id).await
    }

    async fn exists(&self, id: i64) -> Result<bool, StoreError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM customers WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn insert(&self, customer: &Customer, event: &LifecycleEvent) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO customers (id, name, last_name, email, cpf, cep, birth_date, external_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(customer.id)
        .bind(&customer.name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .bind(&customer.cpf)
        .bind(&customer.cep)
        .bind(customer.birth_date)
        .bind(&customer.external_id)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        Self::stage_event(&mut tx, event).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update(&self, customer: &Customer, event: &LifecycleEvent) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE customers SET name = $2, last_name = $3, cpf = $4, birth_date = $5, \
             updated_at = now() WHERE id = $1",
        )
        .bind(customer.id)
        .bind(&customer.name)
        .bind(&customer.last_name)
        .bind(&customer.cpf)
        .bind(customer.birth_date)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing { entity: "customer", id: customer.id });
        }

        Self::stage_event(&mut tx, event).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: i64, event: &LifecycleEvent) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing { entity: "customer", id });
        }

        Self::stage_event(&mut tx, event).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn link_external_id(&self, id: i64, external_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE customers SET external_id = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(external_id)
        .execute(&self.pool)
        .await
        .map_err(classify)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing { entity: "customer", id });
        }
        Ok(())
    }
}

#[async_trait]
impl AddressStore for PgStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Address>, StoreError> {
        let sql = format!("SELECT {} FROM addresses WHERE id = $1", ADDRESS_COLUMNS);
        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(address)
    }

    async fn find_by_customer(&self, customer_id: i64) -> Result<Vec<Address>, StoreError> {
        let sql = format!(
            "SELECT {} FROM addresses WHERE customer_id = $1 ORDER BY id",
            ADDRESS_COLUMNS
        );
        let addresses = sqlx::query_as::<_, Address>(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(addresses)
    }

    async fn insert(&self, customer_id: i64, draft: &AddressDraft) -> Result<Address, StoreError> {
        let sql = format!(
            "INSERT INTO addresses (customer_id, contact_name, contact_last_name, contact_phone, \
             address, number, neighborhood, city, state, cep, complement) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {}",
            ADDRESS_COLUMNS
        );
        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(customer_id)
            .bind(&draft.contact_name)
            .bind(&draft.contact_last_name)
            .bind(&draft.contact_phone)
            .bind(&draft.address)
            .bind(&draft.number)
            .bind(&draft.neighborhood)
            .bind(&draft.city)
            .bind(&draft.state)
            .bind(&draft.cep)
            .bind(&draft.complement)
            .fetch_one(&self.pool)
            .await?;
        Ok(address)
    }

    async fn update(&self, address: &Address) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE addresses SET contact_name = $2, contact_last_name = $3, contact_phone = $4, \
             address = $5, number = $6, neighborhood = $7, city = $8, state = $9, cep = $10, \
             complement = $11, updated_at = now() WHERE id = $1",
        )
        .bind(address.id)
        .bind(&address.contact_name)
        .bind(&address.contact_last_name)
        .bind(&address.contact_phone)
        .bind(&address.address)
        .bind(&address.number)
        .bind(&address.neighborhood)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.cep)
        .bind(&address.complement)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing { entity: "address", id: address.id });
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing { entity: "address", id });
        }
        Ok(())
    }
}

#[async_trait]
impl OutboxStore for PgStore {
    async fn pending(&self, limit: i64) -> Result<Vec<OutboxMessage>, StoreError> {
        let messages = sqlx::query_as::<_, OutboxMessage>(
            "SELECT id, aggregate_id, event_type, routing_key, payload, created_at \
             FROM outbox_messages WHERE published_at IS NULL \
             ORDER BY seq ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    async fn mark_published(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE outbox_messages SET published_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn prune_published(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM outbox_messages WHERE published_at IS NOT NULL AND published_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
