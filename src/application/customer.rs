use std::sync::Arc;

use super::session::logged_customer;
use super::validation::CustomerValidator;
use crate::auth::{AuthContext, Role};
use crate::domain::customer::{
    Customer, CustomerCreatedEvent, CustomerDeletedEvent, CustomerRequest, CustomerResponse,
    CustomerUpdate, CustomerUpdatedEvent, LifecycleEvent,
};
use crate::domain::errors::CUSTOMER_NOT_OWNED;
use crate::domain::ServiceError;
use crate::store::CustomerStore;

// ============================================================================
// Customer Use Case
// ============================================================================
//
// Orchestrates: Request → Validation Gate → Store (row + outbox event)
//
// The store writes the row and its lifecycle event in one transaction, so a
// failed write publishes nothing and a committed write is always relayed.
//
// ============================================================================

pub struct CustomerUseCase {
    customers: Arc<dyn CustomerStore>,
    validator: CustomerValidator,
}

impl CustomerUseCase {
    pub fn new(customers: Arc<dyn CustomerStore>) -> Self {
        let validator = CustomerValidator::new(customers.clone());
        Self {
            customers,
            validator,
        }
    }

    pub async fn create(&self, request: &CustomerRequest) -> Result<CustomerResponse, ServiceError> {
        let draft = request.validate_request()?;
        tracing::debug!(email = %draft.email, "Creating customer");

        let mut customer = Customer::from_draft(0, &draft);
        self.validator.validate_on_create(&customer).await?;
        customer.id = self.customers.next_id().await?;

        let event = LifecycleEvent::Created(CustomerCreatedEvent {
            customer_id: customer.id,
            name: customer.name.clone(),
            last_name: customer.last_name.clone(),
            email: customer.email.clone(),
            password: draft.password,
        });
        self.customers.insert(&customer, &event).await?;

        tracing::info!(customer_id = customer.id, "✅ Customer created");
        Ok(CustomerResponse::from(&customer))
    }

    pub async fn find(&self, id: i64) -> Result<CustomerResponse, ServiceError> {
        let customer = self.load(id).await?;
        Ok(CustomerResponse::from(&customer))
    }

    pub async fn find_logged(&self, auth: &AuthContext) -> Result<CustomerResponse, ServiceError> {
        let customer = logged_customer(self.customers.as_ref(), auth).await?;
        Ok(CustomerResponse::from(&customer))
    }

    pub async fn edit(&self, id: i64, update: &CustomerUpdate) -> Result<CustomerResponse, ServiceError> {
        let changes = update.validate_request()?;
        tracing::debug!(customer_id = id, "Editing customer");

        let mut customer = self.load(id).await?;
        self.validator.validate_on_update(id, &changes.cpf).await?;
        customer.apply(&changes);

        let event = LifecycleEvent::Updated(CustomerUpdatedEvent {
            customer_id: customer.id,
            name: customer.name.clone(),
            last_name: customer.last_name.clone(),
        });
        self.customers.update(&customer, &event).await?;

        tracing::info!(customer_id = id, "Customer updated");
        Ok(CustomerResponse::from(&customer))
    }

    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let customer = self.load(id).await?;
        self.remove(customer).await
    }

    pub async fn delete_logged(&self, auth: &AuthContext) -> Result<(), ServiceError> {
        let customer = logged_customer(self.customers.as_ref(), auth).await?;
        self.remove(customer).await
    }

    /// Shared by both delete entry points.
    async fn remove(&self, customer: Customer) -> Result<(), ServiceError> {
        let event = LifecycleEvent::Deleted(CustomerDeletedEvent {
            customer_id: customer.id,
            external_id: customer.external_id.clone(),
        });
        self.customers.delete(customer.id, &event).await?;

        tracing::info!(customer_id = customer.id, "Customer deleted");
        Ok(())
    }

    /// ADMIN may act on any customer, everyone else only on their own record.
    /// An unknown id reports not-found before ownership is considered.
    pub async fn authorize(&self, auth: &AuthContext, id: i64) -> Result<(), ServiceError> {
        if auth.has_any(&[Role::Admin]) {
            return Ok(());
        }

        self.load(id).await?;
        let caller = logged_customer(self.customers.as_ref(), auth).await?;
        if caller.id != id {
            tracing::warn!(
                customer_id = id,
                caller_id = caller.id,
                subject = %auth.subject,
                "Customer access denied"
            );
            return Err(ServiceError::BusinessRule(CUSTOMER_NOT_OWNED.to_string()));
        }
        Ok(())
    }

    async fn load(&self, id: i64) -> Result<Customer, ServiceError> {
        self.customers
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::customer_not_found(id))
    }
}
