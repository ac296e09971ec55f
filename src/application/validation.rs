use std::sync::Arc;

use crate::domain::address::Address;
use crate::domain::customer::Customer;
use crate::domain::errors::{ADDRESS_NOT_OWNED, DUPLICATE_CPF, DUPLICATE_EMAIL};
use crate::domain::ServiceError;
use crate::store::CustomerStore;

// ============================================================================
// Validation Gate
// ============================================================================
//
// Read-only checks run before a mutation. Field formats are already settled
// by the request DTOs; what remains needs the store.
//
// ============================================================================

pub struct CustomerValidator {
    customers: Arc<dyn CustomerStore>,
}

impl CustomerValidator {
    pub fn new(customers: Arc<dyn CustomerStore>) -> Self {
        Self { customers }
    }

    /// Email first; CPF only once the email is known to be free.
    pub async fn validate_on_create(&self, candidate: &Customer) -> Result<(), ServiceError> {
        if self.customers.find_by_email(&candidate.email).await?.is_some() {
            tracing::warn!(email = %candidate.email, "Signup rejected: e-mail already registered");
            return Err(ServiceError::DuplicateRecord(DUPLICATE_EMAIL.to_string()));
        }

        if self.customers.find_by_cpf(&candidate.cpf).await?.is_some() {
            tracing::warn!("Signup rejected: CPF already registered");
            return Err(ServiceError::DuplicateRecord(DUPLICATE_CPF.to_string()));
        }

        Ok(())
    }

    pub async fn validate_on_update(&self, customer_id: i64, cpf: &str) -> Result<(), ServiceError> {
        if self
            .customers
            .find_by_cpf_excluding(cpf, customer_id)
            .await?
            .is_some()
        {
            tracing::warn!(customer_id, "Edit rejected: CPF held by another customer");
            return Err(ServiceError::DuplicateRecord(DUPLICATE_CPF.to_string()));
        }

        Ok(())
    }
}

pub struct AddressValidator {
    customers: Arc<dyn CustomerStore>,
}

impl AddressValidator {
    pub fn new(customers: Arc<dyn CustomerStore>) -> Self {
        Self { customers }
    }

    pub async fn validate_customer_exists(&self, customer_id: i64) -> Result<(), ServiceError> {
        if !self.customers.exists(customer_id).await? {
            return Err(ServiceError::customer_not_found(customer_id));
        }
        Ok(())
    }

    /// Existence of the owner first, then ownership.
    pub async fn validate_ownership(
        &self,
        address: &Address,
        logged_customer_id: i64,
    ) -> Result<(), ServiceError> {
        self.validate_customer_exists(address.customer_id).await?;

        if address.customer_id != logged_customer_id {
            tracing::warn!(
                address_id = address.id,
                owner_id = address.customer_id,
                caller_id = logged_customer_id,
                "Address access denied"
            );
            return Err(ServiceError::BusinessRule(ADDRESS_NOT_OWNED.to_string()));
        }

        Ok(())
    }
}
