use std::sync::Arc;

use super::session::logged_customer;
use super::validation::AddressValidator;
use crate::auth::AuthContext;
use crate::domain::address::{Address, AddressRequest, AddressResponse};
use crate::domain::ServiceError;
use crate::store::{AddressStore, CustomerStore};

// ============================================================================
// Address Use Case - scoped to the authenticated customer
// ============================================================================

pub struct AddressUseCase {
    addresses: Arc<dyn AddressStore>,
    customers: Arc<dyn CustomerStore>,
    validator: AddressValidator,
}

impl AddressUseCase {
    pub fn new(addresses: Arc<dyn AddressStore>, customers: Arc<dyn CustomerStore>) -> Self {
        let validator = AddressValidator::new(customers.clone());
        Self {
            addresses,
            customers,
            validator,
        }
    }

    pub async fn create(
        &self,
        auth: &AuthContext,
        request: &AddressRequest,
    ) -> Result<AddressResponse, ServiceError> {
        let draft = request.validate_request()?;
        let customer = logged_customer(self.customers.as_ref(), auth).await?;
        self.validator.validate_customer_exists(customer.id).await?;

        let address = self.addresses.insert(customer.id, &draft).await?;
        tracing::info!(address_id = address.id, customer_id = customer.id, "Address created");
        Ok(AddressResponse::from(&address))
    }

    pub async fn list(&self, auth: &AuthContext) -> Result<Vec<AddressResponse>, ServiceError> {
        let customer = logged_customer(self.customers.as_ref(), auth).await?;
        let addresses = self.addresses.find_by_customer(customer.id).await?;

        tracing::debug!(customer_id = customer.id, count = addresses.len(), "Listed addresses");
        Ok(addresses.iter().map(AddressResponse::from).collect())
    }

    pub async fn edit(
        &self,
        auth: &AuthContext,
        address_id: i64,
        request: &AddressRequest,
    ) -> Result<AddressResponse, ServiceError> {
        let draft = request.validate_request()?;
        let mut address = self.owned(auth, address_id).await?;

        address.apply(&draft);
        self.addresses.update(&address).await?;

        tracing::info!(address_id, "Address updated");
        Ok(AddressResponse::from(&address))
    }

    pub async fn delete(&self, auth: &AuthContext, address_id: i64) -> Result<(), ServiceError> {
        let address = self.owned(auth, address_id).await?;
        self.addresses.delete(address.id).await?;

        tracing::info!(address_id, "Address deleted");
        Ok(())
    }

    /// Loads the address, then checks its owner exists and is the caller.
    async fn owned(&self, auth: &AuthContext, address_id: i64) -> Result<Address, ServiceError> {
        let address = self
            .addresses
            .find_by_id(address_id)
            .await?
            .ok_or_else(|| ServiceError::address_not_found(address_id))?;

        let caller = logged_customer(self.customers.as_ref(), auth).await?;
        self.validator.validate_ownership(&address, caller.id).await?;
        Ok(address)
    }
}
