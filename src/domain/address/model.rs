use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::errors::{ServiceError, ValidationErrors};
use crate::domain::validation::{check_format, required};

// ============================================================================
// Address Entity - owned by exactly one customer
// ============================================================================

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Address {
    pub id: i64,
    pub customer_id: i64,
    pub contact_name: String,
    pub contact_last_name: String,
    pub contact_phone: String,
    pub address: String,
    pub number: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub cep: String,
    pub complement: Option<String>,
}

impl Address {
    pub fn apply(&mut self, draft: &AddressDraft) {
        self.contact_name = draft.contact_name.clone();
        self.contact_last_name = draft.contact_last_name.clone();
        self.contact_phone = draft.contact_phone.clone();
        self.address = draft.address.clone();
        self.number = draft.number.clone();
        self.neighborhood = draft.neighborhood.clone();
        self.city = draft.city.clone();
        self.state = draft.state.clone();
        self.cep = draft.cep.clone();
        self.complement = draft.complement.clone();
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddressRequest {
    #[validate(length(min = 2, max = 100, message = "The field must be between 2 and 100 characters"))]
    pub contact_name: Option<String>,

    #[validate(length(min = 2, max = 100, message = "The field must be between 2 and 100 characters"))]
    pub contact_last_name: Option<String>,

    #[validate(length(equal = 11, message = "The field must have 11 characters"))]
    pub contact_phone: Option<String>,

    #[validate(length(min = 2, max = 150, message = "The field must be between 2 and 150 characters"))]
    pub address: Option<String>,

    #[validate(length(max = 10, message = "The field must have a maximum of 10 characters"))]
    pub number: Option<String>,

    #[validate(length(min = 2, max = 100, message = "The field must be between 2 and 100 characters"))]
    pub neighborhood: Option<String>,

    #[validate(length(min = 2, max = 100, message = "The field must be between 2 and 100 characters"))]
    pub city: Option<String>,

    #[validate(length(min = 2, max = 100, message = "The field must be between 2 and 100 characters"))]
    pub state: Option<String>,

    #[validate(length(equal = 8, message = "The field must have 8 characters"))]
    pub cep: Option<String>,

    #[validate(length(max = 50, message = "The field must have a maximum of 50 characters"))]
    pub complement: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddressDraft {
    pub contact_name: String,
    pub contact_last_name: String,
    pub contact_phone: String,
    pub address: String,
    pub number: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub cep: String,
    pub complement: Option<String>,
}

#[cfg(test)]
impl AddressDraft {
    pub fn into_address(self, id: i64, customer_id: i64) -> Address {
        Address {
            id,
            customer_id,
            contact_name: self.contact_name,
            contact_last_name: self.contact_last_name,
            contact_phone: self.contact_phone,
            address: self.address,
            number: self.number,
            neighborhood: self.neighborhood,
            city: self.city,
            state: self.state,
            cep: self.cep,
            complement: self.complement,
        }
    }
}

impl AddressRequest {
    pub fn validate_request(&self) -> Result<AddressDraft, ServiceError> {
        let mut missing = ValidationErrors::new();
        let contact_name = required(&mut missing, "contactName", self.contact_name.as_deref());
        let contact_last_name =
            required(&mut missing, "contactLastName", self.contact_last_name.as_deref());
        let contact_phone = required(&mut missing, "contactPhone", self.contact_phone.as_deref());
        let address = required(&mut missing, "address", self.address.as_deref());
        let number = required(&mut missing, "number", self.number.as_deref());
        let neighborhood = required(&mut missing, "neighborhood", self.neighborhood.as_deref());
        let city = required(&mut missing, "city", self.city.as_deref());
        let state = required(&mut missing, "state", self.state.as_deref());
        let cep = required(&mut missing, "cep", self.cep.as_deref());

        let (
            Some(contact_name),
            Some(contact_last_name),
            Some(contact_phone),
            Some(address),
            Some(number),
            Some(neighborhood),
            Some(city),
            Some(state),
            Some(cep),
        ) = (
            contact_name,
            contact_last_name,
            contact_phone,
            address,
            number,
            neighborhood,
            city,
            state,
            cep,
        )
        else {
            return Err(ServiceError::Validation(missing));
        };

        check_format(self)?;

        Ok(AddressDraft {
            contact_name,
            contact_last_name,
            contact_phone,
            address,
            number,
            neighborhood,
            city,
            state,
            cep,
            complement: self.complement.clone().filter(|c| !c.trim().is_empty()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressResponse {
    pub id: i64,
    pub contact_name: String,
    pub contact_last_name: String,
    pub contact_phone: String,
    pub address: String,
    pub number: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub cep: String,
    pub complement: Option<String>,
}

impl From<&Address> for AddressResponse {
    fn from(address: &Address) -> Self {
        Self {
            id: address.id,
            contact_name: address.contact_name.clone(),
            contact_last_name: address.contact_last_name.clone(),
            contact_phone: address.contact_phone.clone(),
            address: address.address.clone(),
            number: address.number.clone(),
            neighborhood: address.neighborhood.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            cep: address.cep.clone(),
            complement: address.complement.clone(),
        }
    }
}
