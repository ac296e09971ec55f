use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::errors::{ServiceError, ValidationErrors};
use crate::domain::validation::{check_format, present, required, validate_cpf};

// ============================================================================
// Customer Entity
// ============================================================================

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub cpf: String,
    pub cep: String,
    pub birth_date: NaiveDate,
    /// Identity-provider user id, unset until reconciliation links it.
    pub external_id: Option<String>,
}

impl Customer {
    pub fn from_draft(id: i64, draft: &CustomerDraft) -> Self {
        Self {
            id,
            name: draft.name.clone(),
            last_name: draft.last_name.clone(),
            email: draft.email.clone(),
            cpf: draft.cpf.clone(),
            cep: draft.cep.clone(),
            birth_date: draft.birth_date,
            external_id: None,
        }
    }

    /// Email and credentials are never touched by an edit.
    pub fn apply(&mut self, changes: &CustomerChanges) {
        self.name = changes.name.clone();
        self.last_name = changes.last_name.clone();
        self.cpf = changes.cpf.clone();
        self.birth_date = changes.birth_date;
    }
}

// ============================================================================
// Inbound DTOs
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRequest {
    #[validate(length(min = 2, max = 100, message = "The field must be between 2 and 100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 2, max = 100, message = "The field must be between 2 and 100 characters"))]
    pub last_name: Option<String>,

    #[validate(email(message = "Invalid address e-mail"))]
    pub email: Option<String>,

    pub password: Option<String>,

    #[validate(custom(function = "validate_cpf"))]
    pub cpf: Option<String>,

    pub cep: Option<String>,

    pub birth_date: Option<NaiveDate>,
}

/// A signup request that passed both validation phases.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerDraft {
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub cpf: String,
    pub cep: String,
    pub birth_date: NaiveDate,
}

impl CustomerRequest {
    pub fn validate_request(&self) -> Result<CustomerDraft, ServiceError> {
        let mut missing = ValidationErrors::new();
        let name = required(&mut missing, "name", self.name.as_deref());
        let last_name = required(&mut missing, "lastName", self.last_name.as_deref());
        let email = required(&mut missing, "email", self.email.as_deref());
        let password = required(&mut missing, "password", self.password.as_deref());
        let cpf = required(&mut missing, "cpf", self.cpf.as_deref());
        let cep = required(&mut missing, "cep", self.cep.as_deref());
        let birth_date = present(&mut missing, "birthDate", self.birth_date.as_ref());

        match (name, last_name, email, password, cpf, cep, birth_date) {
            (
                Some(name),
                Some(last_name),
                Some(email),
                Some(password),
                Some(cpf),
                Some(cep),
                Some(birth_date),
            ) => {
                check_format(self)?;
                Ok(CustomerDraft {
                    name,
                    last_name,
                    email,
                    password,
                    cpf,
                    cep,
                    birth_date,
                })
            }
            _ => Err(ServiceError::Validation(missing)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomerUpdate {
    #[validate(length(min = 2, max = 100, message = "The field must be between 2 and 100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 2, max = 100, message = "The field must be between 2 and 100 characters"))]
    pub last_name: Option<String>,

    #[validate(custom(function = "validate_cpf"))]
    pub cpf: Option<String>,

    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerChanges {
    pub name: String,
    pub last_name: String,
    pub cpf: String,
    pub birth_date: NaiveDate,
}

impl CustomerUpdate {
    pub fn validate_request(&self) -> Result<CustomerChanges, ServiceError> {
        let mut missing = ValidationErrors::new();
        let name = required(&mut missing, "name", self.name.as_deref());
        let last_name = required(&mut missing, "lastName", self.last_name.as_deref());
        let cpf = required(&mut missing, "cpf", self.cpf.as_deref());
        let birth_date = present(&mut missing, "birthDate", self.birth_date.as_ref());

        match (name, last_name, cpf, birth_date) {
            (Some(name), Some(last_name), Some(cpf), Some(birth_date)) => {
                check_format(self)?;
                Ok(CustomerChanges {
                    name,
                    last_name,
                    cpf,
                    birth_date,
                })
            }
            _ => Err(ServiceError::Validation(missing)),
        }
    }
}

// ============================================================================
// Outbound projection
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerResponse {
    pub id: i64,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub cpf: String,
    pub cep: String,
    pub birth_date: NaiveDate,
}

impl From<&Customer> for CustomerResponse {
    fn from(customer: &Customer) -> Self {
        Self {
            id: customer.id,
            name: customer.name.clone(),
            last_name: customer.last_name.clone(),
            email: customer.email.clone(),
            cpf: customer.cpf.clone(),
            cep: customer.cep.clone(),
            birth_date: customer.birth_date,
        }
    }
}
