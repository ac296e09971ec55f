use serde::Serialize;

use crate::store::StoreError;

pub const DUPLICATE_EMAIL: &str = "There is already an account registered with this e-mail";
pub const DUPLICATE_CPF: &str = "There is already an account registered with this CPF";
pub const ADDRESS_NOT_OWNED: &str = "You don’t have permission to manage this address";
pub const CUSTOMER_NOT_OWNED: &str = "You don’t have permission to manage this customer";

// ============================================================================
// Service Errors - the taxonomy every use case reports with
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    DuplicateRecord(String),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("{0}")]
    BusinessRule(String),

    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(ValidationErrors),

    #[error("Store failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            // A concurrent request won the unique index race
            StoreError::Conflict(constraint) if constraint.contains("cpf") => {
                ServiceError::DuplicateRecord(DUPLICATE_CPF.to_string())
            }
            StoreError::Conflict(constraint) if constraint.contains("email") => {
                ServiceError::DuplicateRecord(DUPLICATE_EMAIL.to_string())
            }
            StoreError::Missing { entity, id } => {
                ServiceError::RecordNotFound(format!("{} {}", entity, id))
            }
            other => ServiceError::Store(other),
        }
    }
}

impl ServiceError {
    pub fn customer_not_found(id: impl std::fmt::Display) -> Self {
        Self::RecordNotFound(format!("customer {}", id))
    }

    pub fn address_not_found(id: impl std::fmt::Display) -> Self {
        Self::RecordNotFound(format!("address {}", id))
    }
}

// ============================================================================
// Field-level validation errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Ordered collection of field failures for one request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), ServiceError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Validation(self))
        }
    }
}

impl From<validator::ValidationErrors> for ValidationErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut collected = ValidationErrors::new();
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        for (field, failures) in fields {
            for failure in failures {
                let message = failure
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| failure.code.to_string());
                collected.add(camel_case(&field), message);
            }
        }

        collected
    }
}

/// Request bodies are camelCase on the wire; struct fields are not.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper_next = false;
    for c in field.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}
