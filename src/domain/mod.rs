// ============================================================================
// Domain Layer
// ============================================================================
//
// Entities, DTOs, lifecycle events and the error taxonomy. Nothing here
// talks to the database, the broker or the identity provider.
//
// ============================================================================

pub mod address;
pub mod customer;
pub mod errors;
pub mod validation;

pub use errors::{FieldError, ServiceError, ValidationErrors};
