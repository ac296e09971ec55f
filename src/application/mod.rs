// ============================================================================
// Application Layer - use cases over the stores
// ============================================================================
//
// CustomerUseCase is the only writer of customer rows and stages one
// lifecycle event per mutation. AddressUseCase works strictly on behalf of
// the authenticated customer and emits nothing.
//
// ============================================================================

pub mod address;
pub mod customer;
pub mod session;
pub mod validation;

pub use address::AddressUseCase;
pub use customer::CustomerUseCase;
pub use validation::{AddressValidator, CustomerValidator};
