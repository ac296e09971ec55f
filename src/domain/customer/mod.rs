// ============================================================================
// Customer Domain
// ============================================================================
//
// - Entity and request/response DTOs with two-phase validation
// - Lifecycle events published for identity reconciliation
//
// ============================================================================

pub mod events;
pub mod model;

pub use events::*;
pub use model::*;
