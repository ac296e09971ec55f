// ============================================================================
// Address Domain
// ============================================================================

pub mod model;

pub use model::*;
