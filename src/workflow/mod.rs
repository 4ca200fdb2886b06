// ============================================================================
// Workflow Engine - Generic Finite State Machine
// ============================================================================
//
// Generic, reusable transition machinery. Nothing in here knows about
// orders: states and entities are type parameters.
//
// - transition/ - Transition, Guard, Effect, TriggerMode declarations
// - registry/   - TransitionRegistry (validation, planning, admin actions)
// - errors/     - TransitionError
//
// Domain workflows register their transitions in src/domain/.
//
// ============================================================================

mod errors;
mod registry;
mod transition;

pub use errors::{NotAllowedReason, TransitionError};
pub use registry::{Step, TransitionPlan, TransitionRegistry, DEFAULT_MAX_CHAIN_DEPTH};
pub use transition::{Effect, Guard, Transition, TriggerMode, WorkflowState};
