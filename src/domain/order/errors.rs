use rust_decimal::Decimal;

use crate::workflow::TransitionError;
use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order already exists")]
    AlreadyExists,

    #[error("Order total cannot be negative: {0}")]
    NegativeTotal(Decimal),

    #[error("Payment amount must be positive: {0}")]
    InvalidPaymentAmount(Decimal),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Event history out of order: expected status {expected}, found {found}")]
    StatusMismatch {
        expected: OrderStatus,
        found: OrderStatus,
    },

    #[error("Aggregate not initialized")]
    NotInitialized,
}

impl OrderError {
    /// The caller asked for a transition the order's current data does not
    /// permit.
    pub fn is_transition_not_allowed(&self) -> bool {
        matches!(self, Self::Transition(e) if e.is_not_allowed())
    }
}
