// ============================================================================
// Order Domain - Business Logic for Order Aggregate
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (OrderStatus, Payment)
// - Events (OrderCreated, OrderPaymentRecorded, OrderStatusChanged)
// - Commands (CreateOrder, RecordPayment, Transition)
// - Errors (OrderError enum)
// - Aggregate (OrderAggregate with business logic)
// - Workflows (transition bundles installed into the order registry)
// - Persistence (OrderStore) and Command Handler (OrderCommandHandler)
//
// This is completely separate from the generic workflow engine and event
// sourcing infrastructure.
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod workflows;
pub mod repository;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use workflows::{
    build_registry, transitions, BaseOrderWorkflow, CommissionGoodsWorkflow, OrderRegistry,
    OrderTransition, OrderWorkflow, PayInAdvanceWorkflow, WorkflowKind,
};
pub use repository::*;
pub use command_handler::*;
