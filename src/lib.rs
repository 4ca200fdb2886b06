// ============================================================================
// Shop Workflow - order lifecycle for a web shop
// ============================================================================
//
// - workflow/       - generic transition engine (guards, chains, auto steps)
// - domain/order/   - event-sourced order aggregate and its workflows
// - event_sourcing/ - aggregate trait, envelopes, in-memory event store
// - payment/        - payment providers and checkout collaborators
// - config, metrics, utils
//
// ============================================================================

pub mod config;
pub mod domain;
pub mod event_sourcing;
pub mod metrics;
pub mod payment;
pub mod utils;
pub mod workflow;
