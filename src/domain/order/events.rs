use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::event_sourcing::DomainEvent;
use super::value_objects::OrderStatus;

// ============================================================================
// Order Events - Domain Events for Order Aggregate
// ============================================================================

/// Order Event - Union type for all order events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Created(OrderCreated),
    PaymentRecorded(OrderPaymentRecorded),
    StatusChanged(OrderStatusChanged),
}

impl DomainEvent for OrderEvent {
    fn event_type() -> &'static str { "OrderEvent" }

    fn kind(&self) -> &'static str {
        match self {
            Self::Created(_) => OrderCreated::event_type(),
            Self::PaymentRecorded(_) => OrderPaymentRecorded::event_type(),
            Self::StatusChanged(_) => OrderStatusChanged::event_type(),
        }
    }
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// Order Created - Initial event in order lifecycle
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderCreated {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

impl DomainEvent for OrderCreated {
    fn event_type() -> &'static str { "OrderCreated" }
}

/// Payment Recorded - money received against the order
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderPaymentRecorded {
    pub amount: Decimal,
    pub reference: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl DomainEvent for OrderPaymentRecorded {
    fn event_type() -> &'static str { "OrderPaymentRecorded" }
}

/// Status Changed - one fired workflow transition.
///
/// Untargeted transitions are recorded too, with `from == to`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OrderStatusChanged {
    pub transition: String,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub automatic: bool,
    /// Fired as a consequence of an earlier step of the same request.
    #[serde(default)]
    pub chained: bool,
    pub by: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
}

impl DomainEvent for OrderStatusChanged {
    fn event_type() -> &'static str { "OrderStatusChanged" }
}
