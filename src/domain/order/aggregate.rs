use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::event_sourcing::Aggregate;
use super::value_objects::{OrderStatus, Payment};
use super::events::*;
use super::commands::OrderCommand;
use super::errors::OrderError;
use super::workflows::OrderRegistry;

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// `status` only moves through StatusChanged events, and those are only
// emitted from a plan the workflow registry accepted.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAggregate {
    // Identity
    pub id: Uuid,
    pub version: i64,

    // Current State (derived from events)
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub payments: Vec<Payment>,
    pub last_changed_by: Option<Uuid>,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Events applied locally but not yet persisted
    #[serde(skip)]
    uncommitted: Vec<OrderEvent>,
}

impl OrderAggregate {
    /// Start a new order. The creation event stays uncommitted until the
    /// order is persisted.
    pub fn open(order_id: Uuid, customer_id: Uuid, total: Decimal) -> Result<Self, OrderError> {
        if total < Decimal::ZERO {
            return Err(OrderError::NegativeTotal(total));
        }

        let event = OrderEvent::Created(OrderCreated {
            order_id,
            customer_id,
            total,
            created_at: Utc::now(),
        });

        let mut aggregate = Self::apply_first_event(&event)?;
        aggregate.uncommitted.push(event);
        Ok(aggregate)
    }

    pub fn is_fully_paid(&self) -> bool {
        self.amount_paid >= self.total
    }

    pub fn deposited_too_little(&self) -> bool {
        self.amount_paid > Decimal::ZERO && self.amount_paid < self.total
    }

    pub fn outstanding(&self) -> Decimal {
        (self.total - self.amount_paid).max(Decimal::ZERO)
    }

    /// Handle `command` and apply the resulting events to this instance.
    ///
    /// All-or-nothing: on error the aggregate is left untouched.
    pub fn execute(
        &mut self,
        command: &OrderCommand,
        registry: &OrderRegistry,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let events = self.handle_command(command, registry)?;

        let mut next = self.clone();
        for event in &events {
            next.apply_event(event)?;
        }
        next.uncommitted.extend(events.iter().cloned());
        *self = next;

        Ok(events)
    }

    pub fn uncommitted_events(&self) -> &[OrderEvent] {
        &self.uncommitted
    }

    pub fn has_uncommitted_events(&self) -> bool {
        !self.uncommitted.is_empty()
    }

    /// Drain pending events for persistence. The version they must be
    /// appended at is the current `version`.
    pub fn take_uncommitted(&mut self) -> Vec<OrderEvent> {
        std::mem::take(&mut self.uncommitted)
    }

    /// Admin actions (name, button label) that could fire right now.
    pub fn available_admin_actions(&self, registry: &OrderRegistry) -> Vec<(&'static str, &'static str)> {
        registry
            .available_admin_transitions(self, self.status)
            .into_iter()
            .filter_map(|t| t.trigger.button_name().map(|button| (t.name, button)))
            .collect()
    }

    pub fn status_label(&self, registry: &OrderRegistry) -> &'static str {
        registry.label(self.status).unwrap_or(self.status.as_str())
    }

    fn status_changes(
        &self,
        name: &str,
        by: Option<Uuid>,
        registry: &OrderRegistry,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let plan = registry.plan(self, self.status, name)?;
        let changed_at = Utc::now();

        let events = plan
            .into_steps()
            .into_iter()
            .enumerate()
            .map(|(index, step)| {
                OrderEvent::StatusChanged(OrderStatusChanged {
                    transition: step.transition.to_string(),
                    from: step.from,
                    to: step.to,
                    automatic: step.trigger.is_auto(),
                    chained: index > 0,
                    // only the requested step is attributed to the caller
                    by: if index == 0 { by } else { None },
                    changed_at,
                })
            })
            .collect();

        Ok(events)
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for OrderAggregate {
    type Event = OrderEvent;
    type Command = OrderCommand;
    type Error = OrderError;
    type Context = OrderRegistry;

    fn apply_first_event(event: &Self::Event) -> Result<Self, Self::Error> {
        match event {
            OrderEvent::Created(e) => Ok(Self {
                id: e.order_id,
                version: 0,
                customer_id: e.customer_id,
                status: OrderStatus::Created,
                total: e.total,
                amount_paid: Decimal::ZERO,
                payments: Vec::new(),
                last_changed_by: None,
                created_at: e.created_at,
                updated_at: e.created_at,
                uncommitted: Vec::new(),
            }),
            _ => Err(OrderError::NotInitialized),
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            OrderEvent::Created(_) => {
                // First event already applied
            }
            OrderEvent::PaymentRecorded(e) => {
                self.amount_paid += e.amount;
                self.payments.push(Payment {
                    amount: e.amount,
                    reference: e.reference.clone(),
                    received_at: e.recorded_at,
                });
                self.updated_at = e.recorded_at;
            }
            OrderEvent::StatusChanged(e) => {
                if self.status != e.from {
                    return Err(OrderError::StatusMismatch {
                        expected: e.from,
                        found: self.status,
                    });
                }
                self.status = e.to;
                if e.by.is_some() {
                    self.last_changed_by = e.by;
                }
                self.updated_at = e.changed_at;
            }
        }
        Ok(())
    }

    fn handle_command(
        &self,
        command: &Self::Command,
        registry: &Self::Context,
    ) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::CreateOrder { .. } => Err(OrderError::AlreadyExists),

            OrderCommand::RecordPayment { amount, reference } => {
                if *amount <= Decimal::ZERO {
                    return Err(OrderError::InvalidPaymentAmount(*amount));
                }

                Ok(vec![OrderEvent::PaymentRecorded(OrderPaymentRecorded {
                    amount: *amount,
                    reference: reference.clone(),
                    recorded_at: Utc::now(),
                })])
            }

            OrderCommand::Transition { name, by } => self.status_changes(name, *by, registry),
        }
    }

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
