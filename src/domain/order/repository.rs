use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::event_sourcing::{Aggregate, DomainEvent, EventEnvelope, EventStore, StoreError};
use crate::metrics::Metrics;
use crate::payment::{Cart, CheckoutRequest, OrderFactory, OrderRepository};

use super::aggregate::OrderAggregate;
use super::events::OrderEvent;

// ============================================================================
// Order Store - event-sourced persistence for orders
// ============================================================================
//
// Wraps the generic event store: pending events on an aggregate are wrapped
// in envelopes and appended at the aggregate's version, so a stale copy
// fails with a concurrency conflict instead of overwriting history.
//
// Chained status changes point back at the requested step through the
// envelope's causation id.
//
// ============================================================================

pub struct OrderStore {
    events: Arc<EventStore<OrderEvent>>,
    metrics: Arc<Metrics>,
    url_prefix: String,
    // customer id -> their most recently created order
    latest_by_customer: RwLock<HashMap<Uuid, Uuid>>,
}

impl OrderStore {
    pub fn new(events: Arc<EventStore<OrderEvent>>, metrics: Arc<Metrics>, url_prefix: &str) -> Self {
        Self {
            events,
            metrics,
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
            latest_by_customer: RwLock::new(HashMap::new()),
        }
    }

    pub fn event_store(&self) -> &EventStore<OrderEvent> {
        &self.events
    }

    pub fn order_url(&self, order_id: Uuid) -> String {
        format!("{}/{}/", self.url_prefix, order_id)
    }

    pub async fn exists(&self, order_id: Uuid) -> bool {
        self.events.aggregate_exists(order_id).await
    }

    pub async fn load(&self, order_id: Uuid) -> Result<OrderAggregate> {
        self.events
            .load_aggregate::<OrderAggregate>(order_id)
            .await
            .with_context(|| format!("loading order {}", order_id))
    }

    /// Append the order's pending events and advance its version.
    ///
    /// On failure the events stay pending on `order`.
    pub async fn save(&self, order: &mut OrderAggregate, correlation_id: Uuid) -> Result<i64> {
        if !order.has_uncommitted_events() {
            return Ok(order.version());
        }

        let expected_version = order.version();
        let mut envelopes = Vec::with_capacity(order.uncommitted_events().len());
        let mut requested_step: Option<Uuid> = None;

        for (event, seq) in order.uncommitted_events().iter().zip(expected_version + 1..) {
            let mut envelope = EventEnvelope::new(
                order.id,
                seq,
                event.kind().to_string(),
                event.clone(),
                correlation_id,
            );
            if let OrderEvent::StatusChanged(change) = event {
                if let Some(user) = change.by {
                    envelope = envelope.with_user(user);
                }
                if !change.chained {
                    requested_step = Some(envelope.event_id);
                } else if let Some(cause) = requested_step {
                    envelope = envelope.with_causation(cause);
                }
            }
            envelopes.push(envelope);
        }

        let new_version = match self.events.append_events(order.id, expected_version, envelopes).await {
            Ok(version) => version,
            Err(e) => {
                if matches!(e, StoreError::ConcurrencyConflict { .. }) {
                    self.metrics.record_conflict();
                }
                return Err(e.into());
            }
        };

        for event in order.take_uncommitted() {
            match event {
                OrderEvent::Created(created) => {
                    self.latest_by_customer
                        .write()
                        .await
                        .insert(created.customer_id, created.order_id);
                }
                OrderEvent::StatusChanged(change) => {
                    self.metrics.record_transition(&change.transition, change.automatic);
                    tracing::info!(
                        order_id = %order.id,
                        transition = %change.transition,
                        from = %change.from,
                        to = %change.to,
                        automatic = change.automatic,
                        "Order transition persisted"
                    );
                }
                OrderEvent::PaymentRecorded(_) => {}
            }
        }
        order.set_version(new_version);

        Ok(new_version)
    }
}

#[async_trait]
impl OrderFactory for OrderStore {
    async fn create_from_cart(&self, cart: &Cart, request: &CheckoutRequest) -> Result<OrderAggregate> {
        let order = OrderAggregate::open(Uuid::now_v7(), cart.customer_id, cart.total)?;

        tracing::debug!(
            order_id = %order.id,
            cart_id = %cart.id,
            correlation_id = %request.correlation_id,
            total = %order.total,
            "Opened order from cart"
        );

        Ok(order)
    }
}

#[async_trait]
impl OrderRepository for OrderStore {
    async fn persist(&self, order: &mut OrderAggregate, request: &CheckoutRequest) -> Result<i64> {
        self.save(order, request.correlation_id).await
    }

    async fn latest_order_url(&self, customer_id: Uuid) -> Result<String> {
        let order_id = self
            .latest_by_customer
            .read()
            .await
            .get(&customer_id)
            .copied()
            .with_context(|| format!("customer {} has no orders", customer_id))?;
        Ok(self.order_url(order_id))
    }
}
