use std::sync::Arc;
use uuid::Uuid;
use anyhow::Result;

use crate::metrics::Metrics;
use crate::utils::{retry_on_transient, RetryConfig};

use super::aggregate::OrderAggregate;
use super::commands::OrderCommand;
use super::errors::OrderError;
use super::repository::OrderStore;
use super::workflows::OrderRegistry;

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: Command → Aggregate → Events → Event Store
//
// Every attempt reloads the order, so a retry after a version conflict
// re-evaluates guards against the latest state.
//
// ============================================================================

pub struct OrderCommandHandler {
    orders: Arc<OrderStore>,
    registry: Arc<OrderRegistry>,
    metrics: Arc<Metrics>,
    retry: RetryConfig,
}

impl OrderCommandHandler {
    pub fn new(orders: Arc<OrderStore>, registry: Arc<OrderRegistry>, metrics: Arc<Metrics>) -> Self {
        Self {
            orders,
            registry,
            metrics,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn registry(&self) -> &OrderRegistry {
        &self.registry
    }

    pub async fn load(&self, order_id: Uuid) -> Result<OrderAggregate> {
        self.orders.load(order_id).await
    }

    /// Admin buttons currently offered for the order.
    pub async fn available_admin_actions(&self, order_id: Uuid) -> Result<Vec<(&'static str, &'static str)>> {
        let order = self.load(order_id).await?;
        Ok(order.available_admin_actions(&self.registry))
    }

    /// Handle a command and persist resulting events.
    ///
    /// Returns the order's version after the append.
    pub async fn handle(
        &self,
        aggregate_id: Uuid,
        command: OrderCommand,
        correlation_id: Uuid,
    ) -> Result<i64> {
        if let OrderCommand::CreateOrder { order_id, customer_id, total } = command {
            return self.create(order_id, customer_id, total, correlation_id).await;
        }

        let command = &command;
        retry_on_transient(&self.retry, |attempt| async move {
            tracing::debug!(order_id = %aggregate_id, attempt, ?command, "Handling order command");
            self.apply(aggregate_id, command, correlation_id).await
        })
        .await
        .into_result()
    }

    async fn create(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
        total: rust_decimal::Decimal,
        correlation_id: Uuid,
    ) -> Result<i64> {
        if self.orders.exists(order_id).await {
            return Err(OrderError::AlreadyExists.into());
        }

        let mut order = OrderAggregate::open(order_id, customer_id, total)?;
        let version = self.orders.save(&mut order, correlation_id).await?;

        tracing::info!(order_id = %order_id, total = %total, "Order created");
        Ok(version)
    }

    async fn apply(&self, order_id: Uuid, command: &OrderCommand, correlation_id: Uuid) -> Result<i64> {
        let mut order = self.orders.load(order_id).await?;

        if let Err(e) = order.execute(command, &self.registry) {
            if let (OrderCommand::Transition { name, .. }, OrderError::Transition(refused)) = (command, &e) {
                self.metrics.record_rejection(name, refused.reason());
                tracing::warn!(
                    order_id = %order_id,
                    transition = %name,
                    status = %order.status,
                    error = %refused,
                    "Transition refused"
                );
            }
            return Err(e.into());
        }

        self.orders.save(&mut order, correlation_id).await
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
