use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::order::OrderAggregate;

// ============================================================================
// Checkout Collaborators
// ============================================================================
//
// Cart handling, order persistence and URL generation live outside the
// workflow core. Payment providers only see them through these traits.
//
// ============================================================================

/// The part of a shopping cart a payment provider reads.
#[derive(Debug, Clone)]
pub struct Cart {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub total: Decimal,
}

impl Cart {
    pub fn new(customer_id: Uuid, total: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            total,
        }
    }
}

/// The incoming checkout request.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub correlation_id: Uuid,
    pub user_id: Option<Uuid>,
}

impl CheckoutRequest {
    pub fn new() -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

impl Default for CheckoutRequest {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
pub trait OrderFactory: Send + Sync {
    /// Open a new order for `cart`. Nothing is stored until the order is
    /// handed to [`OrderRepository::persist`].
    async fn create_from_cart(
        &self,
        cart: &Cart,
        request: &CheckoutRequest,
    ) -> anyhow::Result<OrderAggregate>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist pending changes on `order`, returning the new version.
    async fn persist(&self, order: &mut OrderAggregate, request: &CheckoutRequest) -> anyhow::Result<i64>;

    /// URL of the customer's most recently created order.
    async fn latest_order_url(&self, customer_id: Uuid) -> anyhow::Result<String>;
}
