// ============================================================================
// Payment Layer - checkout entry points
// ============================================================================
//
// A payment provider turns a cart into an order and tells the storefront
// where to go next. Order persistence is reached only through the
// collaborator traits.
//
// ============================================================================

pub mod collaborators;
pub mod forward_fund;

pub use collaborators::{Cart, CheckoutRequest, OrderFactory, OrderRepository};
pub use forward_fund::ForwardFundPayment;

use async_trait::async_trait;

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Unique name used to route checkout requests to this provider.
    fn namespace(&self) -> &'static str;

    /// Create the order for `cart` and return the script the storefront
    /// evaluates to continue checkout.
    async fn get_payment_request(&self, cart: &Cart, request: &CheckoutRequest) -> anyhow::Result<String>;
}
