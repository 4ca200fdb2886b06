use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::order::transitions::{AWAITING_PAYMENT, NO_PAYMENT_REQUIRED};
use crate::domain::order::{OrderAggregate, OrderCommand, OrderRegistry};

use super::collaborators::{Cart, CheckoutRequest, OrderFactory, OrderRepository};
use super::PaymentProvider;

/// Prepayment provider: the customer transfers the money before the goods
/// are commissioned.
pub struct ForwardFundPayment {
    factory: Arc<dyn OrderFactory>,
    repository: Arc<dyn OrderRepository>,
    registry: Arc<OrderRegistry>,
}

impl ForwardFundPayment {
    pub const NAMESPACE: &'static str = "forward-fund-payment";

    pub fn new(
        factory: Arc<dyn OrderFactory>,
        repository: Arc<dyn OrderRepository>,
        registry: Arc<OrderRegistry>,
    ) -> Self {
        Self {
            factory,
            repository,
            registry,
        }
    }

    // Fires the routing transition and stores the order with all of its
    // events in one append.
    async fn issue(&self, order: &mut OrderAggregate, request: &CheckoutRequest) -> anyhow::Result<String> {
        let transition = if order.total.is_zero() {
            NO_PAYMENT_REQUIRED
        } else {
            AWAITING_PAYMENT
        };
        order.execute(
            &OrderCommand::Transition {
                name: transition.to_string(),
                by: request.user_id,
            },
            &self.registry,
        )?;
        self.repository.persist(order, request).await?;

        self.repository.latest_order_url(order.customer_id).await
    }
}

#[async_trait]
impl PaymentProvider for ForwardFundPayment {
    fn namespace(&self) -> &'static str {
        Self::NAMESPACE
    }

    async fn get_payment_request(&self, cart: &Cart, request: &CheckoutRequest) -> anyhow::Result<String> {
        let mut order = self.factory.create_from_cart(cart, request).await?;

        let thank_you_url = match self.issue(&mut order, request).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(
                    order_id = %order.id,
                    cart_id = %cart.id,
                    version = order.version,
                    error = %e,
                    "Payment request failed"
                );
                return Err(e);
            }
        };

        tracing::info!(
            order_id = %order.id,
            provider = Self::NAMESPACE,
            status = %order.status,
            "Payment request issued"
        );

        Ok(format!("$window.location.href=\"{}\";", thank_you_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    use crate::domain::order::{build_registry, OrderStatus, OrderStore, WorkflowKind};
    use crate::event_sourcing::EventStore;
    use crate::metrics::Metrics;
    use crate::workflow::DEFAULT_MAX_CHAIN_DEPTH;

    fn registry() -> Arc<OrderRegistry> {
        Arc::new(
            build_registry(
                &[WorkflowKind::PayInAdvance, WorkflowKind::CommissionGoods],
                DEFAULT_MAX_CHAIN_DEPTH,
            )
            .unwrap(),
        )
    }

    fn provider_with(registry: Arc<OrderRegistry>) -> (ForwardFundPayment, Arc<OrderStore>) {
        let store = Arc::new(OrderStore::new(
            Arc::new(EventStore::new("Order")),
            Arc::new(Metrics::new().unwrap()),
            "/shop/orders",
        ));
        let provider = ForwardFundPayment::new(store.clone(), store.clone(), registry);
        (provider, store)
    }

    fn provider() -> (ForwardFundPayment, Arc<OrderStore>) {
        provider_with(registry())
    }

    fn order_id_from(script: &str) -> Uuid {
        let id = script
            .trim_start_matches("$window.location.href=\"/shop/orders/")
            .trim_end_matches("/\";");
        Uuid::parse_str(id).unwrap()
    }

    async fn latest(store: &OrderStore) -> OrderAggregate {
        let id = store.event_store().latest_aggregate_id().await.unwrap();
        store.load(id).await.unwrap()
    }

    #[test]
    fn test_namespace() {
        let (provider, _) = provider();
        assert_eq!(provider.namespace(), "forward-fund-payment");
    }

    #[tokio::test]
    async fn test_positive_total_awaits_payment() {
        let (provider, store) = provider();
        let cart = Cart::new(Uuid::new_v4(), Decimal::from(100));

        let script = provider.get_payment_request(&cart, &CheckoutRequest::new()).await.unwrap();

        let order = latest(&store).await;
        assert_eq!(order.status, OrderStatus::AwaitingPayment);
        assert_eq!(script, format!("$window.location.href=\"/shop/orders/{}/\";", order.id));
    }

    #[tokio::test]
    async fn test_zero_total_confirms_payment() {
        let (provider, store) = provider();
        let cart = Cart::new(Uuid::new_v4(), Decimal::ZERO);

        provider.get_payment_request(&cart, &CheckoutRequest::new()).await.unwrap();

        let order = latest(&store).await;
        // no_payment_required, then acknowledge_prepayment and acknowledge_payment
        assert_eq!(order.status, OrderStatus::PaymentConfirmed);
        assert_eq!(order.version, 4);
    }

    #[tokio::test]
    async fn test_checkout_user_recorded_on_requested_step() {
        let (provider, store) = provider();
        let customer = Uuid::new_v4();
        let request = CheckoutRequest::new().with_user(customer);

        provider
            .get_payment_request(&Cart::new(customer, Decimal::from(30)), &request)
            .await
            .unwrap();

        let order = latest(&store).await;
        let envelopes = store.event_store().load_events(order.id).await.unwrap();
        let users: Vec<_> = envelopes.iter().map(|e| e.user_id).collect();
        assert_eq!(users, vec![None, Some(customer)]);
        assert!(envelopes.iter().all(|e| e.correlation_id == request.correlation_id));
    }

    #[tokio::test]
    async fn test_concurrent_checkouts_get_their_own_url() {
        let (provider, store) = provider();
        let alice = Cart::new(Uuid::new_v4(), Decimal::from(10));
        let bob = Cart::new(Uuid::new_v4(), Decimal::from(20));

        let alice_request = CheckoutRequest::new();
        let bob_request = CheckoutRequest::new();
        let (alice_script, bob_script) = tokio::join!(
            provider.get_payment_request(&alice, &alice_request),
            provider.get_payment_request(&bob, &bob_request),
        );

        let alice_order = store.load(order_id_from(&alice_script.unwrap())).await.unwrap();
        let bob_order = store.load(order_id_from(&bob_script.unwrap())).await.unwrap();
        assert_eq!(alice_order.customer_id, alice.customer_id);
        assert_eq!(bob_order.customer_id, bob.customer_id);
    }

    #[tokio::test]
    async fn test_refused_routing_leaves_no_order() {
        // no pay-in-advance workflow, so awaiting_payment is unknown
        let registry = build_registry(&[WorkflowKind::CommissionGoods], DEFAULT_MAX_CHAIN_DEPTH).unwrap();
        let (provider, store) = provider_with(Arc::new(registry));
        let cart = Cart::new(Uuid::new_v4(), Decimal::from(15));

        assert!(provider.get_payment_request(&cart, &CheckoutRequest::new()).await.is_err());
        assert_eq!(store.event_store().latest_aggregate_id().await, None);
        assert!(store.latest_order_url(cart.customer_id).await.is_err());
    }

    // Records what the provider hands to its collaborators.
    struct RecordingRepository {
        persisted: Mutex<Vec<(OrderStatus, usize)>>,
        asked_for: Mutex<Vec<Uuid>>,
    }

    #[async_trait]
    impl OrderFactory for RecordingRepository {
        async fn create_from_cart(&self, cart: &Cart, _: &CheckoutRequest) -> anyhow::Result<OrderAggregate> {
            OrderAggregate::open(Uuid::nil(), cart.customer_id, cart.total)
                .map_err(anyhow::Error::from)
        }
    }

    #[async_trait]
    impl OrderRepository for RecordingRepository {
        async fn persist(&self, order: &mut OrderAggregate, _: &CheckoutRequest) -> anyhow::Result<i64> {
            let pending = order.take_uncommitted().len();
            self.persisted.lock().await.push((order.status, pending));
            Ok(order.version)
        }

        async fn latest_order_url(&self, customer_id: Uuid) -> anyhow::Result<String> {
            self.asked_for.lock().await.push(customer_id);
            Ok("/thanks/".to_string())
        }
    }

    #[tokio::test]
    async fn test_uses_collaborators() {
        let collaborator = Arc::new(RecordingRepository {
            persisted: Mutex::new(Vec::new()),
            asked_for: Mutex::new(Vec::new()),
        });
        let provider = ForwardFundPayment::new(collaborator.clone(), collaborator.clone(), registry());
        let cart = Cart::new(Uuid::new_v4(), Decimal::from(12));

        let script = provider.get_payment_request(&cart, &CheckoutRequest::new()).await.unwrap();

        assert_eq!(script, "$window.location.href=\"/thanks/\";");
        // created and awaiting_payment go out in a single persist
        assert_eq!(*collaborator.persisted.lock().await, vec![(OrderStatus::AwaitingPayment, 2)]);
        assert_eq!(*collaborator.asked_for.lock().await, vec![cart.customer_id]);
    }

    #[tokio::test]
    async fn test_negative_cart_total_fails() {
        let (provider, store) = provider();
        let cart = Cart::new(Uuid::new_v4(), Decimal::from(-5));

        assert!(provider.get_payment_request(&cart, &CheckoutRequest::new()).await.is_err());
        assert_eq!(store.event_store().latest_aggregate_id().await, None);
    }
}
