use std::sync::Arc;

use rust_decimal::Decimal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use shop_workflow::config::ShopConfig;
use shop_workflow::domain::order::{
    build_registry, transitions::*, OrderCommand, OrderCommandHandler, OrderStore,
};
use shop_workflow::event_sourcing::EventStore;
use shop_workflow::metrics::Metrics;
use shop_workflow::payment::{Cart, CheckoutRequest, ForwardFundPayment, PaymentProvider};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional first argument: path to a TOML config file
    let config = match std::env::args().nth(1) {
        Some(path) => ShopConfig::from_file(&path)?,
        None => ShopConfig::default(),
    };

    // RUST_LOG overrides the configured filter
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
        )
        .init();

    tracing::info!(workflows = ?config.workflows, "Starting shop order workflow demo");

    // === 1. Workflow registry ===
    let registry = Arc::new(build_registry(&config.workflows, config.max_chain_depth)?);

    // === 2. Metrics and storage ===
    let metrics = Arc::new(Metrics::new()?);
    let orders = Arc::new(OrderStore::new(
        Arc::new(EventStore::new("Order")),
        metrics.clone(),
        &config.order_url_prefix,
    ));
    let handler = OrderCommandHandler::new(orders.clone(), registry.clone(), metrics.clone())
        .with_retry(config.retry_config());

    // === 3. Checkout through the forward fund provider ===
    let provider = ForwardFundPayment::new(orders.clone(), orders.clone(), registry.clone());
    let customer_id = Uuid::new_v4();
    let checkout = CheckoutRequest::new().with_user(customer_id);

    let script = provider
        .get_payment_request(&Cart::new(customer_id, Decimal::from(100)), &checkout)
        .await?;
    let paid_order = orders
        .event_store()
        .latest_aggregate_id()
        .await
        .ok_or_else(|| anyhow::anyhow!("checkout did not create an order"))?;
    tracing::info!(order_id = %paid_order, %script, "Checkout complete");

    let free_script = provider
        .get_payment_request(&Cart::new(customer_id, Decimal::ZERO), &checkout)
        .await?;
    let free_order_id = orders
        .event_store()
        .latest_aggregate_id()
        .await
        .ok_or_else(|| anyhow::anyhow!("checkout did not create an order"))?;
    let free_order = handler.load(free_order_id).await?;
    tracing::info!(
        order_id = %free_order.id,
        status = %free_order.status_label(&registry),
        script = %free_script,
        "Zero-total checkout complete"
    );

    // === 4. Payments and admin actions ===
    let admin = Uuid::new_v4();
    let correlation_id = Uuid::new_v4();

    handler
        .handle(
            paid_order,
            OrderCommand::RecordPayment {
                amount: Decimal::from(40),
                reference: Some("transfer 1/2".to_string()),
            },
            correlation_id,
        )
        .await?;
    log_admin_actions(&handler, paid_order).await?;

    // Too early: the order is not fully paid yet
    if let Err(e) = handler
        .handle(paid_order, OrderCommand::transition_by(PREPAYMENT_FULLY_DEPOSITED, admin), correlation_id)
        .await
    {
        tracing::info!(error = %e, "Refused as expected");
    }

    handler
        .handle(paid_order, OrderCommand::transition_by(PREPAYMENT_PARTIALLY_DEPOSITED, admin), correlation_id)
        .await?;
    handler
        .handle(
            paid_order,
            OrderCommand::RecordPayment {
                amount: Decimal::from(60),
                reference: Some("transfer 2/2".to_string()),
            },
            correlation_id,
        )
        .await?;
    log_admin_actions(&handler, paid_order).await?;

    handler
        .handle(paid_order, OrderCommand::transition_by(PREPAYMENT_FULLY_DEPOSITED, admin), correlation_id)
        .await?;

    // === 5. Commission the goods ===
    if registry.get(PICK_GOODS).is_some() {
        handler
            .handle(paid_order, OrderCommand::transition_by(PICK_GOODS, admin), correlation_id)
            .await?;
        handler
            .handle(paid_order, OrderCommand::transition_by(PACK_GOODS, admin), correlation_id)
            .await?;
    }

    let order = handler.load(paid_order).await?;
    tracing::info!(
        order_id = %order.id,
        status = %order.status_label(&registry),
        amount_paid = %order.amount_paid,
        version = order.version,
        url = %orders.order_url(order.id),
        "Demo complete"
    );

    println!("{}", metrics.render()?);

    Ok(())
}

async fn log_admin_actions(handler: &OrderCommandHandler, order_id: Uuid) -> anyhow::Result<()> {
    for (transition, button) in handler.available_admin_actions(order_id).await? {
        tracing::info!(order_id = %order_id, transition, button, "Admin action available");
    }
    Ok(())
}
