use serde::{Deserialize, Serialize};

use crate::workflow::{Transition, TransitionError, TransitionRegistry};
use super::aggregate::OrderAggregate;
use super::value_objects::OrderStatus;

// ============================================================================
// Order Workflows - Pluggable Transition Bundles
// ============================================================================
//
// A workflow contributes transitions and status labels to the order's
// registry. The base workflow is always installed; the others are enabled
// through `ShopConfig::workflows`.
//
// ============================================================================

pub type OrderRegistry = TransitionRegistry<OrderStatus, OrderAggregate>;
pub type OrderTransition = Transition<OrderStatus, OrderAggregate>;

/// Transition names, for callers that fire them programmatically.
pub mod transitions {
    pub const ACKNOWLEDGE_PAYMENT: &str = "acknowledge_payment";
    pub const NO_PAYMENT_REQUIRED: &str = "no_payment_required";
    pub const AWAITING_PAYMENT: &str = "awaiting_payment";
    pub const PREPAYMENT_PARTIALLY_DEPOSITED: &str = "prepayment_partially_deposited";
    pub const PREPAYMENT_FULLY_DEPOSITED: &str = "prepayment_fully_deposited";
    pub const ACKNOWLEDGE_PREPAYMENT: &str = "acknowledge_prepayment";
    pub const PICK_GOODS: &str = "pick_goods";
    pub const PACK_GOODS: &str = "pack_goods";
}

use transitions::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    PayInAdvance,
    CommissionGoods,
}

impl WorkflowKind {
    pub fn workflow(&self) -> Box<dyn OrderWorkflow> {
        match self {
            Self::PayInAdvance => Box::new(PayInAdvanceWorkflow),
            Self::CommissionGoods => Box::new(CommissionGoodsWorkflow),
        }
    }
}

pub trait OrderWorkflow: Send + Sync {
    fn name(&self) -> &'static str;

    /// Labels for the statuses this workflow moves orders into.
    fn transition_targets(&self) -> &'static [(OrderStatus, &'static str)];

    fn transitions(&self) -> Vec<OrderTransition>;

    fn install(&self, registry: &mut OrderRegistry) -> Result<(), TransitionError> {
        for transition in self.transitions() {
            registry.register(transition)?;
        }
        for &(status, label) in self.transition_targets() {
            registry.add_label(status, label);
        }
        tracing::debug!(workflow = self.name(), "Installed order workflow");
        Ok(())
    }
}

// ============================================================================
// Base Workflow
// ============================================================================

pub struct BaseOrderWorkflow;

impl OrderWorkflow for BaseOrderWorkflow {
    fn name(&self) -> &'static str {
        "base"
    }

    fn transition_targets(&self) -> &'static [(OrderStatus, &'static str)] {
        &[
            (OrderStatus::Created, "Order created"),
            (OrderStatus::PaymentConfirmed, "Payment confirmed"),
        ]
    }

    fn transitions(&self) -> Vec<OrderTransition> {
        vec![Transition::new(ACKNOWLEDGE_PAYMENT)
            .from_states([OrderStatus::PrepaymentDeposited, OrderStatus::NoPaymentRequired])
            .to(OrderStatus::PaymentConfirmed)
            .guard("is_fully_paid", OrderAggregate::is_fully_paid)]
    }
}

// ============================================================================
// Pay In Advance - forward fund payments
// ============================================================================

pub struct PayInAdvanceWorkflow;

impl OrderWorkflow for PayInAdvanceWorkflow {
    fn name(&self) -> &'static str {
        "pay_in_advance"
    }

    fn transition_targets(&self) -> &'static [(OrderStatus, &'static str)] {
        &[
            (OrderStatus::AwaitingPayment, "Awaiting a forward fund payment"),
            (OrderStatus::PrepaymentDeposited, "Prepayment deposited"),
            (OrderStatus::NoPaymentRequired, "No Payment Required"),
        ]
    }

    fn transitions(&self) -> Vec<OrderTransition> {
        vec![
            // The order can proceed directly, confirming a payment of zero.
            Transition::new(NO_PAYMENT_REQUIRED)
                .from_states([OrderStatus::Created])
                .to(OrderStatus::NoPaymentRequired),
            Transition::new(AWAITING_PAYMENT)
                .from_states([OrderStatus::Created])
                .to(OrderStatus::AwaitingPayment),
            Transition::new(PREPAYMENT_PARTIALLY_DEPOSITED)
                .from_states([OrderStatus::AwaitingPayment])
                .to(OrderStatus::AwaitingPayment)
                .guard("deposited_too_little", OrderAggregate::deposited_too_little)
                .admin("Deposited too little"),
            Transition::new(PREPAYMENT_FULLY_DEPOSITED)
                .from_states([OrderStatus::AwaitingPayment])
                .to(OrderStatus::PrepaymentDeposited)
                .guard("is_fully_paid", OrderAggregate::is_fully_paid)
                .admin("Mark as Paid"),
            Transition::new(ACKNOWLEDGE_PREPAYMENT)
                .from_states([OrderStatus::PrepaymentDeposited, OrderStatus::NoPaymentRequired])
                .auto()
                .invoke(ACKNOWLEDGE_PAYMENT),
        ]
    }
}

// ============================================================================
// Commission Goods - picking and packing for delivery
// ============================================================================

pub struct CommissionGoodsWorkflow;

impl OrderWorkflow for CommissionGoodsWorkflow {
    fn name(&self) -> &'static str {
        "commission_goods"
    }

    fn transition_targets(&self) -> &'static [(OrderStatus, &'static str)] {
        &[
            (OrderStatus::PickGoods, "Picking goods"),
            (OrderStatus::PackGoods, "Packing goods"),
        ]
    }

    fn transitions(&self) -> Vec<OrderTransition> {
        vec![
            Transition::new(PICK_GOODS)
                .from_states([OrderStatus::PaymentConfirmed])
                .to(OrderStatus::PickGoods)
                .admin("Pick the goods"),
            Transition::new(PACK_GOODS)
                .from_states([OrderStatus::PickGoods])
                .to(OrderStatus::PackGoods)
                .admin("Pack the goods"),
        ]
    }
}

/// Build and validate the registry for the base workflow plus `enabled`.
pub fn build_registry(
    enabled: &[WorkflowKind],
    max_chain_depth: usize,
) -> Result<OrderRegistry, TransitionError> {
    let mut registry = OrderRegistry::new().with_max_chain_depth(max_chain_depth);
    BaseOrderWorkflow.install(&mut registry)?;

    let mut installed = Vec::new();
    for kind in enabled {
        if installed.contains(kind) {
            tracing::warn!(workflow = ?kind, "Workflow listed twice, ignoring duplicate");
            continue;
        }
        kind.workflow().install(&mut registry)?;
        installed.push(*kind);
    }

    registry.validate()?;

    tracing::info!(
        workflows = ?installed,
        transitions = registry.len(),
        "Order workflow registry ready"
    );

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::DEFAULT_MAX_CHAIN_DEPTH;

    fn all_workflows() -> OrderRegistry {
        build_registry(
            &[WorkflowKind::PayInAdvance, WorkflowKind::CommissionGoods],
            DEFAULT_MAX_CHAIN_DEPTH,
        )
        .unwrap()
    }

    #[test]
    fn test_registry_contains_every_transition() {
        let registry = all_workflows();
        let names: Vec<_> = registry.names().collect();

        assert_eq!(
            names,
            vec![
                ACKNOWLEDGE_PAYMENT,
                NO_PAYMENT_REQUIRED,
                AWAITING_PAYMENT,
                PREPAYMENT_PARTIALLY_DEPOSITED,
                PREPAYMENT_FULLY_DEPOSITED,
                ACKNOWLEDGE_PREPAYMENT,
                PICK_GOODS,
                PACK_GOODS,
            ]
        );
    }

    #[test]
    fn test_acknowledge_prepayment_is_the_only_auto_transition() {
        let registry = all_workflows();

        for status in OrderStatus::ALL {
            let autos: Vec<_> = registry.auto_transitions_from(status).map(|t| t.name).collect();
            match status {
                OrderStatus::PrepaymentDeposited | OrderStatus::NoPaymentRequired => {
                    assert_eq!(autos, vec![ACKNOWLEDGE_PREPAYMENT])
                }
                _ => assert!(autos.is_empty(), "unexpected auto transition from {}", status),
            }
        }
    }

    #[test]
    fn test_labels_merged_from_workflows() {
        let registry = all_workflows();

        assert_eq!(
            registry.label(OrderStatus::AwaitingPayment),
            Some("Awaiting a forward fund payment")
        );
        assert_eq!(registry.label(OrderStatus::PackGoods), Some("Packing goods"));
        assert_eq!(registry.label(OrderStatus::PaymentConfirmed), Some("Payment confirmed"));
    }

    #[test]
    fn test_commission_goods_alone_has_no_payment_transitions() {
        let registry = build_registry(&[WorkflowKind::CommissionGoods], DEFAULT_MAX_CHAIN_DEPTH).unwrap();

        assert!(registry.get(AWAITING_PAYMENT).is_none());
        assert!(registry.get(PICK_GOODS).is_some());
        assert_eq!(registry.label(OrderStatus::AwaitingPayment), None);
    }

    #[test]
    fn test_depth_too_small_for_prepayment_chain() {
        // no_payment_required, acknowledge_prepayment, acknowledge_payment
        assert_eq!(all_workflows().longest_chain(), 3);
        assert!(matches!(
            build_registry(&[WorkflowKind::PayInAdvance], 2),
            Err(TransitionError::ChainTooLong(2))
        ));
        assert!(build_registry(&[WorkflowKind::PayInAdvance], 3).is_ok());
    }

    #[test]
    fn test_duplicate_workflow_is_ignored() {
        let registry = build_registry(
            &[WorkflowKind::PayInAdvance, WorkflowKind::PayInAdvance],
            DEFAULT_MAX_CHAIN_DEPTH,
        )
        .unwrap();

        assert_eq!(registry.len(), 6);
    }

    #[test]
    fn test_admin_buttons() {
        let registry = all_workflows();

        let button = |name: &str| registry.get(name).and_then(|t| t.trigger.button_name());

        assert_eq!(button(PREPAYMENT_PARTIALLY_DEPOSITED), Some("Deposited too little"));
        assert_eq!(button(PREPAYMENT_FULLY_DEPOSITED), Some("Mark as Paid"));
        assert_eq!(button(PICK_GOODS), Some("Pick the goods"));
        assert_eq!(button(PACK_GOODS), Some("Pack the goods"));
        assert_eq!(button(AWAITING_PAYMENT), None);
    }
}
