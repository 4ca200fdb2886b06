use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Order Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    AwaitingPayment,
    PrepaymentDeposited,
    NoPaymentRequired,
    PaymentConfirmed,
    PickGoods,
    PackGoods,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Created,
        OrderStatus::AwaitingPayment,
        OrderStatus::PrepaymentDeposited,
        OrderStatus::NoPaymentRequired,
        OrderStatus::PaymentConfirmed,
        OrderStatus::PickGoods,
        OrderStatus::PackGoods,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AwaitingPayment => "awaiting_payment",
            Self::PrepaymentDeposited => "prepayment_deposited",
            Self::NoPaymentRequired => "no_payment_required",
            Self::PaymentConfirmed => "payment_confirmed",
            Self::PickGoods => "pick_goods",
            Self::PackGoods => "pack_goods",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// A payment received against an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub amount: Decimal,
    pub reference: Option<String>,
    pub received_at: DateTime<Utc>,
}

// ============================================================================
// Unit Tests
// ============================================================================
