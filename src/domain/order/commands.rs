use uuid::Uuid;
use rust_decimal::Decimal;

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone)]
pub enum OrderCommand {
    CreateOrder {
        order_id: Uuid,
        customer_id: Uuid,
        total: Decimal,
    },
    RecordPayment {
        amount: Decimal,
        reference: Option<String>,
    },
    /// Fire a named workflow transition; `by` is the acting admin user.
    Transition {
        name: String,
        by: Option<Uuid>,
    },
}

impl OrderCommand {
    pub fn transition(name: &str) -> Self {
        Self::Transition {
            name: name.to_string(),
            by: None,
        }
    }

    pub fn transition_by(name: &str, by: Uuid) -> Self {
        Self::Transition {
            name: name.to_string(),
            by: Some(by),
        }
    }
}
