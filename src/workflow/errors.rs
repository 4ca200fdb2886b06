// ============================================================================
// Workflow Errors
// ============================================================================

/// Why a transition was refused for the entity's current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotAllowedReason {
    /// Current state is not one of the transition's source states
    SourceMismatch,
    /// A guard evaluated to false
    ConditionFailed(String),
}

impl std::fmt::Display for NotAllowedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceMismatch => write!(f, "state is not a source of this transition"),
            Self::ConditionFailed(guard) => write!(f, "condition '{}' not met", guard),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Unknown transition: {0}")]
    UnknownTransition(String),

    #[error("Transition '{transition}' not allowed from state '{state}': {reason}")]
    TransitionNotAllowed {
        transition: String,
        state: String,
        reason: NotAllowedReason,
    },

    #[error("Transition '{0}' is automatic and cannot be triggered manually")]
    AutoTransitionNotManual(String),

    #[error("Transition chain exceeded {0} steps")]
    ChainTooLong(usize),

    #[error("Transition '{0}' is already registered")]
    DuplicateTransition(String),

    #[error("Transition '{transition}' invokes unknown transition '{target}'")]
    UnknownEffectTarget { transition: String, target: String },

    #[error("Transition '{0}' has neither a target state nor a side effect")]
    EmptyTransition(String),

    #[error("Cyclic transition chain through '{0}'")]
    CyclicChain(String),
}

impl TransitionError {
    /// True for refusals caused by the entity's current data, as opposed to
    /// registry misconfiguration.
    pub fn is_not_allowed(&self) -> bool {
        matches!(
            self,
            Self::TransitionNotAllowed { .. } | Self::AutoTransitionNotManual(_)
        )
    }

    /// Short label used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::UnknownTransition(_) => "unknown_transition",
            Self::TransitionNotAllowed {
                reason: NotAllowedReason::SourceMismatch,
                ..
            } => "source_mismatch",
            Self::TransitionNotAllowed {
                reason: NotAllowedReason::ConditionFailed(_),
                ..
            } => "condition_failed",
            Self::AutoTransitionNotManual(_) => "auto_only",
            Self::ChainTooLong(_) => "chain_too_long",
            Self::DuplicateTransition(_)
            | Self::UnknownEffectTarget { .. }
            | Self::EmptyTransition(_)
            | Self::CyclicChain(_) => "misconfigured",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_allowed_message_names_guard() {
        let err = TransitionError::TransitionNotAllowed {
            transition: "prepayment_fully_deposited".to_string(),
            state: "awaiting_payment".to_string(),
            reason: NotAllowedReason::ConditionFailed("is_fully_paid".to_string()),
        };

        let message = err.to_string();
        assert!(message.contains("prepayment_fully_deposited"));
        assert!(message.contains("is_fully_paid"));
        assert!(err.is_not_allowed());
        assert_eq!(err.reason(), "condition_failed");
    }

    #[test]
    fn test_configuration_errors_are_not_refusals() {
        assert!(!TransitionError::CyclicChain("a".into()).is_not_allowed());
        assert_eq!(TransitionError::EmptyTransition("a".into()).reason(), "misconfigured");
    }
}
