use std::collections::HashSet;
use std::fmt::{Debug, Display};
use std::hash::Hash;

// ============================================================================
// Transition Declarations
// ============================================================================

/// Marker for anything usable as a workflow state.
pub trait WorkflowState: Copy + Eq + Hash + Debug + Display + Send + Sync + 'static {}

impl<T> WorkflowState for T where T: Copy + Eq + Hash + Debug + Display + Send + Sync + 'static {}

/// Named boolean precondition over the entity.
pub struct Guard<M> {
    pub name: &'static str,
    pub check: fn(&M) -> bool,
}

impl<M> Guard<M> {
    pub fn new(name: &'static str, check: fn(&M) -> bool) -> Self {
        Self { name, check }
    }

    pub fn holds(&self, entity: &M) -> bool {
        (self.check)(entity)
    }
}

impl<M> Clone for Guard<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            check: self.check,
        }
    }
}

impl<M> Debug for Guard<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Guard").field(&self.name).finish()
    }
}

/// Side effect run after a transition lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Fire another registered transition from the resulting state
    Invoke(&'static str),
}

/// Who is allowed to trigger a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// Invoked explicitly by code (e.g. a payment provider)
    Manual,
    /// Invoked explicitly, and offered as a button in the admin backend
    Admin { button_name: &'static str },
    /// Fired by the engine whenever the entity reaches a source state
    Auto,
}

impl TriggerMode {
    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }

    pub fn button_name(&self) -> Option<&'static str> {
        match self {
            Self::Admin { button_name } => Some(*button_name),
            _ => None,
        }
    }
}

/// A guarded edge `sources -> target`.
///
/// A transition without a target leaves the state unchanged and is only
/// useful for its effects.
#[derive(Debug, Clone)]
pub struct Transition<S, M> {
    pub name: &'static str,
    pub sources: HashSet<S>,
    pub target: Option<S>,
    pub guards: Vec<Guard<M>>,
    pub trigger: TriggerMode,
    pub effects: Vec<Effect>,
}

impl<S: WorkflowState, M> Transition<S, M> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            sources: HashSet::new(),
            target: None,
            guards: Vec::new(),
            trigger: TriggerMode::Manual,
            effects: Vec::new(),
        }
    }

    pub fn from_states(mut self, sources: impl IntoIterator<Item = S>) -> Self {
        self.sources.extend(sources);
        self
    }

    pub fn to(mut self, target: S) -> Self {
        self.target = Some(target);
        self
    }

    pub fn guard(mut self, name: &'static str, check: fn(&M) -> bool) -> Self {
        self.guards.push(Guard::new(name, check));
        self
    }

    pub fn admin(mut self, button_name: &'static str) -> Self {
        self.trigger = TriggerMode::Admin { button_name };
        self
    }

    pub fn auto(mut self) -> Self {
        self.trigger = TriggerMode::Auto;
        self
    }

    pub fn invoke(mut self, transition: &'static str) -> Self {
        self.effects.push(Effect::Invoke(transition));
        self
    }

    pub fn accepts(&self, state: &S) -> bool {
        self.sources.contains(state)
    }

    /// First guard that does not hold for `entity`, if any.
    pub fn failing_guard(&self, entity: &M) -> Option<&Guard<M>> {
        self.guards.iter().find(|guard| !guard.holds(entity))
    }

    /// Resulting state when fired from `current`, ignoring effects.
    pub fn target_from(&self, current: S) -> S {
        self.target.unwrap_or(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Light {
        Red,
        Green,
    }

    impl Display for Light {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    struct Crossing {
        cars_waiting: u32,
    }

    #[test]
    fn test_builder_collects_declaration() {
        let transition: Transition<Light, Crossing> = Transition::new("go")
            .from_states([Light::Red])
            .to(Light::Green)
            .guard("cars_waiting", |c: &Crossing| c.cars_waiting > 0)
            .admin("Go");

        assert!(transition.accepts(&Light::Red));
        assert!(!transition.accepts(&Light::Green));
        assert_eq!(transition.target_from(Light::Red), Light::Green);
        assert_eq!(transition.trigger.button_name(), Some("Go"));
        assert!(!transition.trigger.is_auto());
    }

    #[test]
    fn test_failing_guard_reports_first_failure() {
        let transition: Transition<Light, Crossing> = Transition::new("go")
            .from_states([Light::Red])
            .guard("cars_waiting", |c: &Crossing| c.cars_waiting > 0)
            .guard("few_cars", |c| c.cars_waiting < 10);

        let empty = Crossing { cars_waiting: 0 };
        let busy = Crossing { cars_waiting: 3 };

        assert_eq!(transition.failing_guard(&empty).map(|g| g.name), Some("cars_waiting"));
        assert!(transition.failing_guard(&busy).is_none());
    }

    #[test]
    fn test_untargeted_transition_keeps_state() {
        let transition: Transition<Light, Crossing> = Transition::new("honk")
            .from_states([Light::Red])
            .auto()
            .invoke("go");

        assert_eq!(transition.target_from(Light::Red), Light::Red);
        assert_eq!(transition.effects, vec![Effect::Invoke("go")]);
        assert!(transition.trigger.is_auto());
    }
}
