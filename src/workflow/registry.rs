use std::collections::{HashMap, HashSet};

use super::errors::{NotAllowedReason, TransitionError};
use super::transition::{Effect, Transition, TriggerMode, WorkflowState};

// ============================================================================
// Transition Registry - Guard Evaluation & Chain Planning
// ============================================================================
//
// Planning is pure: `plan` never mutates the entity. It returns the ordered
// steps (requested transition, its invoked dependents, then every automatic
// transition reachable from the resulting state) or the first refusal.
//
// ============================================================================

pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 8;

/// One fired transition inside a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step<S> {
    pub transition: &'static str,
    pub from: S,
    pub to: S,
    pub trigger: TriggerMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan<S> {
    start: S,
    steps: Vec<Step<S>>,
}

impl<S: WorkflowState> TransitionPlan<S> {
    pub fn start(&self) -> S {
        self.start
    }

    pub fn steps(&self) -> &[Step<S>] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<Step<S>> {
        self.steps
    }

    pub fn final_state(&self) -> S {
        self.steps.last().map_or(self.start, |step| step.to)
    }

    pub fn fired(&self, transition: &str) -> bool {
        self.steps.iter().any(|step| step.transition == transition)
    }
}

pub struct TransitionRegistry<S, M> {
    transitions: HashMap<&'static str, Transition<S, M>>,
    // registration order, so auto transitions and admin buttons are deterministic
    order: Vec<&'static str>,
    labels: HashMap<S, &'static str>,
    max_chain_depth: usize,
}

impl<S: WorkflowState, M> Default for TransitionRegistry<S, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: WorkflowState, M> TransitionRegistry<S, M> {
    pub fn new() -> Self {
        Self {
            transitions: HashMap::new(),
            order: Vec::new(),
            labels: HashMap::new(),
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }

    pub fn with_max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth;
        self
    }

    pub fn max_chain_depth(&self) -> usize {
        self.max_chain_depth
    }

    pub fn register(&mut self, transition: Transition<S, M>) -> Result<(), TransitionError> {
        if self.transitions.contains_key(transition.name) {
            return Err(TransitionError::DuplicateTransition(transition.name.to_string()));
        }

        tracing::trace!(transition = transition.name, "Registered transition");
        self.order.push(transition.name);
        self.transitions.insert(transition.name, transition);
        Ok(())
    }

    pub fn add_label(&mut self, state: S, label: &'static str) {
        self.labels.insert(state, label);
    }

    /// Human-readable label contributed by a workflow for `state`.
    pub fn label(&self, state: S) -> Option<&'static str> {
        self.labels.get(&state).copied()
    }

    pub fn get(&self, name: &str) -> Option<&Transition<S, M>> {
        self.transitions.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.order.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn lookup(&self, name: &str) -> Result<&Transition<S, M>, TransitionError> {
        self.transitions
            .get(name)
            .ok_or_else(|| TransitionError::UnknownTransition(name.to_string()))
    }

    fn in_order(&self) -> impl Iterator<Item = &Transition<S, M>> + '_ {
        self.order.iter().filter_map(|name| self.transitions.get(name))
    }

    pub fn auto_transitions_from(&self, state: S) -> impl Iterator<Item = &Transition<S, M>> + '_ {
        self.in_order()
            .filter(move |t| t.trigger.is_auto() && t.accepts(&state))
    }

    /// Admin actions that could fire right now: source matches and all
    /// guards hold.
    pub fn available_admin_transitions(&self, entity: &M, current: S) -> Vec<&Transition<S, M>> {
        self.in_order()
            .filter(|t| t.trigger.button_name().is_some())
            .filter(|t| t.accepts(&current) && t.failing_guard(entity).is_none())
            .collect()
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Check the registry is well formed: every effect names a registered
    /// transition, no transition is a no-op, neither invoke chains nor
    /// automatic transitions can loop, and no request can fire more steps
    /// than `max_chain_depth` allows.
    pub fn validate(&self) -> Result<(), TransitionError> {
        for transition in self.in_order() {
            if transition.target.is_none() && transition.effects.is_empty() {
                return Err(TransitionError::EmptyTransition(transition.name.to_string()));
            }

            for &Effect::Invoke(target) in &transition.effects {
                if !self.transitions.contains_key(target) {
                    return Err(TransitionError::UnknownEffectTarget {
                        transition: transition.name.to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }

        let mut done = HashSet::new();
        for &name in &self.order {
            self.check_invoke_cycle(name, &mut Vec::new(), &mut done)?;
        }

        let auto_sources: HashSet<S> = self
            .in_order()
            .filter(|t| t.trigger.is_auto())
            .flat_map(|t| t.sources.iter().copied())
            .collect();

        for state in auto_sources {
            if let Some(name) = self.find_auto_cycle(state, &mut vec![state]) {
                return Err(TransitionError::CyclicChain(name.to_string()));
            }
        }

        let longest = self.longest_chain();
        if longest > self.max_chain_depth {
            tracing::warn!(
                longest,
                max_chain_depth = self.max_chain_depth,
                "Transition chain exceeds the configured depth"
            );
            return Err(TransitionError::ChainTooLong(self.max_chain_depth));
        }

        Ok(())
    }

    /// Most steps a single request can fire, assuming every guard holds.
    ///
    /// Only meaningful once invoke and auto cycles are ruled out.
    pub fn longest_chain(&self) -> usize {
        self.in_order()
            .filter(|t| !t.trigger.is_auto())
            .flat_map(|t| {
                t.sources
                    .iter()
                    .map(move |&state| self.static_steps(t) + self.longest_settle(self.static_outcome(t, state)))
            })
            .max()
            .unwrap_or(0)
    }

    fn static_steps(&self, transition: &Transition<S, M>) -> usize {
        let mut steps = 1;
        for &Effect::Invoke(target) in &transition.effects {
            if let Some(dependent) = self.transitions.get(target) {
                steps += self.static_steps(dependent);
            }
        }
        steps
    }

    fn longest_settle(&self, state: S) -> usize {
        self.auto_transitions_from(state)
            .map(|auto| self.static_steps(auto) + self.longest_settle(self.static_outcome(auto, state)))
            .max()
            .unwrap_or(0)
    }

    fn check_invoke_cycle(
        &self,
        name: &'static str,
        path: &mut Vec<&'static str>,
        done: &mut HashSet<&'static str>,
    ) -> Result<(), TransitionError> {
        if path.contains(&name) {
            return Err(TransitionError::CyclicChain(name.to_string()));
        }
        if done.contains(name) {
            return Ok(());
        }

        path.push(name);
        if let Some(transition) = self.transitions.get(name) {
            for &Effect::Invoke(target) in &transition.effects {
                self.check_invoke_cycle(target, path, done)?;
            }
        }
        path.pop();
        done.insert(name);
        Ok(())
    }

    /// State reached by firing `transition` and its effects from `state`,
    /// ignoring guards. Only called after invoke chains are known acyclic.
    fn static_outcome(&self, transition: &Transition<S, M>, state: S) -> S {
        let mut current = transition.target_from(state);
        for &Effect::Invoke(target) in &transition.effects {
            if let Some(dependent) = self.transitions.get(target) {
                current = self.static_outcome(dependent, current);
            }
        }
        current
    }

    fn find_auto_cycle(&self, state: S, path: &mut Vec<S>) -> Option<&'static str> {
        for auto in self.auto_transitions_from(state) {
            let next = self.static_outcome(auto, state);
            if path.contains(&next) {
                return Some(auto.name);
            }

            path.push(next);
            let found = self.find_auto_cycle(next, path);
            path.pop();

            if found.is_some() {
                return found;
            }
        }
        None
    }

    // ------------------------------------------------------------------------
    // Planning
    // ------------------------------------------------------------------------

    /// Evaluate firing `name` on `entity` currently in `current`.
    pub fn plan(&self, entity: &M, current: S, name: &str) -> Result<TransitionPlan<S>, TransitionError> {
        let transition = self.lookup(name)?;
        if transition.trigger.is_auto() {
            return Err(TransitionError::AutoTransitionNotManual(name.to_string()));
        }

        let mut steps = Vec::new();
        let state = self.fire(entity, current, transition, &mut steps, &mut Vec::new())?;
        self.settle(entity, state, &mut steps)?;

        tracing::debug!(
            transition = name,
            from = %current,
            steps = steps.len(),
            "Planned transition"
        );

        Ok(TransitionPlan {
            start: current,
            steps,
        })
    }

    fn fire(
        &self,
        entity: &M,
        current: S,
        transition: &Transition<S, M>,
        steps: &mut Vec<Step<S>>,
        stack: &mut Vec<&'static str>,
    ) -> Result<S, TransitionError> {
        if !transition.accepts(&current) {
            return Err(TransitionError::TransitionNotAllowed {
                transition: transition.name.to_string(),
                state: current.to_string(),
                reason: NotAllowedReason::SourceMismatch,
            });
        }

        if let Some(guard) = transition.failing_guard(entity) {
            return Err(TransitionError::TransitionNotAllowed {
                transition: transition.name.to_string(),
                state: current.to_string(),
                reason: NotAllowedReason::ConditionFailed(guard.name.to_string()),
            });
        }

        if steps.len() >= self.max_chain_depth {
            return Err(TransitionError::ChainTooLong(self.max_chain_depth));
        }

        if stack.contains(&transition.name) {
            return Err(TransitionError::CyclicChain(transition.name.to_string()));
        }

        let to = transition.target_from(current);
        steps.push(Step {
            transition: transition.name,
            from: current,
            to,
            trigger: transition.trigger,
        });

        stack.push(transition.name);
        let mut state = to;
        for &Effect::Invoke(target) in &transition.effects {
            let dependent = self.lookup(target)?;
            state = self.fire(entity, state, dependent, steps, stack)?;
        }
        stack.pop();

        Ok(state)
    }

    /// Fire automatic transitions until none applies.
    fn settle(&self, entity: &M, mut state: S, steps: &mut Vec<Step<S>>) -> Result<S, TransitionError> {
        let mut fired = HashSet::new();

        loop {
            let next = self
                .auto_transitions_from(state)
                .find(|t| t.failing_guard(entity).is_none());

            let Some(auto) = next else {
                return Ok(state);
            };

            if !fired.insert((auto.name, state)) {
                return Err(TransitionError::CyclicChain(auto.name.to_string()));
            }

            state = self.fire(entity, state, auto, steps, &mut Vec::new())?;
        }
    }
}
