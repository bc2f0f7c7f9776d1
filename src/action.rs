//! Action interface and registry.
//!
//! Actions are opaque, externally supplied operations a plan body can call.
//! The registry is built explicitly by whoever sets up the agent population
//! and handed to each agent; there is no process-wide action table.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::agent::AgentId;
use crate::belief::BeliefBase;
use crate::error::{ConfigurationError, InstructionError};
use crate::fuzzy::FuzzyValue;
use crate::term::{Literal, Term};
use crate::unify::Substitution;

/// What an action may touch while it runs.
#[derive(Debug)]
pub struct ActionContext<'a> {
    pub agent: AgentId,
    /// The calling agent's belief base. Mutations queue events as usual.
    pub beliefs: &'a mut BeliefBase,
    /// Bindings of the calling frame, read-only.
    pub bindings: &'a Substitution,
}

/// A callable action.
///
/// Expected failure is reported through the returned degree. An `Err` is
/// for malformed calls, such as arguments of the wrong type.
pub trait Action: Send + Sync {
    /// Name under which plans call the action.
    fn name(&self) -> &str;

    /// Fewest arguments the action accepts.
    fn minimal_arguments(&self) -> usize {
        0
    }

    /// Runs the action. Ground arguments come in, results go into `returns`.
    ///
    /// # Errors
    ///
    /// Returns an `InstructionError` for calls that cannot be executed at all.
    fn execute(
        &self,
        context: &mut ActionContext<'_>,
        parallel: bool,
        arguments: &[Term],
        returns: &mut Vec<Term>,
        annotations: &[Literal],
    ) -> Result<FuzzyValue<bool>, InstructionError>;
}

type ActionFn = dyn Fn(&mut ActionContext<'_>, &[Term], &mut Vec<Term>) -> Result<FuzzyValue<bool>, InstructionError>
    + Send
    + Sync;

/// Adapts a closure into an [`Action`].
///
/// # Examples
///
/// ```
/// use bdi_engine::{ActionRegistry, FnAction, FuzzyValue, Term};
///
/// let sum = FnAction::new("sum", 1, |_, args, returns| {
///     let total: f64 = args.iter().filter_map(Term::as_number).sum();
///     returns.push(Term::number(total));
///     Ok(FuzzyValue::success())
/// });
/// let registry = ActionRegistry::new().with(sum).unwrap();
/// assert!(registry.contains("sum"));
/// ```
pub struct FnAction {
    name: String,
    minimal_arguments: usize,
    function: Box<ActionFn>,
}

impl FnAction {
    pub fn new<F>(name: impl Into<String>, minimal_arguments: usize, function: F) -> Self
    where
        F: Fn(&mut ActionContext<'_>, &[Term], &mut Vec<Term>) -> Result<FuzzyValue<bool>, InstructionError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            minimal_arguments,
            function: Box::new(function),
        }
    }
}

impl fmt::Debug for FnAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAction")
            .field("name", &self.name)
            .field("minimal_arguments", &self.minimal_arguments)
            .finish_non_exhaustive()
    }
}

impl Action for FnAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn minimal_arguments(&self) -> usize {
        self.minimal_arguments
    }

    fn execute(
        &self,
        context: &mut ActionContext<'_>,
        _parallel: bool,
        arguments: &[Term],
        returns: &mut Vec<Term>,
        _annotations: &[Literal],
    ) -> Result<FuzzyValue<bool>, InstructionError> {
        (self.function)(context, arguments, returns)
    }
}

/// Name-indexed set of actions shared by a population of agents.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::DuplicateAction` if the name is taken.
    pub fn register(&mut self, action: impl Action + 'static) -> Result<(), ConfigurationError> {
        let name = action.name().to_string();
        if self.actions.contains_key(&name) {
            return Err(ConfigurationError::DuplicateAction { name });
        }
        self.actions.insert(name, Arc::new(action));
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::DuplicateAction` if the name is taken.
    pub fn with(mut self, action: impl Action + 'static) -> Result<Self, ConfigurationError> {
        self.register(action)?;
        Ok(self)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}
