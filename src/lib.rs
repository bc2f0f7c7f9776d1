//! # bdi-engine - A Reasoning Engine for BDI Agents
//!
//! The engine runs Belief-Desire-Intention agents: each agent keeps a belief
//! base of ground literals, reacts to belief and goal events by selecting
//! plans from a shared library, and executes those plans one instruction per
//! tick on intention stacks. Plan outcomes and selection scores are fuzzy
//! degrees in `[0, 1]` rather than plain booleans.
//!
//! ## Core Concepts
//!
//! - **Term / Literal**: the agent language; literals have `/`-separated
//!   functor paths, optional strong negation and annotations
//! - **Unification**: variable substitutions that make two terms equal
//! - **Belief base**: set of ground literals that raises add/remove/update
//!   events
//! - **Plan library**: trigger-indexed plans, selected by head unification,
//!   guard and fuzzy score
//! - **Intention**: stack of plan frames for one committed line of reasoning
//! - **Consistency**: cross-agent score computed from published snapshots
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use bdi_engine::{Agent, Instruction, Literal, Plan, PlanLibrary, Term, TickOutcome, Trigger};
//!
//! // +father(X, Y) <- +child(Y, X)
//! let plan = Plan::new(
//!     Trigger::add_belief(Literal::new("father", vec![Term::var("X"), Term::var("Y")])),
//!     vec![Instruction::AddBelief(Literal::new("child", vec![Term::var("Y"), Term::var("X")]))],
//! );
//! let mut agent = Agent::builder(Arc::new(PlanLibrary::from_plans([plan]))).build()?;
//!
//! agent.beliefs_mut().add(Literal::new("father", vec![Term::atom("tom"), Term::atom("bob")]))?;
//! assert_eq!(agent.tick(), TickOutcome::Progressed);
//! assert_eq!(agent.tick(), TickOutcome::Progressed);
//! assert!(agent.beliefs().contains(&Literal::new("child", vec![Term::atom("bob"), Term::atom("tom")])));
//! # Ok::<(), bdi_engine::EngineError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod error;
pub mod fuzzy;
pub mod path;
pub mod term;
pub mod unify;

// Knowledge and behaviour
pub mod action;
pub mod belief;
pub mod plan;

// Execution
pub mod agent;
pub mod consistency;
pub mod runtime;

// Re-export primary types at crate root for convenience
pub use action::{Action, ActionContext, ActionRegistry, FnAction};
pub use agent::{
    Agent, AgentBuilder, AgentConfig, AgentId, FrameState, Intention, IntentionId, IntentionReport, StateSnapshot,
    TickOutcome,
};
pub use belief::{BeliefBase, BeliefEvent, BeliefEventKind, BeliefProbe, ProbeConfig};
pub use consistency::{
    AgentScore, Algorithm, Consistency, ConsistencyConfig, FilterKind, ScoreReader, StatisticsSnapshot,
};
pub use error::{
    ConfigurationError, ConsistencyError, EngineError, EngineResult, InstructionError, RuntimeError,
    ValidationError,
};
pub use fuzzy::{Aggregation, FuzzyValue};
pub use path::Path;
pub use plan::{Expression, Instruction, Plan, PlanId, PlanLibrary, PlanScorer, Trigger, TriggerKind};
pub use runtime::{RoundReport, Runtime, RuntimeConfig};
pub use term::{Literal, Term, Variable};
pub use unify::{unify, unify_literals, Substitution};
