use std::fmt;

use serde::{Deserialize, Serialize};

use crate::term::{Literal, Term};

use super::expression::Expression;
use super::trigger::Trigger;

/// In-place arithmetic on a bound numeric variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncrementOperator {
    Increment,
    Decrement,
}

/// One plan-body step. Every step runs to completion within a single tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Instruction {
    /// `+p(...)`
    AddBelief(Literal),
    /// `-p(...)`
    RemoveBelief(Literal),
    /// `-+p(...)`, replacing the first belief that unifies with `old`.
    UpdateBelief { old: Literal, new: Literal },
    /// `!g(...)`: suspends the frame until the sub-goal completes.
    Achieve(Literal),
    /// Posts a trigger as a new, independent intention.
    Post(Trigger),
    /// `?p(...)`: binds from the belief base, else pursues a `+?p` plan.
    TestGoal(Literal),
    /// `X = expression`
    Assign {
        variable: String,
        expression: Expression,
    },
    /// `X++` / `X--`
    Unary {
        variable: String,
        operator: IncrementOperator,
    },
    /// Fuzzy test; fails the frame when the truth degree is below threshold.
    Test(Expression),
    /// Calls a registered action; results bind to `returns` left to right.
    Action {
        name: String,
        #[serde(default)]
        arguments: Vec<Term>,
        #[serde(default)]
        returns: Vec<String>,
        #[serde(default)]
        parallel: bool,
        #[serde(default)]
        annotations: Vec<Literal>,
    },
}

impl Instruction {
    /// Shorthand for an action call without return slots.
    #[must_use]
    pub fn action(name: impl Into<String>, arguments: Vec<Term>) -> Self {
        Self::Action {
            name: name.into(),
            arguments,
            returns: Vec::new(),
            parallel: false,
            annotations: Vec::new(),
        }
    }

    /// Name of the invoked action, if this is an action call.
    #[must_use]
    pub fn action_name(&self) -> Option<&str> {
        match self {
            Self::Action { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddBelief(l) => write!(f, "+{l}"),
            Self::RemoveBelief(l) => write!(f, "-{l}"),
            Self::UpdateBelief { new, .. } => write!(f, "-+{new}"),
            Self::Achieve(l) => write!(f, "!{l}"),
            Self::Post(t) => write!(f, "post {t}"),
            Self::TestGoal(l) => write!(f, "?{l}"),
            Self::Assign {
                variable,
                expression,
            } => write!(f, "{variable} = {expression}"),
            Self::Unary { variable, operator } => match operator {
                IncrementOperator::Increment => write!(f, "{variable}++"),
                IncrementOperator::Decrement => write!(f, "{variable}--"),
            },
            Self::Test(e) => write!(f, "{e}"),
            Self::Action {
                name, arguments, ..
            } => {
                write!(f, "{name}(")?;
                for (idx, arg) in arguments.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}
