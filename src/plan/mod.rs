//! Plans, the plan library and plan selection.
//!
//! A plan pairs a trigger pattern with an optional guard and a body of
//! instructions. The library indexes plans by trigger kind and functor;
//! selection filters candidates by head unification and guard, then picks
//! the best-scoring one.

/// Guard and body expressions.
pub mod expression;
/// Body instructions.
pub mod instruction;
/// Trigger index and selection.
pub mod library;
/// Plan scoring.
pub mod scorer;
/// Trigger definitions.
pub mod trigger;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use expression::{BinaryOperator, Expression, UnaryOperator, Value};
pub use instruction::{IncrementOperator, Instruction};
pub use library::{Candidate, PlanLibrary, Selection, SelectionContext};
pub use scorer::{PlanScorer, ScoringContext, WeightScorer, FUZZY_ANNOTATION};
pub use trigger::{Trigger, TriggerKind};

/// Position of a plan in its library, which is also its declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(pub usize);

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plan#{}", self.0)
    }
}

/// A plan.
///
/// # Examples
///
/// ```
/// use bdi_engine::plan::{Instruction, Plan, Trigger};
/// use bdi_engine::{Literal, Term};
///
/// let plan = Plan::new(
///     Trigger::add_belief(Literal::new("father", vec![Term::var("X"), Term::var("Y")])),
///     vec![Instruction::AddBelief(Literal::new("child", vec![Term::var("Y"), Term::var("X")]))],
/// );
/// assert_eq!(plan.to_string(), "+father(X, Y) <- +child(Y, X)");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub trigger: Trigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<Expression>,
    #[serde(default)]
    pub body: Vec<Instruction>,
    /// Keep executing after a failed instruction; the frame still ends
    /// `Failed`.
    #[serde(default)]
    pub atomic: bool,
}

impl Plan {
    #[must_use]
    pub const fn new(trigger: Trigger, body: Vec<Instruction>) -> Self {
        Self {
            trigger,
            guard: None,
            body,
            atomic: false,
        }
    }

    #[must_use]
    pub fn with_guard(mut self, guard: Expression) -> Self {
        self.guard = Some(guard);
        self
    }

    #[must_use]
    pub fn atomic(mut self) -> Self {
        self.atomic = true;
        self
    }

    /// Names of all actions the body calls.
    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.body.iter().filter_map(Instruction::action_name)
    }

    /// Sub-goal literals of the body, in order.
    pub fn subgoals(&self) -> impl Iterator<Item = &crate::term::Literal> {
        self.body.iter().filter_map(|i| match i {
            Instruction::Achieve(literal) => Some(literal),
            _ => None,
        })
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.trigger)?;
        if let Some(guard) = &self.guard {
            write!(f, " : {guard}")?;
        }
        write!(f, " <- ")?;
        for (idx, instruction) in self.body.iter().enumerate() {
            if idx > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{instruction}")?;
        }
        Ok(())
    }
}

/// Execution counts of one plan within one agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStatistic {
    pub successful: u64,
    pub failed: u64,
}

impl PlanStatistic {
    pub fn record(&mut self, success: bool) {
        if success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
    }

    #[must_use]
    pub const fn count(&self) -> u64 {
        self.successful + self.failed
    }

    /// Fraction of successful runs; 0 before the first run.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_ratio(&self) -> f64 {
        match self.count() {
            0 => 0.0,
            n => self.successful as f64 / n as f64,
        }
    }

    /// Fraction of failed runs; 0 before the first run.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fail_ratio(&self) -> f64 {
        match self.count() {
            0 => 0.0,
            n => self.failed as f64 / n as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{Literal, Term};

    #[test]
    fn test_statistic_ratios() {
        let mut stat = PlanStatistic::default();
        assert!(stat.success_ratio().abs() < f64::EPSILON);
        stat.record(true);
        stat.record(true);
        stat.record(false);
        assert_eq!(stat.count(), 3);
        assert!((stat.success_ratio() - 2.0 / 3.0).abs() < 1e-12);
        assert!((stat.fail_ratio() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_actions_and_subgoals() {
        let plan = Plan::new(
            Trigger::add_goal(Literal::atom("go")),
            vec![
                Instruction::action("print", vec![Term::text("hi")]),
                Instruction::Achieve(Literal::atom("step")),
                Instruction::action("log", vec![]),
            ],
        );
        assert_eq!(plan.actions().collect::<Vec<_>>(), vec!["print", "log"]);
        assert_eq!(plan.subgoals().count(), 1);
    }

    #[test]
    fn test_plan_json_round_trip() {
        let plan = Plan::new(
            Trigger::add_goal(Literal::new("goal", vec![Term::var("X")])),
            vec![Instruction::Unary {
                variable: "X".to_string(),
                operator: IncrementOperator::Increment,
            }],
        )
        .with_guard(Expression::binary(
            BinaryOperator::Less,
            Expression::term(Term::var("X")),
            Expression::term(Term::number(10.0)),
        ))
        .atomic();
        let json = serde_json::to_string(&plan).unwrap();
        let back: Plan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }
}
