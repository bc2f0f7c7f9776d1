use crate::agent::AgentId;
use crate::belief::BeliefBase;
use crate::fuzzy::Aggregation;
use crate::unify::Substitution;

use super::{Plan, PlanId, PlanStatistic};

/// Annotation carrying a sub-goal's fuzzy weight, as in `!g(X)[fuzzy(0.8)]`.
pub const FUZZY_ANNOTATION: &str = "fuzzy";

/// What a scorer may look at. Scoring is an estimate; nothing is executed.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub agent: AgentId,
    pub plan_id: PlanId,
    /// Head and guard bindings of the candidate.
    pub bindings: &'a Substitution,
    pub beliefs: &'a BeliefBase,
    pub aggregation: Aggregation,
    pub statistic: PlanStatistic,
}

/// Estimates how well a plan will do. Higher is better.
pub trait PlanScorer: Send + Sync {
    /// Returns a score; values outside `[0, 1]` are allowed but NaN counts
    /// as 0.
    fn score(&self, plan: &Plan, context: &ScoringContext<'_>) -> f64;
}

/// Aggregates the `fuzzy(w)` weights annotated on the plan's sub-goals.
///
/// Unannotated sub-goals do not contribute; a plan without any annotated
/// sub-goal scores 1.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightScorer;

impl PlanScorer for WeightScorer {
    fn score(&self, plan: &Plan, context: &ScoringContext<'_>) -> f64 {
        let weights: Vec<f64> = plan
            .subgoals()
            .filter_map(|goal| goal.annotation(FUZZY_ANNOTATION))
            .filter_map(|note| note.arguments().first())
            .filter_map(|weight| context.bindings.apply(weight).as_number())
            .map(|w| w.clamp(0.0, 1.0))
            .collect();
        context.aggregation.aggregate(&weights)
    }
}

impl<F> PlanScorer for F
where
    F: Fn(&Plan, &ScoringContext<'_>) -> f64 + Send + Sync,
{
    fn score(&self, plan: &Plan, context: &ScoringContext<'_>) -> f64 {
        self(plan, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Instruction, Trigger};
    use crate::term::{Literal, Term};

    fn weighted(goal: &str, weight: Term) -> Instruction {
        Instruction::Achieve(
            Literal::atom(goal).with_annotation(Literal::new(FUZZY_ANNOTATION, vec![weight])),
        )
    }

    fn score(plan: &Plan, bindings: &Substitution, aggregation: Aggregation) -> f64 {
        let beliefs = BeliefBase::new();
        let ctx = ScoringContext {
            agent: AgentId::new(),
            plan_id: PlanId(0),
            bindings,
            beliefs: &beliefs,
            aggregation,
            statistic: PlanStatistic::default(),
        };
        WeightScorer.score(plan, &ctx)
    }

    #[test]
    fn test_mean_of_annotated_weights() {
        let plan = Plan::new(
            Trigger::add_goal(Literal::atom("g")),
            vec![
                weighted("a", Term::number(0.2)),
                Instruction::Achieve(Literal::atom("b")),
                weighted("c", Term::number(0.6)),
            ],
        );
        let s = score(&plan, &Substitution::new(), Aggregation::Mean);
        assert!((s - 0.4).abs() < 1e-12);
        let s = score(&plan, &Substitution::new(), Aggregation::Min);
        assert!((s - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_unannotated_scores_one() {
        let plan = Plan::new(
            Trigger::add_goal(Literal::atom("g")),
            vec![Instruction::Achieve(Literal::atom("b"))],
        );
        assert!((score(&plan, &Substitution::new(), Aggregation::Mean) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_weight_from_bindings() {
        let plan = Plan::new(
            Trigger::add_goal(Literal::new("g", vec![Term::var("W")])),
            vec![weighted("a", Term::var("W"))],
        );
        let mut bindings = Substitution::new();
        bindings.bind("W", Term::number(0.7));
        assert!((score(&plan, &bindings, Aggregation::Mean) - 0.7).abs() < 1e-12);
    }
}
