use std::sync::Arc;

use crate::plan::{Plan, PlanScorer, ScoringContext};

use super::ScoreReader;

/// Wraps a plan scorer and scales its result by the agent's consistency:
/// `inner · ((1 - bias) + bias · consistency)`.
///
/// Agents without a fresh score keep the inner score unchanged.
pub struct ConsistencyBiasedScorer {
    inner: Arc<dyn PlanScorer>,
    reader: ScoreReader,
    bias: f64,
}

impl ConsistencyBiasedScorer {
    /// `bias` is clamped to `[0, 1]`.
    #[must_use]
    pub fn new(inner: Arc<dyn PlanScorer>, reader: ScoreReader, bias: f64) -> Self {
        Self {
            inner,
            reader,
            bias: bias.clamp(0.0, 1.0),
        }
    }
}

impl PlanScorer for ConsistencyBiasedScorer {
    fn score(&self, plan: &Plan, context: &ScoringContext<'_>) -> f64 {
        let base = self.inner.score(plan, context);
        let factor = self
            .reader
            .get(context.agent)
            .filter(|s| !s.stale)
            .map_or(1.0, |s| self.bias.mul_add(s.value, 1.0 - self.bias));
        base * factor
    }
}

impl std::fmt::Debug for ConsistencyBiasedScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsistencyBiasedScorer")
            .field("bias", &self.bias)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentId, SnapshotHandle, StateSnapshot};
    use crate::belief::BeliefBase;
    use crate::consistency::{Consistency, ConsistencyConfig, FilterKind, SymmetricDifference};
    use crate::fuzzy::Aggregation;
    use crate::plan::{PlanId, PlanStatistic, Trigger};
    use crate::term::Literal;
    use crate::unify::Substitution;

    fn context<'a>(agent: AgentId, bindings: &'a Substitution, beliefs: &'a BeliefBase) -> ScoringContext<'a> {
        ScoringContext {
            agent,
            plan_id: PlanId(0),
            bindings,
            beliefs,
            aggregation: Aggregation::Mean,
            statistic: PlanStatistic::default(),
        }
    }

    fn handle(agent: AgentId, belief: &str) -> SnapshotHandle {
        SnapshotHandle::new(StateSnapshot::new(agent, "a", 1, vec![Literal::atom(belief)], vec![]))
    }

    #[test]
    fn test_scales_by_consistency() {
        let mut consistency =
            Consistency::new(ConsistencyConfig::default(), FilterKind::All, SymmetricDifference).unwrap();
        let (a, b) = (AgentId::new(), AgentId::new());
        consistency.add(a, handle(a, "p"));
        consistency.add(b, handle(b, "q"));

        let inner: Arc<dyn PlanScorer> = Arc::new(|_: &Plan, _: &ScoringContext<'_>| 0.8);
        let scorer = ConsistencyBiasedScorer::new(inner, consistency.reader(), 0.5);
        let plan = Plan::new(Trigger::add_goal(Literal::atom("g")), vec![]);
        let (bindings, beliefs) = (Substitution::new(), BeliefBase::new());

        // no fresh score yet
        assert!((scorer.score(&plan, &context(a, &bindings, &beliefs)) - 0.8).abs() < 1e-12);

        consistency.recompute();
        assert!((consistency.get(a).unwrap().value - 0.5).abs() < 1e-12);
        assert!((scorer.score(&plan, &context(a, &bindings, &beliefs)) - 0.6).abs() < 1e-12);

        // strangers keep the inner score
        let stranger = AgentId::new();
        assert!((scorer.score(&plan, &context(stranger, &bindings, &beliefs)) - 0.8).abs() < 1e-12);
    }
}
