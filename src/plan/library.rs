use std::collections::HashMap;

use crate::belief::BeliefBase;
use crate::error::{EngineResult, ValidationError};
use crate::path::Path;
use crate::unify::{unify_literals, Substitution};

use super::scorer::{PlanScorer, ScoringContext};
use super::trigger::{Trigger, TriggerKind};
use super::{Plan, PlanId};

/// A plan whose head unifies with an event.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub plan: PlanId,
    /// Bindings produced by unifying the head with the event literal.
    pub bindings: Substitution,
}

/// The outcome of a successful selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub plan: PlanId,
    /// Head and guard bindings the new frame starts with.
    pub bindings: Substitution,
    pub score: f64,
}

/// Plans indexed by trigger kind and functor.
///
/// Plans are immutable once added and share the library across agents.
#[derive(Debug, Clone, Default)]
pub struct PlanLibrary {
    plans: Vec<Plan>,
    index: HashMap<(TriggerKind, Path), Vec<PlanId>>,
}

impl PlanLibrary {
    /// Creates an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a library; declaration order is iteration order.
    pub fn from_plans(plans: impl IntoIterator<Item = Plan>) -> Self {
        let mut library = Self::new();
        for plan in plans {
            library.add(plan);
        }
        library
    }

    /// Parses a JSON plan bundle: an array of plans.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` if the bundle is malformed.
    pub fn from_json(bundle: &str) -> EngineResult<Self> {
        let plans: Vec<Plan> =
            serde_json::from_str(bundle).map_err(|e| ValidationError::InvalidConfig {
                reason: format!("plan bundle: {e}"),
            })?;
        Ok(Self::from_plans(plans))
    }

    /// Appends a plan and returns its id.
    pub fn add(&mut self, plan: Plan) -> PlanId {
        let id = PlanId(self.plans.len());
        self.index
            .entry((plan.trigger.kind, plan.trigger.literal.functor().clone()))
            .or_default()
            .push(id);
        self.plans.push(plan);
        id
    }

    #[must_use]
    pub fn get(&self, id: PlanId) -> Option<&Plan> {
        self.plans.get(id.0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlanId, &Plan)> {
        self.plans.iter().enumerate().map(|(i, p)| (PlanId(i), p))
    }

    /// Returns true if any plan is indexed under this kind and functor.
    #[must_use]
    pub fn has_plans(&self, kind: TriggerKind, functor: &Path) -> bool {
        self.index
            .get(&(kind, functor.clone()))
            .is_some_and(|ids| !ids.is_empty())
    }

    /// Plans whose head unifies with the trigger, in declaration order.
    #[must_use]
    pub fn candidates(&self, trigger: &Trigger) -> Vec<Candidate> {
        let Some(ids) = self
            .index
            .get(&(trigger.kind, trigger.literal.functor().clone()))
        else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|&id| {
                let plan = &self.plans[id.0];
                unify_literals(&plan.trigger.literal, &trigger.literal, &Substitution::new())
                    .ok()
                    .map(|bindings| Candidate { plan: id, bindings })
            })
            .collect()
    }

    /// Picks the best candidate.
    ///
    /// Candidates whose guard is false, below `threshold`, or fails to
    /// evaluate are dropped. The highest score wins; ties go to the plan
    /// declared first. Returns `None` if nothing survives.
    pub fn select(
        &self,
        candidates: Vec<Candidate>,
        scorer: &dyn PlanScorer,
        context: &SelectionContext<'_>,
    ) -> Option<Selection> {
        let mut best: Option<Selection> = None;
        for Candidate { plan: id, mut bindings } in candidates {
            let Some(plan) = self.get(id) else { continue };

            if let Some(guard) = &plan.guard {
                let passed = guard
                    .evaluate(&mut bindings, context.beliefs)
                    .and_then(|v| v.truth())
                    .map(|truth| truth >= context.threshold);
                match passed {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        tracing::debug!(plan = %id, error = %e, "guard undefined, candidate dropped");
                        continue;
                    }
                }
            }

            let score = scorer.score(
                plan,
                &ScoringContext {
                    agent: context.agent,
                    plan_id: id,
                    bindings: &bindings,
                    beliefs: context.beliefs,
                    aggregation: context.aggregation,
                    statistic: context.statistic(id),
                },
            );
            let score = if score.is_nan() { 0.0 } else { score };

            // strict comparison keeps the earliest plan on ties
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(Selection {
                    plan: id,
                    bindings,
                    score,
                });
            }
        }
        best
    }
}

/// Agent state visible to [`PlanLibrary::select`].
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext<'a> {
    pub agent: crate::agent::AgentId,
    pub beliefs: &'a BeliefBase,
    pub aggregation: crate::fuzzy::Aggregation,
    /// Guard truth needed to keep a candidate.
    pub threshold: f64,
    pub statistics: &'a [super::PlanStatistic],
}

impl SelectionContext<'_> {
    fn statistic(&self, id: PlanId) -> super::PlanStatistic {
        self.statistics.get(id.0).copied().unwrap_or_default()
    }
}
