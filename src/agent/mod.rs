//! Agents and the reasoning cycle.
//!
//! An [`Agent`] owns its belief base and intention stacks and is the only
//! writer of both. The driver calls [`Agent::tick`] once per scheduling
//! round; each tick does one unit of work:
//!
//! 1. handle the oldest pending trigger (FIFO) by selecting a plan and
//!    starting a new intention, or else
//! 2. execute one instruction of the oldest intention's top frame.
//!
//! A frame that runs out of instructions completes in the same tick and its
//! result flows into the parent frame it was suspended on. After every tick
//! a [`StateSnapshot`] is published for cross-agent readers.

mod builder;
/// Agent configuration.
pub mod config;
mod execute;
/// Intention frames, the frame arena and reports.
pub mod frame;
/// Published state snapshots.
pub mod snapshot;

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::action::ActionRegistry;
use crate::belief::{BeliefBase, BeliefProbe, ProbeConfig};
use crate::error::{EngineResult, InstructionError, ValidationError};
use crate::plan::{
    PlanId, PlanLibrary, PlanScorer, PlanStatistic, Selection, SelectionContext, Trigger, TriggerKind,
};
use crate::term::{Literal, Term};
use crate::unify::{unify_literals, Substitution};

pub use builder::AgentBuilder;
pub use config::AgentConfig;
pub use frame::{Frame, FrameArena, FrameId, FrameState, Intention, IntentionId, IntentionReport};
pub use snapshot::{SnapshotHandle, StateSnapshot};

use execute::Step;

/// Name of the goal posted when a sleeping agent wakes up.
pub const WAKEUP_GOAL: &str = "wakeup";

/// Unique identifier for an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(uuid::Uuid);

impl AgentId {
    /// Creates a new random agent ID.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of one [`Agent::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickOutcome {
    /// Nothing to do, or asleep.
    Idle,
    Progressed,
    AgentTerminated,
}

#[derive(Debug, Clone)]
struct Sleep {
    remaining: Option<u64>,
    terms: Vec<Term>,
}

/// A BDI agent.
pub struct Agent {
    id: AgentId,
    config: AgentConfig,
    library: Arc<PlanLibrary>,
    actions: ActionRegistry,
    scorer: Arc<dyn PlanScorer>,
    beliefs: BeliefBase,
    pending: VecDeque<Trigger>,
    frames: FrameArena,
    intentions: Vec<Intention>,
    next_intention: u64,
    statistics: Vec<PlanStatistic>,
    reports: VecDeque<IntentionReport>,
    cycle: u64,
    sleep: Option<Sleep>,
    terminated: bool,
    fresh: u64,
    snapshot: SnapshotHandle,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("cycle", &self.cycle)
            .field("beliefs", &self.beliefs.len())
            .field("pending", &self.pending.len())
            .field("intentions", &self.intentions.len())
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Starts building an agent over a shared plan library.
    #[must_use]
    pub fn builder(library: Arc<PlanLibrary>) -> AgentBuilder {
        AgentBuilder::new(library)
    }

    #[must_use]
    pub const fn id(&self) -> AgentId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Ticks executed so far.
    #[must_use]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    #[must_use]
    pub const fn beliefs(&self) -> &BeliefBase {
        &self.beliefs
    }

    /// Mutable access for perception between ticks. Changes raise events
    /// that the next tick picks up.
    pub fn beliefs_mut(&mut self) -> &mut BeliefBase {
        &mut self.beliefs
    }

    #[must_use]
    pub fn library(&self) -> &PlanLibrary {
        &self.library
    }

    /// Execution counts per plan, indexed by [`PlanId`].
    #[must_use]
    pub fn statistics(&self) -> &[PlanStatistic] {
        &self.statistics
    }

    #[must_use]
    pub fn statistic(&self, plan: PlanId) -> PlanStatistic {
        self.statistics.get(plan.0).copied().unwrap_or_default()
    }

    /// Live intentions, oldest first.
    #[must_use]
    pub fn intentions(&self) -> &[Intention] {
        &self.intentions
    }

    #[must_use]
    pub fn frame(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(id)
    }

    /// Frames of an intention from bottom to top.
    pub fn frames_of<'a>(&'a self, intention: &'a Intention) -> impl Iterator<Item = &'a Frame> + 'a {
        intention.stack.iter().filter_map(|id| self.frames.get(*id))
    }

    /// Triggers waiting to be handled.
    #[must_use]
    pub fn pending_triggers(&self) -> usize {
        self.pending.len() + self.beliefs.pending_events()
    }

    #[must_use]
    pub const fn is_sleeping(&self) -> bool {
        self.sleep.is_some()
    }

    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Queues an external trigger, such as a top-level goal.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::NonGroundLiteral` for belief triggers with
    /// unbound variables.
    pub fn trigger(&mut self, trigger: Trigger) -> EngineResult<()> {
        if !trigger.kind.is_goal() && !trigger.literal.is_ground() {
            return Err(ValidationError::NonGroundLiteral {
                literal: trigger.literal.to_string(),
            }
            .into());
        }
        let literal = self.freshen(trigger.literal);
        self.enqueue(Trigger::new(trigger.kind, literal));
        Ok(())
    }

    /// Shorthand for `trigger(Trigger::add_goal(goal))`.
    ///
    /// # Errors
    ///
    /// See [`trigger`](Self::trigger).
    pub fn achieve(&mut self, goal: Literal) -> EngineResult<()> {
        self.trigger(Trigger::add_goal(goal))
    }

    /// Suspends event and intention processing.
    ///
    /// With `cycles`, the agent wakes by itself after that many idle ticks;
    /// without, only [`wakeup`](Self::wakeup) ends the sleep. Waking posts
    /// `+!wakeup(T)` for each term, or `+!wakeup` when there are none.
    pub fn sleep(&mut self, cycles: Option<u64>, terms: Vec<Term>) {
        tracing::debug!(agent = %self.id, ?cycles, "agent sleeping");
        self.sleep = Some(Sleep {
            remaining: cycles,
            terms,
        });
    }

    /// Ends a sleep early. Returns false if the agent was awake.
    pub fn wakeup(&mut self, terms: Vec<Term>) -> bool {
        let Some(sleep) = self.sleep.take() else {
            return false;
        };
        let mut all = sleep.terms;
        all.extend(terms);
        self.post_wakeup(all);
        true
    }

    /// Stops the agent; later ticks report [`TickOutcome::AgentTerminated`].
    pub fn terminate(&mut self) {
        tracing::info!(agent = %self.id, cycle = self.cycle, "agent terminated");
        self.terminated = true;
    }

    /// Takes the reports of frames popped since the last call.
    pub fn drain_reports(&mut self) -> Vec<IntentionReport> {
        self.reports.drain(..).collect()
    }

    /// Instantiated trigger literals of every frame of every intention.
    #[must_use]
    pub fn running_plans(&self) -> Vec<Literal> {
        self.intentions
            .iter()
            .flat_map(|i| self.frames_of(i))
            .map(Frame::instantiated)
            .collect()
    }

    /// Subscribes to this agent's belief events.
    pub fn subscribe(&mut self, config: &ProbeConfig) -> BeliefProbe {
        self.beliefs.subscribe(config)
    }

    /// Shared handle to the latest snapshot.
    #[must_use]
    pub fn snapshot_handle(&self) -> SnapshotHandle {
        self.snapshot.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<StateSnapshot> {
        self.snapshot.load()
    }

    /// Runs one reasoning-cycle step.
    pub fn tick(&mut self) -> TickOutcome {
        if self.terminated {
            return TickOutcome::AgentTerminated;
        }
        self.cycle += 1;
        self.collect_belief_events();

        let outcome = if self.asleep_this_tick() {
            TickOutcome::Idle
        } else if let Some(trigger) = self.pending.pop_front() {
            self.handle_trigger(trigger);
            TickOutcome::Progressed
        } else if let Some(index) = self.runnable() {
            self.step(index);
            TickOutcome::Progressed
        } else {
            TickOutcome::Idle
        };

        self.collect_belief_events();
        self.publish_snapshot();
        outcome
    }

    fn asleep_this_tick(&mut self) -> bool {
        let remaining = match &self.sleep {
            None => return false,
            Some(sleep) => sleep.remaining,
        };
        match remaining {
            Some(0) => {
                self.wakeup(Vec::new());
                false
            }
            Some(n) => {
                if let Some(sleep) = self.sleep.as_mut() {
                    sleep.remaining = Some(n - 1);
                }
                true
            }
            None => true,
        }
    }

    fn post_wakeup(&mut self, terms: Vec<Term>) {
        tracing::debug!(agent = %self.id, terms = terms.len(), "agent woke up");
        if terms.is_empty() {
            self.enqueue(Trigger::add_goal(Literal::atom(WAKEUP_GOAL)));
            return;
        }
        for term in terms {
            self.enqueue(Trigger::add_goal(Literal::new(WAKEUP_GOAL, vec![term])));
        }
    }

    fn collect_belief_events(&mut self) {
        for event in self.beliefs.drain_events() {
            self.enqueue(Trigger::from_event(&event));
        }
    }

    fn enqueue(&mut self, trigger: Trigger) {
        self.pending.push_back(trigger);
        if self.pending.len() > self.config.max_pending_events {
            tracing::warn!(
                agent = %self.id,
                pending = self.pending.len(),
                limit = self.config.max_pending_events,
                "pending trigger backlog above limit"
            );
        }
    }

    /// Renames unbound variables so they cannot clash with plan variables.
    fn freshen(&mut self, literal: Literal) -> Literal {
        let variables = literal.variables();
        if variables.is_empty() {
            return literal;
        }
        let renaming: Substitution = variables
            .into_iter()
            .map(|name| {
                self.fresh += 1;
                let fresh = Term::var(format!("{name}#{}", self.fresh));
                (name, fresh)
            })
            .collect();
        renaming.apply_literal(&literal)
    }

    fn select(&self, trigger: &Trigger) -> Option<Selection> {
        let candidates = self.library.candidates(trigger);
        if candidates.is_empty() {
            return None;
        }
        self.library.select(
            candidates,
            self.scorer.as_ref(),
            &SelectionContext {
                agent: self.id,
                beliefs: &self.beliefs,
                aggregation: self.config.aggregation,
                threshold: self.config.success_threshold,
                statistics: &self.statistics,
            },
        )
    }

    fn handle_trigger(&mut self, trigger: Trigger) {
        let mut selected = self.select(&trigger).map(|s| (trigger.clone(), s));
        if selected.is_none() && trigger.kind == TriggerKind::UpdateBelief {
            let fallback = Trigger::add_belief(trigger.literal.clone());
            selected = self.select(&fallback).map(|s| (fallback, s));
        }

        let intention = IntentionId(self.next_intention);
        self.next_intention += 1;

        match selected {
            Some((trigger, selection)) => {
                tracing::debug!(
                    agent = %self.id,
                    trigger = %trigger,
                    plan = %selection.plan,
                    score = selection.score,
                    "intention created"
                );
                let frame = Frame::new(selection.plan, trigger.clone(), selection.bindings, None);
                let frame_id = self.frames.insert(frame);
                self.intentions.push(Intention {
                    id: intention,
                    root: trigger,
                    stack: vec![frame_id],
                });
            }
            None if trigger.kind.is_goal() => {
                let error = InstructionError::NoApplicablePlan {
                    trigger: trigger.to_string(),
                };
                tracing::debug!(agent = %self.id, error = %error, "goal failed");
                self.push_report(IntentionReport {
                    intention,
                    plan: None,
                    trigger,
                    state: FrameState::Failed,
                    degree: 0.0,
                    error: Some(error.to_string()),
                    depth: 0,
                    cycle: self.cycle,
                    finished_at: chrono::Utc::now(),
                });
            }
            None => {
                tracing::debug!(agent = %self.id, trigger = %trigger, "no plan for belief event, dropped");
            }
        }
    }

    fn runnable(&self) -> Option<usize> {
        self.intentions.iter().position(|intention| {
            intention
                .top()
                .and_then(|id| self.frames.get(id))
                .is_some_and(|f| matches!(f.state, FrameState::Waiting | FrameState::Running))
        })
    }

    /// Executes one instruction of the top frame of `self.intentions[index]`.
    fn step(&mut self, index: usize) {
        let library = Arc::clone(&self.library);
        let Some(frame_id) = self.intentions[index].top() else {
            return;
        };
        let Some(frame) = self.frames.get_mut(frame_id) else {
            tracing::warn!(agent = %self.id, "intention lost its top frame");
            self.intentions.remove(index);
            return;
        };
        frame.state = FrameState::Running;
        let Some(plan) = library.get(frame.plan) else {
            tracing::warn!(agent = %self.id, plan = %frame.plan, "frame refers to unknown plan");
            self.finish(index, Some(InstructionError::UnificationFailed {
                context: "unknown plan".to_string(),
            }));
            return;
        };

        let Some(instruction) = plan.body.get(frame.pc) else {
            // empty body
            let failure = frame.failure.clone();
            self.finish(index, failure);
            return;
        };
        frame.pc += 1;
        let mut bindings = std::mem::take(&mut frame.bindings);

        let result = self.execute(instruction, &mut bindings);

        let Some(frame) = self.frames.get_mut(frame_id) else {
            return;
        };
        frame.bindings = bindings;

        match result {
            Ok(Step::Continue(truth)) => frame.degrees.push(truth),
            Ok(Step::Suspend {
                goal,
                trigger,
                selection,
            }) => {
                frame.awaiting = Some(goal);
                frame.state = FrameState::SuspendedOnSubgoal;
                tracing::debug!(
                    agent = %self.id,
                    trigger = %trigger,
                    plan = %selection.plan,
                    "sub-goal pushed"
                );
                let child = Frame::new(selection.plan, trigger, selection.bindings, Some(frame_id));
                let child_id = self.frames.insert(child);
                self.intentions[index].stack.push(child_id);
                return;
            }
            Err(error) => {
                frame.degrees.push(error.truth());
                if !plan.atomic {
                    self.finish(index, Some(error));
                    return;
                }
                tracing::debug!(agent = %self.id, error = %error, "atomic frame continues after failure");
                frame.failure.get_or_insert(error);
            }
        }

        if frame.pc >= plan.body.len() {
            let failure = frame.failure.clone();
            self.finish(index, failure);
        }
    }

    /// Pops the top frame of an intention with the given outcome and feeds
    /// the result into its parent, cascading while parents complete too.
    fn finish(&mut self, index: usize, mut failure: Option<InstructionError>) {
        let library = Arc::clone(&self.library);
        loop {
            let intention = &mut self.intentions[index];
            let Some(frame_id) = intention.stack.pop() else {
                self.intentions.remove(index);
                return;
            };
            let depth = intention.stack.len();
            let intention_id = intention.id;
            let Some(mut frame) = self.frames.remove(frame_id) else {
                continue;
            };

            let success = failure.is_none();
            frame.state = if success {
                FrameState::Succeeded
            } else {
                FrameState::Failed
            };
            let degree = self.config.aggregation.aggregate(&frame.degrees);
            if let Some(statistic) = self.statistics.get_mut(frame.plan.0) {
                statistic.record(success);
            }
            match &failure {
                None => tracing::debug!(agent = %self.id, trigger = %frame.trigger, degree, "frame succeeded"),
                Some(e) => tracing::debug!(agent = %self.id, trigger = %frame.trigger, error = %e, "frame failed"),
            }
            self.push_report(IntentionReport {
                intention: intention_id,
                plan: Some(frame.plan),
                trigger: frame.trigger.clone(),
                state: frame.state,
                degree,
                error: failure.as_ref().map(ToString::to_string),
                depth,
                cycle: self.cycle,
                finished_at: chrono::Utc::now(),
            });

            // unbound child variables must not meet parent variables of the same name
            let resolved =
                (failure.is_none() && frame.parent.is_some()).then(|| self.freshen(frame.instantiated()));

            let Some(parent_id) = frame.parent else {
                let intention = self.intentions.remove(index);
                if !success && intention.root.kind == TriggerKind::AddGoal {
                    tracing::warn!(agent = %self.id, goal = %intention.root, "intention failed, posting repair goal");
                    self.enqueue(Trigger::remove_goal(intention.root.literal));
                }
                return;
            };
            let Some(parent) = self.frames.get_mut(parent_id) else {
                tracing::warn!(agent = %self.id, "parent frame vanished");
                self.intentions.remove(index);
                return;
            };
            parent.state = FrameState::Running;
            parent.degrees.push(degree);

            let mut child_failure = failure.take();
            if let (Some(resolved), Some(goal)) = (resolved, parent.awaiting.take()) {
                match unify_literals(&goal, &resolved, &parent.bindings) {
                    Ok(bindings) => parent.bindings = bindings,
                    Err(_) => {
                        child_failure = Some(InstructionError::UnificationFailed {
                            context: format!("{goal} with {resolved}"),
                        });
                    }
                }
            }

            let (atomic, len) = library
                .get(parent.plan)
                .map_or((false, 0), |p| (p.atomic, p.body.len()));
            match child_failure {
                Some(error) if !atomic => {
                    failure = Some(error);
                    continue;
                }
                Some(error) => {
                    parent.failure.get_or_insert(error);
                }
                None => {}
            }
            if parent.pc < len {
                return;
            }
            failure = parent.failure.clone();
        }
    }

    fn push_report(&mut self, report: IntentionReport) {
        while self.reports.len() >= self.config.report_capacity {
            self.reports.pop_front();
        }
        self.reports.push_back(report);
    }

    fn publish_snapshot(&self) {
        self.snapshot.store(StateSnapshot::new(
            self.id,
            &self.config.name,
            self.cycle,
            self.beliefs.iter().cloned().collect(),
            self.running_plans(),
        ));
    }
}
