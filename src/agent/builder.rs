use std::collections::VecDeque;
use std::sync::Arc;

use crate::action::ActionRegistry;
use crate::belief::BeliefBase;
use crate::consistency::{ConsistencyBiasedScorer, ScoreReader};
use crate::error::{ConfigurationError, EngineResult};
use crate::plan::{PlanLibrary, PlanScorer, PlanStatistic, Trigger, WeightScorer};
use crate::term::Literal;

use super::{Agent, AgentConfig, AgentId, FrameArena, SnapshotHandle, StateSnapshot};

/// Assembles an [`Agent`].
///
/// `build` checks the configuration and that every action named by a plan
/// is registered, then seeds the initial beliefs and goals.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use bdi_engine::{Agent, Literal, PlanLibrary};
///
/// let agent = Agent::builder(Arc::new(PlanLibrary::new()))
///     .name("scout")
///     .belief(Literal::atom("ready"))
///     .build()
///     .unwrap();
/// assert_eq!(agent.name(), "scout");
/// assert_eq!(agent.beliefs().len(), 1);
/// ```
pub struct AgentBuilder {
    id: AgentId,
    config: AgentConfig,
    library: Arc<PlanLibrary>,
    actions: ActionRegistry,
    scorer: Arc<dyn PlanScorer>,
    consistency: Option<ScoreReader>,
    beliefs: Vec<Literal>,
    goals: Vec<Literal>,
}

impl AgentBuilder {
    #[must_use]
    pub fn new(library: Arc<PlanLibrary>) -> Self {
        Self {
            id: AgentId::new(),
            config: AgentConfig::default(),
            library,
            actions: ActionRegistry::new(),
            scorer: Arc::new(WeightScorer),
            consistency: None,
            beliefs: Vec::new(),
            goals: Vec::new(),
        }
    }

    #[must_use]
    pub const fn id(mut self, id: AgentId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    #[must_use]
    pub fn actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = actions;
        self
    }

    /// Replaces the default [`WeightScorer`].
    #[must_use]
    pub fn scorer(mut self, scorer: impl PlanScorer + 'static) -> Self {
        self.scorer = Arc::new(scorer);
        self
    }

    /// Biases plan scores by this agent's consistency score.
    #[must_use]
    pub fn consistency(mut self, reader: ScoreReader) -> Self {
        self.consistency = Some(reader);
        self
    }

    #[must_use]
    pub fn belief(mut self, literal: Literal) -> Self {
        self.beliefs.push(literal);
        self
    }

    #[must_use]
    pub fn beliefs(mut self, literals: impl IntoIterator<Item = Literal>) -> Self {
        self.beliefs.extend(literals);
        self
    }

    /// Adds an initial `+!goal`.
    #[must_use]
    pub fn goal(mut self, goal: Literal) -> Self {
        self.goals.push(goal);
        self
    }

    /// Builds the agent.
    ///
    /// # Errors
    ///
    /// - `ValidationError::InvalidConfig` for out-of-range configuration
    /// - `ConfigurationError::UndefinedAction` if a plan calls an action the
    ///   registry does not know
    /// - `ValidationError::NonGroundLiteral` for non-ground initial beliefs
    pub fn build(self) -> EngineResult<Agent> {
        self.config.validate()?;
        for (_, plan) in self.library.iter() {
            if let Some(action) = plan.actions().find(|name| !self.actions.contains(name)) {
                tracing::warn!(plan = %plan.trigger, action, "plan calls an unregistered action");
                return Err(ConfigurationError::UndefinedAction {
                    plan: plan.trigger.to_string(),
                    action: action.to_string(),
                }
                .into());
            }
        }

        let scorer = match self.consistency {
            Some(reader) => Arc::new(ConsistencyBiasedScorer::new(
                self.scorer,
                reader,
                self.config.consistency_bias,
            )) as Arc<dyn PlanScorer>,
            None => self.scorer,
        };

        let mut beliefs = BeliefBase::new();
        for literal in self.beliefs {
            beliefs.add(literal)?;
        }

        let snapshot = SnapshotHandle::new(StateSnapshot::empty(self.id, &self.config.name));
        let statistics = vec![PlanStatistic::default(); self.library.len()];
        tracing::info!(
            agent = %self.id,
            name = %self.config.name,
            plans = self.library.len(),
            actions = self.actions.len(),
            "agent built"
        );

        let mut agent = Agent {
            id: self.id,
            config: self.config,
            library: self.library,
            actions: self.actions,
            scorer,
            beliefs,
            pending: VecDeque::new(),
            frames: FrameArena::default(),
            intentions: Vec::new(),
            next_intention: 0,
            statistics,
            reports: VecDeque::new(),
            cycle: 0,
            sleep: None,
            terminated: false,
            fresh: 0,
            snapshot,
        };
        for goal in self.goals {
            agent.trigger(Trigger::add_goal(goal))?;
        }
        Ok(agent)
    }
}
