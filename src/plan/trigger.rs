use std::fmt;

use serde::{Deserialize, Serialize};

use crate::belief::{BeliefEvent, BeliefEventKind};
use crate::term::Literal;

/// What makes a plan a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// `+p`
    AddBelief,
    /// `-p`
    RemoveBelief,
    /// `-+p`; falls back to `AddBelief` plans when no update plan exists.
    UpdateBelief,
    /// `+!g`
    AddGoal,
    /// `-!g`; posted when an intention rooted at `+!g` fails.
    RemoveGoal,
    /// `+?g`
    TestGoal,
}

impl TriggerKind {
    /// Returns true for goal kinds, whose selection failure fails the intention.
    #[must_use]
    pub const fn is_goal(self) -> bool {
        matches!(self, Self::AddGoal | Self::RemoveGoal | Self::TestGoal)
    }

    const fn symbol(self) -> &'static str {
        match self {
            Self::AddBelief => "+",
            Self::RemoveBelief => "-",
            Self::UpdateBelief => "-+",
            Self::AddGoal => "+!",
            Self::RemoveGoal => "-!",
            Self::TestGoal => "+?",
        }
    }
}

/// Event kind plus literal; a pattern on plans, ground or partially bound on
/// posted events.
///
/// # Examples
///
/// ```
/// use bdi_engine::{Literal, Term, Trigger};
///
/// let trigger = Trigger::add_goal(Literal::new("goal", vec![Term::var("X")]));
/// assert_eq!(trigger.to_string(), "+!goal(X)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trigger {
    pub kind: TriggerKind,
    pub literal: Literal,
}

impl Trigger {
    #[must_use]
    pub const fn new(kind: TriggerKind, literal: Literal) -> Self {
        Self { kind, literal }
    }

    #[must_use]
    pub const fn add_belief(literal: Literal) -> Self {
        Self::new(TriggerKind::AddBelief, literal)
    }

    #[must_use]
    pub const fn remove_belief(literal: Literal) -> Self {
        Self::new(TriggerKind::RemoveBelief, literal)
    }

    #[must_use]
    pub const fn update_belief(literal: Literal) -> Self {
        Self::new(TriggerKind::UpdateBelief, literal)
    }

    #[must_use]
    pub const fn add_goal(literal: Literal) -> Self {
        Self::new(TriggerKind::AddGoal, literal)
    }

    #[must_use]
    pub const fn remove_goal(literal: Literal) -> Self {
        Self::new(TriggerKind::RemoveGoal, literal)
    }

    #[must_use]
    pub const fn test_goal(literal: Literal) -> Self {
        Self::new(TriggerKind::TestGoal, literal)
    }

    /// The trigger a belief-base event fires.
    #[must_use]
    pub fn from_event(event: &BeliefEvent) -> Self {
        let kind = match event.kind {
            BeliefEventKind::Add => TriggerKind::AddBelief,
            BeliefEventKind::Remove => TriggerKind::RemoveBelief,
            BeliefEventKind::Update => TriggerKind::UpdateBelief,
        };
        Self::new(kind, event.literal.clone())
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.symbol(), self.literal)
    }
}
