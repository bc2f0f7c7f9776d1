use serde::{Deserialize, Serialize};

use crate::agent::StateSnapshot;
use crate::path::Path;
use crate::term::Literal;

/// Selects the literals of a snapshot that take part in comparison.
pub trait Filter: Send + Sync {
    /// Literals of `snapshot` to compare, in any order.
    fn filter(&self, snapshot: &StateSnapshot) -> Vec<Literal>;
}

/// The built-in filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterKind {
    /// Beliefs together with running-plan literals.
    #[default]
    All,
    /// Beliefs whose functor starts with one of the paths; every belief if
    /// the list is empty.
    Beliefs { paths: Vec<Path> },
    RunningPlans,
}

impl Filter for FilterKind {
    fn filter(&self, snapshot: &StateSnapshot) -> Vec<Literal> {
        match self {
            Self::All => snapshot
                .beliefs
                .iter()
                .chain(&snapshot.running)
                .cloned()
                .collect(),
            Self::Beliefs { paths } if paths.is_empty() => snapshot.beliefs.clone(),
            Self::Beliefs { paths } => snapshot
                .beliefs
                .iter()
                .filter(|literal| paths.iter().any(|p| literal.functor().starts_with(p)))
                .cloned()
                .collect(),
            Self::RunningPlans => snapshot.running.clone(),
        }
    }
}

impl<F> Filter for F
where
    F: Fn(&StateSnapshot) -> Vec<Literal> + Send + Sync,
{
    fn filter(&self, snapshot: &StateSnapshot) -> Vec<Literal> {
        self(snapshot)
    }
}
