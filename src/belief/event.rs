use std::fmt;

use serde::{Deserialize, Serialize};

use crate::term::Literal;

/// Kind of belief-base mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeliefEventKind {
    Add,
    Remove,
    Update,
}

impl fmt::Display for BeliefEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "+"),
            Self::Remove => write!(f, "-"),
            Self::Update => write!(f, "-+"),
        }
    }
}

/// One belief-base mutation.
///
/// `sequence` increases by one per event of the owning belief base, so
/// consumers can detect reordering or gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefEvent {
    pub kind: BeliefEventKind,
    /// The literal added or removed; for updates, the new literal.
    pub literal: Literal,
    /// The replaced literal, set for updates only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Literal>,
    pub sequence: u64,
}

impl fmt::Display for BeliefEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}{}", self.sequence, self.kind, self.literal)
    }
}
