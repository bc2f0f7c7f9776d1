use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::term::Literal;

use super::AgentId;

/// Immutable view of an agent's observable state after one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub agent: AgentId,
    pub name: String,
    pub cycle: u64,
    /// Belief literals in path order.
    pub beliefs: Vec<Literal>,
    /// Instantiated trigger literals of every frame on every intention.
    pub running: Vec<Literal>,
    pub taken_at: DateTime<Utc>,
    /// blake3 of the canonical belief and running-plan text.
    pub fingerprint: String,
}

impl StateSnapshot {
    pub(crate) fn new(
        agent: AgentId,
        name: &str,
        cycle: u64,
        beliefs: Vec<Literal>,
        running: Vec<Literal>,
    ) -> Self {
        let fingerprint = fingerprint(&beliefs, &running);
        Self {
            agent,
            name: name.to_string(),
            cycle,
            beliefs,
            running,
            taken_at: Utc::now(),
            fingerprint,
        }
    }

    pub(crate) fn empty(agent: AgentId, name: &str) -> Self {
        Self::new(agent, name, 0, Vec::new(), Vec::new())
    }
}

fn fingerprint(beliefs: &[Literal], running: &[Literal]) -> String {
    let mut hasher = blake3::Hasher::new();
    for literal in beliefs {
        hasher.update(literal.to_string().as_bytes());
        hasher.update(b"\n");
    }
    hasher.update(b"--\n");
    for literal in running {
        hasher.update(literal.to_string().as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}

/// Shared slot holding an agent's latest snapshot.
///
/// The owning agent swaps in a new snapshot after each tick; readers clone
/// the `Arc` under a short read lock and never block a tick for longer than
/// that.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    slot: Arc<RwLock<Arc<StateSnapshot>>>,
}

impl SnapshotHandle {
    pub(crate) fn new(initial: StateSnapshot) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Arc::new(initial))),
        }
    }

    /// The latest published snapshot.
    #[must_use]
    pub fn load(&self) -> Arc<StateSnapshot> {
        let guard = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    pub(crate) fn store(&self, snapshot: StateSnapshot) {
        let mut guard = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_tracks_content() {
        let id = AgentId::new();
        let a = StateSnapshot::new(id, "a", 1, vec![Literal::atom("p")], vec![]);
        let b = StateSnapshot::new(id, "a", 2, vec![Literal::atom("p")], vec![]);
        let c = StateSnapshot::new(id, "a", 2, vec![], vec![Literal::atom("p")]);
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.fingerprint, c.fingerprint);
        assert_eq!(a.fingerprint.len(), 64);
    }

    #[test]
    fn test_handle_swaps_snapshot() {
        let id = AgentId::new();
        let handle = SnapshotHandle::new(StateSnapshot::empty(id, "a"));
        let before = handle.load();
        handle.store(StateSnapshot::new(id, "a", 7, vec![Literal::atom("q")], vec![]));
        assert_eq!(before.cycle, 0);
        assert_eq!(handle.load().cycle, 7);
    }
}
