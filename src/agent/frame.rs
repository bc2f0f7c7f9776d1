//! Intention frames and their arena.
//!
//! Frames live in a generational arena and refer to their parent by
//! [`FrameId`]. Removing a frame bumps its slot's generation, so a stale id
//! resolves to `None` instead of to whatever reuses the slot.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InstructionError;
use crate::plan::{PlanId, Trigger};
use crate::term::Literal;
use crate::unify::Substitution;

/// Execution state of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameState {
    /// Pushed, no instruction executed yet.
    Waiting,
    Running,
    /// Blocked until its child frame completes.
    SuspendedOnSubgoal,
    Succeeded,
    Failed,
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Running => write!(f, "running"),
            Self::SuspendedOnSubgoal => write!(f, "suspended"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId {
    index: usize,
    generation: u64,
}

/// One plan instance on an intention stack.
#[derive(Debug, Clone)]
pub struct Frame {
    pub plan: PlanId,
    /// The event that selected the plan.
    pub trigger: Trigger,
    pub bindings: Substitution,
    /// Index of the next instruction.
    pub pc: usize,
    pub state: FrameState,
    pub parent: Option<FrameId>,
    /// Goal literal, in this frame's variables, the child was pushed for.
    pub(crate) awaiting: Option<Literal>,
    /// Truth degrees of executed instructions.
    pub(crate) degrees: Vec<f64>,
    /// First failure of an atomic frame that kept running.
    pub(crate) failure: Option<InstructionError>,
}

impl Frame {
    pub(crate) fn new(
        plan: PlanId,
        trigger: Trigger,
        bindings: Substitution,
        parent: Option<FrameId>,
    ) -> Self {
        Self {
            plan,
            trigger,
            bindings,
            pc: 0,
            state: FrameState::Waiting,
            parent,
            awaiting: None,
            degrees: Vec::new(),
            failure: None,
        }
    }

    /// The trigger literal with this frame's bindings applied.
    #[must_use]
    pub fn instantiated(&self) -> Literal {
        self.bindings.apply_literal(&self.trigger.literal)
    }
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    frame: Option<Frame>,
}

/// Generational storage for frames.
#[derive(Debug, Default)]
pub struct FrameArena {
    slots: Vec<Slot>,
    free: Vec<usize>,
}

impl FrameArena {
    pub fn insert(&mut self, frame: Frame) -> FrameId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.frame = Some(frame);
            return FrameId {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            frame: Some(frame),
        });
        FrameId {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    #[must_use]
    pub fn get(&self, id: FrameId) -> Option<&Frame> {
        self.slots
            .get(id.index)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.frame.as_ref())
    }

    pub fn get_mut(&mut self, id: FrameId) -> Option<&mut Frame> {
        self.slots
            .get_mut(id.index)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.frame.as_mut())
    }

    /// Removes a frame and invalidates its id.
    pub fn remove(&mut self, id: FrameId) -> Option<Frame> {
        let slot = self
            .slots
            .get_mut(id.index)
            .filter(|s| s.generation == id.generation)?;
        let frame = slot.frame.take()?;
        slot.generation += 1;
        self.free.push(id.index);
        Some(frame)
    }

    /// Number of live frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentionId(pub u64);

/// A stack of frames for one top-level event. The last frame is the top.
#[derive(Debug, Clone)]
pub struct Intention {
    pub id: IntentionId,
    pub root: Trigger,
    pub(crate) stack: Vec<FrameId>,
}

impl Intention {
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub(crate) fn top(&self) -> Option<FrameId> {
        self.stack.last().copied()
    }
}

/// Outcome of one popped frame, or of a goal no plan could handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentionReport {
    pub intention: IntentionId,
    /// `None` if selection found no applicable plan.
    pub plan: Option<PlanId>,
    pub trigger: Trigger,
    /// `Succeeded` or `Failed`.
    pub state: FrameState,
    /// Aggregated truth of the executed instructions.
    pub degree: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Frames left below this one when it was popped.
    pub depth: usize,
    pub cycle: u64,
    pub finished_at: DateTime<Utc>,
}

impl IntentionReport {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.state == FrameState::Succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::new(
            PlanId(0),
            Trigger::add_goal(Literal::atom("g")),
            Substitution::new(),
            None,
        )
    }

    #[test]
    fn test_stale_id_after_remove() {
        let mut arena = FrameArena::default();
        let first = arena.insert(frame());
        assert!(arena.remove(first).is_some());
        assert!(arena.get(first).is_none());
        assert!(arena.remove(first).is_none());

        // the slot is reused under a new generation
        let second = arena.insert(frame());
        assert_ne!(first, second);
        assert!(arena.get(first).is_none());
        assert!(arena.get(second).is_some());
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_new_frame_waits() {
        let mut arena = FrameArena::default();
        let id = arena.insert(frame());
        let f = arena.get_mut(id).unwrap();
        assert_eq!(f.state, FrameState::Waiting);
        f.state = FrameState::Running;
        assert_eq!(arena.get(id).unwrap().state, FrameState::Running);
    }
}
