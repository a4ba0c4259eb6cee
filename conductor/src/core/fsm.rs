//! Generic phase state machine shared by every workflow.
//!
//! A [`Workflow`] supplies the phase enum and the transition table; [`Fsm`]
//! owns the current phase, the append-only history and the loop-back cycle
//! counter. Illegal moves are reported through `bool` returns and never
//! mutate the machine.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Transition rules for one workflow.
///
/// Implementors are small value types; any per-instance configuration (such
/// as the scaffold-docs mode) is stored on the implementor and persisted with
/// the machine.
pub trait Workflow: Copy + Debug + Default + Eq + Serialize + DeserializeOwned {
    type Phase: Copy + Debug + Eq + Serialize + DeserializeOwned + 'static;

    /// Phase a fresh machine starts in.
    fn initial(&self) -> Self::Phase;

    /// Legal next phases from `from`. Empty means `from` is terminal.
    fn successors(&self, from: Self::Phase) -> &'static [Self::Phase];

    /// Phase from which loop-back is permitted, if the workflow loops at all.
    fn review_phase(&self) -> Option<Self::Phase> {
        None
    }

    /// Phases a loop-back may return to.
    fn restart_phases(&self) -> &'static [Self::Phase] {
        &[]
    }
}

/// Phase machine for a single session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Fsm<W: Workflow> {
    workflow: W,
    current: W::Phase,
    history: Vec<W::Phase>,
    cycle_count: u32,
}

impl<W: Workflow> Default for Fsm<W> {
    fn default() -> Self {
        Self::new(W::default())
    }
}

impl<W: Workflow> Fsm<W> {
    pub fn new(workflow: W) -> Self {
        let initial = workflow.initial();
        Self {
            workflow,
            current: initial,
            history: vec![initial],
            cycle_count: 0,
        }
    }

    pub fn workflow(&self) -> W {
        self.workflow
    }

    pub fn current(&self) -> W::Phase {
        self.current
    }

    /// Every phase visited, in order, starting with the initial phase.
    pub fn history(&self) -> &[W::Phase] {
        &self.history
    }

    /// Number of successful loop-backs.
    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    pub fn is_terminal(&self) -> bool {
        self.workflow.successors(self.current).is_empty()
    }

    pub fn can_transition(&self, target: W::Phase) -> bool {
        self.workflow.successors(self.current).contains(&target)
    }

    /// Move to `target` if the table allows it. Returns false and leaves the
    /// machine untouched otherwise.
    pub fn transition(&mut self, target: W::Phase) -> bool {
        if !self.can_transition(target) {
            return false;
        }
        self.current = target;
        self.history.push(target);
        true
    }

    pub fn can_loop_back(&self, target: W::Phase) -> bool {
        self.workflow.review_phase() == Some(self.current)
            && self.workflow.restart_phases().contains(&target)
    }

    /// Return from the review phase to a restart phase, counting one cycle.
    pub fn loop_back(&mut self, target: W::Phase) -> bool {
        if !self.can_loop_back(target) {
            return false;
        }
        self.current = target;
        self.history.push(target);
        self.cycle_count += 1;
        true
    }
}
