//! Execution record for one flow run inside a session.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::actor::Actor;
use super::flow::{Flow, FlowStep};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("flow '{flow}' is already complete")]
    Finished { flow: String },
    #[error("expected '{expected}' to report, got '{got}'")]
    OutOfOrder { expected: Actor, got: Actor },
    #[error("step '{actor}' is not conditional and cannot be skipped")]
    NotConditional { actor: Actor },
}

/// Progress through a flow. Persisted inside the session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRecord {
    pub flow_id: String,
    /// Index of the step whose directive is outstanding.
    pub cursor: usize,
    pub completed_actors: Vec<Actor>,
    #[serde(default)]
    pub skipped_actors: Vec<Actor>,
    /// Actor → memory file path recorded on completion.
    pub output_locations: BTreeMap<Actor, String>,
    /// Actors that already received their one-time orientation block.
    pub first_invocation_seen: BTreeSet<Actor>,
    /// Whether the directive for the step at the cursor carries orientation.
    #[serde(default)]
    pub orient_current: bool,
    /// Set when the flow was built at runtime rather than taken from the registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_flow: Option<Flow>,
}

impl ChainRecord {
    pub fn new(flow_id: impl Into<String>) -> Self {
        Self {
            flow_id: flow_id.into(),
            cursor: 0,
            completed_actors: Vec::new(),
            skipped_actors: Vec::new(),
            output_locations: BTreeMap::new(),
            first_invocation_seen: BTreeSet::new(),
            orient_current: false,
            dynamic_flow: None,
        }
    }

    pub fn for_dynamic(flow: Flow) -> Self {
        Self {
            dynamic_flow: Some(flow.clone()),
            ..Self::new(flow.id())
        }
    }

    pub fn current_step<'f>(&self, flow: &'f Flow) -> Option<&'f FlowStep> {
        flow.step(self.cursor)
    }

    pub fn is_complete(&self, flow: &Flow) -> bool {
        self.cursor >= flow.len()
    }

    /// Record that `actor` is about to be invoked. Returns true the first
    /// time only; that call's directive carries the orientation block.
    pub fn mark_first_invocation(&mut self, actor: Actor) -> bool {
        self.first_invocation_seen.insert(actor)
    }

    pub fn has_seen(&self, actor: Actor) -> bool {
        self.first_invocation_seen.contains(&actor)
    }

    /// Prepare the step at the cursor for emission. Records the first
    /// invocation so a re-derived directive carries the same orientation.
    /// `None` once the flow is complete.
    pub fn enter_current<'f>(&mut self, flow: &'f Flow) -> Option<&'f FlowStep> {
        let step = self.current_step(flow)?;
        self.orient_current = self.mark_first_invocation(step.actor);
        Some(step)
    }

    /// Check that `actor` owns the outstanding step.
    pub fn expect_current<'f>(&self, flow: &'f Flow, actor: Actor) -> Result<&'f FlowStep, ChainError> {
        let step = self.current_step(flow).ok_or_else(|| ChainError::Finished {
            flow: flow.id().to_string(),
        })?;
        if step.actor != actor {
            return Err(ChainError::OutOfOrder {
                expected: step.actor,
                got: actor,
            });
        }
        Ok(step)
    }

    /// Mark the outstanding step done and move the cursor.
    pub fn complete_current(
        &mut self,
        flow: &Flow,
        actor: Actor,
        location: impl Into<String>,
    ) -> Result<(), ChainError> {
        self.expect_current(flow, actor)?;
        if !self.completed_actors.contains(&actor) {
            self.completed_actors.push(actor);
        }
        self.output_locations.insert(actor, location.into());
        self.cursor += 1;
        Ok(())
    }

    /// Skip the outstanding step. Only conditional steps qualify.
    pub fn skip_current(&mut self, flow: &Flow, actor: Actor) -> Result<(), ChainError> {
        let step = self.expect_current(flow, actor)?;
        if !step.conditional {
            return Err(ChainError::NotConditional { actor });
        }
        if !self.skipped_actors.contains(&actor) {
            self.skipped_actors.push(actor);
        }
        self.cursor += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow() -> Flow {
        Flow::new(
            "t",
            "T",
            vec![
                FlowStep::root(Actor::Clarification, "c").conditional(),
                FlowStep::after(Actor::Analysis, Actor::Clarification, "a"),
            ],
        )
        .expect("flow")
    }

    #[test]
    fn completes_in_order_and_reports_finish() {
        let flow = flow();
        let mut chain = ChainRecord::new(flow.id());
        chain
            .complete_current(&flow, Actor::Clarification, "c.md")
            .expect("first");
        assert_eq!(chain.cursor, 1);
        assert!(!chain.is_complete(&flow));
        chain
            .complete_current(&flow, Actor::Analysis, "a.md")
            .expect("second");
        assert!(chain.is_complete(&flow));
        assert_eq!(chain.completed_actors, vec![Actor::Clarification, Actor::Analysis]);
        assert_eq!(
            chain.complete_current(&flow, Actor::Analysis, "a.md"),
            Err(ChainError::Finished {
                flow: "t".to_string()
            })
        );
    }

    #[test]
    fn out_of_order_report_does_not_advance() {
        let flow = flow();
        let mut chain = ChainRecord::new(flow.id());
        let before = chain.clone();
        assert_eq!(
            chain.complete_current(&flow, Actor::Analysis, "a.md"),
            Err(ChainError::OutOfOrder {
                expected: Actor::Clarification,
                got: Actor::Analysis,
            })
        );
        assert_eq!(chain, before);
    }

    #[test]
    fn only_conditional_steps_can_be_skipped() {
        let flow = flow();
        let mut chain = ChainRecord::new(flow.id());
        chain.skip_current(&flow, Actor::Clarification).expect("skip");
        assert_eq!(chain.skipped_actors, vec![Actor::Clarification]);
        assert_eq!(
            chain.skip_current(&flow, Actor::Analysis),
            Err(ChainError::NotConditional {
                actor: Actor::Analysis
            })
        );
        assert_eq!(chain.cursor, 1);
    }

    #[test]
    fn first_invocation_is_reported_once() {
        let mut chain = ChainRecord::new("t");
        assert!(chain.mark_first_invocation(Actor::Research));
        assert!(!chain.mark_first_invocation(Actor::Research));
        assert!(chain.has_seen(Actor::Research));
    }

    #[test]
    fn entering_a_step_remembers_orientation() {
        let flow = flow();
        let mut chain = ChainRecord::new(flow.id());
        let step = chain.enter_current(&flow).expect("step");
        assert_eq!(step.actor, Actor::Clarification);
        assert!(chain.orient_current);
        assert!(chain.enter_current(&flow).is_some());
        assert!(!chain.orient_current, "second entry is not a first invocation");
        chain.skip_current(&flow, Actor::Clarification).expect("skip");
        chain.complete_current(&flow, Actor::Analysis, "a.md").expect("complete");
        assert!(chain.enter_current(&flow).is_none());
    }

    #[test]
    fn serde_keeps_actor_keyed_maps() {
        let flow = flow();
        let mut chain = ChainRecord::for_dynamic(flow.clone());
        chain.mark_first_invocation(Actor::Clarification);
        chain
            .complete_current(&flow, Actor::Clarification, "c.md")
            .expect("complete");
        let json = serde_json::to_string(&chain).expect("serialize");
        assert!(json.contains(r#""output_locations":{"clarification":"c.md"}"#), "{json}");
        let back: ChainRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, chain);
    }
}
