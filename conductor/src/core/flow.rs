//! Validated agent flows: ordered steps forming a DAG.
//!
//! A flow is checked once, at construction. Every predecessor must name an
//! earlier step, so list order is always a valid topological order and the
//! orchestrator can walk steps by index.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::actor::Actor;

/// How a step receives upstream context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextPattern {
    /// Workflow context only.
    None,
    SinglePredecessor,
    MultiPredecessor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStep {
    pub actor: Actor,
    pub context_pattern: ContextPattern,
    #[serde(default)]
    pub predecessors: Vec<Actor>,
    /// Conditional steps may be skipped by the driver.
    #[serde(default)]
    pub conditional: bool,
    /// Step-specific instructions rendered into the directive.
    pub instructions: String,
}

impl FlowStep {
    /// A step with no upstream context.
    pub fn root(actor: Actor, instructions: impl Into<String>) -> Self {
        Self {
            actor,
            context_pattern: ContextPattern::None,
            predecessors: Vec::new(),
            conditional: false,
            instructions: instructions.into(),
        }
    }

    /// A step fed by exactly one upstream actor.
    pub fn after(actor: Actor, predecessor: Actor, instructions: impl Into<String>) -> Self {
        Self {
            actor,
            context_pattern: ContextPattern::SinglePredecessor,
            predecessors: vec![predecessor],
            conditional: false,
            instructions: instructions.into(),
        }
    }

    /// A step joining several upstream actors.
    pub fn joining(actor: Actor, predecessors: &[Actor], instructions: impl Into<String>) -> Self {
        Self {
            actor,
            context_pattern: ContextPattern::MultiPredecessor,
            predecessors: predecessors.to_vec(),
            conditional: false,
            instructions: instructions.into(),
        }
    }

    pub fn conditional(mut self) -> Self {
        self.conditional = true;
        self
    }
}

/// Flow definition rejected at construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("flow '{flow}' must have at least one step")]
    Empty { flow: String },
    #[error("flow '{flow}': step '{actor}' has pattern none but declares predecessors")]
    UnexpectedPredecessors { flow: String, actor: Actor },
    #[error("flow '{flow}': step '{actor}' needs exactly one predecessor, found {found}")]
    SinglePredecessorCount { flow: String, actor: Actor, found: usize },
    #[error("flow '{flow}': step '{actor}' needs at least two predecessors, found {found}")]
    MultiPredecessorCount { flow: String, actor: Actor, found: usize },
    #[error("flow '{flow}': step '{actor}' references '{predecessor}' which is not an earlier step")]
    UnknownPredecessor {
        flow: String,
        actor: Actor,
        predecessor: Actor,
    },
    #[error("flow '{flow}': actor '{actor}' appears more than once")]
    DuplicateActor { flow: String, actor: Actor },
}

/// An immutable, validated flow. Deserialization re-runs validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FlowDef")]
pub struct Flow {
    id: String,
    name: String,
    steps: Vec<FlowStep>,
}

#[derive(Deserialize)]
struct FlowDef {
    id: String,
    name: String,
    steps: Vec<FlowStep>,
}

impl TryFrom<FlowDef> for Flow {
    type Error = FlowError;

    fn try_from(def: FlowDef) -> Result<Self, Self::Error> {
        Flow::new(def.id, def.name, def.steps)
    }
}

impl Flow {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        steps: Vec<FlowStep>,
    ) -> Result<Self, FlowError> {
        let id = id.into();
        validate_steps(&id, &steps)?;
        Ok(Self {
            id,
            name: name.into(),
            steps,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[FlowStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false; construction rejects empty flows.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&FlowStep> {
        self.steps.get(index)
    }

    pub fn index_of(&self, actor: Actor) -> Option<usize> {
        self.steps.iter().position(|step| step.actor == actor)
    }

    pub fn step_for(&self, actor: Actor) -> Option<&FlowStep> {
        self.index_of(actor).map(|index| &self.steps[index])
    }

    pub fn next_step(&self, actor: Actor) -> Option<&FlowStep> {
        self.index_of(actor).and_then(|index| self.steps.get(index + 1))
    }

    pub fn is_last(&self, actor: Actor) -> bool {
        self.index_of(actor) == Some(self.steps.len() - 1)
    }

    /// `clarification → analysis → validation`, for display.
    pub fn chain_label(&self) -> String {
        self.steps
            .iter()
            .map(|step| step.actor.as_str())
            .collect::<Vec<_>>()
            .join(" → ")
    }
}

fn validate_steps(flow: &str, steps: &[FlowStep]) -> Result<(), FlowError> {
    if steps.is_empty() {
        return Err(FlowError::Empty {
            flow: flow.to_string(),
        });
    }

    let mut earlier: HashSet<Actor> = HashSet::new();
    for step in steps {
        let found = step.predecessors.len();
        match step.context_pattern {
            ContextPattern::None if found != 0 => {
                return Err(FlowError::UnexpectedPredecessors {
                    flow: flow.to_string(),
                    actor: step.actor,
                });
            }
            ContextPattern::SinglePredecessor if found != 1 => {
                return Err(FlowError::SinglePredecessorCount {
                    flow: flow.to_string(),
                    actor: step.actor,
                    found,
                });
            }
            ContextPattern::MultiPredecessor if found < 2 => {
                return Err(FlowError::MultiPredecessorCount {
                    flow: flow.to_string(),
                    actor: step.actor,
                    found,
                });
            }
            _ => {}
        }

        if let Some(missing) = step
            .predecessors
            .iter()
            .find(|predecessor| !earlier.contains(*predecessor))
        {
            return Err(FlowError::UnknownPredecessor {
                flow: flow.to_string(),
                actor: step.actor,
                predecessor: *missing,
            });
        }

        if !earlier.insert(step.actor) {
            return Err(FlowError::DuplicateActor {
                flow: flow.to_string(),
                actor: step.actor,
            });
        }
    }
    Ok(())
}
