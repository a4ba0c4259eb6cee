//! Immutable lookup of the built-in flows.
//!
//! Built once at process start by [`FlowRegistry::builtin`] and passed by
//! reference to whatever needs lookup.

use std::collections::BTreeMap;

use super::actor::Actor;
use super::flow::{Flow, FlowError, FlowStep};

/// Stable flow identifiers.
pub mod ids {
    pub const GATHER: &str = "outer-loop-gather";
    pub const INTERVIEW: &str = "outer-loop-interview";
    pub const INTERVIEW_REFINEMENT: &str = "outer-loop-interview-refinement";
    pub const VERIFY: &str = "outer-loop-verify";
    pub const DECOMPOSE: &str = "decompose-protocol";
    pub const AGGREGATION: &str = "decompose-aggregation";
    pub const TDD_RED: &str = "perform-tdd-red";
    pub const TDD_GREEN: &str = "perform-tdd-green";
    pub const TDD_REFACTOR: &str = "perform-tdd-refactor";
    pub const TDD_DOC: &str = "perform-tdd-doc";
    pub const SCAFFOLD: &str = "scaffold-docs-scaffold";
    pub const SCAFFOLD_UPDATE: &str = "scaffold-docs-update";
}

#[derive(Debug, Clone)]
pub struct FlowRegistry {
    flows: BTreeMap<String, Flow>,
}

impl FlowRegistry {
    /// Build the registry from an explicit list. Later duplicates win.
    pub fn from_flows(flows: impl IntoIterator<Item = Flow>) -> Self {
        Self {
            flows: flows
                .into_iter()
                .map(|flow| (flow.id().to_string(), flow))
                .collect(),
        }
    }

    /// Every flow the engine ships with.
    pub fn builtin() -> Result<Self, FlowError> {
        Ok(Self::from_flows([
            gather()?,
            interview()?,
            interview_refinement()?,
            verify()?,
            decompose()?,
            aggregation()?,
            tdd_red()?,
            tdd_green()?,
            tdd_refactor()?,
            tdd_doc()?,
            scaffold()?,
            scaffold_update()?,
        ]))
    }

    pub fn get(&self, id: &str) -> Option<&Flow> {
        self.flows.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.flows.keys().map(String::as_str)
    }

    pub fn flows(&self) -> impl Iterator<Item = &Flow> {
        self.flows.values()
    }
}

fn gather() -> Result<Flow, FlowError> {
    Flow::new(
        ids::GATHER,
        "GATHER Phase",
        vec![
            FlowStep::root(
                Actor::Research,
                "Gather the current state relevant to the task: existing artifacts, constraints, known and unknown facts.",
            ),
            FlowStep::after(
                Actor::Analysis,
                Actor::Research,
                "Structure and prioritize the gathered state. Separate known facts from open unknowns.",
            ),
        ],
    )
}

fn interview() -> Result<Flow, FlowError> {
    Flow::new(
        ids::INTERVIEW,
        "INTERVIEW Phase",
        vec![
            FlowStep::root(
                Actor::Clarification,
                "Capture the IDEAL STATE: success criteria with verification methods, metrics, anti-criteria and exit conditions.",
            ),
            FlowStep::after(
                Actor::Validation,
                Actor::Clarification,
                "Check the captured IDEAL STATE for completeness and write it as JSON to the ideal-state artifact.",
            ),
        ],
    )
}

fn interview_refinement() -> Result<Flow, FlowError> {
    Flow::new(
        ids::INTERVIEW_REFINEMENT,
        "INTERVIEW Refinement",
        vec![
            FlowStep::root(
                Actor::Analysis,
                "Review the completeness gaps listed in the task and decide which questions close them.",
            ),
            FlowStep::after(
                Actor::Clarification,
                Actor::Analysis,
                "Resolve only the identified gaps. Do not restate parts of the IDEAL STATE that already score well.",
            ),
            FlowStep::after(
                Actor::Validation,
                Actor::Clarification,
                "Re-validate the refined IDEAL STATE and overwrite the ideal-state artifact.",
            ),
        ],
    )
}

fn verify() -> Result<Flow, FlowError> {
    Flow::new(
        ids::VERIFY,
        "VERIFY Phase",
        vec![FlowStep::root(
            Actor::Validation,
            "Verify the produced artifacts against the IDEAL STATE and write the results JSON to the verification artifact.",
        )],
    )
}

fn decompose() -> Result<Flow, FlowError> {
    Flow::new(
        ids::DECOMPOSE,
        "Task Decomposition Protocol",
        vec![
            FlowStep::root(
                Actor::Clarification,
                "Clarify the scope of the task. Skip this step when the scope is already unambiguous.",
            )
            .conditional(),
            FlowStep::after(
                Actor::Analysis,
                Actor::Clarification,
                "Identify independent units of work and the dependencies between them.",
            ),
            FlowStep::after(
                Actor::Synthesis,
                Actor::Analysis,
                "Produce the subtask list: id, description and dependency ids for each subtask.",
            ),
            FlowStep::joining(
                Actor::Validation,
                &[Actor::Analysis, Actor::Synthesis],
                "Check the subtask graph for gaps, overlaps and cycles. Give a GO or NO-GO verdict.",
            ),
        ],
    )
}

fn aggregation() -> Result<Flow, FlowError> {
    Flow::new(
        ids::AGGREGATION,
        "Subtask Aggregation",
        vec![FlowStep::root(
            Actor::Synthesis,
            "Combine the completed subtask results into one coherent deliverable.",
        )],
    )
}

fn tdd_red() -> Result<Flow, FlowError> {
    Flow::new(
        ids::TDD_RED,
        "TDD RED Phase",
        vec![
            FlowStep::root(
                Actor::Clarification,
                "Clarify the behavior under test. Skip when the requirement is already precise.",
            )
            .conditional(),
            FlowStep::after(
                Actor::Research,
                Actor::Clarification,
                "Find the existing test conventions and fixtures for the target.",
            ),
            FlowStep::after(
                Actor::Analysis,
                Actor::Research,
                "Choose the smallest failing test that captures the behavior.",
            ),
            FlowStep::joining(
                Actor::Generation,
                &[Actor::Clarification, Actor::Research, Actor::Analysis],
                "Write the failing test and confirm it fails for the expected reason.",
            ),
        ],
    )
}

fn tdd_green() -> Result<Flow, FlowError> {
    Flow::new(
        ids::TDD_GREEN,
        "TDD GREEN Phase",
        vec![
            FlowStep::root(
                Actor::Analysis,
                "Determine the minimal change that makes the failing test pass.",
            ),
            FlowStep::after(
                Actor::Generation,
                Actor::Analysis,
                "Implement the minimal change.",
            ),
            FlowStep::joining(
                Actor::Validation,
                &[Actor::Analysis, Actor::Generation],
                "Run the test suite and confirm every test passes.",
            ),
        ],
    )
}

fn tdd_refactor() -> Result<Flow, FlowError> {
    Flow::new(
        ids::TDD_REFACTOR,
        "TDD REFACTOR Phase",
        vec![
            FlowStep::root(
                Actor::Analysis,
                "Identify duplication and unclear structure introduced by the green change.",
            ),
            FlowStep::after(
                Actor::Generation,
                Actor::Analysis,
                "Refactor without changing behavior.",
            ),
            FlowStep::joining(
                Actor::Validation,
                &[Actor::Analysis, Actor::Generation],
                "Run the test suite and confirm behavior is unchanged.",
            ),
        ],
    )
}

fn tdd_doc() -> Result<Flow, FlowError> {
    Flow::new(
        ids::TDD_DOC,
        "TDD DOC Phase",
        vec![
            FlowStep::root(
                Actor::Analysis,
                "Find the documentation affected by this cycle.",
            ),
            FlowStep::after(
                Actor::Generation,
                Actor::Analysis,
                "Update the documentation to match the new behavior.",
            ),
        ],
    )
}

fn scaffold() -> Result<Flow, FlowError> {
    Flow::new(
        ids::SCAFFOLD,
        "Scaffold Documentation",
        vec![
            FlowStep::root(
                Actor::Clarification,
                "Confirm the project's purpose, audience and language before writing docs.",
            ),
            FlowStep::after(
                Actor::Analysis,
                Actor::Clarification,
                "Survey the project layout and decide which documents are needed.",
            ),
            FlowStep::joining(
                Actor::Synthesis,
                &[Actor::Clarification, Actor::Analysis],
                "Write the documentation scaffold.",
            ),
            FlowStep::joining(
                Actor::Validation,
                &[Actor::Clarification, Actor::Analysis, Actor::Synthesis],
                "Check every generated document against the project.",
            ),
        ],
    )
}

fn scaffold_update() -> Result<Flow, FlowError> {
    Flow::new(
        ids::SCAFFOLD_UPDATE,
        "Update Documentation",
        vec![
            FlowStep::root(
                Actor::Analysis,
                "Compare the existing documentation with the current project state.",
            ),
            FlowStep::after(
                Actor::Synthesis,
                Actor::Analysis,
                "Update the stale documents.",
            ),
            FlowStep::joining(
                Actor::Validation,
                &[Actor::Analysis, Actor::Synthesis],
                "Check the updated documents against the project.",
            ),
        ],
    )
}
