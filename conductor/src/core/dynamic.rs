//! Flows assembled at runtime for tasks no built-in flow covers.
//!
//! Dynamic flows go through the same validation as built-in ones and are
//! stored on the owning session, so they survive reloads.

use uuid::Uuid;

use super::actor::Actor;
use super::flow::{Flow, FlowError, FlowStep};

const DEFAULT_INSTRUCTIONS: &str = "Perform your role for the task using the predecessor context.";

/// Build a linear chain: the first actor gets workflow context only, each
/// later actor receives its immediate predecessor's output.
pub fn linear_flow(name: &str, actors: &[Actor], id: Option<&str>) -> Result<Flow, FlowError> {
    let steps = actors
        .iter()
        .enumerate()
        .map(|(index, actor)| match index {
            0 => FlowStep::root(*actor, DEFAULT_INSTRUCTIONS),
            _ => FlowStep::after(*actor, actors[index - 1], DEFAULT_INSTRUCTIONS),
        })
        .collect();
    Flow::new(id.map_or_else(generated_id, str::to_string), name, steps)
}

fn generated_id() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("dynamic-{}", &simple[..8])
}

/// Named dynamic flows offered to drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    ClarifyGenerate,
    ResearchSynthesize,
    FullCognitive,
    AnalysisFlow,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::ClarifyGenerate,
        Preset::ResearchSynthesize,
        Preset::FullCognitive,
        Preset::AnalysisFlow,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Preset::ClarifyGenerate => "clarify-generate",
            Preset::ResearchSynthesize => "research-synthesize",
            Preset::FullCognitive => "full-cognitive",
            Preset::AnalysisFlow => "analysis-flow",
        }
    }

    pub fn parse_id(input: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|preset| preset.id() == input.trim())
    }

    pub fn build(self) -> Result<Flow, FlowError> {
        match self {
            Preset::ClarifyGenerate => linear_flow(
                "Clarify Then Generate",
                &[Actor::Clarification, Actor::Generation],
                Some(self.id()),
            ),
            Preset::ResearchSynthesize => linear_flow(
                "Research Then Synthesize",
                &[Actor::Research, Actor::Synthesis],
                Some(self.id()),
            ),
            Preset::AnalysisFlow => linear_flow(
                "Analysis Flow",
                &[Actor::Research, Actor::Analysis, Actor::Synthesis],
                Some(self.id()),
            ),
            Preset::FullCognitive => Flow::new(
                self.id(),
                "Full Cognitive Flow",
                vec![
                    FlowStep::root(Actor::Clarification, DEFAULT_INSTRUCTIONS),
                    FlowStep::after(Actor::Research, Actor::Clarification, DEFAULT_INSTRUCTIONS),
                    FlowStep::after(Actor::Analysis, Actor::Research, DEFAULT_INSTRUCTIONS),
                    FlowStep::joining(
                        Actor::Synthesis,
                        &[Actor::Clarification, Actor::Research, Actor::Analysis],
                        DEFAULT_INSTRUCTIONS,
                    ),
                    FlowStep::after(Actor::Generation, Actor::Synthesis, DEFAULT_INSTRUCTIONS),
                    FlowStep::joining(
                        Actor::Validation,
                        &[Actor::Synthesis, Actor::Generation],
                        DEFAULT_INSTRUCTIONS,
                    ),
                ],
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::flow::ContextPattern;

    #[test]
    fn linear_flow_chains_immediate_predecessors() {
        let flow = linear_flow(
            "Custom",
            &[Actor::Research, Actor::Analysis, Actor::Generation],
            None,
        )
        .expect("flow");
        assert!(flow.id().starts_with("dynamic-"));
        assert_eq!(flow.id().len(), "dynamic-".len() + 8);
        assert_eq!(flow.steps()[0].context_pattern, ContextPattern::None);
        assert_eq!(flow.steps()[2].predecessors, vec![Actor::Analysis]);
    }

    #[test]
    fn linear_flow_rejects_empty_and_repeated_actors() {
        assert!(matches!(
            linear_flow("Empty", &[], Some("empty")),
            Err(FlowError::Empty { .. })
        ));
        assert!(matches!(
            linear_flow("Twice", &[Actor::Analysis, Actor::Analysis], Some("twice")),
            Err(FlowError::DuplicateActor { .. })
        ));
    }

    #[test]
    fn every_preset_builds() {
        for preset in Preset::ALL {
            let flow = preset.build().expect("preset flow");
            assert_eq!(flow.id(), preset.id());
            assert_eq!(Preset::parse_id(preset.id()), Some(preset));
        }
        assert_eq!(Preset::FullCognitive.build().expect("flow").len(), 6);
    }
}
