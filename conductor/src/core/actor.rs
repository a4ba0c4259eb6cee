//! Closed set of actor roles the orchestrator can dispatch to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An external sub-agent role. Adding a role means extending this enum and
/// [`Actor::profile`]; the compiler finds every other match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    Clarification,
    Research,
    Analysis,
    Synthesis,
    Generation,
    Validation,
    Memory,
}

/// Static metadata for an actor role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorProfile {
    pub cognitive_function: &'static str,
    pub description: &'static str,
    /// Preferred model tier passed to the task tool.
    pub model: &'static str,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown actor '{0}'")]
pub struct UnknownActor(pub String);

impl Actor {
    pub const ALL: [Actor; 7] = [
        Actor::Clarification,
        Actor::Research,
        Actor::Analysis,
        Actor::Synthesis,
        Actor::Generation,
        Actor::Validation,
        Actor::Memory,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Actor::Clarification => "clarification",
            Actor::Research => "research",
            Actor::Analysis => "analysis",
            Actor::Synthesis => "synthesis",
            Actor::Generation => "generation",
            Actor::Validation => "validation",
            Actor::Memory => "memory",
        }
    }

    pub fn profile(self) -> ActorProfile {
        match self {
            Actor::Clarification => ActorProfile {
                cognitive_function: "CLARIFICATION",
                description: "Transform vague inputs into actionable specifications",
                model: "sonnet",
            },
            Actor::Research => ActorProfile {
                cognitive_function: "RESEARCH",
                description: "Systematic information discovery and evaluation",
                model: "sonnet",
            },
            Actor::Analysis => ActorProfile {
                cognitive_function: "ANALYSIS",
                description: "Decompose complexity and identify patterns",
                model: "opus",
            },
            Actor::Synthesis => ActorProfile {
                cognitive_function: "SYNTHESIS",
                description: "Integrate disparate information into coherent designs",
                model: "opus",
            },
            Actor::Generation => ActorProfile {
                cognitive_function: "GENERATION",
                description: "Create artifacts using domain-appropriate creation cycles",
                model: "sonnet",
            },
            Actor::Validation => ActorProfile {
                cognitive_function: "VALIDATION",
                description: "Systematically verify artifacts against criteria",
                model: "sonnet",
            },
            Actor::Memory => ActorProfile {
                cognitive_function: "METACOGNITION",
                description: "Metacognitive monitor for impasse detection and remediation",
                model: "haiku",
            },
        }
    }

    /// Sub-agent type name understood by the task tool (`analysis-agent`).
    pub fn subagent_type(self) -> String {
        format!("{}-agent", self.as_str())
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Actor {
    type Err = UnknownActor;

    /// Accepts canonical names and the legacy `*-agent` spellings.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim().to_ascii_lowercase();
        let name = match trimmed.as_str() {
            "goal-memory-agent" => "memory",
            other => other.strip_suffix("-agent").unwrap_or(other),
        };
        Actor::ALL
            .into_iter()
            .find(|actor| actor.as_str() == name)
            .ok_or_else(|| UnknownActor(input.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_and_legacy_names() {
        assert_eq!("analysis".parse::<Actor>(), Ok(Actor::Analysis));
        assert_eq!("Synthesis-Agent".parse::<Actor>(), Ok(Actor::Synthesis));
        assert_eq!("goal-memory-agent".parse::<Actor>(), Ok(Actor::Memory));
        assert_eq!(
            "planner".parse::<Actor>(),
            Err(UnknownActor("planner".to_string()))
        );
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for actor in Actor::ALL {
            assert_eq!(actor.to_string().parse::<Actor>(), Ok(actor));
        }
    }

    #[test]
    fn heavy_reasoning_roles_prefer_opus() {
        assert_eq!(Actor::Analysis.profile().model, "opus");
        assert_eq!(Actor::Synthesis.profile().model, "opus");
        assert_eq!(Actor::Memory.profile().model, "haiku");
        assert_eq!(Actor::Validation.subagent_type(), "validation-agent");
    }
}
