//! Directive rendering for the external actor.
//!
//! Field labels and section headings are a contract the actor parses; change
//! the templates in `directives/` only together with the actor prompts.

use anyhow::Result;
use minijinja::{Environment, context};

use crate::core::actor::Actor;
use crate::core::completeness::CompletenessScore;
use crate::core::feedback::{FeedbackAction, FeedbackDecision};
use crate::core::flow::{Flow, FlowStep};
use crate::core::session::HaltInfo;
use crate::core::phases::PhaseName;
use crate::core::verification::VerificationResult;

const AGENT_TEMPLATE: &str = include_str!("directives/agent.md");
const LEARNINGS_TEMPLATE: &str = include_str!("directives/learnings.md");
const TASK_TOOL_TEMPLATE: &str = include_str!("directives/task_tool.md");
const PHASE_TEMPLATE: &str = include_str!("directives/phase.md");
const ROUTE_SUBTASK_TEMPLATE: &str = include_str!("directives/route_subtask.md");
const VERIFICATION_TEMPLATE: &str = include_str!("directives/verification.md");
const HALT_TEMPLATE: &str = include_str!("directives/halt.md");
const COMPLETENESS_TEMPLATE: &str = include_str!("directives/completeness.md");

/// Everything needed to invoke one flow step.
#[derive(Debug, Clone)]
pub struct AgentInvocation<'a> {
    pub session_id: &'a str,
    pub short_id: &'a str,
    pub query: &'a str,
    /// Upper-case phase label, e.g. `GATHER`.
    pub phase: String,
    pub flow: &'a Flow,
    pub step: &'a FlowStep,
    /// Composed predecessor context.
    pub context: String,
    pub memory_path: String,
    /// Set on the actor's first invocation in the chain.
    pub learnings_dir: Option<String>,
    pub model: &'a str,
}

/// A phase that has no flow: the actor works from static guidance.
#[derive(Debug, Clone)]
pub struct PhaseDirective<'a> {
    pub session_id: &'a str,
    pub query: &'a str,
    pub phase: String,
    pub guidance: &'a str,
    /// Loop-back count, shown when non-zero.
    pub cycle: u32,
    pub next_command: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SubtaskRoute<'a> {
    pub parent_id: &'a str,
    pub symbolic_id: &'a str,
    pub session_id: &'a str,
    pub description: &'a str,
}

/// Template engine wrapper around minijinja.
pub struct DirectiveEngine {
    env: Environment<'static>,
}

impl DirectiveEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template("agent", AGENT_TEMPLATE)?;
        env.add_template("learnings", LEARNINGS_TEMPLATE)?;
        env.add_template("task_tool", TASK_TOOL_TEMPLATE)?;
        env.add_template("phase", PHASE_TEMPLATE)?;
        env.add_template("route_subtask", ROUTE_SUBTASK_TEMPLATE)?;
        env.add_template("verification", VERIFICATION_TEMPLATE)?;
        env.add_template("halt", HALT_TEMPLATE)?;
        env.add_template("completeness", COMPLETENESS_TEMPLATE)?;
        Ok(Self { env })
    }

    /// The full task-tool directive for one step.
    pub fn agent_invocation(&self, input: &AgentInvocation<'_>) -> Result<String> {
        let actor = input.step.actor;
        let learnings = match &input.learnings_dir {
            Some(dir) => Some(self.learnings(actor, dir)?),
            None => None,
        };
        let prompt = self.env.get_template("agent")?.render(context! {
            actor => actor.as_str(),
            session_id => input.session_id,
            flow_name => input.flow.name(),
            flow_id => input.flow.id(),
            cognitive_function => actor.profile().cognitive_function,
            phase => &input.phase,
            query => input.query,
            learnings => learnings,
            instructions => input.step.instructions.trim(),
            context => input.context.trim(),
            memory_path => &input.memory_path,
        })?;
        let rendered = self.env.get_template("task_tool")?.render(context! {
            subagent_type => actor.subagent_type(),
            actor => actor.as_str(),
            short_id => input.short_id,
            model => input.model,
            prompt => indent(&prompt, 2),
            session_id => input.session_id,
            conditional => input.step.conditional,
        })?;
        Ok(rendered)
    }

    fn learnings(&self, actor: Actor, dir: &str) -> Result<String> {
        let rendered = self.env.get_template("learnings")?.render(context! {
            actor => actor.as_str(),
            dir => dir,
        })?;
        Ok(rendered)
    }

    pub fn phase(&self, input: &PhaseDirective<'_>) -> Result<String> {
        let rendered = self.env.get_template("phase")?.render(context! {
            phase => &input.phase,
            session_id => input.session_id,
            query => input.query,
            cycle => input.cycle,
            guidance => input.guidance.trim(),
            next_command => &input.next_command,
        })?;
        Ok(rendered)
    }

    pub fn route_subtask(&self, input: &SubtaskRoute<'_>) -> Result<String> {
        let rendered = self.env.get_template("route_subtask")?.render(context! {
            parent_id => input.parent_id,
            symbolic_id => input.symbolic_id,
            session_id => input.session_id,
            description => input.description,
        })?;
        Ok(rendered)
    }

    /// Feedback report for one verification pass.
    pub fn verification(
        &self,
        session_id: &str,
        result: &VerificationResult,
        decision: &FeedbackDecision,
        max_iterations: u32,
    ) -> Result<String> {
        let action = match decision.action {
            FeedbackAction::Proceed => "PROCEED",
            FeedbackAction::LoopBack => "LOOP_BACK",
            FeedbackAction::Escalate => "ESCALATE",
        };
        let rendered = self.env.get_template("verification")?.render(context! {
            status => result.status.label(),
            session_id => session_id,
            iteration => result.iteration,
            max => max_iterations,
            overall => format!("{:.2}", result.overall_score),
            objective => format!("{:.2}", result.layer_scores.objective),
            heuristic => format!("{:.2}", result.layer_scores.heuristic),
            semantic => format!("{:.2}", result.layer_scores.semantic),
            gaps => &result.gaps,
            recommendations => &result.recommendations,
            action => action,
            message => &decision.message,
        })?;
        Ok(rendered)
    }

    pub fn halt(&self, session_id: &str, halt: &HaltInfo) -> Result<String> {
        let rendered = self.env.get_template("halt")?.render(context! {
            session_id => session_id,
            reason => &halt.reason,
            resume_phase => halt.resume_phase.label(),
            questions => &halt.questions,
        })?;
        Ok(rendered)
    }

    pub fn completeness(&self, score: &CompletenessScore, iteration: u32, max: u32) -> Result<String> {
        let rendered = self.env.get_template("completeness")?.render(context! {
            overall => format!("{:.2}", score.overall),
            iteration => iteration,
            max => max,
            missing => &score.missing,
            recommendations => &score.recommendations,
        })?;
        Ok(rendered)
    }
}

/// Indent every non-blank line by `width` spaces.
fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
