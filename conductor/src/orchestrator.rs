//! Chain orchestration: walking a session through one flow.
//!
//! Every mutation is persisted before the directive is rendered, so a crash
//! after the save is recovered by [`current_directive`], which re-derives the
//! same text from the stored record without touching it.

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument};

use crate::core::actor::Actor;
use crate::core::chain::ChainRecord;
use crate::core::context::{NO_PREDECESSORS, PredecessorOutput, compose_context};
use crate::core::flow::{Flow, FlowStep};
use crate::core::registry::ids;
use crate::core::session::Session;
use crate::io::directive::AgentInvocation;
use crate::io::memory::{memory_exists, predecessor_outputs, read_memory};
use crate::outcome::Outcome;
use crate::workspace::Workspace;

/// Result of asking the chain for its next step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStep {
    /// Directive for the step at the cursor.
    Next(String),
    /// The cursor passed the last step.
    Complete { flow_id: String },
    /// The reporting actor's memory file does not exist; nothing advanced.
    MissingOutput(String),
}

impl ChainStep {
    /// Plain mapping, for callers that have nothing to do when a flow ends.
    pub fn into_outcome(self) -> Outcome {
        match self {
            ChainStep::Next(text) => Outcome::Directive(text),
            ChainStep::MissingOutput(text) => Outcome::Blocked(text),
            ChainStep::Complete { flow_id } => Outcome::Complete(format!("Flow {flow_id} complete.")),
        }
    }
}

/// Hook run after the chain moves and before the session is persisted.
pub type BeforeSave<'a> = &'a mut dyn FnMut(&mut Session) -> Result<()>;

/// Flow the session's chain is running: the stored dynamic flow or a
/// registry entry.
pub fn active_flow(ws: &Workspace, session: &Session) -> Result<Flow> {
    let chain = session
        .chain
        .as_ref()
        .with_context(|| format!("session {} has no active flow", session.id))?;
    match &chain.dynamic_flow {
        Some(flow) => Ok(flow.clone()),
        None => ws
            .registry
            .get(&chain.flow_id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown flow '{}'", chain.flow_id)),
    }
}

/// Start a registry flow at step 0.
pub fn start_flow(ws: &Workspace, session: &mut Session, flow_id: &str) -> Result<ChainStep> {
    start_flow_with(ws, session, flow_id, &mut |_| Ok(()))
}

pub fn start_flow_with(
    ws: &Workspace,
    session: &mut Session,
    flow_id: &str,
    before_save: BeforeSave<'_>,
) -> Result<ChainStep> {
    if ws.registry.get(flow_id).is_none() {
        return Err(anyhow!("unknown flow '{flow_id}'"));
    }
    begin(ws, session, ChainRecord::new(flow_id), before_save)
}

/// Start a flow built at runtime. The flow is stored on the session.
pub fn start_dynamic_flow(ws: &Workspace, session: &mut Session, flow: Flow) -> Result<ChainStep> {
    begin(ws, session, ChainRecord::for_dynamic(flow), &mut |_| Ok(()))
}

#[instrument(skip_all, fields(session = %session.id, flow = %chain.flow_id))]
fn begin(
    ws: &Workspace,
    session: &mut Session,
    chain: ChainRecord,
    before_save: BeforeSave<'_>,
) -> Result<ChainStep> {
    session.chain = Some(chain);
    let flow = active_flow(ws, session)?;
    if let Some(chain) = session.chain.as_mut() {
        chain.enter_current(&flow);
    }
    before_save(session)?;
    ws.save(session)?;
    info!(steps = flow.len(), "flow started");
    render_current(ws, session, &flow)
}

/// Re-derive the directive for the cursor. Never mutates or persists.
pub fn current_directive(ws: &Workspace, session: &Session) -> Result<ChainStep> {
    let flow = active_flow(ws, session)?;
    render_current(ws, session, &flow)
}

/// `actor` reports its step done.
pub fn next_directive(ws: &Workspace, session: &mut Session, actor: Actor) -> Result<ChainStep> {
    next_directive_with(ws, session, actor, &mut |_| Ok(()))
}

#[instrument(skip(ws, session, before_save), fields(session = %session.id))]
pub fn next_directive_with(
    ws: &Workspace,
    session: &mut Session,
    actor: Actor,
    before_save: BeforeSave<'_>,
) -> Result<ChainStep> {
    let flow = active_flow(ws, session)?;
    let chain = chain_mut(session)?;
    chain.expect_current(&flow, actor)?;

    if !memory_exists(&ws.paths, &session.id, actor) {
        let location = ws.paths.memory_display(&session.id, actor);
        debug!(%location, "actor output missing");
        return Ok(ChainStep::MissingOutput(missing_output_text(
            &session.id,
            actor,
            &location,
        )));
    }

    let location = ws.paths.memory_display(&session.id, actor);
    let chain = chain_mut(session)?;
    chain.complete_current(&flow, actor, location)?;
    chain.enter_current(&flow);
    before_save(session)?;
    ws.save(session)?;
    debug!(cursor = session.chain.as_ref().map_or(0, |c| c.cursor), "chain advanced");
    render_current(ws, session, &flow)
}

/// Skip the conditional step at the cursor.
pub fn skip_step(ws: &Workspace, session: &mut Session, actor: Actor) -> Result<ChainStep> {
    skip_step_with(ws, session, actor, &mut |_| Ok(()))
}

#[instrument(skip(ws, session, before_save), fields(session = %session.id))]
pub fn skip_step_with(
    ws: &Workspace,
    session: &mut Session,
    actor: Actor,
    before_save: BeforeSave<'_>,
) -> Result<ChainStep> {
    let flow = active_flow(ws, session)?;
    let chain = chain_mut(session)?;
    chain.skip_current(&flow, actor)?;
    chain.enter_current(&flow);
    before_save(session)?;
    ws.save(session)?;
    info!("conditional step skipped");
    render_current(ws, session, &flow)
}

fn chain_mut(session: &mut Session) -> Result<&mut ChainRecord> {
    let id = session.id.clone();
    session
        .chain
        .as_mut()
        .with_context(|| format!("session {id} has no active flow"))
}

fn missing_output_text(session_id: &str, actor: Actor, location: &str) -> String {
    format!(
        "Error: Memory file required but not found: {location}\n\n\
The {actor} agent must write its memory file before the chain can advance. \
Re-run the agent, then run `conductor next {session_id} {actor}` again."
    )
}

fn render_current(ws: &Workspace, session: &Session, flow: &Flow) -> Result<ChainStep> {
    let chain = session
        .chain
        .as_ref()
        .with_context(|| format!("session {} has no active flow", session.id))?;
    let Some(step) = chain.current_step(flow) else {
        return Ok(ChainStep::Complete {
            flow_id: flow.id().to_string(),
        });
    };
    let context = step_context(ws, session, flow, step)?;
    let learnings_dir =
        (chain.orient_current && ws.config.inject_learnings).then(|| ws.paths.learnings_display(step.actor));
    let directive = ws.directives.agent_invocation(&AgentInvocation {
        session_id: &session.id,
        short_id: session.short_id(),
        query: &session.query,
        phase: session.workflow.phase_name().to_ascii_uppercase(),
        flow,
        step,
        context,
        memory_path: ws.paths.memory_display(&session.id, step.actor),
        learnings_dir,
        model: ws.model_for(step.actor),
    })?;
    Ok(ChainStep::Next(directive))
}

fn step_context(ws: &Workspace, session: &Session, flow: &Flow, step: &FlowStep) -> Result<String> {
    if !step.predecessors.is_empty() {
        let outputs = predecessor_outputs(&ws.paths, &session.id, &step.predecessors)?;
        return Ok(compose_context(&outputs, ws.config.context_truncate_chars));
    }
    if flow.id() == ids::AGGREGATION {
        return subtask_context(ws, session);
    }
    Ok(NO_PREDECESSORS.to_string())
}

/// Outputs of every completed child, for the aggregation step.
fn subtask_context(ws: &Workspace, session: &Session) -> Result<String> {
    let Some(state) = session.decompose() else {
        return Ok(NO_PREDECESSORS.to_string());
    };
    let mut sections = Vec::new();
    for entry in state.subtasks.completed() {
        let mut outputs = Vec::new();
        for actor in Actor::ALL {
            if let Some(content) = read_memory(&ws.paths, &entry.session_id, actor)? {
                outputs.push(PredecessorOutput {
                    actor,
                    location: ws.paths.memory_display(&entry.session_id, actor),
                    content: Some(content),
                });
            }
        }
        let body = if outputs.is_empty() {
            "No memory outputs recorded for this subtask.".to_string()
        } else {
            compose_context(&outputs, ws.config.context_truncate_chars)
        };
        sections.push(format!(
            "## Subtask {}: {} ({})\n\n{}",
            entry.symbolic_id, entry.description, entry.session_id, body
        ));
    }
    if sections.is_empty() {
        return Ok(NO_PREDECESSORS.to_string());
    }
    Ok(sections.join("\n\n"))
}
