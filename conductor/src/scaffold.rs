//! Documentation scaffold workflow. The FSM tracks whichever actor holds the
//! flow's cursor.

use anyhow::{Result, anyhow};
use tracing::{debug, instrument};

use crate::core::actor::Actor;
use crate::core::flow::Flow;
use crate::core::phases::{PhaseName, ScaffoldMode, ScaffoldPhase};
use crate::core::registry::ids;
use crate::core::session::{ScaffoldState, Session, SessionStatus};
use crate::orchestrator;
use crate::outcome::Outcome;
use crate::workspace::Workspace;

pub fn flow_for(mode: ScaffoldMode) -> &'static str {
    match mode {
        ScaffoldMode::Scaffold => ids::SCAFFOLD,
        ScaffoldMode::Update => ids::SCAFFOLD_UPDATE,
    }
}

/// The `conductor scaffold` command: start, or re-derive the outstanding step.
#[instrument(skip(ws, session), fields(session = %session.id))]
pub fn advance(ws: &Workspace, session: &mut Session) -> Result<Outcome> {
    let state = scaffold_state(session)?;
    match state.fsm.current() {
        ScaffoldPhase::Initialized => {
            let flow_id = flow_for(state.fsm.workflow().mode);
            let flow = ws
                .registry
                .get(flow_id)
                .cloned()
                .ok_or_else(|| anyhow!("unknown flow '{flow_id}'"))?;
            let step = orchestrator::start_flow_with(ws, session, flow_id, &mut |session| {
                sync_phase(session, &flow)
            })?;
            Ok(step.into_outcome())
        }
        ScaffoldPhase::Completed => Ok(Outcome::Complete(completed_text(session))),
        _ => {
            let flow = orchestrator::active_flow(ws, session)?;
            let complete = session
                .chain
                .as_ref()
                .is_some_and(|chain| chain.is_complete(&flow));
            if complete {
                return finish(ws, session);
            }
            Ok(orchestrator::current_directive(ws, session)?.into_outcome())
        }
    }
}

/// Move the FSM to the phase of the actor at the chain cursor.
pub(crate) fn sync_phase(session: &mut Session, flow: &Flow) -> Result<()> {
    let Some(actor) = session
        .chain
        .as_ref()
        .and_then(|chain| chain.current_step(flow))
        .map(|step| step.actor)
    else {
        return Ok(());
    };
    let target = phase_for(actor)?;
    let state = scaffold_state(session)?;
    let current = state.fsm.current();
    if current == target {
        return Ok(());
    }
    if !state.fsm.transition(target) {
        return Err(anyhow!(
            "illegal scaffold transition {} -> {}",
            current.label(),
            target.label()
        ));
    }
    debug!(from = current.as_str(), to = target.as_str(), "scaffold phase synced");
    Ok(())
}

/// Flow finished: mark the session done.
pub(crate) fn finish(ws: &Workspace, session: &mut Session) -> Result<Outcome> {
    let state = scaffold_state(session)?;
    let current = state.fsm.current();
    if current != ScaffoldPhase::Completed && !state.fsm.transition(ScaffoldPhase::Completed) {
        return Err(anyhow!(
            "cannot complete scaffold from phase {}",
            current.label()
        ));
    }
    session.status = SessionStatus::Completed;
    session.chain = None;
    ws.save(session)?;
    Ok(Outcome::Complete(completed_text(session)))
}

fn phase_for(actor: Actor) -> Result<ScaffoldPhase> {
    match actor {
        Actor::Clarification => Ok(ScaffoldPhase::Clarification),
        Actor::Analysis => Ok(ScaffoldPhase::Analysis),
        Actor::Synthesis => Ok(ScaffoldPhase::Synthesis),
        Actor::Validation => Ok(ScaffoldPhase::Validation),
        other => Err(anyhow!("actor {other} has no scaffold phase")),
    }
}

fn completed_text(session: &Session) -> String {
    format!("Documentation scaffold complete. Session: {}", session.id)
}

fn scaffold_state(session: &mut Session) -> Result<&mut ScaffoldState> {
    let id = session.id.clone();
    let kind = session.workflow.kind();
    session
        .scaffold_mut()
        .ok_or_else(|| anyhow!("session {id} is a {kind} session, not a scaffold session"))
}
