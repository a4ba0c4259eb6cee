//! Decomposition protocol: split a task into child algorithm sessions, route
//! them in dependency order, aggregate once every child completes.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument};

use crate::core::phases::{DecomposePhase, PhaseName};
use crate::core::registry::ids;
use crate::core::session::{DecomposeState, Session, SessionStatus, WorkflowState};
use crate::core::subtasks::{SubtaskDef, SubtaskEntry, SubtaskGraph};
use crate::driver;
use crate::io::directive::SubtaskRoute;
use crate::orchestrator;
use crate::outcome::Outcome;
use crate::workspace::Workspace;

/// Reported when no incomplete child has all dependencies met.
pub const WAITING_TEXT: &str = "WAITING: No subtasks ready";

/// What a child's completion meant for its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildOutcome {
    /// Directive routing the next ready child.
    Next(String),
    /// Every child is done; the aggregation flow has started.
    Aggregate(String),
    Waiting(String),
    /// The session is not a registered subtask of any parent.
    NotSubtask(String),
}

impl ChildOutcome {
    pub fn into_outcome(self) -> Outcome {
        match self {
            ChildOutcome::Next(text) | ChildOutcome::Aggregate(text) | ChildOutcome::NotSubtask(text) => {
                Outcome::Directive(text)
            }
            ChildOutcome::Waiting(text) => Outcome::Waiting(text),
        }
    }
}

/// Begin decomposition: INITIALIZED → DECOMPOSING plus the protocol flow.
#[instrument(skip(ws, session), fields(session = %session.id))]
pub fn start(ws: &Workspace, session: &mut Session) -> Result<Outcome> {
    let state = decompose_state(session)?;
    if !state.fsm.transition(DecomposePhase::Decomposing) {
        return Err(anyhow!(
            "cannot start decomposition from phase {}",
            state.fsm.current().label()
        ));
    }
    Ok(orchestrator::start_flow(ws, session, ids::DECOMPOSE)?.into_outcome())
}

/// Directive asking for the subtask file once the protocol flow is done.
pub(crate) fn on_protocol_complete(ws: &Workspace, session: &Session) -> Result<Outcome> {
    let path = ws.paths.subtasks_path(&session.id);
    Ok(Outcome::Directive(format!(
        "## Decomposition Ready\n\n\
Write the subtask list as JSON to `{}`: an array of objects with id, description and dependencies \
(ids of other subtasks in the same list).\n\n\
Then run: `conductor decompose {} {}`",
        ws.paths.display(&path),
        session.id,
        ws.paths.display(&path)
    )))
}

/// Parse a subtask definition file.
pub fn read_defs(path: &Path) -> Result<Vec<SubtaskDef>> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse subtasks {}", path.display()))
}

/// Validate `defs`, create one child session per subtask and route the first
/// ready one. Children are persisted before the parent that points at them.
#[instrument(skip(ws, parent, defs), fields(parent = %parent.id, count = defs.len()))]
pub fn register_subtasks(ws: &Workspace, parent: &mut Session, defs: &[SubtaskDef]) -> Result<Outcome> {
    let current = decompose_state(parent)?.fsm.current();
    if current != DecomposePhase::Decomposing {
        return Err(anyhow!(
            "subtasks are registered while DECOMPOSING; session {} is {}",
            parent.id,
            current.label()
        ));
    }

    let now = ws.now();
    let parent_id = parent.id.clone();
    let mut children = Vec::with_capacity(defs.len());
    let graph = SubtaskGraph::resolve(defs, |def| {
        let child = Session::new(def.description.clone(), WorkflowState::algorithm(), now)
            .with_parent(parent_id.clone());
        let id = child.id.clone();
        children.push(child);
        id
    })?;

    for child in &mut children {
        ws.save(child)?;
    }

    let state = decompose_state(parent)?;
    state.subtasks = graph;
    if !state.fsm.transition(DecomposePhase::Dispatching) {
        return Err(anyhow!("cannot move from DECOMPOSING to DISPATCHING"));
    }
    parent.chain = None;
    ws.save(parent)?;
    info!(children = children.len(), "subtasks registered");

    match decompose_ref(parent)?.subtasks.first_ready() {
        Some(entry) => Ok(Outcome::Directive(route(ws, parent, entry)?)),
        None => Ok(Outcome::Waiting(WAITING_TEXT.to_string())),
    }
}

/// Record a finished child on its parent and decide what runs next.
#[instrument(skip(ws))]
pub fn on_child_complete(ws: &Workspace, child_id: &str) -> Result<ChildOutcome> {
    let child = ws.load(child_id)?;
    let Some(parent_id) = child.parent_id.clone() else {
        return Ok(ChildOutcome::NotSubtask(format!(
            "Session {child_id} is not a subtask; nothing to report."
        )));
    };
    let mut parent = ws.load(&parent_id)?;
    let registered = parent
        .decompose()
        .is_some_and(|state| state.subtasks.contains(child_id));
    if !registered {
        return Ok(ChildOutcome::NotSubtask(format!(
            "Session {child_id} is not registered with parent {parent_id}; nothing to report."
        )));
    }
    if child.status != SessionStatus::Completed {
        return Err(anyhow!(
            "subtask {child_id} is {}, not completed",
            child.status.as_str()
        ));
    }

    let state = decompose_state(&mut parent)?;
    let already_recorded = state
        .subtasks
        .get(child_id)
        .is_some_and(|entry| entry.complete);
    if already_recorded && state.fsm.current() != DecomposePhase::Dispatching {
        info!(parent = %parent_id, "subtask already recorded; re-deriving parent directive");
        return Ok(ChildOutcome::Aggregate(
            driver::resume(ws, &parent_id)?.text().to_string(),
        ));
    }
    if state.fsm.current() != DecomposePhase::Dispatching {
        return Err(anyhow!(
            "parent {parent_id} is {}, not dispatching subtasks",
            state.fsm.current().label()
        ));
    }
    let mut marked = state.subtasks.clone();
    marked.mark_complete(child_id);
    info!(parent = %parent_id, "subtask complete");

    if marked.all_complete() {
        let step = orchestrator::start_flow_with(ws, &mut parent, ids::AGGREGATION, &mut |session| {
            let state = decompose_state(session)?;
            state.subtasks = marked.clone();
            if !state.fsm.transition(DecomposePhase::Aggregating) {
                return Err(anyhow!("cannot move from DISPATCHING to AGGREGATING"));
            }
            Ok(())
        })?;
        return Ok(ChildOutcome::Aggregate(step.into_outcome().text().to_string()));
    }

    decompose_state(&mut parent)?.subtasks = marked;
    ws.save(&mut parent)?;
    match decompose_ref(&parent)?.subtasks.first_ready() {
        Some(entry) => Ok(ChildOutcome::Next(route(ws, &parent, entry)?)),
        None => Ok(ChildOutcome::Waiting(WAITING_TEXT.to_string())),
    }
}

/// Ready children of a parent, in registration order.
pub fn get_ready(session: &Session) -> Result<Vec<SubtaskEntry>> {
    Ok(decompose_ref(session)?
        .subtasks
        .ready()
        .into_iter()
        .cloned()
        .collect())
}

/// AGGREGATING → COMPLETED once the aggregation flow finishes.
pub fn complete_aggregation(ws: &Workspace, session: &mut Session) -> Result<Outcome> {
    let state = decompose_state(session)?;
    if !state.fsm.transition(DecomposePhase::Completed) {
        return Err(anyhow!(
            "cannot complete decomposition from phase {}",
            state.fsm.current().label()
        ));
    }
    session.status = SessionStatus::Completed;
    session.chain = None;
    ws.save(session)?;
    Ok(Outcome::Complete(format!(
        "Aggregation complete. Session: {}",
        session.id
    )))
}

fn route(ws: &Workspace, parent: &Session, entry: &SubtaskEntry) -> Result<String> {
    ws.directives.route_subtask(&SubtaskRoute {
        parent_id: &parent.id,
        symbolic_id: &entry.symbolic_id,
        session_id: &entry.session_id,
        description: &entry.description,
    })
}

fn decompose_state(session: &mut Session) -> Result<&mut DecomposeState> {
    let id = session.id.clone();
    let kind = session.workflow.kind();
    session
        .decompose_mut()
        .ok_or_else(|| anyhow!("session {id} is a {kind} session, not a decompose session"))
}

fn decompose_ref(session: &Session) -> Result<&DecomposeState> {
    session
        .decompose()
        .ok_or_else(|| anyhow!("session {} is not a decompose session", session.id))
}
