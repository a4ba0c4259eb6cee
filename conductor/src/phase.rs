//! Main algorithm phase driver: session creation, phase entry, halt and
//! resume.
//!
//! Phases with a flow start that flow; the working phases of the inner loop
//! have no flow and get a static directive naming the command that ends them.

use anyhow::{Result, anyhow};
use tracing::{info, instrument, warn};

use crate::core::phases::{AlgorithmPhase, PhaseName};
use crate::core::registry::ids;
use crate::core::session::{HaltInfo, Session, SessionStatus, WorkflowState};
use crate::core::verification::VerificationStatus;
use crate::interview;
use crate::io::directive::PhaseDirective;
use crate::orchestrator;
use crate::outcome::Outcome;
use crate::workspace::Workspace;

/// Create and persist a fresh session.
#[instrument(skip(ws, workflow), fields(kind = workflow.kind()))]
pub fn create_session(ws: &Workspace, query: &str, workflow: WorkflowState) -> Result<Session> {
    if query.trim().is_empty() {
        return Err(anyhow!("query must not be empty"));
    }
    let mut session = Session::new(query.trim(), workflow, ws.now());
    ws.save(&mut session)?;
    info!(session = %session.id, "session created");
    Ok(session)
}

/// Move an algorithm session to `target` and emit that phase's entry.
#[instrument(skip(ws, session), fields(session = %session.id))]
pub fn enter_phase(ws: &Workspace, session: &mut Session, target: AlgorithmPhase) -> Result<Outcome> {
    ensure_running(session)?;
    if target == AlgorithmPhase::Halted {
        return Err(anyhow!(
            "use `conductor halt {}` to halt a session",
            session.id
        ));
    }
    let leaving_verify = session.algorithm().is_some_and(|state| {
        state.fsm.current() == AlgorithmPhase::Verify
            && matches!(target, AlgorithmPhase::Learn | AlgorithmPhase::Completed)
    });
    if leaving_verify && !last_pass_verified(session) {
        return Err(anyhow!(
            "VERIFY has not passed; run `conductor verify {}` first",
            session.id
        ));
    }
    let state = algorithm_state(session)?;
    let from = state.fsm.current();
    if !state.fsm.transition(target) {
        return Err(anyhow!(
            "illegal phase transition {} -> {}",
            from.label(),
            target.label()
        ));
    }
    info!(from = from.as_str(), to = target.as_str(), "phase entered");
    enter_current(ws, session)
}

fn last_pass_verified(session: &Session) -> bool {
    session
        .algorithm()
        .and_then(|state| state.verification_history.last())
        .is_some_and(|result| result.status == VerificationStatus::Verified)
}

/// Emit the entry for the phase the FSM is already in. Persists first.
pub(crate) fn enter_current(ws: &Workspace, session: &mut Session) -> Result<Outcome> {
    let phase = algorithm_state(session)?.fsm.current();
    match phase {
        AlgorithmPhase::Gather => {
            Ok(orchestrator::start_flow(ws, session, ids::GATHER)?.into_outcome())
        }
        AlgorithmPhase::Interview => {
            let flow_id = interview::flow_for(session)?;
            Ok(orchestrator::start_flow(ws, session, flow_id)?.into_outcome())
        }
        AlgorithmPhase::Verify => {
            Ok(orchestrator::start_flow(ws, session, ids::VERIFY)?.into_outcome())
        }
        AlgorithmPhase::Completed => {
            session.status = SessionStatus::Completed;
            session.chain = None;
            ws.save(session)?;
            Ok(Outcome::Complete(completion_text(session)))
        }
        AlgorithmPhase::Initialized | AlgorithmPhase::Halted => Err(anyhow!(
            "phase {} has no entry directive",
            phase.label()
        )),
        _ => {
            session.chain = None;
            ws.save(session)?;
            Ok(Outcome::Directive(static_directive(ws, session, phase)?))
        }
    }
}

/// Pause the session for user input.
#[instrument(skip(ws, session, questions), fields(session = %session.id))]
pub fn halt(
    ws: &Workspace,
    session: &mut Session,
    reason: &str,
    questions: Vec<String>,
) -> Result<Outcome> {
    ensure_running(session)?;
    let state = algorithm_state(session)?;
    let current = state.fsm.current();
    if !state.fsm.transition(AlgorithmPhase::Halted) {
        return Err(anyhow!("cannot halt a session in phase {}", current.label()));
    }
    let resume_phase = if current.is_resumable() {
        current
    } else {
        AlgorithmPhase::Gather
    };
    let info = HaltInfo {
        reason: reason.trim().to_string(),
        questions,
        resume_phase,
    };
    state.halt = Some(info.clone());
    session.status = SessionStatus::Halted;
    ws.save(session)?;
    warn!(resume = resume_phase.as_str(), "session halted");
    Ok(Outcome::Directive(ws.directives.halt(&session.id, &info)?))
}

/// Leave a halt or an escalation. The interrupted flow continues at its
/// cursor when it belongs to the resume phase; otherwise the phase is entered
/// afresh.
#[instrument(skip(ws, session), fields(session = %session.id))]
pub fn resume_halted(ws: &Workspace, session: &mut Session) -> Result<Outcome> {
    let escalated = session.status == SessionStatus::Escalated;
    let state = algorithm_state(session)?;
    let info = state
        .halt
        .take()
        .ok_or_else(|| anyhow!("session has no halt record"))?;
    if !state.fsm.transition(info.resume_phase) {
        return Err(anyhow!(
            "cannot resume into phase {}",
            info.resume_phase.label()
        ));
    }
    if escalated {
        state.verify_iteration = 0;
    }
    session.status = SessionStatus::InProgress;
    info!(phase = info.resume_phase.as_str(), escalated, "session resumed");

    let interrupted = session
        .chain
        .as_ref()
        .is_some_and(|chain| flow_phase(&chain.flow_id) == Some(info.resume_phase));
    if interrupted {
        let flow = orchestrator::active_flow(ws, session)?;
        let incomplete = session
            .chain
            .as_ref()
            .is_some_and(|chain| !chain.is_complete(&flow));
        if incomplete {
            ws.save(session)?;
            return Ok(orchestrator::current_directive(ws, session)?.into_outcome());
        }
    }
    enter_current(ws, session)
}

/// Re-derive the directive for a static phase without touching the session.
pub(crate) fn current_static(ws: &Workspace, session: &Session) -> Result<Outcome> {
    let phase = session
        .algorithm()
        .ok_or_else(|| anyhow!("session {} is not an algorithm session", session.id))?
        .fsm
        .current();
    match phase {
        AlgorithmPhase::Initialized => Ok(Outcome::Directive(format!(
            "Session {} has not started. Run: `conductor phase {} gather`",
            session.id, session.id
        ))),
        AlgorithmPhase::Completed => Ok(Outcome::Complete(completion_text(session))),
        _ => Ok(Outcome::Directive(static_directive(ws, session, phase)?)),
    }
}

/// Registry flow that a phase runs, if any.
fn flow_phase(flow_id: &str) -> Option<AlgorithmPhase> {
    match flow_id {
        ids::GATHER => Some(AlgorithmPhase::Gather),
        ids::INTERVIEW | ids::INTERVIEW_REFINEMENT => Some(AlgorithmPhase::Interview),
        ids::VERIFY => Some(AlgorithmPhase::Verify),
        _ => None,
    }
}

pub(crate) fn static_directive(ws: &Workspace, session: &Session, phase: AlgorithmPhase) -> Result<String> {
    let state = session
        .algorithm()
        .ok_or_else(|| anyhow!("session {} is not an algorithm session", session.id))?;
    let id = &session.id;
    let (guidance, next_command) = match phase {
        AlgorithmPhase::IdealState => (
            format!(
                "Write the IDEAL STATE as JSON to `{}`.\n\n\
Fields: objective, euphoric_surprise, success_criteria (description, verification_method), \
success_metrics (name, target_value, unit), verification_method, anti_criteria, exit_conditions.",
                ws.paths.display(&ws.paths.ideal_state_path(id))
            ),
            Some(format!("conductor interview {id}")),
        ),
        AlgorithmPhase::InnerLoop => {
            let mut text = "Review the IDEAL STATE and decide what this pass changes.".to_string();
            if let Some(last) = state.verification_history.last()
                && !last.gaps.is_empty()
            {
                text.push_str("\n\nGaps from the last verification:\n");
                for gap in &last.gaps {
                    text.push_str(&format!("- {gap}\n"));
                }
            }
            (text, Some(next_phase_command(id, AlgorithmPhase::Observe)))
        }
        AlgorithmPhase::Observe => (
            "Observe the current state of the work: what exists, what changed, and what the last pass left open."
                .to_string(),
            Some(next_phase_command(id, AlgorithmPhase::Think)),
        ),
        AlgorithmPhase::Think => (
            "Weigh the approaches that close the distance to the IDEAL STATE. Note the risks of each."
                .to_string(),
            Some(next_phase_command(id, AlgorithmPhase::Plan)),
        ),
        AlgorithmPhase::Plan => (
            "Write a concrete plan: ordered steps, the files each step touches, and how each step is checked."
                .to_string(),
            Some(next_phase_command(id, AlgorithmPhase::Build)),
        ),
        AlgorithmPhase::Build => (
            "Build what the plan describes. Keep each change small enough to verify on its own."
                .to_string(),
            Some(next_phase_command(id, AlgorithmPhase::Execute)),
        ),
        AlgorithmPhase::Execute => (
            format!(
                "Run the work and record the results as JSON in `{}`.\n\n\
The file is an object keyed by phase name. Each entry may carry: test_results (passed, failed), \
status (completed or failed), all_criteria_met, lint_score (0-10), complexity_score (0-100), \
files_created, semantic_score (0-1), intent_matched, gaps, anti_criteria_violations.",
                ws.paths.display(&ws.paths.verify_artifacts_path(id))
            ),
            Some(next_phase_command(id, AlgorithmPhase::Verify)),
        ),
        AlgorithmPhase::Learn => (
            format!(
                "Record what this session taught each actor. Append to the files under `{}/learnings/`: \
heuristics.md, anti-patterns.md and checklists.md.",
                crate::io::init::CONDUCTOR_DIR
            ),
            Some(next_phase_command(id, AlgorithmPhase::Completed)),
        ),
        other => {
            return Err(anyhow!("phase {} has no static directive", other.label()));
        }
    };
    ws.directives.phase(&PhaseDirective {
        session_id: id,
        query: &session.query,
        phase: phase.label(),
        guidance: &guidance,
        cycle: state.fsm.cycle_count(),
        next_command,
    })
}

fn next_phase_command(session_id: &str, phase: AlgorithmPhase) -> String {
    format!("conductor phase {session_id} {}", phase.as_str())
}

fn completion_text(session: &Session) -> String {
    match &session.parent_id {
        Some(_) => format!(
            "Session {} completed. Report it to the parent with: `conductor child-complete {}`",
            session.id, session.id
        ),
        None => format!("Session {} completed.", session.id),
    }
}

/// Mutable algorithm state, or an error naming the session's actual kind.
pub(crate) fn algorithm_state(session: &mut Session) -> Result<&mut crate::core::session::AlgorithmState> {
    let id = session.id.clone();
    let kind = session.workflow.kind();
    session
        .algorithm_mut()
        .ok_or_else(|| anyhow!("session {id} is a {kind} session, not an algorithm session"))
}

fn ensure_running(session: &Session) -> Result<()> {
    match session.status {
        SessionStatus::InProgress => Ok(()),
        SessionStatus::Halted | SessionStatus::Escalated => Err(anyhow!(
            "session {} is {}; run `conductor resume {}` first",
            session.id,
            session.status.as_str(),
            session.id
        )),
        SessionStatus::Completed => Err(anyhow!("session {} is already completed", session.id)),
    }
}
