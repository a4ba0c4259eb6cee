//! Workflow-agnostic commands: report a step done, skip a step, resume, and
//! the hand-off that runs when a flow finishes.
//!
//! `on_flow_complete` reads only persisted state, so running it twice for the
//! same finished chain yields the same outcome. `resume` relies on that after
//! a crash between the final chain save and the follow-up transition.

use anyhow::{Result, anyhow};
use tracing::{info, instrument};

use crate::core::actor::Actor;
use crate::core::dynamic::{Preset, linear_flow};
use crate::core::flow::Flow;
use crate::core::registry::ids;
use crate::core::session::{Session, SessionStatus, WorkflowState};
use crate::core::phases::AlgorithmPhase;
use crate::decompose;
use crate::interview;
use crate::orchestrator::{self, ChainStep};
use crate::outcome::Outcome;
use crate::phase;
use crate::scaffold;
use crate::tdd;
use crate::verify;
use crate::workspace::Workspace;

/// How a dynamic flow is specified on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DynamicFlowSpec {
    Preset(Preset),
    Actors(Vec<Actor>),
}

impl DynamicFlowSpec {
    pub fn build(&self) -> Result<Flow> {
        let flow = match self {
            DynamicFlowSpec::Preset(preset) => preset.build()?,
            DynamicFlowSpec::Actors(actors) => linear_flow("Custom Flow", actors, None)?,
        };
        Ok(flow)
    }
}

/// `actor` reports its step done.
#[instrument(skip(ws))]
pub fn next(ws: &Workspace, session_id: &str, actor: Actor) -> Result<Outcome> {
    let mut session = ws.load(session_id)?;
    ensure_in_progress(&session)?;
    let step = if matches!(session.workflow, WorkflowState::Scaffold(_)) {
        let flow = orchestrator::active_flow(ws, &session)?;
        orchestrator::next_directive_with(ws, &mut session, actor, &mut |session| {
            scaffold::sync_phase(session, &flow)
        })?
    } else {
        orchestrator::next_directive(ws, &mut session, actor)?
    };
    settle(ws, &mut session, step)
}

/// Skip the conditional step owned by `actor`.
#[instrument(skip(ws))]
pub fn skip(ws: &Workspace, session_id: &str, actor: Actor) -> Result<Outcome> {
    let mut session = ws.load(session_id)?;
    ensure_in_progress(&session)?;
    let step = if matches!(session.workflow, WorkflowState::Scaffold(_)) {
        let flow = orchestrator::active_flow(ws, &session)?;
        orchestrator::skip_step_with(ws, &mut session, actor, &mut |session| {
            scaffold::sync_phase(session, &flow)
        })?
    } else {
        orchestrator::skip_step(ws, &mut session, actor)?
    };
    settle(ws, &mut session, step)
}

/// Pick a session back up: leave a halt or escalation, or re-derive whatever
/// directive is outstanding.
#[instrument(skip(ws))]
pub fn resume(ws: &Workspace, session_id: &str) -> Result<Outcome> {
    let mut session = ws.load(session_id)?;
    match session.status {
        SessionStatus::Halted | SessionStatus::Escalated => {
            return phase::resume_halted(ws, &mut session);
        }
        SessionStatus::Completed => {
            return Ok(Outcome::Complete(format!(
                "Session {} is already completed.",
                session.id
            )));
        }
        SessionStatus::InProgress => {}
    }

    if session.chain.is_some() {
        let flow = orchestrator::active_flow(ws, &session)?;
        let finished = session
            .chain
            .as_ref()
            .is_some_and(|chain| chain.is_complete(&flow));
        if finished {
            info!(flow = flow.id(), "re-running flow completion");
            return on_flow_complete(ws, &mut session, flow.id());
        }
        return Ok(orchestrator::current_directive(ws, &session)?.into_outcome());
    }

    match &session.workflow {
        WorkflowState::Algorithm(_) => phase::current_static(ws, &session),
        WorkflowState::Tdd(_) => Ok(Outcome::Directive(format!(
            "Session {id} has not started. Run: `conductor tdd {id}`",
            id = session.id
        ))),
        WorkflowState::Scaffold(_) => Ok(Outcome::Directive(format!(
            "Session {id} has not started. Run: `conductor scaffold {id}`",
            id = session.id
        ))),
        WorkflowState::Decompose(state) => match state.subtasks.first_ready() {
            Some(entry) => Ok(Outcome::Directive(format!(
                "Subtask {} is ready. Start it with: `conductor phase {} gather`",
                entry.symbolic_id, entry.session_id
            ))),
            None if state.subtasks.entries().is_empty() => Ok(Outcome::Directive(format!(
                "Session {id} has not started. Run: `conductor decompose {id}`",
                id = session.id
            ))),
            None => Ok(Outcome::Waiting(decompose::WAITING_TEXT.to_string())),
        },
    }
}

/// Run a flow built at runtime on an existing session.
#[instrument(skip(ws, spec))]
pub fn run_dynamic_flow(ws: &Workspace, session_id: &str, spec: &DynamicFlowSpec) -> Result<Outcome> {
    let mut session = ws.load(session_id)?;
    ensure_in_progress(&session)?;
    if let Some(chain) = &session.chain {
        let flow = orchestrator::active_flow(ws, &session)?;
        if !chain.is_complete(&flow) {
            return Err(anyhow!(
                "session {} is still running flow '{}'",
                session.id,
                chain.flow_id
            ));
        }
    }
    let flow = spec.build()?;
    info!(flow = flow.id(), steps = flow.len(), "dynamic flow");
    Ok(orchestrator::start_dynamic_flow(ws, &mut session, flow)?.into_outcome())
}

fn settle(ws: &Workspace, session: &mut Session, step: ChainStep) -> Result<Outcome> {
    match step {
        ChainStep::Next(text) => Ok(Outcome::Directive(text)),
        ChainStep::MissingOutput(text) => Ok(Outcome::Blocked(text)),
        ChainStep::Complete { flow_id } => on_flow_complete(ws, session, &flow_id),
    }
}

/// Hand-off after the last step of `flow_id` reported.
pub(crate) fn on_flow_complete(ws: &Workspace, session: &mut Session, flow_id: &str) -> Result<Outcome> {
    info!(session = %session.id, flow = flow_id, "flow complete");
    let dynamic = session
        .chain
        .as_ref()
        .is_some_and(|chain| chain.dynamic_flow.is_some());
    if dynamic {
        return Ok(Outcome::Complete(format!("Flow {flow_id} complete.")));
    }
    let kind = session.workflow.kind();
    match (kind, flow_id) {
        ("algorithm", ids::GATHER) => phase::enter_phase(ws, session, AlgorithmPhase::Interview),
        ("algorithm", ids::INTERVIEW | ids::INTERVIEW_REFINEMENT) => interview::evaluate(ws, session),
        ("algorithm", ids::VERIFY) => verify::evaluate(ws, session),
        ("decompose", ids::DECOMPOSE) => {
            let path = ws.paths.subtasks_path(&session.id);
            if path.is_file() {
                let defs = decompose::read_defs(&path)?;
                return decompose::register_subtasks(ws, session, &defs);
            }
            decompose::on_protocol_complete(ws, session)
        }
        ("decompose", ids::AGGREGATION) => decompose::complete_aggregation(ws, session),
        ("tdd", ids::TDD_RED | ids::TDD_GREEN | ids::TDD_REFACTOR | ids::TDD_DOC) => {
            tdd::on_flow_complete(ws, session)
        }
        ("scaffold", ids::SCAFFOLD | ids::SCAFFOLD_UPDATE) => scaffold::finish(ws, session),
        _ => Err(anyhow!("flow '{flow_id}' does not belong to a {kind} session")),
    }
}

fn ensure_in_progress(session: &Session) -> Result<()> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::phases::DecomposePhase;
    use crate::test_support::{at, temp_conductor, write_memories, write_memory};

    fn algorithm_session(ws: &Workspace, id: &str) -> Session {
        let mut session = Session::with_id(id, "add caching", WorkflowState::algorithm(), at(0));
        ws.save(&mut session).expect("save");
        session
    }

    #[test]
    fn gather_completion_starts_the_interview() {
        let (_temp, ws) = temp_conductor();
        let mut session = algorithm_session(&ws, "a-1");
        phase::enter_phase(&ws, &mut session, AlgorithmPhase::Gather).expect("gather");
        write_memories(&ws.paths, "a-1", &[Actor::Research, Actor::Analysis]);

        next(&ws, "a-1", Actor::Research).expect("research");
        let outcome = next(&ws, "a-1", Actor::Analysis).expect("analysis");
        assert!(outcome.text().contains("**Phase:** INTERVIEW"));
        assert!(outcome.text().contains("## Agent Invocation: clarification"));
        let stored = ws.load("a-1").expect("load");
        assert_eq!(stored.chain.expect("chain").flow_id, ids::INTERVIEW);
    }

    #[test]
    fn missing_memory_blocks() {
        let (_temp, ws) = temp_conductor();
        let mut session = algorithm_session(&ws, "a-2");
        phase::enter_phase(&ws, &mut session, AlgorithmPhase::Gather).expect("gather");
        let outcome = next(&ws, "a-2", Actor::Research).expect("next");
        assert!(matches!(outcome, Outcome::Blocked(_)));
    }

    #[test]
    fn resume_after_crash_reruns_the_completion_hand_off() {
        let (_temp, ws) = temp_conductor();
        let mut session = algorithm_session(&ws, "a-3");
        phase::enter_phase(&ws, &mut session, AlgorithmPhase::Gather).expect("gather");
        write_memories(&ws.paths, "a-3", &[Actor::Research, Actor::Analysis]);
        orchestrator::next_directive(&ws, &mut session, Actor::Research).expect("research");
        // The final report is persisted, then the process dies before the hand-off.
        let step = orchestrator::next_directive(&ws, &mut session, Actor::Analysis).expect("analysis");
        assert!(matches!(step, ChainStep::Complete { .. }));
        assert_eq!(ws.load("a-3").expect("load").workflow.phase_name(), "gather");

        let first = resume(&ws, "a-3").expect("resume");
        assert!(first.text().contains("**Phase:** INTERVIEW"));
        let second = resume(&ws, "a-3").expect("resume again");
        assert_eq!(first, second);
    }

    #[test]
    fn resume_reports_static_phases_and_completion() {
        let (_temp, ws) = temp_conductor();
        algorithm_session(&ws, "a-4");
        let outcome = resume(&ws, "a-4").expect("resume");
        assert!(outcome.text().contains("conductor phase a-4 gather"));

        let mut done = algorithm_session(&ws, "a-5");
        done.status = SessionStatus::Completed;
        ws.save(&mut done).expect("save");
        assert!(matches!(resume(&ws, "a-5").expect("resume"), Outcome::Complete(_)));
        assert!(next(&ws, "a-5", Actor::Research).is_err());
    }

    #[test]
    fn decompose_protocol_asks_for_subtasks_then_registers_them() {
        let (_temp, ws) = temp_conductor();
        let mut session = Session::with_id("d-1", "build it", WorkflowState::decompose(), at(0));
        ws.save(&mut session).expect("save");
        decompose::start(&ws, &mut session).expect("start");
        skip(&ws, "d-1", Actor::Clarification).expect("skip");
        write_memories(&ws.paths, "d-1", &[Actor::Analysis, Actor::Synthesis, Actor::Validation]);
        next(&ws, "d-1", Actor::Analysis).expect("analysis");
        next(&ws, "d-1", Actor::Synthesis).expect("synthesis");
        let outcome = next(&ws, "d-1", Actor::Validation).expect("validation");
        assert!(outcome.text().contains("conductor decompose d-1 .conductor/artifacts/d-1-subtasks.json"));

        std::fs::write(
            ws.paths.subtasks_path("d-1"),
            r#"[{"id": "A", "description": "first"}]"#,
        )
        .expect("write subtasks");
        let outcome = resume(&ws, "d-1").expect("resume");
        assert!(outcome.text().starts_with("## Route Subtask to GATHER"));
        let stored = ws.load("d-1").expect("load");
        assert_eq!(
            stored.decompose().expect("decompose").fsm.current(),
            DecomposePhase::Dispatching
        );
    }

    #[test]
    fn dynamic_flow_completes_without_touching_the_phase() {
        let (_temp, ws) = temp_conductor();
        algorithm_session(&ws, "a-6");
        let spec = DynamicFlowSpec::Actors(vec![Actor::Research, Actor::Synthesis]);
        let outcome = run_dynamic_flow(&ws, "a-6", &spec).expect("start");
        assert!(outcome.text().contains("## Agent Invocation: research"));
        assert!(run_dynamic_flow(&ws, "a-6", &spec).is_err(), "flow still running");

        write_memory(&ws.paths, "a-6", Actor::Research, "notes");
        write_memory(&ws.paths, "a-6", Actor::Synthesis, "summary");
        next(&ws, "a-6", Actor::Research).expect("research");
        let done = next(&ws, "a-6", Actor::Synthesis).expect("synthesis");
        match done {
            Outcome::Complete(text) => assert!(text.starts_with("Flow dynamic-")),
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(ws.load("a-6").expect("load").workflow.phase_name(), "initialized");
    }

    #[test]
    fn foreign_flow_is_rejected() {
        let (_temp, ws) = temp_conductor();
        let mut session = algorithm_session(&ws, "a-7");
        assert!(on_flow_complete(&ws, &mut session, ids::AGGREGATION).is_err());
    }
}
