//! TDD cycle: RED → GREEN → REFACTOR → DOC, repeated on request.

use anyhow::{Result, anyhow};
use tracing::{info, instrument};

use crate::core::phases::{PhaseName, TddPhase};
use crate::core::registry::ids;
use crate::core::session::{Session, SessionStatus, TddState};
use crate::orchestrator;
use crate::outcome::Outcome;
use crate::workspace::Workspace;

/// Flow run while the cycle is in `phase`.
pub fn flow_for(phase: TddPhase) -> Option<&'static str> {
    match phase {
        TddPhase::Red => Some(ids::TDD_RED),
        TddPhase::Green => Some(ids::TDD_GREEN),
        TddPhase::Refactor => Some(ids::TDD_REFACTOR),
        TddPhase::Doc => Some(ids::TDD_DOC),
        TddPhase::Initialized | TddPhase::Completed => None,
    }
}

/// The `conductor tdd` command. Starts the cycle, finishes it, or begins
/// another RED pass when `another_cycle` is set after DOC.
#[instrument(skip(ws, session), fields(session = %session.id))]
pub fn advance(ws: &Workspace, session: &mut Session, another_cycle: bool) -> Result<Outcome> {
    let phase = tdd_state(session)?.fsm.current();
    match phase {
        TddPhase::Initialized => enter(ws, session, TddPhase::Red),
        TddPhase::Completed => Ok(Outcome::Complete(completed_text(session))),
        TddPhase::Doc if doc_finished(ws, session)? => {
            if another_cycle {
                let state = tdd_state(session)?;
                if !state.fsm.loop_back(TddPhase::Red) {
                    return Err(anyhow!("cannot loop back from DOC to RED"));
                }
                info!(cycle = state.fsm.cycle_count() + 1, "new TDD cycle");
                let step = orchestrator::start_flow(ws, session, ids::TDD_RED)?;
                return Ok(step.into_outcome());
            }
            let state = tdd_state(session)?;
            if !state.fsm.transition(TddPhase::Completed) {
                return Err(anyhow!("cannot complete from DOC"));
            }
            session.status = SessionStatus::Completed;
            session.chain = None;
            ws.save(session)?;
            info!("TDD session completed");
            Ok(Outcome::Complete(completed_text(session)))
        }
        _ if another_cycle => Err(anyhow!(
            "a new cycle can start only after DOC completes; session is in {}",
            phase.label()
        )),
        _ => Ok(orchestrator::current_directive(ws, session)?.into_outcome()),
    }
}

/// A phase flow finished: move to the next phase and start its flow. DOC
/// waits for the caller to choose between finishing and another cycle.
pub(crate) fn on_flow_complete(ws: &Workspace, session: &mut Session) -> Result<Outcome> {
    let state = tdd_state(session)?;
    let phase = state.fsm.current();
    if phase == TddPhase::Doc {
        let cycle = state.fsm.cycle_count() + 1;
        let target = state
            .target
            .as_deref()
            .map(|target| format!(" for `{target}`"))
            .unwrap_or_default();
        return Ok(Outcome::Directive(format!(
            "TDD cycle {cycle}{target} documented. Run `conductor tdd {id}` to finish or \
`conductor tdd {id} --cycle` for another RED/GREEN/REFACTOR cycle.",
            id = session.id
        )));
    }
    let next = phase
        .next()
        .ok_or_else(|| anyhow!("TDD phase {} has no successor", phase.label()))?;
    enter(ws, session, next)
}

fn enter(ws: &Workspace, session: &mut Session, target: TddPhase) -> Result<Outcome> {
    let state = tdd_state(session)?;
    let from = state.fsm.current();
    if !state.fsm.transition(target) {
        return Err(anyhow!(
            "illegal TDD transition {} -> {}",
            from.label(),
            target.label()
        ));
    }
    let flow_id = flow_for(target).ok_or_else(|| anyhow!("TDD phase {} has no flow", target.label()))?;
    info!(from = from.as_str(), to = target.as_str(), "TDD phase entered");
    Ok(orchestrator::start_flow(ws, session, flow_id)?.into_outcome())
}

fn doc_finished(ws: &Workspace, session: &Session) -> Result<bool> {
    let Some(chain) = &session.chain else {
        return Ok(false);
    };
    if chain.flow_id != ids::TDD_DOC {
        return Ok(false);
    }
    let flow = orchestrator::active_flow(ws, session)?;
    Ok(chain.is_complete(&flow))
}

fn completed_text(session: &Session) -> String {
    format!("TDD cycle completed. Session: {}", session.id)
}

fn tdd_state(session: &mut Session) -> Result<&mut TddState> {
    let id = session.id.clone();
    let kind = session.workflow.kind();
    session
        .tdd_mut()
        .ok_or_else(|| anyhow!("session {id} is a {kind} session, not a tdd session"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::actor::Actor;
    use crate::core::session::WorkflowState;
    use crate::orchestrator::ChainStep;
    use crate::test_support::{at, temp_conductor, write_memories};

    fn walk_flow(ws: &Workspace, session: &mut Session) {
        let flow = orchestrator::active_flow(ws, session).expect("flow");
        let actors: Vec<Actor> = flow.steps().iter().map(|step| step.actor).collect();
        write_memories(&ws.paths, &session.id, &actors);
        for actor in actors {
            let step = orchestrator::next_directive(ws, session, actor).expect("next");
            if let ChainStep::Complete { .. } = step {
                return;
            }
        }
    }

    fn phase(session: &Session) -> &'static str {
        session.workflow.phase_name()
    }

    #[test]
    fn cycle_walks_every_phase_then_completes() {
        let (_temp, ws) = temp_conductor();
        let mut session =
            Session::with_id("t-1", "parse dates", WorkflowState::tdd(Some("src/date.rs".to_string())), at(0));
        ws.save(&mut session).expect("save");

        let outcome = advance(&ws, &mut session, false).expect("start");
        assert!(outcome.text().contains("## Agent Invocation: clarification"));
        assert_eq!(phase(&session), "red");

        for expected in ["green", "refactor", "doc"] {
            walk_flow(&ws, &mut session);
            on_flow_complete(&ws, &mut session).expect("advance");
            assert_eq!(phase(&session), expected);
        }
        walk_flow(&ws, &mut session);
        let text = on_flow_complete(&ws, &mut session).expect("doc done");
        assert!(text.text().starts_with("TDD cycle 1 for `src/date.rs` documented."));
        assert_eq!(phase(&session), "doc");

        let done = advance(&ws, &mut session, false).expect("finish");
        assert_eq!(done, Outcome::Complete("TDD cycle completed. Session: t-1".to_string()));
        let stored = ws.load("t-1").expect("load");
        assert_eq!(stored.status, SessionStatus::Completed);
        assert_eq!(phase(&stored), "completed");
    }

    #[test]
    fn another_cycle_loops_back_to_red() {
        let (_temp, ws) = temp_conductor();
        let mut session = Session::with_id("t-2", "q", WorkflowState::tdd(None), at(0));
        ws.save(&mut session).expect("save");
        advance(&ws, &mut session, false).expect("start");
        assert!(advance(&ws, &mut session, true).is_err(), "cycle only after DOC");

        for _ in 0..3 {
            walk_flow(&ws, &mut session);
            on_flow_complete(&ws, &mut session).expect("advance");
        }
        walk_flow(&ws, &mut session);

        let outcome = advance(&ws, &mut session, true).expect("cycle");
        assert!(outcome.text().contains("**Phase:** RED"));
        let stored = ws.load("t-2").expect("load");
        assert_eq!(phase(&stored), "red");
        match &stored.workflow {
            WorkflowState::Tdd(state) => assert_eq!(state.fsm.cycle_count(), 1),
            other => panic!("expected tdd workflow, got {other:?}"),
        }
    }

    #[test]
    fn mid_phase_advance_reemits_the_current_step() {
        let (_temp, ws) = temp_conductor();
        let mut session = Session::with_id("t-3", "q", WorkflowState::tdd(None), at(0));
        ws.save(&mut session).expect("save");
        let first = advance(&ws, &mut session, false).expect("start");
        let again = advance(&ws, &mut session, false).expect("again");
        assert_eq!(first, again);
    }
}
