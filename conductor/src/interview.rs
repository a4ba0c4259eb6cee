//! IDEAL STATE capture loop: score the artifact, refine until it is ready or
//! the iteration cap forces an exit.

use std::fs;

use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument};

use crate::core::completeness;
use crate::core::ideal_state::IdealState;
use crate::core::phases::{AlgorithmPhase, PhaseName};
use crate::core::registry::ids;
use crate::core::session::Session;
use crate::orchestrator;
use crate::outcome::Outcome;
use crate::phase::{self, algorithm_state};
use crate::workspace::Workspace;

/// First pass runs the full interview; later passes only refine.
pub fn flow_for(session: &Session) -> Result<&'static str> {
    let state = session
        .algorithm()
        .ok_or_else(|| anyhow!("session {} is not an algorithm session", session.id))?;
    Ok(if state.interview_iteration == 0 {
        ids::INTERVIEW
    } else {
        ids::INTERVIEW_REFINEMENT
    })
}

/// Score the IDEAL STATE artifact and route: refine again, or move on to the
/// inner loop.
#[instrument(skip(ws, session), fields(session = %session.id))]
pub fn evaluate(ws: &Workspace, session: &mut Session) -> Result<Outcome> {
    let current = algorithm_state(session)?.fsm.current();
    if !matches!(current, AlgorithmPhase::Interview | AlgorithmPhase::IdealState) {
        return Err(anyhow!(
            "session {} is in phase {}; the IDEAL STATE is scored during INTERVIEW",
            session.id,
            current.label()
        ));
    }

    let path = ws.paths.ideal_state_path(&session.id);
    if !path.is_file() {
        return Ok(Outcome::Blocked(format!(
            "Error: IDEAL STATE artifact required but not found: {}",
            ws.paths.display(&path)
        )));
    }
    let contents =
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let ideal: IdealState = serde_json::from_str(&contents)
        .with_context(|| format!("parse IDEAL STATE {}", path.display()))?;

    let score = completeness::score(Some(&ideal));
    let max = ws.config.max_interview_iterations;
    let ready = score.overall >= ws.config.readiness_threshold;

    let state = algorithm_state(session)?;
    state.interview_iteration += 1;
    let iteration = state.interview_iteration;
    state.ideal_state = Some(ideal);
    state.completeness = Some(score.clone());
    info!(iteration, overall = score.overall, ready, "IDEAL STATE scored");

    let report = ws.directives.completeness(&score, iteration, max)?;
    if ready || iteration >= max {
        if !state.fsm.transition(AlgorithmPhase::InnerLoop) {
            return Err(anyhow!("cannot leave {} for INNER_LOOP", current.label()));
        }
        let entry = phase::enter_current(ws, session)?;
        let mut text = report;
        if !ready {
            text.push_str(&format!(
                "\n\nMaximum interview iterations ({max}) reached; proceeding with the current IDEAL STATE."
            ));
        }
        return Ok(Outcome::Directive(format!("{}\n\n{}", text.trim_end(), entry.text())));
    }

    // A hand-written IDEAL STATE is refined in place; there is no flow to rerun.
    if current == AlgorithmPhase::IdealState {
        ws.save(session)?;
        return Ok(Outcome::Directive(format!(
            "{}\n\nRefine `{}` and run: `conductor interview {}`",
            report.trim_end(),
            ws.paths.display(&path),
            session.id
        )));
    }
    let step = orchestrator::start_flow(ws, session, ids::INTERVIEW_REFINEMENT)?;
    Ok(Outcome::Directive(format!(
        "{}\n\n{}",
        report.trim_end(),
        step.into_outcome().text()
    )))
}
