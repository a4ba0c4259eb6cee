//! VERIFY phase evaluation: score the execution artifacts, record the pass,
//! then proceed, loop back, or escalate.

use std::fs;

use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument, warn};

use crate::core::feedback::{FeedbackAction, decide};
use crate::core::phases::{AlgorithmPhase, PhaseName};
use crate::core::session::{HaltInfo, Session, SessionStatus};
use crate::core::verification::{Artifacts, verify};
use crate::outcome::Outcome;
use crate::phase::{self, algorithm_state};
use crate::workspace::Workspace;

/// Run one verification pass for a session in VERIFY.
#[instrument(skip(ws, session), fields(session = %session.id))]
pub fn evaluate(ws: &Workspace, session: &mut Session) -> Result<Outcome> {
    let current = algorithm_state(session)?.fsm.current();
    if current != AlgorithmPhase::Verify {
        return Err(anyhow!(
            "session {} is in phase {}, not VERIFY",
            session.id,
            current.label()
        ));
    }

    let path = ws.paths.verify_artifacts_path(&session.id);
    if !path.is_file() {
        return Ok(Outcome::Blocked(format!(
            "Error: Verification artifacts required but not found: {}",
            ws.paths.display(&path)
        )));
    }
    let artifacts = read_artifacts(&path)?;

    let max = ws.config.max_verify_iterations;
    let now = ws.now();
    let session_id = session.id.clone();
    let state = algorithm_state(session)?;
    let iteration = state.verify_iteration + 1;
    let ideal = state.ideal_state.clone().unwrap_or_default();
    let result = verify(&ideal, &artifacts, iteration, now);
    let decision = decide(&result, iteration, max);
    info!(
        iteration,
        overall = result.overall_score,
        status = result.status.label(),
        action = ?decision.action,
        "verification pass"
    );
    let report = ws
        .directives
        .verification(&session_id, &result, &decision, max)?;

    state.verification_history.push(result);
    state.verify_iteration = iteration;

    match decision.action {
        FeedbackAction::Proceed => {
            if !state.fsm.transition(AlgorithmPhase::Learn) {
                return Err(anyhow!("cannot move from VERIFY to LEARN"));
            }
            let entry = phase::enter_current(ws, session)?;
            Ok(Outcome::Directive(join(&report, entry.text())))
        }
        FeedbackAction::LoopBack => {
            if !state.fsm.loop_back(AlgorithmPhase::InnerLoop) {
                return Err(anyhow!("cannot loop back from VERIFY to INNER_LOOP"));
            }
            let entry = phase::enter_current(ws, session)?;
            Ok(Outcome::Directive(join(&report, entry.text())))
        }
        FeedbackAction::Escalate => {
            if !state.fsm.transition(AlgorithmPhase::Halted) {
                return Err(anyhow!("cannot halt from VERIFY"));
            }
            let gaps = state
                .verification_history
                .last()
                .map(|result| result.gaps.clone())
                .unwrap_or_default();
            state.halt = Some(HaltInfo {
                reason: decision.message.clone(),
                questions: gaps,
                resume_phase: AlgorithmPhase::InnerLoop,
            });
            session.status = SessionStatus::Escalated;
            session.chain = None;
            ws.save(session)?;
            warn!(iteration, "verification escalated to user review");
            Ok(Outcome::Escalated(format!(
                "{}\n\nAfter review, run: `conductor resume {}`",
                report.trim_end(),
                session_id
            )))
        }
    }
}

fn read_artifacts(path: &std::path::Path) -> Result<Artifacts> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("parse verification artifacts {}", path.display()))
}

fn join(report: &str, entry: &str) -> String {
    format!("{}\n\n{}", report.trim_end(), entry)
}
