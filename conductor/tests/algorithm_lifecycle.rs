use std::collections::BTreeMap;

use conductor::core::actor::Actor;
use conductor::core::phases::AlgorithmPhase;
use conductor::core::registry::ids;
use conductor::core::session::{Session, SessionStatus, WorkflowState};
use conductor::core::verification::{PhaseReport, ReportStatus, TestResults};
use conductor::driver;
use conductor::outcome::Outcome;
use conductor::phase;
use conductor::test_support::{complete_ideal_state, temp_conductor, write_artifact, write_memories};
use conductor::workspace::Workspace;

fn flow_actors(ws: &Workspace, flow_id: &str) -> Vec<Actor> {
    ws.registry
        .get(flow_id)
        .expect("flow registered")
        .steps()
        .iter()
        .map(|step| step.actor)
        .collect()
}

/// Report every step of `flow_id` in order and return the last outcome.
fn walk(ws: &Workspace, session_id: &str, flow_id: &str) -> Outcome {
    let actors = flow_actors(ws, flow_id);
    write_memories(&ws.paths, session_id, &actors);
    let mut last = None;
    for actor in actors {
        last = Some(driver::next(ws, session_id, actor).expect("next"));
    }
    last.expect("flow has steps")
}

fn verified_artifacts() -> BTreeMap<String, PhaseReport> {
    BTreeMap::from([(
        "execute".to_string(),
        PhaseReport {
            test_results: Some(TestResults {
                passed: 12,
                failed: 0,
            }),
            status: Some(ReportStatus::Completed),
            all_criteria_met: true,
            lint_score: Some(10.0),
            semantic_score: Some(1.0),
            ..PhaseReport::default()
        },
    )])
}

fn gap_artifacts() -> BTreeMap<String, PhaseReport> {
    BTreeMap::from([(
        "execute".to_string(),
        PhaseReport {
            test_results: Some(TestResults {
                passed: 7,
                failed: 3,
            }),
            status: Some(ReportStatus::Completed),
            ..PhaseReport::default()
        },
    )])
}

fn phase_of(ws: &Workspace, session_id: &str) -> String {
    ws.load(session_id)
        .expect("load")
        .workflow
        .phase_name()
        .to_string()
}

/// Drive a fresh session to the start of VERIFY.
fn reach_verify(ws: &Workspace) -> Session {
    let mut session = phase::create_session(ws, "add a read cache", WorkflowState::algorithm())
        .expect("create");
    let id = session.id.clone();

    phase::enter_phase(ws, &mut session, AlgorithmPhase::Gather).expect("gather");
    let interview = walk(ws, &id, ids::GATHER);
    assert!(interview.text().contains("**Phase:** INTERVIEW"));

    write_artifact(
        &ws.paths,
        &format!("{id}-ideal-state.json"),
        &complete_ideal_state(),
    );
    let ready = walk(ws, &id, ids::INTERVIEW);
    assert!(ready.text().contains("INNER_LOOP"), "{}", ready.text());
    assert_eq!(phase_of(ws, &id), "inner_loop");

    let mut session = ws.load(&id).expect("load");
    for target in [
        AlgorithmPhase::Observe,
        AlgorithmPhase::Think,
        AlgorithmPhase::Plan,
        AlgorithmPhase::Build,
        AlgorithmPhase::Execute,
    ] {
        let outcome = phase::enter_phase(ws, &mut session, target).expect("static phase");
        assert!(outcome.is_directive());
    }
    let verify = phase::enter_phase(ws, &mut session, AlgorithmPhase::Verify).expect("verify");
    assert!(verify.text().contains("**Phase:** VERIFY"));
    session
}

#[test]
fn algorithm_session_runs_from_gather_to_completion() {
    let (_temp, ws) = temp_conductor();
    let session = reach_verify(&ws);
    let id = session.id.clone();

    write_artifact(&ws.paths, &format!("{id}-verify.json"), &verified_artifacts());
    let learn = walk(&ws, &id, ids::VERIFY);
    assert!(learn.text().starts_with("## Verification Result: VERIFIED"));
    assert!(learn.text().contains("## Phase: LEARN"));
    assert_eq!(phase_of(&ws, &id), "learn");

    let mut session = ws.load(&id).expect("load");
    let done = phase::enter_phase(&ws, &mut session, AlgorithmPhase::Completed).expect("complete");
    assert!(matches!(done, Outcome::Complete(_)));
    let stored = ws.load(&id).expect("load");
    assert_eq!(stored.status, SessionStatus::Completed);
    assert!(stored.chain.is_none());
    assert_eq!(
        stored.algorithm().expect("algorithm").verification_history.len(),
        1
    );
}

#[test]
fn unresolved_gaps_loop_back_then_escalate() {
    let (_temp, ws) = temp_conductor();
    let session = reach_verify(&ws);
    let id = session.id.clone();
    write_artifact(&ws.paths, &format!("{id}-verify.json"), &gap_artifacts());

    for pass in 1..=2 {
        let outcome = walk(&ws, &id, ids::VERIFY);
        assert!(outcome.text().contains("**LOOP_BACK**"), "pass {pass}");
        assert_eq!(phase_of(&ws, &id), "inner_loop");

        let mut session = ws.load(&id).expect("load");
        for target in [
            AlgorithmPhase::Observe,
            AlgorithmPhase::Think,
            AlgorithmPhase::Plan,
            AlgorithmPhase::Build,
            AlgorithmPhase::Execute,
            AlgorithmPhase::Verify,
        ] {
            phase::enter_phase(&ws, &mut session, target).expect("re-enter");
        }
    }

    let escalated = walk(&ws, &id, ids::VERIFY);
    assert!(matches!(escalated, Outcome::Escalated(_)));
    assert!(escalated.text().contains(&format!("`conductor resume {id}`")));
    let stored = ws.load(&id).expect("load");
    assert_eq!(stored.status, SessionStatus::Escalated);
    assert_eq!(stored.workflow.phase_name(), "halted");

    let resumed = driver::resume(&ws, &id).expect("resume");
    assert!(resumed.text().contains("INNER_LOOP"));
    let stored = ws.load(&id).expect("load");
    assert_eq!(stored.status, SessionStatus::InProgress);
    assert_eq!(stored.algorithm().expect("algorithm").verify_iteration, 0);
}

#[test]
fn resume_re_derives_the_outstanding_directive() {
    let (_temp, ws) = temp_conductor();
    let mut session = phase::create_session(&ws, "document the api", WorkflowState::algorithm())
        .expect("create");
    let id = session.id.clone();
    let started = phase::enter_phase(&ws, &mut session, AlgorithmPhase::Gather).expect("gather");

    // A caller that lost the printed directive gets the same text back.
    assert_eq!(driver::resume(&ws, &id).expect("resume"), started);
    assert_eq!(driver::resume(&ws, &id).expect("resume twice"), started);

    let actors = flow_actors(&ws, ids::GATHER);
    write_memories(&ws.paths, &id, &actors[..1]);
    let second = driver::next(&ws, &id, actors[0]).expect("first step");
    assert_eq!(driver::resume(&ws, &id).expect("resume mid-flow"), second);
}

#[test]
fn halt_and_resume_return_to_the_interrupted_flow() {
    let (_temp, ws) = temp_conductor();
    let mut session = phase::create_session(&ws, "migrate the schema", WorkflowState::algorithm())
        .expect("create");
    let id = session.id.clone();
    let started = phase::enter_phase(&ws, &mut session, AlgorithmPhase::Gather).expect("gather");

    let halted = phase::halt(
        &ws,
        &mut session,
        "Need the target database",
        vec!["Postgres or SQLite?".to_string()],
    )
    .expect("halt");
    assert!(halted.text().contains("1. Postgres or SQLite?"));
    assert_eq!(ws.load(&id).expect("load").status, SessionStatus::Halted);
    assert!(driver::next(&ws, &id, Actor::Research).is_err());

    let resumed = driver::resume(&ws, &id).expect("resume");
    assert_eq!(resumed, started);
    assert_eq!(phase_of(&ws, &id), "gather");
}

#[test]
fn session_records_survive_reload_byte_for_byte() {
    let (_temp, ws) = temp_conductor();
    let mut session = phase::create_session(&ws, "q", WorkflowState::algorithm()).expect("create");
    phase::enter_phase(&ws, &mut session, AlgorithmPhase::Gather).expect("gather");
    let loaded = ws.load(&session.id).expect("load");
    assert_eq!(loaded, session);
}
