use std::fs;

use conductor::core::actor::Actor;
use conductor::core::phases::DecomposePhase;
use conductor::core::registry::ids;
use conductor::core::session::{Session, SessionStatus, WorkflowState};
use conductor::core::subtasks::SubtaskDef;
use conductor::decompose::{self, ChildOutcome};
use conductor::driver;
use conductor::outcome::Outcome;
use conductor::phase;
use conductor::test_support::{temp_conductor, write_memories, write_memory};
use conductor::workspace::Workspace;

fn def(id: &str, description: &str, dependencies: &[&str]) -> SubtaskDef {
    SubtaskDef {
        id: id.to_string(),
        description: description.to_string(),
        dependencies: dependencies.iter().map(|dep| dep.to_string()).collect(),
    }
}

fn decomposing_parent(ws: &Workspace) -> Session {
    let mut parent =
        phase::create_session(ws, "ship the billing service", WorkflowState::decompose())
            .expect("create");
    decompose::start(ws, &mut parent).expect("start");
    ws.load(&parent.id).expect("reload")
}

fn child_id(ws: &Workspace, parent_id: &str, symbolic: &str) -> String {
    let parent = ws.load(parent_id).expect("load parent");
    parent
        .decompose()
        .expect("decompose state")
        .subtasks
        .entries()
        .iter()
        .find(|entry| entry.symbolic_id == symbolic)
        .map(|entry| entry.session_id.clone())
        .expect("registered child")
}

fn finish_child(ws: &Workspace, id: &str) {
    let mut child = ws.load(id).expect("load child");
    child.status = SessionStatus::Completed;
    ws.save(&mut child).expect("save child");
}

#[test]
fn dependent_subtasks_run_in_order_then_aggregate() {
    let (_temp, ws) = temp_conductor();
    let mut parent = decomposing_parent(&ws);
    let parent_id = parent.id.clone();

    let routed = decompose::register_subtasks(
        &ws,
        &mut parent,
        &[
            def("schema", "design the invoice schema", &[]),
            def("api", "expose invoice endpoints", &["schema"]),
        ],
    )
    .expect("register");
    let schema = child_id(&ws, &parent_id, "schema");
    let api = child_id(&ws, &parent_id, "api");
    assert!(routed.text().contains(&format!("**Session:** {schema}")));

    let child = ws.load(&schema).expect("child");
    assert_eq!(child.parent_id.as_deref(), Some(parent_id.as_str()));
    assert_eq!(child.query, "design the invoice schema");

    assert!(decompose::on_child_complete(&ws, &schema).is_err(), "child not finished");

    finish_child(&ws, &schema);
    match decompose::on_child_complete(&ws, &schema).expect("schema done") {
        ChildOutcome::Next(text) => assert!(text.contains(&format!("**Session:** {api}"))),
        other => panic!("expected the api subtask, got {other:?}"),
    }

    finish_child(&ws, &api);
    let aggregate = decompose::on_child_complete(&ws, &api).expect("api done");
    let text = match aggregate {
        ChildOutcome::Aggregate(text) => text,
        other => panic!("expected aggregation, got {other:?}"),
    };
    assert!(text.contains("## Agent Invocation:"));
    assert!(text.contains("## Subtask schema: design the invoice schema"));

    let stored = ws.load(&parent_id).expect("parent");
    assert_eq!(
        stored.decompose().expect("decompose").fsm.current(),
        DecomposePhase::Aggregating
    );
    assert_eq!(stored.chain.as_ref().expect("chain").flow_id, ids::AGGREGATION);

    let actors: Vec<Actor> = ws
        .registry
        .get(ids::AGGREGATION)
        .expect("flow")
        .steps()
        .iter()
        .map(|step| step.actor)
        .collect();
    write_memories(&ws.paths, &parent_id, &actors);
    let mut last = None;
    for actor in actors {
        last = Some(driver::next(&ws, &parent_id, actor).expect("aggregate step"));
    }
    assert_eq!(
        last.expect("steps"),
        Outcome::Complete(format!("Aggregation complete. Session: {parent_id}"))
    );
    assert_eq!(
        ws.load(&parent_id).expect("parent").status,
        SessionStatus::Completed
    );
}

#[test]
fn independent_subtasks_are_all_ready() {
    let (_temp, ws) = temp_conductor();
    let mut parent = decomposing_parent(&ws);
    decompose::register_subtasks(
        &ws,
        &mut parent,
        &[
            def("a", "first", &[]),
            def("b", "second", &[]),
            def("c", "join", &["a", "b"]),
        ],
    )
    .expect("register");

    let ready = decompose::get_ready(&ws.load(&parent.id).expect("load")).expect("ready");
    let symbols: Vec<&str> = ready.iter().map(|entry| entry.symbolic_id.as_str()).collect();
    assert_eq!(symbols, ["a", "b"]);
}

#[test]
fn join_subtask_waits_for_every_dependency() {
    let (_temp, ws) = temp_conductor();
    let mut parent = decomposing_parent(&ws);
    let parent_id = parent.id.clone();
    decompose::register_subtasks(
        &ws,
        &mut parent,
        &[
            def("a", "first", &[]),
            def("b", "second", &[]),
            def("c", "join", &["a", "b"]),
        ],
    )
    .expect("register");
    let a = child_id(&ws, &parent_id, "a");
    let b = child_id(&ws, &parent_id, "b");

    finish_child(&ws, &a);
    match decompose::on_child_complete(&ws, &a).expect("a done") {
        ChildOutcome::Next(text) => assert!(text.contains(&format!("**Session:** {b}"))),
        other => panic!("expected b, got {other:?}"),
    }
    // Reporting the same child twice does not unlock anything new.
    match decompose::on_child_complete(&ws, &a).expect("a again") {
        ChildOutcome::Next(text) => assert!(text.contains(&format!("**Session:** {b}"))),
        other => panic!("expected b, got {other:?}"),
    }
}

#[test]
fn invalid_definitions_leave_the_parent_untouched() {
    let (_temp, ws) = temp_conductor();
    let mut parent = decomposing_parent(&ws);
    let before = ws.load(&parent.id).expect("load");

    let cycle = decompose::register_subtasks(
        &ws,
        &mut parent,
        &[def("a", "first", &["b"]), def("b", "second", &["a"])],
    );
    assert!(cycle.is_err());
    let unknown = decompose::register_subtasks(&ws, &mut parent, &[def("a", "first", &["zzz"])]);
    assert!(unknown.is_err());

    assert_eq!(ws.load(&parent.id).expect("load"), before);
    let sessions = fs::read_dir(&ws.paths.sessions_dir).expect("sessions").count();
    assert_eq!(sessions, 1, "no child sessions were created");
}

#[test]
fn standalone_sessions_are_not_subtasks() {
    let (_temp, ws) = temp_conductor();
    let session = phase::create_session(&ws, "alone", WorkflowState::algorithm()).expect("create");
    let outcome = decompose::on_child_complete(&ws, &session.id).expect("report");
    assert!(matches!(outcome, ChildOutcome::NotSubtask(_)));
    assert!(outcome.into_outcome().is_directive());
}

#[test]
fn subtask_file_is_picked_up_after_the_protocol_flow() {
    let (_temp, ws) = temp_conductor();
    let parent = decomposing_parent(&ws);
    let id = parent.id.clone();

    driver::skip(&ws, &id, Actor::Clarification).expect("skip clarification");
    for actor in [Actor::Analysis, Actor::Synthesis, Actor::Validation] {
        write_memory(&ws.paths, &id, actor, "## Section 3: Downstream Directives\n- split by layer\n");
    }
    driver::next(&ws, &id, Actor::Analysis).expect("analysis");
    driver::next(&ws, &id, Actor::Synthesis).expect("synthesis");
    let ready = driver::next(&ws, &id, Actor::Validation).expect("validation");
    assert!(ready.text().contains("## Decomposition Ready"));

    let path = ws.paths.subtasks_path(&id);
    fs::write(&path, r#"[{"id": "only", "description": "the one subtask"}]"#).expect("write defs");
    let defs = decompose::read_defs(&path).expect("read defs");
    let mut parent = ws.load(&id).expect("load");
    let routed = decompose::register_subtasks(&ws, &mut parent, &defs).expect("register");
    assert!(routed.text().starts_with("## Route Subtask to GATHER"));
}
