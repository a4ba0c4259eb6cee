//! Test-only helpers for building initialized workspaces and fixtures.

use std::fs;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tempfile::TempDir;

use crate::core::actor::Actor;
use crate::core::ideal_state::{IdealState, SuccessCriterion, SuccessMetric};
use crate::io::config::ConductorConfig;
use crate::io::init::{ConductorPaths, InitOptions, init_conductor};
use crate::workspace::Workspace;

/// Fixed timestamp `secs` after the epoch.
pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).expect("timestamp in range")
}

/// A temp directory with `.conductor/` scaffolding in place.
pub fn temp_workspace() -> (TempDir, ConductorPaths) {
    let temp = tempfile::tempdir().expect("tempdir");
    let paths = init_conductor(temp.path(), &InitOptions { force: false }).expect("init");
    (temp, paths)
}

/// Same as [`temp_workspace`], opened as a [`Workspace`] with default config.
pub fn temp_conductor() -> (TempDir, Workspace) {
    let (temp, paths) = temp_workspace();
    let ws = Workspace::with_config(paths, ConductorConfig::default()).expect("workspace");
    (temp, ws)
}

/// Write an actor's memory file.
pub fn write_memory(paths: &ConductorPaths, session_id: &str, actor: Actor, content: &str) {
    fs::write(paths.memory_path(session_id, actor), content).expect("write memory");
}

/// Write every memory file of a flow so the chain can be walked end to end.
pub fn write_memories(paths: &ConductorPaths, session_id: &str, actors: &[Actor]) {
    for &actor in actors {
        write_memory(
            paths,
            session_id,
            actor,
            &format!("## Section 3: Downstream Directives\n- {actor} done\n"),
        );
    }
}

/// Serialize `value` as pretty JSON into the artifacts directory.
pub fn write_artifact<T: Serialize>(paths: &ConductorPaths, file_name: &str, value: &T) {
    let body = serde_json::to_string_pretty(value).expect("encode artifact");
    fs::write(paths.artifacts_dir.join(file_name), body).expect("write artifact");
}

/// An IDEAL STATE that scores 1.0 on completeness.
pub fn complete_ideal_state() -> IdealState {
    IdealState {
        objective: Some("Serve cached reads under 10ms".to_string()),
        euphoric_surprise: Some("Cold starts disappear".to_string()),
        success_criteria: vec![
            SuccessCriterion {
                description: "p99 read latency below 10ms".to_string(),
                verification_method: Some("load test".to_string()),
                verified: false,
            },
            SuccessCriterion {
                description: "cache invalidates on write".to_string(),
                verification_method: Some("integration test".to_string()),
                verified: false,
            },
        ],
        success_metrics: vec![SuccessMetric {
            name: Some("p99_latency".to_string()),
            target_value: Some(serde_json::json!(10)),
            unit: Some("ms".to_string()),
        }],
        verification_method: Some("automated test suite".to_string()),
        anti_criteria: vec!["no stale reads".to_string(), "no new services".to_string()],
        exit_conditions: vec!["all criteria verified".to_string(), "budget spent".to_string()],
    }
}
