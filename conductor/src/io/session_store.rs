//! Session load/save with schema validation.
//!
//! Records are whole-file JSON, written atomically. A record that fails to
//! parse or validate is treated as corruption and reported, never repaired.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;
use tracing::{debug, instrument};

use super::init::ConductorPaths;
use crate::core::session::{SCHEMA_VERSION, Session};

const SESSION_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/session.v1.schema.json"
));

/// Load and validate `.conductor/sessions/{id}.json`.
#[instrument(skip(paths))]
pub fn load_session(paths: &ConductorPaths, session_id: &str) -> Result<Session> {
    check_session_id(session_id)?;
    let path = paths.session_path(session_id);
    if !path.is_file() {
        return Err(anyhow!("session not found: {session_id}"));
    }
    let session = read_session(&path)?;
    if session.id != session_id {
        return Err(anyhow!(
            "session file {} holds id {}",
            path.display(),
            session.id
        ));
    }
    debug!(kind = session.workflow.kind(), phase = session.workflow.phase_name(), "session loaded");
    Ok(session)
}

/// Atomically persist `session` (temp file + rename).
#[instrument(skip_all, fields(session = %session.id))]
pub fn save_session(paths: &ConductorPaths, session: &Session) -> Result<()> {
    check_session_id(&session.id)?;
    let value = serde_json::to_value(session).context("serialize session")?;
    validate_session_value(&value)
        .with_context(|| format!("refusing to write invalid session {}", session.id))?;
    let mut buf = serde_json::to_string_pretty(&value)?;
    buf.push('\n');
    super::write_atomic(&paths.session_path(&session.id), &buf)?;
    debug!(phase = session.workflow.phase_name(), status = session.status.as_str(), "session saved");
    Ok(())
}

/// Ids become file names under `sessions/`, so only `[A-Za-z0-9_-]` is
/// accepted.
pub fn check_session_id(session_id: &str) -> Result<()> {
    let valid = !session_id.is_empty()
        && session_id
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_');
    if !valid {
        return Err(anyhow!("invalid session id '{session_id}'"));
    }
    Ok(())
}

/// Every readable session, oldest first. Unreadable records fail the call.
pub fn list_sessions(paths: &ConductorPaths) -> Result<Vec<Session>> {
    if !paths.sessions_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut sessions = Vec::new();
    let entries = fs::read_dir(&paths.sessions_dir)
        .with_context(|| format!("read directory {}", paths.sessions_dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        sessions.push(read_session(&path)?);
    }
    sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(sessions)
}

fn read_session(path: &Path) -> Result<Session> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read session {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse session {}", path.display()))?;
    check_schema_version(&value).with_context(|| format!("session {}", path.display()))?;
    validate_session_value(&value).with_context(|| format!("session {}", path.display()))?;
    serde_json::from_value(value).with_context(|| format!("deserialize session {}", path.display()))
}

fn check_schema_version(value: &Value) -> Result<()> {
    match value.get("schema_version").and_then(Value::as_u64) {
        Some(version) if version == u64::from(SCHEMA_VERSION) => Ok(()),
        Some(version) => Err(anyhow!(
            "unsupported schema_version {version} (expected {SCHEMA_VERSION})"
        )),
        None => Err(anyhow!("missing schema_version")),
    }
}

fn validate_session_value(value: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(SESSION_SCHEMA).context("parse session schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(value) {
        let messages = compiled
            .iter_errors(value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "session schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}
