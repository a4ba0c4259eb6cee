//! Subtask dependency graph for decomposed work.
//!
//! Entries keep caller input order; every "first ready" question is answered
//! in that order and nothing else breaks ties.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller-supplied subtask definition with symbolic dependency ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskDef {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// A registered subtask, keyed by its child session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskEntry {
    pub symbolic_id: String,
    pub session_id: String,
    pub description: String,
    /// Child session ids this entry waits on.
    pub dependencies: Vec<String>,
    pub complete: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubtaskError {
    #[error("no subtasks supplied")]
    Empty,
    #[error("duplicate subtask id '{0}'")]
    DuplicateId(String),
    #[error("subtask '{0}' depends on itself")]
    SelfDependency(String),
    #[error("subtask '{subtask}' depends on unknown subtask '{dependency}'")]
    UnknownDependency { subtask: String, dependency: String },
    #[error("subtask dependencies form a cycle through: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskGraph {
    entries: Vec<SubtaskEntry>,
}

impl SubtaskGraph {
    /// Validate `defs` and resolve symbolic dependencies to session ids.
    ///
    /// `session_id_for` is called once per definition, in input order, and
    /// only after validation succeeds.
    pub fn resolve(
        defs: &[SubtaskDef],
        mut session_id_for: impl FnMut(&SubtaskDef) -> String,
    ) -> Result<Self, SubtaskError> {
        validate_defs(defs)?;
        let session_ids: Vec<String> = defs.iter().map(&mut session_id_for).collect();
        let by_symbol: HashMap<&str, &str> = defs
            .iter()
            .zip(&session_ids)
            .map(|(def, session)| (def.id.as_str(), session.as_str()))
            .collect();

        let entries = defs
            .iter()
            .zip(&session_ids)
            .map(|(def, session)| SubtaskEntry {
                symbolic_id: def.id.clone(),
                session_id: session.clone(),
                description: def.description.clone(),
                dependencies: def
                    .dependencies
                    .iter()
                    .map(|dep| by_symbol[dep.as_str()].to_string())
                    .collect(),
                complete: false,
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[SubtaskEntry] {
        &self.entries
    }

    pub fn get(&self, session_id: &str) -> Option<&SubtaskEntry> {
        self.entries.iter().find(|entry| entry.session_id == session_id)
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.get(session_id).is_some()
    }

    fn is_complete(&self, session_id: &str) -> bool {
        self.get(session_id).is_some_and(|entry| entry.complete)
    }

    /// Incomplete entries whose dependencies are all complete, in input order.
    pub fn ready(&self) -> Vec<&SubtaskEntry> {
        self.entries
            .iter()
            .filter(|entry| !entry.complete)
            .filter(|entry| entry.dependencies.iter().all(|dep| self.is_complete(dep)))
            .collect()
    }

    pub fn first_ready(&self) -> Option<&SubtaskEntry> {
        self.ready().into_iter().next()
    }

    /// Mark a child complete. Returns false when the id is not in the graph.
    pub fn mark_complete(&mut self, session_id: &str) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.session_id == session_id)
        {
            Some(entry) => {
                entry.complete = true;
                true
            }
            None => false,
        }
    }

    pub fn all_complete(&self) -> bool {
        self.entries.iter().all(|entry| entry.complete)
    }

    pub fn completed(&self) -> impl Iterator<Item = &SubtaskEntry> {
        self.entries.iter().filter(|entry| entry.complete)
    }
}

fn validate_defs(defs: &[SubtaskDef]) -> Result<(), SubtaskError> {
    if defs.is_empty() {
        return Err(SubtaskError::Empty);
    }
    let mut ids = HashSet::new();
    for def in defs {
        if !ids.insert(def.id.as_str()) {
            return Err(SubtaskError::DuplicateId(def.id.clone()));
        }
    }
    for def in defs {
        for dep in &def.dependencies {
            if dep == &def.id {
                return Err(SubtaskError::SelfDependency(def.id.clone()));
            }
            if !ids.contains(dep.as_str()) {
                return Err(SubtaskError::UnknownDependency {
                    subtask: def.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }
    detect_cycle(defs)
}

/// Kahn's algorithm; whatever cannot be scheduled sits on a cycle or behind one.
fn detect_cycle(defs: &[SubtaskDef]) -> Result<(), SubtaskError> {
    let mut done: HashSet<&str> = HashSet::new();
    loop {
        let before = done.len();
        for def in defs {
            if !done.contains(def.id.as_str())
                && def.dependencies.iter().all(|dep| done.contains(dep.as_str()))
            {
                done.insert(def.id.as_str());
            }
        }
        if done.len() == defs.len() {
            return Ok(());
        }
        if done.len() == before {
            let stuck = defs
                .iter()
                .filter(|def| !done.contains(def.id.as_str()))
                .map(|def| def.id.clone())
                .collect();
            return Err(SubtaskError::Cycle(stuck));
        }
    }
}
