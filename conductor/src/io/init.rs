//! Layout of `.conductor/` and the `conductor init` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use super::config::{ConductorConfig, write_config};
use crate::core::actor::Actor;

/// Directory name under the project root.
pub const CONDUCTOR_DIR: &str = ".conductor";

/// Files every actor's learnings directory starts with.
pub const LEARNING_FILES: [&str; 3] = ["heuristics.md", "anti-patterns.md", "checklists.md"];

/// All canonical paths within `.conductor/` for a project root.
#[derive(Debug, Clone)]
pub struct ConductorPaths {
    pub root: PathBuf,
    pub conductor_dir: PathBuf,
    pub sessions_dir: PathBuf,
    pub memory_dir: PathBuf,
    pub learnings_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub config_path: PathBuf,
    pub gitignore_path: PathBuf,
}

impl ConductorPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let conductor_dir = root.join(CONDUCTOR_DIR);
        Self {
            root: root.clone(),
            sessions_dir: conductor_dir.join("sessions"),
            memory_dir: conductor_dir.join("memory"),
            learnings_dir: conductor_dir.join("learnings"),
            artifacts_dir: conductor_dir.join("artifacts"),
            config_path: conductor_dir.join("config.toml"),
            gitignore_path: conductor_dir.join(".gitignore"),
            conductor_dir,
        }
    }

    pub fn session_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{session_id}.json"))
    }

    pub fn memory_path(&self, session_id: &str, actor: Actor) -> PathBuf {
        self.memory_dir.join(memory_file_name(session_id, actor))
    }

    /// Memory path as shown to actors, relative to the project root.
    pub fn memory_display(&self, session_id: &str, actor: Actor) -> String {
        format!("{CONDUCTOR_DIR}/memory/{}", memory_file_name(session_id, actor))
    }

    /// Learnings directory as shown to actors, relative to the project root.
    pub fn learnings_display(&self, actor: Actor) -> String {
        format!("{CONDUCTOR_DIR}/learnings/{actor}")
    }

    pub fn verify_artifacts_path(&self, session_id: &str) -> PathBuf {
        self.artifacts_dir.join(format!("{session_id}-verify.json"))
    }

    pub fn ideal_state_path(&self, session_id: &str) -> PathBuf {
        self.artifacts_dir.join(format!("{session_id}-ideal-state.json"))
    }

    pub fn subtasks_path(&self, session_id: &str) -> PathBuf {
        self.artifacts_dir.join(format!("{session_id}-subtasks.json"))
    }

    /// `path` relative to the project root when it lives underneath it.
    pub fn display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }

    /// Fail unless `conductor init` has been run for this root.
    pub fn ensure_initialized(&self) -> Result<()> {
        if !self.conductor_dir.is_dir() {
            return Err(anyhow!(
                "{} not found in {} (run `conductor init` first)",
                CONDUCTOR_DIR,
                self.root.display()
            ));
        }
        Ok(())
    }
}

fn memory_file_name(session_id: &str, actor: Actor) -> String {
    format!("{session_id}-{actor}-memory.md")
}

/// Options for `init_conductor`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite the config and `.gitignore`. Learnings are never overwritten.
    pub force: bool,
}

/// Create `.conductor/` scaffolding in `root`.
///
/// Fails if `.conductor/` already exists unless `options.force` is set.
pub fn init_conductor(root: &Path, options: &InitOptions) -> Result<ConductorPaths> {
    let paths = ConductorPaths::new(root);
    if paths.conductor_dir.exists() && !paths.conductor_dir.is_dir() {
        return Err(anyhow!(
            "conductor init: {CONDUCTOR_DIR} exists but is not a directory"
        ));
    }
    if paths.conductor_dir.exists() && !options.force {
        return Err(anyhow!(
            "conductor init: {CONDUCTOR_DIR} already exists (use --force to overwrite)"
        ));
    }

    for dir in [
        &paths.conductor_dir,
        &paths.sessions_dir,
        &paths.memory_dir,
        &paths.learnings_dir,
        &paths.artifacts_dir,
    ] {
        create_dir(dir)?;
    }

    write_file(&paths.gitignore_path, CONDUCTOR_GITIGNORE)?;
    write_config(&paths.config_path, &ConductorConfig::default())?;

    for actor in Actor::ALL {
        let dir = paths.learnings_dir.join(actor.as_str());
        create_dir(&dir)?;
        for name in LEARNING_FILES {
            let path = dir.join(name);
            if !path.exists() {
                write_file(&path, &learnings_placeholder(actor, name))?;
            }
        }
    }

    debug!(root = %root.display(), force = options.force, "initialized conductor layout");
    Ok(paths)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}

fn learnings_placeholder(actor: Actor, file: &str) -> String {
    let title = match file {
        "heuristics.md" => "Heuristics",
        "anti-patterns.md" => "Anti-patterns",
        _ => "Checklists",
    };
    format!("# {title} ({actor})\n\nAppend entries from the LEARN phase here.\n")
}

const CONDUCTOR_GITIGNORE: &str = "sessions/\nmemory/\nartifacts/\n";
