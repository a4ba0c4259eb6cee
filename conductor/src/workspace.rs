//! Per-invocation handles: paths, config, the flow registry and templates.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::core::actor::Actor;
use crate::core::registry::FlowRegistry;
use crate::core::session::Session;
use crate::io::config::{ConductorConfig, load_config};
use crate::io::directive::DirectiveEngine;
use crate::io::init::ConductorPaths;
use crate::io::session_store::{load_session, save_session};

/// Everything a command needs besides the session itself. Built once per
/// invocation and passed by reference; nothing in here is mutated.
pub struct Workspace {
    pub paths: ConductorPaths,
    pub config: ConductorConfig,
    pub registry: FlowRegistry,
    pub directives: DirectiveEngine,
}

impl Workspace {
    /// Open an initialized project root.
    pub fn open(root: &Path) -> Result<Self> {
        let paths = ConductorPaths::new(root);
        paths.ensure_initialized()?;
        let config = load_config(&paths.config_path)?;
        Self::with_config(paths, config)
    }

    pub fn with_config(paths: ConductorPaths, config: ConductorConfig) -> Result<Self> {
        config.validate()?;
        let registry = FlowRegistry::builtin().context("build flow registry")?;
        let directives = DirectiveEngine::new().context("load directive templates")?;
        Ok(Self {
            paths,
            config,
            registry,
            directives,
        })
    }

    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    pub fn load(&self, session_id: &str) -> Result<Session> {
        load_session(&self.paths, session_id)
    }

    /// Stamp `updated_at` and persist.
    pub fn save(&self, session: &mut Session) -> Result<()> {
        session.touch(self.now());
        save_session(&self.paths, session)
    }

    pub fn model_for(&self, actor: Actor) -> &str {
        self.config
            .model_override
            .as_deref()
            .unwrap_or(actor.profile().model)
    }
}
