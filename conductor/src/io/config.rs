//! Conductor configuration stored under `.conductor/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Conductor configuration (TOML).
///
/// Edited by humans; missing fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConductorConfig {
    /// Verification passes before gaps escalate to a human.
    pub max_verify_iterations: u32,

    /// Interview passes before the IDEAL STATE loop force-exits.
    pub max_interview_iterations: u32,

    /// Completeness score at which the IDEAL STATE counts as ready.
    pub readiness_threshold: f64,

    /// Predecessor memory files without a usable Section 3 are cut to this
    /// many characters.
    pub context_truncate_chars: usize,

    /// Replaces every actor's preferred model in directives when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_override: Option<String>,

    /// Emit the one-time learnings block on an actor's first invocation.
    pub inject_learnings: bool,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            max_verify_iterations: 3,
            max_interview_iterations: 5,
            readiness_threshold: 0.95,
            context_truncate_chars: 2000,
            model_override: None,
            inject_learnings: true,
        }
    }
}

impl ConductorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_verify_iterations == 0 {
            return Err(anyhow!("max_verify_iterations must be > 0"));
        }
        if self.max_interview_iterations == 0 {
            return Err(anyhow!("max_interview_iterations must be > 0"));
        }
        if !(self.readiness_threshold > 0.0 && self.readiness_threshold <= 1.0) {
            return Err(anyhow!("readiness_threshold must be in (0, 1]"));
        }
        if self.context_truncate_chars == 0 {
            return Err(anyhow!("context_truncate_chars must be > 0"));
        }
        if self
            .model_override
            .as_deref()
            .is_some_and(|model| model.trim().is_empty())
        {
            return Err(anyhow!("model_override must not be blank"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ConductorConfig::default()`.
pub fn load_config(path: &Path) -> Result<ConductorConfig> {
    if !path.exists() {
        let cfg = ConductorConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ConductorConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ConductorConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}
