use crate::error::AuditError;
use crate::explain::ExplainConfig;
use crate::privacy::ProbeConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Engine settings, read from YAML. Every field has a default, so an empty
/// file (or none at all) is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub probe: ProbeConfig,
    pub explain: ExplainConfig,
    /// Where binaries persist reports; `None` keeps them in memory.
    pub report_dir: Option<PathBuf>,
}

impl AuditConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config `{}`", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("loading config `{}`", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: AuditConfig = if text.trim().is_empty() {
            AuditConfig::default()
        } else {
            serde_yaml::from_str(text).context("parsing YAML")?
        };
        config.validate()?;
        Ok(config)
    }

    /// `load` when a path is given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> std::result::Result<(), AuditError> {
        self.probe.validate()?;
        self.explain.validate()?;
        self.probe
            .accountant
            .for_dataset(1)
            .validate()
            .map_err(|e| AuditError::config(format!("accountant: {}", e)))
    }
}
