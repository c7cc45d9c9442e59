//! CLI configuration file

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use ledger_adaptor_memory::Seed;
use serde::Deserialize;

/// Contents of the `--config` YAML file
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    /// Log filter used when `--log-level` is not given
    #[serde(default)]
    pub log_level: Option<String>,

    /// Name the in-memory adaptor registers under
    #[serde(default = "default_adaptor")]
    pub adaptor: String,

    /// Serializer definitions replacing the built-in ones, by resource type
    #[serde(default)]
    pub mappings: Option<PathBuf>,

    /// Records loaded into the ledger before the command runs
    #[serde(default)]
    pub seed: Seed,
}

fn default_adaptor() -> String {
    "memory".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_level: None,
            adaptor: default_adaptor(),
            mappings: None,
            seed: Seed::new(),
        }
    }
}

impl CliConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: Self = serde_yaml::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;

        // Mapping paths are relative to the config file
        if let (Some(mappings), Some(dir)) = (&config.mappings, path.parent()) {
            if mappings.is_relative() {
                config.mappings = Some(dir.join(mappings));
            }
        }
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
