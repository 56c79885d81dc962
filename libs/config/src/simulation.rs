//! Simulation Configuration Module
//!
//! Loads a `SimulationConfig<M>` (kernel settings, logging, and a
//! model-specific section `M`) from TOML with environment-specific
//! overrides, then environment variables on top.
//!
//! Layering, later wins:
//! 1. base file (required)
//! 2. `<base dir>/environments/<env>.toml` (optional)
//! 3. `DES__SECTION__KEY=value` environment variables

use crate::defaults;
use anyhow::{Context, Result};
use config_crate::{Config, Environment, File, FileFormat};
use des_actors::KernelConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// One JSON object per line instead of human-readable output
    pub json: bool,
    /// Full `EnvFilter` directive; overrides `level` when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::logging::LEVEL.to_string(),
            json: false,
            filter: None,
        }
    }
}

impl LoggingConfig {
    pub fn directive(&self) -> &str {
        self.filter.as_deref().unwrap_or(&self.level)
    }
}

/// Complete configuration of one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig<M> {
    #[serde(default)]
    pub kernel: KernelConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub model: M,
}

impl<M: DeserializeOwned> SimulationConfig<M> {
    /// Load with the default `DES` environment prefix
    pub fn load(base_path: &Path, environment: Option<&str>) -> Result<Self> {
        ConfigLoader::new(base_path).environment(environment).load()
    }

    /// Parse a TOML document without any overlays
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()
            .context("Failed to build configuration")?;
        finish(config)
    }
}

impl<M: Serialize> SimulationConfig<M> {
    /// Resolved configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

/// Builder for the layered load
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    base: PathBuf,
    environment: Option<String>,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            environment: None,
            env_prefix: defaults::ENV_PREFIX.to_string(),
        }
    }

    pub fn environment(mut self, environment: Option<&str>) -> Self {
        self.environment = environment.map(str::to_string);
        self
    }

    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Overlay file for the selected environment, if any
    pub fn environment_file(&self) -> Option<PathBuf> {
        let env = self.environment.as_deref()?;
        let dir = self.base.parent().unwrap_or(Path::new("."));
        Some(
            dir.join(defaults::ENVIRONMENTS_DIR)
                .join(format!("{env}.toml")),
        )
    }

    pub fn load<M: DeserializeOwned>(&self) -> Result<SimulationConfig<M>> {
        info!(path = %self.base.display(), "Loading simulation config");
        let mut builder =
            Config::builder().add_source(File::from(self.base.as_path()).required(true));

        if let Some(env_file) = self.environment_file() {
            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(&self.env_prefix)
                .prefix_separator(defaults::ENV_SEPARATOR)
                .separator(defaults::ENV_SEPARATOR)
                .try_parsing(true),
        );

        let config = builder
            .build()
            .with_context(|| {
                format!("Failed to build configuration from {}", self.base.display())
            })?;
        finish(config)
    }
}

fn finish<M: DeserializeOwned>(config: Config) -> Result<SimulationConfig<M>> {
    let resolved: SimulationConfig<M> = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;
    resolved
        .kernel
        .validate()
        .context("Invalid kernel configuration")?;
    debug!(kernel = ?resolved.kernel, "Configuration resolved");
    Ok(resolved)
}

/// Expand `~` and `$VAR` in a configured path
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw).with_context(|| format!("Failed to expand path {raw}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
