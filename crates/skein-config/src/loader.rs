use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::schema::{ServiceBackend, SkeinConfig};
use skein_core::{Result, SkeinError};

/// Loads the Skein configuration from disk and the environment.
pub struct ConfigLoader {
    config: SkeinConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > SKEIN_CONFIG env > ~/.skein/skein.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("SKEIN_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".skein")
            .join("skein.toml")
    }

    /// Load the config from disk, falling back to defaults. Variables in a
    /// `.env` file in the working directory fill gaps the process
    /// environment leaves.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_dot_env(path, Path::new(".env"))
    }

    /// Like [`load`](Self::load) with an explicit `.env` location.
    pub fn load_with_dot_env(path: Option<&Path>, dot_env: &Path) -> Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            Self::parse(&raw).map_err(|e| {
                SkeinError::Config(format!("failed to parse {}: {}", config_path.display(), e))
            })?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            SkeinConfig::default()
        };

        let dot_env = Self::dot_env_values(dot_env)?;
        let config = Self::apply_overrides(config, |key| {
            std::env::var(key)
                .ok()
                .or_else(|| dot_env.get(key).cloned())
        });

        // Validate config: log warnings, fail on errors
        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(SkeinError::Config(e));
            }
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Parse TOML text without touching the environment.
    pub fn parse(raw: &str) -> std::result::Result<SkeinConfig, toml::de::Error> {
        toml::from_str::<SkeinConfig>(raw)
    }

    /// Get a snapshot of the loaded config.
    pub fn get(&self) -> SkeinConfig {
        self.config.clone()
    }

    /// Path the config was (or would have been) read from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Read `KEY=value` pairs from a dotenv file without touching the
    /// process environment. A missing file yields no values.
    pub fn dot_env_values(path: &Path) -> Result<HashMap<String, String>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let iter = dotenvy::from_path_iter(path).map_err(|e| {
            SkeinError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let values = iter
            .collect::<std::result::Result<HashMap<_, _>, _>>()
            .map_err(|e| SkeinError::Config(format!("failed to parse {}: {e}", path.display())))?;
        debug!(path = %path.display(), variables = values.len(), "read dotenv file");
        Ok(values)
    }

    /// Apply env var overrides (SKEIN_LOG_LEVEL, SKEIN_MAX_RENDER_DEPTH, etc.)
    /// and fill missing service credentials from the vendor env vars.
    pub fn apply_env_overrides(config: SkeinConfig) -> SkeinConfig {
        Self::apply_overrides(config, |key| std::env::var(key).ok())
    }

    /// Same as [`apply_env_overrides`](Self::apply_env_overrides) with an
    /// injectable variable source.
    pub fn apply_overrides<F>(mut config: SkeinConfig, var: F) -> SkeinConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var("SKEIN_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Some(v) = var("SKEIN_LOG_FORMAT") {
            config.logging.format = v;
        }
        if let Some(v) = var("SKEIN_MAX_RENDER_DEPTH") {
            match v.parse::<usize>() {
                Ok(depth) => config.kernel.max_render_depth = depth,
                Err(_) => warn!(value = %v, "ignoring non-numeric SKEIN_MAX_RENDER_DEPTH"),
            }
        }

        // Credentials: config file takes priority, env is the fallback.
        for svc in &mut config.services {
            match svc.backend {
                ServiceBackend::OpenAi => {
                    if svc.api_key.is_none() {
                        svc.api_key = var("OPENAI_API_KEY");
                    }
                    if svc.org_id.is_none() {
                        svc.org_id = var("OPENAI_ORG_ID");
                    }
                }
                ServiceBackend::Azure => {
                    if svc.api_key.is_none() {
                        svc.api_key = var("AZURE_OPENAI_API_KEY");
                    }
                    if svc.endpoint.is_none() {
                        svc.endpoint = var("AZURE_OPENAI_ENDPOINT");
                    }
                    if svc.deployment.is_none() {
                        svc.deployment = var("AZURE_OPENAI_DEPLOYMENT_NAME");
                    }
                }
            }
        }
        config
    }
}
