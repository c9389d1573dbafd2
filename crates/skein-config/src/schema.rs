use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Root configuration, mapped from `skein.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkeinConfig {
    pub kernel: KernelConfig,
    pub logging: LoggingConfig,
    pub retry: RetryConfig,
    pub services: Vec<ServiceConfig>,
}

// ── Kernel ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// How deep `{{skill.function}}` calls inside templates may nest.
    pub max_render_depth: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_render_depth: 10,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Retry ──────────────────────────────────────────────────────

/// Backoff applied to transient completion-service failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

// ── Services ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceBackend {
    OpenAi,
    Azure,
}

/// One `[[services]]` entry: a completion service the kernel registers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Id functions use in `default_services`.
    pub id: String,
    pub backend: ServiceBackend,
    /// OpenAI model name, e.g. "text-davinci-003".
    #[serde(default)]
    pub model: Option<String>,
    /// Azure deployment name.
    #[serde(default)]
    pub deployment: Option<String>,
    /// Azure endpoint, must be https.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Can also be set via OPENAI_API_KEY / AZURE_OPENAI_API_KEY.
    /// Config file takes priority over environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Register this service as the kernel default.
    #[serde(default)]
    pub default: bool,
}

fn default_timeout_secs() -> u64 {
    60
}

impl ServiceConfig {
    /// An OpenAI service entry with no credentials filled in.
    pub fn openai(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            backend: ServiceBackend::OpenAi,
            model: Some(model.into()),
            deployment: None,
            endpoint: None,
            api_key: None,
            org_id: None,
            api_version: None,
            timeout_secs: default_timeout_secs(),
            default: false,
        }
    }

    /// An Azure OpenAI service entry with no credentials filled in.
    pub fn azure(id: impl Into<String>, deployment: impl Into<String>) -> Self {
        Self {
            backend: ServiceBackend::Azure,
            model: None,
            deployment: Some(deployment.into()),
            ..Self::openai(id, "")
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            WarningSeverity::Error => "error",
            WarningSeverity::Warning => "warning",
        };
        write!(f, "{} {}: {}", label, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, " (hint: {})", h)?;
        }
        Ok(())
    }
}

impl SkeinConfig {
    /// Validate the config and return a list of warnings.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Render depth ───
        if self.kernel.max_render_depth == 0 {
            warnings.push(ConfigWarning {
                field: "kernel.max_render_depth".into(),
                message: "depth 0 forbids every function call inside templates".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 10".into()),
            });
        }

        // ── Services ───
        let mut seen = HashSet::new();
        for (i, svc) in self.services.iter().enumerate() {
            let field = format!("services[{}]", i);
            if svc.id.is_empty() {
                warnings.push(ConfigWarning {
                    field: format!("{field}.id"),
                    message: "service id is empty".into(),
                    severity: WarningSeverity::Error,
                    hint: None,
                });
            } else if !seen.insert(svc.id.as_str()) {
                warnings.push(ConfigWarning {
                    field: format!("{field}.id"),
                    message: format!("duplicate service id '{}'", svc.id),
                    severity: WarningSeverity::Error,
                    hint: Some("Service ids must be unique".into()),
                });
            }

            if svc.api_key.as_deref().unwrap_or("").is_empty() {
                warnings.push(ConfigWarning {
                    field: format!("{field}.api_key"),
                    message: format!("no API key for service '{}'", svc.id),
                    severity: WarningSeverity::Warning,
                    hint: Some("Set api_key or the OPENAI_API_KEY / AZURE_OPENAI_API_KEY env var".into()),
                });
            }

            match svc.backend {
                ServiceBackend::OpenAi => {
                    if svc.model.as_deref().unwrap_or("").is_empty() {
                        warnings.push(ConfigWarning {
                            field: format!("{field}.model"),
                            message: "openai service has no model".into(),
                            severity: WarningSeverity::Error,
                            hint: Some("Set to e.g. 'text-davinci-003'".into()),
                        });
                    }
                }
                ServiceBackend::Azure => {
                    if svc.deployment.as_deref().unwrap_or("").is_empty() {
                        warnings.push(ConfigWarning {
                            field: format!("{field}.deployment"),
                            message: "azure service has no deployment".into(),
                            severity: WarningSeverity::Error,
                            hint: Some("Or set AZURE_OPENAI_DEPLOYMENT_NAME".into()),
                        });
                    }
                    match svc.endpoint.as_deref() {
                        Some(e) if !e.starts_with("https://") => {
                            warnings.push(ConfigWarning {
                                field: format!("{field}.endpoint"),
                                message: format!("endpoint '{}' is not https", e),
                                severity: WarningSeverity::Error,
                                hint: Some("The Azure endpoint must start with https://".into()),
                            });
                        }
                        None => {
                            warnings.push(ConfigWarning {
                                field: format!("{field}.endpoint"),
                                message: "azure service has no endpoint".into(),
                                severity: WarningSeverity::Error,
                                hint: Some("Or set AZURE_OPENAI_ENDPOINT".into()),
                            });
                        }
                        _ => {}
                    }
                }
            }

            if svc.timeout_secs == 0 {
                warnings.push(ConfigWarning {
                    field: format!("{field}.timeout_secs"),
                    message: "timeout of 0s fails every request".into(),
                    severity: WarningSeverity::Error,
                    hint: Some("Set to e.g. 60".into()),
                });
            }
        }

        let defaults = self.services.iter().filter(|s| s.default).count();
        if defaults > 1 {
            warnings.push(ConfigWarning {
                field: "services.default".into(),
                message: format!("{} services are marked default", defaults),
                severity: WarningSeverity::Error,
                hint: Some("Mark at most one service as default".into()),
            });
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  - {}", errors.join("\n  - ")));
        }

        Ok(warnings)
    }
}
