use thiserror::Error;

/// Unified error type for the entire Skein kernel.
#[derive(Error, Debug)]
pub enum SkeinError {
    // ── Template errors ────────────────────────────────────────
    #[error("template syntax error at byte {offset}: {reason}")]
    TemplateSyntax { offset: usize, reason: String },

    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("missing parameter '{parameter}' for function {function}")]
    MissingParameter { function: String, parameter: String },

    #[error("render failed: {reason}")]
    Render {
        reason: String,
        #[source]
        source: Option<Box<SkeinError>>,
    },

    // ── Function registry errors ───────────────────────────────
    #[error("function not found: {skill}.{function}")]
    FunctionNotFound { skill: String, function: String },

    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    // ── Prompt config documents ────────────────────────────────
    #[error("format error: {0}")]
    Format(String),

    // ── Completion service errors ──────────────────────────────
    #[error("no completion service configured: {0}")]
    NoServiceConfigured(String),

    #[error("completion service error: {service}: {reason}")]
    Service { service: String, reason: String },

    #[error("completion service {service} rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        service: String,
        retry_after_secs: u64,
    },

    #[error("pipeline cancelled")]
    Cancelled,

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SkeinError {
    /// Shorthand for a `Render` error wrapping a nested cause.
    pub fn render(reason: impl Into<String>, cause: SkeinError) -> Self {
        SkeinError::Render {
            reason: reason.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// Shorthand for a `Service` error.
    pub fn service(service: impl Into<String>, reason: impl Into<String>) -> Self {
        SkeinError::Service {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Whether a completion-service failure is transient and worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            SkeinError::RateLimited { .. } => true,
            SkeinError::Service { reason, .. } => {
                reason.starts_with("HTTP 429")
                    || reason.starts_with("HTTP 500")
                    || reason.starts_with("HTTP 502")
                    || reason.starts_with("HTTP 503")
                    || reason.starts_with("HTTP 504")
                    || reason.contains("timed out")
                    || reason.contains("connection failed")
                    || reason.contains("connection reset")
                    || reason.contains("connection closed")
                    || reason.contains("overloaded")
            }
            _ => false,
        }
    }

    /// Whether this error is a cancellation rather than a failure, looking
    /// through nested render causes.
    pub fn is_cancellation(&self) -> bool {
        match self {
            SkeinError::Cancelled => true,
            SkeinError::Render {
                source: Some(cause),
                ..
            } => cause.is_cancellation(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SkeinError>;
