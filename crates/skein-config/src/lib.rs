//! # skein-config
//!
//! Settings for the Skein kernel. Reads from `skein.toml` and environment
//! variables, in that precedence order, and resolves the credentials that
//! completion-service handles are built from.

pub mod loader;
pub mod logging;
pub mod schema;

pub use loader::ConfigLoader;
pub use logging::init_tracing;
pub use schema::{
    ConfigWarning, KernelConfig, LoggingConfig, RetryConfig, ServiceBackend, ServiceConfig,
    SkeinConfig, WarningSeverity,
};
