//! # skein-core
//!
//! Core types and primitives for the Skein skill orchestration kernel.
//! This crate defines the shared vocabulary used by every other crate in the
//! workspace: the error taxonomy, function identity, and the case-insensitive
//! variable bag that flows through a pipeline.

pub mod error;
pub mod types;
pub mod variables;

pub use error::{Result, SkeinError};
pub use types::{FunctionName, GLOBAL_SKILL, validate_name};
pub use variables::{ContextVariables, MAIN_KEY};
