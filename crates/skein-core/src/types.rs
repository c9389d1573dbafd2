use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SkeinError};

/// Skill that bare function names (`{{fn}}`) resolve against.
pub const GLOBAL_SKILL: &str = "_GLOBAL_FUNCTIONS_";

/// Identity of a function: `(skill, name)`, compared case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionName {
    pub skill: String,
    pub name: String,
}

impl FunctionName {
    pub fn new(skill: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            skill: skill.into(),
            name: name.into(),
        }
    }

    /// A function in the global skill.
    pub fn global(name: impl Into<String>) -> Self {
        Self::new(GLOBAL_SKILL, name)
    }

    /// Parse `skill.function` or a bare `function` (global skill).
    pub fn parse(reference: &str) -> Self {
        match reference.split_once('.') {
            Some((skill, name)) => Self::new(skill, name),
            None => Self::global(reference),
        }
    }

    /// Lowercased `(skill, name)` pair used as registry key.
    pub fn key(&self) -> (String, String) {
        (self.skill.to_lowercase(), self.name.to_lowercase())
    }

    pub fn is_global(&self) -> bool {
        self.skill.eq_ignore_ascii_case(GLOBAL_SKILL)
    }
}

impl PartialEq for FunctionName {
    fn eq(&self, other: &Self) -> bool {
        self.skill.eq_ignore_ascii_case(&other.skill) && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for FunctionName {}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_global() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.skill, self.name)
        }
    }
}

/// Check a skill or function name: non-empty, ASCII alphanumerics and `_` only.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SkeinError::InvalidName {
            name: name.to_string(),
            reason: "name is empty".into(),
        });
    }
    if let Some(c) = name.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(SkeinError::InvalidName {
            name: name.to_string(),
            reason: format!("character '{c}' is not allowed, use [A-Za-z0-9_]"),
        });
    }
    Ok(())
}
