use std::fmt;

use crate::error::{Result, SkeinError};

/// The implicit default variable every function reads and writes.
pub const MAIN_KEY: &str = "input";

/// Ordered, case-insensitive `name → value` bag threaded through a pipeline.
///
/// Names are normalized to lowercase on every access, so `Input` and `input`
/// address the same slot. Insertion order is preserved for iteration.
/// A fresh bag always contains `input` (empty unless given).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextVariables {
    entries: Vec<(String, String)>,
}

impl ContextVariables {
    /// Create a bag with an empty `input`.
    pub fn new() -> Self {
        Self::with_input("")
    }

    /// Create a bag seeded with the given `input` value.
    pub fn with_input(input: impl Into<String>) -> Self {
        Self {
            entries: vec![(MAIN_KEY.to_string(), input.into())],
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        let key = name.to_lowercase();
        self.entries.iter().position(|(k, _)| *k == key)
    }

    /// Look up a variable by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.entries[i].1.as_str())
    }

    /// Look up a variable, failing with `UndefinedVariable` when absent.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| SkeinError::UndefinedVariable(name.to_lowercase()))
    }

    /// Create or overwrite a variable.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.position(name) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((name.to_lowercase(), value)),
        }
    }

    /// Bulk overwrite; keys not in `mapping` are left alone.
    pub fn update<I, K, V>(&mut self, mapping: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (k, v) in mapping {
            self.set(k.as_ref(), v);
        }
    }

    /// Remove a variable, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|i| self.entries.remove(i).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// The `input` value, or `""` if it was removed.
    pub fn input(&self) -> &str {
        self.get(MAIN_KEY).unwrap_or("")
    }

    pub fn update_input(&mut self, value: impl Into<String>) {
        self.set(MAIN_KEY, value);
    }

    /// Iterate `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ContextVariables {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextVariables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.input())
    }
}

impl From<&str> for ContextVariables {
    fn from(input: &str) -> Self {
        Self::with_input(input)
    }
}

impl From<String> for ContextVariables {
    fn from(input: String) -> Self {
        Self::with_input(input)
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for ContextVariables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut vars = Self::new();
        vars.update(iter);
        vars
    }
}
