use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::function::{FunctionView, NativeFunction, SkFunction};
use skein_core::FunctionName;

/// A group of native functions imported together under one skill name.
pub trait Skill {
    fn functions(&self) -> Vec<NativeFunction>;
}

/// Registered functions keyed by lowercased `(skill, name)`.
#[derive(Debug, Clone, Default)]
pub struct SkillCollection {
    skills: HashMap<String, HashMap<String, Arc<SkFunction>>>,
}

impl SkillCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function, replacing and returning any previous one with
    /// the same identity.
    pub fn add(&mut self, function: Arc<SkFunction>) -> Option<Arc<SkFunction>> {
        let (skill, name) = function.function_name().key();
        let previous = self
            .skills
            .entry(skill)
            .or_default()
            .insert(name, Arc::clone(&function));
        if previous.is_some() {
            debug!(
                skill = %function.skill(),
                function = %function.name(),
                "replaced existing function"
            );
        }
        previous
    }

    pub fn get(&self, skill: &str, name: &str) -> Option<Arc<SkFunction>> {
        self.skills
            .get(&skill.to_lowercase())
            .and_then(|fns| fns.get(&name.to_lowercase()))
            .cloned()
    }

    pub fn get_by_name(&self, function: &FunctionName) -> Option<Arc<SkFunction>> {
        self.get(&function.skill, &function.name)
    }

    pub fn contains(&self, skill: &str, name: &str) -> bool {
        self.get(skill, name).is_some()
    }

    /// Skill names as registered (lowercased), sorted.
    pub fn skill_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.skills.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    /// Every function, sorted by skill then name.
    pub fn list(&self) -> Vec<FunctionView> {
        let mut views: Vec<FunctionView> = self
            .skills
            .values()
            .flat_map(|fns| fns.values())
            .map(|f| f.describe())
            .collect();
        views.sort_by(|a, b| {
            (a.skill.to_lowercase(), a.name.to_lowercase())
                .cmp(&(b.skill.to_lowercase(), b.name.to_lowercase()))
        });
        views
    }

    pub fn count(&self) -> usize {
        self.skills.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}
