use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::collection::SkillCollection;
use crate::function::SkFunction;
use skein_core::{ContextVariables, FunctionName, Result, SkeinError};
use skein_llm::ServiceRegistry;
use skein_skills::{DEFAULT_MAX_RENDER_DEPTH, FunctionCaller};

/// Where a context stands. Leaves `Running` at most once.
#[derive(Debug)]
pub enum Outcome {
    Running,
    Failed(SkeinError),
    Cancelled,
}

/// Execution context threaded through a pipeline.
///
/// Holds the variables every step reads and writes, the sticky outcome, and
/// snapshots of the kernel's registries taken when the run started.
pub struct SkContext {
    variables: ContextVariables,
    outcome: Outcome,
    skills: Arc<SkillCollection>,
    services: Arc<ServiceRegistry>,
    cancel: CancellationToken,
    depth: usize,
    max_render_depth: usize,
}

impl SkContext {
    pub fn new(
        variables: ContextVariables,
        skills: Arc<SkillCollection>,
        services: Arc<ServiceRegistry>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            variables,
            outcome: Outcome::Running,
            skills,
            services,
            cancel,
            depth: 0,
            max_render_depth: DEFAULT_MAX_RENDER_DEPTH,
        }
    }

    /// A context with empty registries, for invoking functions standalone.
    pub fn standalone(variables: impl Into<ContextVariables>) -> Self {
        Self::new(
            variables.into(),
            Arc::new(SkillCollection::default()),
            Arc::new(ServiceRegistry::default()),
            CancellationToken::new(),
        )
    }

    pub fn with_max_render_depth(mut self, max_render_depth: usize) -> Self {
        self.max_render_depth = max_render_depth;
        self
    }

    pub fn with_services(mut self, services: Arc<ServiceRegistry>) -> Self {
        self.services = services;
        self
    }

    pub fn with_skills(mut self, skills: Arc<SkillCollection>) -> Self {
        self.skills = skills;
        self
    }

    /// A nested context for a function called from inside a template.
    /// Shares the registries and cancellation token.
    fn child(&self, variables: ContextVariables, depth: usize) -> Self {
        Self {
            variables,
            outcome: Outcome::Running,
            skills: Arc::clone(&self.skills),
            services: Arc::clone(&self.services),
            cancel: self.cancel.clone(),
            depth,
            max_render_depth: self.max_render_depth,
        }
    }

    // ── Variables ──────────────────────────────────────────────

    pub fn variables(&self) -> &ContextVariables {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut ContextVariables {
        &mut self.variables
    }

    pub fn into_variables(self) -> ContextVariables {
        self.variables
    }

    pub fn input(&self) -> &str {
        self.variables.input()
    }

    pub fn set_input(&mut self, value: impl Into<String>) {
        self.variables.update_input(value);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables.get(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.variables.set(name, value);
    }

    // ── Outcome ────────────────────────────────────────────────

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn is_running(&self) -> bool {
        matches!(self.outcome, Outcome::Running)
    }

    pub fn error_occurred(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, Outcome::Cancelled)
    }

    pub fn last_error(&self) -> Option<&SkeinError> {
        match &self.outcome {
            Outcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn last_error_description(&self) -> Option<String> {
        match &self.outcome {
            Outcome::Failed(e) => Some(e.to_string()),
            Outcome::Cancelled => Some(SkeinError::Cancelled.to_string()),
            Outcome::Running => None,
        }
    }

    /// Record a failure. Only the first one sticks; cancellation errors
    /// (including wrapped ones) move the context to `Cancelled` instead.
    pub fn fail(&mut self, error: SkeinError) {
        if !self.is_running() {
            debug!(error = %error, "context already finished, dropping later error");
            return;
        }
        if error.is_cancellation() {
            self.outcome = Outcome::Cancelled;
        } else {
            warn!(error = %error, depth = self.depth, "function failed");
            self.outcome = Outcome::Failed(error);
        }
    }

    /// `Ok(variables)` if the context is still running, otherwise the error
    /// that stopped it.
    pub fn into_result(self) -> Result<ContextVariables> {
        match self.outcome {
            Outcome::Running => Ok(self.variables),
            Outcome::Failed(e) => Err(e),
            Outcome::Cancelled => Err(SkeinError::Cancelled),
        }
    }

    // ── Registries & limits ────────────────────────────────────

    pub fn skills(&self) -> &Arc<SkillCollection> {
        &self.skills
    }

    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    /// Look up a function in the registry snapshot.
    pub fn func(&self, skill: &str, name: &str) -> Result<Arc<SkFunction>> {
        self.skills.get(skill, name).ok_or_else(|| SkeinError::FunctionNotFound {
            skill: skill.to_string(),
            function: name.to_string(),
        })
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn max_render_depth(&self) -> usize {
        self.max_render_depth
    }
}

impl fmt::Debug for SkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkContext")
            .field("variables", &self.variables)
            .field("outcome", &self.outcome)
            .field("functions", &self.skills.count())
            .field("depth", &self.depth)
            .finish()
    }
}

#[async_trait]
impl FunctionCaller for SkContext {
    async fn call_function(
        &self,
        function: &FunctionName,
        variables: ContextVariables,
        depth: usize,
    ) -> Result<String> {
        if depth > self.max_render_depth {
            return Err(SkeinError::Render {
                reason: format!(
                    "call to {function} exceeds the maximum render depth of {}",
                    self.max_render_depth
                ),
                source: None,
            });
        }
        let target = self.skills.get_by_name(function).ok_or_else(|| {
            SkeinError::FunctionNotFound {
                skill: function.skill.clone(),
                function: function.name.clone(),
            }
        })?;
        let child = self.child(variables, depth);
        let done = target.invoke(child).await;
        done.into_result().map(|vars| vars.input().to_string())
    }

    fn max_depth(&self) -> usize {
        self.max_render_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_failure_sticks() {
        let mut ctx = SkContext::standalone("x");
        ctx.fail(SkeinError::UndefinedVariable("a".into()));
        ctx.fail(SkeinError::Cancelled);
        assert!(ctx.error_occurred());
        assert!(matches!(
            ctx.last_error(),
            Some(SkeinError::UndefinedVariable(_))
        ));
    }

    #[test]
    fn wrapped_cancellation_is_not_a_failure() {
        let mut ctx = SkContext::standalone("");
        ctx.fail(SkeinError::render("call to f failed", SkeinError::Cancelled));
        assert!(ctx.is_cancelled());
        assert!(!ctx.error_occurred());
        assert!(matches!(ctx.into_result(), Err(SkeinError::Cancelled)));
    }

    #[tokio::test]
    async fn call_past_max_depth_is_refused() {
        let ctx = SkContext::standalone("").with_max_render_depth(2);
        let err = ctx
            .call_function(&FunctionName::global("anything"), ContextVariables::new(), 3)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("maximum render depth of 2"));

        let err = ctx
            .call_function(&FunctionName::global("anything"), ContextVariables::new(), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, SkeinError::FunctionNotFound { .. }));
    }

    #[test]
    fn running_context_yields_variables() {
        let mut ctx = SkContext::standalone("in");
        ctx.set("Extra", "1");
        let vars = ctx.into_result().unwrap();
        assert_eq!(vars.input(), "in");
        assert_eq!(vars.get("extra"), Some("1"));
    }
}
