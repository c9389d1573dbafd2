use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::collection::{Skill, SkillCollection};
use crate::context::{Outcome, SkContext};
use crate::function::SkFunction;
use skein_config::{KernelConfig, ServiceBackend, ServiceConfig, SkeinConfig};
use skein_core::{ContextVariables, GLOBAL_SKILL, Result, SkeinError, validate_name};
use skein_llm::{
    AzureTextCompletion, OpenAiTextCompletion, RetryPolicy, RetryingCompletion, ServiceRegistry,
    TextCompletion,
};
use skein_skills::{PromptTemplateConfig, SemanticFunctionConfig};

/// Owns the function and service registries and runs pipelines.
///
/// Registries are copy-on-write: each run snapshots them when its context is
/// created, so registering while a run is in flight never affects that run.
/// A `Kernel` is `Send + Sync`; share it behind an `Arc` for concurrent runs.
pub struct Kernel {
    skills: RwLock<Arc<SkillCollection>>,
    services: RwLock<Arc<ServiceRegistry>>,
    settings: KernelConfig,
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    pub fn new() -> Self {
        Self::with_settings(KernelConfig::default())
    }

    pub fn with_settings(settings: KernelConfig) -> Self {
        Self {
            skills: RwLock::new(Arc::new(SkillCollection::new())),
            services: RwLock::new(Arc::new(ServiceRegistry::new())),
            settings,
        }
    }

    /// Build a kernel from loaded settings, registering every configured
    /// completion service behind the configured retry policy.
    pub fn from_config(config: &SkeinConfig) -> Result<Self> {
        let warnings = config.validate().map_err(SkeinError::Config)?;
        for w in &warnings {
            warn!("{}", w);
        }

        let kernel = Self::with_settings(config.kernel.clone());
        let policy = RetryPolicy {
            max_retries: config.retry.max_retries,
            base_delay: Duration::from_millis(config.retry.base_delay_ms),
        };

        for (i, svc) in config.services.iter().enumerate() {
            let backend = build_service(i, svc)?;
            let service: Arc<dyn TextCompletion> =
                Arc::new(RetryingCompletion::new(backend, policy));
            if svc.default {
                kernel.add_text_completion_service_as_default(&svc.id, service);
            } else {
                kernel.add_text_completion_service(&svc.id, service);
            }
        }

        info!(
            services = config.services.len(),
            max_render_depth = config.kernel.max_render_depth,
            "kernel configured"
        );
        Ok(kernel)
    }

    pub fn settings(&self) -> &KernelConfig {
        &self.settings
    }

    // ── Services ───────────────────────────────────────────────

    /// Register a completion service. The first one registered becomes the
    /// default.
    pub fn add_text_completion_service(&self, id: &str, service: Arc<dyn TextCompletion>) {
        Arc::make_mut(&mut self.services.write()).add(id, service);
    }

    pub fn add_text_completion_service_as_default(
        &self,
        id: &str,
        service: Arc<dyn TextCompletion>,
    ) {
        Arc::make_mut(&mut self.services.write()).add_as_default(id, service);
    }

    pub fn set_default_text_completion_service(&self, id: &str) -> Result<()> {
        Arc::make_mut(&mut self.services.write()).set_default(id)
    }

    pub fn remove_text_completion_service(&self, id: &str) -> bool {
        Arc::make_mut(&mut self.services.write()).remove(id)
    }

    /// Snapshot of the service registry.
    pub fn services(&self) -> Arc<ServiceRegistry> {
        Arc::clone(&self.services.read())
    }

    // ── Functions ──────────────────────────────────────────────

    fn register(&self, functions: Vec<SkFunction>) -> Vec<Arc<SkFunction>> {
        let mut guard = self.skills.write();
        let registry = Arc::make_mut(&mut guard);
        functions
            .into_iter()
            .map(|f| {
                let f = Arc::new(f);
                registry.add(Arc::clone(&f));
                f
            })
            .collect()
    }

    /// Register every function of a native skill under `skill_name`.
    /// Nothing is registered if any name is invalid.
    pub fn import_skill(
        &self,
        skill: &impl Skill,
        skill_name: &str,
    ) -> Result<Vec<Arc<SkFunction>>> {
        validate_name(skill_name)?;
        let functions = skill
            .functions()
            .into_iter()
            .map(|f| SkFunction::native(skill_name, f))
            .collect::<Result<Vec<_>>>()?;
        info!(skill = %skill_name, functions = functions.len(), "imported native skill");
        Ok(self.register(functions))
    }

    pub fn register_semantic_function(
        &self,
        skill: &str,
        name: &str,
        config: SemanticFunctionConfig,
    ) -> Result<Arc<SkFunction>> {
        let function = SkFunction::semantic(skill, name, config)?;
        debug!(skill = %skill, function = %name, "registered semantic function");
        let mut registered = self.register(vec![function]);
        registered.pop().ok_or_else(|| SkeinError::FunctionNotFound {
            skill: skill.to_string(),
            function: name.to_string(),
        })
    }

    /// Register semantic functions from `(name, config, template source)`
    /// triples. Every template is parsed before anything is registered.
    pub fn import_semantic_skill<I, N, S>(
        &self,
        skill: &str,
        functions: I,
    ) -> Result<Vec<Arc<SkFunction>>>
    where
        I: IntoIterator<Item = (N, PromptTemplateConfig, S)>,
        N: AsRef<str>,
        S: AsRef<str>,
    {
        validate_name(skill)?;
        let functions = functions
            .into_iter()
            .map(|(name, config, source)| {
                let config = SemanticFunctionConfig::from_source(config, source.as_ref())?;
                SkFunction::semantic(skill, name.as_ref(), config)
            })
            .collect::<Result<Vec<_>>>()?;
        info!(skill = %skill, functions = functions.len(), "imported semantic skill");
        Ok(self.register(functions))
    }

    /// Register an inline semantic function in the global skill under a
    /// generated `func<uuid>` name.
    pub fn create_semantic_function(
        &self,
        template: &str,
        config: PromptTemplateConfig,
    ) -> Result<Arc<SkFunction>> {
        let name = format!("func{}", uuid::Uuid::new_v4().simple());
        let config = SemanticFunctionConfig::from_source(config, template)?;
        self.register_semantic_function(GLOBAL_SKILL, &name, config)
    }

    pub fn func(&self, skill: &str, name: &str) -> Result<Arc<SkFunction>> {
        self.skills
            .read()
            .get(skill, name)
            .ok_or_else(|| SkeinError::FunctionNotFound {
                skill: skill.to_string(),
                function: name.to_string(),
            })
    }

    /// Snapshot of the function registry.
    pub fn skills(&self) -> Arc<SkillCollection> {
        Arc::clone(&self.skills.read())
    }

    // ── Running ────────────────────────────────────────────────

    /// A fresh context over the current registry snapshots.
    pub fn create_context(&self, variables: impl Into<ContextVariables>) -> SkContext {
        self.context_with_token(variables.into(), CancellationToken::new())
    }

    fn context_with_token(
        &self,
        variables: ContextVariables,
        cancel: CancellationToken,
    ) -> SkContext {
        SkContext::new(variables, self.skills(), self.services(), cancel)
            .with_max_render_depth(self.settings.max_render_depth)
    }

    pub async fn run(
        &self,
        variables: impl Into<ContextVariables>,
        pipeline: &[Arc<SkFunction>],
    ) -> SkContext {
        self.run_in_context(self.create_context(variables), pipeline)
            .await
    }

    /// Run with a caller-owned token; cancelling it stops the pipeline at the
    /// next step boundary and aborts an in-flight completion.
    pub async fn run_with_cancellation(
        &self,
        variables: impl Into<ContextVariables>,
        pipeline: &[Arc<SkFunction>],
        cancel: CancellationToken,
    ) -> SkContext {
        let ctx = self.context_with_token(variables.into(), cancel);
        self.run_in_context(ctx, pipeline).await
    }

    /// Run `pipeline` in order against an existing context. Stops before the
    /// first step that finds the context cancelled or failed.
    pub async fn run_in_context(
        &self,
        mut ctx: SkContext,
        pipeline: &[Arc<SkFunction>],
    ) -> SkContext {
        let span = info_span!("pipeline", steps = pipeline.len());
        async move {
            for (step, function) in pipeline.iter().enumerate() {
                if ctx.cancellation_token().is_cancelled() {
                    ctx.fail(SkeinError::Cancelled);
                }
                if !ctx.is_running() {
                    debug!(step, "pipeline halted");
                    break;
                }
                debug!(
                    step,
                    skill = %function.skill(),
                    function = %function.name(),
                    "running step"
                );
                ctx = function.invoke(ctx).await;
            }

            match ctx.outcome() {
                Outcome::Running => debug!("pipeline completed"),
                Outcome::Failed(e) => warn!(error = %e, "pipeline failed"),
                Outcome::Cancelled => info!("pipeline cancelled"),
            }
            ctx
        }
        .instrument(span)
        .await
    }

    /// Blocking form of [`run`](Self::run) on a private current-thread
    /// runtime. Must not be called from inside an async runtime.
    pub fn run_blocking(
        &self,
        variables: impl Into<ContextVariables>,
        pipeline: &[Arc<SkFunction>],
    ) -> SkContext {
        let mut ctx = self.create_context(variables);
        match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt.block_on(self.run_in_context(ctx, pipeline)),
            Err(e) => {
                ctx.fail(SkeinError::Io(e));
                ctx
            }
        }
    }
}

fn build_service(index: usize, svc: &ServiceConfig) -> Result<Arc<dyn TextCompletion>> {
    let timeout = Duration::from_secs(svc.timeout_secs);
    let api_key = svc.api_key.clone().unwrap_or_default();
    let required = |value: &Option<String>, field: &str| {
        value.clone().ok_or_else(|| SkeinError::ConfigValidation {
            field: format!("services[{index}].{field}"),
            reason: format!("required for service '{}'", svc.id),
        })
    };

    match svc.backend {
        ServiceBackend::OpenAi => {
            let model = required(&svc.model, "model")?;
            let mut client = OpenAiTextCompletion::new(model, api_key, svc.org_id.clone())?
                .with_timeout(timeout)?;
            if let Some(base_url) = &svc.endpoint {
                client = client.with_base_url(base_url.clone());
            }
            Ok(Arc::new(client))
        }
        ServiceBackend::Azure => {
            let deployment = required(&svc.deployment, "deployment")?;
            let endpoint = required(&svc.endpoint, "endpoint")?;
            let client =
                AzureTextCompletion::new(deployment, endpoint, api_key, svc.api_version.clone())?
                    .with_timeout(timeout)?;
            Ok(Arc::new(client))
        }
    }
}
