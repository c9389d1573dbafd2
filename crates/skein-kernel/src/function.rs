use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::context::SkContext;
use skein_core::{FunctionName, Result, SkeinError, validate_name};
use skein_skills::SemanticFunctionConfig;

/// A declared parameter of a function, as shown to callers and planners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterView {
    pub name: String,
    pub description: String,
    /// `None` means the caller must supply the variable.
    pub default_value: Option<String>,
}

impl ParameterView {
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default_value: None,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        description: impl Into<String>,
        default_value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default_value: Some(default_value.into()),
        }
    }
}

/// Summary of a registered function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionView {
    pub skill: String,
    pub name: String,
    pub description: String,
    pub is_semantic: bool,
    pub parameters: Vec<ParameterView>,
}

/// Hand-written logic behind a native function. Reads and writes the
/// context's variables; an `Err` fails the context.
#[async_trait]
pub trait NativeHandler: Send + Sync {
    async fn call(&self, ctx: &mut SkContext) -> Result<()>;
}

struct SyncHandler<F>(F);

#[async_trait]
impl<F> NativeHandler for SyncHandler<F>
where
    F: Fn(&mut SkContext) -> Result<()> + Send + Sync,
{
    async fn call(&self, ctx: &mut SkContext) -> Result<()> {
        (self.0)(ctx)
    }
}

struct AsyncHandler<F>(F);

#[async_trait]
impl<F> NativeHandler for AsyncHandler<F>
where
    F: for<'a> Fn(&'a mut SkContext) -> BoxFuture<'a, Result<()>> + Send + Sync,
{
    async fn call(&self, ctx: &mut SkContext) -> Result<()> {
        (self.0)(ctx).await
    }
}

/// A native function definition, before it is bound to a skill.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterView>,
    handler: Arc<dyn NativeHandler>,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn NativeHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: vec![],
            handler,
        }
    }

    /// Wrap a synchronous closure.
    pub fn from_fn<F>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut SkContext) -> Result<()> + Send + Sync + 'static,
    {
        Self::new(name, description, Arc::new(SyncHandler(f)))
    }

    /// Wrap a closure returning a boxed future, e.g.
    /// `|ctx| async move { … }.boxed()`.
    pub fn from_async<F>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut SkContext) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        Self::new(name, description, Arc::new(AsyncHandler(f)))
    }

    pub fn with_parameter(mut self, parameter: ParameterView) -> Self {
        self.parameters.push(parameter);
        self
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum FunctionKind {
    Native(NativeFunction),
    Semantic(SemanticFunctionConfig),
}

/// A registered function: identity plus either native logic or a prompt.
#[derive(Debug, Clone)]
pub struct SkFunction {
    skill: String,
    name: String,
    description: String,
    kind: FunctionKind,
}

impl SkFunction {
    /// Bind a native function to `skill`. Both names must be `[A-Za-z0-9_]+`.
    pub fn native(skill: impl Into<String>, function: NativeFunction) -> Result<Self> {
        let skill = skill.into();
        validate_name(&skill)?;
        validate_name(&function.name)?;
        Ok(Self {
            skill,
            name: function.name.clone(),
            description: function.description.clone(),
            kind: FunctionKind::Native(function),
        })
    }

    /// Bind a semantic function to `skill`. Both names must be `[A-Za-z0-9_]+`.
    pub fn semantic(
        skill: impl Into<String>,
        name: impl Into<String>,
        config: SemanticFunctionConfig,
    ) -> Result<Self> {
        let skill = skill.into();
        let name = name.into();
        validate_name(&skill)?;
        validate_name(&name)?;
        Ok(Self {
            skill,
            name,
            description: config.description().to_string(),
            kind: FunctionKind::Semantic(config),
        })
    }

    pub fn skill(&self) -> &str {
        &self.skill
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> &FunctionKind {
        &self.kind
    }

    pub fn is_semantic(&self) -> bool {
        matches!(self.kind, FunctionKind::Semantic(_))
    }

    pub fn function_name(&self) -> FunctionName {
        FunctionName::new(&self.skill, &self.name)
    }

    pub fn parameters(&self) -> Vec<ParameterView> {
        match &self.kind {
            FunctionKind::Native(native) => native.parameters.clone(),
            FunctionKind::Semantic(config) => config
                .parameters()
                .iter()
                .map(|p| ParameterView::optional(&p.name, &p.description, &p.default_value))
                .collect(),
        }
    }

    pub fn describe(&self) -> FunctionView {
        FunctionView {
            skill: self.skill.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            is_semantic: self.is_semantic(),
            parameters: self.parameters(),
        }
    }

    /// Run the function against `ctx`. Failures are recorded in the returned
    /// context, never returned as `Err`.
    pub async fn invoke(&self, ctx: SkContext) -> SkContext {
        self.invoke_with(ctx, None).await
    }

    /// Like [`invoke`](Self::invoke) with an explicit completion service.
    /// Native functions ignore the override.
    pub async fn invoke_using(&self, ctx: SkContext, service_id: &str) -> SkContext {
        self.invoke_with(ctx, Some(service_id)).await
    }

    /// Blocking form of [`invoke`](Self::invoke) on a private current-thread
    /// runtime. Must not be called from inside an async runtime.
    pub fn invoke_blocking(&self, mut ctx: SkContext) -> SkContext {
        match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt.block_on(self.invoke(ctx)),
            Err(e) => {
                ctx.fail(SkeinError::Io(e));
                ctx
            }
        }
    }

    async fn invoke_with(&self, mut ctx: SkContext, service: Option<&str>) -> SkContext {
        if !ctx.is_running() {
            return ctx;
        }
        if ctx.cancellation_token().is_cancelled() {
            ctx.fail(SkeinError::Cancelled);
            return ctx;
        }

        debug!(
            skill = %self.skill,
            function = %self.name,
            semantic = self.is_semantic(),
            depth = ctx.depth(),
            "invoking function"
        );

        let result = match &self.kind {
            FunctionKind::Native(native) => match self.bind_native_parameters(native, &mut ctx) {
                Ok(()) => native.handler.call(&mut ctx).await,
                Err(e) => Err(e),
            },
            FunctionKind::Semantic(config) => match self.complete(&ctx, config, service).await {
                Ok(text) => {
                    ctx.set_input(text);
                    Ok(())
                }
                Err(e) => Err(e),
            },
        };

        if let Err(e) = result {
            ctx.fail(e);
        }
        ctx
    }

    /// Fail with `MissingParameter` for any required parameter the context
    /// lacks; seed optional ones with their defaults.
    fn bind_native_parameters(&self, native: &NativeFunction, ctx: &mut SkContext) -> Result<()> {
        for param in &native.parameters {
            if ctx.variables().contains(&param.name) {
                continue;
            }
            match &param.default_value {
                Some(default) => ctx.set(&param.name, default.clone()),
                None => {
                    return Err(SkeinError::MissingParameter {
                        function: self.function_name().to_string(),
                        parameter: param.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn complete(
        &self,
        ctx: &SkContext,
        config: &SemanticFunctionConfig,
        service: Option<&str>,
    ) -> Result<String> {
        let prompt = config
            .template()
            .render(ctx.variables(), config.parameters(), ctx, ctx.depth())
            .await?;

        let (service_id, backend) = ctx
            .services()
            .resolve(service, &config.prompt_config().default_services)?;
        debug!(
            function = %self.function_name(),
            service = %service_id,
            prompt_len = prompt.len(),
            "sending prompt"
        );

        let cancel = ctx.cancellation_token().clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SkeinError::Cancelled),
            result = backend.complete(&prompt, config.completion()) => result,
        }
    }
}
