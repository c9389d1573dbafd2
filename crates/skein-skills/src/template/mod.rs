mod parser;

use async_trait::async_trait;
use tracing::debug;

use crate::prompt_config::InputParameter;
use skein_core::{ContextVariables, FunctionName, Result, SkeinError};

/// Default bound on nested `{{function}}` calls during rendering.
pub const DEFAULT_MAX_RENDER_DEPTH: usize = 10;

/// A parsed piece of template text.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Literal text between references.
    Text(String),
    /// `{{$name}}`
    Variable(String),
    /// `{{'text'}}` or `{{"text"}}`
    Value(String),
    /// `{{skill.function}}`, optionally with one argument.
    Call {
        function: FunctionName,
        argument: Option<CallArgument>,
    },
}

/// The single argument a template call may carry. It becomes the callee's
/// `input`.
#[derive(Debug, Clone, PartialEq)]
pub enum CallArgument {
    Variable(String),
    Value(String),
}

/// Invokes registered functions on behalf of a rendering template.
#[async_trait]
pub trait FunctionCaller: Send + Sync {
    /// Run `function` against `variables` and return its resulting `input`.
    /// `depth` is the nesting level of the call being made.
    async fn call_function(
        &self,
        function: &FunctionName,
        variables: ContextVariables,
        depth: usize,
    ) -> Result<String>;

    fn max_depth(&self) -> usize {
        DEFAULT_MAX_RENDER_DEPTH
    }
}

/// A caller with no functions registered. Any call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFunctions;

#[async_trait]
impl FunctionCaller for NoFunctions {
    async fn call_function(
        &self,
        function: &FunctionName,
        _variables: ContextVariables,
        _depth: usize,
    ) -> Result<String> {
        Err(SkeinError::FunctionNotFound {
            skill: function.skill.clone(),
            function: function.name.clone(),
        })
    }
}

/// Prompt text with `{{ … }}` references, parsed once and rendered per call.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    source: String,
    blocks: Vec<Block>,
}

impl PromptTemplate {
    pub fn parse(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let blocks = parser::parse(&source)?;
        Ok(Self { source, blocks })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Variables the template reads, lowercased, in first-use order.
    pub fn variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for block in &self.blocks {
            let name = match block {
                Block::Variable(n)
                | Block::Call {
                    argument: Some(CallArgument::Variable(n)),
                    ..
                } => n.to_lowercase(),
                _ => continue,
            };
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Functions the template calls, in order of appearance.
    pub fn function_calls(&self) -> Vec<&FunctionName> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Call { function, .. } => Some(function),
                _ => None,
            })
            .collect()
    }

    /// Render against `variables`. Variables missing from the bag fall back
    /// to the default declared in `parameters`. Calls go through `caller`
    /// with `depth + 1`; beyond `caller.max_depth()` rendering fails.
    pub async fn render(
        &self,
        variables: &ContextVariables,
        parameters: &[InputParameter],
        caller: &dyn FunctionCaller,
        depth: usize,
    ) -> Result<String> {
        let mut out = String::with_capacity(self.source.len());

        for block in &self.blocks {
            match block {
                Block::Text(text) | Block::Value(text) => out.push_str(text),
                Block::Variable(name) => out.push_str(lookup(name, variables, parameters)?),
                Block::Call { function, argument } => {
                    let next = depth + 1;
                    if next > caller.max_depth() {
                        return Err(SkeinError::Render {
                            reason: format!(
                                "call to {function} exceeds the maximum render depth of {}",
                                caller.max_depth()
                            ),
                            source: None,
                        });
                    }

                    let mut scoped = variables.clone();
                    match argument {
                        Some(CallArgument::Variable(name)) => {
                            let value = lookup(name, variables, parameters)?.to_string();
                            scoped.update_input(value);
                        }
                        Some(CallArgument::Value(value)) => scoped.update_input(value.clone()),
                        None => {}
                    }

                    debug!(function = %function, depth = next, "template calling function");
                    let result = caller
                        .call_function(function, scoped, next)
                        .await
                        .map_err(|e| SkeinError::render(format!("call to {function} failed"), e))?;
                    out.push_str(&result);
                }
            }
        }

        Ok(out)
    }
}

fn lookup<'a>(
    name: &str,
    variables: &'a ContextVariables,
    parameters: &'a [InputParameter],
) -> Result<&'a str> {
    if let Some(value) = variables.get(name) {
        return Ok(value);
    }
    parameters
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .map(|p| p.default_value.as_str())
        .ok_or_else(|| SkeinError::UndefinedVariable(name.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn renders_variables_and_literals() {
        let t = PromptTemplate::parse("Say: {{$input}} {{'{{$x}}'}}").unwrap();
        let out = t
            .render(&ContextVariables::with_input("hello"), &[], &NoFunctions, 0)
            .await
            .unwrap();
        assert_eq!(out, "Say: hello {{$x}}");
    }

    #[tokio::test]
    async fn declared_default_fills_missing_variable() {
        let t = PromptTemplate::parse("{{$style}}").unwrap();
        let params = [InputParameter::new("Style", "tone", "dry")];
        let out = t
            .render(&ContextVariables::new(), &params, &NoFunctions, 0)
            .await
            .unwrap();
        assert_eq!(out, "dry");
    }

    #[tokio::test]
    async fn call_without_functions_is_a_render_error() {
        let t = PromptTemplate::parse("{{text.trim}}").unwrap();
        let err = t
            .render(&ContextVariables::new(), &[], &NoFunctions, 0)
            .await
            .unwrap_err();
        match err {
            SkeinError::Render { source: Some(cause), .. } => {
                assert!(matches!(*cause, SkeinError::FunctionNotFound { .. }))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn depth_limit_checked_before_calling() {
        let t = PromptTemplate::parse("{{f}}").unwrap();
        let err = t
            .render(&ContextVariables::new(), &[], &NoFunctions, DEFAULT_MAX_RENDER_DEPTH)
            .await
            .unwrap_err();
        assert!(matches!(err, SkeinError::Render { source: None, .. }));
    }

    #[test]
    fn introspection() {
        let t = PromptTemplate::parse("{{$A}} {{f $b}} {{$a}} {{s.g}}").unwrap();
        assert_eq!(t.variable_names(), vec!["a", "b"]);
        let calls: Vec<String> = t.function_calls().iter().map(|f| f.to_string()).collect();
        assert_eq!(calls, vec!["f", "s.g"]);
        assert_eq!(t.source(), "{{$A}} {{f $b}} {{$a}} {{s.g}}");
    }
}
