//! # skein-skills
//!
//! The semantic half of a skill: prompt templates and the configuration that
//! turns a template into an LLM-backed function.
//!
//! ## Template syntax
//!
//! ```text
//! Summarize {{$input}} in the style of {{$style}}.
//! Today is {{time.today}}. Translated: {{translate.french $input}}.
//! Literal braces: {{ '{{' }}
//! ```
//!
//! - `{{$name}}` substitutes a context variable (or the declared default).
//! - `{{skill.function}}` calls another registered function and substitutes
//!   its output; a bare `{{function}}` looks in the global skill.
//! - A call may take one argument, a `$variable` or a quoted value, which
//!   becomes the callee's `input`.
//! - `'…'` / `"…"` is a literal value; `\` escapes quotes inside it.
//!
//! ## Prompt config document
//!
//! ```json
//! {
//!   "schema": 1,
//!   "type": "completion",
//!   "description": "Tell a joke",
//!   "completion": { "temperature": 0.7, "max_tokens": 128 },
//!   "default_services": ["davinci"],
//!   "input": { "parameters": [
//!     { "name": "input", "description": "Topic", "defaultValue": "" }
//!   ]}
//! }
//! ```

pub mod prompt_config;
pub mod semantic;
pub mod template;

pub use prompt_config::{InputConfig, InputParameter, PromptTemplateConfig};
pub use semantic::SemanticFunctionConfig;
pub use skein_llm::CompletionConfig;
pub use template::{
    Block, CallArgument, DEFAULT_MAX_RENDER_DEPTH, FunctionCaller, NoFunctions, PromptTemplate,
};
