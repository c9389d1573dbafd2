//! # skein-kernel
//!
//! Registers native and semantic functions, then runs them as pipelines
//! against a shared [`SkContext`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use skein_kernel::{Kernel, core_skills::TextSkill};
//! use skein_llm::MockTextCompletion;
//! use skein_skills::PromptTemplateConfig;
//!
//! # async fn demo() -> skein_core::Result<()> {
//! let kernel = Kernel::new();
//! kernel.add_text_completion_service("mock", Arc::new(MockTextCompletion::new("mock").echoing()));
//! kernel.import_skill(&TextSkill, "text")?;
//! let joke = kernel.create_semantic_function(
//!     "Tell a joke about {{$input}}",
//!     PromptTemplateConfig::default(),
//! )?;
//!
//! let ctx = kernel.run("  cats  ", &[kernel.func("text", "trim")?, joke]).await;
//! println!("{}", ctx.into_result()?.input());
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod context;
pub mod core_skills;
pub mod function;
pub mod kernel;

pub use collection::{Skill, SkillCollection};
pub use context::{Outcome, SkContext};
pub use function::{
    FunctionKind, FunctionView, NativeFunction, NativeHandler, ParameterView, SkFunction,
};
pub use kernel::Kernel;
