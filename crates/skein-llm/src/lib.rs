//! # skein-llm
//!
//! Abstraction layer over text-completion services. The kernel only ever sees
//! the [`TextCompletion`] trait; vendor clients, the id → service registry,
//! and the retry wrapper live here.

pub mod mock;
pub mod openai;
pub mod provider;
pub mod registry;
pub mod retry;

pub use mock::MockTextCompletion;
pub use openai::{AzureTextCompletion, OpenAiTextCompletion};
pub use provider::{CompletionConfig, TextCompletion};
pub use registry::ServiceRegistry;
pub use retry::{RetryPolicy, RetryingCompletion};
