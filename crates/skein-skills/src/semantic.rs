use tracing::debug;

use crate::prompt_config::{InputParameter, PromptTemplateConfig};
use crate::template::PromptTemplate;
use skein_core::Result;
use skein_llm::CompletionConfig;

/// A prompt config paired with its parsed template: everything needed to
/// register a semantic function.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticFunctionConfig {
    prompt_config: PromptTemplateConfig,
    template: PromptTemplate,
}

impl SemanticFunctionConfig {
    pub fn new(prompt_config: PromptTemplateConfig, template: PromptTemplate) -> Self {
        Self {
            prompt_config,
            template,
        }
    }

    /// Parse `source` as the template for `prompt_config`.
    pub fn from_source(prompt_config: PromptTemplateConfig, source: &str) -> Result<Self> {
        let template = PromptTemplate::parse(source)?;
        for name in template.variable_names() {
            if prompt_config.parameter(&name).is_none() {
                debug!(variable = %name, "template variable has no declared default");
            }
        }
        Ok(Self::new(prompt_config, template))
    }

    /// Load both halves from their text forms: the JSON config and the
    /// template source.
    pub fn from_json(config_json: &str, source: &str) -> Result<Self> {
        Self::from_source(PromptTemplateConfig::from_json(config_json)?, source)
    }

    pub fn prompt_config(&self) -> &PromptTemplateConfig {
        &self.prompt_config
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn completion(&self) -> &CompletionConfig {
        &self.prompt_config.completion
    }

    pub fn parameters(&self) -> &[InputParameter] {
        &self.prompt_config.input.parameters
    }

    pub fn description(&self) -> &str {
        &self.prompt_config.description
    }
}
