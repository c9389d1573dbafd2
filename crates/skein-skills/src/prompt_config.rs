use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use skein_core::{Result, SkeinError};
use skein_llm::CompletionConfig;

/// A declared input of a semantic function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputParameter {
    pub name: String,
    pub description: String,
    #[serde(rename = "defaultValue")]
    pub default_value: String,
}

impl InputParameter {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        default_value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default_value: default_value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    pub parameters: Vec<InputParameter>,
}

/// Configuration of a prompt-backed function: metadata, sampling parameters,
/// preferred services, and declared inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplateConfig {
    pub schema: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub completion: CompletionConfig,
    pub default_services: Vec<String>,
    pub input: InputConfig,
}

impl Default for PromptTemplateConfig {
    fn default() -> Self {
        Self {
            schema: 1,
            kind: "completion".into(),
            description: String::new(),
            completion: CompletionConfig::default(),
            default_services: vec![],
            input: InputConfig::default(),
        }
    }
}

impl PromptTemplateConfig {
    /// Build a config from a loosely-typed document (e.g. parsed JSON).
    ///
    /// Absent fields fall back to their defaults, including every field of
    /// the `completion` block. Each entry of `input.parameters` must carry
    /// `name`, `description`, and `defaultValue`.
    pub fn from_dict(document: &Value) -> Result<Self> {
        let doc = document
            .as_object()
            .ok_or_else(|| SkeinError::Format("prompt config must be a JSON object".into()))?;
        let defaults = Self::default();

        let schema = match present(doc, "schema") {
            Some(v) => v
                .as_i64()
                .ok_or_else(|| wrong_type("schema", "an integer"))?,
            None => defaults.schema,
        };
        let kind = opt_string(doc, "type")?.unwrap_or(defaults.kind);
        let description = opt_string(doc, "description")?.unwrap_or_default();

        let completion = match present(doc, "completion") {
            Some(v) => {
                let block = v
                    .as_object()
                    .ok_or_else(|| wrong_type("completion", "an object"))?;
                completion_from_map(block)?
            }
            None => CompletionConfig::default(),
        };

        let default_services = opt_string_list(doc, "default_services")?.unwrap_or_default();

        let mut input = InputConfig::default();
        if let Some(v) = present(doc, "input") {
            let block = v
                .as_object()
                .ok_or_else(|| wrong_type("input", "an object"))?;
            if let Some(params) = present(block, "parameters") {
                let params = params
                    .as_array()
                    .ok_or_else(|| wrong_type("input.parameters", "an array"))?;
                input.parameters = parameters_from_array(params, &description)?;
            }
        }

        Ok(Self {
            schema,
            kind,
            description,
            completion,
            default_services,
            input,
        })
    }

    /// Decode JSON text, then [`from_dict`](Self::from_dict).
    pub fn from_json(json: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(json)
            .map_err(|e| SkeinError::Format(format!("malformed prompt config JSON: {e}")))?;
        Self::from_dict(&document)
    }

    /// Build a config directly from sampling parameters, skipping the
    /// document form. Use `..Default::default()` for the fields you don't set.
    pub fn from_completion_parameters(completion: CompletionConfig) -> Self {
        Self {
            completion,
            ..Self::default()
        }
    }

    /// Re-serialize to the document shape accepted by `from_dict`.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_services = services.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parameter(mut self, parameter: InputParameter) -> Self {
        self.input.parameters.push(parameter);
        self
    }

    /// Declared parameter by (case-insensitive) name.
    pub fn parameter(&self, name: &str) -> Option<&InputParameter> {
        self.input
            .parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// A key that exists and is not `null`.
fn present<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|v| !v.is_null())
}

fn wrong_type(field: &str, expected: &str) -> SkeinError {
    SkeinError::Format(format!("'{field}' must be {expected}"))
}

fn opt_string(map: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    present(map, key)
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| wrong_type(key, "a string"))
        })
        .transpose()
}

fn opt_string_list(map: &Map<String, Value>, key: &str) -> Result<Option<Vec<String>>> {
    let Some(v) = present(map, key) else {
        return Ok(None);
    };
    let items = v
        .as_array()
        .ok_or_else(|| wrong_type(key, "an array of strings"))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| wrong_type(key, "an array of strings"))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn opt_f64(map: &Map<String, Value>, key: &str) -> Result<Option<f64>> {
    present(map, key)
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| wrong_type(&format!("completion.{key}"), "a number"))
        })
        .transpose()
}

fn opt_u32(map: &Map<String, Value>, key: &str) -> Result<Option<u32>> {
    present(map, key)
        .map(|v| {
            v.as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| wrong_type(&format!("completion.{key}"), "a non-negative integer"))
        })
        .transpose()
}

fn completion_from_map(block: &Map<String, Value>) -> Result<CompletionConfig> {
    let d = CompletionConfig::default();
    Ok(CompletionConfig {
        temperature: opt_f64(block, "temperature")?.unwrap_or(d.temperature),
        top_p: opt_f64(block, "top_p")?.unwrap_or(d.top_p),
        presence_penalty: opt_f64(block, "presence_penalty")?.unwrap_or(d.presence_penalty),
        frequency_penalty: opt_f64(block, "frequency_penalty")?.unwrap_or(d.frequency_penalty),
        max_tokens: opt_u32(block, "max_tokens")?.unwrap_or(d.max_tokens),
        number_of_responses: opt_u32(block, "number_of_responses")?
            .unwrap_or(d.number_of_responses),
        stop_sequences: opt_string_list(block, "stop_sequences")?.unwrap_or(d.stop_sequences),
    })
}

fn parameters_from_array(params: &[Value], function: &str) -> Result<Vec<InputParameter>> {
    let mut seen = HashSet::new();
    let mut parsed = Vec::with_capacity(params.len());

    for (i, param) in params.iter().enumerate() {
        let param = param.as_object().ok_or_else(|| {
            SkeinError::Format(format!(
                "input parameter #{i} is not an object (function: {function})"
            ))
        })?;

        let name = match param.get("name") {
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(SkeinError::Format(format!(
                    "input parameter #{i} has a non-string name (function: {function})"
                )));
            }
            None => {
                return Err(SkeinError::Format(format!(
                    "the input parameter #{i} doesn't have a name (function: {function})"
                )));
            }
        };
        let description = match param.get("description") {
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(SkeinError::Format(format!(
                    "input parameter '{name}' has a non-string description (function: {function})"
                )));
            }
            None => {
                return Err(SkeinError::Format(format!(
                    "input parameter '{name}' doesn't have a description (function: {function})"
                )));
            }
        };
        let default_value = match param.get("defaultValue") {
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(SkeinError::Format(format!(
                    "input parameter '{name}' has a non-string default value (function: {function})"
                )));
            }
            None => {
                return Err(SkeinError::Format(format!(
                    "input parameter '{name}' doesn't have a default value (function: {function})"
                )));
            }
        };

        if !seen.insert(name.to_lowercase()) {
            return Err(SkeinError::Format(format!(
                "input parameter '{name}' is declared twice (function: {function})"
            )));
        }
        parsed.push(InputParameter {
            name,
            description,
            default_value,
        });
    }

    Ok(parsed)
}
