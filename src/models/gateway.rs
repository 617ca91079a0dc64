//! Gateway request and response bodies
//!
//! Validation happens here, before any upstream work is scheduled.

use crate::core::provider::GenerationRequest;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// POST body accepted by the generate endpoint
///
/// Only a JSON object is accepted. A derived `Deserialize` would also take a
/// positional array such as `["Hello"]`.
#[derive(Debug, Clone, Serialize, Default)]
pub struct GenerateRequest {
    pub prompt: Option<String>,
    pub context: Option<String>,
}

impl<'de> Deserialize<'de> for GenerateRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut object = Map::<String, Value>::deserialize(deserializer)?;

        let mut take_string = |name: &str| match object.remove(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(D::Error::custom(format!(
                "{}: expected a string, got {}",
                name,
                json_type(&other)
            ))),
        };

        Ok(GenerateRequest {
            prompt: take_string("prompt")?,
            context: take_string("context")?,
        })
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Shorten `text` to at most `max_chars` characters for log output
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}… ({} chars)", head, text.chars().count())
    } else {
        head
    }
}

/// Successful gateway response
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GenerateResponse {
    pub result: String,
}

/// Failed gateway response
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

impl GenerateRequest {
    /// Check required fields and turn the body into an upstream request.
    ///
    /// The returned `Err` carries the detail that follows
    /// `validation failed: ` in the response body.
    pub fn validate(self, max_prompt_chars: usize) -> Result<GenerationRequest, String> {
        let prompt = match self.prompt {
            Some(p) if !p.trim().is_empty() => p,
            _ => return Err("prompt required".to_string()),
        };

        let length = prompt.chars().count();
        if length > max_prompt_chars {
            return Err(format!(
                "prompt exceeds {} characters (got {})",
                max_prompt_chars, length
            ));
        }

        let context = self.context.filter(|c| !c.trim().is_empty());

        Ok(GenerationRequest { prompt, context })
    }
}
