//! Gemini provider implementation

use crate::core::config::{ApiKey, Config, GenerationSettings};
use crate::core::constants::{finish, harm, role, API_KEY_HEADER};
use crate::core::provider::{Generation, GenerationRequest, Provider, ProviderError, Usage};
use crate::models::gemini::{
    Content, ErrorEnvelope, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    Part, SafetySetting,
};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest slice of an upstream error body kept in error messages
const MAX_ERROR_BODY: usize = 500;

/// Gemini provider speaking the `generateContent` REST API
pub struct GeminiProvider {
    client: Client,
    api_key: ApiKey,
    base_url: String,
    model: String,
    timeout: Duration,
    generation: GenerationSettings,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    ///
    /// # Arguments
    ///
    /// * `api_key` - Gemini API key, sent as `x-goog-api-key`
    /// * `base_url` - REST base URL, e.g. `https://generativelanguage.googleapis.com/v1beta`
    /// * `model` - Model name without the `models/` prefix
    /// * `timeout` - Bound on the whole upstream call
    /// * `generation` - Sampling parameters sent with every request
    pub fn new(
        api_key: ApiKey,
        base_url: String,
        model: String,
        timeout: Duration,
        generation: GenerationSettings,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unexpected(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            timeout,
            generation,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        Self::new(
            config.api_key.clone(),
            config.base_url.clone(),
            config.model.clone(),
            Duration::from_secs(config.request_timeout),
            config.generation.clone(),
        )
    }

    /// Get the endpoint URL for the configured model
    fn endpoint_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Build the Gemini request body
    fn build_request(&self, request: &GenerationRequest) -> GenerateContentRequest {
        let system_instruction = request.context.as_ref().map(|context| Content {
            role: None,
            parts: vec![Part::text(context.clone())],
        });

        let safety_settings = harm::ALL
            .iter()
            .map(|category| SafetySetting {
                category: category.to_string(),
                threshold: harm::BLOCK_MEDIUM_AND_ABOVE.to_string(),
            })
            .collect();

        GenerateContentRequest {
            contents: vec![Content {
                role: Some(role::USER.to_string()),
                parts: vec![Part::text(request.prompt.clone())],
            }],
            system_instruction,
            generation_config: Some(GenerationConfig {
                temperature: Some(self.generation.temperature),
                top_p: Some(self.generation.top_p),
                top_k: Some(self.generation.top_k),
                max_output_tokens: Some(self.generation.max_output_tokens),
                candidate_count: Some(1),
            }),
            safety_settings,
        }
    }

    /// Turn a decoded response into generated text
    fn extract_generation(response: GenerateContentResponse) -> Result<Generation, ProviderError> {
        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
        {
            return Err(ProviderError::Blocked(reason));
        }

        let usage = response.usage_metadata.as_ref().map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        let candidate = response
            .candidates
            .first()
            .ok_or(ProviderError::EmptyResponse)?;
        let finish_reason = candidate.finish_reason.clone();

        match candidate.text() {
            Some(text) => {
                match finish_reason.as_deref() {
                    None | Some(finish::STOP) => {}
                    Some(finish::MAX_TOKENS) => {
                        warn!("Gemini output truncated at max_output_tokens")
                    }
                    Some(other) => debug!("Gemini finished with reason {}", other),
                }
                Ok(Generation {
                    text,
                    finish_reason,
                    usage,
                })
            }
            None => match finish_reason.as_deref() {
                Some(reason @ (finish::SAFETY | finish::RECITATION)) => {
                    Err(ProviderError::Blocked(reason.to_string()))
                }
                _ => Err(ProviderError::EmptyResponse),
            },
        }
    }

    /// Classify Gemini errors into readable messages
    fn classify_error(error_body: &str) -> String {
        let detail = serde_json::from_str::<ErrorEnvelope>(error_body)
            .map(|envelope| match envelope.error.status {
                Some(status) => format!("{}: {}", status, envelope.error.message),
                None => envelope.error.message,
            })
            .unwrap_or_else(|_| error_body.chars().take(MAX_ERROR_BODY).collect());

        let lower = detail.to_lowercase();

        if lower.contains("api key not valid") || lower.contains("api_key_invalid") {
            return format!("Invalid API key. Please check GEMINI_API_KEY. ({})", detail);
        }

        if lower.contains("quota") || lower.contains("resource_exhausted") {
            return format!("Rate limit or quota exceeded. ({})", detail);
        }

        if lower.contains("user location is not supported") {
            return format!("Gemini API is not available in this region. ({})", detail);
        }

        if lower.contains("permission") {
            return format!("Permission denied for this API key. ({})", detail);
        }

        detail
    }

    fn map_transport_error(&self, error: reqwest::Error) -> ProviderError {
        if error.is_timeout() {
            ProviderError::Timeout(self.timeout)
        } else if error.is_connect() {
            ProviderError::Unreachable(error.to_string())
        } else if error.is_decode() || error.is_body() {
            ProviderError::InvalidResponse(error.to_string())
        } else {
            ProviderError::Unexpected(error.to_string())
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ProviderError> {
        let url = self.endpoint_url();
        let body = self.build_request(request);

        debug!(model = %self.model, "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !status.is_success() {
            let classified_error = Self::classify_error(&text);

            return Err(match status.as_u16() {
                401 | 403 => ProviderError::Authentication(classified_error),
                429 => ProviderError::RateLimit(classified_error),
                400 | 404 => ProviderError::BadRequest(classified_error),
                code => ProviderError::ApiError {
                    status: code,
                    message: classified_error,
                },
            });
        }

        let decoded: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let generation = Self::extract_generation(decoded)?;

        debug!(
            finish_reason = ?generation.finish_reason,
            usage = ?generation.usage,
            "Gemini generation complete"
        );

        Ok(generation)
    }

    fn provider_name(&self) -> &str {
        "Gemini"
    }
}
