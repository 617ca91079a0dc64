//! Provider abstraction for the upstream generative-AI service
//!
//! Handlers only see the `Provider` trait, so the Gemini client can be
//! replaced by a stub in tests.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Error types for provider operations
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Upstream request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Upstream unreachable: {0}")]
    Unreachable(String),

    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),

    #[error("Prompt blocked by upstream: {0}")]
    Blocked(String),

    #[error("Upstream returned no content")]
    EmptyResponse,

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// A single prompt to forward upstream
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// System context prepended by the upstream as an instruction
    pub context: Option<String>,
}

/// Token accounting reported by the upstream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Generated output
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

/// Trait for generative-AI upstream providers
#[async_trait]
pub trait Provider: Send + Sync {
    /// Send one prompt upstream and wait for the full result
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, ProviderError>;

    /// Get the provider name
    fn provider_name(&self) -> &str;
}
