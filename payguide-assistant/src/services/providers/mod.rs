//! Model provider abstraction.
//!
//! The assistant needs three things from a generative-AI backend: accept a
//! file, answer a prompt about it and list the models available to the key.
//! `TextProvider` is that seam; the
//! Gemini REST client implements it for production and the mock for tests.

pub mod gemini;
pub mod mock;

use crate::models::DocumentHandle;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limited by the model provider, try again shortly")]
    RateLimited,

    #[error("The response was blocked by the provider's safety filter")]
    ContentFiltered,

    #[error("The model returned an empty response")]
    EmptyResponse,

    #[error("File processing failed: {0}")]
    FileProcessingFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::ApiError(_) => "api_error",
            ProviderError::InvalidRequest(_) => "invalid_request",
            ProviderError::RateLimited => "rate_limited",
            ProviderError::ContentFiltered => "content_filtered",
            ProviderError::EmptyResponse => "empty_response",
            ProviderError::FileProcessingFailed(_) => "file_failed",
            ProviderError::NetworkError(_) => "network_error",
        }
    }
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    Length,
    ContentFilter,
    Other,
}

/// A single generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub system_instruction: String,
    pub document: Option<DocumentHandle>,
    /// User text, already combined with any prior turns.
    pub prompt: String,
}

/// Result of a provider response.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub text: String,
    pub input_tokens: i32,
    pub output_tokens: i32,
    pub finish_reason: FinishReason,
}

/// A model as reported by the provider's model listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub display_name: Option<String>,
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    pub fn supports(&self, method: &str) -> bool {
        self.supported_generation_methods.iter().any(|m| m == method)
    }
}

/// Trait for document-grounded text generation providers (e.g., Gemini).
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Upload a document and return the provider's handle to it.
    async fn upload_document(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        display_name: &str,
    ) -> Result<DocumentHandle, ProviderError>;

    /// Generate a text answer.
    async fn generate(&self, request: &GenerateRequest) -> Result<ProviderResponse, ProviderError>;

    /// List the models available to the configured credentials.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError>;
}
