//! Mock provider implementation for testing.

use super::{
    FinishReason, GenerateRequest, ModelInfo, ProviderError, ProviderResponse, TextProvider,
};
use crate::models::{DocumentHandle, FileState};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Mock text provider for testing.
///
/// Answers with a fixed text (or echoes the prompt) and remembers every
/// request it received.
pub struct MockTextProvider {
    enabled: bool,
    answer: Option<String>,
    failure: Option<String>,
    uploads: AtomicUsize,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockTextProvider {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            answer: None,
            failure: None,
            uploads: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with `answer`.
    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = Some(answer.into());
        self
    }

    /// Fail every generation with an API error carrying `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn ensure_enabled(&self) -> Result<(), ProviderError> {
        if self.enabled {
            Ok(())
        } else {
            Err(ProviderError::NotConfigured(
                "Mock text provider not enabled".to_string(),
            ))
        }
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    async fn upload_document(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        display_name: &str,
    ) -> Result<DocumentHandle, ProviderError> {
        self.ensure_enabled()?;

        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;

        Ok(DocumentHandle {
            name: format!("files/mock-{}", n),
            uri: format!("mock://files/mock-{}", n),
            mime_type: mime_type.to_string(),
            display_name: Some(display_name.to_string()),
            size_bytes: Some(bytes.len() as u64),
            state: FileState::Active,
            expires_at: None,
        })
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<ProviderResponse, ProviderError> {
        self.ensure_enabled()?;

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(message) = &self.failure {
            return Err(ProviderError::ApiError(message.clone()));
        }

        let text = self
            .answer
            .clone()
            .unwrap_or_else(|| format!("Mock response for: {}", request.prompt));

        Ok(ProviderResponse {
            text,
            input_tokens: request.prompt.len() as i32 / 4,
            output_tokens: 10,
            finish_reason: FinishReason::Complete,
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        self.ensure_enabled()?;

        Ok(vec![
            ModelInfo {
                name: "models/mock-flash".to_string(),
                display_name: Some("Mock Flash".to_string()),
                supported_generation_methods: vec!["generateContent".to_string()],
            },
            ModelInfo {
                name: "models/mock-embedding".to_string(),
                display_name: Some("Mock Embedding".to_string()),
                supported_generation_methods: vec!["embedContent".to_string()],
            },
        ])
    }
}
