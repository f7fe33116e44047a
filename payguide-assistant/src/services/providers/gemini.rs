//! Gemini AI provider implementation.
//!
//! Talks to the Generative Language REST API: the Files API for the Pay Guide
//! upload, `generateContent` for answers and the model listing for
//! diagnostics. The API key travels in the `x-goog-api-key` header.

use super::{
    FinishReason, GenerateRequest, ModelInfo, ProviderError, ProviderResponse, TextProvider,
};
use crate::config::GeminiSettings;
use crate::models::{DocumentHandle, FileState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";
const MODELS_PAGE_SIZE: u32 = 100;

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Secret<String>,
    /// Scheme and host, without the API version (e.g. `https://generativelanguage.googleapis.com`).
    pub base_url: String,
    pub request_timeout: Duration,
    pub file_poll_attempts: u32,
    pub file_poll_interval: Duration,
}

impl From<&GeminiSettings> for GeminiConfig {
    fn from(settings: &GeminiSettings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            file_poll_attempts: settings.file_poll_attempts,
            file_poll_interval: Duration::from_millis(settings.file_poll_interval_ms),
        }
    }
}

/// Gemini text provider.
pub struct GeminiProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/v1beta/{}", self.config.base_url, path)
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/v1beta/files", self.config.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(API_KEY_HEADER, self.config.api_key.expose_secret())
    }

    fn ensure_configured(&self) -> Result<(), ProviderError> {
        if self.config.api_key.expose_secret().is_empty() {
            return Err(ProviderError::NotConfigured(
                "Gemini API key not configured".to_string(),
            ));
        }
        Ok(())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ProviderError> {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }

        let message = serde_json::from_str::<ApiErrorEnvelope>(&error_text)
            .map(|e| e.error.message)
            .unwrap_or(error_text);

        Err(ProviderError::ApiError(format!(
            "Gemini API error {}: {}",
            status, message
        )))
    }

    async fn get_file(&self, name: &str) -> Result<DocumentHandle, ProviderError> {
        let response = self
            .send(self.authorized(self.client.get(self.api_url(name))))
            .await?;

        let file: FileResource = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse file: {}", e)))?;

        Ok(file.into())
    }

    /// Poll a freshly uploaded file until the provider finishes processing it.
    async fn wait_until_active(
        &self,
        mut handle: DocumentHandle,
    ) -> Result<DocumentHandle, ProviderError> {
        let mut attempts = 0;

        loop {
            match handle.state {
                FileState::Active | FileState::StateUnspecified => return Ok(handle),
                FileState::Failed => {
                    return Err(ProviderError::FileProcessingFailed(format!(
                        "{} was rejected by the provider",
                        handle.name
                    )))
                }
                FileState::Processing => {}
            }

            if attempts >= self.config.file_poll_attempts {
                return Err(ProviderError::FileProcessingFailed(format!(
                    "{} still processing after {} checks",
                    handle.name, attempts
                )));
            }

            attempts += 1;
            tokio::time::sleep(self.config.file_poll_interval).await;

            tracing::debug!(file = %handle.name, attempt = attempts, "Polling file state");
            handle = self.get_file(&handle.name).await?;
        }
    }
}

#[async_trait]
impl TextProvider for GeminiProvider {
    async fn upload_document(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        display_name: &str,
    ) -> Result<DocumentHandle, ProviderError> {
        self.ensure_configured()?;

        if bytes.is_empty() {
            return Err(ProviderError::InvalidRequest(
                "Refusing to upload an empty document".to_string(),
            ));
        }

        let size = bytes.len();

        tracing::debug!(
            display_name = %display_name,
            size_bytes = size,
            "Starting resumable upload to Gemini Files API"
        );

        let start = self
            .authorized(self.client.post(self.upload_url()))
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&StartUploadRequest {
                file: StartUploadFile {
                    display_name: display_name.to_string(),
                },
            });

        let start_response = self.send(start).await?;

        let session_url = start_response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ProviderError::ApiError("Upload session URL missing from response".to_string())
            })?;

        let finalize = self
            .client
            .post(&session_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .header(reqwest::header::CONTENT_LENGTH, size.to_string())
            .body(bytes);

        let uploaded: UploadFileResponse = self
            .send(finalize)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse upload: {}", e)))?;

        let handle: DocumentHandle = uploaded.file.into();

        tracing::info!(
            file = %handle.name,
            state = handle.state.as_str(),
            size_bytes = size,
            "Uploaded document to Gemini"
        );

        self.wait_until_active(handle).await
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<ProviderResponse, ProviderError> {
        self.ensure_configured()?;

        if request.prompt.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("Prompt is empty".to_string()));
        }

        let mut parts = Vec::with_capacity(2);
        if let Some(document) = &request.document {
            parts.push(RequestPart::FileData {
                file_data: FileData {
                    mime_type: document.mime_type.clone(),
                    file_uri: document.uri.clone(),
                },
            });
        }
        parts.push(RequestPart::Text {
            text: request.prompt.clone(),
        });

        let body = GenerateContentRequest {
            system_instruction: (!request.system_instruction.is_empty()).then(|| {
                SystemInstruction {
                    parts: vec![RequestPart::Text {
                        text: request.system_instruction.clone(),
                    }],
                }
            }),
            contents: vec![RequestContent {
                role: "user".to_string(),
                parts,
            }],
        };

        let url = self.api_url(&format!(
            "{}:generateContent",
            qualified_model_name(&request.model)
        ));

        tracing::debug!(
            model = %request.model,
            prompt_len = request.prompt.len(),
            has_document = request.document.is_some(),
            "Sending request to Gemini API"
        );

        let api_response: GenerateContentResponse = self
            .send(self.authorized(self.client.post(&url)).json(&body))
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        if api_response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_ref())
            .is_some()
        {
            return Err(ProviderError::ContentFiltered);
        }

        let candidate = api_response.candidates.first();

        let finish_reason = candidate
            .map(|c| finish_reason_from(c.finish_reason.as_deref()))
            .unwrap_or(FinishReason::Other);

        if finish_reason == FinishReason::ContentFilter {
            return Err(ProviderError::ContentFiltered);
        }

        let text: String = candidate
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|p| !p.thought.unwrap_or(false))
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        let usage = api_response.usage_metadata.unwrap_or_default();

        Ok(ProviderResponse {
            text,
            input_tokens: usage.prompt_token_count.unwrap_or(0),
            output_tokens: usage.candidates_token_count.unwrap_or(0),
            finish_reason,
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        self.ensure_configured()?;

        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .authorized(self.client.get(self.api_url("models")))
                .query(&[("pageSize", MODELS_PAGE_SIZE.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page: ListModelsResponse = self
                .send(request)
                .await?
                .json()
                .await
                .map_err(|e| ProviderError::ApiError(format!("Failed to parse models: {}", e)))?;

            models.extend(page.models.into_iter().map(|m| ModelInfo {
                name: m.name,
                display_name: m.display_name,
                supported_generation_methods: m.supported_generation_methods,
            }));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(models)
    }
}

/// Accept both `gemini-2.5-flash` and `models/gemini-2.5-flash`.
fn qualified_model_name(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

fn finish_reason_from(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("STOP") | None => FinishReason::Complete,
        Some("MAX_TOKENS") => FinishReason::Length,
        Some("SAFETY") | Some("PROHIBITED_CONTENT") | Some("BLOCKLIST") | Some("SPII") => {
            FinishReason::ContentFilter
        }
        Some(_) => FinishReason::Other,
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartUploadRequest {
    file: StartUploadFile,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartUploadFile {
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct UploadFileResponse {
    file: FileResource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    /// int64 values are encoded as JSON strings.
    #[serde(default)]
    size_bytes: Option<String>,
    #[serde(default)]
    expiration_time: Option<DateTime<Utc>>,
    uri: String,
    #[serde(default)]
    state: Option<FileState>,
}

impl From<FileResource> for DocumentHandle {
    fn from(file: FileResource) -> Self {
        Self {
            name: file.name,
            uri: file.uri,
            mime_type: file
                .mime_type
                .unwrap_or_else(|| "application/pdf".to_string()),
            display_name: file.display_name,
            size_bytes: file.size_bytes.and_then(|s| s.parse().ok()),
            state: file.state.unwrap_or(FileState::StateUnspecified),
            expires_at: file.expiration_time,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    role: String,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text {
        text: String,
    },
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<i32>,
    candidates_token_count: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelResource {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}
