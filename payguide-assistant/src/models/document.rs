use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing state of an uploaded file on the provider side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    StateUnspecified,
    Processing,
    Active,
    Failed,
}

impl FileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileState::StateUnspecified => "unspecified",
            FileState::Processing => "processing",
            FileState::Active => "active",
            FileState::Failed => "failed",
        }
    }
}

/// Opaque reference to a file uploaded to the model provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentHandle {
    /// Provider resource name, e.g. `files/abc123`.
    pub name: String,
    /// URI passed back to the model in `fileData` parts.
    pub uri: String,
    pub mime_type: String,
    pub display_name: Option<String>,
    pub size_bytes: Option<u64>,
    pub state: FileState,
    pub expires_at: Option<DateTime<Utc>>,
}

/// An uploaded Pay Guide together with the model it is used with.
#[derive(Debug, Clone, Serialize)]
pub struct CachedDocument {
    pub handle: DocumentHandle,
    pub model: String,
    /// Hex SHA-256 of the uploaded bytes.
    pub sha256: String,
    pub uploaded_at: DateTime<Utc>,
}

impl CachedDocument {
    pub fn short_digest(&self) -> &str {
        &self.sha256[..self.sha256.len().min(12)]
    }
}
