//! Process-wide cache of the uploaded Pay Guide handle.

use crate::models::CachedDocument;
use crate::services::metrics;
use crate::services::pay_guide::{sha256_hex, PayGuideStore, PDF_MIME_TYPE};
use crate::services::providers::{ProviderError, TextProvider};
use chrono::Utc;
use service_core::error::AppError;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("{0}")]
    Document(#[from] AppError),

    #[error("Upload failed: {0}")]
    Upload(#[from] ProviderError),
}

/// Holds the file/model pair for the lifetime of the process.
///
/// Entries are only dropped by `clear`; the lock is held across an upload so
/// concurrent first questions share a single upload.
#[derive(Clone, Default)]
pub struct DocumentCache {
    inner: Arc<Mutex<Option<CachedDocument>>>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached handle for `model`, uploading the PDF on a miss.
    pub async fn get_or_upload(
        &self,
        provider: &dyn TextProvider,
        store: &PayGuideStore,
        model: &str,
        display_name: &str,
    ) -> Result<CachedDocument, CacheError> {
        let mut slot = self.inner.lock().await;

        if let Some(cached) = slot.as_ref() {
            if cached.model == model {
                return Ok(cached.clone());
            }
            tracing::info!(
                cached_model = %cached.model,
                model = %model,
                "Model changed, re-uploading Pay Guide"
            );
        }

        let bytes = store.read().await?;
        let sha256 = sha256_hex(&bytes);

        let handle = match provider
            .upload_document(bytes, PDF_MIME_TYPE, display_name)
            .await
        {
            Ok(handle) => {
                metrics::record_document_upload("success");
                handle
            }
            Err(e) => {
                metrics::record_document_upload("failure");
                tracing::error!(error = %e, "Pay Guide upload failed");
                return Err(e.into());
            }
        };

        let cached = CachedDocument {
            handle,
            model: model.to_string(),
            sha256,
            uploaded_at: Utc::now(),
        };

        tracing::info!(
            file = %cached.handle.name,
            model = %cached.model,
            sha256 = %cached.short_digest(),
            "Cached Pay Guide handle"
        );

        *slot = Some(cached.clone());
        Ok(cached)
    }

    pub async fn current(&self) -> Option<CachedDocument> {
        self.inner.lock().await.clone()
    }

    /// Forget the cached handle. Returns whether anything was cached.
    pub async fn clear(&self) -> bool {
        let previous = self.inner.lock().await.take();
        if let Some(cached) = &previous {
            tracing::info!(file = %cached.handle.name, "Cleared cached Pay Guide handle");
        }
        previous.is_some()
    }
}
