//! The Pay Guide PDF on local disk.

use chrono::{DateTime, Utc};
use serde::Serialize;
use service_core::error::AppError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Readers tolerate junk before the header as long as it starts within the first KiB.
const PDF_HEADER_WINDOW: usize = 1024;
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Facts about the PDF currently on disk.
#[derive(Debug, Clone, Serialize)]
pub struct PayGuideInfo {
    pub size_bytes: u64,
    pub sha256: String,
    pub modified: Option<DateTime<Utc>>,
}

/// Reads and replaces the Pay Guide by its fixed path.
#[derive(Debug, Clone)]
pub struct PayGuideStore {
    path: PathBuf,
}

impl PayGuideStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::try_exists(&self.path).await.unwrap_or(false)
    }

    pub async fn read(&self) -> Result<Vec<u8>, AppError> {
        fs::read(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound(anyhow::anyhow!(
                    "Pay Guide PDF not found at {}",
                    self.path.display()
                ))
            } else {
                AppError::from(e)
            }
        })
    }

    /// Validate and atomically replace the PDF.
    pub async fn replace(&self, bytes: &[u8]) -> Result<PayGuideInfo, AppError> {
        if !is_pdf(bytes) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Uploaded file is not a PDF"
            )));
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let staging = self.staging_path();
        fs::write(&staging, bytes).await?;
        if let Err(e) = fs::rename(&staging, &self.path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }

        tracing::info!(
            path = %self.path.display(),
            size_bytes = bytes.len(),
            "Replaced Pay Guide PDF"
        );

        Ok(PayGuideInfo {
            size_bytes: bytes.len() as u64,
            sha256: sha256_hex(bytes),
            modified: Some(Utc::now()),
        })
    }

    /// `None` when no PDF has been provided yet.
    pub async fn metadata(&self) -> Result<Option<PayGuideInfo>, AppError> {
        let meta = match fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let bytes = self.read().await?;

        Ok(Some(PayGuideInfo {
            size_bytes: meta.len(),
            sha256: sha256_hex(&bytes),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        }))
    }

    /// A sibling file unique to one replace, so overlapping uploads never share it.
    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}.upload", Uuid::new_v4()));
        PathBuf::from(name)
    }
}

/// Whether `bytes` carry a PDF header.
pub fn is_pdf(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(PDF_HEADER_WINDOW)];
    window
        .windows(PDF_MAGIC.len())
        .any(|candidate| candidate == PDF_MAGIC)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
