use std::path::{Path, PathBuf};

use axum::body::Bytes;
use chrono::Utc;
use uuid::Uuid;

use civisure_common::{AppError, UploadConfig};

/// One evidence attachment as received from the client.
#[derive(Debug, Clone)]
pub struct EvidenceUpload {
    pub original_name: String,
    pub bytes: Bytes,
}

/// Writes report attachments to the upload directory under generated names.
#[derive(Debug, Clone)]
pub struct EvidenceStorage {
    root: PathBuf,
    config: UploadConfig,
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

impl EvidenceStorage {
    pub async fn new(config: UploadConfig) -> Result<Self, AppError> {
        let root = PathBuf::from(&config.dir);
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            AppError::Internal(format!("Failed to create upload directory {}: {}", config.dir, e))
        })?;

        Ok(Self { root, config })
    }

    /// Check count, size and extension of every attachment before anything is written.
    pub fn validate(&self, uploads: &[EvidenceUpload]) -> Result<(), AppError> {
        if uploads.len() > self.config.max_files {
            return Err(AppError::Validation(format!(
                "At most {} evidence files are allowed",
                self.config.max_files
            )));
        }

        for upload in uploads {
            if upload.bytes.len() > self.config.max_file_size_bytes() {
                return Err(AppError::Validation(format!(
                    "File {} exceeds the {} MB limit",
                    upload.original_name, self.config.max_file_size_mb
                )));
            }

            let allowed = extension_of(&upload.original_name)
                .is_some_and(|ext| self.config.allowed_extensions.iter().any(|a| *a == ext));
            if !allowed {
                return Err(AppError::Validation(format!(
                    "File type not allowed: {}",
                    upload.original_name
                )));
            }
        }

        Ok(())
    }

    /// Persist one attachment and return its stored file name.
    pub async fn store(&self, upload: &EvidenceUpload) -> Result<String, AppError> {
        let ext = extension_of(&upload.original_name).unwrap_or_else(|| "bin".to_string());
        let file_name = format!(
            "evidence-{}-{}.{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            ext
        );

        tokio::fs::write(self.root.join(&file_name), &upload.bytes)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to store evidence file: {}", e)))?;

        tracing::debug!("Stored evidence {} as {}", upload.original_name, file_name);
        Ok(file_name)
    }

    pub async fn store_all(&self, uploads: &[EvidenceUpload]) -> Result<Vec<String>, AppError> {
        let mut stored = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match self.store(upload).await {
                Ok(name) => stored.push(name),
                Err(e) => {
                    self.remove_all(&stored).await;
                    return Err(e);
                }
            }
        }
        Ok(stored)
    }

    /// Best-effort cleanup of files written for a submission that did not commit.
    pub async fn remove_all(&self, file_names: &[String]) {
        for name in file_names {
            if let Err(e) = tokio::fs::remove_file(self.root.join(name)).await {
                tracing::warn!("Failed to remove evidence file {}: {}", name, e);
            }
        }
    }
}
