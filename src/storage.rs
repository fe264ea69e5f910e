use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage is not configured")]
    NotConfigured,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upload rejected: {status} {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9.-]").expect("regex compiles"));

/// Client for the blob-storage CDN: PUT with an access-key header to the
/// storage zone, public reads from the CDN hostname. Two operations, no
/// retries; a failed write is reported and abandoned.
#[derive(Clone)]
pub struct StorageClient {
    client: reqwest::Client,
    storage_base: Url,
    cdn_base: Url,
    access_key: String,
}

impl StorageClient {
    pub fn new(storage_base: Url, cdn_base: Url, access_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            storage_base,
            cdn_base,
            access_key,
        }
    }

    fn storage_url(&self, path: &str) -> Result<Url, StorageError> {
        self.storage_base
            .join(path.trim_start_matches('/'))
            .map_err(|_| StorageError::NotConfigured)
    }

    /// Uploads a blob, returning its public CDN URL.
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        path: &str,
        content_type: &str,
    ) -> Result<Url, StorageError> {
        if self.access_key.is_empty() {
            return Err(StorageError::NotConfigured);
        }
        let sanitized = path.trim_start_matches('/');
        let url = self.storage_url(sanitized)?;

        let response = self
            .client
            .put(url)
            .header("AccessKey", &self.access_key)
            .header(
                "Content-Type",
                if content_type.is_empty() {
                    "application/octet-stream"
                } else {
                    content_type
                },
            )
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected { status, body });
        }

        self.cdn_base
            .join(sanitized)
            .map_err(|_| StorageError::NotConfigured)
    }

    /// Deletes a blob. `false` on any failure; callers treat a missing blob
    /// and a failed delete the same way.
    pub async fn delete(&self, path: &str) -> bool {
        if self.access_key.is_empty() {
            return false;
        }
        let Ok(url) = self.storage_url(path.trim_start_matches('/')) else {
            return false;
        };
        match self
            .client
            .delete(url)
            .header("AccessKey", &self.access_key)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::warn!(error = %err, path, "storage delete failed");
                false
            }
        }
    }
}

/// Storage path for a class document: timestamped and with the file name
/// reduced to a safe character set.
pub fn document_path(class_id: &str, file_name: &str) -> String {
    let timestamp = Utc::now().timestamp_millis();
    let safe_name = UNSAFE_CHARS.replace_all(file_name, "_");
    let safe_class = UNSAFE_CHARS.replace_all(class_id, "_");
    format!("class-documents/{safe_class}/{timestamp}_{safe_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_path_sanitizes_name() {
        let path = document_path("c1", "đề thi giữa kỳ.pdf");
        assert!(path.starts_with("class-documents/c1/"));
        assert!(path.ends_with(".pdf"));
        assert!(!path.contains(' '));
        // Multibyte characters are flattened to underscores.
        let name = path.rsplit('/').next().unwrap();
        assert!(name.chars().all(|c| c.is_ascii()));
    }

    #[test]
    fn test_document_path_keeps_safe_chars() {
        let path = document_path("c1", "notes-v2.final.PDF");
        assert!(path.contains("notes-v2.final.PDF"));
    }
}
