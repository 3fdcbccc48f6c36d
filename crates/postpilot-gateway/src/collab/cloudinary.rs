use async_trait::async_trait;
use base64::Engine as _;
use postpilot_core::config::CloudinaryConfig;
use postpilot_scheduler::{MediaError, MediaUploader};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

/// Unsigned uploads to Cloudinary using a configured upload preset.
pub struct CloudinaryUploader {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
}

impl CloudinaryUploader {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn upload(&self, bytes: Vec<u8>, folder: String) -> Result<String, MediaError> {
        let url = format!("{API_BASE}/{}/image/upload", self.config.cloud_name);
        let body = json!({
            "file": to_data_uri(&bytes),
            "upload_preset": self.config.upload_preset,
            "folder": folder,
        });

        debug!(bytes = bytes.len(), %folder, "uploading to Cloudinary");
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| MediaError::Upload(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Cloudinary upload rejected");
            return Err(MediaError::Upload(format!("Cloudinary returned {status}")));
        }
        let uploaded: UploadResponse = resp
            .json()
            .await
            .map_err(|e| MediaError::Upload(e.to_string()))?;
        Ok(uploaded.secure_url)
    }
}

#[async_trait]
impl MediaUploader for CloudinaryUploader {
    async fn upload_image(&self, bytes: Vec<u8>) -> Result<String, MediaError> {
        self.upload(bytes, self.config.folder.clone()).await
    }

    async fn upload_thumbnail(&self, bytes: Vec<u8>) -> Result<String, MediaError> {
        self.upload(bytes, format!("{}/thumbnails", self.config.folder))
            .await
    }
}

/// Cloudinary accepts inline files as data URIs.
fn to_data_uri(bytes: &[u8]) -> String {
    let mime = if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else {
        "image/png"
    };
    format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_sniffs_jpeg() {
        assert!(to_data_uri(&[0xFF, 0xD8, 0xFF, 0xE0]).starts_with("data:image/jpeg;base64,"));
        assert_eq!(to_data_uri(b"hi"), "data:image/png;base64,aGk=");
    }
}
