//! HTTP adapters for the external collaborators the scheduler depends on.

pub mod cloudinary;
pub mod facebook;
pub mod instagram;
pub mod stability;

use async_trait::async_trait;
use postpilot_scheduler::{ImageGenerator, MediaError, MediaUploader, PublishError};
use serde::Deserialize;

/// Stand-in when a collaborator has no config section; every call fails.
pub struct Unconfigured(pub &'static str);

#[async_trait]
impl ImageGenerator for Unconfigured {
    async fn generate(&self, _prompt: &str) -> Result<Vec<u8>, MediaError> {
        Err(MediaError::Generation(format!("{} is not configured", self.0)))
    }
}

#[async_trait]
impl MediaUploader for Unconfigured {
    async fn upload_image(&self, _bytes: Vec<u8>) -> Result<String, MediaError> {
        Err(MediaError::Upload(format!("{} is not configured", self.0)))
    }

    async fn upload_thumbnail(&self, _bytes: Vec<u8>) -> Result<String, MediaError> {
        Err(MediaError::Upload(format!("{} is not configured", self.0)))
    }
}

#[derive(Deserialize)]
struct GraphErrorBody {
    error: GraphErrorDetail,
}

#[derive(Deserialize)]
struct GraphErrorDetail {
    message: String,
}

#[derive(Deserialize)]
struct GraphId {
    id: String,
    /// Present on page photo posts; the feed post wrapping the photo.
    post_id: Option<String>,
}

/// POST `params` to a Graph API `url` and return the created object.
async fn graph_post(
    client: &reqwest::Client,
    url: &str,
    params: &[(&str, String)],
) -> Result<GraphId, PublishError> {
    let resp = client
        .post(url)
        .form(params)
        .send()
        .await
        .map_err(|e| PublishError::Transport(e.to_string()))?;
    read_graph(resp).await
}

async fn read_graph<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<T, PublishError> {
    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| PublishError::Transport(e.to_string()))?;
    if !status.is_success() {
        return Err(PublishError::Rejected(graph_error_message(&text)));
    }
    serde_json::from_str(&text).map_err(|e| PublishError::Transport(format!("bad response: {e}")))
}

/// The platform's own error text when the body carries one.
fn graph_error_message(body: &str) -> String {
    serde_json::from_str::<GraphErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_text_is_extracted() {
        let body = r#"{"error":{"message":"Error validating access token","type":"OAuthException","code":190}}"#;
        assert_eq!(graph_error_message(body), "Error validating access token");
        assert_eq!(graph_error_message("upstream timeout"), "upstream timeout");
    }
}
