use async_trait::async_trait;
use base64::Engine as _;
use postpilot_core::config::StabilityConfig;
use postpilot_scheduler::{ImageGenerator, MediaError};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

/// Text-to-image through the Stability AI REST API.
pub struct StabilityImageGenerator {
    client: reqwest::Client,
    config: StabilityConfig,
}

#[derive(Deserialize)]
struct GenerationResponse {
    artifacts: Vec<Artifact>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Artifact {
    base64: String,
    finish_reason: Option<String>,
}

impl StabilityImageGenerator {
    pub fn new(config: StabilityConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl ImageGenerator for StabilityImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, MediaError> {
        let url = format!(
            "{}/v1/generation/{}/text-to-image",
            self.config.base_url.trim_end_matches('/'),
            self.config.engine
        );
        let body = json!({
            "text_prompts": [{ "text": prompt, "weight": 1.0 }],
            "cfg_scale": 7,
            "width": 1024,
            "height": 1024,
            "samples": 1,
            "steps": 30,
        });

        debug!(engine = %self.config.engine, "requesting image generation");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| MediaError::Generation(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Stability API error");
            return Err(MediaError::Generation(format!("Stability returned {status}")));
        }

        let generated: GenerationResponse = resp
            .json()
            .await
            .map_err(|e| MediaError::Generation(e.to_string()))?;
        let artifact = generated
            .artifacts
            .into_iter()
            .next()
            .ok_or_else(|| MediaError::Generation("no image returned".into()))?;
        if artifact.finish_reason.as_deref() == Some("CONTENT_FILTERED") {
            return Err(MediaError::Generation("prompt was filtered".into()));
        }
        base64::engine::general_purpose::STANDARD
            .decode(artifact.base64)
            .map_err(|e| MediaError::Generation(e.to_string()))
    }
}
