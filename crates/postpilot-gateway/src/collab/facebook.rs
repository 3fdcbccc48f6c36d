use async_trait::async_trait;
use postpilot_scheduler::{AccountCredentials, PlatformPublisher, PostMedia, PublishError};
use serde_json::json;
use tracing::info;

use super::graph_post;

/// Facebook Page publishing through the Graph API.
pub struct FacebookPublisher {
    client: reqwest::Client,
    base_url: String,
}

impl FacebookPublisher {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn edge(&self, page: &str, edge: &str) -> String {
        format!("{}/{}/{}", self.base_url, page, edge)
    }
}

#[async_trait]
impl PlatformPublisher for FacebookPublisher {
    async fn publish(
        &self,
        credentials: &AccountCredentials,
        caption: &str,
        media: &PostMedia,
    ) -> Result<String, PublishError> {
        let page = credentials.platform_user_id.as_str();
        let token = credentials.access_token.clone();

        let post_id = match media {
            PostMedia::Photo { image_url } => {
                let url = image_url
                    .clone()
                    .ok_or_else(|| PublishError::Rejected("photo post has no image".into()))?;
                let created = graph_post(
                    &self.client,
                    &self.edge(page, "photos"),
                    &[("url", url), ("caption", caption.to_string()), ("access_token", token)],
                )
                .await?;
                created.post_id.unwrap_or(created.id)
            }
            PostMedia::Carousel { media_urls } => {
                // Upload unpublished photos, then attach them to one feed post.
                let mut attached = Vec::with_capacity(media_urls.len());
                for url in media_urls {
                    let photo = graph_post(
                        &self.client,
                        &self.edge(page, "photos"),
                        &[
                            ("url", url.clone()),
                            ("published", "false".into()),
                            ("access_token", token.clone()),
                        ],
                    )
                    .await?;
                    attached.push(json!({ "media_fbid": photo.id }).to_string());
                }
                let keys: Vec<String> = (0..attached.len())
                    .map(|i| format!("attached_media[{i}]"))
                    .collect();
                let mut params = vec![("message", caption.to_string())];
                for (key, value) in keys.iter().zip(attached) {
                    params.push((key.as_str(), value));
                }
                params.push(("access_token", token));
                graph_post(&self.client, &self.edge(page, "feed"), &params)
                    .await?
                    .id
            }
            PostMedia::Reel { video_url, .. } => {
                let url = video_url
                    .clone()
                    .ok_or_else(|| PublishError::Rejected("reel post has no video".into()))?;
                graph_post(
                    &self.client,
                    &self.edge(page, "videos"),
                    &[
                        ("file_url", url),
                        ("description", caption.to_string()),
                        ("access_token", token),
                    ],
                )
                .await?
                .id
            }
        };
        info!(post_id = %post_id, "published to Facebook");
        Ok(post_id)
    }
}
