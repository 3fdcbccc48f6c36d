use std::time::Duration;

use async_trait::async_trait;
use postpilot_scheduler::{AccountCredentials, PlatformPublisher, PostMedia, PublishError};
use serde::Deserialize;
use tracing::{debug, info};

use super::{graph_post, read_graph};

/// Reel containers are polled this many times before giving up.
const REEL_POLL_ATTEMPTS: u32 = 30;
const REEL_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Instagram Graph API: create a media container, then publish it.
pub struct InstagramPublisher {
    client: reqwest::Client,
    base_url: String,
}

impl InstagramPublisher {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn create_container(
        &self,
        creds: &AccountCredentials,
        params: Vec<(&str, String)>,
    ) -> Result<String, PublishError> {
        let url = format!("{}/{}/media", self.base_url, creds.platform_user_id);
        let mut params = params;
        params.push(("access_token", creds.access_token.clone()));
        Ok(graph_post(&self.client, &url, &params).await?.id)
    }

    /// Wait for a video container to finish processing.
    async fn await_ready(&self, creds: &AccountCredentials, container: &str) -> Result<(), PublishError> {
        #[derive(Deserialize)]
        struct Status {
            status_code: Option<String>,
        }

        let url = format!("{}/{}", self.base_url, container);
        for attempt in 1..=REEL_POLL_ATTEMPTS {
            let resp = self
                .client
                .get(&url)
                .query(&[
                    ("fields", "status_code"),
                    ("access_token", creds.access_token.as_str()),
                ])
                .send()
                .await
                .map_err(|e| PublishError::Transport(e.to_string()))?;
            let status: Status = read_graph(resp).await?;
            match status.status_code.as_deref() {
                Some("FINISHED") => return Ok(()),
                Some("ERROR") | Some("EXPIRED") => {
                    return Err(PublishError::Rejected(
                        "Instagram could not process the reel video".into(),
                    ))
                }
                other => debug!(container, attempt, status = ?other, "reel still processing"),
            }
            tokio::time::sleep(REEL_POLL_INTERVAL).await;
        }
        Err(PublishError::Rejected(
            "Instagram did not finish processing the reel in time".into(),
        ))
    }
}

#[async_trait]
impl PlatformPublisher for InstagramPublisher {
    async fn publish(
        &self,
        credentials: &AccountCredentials,
        caption: &str,
        media: &PostMedia,
    ) -> Result<String, PublishError> {
        let container = match media {
            PostMedia::Photo { image_url } => {
                let image_url = image_url
                    .clone()
                    .ok_or_else(|| PublishError::Rejected("photo post has no image".into()))?;
                self.create_container(
                    credentials,
                    vec![("image_url", image_url), ("caption", caption.to_string())],
                )
                .await?
            }
            PostMedia::Carousel { media_urls } => {
                let mut children = Vec::with_capacity(media_urls.len());
                for url in media_urls {
                    let child = self
                        .create_container(
                            credentials,
                            vec![("image_url", url.clone()), ("is_carousel_item", "true".into())],
                        )
                        .await?;
                    children.push(child);
                }
                self.create_container(
                    credentials,
                    vec![
                        ("media_type", "CAROUSEL".into()),
                        ("children", children.join(",")),
                        ("caption", caption.to_string()),
                    ],
                )
                .await?
            }
            PostMedia::Reel {
                video_url,
                thumbnail_url,
            } => {
                let video_url = video_url
                    .clone()
                    .ok_or_else(|| PublishError::Rejected("reel post has no video".into()))?;
                let mut params = vec![
                    ("media_type", "REELS".to_string()),
                    ("video_url", video_url),
                    ("caption", caption.to_string()),
                ];
                if let Some(cover) = thumbnail_url {
                    params.push(("cover_url", cover.clone()));
                }
                let container = self.create_container(credentials, params).await?;
                self.await_ready(credentials, &container).await?;
                container
            }
        };

        let url = format!("{}/{}/media_publish", self.base_url, credentials.platform_user_id);
        let published = graph_post(
            &self.client,
            &url,
            &[
                ("creation_id", container),
                ("access_token", credentials.access_token.clone()),
            ],
        )
        .await?;
        info!(media_id = %published.id, "published to Instagram");
        Ok(published.id)
    }
}
