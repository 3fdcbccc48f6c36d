//! Media preparation: turn a post's media fields into hosted URLs.
//!
//! Inline `data:` images are uploaded, missing images are generated from the
//! caption, missing reel videos come from the video generator. The result
//! either satisfies the post kind's required media or is a [`MediaError`].

use async_trait::async_trait;
use base64::Engine as _;
use tracing::{info, warn};

use crate::error::MediaError;
use crate::types::PostMedia;

/// Fewest carousel images a publish may go out with.
pub const MIN_CAROUSEL_IMAGES: usize = 3;
pub const MAX_CAROUSEL_IMAGES: usize = 5;

/// Text-to-image generator.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Raw image bytes for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, MediaError>;
}

/// Text-to-video generator. Returns a hosted video URL.
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, MediaError>;
}

/// Media host.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload_image(&self, bytes: Vec<u8>) -> Result<String, MediaError>;
    async fn upload_thumbnail(&self, bytes: Vec<u8>) -> Result<String, MediaError>;
}

/// Default video generator: there is none, reels must carry a video URL.
pub struct UnsupportedVideoGenerator;

#[async_trait]
impl VideoGenerator for UnsupportedVideoGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, MediaError> {
        Err(MediaError::VideoGeneration(
            "video generation is not available; provide a video URL for reel posts".into(),
        ))
    }
}

/// How many carousel images to generate for a caption of `caption_len` chars.
pub fn carousel_image_count(caption_len: usize) -> usize {
    (caption_len / 100 + 3).clamp(MIN_CAROUSEL_IMAGES, MAX_CAROUSEL_IMAGES)
}

/// Decode an inline `data:<mime>;base64,<payload>` URI.
///
/// Returns `Ok(None)` when `value` is not a data URI at all.
pub fn decode_data_uri(value: &str) -> Result<Option<Vec<u8>>, MediaError> {
    let Some(rest) = value.strip_prefix("data:") else {
        return Ok(None);
    };
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| MediaError::InvalidDataUri("missing ',' separator".into()))?;
    if !meta.ends_with(";base64") {
        return Err(MediaError::InvalidDataUri(format!(
            "unsupported encoding: {meta}"
        )));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| MediaError::InvalidDataUri(e.to_string()))?;
    Ok(Some(bytes))
}

/// Resolves post media against the configured collaborators.
pub struct MediaPreparer {
    images: Box<dyn ImageGenerator>,
    videos: Box<dyn VideoGenerator>,
    uploader: Box<dyn MediaUploader>,
}

impl MediaPreparer {
    pub fn new(
        images: Box<dyn ImageGenerator>,
        videos: Box<dyn VideoGenerator>,
        uploader: Box<dyn MediaUploader>,
    ) -> Self {
        Self {
            images,
            videos,
            uploader,
        }
    }

    /// Resolve `media` for a post with `caption`. Any error is fatal for the post.
    pub async fn prepare(&self, caption: &str, media: &PostMedia) -> Result<PostMedia, MediaError> {
        let resolved = match media {
            PostMedia::Photo { image_url } => PostMedia::Photo {
                image_url: Some(self.resolve_photo(caption, image_url.as_deref()).await?),
            },
            PostMedia::Carousel { media_urls } => PostMedia::Carousel {
                media_urls: self.resolve_carousel(caption, media_urls).await?,
            },
            PostMedia::Reel {
                video_url,
                thumbnail_url,
            } => {
                let video_url = match video_url.as_deref().filter(|u| !u.is_empty()) {
                    Some(url) => url.to_string(),
                    None => self.videos.generate(caption).await?,
                };
                PostMedia::Reel {
                    video_url: Some(video_url),
                    thumbnail_url: self.resolve_thumbnail(thumbnail_url.as_deref()).await,
                }
            }
        };
        ensure_complete(&resolved)?;
        Ok(resolved)
    }

    async fn resolve_photo(&self, caption: &str, image_url: Option<&str>) -> Result<String, MediaError> {
        match image_url.filter(|u| !u.is_empty()) {
            Some(url) => match decode_data_uri(url)? {
                Some(bytes) => {
                    let hosted = self.uploader.upload_image(bytes).await?;
                    info!(url = %hosted, "inline image uploaded");
                    Ok(hosted)
                }
                None => Ok(url.to_string()),
            },
            None => {
                let bytes = self.images.generate(caption).await?;
                let hosted = self.uploader.upload_image(bytes).await?;
                info!(url = %hosted, "generated image uploaded");
                Ok(hosted)
            }
        }
    }

    async fn resolve_carousel(&self, caption: &str, urls: &[String]) -> Result<Vec<String>, MediaError> {
        if !urls.is_empty() {
            return Ok(urls.to_vec());
        }

        let wanted = carousel_image_count(caption.chars().count());
        let mut hosted = Vec::with_capacity(wanted);
        for i in 1..=wanted {
            let prompt = format!("{caption} - variation {i}");
            let uploaded = match self.images.generate(&prompt).await {
                Ok(bytes) => self.uploader.upload_image(bytes).await,
                Err(e) => Err(e),
            };
            match uploaded {
                Ok(url) => hosted.push(url),
                Err(e) => warn!(variation = i, error = %e, "carousel image skipped"),
            }
        }

        if hosted.len() < MIN_CAROUSEL_IMAGES {
            return Err(MediaError::NotEnoughImages {
                got: hosted.len(),
                needed: MIN_CAROUSEL_IMAGES,
            });
        }
        info!(count = hosted.len(), "carousel images generated");
        Ok(hosted)
    }

    /// Inline thumbnails are uploaded; failures drop the thumbnail.
    async fn resolve_thumbnail(&self, thumbnail: Option<&str>) -> Option<String> {
        let thumbnail = thumbnail.filter(|t| !t.is_empty())?;
        let bytes = match decode_data_uri(thumbnail) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Some(thumbnail.to_string()),
            Err(e) => {
                warn!(error = %e, "thumbnail dropped");
                return None;
            }
        };
        match self.uploader.upload_thumbnail(bytes).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, "thumbnail upload failed; publishing without it");
                None
            }
        }
    }
}

fn ensure_complete(media: &PostMedia) -> Result<(), MediaError> {
    let missing = match media {
        PostMedia::Photo { image_url } => image_url.is_none().then_some("photo post has no image"),
        PostMedia::Carousel { media_urls } => media_urls
            .is_empty()
            .then_some("carousel post has no media"),
        PostMedia::Reel { video_url, .. } => video_url.is_none().then_some("reel post has no video"),
    };
    match missing {
        Some(msg) => Err(MediaError::MissingMedia(msg.into())),
        None => Ok(()),
    }
}
