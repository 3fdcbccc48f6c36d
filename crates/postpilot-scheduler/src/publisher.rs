use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use postpilot_core::Platform;

use crate::error::PublishError;
use crate::types::{AccountCredentials, PostMedia};

/// Publishes a fully resolved post to one social network.
///
/// Called at most once per post; there is no automatic retry.
#[async_trait]
pub trait PlatformPublisher: Send + Sync {
    /// Returns the platform's id for the new post.
    async fn publish(
        &self,
        credentials: &AccountCredentials,
        caption: &str,
        media: &PostMedia,
    ) -> Result<String, PublishError>;
}

/// One publisher per platform.
#[derive(Clone, Default)]
pub struct Publishers {
    by_platform: HashMap<Platform, Arc<dyn PlatformPublisher>>,
}

impl Publishers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `publisher` for `platform`, replacing any earlier one.
    pub fn with(mut self, platform: Platform, publisher: Arc<dyn PlatformPublisher>) -> Self {
        self.by_platform.insert(platform, publisher);
        self
    }

    pub fn get(&self, platform: Platform) -> Option<&Arc<dyn PlatformPublisher>> {
        self.by_platform.get(&platform)
    }

    pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        self.by_platform.keys().copied()
    }
}
