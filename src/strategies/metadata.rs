use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::clients::MetadataClient;
use super::{QualityTier, Strategy, Transcript, VideoId};
use crate::Result;

pub const NAME: &str = "metadata";

/// Last resort: the video's title and description instead of a transcript
pub struct MetadataStrategy {
    client: Arc<dyn MetadataClient>,
    timeout: Duration,
}

impl MetadataStrategy {
    pub fn new(client: Arc<dyn MetadataClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl Strategy for MetadataStrategy {
    fn name(&self) -> &str {
        NAME
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(&self, id: &VideoId) -> Result<Transcript> {
        let metadata = self.client.metadata(id).await?;

        let description = metadata
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Video has no description"))?;

        let text = match metadata.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => format!("{}\n\n{}", title, description),
            _ => description,
        };
        Ok(Transcript::new(text, QualityTier::MetadataFallback))
    }
}
