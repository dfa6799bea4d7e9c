use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::captions::{parse_timed_text, select_track};
use super::clients::{CaptionClient, HttpFetcher};
use super::{Strategy, Transcript, VideoId};
use crate::Result;

pub const NAME: &str = "innertube";

/// Client-emulation fallback: structured caption data from the player API
pub struct InnertubeStrategy {
    client: Arc<dyn CaptionClient>,
    fetcher: Arc<dyn HttpFetcher>,
    language: String,
    timeout: Duration,
}

impl InnertubeStrategy {
    pub fn new(
        client: Arc<dyn CaptionClient>,
        fetcher: Arc<dyn HttpFetcher>,
        language: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            fetcher,
            language: language.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl Strategy for InnertubeStrategy {
    fn name(&self) -> &str {
        NAME
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(&self, id: &VideoId) -> Result<Transcript> {
        let tracks = self.client.caption_tracks(id).await?;
        let track = select_track(&tracks, &self.language)
            .ok_or_else(|| anyhow::anyhow!("No segments found"))?;

        let response = self.fetcher.fetch(&track.base_url, &[]).await?;
        if !response.is_success() {
            anyhow::bail!("Caption track request failed: HTTP {}", response.status);
        }

        let text = parse_timed_text(&response.body);
        if text.is_empty() {
            anyhow::bail!("No segments found");
        }
        Ok(Transcript::new(text, track.tier()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::captions::CaptionTrack;
    use crate::strategies::clients::{HttpResponse, MockCaptionClient, MockHttpFetcher};
    use crate::strategies::{QualityTier, StrategyResult};

    fn id() -> VideoId {
        VideoId::parse("dQw4w9WgXcQ").unwrap()
    }

    #[tokio::test]
    async fn test_reads_track_from_client() {
        let mut client = MockCaptionClient::new();
        client.expect_caption_tracks().times(1).returning(|_| {
            Ok(vec![CaptionTrack {
                base_url: "https://example.test/srv3".to_string(),
                language_code: "en".to_string(),
                kind: None,
            }])
        });
        let mut fetcher = MockHttpFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|url, _| url == "https://example.test/srv3")
            .returning(|_, _| {
                Ok(HttpResponse {
                    status: 200,
                    body: r#"<timedtext><body><p t="0" d="900">from the app</p></body></timedtext>"#.to_string(),
                })
            });

        let strategy = InnertubeStrategy::new(
            Arc::new(client),
            Arc::new(fetcher),
            "en",
            Duration::from_secs(1),
        );
        assert_eq!(
            strategy.attempt(&id()).await,
            StrategyResult::Success(Transcript::new("from the app", QualityTier::Exact))
        );
    }

    #[tokio::test]
    async fn test_client_error_is_failure() {
        let mut client = MockCaptionClient::new();
        client
            .expect_caption_tracks()
            .returning(|_| Err(anyhow::anyhow!("Video not playable (LOGIN_REQUIRED): bot check")));
        let fetcher = MockHttpFetcher::new();

        let strategy = InnertubeStrategy::new(
            Arc::new(client),
            Arc::new(fetcher),
            "en",
            Duration::from_secs(1),
        );
        match strategy.attempt(&id()).await {
            StrategyResult::Failure { reason } => assert!(reason.contains("LOGIN_REQUIRED")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
