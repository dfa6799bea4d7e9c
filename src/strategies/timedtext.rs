use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::captions::parse_timed_text;
use super::clients::HttpFetcher;
use super::{QualityTier, Strategy, Transcript, VideoId};
use crate::Result;

pub const NAME: &str = "timedtext";

const TIMEDTEXT_URL: &str = "https://www.youtube.com/api/timedtext";

/// Direct timed-text client: asks for human captions first, then auto-generated ones
pub struct TimedTextStrategy {
    fetcher: Arc<dyn HttpFetcher>,
    language: String,
    timeout: Duration,
}

impl TimedTextStrategy {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, language: &str, timeout: Duration) -> Self {
        Self {
            fetcher,
            language: language.to_string(),
            timeout,
        }
    }

    fn track_url(&self, id: &VideoId, auto_generated: bool) -> String {
        let mut url = format!(
            "{}?v={}&lang={}",
            TIMEDTEXT_URL,
            urlencoding::encode(id.as_str()),
            urlencoding::encode(&self.language)
        );
        if auto_generated {
            url.push_str("&kind=asr");
        }
        url
    }

    async fn try_track(&self, id: &VideoId, auto_generated: bool) -> Result<Option<String>> {
        let url = self.track_url(id, auto_generated);
        let response = self.fetcher.fetch(&url, &[]).await?;

        if !response.is_success() {
            if !auto_generated {
                tracing::debug!("Manual captions for {} returned HTTP {}", id, response.status);
                return Ok(None);
            }
            anyhow::bail!("Timed-text request failed: HTTP {}", response.status);
        }

        let text = parse_timed_text(&response.body);
        Ok(Some(text).filter(|t| !t.is_empty()))
    }
}

#[async_trait]
impl Strategy for TimedTextStrategy {
    fn name(&self) -> &str {
        NAME
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(&self, id: &VideoId) -> Result<Transcript> {
        if let Some(text) = self.try_track(id, false).await? {
            return Ok(Transcript::new(text, QualityTier::Exact));
        }

        tracing::debug!("No '{}' captions for {}, trying auto-generated track", self.language, id);

        match self.try_track(id, true).await? {
            Some(text) => Ok(Transcript::new(text, QualityTier::Approximate)),
            None => anyhow::bail!("No '{}' transcript available", self.language),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::clients::{HttpResponse, MockHttpFetcher};
    use crate::strategies::StrategyResult;

    fn id() -> VideoId {
        VideoId::parse("dQw4w9WgXcQ").unwrap()
    }

    fn ok(body: &str) -> Result<HttpResponse> {
        Ok(HttpResponse {
            status: 200,
            body: body.to_string(),
        })
    }

    #[tokio::test]
    async fn test_human_captions_are_exact() {
        let mut fetcher = MockHttpFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|url, _| url.contains("lang=en") && !url.contains("kind=asr"))
            .times(1)
            .returning(|_, _| ok(r#"<transcript><text start="0">hello there</text></transcript>"#));

        let strategy = TimedTextStrategy::new(Arc::new(fetcher), "en", Duration::from_secs(1));
        assert_eq!(
            strategy.attempt(&id()).await,
            StrategyResult::Success(Transcript::new("hello there", QualityTier::Exact))
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_auto_generated() {
        let mut fetcher = MockHttpFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|url, _| !url.contains("kind=asr"))
            .returning(|_, _| ok(""));
        fetcher
            .expect_fetch()
            .withf(|url, _| url.contains("kind=asr"))
            .returning(|_, _| ok(r#"<transcript><text start="0">auto words</text></transcript>"#));

        let strategy = TimedTextStrategy::new(Arc::new(fetcher), "en", Duration::from_secs(1));
        let transcript = strategy.fetch(&id()).await.unwrap();
        assert_eq!(transcript.tier, QualityTier::Approximate);
        assert_eq!(transcript.text, "auto words");
    }

    #[tokio::test]
    async fn test_manual_track_error_still_tries_auto_generated() {
        let mut fetcher = MockHttpFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|url, _| !url.contains("kind=asr"))
            .times(1)
            .returning(|_, _| {
                Ok(HttpResponse {
                    status: 404,
                    body: String::new(),
                })
            });
        fetcher
            .expect_fetch()
            .withf(|url, _| url.contains("kind=asr"))
            .times(1)
            .returning(|_, _| ok(r#"<transcript><text start="0">auto words</text></transcript>"#));

        let strategy = TimedTextStrategy::new(Arc::new(fetcher), "en", Duration::from_secs(1));
        assert_eq!(
            strategy.attempt(&id()).await,
            StrategyResult::Success(Transcript::new("auto words", QualityTier::Approximate))
        );
    }

    #[tokio::test]
    async fn test_empty_everywhere_is_failure() {
        let mut fetcher = MockHttpFetcher::new();
        fetcher.expect_fetch().returning(|_, _| ok(""));

        let strategy = TimedTextStrategy::new(Arc::new(fetcher), "en", Duration::from_secs(1));
        match strategy.attempt(&id()).await {
            StrategyResult::Failure { reason } => assert!(reason.contains("No 'en' transcript")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_error_is_failure() {
        let mut fetcher = MockHttpFetcher::new();
        fetcher.expect_fetch().returning(|_, _| {
            Ok(HttpResponse {
                status: 429,
                body: String::new(),
            })
        });

        let strategy = TimedTextStrategy::new(Arc::new(fetcher), "en", Duration::from_secs(1));
        match strategy.attempt(&id()).await {
            StrategyResult::Failure { reason } => assert!(reason.contains("HTTP 429"), "{}", reason),
            other => panic!("unexpected {:?}", other),
        }
    }
}
