use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use super::captions::{parse_timed_text, select_track, CaptionTrack};
use super::clients::{caption_tracks_from_player, HttpFetcher};
use super::{Strategy, Transcript, VideoId};
use crate::config::HttpConfig;
use crate::Result;

pub const NAME: &str = "watch-page";

const WATCH_URL: &str = "https://www.youtube.com/watch";

/// Scrapes the public watch page for its embedded caption track list
pub struct WatchPageStrategy {
    fetcher: Arc<dyn HttpFetcher>,
    http: HttpConfig,
    language: String,
    timeout: Duration,
}

fn player_response_regex() -> &'static Regex {
    static PLAYER: OnceLock<Regex> = OnceLock::new();
    PLAYER.get_or_init(|| {
        Regex::new(r"(?s)ytInitialPlayerResponse\s*=\s*(\{.+?\});\s*(?:var\s|</script>)")
            .expect("valid player response regex")
    })
}

fn caption_tracks_regex() -> &'static Regex {
    static TRACKS: OnceLock<Regex> = OnceLock::new();
    TRACKS.get_or_init(|| {
        Regex::new(r#"(?s)"captionTracks":\s*(\[.*?\])"#).expect("valid caption tracks regex")
    })
}

impl WatchPageStrategy {
    pub fn new(
        fetcher: Arc<dyn HttpFetcher>,
        http: HttpConfig,
        language: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            http,
            language: language.to_string(),
            timeout,
        }
    }

    fn page_headers(&self) -> Vec<(String, String)> {
        vec![
            ("User-Agent".to_string(), self.http.user_agent.clone()),
            ("Accept-Language".to_string(), self.http.accept_language.clone()),
        ]
    }

    /// Find the caption track list in a watch page
    pub fn extract_tracks(html: &str) -> Result<Vec<CaptionTrack>> {
        if let Some(caps) = player_response_regex().captures(html) {
            if let Ok(player) = serde_json::from_str::<Value>(&caps[1]) {
                return caption_tracks_from_player(&player);
            }
            tracing::debug!("Embedded player response did not parse, scanning for caption tracks");
        }

        let caps = caption_tracks_regex()
            .captures(html)
            .ok_or_else(|| anyhow::anyhow!("No tracks in HTML"))?;
        let tracks: Vec<CaptionTrack> =
            serde_json::from_str(&caps[1]).context("Malformed captionTracks in HTML")?;
        if tracks.is_empty() {
            anyhow::bail!("No tracks in HTML");
        }
        Ok(tracks)
    }
}

#[async_trait]
impl Strategy for WatchPageStrategy {
    fn name(&self) -> &str {
        NAME
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(&self, id: &VideoId) -> Result<Transcript> {
        let page_url = format!("{}?v={}", WATCH_URL, urlencoding::encode(id.as_str()));
        let page = self.fetcher.fetch(&page_url, &self.page_headers()).await?;
        if !page.is_success() {
            anyhow::bail!("Watch page request failed: HTTP {}", page.status);
        }
        tracing::debug!("Watch page for {} is {} bytes", id, page.body.len());

        let tracks = Self::extract_tracks(&page.body)?;
        let track = select_track(&tracks, &self.language)
            .ok_or_else(|| anyhow::anyhow!("No tracks in HTML"))?;

        let timed_text = self.fetcher.fetch(&track.base_url, &[]).await?;
        if !timed_text.is_success() {
            anyhow::bail!("Caption track request failed: HTTP {}", timed_text.status);
        }

        let text = parse_timed_text(&timed_text.body);
        if text.is_empty() {
            anyhow::bail!("Caption track for '{}' was empty", track.language_code);
        }
        Ok(Transcript::new(text, track.tier()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::clients::{HttpResponse, MockHttpFetcher};
    use crate::strategies::QualityTier;

    fn id() -> VideoId {
        VideoId::parse("dQw4w9WgXcQ").unwrap()
    }

    fn watch_page(tracks: &str) -> String {
        let player = serde_json::json!({
            "playabilityStatus": { "status": "OK" },
            "captions": {
                "playerCaptionsTracklistRenderer": {
                    "captionTracks": serde_json::from_str::<Value>(tracks).unwrap()
                }
            }
        });
        format!(
            "<html><script>var ytInitialPlayerResponse = {};var meta = 1;</script></html>",
            player
        )
    }

    #[test]
    fn test_extract_tracks_from_player_response() {
        let html = watch_page(r#"[{"baseUrl":"https://example.test/en","languageCode":"en"}]"#);
        let tracks = WatchPageStrategy::extract_tracks(&html).unwrap();
        assert_eq!(tracks[0].base_url, "https://example.test/en");
    }

    #[test]
    fn test_extract_tracks_from_bare_caption_list() {
        let html = r#"<html>junk "captionTracks":[{"baseUrl":"https://example.test/x","languageCode":"en","kind":"asr"}],"audioTracks":[]</html>"#;
        let tracks = WatchPageStrategy::extract_tracks(html).unwrap();
        assert!(tracks[0].is_auto_generated());
    }

    #[test]
    fn test_extract_tracks_from_consent_page() {
        let err = WatchPageStrategy::extract_tracks("<html>Before you continue</html>").unwrap_err();
        assert_eq!(err.to_string(), "No tracks in HTML");
    }

    #[tokio::test]
    async fn test_fetches_selected_track_with_browser_headers() {
        let mut fetcher = MockHttpFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|url, headers| {
                url.starts_with(WATCH_URL)
                    && headers.iter().any(|(name, _)| name == "User-Agent")
                    && headers.iter().any(|(name, _)| name == "Accept-Language")
            })
            .times(1)
            .returning(|_, _| {
                Ok(HttpResponse {
                    status: 200,
                    body: watch_page(
                        r#"[{"baseUrl":"https://example.test/de","languageCode":"de"},{"baseUrl":"https://example.test/en","languageCode":"en","kind":"asr"}]"#,
                    ),
                })
            });
        fetcher
            .expect_fetch()
            .withf(|url, _| url == "https://example.test/en")
            .times(1)
            .returning(|_, _| {
                Ok(HttpResponse {
                    status: 200,
                    body: r#"<transcript><text start="0">we&amp;#39;re live</text></transcript>"#.to_string(),
                })
            });

        let strategy = WatchPageStrategy::new(
            Arc::new(fetcher),
            HttpConfig::default(),
            "en",
            Duration::from_secs(1),
        );
        let transcript = strategy.fetch(&id()).await.unwrap();
        assert_eq!(transcript, Transcript::new("we're live", QualityTier::Approximate));
    }
}
