//! Third-party surfaces the strategies talk to, behind small capability traits.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::captions::CaptionTrack;
use super::VideoId;
use crate::config::InnertubeConfig;
use crate::Result;

const INNERTUBE_PLAYER_URL: &str = "https://www.youtube.com/youtubei/v1/player?prettyPrint=false";
const DATA_API_VIDEOS_URL: &str = "https://www.googleapis.com/youtube/v3/videos";

/// Status and body of a fetched document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Plain document fetch used by the scraping strategies
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn fetch(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse>;
}

/// [`HttpFetcher`] backed by a pooled reqwest client
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        Ok(HttpResponse { status, body })
    }
}

/// Structured caption data from an emulated first-party client
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptionClient: Send + Sync {
    async fn caption_tracks(&self, id: &VideoId) -> Result<Vec<CaptionTrack>>;
}

/// Emulates a mobile app client against the internal player API
pub struct InnertubeClient {
    client: Client,
    settings: InnertubeConfig,
}

impl InnertubeClient {
    pub fn new(client: Client, settings: InnertubeConfig) -> Self {
        Self { client, settings }
    }

    fn request_body(&self, id: &VideoId) -> Value {
        json!({
            "context": {
                "client": {
                    "clientName": self.settings.client_name,
                    "clientVersion": self.settings.client_version,
                    "androidSdkVersion": self.settings.android_sdk_version,
                    "hl": "en",
                }
            },
            "videoId": id.as_str(),
            "contentCheckOk": true,
            "racyCheckOk": true,
        })
    }
}

#[async_trait]
impl CaptionClient for InnertubeClient {
    async fn caption_tracks(&self, id: &VideoId) -> Result<Vec<CaptionTrack>> {
        tracing::debug!("Requesting player response for {} as {}", id, self.settings.client_name);

        let user_agent = format!(
            "com.google.android.youtube/{} (Linux; U; Android 11) gzip",
            self.settings.client_version
        );
        let response = self
            .client
            .post(INNERTUBE_PLAYER_URL)
            .header("User-Agent", user_agent)
            .header("X-YouTube-Client-Name", self.settings.client_id.to_string())
            .header("X-YouTube-Client-Version", self.settings.client_version.as_str())
            .json(&self.request_body(id))
            .send()
            .await
            .context("Player request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Player request failed: HTTP {}", response.status());
        }

        let player: Value = response
            .json()
            .await
            .context("Failed to parse player response")?;

        caption_tracks_from_player(&player)
    }
}

/// Extract caption tracks from a player response, reporting why none are available
pub fn caption_tracks_from_player(player: &Value) -> Result<Vec<CaptionTrack>> {
    let status = player["playabilityStatus"]["status"].as_str().unwrap_or("OK");
    if status != "OK" {
        let reason = player["playabilityStatus"]["reason"]
            .as_str()
            .unwrap_or("no reason given");
        anyhow::bail!("Video not playable ({}): {}", status, reason);
    }

    let tracks = &player["captions"]["playerCaptionsTracklistRenderer"]["captionTracks"];
    if tracks.is_null() {
        anyhow::bail!("No caption tracks in player response");
    }

    let tracks: Vec<CaptionTrack> =
        serde_json::from_value(tracks.clone()).context("Malformed caption track list")?;
    if tracks.is_empty() {
        anyhow::bail!("No caption tracks in player response");
    }
    Ok(tracks)
}

/// Title and description of a video
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Metadata lookup keyed by an API credential
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataClient: Send + Sync {
    async fn metadata(&self, id: &VideoId) -> Result<VideoMetadata>;
}

/// [`MetadataClient`] backed by the public Data API
pub struct YouTubeDataClient {
    client: Client,
    api_key: String,
}

impl YouTubeDataClient {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl MetadataClient for YouTubeDataClient {
    async fn metadata(&self, id: &VideoId) -> Result<VideoMetadata> {
        let response = self
            .client
            .get(DATA_API_VIDEOS_URL)
            .query(&[
                ("part", "snippet"),
                ("id", id.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("Metadata request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Metadata request failed: HTTP {}", response.status());
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse metadata response")?;

        let snippet = &body["items"][0]["snippet"];
        if snippet.is_null() {
            anyhow::bail!("Video not found in metadata API");
        }

        Ok(VideoMetadata {
            title: snippet["title"].as_str().map(str::to_string),
            description: snippet["description"].as_str().map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caption_tracks_from_player() {
        let player = json!({
            "playabilityStatus": { "status": "OK" },
            "captions": {
                "playerCaptionsTracklistRenderer": {
                    "captionTracks": [
                        { "baseUrl": "https://example.test/a", "languageCode": "en", "kind": "asr" },
                        { "baseUrl": "https://example.test/b", "languageCode": "fr" }
                    ]
                }
            }
        });

        let tracks = caption_tracks_from_player(&player).unwrap();
        assert_eq!(tracks.len(), 2);
        assert!(tracks[0].is_auto_generated());
        assert_eq!(tracks[1].kind, None);
    }

    #[test]
    fn test_caption_tracks_from_unplayable_player() {
        let player = json!({
            "playabilityStatus": { "status": "LOGIN_REQUIRED", "reason": "Sign in to confirm you're not a bot" }
        });
        let err = caption_tracks_from_player(&player).unwrap_err();
        assert!(err.to_string().contains("LOGIN_REQUIRED"));

        let no_captions = json!({ "playabilityStatus": { "status": "OK" } });
        assert!(caption_tracks_from_player(&no_captions).is_err());
    }

    #[test]
    fn test_http_response_success_range() {
        assert!(HttpResponse { status: 204, body: String::new() }.is_success());
        assert!(!HttpResponse { status: 429, body: String::new() }.is_success());
    }
}
