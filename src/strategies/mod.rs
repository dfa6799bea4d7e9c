use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub mod captions;
pub mod clients;
pub mod innertube;
pub mod metadata;
pub mod subprocess;
pub mod timedtext;
pub mod watch_page;

use crate::config::Config;
use crate::{Result, RetrievalError};
use clients::{InnertubeClient, ReqwestFetcher, YouTubeDataClient};

/// Names of every strategy the registry knows how to build
pub const KNOWN_STRATEGIES: &[&str] = &[
    timedtext::NAME,
    subprocess::NAME,
    watch_page::NAME,
    innertube::NAME,
    metadata::NAME,
];

/// Validated identifier of a YouTube video
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoId(String);

impl VideoId {
    /// Parse a bare video id or any supported YouTube URL
    pub fn parse(input: &str) -> std::result::Result<Self, RetrievalError> {
        crate::utils::extract_video_id(input)
            .map(Self)
            .ok_or_else(|| RetrievalError::InvalidIdentifier(input.trim().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for VideoId {
    type Error = RetrievalError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VideoId> for String {
    fn from(id: VideoId) -> Self {
        id.0
    }
}

impl FromStr for VideoId {
    type Err = RetrievalError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// How faithful a piece of retrieved text is to the spoken content
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    /// Human-authored captions
    Exact,
    /// Auto-generated captions
    Approximate,
    /// Video description only
    MetadataFallback,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Exact => "exact",
            QualityTier::Approximate => "approximate",
            QualityTier::MetadataFallback => "metadata_fallback",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text produced by a strategy together with its quality tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub tier: QualityTier,
}

impl Transcript {
    pub fn new(text: impl Into<String>, tier: QualityTier) -> Self {
        Self {
            text: text.into(),
            tier,
        }
    }
}

/// Outcome of a single strategy attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyResult {
    Success(Transcript),
    Failure { reason: String },
}

impl StrategyResult {
    /// Build a success, demoting blank text to a failure
    pub fn success(text: impl Into<String>, tier: QualityTier) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            return Self::failure("Empty transcript returned");
        }
        Self::Success(Transcript { text, tier })
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    /// Re-check a result that may have been built without [`StrategyResult::success`]
    pub fn into_checked(self) -> Self {
        match self {
            Self::Success(t) => Self::success(t.text, t.tier),
            failure => failure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// A single independently invocable way of producing text for a video
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Stable name used in configuration and diagnostics
    fn name(&self) -> &str;

    /// Upper bound for one attempt
    fn timeout(&self) -> Duration;

    /// Produce text for the video. Errors become failures in [`Strategy::attempt`].
    async fn fetch(&self, id: &VideoId) -> Result<Transcript>;

    /// Run one bounded attempt. Never errors, never exceeds [`Strategy::timeout`].
    async fn attempt(&self, id: &VideoId) -> StrategyResult {
        let limit = self.timeout();
        match tokio::time::timeout(limit, self.fetch(id)).await {
            Ok(Ok(transcript)) => StrategyResult::success(transcript.text, transcript.tier),
            Ok(Err(e)) => StrategyResult::failure(format!("{:#}", e)),
            Err(_) => StrategyResult::failure(format!("Timed out after {}ms", limit.as_millis())),
        }
    }
}

/// Registry of named strategies available for wave composition
pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Build every strategy the configuration enables, sharing one HTTP connection pool
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| RetrievalError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let fetcher = Arc::new(ReqwestFetcher::new(http.clone()));
        let settings = &config.strategies;
        let mut registry = Self::new();

        registry.register(Arc::new(timedtext::TimedTextStrategy::new(
            fetcher.clone(),
            &settings.language,
            settings.timedtext.timeout(),
        )));
        registry.register(Arc::new(subprocess::SubprocessStrategy::new(
            settings.subprocess.program.clone(),
            settings.subprocess.args.clone(),
            settings.subprocess.timeout(),
        )));
        registry.register(Arc::new(watch_page::WatchPageStrategy::new(
            fetcher.clone(),
            config.http.clone(),
            &settings.language,
            settings.watch_page.timeout(),
        )));
        registry.register(Arc::new(innertube::InnertubeStrategy::new(
            Arc::new(InnertubeClient::new(http.clone(), settings.innertube.clone())),
            fetcher,
            &settings.language,
            settings.innertube.timeout(),
        )));

        match config.metadata_api_key() {
            Some(api_key) => {
                registry.register(Arc::new(metadata::MetadataStrategy::new(
                    Arc::new(YouTubeDataClient::new(http, api_key)),
                    settings.metadata.timeout(),
                )));
            }
            None => tracing::debug!("No metadata API key configured, metadata strategy disabled"),
        }

        Ok(registry)
    }

    /// Register a new strategy, replacing any existing one with the same name
    pub fn register(&mut self, strategy: Arc<dyn Strategy>) {
        self.strategies.retain(|s| s.name() != strategy.name());
        self.strategies.push(strategy);
    }

    /// Find a strategy by name
    pub fn find(&self, name: &str) -> Option<Arc<dyn Strategy>> {
        self.strategies
            .iter()
            .find(|strategy| strategy.name() == name)
            .cloned()
    }

    /// List registered strategy names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
