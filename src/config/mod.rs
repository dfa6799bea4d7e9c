use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::strategies::{self, KNOWN_STRATEGIES};
use crate::RetrievalError;

/// Environment variable that overrides the metadata API key
pub const API_KEY_ENV: &str = "YOUTUBE_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Waterfall composition and deadlines
    pub engine: EngineConfig,

    /// Per-strategy settings
    pub strategies: StrategiesConfig,

    /// Headers sent by the scraping strategies
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Global deadline for one retrieval
    pub deadline_ms: u64,

    /// Execution ceiling of the host; the deadline must stay below it
    pub host_ceiling_ms: u64,

    /// Maximum number of failures kept for diagnostics
    pub ledger_capacity: usize,

    /// Waves in escalation order
    pub waves: Vec<WaveConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveConfig {
    pub label: String,
    pub strategies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategiesConfig {
    /// Preferred caption language
    pub language: String,

    pub timedtext: TimeoutConfig,
    pub subprocess: SubprocessConfig,
    pub watch_page: TimeoutConfig,
    pub innertube: InnertubeConfig,
    pub metadata: MetadataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubprocessConfig {
    pub timeout_ms: u64,

    /// Executable to launch
    pub program: String,

    /// Arguments placed before the video id
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InnertubeConfig {
    pub timeout_ms: u64,
    pub client_name: String,
    pub client_id: u8,
    pub client_version: String,
    pub android_sdk_version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub timeout_ms: u64,

    /// Data API key; `YOUTUBE_API_KEY` takes precedence
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub accept_language: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 9000,
            host_ceiling_ms: 10_000,
            ledger_capacity: 32,
            waves: vec![
                WaveConfig {
                    label: "fast".to_string(),
                    strategies: vec![
                        strategies::timedtext::NAME.to_string(),
                        strategies::subprocess::NAME.to_string(),
                        strategies::watch_page::NAME.to_string(),
                    ],
                },
                WaveConfig {
                    label: "client-emulation".to_string(),
                    strategies: vec![strategies::innertube::NAME.to_string()],
                },
                WaveConfig {
                    label: "last-resort".to_string(),
                    strategies: vec![strategies::metadata::NAME.to_string()],
                },
            ],
        }
    }
}

impl Default for StrategiesConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            timedtext: TimeoutConfig::default(),
            subprocess: SubprocessConfig::default(),
            watch_page: TimeoutConfig::default(),
            innertube: InnertubeConfig::default(),
            metadata: MetadataConfig::default(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { timeout_ms: 6000 }
    }
}

impl Default for SubprocessConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 8000,
            program: "python3".to_string(),
            args: vec!["scripts/get_transcript.py".to_string()],
        }
    }
}

impl Default for InnertubeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            client_name: "ANDROID".to_string(),
            client_id: 3,
            client_version: "19.09.37".to_string(),
            android_sdk_version: 30,
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 3000,
            api_key: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36".to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
        }
    }
}

impl EngineConfig {
    /// A deadline must be positive and strictly below the host ceiling
    pub fn check_deadline(&self, deadline_ms: u64) -> std::result::Result<(), RetrievalError> {
        if deadline_ms == 0 {
            return Err(RetrievalError::Config("deadline_ms must be positive".to_string()));
        }
        if deadline_ms >= self.host_ceiling_ms {
            return Err(RetrievalError::Config(format!(
                "deadline_ms ({}) must be below host_ceiling_ms ({})",
                deadline_ms, self.host_ceiling_ms
            )));
        }
        Ok(())
    }
}

impl TimeoutConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl SubprocessConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl InnertubeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl MetadataConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Load configuration from an explicit path, the working directory, or the user config dir.
    ///
    /// A missing file at the user config location is created with defaults.
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let (config_path, is_default_location) = match explicit {
            Some(path) => (path.to_path_buf(), false),
            None => Self::config_path()?,
        };

        let config = if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            serde_yaml::from_str::<Config>(&content).context("Failed to parse config file")?
        } else if is_default_location {
            let config = Self::default();
            if let Err(e) = config.save_to(&config_path) {
                tracing::warn!("Could not write default config to {}: {:#}", config_path.display(), e);
            }
            config
        } else {
            anyhow::bail!("Config file not found: {}", config_path.display());
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the user config location
    pub async fn save(&self) -> Result<()> {
        let (config_path, _) = Self::config_path()?;
        self.save_to(&config_path)
    }

    fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path, and whether it is the user config location
    pub fn config_path() -> Result<(PathBuf, bool)> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok((local_config, false));
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok((config_dir.join("transcript-waterfall").join("config.yaml"), true))
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), RetrievalError> {
        let engine = &self.engine;

        engine.check_deadline(engine.deadline_ms)?;
        if engine.waves.is_empty() {
            return Err(RetrievalError::Config("at least one wave is required".to_string()));
        }

        for wave in &engine.waves {
            if wave.strategies.is_empty() {
                return Err(RetrievalError::Config(format!("wave '{}' has no strategies", wave.label)));
            }
            for name in &wave.strategies {
                if !KNOWN_STRATEGIES.contains(&name.as_str()) {
                    return Err(RetrievalError::Config(format!(
                        "wave '{}' names unknown strategy '{}' (known: {})",
                        wave.label,
                        name,
                        KNOWN_STRATEGIES.join(", ")
                    )));
                }
                if let Some(timeout) = self.strategy_timeout(name) {
                    if timeout >= self.deadline() {
                        tracing::warn!(
                            "Strategy {} timeout {}ms is not below the {}ms deadline",
                            name,
                            timeout.as_millis(),
                            engine.deadline_ms
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Global deadline for one retrieval
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.engine.deadline_ms)
    }

    /// Configured timeout of a named strategy
    pub fn strategy_timeout(&self, name: &str) -> Option<Duration> {
        let s = &self.strategies;
        match name {
            strategies::timedtext::NAME => Some(s.timedtext.timeout()),
            strategies::subprocess::NAME => Some(s.subprocess.timeout()),
            strategies::watch_page::NAME => Some(s.watch_page.timeout()),
            strategies::innertube::NAME => Some(s.innertube.timeout()),
            strategies::metadata::NAME => Some(s.metadata.timeout()),
            _ => None,
        }
    }

    /// Metadata API key, preferring the environment
    pub fn metadata_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .or_else(|| self.strategies.metadata.api_key.clone())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Deadline: {}ms (host ceiling {}ms)", self.engine.deadline_ms, self.engine.host_ceiling_ms);
        println!("  Ledger Capacity: {}", self.engine.ledger_capacity);
        println!("  Language: {}", self.strategies.language);
        println!(
            "  Extractor: {} {}",
            self.strategies.subprocess.program,
            self.strategies.subprocess.args.join(" ")
        );
        println!(
            "  Metadata API Key: {}",
            if self.metadata_api_key().is_some() { "configured" } else { "not set" }
        );
        for wave in &self.engine.waves {
            println!("  Wave {}: {}", wave.label, wave.strategies.join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.waves.len(), 3);
        assert!(config.engine.deadline_ms < config.engine.host_ceiling_ms);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
engine:
  deadline_ms: 4000
  waves:
    - label: only
      strategies: [watch-page]
strategies:
  subprocess:
    program: ./extract
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.engine.deadline_ms, 4000);
        assert_eq!(config.engine.host_ceiling_ms, 10_000);
        assert_eq!(config.engine.waves[0].strategies, vec!["watch-page"]);
        assert_eq!(config.strategies.subprocess.program, "./extract");
        assert_eq!(config.strategies.subprocess.timeout_ms, 8000);
        assert_eq!(config.strategies.language, "en");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deadline_must_stay_below_host_ceiling() {
        let mut config = Config::default();
        config.engine.deadline_ms = 10_000;
        assert!(matches!(config.validate(), Err(RetrievalError::Config(_))));

        config.engine.deadline_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deadline_override_follows_the_same_rule() {
        let engine = EngineConfig::default();
        assert!(engine.check_deadline(1).is_ok());
        assert!(engine.check_deadline(9_999).is_ok());

        let err = engine.check_deadline(0).unwrap_err();
        assert!(err.to_string().contains("must be positive"));
        assert!(engine.check_deadline(10_000).is_err());
    }

    #[test]
    fn test_empty_timeout_sections_use_defaults() {
        let yaml = "strategies:\n  timedtext: {}\n  watch_page: {}\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.strategies.timedtext.timeout(), Duration::from_millis(6000));
        assert_eq!(config.strategies.watch_page.timeout_ms, 6000);
    }

    #[test]
    fn test_unknown_or_empty_waves_rejected() {
        let mut config = Config::default();
        config.engine.waves[0].strategies.push("carrier-pigeon".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("carrier-pigeon"));

        let mut config = Config::default();
        config.engine.waves[1].strategies.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.waves.clear();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs_err::write(&path, "engine:\n  deadline_ms: 2500\n").unwrap();

        let config = Config::load(Some(&path)).await.unwrap();
        assert_eq!(config.deadline(), Duration::from_millis(2500));

        let missing = dir.path().join("nope.yaml");
        assert!(Config::load(Some(&missing)).await.is_err());
    }
}
