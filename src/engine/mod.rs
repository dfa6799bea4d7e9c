use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::strategies::{StrategyRegistry, VideoId};
use crate::{Result, RetrievalError};

pub mod ledger;
pub mod outcome;
pub mod wave;
pub mod waterfall;

pub use ledger::ErrorLedger;
pub use outcome::{FailureEntry, FailureKind, RetrievalFailure, RetrievalOutcome, Retrieved};
pub use wave::{Wave, WaveWinner};
pub use waterfall::{Cascade, DeadlineGovernor, Progress, Waterfall, WaterfallState};

/// Strategy name used for the trail entry recorded when the global deadline fires
pub const DEADLINE_ENTRY: &str = "global-deadline";

const DEFAULT_LEDGER_CAPACITY: usize = 32;

/// Entry point: one immutable waterfall plus its deadline
pub struct RetrievalEngine {
    waterfall: Waterfall,
    governor: DeadlineGovernor,
    ledger_capacity: usize,
}

impl RetrievalEngine {
    /// Create an engine from prebuilt waves
    pub fn new(waterfall: Waterfall, deadline: Duration) -> Self {
        Self {
            waterfall,
            governor: DeadlineGovernor::new(deadline),
            ledger_capacity: DEFAULT_LEDGER_CAPACITY,
        }
    }

    pub fn with_ledger_capacity(mut self, capacity: usize) -> Self {
        self.ledger_capacity = capacity;
        self
    }

    /// Build the engine the configuration describes, with real strategies
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let registry = StrategyRegistry::from_config(config)?;
        Self::from_registry(config, &registry)
    }

    /// Assemble configured waves from an existing registry.
    ///
    /// Strategies the registry lacks (such as metadata without an API key) are skipped,
    /// and waves left empty are dropped.
    pub fn from_registry(config: &Config, registry: &StrategyRegistry) -> Result<Self> {
        let mut waterfall = Waterfall::new(Vec::new());

        for wave_config in &config.engine.waves {
            let mut members = Vec::with_capacity(wave_config.strategies.len());
            for name in &wave_config.strategies {
                match registry.find(name) {
                    Some(strategy) => members.push(strategy),
                    None => tracing::debug!(
                        "Strategy {} is not available, leaving it out of wave {}",
                        name,
                        wave_config.label
                    ),
                }
            }

            if members.is_empty() {
                tracing::warn!("Wave {} has no available strategies, skipping it", wave_config.label);
                continue;
            }
            waterfall = waterfall.wave(Wave::new(wave_config.label.clone(), members));
        }

        if waterfall.waves().is_empty() {
            return Err(RetrievalError::Config("no configured strategy is available".to_string()).into());
        }

        Ok(Self::new(waterfall, config.deadline()).with_ledger_capacity(config.engine.ledger_capacity))
    }

    /// Replace the global deadline
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.governor = DeadlineGovernor::new(deadline);
        self
    }

    pub fn waves(&self) -> &[Wave] {
        self.waterfall.waves()
    }

    pub fn deadline(&self) -> Duration {
        self.governor.deadline()
    }

    /// Produce the best available text for `id` within the deadline
    pub async fn retrieve(&self, id: &VideoId) -> RetrievalOutcome {
        let span = tracing::info_span!("retrieve", request_id = %Uuid::new_v4(), video_id = %id);

        async {
            tracing::info!(
                "Fetching transcript across {} waves, deadline {}ms",
                self.waves().len(),
                self.deadline().as_millis()
            );

            let outcome = self
                .governor
                .govern(&self.waterfall, id, self.ledger_capacity)
                .await;

            match &outcome {
                RetrievalOutcome::Success(retrieved) => tracing::info!(
                    "[{}ms] Transcript fetched by {} ({}), length: {}",
                    retrieved.elapsed_ms,
                    retrieved.strategy,
                    retrieved.tier,
                    retrieved.text.len()
                ),
                RetrievalOutcome::Failure(failure) => tracing::error!(
                    "[{}ms] {}",
                    failure.elapsed_ms,
                    failure.summary()
                ),
            }
            outcome
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WaveConfig;
    use crate::strategies::{QualityTier, Strategy, Transcript};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Named(&'static str);

    #[async_trait]
    impl Strategy for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn timeout(&self) -> Duration {
            Duration::from_millis(100)
        }

        async fn fetch(&self, _id: &VideoId) -> Result<Transcript> {
            Ok(Transcript::new(format!("from {}", self.0), QualityTier::Exact))
        }
    }

    fn registry(names: &[&'static str]) -> StrategyRegistry {
        let mut registry = StrategyRegistry::new();
        for name in names {
            registry.register(Arc::new(Named(*name)));
        }
        registry
    }

    #[test]
    fn test_from_registry_skips_unavailable_strategies() {
        let config = Config::default();
        let engine = RetrievalEngine::from_registry(
            &config,
            &registry(&["timedtext", "watch-page", "innertube"]),
        )
        .unwrap();

        let labels: Vec<_> = engine.waves().iter().map(|w| w.label()).collect();
        assert_eq!(labels, vec!["fast", "client-emulation"]);
        assert_eq!(engine.waves()[0].len(), 2);
        assert_eq!(engine.deadline(), Duration::from_millis(9000));
    }

    #[test]
    fn test_from_registry_without_any_strategy_fails() {
        let mut config = Config::default();
        config.engine.waves = vec![WaveConfig {
            label: "only".to_string(),
            strategies: vec!["metadata".to_string()],
        }];
        assert!(RetrievalEngine::from_registry(&config, &registry(&[])).is_err());
    }

    #[tokio::test]
    async fn test_retrieve_uses_first_wave() {
        let engine = RetrievalEngine::from_registry(&Config::default(), &registry(&["innertube"]))
            .unwrap()
            .with_deadline(Duration::from_millis(500));

        let outcome = engine.retrieve(&VideoId::parse("dQw4w9WgXcQ").unwrap()).await;
        assert_eq!(outcome.strategy(), Some("innertube"));
        assert_eq!(engine.deadline(), Duration::from_millis(500));
    }
}
