use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

use super::ledger::ErrorLedger;
use super::outcome::FailureEntry;
use crate::strategies::{Strategy, StrategyResult, Transcript, VideoId};
use crate::RetrievalError;

/// Strategies raced against each other; the wave fails only when all of them fail
#[derive(Clone)]
pub struct Wave {
    label: String,
    strategies: Vec<Arc<dyn Strategy>>,
}

/// The first success observed in a wave
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveWinner {
    pub strategy: String,
    pub transcript: Transcript,
}

impl Wave {
    pub fn new(label: impl Into<String>, strategies: Vec<Arc<dyn Strategy>>) -> Self {
        Self {
            label: label.into(),
            strategies,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn strategies(&self) -> &[Arc<dyn Strategy>] {
        &self.strategies
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Race every strategy against `id`.
    ///
    /// Returns the first success and aborts the rest, or every failure in completion
    /// order. Each failure is also appended to `ledger` as soon as it lands.
    /// `clock` is the start of the whole retrieval, for elapsed times.
    pub async fn run(
        &self,
        id: &VideoId,
        ledger: &ErrorLedger,
        clock: Instant,
    ) -> Result<WaveWinner, Vec<FailureEntry>> {
        let mut tasks = JoinSet::new();

        for strategy in &self.strategies {
            let strategy = Arc::clone(strategy);
            let id = id.clone();
            tasks.spawn(async move {
                let name = strategy.name().to_string();
                tracing::debug!("[{}ms] Starting {}", clock.elapsed().as_millis(), name);

                let limit = strategy.timeout();
                let attempt = AssertUnwindSafe(strategy.attempt(&id)).catch_unwind();
                let result = match tokio::time::timeout(limit, attempt).await {
                    Ok(Ok(result)) => result.into_checked(),
                    Ok(Err(_)) => StrategyResult::failure("Strategy panicked"),
                    Err(_) => StrategyResult::failure(format!("Timed out after {}ms", limit.as_millis())),
                };
                (name, result)
            });
        }

        let mut failures = Vec::with_capacity(self.strategies.len());

        while let Some(joined) = tasks.join_next().await {
            let elapsed_ms = clock.elapsed().as_millis() as u64;
            let (strategy, reason) = match joined {
                Ok((strategy, StrategyResult::Success(transcript))) => {
                    tracing::info!(
                        "[{}ms] {} SUCCEEDED ({} chars, {})",
                        elapsed_ms,
                        strategy,
                        transcript.text.chars().count(),
                        transcript.tier
                    );
                    // losers are abandoned; subprocess strategies kill their child on drop
                    tasks.abort_all();
                    return Ok(WaveWinner {
                        strategy,
                        transcript,
                    });
                }
                Ok((strategy, StrategyResult::Failure { reason })) => (strategy, reason),
                Err(e) => ("<unknown>".to_string(), format!("Strategy task failed: {}", e)),
            };

            let entry = FailureEntry {
                strategy,
                wave: self.label.clone(),
                reason,
                elapsed_ms,
            };
            tracing::warn!("[{}ms] {}", elapsed_ms, RetrievalError::from(&entry));
            ledger.record(entry.clone());
            failures.push(entry);
        }

        Err(failures)
    }
}

impl std::fmt::Debug for Wave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wave")
            .field("label", &self.label)
            .field(
                "strategies",
                &self.strategies.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
