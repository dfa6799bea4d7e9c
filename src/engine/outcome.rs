use serde::{Deserialize, Serialize};

use crate::strategies::QualityTier;
use crate::RetrievalError;

/// One failed strategy attempt, or the global timeout itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub strategy: String,
    pub wave: String,
    pub reason: String,
    /// Milliseconds since the retrieval started
    pub elapsed_ms: u64,
}

impl std::fmt::Display for FailureEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}ms] {}/{} FAILED: {}",
            self.elapsed_ms, self.wave, self.strategy, self.reason
        )
    }
}

impl From<&FailureEntry> for RetrievalError {
    fn from(entry: &FailureEntry) -> Self {
        RetrievalError::StrategyFailure {
            strategy: entry.strategy.clone(),
            reason: entry.reason.clone(),
        }
    }
}

/// Why a retrieval produced no text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Every wave ran and every strategy failed
    Exhausted,
    /// The global deadline fired first
    GlobalTimeout,
}

/// Text that won the waterfall
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retrieved {
    pub text: String,
    pub tier: QualityTier,
    pub strategy: String,
    pub wave: String,
    pub elapsed_ms: u64,
}

/// Diagnostic trail of a failed retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalFailure {
    pub kind: FailureKind,
    /// Failures in wave order, then completion order within a wave
    pub errors: Vec<FailureEntry>,
    /// Entries dropped because the ledger was full
    pub omitted: usize,
    pub deadline_ms: u64,
    pub elapsed_ms: u64,
}

impl RetrievalFailure {
    /// Number of attempts the trail accounts for, including omitted ones
    pub fn attempts(&self) -> usize {
        let recorded = self
            .errors
            .iter()
            .filter(|e| e.strategy != super::DEADLINE_ENTRY)
            .count();
        recorded + self.omitted
    }

    /// Short human-readable summary
    pub fn summary(&self) -> String {
        match self.kind {
            FailureKind::Exhausted => format!(
                "Transcript fetch failed: all strategies failed ({} attempts)",
                self.attempts()
            ),
            FailureKind::GlobalTimeout => format!(
                "Transcript fetch failed: no strategy succeeded within {}ms ({} attempts failed)",
                self.deadline_ms,
                self.attempts()
            ),
        }
    }

    /// Full trail, one entry per line
    pub fn render_trail(&self) -> String {
        let mut lines: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        if self.omitted > 0 {
            lines.insert(0, format!("... {} earlier failures omitted", self.omitted));
        }
        lines.join("\n")
    }
}

/// Externally visible result of one retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RetrievalOutcome {
    Success(Retrieved),
    Failure(RetrievalFailure),
}

impl RetrievalOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Winning strategy name, if any
    pub fn strategy(&self) -> Option<&str> {
        match self {
            Self::Success(retrieved) => Some(&retrieved.strategy),
            Self::Failure(_) => None,
        }
    }

    /// Convert into a result, surfacing failures as [`RetrievalError`]
    pub fn into_result(self) -> std::result::Result<Retrieved, RetrievalError> {
        match self {
            Self::Success(retrieved) => Ok(retrieved),
            Self::Failure(failure) => {
                let trail = serde_json::to_string(
                    &failure.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                )
                .unwrap_or_default();
                Err(match failure.kind {
                    FailureKind::Exhausted => RetrievalError::WaterfallExhaustion {
                        attempts: failure.attempts(),
                        trail,
                    },
                    FailureKind::GlobalTimeout => RetrievalError::GlobalTimeout {
                        deadline_ms: failure.deadline_ms,
                        trail,
                    },
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(strategy: &str, wave: &str, elapsed_ms: u64) -> FailureEntry {
        FailureEntry {
            strategy: strategy.to_string(),
            wave: wave.to_string(),
            reason: "nope".to_string(),
            elapsed_ms,
        }
    }

    #[test]
    fn test_failure_summary_and_trail() {
        let failure = RetrievalFailure {
            kind: FailureKind::GlobalTimeout,
            errors: vec![
                entry("watch-page", "fast", 120),
                entry(crate::engine::DEADLINE_ENTRY, "client-emulation", 9000),
            ],
            omitted: 2,
            deadline_ms: 9000,
            elapsed_ms: 9001,
        };

        assert_eq!(failure.attempts(), 3);
        assert!(failure.summary().contains("9000ms"));

        let trail = failure.render_trail();
        assert!(trail.starts_with("... 2 earlier failures omitted"));
        assert!(trail.contains("[120ms] fast/watch-page FAILED: nope"));
    }

    #[test]
    fn test_into_result_maps_kinds() {
        let exhausted = RetrievalOutcome::Failure(RetrievalFailure {
            kind: FailureKind::Exhausted,
            errors: vec![entry("timedtext", "fast", 10)],
            omitted: 0,
            deadline_ms: 9000,
            elapsed_ms: 11,
        });
        match exhausted.into_result() {
            Err(RetrievalError::WaterfallExhaustion { attempts, trail }) => {
                assert_eq!(attempts, 1);
                assert!(trail.contains("fast/timedtext"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let success = RetrievalOutcome::Success(Retrieved {
            text: "hello".to_string(),
            tier: QualityTier::Exact,
            strategy: "timedtext".to_string(),
            wave: "fast".to_string(),
            elapsed_ms: 5,
        });
        assert_eq!(success.strategy(), Some("timedtext"));
        assert_eq!(success.into_result().unwrap().text, "hello");
    }
}
