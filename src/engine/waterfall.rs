use parking_lot::Mutex;
use std::time::{Duration, Instant};

use super::ledger::ErrorLedger;
use super::outcome::{FailureEntry, FailureKind, RetrievalFailure, RetrievalOutcome, Retrieved};
use super::wave::{Wave, WaveWinner};
use super::DEADLINE_ENTRY;
use crate::strategies::VideoId;
use crate::RetrievalError;

/// Orchestrator lifecycle for one retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterfallState {
    Pending,
    WaveRunning(usize),
    Succeeded,
    Exhausted,
}

impl WaterfallState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Exhausted)
    }
}

/// Current state of a running waterfall, readable after it has been abandoned
#[derive(Debug)]
pub struct Progress {
    state: Mutex<WaterfallState>,
}

impl Progress {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(WaterfallState::Pending),
        }
    }

    pub fn state(&self) -> WaterfallState {
        *self.state.lock()
    }

    fn transition(&self, next: WaterfallState) {
        let mut state = self.state.lock();
        tracing::debug!("Waterfall {:?} -> {:?}", *state, next);
        *state = next;
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

/// How a waterfall run ended on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cascade {
    Won { wave: String, winner: WaveWinner },
    Exhausted,
}

/// Ordered waves, each tried only after the previous one failed entirely
#[derive(Debug, Clone)]
pub struct Waterfall {
    waves: Vec<Wave>,
}

impl Waterfall {
    pub fn new(waves: Vec<Wave>) -> Self {
        Self { waves }
    }

    /// Append a wave
    pub fn wave(mut self, wave: Wave) -> Self {
        self.waves.push(wave);
        self
    }

    pub fn waves(&self) -> &[Wave] {
        &self.waves
    }

    /// Run waves strictly in sequence until one produces text
    pub async fn run(
        &self,
        id: &VideoId,
        ledger: &ErrorLedger,
        clock: Instant,
        progress: &Progress,
    ) -> Cascade {
        for (index, wave) in self.waves.iter().enumerate() {
            progress.transition(WaterfallState::WaveRunning(index));
            tracing::info!(
                "[{}ms] Wave {} ({}) racing {} strategies",
                clock.elapsed().as_millis(),
                index,
                wave.label(),
                wave.len()
            );

            match wave.run(id, ledger, clock).await {
                Ok(winner) => {
                    progress.transition(WaterfallState::Succeeded);
                    return Cascade::Won {
                        wave: wave.label().to_string(),
                        winner,
                    };
                }
                Err(failures) => {
                    let exhausted = RetrievalError::WaveExhaustion {
                        wave: wave.label().to_string(),
                        attempts: failures.len(),
                    };
                    if index + 1 < self.waves.len() {
                        tracing::warn!("{}, escalating", exhausted);
                    } else {
                        tracing::warn!("{}, no waves left", exhausted);
                    }
                }
            }
        }

        progress.transition(WaterfallState::Exhausted);
        Cascade::Exhausted
    }
}

/// Wraps a waterfall in one absolute deadline
#[derive(Debug, Clone, Copy)]
pub struct DeadlineGovernor {
    deadline: Duration,
}

impl DeadlineGovernor {
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Run `waterfall` for `id`, giving up when the deadline fires.
    ///
    /// Work still in flight at the deadline is dropped with the waterfall future, which
    /// aborts its wave tasks.
    pub async fn govern(
        &self,
        waterfall: &Waterfall,
        id: &VideoId,
        ledger_capacity: usize,
    ) -> RetrievalOutcome {
        let clock = Instant::now();
        // room for the last failure of every wave plus the deadline entry
        let ledger = ErrorLedger::new(ledger_capacity.max(waterfall.waves().len() + 1));
        let progress = Progress::new();
        let deadline_ms = self.deadline.as_millis() as u64;

        let run = waterfall.run(id, &ledger, clock, &progress);
        let cascade = tokio::time::timeout(self.deadline, run).await;
        let elapsed_ms = clock.elapsed().as_millis() as u64;

        let kind = match cascade {
            Ok(Cascade::Won { wave, winner }) => {
                let (failed, _) = ledger.snapshot();
                if !failed.is_empty() {
                    tracing::debug!("{} failures before success were discarded", failed.len());
                }
                return RetrievalOutcome::Success(Retrieved {
                    text: winner.transcript.text,
                    tier: winner.transcript.tier,
                    strategy: winner.strategy,
                    wave,
                    elapsed_ms,
                });
            }
            Ok(Cascade::Exhausted) => FailureKind::Exhausted,
            Err(_) => {
                let wave = match progress.state() {
                    WaterfallState::WaveRunning(i) => waterfall
                        .waves()
                        .get(i)
                        .map(|w| w.label().to_string())
                        .unwrap_or_default(),
                    _ => String::new(),
                };
                tracing::warn!("[{}ms] Global {}ms timeout reached", elapsed_ms, deadline_ms);
                ledger.record(FailureEntry {
                    strategy: DEADLINE_ENTRY.to_string(),
                    wave,
                    reason: "global timeout".to_string(),
                    elapsed_ms,
                });
                FailureKind::GlobalTimeout
            }
        };

        let (errors, omitted) = ledger.snapshot();
        RetrievalOutcome::Failure(RetrievalFailure {
            kind,
            errors,
            omitted,
            deadline_ms,
            elapsed_ms,
        })
    }
}
