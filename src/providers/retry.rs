//! Retry coordinator: model fallback plus differentiated backoff.
//!
//! [`invoke_with_fallback()`] wraps any remote inference call. Each outer
//! round walks the candidate model list in order; what happens after a
//! failure depends on [`HuginnError::retry_disposition()`]:
//!
//! ```text
//!            ┌───────────────────────────────┐
//!            │ TryingModel { round, index }  │◄──────────────┐
//!            └──────┬──────────┬─────────┬───┘               │
//!        Ok         │ advance  │ backoff │ terminal          │
//!         ▼         ▼          ▼         ▼                   │
//!     Succeeded  index + 1  BackingOff  Err(e)               │
//!                (same      { delay } ──sleep──► round + 1, index 0
//!                 round)
//!   list exhausted ──► next round (no delay) or Exhausted { last }
//! ```
//!
//! Backoff on the final round would only delay the inevitable, so there a
//! rate-limit or server error simply advances to the next model.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::RetryDisposition;
use crate::telemetry;
use crate::{HuginnError, Result};

/// Configuration for the retry coordinator.
///
/// ```rust
/// # use huginn::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_rounds(5)
///     .initial_delay(Duration::from_millis(200));
/// assert_eq!(config.delay_for_backoff(2), Duration::from_millis(800));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Number of passes over the candidate model list. Default: 3.
    pub max_rounds: u32,
    /// Delay before the first backoff retry. Default: 2s.
    pub initial_delay: Duration,
    /// Cap on exponential growth. Default: 60s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single pass over the model list, no backoff.
    pub fn disabled() -> Self {
        Self {
            max_rounds: 1,
            ..Self::default()
        }
    }

    pub fn max_rounds(mut self, n: u32) -> Self {
        self.max_rounds = n;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before the `n`th backoff (0-indexed): `initial_delay * 2^n`,
    /// capped at `max_delay`.
    pub fn delay_for_backoff(&self, n: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(n))
            .min(self.max_delay)
    }

    /// Backoff delay, stretched to honour a server `retry-after` hint but
    /// never past `max_delay`.
    pub fn effective_delay(&self, n: u32, retry_after: Option<Duration>) -> Duration {
        let computed = self.delay_for_backoff(n);
        retry_after
            .map_or(computed, |hint| hint.max(computed))
            .min(self.max_delay)
    }
}

enum RetryState<T> {
    TryingModel { round: u32, index: usize },
    BackingOff { round: u32, delay: Duration },
    Exhausted,
    Succeeded(T),
}

/// Run `call` against each candidate model with fallback and backoff.
///
/// `call` receives the model identifier and must be replayable: it is
/// invoked once per attempt with the same captured request.
///
/// Fails with [`HuginnError::Exhausted`] (carrying the last failure) when
/// every round is spent, or immediately on a terminal failure.
pub async fn invoke_with_fallback<'a, F, Fut, T>(
    config: &RetryConfig,
    models: &'a [String],
    operation: &str,
    call: F,
) -> Result<T>
where
    F: Fn(&'a str) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if models.is_empty() {
        return Err(HuginnError::Configuration(format!(
            "no candidate models configured for {operation}"
        )));
    }

    let max_rounds = config.max_rounds.max(1);
    let mut backoffs = 0u32;
    let mut last_delay = Duration::ZERO;
    let mut last_err = None;
    let mut state = RetryState::TryingModel { round: 0, index: 0 };

    loop {
        state = match state {
            RetryState::TryingModel { round, index } if index >= models.len() => {
                if round + 1 < max_rounds {
                    debug!(operation, round, "model list exhausted, starting next round");
                    RetryState::TryingModel {
                        round: round + 1,
                        index: 0,
                    }
                } else {
                    RetryState::Exhausted
                }
            }
            RetryState::TryingModel { round, index } => {
                let model = models[index].as_str();
                match call(model).await {
                    Ok(value) => RetryState::Succeeded(value),
                    Err(e) => {
                        let next = match e.retry_disposition() {
                            RetryDisposition::FailTerminal => return Err(e),
                            RetryDisposition::BackoffAndRestart if round + 1 < max_rounds => {
                                // Never shorter than the previous backoff.
                                let delay = config
                                    .effective_delay(backoffs, e.retry_after())
                                    .max(last_delay);
                                last_delay = delay;
                                backoffs += 1;
                                metrics::counter!(telemetry::RETRIES_TOTAL,
                                    "operation" => operation.to_owned(),
                                    "model" => model.to_owned(),
                                )
                                .increment(1);
                                warn!(
                                    operation,
                                    model,
                                    round = round + 1,
                                    max_rounds,
                                    delay_ms = delay.as_millis() as u64,
                                    error = %e,
                                    "backing off after transient error"
                                );
                                RetryState::BackingOff { round, delay }
                            }
                            _ => {
                                metrics::counter!(telemetry::MODEL_FALLBACKS_TOTAL,
                                    "operation" => operation.to_owned(),
                                    "model" => model.to_owned(),
                                )
                                .increment(1);
                                if e.is_model_unavailable() {
                                    warn!(operation, model, "model unavailable, falling back");
                                } else {
                                    warn!(operation, model, error = %e, "model failed, trying fallback");
                                }
                                RetryState::TryingModel {
                                    round,
                                    index: index + 1,
                                }
                            }
                        };
                        last_err = Some(e);
                        next
                    }
                }
            }
            RetryState::BackingOff { round, delay } => {
                tokio::time::sleep(delay).await;
                RetryState::TryingModel {
                    round: round + 1,
                    index: 0,
                }
            }
            RetryState::Exhausted => {
                let last = last_err.unwrap_or(HuginnError::ModelNotAvailable);
                return Err(HuginnError::Exhausted {
                    rounds: max_rounds,
                    last: Box::new(last),
                });
            }
            RetryState::Succeeded(value) => return Ok(value),
        };
    }
}
