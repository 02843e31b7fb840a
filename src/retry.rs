//! Bounded retry with exponential backoff for collaborator calls.
//!
//! Screen capture and the scripting bridge fail transiently all the time —
//! a busy window server, a slow Space switch, an osascript timeout. Retrying
//! a handful of times with growing delays absorbs those without hiding real
//! breakage: the attempt budget is hard, and non-transient step errors
//! (lost foreground, vanished target) abort immediately regardless of how
//! many attempts remain.
//!
//! Classification is typed — [`StepError::is_transient`] — never matched on
//! error text.
//!
//! Every wait is cancellable: the token is checked before each attempt and
//! observed during each backoff sleep, so Ctrl-C never waits out a delay.

use crate::error::{SessionError, StepError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Retry budget and backoff shape.
///
/// Defaults: 3 attempts, 100 ms initial delay doubling to a 2 s cap. Three
/// attempts catch the overwhelming majority of window-server hiccups while
/// keeping the worst-case stall per operation under four seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of calls to the operation. Never exceeded.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Ceiling for the growing delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

/// Run `attempt` until it succeeds, the budget runs out, a non-transient
/// error surfaces, or the token fires.
///
/// `operation` names the call for error context ("capture page 12").
///
/// # Errors
/// * [`SessionError::Cancelled`] — the token fired before an attempt or
///   during a backoff sleep.
/// * [`SessionError::ForegroundLost`] — the step reported lost focus;
///   retrying would send input at the wrong application.
/// * [`SessionError::RetriesExhausted`] — `max_attempts` calls all failed;
///   carries the attempt count and the last step error.
pub async fn run<T, F, Fut>(
    cancel: &CancellationToken,
    config: &RetryConfig,
    operation: &str,
    mut attempt: F,
) -> Result<T, SessionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StepError>>,
{
    let mut delay = config.initial_delay;
    let mut last_err: Option<StepError> = None;

    for n in 1..=config.max_attempts {
        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }

        match attempt().await {
            Ok(value) => return Ok(value),
            Err(StepError::ForegroundLost) => {
                return Err(SessionError::ForegroundLost {
                    operation: operation.to_string(),
                });
            }
            Err(e) if !e.is_transient() => {
                return Err(SessionError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: n,
                    source: e,
                });
            }
            Err(e) => {
                warn!(operation, attempt = n, error = %e, "step failed");
                last_err = Some(e);
            }
        }

        if n < config.max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => return Err(SessionError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            delay = Duration::from_secs_f64(
                (delay.as_secs_f64() * config.multiplier).min(config.max_delay.as_secs_f64()),
            );
        }
    }

    Err(SessionError::RetriesExhausted {
        operation: operation.to_string(),
        attempts: config.max_attempts,
        source: last_err
            .unwrap_or_else(|| StepError::Script {
                detail: "no attempt recorded".to_string(),
            }),
    })
}
