//! Pipeline stages for the capture session.
//!
//! Each submodule implements exactly one concern. Keeping stages separate
//! makes each independently testable and lets us swap implementations
//! (e.g. a different capture backend) without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! probe ──▶ capture ──▶ margins ──▶ assemble
//! (direction) (loop+end  (measure/   (PDF)
//!             detection)  aggregate)
//!      └────── metrics ──────┘
//!          (similarity, bounds)
//! ```
//!
//! 1. [`metrics`]  — pixel similarity and border bounds; the only source of
//!    truth the pipeline has about the outside world
//! 2. [`probe`]    — resolve which input direction turns pages, once
//! 3. [`capture`]  — the sequential capture loop with end detection
//! 4. [`margins`]  — per-page trim measurement and safe aggregation
//! 5. [`assemble`] — captured pages → one PDF; runs in `spawn_blocking`
//!    because image re-encoding is CPU-bound
//!
//! The helpers below wrap the two collaborator calls every stage shares.
//! Collaborator traits are synchronous (implementations shell out or call
//! the window server); each call runs under `spawn_blocking` so the async
//! runtime never stalls, and under the retry policy so transient failures
//! get their backoff.

pub mod assemble;
pub mod capture;
pub mod margins;
pub mod metrics;
pub mod probe;

use crate::automation::{AutomationDriver, Direction};
use crate::error::{SessionError, StepError};
use crate::retry::{self, RetryConfig};
use crate::screenshot::Capturer;
use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Capture the screen to `path` and decode it, retry-wrapped.
///
/// `activating` selects the slow path that brings the target to the
/// foreground first (session start only). An undecodable capture file
/// counts as a failed attempt: whatever produced it may not do so twice.
pub(crate) async fn capture_page(
    cancel: &CancellationToken,
    retry: &RetryConfig,
    capturer: &Arc<dyn Capturer>,
    path: &Path,
    operation: &str,
    activating: bool,
) -> Result<DynamicImage, SessionError> {
    retry::run(cancel, retry, operation, || {
        let capturer = Arc::clone(capturer);
        let path = path.to_path_buf();
        async move {
            tokio::task::spawn_blocking(move || -> Result<DynamicImage, StepError> {
                if activating {
                    capturer.capture_activating(&path)?;
                } else {
                    capturer.capture(&path)?;
                }
                image::open(&path).map_err(|e| StepError::Capture {
                    detail: format!("captured file is not decodable: {e}"),
                })
            })
            .await
            .map_err(|e| StepError::Capture {
                detail: format!("capture task panicked: {e}"),
            })?
        }
    })
    .await
}

/// Send one page-turn input, retry-wrapped.
pub(crate) async fn turn_page(
    cancel: &CancellationToken,
    retry: &RetryConfig,
    driver: &Arc<dyn AutomationDriver>,
    direction: Direction,
    operation: &str,
) -> Result<(), SessionError> {
    retry::run(cancel, retry, operation, || {
        let driver = Arc::clone(driver);
        async move {
            tokio::task::spawn_blocking(move || driver.advance_page(direction))
                .await
                .map_err(|e| StepError::Script {
                    detail: format!("input task panicked: {e}"),
                })?
        }
    })
    .await
}

/// Cancellable settle delay between a page turn and the next capture.
pub(crate) async fn settle(
    cancel: &CancellationToken,
    delay: Duration,
) -> Result<(), SessionError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(SessionError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
