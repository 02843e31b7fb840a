//! The capture loop: the session's main state machine.
//!
//! Strictly sequential — every iteration depends on the physical state
//! (the actually-displayed page) left behind by the previous one, so there
//! is nothing to parallelise. Each iteration:
//!
//! 1. captures the current page (retry-wrapped; exhaustion is fatal — the
//!    loop cannot proceed without page content, and silently skipping a
//!    page would corrupt the output ordering),
//! 2. appends it to the session and checks the tail window for the
//!    end-of-book signature,
//! 3. turns the page (retry-wrapped; exhaustion is fatal — after a failed
//!    turn the loop cannot know whether it advanced),
//! 4. sleeps the settle delay, observing cancellation.
//!
//! ## End detection
//!
//! When every adjacent pair in a full tail window exceeds the end
//! threshold, the reader has stopped producing new content — it is sitting
//! on its static end-of-book/rating screen. Those trailing captures are
//! that screen, not book pages; they are dropped from the output.
//!
//! Sessions that never reach a full window (books shorter than the window)
//! can only end at the page ceiling or by cancellation; a documented
//! limitation, not a bug.

use crate::automation::{AutomationDriver, Direction};
use crate::config::CaptureConfig;
use crate::error::SessionError;
use crate::pipeline;
use crate::screenshot::Capturer;
use crate::session::CaptureSession;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How the loop stopped, when it stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopOutcome {
    /// The tail window went static; its pages were dropped from the output.
    EndDetected { dropped: usize },
    /// The page ceiling was hit first. Partial results, plus a warning on
    /// the session.
    PageLimitReached,
}

/// Run the capture loop until end detection, the page ceiling, a fatal
/// error, or cancellation.
pub(crate) async fn run(
    driver: &Arc<dyn AutomationDriver>,
    capturer: &Arc<dyn Capturer>,
    config: &CaptureConfig,
    direction: Direction,
    session: &mut CaptureSession,
    cancel: &CancellationToken,
) -> Result<LoopOutcome, SessionError> {
    loop {
        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }

        let page_num = session.page_count() + 1;
        let path = session.next_page_path();
        let img = pipeline::capture_page(
            cancel,
            &config.retry,
            capturer,
            &path,
            &format!("capture page {page_num}"),
            false,
        )
        .await?;
        session.push_page(path, img);
        debug!(page_num, "page captured");

        if let Some(ref cb) = config.progress_callback {
            cb.on_page_captured(page_num);
        }

        if session.tail_is_static(config.end_threshold) {
            let dropped = session.drop_tail_pages();
            info!(
                kept = session.page_count(),
                dropped, "end of book detected: trailing captures are a static screen"
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_end_detected(session.page_count(), dropped);
            }
            return Ok(LoopOutcome::EndDetected { dropped });
        }

        if session.page_count() >= config.max_pages as usize {
            session.warn(format!(
                "Reached the page ceiling ({}) before detecting the end of the book; \
                 the output contains the pages captured so far.",
                config.max_pages
            ));
            return Ok(LoopOutcome::PageLimitReached);
        }

        pipeline::turn_page(
            cancel,
            &config.retry,
            driver,
            direction,
            &format!("turn page {page_num}"),
        )
        .await?;
        pipeline::settle(cancel, config.page_delay).await?;
    }
}
