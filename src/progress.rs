//! Progress-callback trait for per-page capture events.
//!
//! Inject an [`Arc<dyn CaptureProgressCallback>`] via
//! [`crate::config::CaptureConfigBuilder::progress_callback`] to receive
//! real-time events as the session probes, captures, and finishes.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a terminal spinner, a GUI, or a log — without the
//! library knowing anything about how the host application communicates.
//!
//! Unlike a document converter, a capture session does not know its total
//! page count up front — the book's length is discovered by end detection.
//! Events therefore carry running counts, not totals; progress displays
//! should render an open-ended counter, not a percentage bar.

use crate::automation::Direction;
use std::sync::Arc;

/// Called by the session as it progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events fire from the session's single logical
/// flow, in order.
pub trait CaptureProgressCallback: Send + Sync {
    /// The direction probe is about to issue its first input.
    fn on_probe_start(&self) {}

    /// The page-turn direction was resolved (probed or forced).
    ///
    /// `probe_pages` is how many captures the probe contributed as the
    /// session's first pages (0 when the direction was forced).
    fn on_direction_resolved(&self, direction: Direction, probe_pages: usize) {
        let _ = (direction, probe_pages);
    }

    /// A page was captured and appended to the session.
    fn on_page_captured(&self, page_num: usize) {
        let _ = page_num;
    }

    /// End-of-book detected; the static trailing captures were dropped.
    fn on_end_detected(&self, kept_pages: usize, dropped_pages: usize) {
        let _ = (kept_pages, dropped_pages);
    }

    /// The session finished (either mode), with the final output page count.
    fn on_session_complete(&self, output_pages: usize) {
        let _ = output_pages;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl CaptureProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::CaptureConfig`].
pub type ProgressCallback = Arc<dyn CaptureProgressCallback>;
