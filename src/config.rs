//! Configuration types for a capture session.
//!
//! All session behaviour is controlled through [`CaptureConfig`], built via
//! its [`CaptureConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to log a session's exact parameters and diff two runs to
//! understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::automation::{Direction, ReaderApp};
use crate::error::SessionError;
use crate::pipeline::margins::TrimMargins;
use crate::progress::ProgressCallback;
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one capture session.
///
/// Built via [`CaptureConfig::builder()`] or [`CaptureConfig::default()`].
///
/// # Example
/// ```rust
/// use pagesnap::{CaptureConfig, PdfQuality};
///
/// let config = CaptureConfig::builder()
///     .quality(PdfQuality::Medium)
///     .page_delay_ms(750)
///     .end_window(5)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct CaptureConfig {
    /// What the session produces. Default: [`SessionMode::Generate`].
    pub mode: SessionMode,

    /// PDF quality tier (generate mode). Default: [`PdfQuality::High`].
    pub quality: PdfQuality,

    /// Force a page-turn direction instead of probing for it. Default: None.
    ///
    /// Probing costs a few page turns at session start; a caller who knows
    /// the book's direction (e.g. re-capturing the same title) can skip it.
    pub direction: Option<Direction>,

    /// Settle time between a page-turn input and the next capture. Default: 500 ms.
    ///
    /// Readers animate page turns; capturing mid-animation produces a frame
    /// that matches neither page and defeats both end detection and the
    /// direction probe. 500 ms covers the stock animation with margin.
    /// Raise it for slow machines, lower it for readers with animations
    /// disabled.
    pub page_delay: Duration,

    /// Hard ceiling on captured pages. Default: 1000.
    ///
    /// The only defence against a target that never repeats its final
    /// screen (so end detection never fires). Hitting the ceiling surfaces
    /// a warning and keeps the partial results — never an endless loop,
    /// never silent truncation.
    pub max_pages: u32,

    /// Trailing captures compared for end-of-book detection. Default: 5.
    ///
    /// Sessions shorter than this never trigger end detection and run until
    /// the page ceiling or cancellation; a known limitation for very short
    /// books, kept rather than special-cased.
    pub end_window: usize,

    /// Pairwise similarity all tail-window neighbours must exceed to
    /// declare end-of-book. Default: 0.995.
    ///
    /// Stricter than the probe threshold: a static end-of-book/rating
    /// screen reproduces near-pixel-identically, while legitimate content
    /// pages repeat far less exactly. Deployments that see false positives
    /// (animated end screens) can lower it; this is configuration, not a
    /// constant, on purpose.
    pub end_threshold: f64,

    /// Similarity below which two probe captures count as "the page
    /// changed". Default: 0.90.
    pub direction_threshold: f64,

    /// Page-turn inputs issued per direction while probing. Default: 3.
    ///
    /// One press can be a no-op (dropped event, animation timing); three
    /// tolerate a single false negative without dragging the probe out.
    pub probe_presses: u32,

    /// Retry budget applied to every capture and input call.
    pub retry: RetryConfig,

    /// Margins to cut from every page before assembly (generate mode).
    /// Default: None — pages go into the PDF as captured.
    pub custom_trim: Option<TrimMargins>,

    /// The reader application under automation.
    pub app: ReaderApp,

    /// Output PDF path (generate mode). Default: None —
    /// `capture_<timestamp>.pdf` in the working directory.
    pub output: Option<PathBuf>,

    /// Per-page progress events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::Generate,
            quality: PdfQuality::High,
            direction: None,
            page_delay: Duration::from_millis(500),
            max_pages: 1000,
            end_window: 5,
            end_threshold: 0.995,
            direction_threshold: 0.90,
            probe_presses: 3,
            retry: RetryConfig::default(),
            custom_trim: None,
            app: ReaderApp::default(),
            output: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for CaptureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureConfig")
            .field("mode", &self.mode)
            .field("quality", &self.quality)
            .field("direction", &self.direction)
            .field("page_delay", &self.page_delay)
            .field("max_pages", &self.max_pages)
            .field("end_window", &self.end_window)
            .field("end_threshold", &self.end_threshold)
            .field("direction_threshold", &self.direction_threshold)
            .field("probe_presses", &self.probe_presses)
            .field("retry", &self.retry)
            .field("custom_trim", &self.custom_trim)
            .field("app", &self.app)
            .field("output", &self.output)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn CaptureProgressCallback>"),
            )
            .finish()
    }
}

impl CaptureConfig {
    /// Create a new builder for `CaptureConfig`.
    pub fn builder() -> CaptureConfigBuilder {
        CaptureConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`CaptureConfig`].
#[derive(Debug)]
pub struct CaptureConfigBuilder {
    config: CaptureConfig,
}

impl CaptureConfigBuilder {
    pub fn mode(mut self, mode: SessionMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn quality(mut self, quality: PdfQuality) -> Self {
        self.config.quality = quality;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.config.direction = Some(direction);
        self
    }

    pub fn page_delay_ms(mut self, ms: u64) -> Self {
        self.config.page_delay = Duration::from_millis(ms);
        self
    }

    pub fn max_pages(mut self, n: u32) -> Self {
        self.config.max_pages = n.max(1);
        self
    }

    pub fn end_window(mut self, n: usize) -> Self {
        self.config.end_window = n.max(2);
        self
    }

    pub fn end_threshold(mut self, t: f64) -> Self {
        self.config.end_threshold = t.clamp(0.0, 1.0);
        self
    }

    pub fn direction_threshold(mut self, t: f64) -> Self {
        self.config.direction_threshold = t.clamp(0.0, 1.0);
        self
    }

    pub fn probe_presses(mut self, n: u32) -> Self {
        self.config.probe_presses = n.max(1);
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn custom_trim(mut self, margins: TrimMargins) -> Self {
        self.config.custom_trim = Some(margins);
        self
    }

    pub fn app(mut self, app: ReaderApp) -> Self {
        self.config.app = app;
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CaptureConfig, SessionError> {
        let c = &self.config;
        if c.end_window < 2 {
            return Err(SessionError::InvalidConfig(format!(
                "End-detection window must be ≥ 2, got {}",
                c.end_window
            )));
        }
        if !(0.0..=1.0).contains(&c.end_threshold) {
            return Err(SessionError::InvalidConfig(format!(
                "End threshold must be in [0, 1], got {}",
                c.end_threshold
            )));
        }
        if !(0.0..=1.0).contains(&c.direction_threshold) {
            return Err(SessionError::InvalidConfig(format!(
                "Direction threshold must be in [0, 1], got {}",
                c.direction_threshold
            )));
        }
        if c.max_pages == 0 {
            return Err(SessionError::InvalidConfig("Page ceiling must be ≥ 1".into()));
        }
        if c.retry.max_attempts == 0 {
            return Err(SessionError::InvalidConfig("Retry attempts must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// What a session produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionMode {
    /// Capture pages and assemble the output PDF. (default)
    #[default]
    Generate,
    /// Capture pages, measure per-page trim margins, report the safe
    /// aggregate — no PDF is written. Run this once, then re-run in
    /// generate mode with the reported margins as the custom trim.
    DetectMargins,
}

/// PDF output quality tier.
///
/// Tiers trade file size against page fidelity. Each captured page becomes
/// a JPEG inside the PDF; the tier sets the JPEG encode quality, and the
/// lossy tiers additionally flate-compress ancillary streams.
///
/// | Tier | JPEG quality | Use case |
/// |------|--------------|----------|
/// | Low | 50 | Proofs, quick sharing, text-only books |
/// | Medium | 75 | Most books |
/// | High | 90 | Illustrated content, archival copies (default) |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PdfQuality {
    Low,
    Medium,
    #[default]
    High,
}

impl PdfQuality {
    /// JPEG encode quality for page bitmaps.
    pub fn jpeg_quality(self) -> u8 {
        match self {
            PdfQuality::Low => 50,
            PdfQuality::Medium => 75,
            PdfQuality::High => 90,
        }
    }

    /// Whether ancillary (non-image) streams are flate-compressed.
    pub fn compress_streams(self) -> bool {
        !matches!(self, PdfQuality::High)
    }
}
