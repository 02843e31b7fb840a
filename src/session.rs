//! The capture-session aggregate: page sequence, tail window, temp files.
//!
//! A [`CaptureSession`] exclusively owns everything a session accumulates:
//! the session-scoped temporary directory (removed on every exit path —
//! success, abort, and cancellation alike, courtesy of [`TempDir`]'s drop),
//! the ordered page sequence, per-page margins, warnings, and the
//! end-detection tail window.
//!
//! ## Bounded memory
//!
//! Only the tail window holds decoded rasters. A decoded 5K capture is
//! ~60 MB; a thousand-page session keeping every decode in memory would
//! need tens of gigabytes. Pages outside the window live on disk as PNG,
//! represented here by path and dimensions only; anything that needs their
//! pixels (margin measurement) runs at capture time while the decode is
//! in hand.

use crate::error::SessionError;
use crate::pipeline::margins::{self, TrimMargins};
use crate::pipeline::metrics;
use image::{DynamicImage, GenericImageView};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// One captured page: where it lives and how big it is.
///
/// Immutable once created; the raster itself is only retained inside the
/// session's tail window.
#[derive(Debug, Clone)]
pub(crate) struct PageImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Bounded-lifetime aggregate for one conversion.
pub(crate) struct CaptureSession {
    dir: TempDir,
    pages: Vec<PageImage>,
    /// Last `window` decoded captures, oldest first.
    tail: VecDeque<DynamicImage>,
    /// Per-page margins, aligned 1:1 with `pages` when analysis is on.
    margins: Vec<TrimMargins>,
    warnings: Vec<String>,
    window: usize,
    analyze: bool,
}

impl CaptureSession {
    pub fn new(window: usize, analyze: bool) -> Result<Self, SessionError> {
        let dir = TempDir::with_prefix("pagesnap-")
            .map_err(|source| SessionError::TempDir { source })?;
        debug!(dir = %dir.path().display(), "created session directory");
        Ok(Self {
            dir,
            pages: Vec::new(),
            tail: VecDeque::new(),
            margins: Vec::new(),
            warnings: Vec::new(),
            window,
            analyze,
        })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Path the next capture should be written to.
    pub fn next_page_path(&self) -> PathBuf {
        self.dir
            .path()
            .join(format!("page_{:04}.png", self.pages.len() + 1))
    }

    /// Append a capture to the page sequence and the tail window, measuring
    /// its margins when analysis is requested.
    pub fn push_page(&mut self, path: PathBuf, image: DynamicImage) {
        let (width, height) = image.dimensions();
        if self.analyze {
            self.margins.push(margins::page_margins(&image));
        }
        self.pages.push(PageImage {
            path,
            width,
            height,
        });
        self.tail.push_back(image);
        while self.tail.len() > self.window {
            self.tail.pop_front();
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[PageImage] {
        &self.pages
    }

    pub fn page_paths(&self) -> Vec<PathBuf> {
        self.pages.iter().map(|p| p.path.clone()).collect()
    }

    pub fn per_page_margins(&self) -> &[TrimMargins] {
        &self.margins
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Whether the tail window is full and every adjacent pair exceeds
    /// `threshold` — the end-of-book signature.
    ///
    /// An incomparable pair (dimension change mid-window) reads as "not
    /// identical": whatever happened to the display, it was a change.
    pub fn tail_is_static(&self, threshold: f64) -> bool {
        if self.tail.len() < self.window {
            return false;
        }
        self.tail
            .iter()
            .zip(self.tail.iter().skip(1))
            .all(|(a, b)| match metrics::similarity(a, b) {
                Ok(s) => s > threshold,
                Err(_) => false,
            })
    }

    /// Drop the trailing `window` pages — the static end-of-book screens —
    /// from the output sequence, with their margins. The files stay in the
    /// temp directory and vanish with it.
    ///
    /// Returns how many pages were dropped.
    pub fn drop_tail_pages(&mut self) -> usize {
        let dropped = self.window.min(self.pages.len());
        self.pages.truncate(self.pages.len() - dropped);
        if self.analyze {
            let kept = self.margins.len().saturating_sub(dropped);
            self.margins.truncate(kept);
        }
        self.tail.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn frame(shade: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([shade, shade, shade])))
    }

    fn session(window: usize) -> CaptureSession {
        CaptureSession::new(window, false).unwrap()
    }

    #[test]
    fn pages_keep_insertion_order() {
        let mut s = session(3);
        for shade in [0u8, 100, 200] {
            let path = s.next_page_path();
            s.push_page(path, frame(shade));
        }
        let paths = s.page_paths();
        assert_eq!(paths.len(), 3);
        assert!(paths[0].ends_with("page_0001.png"));
        assert!(paths[2].ends_with("page_0003.png"));
    }

    #[test]
    fn tail_window_is_bounded() {
        let mut s = session(3);
        for i in 0..10u8 {
            let path = s.next_page_path();
            s.push_page(path, frame(i * 20));
        }
        assert_eq!(s.tail.len(), 3);
        assert_eq!(s.page_count(), 10);
    }

    #[test]
    fn static_tail_detected_only_when_window_full() {
        let mut s = session(3);
        s.push_page(s.next_page_path(), frame(128));
        s.push_page(s.next_page_path(), frame(128));
        assert!(!s.tail_is_static(0.995), "window not yet full");

        s.push_page(s.next_page_path(), frame(128));
        assert!(s.tail_is_static(0.995));
    }

    #[test]
    fn changing_tail_is_not_static() {
        let mut s = session(3);
        s.push_page(s.next_page_path(), frame(0));
        s.push_page(s.next_page_path(), frame(128));
        s.push_page(s.next_page_path(), frame(255));
        assert!(!s.tail_is_static(0.995));
    }

    #[test]
    fn drop_tail_removes_trailing_pages_and_margins() {
        let mut s = CaptureSession::new(2, true).unwrap();
        for i in 0..5u8 {
            s.push_page(s.next_page_path(), frame(i * 50));
        }
        assert_eq!(s.per_page_margins().len(), 5);

        let dropped = s.drop_tail_pages();
        assert_eq!(dropped, 2);
        assert_eq!(s.page_count(), 3);
        assert_eq!(s.per_page_margins().len(), 3);
        assert!(!s.tail_is_static(0.0), "tail cleared after drop");
    }

    #[test]
    fn temp_dir_is_removed_on_drop() {
        let s = session(2);
        let dir = s.dir().to_path_buf();
        assert!(dir.exists());
        drop(s);
        assert!(!dir.exists());
    }
}
