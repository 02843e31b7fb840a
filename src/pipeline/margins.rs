//! Trim margins: per-page border measurement and safe aggregation.
//!
//! Margin analysis answers "how much uniform border can be removed from
//! *every* page without clipping content on *any* page". Aggregation takes
//! the per-edge **minimum** across pages — deliberately conservative: an
//! average or maximum would cut real content on the page with the smallest
//! border, and a PDF with one clipped page is worse than one with slightly
//! generous margins everywhere.

use crate::error::SessionError;
use crate::pipeline::metrics::{self, Bounds};
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Per-edge removable border widths, in pixels.
///
/// Computed values obey `each < min(width, height) / 2` of the image they
/// were measured against; the scan in [`metrics::content_bounds`] enforces
/// it. User-supplied values are validated at application time instead
/// (see [`trim_image`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrimMargins {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl TrimMargins {
    /// Margins that remove nothing.
    pub const ZERO: TrimMargins = TrimMargins {
        top: 0,
        bottom: 0,
        left: 0,
        right: 0,
    };

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for TrimMargins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "top={} bottom={} left={} right={}",
            self.top, self.bottom, self.left, self.right
        )
    }
}

/// Measure one page's removable border.
pub fn page_margins(img: &DynamicImage) -> TrimMargins {
    let (w, h) = img.dimensions();
    let Bounds {
        left,
        top,
        right,
        bottom,
    } = metrics::content_bounds(img);

    TrimMargins {
        top,
        bottom: h - bottom,
        left,
        right: w - right,
    }
}

/// Per-edge minimum across all pages; the largest trim guaranteed not to
/// clip any page's content.
///
/// An empty input aggregates to [`TrimMargins::ZERO`] — no pages means
/// nothing is known to be safe to remove.
pub fn aggregate(margins: &[TrimMargins]) -> TrimMargins {
    margins
        .iter()
        .copied()
        .reduce(|acc, m| TrimMargins {
            top: acc.top.min(m.top),
            bottom: acc.bottom.min(m.bottom),
            left: acc.left.min(m.left),
            right: acc.right.min(m.right),
        })
        .unwrap_or(TrimMargins::ZERO)
}

/// Crop `img` by `margins`.
///
/// Returns `None` when the margins would produce an empty or inverted
/// image — the caller keeps the untrimmed page in that case (a degenerate
/// page in the output would be worse than an untrimmed one).
pub fn trim_image(img: &DynamicImage, margins: &TrimMargins) -> Option<DynamicImage> {
    if margins.is_zero() {
        return Some(img.clone());
    }

    let (w, h) = img.dimensions();
    let horizontal = margins.left.saturating_add(margins.right);
    let vertical = margins.top.saturating_add(margins.bottom);
    if horizontal >= w || vertical >= h {
        return None;
    }

    Some(img.crop_imm(margins.left, margins.top, w - horizontal, h - vertical))
}

/// Trim an image file in place on disk: decode, crop, re-encode to `output`.
pub fn trim_file(input: &Path, output: &Path, margins: &TrimMargins) -> Result<(), SessionError> {
    let img = image::open(input).map_err(|e| SessionError::PageUnreadable {
        path: input.to_path_buf(),
        detail: e.to_string(),
    })?;

    let trimmed = trim_image(&img, margins).ok_or_else(|| SessionError::PageUnreadable {
        path: input.to_path_buf(),
        detail: format!("trim margins ({margins}) would produce an empty image"),
    })?;

    trimmed.save(output).map_err(|e| SessionError::PageUnreadable {
        path: output.to_path_buf(),
        detail: format!("failed to save trimmed page: {e}"),
    })?;

    Ok(())
}
