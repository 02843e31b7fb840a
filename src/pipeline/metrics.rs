//! Pixel-level heuristics: image similarity and border-content bounds.
//!
//! Everything the pipeline knows about the outside world it learns from
//! these two functions. There is no ground truth beyond "did the picture
//! change", so both are deliberately boring: deterministic, symmetric,
//! pure, and tolerant of the compression noise a screen capture carries.
//!
//! ## Sampling
//!
//! [`similarity`] never reads every pixel. A 5K display is ~14.7 M pixels;
//! comparing four adjacent pairs per captured page at full resolution would
//! dominate the session. Instead a square grid stride is derived from a
//! target sample count, giving a resolution-independent cost per call.

use image::{DynamicImage, GenericImageView};
use thiserror::Error;

/// Approximate number of pixels sampled per similarity comparison.
const TARGET_SAMPLES: u32 = 25_000;

/// Per-channel difference (of 255) below which two samples match.
/// Screen captures of the same page differ slightly across anti-aliasing
/// and compositor rounding; 30 absorbs that without masking real content.
const CHANNEL_TOLERANCE: u8 = 30;

/// All channels at or below this reads as a black-ish pixel.
const BLACK_MAX: u8 = 50;
/// All channels at or above this reads as a white-ish pixel.
const WHITE_MIN: u8 = 200;

/// Fraction of a row/column that must match the border mode for the line
/// to count as removable.
const LINE_MATCH: f64 = 0.95;

/// Longest run of non-matching lines bridgeable as thin noise (scrollbars,
/// hairline separators) during the inward scan.
const NOISE_GAP: u32 = 3;
/// Lines that must match again beyond a bridged gap before scanning resumes.
const GAP_CONFIRM: u32 = 2;

/// Comparison failure: the two images cannot be meaningfully compared.
///
/// Dimension mismatch is a signal in its own right (the display was
/// reconfigured, a dialog resized the window), not a low similarity score.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetricsError {
    #[error("images are incomparable: {a_width}x{a_height} vs {b_width}x{b_height}")]
    Incomparable {
        a_width: u32,
        a_height: u32,
        b_width: u32,
        b_height: u32,
    },
}

/// The tightest rectangle excluding a uniform border, half-open on the
/// right and bottom edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Bounds {
    /// The full extent of a `width` × `height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width,
            bottom: height,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

/// Fraction of sampled pixels whose R, G, B channels all fall within
/// [`CHANNEL_TOLERANCE`] of each other, in `[0, 1]`.
///
/// Symmetric and deterministic: the sample grid depends only on the shared
/// dimensions, so `similarity(a, b) == similarity(b, a)`.
///
/// # Errors
/// [`MetricsError::Incomparable`] when the dimensions differ. Callers decide
/// what a dimension change means for them (the probe reads it as "the
/// screen changed"; end detection reads it as "not identical").
pub fn similarity(a: &DynamicImage, b: &DynamicImage) -> Result<f64, MetricsError> {
    let (aw, ah) = a.dimensions();
    let (bw, bh) = b.dimensions();
    if (aw, ah) != (bw, bh) {
        return Err(MetricsError::Incomparable {
            a_width: aw,
            a_height: ah,
            b_width: bw,
            b_height: bh,
        });
    }
    if aw == 0 || ah == 0 {
        return Ok(1.0);
    }

    let stride = sample_stride(aw, ah);
    let mut samples = 0u64;
    let mut matches = 0u64;

    let mut y = 0;
    while y < ah {
        let mut x = 0;
        while x < aw {
            samples += 1;
            let pa = a.get_pixel(x, y).0;
            let pb = b.get_pixel(x, y).0;
            if channels_match(pa, pb) {
                matches += 1;
            }
            x += stride;
        }
        y += stride;
    }

    Ok(matches as f64 / samples as f64)
}

/// Square grid stride sized so a full scan touches roughly
/// [`TARGET_SAMPLES`] pixels, never below 1.
fn sample_stride(width: u32, height: u32) -> u32 {
    let total = width as f64 * height as f64;
    ((total / TARGET_SAMPLES as f64).sqrt().floor() as u32).max(1)
}

fn channels_match(a: [u8; 4], b: [u8; 4]) -> bool {
    // Alpha ignored: screen captures are opaque, and compositors disagree
    // about what to report there.
    a[0].abs_diff(b[0]) <= CHANNEL_TOLERANCE
        && a[1].abs_diff(b[1]) <= CHANNEL_TOLERANCE
        && a[2].abs_diff(b[2]) <= CHANNEL_TOLERANCE
}

/// The dominant uniform colour at the image corners, used as the reference
/// for border scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BorderMode {
    Black,
    White,
}

fn classify(px: [u8; 4]) -> Option<BorderMode> {
    if px[0] <= BLACK_MAX && px[1] <= BLACK_MAX && px[2] <= BLACK_MAX {
        Some(BorderMode::Black)
    } else if px[0] >= WHITE_MIN && px[1] >= WHITE_MIN && px[2] >= WHITE_MIN {
        Some(BorderMode::White)
    } else {
        None
    }
}

fn matches_mode(px: [u8; 4], mode: BorderMode) -> bool {
    classify(px) == Some(mode)
}

/// Tightest rectangle excluding a uniform black-ish or white-ish border.
///
/// At least three of the four corners must agree on the border colour;
/// a tie or no clear mode returns the full bounds untrimmed. Scanning from
/// each edge stops at the first row/column where fewer than 95 % of pixels
/// match the mode, bridging runs of up to [`NOISE_GAP`] noisy lines when
/// matching lines resume immediately beyond them.
///
/// Each edge's scan is capped short of `min(width, height) / 2`, so the
/// inner rectangle can never invert; the degenerate-guard return of the
/// full bounds is kept for the zero-size case.
///
/// Idempotent: purely a function of the pixels.
pub fn content_bounds(img: &DynamicImage) -> Bounds {
    let (w, h) = img.dimensions();
    let full = Bounds::full(w, h);
    if w < 2 || h < 2 {
        return full;
    }

    let corners = [
        img.get_pixel(0, 0).0,
        img.get_pixel(w - 1, 0).0,
        img.get_pixel(0, h - 1).0,
        img.get_pixel(w - 1, h - 1).0,
    ];
    let black = corners.iter().filter(|&&c| classify(c) == Some(BorderMode::Black)).count();
    let white = corners.iter().filter(|&&c| classify(c) == Some(BorderMode::White)).count();
    let mode = if black >= 3 {
        BorderMode::Black
    } else if white >= 3 {
        BorderMode::White
    } else {
        return full;
    };

    let half = w.min(h) / 2;

    let row_matches = |y: u32| line_matches(img, mode, w, |x| (x, y));
    let col_matches = |x: u32| line_matches(img, mode, h, |y| (x, y));

    let top = scan_inward(half, |d| row_matches(d));
    let bottom = scan_inward(half, |d| row_matches(h - 1 - d));
    let left = scan_inward(half, |d| col_matches(d));
    let right = scan_inward(half, |d| col_matches(w - 1 - d));

    let bounds = Bounds {
        left,
        top,
        right: w - right,
        bottom: h - bottom,
    };
    if bounds.right <= bounds.left || bounds.bottom <= bounds.top {
        return full;
    }
    bounds
}

/// Whether ≥ [`LINE_MATCH`] of the `len` pixels along one line match `mode`.
fn line_matches(
    img: &DynamicImage,
    mode: BorderMode,
    len: u32,
    coord: impl Fn(u32) -> (u32, u32),
) -> bool {
    let mut matching = 0u32;
    for i in 0..len {
        let (x, y) = coord(i);
        if matches_mode(img.get_pixel(x, y).0, mode) {
            matching += 1;
        }
    }
    f64::from(matching) / f64::from(len) >= LINE_MATCH
}

/// Depth of the removable border from one edge.
///
/// `line(d)` reports whether the line at depth `d` is removable. A run of
/// up to [`NOISE_GAP`] non-removable lines is absorbed when the following
/// [`GAP_CONFIRM`] lines are removable again. The result is clamped below
/// `half` so a per-edge margin never reaches half the smaller dimension.
fn scan_inward(half: u32, line: impl Fn(u32) -> bool) -> u32 {
    let mut depth = 0u32;
    let mut i = 0u32;
    while i < half {
        if line(i) {
            depth = i + 1;
            i += 1;
            continue;
        }

        let mut resumed = None;
        let mut j = i + 1;
        while j < half && j - i <= NOISE_GAP {
            if line(j) {
                resumed = Some(j);
                break;
            }
            j += 1;
        }
        let Some(j) = resumed else { break };
        let confirm_end = (j + GAP_CONFIRM).min(half);
        if !(j..confirm_end).all(&line) {
            break;
        }
        depth = j + 1;
        i = j + 1;
    }
    depth.min(half.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)))
    }

    fn bordered(width: u32, height: u32, border: u32, outer: [u8; 3], inner: [u8; 3]) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            if x < border || x >= width - border || y < border || y >= height - border {
                Rgb(outer)
            } else {
                Rgb(inner)
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn identical_images_score_one() {
        let a = solid(64, 64, [10, 200, 99]);
        assert_eq!(similarity(&a, &a).unwrap(), 1.0);
    }

    #[test]
    fn disjoint_images_score_zero() {
        let black = solid(64, 64, [0, 0, 0]);
        let white = solid(64, 64, [255, 255, 255]);
        assert_eq!(similarity(&black, &white).unwrap(), 0.0);
    }

    #[test]
    fn similarity_is_symmetric_and_in_range() {
        let a = DynamicImage::ImageRgb8(RgbImage::from_fn(100, 80, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }));
        let b = DynamicImage::ImageRgb8(RgbImage::from_fn(100, 80, |x, y| {
            Rgb([(y % 256) as u8, (x % 256) as u8, 128])
        }));

        let ab = similarity(&a, &b).unwrap();
        let ba = similarity(&b, &a).unwrap();
        assert_eq!(ab, ba);
        assert!((0.0..=1.0).contains(&ab));
    }

    #[test]
    fn mismatched_dimensions_are_incomparable_not_low() {
        let a = solid(64, 64, [0, 0, 0]);
        let b = solid(32, 64, [0, 0, 0]);
        let err = similarity(&a, &b).unwrap_err();
        assert_eq!(
            err,
            MetricsError::Incomparable {
                a_width: 64,
                a_height: 64,
                b_width: 32,
                b_height: 64,
            }
        );
    }

    #[test]
    fn tolerance_absorbs_capture_noise() {
        let a = solid(64, 64, [100, 100, 100]);
        let b = solid(64, 64, [120, 85, 110]);
        assert_eq!(similarity(&a, &b).unwrap(), 1.0);

        let c = solid(64, 64, [140, 100, 100]);
        assert_eq!(similarity(&a, &c).unwrap(), 0.0);
    }

    #[test]
    fn black_border_bounds_within_tolerance() {
        let img = bordered(100, 100, 10, [0, 0, 0], [255, 255, 255]);
        let bounds = content_bounds(&img);
        assert!(bounds.left.abs_diff(10) <= 2, "left {}", bounds.left);
        assert!(bounds.top.abs_diff(10) <= 2, "top {}", bounds.top);
        assert!(bounds.right.abs_diff(90) <= 2, "right {}", bounds.right);
        assert!(bounds.bottom.abs_diff(90) <= 2, "bottom {}", bounds.bottom);
    }

    #[test]
    fn white_border_dark_interior() {
        let img = bordered(120, 90, 8, [255, 255, 255], [30, 30, 30]);
        let bounds = content_bounds(&img);
        assert!(bounds.left.abs_diff(8) <= 2);
        assert!(bounds.top.abs_diff(8) <= 2);
    }

    #[test]
    fn content_bounds_is_idempotent() {
        let img = bordered(100, 100, 10, [0, 0, 0], [255, 255, 255]);
        assert_eq!(content_bounds(&img), content_bounds(&img));
    }

    #[test]
    fn no_clear_corner_mode_returns_full_bounds() {
        let img = solid(80, 80, [128, 128, 128]);
        assert_eq!(content_bounds(&img), Bounds::full(80, 80));
    }

    #[test]
    fn tied_corners_return_full_bounds() {
        // Left corners black, right corners white: 2 vs 2, no majority.
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(100, 100, |x, _| {
            if x < 50 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        }));
        assert_eq!(content_bounds(&img), Bounds::full(100, 100));
    }

    #[test]
    fn thin_noise_line_in_border_is_bridged() {
        // 10 px black border with a single white scanline at depth 4 —
        // the shape a scrollbar hairline leaves behind.
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(100, 100, |x, y| {
            if y == 4 {
                Rgb([255, 255, 255])
            } else if x < 10 || x >= 90 || y < 10 || y >= 90 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        }));
        let bounds = content_bounds(&img);
        assert!(bounds.top.abs_diff(10) <= 2, "top {} should bridge the noise line", bounds.top);
    }

    #[test]
    fn uniform_border_image_never_inverts() {
        // Entirely black: every line matches, scans clamp short of half.
        let img = solid(60, 40, [0, 0, 0]);
        let bounds = content_bounds(&img);
        assert!(bounds.right > bounds.left);
        assert!(bounds.bottom > bounds.top);
    }
}
