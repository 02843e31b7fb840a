//! End-to-end session tests against a simulated reader.
//!
//! No real reader application, screen, or scripting bridge is involved:
//! a `SimulatedReader` holds a scripted sequence of screen states behind a
//! cursor, the mock driver moves the cursor (per-direction effectiveness is
//! scriptable), and the mock capturer renders the current state to disk.
//! This exercises the full pipeline — preflight, probe, capture loop, end
//! detection, margins, trimming, PDF assembly — with deterministic pixels.

use image::{Rgb, RgbImage};
use lopdf::Document;
use pagesnap::{
    convert, AutomationDriver, CaptureConfig, Capturer, Direction, PdfQuality, SessionError,
    SessionMode, StepError, TrimMargins,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

// ── Simulated reader ─────────────────────────────────────────────────────────

struct SimulatedReader {
    frames: Vec<RgbImage>,
    cursor: AtomicUsize,
    forward_effective: bool,
    reverse_effective: bool,
    presses: Mutex<Vec<Direction>>,
}

impl SimulatedReader {
    fn new(frames: Vec<RgbImage>) -> Arc<Self> {
        Self::with_effectiveness(frames, true, false)
    }

    fn with_effectiveness(
        frames: Vec<RgbImage>,
        forward_effective: bool,
        reverse_effective: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            frames,
            cursor: AtomicUsize::new(0),
            forward_effective,
            reverse_effective,
            presses: Mutex::new(Vec::new()),
        })
    }

    fn current(&self) -> &RgbImage {
        let i = self.cursor.load(Ordering::SeqCst).min(self.frames.len() - 1);
        &self.frames[i]
    }

    fn presses_of(&self, direction: Direction) -> usize {
        self.presses
            .lock()
            .unwrap()
            .iter()
            .filter(|&&d| d == direction)
            .count()
    }
}

struct SimDriver(Arc<SimulatedReader>);

impl AutomationDriver for SimDriver {
    fn is_target_running(&self) -> Result<bool, StepError> {
        Ok(true)
    }
    fn is_content_open(&self) -> Result<bool, StepError> {
        Ok(true)
    }
    fn is_target_foreground(&self) -> Result<bool, StepError> {
        Ok(true)
    }
    fn advance_page(&self, direction: Direction) -> Result<(), StepError> {
        self.0.presses.lock().unwrap().push(direction);
        let effective = match direction {
            Direction::Forward => self.0.forward_effective,
            Direction::Reverse => self.0.reverse_effective,
        };
        if effective {
            self.0.cursor.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct SimCapturer(Arc<SimulatedReader>);

impl Capturer for SimCapturer {
    fn capture(&self, path: &Path) -> Result<(), StepError> {
        self.0.current().save(path).map_err(|e| StepError::Capture {
            detail: e.to_string(),
        })
    }

    fn capture_activating(&self, path: &Path) -> Result<(), StepError> {
        self.capture(path)
    }
}

fn collaborators(reader: &Arc<SimulatedReader>) -> (Arc<dyn AutomationDriver>, Arc<dyn Capturer>) {
    (
        Arc::new(SimDriver(Arc::clone(reader))),
        Arc::new(SimCapturer(Arc::clone(reader))),
    )
}

// ── Frame helpers ────────────────────────────────────────────────────────────

fn solid(shade: u8) -> RgbImage {
    RgbImage::from_pixel(32, 32, Rgb([shade, shade, shade]))
}

fn bordered(size: u32, border: u32, interior: u8) -> RgbImage {
    RgbImage::from_fn(size, size, |x, y| {
        if x < border || x >= size - border || y < border || y >= size - border {
            Rgb([0, 0, 0])
        } else {
            Rgb([interior, interior, interior])
        }
    })
}

/// Three distinct content pages, then the reader parks on a static screen.
fn short_book() -> Vec<RgbImage> {
    vec![solid(0), solid(90), solid(180), solid(255)]
}

fn fast_config() -> pagesnap::CaptureConfigBuilder {
    CaptureConfig::builder().page_delay_ms(1)
}

// ── Direction probing ────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn forward_direction_confirmed_on_first_change() {
    let reader = SimulatedReader::new(short_book());
    let (driver, capturer) = collaborators(&reader);
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config()
        .output(dir.path().join("book.pdf"))
        .build()
        .unwrap();
    let cancel = CancellationToken::new();

    let result = convert(driver, capturer, &config, &cancel).await.unwrap();

    assert_eq!(result.direction, Direction::Forward);
    // The first press changed the screen: the probe must confirm there,
    // never touching the reverse input.
    assert_eq!(reader.presses_of(Direction::Reverse), 0);
    // Probe pages (baseline + exactly one additional capture) are kept as
    // the session's first pages; the three content pages survive end
    // detection.
    assert_eq!(result.page_count, 3);
    assert_eq!(result.stats.captured_pages, 8);
    assert!(result.pages[0].ends_with("probe_baseline.png"), "got {:?}", result.pages[0]);
    assert!(result.pages[1].ends_with("probe_forward_1.png"), "got {:?}", result.pages[1]);
}

#[tokio::test(flavor = "multi_thread")]
async fn reverse_direction_detected_when_forward_is_inert() {
    let reader = SimulatedReader::with_effectiveness(short_book(), false, true);
    let (driver, capturer) = collaborators(&reader);
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config()
        .output(dir.path().join("book.pdf"))
        .build()
        .unwrap();
    let cancel = CancellationToken::new();

    let result = convert(driver, capturer, &config, &cancel).await.unwrap();

    assert_eq!(result.direction, Direction::Reverse);
    // Forward was tried in full before reverse was considered.
    assert_eq!(reader.presses_of(Direction::Forward), 3);
    assert_eq!(result.page_count, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn unresponsive_reader_is_a_fatal_detection_error() {
    let reader = SimulatedReader::with_effectiveness(short_book(), false, false);
    let (driver, capturer) = collaborators(&reader);
    // Detect mode: no output file is involved, the failure is pre-capture.
    let config = fast_config().mode(SessionMode::DetectMargins).build().unwrap();
    let cancel = CancellationToken::new();

    let err = convert(driver, capturer, &config, &cancel).await.unwrap_err();

    assert!(matches!(err, SessionError::DirectionUndetectable));
    // Both directions were given their full budget of presses.
    assert_eq!(reader.presses_of(Direction::Forward), 3);
    assert_eq!(reader.presses_of(Direction::Reverse), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn forced_direction_skips_the_probe() {
    let reader = SimulatedReader::new(short_book());
    let (driver, capturer) = collaborators(&reader);
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config()
        .direction(Direction::Forward)
        .output(dir.path().join("book.pdf"))
        .build()
        .unwrap();
    let cancel = CancellationToken::new();

    let result = convert(driver, capturer, &config, &cancel).await.unwrap();

    assert_eq!(result.page_count, 3);
    // No probe: every press came from the capture loop.
    assert_eq!(result.stats.captured_pages, 8);
}

// ── Generate mode ────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn generated_pdf_has_one_page_per_kept_capture() {
    let reader = SimulatedReader::new(short_book());
    let (driver, capturer) = collaborators(&reader);
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("book.pdf");
    let config = fast_config().output(output.clone()).build().unwrap();
    let cancel = CancellationToken::new();

    let result = convert(driver, capturer, &config, &cancel).await.unwrap();

    assert_eq!(result.output_path.as_deref(), Some(output.as_path()));
    assert!(result.stats.output_bytes > 0);

    let doc = Document::load(&output).unwrap();
    assert_eq!(doc.get_pages().len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn session_temp_files_are_gone_after_the_session() {
    let reader = SimulatedReader::new(short_book());
    let (driver, capturer) = collaborators(&reader);
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config()
        .output(dir.path().join("book.pdf"))
        .build()
        .unwrap();
    let cancel = CancellationToken::new();

    let result = convert(driver, capturer, &config, &cancel).await.unwrap();

    assert!(!result.pages.is_empty());
    for page in &result.pages {
        assert!(!page.exists(), "temp capture {} must be removed", page.display());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn custom_trim_shrinks_the_pdf_pages() {
    // 60×60 frames with a 10 px black border; interiors differ enough to
    // read as distinct pages.
    let frames = vec![
        bordered(60, 10, 255),
        bordered(60, 10, 150),
        bordered(60, 10, 80),
        solid(128),
    ];
    let reader = SimulatedReader::new(frames);
    let (driver, capturer) = collaborators(&reader);
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("trimmed.pdf");
    let config = fast_config()
        .direction(Direction::Forward)
        .custom_trim(TrimMargins {
            top: 10,
            bottom: 10,
            left: 10,
            right: 10,
        })
        .quality(PdfQuality::Low)
        .output(output.clone())
        .build()
        .unwrap();
    let cancel = CancellationToken::new();

    let result = convert(driver, capturer, &config, &cancel).await.unwrap();
    assert_eq!(result.page_count, 3);

    let doc = Document::load(&output).unwrap();
    let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
    let media_box: Vec<i64> = doc
        .get_object(page_id)
        .and_then(|o| o.as_dict())
        .and_then(|d| d.get(b"MediaBox"))
        .and_then(|o| o.as_array())
        .unwrap()
        .iter()
        .map(|o| o.as_i64().unwrap())
        .collect();
    assert_eq!(media_box, vec![0, 0, 40, 40]);
}

// ── Margin-detection mode ────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn detect_mode_reports_margins_and_writes_no_pdf() {
    let frames = vec![
        bordered(100, 10, 255),
        bordered(100, 12, 150),
        bordered(100, 10, 80),
        solid(128),
    ];
    let reader = SimulatedReader::new(frames);
    let (driver, capturer) = collaborators(&reader);
    let config = fast_config()
        .mode(SessionMode::DetectMargins)
        .direction(Direction::Forward)
        .build()
        .unwrap();
    let cancel = CancellationToken::new();

    let result = convert(driver, capturer, &config, &cancel).await.unwrap();

    assert!(result.output_path.is_none());
    assert_eq!(result.page_count, 3);
    assert_eq!(result.per_page_margins.len(), 3, "dropped end screens must not contribute margins");

    let m = result.margins.expect("detect mode reports aggregate margins");
    // The per-edge minimum across borders of 10, 12, 10 px is ~10.
    for (edge, v) in [("top", m.top), ("bottom", m.bottom), ("left", m.left), ("right", m.right)] {
        assert!(v.abs_diff(10) <= 2, "{edge} margin {v}, expected ~10");
    }
    for per_page in &result.per_page_margins {
        assert!(m.top <= per_page.top);
        assert!(m.bottom <= per_page.bottom);
        assert!(m.left <= per_page.left);
        assert!(m.right <= per_page.right);
    }
}

// ── Cancellation ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_session_returns_the_cancellation_error() {
    let reader = SimulatedReader::new(short_book());
    let (driver, capturer) = collaborators(&reader);
    let config = fast_config().mode(SessionMode::DetectMargins).build().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = convert(driver, capturer, &config, &cancel).await.unwrap_err();
    assert!(matches!(err, SessionError::Cancelled));
}

// ── Page ceiling ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn endless_book_stops_at_the_ceiling_with_a_warning() {
    // Every frame distinct: end detection can never fire.
    let frames: Vec<RgbImage> = (0..32u32).map(|i| solid((i * 37 % 256) as u8)).collect();
    let reader = SimulatedReader::new(frames);
    let (driver, capturer) = collaborators(&reader);
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config()
        .direction(Direction::Forward)
        .max_pages(6)
        .output(dir.path().join("partial.pdf"))
        .build()
        .unwrap();
    let cancel = CancellationToken::new();

    let result = convert(driver, capturer, &config, &cancel).await.unwrap();

    assert_eq!(result.page_count, 6);
    assert!(
        result.warnings.iter().any(|w| w.contains("page ceiling")),
        "warnings: {:?}",
        result.warnings
    );
    // Partial results are still assembled.
    assert!(result.output_path.unwrap().exists());
}
