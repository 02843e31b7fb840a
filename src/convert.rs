//! Session orchestration: the top-level conversion entry points.
//!
//! [`convert`] runs one complete session against a pair of collaborators:
//! preflight checks, direction probe, capture loop, margin aggregation, and
//! (in generate mode) trimming and PDF assembly. Collaborators are passed
//! in rather than constructed here so tests drive the whole pipeline with
//! in-memory doubles; [`platform_collaborators`] builds the real pair.
//!
//! Everything that can fail before the first capture is checked before the
//! first capture — a session that aborts on page 300 because the output
//! directory was read-only has wasted five minutes of page turns.

use crate::automation::{AutomationDriver, ReaderApp, ScriptDriver};
use crate::config::{CaptureConfig, SessionMode};
use crate::error::SessionError;
use crate::output::{SessionResult, SessionStats};
use crate::pipeline::margins::{self, TrimMargins};
use crate::pipeline::{self, assemble, capture, probe};
use crate::screenshot::{Capturer, ScreenCapturer};
use crate::session::CaptureSession;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Construct the real driver/capturer pair for `app`.
///
/// The capturer shares the driver's scripting bridge for its activating
/// slow path.
pub fn platform_collaborators(app: ReaderApp) -> (Arc<dyn AutomationDriver>, Arc<dyn Capturer>) {
    let script = Arc::new(ScriptDriver::new(app));
    let capturer: Arc<dyn Capturer> = Arc::new(ScreenCapturer::new(Arc::clone(&script)));
    (script, capturer)
}

/// Run one capture session.
///
/// In [`SessionMode::Generate`] the captured pages are (optionally trimmed
/// and) assembled into a PDF; in [`SessionMode::DetectMargins`] the session
/// reports per-page and aggregate trim margins and writes nothing.
///
/// # Errors
/// Fatal conditions only — see [`SessionError`]. Partial conditions
/// (page ceiling, per-page trim fallback) surface as warnings on the
/// returned [`SessionResult`] instead.
pub async fn convert(
    driver: Arc<dyn AutomationDriver>,
    capturer: Arc<dyn Capturer>,
    config: &CaptureConfig,
    cancel: &CancellationToken,
) -> Result<SessionResult, SessionError> {
    let total_start = Instant::now();
    info!(mode = ?config.mode, app = %config.app.app_name, "starting capture session");

    // ── Step 1: Preconditions ────────────────────────────────────────────
    check_reader_state(&driver, config, cancel).await?;

    // ── Step 2: Output location (before any capture is taken) ───────────
    let output_path = match config.mode {
        SessionMode::Generate => {
            let path = resolve_output_path(config);
            check_writable(&path)?;
            Some(path)
        }
        SessionMode::DetectMargins => None,
    };

    // ── Step 3: Session state ────────────────────────────────────────────
    let analyze = config.mode == SessionMode::DetectMargins;
    let mut session = CaptureSession::new(config.end_window, analyze)?;

    // ── Step 4: Resolve direction ────────────────────────────────────────
    let probe_start = Instant::now();
    let direction = match config.direction {
        Some(forced) => {
            debug!(%forced, "skipping probe: direction forced by configuration");
            forced
        }
        None => {
            let d =
                probe::detect_direction(&driver, &capturer, config, &mut session, cancel).await?;
            // The probe's last capture is the page still on screen; turn
            // past it so the loop doesn't capture it twice.
            pipeline::turn_page(cancel, &config.retry, &driver, d, "turn past the probed page")
                .await?;
            pipeline::settle(cancel, config.page_delay).await?;
            d
        }
    };
    let probe_duration_ms = probe_start.elapsed().as_millis() as u64;
    if let Some(ref cb) = config.progress_callback {
        cb.on_direction_resolved(direction, session.page_count());
    }
    info!(%direction, probe_pages = session.page_count(), "direction resolved");

    // ── Step 5: Capture loop ─────────────────────────────────────────────
    let capture_start = Instant::now();
    capture::run(&driver, &capturer, config, direction, &mut session, cancel).await?;
    let capture_duration_ms = capture_start.elapsed().as_millis() as u64;
    let captured_pages = session.page_count();

    // ── Step 6: Aggregate margins ────────────────────────────────────────
    let per_page_margins = session.per_page_margins().to_vec();
    let margins = analyze.then(|| margins::aggregate(&per_page_margins));
    if let Some(m) = margins {
        info!(%m, pages = per_page_margins.len(), "aggregated safe trim margins");
    }

    // ── Step 7: Trim + assemble (generate mode) ──────────────────────────
    let assemble_start = Instant::now();
    let mut output_bytes = 0u64;
    if let Some(ref output) = output_path {
        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }

        let pages = match config.custom_trim {
            // Trimming happens after capture, in one batch, so it can never
            // interfere with end detection.
            Some(trim) if !trim.is_zero() => apply_custom_trim(&mut session, &trim),
            _ => session.page_paths(),
        };

        output_bytes = assemble::assemble_pdf(pages, output.clone(), config.quality).await?;
    }
    let assemble_duration_ms = assemble_start.elapsed().as_millis() as u64;

    // ── Step 8: Result ───────────────────────────────────────────────────
    let result = SessionResult {
        output_path,
        page_count: session.page_count(),
        pages: session.page_paths(),
        direction,
        margins,
        per_page_margins,
        warnings: session.warnings().to_vec(),
        stats: SessionStats {
            captured_pages,
            output_pages: session.page_count(),
            total_duration_ms: total_start.elapsed().as_millis() as u64,
            probe_duration_ms,
            capture_duration_ms,
            assemble_duration_ms,
            output_bytes,
        },
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_session_complete(result.page_count);
    }
    info!(
        pages = result.page_count,
        duration_ms = result.stats.total_duration_ms,
        "session complete"
    );

    // `session` drops here, removing the temporary directory.
    Ok(result)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Verify the reader is running, has content open, and holds the
/// foreground. Each check is retry-wrapped like any other collaborator
/// call; a clean `false` is a precondition error naming what's missing.
async fn check_reader_state(
    driver: &Arc<dyn AutomationDriver>,
    config: &CaptureConfig,
    cancel: &CancellationToken,
) -> Result<(), SessionError> {
    if !driver_check(driver, config, cancel, "check the reader is running", |d| {
        d.is_target_running()
    })
    .await?
    {
        return Err(SessionError::ReaderNotRunning {
            app: config.app.app_name.clone(),
        });
    }

    if !driver_check(driver, config, cancel, "check a book is open", |d| {
        d.is_content_open()
    })
    .await?
    {
        return Err(SessionError::NoContentOpen {
            app: config.app.app_name.clone(),
        });
    }

    if !driver_check(driver, config, cancel, "check the reader is frontmost", |d| {
        d.is_target_foreground()
    })
    .await?
    {
        return Err(SessionError::ReaderNotForeground {
            app: config.app.app_name.clone(),
        });
    }

    debug!("reader preconditions satisfied");
    Ok(())
}

async fn driver_check<F>(
    driver: &Arc<dyn AutomationDriver>,
    config: &CaptureConfig,
    cancel: &CancellationToken,
    operation: &str,
    check: F,
) -> Result<bool, SessionError>
where
    F: Fn(&dyn AutomationDriver) -> Result<bool, crate::error::StepError>
        + Send
        + Sync
        + Clone
        + 'static,
{
    crate::retry::run(cancel, &config.retry, operation, || {
        let driver = Arc::clone(driver);
        let check = check.clone();
        async move {
            tokio::task::spawn_blocking(move || check(driver.as_ref()))
                .await
                .map_err(|e| crate::error::StepError::Script {
                    detail: format!("check task panicked: {e}"),
                })?
        }
    })
    .await
}

/// Output path from config, or `capture_<timestamp>.pdf` in the working
/// directory.
fn resolve_output_path(config: &CaptureConfig) -> PathBuf {
    config.output.clone().unwrap_or_else(|| {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        PathBuf::from(format!("capture_{stamp}.pdf"))
    })
}

/// Probe that the output location accepts writes, before any page is
/// captured. Creates missing parent directories as a side effect.
fn check_writable(path: &Path) -> Result<(), SessionError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    std::fs::create_dir_all(&parent).map_err(|source| SessionError::OutputUnwritable {
        path: path.to_path_buf(),
        source,
    })?;

    let probe = parent.join(".pagesnap_write_probe");
    std::fs::write(&probe, b"probe").map_err(|source| SessionError::OutputUnwritable {
        path: path.to_path_buf(),
        source,
    })?;
    let _ = std::fs::remove_file(&probe);
    Ok(())
}

/// Batch-trim every captured page by the user-supplied margins.
///
/// A page that fails to trim is kept untrimmed with a warning — the one
/// documented fallback; a missing page would corrupt the output ordering,
/// an untrimmed one is merely wider.
fn apply_custom_trim(session: &mut CaptureSession, trim: &TrimMargins) -> Vec<PathBuf> {
    let pages = session.pages().to_vec();
    let mut out = Vec::with_capacity(pages.len());

    for (i, page) in pages.iter().enumerate() {
        // Validate against the recorded dimensions before touching the
        // file: margins that swallow the whole page can't produce output.
        let horizontal = trim.left.saturating_add(trim.right);
        let vertical = trim.top.saturating_add(trim.bottom);
        if horizontal >= page.width || vertical >= page.height {
            session.warn(format!(
                "Trim margins ({trim}) exceed page {} ({}x{}); using the untrimmed capture",
                i + 1,
                page.width,
                page.height
            ));
            out.push(page.path.clone());
            continue;
        }

        let trimmed = page.path.with_file_name(format!("page_{:04}_trimmed.png", i + 1));
        match margins::trim_file(&page.path, &trimmed, trim) {
            Ok(()) => out.push(trimmed),
            Err(e) => {
                session.warn(format!(
                    "Failed to trim page {}: {e}; using the untrimmed capture",
                    i + 1
                ));
                out.push(page.path.clone());
            }
        }
    }

    out
}
