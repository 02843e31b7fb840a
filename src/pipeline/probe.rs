//! Direction probe: which input actually advances pages?
//!
//! Books render left-to-right or right-to-left, and the reader maps "next
//! page" to the matching arrow key — so the correct key is a property of
//! the open book, not of the application. The only way to find out is to
//! press a key and look at the screen.
//!
//! The probe captures a baseline, presses the forward input up to
//! `probe_presses` times, and compares each capture against the previous
//! one. The *first* differing pair confirms the direction — no further
//! presses, no reverse probing. Only when every forward press leaves the
//! screen untouched does the probe repeat the procedure with the reverse
//! input from the same position (the position cannot have moved: nothing
//! changed).
//!
//! Multiple presses per direction tolerate a single dropped event or
//! animation-timing false negative. A probe where *neither* direction
//! changes anything means the reader is not responding to simulated input
//! at all — fatal, and not retryable, before any real content is captured.
//!
//! Every capture the probe takes of a page that advanced is a page the
//! session would otherwise have to re-capture; confirmed probe captures
//! (baseline included) become the session's first pages.

use crate::automation::{AutomationDriver, Direction};
use crate::config::CaptureConfig;
use crate::error::SessionError;
use crate::pipeline::{self, metrics};
use crate::screenshot::Capturer;
use crate::session::CaptureSession;
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Probe progression, for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeState {
    Idle,
    ProbingForward,
    ProbingReverse,
    Confirmed(Direction),
    Failed,
}

/// Resolve the page-turn direction, seeding `session` with the confirmed
/// probe captures.
///
/// # Errors
/// * [`SessionError::DirectionUndetectable`] — neither direction changed
///   the screen after `probe_presses` attempts each.
/// * Retry-exhaustion, foreground-loss, and cancellation errors from the
///   wrapped capture and input calls.
pub(crate) async fn detect_direction(
    driver: &Arc<dyn AutomationDriver>,
    capturer: &Arc<dyn Capturer>,
    config: &CaptureConfig,
    session: &mut CaptureSession,
    cancel: &CancellationToken,
) -> Result<Direction, SessionError> {
    let mut state = ProbeState::Idle;
    debug!(?state, "direction probe starting");

    if let Some(ref cb) = config.progress_callback {
        cb.on_probe_start();
    }

    // The one activating capture of the session: brings the reader to the
    // foreground and waits out the Space switch.
    let baseline_path = session.dir().join("probe_baseline.png");
    let baseline = pipeline::capture_page(
        cancel,
        &config.retry,
        capturer,
        &baseline_path,
        "capture the baseline page",
        true,
    )
    .await?;

    for direction in [Direction::Forward, Direction::Reverse] {
        state = match direction {
            Direction::Forward => ProbeState::ProbingForward,
            Direction::Reverse => ProbeState::ProbingReverse,
        };
        debug!(?state, "probing");

        let mut captures: Vec<(PathBuf, DynamicImage)> = Vec::new();

        for press in 1..=config.probe_presses {
            pipeline::turn_page(
                cancel,
                &config.retry,
                driver,
                direction,
                &format!("probe press {press} ({direction})"),
            )
            .await?;
            pipeline::settle(cancel, config.page_delay).await?;

            let path = session
                .dir()
                .join(format!("probe_{direction}_{press}.png"));
            let img = pipeline::capture_page(
                cancel,
                &config.retry,
                capturer,
                &path,
                &format!("capture probe page {press} ({direction})"),
                false,
            )
            .await?;

            let prev = captures.last().map(|(_, i)| i).unwrap_or(&baseline);
            let changed = match metrics::similarity(prev, &img) {
                Ok(s) => {
                    debug!(%direction, press, similarity = s, "probe comparison");
                    s < config.direction_threshold
                }
                // A dimension change is as much a change as any.
                Err(e) => {
                    debug!(%direction, press, error = %e, "probe captures incomparable");
                    true
                }
            };
            captures.push((path, img));

            if changed {
                state = ProbeState::Confirmed(direction);
                info!(?state, presses = press, "page-turn direction confirmed");

                // The baseline and the pages these presses revealed are real
                // content — keep them instead of re-capturing.
                session.push_page(baseline_path.clone(), baseline.clone());
                for (path, img) in captures {
                    session.push_page(path, img);
                }
                return Ok(direction);
            }
        }

        debug!(%direction, "no change after {} presses", config.probe_presses);
    }

    state = ProbeState::Failed;
    info!(?state, "neither direction changed the screen");
    Err(SessionError::DirectionUndetectable)
}
