//! Screen capture: full-screen rasters of the primary display.
//!
//! Two capture variants exist because activation is expensive. Bringing a
//! full-screen application to the front switches macOS Spaces, which takes
//! a couple of seconds of animation; doing that once per page would triple
//! the session duration. The slow path ([`Capturer::capture_activating`])
//! runs once at session start; every per-page capture uses the fast path
//! and trusts that foreground is still held (the automation driver
//! re-verifies before each keystroke anyway).
//!
//! On macOS the process needs the "Screen & System Audio Recording"
//! permission; a denied capture surfaces that hint in the error.

use crate::automation::ScriptDriver;
use crate::error::StepError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use xcap::Monitor;

/// Writes a full-screen raster image to a path.
pub trait Capturer: Send + Sync {
    /// Fast path: capture assuming the target already holds the foreground.
    fn capture(&self, path: &Path) -> Result<(), StepError>;

    /// Slow path: bring the target to the foreground, wait for the Space
    /// switch to settle, then capture. Used once at session start.
    fn capture_activating(&self, path: &Path) -> Result<(), StepError>;
}

/// [`Capturer`] backed by `xcap` on the primary monitor.
pub struct ScreenCapturer {
    driver: Arc<ScriptDriver>,
    /// How long to wait after activation for the Space switch animation.
    settle: Duration,
}

impl ScreenCapturer {
    pub fn new(driver: Arc<ScriptDriver>) -> Self {
        Self {
            driver,
            settle: Duration::from_secs(2),
        }
    }

    fn capture_primary(path: &Path) -> Result<(), StepError> {
        let monitors = Monitor::all().map_err(|e| StepError::Capture {
            detail: format!("failed to enumerate monitors: {e}"),
        })?;

        let primary = monitors.into_iter().next().ok_or_else(|| StepError::Capture {
            detail: "no monitors found".to_string(),
        })?;

        let raster = primary.capture_image().map_err(|e| StepError::Capture {
            detail: format!(
                "failed to capture screen: {e}. On macOS, grant Screen Recording \
                 permission to your terminal in System Settings > Privacy & Security."
            ),
        })?;

        if raster.width() == 0 || raster.height() == 0 {
            return Err(StepError::Capture {
                detail: "captured an empty image — possible permission issue or no display"
                    .to_string(),
            });
        }

        raster.save(path).map_err(|e| StepError::Capture {
            detail: format!("failed to save capture to {}: {e}", path.display()),
        })?;

        debug!(path = %path.display(), width = raster.width(), height = raster.height(), "captured screen");
        Ok(())
    }
}

impl Capturer for ScreenCapturer {
    fn capture(&self, path: &Path) -> Result<(), StepError> {
        Self::capture_primary(path)
    }

    fn capture_activating(&self, path: &Path) -> Result<(), StepError> {
        self.driver.activate()?;
        // Full-screen apps sit in their own Space; the switch animates.
        std::thread::sleep(self.settle);
        Self::capture_primary(path)
    }
}
