//! Driving the reader application: foreground checks and page turns.
//!
//! The capture pipeline never talks to the operating system directly — it
//! goes through the [`AutomationDriver`] trait. Anything that can answer
//! "is the reader running / open / focused?" and press a page-turn key
//! satisfies it: the bundled [`ScriptDriver`] (macOS `osascript`), an
//! accessibility-API driver, or an in-memory double in tests.
//!
//! ## Foreground safety
//!
//! [`AutomationDriver::advance_page`] re-verifies that the target
//! application is frontmost *immediately before* sending the keystroke and
//! fails with the non-transient [`StepError::ForegroundLost`] otherwise. Simulated input
//! lands in whatever window has focus; a session that kept typing after the
//! user alt-tabbed away would be operating their mail client.

use crate::error::StepError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Command;
use tracing::debug;

/// Which simulated input empirically advances displayed content.
///
/// Resolved once per session by the direction probe; never recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// The "next page" input (right arrow in left-to-right books).
    Forward,
    /// The "previous page" input, which advances right-to-left books.
    Reverse,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Reverse => write!(f, "reverse"),
        }
    }
}

/// Interaction with the reader application.
///
/// Implementations must be cheap to call repeatedly; every method is invoked
/// from `spawn_blocking` and wrapped in the retry policy by the pipeline.
pub trait AutomationDriver: Send + Sync {
    /// Whether the target application process exists.
    fn is_target_running(&self) -> Result<bool, StepError>;

    /// Whether the target has a content window open.
    fn is_content_open(&self) -> Result<bool, StepError>;

    /// Whether the target is the frontmost application.
    fn is_target_foreground(&self) -> Result<bool, StepError>;

    /// Send one page-turn input in `direction`.
    ///
    /// Must fail with [`StepError::ForegroundLost`] — and send nothing — if
    /// the target is not frontmost at the moment of the call.
    fn advance_page(&self, direction: Direction) -> Result<(), StepError>;
}

/// The reader application the session targets.
///
/// macOS applications have two names: the bundle name used to activate them
/// (`app_name`, e.g. "Amazon Kindle") and the process name System Events
/// reports (`process_name`, e.g. "Kindle"). Key codes are the hardware
/// codes System Events expects: 124 is the right arrow, 123 the left.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderApp {
    pub app_name: String,
    pub process_name: String,
    pub forward_key_code: u16,
    pub reverse_key_code: u16,
}

impl Default for ReaderApp {
    fn default() -> Self {
        Self {
            app_name: "Amazon Kindle".to_string(),
            process_name: "Kindle".to_string(),
            forward_key_code: 124,
            reverse_key_code: 123,
        }
    }
}

impl ReaderApp {
    fn key_code(&self, direction: Direction) -> u16 {
        match direction {
            Direction::Forward => self.forward_key_code,
            Direction::Reverse => self.reverse_key_code,
        }
    }
}

/// [`AutomationDriver`] backed by the macOS scripting bridge (`osascript`).
///
/// Each call shells out to `osascript` with a short System Events snippet.
/// Subprocess-per-call is slow compared to a native accessibility binding,
/// but page turns are separated by a multi-hundred-millisecond settle delay
/// anyway, so the bridge is never the bottleneck.
pub struct ScriptDriver {
    app: ReaderApp,
}

impl ScriptDriver {
    pub fn new(app: ReaderApp) -> Self {
        Self { app }
    }

    /// Bring the target application to the front.
    ///
    /// Used by the capturer's slow path once at session start. Full-screen
    /// applications live in their own Space; the switch animation is the
    /// caller's problem (it waits before capturing).
    pub fn activate(&self) -> Result<(), StepError> {
        let script = format!("tell application \"{}\" to activate", self.app.app_name);
        run_osascript(&script)?;
        Ok(())
    }
}

impl AutomationDriver for ScriptDriver {
    fn is_target_running(&self) -> Result<bool, StepError> {
        let script = format!(
            "tell application \"System Events\" to return exists application process \"{}\"",
            self.app.process_name
        );
        Ok(run_osascript(&script)?.trim() == "true")
    }

    fn is_content_open(&self) -> Result<bool, StepError> {
        // A reader with a book open always has at least one window.
        let script = format!(
            "tell application \"System Events\" to tell process \"{}\" to return (count of windows) > 0",
            self.app.process_name
        );
        Ok(run_osascript(&script)?.trim() == "true")
    }

    fn is_target_foreground(&self) -> Result<bool, StepError> {
        let script = format!(
            "tell application \"System Events\" to return name of first application process whose frontmost is true is \"{}\"",
            self.app.process_name
        );
        Ok(run_osascript(&script)?.trim() == "true")
    }

    fn advance_page(&self, direction: Direction) -> Result<(), StepError> {
        if !self.is_target_foreground()? {
            return Err(StepError::ForegroundLost);
        }

        let script = format!(
            "tell application \"System Events\" to tell process \"{}\" to key code {}",
            self.app.process_name,
            self.app.key_code(direction)
        );
        debug!(%direction, "sending page-turn key");
        run_osascript(&script)?;
        Ok(())
    }
}

/// Run an AppleScript snippet and return its stdout.
fn run_osascript(script: &str) -> Result<String, StepError> {
    let output = Command::new("osascript")
        .arg("-e")
        .arg(script)
        .output()
        .map_err(|e| StepError::Script {
            detail: format!("failed to launch osascript: {e}"),
        })?;

    if !output.status.success() {
        return Err(StepError::Script {
            detail: format!(
                "osascript exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_display() {
        assert_eq!(Direction::Forward.to_string(), "forward");
        assert_eq!(Direction::Reverse.to_string(), "reverse");
    }

    #[test]
    fn default_reader_is_kindle_with_arrow_keys() {
        let app = ReaderApp::default();
        assert_eq!(app.process_name, "Kindle");
        assert_eq!(app.key_code(Direction::Forward), 124);
        assert_eq!(app.key_code(Direction::Reverse), 123);
    }

    #[test]
    fn direction_serialises_round_trip() {
        let json = serde_json::to_string(&Direction::Forward).unwrap();
        let back: Direction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Direction::Forward);
    }
}
