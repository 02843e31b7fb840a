//! Error types for the pagesnap library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`SessionError`] — **Fatal**: the capture session cannot proceed at all
//!   (reader app not running, direction undetectable, retries exhausted,
//!   output location unwritable). Returned as `Err(SessionError)` from the
//!   top-level `convert*` functions.
//!
//! * [`StepError`] — **Collaborator-level**: a single automation or capture
//!   call failed. Produced by [`crate::automation::AutomationDriver`] and
//!   [`crate::screenshot::Capturer`] implementations, consumed by the retry
//!   layer, and carried inside [`SessionError::RetriesExhausted`] once
//!   retries run out.
//!
//! The separation is what lets retry classification be *typed* rather than
//! string-matched: every `StepError` variant knows whether it is transient
//! ([`StepError::is_transient`]). A lost-foreground error aborts retrying
//! immediately — sending keystrokes at whatever application stole focus is
//! never acceptable — while a flaky screenshot call gets its backoff.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pagesnap library.
///
/// Collaborator-level failures use [`StepError`] and reach this enum only
/// after the retry policy has given up on them.
#[derive(Debug, Error)]
pub enum SessionError {
    // ── Precondition errors ──────────────────────────────────────────────
    /// The reader application is not running at all.
    #[error(
        "The reader application '{app}' is not running.\nStart it, open the book, and try again."
    )]
    ReaderNotRunning { app: String },

    /// The reader is running but no book/content window is open.
    #[error("No content is open in '{app}'.\nOpen the book you want to capture and try again.")]
    NoContentOpen { app: String },

    /// The reader is running but another application holds the foreground.
    #[error(
        "'{app}' is not the foreground application.\nBring it to the front (full screen works best) and try again."
    )]
    ReaderNotForeground { app: String },

    /// Foreground was lost mid-session. Input must not be sent at whatever
    /// application took focus, so the session aborts.
    #[error(
        "Lost foreground focus during '{operation}' — aborting so no input reaches another application."
    )]
    ForegroundLost { operation: String },

    // ── Detection errors ─────────────────────────────────────────────────
    /// Neither forward nor reverse input changed the displayed content.
    #[error(
        "Could not detect the page-turn direction: neither forward nor reverse input changed the screen.\n\
         The reader is probably not responding to simulated input.\n\
         Check that the window is focused and that the terminal has input-automation permission."
    )]
    DirectionUndetectable,

    // ── Transient-exhaustion errors ──────────────────────────────────────
    /// An operation kept failing until the retry budget ran out.
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: StepError,
    },

    // ── Resource errors ──────────────────────────────────────────────────
    /// The output location cannot be written. Checked before any page is
    /// captured so no session work is wasted.
    #[error("Cannot write output to '{path}': {source}\nCheck the directory exists and is writable.")]
    OutputUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The session-scoped temporary directory could not be created.
    #[error("Failed to create the session temporary directory: {source}")]
    TempDir {
        #[source]
        source: std::io::Error,
    },

    // ── Assembly errors ──────────────────────────────────────────────────
    /// A captured page could not be read back for PDF assembly or trimming.
    #[error("Failed to read captured page '{path}': {detail}")]
    PageUnreadable { path: PathBuf, detail: String },

    /// PDF assembly failed.
    #[error("Failed to assemble PDF '{path}': {detail}")]
    AssemblyFailed { path: PathBuf, detail: String },

    // ── Config errors ────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Cancellation ─────────────────────────────────────────────────────
    /// The session was cancelled from outside (Ctrl-C or a caller-held
    /// token). Not an application defect; temporary files are cleaned up.
    #[error("Capture session cancelled")]
    Cancelled,

    // ── Catch-all ────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A single automation or capture call failure.
///
/// Returned by [`crate::automation::AutomationDriver`] and
/// [`crate::screenshot::Capturer`] methods. The retry layer consults
/// [`StepError::is_transient`] to decide between backing off and aborting.
#[derive(Debug, Error)]
pub enum StepError {
    /// The scripting bridge (osascript) failed or returned garbage.
    #[error("scripting bridge failed: {detail}")]
    Script { detail: String },

    /// Screen capture failed.
    #[error("screen capture failed: {detail}")]
    Capture { detail: String },

    /// Filesystem-level failure while writing a capture.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The target application lost foreground focus. Never retried: input
    /// would land in a different, unintended application.
    #[error("target application is no longer in the foreground")]
    ForegroundLost,

    /// The target application is gone entirely.
    #[error("target application is not running")]
    TargetNotRunning,
}

impl StepError {
    /// Whether the retry policy may try this operation again.
    ///
    /// Script, capture, and I/O hiccups are worth a backoff; a lost
    /// foreground or a vanished target is a hard precondition violation.
    pub fn is_transient(&self) -> bool {
        match self {
            StepError::Script { .. } | StepError::Capture { .. } | StepError::Io(_) => true,
            StepError::ForegroundLost | StepError::TargetNotRunning => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_messages_name_the_missing_precondition() {
        let e = SessionError::ReaderNotRunning {
            app: "Amazon Kindle".into(),
        };
        assert!(e.to_string().contains("Amazon Kindle"));
        assert!(e.to_string().contains("not running"));

        let e = SessionError::NoContentOpen {
            app: "Amazon Kindle".into(),
        };
        assert!(e.to_string().contains("No content is open"));

        let e = SessionError::ReaderNotForeground {
            app: "Amazon Kindle".into(),
        };
        assert!(e.to_string().contains("foreground"));
    }

    #[test]
    fn retries_exhausted_carries_operation_and_count() {
        let e = SessionError::RetriesExhausted {
            operation: "capture page 7".into(),
            attempts: 3,
            source: StepError::Capture {
                detail: "no display".into(),
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("capture page 7"), "got: {msg}");
        assert!(msg.contains("3 attempts"), "got: {msg}");
    }

    #[test]
    fn transient_classification() {
        assert!(StepError::Script { detail: "x".into() }.is_transient());
        assert!(StepError::Capture { detail: "x".into() }.is_transient());
        assert!(!StepError::ForegroundLost.is_transient());
        assert!(!StepError::TargetNotRunning.is_transient());
    }

    #[test]
    fn cancellation_is_distinguishable() {
        assert!(matches!(SessionError::Cancelled, SessionError::Cancelled));
        assert_eq!(SessionError::Cancelled.to_string(), "Capture session cancelled");
    }
}
