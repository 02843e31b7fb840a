//! # pagesnap
//!
//! Convert a book displayed in a desktop reader application into a
//! paginated PDF by automated screen capture.
//!
//! ## Why this crate?
//!
//! Plenty of reading applications display books they will never export.
//! This crate drives such an application from the outside: it captures the
//! screen, presses the page-turn key, and repeats — inferring everything it
//! needs (which key turns pages, when the book ends, how much border is
//! safe to cut) from pixel comparison alone, because an opaque GUI offers
//! no other ground truth than "did the picture change".
//!
//! ## Pipeline Overview
//!
//! ```text
//! reader app
//!  │
//!  ├─ 1. Preflight  running? book open? frontmost? output writable?
//!  ├─ 2. Probe      which input direction actually advances pages
//!  ├─ 3. Capture    screenshot → compare tail window → turn page → repeat
//!  ├─ 4. End        K near-identical trailing captures ⇒ book finished
//!  ├─ 5. Margins    measure/aggregate safe border trim (detect mode)
//!  └─ 6. Assemble   ordered captures → one PDF page per image
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagesnap::{convert, platform_collaborators, CaptureConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CaptureConfig::default();
//!     let (driver, capturer) = platform_collaborators(config.app.clone());
//!     let cancel = CancellationToken::new();
//!
//!     let result = convert(driver, capturer, &config, &cancel).await?;
//!     println!("{} pages → {:?}", result.page_count, result.output_path);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pagesnap` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pagesnap = { version = "0.3", default-features = false }
//! ```
//!
//! ## Safety model
//!
//! Simulated input goes wherever the focus is, so the automation layer
//! re-verifies that the reader is the frontmost application immediately
//! before every keystroke and aborts the session — without retrying — the
//! moment that stops being true. Cancellation (Ctrl-C) is observed at every
//! blocking point; temporary captures are removed on every exit path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod automation;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod screenshot;
pub mod sound;

mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use automation::{AutomationDriver, Direction, ReaderApp, ScriptDriver};
pub use config::{CaptureConfig, CaptureConfigBuilder, PdfQuality, SessionMode};
pub use convert::{convert, platform_collaborators};
pub use error::{SessionError, StepError};
pub use output::{SessionResult, SessionStats};
pub use pipeline::margins::TrimMargins;
pub use progress::{CaptureProgressCallback, NoopProgressCallback, ProgressCallback};
pub use retry::RetryConfig;
pub use screenshot::{Capturer, ScreenCapturer};
pub use sound::{Notifier, SilentNotifier, SystemNotifier};
