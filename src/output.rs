//! Result types returned by a capture session.

use crate::automation::Direction;
use crate::pipeline::margins::TrimMargins;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything a finished session reports upward.
///
/// Serialisable so the CLI's `--json` mode can dump it verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    /// The assembled PDF (generate mode; `None` in margin-detection mode).
    pub output_path: Option<PathBuf>,

    /// Pages in the final output, after end-detection dropped the static
    /// trailing captures.
    pub page_count: usize,

    /// Captured page files in final order. The session-scoped temporary
    /// directory is removed when the session ends, so these paths document
    /// the capture order rather than surviving files.
    pub pages: Vec<PathBuf>,

    /// The resolved page-turn direction.
    pub direction: Direction,

    /// Aggregated safe trim margins (margin-detection mode).
    pub margins: Option<TrimMargins>,

    /// Per-page margins backing the aggregate (margin-detection mode).
    pub per_page_margins: Vec<TrimMargins>,

    /// Non-fatal conditions encountered along the way: the page ceiling,
    /// per-page trim fallbacks, margin-measurement failures.
    pub warnings: Vec<String>,

    /// Timing and size statistics.
    pub stats: SessionStats,
}

/// Timing and size statistics for one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    /// Pages captured, including the ones end detection later dropped.
    pub captured_pages: usize,

    /// Pages in the final output.
    pub output_pages: usize,

    /// Wall-clock duration of the whole session.
    pub total_duration_ms: u64,

    /// Time spent in the direction probe.
    pub probe_duration_ms: u64,

    /// Time spent in the capture loop.
    pub capture_duration_ms: u64,

    /// Time spent trimming and assembling the PDF (generate mode).
    pub assemble_duration_ms: u64,

    /// Output file size in bytes (generate mode).
    pub output_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_serialises_to_json() {
        let result = SessionResult {
            output_path: Some(PathBuf::from("/tmp/book.pdf")),
            page_count: 3,
            pages: vec![PathBuf::from("page_0001.png")],
            direction: Direction::Forward,
            margins: Some(TrimMargins {
                top: 10,
                bottom: 10,
                left: 4,
                right: 4,
            }),
            per_page_margins: vec![],
            warnings: vec!["reached the page ceiling".into()],
            stats: SessionStats {
                captured_pages: 8,
                output_pages: 3,
                ..Default::default()
            },
        };

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"page_count\":3"));
        assert!(json.contains("Forward"));

        let back: SessionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.page_count, 3);
        assert_eq!(back.stats.captured_pages, 8);
    }
}
