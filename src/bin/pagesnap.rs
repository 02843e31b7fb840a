//! CLI binary for pagesnap.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `CaptureConfig`, wires Ctrl-C into the cancellation token, and prints
//! results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pagesnap::{
    convert, platform_collaborators, CaptureConfig, CaptureProgressCallback, Direction, Notifier,
    PdfQuality, ProgressCallback, ReaderApp, SessionMode, SilentNotifier, SystemNotifier,
    TrimMargins,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: an open-ended spinner with a running page counter.
///
/// A percentage bar would be a lie — the session does not know the book's
/// length until end detection fires.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Checking the reader…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl CaptureProgressCallback for CliProgressCallback {
    fn on_probe_start(&self) {
        self.bar.set_prefix("Probing");
        self.bar.set_message("Detecting the page-turn direction…");
    }

    fn on_direction_resolved(&self, direction: Direction, probe_pages: usize) {
        self.bar.println(format!(
            "{} Direction: {}  {}",
            cyan("◆"),
            bold(&direction.to_string()),
            dim(&format!("({probe_pages} pages kept from the probe)")),
        ));
        self.bar.set_prefix("Capturing");
    }

    fn on_page_captured(&self, page_num: usize) {
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_end_detected(&self, kept_pages: usize, dropped_pages: usize) {
        self.bar.println(format!(
            "{} End of book detected  {}",
            cyan("◆"),
            dim(&format!("({kept_pages} pages kept, {dropped_pages} static screens dropped)")),
        ));
        self.bar.set_prefix("Finishing");
        self.bar.set_message("Assembling…");
    }

    fn on_session_complete(&self, output_pages: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages captured",
            green("✔"),
            bold(&output_pages.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Capture the open book into capture_<timestamp>.pdf
  pagesnap

  # Capture to a named file at medium quality
  pagesnap -o mybook.pdf --quality medium

  # First measure safe trim margins, then capture with them applied
  pagesnap --mode detect
  pagesnap --trim-top 120 --trim-bottom 80 --trim-left 40 --trim-right 40 -o mybook.pdf

  # Right-to-left book, direction known in advance (skips the probe)
  pagesnap --direction reverse -o manga.pdf

  # A slow machine needs more time per page turn
  pagesnap --page-delay 1200

  # Target a different reader application
  pagesnap --app "Apple Books" --process "Books"

  # Machine-readable session report
  pagesnap --json -o book.pdf > session.json

WORKFLOW:
  1. Open the book in the reader, page 1, full screen.
  2. Run pagesnap; keep the reader in the foreground for the whole session.
  3. The session ends on its own when the reader stops showing new pages.

  The page-turn direction is probed automatically by pressing arrow keys
  and watching whether the screen changes. If the reader loses focus the
  session aborts immediately — keystrokes are never sent at another
  application.

PERMISSIONS (macOS):
  Screen Recording  — System Settings > Privacy & Security, for capture
  Accessibility     — same place, for simulated key presses

ENVIRONMENT VARIABLES:
  PAGESNAP_OUTPUT       Output path (same as --output)
  PAGESNAP_QUALITY      Output quality (same as --quality)
  PAGESNAP_PAGE_DELAY   Per-page settle delay in ms (same as --page-delay)
  PAGESNAP_APP          Reader application name (same as --app)
"#;

/// Capture the book open in a desktop reader into a paginated PDF.
#[derive(Parser, Debug)]
#[command(
    name = "pagesnap",
    version,
    about = "Capture the book open in a desktop reader into a paginated PDF",
    long_about = "Convert the book currently displayed in a desktop reader application into a \
paginated PDF by repeatedly capturing the screen and pressing the page-turn key. The page-turn \
direction and the end of the book are detected automatically from pixel comparison.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Operation mode: generate a PDF, or detect safe trim margins.
    #[arg(long, value_enum, default_value = "generate")]
    mode: ModeArg,

    /// Write the PDF here instead of capture_<timestamp>.pdf.
    #[arg(short, long, env = "PAGESNAP_OUTPUT")]
    output: Option<PathBuf>,

    /// PDF quality: low, medium, high.
    #[arg(long, env = "PAGESNAP_QUALITY", value_enum, default_value = "high")]
    quality: QualityArg,

    /// Force the page-turn direction instead of probing for it.
    #[arg(long, value_enum)]
    direction: Option<DirectionArg>,

    /// Settle delay between page turn and capture, in milliseconds.
    #[arg(long, env = "PAGESNAP_PAGE_DELAY", default_value_t = 500)]
    page_delay: u64,

    /// Seconds to wait (with a countdown) before the session starts.
    #[arg(long, default_value_t = 3)]
    startup_delay: u64,

    /// Hard ceiling on captured pages.
    #[arg(long, default_value_t = 1000)]
    max_pages: u32,

    /// Trailing captures compared for end-of-book detection.
    #[arg(long, default_value_t = 5)]
    end_window: usize,

    /// Similarity every tail-window pair must exceed to end the session.
    #[arg(long, default_value_t = 0.995)]
    end_threshold: f64,

    /// Page-turn presses per direction while probing.
    #[arg(long, default_value_t = 3)]
    probe_presses: u32,

    /// Pixels to cut from the top of every page.
    #[arg(long, default_value_t = 0)]
    trim_top: u32,

    /// Pixels to cut from the bottom of every page.
    #[arg(long, default_value_t = 0)]
    trim_bottom: u32,

    /// Pixels to cut from the left of every page.
    #[arg(long, default_value_t = 0)]
    trim_left: u32,

    /// Pixels to cut from the right of every page.
    #[arg(long, default_value_t = 0)]
    trim_right: u32,

    /// Reader application name (used to activate it).
    #[arg(long, env = "PAGESNAP_APP", default_value = "Amazon Kindle")]
    app: String,

    /// Reader process name as reported by System Events.
    #[arg(long, env = "PAGESNAP_PROCESS", default_value = "Kindle")]
    process: String,

    /// Skip confirmation prompts (start immediately, overwrite output).
    #[arg(short = 'y', long)]
    yes: bool,

    /// Output the session report as JSON instead of a summary.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long)]
    no_progress: bool,

    /// Disable the completion sound.
    #[arg(long)]
    no_sound: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Generate,
    Detect,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum QualityArg {
    Low,
    Medium,
    High,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DirectionArg {
    Forward,
    Reverse,
}

impl From<ModeArg> for SessionMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Generate => SessionMode::Generate,
            ModeArg::Detect => SessionMode::DetectMargins,
        }
    }
}

impl From<QualityArg> for PdfQuality {
    fn from(v: QualityArg) -> Self {
        match v {
            QualityArg::Low => PdfQuality::Low,
            QualityArg::Medium => PdfQuality::Medium,
            QualityArg::High => PdfQuality::High,
        }
    }
}

impl From<DirectionArg> for Direction {
    fn from(v: DirectionArg) -> Self {
        match v {
            DirectionArg::Forward => Direction::Forward,
            DirectionArg::Reverse => Direction::Reverse,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active; the
    // spinner provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    // ── Preparation instructions & confirmation ──────────────────────────
    if !cli.quiet {
        eprintln!("{}", bold("=== pagesnap ==="));
        eprintln!();
        eprintln!("Please ensure:");
        eprintln!("  1. {} is running", cli.app);
        eprintln!("  2. The book is open on its first page");
        eprintln!("  3. {} is in the foreground (full screen works best)", cli.app);
        eprintln!();
    }

    if !cli.yes {
        eprint!("Press Enter when ready to begin…");
        io::stderr().flush().ok();
        let mut line = String::new();
        io::stdin().read_line(&mut line).ok();
    }

    if let Some(ref output) = cli.output {
        if output.exists() && !cli.yes && !confirm_overwrite(output)? {
            anyhow::bail!("cancelled: output file already exists");
        }
    }

    // ── Startup countdown ────────────────────────────────────────────────
    // Gives the user time to put the reader back in the foreground after
    // pressing Enter in the terminal.
    if cli.startup_delay > 0 {
        if cli.quiet {
            tokio::time::sleep(Duration::from_secs(cli.startup_delay)).await;
        } else {
            eprint!("Starting in ");
            for i in (1..=cli.startup_delay).rev() {
                eprint!("{i}…");
                io::stderr().flush().ok();
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            eprintln!(" go");
        }
    }

    // ── Cancellation: Ctrl-C cancels the session cooperatively ───────────
    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{} Cancelling…", cyan("◆"));
            ctrl_c_token.cancel();
        }
    });

    // ── Build config & collaborators ─────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn CaptureProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let (driver, capturer) = platform_collaborators(config.app.clone());

    let notifier: Box<dyn Notifier> = if cli.no_sound {
        Box::new(SilentNotifier)
    } else {
        Box::new(SystemNotifier)
    };

    // ── Run the session ──────────────────────────────────────────────────
    let result = match convert(driver, capturer, &config, &cancel).await {
        Ok(result) => result,
        Err(e) => {
            notifier.failure();
            eprintln!("{} {}", red("✘"), bold("Capture failed"));
            return Err(e).context("Capture session failed");
        }
    };
    notifier.success();

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialise session result")?
        );
        return Ok(());
    }

    if !cli.quiet {
        match config.mode {
            SessionMode::DetectMargins => print_margin_report(&result),
            SessionMode::Generate => print_generate_report(&result),
        }
        for warning in &result.warnings {
            eprintln!("{} {}", cyan("⚠"), warning);
        }
    }

    Ok(())
}

fn confirm_overwrite(path: &Path) -> Result<bool> {
    eprint!("{} already exists. Overwrite? [y/N] ", path.display());
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin().read_line(&mut line).context("Failed to read confirmation")?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

/// Map CLI args to `CaptureConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<CaptureConfig> {
    let mut builder = CaptureConfig::builder()
        .mode(cli.mode.into())
        .quality(cli.quality.into())
        .page_delay_ms(cli.page_delay)
        .max_pages(cli.max_pages)
        .end_window(cli.end_window)
        .end_threshold(cli.end_threshold)
        .probe_presses(cli.probe_presses)
        .app(ReaderApp {
            app_name: cli.app.clone(),
            process_name: cli.process.clone(),
            ..ReaderApp::default()
        });

    if let Some(direction) = cli.direction {
        builder = builder.direction(direction.into());
    }

    let trim = TrimMargins {
        top: cli.trim_top,
        bottom: cli.trim_bottom,
        left: cli.trim_left,
        right: cli.trim_right,
    };
    if !trim.is_zero() {
        builder = builder.custom_trim(trim);
    }

    if let Some(ref output) = cli.output {
        builder = builder.output(output.clone());
    }

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_margin_report(result: &pagesnap::SessionResult) {
    eprintln!();
    eprintln!("{}", bold("=== Margin Analysis ==="));
    eprintln!("Analysed {} pages", result.page_count);

    let Some(m) = result.margins else { return };
    eprintln!();
    eprintln!("Minimum removable margins (safe for all pages):");
    eprintln!("  Top:    {} px", m.top);
    eprintln!("  Bottom: {} px", m.bottom);
    eprintln!("  Left:   {} px", m.left);
    eprintln!("  Right:  {} px", m.right);
    eprintln!();
    eprintln!("To capture with these margins applied:");
    eprintln!(
        "  {}",
        bold(&format!(
            "pagesnap --trim-top {} --trim-bottom {} --trim-left {} --trim-right {}",
            m.top, m.bottom, m.left, m.right
        ))
    );
    eprintln!(
        "{}",
        dim(&format!(
            "Duration: {:.1}s",
            result.stats.total_duration_ms as f64 / 1000.0
        ))
    );
}

fn print_generate_report(result: &pagesnap::SessionResult) {
    eprintln!();
    eprintln!("{}", bold("=== Capture Complete ==="));
    if let Some(ref path) = result.output_path {
        eprintln!("Output:   {}", bold(&path.display().to_string()));
    }
    eprintln!("Pages:    {}", result.page_count);
    eprintln!(
        "Size:     {:.2} MB",
        result.stats.output_bytes as f64 / (1024.0 * 1024.0)
    );
    eprintln!(
        "Duration: {:.1}s  {}",
        result.stats.total_duration_ms as f64 / 1000.0,
        dim(&format!(
            "(probe {:.1}s, capture {:.1}s, assemble {:.1}s)",
            result.stats.probe_duration_ms as f64 / 1000.0,
            result.stats.capture_duration_ms as f64 / 1000.0,
            result.stats.assemble_duration_ms as f64 / 1000.0,
        ))
    );
}
