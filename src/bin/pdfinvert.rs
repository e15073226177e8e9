//! CLI binary for pdf-invert.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `InversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_invert::{
    default_output_path, invert, plan, InversionConfig, InversionProgressCallback, PageRange,
    ProgressCallback,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar counting pages, advanced a whole
/// chunk at a time as chunks complete (in any order).
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` tells us the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn activate_bar(&self, total_pages: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Inverting");
        self.bar.reset_eta();
    }
}

impl InversionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize, total_chunks: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Inverting {total_pages} pages in {total_chunks} chunks…"
            ))
        ));
    }

    fn on_chunk_complete(&self, range: PageRange, completed: usize, total: usize) {
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}",
            green("✓"),
            completed,
            total,
            dim(&range.to_string()),
        ));
        self.bar.inc(range.len() as u64);
    }

    fn on_chunk_error(&self, range: PageRange, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {}  {}", red("✗"), range, red(&msg)));
        self.bar.abandon_with_message("aborted");
    }

    fn on_merge_start(&self, total_chunks: usize) {
        self.bar.set_prefix("Merging");
        self.bar.set_message(format!("{total_chunks} chunks"));
    }

    fn on_run_complete(&self, total_pages: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages inverted",
            green("✔"),
            bold(&total_pages.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Invert into report_inverted.pdf next to the input
  pdfinvert report.pdf

  # Choose the output path
  pdfinvert report.pdf dark/report.pdf

  # Eight workers, fixed 25-page chunks
  pdfinvert -j 8 --chunk-size 25 book.pdf

  # Show the chunk plan without converting anything
  pdfinvert --dry-run book.pdf

  # Machine-readable result
  pdfinvert --json --no-progress report.pdf > result.json

CHUNKING:
  Without --chunk-size, pages per chunk follow the document size:
    more than 1000 pages  10 pages per chunk
    more than 500 pages   15 pages per chunk
    otherwise             20 pages per chunk
  At most --concurrency chunks are processed at once.

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to an existing libpdfium, or the directory holding it
  PDFINVERT_*             Every option can also be set as PDFINVERT_<NAME>
  RUST_LOG                Overrides the log filter (e.g. pdf_invert=debug)
"#;

/// Invert the colours of every page of a PDF.
#[derive(Parser, Debug)]
#[command(
    name = "pdfinvert",
    version,
    about = "Invert the colours of every page of a PDF",
    long_about = "Invert the colours of every page of a PDF. Pages are rasterised in parallel \
chunks, every RGB channel is replaced by 255 minus its value, and the chunks are merged back \
into one document with the original page order and page sizes.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Source PDF.
    input: PathBuf,

    /// Destination PDF. Default: <input stem>_inverted.pdf next to the input.
    output: Option<PathBuf>,

    /// Number of chunks processed at once.
    #[arg(short = 'j', long, env = "PDFINVERT_CONCURRENCY", default_value_t = 4,
          value_parser = clap::value_parser!(u32).range(1..))]
    concurrency: u32,

    /// Pages per chunk. Default: 10, 15 or 20 depending on document size.
    #[arg(long, env = "PDFINVERT_CHUNK_SIZE",
          value_parser = clap::value_parser!(u32).range(1..))]
    chunk_size: Option<u32>,

    /// Rasterisation scale relative to the page size in points (0.5–10).
    #[arg(long, env = "PDFINVERT_SCALE", default_value_t = 3.0)]
    scale: f32,

    /// Cap on the longest rendered edge in pixels.
    #[arg(long, env = "PDFINVERT_MAX_PIXELS", default_value_t = 10_000)]
    max_pixels: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDFINVERT_PASSWORD")]
    password: Option<String>,

    /// Directory for the temporary chunk files. Default: the system temp dir.
    #[arg(long, env = "PDFINVERT_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Path to the pdfium shared library, or the directory holding it.
    #[arg(long, env = "PDFINVERT_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Skip pruning and stream compression of the output.
    #[arg(long, env = "PDFINVERT_NO_COMPACT")]
    no_compact: bool,

    /// Interrupt running chunks as soon as one chunk fails.
    #[arg(long, env = "PDFINVERT_FAIL_FAST")]
    fail_fast: bool,

    /// Print the chunk plan as JSON and exit.
    #[arg(long)]
    dry_run: bool,

    /// Print the run result as JSON.
    #[arg(long, env = "PDFINVERT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFINVERT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFINVERT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFINVERT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            use clap::error::ErrorKind;
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.dry_run;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn InversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Dry run ──────────────────────────────────────────────────────────
    if cli.dry_run {
        let plan = plan(&cli.input, &config)
            .await
            .context("Failed to plan inversion")?;
        println!(
            "{}",
            serde_json::to_string_pretty(&plan).context("Failed to serialise plan")?
        );
        return Ok(());
    }

    // ── Run inversion ────────────────────────────────────────────────────
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));

    let output = invert(&cli.input, &output_path, &config)
        .await
        .context("Inversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!(
            "{}  {} pages  {} chunks × {}  {}ms  →  {}",
            green("✔"),
            output.page_count,
            output.stats.chunks,
            output.stats.chunk_size,
            output.stats.total_duration_ms,
            bold(&output.output_path.display().to_string()),
        );
        eprintln!(
            "   {} workers  /  {} bytes written",
            dim(&output.stats.workers.to_string()),
            dim(&output.stats.output_bytes.to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `InversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<InversionConfig> {
    let mut builder = InversionConfig::builder()
        .concurrency(cli.concurrency as usize)
        .render_scale(cli.scale)
        .max_rendered_pixels(cli.max_pixels)
        .compact(!cli.no_compact)
        .fail_fast(cli.fail_fast);

    if let Some(n) = cli.chunk_size {
        builder = builder.chunk_size(n as usize);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref dir) = cli.work_dir {
        builder = builder.work_dir(dir.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library(lib.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
