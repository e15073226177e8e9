//! # pdf-invert
//!
//! Invert the colours of every page of a PDF, in parallel.
//!
//! Pages are rasterised, each pixel's RGB channels are replaced by
//! `255 - value`, and the inverted rasters are written back as a new PDF
//! with the same page count, order and page sizes. The output is image-only:
//! text and vector content are not preserved as such.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Plan     page count → contiguous page ranges (10/15/20 pages each)
//!  ├─ 2. Pool     up to N workers, dispatched in plan order
//!  ├─ 3. Worker   render → invert → one artifact PDF per range
//!  ├─ 4. Merge    artifacts sorted by range start → output (atomic rename)
//!  └─ 5. Cleanup  run namespace removed on success and on failure
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_invert::{invert, InversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = InversionConfig::builder().concurrency(8).build()?;
//!     let output = invert("scan.pdf", "scan_inverted.pdf", &config).await?;
//!     eprintln!(
//!         "{} pages in {} chunks, {}ms",
//!         output.page_count, output.stats.chunks, output.stats.total_duration_ms
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfinvert` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-invert = { version = "0.1", default-features = false }
//! ```
//!
//! ## pdfium
//!
//! Rasterisation uses the pdfium shared library, bound at run time. Point
//! [`InversionConfig::pdfium_library`] or `PDFIUM_LIB_PATH` at it, or install
//! it where the system loader finds it. Everything except the rasteriser is
//! reachable through [`PageSource`], so other renderers can be plugged in
//! with [`invert_with_source`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod plan;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{InversionConfig, InversionConfigBuilder};
pub use convert::{default_output_path, invert, invert_sync, invert_with_source, plan, plan_with_source};
pub use error::{InvertError, MergeIntegrityError, PlanError, TransformError};
pub use output::{InversionOutput, InversionStats};
pub use pipeline::render::{PageSink, PageSource, PdfiumSource, RasterPage};
pub use plan::{ChunkPlan, PageRange};
pub use progress::{InversionProgressCallback, NoopProgressCallback, ProgressCallback};
