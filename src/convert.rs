//! Run entry points: plan, dispatch, merge and clean up one inversion.
//!
//! A run goes through its stages strictly in sequence:
//!
//! 1. validate the input and count its pages;
//! 2. plan the chunk ranges (nothing is created on disk before this succeeds);
//! 3. create the run namespace;
//! 4. run the worker pool;
//! 5. merge the artifacts into the output;
//! 6. remove the namespace.
//!
//! The namespace is owned by a [`Workspace`] guard, so step 6 also happens
//! when any earlier step returns an error.

use crate::config::{InversionConfig, OUTPUT_SUFFIX};
use crate::error::InvertError;
use crate::output::{InversionOutput, InversionStats};
use crate::pipeline::input;
use crate::pipeline::merge::merge_artifacts;
use crate::pipeline::pool::WorkerPool;
use crate::pipeline::render::{PageSource, PdfiumSource};
use crate::pipeline::worker::ChunkJob;
use crate::pipeline::workspace::Workspace;
use crate::plan::ChunkPlan;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Invert every page of `input` and write the result to `output`.
///
/// This is the primary entry point for the library. Pages are rasterised
/// with pdfium (see [`InversionConfig::pdfium_library`]).
///
/// # Errors
/// Any failure is fatal and leaves no output file and no temporary files
/// behind. An existing file at `output` is replaced only on success.
pub async fn invert(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &InversionConfig,
) -> Result<InversionOutput, InvertError> {
    let source: Arc<dyn PageSource> = Arc::new(PdfiumSource::from_config(config));
    invert_with_source(source, input, output, config).await
}

/// Like [`invert`], reading pages through `source` instead of pdfium.
pub async fn invert_with_source(
    source: Arc<dyn PageSource>,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &InversionConfig,
) -> Result<InversionOutput, InvertError> {
    let total_start = Instant::now();
    let output = output.as_ref().to_path_buf();

    // ── Step 1-2: Validate and plan ──────────────────────────────────────
    let (input, plan) = plan_run(&source, input.as_ref(), config).await?;
    reject_in_place(&input, &output)?;
    info!(
        "Inverting {} ({} pages) in {} chunks of {} with {} workers",
        input.display(),
        plan.total_pages,
        plan.len(),
        plan.chunk_size,
        plan.workers
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(plan.total_pages, plan.len());
    }

    // ── Step 3: Run namespace ────────────────────────────────────────────
    let workspace = Workspace::create(&config.work_root(), &input)?;

    // ── Step 4: Chunk workers ────────────────────────────────────────────
    let jobs: Vec<ChunkJob> = plan
        .ranges
        .iter()
        .map(|&range| ChunkJob {
            range,
            source: input.clone(),
            artifact: workspace.artifact_path(range),
        })
        .collect();

    let transform_start = Instant::now();
    let artifacts = WorkerPool::new(plan.workers)
        .fail_fast(config.fail_fast)
        .progress(config.progress_callback.clone())
        .run(jobs, source)
        .await?;
    let transform_duration_ms = transform_start.elapsed().as_millis() as u64;
    info!(
        "Transformed {} chunks in {}ms",
        artifacts.len(),
        transform_duration_ms
    );

    // ── Step 5: Merge ────────────────────────────────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_merge_start(plan.len());
    }
    let merge_start = Instant::now();
    let summary = {
        let plan = plan.clone();
        let output = output.clone();
        let compact = config.compact;
        tokio::task::spawn_blocking(move || merge_artifacts(&plan, artifacts, &output, compact))
            .await
            .map_err(|e| InvertError::Internal(format!("Merge task panicked: {}", e)))??
    };
    let merge_duration_ms = merge_start.elapsed().as_millis() as u64;

    // ── Step 6: Cleanup ──────────────────────────────────────────────────
    let report = workspace.cleanup();
    if !report.warnings.is_empty() {
        warn!("Cleanup finished with {} warnings", report.warnings.len());
    }
    drop(workspace);

    let stats = InversionStats {
        total_pages: plan.total_pages,
        chunks: plan.len(),
        chunk_size: plan.chunk_size,
        workers: plan.workers,
        transform_duration_ms,
        merge_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        output_bytes: summary.output_bytes,
    };

    info!(
        "Inversion complete: {} pages → {} ({} bytes, {}ms total)",
        summary.pages,
        output.display(),
        stats.output_bytes,
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(summary.pages);
    }

    Ok(InversionOutput {
        output_path: output,
        page_count: summary.pages,
        manifest: summary.manifest,
        stats,
    })
}

/// Blocking wrapper around [`invert`].
///
/// Creates its own tokio runtime, so it must not be called from inside one.
pub fn invert_sync(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &InversionConfig,
) -> Result<InversionOutput, InvertError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| InvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(invert(input, output, config))
}

/// Compute the chunk plan for `input` without transforming anything.
///
/// No namespace is created and no worker is started.
pub async fn plan(input: impl AsRef<Path>, config: &InversionConfig) -> Result<ChunkPlan, InvertError> {
    let source: Arc<dyn PageSource> = Arc::new(PdfiumSource::from_config(config));
    plan_with_source(source, input, config).await
}

/// Like [`plan`], reading the page count through `source`.
pub async fn plan_with_source(
    source: Arc<dyn PageSource>,
    input: impl AsRef<Path>,
    config: &InversionConfig,
) -> Result<ChunkPlan, InvertError> {
    plan_run(&source, input.as_ref(), config)
        .await
        .map(|(_, plan)| plan)
}

/// `<dir>/<stem>_inverted.pdf` next to `input`.
pub fn default_output_path(input: impl AsRef<Path>) -> PathBuf {
    let input = input.as_ref();
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    input.with_file_name(format!("{stem}{OUTPUT_SUFFIX}.pdf"))
}

async fn plan_run(
    source: &Arc<dyn PageSource>,
    input: &Path,
    config: &InversionConfig,
) -> Result<(PathBuf, ChunkPlan), InvertError> {
    let input = input::validate_input(input)?;

    // pdfium loads the whole document to count pages; keep it off the reactor.
    let total_pages = {
        let source = Arc::clone(source);
        let path = input.clone();
        tokio::task::spawn_blocking(move || source.page_count(&path))
            .await
            .map_err(|e| InvertError::Internal(format!("Page count task panicked: {}", e)))??
    };
    debug!("Source has {} pages", total_pages);

    let plan = ChunkPlan::new(total_pages, config.concurrency, config.chunk_size)?;
    Ok((input, plan))
}

fn reject_in_place(input: &Path, output: &Path) -> Result<(), InvertError> {
    let same = match (input.canonicalize(), output.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    if same {
        return Err(InvertError::InvalidConfig(format!(
            "Output '{}' would overwrite the input",
            output.display()
        )));
    }
    Ok(())
}
