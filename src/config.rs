//! Configuration types for PDF colour inversion.
//!
//! All run behaviour is controlled through [`InversionConfig`], built via its
//! [`InversionConfigBuilder`]. Every knob lives in one struct so a config can
//! be cloned into worker tasks, logged, and compared between runs.

use crate::error::InvertError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Default number of chunk workers running at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default rasterisation scale relative to the page's size in points (3× ≈ 216 DPI).
pub const DEFAULT_RENDER_SCALE: f32 = 3.0;

/// Suffix inserted before the extension of the default output path.
pub const OUTPUT_SUFFIX: &str = "_inverted";

/// Configuration for one inversion run.
///
/// Built via [`InversionConfig::builder()`] or using
/// [`InversionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_invert::InversionConfig;
///
/// let config = InversionConfig::builder()
///     .concurrency(8)
///     .chunk_size(25)
///     .render_scale(2.0)
///     .build()
///     .unwrap();
/// assert_eq!(config.chunk_size, Some(25));
/// ```
#[derive(Clone)]
pub struct InversionConfig {
    /// Number of chunk workers running at once. Default: 4.
    ///
    /// Each worker holds one chunk's rasters and its chunk document in
    /// memory, so peak memory grows linearly with this value.
    pub concurrency: usize,

    /// Pages per chunk. `None` selects the size-tier policy
    /// (see [`crate::plan::tiered_chunk_size`]).
    pub chunk_size: Option<usize>,

    /// Scale factor applied to the page size in points when rasterising.
    /// Range: 0.5–10. Default: 3.0.
    pub render_scale: f32,

    /// Cap on the longest rendered edge in pixels. Default: 10 000.
    ///
    /// Poster-sized pages at 3× would otherwise allocate hundreds of
    /// megabytes per raster.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Root directory for the run's temporary namespace.
    /// Default: the system temp directory.
    pub work_dir: Option<PathBuf>,

    /// Explicit path to the pdfium shared library.
    /// Falls back to `PDFIUM_LIB_PATH`, then `./`, then the system loader.
    pub pdfium_library: Option<PathBuf>,

    /// Prune unreferenced objects and compress streams when saving the
    /// merged output. Default: true.
    pub compact: bool,

    /// Stop in-flight workers at their next page boundary once any chunk
    /// fails. Default: false (in-flight workers finish, results discarded).
    pub fail_fast: bool,

    /// Receives per-chunk progress events from the coordinator.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for InversionConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            chunk_size: None,
            render_scale: DEFAULT_RENDER_SCALE,
            max_rendered_pixels: 10_000,
            password: None,
            work_dir: None,
            pdfium_library: None,
            compact: true,
            fail_fast: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for InversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InversionConfig")
            .field("concurrency", &self.concurrency)
            .field("chunk_size", &self.chunk_size)
            .field("render_scale", &self.render_scale)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("work_dir", &self.work_dir)
            .field("pdfium_library", &self.pdfium_library)
            .field("compact", &self.compact)
            .field("fail_fast", &self.fail_fast)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn InversionProgressCallback>"),
            )
            .finish()
    }
}

impl InversionConfig {
    /// Create a new builder for `InversionConfig`.
    pub fn builder() -> InversionConfigBuilder {
        InversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The directory under which run namespaces are created.
    pub fn work_root(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Builder for [`InversionConfig`].
#[derive(Debug)]
pub struct InversionConfigBuilder {
    config: InversionConfig,
}

impl InversionConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    /// Fix the chunk size instead of using the size tiers.
    pub fn chunk_size(mut self, n: usize) -> Self {
        self.config.chunk_size = Some(n);
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = Some(dir.into());
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn compact(mut self, v: bool) -> Self {
        self.config.compact = v;
        self
    }

    pub fn fail_fast(mut self, v: bool) -> Self {
        self.config.fail_fast = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<InversionConfig, InvertError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(InvertError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.chunk_size == Some(0) {
            return Err(InvertError::InvalidConfig("Chunk size must be ≥ 1".into()));
        }
        if !(0.5..=10.0).contains(&c.render_scale) {
            return Err(InvertError::InvalidConfig(format!(
                "Render scale must be 0.5–10, got {}",
                c.render_scale
            )));
        }
        Ok(self.config)
    }
}
