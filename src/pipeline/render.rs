//! PDF rasterisation: render page ranges to RGB images via pdfium.
//!
//! The rest of the pipeline talks to the rasteriser through [`PageSource`],
//! which lets the coordinator and merger be exercised against documents that
//! do not need pdfium at all.
//!
//! ## Binding per call
//!
//! [`PdfiumSource`] holds only configuration. pdfium itself is not thread
//! safe: with the `thread_safe` feature of `pdfium-render`, a `Pdfium`
//! instance holds a process-wide lock from the moment it is bound until it is
//! dropped. Each call therefore binds pdfium and loads its own document
//! handle, and nothing pdfium-related ever crosses a thread.
//!
//! Because the binding is exclusive, rasterisation is serialised across
//! workers. [`PdfiumSource::render_range`] keeps the lock only while it
//! rasterises a batch of [`RENDER_BATCH`] pages, then releases it before
//! handing the rasters to the sink. Inversion, compression and persistence
//! of one worker's batch run while another worker holds the rasteriser.
//!
//! ## Why cap pixels as well as scale?
//!
//! Page sizes vary wildly: an A0 poster at 3× would produce a
//! 7,000 × 10,000 px raster. `max_rendered_pixels` caps the longest edge
//! regardless of physical size, keeping per-worker memory bounded.

use crate::config::InversionConfig;
use crate::error::{InvertError, TransformError};
use crate::plan::PageRange;
use image::RgbImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One rasterised page plus the physical size of the page it came from.
#[derive(Debug, Clone)]
pub struct RasterPage {
    /// Zero-based index of the page in the source document.
    pub index: usize,
    pub image: RgbImage,
    /// Source page width in PDF points.
    pub width_pt: f32,
    /// Source page height in PDF points.
    pub height_pt: f32,
}

/// Receives each rendered page of a range, in ascending page order.
pub type PageSink<'a> = dyn FnMut(RasterPage) -> Result<(), TransformError> + 'a;

/// Read side of the pipeline: page counts and rasterised pages.
///
/// Implementations must tolerate concurrent calls from several worker
/// threads, each of which opens its own view of the document.
pub trait PageSource: Send + Sync {
    /// Number of pages in the document at `path`.
    fn page_count(&self, path: &Path) -> Result<usize, InvertError>;

    /// Rasterise `range` of the document at `path`, handing each page to
    /// `sink` in ascending order. Stops at the first error from either side.
    fn render_range(
        &self,
        path: &Path,
        range: PageRange,
        sink: &mut PageSink<'_>,
    ) -> Result<(), TransformError>;
}

/// Pages rasterised per pdfium binding before the lock is released.
pub const RENDER_BATCH: usize = 4;

/// Production [`PageSource`] backed by pdfium.
#[derive(Clone)]
pub struct PdfiumSource {
    library: Option<PathBuf>,
    password: Option<String>,
    scale: f32,
    max_pixels: u32,
}

impl std::fmt::Debug for PdfiumSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfiumSource")
            .field("library", &self.library)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("scale", &self.scale)
            .field("max_pixels", &self.max_pixels)
            .finish()
    }
}

impl PdfiumSource {
    pub fn from_config(config: &InversionConfig) -> Self {
        Self {
            library: config.pdfium_library.clone(),
            password: config.password.clone(),
            scale: config.render_scale,
            max_pixels: config.max_rendered_pixels,
        }
    }

    /// Bind pdfium, open `path` and rasterise `batch`. The binding, and with
    /// it the pdfium lock, is released when this returns.
    fn render_batch(&self, path: &Path, batch: PageRange) -> Result<Vec<RasterPage>, TransformError> {
        let open_failed = |detail: String| TransformError::OpenFailed {
            path: path.to_path_buf(),
            detail,
        };

        let pdfium = bind_pdfium(self.library.as_deref()).map_err(|e| open_failed(e.to_string()))?;
        let document = pdfium
            .load_pdf_from_file(path, self.password.as_deref())
            .map_err(|e| open_failed(format!("{:?}", e)))?;

        let pages = document.pages();
        let render_config = self.render_config();
        let mut rendered = Vec::with_capacity(batch.len());

        for idx in batch.pages() {
            let render_failed = |detail: String| TransformError::RenderFailed {
                page: idx + 1,
                detail,
            };

            let page = pages
                .get(page_index(idx)?)
                .map_err(|e| render_failed(format!("{:?}", e)))?;
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| render_failed(format!("{:?}", e)))?;

            let image = bitmap.as_image().to_rgb8();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );

            rendered.push(RasterPage {
                index: idx,
                image,
                width_pt: page.width().value,
                height_pt: page.height().value,
            });
        }

        Ok(rendered)
    }

    fn render_config(&self) -> PdfRenderConfig {
        PdfRenderConfig::new()
            .scale_page_by_factor(self.scale)
            .set_maximum_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32)
    }
}

impl PageSource for PdfiumSource {
    fn page_count(&self, path: &Path) -> Result<usize, InvertError> {
        let pdfium = bind_pdfium(self.library.as_deref())?;
        let document = pdfium
            .load_pdf_from_file(path, self.password.as_deref())
            .map_err(|e| classify_load_error(path, self.password.is_some(), e))?;

        let total = document.pages().len() as usize;
        info!("PDF loaded: {} pages", total);
        Ok(total)
    }

    fn render_range(
        &self,
        path: &Path,
        range: PageRange,
        sink: &mut PageSink<'_>,
    ) -> Result<(), TransformError> {
        for batch in batches(range, RENDER_BATCH) {
            for page in self.render_batch(path, batch)? {
                sink(page)?;
            }
        }
        Ok(())
    }
}

/// Split `range` into consecutive sub-ranges of at most `size` pages.
fn batches(range: PageRange, size: usize) -> impl Iterator<Item = PageRange> {
    let size = size.max(1);
    range
        .pages()
        .step_by(size)
        .map(move |start| PageRange::new(start, (start + size).min(range.end)))
}

/// pdfium addresses pages with a `u16`.
fn page_index(idx: usize) -> Result<u16, TransformError> {
    u16::try_from(idx).map_err(|_| TransformError::RenderFailed {
        page: idx + 1,
        detail: format!("page index exceeds pdfium's limit of {}", u16::MAX),
    })
}

/// Bind to a pdfium shared library.
///
/// Resolution order: explicit path, `PDFIUM_LIB_PATH`, the working
/// directory, then the system loader. A directory is searched for the
/// platform's library file name.
pub fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, InvertError> {
    let from_env = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from);

    let bindings = match explicit.map(Path::to_path_buf).or(from_env) {
        Some(path) => {
            let path = library_file(&path);
            Pdfium::bind_to_library(&path).map_err(|e| {
                InvertError::PdfiumBindingFailed(format!("{}: {}", path.display(), e))
            })?
        }
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| InvertError::PdfiumBindingFailed(e.to_string()))?,
    };

    Ok(Pdfium::new(bindings))
}

fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

fn classify_load_error(path: &Path, had_password: bool, e: PdfiumError) -> InvertError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if had_password {
            InvertError::WrongPassword {
                path: path.to_path_buf(),
            }
        } else {
            InvertError::PasswordRequired {
                path: path.to_path_buf(),
            }
        }
    } else {
        InvertError::CorruptPdf {
            path: path.to_path_buf(),
            detail: err_str,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_takes_render_settings_from_config() {
        let config = InversionConfig::builder()
            .render_scale(2.0)
            .max_rendered_pixels(4000)
            .password("secret")
            .build()
            .unwrap();
        let source = PdfiumSource::from_config(&config);
        assert_eq!(source.scale, 2.0);
        assert_eq!(source.max_pixels, 4000);
        assert_eq!(source.password.as_deref(), Some("secret"));
    }

    #[test]
    fn source_is_shareable_across_workers() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PdfiumSource>();

        let source = PdfiumSource::from_config(&InversionConfig::builder().password("pw").build().unwrap());
        assert!(!format!("{source:?}").contains("\"pw\""));
        let _shared: std::sync::Arc<dyn PageSource> = std::sync::Arc::new(source);
    }

    #[test]
    fn ranges_are_rendered_in_small_ascending_batches() {
        let got: Vec<PageRange> = batches(PageRange::new(20, 30), 4).collect();
        assert_eq!(
            got,
            vec![
                PageRange::new(20, 24),
                PageRange::new(24, 28),
                PageRange::new(28, 30)
            ]
        );
        assert_eq!(batches(PageRange::new(5, 6), 4).count(), 1);
    }

    #[test]
    fn page_index_rejects_values_pdfium_cannot_address() {
        assert_eq!(page_index(0).unwrap(), 0);
        assert_eq!(page_index(65_535).unwrap(), 65_535);
        let err = page_index(65_536).unwrap_err();
        assert!(matches!(err, TransformError::RenderFailed { page: 65_537, .. }));
    }

    #[test]
    fn library_directory_resolves_to_platform_file_name() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            library_file(dir.path()),
            dir.path().join(Pdfium::pdfium_platform_library_name())
        );
        let file = Path::new("/opt/pdfium/lib/libpdfium.so");
        assert_eq!(library_file(file), file.to_path_buf());
    }

    #[test]
    fn library_directory_without_pdfium_fails_to_bind() {
        let dir = tempfile::tempdir().unwrap();
        let err = bind_pdfium(Some(dir.path())).unwrap_err();
        assert!(matches!(err, InvertError::PdfiumBindingFailed(_)));
    }

    #[test]
    fn missing_explicit_library_fails_to_bind() {
        let err = bind_pdfium(Some(Path::new("/nonexistent/libpdfium.so"))).unwrap_err();
        assert!(matches!(err, InvertError::PdfiumBindingFailed(_)));
    }
}
