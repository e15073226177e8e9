//! Worker pool: run chunk jobs with bounded concurrency.
//!
//! ## Dispatch
//!
//! Jobs are started strictly in plan order. At most `concurrency` of them run
//! at once, and a new one is started each time one finishes, so a slow chunk
//! never holds up the others. Completions arrive in whatever order the
//! workers finish; the pool collects them as they come and leaves ordering
//! to the merger.
//!
//! ## Failure
//!
//! The first failed job stops dispatch. Jobs already running are awaited to
//! completion, never aborted mid-write, and their results are discarded.
//! With `fail_fast` set, a shared flag also asks running workers to stop at
//! their next page boundary.

use super::render::PageSource;
use super::worker::{run_chunk, ChunkArtifact, ChunkJob};
use crate::error::{InvertError, TransformError};
use crate::plan::PageRange;
use crate::progress::ProgressCallback;
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

/// Bounded pool of blocking chunk workers driven by one async coordinator.
pub struct WorkerPool {
    concurrency: usize,
    fail_fast: bool,
    progress: Option<ProgressCallback>,
}

type Completion = (PageRange, Result<Result<ChunkArtifact, TransformError>, JoinError>);

impl WorkerPool {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            fail_fast: false,
            progress: None,
        }
    }

    pub fn fail_fast(mut self, v: bool) -> Self {
        self.fail_fast = v;
        self
    }

    pub fn progress(mut self, cb: Option<ProgressCallback>) -> Self {
        self.progress = cb;
        self
    }

    /// Run every job and return the artifacts in completion order.
    ///
    /// Returns the first failure if any job fails. Artifacts written by jobs
    /// that were still running at that point are left on disk for the
    /// workspace cleanup to remove.
    pub async fn run(
        &self,
        jobs: Vec<ChunkJob>,
        source: Arc<dyn PageSource>,
    ) -> Result<Vec<ChunkArtifact>, InvertError> {
        let total = jobs.len();
        let cancel = Arc::new(AtomicBool::new(false));
        let mut pending = jobs.into_iter();
        let mut in_flight = FuturesUnordered::new();

        for job in pending.by_ref().take(self.concurrency) {
            in_flight.push(dispatch(job, Arc::clone(&source), Arc::clone(&cancel)));
        }

        let mut artifacts = Vec::with_capacity(total);
        let mut failure: Option<InvertError> = None;

        while let Some((range, outcome)) = in_flight.next().await {
            let outcome = match outcome {
                Ok(Ok(artifact)) => Ok(artifact),
                Ok(Err(source)) => Err(InvertError::ChunkFailed { range, source }),
                Err(join) => Err(InvertError::WorkerPanicked {
                    range,
                    detail: join.to_string(),
                }),
            };

            match outcome {
                Ok(artifact) if failure.is_none() => {
                    artifacts.push(artifact);
                    debug!(%range, completed = artifacts.len(), total, "Chunk complete");
                    if let Some(ref cb) = self.progress {
                        cb.on_chunk_complete(range, artifacts.len(), total);
                    }
                }
                Ok(_) => debug!(%range, "Discarding chunk finished after failure"),
                Err(e) if failure.is_none() => {
                    warn!(%range, "Chunk failed, stopping dispatch: {}", e);
                    if let Some(ref cb) = self.progress {
                        cb.on_chunk_error(range, &e.to_string());
                    }
                    if self.fail_fast {
                        cancel.store(true, Ordering::Relaxed);
                    }
                    failure = Some(e);
                }
                Err(e) => debug!(%range, "Ignoring follow-on failure: {}", e),
            }

            if failure.is_none() {
                if let Some(job) = pending.next() {
                    in_flight.push(dispatch(job, Arc::clone(&source), Arc::clone(&cancel)));
                }
            }
        }

        match failure {
            Some(e) => {
                info!(
                    "Run aborted after {}/{} chunks; {} never dispatched",
                    artifacts.len(),
                    total,
                    pending.len()
                );
                Err(e)
            }
            None => Ok(artifacts),
        }
    }
}

/// Start `job` on the blocking pool right away and return a future that
/// resolves to its range and outcome.
fn dispatch(
    job: ChunkJob,
    source: Arc<dyn PageSource>,
    cancel: Arc<AtomicBool>,
) -> impl Future<Output = Completion> {
    let range = job.range;
    debug!(%range, "Dispatching chunk");
    let handle = tokio::task::spawn_blocking(move || run_chunk(&job, source.as_ref(), &cancel));
    async move { (range, handle.await) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::render::{PageSink, RasterPage};
    use crate::progress::InversionProgressCallback;
    use image::{Rgb, RgbImage};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Sleeps longer for earlier chunks so they complete last.
    struct Staggered {
        total: usize,
        fail_on: Option<usize>,
        running: AtomicUsize,
        peak: AtomicUsize,
        started: Mutex<Vec<usize>>,
    }

    impl Staggered {
        fn new(total: usize, fail_on: Option<usize>) -> Self {
            Self {
                total,
                fail_on,
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                started: Mutex::new(Vec::new()),
            }
        }
    }

    impl PageSource for Staggered {
        fn page_count(&self, _path: &Path) -> Result<usize, InvertError> {
            Ok(self.total)
        }

        fn render_range(
            &self,
            _path: &Path,
            range: PageRange,
            sink: &mut PageSink<'_>,
        ) -> Result<(), TransformError> {
            self.started.lock().unwrap().push(range.start);
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = (self.total - range.start) as u64 * 3;
            std::thread::sleep(Duration::from_millis(delay));

            let result = (|| -> Result<(), TransformError> {
                for index in range.pages() {
                    if self.fail_on == Some(index) {
                        return Err(TransformError::RenderFailed {
                            page: index + 1,
                            detail: "injected".into(),
                        });
                    }
                    sink(RasterPage {
                        index,
                        image: RgbImage::from_pixel(2, 2, Rgb([index as u8, 0, 0])),
                        width_pt: 10.0,
                        height_pt: 10.0,
                    })?;
                }
                Ok(())
            })();
            self.running.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    #[derive(Default)]
    struct Arrivals(Mutex<Vec<PageRange>>);

    impl InversionProgressCallback for Arrivals {
        fn on_chunk_complete(&self, range: PageRange, _completed: usize, _total: usize) {
            self.0.lock().unwrap().push(range);
        }
    }

    fn jobs(dir: &Path, total: usize, chunk: usize) -> Vec<ChunkJob> {
        (0..total)
            .step_by(chunk)
            .map(|start| {
                let range = PageRange::new(start, (start + chunk).min(total));
                ChunkJob {
                    range,
                    source: PathBuf::from("in.pdf"),
                    artifact: dir.join(format!("chunk_{}_{}.pdf", range.start, range.end)),
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn collects_every_chunk_and_respects_the_bound() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(Staggered::new(40, None));
        let arrivals = Arc::new(Arrivals::default());
        let pool = WorkerPool::new(2).progress(Some(arrivals.clone() as ProgressCallback));

        let artifacts = pool
            .run(jobs(dir.path(), 40, 5), source.clone() as Arc<dyn PageSource>)
            .await
            .unwrap();

        assert_eq!(artifacts.len(), 8);
        assert!(source.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(arrivals.0.lock().unwrap().len(), 8);

        let mut starts: Vec<usize> = artifacts.iter().map(|a| a.range.start).collect();
        starts.sort_unstable();
        assert_eq!(starts, vec![0, 5, 10, 15, 20, 25, 30, 35]);
    }

    #[tokio::test]
    async fn dispatch_follows_plan_order() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(Staggered::new(30, None));
        WorkerPool::new(1)
            .run(jobs(dir.path(), 30, 10), source.clone() as Arc<dyn PageSource>)
            .await
            .unwrap();
        assert_eq!(*source.started.lock().unwrap(), vec![0, 10, 20]);
    }

    #[tokio::test]
    async fn completion_order_can_differ_from_dispatch_order() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(Staggered::new(30, None));
        let arrivals = Arc::new(Arrivals::default());
        WorkerPool::new(3)
            .progress(Some(arrivals.clone() as ProgressCallback))
            .run(jobs(dir.path(), 30, 10), source as Arc<dyn PageSource>)
            .await
            .unwrap();

        // All three start together; the first range sleeps longest.
        let order: Vec<usize> = arrivals.0.lock().unwrap().iter().map(|r| r.start).collect();
        assert_eq!(order, vec![20, 10, 0]);
    }

    #[tokio::test]
    async fn first_failure_stops_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(Staggered::new(50, Some(3)));
        let err = WorkerPool::new(1)
            .run(jobs(dir.path(), 50, 10), source.clone() as Arc<dyn PageSource>)
            .await
            .unwrap_err();

        assert_eq!(err.range(), Some(PageRange::new(0, 10)));
        assert!(matches!(err, InvertError::ChunkFailed { .. }));
        assert_eq!(*source.started.lock().unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn in_flight_workers_finish_after_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        // The failing chunk (40..50) sleeps least, so it fails while 0..40 still run.
        let source = Arc::new(Staggered::new(50, Some(45)));
        let err = WorkerPool::new(5)
            .run(jobs(dir.path(), 50, 10), source.clone() as Arc<dyn PageSource>)
            .await
            .unwrap_err();

        assert_eq!(err.range(), Some(PageRange::new(40, 50)));
        assert_eq!(source.running.load(Ordering::SeqCst), 0);
        // The others completed and left their artifacts for workspace cleanup.
        let written = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(written, 4);
    }
}
