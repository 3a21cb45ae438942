use std::sync::Arc;
use std::time::Duration;

use engine::{DispatchError, WorkerPool, WorkerPoolConfig, WorkerPoolStartError};
use model::{Drawing, DrawingRect};
use rasterizer::{Bitmap, RasterOptions, render_region};
use tiles::TileKey;

/// Everything a worker needs to render one tile. The drawing is an immutable
/// snapshot, so later edits never race with the render.
#[derive(Debug, Clone)]
pub struct RasterJob {
    pub job_id: u64,
    pub key: TileKey,
    pub drawing: Arc<Drawing>,
    pub region: DrawingRect,
    pub scale: f64,
    pub tile_size: u32,
    pub options: RasterOptions,
}

#[derive(Debug)]
pub struct RasterCompletion {
    pub job_id: u64,
    pub key: TileKey,
    pub bitmap: Option<Bitmap>,
}

pub fn execute_raster_job(job: RasterJob) -> RasterCompletion {
    let bitmap = render_region(
        &job.drawing,
        &job.region,
        job.scale,
        job.tile_size,
        job.tile_size,
        &job.options,
    );
    RasterCompletion {
        job_id: job.job_id,
        key: job.key,
        bitmap,
    }
}

/// Where tile jobs run. `dispatch` must not block; completions come back in
/// whatever order the implementation finishes them.
pub trait RasterDispatcher {
    fn dispatch(&mut self, job: RasterJob) -> Result<(), DispatchError>;

    fn try_completion(&mut self) -> Option<RasterCompletion>;

    fn wait_completion(&mut self, timeout: Duration) -> Option<RasterCompletion>;

    /// Dispatched jobs whose completion has not been returned yet.
    fn in_flight(&self) -> usize;
}

pub struct WorkerPoolDispatcher {
    pool: WorkerPool<RasterJob, RasterCompletion>,
}

impl WorkerPoolDispatcher {
    pub fn start(config: WorkerPoolConfig) -> Result<Self, WorkerPoolStartError> {
        let pool = WorkerPool::start("raster", config, execute_raster_job)?;
        Ok(Self { pool })
    }
}

impl RasterDispatcher for WorkerPoolDispatcher {
    fn dispatch(&mut self, job: RasterJob) -> Result<(), DispatchError> {
        self.pool.submit(job)
    }

    fn try_completion(&mut self) -> Option<RasterCompletion> {
        self.pool.try_recv_completion()
    }

    fn wait_completion(&mut self, timeout: Duration) -> Option<RasterCompletion> {
        self.pool.recv_completion_timeout(timeout)
    }

    fn in_flight(&self) -> usize {
        self.pool.in_flight()
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use manual::ManualDispatcher;

#[cfg(any(test, feature = "test-helpers"))]
mod manual {
    use std::collections::VecDeque;
    use std::time::Duration;

    use engine::DispatchError;

    use super::{RasterCompletion, RasterDispatcher, RasterJob, execute_raster_job};

    /// Runs jobs on the calling thread only when told to, so tests control
    /// completion order.
    #[derive(Debug, Default)]
    pub struct ManualDispatcher {
        pending: VecDeque<RasterJob>,
        finished: VecDeque<RasterCompletion>,
        queue_limit: Option<usize>,
        dispatched_total: usize,
    }

    impl ManualDispatcher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Rejects dispatches with `QueueFull` once `limit` jobs are pending.
        pub fn with_queue_limit(limit: usize) -> Self {
            Self {
                queue_limit: Some(limit),
                ..Self::default()
            }
        }

        pub fn pending_jobs(&self) -> impl Iterator<Item = &RasterJob> {
            self.pending.iter()
        }

        pub fn pending_len(&self) -> usize {
            self.pending.len()
        }

        pub fn dispatched_total(&self) -> usize {
            self.dispatched_total
        }

        /// Renders the pending job with `job_id`. Returns false if no such job.
        pub fn complete(&mut self, job_id: u64) -> bool {
            let Some(index) = self.pending.iter().position(|job| job.job_id == job_id) else {
                return false;
            };
            let Some(job) = self.pending.remove(index) else {
                return false;
            };
            self.finished.push_back(execute_raster_job(job));
            true
        }

        /// Finishes the pending job with `job_id` without producing a bitmap.
        pub fn fail(&mut self, job_id: u64) -> bool {
            let Some(index) = self.pending.iter().position(|job| job.job_id == job_id) else {
                return false;
            };
            let Some(job) = self.pending.remove(index) else {
                return false;
            };
            self.finished.push_back(RasterCompletion {
                job_id: job.job_id,
                key: job.key,
                bitmap: None,
            });
            true
        }

        pub fn complete_all(&mut self) -> usize {
            let count = self.pending.len();
            while let Some(job) = self.pending.pop_front() {
                self.finished.push_back(execute_raster_job(job));
            }
            count
        }
    }

    impl RasterDispatcher for ManualDispatcher {
        fn dispatch(&mut self, job: RasterJob) -> Result<(), DispatchError> {
            if self
                .queue_limit
                .is_some_and(|limit| self.pending.len() >= limit)
            {
                return Err(DispatchError::QueueFull);
            }
            self.pending.push_back(job);
            self.dispatched_total += 1;
            Ok(())
        }

        fn try_completion(&mut self) -> Option<RasterCompletion> {
            self.finished.pop_front()
        }

        fn wait_completion(&mut self, _timeout: Duration) -> Option<RasterCompletion> {
            if self.finished.is_empty() {
                self.complete_all();
            }
            self.finished.pop_front()
        }

        fn in_flight(&self) -> usize {
            self.pending.len() + self.finished.len()
        }
    }
}
