//! Bounded pool of worker threads running pure jobs.
//!
//! The owning thread submits jobs without blocking and drains completions
//! from a single channel. Workers never touch owner state; a job carries
//! everything it needs and its output is applied by the owner.

use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    pub worker_count: usize,
    pub queue_capacity: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            queue_capacity: 256,
        }
    }
}

impl WorkerPoolConfig {
    pub fn validate(&self) -> Result<(), WorkerPoolStartError> {
        if self.worker_count == 0 {
            return Err(WorkerPoolStartError::ZeroWorkers);
        }
        if self.queue_capacity == 0 {
            return Err(WorkerPoolStartError::ZeroQueueCapacity);
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum WorkerPoolStartError {
    ZeroWorkers,
    ZeroQueueCapacity,
    Spawn {
        worker_index: usize,
        source: std::io::Error,
    },
}

impl fmt::Display for WorkerPoolStartError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerPoolStartError::ZeroWorkers => {
                write!(formatter, "worker pool needs at least one worker")
            }
            WorkerPoolStartError::ZeroQueueCapacity => {
                write!(formatter, "worker pool job queue capacity must be at least 1")
            }
            WorkerPoolStartError::Spawn {
                worker_index,
                source,
            } => write!(formatter, "failed to spawn worker {worker_index}: {source}"),
        }
    }
}

impl std::error::Error for WorkerPoolStartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkerPoolStartError::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    QueueFull,
    Disconnected,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::QueueFull => write!(formatter, "worker job queue is full"),
            DispatchError::Disconnected => write!(formatter, "worker pool has shut down"),
        }
    }
}

impl std::error::Error for DispatchError {}

pub struct WorkerPool<Job, Output> {
    job_sender: Option<Sender<Job>>,
    completion_receiver: Receiver<Output>,
    workers: Vec<JoinHandle<()>>,
    in_flight: usize,
}

impl<Job, Output> WorkerPool<Job, Output>
where
    Job: Send + 'static,
    Output: Send + 'static,
{
    /// Spawns `config.worker_count` threads named `{name}-{index}`, each
    /// running `handler` on jobs until the pool is dropped.
    pub fn start<Handler>(
        name: &str,
        config: WorkerPoolConfig,
        handler: Handler,
    ) -> Result<Self, WorkerPoolStartError>
    where
        Handler: Fn(Job) -> Output + Send + Sync + 'static,
    {
        config.validate()?;
        let (job_sender, job_receiver) = crossbeam_channel::bounded::<Job>(config.queue_capacity);
        let (completion_sender, completion_receiver) = crossbeam_channel::unbounded::<Output>();
        let handler = Arc::new(handler);

        let mut pool = Self {
            job_sender: Some(job_sender),
            completion_receiver,
            workers: Vec::with_capacity(config.worker_count),
            in_flight: 0,
        };
        for worker_index in 0..config.worker_count {
            let job_receiver = job_receiver.clone();
            let completion_sender = completion_sender.clone();
            let handler = Arc::clone(&handler);
            let spawned = std::thread::Builder::new()
                .name(format!("{name}-{worker_index}"))
                .spawn(move || worker_loop(job_receiver, completion_sender, handler.as_ref()));
            match spawned {
                Ok(handle) => pool.workers.push(handle),
                // Dropping `pool` here disconnects and joins the workers already started.
                Err(source) => {
                    return Err(WorkerPoolStartError::Spawn {
                        worker_index,
                        source,
                    });
                }
            }
        }
        tracing::debug!(
            name,
            workers = config.worker_count,
            queue_capacity = config.queue_capacity,
            "worker pool started"
        );
        Ok(pool)
    }

    /// Queues a job without blocking.
    pub fn submit(&mut self, job: Job) -> Result<(), DispatchError> {
        let Some(sender) = self.job_sender.as_ref() else {
            return Err(DispatchError::Disconnected);
        };
        match sender.try_send(job) {
            Ok(()) => {
                self.in_flight += 1;
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(DispatchError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(DispatchError::Disconnected),
        }
    }

    pub fn try_recv_completion(&mut self) -> Option<Output> {
        match self.completion_receiver.try_recv() {
            Ok(output) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                Some(output)
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_completion_timeout(&mut self, timeout: Duration) -> Option<Output> {
        match self.completion_receiver.recv_timeout(timeout) {
            Ok(output) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                Some(output)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Jobs submitted whose output has not been received yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl<Job, Output> Drop for WorkerPool<Job, Output> {
    fn drop(&mut self) {
        self.job_sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                tracing::warn!("worker thread panicked before shutdown");
            }
        }
    }
}

fn worker_loop<Job, Output>(
    job_receiver: Receiver<Job>,
    completion_sender: Sender<Output>,
    handler: &(dyn Fn(Job) -> Output + Send + Sync),
) {
    while let Ok(job) = job_receiver.recv() {
        let output = handler(job);
        if completion_sender.send(output).is_err() {
            break;
        }
    }
}
