//! Fixed-size worker pool.
//!
//! Each worker is a named OS thread owning its own module instance, created
//! through a [`WorkerSpawner`]. [`WorkerPool::start`] resolves only after
//! every worker has reported readiness; the first failure tears the pool
//! down and is returned to the caller.
//!
//! Jobs are zero-argument export calls taken from a shared queue by
//! whichever worker is idle.

use crate::error::{ModuleError, PoolError};
use modboot_common::consts::MAX_POOL_WORKERS;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Creates worker-side instances of a loaded module.
pub trait WorkerSpawner: Send + Sync {
    /// Instantiate the module for worker `index`.
    ///
    /// Called on the worker's own thread.
    fn spawn_worker(&self, index: usize) -> Result<Box<dyn PoolWorker>, ModuleError>;
}

/// One worker's module instance.
pub trait PoolWorker: Send {
    /// Invoke a zero-argument export.
    fn call(&mut self, symbol: &str) -> Result<(), ModuleError>;
}

struct Job {
    symbol: String,
    reply: oneshot::Sender<Result<(), ModuleError>>,
}

/// Running pool of workers.
pub struct WorkerPool {
    jobs: Option<flume::Sender<Job>>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers and wait until all of them are ready.
    ///
    /// # Errors
    /// - `PoolError::InvalidSize` if `size` is 0 or above `MAX_POOL_WORKERS`
    /// - `PoolError::Spawn` if a thread cannot be created
    /// - `PoolError::WorkerFailed` if any worker fails to instantiate
    pub async fn start(size: usize, spawner: Arc<dyn WorkerSpawner>) -> Result<Self, PoolError> {
        if size == 0 || size > MAX_POOL_WORKERS as usize {
            return Err(PoolError::InvalidSize(size));
        }

        let (job_tx, job_rx) = flume::unbounded::<Job>();
        let mut pool = Self {
            jobs: Some(job_tx),
            threads: Vec::with_capacity(size),
        };
        let mut pending = Vec::with_capacity(size);

        for index in 0..size {
            let (ready_tx, ready_rx) = oneshot::channel();
            let spawner = Arc::clone(&spawner);
            let jobs = job_rx.clone();

            let spawned = std::thread::Builder::new()
                .name(format!("modboot-worker-{index}"))
                .spawn(move || worker_main(index, spawner.as_ref(), jobs, ready_tx));

            match spawned {
                Ok(thread) => {
                    pool.threads.push(thread);
                    pending.push(ready_rx);
                }
                Err(source) => {
                    pool.shutdown().await;
                    return Err(PoolError::Spawn { index, source });
                }
            }
        }
        drop(job_rx);

        for (index, ready) in pending.into_iter().enumerate() {
            let reason = match ready.await {
                Ok(Ok(())) => {
                    debug!(index, "worker confirmed");
                    continue;
                }
                Ok(Err(reason)) => reason,
                Err(_) => "worker exited before reporting readiness".to_string(),
            };
            pool.shutdown().await;
            return Err(PoolError::WorkerFailed { index, reason });
        }

        debug!(workers = size, "worker pool ready");
        Ok(pool)
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.threads.len()
    }

    /// Run `symbol` on the next idle worker and wait for the result.
    ///
    /// # Errors
    /// - `PoolError::Closed` if the pool is shutting down
    /// - `PoolError::Job` wrapping the worker's `ModuleError`
    pub async fn call(&self, symbol: &str) -> Result<(), PoolError> {
        let jobs = self.jobs.as_ref().ok_or(PoolError::Closed)?;
        let (reply, result) = oneshot::channel();
        jobs.send_async(Job {
            symbol: symbol.to_string(),
            reply,
        })
        .await
        .map_err(|_| PoolError::Closed)?;

        result.await.map_err(|_| PoolError::Closed)?.map_err(PoolError::Job)
    }

    /// Close the queue and join the workers on tokio's blocking pool.
    pub async fn shutdown(mut self) {
        self.jobs.take();
        let threads = std::mem::take(&mut self.threads);
        if tokio::task::spawn_blocking(move || join_workers(threads))
            .await
            .is_err()
        {
            warn!("worker shutdown task failed");
        }
    }
}

/// Joins the workers on the dropping thread. From async code prefer
/// [`WorkerPool::shutdown`].
impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.jobs.take();
        join_workers(std::mem::take(&mut self.threads));
    }
}

fn join_workers(threads: Vec<JoinHandle<()>>) {
    for thread in threads {
        if thread.join().is_err() {
            warn!("worker thread panicked");
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.threads.len())
            .field("open", &self.jobs.is_some())
            .finish()
    }
}

fn worker_main(
    index: usize,
    spawner: &dyn WorkerSpawner,
    jobs: flume::Receiver<Job>,
    ready: oneshot::Sender<Result<(), String>>,
) {
    let mut worker = match spawner.spawn_worker(index) {
        Ok(worker) => {
            let _ = ready.send(Ok(()));
            worker
        }
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };

    while let Ok(job) = jobs.recv() {
        let result = worker.call(&job.symbol);
        if let Err(ref e) = result {
            debug!(index, "job {} failed: {}", job.symbol, e);
        }
        let _ = job.reply.send(result);
    }
    debug!(index, "worker stopped");
}

static_assertions::assert_impl_all!(WorkerPool: Send, Sync);
