//! Fixed-size worker pool with a rendezvous job queue.
//!
//! Idle workers announce themselves by placing a one-shot "slot" on the ready
//! channel; [`WorkerPool::submit`] takes the next slot and hands the job
//! straight to that worker. Submission therefore blocks until a worker is
//! idle, and no job is ever buffered inside the pool.
//!
//! Shutdown has two paths:
//!
//! - [`WorkerPool::wait`] closes the queue and lets every worker finish the
//!   job it is running.
//! - [`WorkerPool::stop`] cancels the pool. Idle workers exit at once; a
//!   worker that is mid-pipeline finishes that job first.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use wp_core::{Error, Result};

use crate::job::ConversionJob;
use crate::pipeline::Pipeline;

/// Where an idle worker waits for its next job.
type Slot = oneshot::Sender<ConversionJob>;

/// A bounded set of workers sharing one queue and one cancellation token.
///
/// Must be created inside a tokio runtime. A pool is used for a single run
/// and cannot be restarted.
pub struct WorkerPool {
    ready_rx: Option<mpsc::Receiver<Slot>>,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `worker_count` workers (at least one) running `pipeline`.
    ///
    /// The pool's token is a child of `parent`, so cancelling `parent` stops
    /// the pool too.
    pub fn new(worker_count: usize, pipeline: Pipeline, parent: &CancellationToken) -> Self {
        let worker_count = worker_count.max(1);
        let cancel = parent.child_token();

        // Each worker has at most one slot outstanding, so offering a slot
        // never waits on capacity.
        let (ready_tx, ready_rx) = mpsc::channel(worker_count);

        let workers = (0..worker_count)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    ready_tx.clone(),
                    pipeline.clone(),
                    cancel.clone(),
                ))
            })
            .collect();

        debug!(workers = worker_count, "Worker pool started");

        Self {
            ready_rx: Some(ready_rx),
            cancel,
            workers,
        }
    }

    /// Number of workers that have not yet been joined.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// The pool's cancellation token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Hand `job` to the next idle worker, waiting until one is available.
    ///
    /// # Errors
    ///
    /// - [`Error::PoolClosed`] after [`wait`](Self::wait) or [`stop`](Self::stop).
    /// - [`Error::Cancelled`] if the pool is cancelled before a worker takes
    ///   the job, or no workers remain.
    ///
    /// On error the job is dropped and its handle resolves to `None`.
    pub async fn submit(&mut self, job: ConversionJob) -> Result<()> {
        let mut job = job;
        loop {
            let ready_rx = self.ready_rx.as_mut().ok_or(Error::PoolClosed)?;

            let slot = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                slot = ready_rx.recv() => slot.ok_or(Error::Cancelled)?,
            };

            // A worker cancelled after offering its slot has dropped the
            // receiving end; take the job back and try the next slot.
            match slot.send(job) {
                Ok(()) => return Ok(()),
                Err(returned) => job = returned,
            }
        }
    }

    /// Close submission and wait for every worker to drain and exit.
    pub async fn wait(&mut self) {
        if self.ready_rx.take().is_some() {
            debug!("Worker pool closed; draining");
        }
        self.join_workers().await;
    }

    /// Cancel every worker and wait for them to exit.
    ///
    /// Returns only once all workers have exited; a worker that is running
    /// the pipeline finishes its current job first.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        self.ready_rx.take();
        self.join_workers().await;
    }

    async fn join_workers(&mut self) {
        for handle in self.workers.drain(..) {
            if let Err(e) = handle.await {
                error!("Worker task failed: {e}");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_worker(
    id: usize,
    ready_tx: mpsc::Sender<Slot>,
    pipeline: Pipeline,
    cancel: CancellationToken,
) {
    debug!(worker = id, "Worker started");

    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            job = next_job(&ready_tx) => match job {
                Some(job) => job,
                None => break,
            },
        };

        // Not raced against cancellation: the pipeline runs to completion.
        let result = pipeline.run(job.input(), job.quality()).await;
        job.complete(result);
    }

    debug!(worker = id, "Worker exited");
}

/// Offer a slot and wait for a job to arrive in it. `None` once the pool is
/// closed.
async fn next_job(ready_tx: &mpsc::Sender<Slot>) -> Option<ConversionJob> {
    let (slot_tx, slot_rx) = oneshot::channel();
    ready_tx.send(slot_tx).await.ok()?;
    slot_rx.await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobHandle, Outcome};
    use crate::pipeline::PipelineSettings;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;
    use wp_core::ByteSize;
    use wp_encoder::Encoder;

    /// Writes a quarter-size output after an optional delay and records how
    /// many encodes run at once.
    #[derive(Default)]
    struct SlowEncoder {
        delay: Duration,
        running: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
        started: Notify,
    }

    #[async_trait]
    impl Encoder for SlowEncoder {
        async fn encode(&self, input: &Path, output: &Path, _quality: u32) -> Result<()> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();

            tokio::time::sleep(self.delay).await;

            let len = tokio::fs::metadata(input).await?.len() / 4;
            tokio::fs::write(output, vec![0u8; len as usize]).await?;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn pipeline(encoder: Arc<SlowEncoder>, dry_run: bool) -> Pipeline {
        Pipeline::new(
            PipelineSettings {
                dry_run,
                min_size: ByteSize(1024),
                ..PipelineSettings::default()
            },
            encoder,
        )
    }

    fn write_inputs(dir: &Path, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.join(format!("img{i}.jpg"));
                std::fs::write(&path, vec![7u8; 4096]).unwrap();
                path
            })
            .collect()
    }

    async fn submit_all(pool: &mut WorkerPool, inputs: &[PathBuf]) -> Vec<JobHandle> {
        let mut handles = Vec::new();
        for input in inputs {
            let (job, handle) = ConversionJob::new(input.clone(), 80);
            pool.submit(job).await.unwrap();
            handles.push(handle);
        }
        handles
    }

    #[tokio::test]
    async fn wait_drains_every_job() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(dir.path(), 6);
        let encoder = Arc::new(SlowEncoder {
            delay: Duration::from_millis(10),
            ..Default::default()
        });
        let mut pool = WorkerPool::new(2, pipeline(encoder.clone(), false), &CancellationToken::new());

        let handles = submit_all(&mut pool, &inputs).await;
        pool.wait().await;

        assert_eq!(pool.worker_count(), 0);
        for handle in handles {
            let result = handle.wait_for_result().await.expect("result delivered");
            assert_eq!(result.compression_ratio(), Some(75.0));
        }
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 6);
        assert!(encoder.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn dry_run_reports_every_output_path() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(dir.path(), 3);
        let encoder = Arc::new(SlowEncoder::default());
        let mut pool = WorkerPool::new(2, pipeline(encoder.clone(), true), &CancellationToken::new());

        let handles = submit_all(&mut pool, &inputs).await;
        pool.wait().await;

        for (handle, input) in handles.into_iter().zip(&inputs) {
            let result = handle.wait_for_result().await.unwrap();
            assert!(matches!(result.outcome, Ok(Outcome::DryRun)));
            assert_eq!(result.output_path(), Some(input.with_extension("webp").as_path()));
            assert!(!input.with_extension("webp").exists());
        }
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn submit_after_wait_is_rejected() {
        let encoder = Arc::new(SlowEncoder::default());
        let mut pool = WorkerPool::new(1, pipeline(encoder, true), &CancellationToken::new());
        pool.wait().await;

        let (job, handle) = ConversionJob::new("/photos/late.jpg", 80);
        assert!(matches!(pool.submit(job).await, Err(Error::PoolClosed)));
        assert!(handle.wait_for_result().await.is_none());
    }

    #[tokio::test]
    async fn stop_after_wait_is_a_no_op() {
        let encoder = Arc::new(SlowEncoder::default());
        let mut pool = WorkerPool::new(3, pipeline(encoder, true), &CancellationToken::new());
        pool.wait().await;
        pool.stop().await;
        pool.stop().await;
        assert_eq!(pool.worker_count(), 0);
    }

    #[tokio::test]
    async fn stop_lets_in_flight_job_finish() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = write_inputs(dir.path(), 1);
        let encoder = Arc::new(SlowEncoder {
            delay: Duration::from_millis(200),
            ..Default::default()
        });
        let mut pool = WorkerPool::new(2, pipeline(encoder.clone(), false), &CancellationToken::new());

        let handles = submit_all(&mut pool, &inputs).await;
        encoder.started.notified().await;
        pool.stop().await;

        assert_eq!(pool.worker_count(), 0);
        let results: Vec<_> = collect_results(handles).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].compression_ratio(), Some(75.0));
        assert!(inputs[0].with_extension("webp").exists());
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn submit_after_stop_is_rejected() {
        let encoder = Arc::new(SlowEncoder::default());
        let mut pool = WorkerPool::new(2, pipeline(encoder, true), &CancellationToken::new());
        pool.stop().await;

        let (job, _handle) = ConversionJob::new("/photos/late.jpg", 80);
        assert!(pool.submit(job).await.is_err());
    }

    #[tokio::test]
    async fn parent_cancellation_stops_idle_workers() {
        let parent = CancellationToken::new();
        let encoder = Arc::new(SlowEncoder::default());
        let mut pool = WorkerPool::new(4, pipeline(encoder, true), &parent);

        parent.cancel();
        assert!(pool.cancellation_token().is_cancelled());

        let (job, _handle) = ConversionJob::new("/photos/late.jpg", 80);
        assert!(matches!(pool.submit(job).await, Err(Error::Cancelled)));

        tokio::time::timeout(Duration::from_secs(5), pool.wait())
            .await
            .expect("workers exit after cancellation");
    }

    #[tokio::test]
    async fn zero_workers_is_clamped_to_one() {
        let encoder = Arc::new(SlowEncoder::default());
        let mut pool = WorkerPool::new(0, pipeline(encoder, true), &CancellationToken::new());
        assert_eq!(pool.worker_count(), 1);
        pool.wait().await;
    }

    async fn collect_results(handles: Vec<JobHandle>) -> Vec<crate::job::JobResult> {
        let mut results = Vec::new();
        for handle in handles {
            if let Some(result) = handle.wait_for_result().await {
                results.push(result);
            }
        }
        results
    }
}
