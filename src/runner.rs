//! Drives one conversion run: discovery feeds the worker pool, and every
//! job's result is folded into a [`RunSummary`].

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use wp_core::ByteSize;
use wp_pool::{ConversionJob, JobResult, Outcome, Pipeline, WorkerPool};

use crate::discovery;

/// Tallies for a finished run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Files handed to the pool.
    pub submitted: usize,
    pub converted: usize,
    pub already_exists: usize,
    pub below_minimum: usize,
    pub dry_run: usize,
    pub discarded: usize,
    pub failed: usize,
    /// Jobs that never delivered a result because the run was cancelled.
    pub abandoned: usize,
    /// Total input and output size of kept conversions.
    pub bytes_in: u64,
    pub bytes_out: u64,
    /// Set when the directory walk ended with an error.
    pub discovery_error: Option<String>,
}

impl RunSummary {
    fn record(&mut self, joined: Result<Option<JobResult>, JoinError>) {
        let result = match joined {
            Ok(Some(result)) => result,
            Ok(None) => {
                self.abandoned += 1;
                return;
            }
            Err(e) => {
                error!("Result task failed: {e}");
                self.abandoned += 1;
                return;
            }
        };

        match result.outcome {
            Ok(Outcome::AlreadyExists) => self.already_exists += 1,
            Ok(Outcome::BelowMinimum { .. }) => self.below_minimum += 1,
            Ok(Outcome::DryRun) => self.dry_run += 1,
            Ok(Outcome::Converted {
                input_size,
                output_size,
                ..
            }) => {
                self.converted += 1;
                self.bytes_in += input_size.bytes();
                self.bytes_out += output_size.bytes();
            }
            Ok(Outcome::Discarded { .. }) => self.discarded += 1,
            Err(_) => self.failed += 1,
        }
    }

    /// Bytes saved across kept conversions.
    pub fn saved(&self) -> ByteSize {
        ByteSize(self.bytes_in.saturating_sub(self.bytes_out))
    }

    /// One-line human-readable summary.
    pub fn describe(&self) -> String {
        format!(
            "{} files: {} converted, {} already existed, {} below minimum size, \
             {} previewed, {} discarded, {} failed, {} abandoned; saved {}",
            self.submitted,
            self.converted,
            self.already_exists,
            self.below_minimum,
            self.dry_run,
            self.discarded,
            self.failed,
            self.abandoned,
            self.saved().human_readable()
        )
    }
}

/// Convert every candidate image under `root`.
///
/// Discovery runs on a blocking thread and hands paths over one at a time,
/// so it never runs ahead of the pool. A walk error stops discovery but the
/// jobs already submitted still drain. Cancelling `cancel` stops the walk
/// and submission and shuts the pool down; jobs already running finish
/// first.
pub async fn run(
    root: &Path,
    quality: u32,
    workers: usize,
    pipeline: Pipeline,
    cancel: &CancellationToken,
) -> RunSummary {
    let mut pool = WorkerPool::new(workers, pipeline, cancel);
    let mut summary = RunSummary::default();
    let mut pending = JoinSet::new();

    let (path_tx, mut path_rx) = mpsc::channel::<PathBuf>(1);
    let walk_root = root.to_path_buf();
    let walk_cancel = cancel.clone();
    let walker = tokio::task::spawn_blocking(move || {
        discovery::discover(&walk_root, path_tx, &walk_cancel)
    });

    loop {
        let path = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Run cancelled; stopping discovery");
                break;
            }
            path = path_rx.recv() => match path {
                Some(path) => path,
                None => break,
            },
        };

        let (job, handle) = ConversionJob::new(path, quality);
        if let Err(e) = pool.submit(job).await {
            warn!("Stopping discovery: {e}");
            break;
        }
        summary.submitted += 1;
        pending.spawn(handle.wait_for_result());

        while let Some(joined) = pending.try_join_next() {
            summary.record(joined);
        }
    }
    drop(path_rx);

    match walker.await {
        Ok(Ok(found)) => debug!("Discovery finished: {found} candidate files"),
        Ok(Err(e)) => {
            error!("!!ERROR {e}");
            summary.discovery_error = Some(e.to_string());
        }
        Err(e) => {
            error!("Discovery task failed: {e}");
            summary.discovery_error = Some(e.to_string());
        }
    }

    pool.wait().await;
    pool.stop().await;

    while let Some(joined) = pending.join_next().await {
        summary.record(joined);
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use wp_core::Error;

    fn result(outcome: Result<Outcome, Error>) -> Result<Option<JobResult>, JoinError> {
        Ok(Some(JobResult {
            input: PathBuf::from("/in.jpg"),
            output: Some(PathBuf::from("/in.webp")),
            outcome,
        }))
    }

    #[test]
    fn record_counts_each_outcome() {
        let mut summary = RunSummary::default();
        summary.record(result(Ok(Outcome::AlreadyExists)));
        summary.record(result(Ok(Outcome::BelowMinimum { size: ByteSize(1) })));
        summary.record(result(Ok(Outcome::DryRun)));
        summary.record(result(Ok(Outcome::Converted {
            input_size: ByteSize(4096),
            output_size: ByteSize(1024),
            ratio: 75.0,
        })));
        summary.record(result(Ok(Outcome::Discarded {
            input_size: ByteSize(10),
            output_size: ByteSize(20),
        })));
        summary.record(result(Err(Error::tool("cwebp", "boom"))));
        summary.record(Ok(None));

        assert_eq!(summary.already_exists, 1);
        assert_eq!(summary.below_minimum, 1);
        assert_eq!(summary.dry_run, 1);
        assert_eq!(summary.converted, 1);
        assert_eq!(summary.discarded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.abandoned, 1);
        assert_eq!(summary.saved(), ByteSize(3072));
    }

    #[test]
    fn describe_mentions_counts() {
        let summary = RunSummary {
            submitted: 2,
            converted: 2,
            bytes_in: 2048,
            bytes_out: 1024,
            ..Default::default()
        };
        let text = summary.describe();
        assert!(text.starts_with("2 files: 2 converted"));
        assert!(text.ends_with("saved 1.0 KB"));
    }
}
