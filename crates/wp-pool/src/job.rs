//! Conversion jobs and their single-delivery results.

use std::path::{Path, PathBuf};

use tokio::sync::oneshot;
use wp_core::{ByteSize, Error};

/// How a job that did not fail came to an end.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// An output file was already present and replacing was not requested.
    AlreadyExists,
    /// The input was smaller than the configured minimum.
    BelowMinimum { size: ByteSize },
    /// Dry run: the output path was derived but nothing was written.
    DryRun,
    /// The encoder ran and its output was kept.
    Converted {
        input_size: ByteSize,
        output_size: ByteSize,
        /// Percentage reduction, `(1 - output/input) * 100`.
        ratio: f64,
    },
    /// The encoder ran but its output was larger than the input and was
    /// deleted.
    Discarded {
        input_size: ByteSize,
        output_size: ByteSize,
    },
}

/// The single result of one job.
#[derive(Debug)]
pub struct JobResult {
    /// The input path, made absolute once normalization succeeded.
    pub input: PathBuf,
    /// The derived output path; `None` only if derivation never happened.
    pub output: Option<PathBuf>,
    pub outcome: Result<Outcome, Error>,
}

impl JobResult {
    pub fn error(&self) -> Option<&Error> {
        self.outcome.as_ref().err()
    }

    /// Percentage size reduction; only present for kept conversions.
    pub fn compression_ratio(&self) -> Option<f64> {
        match self.outcome {
            Ok(Outcome::Converted { ratio, .. }) => Some(ratio),
            _ => None,
        }
    }

    pub fn already_exists(&self) -> bool {
        matches!(self.outcome, Ok(Outcome::AlreadyExists))
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output.as_deref()
    }
}

/// One file's conversion request plus the sending half of its result slot.
///
/// Created together with a [`JobHandle`] by [`ConversionJob::new`]; the
/// submitter keeps the handle and gives the job to the pool.
#[derive(Debug)]
pub struct ConversionJob {
    input: PathBuf,
    quality: u32,
    result_tx: oneshot::Sender<JobResult>,
}

impl ConversionJob {
    pub fn new(input: impl Into<PathBuf>, quality: u32) -> (Self, JobHandle) {
        let input = input.into();
        let (result_tx, result_rx) = oneshot::channel();
        let handle = JobHandle {
            input: input.clone(),
            result_rx,
        };
        let job = Self {
            input,
            quality,
            result_tx,
        };
        (job, handle)
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn quality(&self) -> u32 {
        self.quality
    }

    /// Deliver the job's result. Consumes the job, so a second delivery
    /// cannot happen.
    pub(crate) fn complete(self, result: JobResult) {
        if self.result_tx.send(result).is_err() {
            tracing::trace!("Result for {} dropped: handle went away", self.input.display());
        }
    }
}

/// The reading half of a job's result slot.
#[derive(Debug)]
pub struct JobHandle {
    input: PathBuf,
    result_rx: oneshot::Receiver<JobResult>,
}

impl JobHandle {
    /// The path the job was created with.
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Wait for the job's result.
    ///
    /// Returns `None` if the job was abandoned: dropped before submission, or
    /// still unclaimed when the pool was cancelled.
    pub async fn wait_for_result(self) -> Option<JobResult> {
        self.result_rx.await.ok()
    }
}
