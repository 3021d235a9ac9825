//! wp-pool: the concurrent job-dispatch engine.
//!
//! A [`WorkerPool`] runs a fixed number of tokio tasks that pull
//! [`ConversionJob`]s from a rendezvous queue and push each one through the
//! conversion [`Pipeline`]. Every job delivers exactly one [`JobResult`] to
//! the [`JobHandle`] returned when it was created.

pub mod job;
pub mod pipeline;
pub mod pool;

pub use job::{ConversionJob, JobHandle, JobResult, Outcome};
pub use pipeline::{compression_ratio, derive_output_path, OutputNaming, Pipeline, PipelineSettings};
pub use pool::WorkerPool;
