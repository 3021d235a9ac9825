//! webpify - create WebP versions of the JPEG and PNG files in a directory
//! tree.
//!
//! This library crate exposes discovery and the run driver for integration
//! testing; the conversion engine itself lives in `wp-pool`.

pub mod discovery;
pub mod runner;

pub use runner::{run, RunSummary};
