//! wp-core: shared error type, configuration, and byte-size values.
//!
//! This crate is the foundational dependency for the other wp-* crates. It
//! owns the unified [`Error`] type, the [`ByteSize`] value used for the
//! minimum-size gate, and the [`config`] types loaded from TOML.

pub mod config;
pub mod error;
pub mod size;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use size::ByteSize;
