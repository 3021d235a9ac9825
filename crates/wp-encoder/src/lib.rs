//! # wp-encoder
//!
//! External encoder management for webpify.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache the path to
//!   `cwebp`.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **The encoder seam** ([`Encoder`]) -- the single call the conversion
//!   pipeline makes, with [`CwebpEncoder`] as the production implementation.

pub mod command;
pub mod encoder;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use encoder::{CwebpEncoder, Encoder};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry, CWEBP};
