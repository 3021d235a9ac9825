//! The [`Encoder`] trait: the one call the conversion pipeline makes to
//! produce an output file.

use std::path::Path;

use async_trait::async_trait;

use crate::command::ToolCommand;
use crate::tools::{ToolRegistry, CWEBP};

/// Converts one image file into another.
///
/// The pipeline treats `quality` as opaque and passes it through unchanged;
/// its range and meaning belong to the implementation. Implementations must
/// be safe to share across workers (`Send + Sync`).
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Read `input` and write the encoded result to `output`.
    async fn encode(&self, input: &Path, output: &Path, quality: u32) -> wp_core::Result<()>;
}

/// [`Encoder`] backed by the `cwebp` command-line tool.
#[derive(Debug, Clone)]
pub struct CwebpEncoder {
    registry: ToolRegistry,
}

impl CwebpEncoder {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Encoder for CwebpEncoder {
    async fn encode(&self, input: &Path, output: &Path, quality: u32) -> wp_core::Result<()> {
        let tool = self.registry.require(CWEBP)?;

        ToolCommand::new(tool.path.clone())
            .arg("-quiet")
            .arg("-q")
            .arg(quality.to_string())
            .arg(input)
            .arg("-o")
            .arg(output)
            .timeout(tool.timeout)
            .execute()
            .await?;

        Ok(())
    }
}
