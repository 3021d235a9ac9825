//! The per-job conversion pipeline.
//!
//! Steps run strictly in order and each one may end the job:
//!
//! 1. make the input path absolute
//! 2. derive the output path (pure)
//! 3. existence gate (skipped with `replace`)
//! 4. minimum-size gate
//! 5. dry-run gate
//! 6. encode
//! 7. validate the output size, deleting outputs larger than their input
//!
//! The pipeline never observes cancellation; once started it runs to the end.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use wp_core::{ByteSize, Error, Result};
use wp_encoder::Encoder;

use crate::job::{JobResult, Outcome};

/// Decorations applied to the output file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNaming {
    pub prefix: String,
    pub suffix: String,
    /// Extension without the leading dot.
    pub extension: String,
}

impl Default for OutputNaming {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: String::new(),
            extension: "webp".into(),
        }
    }
}

/// Everything the pipeline reads besides the job itself.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub replace: bool,
    pub dry_run: bool,
    pub min_size: ByteSize,
    pub naming: OutputNaming,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            replace: false,
            dry_run: false,
            min_size: ByteSize(10 * ByteSize::KB),
            naming: OutputNaming::default(),
        }
    }
}

/// `dir/<prefix><stem><suffix>.<extension>` for an absolute `input`.
///
/// Pure: never touches the filesystem.
pub fn derive_output_path(input: &Path, naming: &OutputNaming) -> Result<PathBuf> {
    let dir = input
        .parent()
        .ok_or_else(|| Error::path(input, "has no parent directory"))?;
    let stem = input
        .file_stem()
        .ok_or_else(|| Error::path(input, "has no file name"))?;

    let mut name = OsString::from(&naming.prefix);
    name.push(stem);
    name.push(&naming.suffix);
    name.push(".");
    name.push(&naming.extension);

    Ok(dir.join(name))
}

/// Percentage size reduction from `input` to `output`.
pub fn compression_ratio(input: ByteSize, output: ByteSize) -> f64 {
    if input.bytes() == 0 {
        return 0.0;
    }
    (1.0 - output.bytes() as f64 / input.bytes() as f64) * 100.0
}

/// Runs one job's steps against an [`Encoder`].
#[derive(Clone)]
pub struct Pipeline {
    settings: Arc<PipelineSettings>,
    encoder: Arc<dyn Encoder>,
}

impl Pipeline {
    pub fn new(settings: PipelineSettings, encoder: Arc<dyn Encoder>) -> Self {
        Self {
            settings: Arc::new(settings),
            encoder,
        }
    }

    /// Run every step for `input` and log the outcome as one line.
    pub async fn run(&self, input: &Path, quality: u32) -> JobResult {
        let mut input = input.to_path_buf();
        let mut output = None;
        let outcome = self.steps(&mut input, &mut output, quality).await;

        let result = JobResult {
            input,
            output,
            outcome,
        };
        self.report(&result);
        result
    }

    async fn steps(
        &self,
        input: &mut PathBuf,
        output_slot: &mut Option<PathBuf>,
        quality: u32,
    ) -> Result<Outcome> {
        let settings = &*self.settings;

        *input = std::path::absolute(&*input).map_err(|e| Error::path(&*input, e.to_string()))?;
        let input = input.as_path();

        let output = derive_output_path(input, &settings.naming)?;
        *output_slot = Some(output.clone());

        if !settings.replace && tokio::fs::metadata(&output).await.is_ok() {
            return Ok(Outcome::AlreadyExists);
        }

        let input_size = ByteSize(tokio::fs::metadata(input).await?.len());
        if input_size < settings.min_size {
            return Ok(Outcome::BelowMinimum { size: input_size });
        }

        if settings.dry_run {
            return Ok(Outcome::DryRun);
        }

        self.encoder.encode(input, &output, quality).await?;

        let output_size = ByteSize(tokio::fs::metadata(&output).await?.len());
        if output_size > input_size {
            tokio::fs::remove_file(&output)
                .await
                .map_err(|e| Error::cleanup(&output, e))?;
            return Ok(Outcome::Discarded {
                input_size,
                output_size,
            });
        }

        Ok(Outcome::Converted {
            input_size,
            output_size,
            ratio: compression_ratio(input_size, output_size),
        })
    }

    fn report(&self, result: &JobResult) {
        let input = result.input.display();
        let output = result
            .output
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        match &result.outcome {
            Ok(Outcome::AlreadyExists) => {
                tracing::info!(
                    "{input} already has a {} version",
                    self.settings.naming.extension
                );
            }
            Ok(Outcome::BelowMinimum { size }) => {
                tracing::info!(
                    "{input} size [{}] is smaller than the minimum file size [{}]. Skipping...",
                    size.human_readable(),
                    self.settings.min_size.human_readable()
                );
            }
            Ok(Outcome::DryRun) => {
                tracing::info!("{input} \u{2192} {output} [?]");
            }
            Ok(Outcome::Converted {
                input_size,
                output_size,
                ratio,
            }) => {
                tracing::info!(
                    "{input} ({}) \u{2192} {output} ({}) [{ratio:.2}%]",
                    input_size.human_readable(),
                    output_size.human_readable()
                );
            }
            Ok(Outcome::Discarded {
                input_size,
                output_size,
            }) => {
                tracing::warn!(
                    "output file {output} ({}) is bigger than input file {input} ({}). Deleted",
                    output_size.human_readable(),
                    input_size.human_readable()
                );
            }
            Err(e) => {
                tracing::error!("conversion of {input} failed: {e}");
            }
        }
    }
}
