use clap::Parser;
use std::path::PathBuf;

use wp_core::config::Config;
use wp_core::ByteSize;
use wp_pool::{OutputNaming, PipelineSettings};

pub const LOGO: &str = r"
                     _
                    | |            _  ___
 __      __   ___   | |__    _ __ (_)/ __|_   _
 \ \ /\ / /  / _ \  | '_ \  | '_ \| | |_ | | | |
  \ V  V /  |  __/  | |_) | | |_) | |  _|| |_| |
   \_/\_/    \___|  |_.__/  | .__/|_|_|   \__, |
                            | |            __/ |
                            |_|           |___/
";

#[derive(Parser, Debug)]
#[command(name = "webpify")]
#[command(
    author,
    version,
    about = "webpify is a tool used to create webp images from jpegs and png files"
)]
pub struct Cli {
    /// The directory to crawl
    #[arg(short = 'd', long = "dir")]
    pub dir: Option<String>,

    /// The quality for the webp images
    #[arg(short, long)]
    pub quality: Option<u32>,

    /// Replace existing webp files
    #[arg(short, long)]
    pub replace: bool,

    /// The number of workers to spawn. Defaults to the number of CPUs
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Only print target files; convert nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Smallest file size that will have a webp image created [default: 10KB]
    #[arg(long)]
    pub min_size: Option<String>,

    /// Prepend string to the beginning of file name
    #[arg(long)]
    pub prepend: Option<String>,

    /// Append string to the end of file name
    #[arg(long)]
    pub append: Option<String>,

    /// Path to the cwebp binary (searched in PATH by default)
    #[arg(long)]
    pub cwebp: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Do not print the logo
    #[arg(long)]
    pub no_logo: bool,

    /// Check that the encoder is available and exit
    #[arg(long)]
    pub check_tools: bool,
}

/// Everything a run needs, after layering flags over the config file.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// As given on the command line, untrimmed.
    pub dir: Option<String>,
    pub quality: u32,
    pub workers: usize,
    pub pipeline: PipelineSettings,
}

impl RunSettings {
    /// Whether the required flags are missing for a real (non dry) run.
    pub fn missing_required(&self) -> bool {
        let no_dir = self.dir.as_deref().map_or(true, str::is_empty);
        (no_dir || self.quality < 1) && !self.pipeline.dry_run
    }
}

impl Cli {
    /// Fold the flags into `config` (flags win) and validate the result.
    pub fn apply_to(&self, config: &mut Config) -> wp_core::Result<()> {
        let conversion = &mut config.conversion;
        if let Some(quality) = self.quality {
            conversion.quality = quality;
        }
        conversion.replace |= self.replace;
        if let Some(workers) = self.workers {
            conversion.workers = Some(workers);
        }
        if let Some(ref min_size) = self.min_size {
            conversion.min_size = min_size.clone();
        }
        if let Some(ref prepend) = self.prepend {
            conversion.prepend = prepend.clone();
        }
        if let Some(ref append) = self.append {
            conversion.append = append.clone();
        }
        if let Some(ref cwebp) = self.cwebp {
            config.tools.cwebp_path = Some(cwebp.clone());
        }

        config.validate()
    }

    /// Build the run settings from an already-merged config.
    pub fn settings(&self, config: &Config) -> wp_core::Result<RunSettings> {
        let conversion = &config.conversion;
        let min_size: ByteSize = conversion.min_size()?;

        Ok(RunSettings {
            dir: self.dir.clone(),
            quality: conversion.quality,
            workers: conversion.workers.unwrap_or_else(num_cpus::get),
            pipeline: PipelineSettings {
                replace: conversion.replace,
                dry_run: self.dry_run,
                min_size,
                naming: OutputNaming {
                    prefix: conversion.prepend.clone(),
                    suffix: conversion.append.clone(),
                    extension: conversion.target_extension.clone(),
                },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("webpify").chain(args.iter().copied())).unwrap()
    }

    fn resolve(cli: &Cli, mut config: Config) -> wp_core::Result<RunSettings> {
        cli.apply_to(&mut config)?;
        cli.settings(&config)
    }

    #[test]
    fn short_flags_parse() {
        let cli = parse(&["-d", "/photos", "-q", "80", "-r", "-w", "3"]);
        assert_eq!(cli.dir.as_deref(), Some("/photos"));
        assert_eq!(cli.quality, Some(80));
        assert!(cli.replace);
        assert_eq!(cli.workers, Some(3));
    }

    #[test]
    fn defaults_come_from_config() {
        let cli = parse(&["-d", "/photos", "-q", "70"]);
        let settings = resolve(&cli, Config::default()).unwrap();
        assert_eq!(settings.quality, 70);
        assert_eq!(settings.workers, num_cpus::get());
        assert_eq!(settings.pipeline.min_size, ByteSize(10 * ByteSize::KB));
        assert_eq!(settings.pipeline.naming, OutputNaming::default());
        assert!(!settings.pipeline.replace);
        assert!(!settings.missing_required());
    }

    #[test]
    fn flags_override_config() {
        let mut config = Config::default();
        config.conversion.quality = 50;
        config.conversion.workers = Some(8);
        config.conversion.append = "_cfg".into();

        let cli = parse(&[
            "-d", "/photos", "-q", "90", "-w", "2", "--append", "_cli", "--prepend", "web-",
            "--min-size", "1MB",
        ]);
        let settings = resolve(&cli, config).unwrap();
        assert_eq!(settings.quality, 90);
        assert_eq!(settings.workers, 2);
        assert_eq!(settings.pipeline.naming.suffix, "_cli");
        assert_eq!(settings.pipeline.naming.prefix, "web-");
        assert_eq!(settings.pipeline.min_size, ByteSize(ByteSize::MB));
    }

    #[test]
    fn config_quality_is_used_without_flag() {
        let mut config = Config::default();
        config.conversion.quality = 65;
        let cli = parse(&["-d", "/photos"]);
        let settings = resolve(&cli, config).unwrap();
        assert_eq!(settings.quality, 65);
        assert!(!settings.missing_required());
    }

    #[test]
    fn invalid_min_size_is_config_error() {
        let cli = parse(&["-d", "/photos", "-q", "80", "--min-size", "big"]);
        let err = resolve(&cli, Config::default()).unwrap_err();
        assert!(matches!(err, wp_core::Error::Config(_)));
    }

    #[test]
    fn min_size_flag_replaces_invalid_config_value() {
        let mut config = Config::default();
        config.conversion.min_size = "lots".into();

        let cli = parse(&["-d", "/photos", "-q", "80", "--min-size", "2KB"]);
        let settings = resolve(&cli, config).unwrap();
        assert_eq!(settings.pipeline.min_size, ByteSize(2 * ByteSize::KB));
    }

    #[test]
    fn invalid_config_min_size_without_flag_is_rejected() {
        let mut config = Config::default();
        config.conversion.min_size = "lots".into();

        let cli = parse(&["-d", "/photos", "-q", "80"]);
        assert!(matches!(resolve(&cli, config), Err(wp_core::Error::Config(_))));
    }

    #[test]
    fn missing_required_flags() {
        let no_quality = resolve(&parse(&["-d", "/photos"]), Config::default()).unwrap();
        assert!(no_quality.missing_required());

        let no_dir = resolve(&parse(&["-q", "80"]), Config::default()).unwrap();
        assert!(no_dir.missing_required());

        let empty_dir = resolve(&parse(&["-d", "", "-q", "80"]), Config::default()).unwrap();
        assert!(empty_dir.missing_required());

        let dry_run = resolve(&parse(&["--dry-run"]), Config::default()).unwrap();
        assert!(!dry_run.missing_required());
        assert!(dry_run.pipeline.dry_run);
    }

    #[test]
    fn cwebp_flag_sets_tool_path() {
        let cli = parse(&["--cwebp", "/opt/cwebp"]);
        let mut config = Config::default();
        cli.apply_to(&mut config).unwrap();
        assert_eq!(config.tools.cwebp_path, Some(PathBuf::from("/opt/cwebp")));
    }
}
