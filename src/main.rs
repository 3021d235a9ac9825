mod cli;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use cli::{Cli, LOGO};
use tokio_util::sync::CancellationToken;

use wp_core::config::Config;
use wp_encoder::{CwebpEncoder, ToolRegistry};
use wp_pool::Pipeline;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "webpify=debug,wp_pool=debug,wp_encoder=debug,wp_core=debug".to_string()
        } else {
            "webpify=info,wp_pool=info,wp_encoder=info,wp_core=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_target(false)
        .init();

    if !cli.no_logo {
        println!("{LOGO}");
    }

    let mut config = match Config::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("!!ERROR: {e}");
            return Ok(ExitCode::from(1));
        }
    };
    if let Err(e) = cli.apply_to(&mut config) {
        eprintln!("!!ERROR: {e}");
        return Ok(ExitCode::from(1));
    }

    if cli.check_tools {
        check_tools(&config);
        return Ok(ExitCode::SUCCESS);
    }

    let settings = match cli.settings(&config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("!!ERROR: {e}");
            return Ok(ExitCode::from(1));
        }
    };

    if settings.missing_required() {
        eprintln!("{}", Cli::command().render_help());
        return Ok(ExitCode::from(1));
    }

    let dir = settings
        .dir
        .as_deref()
        .filter(|d| !d.is_empty())
        .unwrap_or(".")
        .trim();
    let root = match std::path::absolute(dir) {
        Ok(root) => root,
        Err(_) => {
            eprintln!("dir is not valid!");
            return Ok(ExitCode::from(2));
        }
    };

    println!("CRAWLING: {}", root.display());
    println!("QUALITY: {}", settings.quality);
    println!("WORKERS: {}", settings.workers.max(1));
    println!("MIN FILE SIZE: {}", settings.pipeline.min_size);
    if settings.pipeline.dry_run {
        println!("*** THIS IS A DRY RUN ***");
    }
    println!();

    let encoder = CwebpEncoder::new(ToolRegistry::discover(&config.tools));
    let pipeline = Pipeline::new(settings.pipeline, Arc::new(encoder));

    let rt = tokio::runtime::Runtime::new().context("Failed to start the async runtime")?;
    let summary = rt.block_on(convert(root, settings.quality, settings.workers, pipeline));

    println!();
    println!("{}", summary.describe());

    Ok(ExitCode::SUCCESS)
}

async fn convert(
    root: PathBuf,
    quality: u32,
    workers: usize,
    pipeline: Pipeline,
) -> webpify::RunSummary {
    let cancel = CancellationToken::new();
    let signal = tokio::spawn(shutdown_signal(cancel.clone()));

    let summary = webpify::run(&root, quality, workers, pipeline, &cancel).await;

    cancel.cancel();
    let _ = signal.await;
    summary
}

/// Resolve once Ctrl+C or SIGTERM arrives (cancelling the run) or the run
/// finishes on its own.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Interrupted; finishing in-flight conversions");
            cancel.cancel();
        }
        _ = terminate => {
            tracing::info!("Terminated; finishing in-flight conversions");
            cancel.cancel();
        }
        _ = cancel.cancelled() => {}
    }
}

fn check_tools(config: &Config) {
    println!("Checking external tools...\n");

    let registry = ToolRegistry::discover(&config.tools);
    let mut all_ok = true;

    for tool in registry.check_all() {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({version})");
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("cwebp is missing. Install libwebp or pass --cwebp <PATH>.");
    }
}
