//! Image discovery.
//!
//! Walks a directory tree and streams every JPEG or PNG file it finds to a
//! channel. The walk is blocking and is meant to run on a blocking thread;
//! the bounded channel carries the pool's backpressure back to the walker.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::WalkDir;

/// Extensions (lowercase) of files that get converted.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Check if a path has a convertible image extension (case-insensitive).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use webpify::discovery::is_candidate;
///
/// assert!(is_candidate(Path::new("/photos/cat.JPG")));
/// assert!(is_candidate(Path::new("dog.png")));
/// assert!(!is_candidate(Path::new("cat.webp")));
/// ```
pub fn is_candidate(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Walk `root` and send every candidate file to `tx`.
///
/// Returns the number of paths sent. The first walk error aborts the walk
/// and is returned as [`wp_core::Error::Discovery`]; paths already sent are
/// unaffected. If the receiver goes away or `cancel` fires, the walk stops
/// quietly at the next entry.
pub fn discover(
    root: &Path,
    tx: mpsc::Sender<PathBuf>,
    cancel: &CancellationToken,
) -> wp_core::Result<usize> {
    let mut sent = 0;

    for entry in WalkDir::new(root).sort_by_file_name() {
        if cancel.is_cancelled() {
            debug!("Discovery cancelled after {sent} files");
            break;
        }

        let entry = entry.map_err(|e| wp_core::Error::Discovery(e.to_string()))?;

        if entry.file_type().is_dir() || !is_candidate(entry.path()) {
            continue;
        }

        if tx.blocking_send(entry.into_path()).is_err() {
            debug!("Discovery receiver closed; stopping walk");
            break;
        }
        sent += 1;
    }

    Ok(sent)
}
