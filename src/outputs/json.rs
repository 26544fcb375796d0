//! Atomic JSON persistence.
//!
//! Every document is written to `<file>.tmp` in the same directory and then
//! renamed over the destination, so the UI (or the next run) only ever sees a
//! complete file. Reads are forgiving: a missing or unparseable file yields
//! the caller's fallback instead of an error.

use crate::error::OutputError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Serialize `value` as pretty JSON (2-space indent) and atomically replace `path`.
///
/// Parent directories are created as needed.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), OutputError> {
    let io_err = |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_string_pretty(value).map_err(|source| OutputError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let tmp = tmp_path(path);
    fs::write(&tmp, json.as_bytes()).await.map_err(io_err)?;
    fs::rename(&tmp, path).await.map_err(io_err)?;

    info!(bytes = json.len(), "Wrote JSON file");
    Ok(())
}

/// Read and deserialize `path`, or return `fallback` if it is missing or corrupt.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn read_json_or<T: DeserializeOwned>(path: &Path, fallback: T) -> T {
    let text = match fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("File not found; starting empty");
            return fallback;
        }
        Err(e) => {
            warn!(error = %e, "Unreadable file; starting empty");
            return fallback;
        }
    };

    match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Corrupt JSON file; starting empty");
            fallback
        }
    }
}
