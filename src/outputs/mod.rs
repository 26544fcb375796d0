//! Output documents and where they live.
//!
//! # Submodules
//!
//! - [`json`]: Atomic JSON writes and forgiving reads
//!
//! # Output Structure
//!
//! ```text
//! data_dir/
//! ├── trends.json             # every article, ranked by score
//! ├── latest.json             # the 200 most recent articles
//! ├── fetch-logs.json         # per-source run logs, last 500
//! ├── translation-cache.json  # text hash -> Japanese
//! └── runtime-config.json     # topics and exclude patterns for the UI
//! ```

pub mod json;

use std::path::{Path, PathBuf};

/// Resolved paths of every document the pipeline reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub trends: PathBuf,
    pub latest: PathBuf,
    pub logs: PathBuf,
    pub translation_cache: PathBuf,
    pub runtime_config: PathBuf,
}

impl DataPaths {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            trends: data_dir.join("trends.json"),
            latest: data_dir.join("latest.json"),
            logs: data_dir.join("fetch-logs.json"),
            translation_cache: data_dir.join("translation-cache.json"),
            runtime_config: data_dir.join("runtime-config.json"),
        }
    }
}
