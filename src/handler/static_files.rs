//! Content root module
//!
//! Resolves request paths to open files under the configured root and
//! collects the metadata the response is built from.

use crate::config::ContentConfig;
use crate::logger;
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};

/// Size and modification time, read once per request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMetadata {
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
}

impl FileMetadata {
    fn from_std(meta: &std::fs::Metadata) -> io::Result<Self> {
        Ok(Self {
            size_bytes: meta.len(),
            last_modified: DateTime::<Utc>::from(meta.modified()?),
        })
    }
}

/// An open file owned by one request
#[derive(Debug)]
pub struct ResolvedFile {
    pub file: File,
    pub metadata: FileMetadata,
}

/// Outcome of resolving a request path
#[derive(Debug)]
pub enum Resolution {
    Found(ResolvedFile),
    NotFound,
}

/// Directory that request paths are served from
#[derive(Debug, Clone)]
pub struct ContentRoot {
    root: PathBuf,
    confine: bool,
}

impl ContentRoot {
    pub fn new(root: impl Into<PathBuf>, confine: bool) -> Self {
        Self {
            root: root.into(),
            confine,
        }
    }

    pub fn from_config(config: &ContentConfig) -> Self {
        Self::new(&config.root, config.confine_to_root)
    }

    /// Target on disk for a request path
    fn join(&self, request_path: &str) -> PathBuf {
        self.root.join(request_path.trim_start_matches('/'))
    }

    /// Open the file for `request_path`
    ///
    /// Missing files, directories and (when confined) paths escaping the root
    /// are [`Resolution::NotFound`]. Other I/O failures are returned as errors.
    pub async fn resolve(&self, request_path: &str) -> io::Result<Resolution> {
        let file_path = self.join(request_path);

        if self.confine && !self.is_within_root(request_path, &file_path).await? {
            return Ok(Resolution::NotFound);
        }

        let file = match File::open(&file_path).await {
            Ok(f) => f,
            Err(e) if is_not_found(&e) => return Ok(Resolution::NotFound),
            Err(e) => return Err(e),
        };

        // Stat the open handle so size and mtime describe what we stream
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Ok(Resolution::NotFound);
        }

        Ok(Resolution::Found(ResolvedFile {
            file,
            metadata: FileMetadata::from_std(&meta)?,
        }))
    }

    async fn is_within_root(&self, request_path: &str, file_path: &Path) -> io::Result<bool> {
        let root_canonical = match fs::canonicalize(&self.root).await {
            Ok(p) => p,
            Err(e) if is_not_found(&e) => {
                logger::log_warning(&format!(
                    "Content root not found '{}': {e}",
                    self.root.display()
                ));
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        // File not found is common (404), no need to log
        let file_canonical = match fs::canonicalize(file_path).await {
            Ok(p) => p,
            Err(e) if is_not_found(&e) => return Ok(false),
            Err(e) => return Err(e),
        };

        if file_canonical.starts_with(&root_canonical) {
            Ok(true)
        } else {
            logger::log_warning(&format!(
                "Path traversal attempt blocked: {request_path} -> {}",
                file_canonical.display()
            ));
            Ok(false)
        }
    }
}

/// `ENOTDIR` shows up when a path component is a regular file
fn is_not_found(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}
