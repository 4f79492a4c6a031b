use std::path::PathBuf;

/// Errors that can occur while fetching a referenced document.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Reading the document failed.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The document exceeds the configured maximum size.
    #[error("document too large ({size} bytes, max {max}): {locator}")]
    TooLarge {
        locator: String,
        size: u64,
        max: usize,
    },

    /// The locator resolves to a symlink and symlinks are not allowed.
    #[error("refusing to follow symlink: {0}")]
    Symlink(PathBuf),

    /// The locator resolves outside the configured root directory.
    #[error("path escapes fetch root: {0}")]
    OutsideRoot(PathBuf),

    /// The file was replaced between the metadata check and the open.
    #[error("document changed during fetch: {0}")]
    Changed(PathBuf),
}

pub type Result<T> = std::result::Result<T, FetchError>;
