use std::io::Read;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;
use url::Url;

use crate::error::{FetchError, Result};
use crate::traits::{Fetched, Fetcher};

/// Default maximum size of a fetched document.
pub const DEFAULT_MAX_DOCUMENT_SIZE: usize = 1024 * 1024;

/// Controls how [`FileFetcher`] reads documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFetcherConfig {
    /// When set, only files under this directory may be fetched.
    pub root: Option<PathBuf>,
    /// Maximum bytes read per document.
    pub max_document_size: usize,
    /// When false, locators resolving to a symlink are rejected.
    pub allow_symlinks: bool,
}

impl Default for FileFetcherConfig {
    fn default() -> Self {
        Self {
            root: None,
            max_document_size: DEFAULT_MAX_DOCUMENT_SIZE,
            allow_symlinks: false,
        }
    }
}

/// Fetches `file://` locators from the local filesystem.
///
/// Locators with any other scheme, and files that do not exist, are reported
/// as [`Fetched::NotFound`].
#[derive(Debug, Clone, Default)]
pub struct FileFetcher {
    config: FileFetcherConfig,
}

impl FileFetcher {
    /// Create a fetcher with default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fetcher with explicit config.
    pub fn with_config(config: FileFetcherConfig) -> Self {
        Self { config }
    }

    /// Create a fetcher confined to `root`.
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self::with_config(FileFetcherConfig {
            root: Some(root.into()),
            ..FileFetcherConfig::default()
        })
    }

    /// Get fetcher configuration.
    pub fn config(&self) -> &FileFetcherConfig {
        &self.config
    }

    fn read_document(&self, locator: &str, path: &Path) -> Result<Fetched> {
        if let Some(root) = &self.config.root {
            if !path.starts_with(root) {
                return Err(FetchError::OutsideRoot(path.to_path_buf()));
            }
        }

        let path_metadata = match std::fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Fetched::NotFound)
            }
            Err(source) => {
                return Err(FetchError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        if path_metadata.file_type().is_symlink() && !self.config.allow_symlinks {
            return Err(FetchError::Symlink(path.to_path_buf()));
        }

        let file = std::fs::File::open(path).map_err(|source| FetchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let opened_metadata = file.metadata().map_err(|source| FetchError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if !opened_metadata.is_file() {
            return Ok(Fetched::NotFound);
        }

        #[cfg(unix)]
        {
            if !path_metadata.file_type().is_symlink()
                && !same_file_identity(&path_metadata, &opened_metadata)
            {
                return Err(FetchError::Changed(path.to_path_buf()));
            }
        }

        let max = self.config.max_document_size;
        if opened_metadata.len() > max as u64 {
            return Err(FetchError::TooLarge {
                locator: locator.to_string(),
                size: opened_metadata.len(),
                max,
            });
        }

        let read_limit = u64::try_from(max.saturating_add(1)).unwrap_or(u64::MAX);
        let mut content = Vec::new();
        file.take(read_limit)
            .read_to_end(&mut content)
            .map_err(|source| FetchError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if content.len() > max {
            return Err(FetchError::TooLarge {
                locator: locator.to_string(),
                size: content.len() as u64,
                max,
            });
        }

        debug!(locator, size = content.len(), "read schema document from disk");
        Ok(Fetched::Found(Bytes::from(content)))
    }
}

impl Fetcher for FileFetcher {
    fn fetch(&self, locator: &str) -> Result<Fetched> {
        let url = match Url::parse(locator) {
            Ok(url) if url.scheme() == "file" => url,
            _ => return Ok(Fetched::NotFound),
        };
        let path = match url.to_file_path() {
            Ok(path) => path,
            Err(()) => return Ok(Fetched::NotFound),
        };
        self.read_document(locator, &path)
    }
}

#[cfg(unix)]
fn same_file_identity(
    path_metadata: &std::fs::Metadata,
    opened_metadata: &std::fs::Metadata,
) -> bool {
    use std::os::unix::fs::MetadataExt;
    path_metadata.dev() == opened_metadata.dev() && path_metadata.ino() == opened_metadata.ino()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "schemaprims-fetch-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn file_locator(path: &Path) -> String {
        Url::from_file_path(path).unwrap().to_string()
    }

    #[test]
    fn reads_existing_file() {
        let dir = make_temp_dir("read");
        let path = dir.join("a.schema.json");
        std::fs::write(&path, br#"{"type":"object"}"#).unwrap();

        let fetched = FileFetcher::new().fetch(&file_locator(&path)).unwrap();
        assert_eq!(
            fetched,
            Fetched::Found(Bytes::from_static(br#"{"type":"object"}"#))
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_and_foreign_scheme_are_not_found() {
        let dir = make_temp_dir("missing");
        let fetcher = FileFetcher::new();

        assert_eq!(
            fetcher
                .fetch(&file_locator(&dir.join("nope.json")))
                .unwrap(),
            Fetched::NotFound
        );
        assert_eq!(
            fetcher.fetch("https://example.com/a.json").unwrap(),
            Fetched::NotFound
        );
        assert_eq!(fetcher.fetch("not a url").unwrap(), Fetched::NotFound);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn size_limit_is_enforced() {
        let dir = make_temp_dir("size");
        let path = dir.join("big.json");
        std::fs::write(&path, br#"{"type":"object"}"#).unwrap();

        let fetcher = FileFetcher::with_config(FileFetcherConfig {
            max_document_size: 8,
            ..FileFetcherConfig::default()
        });
        assert!(matches!(
            fetcher.fetch(&file_locator(&path)),
            Err(FetchError::TooLarge { max: 8, .. })
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn root_confinement_is_enforced() {
        let dir = make_temp_dir("root");
        let inner = dir.join("inner");
        std::fs::create_dir_all(&inner).unwrap();
        let outside = dir.join("outside.json");
        std::fs::write(&outside, b"{}").unwrap();

        let fetcher = FileFetcher::rooted(&inner);
        assert!(matches!(
            fetcher.fetch(&file_locator(&outside)),
            Err(FetchError::OutsideRoot(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_rejected_by_default() {
        let dir = make_temp_dir("symlink");
        let target = dir.join("target.json");
        std::fs::write(&target, b"{}").unwrap();
        let link = dir.join("link.json");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert!(matches!(
            FileFetcher::new().fetch(&file_locator(&link)),
            Err(FetchError::Symlink(_))
        ));

        let permissive = FileFetcher::with_config(FileFetcherConfig {
            allow_symlinks: true,
            ..FileFetcherConfig::default()
        });
        assert!(matches!(
            permissive.fetch(&file_locator(&link)).unwrap(),
            Fetched::Found(_)
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
