use std::collections::HashMap;

use bytes::Bytes;
use tracing::debug;

use crate::error::Result;
use crate::traits::{Fetched, Fetcher};

/// In-memory documents keyed by exact locator.
///
/// Useful for embedding well-known schemas into a binary and for tests.
#[derive(Debug, Clone, Default)]
pub struct MapFetcher {
    documents: HashMap<String, Bytes>,
}

impl MapFetcher {
    /// Create an empty fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document, replacing any previous document at `locator`.
    pub fn insert(&mut self, locator: impl Into<String>, document: impl Into<Bytes>) {
        self.documents.insert(locator.into(), document.into());
    }

    /// Builder-style variant of [`MapFetcher::insert`].
    pub fn with_document(mut self, locator: impl Into<String>, document: impl Into<Bytes>) -> Self {
        self.insert(locator, document);
        self
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether no documents are stored.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl Fetcher for MapFetcher {
    fn fetch(&self, locator: &str) -> Result<Fetched> {
        match self.documents.get(locator) {
            Some(document) => {
                debug!(locator, size = document.len(), "serving embedded document");
                Ok(Fetched::Found(document.clone()))
            }
            None => Ok(Fetched::NotFound),
        }
    }
}

impl<L, D> FromIterator<(L, D)> for MapFetcher
where
    L: Into<String>,
    D: Into<Bytes>,
{
    fn from_iter<I: IntoIterator<Item = (L, D)>>(iter: I) -> Self {
        let mut fetcher = Self::new();
        for (locator, document) in iter {
            fetcher.insert(locator, document);
        }
        fetcher
    }
}
