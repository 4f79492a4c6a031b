use bytes::Bytes;

use crate::error::Result;

/// Outcome of a successful fetch attempt.
///
/// `NotFound` is a soft outcome: the locator is well formed for this
/// strategy but nothing lives there, or the strategy does not handle the
/// locator's scheme at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    Found(Bytes),
    NotFound,
}

impl Fetched {
    /// Returns the fetched bytes, if any.
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            Self::Found(bytes) => Some(bytes),
            Self::NotFound => None,
        }
    }
}

/// A strategy for turning an absolute locator into raw document bytes.
///
/// Implementations are called at most once per distinct locator by the
/// resolver cache, but may be called concurrently for different locators.
/// Fetches are blocking; any timeout belongs to the implementation.
pub trait Fetcher: Send + Sync {
    /// Fetch the document designated by `locator`.
    fn fetch(&self, locator: &str) -> Result<Fetched>;
}

impl<F: Fetcher + ?Sized> Fetcher for std::sync::Arc<F> {
    fn fetch(&self, locator: &str) -> Result<Fetched> {
        (**self).fetch(locator)
    }
}

impl<F: Fetcher + ?Sized> Fetcher for Box<F> {
    fn fetch(&self, locator: &str) -> Result<Fetched> {
        (**self).fetch(locator)
    }
}

/// Fetch strategy that never finds anything.
///
/// Use it when only references local to already-loaded documents may resolve.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFetch;

impl Fetcher for NoFetch {
    fn fetch(&self, _locator: &str) -> Result<Fetched> {
        Ok(Fetched::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn no_fetch_is_always_not_found() {
        assert_eq!(
            NoFetch.fetch("https://example.com/a.json").unwrap(),
            Fetched::NotFound
        );
        assert_eq!(NoFetch.fetch("").unwrap(), Fetched::NotFound);
    }

    #[test]
    fn shared_fetcher_delegates() {
        let fetcher: Arc<dyn Fetcher> = Arc::new(NoFetch);
        assert_eq!(fetcher.fetch("x").unwrap(), Fetched::NotFound);
    }

    #[test]
    fn into_bytes_unwraps_found() {
        let found = Fetched::Found(Bytes::from_static(b"{}"));
        assert_eq!(found.into_bytes().as_deref(), Some(&b"{}"[..]));
        assert_eq!(Fetched::NotFound.into_bytes(), None);
    }
}
