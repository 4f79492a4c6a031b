//! Pluggable fetch strategies for remote schema references.
//!
//! The validation engine never talks to a network or filesystem directly.
//! Whenever a reference points outside the document being validated, the
//! resolver hands the absolute locator to a [`Fetcher`] and gets back raw
//! bytes, a soft "not found", or an error.
//!
//! Provided strategies:
//! - [`NoFetch`]: never finds anything (local references only)
//! - [`MapFetcher`]: in-memory documents keyed by locator
//! - [`FileFetcher`]: `file://` locators read from disk with size limits

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{FetchError, Result};
pub use file::{FileFetcher, FileFetcherConfig, DEFAULT_MAX_DOCUMENT_SIZE};
pub use memory::MapFetcher;
pub use traits::{Fetched, Fetcher, NoFetch};
