//! Reference resolution with a shared, single-flight document cache.
//!
//! A reference is split into a document part and a fragment. An empty
//! document part, or one naming the referring document itself, resolves
//! inside that document. Anything else is qualified against the referring
//! node's base. A nested `$id` of the referring document answers first;
//! otherwise the document cache is consulted, and a miss fetches and decodes
//! the document exactly once, however many threads ask for it concurrently.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use schemaprims_fetch::{Fetched, Fetcher, NoFetch};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::SchemaError;
use crate::node::{RootSchema, SchemaRef};

/// Outcome of resolving a reference.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// The reference designates this node.
    Found(SchemaRef),
    /// Nothing could be found; the reference may still be satisfiable by
    /// other means, or may be reported as unresolved where it matters.
    NotFound,
    /// A document was fetched but could not be decoded as a schema.
    Undecodable { locator: String, message: String },
}

#[derive(Debug, Clone)]
enum Loaded {
    Document(Arc<RootSchema>),
    Missing,
    Undecodable(String),
}

type Slot = Arc<OnceLock<Loaded>>;

/// Resolves references to schema nodes, caching fetched documents.
///
/// The cache is keyed by absolute locator (fragment stripped), lives as long
/// as the resolver, and is never persisted. Share one resolver between
/// validators to share fetched documents.
pub struct Resolver {
    fetcher: Arc<dyn Fetcher>,
    slots: RwLock<HashMap<String, Slot>>,
}

impl Resolver {
    /// Resolver that only resolves references to registered documents.
    pub fn new() -> Self {
        Self::with_fetcher(NoFetch)
    }

    /// Resolver that fetches unknown documents through `fetcher`.
    pub fn with_fetcher(fetcher: impl Fetcher + 'static) -> Self {
        Self::from_shared(Arc::new(fetcher))
    }

    /// Resolver using an already shared fetcher.
    pub fn from_shared(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Make `document` resolvable under its base location.
    ///
    /// Returns false when the document has no base or the location is
    /// already taken; an existing entry is never replaced, so handles already
    /// handed out stay valid.
    pub fn register(&self, document: Arc<RootSchema>) -> bool {
        match document.base().map(Url::to_string) {
            Some(locator) => self.register_as(&locator, document),
            None => match document.id().map(str::to_string) {
                Some(id) => self.register_as(&id, document),
                None => false,
            },
        }
    }

    /// Make `document` resolvable under an explicit locator.
    pub fn register_as(&self, locator: &str, document: Arc<RootSchema>) -> bool {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if slots.contains_key(locator) {
            return false;
        }
        let slot = OnceLock::new();
        let _ = slot.set(Loaded::Document(document));
        slots.insert(locator.to_string(), Arc::new(slot));
        debug!(locator, "registered schema document");
        true
    }

    /// Number of locators with a cached outcome or an in-flight fetch.
    pub fn cached_locators(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Resolve `reference` as written inside the document `from`.
    pub fn resolve(&self, reference: &str, from: &Arc<RootSchema>) -> Resolution {
        self.resolve_in(reference, from, from.base())
    }

    /// Resolve `reference` as written at the node `at`.
    ///
    /// Relative references below a nested `$id` are qualified against that
    /// `$id` rather than the document base.
    pub fn resolve_at(&self, reference: &str, at: &SchemaRef) -> Resolution {
        let from = at.document();
        self.resolve_in(reference, from, from.scope(at.node_id()))
    }

    fn resolve_in(&self, reference: &str, from: &Arc<RootSchema>, base: Option<&Url>) -> Resolution {
        let (document_part, fragment) = match reference.split_once('#') {
            Some((document_part, fragment)) => (document_part, fragment),
            None => (reference, ""),
        };

        if document_part.is_empty() || from.id() == Some(document_part) {
            return lookup(from, fragment);
        }

        let locator = match qualify(document_part, base) {
            Some(locator) => locator,
            None => {
                // Not a locator; only a nested `$id` or a document registered
                // under this exact name can satisfy it.
                if let Some(resolution) = lookup_embedded(from, document_part, fragment) {
                    return resolution;
                }
                return match self.cached(document_part) {
                    Some(Loaded::Document(document)) => lookup(&document, fragment),
                    _ => {
                        debug!(reference, "reference is not a resolvable locator");
                        Resolution::NotFound
                    }
                };
            }
        };

        if from.base().map(Url::as_str) == Some(locator.as_str()) {
            return lookup(from, fragment);
        }
        if let Some(resolution) = lookup_embedded(from, &locator, fragment) {
            return resolution;
        }

        match self.load(&locator) {
            Loaded::Document(document) => lookup(&document, fragment),
            Loaded::Missing => lookup_embedded(from, document_part, fragment).unwrap_or_else(|| {
                debug!(reference, locator, "reference unresolved after fetch");
                Resolution::NotFound
            }),
            Loaded::Undecodable(message) => Resolution::Undecodable { locator, message },
        }
    }

    fn cached(&self, locator: &str) -> Option<Loaded> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.get(locator).and_then(|slot| slot.get().cloned())
    }

    fn slot(&self, locator: &str) -> Slot {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(locator)
        {
            return slot.clone();
        }
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots.entry(locator.to_string()).or_default().clone()
    }

    fn load(&self, locator: &str) -> Loaded {
        let slot = self.slot(locator);
        if let Some(loaded) = slot.get() {
            debug!(locator, "schema document cache hit");
            return loaded.clone();
        }
        // Concurrent callers block here until the first one finishes.
        slot.get_or_init(|| self.fetch_document(locator)).clone()
    }

    fn fetch_document(&self, locator: &str) -> Loaded {
        debug!(locator, "fetching schema document");
        let bytes = match self.fetcher.fetch(locator) {
            Ok(Fetched::Found(bytes)) => bytes,
            Ok(Fetched::NotFound) => {
                warn!(locator, "referenced schema document not found");
                return Loaded::Missing;
            }
            Err(err) => {
                warn!(locator, error = %err, "fetching referenced schema failed");
                return Loaded::Missing;
            }
        };

        let retrieved_from = Url::parse(locator).ok();
        let decoded = serde_json::from_slice::<Value>(&bytes)
            .map_err(SchemaError::InvalidSchemaJson)
            .and_then(|value| RootSchema::from_value_with_base(&value, retrieved_from.as_ref()));

        match decoded {
            Ok(document) => {
                let document = Arc::new(document);
                if document.base().map(Url::as_str) != Some(locator) {
                    self.register(document.clone());
                }
                Loaded::Document(document)
            }
            Err(err) => {
                warn!(locator, error = %err, "referenced schema document is undecodable");
                Loaded::Undecodable(err.to_string())
            }
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("cached_locators", &self.cached_locators())
            .finish()
    }
}

fn lookup(document: &Arc<RootSchema>, fragment: &str) -> Resolution {
    match document.lookup_fragment(fragment) {
        Some(node) => Resolution::Found(SchemaRef::new(document.clone(), node)),
        None => {
            debug!(fragment, "fragment not present in schema document");
            Resolution::NotFound
        }
    }
}

/// Resolution inside the sub-schema of `document` whose nested `$id` is `uri`.
fn lookup_embedded(document: &Arc<RootSchema>, uri: &str, fragment: &str) -> Option<Resolution> {
    let pointer = document.embedded(uri)?;
    Some(match document.lookup_below(pointer, fragment) {
        Some(node) => Resolution::Found(SchemaRef::new(document.clone(), node)),
        None => {
            debug!(uri, fragment, "fragment not present below nested $id");
            Resolution::NotFound
        }
    })
}

/// Absolute locator for the document part of a reference, fragment removed.
fn qualify(document_part: &str, base: Option<&Url>) -> Option<String> {
    let mut url = match Url::parse(document_part) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(document_part).ok()?,
        Err(_) => return None,
    };
    url.set_fragment(None);
    Some(url.to_string())
}
