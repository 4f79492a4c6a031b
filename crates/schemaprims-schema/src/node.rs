use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use serde_json::Value;
use url::Url;

use crate::compile;
use crate::error::{Result, SchemaError};
use crate::keywords::{Keyword, KeywordKind};

/// Stable handle of a node inside the arena of one [`RootSchema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One unit of the schema graph.
#[derive(Debug, Clone)]
pub enum SchemaNode {
    /// `true` accepts every value, `false` rejects every value.
    Bool(bool),
    /// Must be resolved before anything else; sibling keywords are ignored.
    Reference(String),
    /// Active keywords, evaluated in [`KeywordKind`] order.
    Keywords(KeywordSet),
}

/// The active keywords of a node, kept sorted by evaluation order.
#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    keywords: Vec<Keyword>,
}

impl KeywordSet {
    pub(crate) fn new(mut keywords: Vec<Keyword>) -> Self {
        keywords.sort_by_key(Keyword::kind);
        Self { keywords }
    }

    pub fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }

    pub fn get(&self, kind: KeywordKind) -> Option<&Keyword> {
        self.keywords.iter().find(|keyword| keyword.kind() == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Whether `key` is claimed by this node's `properties` or by any of its
    /// `patternProperties` patterns.
    ///
    /// `additionalProperties` applies to exactly the keys this returns false
    /// for, so the three keywords partition an object's keys.
    pub fn claims(&self, key: &str) -> bool {
        self.keywords.iter().any(|keyword| match keyword {
            Keyword::Properties(properties) => properties.contains_key(key),
            Keyword::PatternProperties(patterns) => {
                patterns.iter().any(|entry| entry.pattern.is_match(key))
            }
            _ => false,
        })
    }
}

/// A compiled schema document.
///
/// Every node of the document is owned by this arena; references between
/// nodes are plain [`NodeId`]s, so a cyclic schema is just a cyclic index
/// graph. Immutable once built and safe to share across threads.
#[derive(Debug)]
pub struct RootSchema {
    pub(crate) nodes: Vec<SchemaNode>,
    pub(crate) root: NodeId,
    pub(crate) definitions: BTreeMap<String, NodeId>,
    pub(crate) pointers: HashMap<String, NodeId>,
    pub(crate) embedded: HashMap<String, String>,
    pub(crate) scopes: HashMap<NodeId, Url>,
    pub(crate) id: Option<String>,
    pub(crate) base: Option<Url>,
}

impl RootSchema {
    /// Compile a schema document.
    pub fn from_value(document: &Value) -> Result<Self> {
        compile::compile(document, None)
    }

    /// Compile a schema document retrieved from `base`.
    ///
    /// Relative references, and a relative `$id`, are resolved against it.
    pub fn from_value_with_base(document: &Value, base: Option<&Url>) -> Result<Self> {
        compile::compile(document, base)
    }

    /// Parse and compile a JSON schema document from bytes.
    pub fn from_slice(json: &[u8]) -> Result<Self> {
        let document: Value =
            serde_json::from_slice(json).map_err(SchemaError::InvalidSchemaJson)?;
        Self::from_value(&document)
    }

    /// Handle of the top-level node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Look up a node by handle.
    ///
    /// Handles are only meaningful for the document that produced them.
    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The document's `$id`, as written.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Absolute location used to qualify relative references.
    pub fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    /// Named entry from `definitions` or `$defs`.
    pub fn definition(&self, name: &str) -> Option<NodeId> {
        self.definitions.get(name).copied()
    }

    /// All named definitions, sorted by name.
    pub fn definitions(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.definitions
            .iter()
            .map(|(name, id)| (name.as_str(), *id))
    }

    /// Base that relative references written at `node` resolve against: the
    /// closest enclosing nested `$id`, else the document base.
    pub fn scope(&self, node: NodeId) -> Option<&Url> {
        self.scopes.get(&node).or(self.base.as_ref())
    }

    /// Pointer of the sub-schema whose nested `$id` resolves to `uri`.
    pub fn embedded(&self, uri: &str) -> Option<&str> {
        self.embedded.get(uri).map(String::as_str)
    }

    /// Resolve a fragment (without the leading `#`) inside this document.
    ///
    /// The empty fragment designates the root; anything else is a
    /// percent-encoded JSON pointer to a sub-schema, e.g. `/definitions/node`.
    pub fn lookup_fragment(&self, fragment: &str) -> Option<NodeId> {
        if fragment.is_empty() {
            return Some(self.root);
        }
        self.lookup_below("", fragment)
    }

    /// Resolve a fragment relative to the sub-schema at `pointer`.
    pub(crate) fn lookup_below(&self, pointer: &str, fragment: &str) -> Option<NodeId> {
        let fragment = percent_decode_str(fragment).decode_utf8().ok()?;
        self.pointers.get(&format!("{pointer}{fragment}")).copied()
    }
}

impl FromStr for RootSchema {
    type Err = SchemaError;

    /// Parse and compile a JSON schema document.
    fn from_str(json: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(json).map_err(SchemaError::InvalidSchemaJson)?;
        Self::from_value(&document)
    }
}

/// A node together with the document that owns it.
///
/// Two handles designate the same node when they share the document
/// allocation and the node index; resolution relies on this identity.
#[derive(Clone)]
pub struct SchemaRef {
    document: Arc<RootSchema>,
    node: NodeId,
}

impl SchemaRef {
    pub fn new(document: Arc<RootSchema>, node: NodeId) -> Self {
        Self { document, node }
    }

    /// Handle of the document's root node.
    pub fn root(document: Arc<RootSchema>) -> Self {
        let node = document.root();
        Self { document, node }
    }

    pub fn document(&self) -> &Arc<RootSchema> {
        &self.document
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn node(&self) -> &SchemaNode {
        self.document.node(self.node)
    }

    /// Identity comparison: same document allocation, same node.
    pub fn same_node(&self, other: &SchemaRef) -> bool {
        Arc::ptr_eq(&self.document, &other.document) && self.node == other.node
    }
}

impl fmt::Debug for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRef")
            .field("document", &self.document.base().map(Url::as_str))
            .field("node", &self.node)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn lookup_fragment_designates_root_and_pointers() {
        let schema = RootSchema::from_value(&json!({
            "properties": { "a": { "type": "string" } },
            "definitions": { "node": { "maxProperties": 1 } }
        }))
        .unwrap();

        assert_eq!(schema.lookup_fragment(""), Some(schema.root()));
        assert_eq!(
            schema.lookup_fragment("/definitions/node"),
            schema.definition("node")
        );
        assert!(schema.lookup_fragment("/properties/a").is_some());
        assert_eq!(schema.lookup_fragment("/properties/missing"), None);
    }

    #[test]
    fn fragments_are_percent_decoded_before_pointer_lookup() {
        let schema = RootSchema::from_value(&json!({
            "definitions": {
                "a%b": true,
                "with space": true,
                "tilde~field": true,
                "caf\u{e9}": true
            }
        }))
        .unwrap();

        assert_eq!(
            schema.lookup_fragment("/definitions/a%25b"),
            schema.definition("a%b")
        );
        assert_eq!(
            schema.lookup_fragment("/definitions/with%20space"),
            schema.definition("with space")
        );
        assert_eq!(
            schema.lookup_fragment("/definitions/tilde~0field"),
            schema.definition("tilde~field")
        );
        assert_eq!(
            schema.lookup_fragment("/definitions/caf%C3%A9"),
            schema.definition("caf\u{e9}")
        );
        assert_eq!(schema.lookup_fragment("/definitions/%FF"), None);
    }

    #[test]
    fn nested_ids_are_addressable_and_scope_their_references() {
        let schema = RootSchema::from_value(&json!({
            "$id": "http://localhost:1234/root.json",
            "properties": { "top": { "$ref": "item.json" } },
            "definitions": {
                "folder": {
                    "$id": "folder/",
                    "properties": { "inner": { "$ref": "item.json" } },
                    "definitions": { "leaf": { "$id": "leaf.json", "type": "string" } }
                }
            }
        }))
        .unwrap();

        assert_eq!(
            schema.embedded("http://localhost:1234/folder/"),
            Some("/definitions/folder")
        );
        assert_eq!(
            schema.embedded("http://localhost:1234/folder/leaf.json"),
            Some("/definitions/folder/definitions/leaf")
        );
        assert_eq!(schema.embedded("http://localhost:1234/leaf.json"), None);

        let top = schema.lookup_fragment("/properties/top").unwrap();
        let inner = schema
            .lookup_fragment("/definitions/folder/properties/inner")
            .unwrap();
        assert_eq!(
            schema.scope(top).map(Url::as_str),
            Some("http://localhost:1234/root.json")
        );
        assert_eq!(
            schema.scope(inner).map(Url::as_str),
            Some("http://localhost:1234/folder/")
        );
    }

    #[test]
    fn keyword_set_claims_named_and_pattern_keys() {
        let schema = RootSchema::from_value(&json!({
            "properties": { "id": true },
            "patternProperties": { "^S_": true, "_x$": true }
        }))
        .unwrap();
        let SchemaNode::Keywords(set) = schema.node(schema.root()) else {
            panic!("expected keyword set");
        };

        assert!(set.claims("id"));
        assert!(set.claims("S_name"));
        assert!(set.claims("a_x"));
        assert!(!set.claims("other"));
    }

    #[test]
    fn schema_refs_compare_by_identity() {
        let document = json!({ "definitions": { "a": {}, "b": {} } });
        let first = Arc::new(RootSchema::from_value(&document).unwrap());
        let second = Arc::new(RootSchema::from_value(&document).unwrap());
        let a = first.definition("a").unwrap();

        assert!(SchemaRef::new(first.clone(), a).same_node(&SchemaRef::new(first.clone(), a)));
        assert!(!SchemaRef::new(first.clone(), a).same_node(&SchemaRef::new(second, a)));
        assert!(!SchemaRef::new(first.clone(), a)
            .same_node(&SchemaRef::new(first.clone(), first.definition("b").unwrap())));
    }

    #[test]
    fn keywords_are_kept_in_evaluation_order() {
        let schema = RootSchema::from_value(&json!({
            "dependencies": { "a": ["b"] },
            "additionalProperties": false,
            "required": ["a"],
            "maxProperties": 3
        }))
        .unwrap();
        let SchemaNode::Keywords(set) = schema.node(schema.root()) else {
            panic!("expected keyword set");
        };
        let kinds: Vec<KeywordKind> = set.keywords().iter().map(Keyword::kind).collect();

        assert_eq!(
            kinds,
            vec![
                KeywordKind::MaxProperties,
                KeywordKind::Required,
                KeywordKind::AdditionalProperties,
                KeywordKind::Dependencies,
            ]
        );
    }
}
