//! Schema validation engine with cached, cycle-safe reference resolution.
//!
//! A schema document is compiled once into a [`RootSchema`]: an arena of
//! [`SchemaNode`]s addressed by [`NodeId`]. References between nodes, and
//! across documents, are resolved lazily by a shared [`Resolver`] whose cache
//! guarantees one fetch per locator. A [`Validator`] walks the graph against a
//! `serde_json::Value` and reports the first failure as a structured
//! [`ValidationError`].
//!
//! ```
//! use schemaprims_schema::Validator;
//! use serde_json::json;
//!
//! let validator = Validator::from_value(&json!({"required": ["a", "b"]})).unwrap();
//! assert!(validator.is_valid(&json!({"a": 1, "b": null})));
//! assert!(!validator.is_valid(&json!({"a": 1})));
//! ```

mod compile;
pub mod config;
pub mod error;
pub mod keywords;
pub mod node;
pub mod registry;
pub mod resolver;
pub mod validator;

pub use config::{RegistryConfig, ValidatorConfig, DEFAULT_MAX_DEPTH};
pub use error::{Result, SchemaError, ValidationError};
pub use keywords::{Dependency, Keyword, KeywordKind, Pattern, PatternSchema, PrimitiveType};
pub use node::{KeywordSet, NodeId, RootSchema, SchemaNode, SchemaRef};
pub use registry::SchemaRegistry;
pub use resolver::{Resolution, Resolver};
pub use validator::Validator;
