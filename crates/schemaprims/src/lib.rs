//! Schema validation with cached, cycle-safe reference resolution.
//!
//! schemaprims compiles JSON schema documents into an immutable node graph and
//! validates `serde_json` values against it. References are resolved lazily
//! through a shared cache, so a document is fetched and decoded once however
//! many references point into it, and cyclic schemas terminate.
//!
//! # Crate Structure
//!
//! - [`fetch`]: strategies that turn a locator into document bytes
//! - [`schema`]: compiler, resolver, validator and registry

/// Re-export fetch types.
pub mod fetch {
    pub use schemaprims_fetch::*;
}

/// Re-export schema types.
pub mod schema {
    pub use schemaprims_schema::*;
}
