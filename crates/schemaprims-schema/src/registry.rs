use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use schemaprims_fetch::{Fetched, Fetcher, FileFetcher, FileFetcherConfig};
use serde_json::{Map, Value};
use tracing::{debug, info};
use url::Url;

use crate::config::RegistryConfig;
use crate::error::{Result, SchemaError};
use crate::node::RootSchema;
use crate::resolver::Resolver;
use crate::validator::Validator;

const SCHEMA_SUFFIX: &str = ".schema.json";

/// Name-keyed registry of compiled schemas sharing one [`Resolver`].
///
/// A document referenced by several registered schemas is fetched and
/// compiled once for the whole registry.
pub struct SchemaRegistry {
    validators: HashMap<String, Validator>,
    resolver: Arc<Resolver>,
    config: RegistryConfig,
}

impl SchemaRegistry {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self::with_resolver(config, Arc::new(Resolver::new()))
    }

    /// Create an empty registry resolving references through `resolver`.
    pub fn with_resolver(config: RegistryConfig, resolver: Arc<Resolver>) -> Self {
        Self {
            validators: HashMap::new(),
            resolver,
            config,
        }
    }

    /// Register a schema under `name` from a JSON string.
    pub fn register(&mut self, name: &str, schema_json: &str) -> Result<()> {
        let schema: Value =
            serde_json::from_str(schema_json).map_err(SchemaError::InvalidSchemaJson)?;
        self.register_value(name, &schema)
    }

    /// Register a schema under `name` from a JSON value.
    pub fn register_value(&mut self, name: &str, schema: &Value) -> Result<()> {
        self.register_value_with_base(name, schema, None)
    }

    /// Register a schema under `name` as if it had been retrieved from `base`.
    ///
    /// Relative references inside it resolve against `base`, and other
    /// schemas can reference it there.
    pub fn register_value_with_base(
        &mut self,
        name: &str,
        schema: &Value,
        base: Option<&Url>,
    ) -> Result<()> {
        let compiled = if self.config.strict_mode {
            let mut strict = schema.clone();
            apply_strict_mode(&mut strict);
            RootSchema::from_value_with_base(&strict, base)?
        } else {
            RootSchema::from_value_with_base(schema, base)?
        };

        let compiled = Arc::new(compiled);
        if let Some(base) = base {
            self.resolver.register_as(base.as_str(), compiled.clone());
        }
        let validator =
            Validator::with_resolver(compiled, self.resolver.clone(), self.config.validator_config());

        debug!(name, "registered schema");
        self.validators.insert(name.to_string(), validator);
        Ok(())
    }

    /// Load `*.schema.json` files from a directory.
    pub fn from_directory(path: &Path) -> Result<Self> {
        Self::from_directory_with_config(path, RegistryConfig::default())
    }

    /// Load `*.schema.json` files from a directory with explicit config.
    ///
    /// Each schema is registered under its file stem. References between
    /// files in the directory resolve relative to each file's location, and
    /// documents not loaded here are fetched from the same directory only.
    pub fn from_directory_with_config(path: &Path, config: RegistryConfig) -> Result<Self> {
        let root = path
            .canonicalize()
            .map_err(|err| SchemaError::LoadFailed(format!("{}: {err}", path.display())))?;
        let fetcher = FileFetcher::with_config(FileFetcherConfig {
            root: Some(root.clone()),
            max_document_size: config.max_schema_file_size,
            allow_symlinks: false,
        });
        let resolver = Arc::new(Resolver::with_fetcher(fetcher.clone()));
        let mut registry = Self::with_resolver(config, resolver);
        let mut loaded_schema_count = 0usize;

        let entries = std::fs::read_dir(&root)
            .map_err(|err| SchemaError::LoadFailed(format!("{}: {err}", root.display())))?;
        let mut entries = entries
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let is_schema_file = file_name.ends_with(SCHEMA_SUFFIX);
            let entry_path = entry.path();
            let path_metadata = std::fs::symlink_metadata(&entry_path)
                .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
            let file_type = path_metadata.file_type();

            if file_type.is_symlink() {
                if is_schema_file {
                    return Err(SchemaError::LoadFailed(format!(
                        "refusing to load schema symlink: {file_name}"
                    )));
                }
                continue;
            }
            if !file_type.is_file() || !is_schema_file {
                continue;
            }

            let name = match schema_name_from_file_name(&file_name) {
                Some(name) => name,
                None => {
                    return Err(SchemaError::LoadFailed(format!(
                        "unrecognized schema filename: {file_name}"
                    )))
                }
            };

            loaded_schema_count = loaded_schema_count.saturating_add(1);
            if loaded_schema_count > registry.config.max_schemas_from_directory {
                return Err(SchemaError::LoadFailed(format!(
                    "schema count exceeds configured max ({}): {}",
                    registry.config.max_schemas_from_directory, loaded_schema_count
                )));
            }

            let locator = Url::from_file_path(&entry_path).map_err(|()| {
                SchemaError::LoadFailed(format!(
                    "schema path is not absolute: {}",
                    entry_path.display()
                ))
            })?;
            let content = match fetcher.fetch(locator.as_str()) {
                Ok(Fetched::Found(bytes)) => bytes,
                Ok(Fetched::NotFound) => {
                    return Err(SchemaError::LoadFailed(format!(
                        "schema disappeared during load: {file_name}"
                    )))
                }
                Err(err) => return Err(SchemaError::LoadFailed(err.to_string())),
            };

            let schema: Value =
                serde_json::from_slice(&content).map_err(SchemaError::InvalidSchemaJson)?;
            registry.register_value_with_base(name, &schema, Some(&locator))?;
        }

        info!(
            dir = %root.display(),
            count = loaded_schema_count,
            "loaded schemas from directory"
        );
        Ok(registry)
    }

    /// Load from embedded `(name, schema)` strings.
    pub fn from_embedded(schemas: &[(&str, &str)]) -> Result<Self> {
        let mut registry = Self::new();
        for (name, schema) in schemas {
            registry.register(name, schema)?;
        }
        Ok(registry)
    }

    /// Validate a value against the schema registered under `name`.
    pub fn validate(&self, name: &str, value: &Value) -> Result<()> {
        match self.validators.get(name) {
            Some(validator) => validator.validate(value),
            None if self.config.fail_on_missing_schema => Err(SchemaError::NoSchema(name.to_string())),
            None => Ok(()),
        }
    }

    /// Parse a JSON payload and validate it against the schema under `name`.
    pub fn validate_bytes(&self, name: &str, payload: &[u8]) -> Result<()> {
        match self.validators.get(name) {
            Some(validator) => {
                let value: Value = serde_json::from_slice(payload)?;
                validator.validate(&value)
            }
            None if self.config.fail_on_missing_schema => Err(SchemaError::NoSchema(name.to_string())),
            None => Ok(()),
        }
    }

    /// Check if a name has a registered schema.
    pub fn has_schema(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    /// The validator registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Validator> {
        self.validators.get(name)
    }

    /// Get registered schema names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.validators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Get registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// The resolver shared by every registered schema.
    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn schema_name_from_file_name(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(SCHEMA_SUFFIX)
        .filter(|name| !name.is_empty())
}

fn apply_strict_mode(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if is_object_schema(map) && !map.contains_key("additionalProperties") {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
            }

            recurse_object_schema_children(map);
        }
        Value::Array(items) => {
            for item in items {
                apply_strict_mode(item);
            }
        }
        _ => {}
    }
}

fn recurse_object_schema_children(map: &mut Map<String, Value>) {
    recurse_map_schemas(map, "properties");
    recurse_map_schemas(map, "patternProperties");
    recurse_map_schemas(map, "dependentSchemas");
    recurse_map_schemas(map, "dependencies");
    recurse_map_schemas(map, "$defs");
    recurse_map_schemas(map, "definitions");

    recurse_single_schema(map, "propertyNames");
    recurse_single_schema(map, "additionalProperties");
}

fn recurse_map_schemas(map: &mut Map<String, Value>, key: &str) {
    if let Some(Value::Object(obj)) = map.get_mut(key) {
        for value in obj.values_mut() {
            apply_strict_mode(value);
        }
    }
}

fn recurse_single_schema(map: &mut Map<String, Value>, key: &str) {
    if let Some(value) = map.get_mut(key) {
        apply_strict_mode(value);
    }
}

fn is_object_schema(map: &Map<String, Value>) -> bool {
    match map.get("type") {
        Some(Value::String(kind)) => kind == "object",
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| matches!(item, Value::String(kind) if kind == "object")),
        _ => is_object_keyword_schema(map),
    }
}

fn is_object_keyword_schema(map: &Map<String, Value>) -> bool {
    const OBJECT_KEYWORDS: [&str; 9] = [
        "properties",
        "patternProperties",
        "additionalProperties",
        "required",
        "maxProperties",
        "minProperties",
        "dependencies",
        "dependentRequired",
        "propertyNames",
    ];

    OBJECT_KEYWORDS
        .iter()
        .any(|keyword| map.contains_key(*keyword))
}
