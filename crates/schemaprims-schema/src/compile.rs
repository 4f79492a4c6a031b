//! Decoding of schema documents into the node arena.
//!
//! Compilation is eager: every recognized keyword is checked for shape and
//! every pattern is compiled here, so a loaded schema never fails for
//! structural reasons during validation. Unrecognized keywords are ignored.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::error::{escape_pointer_token, Result, SchemaError};
use crate::keywords::{Dependency, Keyword, Pattern, PatternSchema, PrimitiveType};
use crate::node::{KeywordSet, NodeId, RootSchema, SchemaNode};

pub(crate) fn compile(document: &Value, retrieved_from: Option<&Url>) -> Result<RootSchema> {
    let id = match document.get("$id") {
        Some(Value::String(id)) => Some(id.clone()),
        Some(_) => return Err(shape_error("/$id", "must be a string")),
        None => None,
    };
    let base = resolve_base(id.as_deref(), retrieved_from);

    let mut compiler = Compiler {
        base: base.clone(),
        ..Compiler::default()
    };
    let root = compiler.compile(document, "")?;

    debug!(
        nodes = compiler.nodes.len(),
        definitions = compiler.definitions.len(),
        embedded = compiler.embedded.len(),
        base = base.as_ref().map(Url::as_str),
        "compiled schema document"
    );

    Ok(RootSchema {
        nodes: compiler.nodes,
        root,
        definitions: compiler.definitions,
        pointers: compiler.pointers,
        embedded: compiler.embedded,
        scopes: compiler.scopes,
        id,
        base,
    })
}

/// Base for relative references: the `$id` (joined onto the retrieval
/// location when relative), else the retrieval location itself.
fn resolve_base(id: Option<&str>, retrieved_from: Option<&Url>) -> Option<Url> {
    let base = match id {
        Some(id) => match Url::parse(id) {
            Ok(url) => Some(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => retrieved_from
                .and_then(|from| from.join(id).ok())
                .or_else(|| retrieved_from.cloned()),
            Err(_) => retrieved_from.cloned(),
        },
        None => retrieved_from.cloned(),
    };
    base.map(|mut url| {
        url.set_fragment(None);
        url
    })
}

#[derive(Default)]
struct Compiler {
    nodes: Vec<SchemaNode>,
    pointers: HashMap<String, NodeId>,
    definitions: BTreeMap<String, NodeId>,
    /// Absolute URI of each nested `$id` to the pointer of its sub-schema.
    embedded: HashMap<String, String>,
    /// Base of reference nodes that sit below a nested `$id`.
    scopes: HashMap<NodeId, Url>,
    base: Option<Url>,
    nested: bool,
}

impl Compiler {
    fn compile(&mut self, schema: &Value, pointer: &str) -> Result<NodeId> {
        let outer = match schema {
            Value::Object(map) if !pointer.is_empty() => self.enter_id(map, pointer)?,
            _ => None,
        };
        let compiled = self.compile_node(schema, pointer);
        if let Some(outer) = outer {
            (self.base, self.nested) = outer;
        }
        compiled
    }

    fn compile_node(&mut self, schema: &Value, pointer: &str) -> Result<NodeId> {
        let node = match schema {
            Value::Bool(accept) => SchemaNode::Bool(*accept),
            Value::Object(map) => self.compile_object(map, pointer)?,
            other => {
                return Err(shape_error(
                    pointer,
                    format!(
                        "schema must be an object or a boolean, found {}",
                        PrimitiveType::of(other).as_str()
                    ),
                ))
            }
        };

        let id = NodeId(self.nodes.len());
        if let (SchemaNode::Reference(_), true, Some(base)) = (&node, self.nested, &self.base) {
            self.scopes.insert(id, base.clone());
        }
        self.nodes.push(node);
        self.pointers.insert(pointer.to_string(), id);
        Ok(id)
    }

    /// A sub-schema carrying its own `$id` becomes addressable by that URI
    /// and the base for everything below it, itself included. Returns the
    /// outer scope to restore once the sub-schema is compiled.
    fn enter_id(
        &mut self,
        map: &Map<String, Value>,
        pointer: &str,
    ) -> Result<Option<(Option<Url>, bool)>> {
        let id = match map.get("$id") {
            None => return Ok(None),
            Some(Value::String(id)) => id,
            Some(_) => return Err(shape_error(&child(pointer, "$id"), "must be a string")),
        };
        let joined = match Url::parse(id) {
            Ok(url) => Some(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                self.base.as_ref().and_then(|base| base.join(id).ok())
            }
            Err(_) => None,
        };
        let Some(mut base) = joined else {
            // Without an absolute base the `$id` can only be matched as written.
            debug!(pointer, id = id.as_str(), "nested $id has no resolvable base");
            self.embedded
                .entry(id.clone())
                .or_insert_with(|| pointer.to_string());
            return Ok(None);
        };

        base.set_fragment(None);
        if self.base.as_ref() == Some(&base) {
            // A bare `#anchor` names no new resource.
            return Ok(None);
        }

        self.embedded
            .entry(base.to_string())
            .or_insert_with(|| pointer.to_string());
        let outer_base = self.base.replace(base);
        let outer_nested = std::mem::replace(&mut self.nested, true);
        Ok(Some((outer_base, outer_nested)))
    }

    fn compile_object(&mut self, map: &Map<String, Value>, pointer: &str) -> Result<SchemaNode> {
        // Definitions are compiled even next to `$ref` so pointers into them resolve.
        for container in ["definitions", "$defs"] {
            let Some(entries) = map.get(container) else {
                continue;
            };
            let at = child(pointer, container);
            for (name, schema) in expect_object(entries, &at)? {
                let id = self.compile(schema, &child(&at, name))?;
                if pointer.is_empty() {
                    self.definitions.insert(name.clone(), id);
                }
            }
        }

        if let Some(reference) = map.get("$ref") {
            return match reference {
                Value::String(reference) => Ok(SchemaNode::Reference(reference.clone())),
                _ => Err(shape_error(&child(pointer, "$ref"), "must be a string")),
            };
        }

        let mut keywords = Vec::new();
        let mut dependencies = Vec::new();

        for (name, value) in map {
            let at = child(pointer, name);
            let keyword = match name.as_str() {
                "type" => Keyword::Type(parse_types(value, &at)?),
                "enum" => Keyword::Enum(expect_array(value, &at)?.clone()),
                "const" => Keyword::Const(value.clone()),
                "minLength" => Keyword::MinLength(non_negative_integer(value, &at)?),
                "maxLength" => Keyword::MaxLength(non_negative_integer(value, &at)?),
                "pattern" => Keyword::Pattern(compile_pattern(expect_str(value, &at)?, &at)?),
                "maxProperties" => Keyword::MaxProperties(non_negative_integer(value, &at)?),
                "minProperties" => Keyword::MinProperties(non_negative_integer(value, &at)?),
                "required" => Keyword::Required(string_list(value, &at)?),
                "properties" => {
                    let mut properties = BTreeMap::new();
                    for (key, schema) in expect_object(value, &at)? {
                        let id = self.compile(schema, &child(&at, key))?;
                        properties.insert(key.clone(), id);
                    }
                    Keyword::Properties(properties)
                }
                "patternProperties" => {
                    let mut patterns = Vec::new();
                    for (source, schema) in expect_object(value, &at)? {
                        let entry_at = child(&at, source);
                        let pattern = compile_pattern(source, &entry_at)?;
                        let node = self.compile(schema, &entry_at)?;
                        patterns.push(PatternSchema { pattern, node });
                    }
                    Keyword::PatternProperties(patterns)
                }
                "additionalProperties" => Keyword::AdditionalProperties(self.compile(value, &at)?),
                "propertyNames" => Keyword::PropertyNames(self.compile(value, &at)?),
                "dependencies" => {
                    for (trigger, dependency) in expect_object(value, &at)? {
                        let entry_at = child(&at, trigger);
                        let dependency = match dependency {
                            Value::Array(_) => {
                                Dependency::Required(string_list(dependency, &entry_at)?)
                            }
                            schema => Dependency::Schema(self.compile(schema, &entry_at)?),
                        };
                        dependencies.push((trigger.clone(), dependency));
                    }
                    continue;
                }
                "dependentRequired" => {
                    for (trigger, names) in expect_object(value, &at)? {
                        let names = string_list(names, &child(&at, trigger))?;
                        dependencies.push((trigger.clone(), Dependency::Required(names)));
                    }
                    continue;
                }
                "dependentSchemas" => {
                    for (trigger, schema) in expect_object(value, &at)? {
                        let node = self.compile(schema, &child(&at, trigger))?;
                        dependencies.push((trigger.clone(), Dependency::Schema(node)));
                    }
                    continue;
                }
                _ => continue,
            };
            keywords.push(keyword);
        }

        if !dependencies.is_empty() {
            keywords.push(Keyword::Dependencies(dependencies));
        }

        Ok(SchemaNode::Keywords(KeywordSet::new(keywords)))
    }
}

fn child(pointer: &str, token: &str) -> String {
    format!("{pointer}/{}", escape_pointer_token(token))
}

fn shape_error(pointer: &str, message: impl Into<String>) -> SchemaError {
    SchemaError::CompileFailed {
        pointer: pointer.to_string(),
        message: message.into(),
    }
}

fn expect_object<'a>(value: &'a Value, pointer: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| shape_error(pointer, "must be an object"))
}

fn expect_array<'a>(value: &'a Value, pointer: &str) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| shape_error(pointer, "must be an array"))
}

fn expect_str<'a>(value: &'a Value, pointer: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| shape_error(pointer, "must be a string"))
}

fn string_list(value: &Value, pointer: &str) -> Result<Vec<String>> {
    expect_array(value, pointer)?
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| shape_error(pointer, "must be an array of strings"))
        })
        .collect()
}

// Accepts whole floats such as `2.0`, which some encoders emit.
fn non_negative_integer(value: &Value, pointer: &str) -> Result<u64> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    match value.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
        _ => Err(shape_error(pointer, "must be a non-negative integer")),
    }
}

fn parse_types(value: &Value, pointer: &str) -> Result<Vec<PrimitiveType>> {
    let parse = |name: &Value| {
        name.as_str()
            .and_then(PrimitiveType::from_name)
            .ok_or_else(|| shape_error(pointer, format!("unknown type {name}")))
    };
    match value {
        Value::String(_) => Ok(vec![parse(value)?]),
        Value::Array(names) => names.iter().map(parse).collect(),
        _ => Err(shape_error(pointer, "must be a string or an array of strings")),
    }
}

fn compile_pattern(source: &str, pointer: &str) -> Result<Pattern> {
    Pattern::new(source).map_err(|source_err| SchemaError::InvalidPattern {
        pointer: pointer.to_string(),
        pattern: source.to_string(),
        source: source_err,
    })
}
