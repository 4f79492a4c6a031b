use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use crate::config::ValidatorConfig;
use crate::error::{Result, SchemaError, ValidationError};
use crate::keywords::{Dependency, Keyword, KeywordKind};
use crate::node::{KeywordSet, NodeId, RootSchema, SchemaNode, SchemaRef};
use crate::resolver::{Resolution, Resolver};

/// Validates values against a compiled schema.
///
/// Cheap to share: the schema and resolver are behind `Arc`, and validation
/// never mutates anything except the resolver cache.
#[derive(Debug, Clone)]
pub struct Validator {
    schema: Arc<RootSchema>,
    resolver: Arc<Resolver>,
    config: ValidatorConfig,
}

impl Validator {
    /// Validator for `schema` that only resolves references inside it.
    pub fn new(schema: RootSchema) -> Self {
        Self::with_config(schema, ValidatorConfig::default())
    }

    /// Validator with explicit config and a private resolver.
    pub fn with_config(schema: RootSchema, config: ValidatorConfig) -> Self {
        Self::with_resolver(Arc::new(schema), Arc::new(Resolver::new()), config)
    }

    /// Validator sharing `resolver` (and its cache) with other validators.
    ///
    /// The schema is registered with the resolver so other documents can
    /// reference it by its base location.
    pub fn with_resolver(
        schema: Arc<RootSchema>,
        resolver: Arc<Resolver>,
        config: ValidatorConfig,
    ) -> Self {
        resolver.register(schema.clone());
        Self {
            schema,
            resolver,
            config,
        }
    }

    /// Compile `schema` and build a validator for it.
    pub fn from_value(schema: &Value) -> Result<Self> {
        Ok(Self::new(RootSchema::from_value(schema)?))
    }

    /// Check `value` against the schema, stopping at the first failure.
    pub fn validate(&self, value: &Value) -> Result<()> {
        let mut walk = Walk {
            resolver: &self.resolver,
            max_depth: self.config.max_depth,
            active: Vec::new(),
        };
        walk.check(&self.schema, self.schema.root(), value)
    }

    /// Whether `value` conforms; schema faults also count as non-conforming.
    pub fn is_valid(&self, value: &Value) -> bool {
        self.validate(value).is_ok()
    }

    pub fn schema(&self) -> &Arc<RootSchema> {
        &self.schema
    }

    pub fn resolver(&self) -> &Arc<Resolver> {
        &self.resolver
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }
}

/// (document address, node, value address) of an evaluation in progress.
type Frame = (usize, NodeId, usize);

struct Walk<'r> {
    resolver: &'r Resolver,
    max_depth: usize,
    active: Vec<Frame>,
}

impl Walk<'_> {
    fn check(&mut self, document: &Arc<RootSchema>, node: NodeId, value: &Value) -> Result<()> {
        let frame = (
            Arc::as_ptr(document) as usize,
            node,
            value as *const Value as usize,
        );
        // The same node is already checking this very value further up the
        // stack; whatever it concludes covers this evaluation too.
        if self.active.contains(&frame) {
            trace!(node = node.index(), "re-entered active schema node");
            return Ok(());
        }
        if self.active.len() >= self.max_depth {
            return Err(SchemaError::DepthExceeded {
                max_depth: self.max_depth,
            });
        }

        self.active.push(frame);
        let result = self.check_node(document, node, value);
        self.active.pop();
        result
    }

    fn check_node(&mut self, document: &Arc<RootSchema>, node: NodeId, value: &Value) -> Result<()> {
        match document.node(node) {
            SchemaNode::Bool(true) => Ok(()),
            SchemaNode::Bool(false) => Err(ValidationError::new(
                KeywordKind::FalseSchema,
                "schema forbids any value",
            )
            .into()),
            SchemaNode::Reference(reference) => {
                let at = SchemaRef::new(document.clone(), node);
                self.check_reference(&at, reference, value)
            }
            SchemaNode::Keywords(set) => {
                for keyword in set.keywords() {
                    self.check_keyword(document, set, keyword, value)?;
                }
                Ok(())
            }
        }
    }

    fn check_reference(&mut self, at: &SchemaRef, reference: &str, value: &Value) -> Result<()> {
        match self.resolver.resolve_at(reference, at) {
            Resolution::Found(target) => self
                .check(target.document(), target.node_id(), value)
                .map_err(|err| err.map_validation(|err| err.under(&["$ref"]))),
            Resolution::NotFound => Err(ValidationError::new(
                KeywordKind::Ref,
                format!("reference unresolved: {reference}"),
            )
            .into()),
            Resolution::Undecodable { message, .. } => Err(SchemaError::UndecodableReference {
                reference: reference.to_string(),
                message,
            }),
        }
    }

    fn check_keyword(
        &mut self,
        document: &Arc<RootSchema>,
        set: &KeywordSet,
        keyword: &Keyword,
        value: &Value,
    ) -> Result<()> {
        if let Some(result) = keyword.check_leaf(value) {
            return result.map_err(SchemaError::from);
        }
        let Value::Object(object) = value else {
            return Ok(());
        };

        match keyword {
            Keyword::Properties(properties) => {
                for (key, child) in object {
                    if let Some(node) = properties.get(key) {
                        self.check(document, *node, child).map_err(|err| {
                            err.map_validation(|err| {
                                err.under(&["properties", key.as_str()]).at_property(key)
                            })
                        })?;
                    }
                }
            }
            Keyword::PatternProperties(patterns) => {
                for (key, child) in object {
                    for entry in patterns.iter().filter(|entry| entry.pattern.is_match(key)) {
                        let source = entry.pattern.source();
                        self.check(document, entry.node, child).map_err(|err| {
                            err.map_validation(|err| {
                                err.prefixed(format_args!(
                                    "object key {key} pattern prop {source} error"
                                ))
                                .under(&["patternProperties", source])
                                .at_property(key)
                            })
                        })?;
                    }
                }
            }
            Keyword::AdditionalProperties(node) => {
                for (key, child) in object.iter().filter(|(key, _)| !set.claims(key)) {
                    self.check(document, *node, child).map_err(|err| {
                        err.map_validation(|err| {
                            err.prefixed(format_args!("object key {key} additionalProperties error"))
                                .under(&["additionalProperties"])
                                .at_property(key)
                        })
                    })?;
                }
            }
            Keyword::PropertyNames(node) => {
                for key in object.keys() {
                    let name = Value::String(key.clone());
                    self.check(document, *node, &name).map_err(|err| {
                        err.map_validation(|err| {
                            err.prefixed(format_args!("invalid propertyName {key:?}"))
                                .under(&["propertyNames"])
                        })
                    })?;
                }
            }
            Keyword::Dependencies(dependencies) => {
                for (trigger, dependency) in dependencies {
                    if !object.contains_key(trigger) {
                        continue;
                    }
                    match dependency {
                        Dependency::Required(names) => {
                            crate::keywords::check_dependency_names(object, trigger, names)?;
                        }
                        Dependency::Schema(node) => {
                            self.check(document, *node, value).map_err(|err| {
                                err.map_validation(|err| err.under(&["dependencies", trigger.as_str()]))
                            })?;
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}
