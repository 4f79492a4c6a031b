use std::fmt;

use crate::keywords::KeywordKind;

/// A value failed to conform to its schema.
///
/// Carries the innermost keyword that rejected the value, where in the value
/// it happened, and the keyword route through the schema that led there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Keyword that rejected the value.
    pub keyword: KeywordKind,
    /// Path of object keys from the validated value down to the failure.
    pub instance_path: Vec<String>,
    /// Keyword route through the schema, e.g. `["properties", "x", "maxProperties"]`.
    pub schema_path: Vec<String>,
    /// Human-readable description.
    pub message: String,
}

impl ValidationError {
    pub(crate) fn new(keyword: KeywordKind, message: impl Into<String>) -> Self {
        let schema_path = match keyword {
            KeywordKind::FalseSchema => Vec::new(),
            other => vec![other.as_str().to_string()],
        };
        Self {
            keyword,
            instance_path: Vec::new(),
            schema_path,
            message: message.into(),
        }
    }

    /// JSON pointer to the failing location inside the validated value.
    pub fn instance_pointer(&self) -> String {
        to_pointer(&self.instance_path)
    }

    /// JSON pointer to the failing keyword inside the schema.
    pub fn schema_pointer(&self) -> String {
        to_pointer(&self.schema_path)
    }

    pub(crate) fn at_property(mut self, key: &str) -> Self {
        self.instance_path.insert(0, key.to_string());
        self
    }

    pub(crate) fn under(mut self, segments: &[&str]) -> Self {
        self.schema_path
            .splice(0..0, segments.iter().map(|segment| segment.to_string()));
        self
    }

    pub(crate) fn prefixed(mut self, prefix: impl fmt::Display) -> Self {
        self.message = format!("{prefix}: {}", self.message);
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "{} at (root): {}", self.keyword, self.message)
        } else {
            write!(
                f,
                "{} at {}: {}",
                self.keyword,
                self.instance_pointer(),
                self.message
            )
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors produced while loading schemas or validating values.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The schema source could not be read.
    #[error("failed to load schema: {0}")]
    LoadFailed(String),

    /// A recognized keyword has the wrong shape.
    #[error("failed to compile schema at {pointer}: {message}")]
    CompileFailed { pointer: String, message: String },

    /// A pattern keyword does not hold a valid regular expression.
    #[error("invalid pattern {pattern:?} at {pointer}: {source}")]
    InvalidPattern {
        pointer: String,
        pattern: String,
        source: regex::Error,
    },

    /// A schema document is not valid JSON.
    #[error("schema is not valid JSON: {0}")]
    InvalidSchemaJson(#[source] serde_json::Error),

    /// A payload is not valid JSON.
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A referenced document was fetched but is not a valid schema.
    #[error("referenced schema {reference} could not be decoded: {message}")]
    UndecodableReference { reference: String, message: String },

    /// The value does not conform to the schema.
    #[error("validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Evaluation nested deeper than the configured bound.
    #[error("max depth exceeded ({max_depth} nested schema evaluations)")]
    DepthExceeded { max_depth: usize },

    /// No schema registered under the given name.
    #[error("no schema registered under {0:?}")]
    NoSchema(String),
}

impl SchemaError {
    /// The validation failure, if this error is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::ValidationFailed(err) => Some(err),
            _ => None,
        }
    }

    /// Whether this error means the schema itself could not be loaded or
    /// resolved, as opposed to the value being invalid.
    pub fn is_schema_fault(&self) -> bool {
        matches!(
            self,
            Self::LoadFailed(_)
                | Self::InvalidSchemaJson(_)
                | Self::CompileFailed { .. }
                | Self::InvalidPattern { .. }
                | Self::UndecodableReference { .. }
        )
    }

    pub(crate) fn map_validation(self, f: impl FnOnce(ValidationError) -> ValidationError) -> Self {
        match self {
            Self::ValidationFailed(err) => Self::ValidationFailed(f(err)),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, SchemaError>;

pub(crate) fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn to_pointer(segments: &[String]) -> String {
    segments
        .iter()
        .map(|segment| format!("/{}", escape_pointer_token(segment)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_keyword_path_and_message() {
        let err = ValidationError::new(KeywordKind::MaxProperties, "2 object properties exceed 1 maximum")
            .at_property("x")
            .under(&["properties", "x"]);

        assert_eq!(err.instance_pointer(), "/x");
        assert_eq!(err.schema_pointer(), "/properties/x/maxProperties");
        assert_eq!(
            err.to_string(),
            "maxProperties at /x: 2 object properties exceed 1 maximum"
        );
    }

    #[test]
    fn root_failures_render_as_root() {
        let err = ValidationError::new(KeywordKind::Required, r#""b" value is required"#);
        assert_eq!(err.to_string(), r#"required at (root): "b" value is required"#);
    }

    #[test]
    fn pointer_tokens_are_escaped() {
        let err = ValidationError::new(KeywordKind::Type, "bad").at_property("a/b~c");
        assert_eq!(err.instance_pointer(), "/a~1b~0c");
    }

    #[test]
    fn false_schema_has_no_own_schema_segment() {
        let err = ValidationError::new(KeywordKind::FalseSchema, "schema forbids any value")
            .under(&["additionalProperties"]);
        assert_eq!(err.schema_path, vec!["additionalProperties".to_string()]);
    }

    #[test]
    fn map_validation_leaves_other_errors_alone() {
        let err = SchemaError::DepthExceeded { max_depth: 4 }.map_validation(|e| e.at_property("x"));
        assert!(matches!(err, SchemaError::DepthExceeded { max_depth: 4 }));
        assert!(!err.is_schema_fault());
    }
}
