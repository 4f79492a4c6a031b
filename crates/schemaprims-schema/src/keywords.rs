//! The closed keyword vocabulary and the checks that need no recursion.
//!
//! Every check treats a value of the wrong kind as a pass: `maxProperties`
//! says nothing about strings, `minLength` nothing about objects.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::node::NodeId;

/// Identity of a keyword, ordered by evaluation order.
///
/// A keyword set always evaluates its keywords in the order of this enum's
/// variants. `Ref` and `FalseSchema` name the non-keyword node kinds so that
/// failures coming from them carry an identity too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeywordKind {
    Type,
    Enum,
    Const,
    MinLength,
    MaxLength,
    Pattern,
    MaxProperties,
    MinProperties,
    Required,
    Properties,
    PatternProperties,
    AdditionalProperties,
    PropertyNames,
    Dependencies,
    Ref,
    FalseSchema,
}

impl KeywordKind {
    /// Keyword name as written in a schema document.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Enum => "enum",
            Self::Const => "const",
            Self::MinLength => "minLength",
            Self::MaxLength => "maxLength",
            Self::Pattern => "pattern",
            Self::MaxProperties => "maxProperties",
            Self::MinProperties => "minProperties",
            Self::Required => "required",
            Self::Properties => "properties",
            Self::PatternProperties => "patternProperties",
            Self::AdditionalProperties => "additionalProperties",
            Self::PropertyNames => "propertyNames",
            Self::Dependencies => "dependencies",
            Self::Ref => "$ref",
            Self::FalseSchema => "false",
        }
    }
}

impl fmt::Display for KeywordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON value kinds accepted by the `type` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Null,
    Boolean,
    Object,
    Array,
    Number,
    Integer,
    String,
}

impl PrimitiveType {
    /// Parse a type name as written in a schema document.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "null" => Some(Self::Null),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "string" => Some(Self::String),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::String => "string",
        }
    }

    /// Most specific type of `value`; whole numbers report `Integer`.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Object(_) => Self::Object,
            Value::Array(_) => Self::Array,
            Value::String(_) => Self::String,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.fract() == 0.0 => Self::Integer,
                _ => Self::Number,
            },
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        let actual = Self::of(value);
        actual == self || (self == Self::Number && actual == Self::Integer)
    }
}

/// A compiled regular expression that remembers its source text.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub(crate) fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_string(),
            regex: Regex::new(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Unanchored search, as pattern keywords are specified.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// One `patternProperties` entry.
#[derive(Debug, Clone)]
pub struct PatternSchema {
    pub pattern: Pattern,
    pub node: NodeId,
}

/// What a `dependencies` trigger key demands.
#[derive(Debug, Clone)]
pub enum Dependency {
    /// Every listed key must be present too.
    Required(Vec<String>),
    /// The whole object must validate against the node.
    Schema(NodeId),
}

/// A single active keyword with its compiled argument.
#[derive(Debug, Clone)]
pub enum Keyword {
    Type(Vec<PrimitiveType>),
    Enum(Vec<Value>),
    Const(Value),
    MinLength(u64),
    MaxLength(u64),
    Pattern(Pattern),
    MaxProperties(u64),
    MinProperties(u64),
    Required(Vec<String>),
    Properties(BTreeMap<String, NodeId>),
    PatternProperties(Vec<PatternSchema>),
    AdditionalProperties(NodeId),
    PropertyNames(NodeId),
    Dependencies(Vec<(String, Dependency)>),
}

impl Keyword {
    pub fn kind(&self) -> KeywordKind {
        match self {
            Self::Type(_) => KeywordKind::Type,
            Self::Enum(_) => KeywordKind::Enum,
            Self::Const(_) => KeywordKind::Const,
            Self::MinLength(_) => KeywordKind::MinLength,
            Self::MaxLength(_) => KeywordKind::MaxLength,
            Self::Pattern(_) => KeywordKind::Pattern,
            Self::MaxProperties(_) => KeywordKind::MaxProperties,
            Self::MinProperties(_) => KeywordKind::MinProperties,
            Self::Required(_) => KeywordKind::Required,
            Self::Properties(_) => KeywordKind::Properties,
            Self::PatternProperties(_) => KeywordKind::PatternProperties,
            Self::AdditionalProperties(_) => KeywordKind::AdditionalProperties,
            Self::PropertyNames(_) => KeywordKind::PropertyNames,
            Self::Dependencies(_) => KeywordKind::Dependencies,
        }
    }

    /// Run this keyword if it needs no sub-schema evaluation.
    ///
    /// Returns `None` for applicator keywords, which the validator drives.
    pub(crate) fn check_leaf(&self, value: &Value) -> Option<Result<(), ValidationError>> {
        let result = match self {
            Self::Type(types) => check_type(types, value),
            Self::Enum(options) => check_enum(options, value),
            Self::Const(expected) => check_const(expected, value),
            Self::MinLength(min) => check_min_length(*min, value),
            Self::MaxLength(max) => check_max_length(*max, value),
            Self::Pattern(pattern) => check_pattern(pattern, value),
            Self::MaxProperties(max) => check_max_properties(*max, value),
            Self::MinProperties(min) => check_min_properties(*min, value),
            Self::Required(names) => check_required(names, value),
            Self::Properties(_)
            | Self::PatternProperties(_)
            | Self::AdditionalProperties(_)
            | Self::PropertyNames(_)
            | Self::Dependencies(_) => return None,
        };
        Some(result)
    }
}

fn check_type(types: &[PrimitiveType], value: &Value) -> Result<(), ValidationError> {
    if types.iter().any(|ty| ty.matches(value)) {
        return Ok(());
    }
    let expected: Vec<&str> = types.iter().map(|ty| ty.as_str()).collect();
    Err(ValidationError::new(
        KeywordKind::Type,
        format!(
            "type should be {}, got {}",
            expected.join(" or "),
            PrimitiveType::of(value).as_str()
        ),
    ))
}

fn check_enum(options: &[Value], value: &Value) -> Result<(), ValidationError> {
    if options.iter().any(|option| json_equal(option, value)) {
        return Ok(());
    }
    Err(ValidationError::new(
        KeywordKind::Enum,
        format!("{value} is not one of the enumerated values"),
    ))
}

fn check_const(expected: &Value, value: &Value) -> Result<(), ValidationError> {
    if json_equal(expected, value) {
        return Ok(());
    }
    Err(ValidationError::new(
        KeywordKind::Const,
        format!("{value} must equal {expected}"),
    ))
}

fn check_min_length(min: u64, value: &Value) -> Result<(), ValidationError> {
    if let Value::String(s) = value {
        let len = s.chars().count() as u64;
        if len < min {
            return Err(ValidationError::new(
                KeywordKind::MinLength,
                format!("{len} characters below {min} minimum"),
            ));
        }
    }
    Ok(())
}

fn check_max_length(max: u64, value: &Value) -> Result<(), ValidationError> {
    if let Value::String(s) = value {
        let len = s.chars().count() as u64;
        if len > max {
            return Err(ValidationError::new(
                KeywordKind::MaxLength,
                format!("{len} characters exceed {max} maximum"),
            ));
        }
    }
    Ok(())
}

fn check_pattern(pattern: &Pattern, value: &Value) -> Result<(), ValidationError> {
    if let Value::String(s) = value {
        if !pattern.is_match(s) {
            return Err(ValidationError::new(
                KeywordKind::Pattern,
                format!("{s:?} does not match pattern {:?}", pattern.source()),
            ));
        }
    }
    Ok(())
}

fn check_max_properties(max: u64, value: &Value) -> Result<(), ValidationError> {
    if let Value::Object(obj) = value {
        if obj.len() as u64 > max {
            return Err(ValidationError::new(
                KeywordKind::MaxProperties,
                format!("{} object properties exceed {max} maximum", obj.len()),
            ));
        }
    }
    Ok(())
}

fn check_min_properties(min: u64, value: &Value) -> Result<(), ValidationError> {
    if let Value::Object(obj) = value {
        if (obj.len() as u64) < min {
            return Err(ValidationError::new(
                KeywordKind::MinProperties,
                format!("{} object properties below {min} minimum", obj.len()),
            ));
        }
    }
    Ok(())
}

// Presence is key existence; an explicit null is present.
fn check_required(names: &[String], value: &Value) -> Result<(), ValidationError> {
    if let Value::Object(obj) = value {
        if let Some(missing) = names.iter().find(|name| !obj.contains_key(name.as_str())) {
            return Err(ValidationError::new(
                KeywordKind::Required,
                format!("{missing:?} value is required"),
            ));
        }
    }
    Ok(())
}

/// The list form of one `dependencies` entry.
pub(crate) fn check_dependency_names(
    obj: &Map<String, Value>,
    trigger: &str,
    names: &[String],
) -> Result<(), ValidationError> {
    if !obj.contains_key(trigger) {
        return Ok(());
    }
    match names.iter().find(|name| !obj.contains_key(name.as_str())) {
        Some(missing) => {
            let mut err = ValidationError::new(
                KeywordKind::Dependencies,
                format!("{missing:?} value is required when {trigger:?} is present"),
            );
            err.schema_path.push(trigger.to_string());
            Err(err)
        }
        None => Ok(()),
    }
}

/// JSON equality where numbers compare by numeric value (`1 == 1.0`).
pub fn json_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => match (a.as_u64(), b.as_u64()) {
                (Some(x), Some(y)) => x == y,
                _ => a.as_f64() == b.as_f64(),
            },
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| json_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| json_equal(x, y)))
        }
        _ => left == right,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn max_properties_fails_only_above_bound() {
        assert!(check_max_properties(2, &json!({"a": 1, "b": 2})).is_ok());
        let err = check_max_properties(2, &json!({"a": 1, "b": 2, "c": 3})).unwrap_err();
        assert_eq!(err.keyword, KeywordKind::MaxProperties);
        assert_eq!(err.message, "3 object properties exceed 2 maximum");
    }

    #[test]
    fn min_properties_fails_only_below_bound() {
        assert!(check_min_properties(1, &json!({"a": 1})).is_ok());
        let err = check_min_properties(2, &json!({"a": 1})).unwrap_err();
        assert_eq!(err.message, "1 object properties below 2 minimum");
    }

    #[test]
    fn object_keywords_ignore_other_kinds() {
        for value in [json!(null), json!(1), json!("abc"), json!([1, 2, 3])] {
            assert!(check_max_properties(0, &value).is_ok());
            assert!(check_min_properties(5, &value).is_ok());
            assert!(check_required(&["a".to_string()], &value).is_ok());
        }
    }

    #[test]
    fn required_treats_null_as_present() {
        let names = vec!["a".to_string(), "b".to_string()];
        assert!(check_required(&names, &json!({"a": 1, "b": null})).is_ok());

        let err = check_required(&names, &json!({"a": 1})).unwrap_err();
        assert_eq!(err.keyword, KeywordKind::Required);
        assert_eq!(err.message, r#""b" value is required"#);
    }

    #[test]
    fn integer_type_accepts_whole_floats() {
        assert!(PrimitiveType::Integer.matches(&json!(3)));
        assert!(PrimitiveType::Integer.matches(&json!(3.0)));
        assert!(!PrimitiveType::Integer.matches(&json!(3.5)));
        assert!(PrimitiveType::Number.matches(&json!(3)));
        assert!(!PrimitiveType::String.matches(&json!(3)));
    }

    #[test]
    fn type_error_lists_expected_kinds() {
        let err = check_type(
            &[PrimitiveType::String, PrimitiveType::Null],
            &json!(1),
        )
        .unwrap_err();
        assert_eq!(err.message, "type should be string or null, got integer");
    }

    #[test]
    fn string_lengths_count_characters() {
        assert!(check_max_length(2, &json!("éé")).is_ok());
        assert!(check_min_length(3, &json!("éé")).is_err());
        assert!(check_min_length(3, &json!({"not": "a string"})).is_ok());
    }

    #[test]
    fn pattern_search_is_unanchored() {
        let pattern = Pattern::new("b+").unwrap();
        assert!(check_pattern(&pattern, &json!("abbbc")).is_ok());
        assert!(check_pattern(&pattern, &json!("ac")).is_err());
        assert!(check_pattern(&pattern, &json!(12)).is_ok());
    }

    #[test]
    fn enum_and_const_compare_numbers_numerically() {
        assert!(check_enum(&[json!(1), json!("x")], &json!(1.0)).is_ok());
        assert!(check_enum(&[json!(1), json!("x")], &json!("y")).is_err());
        assert!(check_const(&json!({"a": [1, 2]}), &json!({"a": [1.0, 2]})).is_ok());
        assert!(check_const(&json!({"a": 1}), &json!({"a": 1, "b": 2})).is_err());
    }

    #[test]
    fn dependency_lists_only_apply_when_trigger_present() {
        let billing = vec!["billing".to_string()];
        let without = json!({"name": "x"});
        let complete = json!({"card": 1, "billing": 2});
        let partial = json!({"card": 1});

        assert!(check_dependency_names(without.as_object().unwrap(), "card", &billing).is_ok());
        assert!(check_dependency_names(complete.as_object().unwrap(), "card", &billing).is_ok());

        let err = check_dependency_names(partial.as_object().unwrap(), "card", &billing).unwrap_err();
        assert_eq!(err.keyword, KeywordKind::Dependencies);
        assert_eq!(err.message, r#""billing" value is required when "card" is present"#);
        assert_eq!(err.schema_path, vec!["dependencies".to_string(), "card".to_string()]);
    }

    #[test]
    fn keyword_kinds_sort_in_evaluation_order() {
        let mut kinds = vec![
            KeywordKind::Dependencies,
            KeywordKind::Required,
            KeywordKind::MaxProperties,
            KeywordKind::AdditionalProperties,
            KeywordKind::Type,
        ];
        kinds.sort();
        assert_eq!(
            kinds,
            vec![
                KeywordKind::Type,
                KeywordKind::MaxProperties,
                KeywordKind::Required,
                KeywordKind::AdditionalProperties,
                KeywordKind::Dependencies,
            ]
        );
    }
}
