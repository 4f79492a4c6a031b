use std::fmt;
use std::io;

use schemaprims_fetch::FetchError;
use schemaprims_schema::SchemaError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const SCHEMA_INVALID: i32 = 65;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound => USAGE,
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn fetch_error(context: &str, err: FetchError) -> CliError {
    match err {
        FetchError::Io { source, .. } => io_error(context, source),
        FetchError::Symlink(_) | FetchError::OutsideRoot(_) => {
            CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
        }
        FetchError::TooLarge { .. } | FetchError::Changed(_) => {
            CliError::new(SCHEMA_INVALID, format!("{context}: {err}"))
        }
    }
}

pub fn schema_error(context: &str, err: SchemaError) -> CliError {
    let code = match &err {
        SchemaError::ValidationFailed(_)
        | SchemaError::DepthExceeded { .. }
        | SchemaError::InvalidJson(_) => DATA_INVALID,
        SchemaError::NoSchema(_) => USAGE,
        SchemaError::LoadFailed(_)
        | SchemaError::CompileFailed { .. }
        | SchemaError::InvalidPattern { .. }
        | SchemaError::InvalidSchemaJson(_)
        | SchemaError::UndecodableReference { .. } => SCHEMA_INVALID,
    };
    CliError::new(code, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_exit_codes() {
        let err = io_error("reading x", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.code, USAGE);
        assert!(err.message.starts_with("reading x: "));

        let err = io_error("reading x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(err.code, PERMISSION_DENIED);
    }

    #[test]
    fn schema_faults_and_data_faults_are_distinct() {
        let err = schema_error(
            "loading schema",
            SchemaError::CompileFailed {
                pointer: "/required".to_string(),
                message: "must be an array".to_string(),
            },
        );
        assert_eq!(err.code, SCHEMA_INVALID);

        let err = schema_error("validating", SchemaError::DepthExceeded { max_depth: 4 });
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn malformed_json_maps_by_which_side_failed() {
        let parse_err = || serde_json::from_str::<serde_json::Value>("{").unwrap_err();

        let err = schema_error("loading schema", SchemaError::InvalidSchemaJson(parse_err()));
        assert_eq!(err.code, SCHEMA_INVALID);
        assert!(err.message.contains("schema is not valid JSON"));

        let err = schema_error("reading data", SchemaError::InvalidJson(parse_err()));
        assert_eq!(err.code, DATA_INVALID);
    }
}
