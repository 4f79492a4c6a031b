use std::path::Path;
use std::sync::Arc;

use schemaprims_fetch::FileFetcher;
use schemaprims_schema::{RegistryConfig, Resolver, SchemaError, SchemaRegistry};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::cmd::{load_schema_file, ValidateArgs};
use crate::exit::{schema_error, CliResult, DATA_INVALID, FAILURE, SUCCESS};
use crate::output::{cell, print_json, table, OutputFormat, VALIDATION_REPORT_SCHEMA_ID};

#[derive(Debug, Serialize)]
struct FileResult {
    path: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    keyword: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instance_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl FileResult {
    fn valid(path: &Path) -> Self {
        Self {
            path: path.display().to_string(),
            status: "valid",
            keyword: None,
            instance_path: None,
            schema_path: None,
            message: None,
        }
    }

    fn invalid(path: &Path, err: &SchemaError) -> Self {
        let mut result = Self {
            status: "invalid",
            message: Some(err.to_string()),
            ..Self::valid(path)
        };
        if let Some(failure) = err.as_validation() {
            result.keyword = Some(failure.keyword.as_str());
            result.instance_path = Some(failure.instance_pointer());
            result.schema_path = Some(failure.schema_pointer());
            result.message = Some(failure.message.clone());
        }
        result
    }

    fn unreadable(path: &Path, err: std::io::Error) -> Self {
        Self {
            status: "error",
            message: Some(err.to_string()),
            ..Self::valid(path)
        }
    }
}

#[derive(Debug, Serialize)]
struct ValidateOutput {
    schema_id: &'static str,
    schema: String,
    valid: bool,
    results: Vec<FileResult>,
}

pub fn run(args: ValidateArgs, format: OutputFormat) -> CliResult<i32> {
    let schema_context = format!("loading schema {}", args.schema.display());
    let (locator, document) = load_schema_file(&args.schema)?;

    let resolver = if args.no_fetch {
        Resolver::new()
    } else {
        Resolver::with_fetcher(FileFetcher::new())
    };
    let config = RegistryConfig {
        strict_mode: args.strict,
        fail_on_missing_schema: true,
        max_depth: args.max_depth,
        ..RegistryConfig::default()
    };
    let mut registry = SchemaRegistry::with_resolver(config, Arc::new(resolver));
    let name = args.schema.display().to_string();
    registry
        .register_value_with_base(&name, &document, Some(&locator))
        .map_err(|err| schema_error(&schema_context, err))?;
    debug!(schema = %locator, "compiled schema");

    let mut results = Vec::with_capacity(args.data.len());
    for path in &args.data {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                results.push(FileResult::unreadable(path, err));
                continue;
            }
        };
        let outcome = match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => registry.validate(&name, &value),
            Err(err) => Err(SchemaError::from(err)),
        };
        match outcome {
            Ok(()) => results.push(FileResult::valid(path)),
            Err(err) if err.is_schema_fault() => {
                return Err(schema_error(&schema_context, err));
            }
            Err(err) => results.push(FileResult::invalid(path, &err)),
        }
    }

    let valid = results.iter().all(|result| result.status == "valid");
    let unreadable = results.iter().any(|result| result.status == "error");
    info!(
        files = results.len(),
        valid,
        cached_documents = registry.resolver().cached_locators(),
        "validation finished"
    );

    let output = ValidateOutput {
        schema_id: VALIDATION_REPORT_SCHEMA_ID,
        schema: name,
        valid,
        results,
    };
    print_report(&output, format);

    Ok(if unreadable {
        FAILURE
    } else if valid {
        SUCCESS
    } else {
        DATA_INVALID
    })
}

fn print_report(output: &ValidateOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(output),
        OutputFormat::Table => {
            let mut table = table(vec!["FILE", "STATUS", "KEYWORD", "LOCATION", "MESSAGE"]);
            for result in &output.results {
                table.add_row(vec![
                    result.path.clone(),
                    result.status.to_string(),
                    cell(result.keyword),
                    cell(result.instance_path.as_deref().map(display_pointer)),
                    cell(result.message.as_deref()),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for result in &output.results {
                match &result.message {
                    None => println!("{}: {}", result.path, result.status),
                    Some(message) => println!(
                        "{}: {} at {}: {}",
                        result.path,
                        result.status,
                        display_pointer(result.instance_path.as_deref().unwrap_or("")),
                        message
                    ),
                }
            }
        }
    }
}

fn display_pointer(pointer: &str) -> &str {
    if pointer.is_empty() {
        "(root)"
    } else {
        pointer
    }
}
