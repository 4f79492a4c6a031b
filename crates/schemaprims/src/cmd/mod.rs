use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use schemaprims_fetch::{Fetched, Fetcher, FileFetcher, FileFetcherConfig};
use schemaprims_schema::{SchemaError, DEFAULT_MAX_DEPTH};
use serde_json::Value;
use url::Url;

use crate::exit::{fetch_error, io_error, schema_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod check;
pub mod validate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate JSON data files against a schema.
    Validate(ValidateArgs),
    /// Compile schemas and report load errors.
    Check(CheckArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Validate(args) => validate::run(args, format),
        Command::Check(args) => check::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Schema file.
    pub schema: PathBuf,
    /// Data files to validate.
    #[arg(required = true)]
    pub data: Vec<PathBuf>,
    /// Resolve only references into the schema file itself.
    #[arg(long)]
    pub no_fetch: bool,
    /// Maximum nested schema evaluations per data file.
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH, env = "SCHEMAPRIMS_MAX_DEPTH")]
    pub max_depth: usize,
    /// Reject undeclared properties in object schemas without additionalProperties.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Schema files to compile.
    #[arg(required = true)]
    pub schemas: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Read and parse a schema file, returning it with its `file://` location.
pub(crate) fn load_schema_file(path: &Path) -> CliResult<(Url, Value)> {
    let context = format!("loading schema {}", path.display());
    let canonical = path
        .canonicalize()
        .map_err(|err| io_error(&context, err))?;
    let locator = Url::from_file_path(&canonical)
        .map_err(|()| CliError::new(USAGE, format!("{context}: path is not absolute")))?;

    let fetcher = FileFetcher::with_config(FileFetcherConfig {
        allow_symlinks: true,
        ..FileFetcherConfig::default()
    });
    let bytes = match fetcher.fetch(locator.as_str()) {
        Ok(Fetched::Found(bytes)) => bytes,
        Ok(Fetched::NotFound) => {
            return Err(CliError::new(USAGE, format!("{context}: not a regular file")))
        }
        Err(err) => return Err(fetch_error(&context, err)),
    };

    let document: Value = serde_json::from_slice(&bytes)
        .map_err(|err| schema_error(&context, SchemaError::InvalidSchemaJson(err)))?;
    Ok((locator, document))
}
