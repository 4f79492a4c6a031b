use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub const VALIDATION_REPORT_SCHEMA_ID: &str =
    "https://schemas.3leaps.dev/schemaprims/cli/v1/validation-report.schema.json";
pub const CHECK_REPORT_SCHEMA_ID: &str =
    "https://schemas.3leaps.dev/schemaprims/cli/v1/check-report.schema.json";

pub fn print_json<T: Serialize>(output: &T) {
    println!(
        "{}",
        serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

/// `-` for absent optional cells.
pub fn cell(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}
