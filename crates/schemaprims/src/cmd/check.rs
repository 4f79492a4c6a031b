use schemaprims_schema::RootSchema;
use serde::Serialize;
use tracing::warn;

use crate::cmd::{load_schema_file, CheckArgs};
use crate::exit::{schema_error, CliResult, SCHEMA_INVALID, SUCCESS};
use crate::output::{cell, print_json, table, OutputFormat, CHECK_REPORT_SCHEMA_ID};

#[derive(Debug, Serialize)]
struct SchemaCheck {
    path: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    nodes: usize,
    definitions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct CheckOutput {
    schema_id: &'static str,
    ok: bool,
    schemas: Vec<SchemaCheck>,
}

pub fn run(args: CheckArgs, format: OutputFormat) -> CliResult<i32> {
    let mut schemas = Vec::with_capacity(args.schemas.len());

    for path in &args.schemas {
        let compiled = load_schema_file(path).and_then(|(locator, document)| {
            RootSchema::from_value_with_base(&document, Some(&locator)).map_err(|err| {
                schema_error(&format!("compiling {}", path.display()), err)
            })
        });

        let check = match compiled {
            Ok(schema) => SchemaCheck {
                path: path.display().to_string(),
                ok: true,
                id: schema.id().map(str::to_string),
                nodes: schema.len(),
                definitions: schema
                    .definitions()
                    .map(|(name, _)| name.to_string())
                    .collect(),
                error: None,
            },
            Err(err) => {
                warn!(path = %path.display(), code = err.code, "schema failed to load");
                SchemaCheck {
                    path: path.display().to_string(),
                    ok: false,
                    id: None,
                    nodes: 0,
                    definitions: Vec::new(),
                    error: Some(err.message),
                }
            }
        };
        schemas.push(check);
    }

    let ok = schemas.iter().all(|check| check.ok);
    let output = CheckOutput {
        schema_id: CHECK_REPORT_SCHEMA_ID,
        ok,
        schemas,
    };
    print_report(&output, format);

    Ok(if ok { SUCCESS } else { SCHEMA_INVALID })
}

fn print_report(output: &CheckOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(output),
        OutputFormat::Table => {
            let mut table = table(vec!["SCHEMA", "STATUS", "ID", "NODES", "ERROR"]);
            for check in &output.schemas {
                table.add_row(vec![
                    check.path.clone(),
                    status(check.ok).to_string(),
                    cell(check.id.as_deref()),
                    check.nodes.to_string(),
                    cell(check.error.as_deref()),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for check in &output.schemas {
                match &check.error {
                    None => println!(
                        "{}: {} ({} nodes, {} definitions)",
                        check.path,
                        status(check.ok),
                        check.nodes,
                        check.definitions.len()
                    ),
                    Some(error) => println!("{}: {}: {}", check.path, status(check.ok), error),
                }
            }
        }
    }
}

fn status(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}
