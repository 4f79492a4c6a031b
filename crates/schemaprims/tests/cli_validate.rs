#![cfg(all(unix, feature = "cli"))]

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "schemaprims-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("fixture should be writable");
    path
}

fn run_json(args: &[&OsStr]) -> (Output, serde_json::Value) {
    let output = Command::new(env!("CARGO_BIN_EXE_schemaprims"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .args(args)
        .output()
        .expect("schemaprims should run");
    let report = serde_json::from_slice(&output.stdout).unwrap_or(serde_json::Value::Null);
    (output, report)
}

const PERSON_SCHEMA: &str = r#"{
    "required": ["name"],
    "properties": {
        "name": { "type": "string" },
        "tags": {
            "patternProperties": { "^S_": { "type": "string" } },
            "additionalProperties": false
        }
    }
}"#;

#[test]
fn valid_files_exit_zero_with_report() {
    let dir = unique_temp_dir("valid");
    let schema = write(&dir, "person.schema.json", PERSON_SCHEMA);
    let first = write(&dir, "a.json", r#"{"name":"ada"}"#);
    let second = write(&dir, "b.json", r#"{"name":"bob","tags":{"S_x":"y"}}"#);

    let (output, report) = run_json(&[
        OsStr::new("validate"),
        schema.as_os_str(),
        first.as_os_str(),
        second.as_os_str(),
    ]);

    assert_eq!(output.status.code(), Some(0));
    assert!(report["schema_id"]
        .as_str()
        .is_some_and(|id| id.ends_with("validation-report.schema.json")));
    assert_eq!(report["valid"], true);
    assert_eq!(report["results"].as_array().map(Vec::len), Some(2));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn invalid_file_exits_60_with_failure_location() {
    let dir = unique_temp_dir("invalid");
    let schema = write(&dir, "person.schema.json", PERSON_SCHEMA);
    let good = write(&dir, "good.json", r#"{"name":"ada"}"#);
    let bad = write(&dir, "bad.json", r#"{"name":"bob","tags":{"S_x":"y","other":1}}"#);

    let (output, report) = run_json(&[
        OsStr::new("validate"),
        schema.as_os_str(),
        good.as_os_str(),
        bad.as_os_str(),
    ]);

    assert_eq!(output.status.code(), Some(60));
    assert_eq!(report["valid"], false);
    let failure = &report["results"][1];
    assert_eq!(failure["status"], "invalid");
    assert_eq!(failure["keyword"], "false");
    assert_eq!(failure["instance_path"], "/tags/other");
    assert_eq!(failure["schema_path"], "/properties/tags/additionalProperties");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn file_references_resolve_relative_to_schema() {
    let dir = unique_temp_dir("refs");
    write(
        &dir,
        "common.json",
        r#"{"definitions":{"small":{"maxProperties":1}}}"#,
    );
    let schema = write(
        &dir,
        "root.schema.json",
        r##"{"properties":{"meta":{"$ref":"common.json#/definitions/small"}}}"##,
    );
    let data = write(&dir, "data.json", r#"{"meta":{"a":1,"b":2}}"#);

    let (output, report) = run_json(&[OsStr::new("validate"), schema.as_os_str(), data.as_os_str()]);
    assert_eq!(output.status.code(), Some(60));
    assert_eq!(report["results"][0]["keyword"], "maxProperties");
    assert_eq!(report["results"][0]["message"], "2 object properties exceed 1 maximum");

    let (output, report) = run_json(&[
        OsStr::new("validate"),
        OsStr::new("--no-fetch"),
        schema.as_os_str(),
        data.as_os_str(),
    ]);
    assert_eq!(output.status.code(), Some(60));
    assert_eq!(report["results"][0]["keyword"], "$ref");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn max_depth_bounds_recursive_schemas() {
    let dir = unique_temp_dir("depth");
    let schema = write(
        &dir,
        "list.schema.json",
        r##"{"properties":{"next":{"$ref":"#"}}}"##,
    );
    let data = write(
        &dir,
        "list.json",
        r#"{"next":{"next":{"next":{"next":{"next":{}}}}}}"#,
    );

    let (output, _) = run_json(&[OsStr::new("validate"), schema.as_os_str(), data.as_os_str()]);
    assert_eq!(output.status.code(), Some(0));

    let (output, report) = run_json(&[
        OsStr::new("validate"),
        OsStr::new("--max-depth"),
        OsStr::new("3"),
        schema.as_os_str(),
        data.as_os_str(),
    ]);
    assert_eq!(output.status.code(), Some(60));
    assert!(report["results"][0]["message"]
        .as_str()
        .is_some_and(|message| message.contains("max depth exceeded")));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn strict_mode_rejects_undeclared_properties() {
    let dir = unique_temp_dir("strict");
    let schema = write(&dir, "person.schema.json", PERSON_SCHEMA);
    let data = write(&dir, "extra.json", r#"{"name":"ada","age":3}"#);

    let (output, _) = run_json(&[OsStr::new("validate"), schema.as_os_str(), data.as_os_str()]);
    assert_eq!(output.status.code(), Some(0));

    let (output, report) = run_json(&[
        OsStr::new("validate"),
        OsStr::new("--strict"),
        schema.as_os_str(),
        data.as_os_str(),
    ]);
    assert_eq!(output.status.code(), Some(60));
    assert_eq!(report["results"][0]["instance_path"], "/age");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn broken_schema_exits_65() {
    let dir = unique_temp_dir("broken-schema");
    let schema = write(&dir, "bad.schema.json", r#"{"required":"name"}"#);
    let data = write(&dir, "data.json", "{}");

    let (output, _) = run_json(&[OsStr::new("validate"), schema.as_os_str(), data.as_os_str()]);
    assert_eq!(output.status.code(), Some(65));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("/required"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_schema_file_is_a_usage_error() {
    let dir = unique_temp_dir("missing-schema");
    let data = write(&dir, "data.json", "{}");
    let missing = dir.join("absent.schema.json");

    let (output, _) = run_json(&[OsStr::new("validate"), missing.as_os_str(), data.as_os_str()]);
    assert_eq!(output.status.code(), Some(64));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn malformed_data_is_reported_as_invalid() {
    let dir = unique_temp_dir("malformed-data");
    let schema = write(&dir, "person.schema.json", PERSON_SCHEMA);
    let data = write(&dir, "data.json", "{not json");

    let (output, report) = run_json(&[OsStr::new("validate"), schema.as_os_str(), data.as_os_str()]);
    assert_eq!(output.status.code(), Some(60));
    assert_eq!(report["results"][0]["status"], "invalid");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unreadable_data_file_exits_1_and_keeps_going() {
    let dir = unique_temp_dir("unreadable-data");
    let schema = write(&dir, "person.schema.json", PERSON_SCHEMA);
    let missing = dir.join("absent.json");
    let good = write(&dir, "good.json", r#"{"name":"ada"}"#);

    let (output, report) = run_json(&[
        OsStr::new("validate"),
        schema.as_os_str(),
        missing.as_os_str(),
        good.as_os_str(),
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(report["valid"], false);
    assert_eq!(report["results"][0]["status"], "error");
    assert_eq!(report["results"][1]["status"], "valid");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn malformed_schema_text_exits_65() {
    let dir = unique_temp_dir("malformed-schema");
    let schema = write(&dir, "bad.schema.json", r#"{"required": ["#);
    let data = write(&dir, "data.json", "{}");

    let (output, _) = run_json(&[OsStr::new("validate"), schema.as_os_str(), data.as_os_str()]);
    assert_eq!(output.status.code(), Some(65));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("schema is not valid JSON"));

    let _ = std::fs::remove_dir_all(&dir);
}
