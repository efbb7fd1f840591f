#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use oasgen::HttpMethod;
use oasgen_cli::{Cli, Commands, run_with_cli};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn cli(command: Commands) -> Cli {
    Cli {
        verbose: 0,
        config: None,
        seed: Some(7),
        command,
    }
}

fn write(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_run_resolve_command() -> Result<()> {
    let dir = TempDir::new()?;
    let schema = write(
        dir.path(),
        "schema.json",
        r#"{"allOf": [{"type": "object", "properties": {"a": {"type": "integer"}}}, {"required": ["a"]}]}"#,
    );

    run_with_cli(cli(Commands::Resolve { schema }))?;
    Ok(())
}

#[test]
fn test_run_valid_value_command_with_yaml_schema() -> Result<()> {
    let dir = TempDir::new()?;
    let schema = write(
        dir.path(),
        "schema.yaml",
        "type: string\nformat: email\nmaxLength: 30\n",
    );

    run_with_cli(cli(Commands::ValidValue { schema, count: 3 }))?;
    Ok(())
}

#[test]
fn test_run_invalid_value_command() -> Result<()> {
    let dir = TempDir::new()?;
    let schema = write(dir.path(), "schema.json", r#"{"type": "integer", "minimum": 1}"#);

    run_with_cli(cli(Commands::InvalidValue {
        schema: schema.clone(),
        current: "5".to_owned(),
        constraint: None,
    }))?;
    run_with_cli(cli(Commands::InvalidValue {
        schema,
        current: "5".to_owned(),
        constraint: Some(r#"["$IGNORE", 5]"#.to_owned()),
    }))?;
    Ok(())
}

#[test]
fn test_run_invalid_value_rejects_bad_json() {
    let dir = TempDir::new().unwrap();
    let schema = write(dir.path(), "schema.json", r#"{"type": "integer"}"#);

    let result = run_with_cli(cli(Commands::InvalidValue {
        schema,
        current: "{not json".to_owned(),
        constraint: None,
    }));
    assert!(result.is_err());
}

#[test]
fn test_run_invalidate_data_with_mappings() -> Result<()> {
    let dir = TempDir::new()?;
    let schema = write(
        dir.path(),
        "schema.json",
        r#"{"type": "object", "properties": {"name": {"type": "string"}, "wagegroup_id": {"type": "string"}}}"#,
    );
    let data = write(dir.path(), "data.json", r#"{"name": "Ann", "wagegroup_id": "wg-1"}"#);
    let mappings = write(
        dir.path(),
        "mappings.yaml",
        r"
dtos:
  - endpoint: /employees
    method: post
    relations:
      - kind: UniquePropertyValueConstraint
        property_name: name
        value: Taken
        error_code: 409
      - kind: PropertyValueConstraint
        property_name: name
        values: [Ann, Bob]
        error_code: 409
",
    );

    run_with_cli(cli(Commands::InvalidateData {
        schema,
        data,
        status_code: 409,
        mappings: Some(mappings),
        endpoint: Some("/employees".to_owned()),
        method: HttpMethod::Post,
    }))?;
    Ok(())
}

#[test]
fn test_run_invalidate_data_without_target_fails() {
    let dir = TempDir::new().unwrap();
    let schema = write(dir.path(), "schema.json", r#"{"type": "object", "properties": {"a": {"type": "integer"}}}"#);
    let data = write(dir.path(), "data.json", r#"{"a": 1}"#);

    let result = run_with_cli(cli(Commands::InvalidateData {
        schema,
        data,
        status_code: 409,
        mappings: None,
        endpoint: None,
        method: HttpMethod::Post,
    }));
    assert!(result.is_err());
}

#[test]
fn test_run_request_data_command() -> Result<()> {
    let dir = TempDir::new()?;
    let spec = write(
        dir.path(),
        "openapi.yaml",
        r"
openapi: 3.0.3
paths:
  /wagegroups/{wagegroup_id}/employees:
    post:
      operationId: post_employee
      parameters:
        - name: notify
          in: query
          schema:
            type: boolean
      requestBody:
        content:
          application/json:
            schema:
              type: object
              required: [name]
              properties:
                name:
                  type: string
                  maxLength: 20
                age:
                  type: integer
                  minimum: 18
",
    );

    run_with_cli(cli(Commands::RequestData {
        spec,
        endpoint: "/wagegroups/{wagegroup_id}/employees".to_owned(),
        method: HttpMethod::Post,
        mappings: None,
        base_url: "http://localhost:8000".to_owned(),
    }))?;
    Ok(())
}

#[test]
fn test_run_with_config_file() -> Result<()> {
    let dir = TempDir::new()?;
    let config = write(
        dir.path(),
        "oasgen.config.json",
        r#"{"faker_locale": "fr_FR", "invalid_property_default_response": 400}"#,
    );
    let schema = write(dir.path(), "schema.json", r#"{"type": "object", "properties": {"n": {"type": "integer", "maximum": 3}}}"#);
    let data = write(dir.path(), "data.json", r#"{"n": 2}"#);

    run_with_cli(Cli {
        verbose: 1,
        config: Some(config),
        seed: None,
        command: Commands::InvalidateData {
            schema,
            data,
            status_code: 400,
            mappings: None,
            endpoint: None,
            method: HttpMethod::Post,
        },
    })?;
    Ok(())
}

#[test]
fn test_run_missing_schema_file() {
    let result = run_with_cli(cli(Commands::Resolve {
        schema: "/definitely/not/here.json".to_owned(),
    }));
    assert!(result.is_err());
}
