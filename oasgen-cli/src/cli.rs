use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use oasgen::files_reader::{expand_path, load_document};
use oasgen::{
    ConstraintValue, Dto, DtoClass, DtoMapping, HttpMethod, InvalidValue, OasGenConfig, OasGenOps,
    OpenApiDocument, resolve_schema,
};
use serde_json::{Map, Value, json};
use std::io::Write;
use std::sync::Arc;

use crate::collaborator::OfflineCollaborator;

#[derive(Parser)]
#[command(name = "oasgen")]
#[command(about = "Valid and invalid test data from OpenAPI schemas", long_about = None)]
pub struct Cli {
    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to optional oasgen config (JSON or YAML) to override defaults
    #[arg(long)]
    pub config: Option<String>,

    /// Seed for reproducible output
    #[arg(long)]
    pub seed: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Flatten allOf / anyOf / oneOf in a schema
    Resolve {
        #[arg(long)]
        schema: String,
    },
    /// Generate values that are valid under a schema
    ValidValue {
        #[arg(long)]
        schema: String,
        #[arg(long, default_value = "1")]
        count: usize,
    },
    /// Generate a value that violates a schema
    InvalidValue {
        #[arg(long)]
        schema: String,
        /// Current (valid) value as JSON
        #[arg(long)]
        current: String,
        /// Values allowed by a constraint, as a JSON array ("$IGNORE" allowed)
        #[arg(long)]
        constraint: Option<String>,
    },
    /// Invalidate one property of a JSON body for a status code
    InvalidateData {
        #[arg(long)]
        schema: String,
        #[arg(long)]
        data: String,
        #[arg(long)]
        status_code: u16,
        /// Dto / id mappings file
        #[arg(long)]
        mappings: Option<String>,
        #[arg(long, requires = "mappings")]
        endpoint: Option<String>,
        #[arg(long, default_value = "post")]
        method: HttpMethod,
    },
    /// Generate url, parameters, headers and body for an operation
    RequestData {
        /// OpenAPI document
        #[arg(long)]
        spec: String,
        #[arg(long)]
        endpoint: String,
        #[arg(long)]
        method: HttpMethod,
        #[arg(long)]
        mappings: Option<String>,
        #[arg(long, default_value = "")]
        base_url: String,
    },
}

/// Run the CLI application
///
/// # Errors
///
/// Returns an error if command execution fails
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Execute CLI commands with a parsed Cli struct
/// This function is separated from `run()` to allow for testing
///
/// # Errors
///
/// Returns an error if:
/// - An input file cannot be read or parsed
/// - Data generation fails for the given schema or status code
pub fn run_with_cli(cli: Cli) -> Result<()> {
    // WARNING (no -v), INFO (-v), DEBUG (-vv)
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };

    // Only initialize logging if not already initialized (for testing)
    let _ = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .try_init();

    run_command(cli)
}

fn run_command(cli: Cli) -> Result<()> {
    let config = OasGenConfig::load(cli.config.as_deref());
    let default_id = config.default_id_property_name.clone();
    let mut ops = match cli.seed {
        Some(seed) => OasGenOps::with_seed(config, seed),
        None => OasGenOps::new(config),
    };

    match cli.command {
        Commands::Resolve { schema } => {
            let result = resolve_schema(&load(&schema)?);
            print_result(&result)?;
        }
        Commands::ValidValue { schema, count } => {
            let values = ops.get_valid_values(&load(&schema)?, count)?;
            if count == 1 {
                print_result(&values[0])?;
            } else {
                print_result(&values)?;
            }
        }
        Commands::InvalidValue {
            schema,
            current,
            constraint,
        } => {
            let current: Value = serde_json::from_str(&current).context("--current is not valid JSON")?;
            let constraint: Vec<ConstraintValue> = match constraint {
                Some(raw) => serde_json::from_str(&raw).context("--constraint is not a JSON array")?,
                None => Vec::new(),
            };
            let result = match ops.get_invalid_value(&load(&schema)?, &current, &constraint) {
                InvalidValue::Value(value) => json!({"ignore": false, "value": value}),
                InvalidValue::Ignore => json!({"ignore": true}),
            };
            print_result(&result)?;
        }
        Commands::InvalidateData {
            schema,
            data,
            status_code,
            mappings,
            endpoint,
            method,
        } => {
            let properties: Map<String, Value> = serde_json::from_value(load(&data)?)
                .context("--data must hold a JSON object")?;
            let class = match (&mappings, &endpoint) {
                (Some(path), Some(endpoint)) => {
                    let mapping = DtoMapping::from_path(&expand_path(path), &default_id)?;
                    mapping.get_dto_class(endpoint, method)
                }
                _ => Arc::new(DtoClass::default()),
            };
            let dto = Dto::new(class, properties);
            let result = ops.get_invalidated_data(&dto, &load(&schema)?, status_code)?;
            print_result(&result)?;
        }
        Commands::RequestData {
            spec,
            endpoint,
            method,
            mappings,
            base_url,
        } => {
            let mapping = match mappings {
                Some(path) => DtoMapping::from_path(&expand_path(&path), &default_id)?,
                None => DtoMapping::new(default_id),
            };
            let document = OpenApiDocument::from_path(&expand_path(&spec), &base_url, mapping)?;
            let collaborator = OfflineCollaborator::new(cli.seed);
            let url = ops.get_valid_url(&document, &endpoint, method, &collaborator)?;
            let request_data = ops.get_request_data(&document, &endpoint, method, &collaborator)?;
            print_result(&request_data.to_request_values(url, method))?;
        }
    }

    Ok(())
}

fn load(path: &str) -> Result<Value> {
    load_document(&expand_path(path)).with_context(|| format!("cannot load '{path}'"))
}

fn print_result<T: serde::Serialize>(value: &T) -> Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, value)?;
    writeln!(handle)?;
    Ok(())
}
