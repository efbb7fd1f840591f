use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::DataGenError;

/// Expands `~` in a user supplied path.
#[must_use]
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

/// Reads a JSON or YAML document, choosing the parser by file extension.
///
/// # Errors
/// Returns `DataGenError::Io` if the file cannot be read, or a parse error
/// if the content is not valid JSON / YAML.
pub fn load_document(path: &Path) -> Result<Value, DataGenError> {
    load_typed(path)
}

/// Reads a JSON or YAML document straight into a typed value.
///
/// # Errors
/// Returns `DataGenError::Io` on read failures and `Json` / `Yaml` on parse failures.
pub fn load_typed<T: DeserializeOwned>(path: &Path) -> Result<T, DataGenError> {
    let content = fs::read_to_string(path).map_err(|source| DataGenError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    tracing::debug!("- loading document: {}", path.display());

    match extension.as_str() {
        "yaml" | "yml" => {
            serde_saphyr::from_str(&content).map_err(|e| DataGenError::Yaml(e.to_string()))
        }
        _ => Ok(serde_json::from_str(&content)?),
    }
}
