use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::DataGenError;
use crate::faker::FakerLocale;
use crate::files_reader::{expand_path, load_typed};

/// File name looked up in the working directory when no config path is given.
pub const DEFAULT_CONFIG_FILE: &str = "oasgen.config.json";

/// Engine-wide settings, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OasGenConfig {
    /// Name of the property that identifies a resource when no id mapping applies.
    pub default_id_property_name: String,
    /// Locale used for names, emails and other locale-aware fake strings.
    pub faker_locale: FakerLocale,
    /// Status code returned by the API for a body that does not match its schema.
    pub invalid_property_default_response: u16,
}

impl Default for OasGenConfig {
    fn default() -> Self {
        OasGenConfig {
            default_id_property_name: "id".to_owned(),
            faker_locale: FakerLocale::default(),
            invalid_property_default_response: 422,
        }
    }
}

impl OasGenConfig {
    /// Loads the config from `path`, then from `oasgen.config.json`, then falls back to defaults.
    #[must_use]
    pub fn load(config_path: Option<&str>) -> Self {
        if let Some(path) = config_path {
            match Self::from_path(&expand_path(path)) {
                Ok(cfg) => return cfg,
                Err(e) => tracing::warn!("Ignoring config '{}': {}", path, e),
            }
        }

        let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        if default_path.exists()
            && let Ok(cfg) = Self::from_path(&default_path)
        {
            return cfg;
        }

        OasGenConfig::default()
    }

    /// Reads a config file (JSON or YAML). Missing keys take their default values.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, DataGenError> {
        load_typed(path)
    }
}
