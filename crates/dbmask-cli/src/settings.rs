use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use dbmask_engine::MaskOptions;

/// Settings file looked up in the working directory when `--settings` is absent.
pub const DEFAULT_SETTINGS_FILE: &str = "dbmask.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Contents of `dbmask.toml`.
///
/// ```toml
/// connection = "Server=tcp:db01,1433;Database=Shop;User Id=masker;Password=..."
/// run_dir = "runs"
///
/// [masking]
/// batch_size = 500
/// locale = "pt_BR"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub connection: Option<String>,
    pub run_dir: Option<PathBuf>,
    pub masking: MaskOptions,
}

/// Load settings from `path`, or from `dbmask.toml` when it exists.
///
/// An explicit path must exist; the implicit file is optional.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, SettingsError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let implicit = PathBuf::from(DEFAULT_SETTINGS_FILE);
            if !implicit.exists() {
                return Ok(Settings::default());
            }
            implicit
        }
    };
    let content = std::fs::read_to_string(&path).map_err(|source| SettingsError::Io {
        path: path.clone(),
        source,
    })?;
    parse_settings(&content).map_err(|source| SettingsError::Toml { path, source })
}

pub fn parse_settings(content: &str) -> Result<Settings, toml::de::Error> {
    toml::from_str(content)
}

/// Command-line values that win over the settings file.
#[derive(Debug, Clone, Default)]
pub struct OptionOverrides {
    pub batch_size: Option<usize>,
    pub retry: Option<u64>,
    pub modulus_factor: Option<u64>,
    pub command_timeout_secs: Option<u64>,
    pub exact_length: bool,
    pub locale: Option<String>,
    pub seed: Option<u64>,
    pub scratch_database: Option<String>,
    pub dictionary_import: Vec<PathBuf>,
    pub dictionary_export_dir: Option<PathBuf>,
}

impl OptionOverrides {
    pub fn apply(self, options: &mut MaskOptions) {
        if let Some(batch_size) = self.batch_size {
            options.batch_size = batch_size;
        }
        if let Some(retry) = self.retry {
            options.retry = retry;
        }
        if let Some(modulus_factor) = self.modulus_factor {
            options.modulus_factor = modulus_factor;
        }
        if let Some(seconds) = self.command_timeout_secs {
            options.command_timeout_secs = seconds;
        }
        if self.exact_length {
            options.exact_length = true;
        }
        if let Some(locale) = self.locale {
            options.locale = locale;
        }
        if self.seed.is_some() {
            options.seed = self.seed;
        }
        if let Some(database) = self.scratch_database {
            options.scratch_database = database;
        }
        // Imports accumulate; the export directory replaces.
        options.dictionary_import.extend(self.dictionary_import);
        if self.dictionary_export_dir.is_some() {
            options.dictionary_export_dir = self.dictionary_export_dir;
        }
    }
}
