//! TOML configuration file loading
//!
//! The file is `--config-file` when given (and must then exist), otherwise
//! `walkin.toml` in the platform config directory if present. Keys use the
//! long option names, e.g. `dedupe-window = 15`.

use crate::core::error_handling::ContextualError;
use crate::core::validation::ValidationError;
use std::path::{Path, PathBuf};

use super::args::Args;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("The specified configuration file does not exist: {}", path.display())]
    Missing { path: PathBuf },

    #[error("Error reading configuration file {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("Error parsing configuration file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Error in configuration file {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        true
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ConfigError::Invalid { source, .. } => Some(source.message()),
            _ => None,
        }
    }
}

/// Default location of the configuration file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("Walkin").join("walkin.toml"))
}

impl Args {
    /// Load the configuration file into any options not set on the command line
    ///
    /// Returns the path that was loaded, if any.
    pub async fn load_config_file(args: &mut Self) -> Result<Option<PathBuf>, ConfigError> {
        let path = match args.config_file.clone() {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::Missing { path });
                }
                path
            }
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(None),
            },
        };

        let config = read_table(&path).await?;
        Self::apply_toml_values(args, &config).map_err(|source| ConfigError::Invalid {
            path: path.clone(),
            source,
        })?;
        Ok(Some(path))
    }

    /// Apply TOML values to options that are still unset
    pub fn apply_toml_values(args: &mut Self, config: &toml::Table) -> Result<(), ValidationError> {
        if !args.color && !args.no_color {
            if let Some(color) = config.get("color").and_then(|v| v.as_bool()) {
                args.color = color;
                args.no_color = !color;
            }
        }

        fill_string(config, "log-level", &mut args.log_level)?;
        fill_string(config, "log-format", &mut args.log_format)?;
        if args.log_file.is_none() {
            let mut log_file = None;
            fill_string(config, "log-file", &mut log_file)?;
            args.log_file = log_file.map(PathBuf::from);
        }
        fill_string(config, "notifier-url", &mut args.notifier_url)?;
        fill_string(config, "app-base-url", &mut args.app_base_url)?;

        fill_integer(config, "dedupe-window", &mut args.dedupe_window)?;
        fill_integer(config, "notifier-timeout", &mut args.notifier_timeout)?;
        fill_integer(config, "history-sample", &mut args.history_sample)?;
        fill_integer(
            config,
            "minutes-per-person",
            &mut args.default_minutes_per_person,
        )?;
        fill_integer(config, "fanout-capacity", &mut args.fanout_capacity)?;
        fill_integer(config, "dispatch-capacity", &mut args.dispatch_capacity)?;

        Ok(())
    }
}

async fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    toml::from_str::<toml::Table>(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn fill_string(
    config: &toml::Table,
    key: &str,
    target: &mut Option<String>,
) -> Result<(), ValidationError> {
    if target.is_some() {
        return Ok(());
    }
    match config.get(key) {
        None => Ok(()),
        Some(value) => match value.as_str() {
            Some(text) => {
                *target = Some(text.to_string());
                Ok(())
            }
            None => Err(ValidationError::new(format!("{} must be a string", key))),
        },
    }
}

fn fill_integer<T: TryFrom<i64>>(
    config: &toml::Table,
    key: &str,
    target: &mut Option<T>,
) -> Result<(), ValidationError> {
    if target.is_some() {
        return Ok(());
    }
    let Some(value) = config.get(key) else {
        return Ok(());
    };
    let converted = value
        .as_integer()
        .filter(|n| *n > 0)
        .and_then(|n| T::try_from(n).ok())
        .ok_or_else(|| ValidationError::new(format!("{} must be a positive integer", key)))?;
    *target = Some(converted);
    Ok(())
}
