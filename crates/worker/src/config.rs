//! Worker configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use registrar_core::options::{
    ImportOptions, DEFAULT_CHUNK_SIZE, DEFAULT_DELAY_BETWEEN_CHUNKS_MS, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRY_DELAY_MS,
};

/// Destination name used when `IMPORT_TARGET` is unset.
pub const DEFAULT_TARGET: &str = "registrations";

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// `json` (any case) selects JSON; anything else is plain text.
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT") {
            Ok(v) if v.trim().eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

/// One import job described by the environment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// JSON dataset file (`IMPORT_DATASET`, required).
    pub dataset_path: PathBuf,
    /// JSON `field -> column` mapping file (`IMPORT_MAPPING`, required).
    pub mapping_path: PathBuf,
    /// JSON `field -> rule` file (`IMPORT_RULES`, optional).
    pub rules_path: Option<PathBuf>,
    /// Destination name (default: `registrations`).
    pub target: String,
    pub options: ImportOptions,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default         |
    /// |--------------------------|-----------------|
    /// | `IMPORT_DATASET`         | required        |
    /// | `IMPORT_MAPPING`         | required        |
    /// | `IMPORT_RULES`           | none            |
    /// | `IMPORT_TARGET`          | `registrations` |
    /// | `IMPORT_CHUNK_SIZE`      | `100`           |
    /// | `IMPORT_DELAY_MS`        | `1000`          |
    /// | `IMPORT_AUTO_RETRY`      | `true`          |
    /// | `IMPORT_MAX_RETRIES`     | `3`             |
    /// | `IMPORT_RETRY_DELAY_MS`  | `5000`          |
    /// | `IMPORT_SKIP_DUPLICATES` | `false`         |
    /// | `IMPORT_KEY_FIELD`       | none            |
    /// | `IMPORT_DEFAULT_STATUS`  | none            |
    /// | `IMPORT_VALIDATE_ONLY`   | `false`         |
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let dataset_path = var("IMPORT_DATASET")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("IMPORT_DATASET environment variable is required"))?;
        let mapping_path = var("IMPORT_MAPPING")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("IMPORT_MAPPING environment variable is required"))?;

        let options = ImportOptions {
            chunk_size: parse_or(var("IMPORT_CHUNK_SIZE"), "IMPORT_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
            delay_between_chunks_ms: parse_or(
                var("IMPORT_DELAY_MS"),
                "IMPORT_DELAY_MS",
                DEFAULT_DELAY_BETWEEN_CHUNKS_MS,
            )?,
            auto_retry: parse_bool_or(var("IMPORT_AUTO_RETRY"), "IMPORT_AUTO_RETRY", true)?,
            max_retries: parse_or(
                var("IMPORT_MAX_RETRIES"),
                "IMPORT_MAX_RETRIES",
                DEFAULT_MAX_RETRIES,
            )?,
            retry_delay_ms: parse_or(
                var("IMPORT_RETRY_DELAY_MS"),
                "IMPORT_RETRY_DELAY_MS",
                DEFAULT_RETRY_DELAY_MS,
            )?,
            skip_duplicates: parse_bool_or(
                var("IMPORT_SKIP_DUPLICATES"),
                "IMPORT_SKIP_DUPLICATES",
                false,
            )?,
            key_field: var("IMPORT_KEY_FIELD"),
            default_status: var("IMPORT_DEFAULT_STATUS"),
            validate_only: parse_bool_or(var("IMPORT_VALIDATE_ONLY"), "IMPORT_VALIDATE_ONLY", false)?,
            ..Default::default()
        };

        Ok(Self {
            dataset_path,
            mapping_path,
            rules_path: var("IMPORT_RULES").map(PathBuf::from),
            target: var("IMPORT_TARGET").unwrap_or_else(|| DEFAULT_TARGET.to_string()),
            options,
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) => v
            .parse()
            .with_context(|| format!("{key} must be a non-negative integer, got '{v}'")),
        None => Ok(default),
    }
}

fn parse_bool_or(value: Option<String>, key: &str, default: bool) -> anyhow::Result<bool> {
    let Some(v) = value else {
        return Ok(default);
    };
    match v.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => bail!("{key} must be a boolean, got '{v}'"),
    }
}
