//! Configuration file loading and merging with command-line values.
//!
//! Values given on the command line (or through their environment
//! variables) win over the file; the file wins over built-in defaults.

use std::path::Path;
use std::time::Duration;

use chrono_tz::Tz;
use headlens_core::{AggregatorConfig, ConcurrencyPolicy, DEFAULT_TASK_TIMEOUT};
use serde::Deserialize;

use crate::cli::Cli;
use crate::error::CliError;

/// Log filter used when none is configured.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Contents of a headlens TOML file.
///
/// ```toml
/// log_level = "info"
///
/// [server]
/// url = "https://headscale.example.com"
/// api_key = "hskey-..."
///
/// [display]
/// timezone = "Europe/Berlin"
///
/// [concurrency]
/// max_workers = 8
/// task_timeout_secs = 30
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Log filter.
    pub log_level: Option<String>,
    /// Server connection.
    pub server: ServerSection,
    /// Display settings.
    pub display: DisplaySection,
    /// Scheduling of per-entity lookups.
    pub concurrency: ConcurrencySection,
}

/// `[server]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    /// Headscale server URL.
    pub url: Option<String>,
    /// Headscale API key.
    pub api_key: Option<String>,
}

/// `[display]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplaySection {
    /// IANA timezone name.
    pub timezone: Option<String>,
}

/// `[concurrency]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConcurrencySection {
    /// Run lookups one at a time.
    pub sequential: Option<bool>,
    /// Upper bound on concurrent lookups.
    pub max_workers: Option<usize>,
    /// Bound on a single lookup.
    pub task_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CliError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(content)?)
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Headscale server URL.
    pub url: String,
    /// Headscale API key.
    pub api_key: String,
    /// Log filter.
    pub log_level: String,
    /// Aggregation settings.
    pub aggregator: AggregatorConfig,
}

impl Settings {
    /// Merge command-line values over file values and validate.
    ///
    /// A `debug` or `trace` log level selects sequential enrichment unless
    /// a policy was chosen explicitly.
    ///
    /// # Errors
    ///
    /// Returns an error if a required value is missing or a value is invalid.
    pub fn resolve(cli: &Cli, file: FileConfig) -> Result<Self, CliError> {
        let url = required("server url", cli.url.clone().or(file.server.url))?;
        let api_key = required("api key", cli.api_key.clone().or(file.server.api_key))?;

        let log_level = cli
            .log_level
            .clone()
            .or(file.log_level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let timezone = match cli.timezone.as_deref().or(file.display.timezone.as_deref()) {
            Some(name) => parse_timezone(name)?,
            None => Tz::UTC,
        };

        let sequential = if cli.sequential {
            Some(true)
        } else {
            file.concurrency.sequential
        };
        let max_workers = cli.max_workers.or(file.concurrency.max_workers);
        let policy = match (sequential, max_workers) {
            (_, Some(0)) => return Err(CliError::config("max_workers must be greater than 0")),
            (Some(true), _) => ConcurrencyPolicy::Sequential,
            (_, Some(n)) => ConcurrencyPolicy::pooled(n).unwrap_or_default(),
            (Some(false), None) => ConcurrencyPolicy::default(),
            (None, None) if is_debug_level(&log_level) => ConcurrencyPolicy::Sequential,
            (None, None) => ConcurrencyPolicy::default(),
        };

        let task_timeout = match cli.task_timeout.or(file.concurrency.task_timeout_secs) {
            Some(0) => return Err(CliError::config("task_timeout must be greater than 0")),
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_TASK_TIMEOUT,
        };

        Ok(Self {
            url,
            api_key,
            log_level,
            aggregator: AggregatorConfig::new(timezone)
                .with_policy(policy)
                .with_task_timeout(task_timeout),
        })
    }
}

fn required(what: &str, value: Option<String>) -> Result<String, CliError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(CliError::config(format!("{what} is required"))),
    }
}

fn parse_timezone(name: &str) -> Result<Tz, CliError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| CliError::config(format!("unknown timezone '{name}': {e}")))
}

/// Whether a log filter enables debug output for headlens.
fn is_debug_level(filter: &str) -> bool {
    let filter = filter.to_ascii_lowercase();
    filter
        .split(',')
        .filter(|directive| {
            let target = directive.split('=').next().unwrap_or_default();
            !directive.contains('=') || target.starts_with("headlens")
        })
        .any(|directive| {
            let level = directive.rsplit('=').next().unwrap_or_default().trim();
            level == "debug" || level == "trace"
        })
}
