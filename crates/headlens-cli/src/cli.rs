//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Headlens - read-only views of a headscale server.
#[derive(Parser, Debug, Clone)]
#[command(name = "headlens")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Headscale server URL.
    #[arg(long, env = "HEADSCALE_URL")]
    pub url: Option<String>,

    /// Headscale API key.
    #[arg(long, env = "HEADSCALE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// IANA timezone timestamps are shown in.
    #[arg(long, env = "TZ")]
    pub timezone: Option<String>,

    /// Log filter, e.g. `info` or `headlens_core=debug`.
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Enrich entities one at a time, in order.
    #[arg(long, conflicts_with = "max_workers")]
    pub sequential: bool,

    /// Upper bound on concurrent lookups.
    #[arg(long, value_name = "N")]
    pub max_workers: Option<usize>,

    /// Bound on a single lookup, in seconds.
    #[arg(long, value_name = "SECS")]
    pub task_timeout: Option<u64>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// List machines with routes, status and expiry.
    Machines,

    /// List users and their pre-auth keys.
    Users,

    /// Show server-wide counters.
    Overview,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_help_does_not_panic() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_machines_command() {
        let cli = Cli::parse_from(["headlens", "--url", "https://hs.example", "machines"]);
        assert_eq!(cli.command, Commands::Machines);
        assert_eq!(cli.url.as_deref(), Some("https://hs.example"));
        assert_eq!(cli.format, Format::Table);
        assert!(!cli.sequential);
    }

    #[test]
    fn parse_concurrency_flags() {
        let cli = Cli::parse_from([
            "headlens",
            "--max-workers",
            "4",
            "--task-timeout",
            "12",
            "--format",
            "json",
            "users",
        ]);
        assert_eq!(cli.command, Commands::Users);
        assert_eq!(cli.max_workers, Some(4));
        assert_eq!(cli.task_timeout, Some(12));
        assert_eq!(cli.format, Format::Json);
    }

    #[test]
    fn sequential_conflicts_with_max_workers() {
        let result =
            Cli::try_parse_from(["headlens", "--sequential", "--max-workers", "4", "overview"]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_config_path() {
        let cli = Cli::parse_from(["headlens", "-c", "/etc/headlens.toml", "overview"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/headlens.toml")));
        assert_eq!(cli.command, Commands::Overview);
    }
}
