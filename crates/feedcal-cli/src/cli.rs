//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use feedcal_core::TracingOutputFormat;

/// feedcal - keep calendars in step with a public event feed
#[derive(Debug, Parser)]
#[command(name = "feedcal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "FEEDCAL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Log output format (pretty, compact or json)
    #[arg(long, default_value = "compact", global = true)]
    pub log_format: TracingOutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sync the feed into the configured calendars
    Sync {
        /// Plan and report without changing any calendar
        #[arg(long)]
        dry_run: bool,

        /// Plan against an empty in-memory store instead of Google Calendar
        #[arg(long, requires = "dry_run")]
        offline: bool,

        /// Rules CSV file (overrides sync.rules_file)
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Days after today to cover (overrides sync.horizon_days)
        #[arg(long)]
        days: Option<u32>,
    },

    /// Authentication commands
    Auth {
        #[command(subcommand)]
        provider: AuthProvider,
    },

    /// Rule commands
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Authentication providers.
#[derive(Debug, Subcommand)]
pub enum AuthProvider {
    /// Authenticate with Google Calendar
    #[cfg(feature = "google")]
    Google {
        /// OAuth client ID (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_ID")]
        client_id: Option<String>,

        /// OAuth client secret (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_SECRET")]
        client_secret: Option<String>,

        /// Path to Google Cloud Console credentials JSON file
        ///
        /// This is the JSON file downloaded from the Google Cloud Console
        /// OAuth 2.0 credentials page. Alternative to providing client_id
        /// and client_secret separately.
        #[arg(long, env = "GOOGLE_CREDENTIALS_FILE")]
        credentials_file: Option<PathBuf>,

        /// Force re-authentication even if already authenticated
        #[arg(long, short)]
        force: bool,
    },
}

/// Rule actions.
#[derive(Debug, Subcommand)]
pub enum RulesAction {
    /// Load the rules and print what each one matches
    Check {
        /// Rules CSV file (overrides sync.rules_file)
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
