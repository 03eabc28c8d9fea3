//! feedcal CLI entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use feedcal_core::{TracingConfig, init_tracing};

use feedcal_cli::cli::{AuthProvider, Cli, Command, ConfigAction, RulesAction};
use feedcal_cli::commands;
use feedcal_cli::config::FeedcalConfig;
use feedcal_cli::error::ClientResult;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::cli()
    };
    if let Err(e) = init_tracing(tracing_config.with_format(cli.log_format)) {
        eprintln!("warning: could not initialize logging: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config_path: PathBuf = cli.config.clone().unwrap_or_else(FeedcalConfig::default_path);
    let config = if cli.config.is_some() {
        FeedcalConfig::load_from(&config_path)?
    } else {
        FeedcalConfig::load()?
    };

    match cli.command {
        Command::Sync {
            dry_run,
            offline,
            rules,
            days,
        } => {
            let options = commands::sync::SyncOptions {
                dry_run,
                offline,
                rules,
                days,
            };
            commands::sync::run(&config, &config_path, options).await
        }
        Command::Auth { provider } => match provider {
            #[cfg(feature = "google")]
            AuthProvider::Google {
                client_id,
                client_secret,
                credentials_file,
                force,
            } => {
                commands::auth::google(
                    client_id,
                    client_secret,
                    credentials_file,
                    force,
                    &config,
                    &config_path,
                )
                .await
            }
        },
        Command::Rules { action } => match action {
            RulesAction::Check { rules } => {
                commands::rules::check(&config, &config_path, rules.as_deref())
            }
        },
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Validate => commands::config::validate(&config, &config_path),
            ConfigAction::Path => commands::config::path(&config_path),
        },
    }
}
