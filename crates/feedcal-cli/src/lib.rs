//! CLI, configuration and rule loading
//!
//! This crate provides the `feedcal` command-line interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod rules;
pub mod secret;

pub use cli::Cli;
pub use config::FeedcalConfig;
pub use error::{ClientError, ClientResult};
pub use rules::{LoadedRules, RuleRowError, RulesError, load_rules, load_rules_file};
