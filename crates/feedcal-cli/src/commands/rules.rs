//! Rule commands.

use std::fmt::Write as _;
use std::path::Path;

use tracing::debug;

use crate::config::FeedcalConfig;
use crate::error::{ClientError, ClientResult};
use crate::rules::{LoadedRules, load_rules_file, resolve_rules_path};

/// Collects the rules of a run: the rules file first, then inline rules.
///
/// `rules_override` replaces `sync.rules_file`. Having no rule at all is an
/// error.
pub(crate) fn collect(
    config: &FeedcalConfig,
    config_path: &Path,
    rules_override: Option<&Path>,
) -> ClientResult<LoadedRules> {
    let mut loaded = match rules_override.or(config.sync.rules_file.as_deref()) {
        Some(file) => {
            let path = resolve_rules_path(file, config_path);
            debug!("loading rules from {}", path.display());
            load_rules_file(&path)?
        }
        None => LoadedRules::default(),
    };

    for (idx, rule) in config.rules.iter().enumerate() {
        rule.validate()
            .map_err(|e| ClientError::Config(format!("rules[{}]: {}", idx, e)))?;
        loaded.rules.push(rule.clone());
    }

    if loaded.rules.is_empty() {
        return Err(ClientError::Config(format!(
            "no rules found. Set sync.rules_file or add [[rules]] to {}",
            config_path.display()
        )));
    }

    Ok(loaded)
}

/// Load the rules and print what each one matches.
pub fn check(
    config: &FeedcalConfig,
    config_path: &Path,
    rules_override: Option<&Path>,
) -> ClientResult<()> {
    let loaded = collect(config, config_path, rules_override)?;
    print!("{}", render_rules(&loaded));
    Ok(())
}

pub(crate) fn render_rules(loaded: &LoadedRules) -> String {
    let mut out = String::new();
    for rule in &loaded.rules {
        let _ = writeln!(out, "{}: {}", rule.calendar, rule.describe());
    }
    for row in &loaded.skipped {
        let _ = writeln!(out, "skipped line {}: {}", row.line, row.reason);
    }
    let _ = writeln!(
        out,
        "{} rules, {} skipped rows",
        loaded.rules.len(),
        loaded.skipped.len()
    );
    out
}
