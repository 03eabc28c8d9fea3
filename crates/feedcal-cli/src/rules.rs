//! Loading rules from a CSV file.
//!
//! The file has a header row naming at least the `calendar`, `title`,
//! `location`, `category` and `tags` columns, in any order. `tags` holds a
//! comma-separated list, optionally wrapped in single quotes:
//!
//! ```text
//! calendar,title,location,category,tags
//! all entertainment,,,entertainment,
//! dances,,,,'dance,swing'
//! ```
//!
//! A single-quoted list is not CSV quoting, so its commas split the row into
//! extra fields. When `tags` is the last column those trailing fields are
//! joined back into it.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use feedcal_core::Rule;
use thiserror::Error;
use tracing::{debug, warn};

/// Columns every rules file must have.
pub const COLUMNS: [&str; 5] = ["calendar", "title", "location", "category", "tags"];

/// Failures that make a rules file unusable.
#[derive(Debug, Error)]
pub enum RulesError {
    #[error("failed to read rules from {origin}: {source}")]
    Read {
        origin: String,
        #[source]
        source: csv::Error,
    },

    #[error("rules file {origin} is missing column(s): {}", .missing.join(", "))]
    MissingColumns { origin: String, missing: Vec<String> },
}

/// A row that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRowError {
    /// 1-based line number in the file.
    pub line: u64,
    pub reason: String,
}

/// Rules read from one file, plus the rows that were skipped.
#[derive(Debug, Clone, Default)]
pub struct LoadedRules {
    pub rules: Vec<Rule>,
    pub skipped: Vec<RuleRowError>,
}

pub fn load_rules_file(path: &Path) -> Result<LoadedRules, RulesError> {
    let origin = path.display().to_string();
    let file = File::open(path).map_err(|e| RulesError::Read {
        origin: origin.clone(),
        source: e.into(),
    })?;
    load_rules(file, &origin)
}

/// Reads rules from CSV data. `origin` names the data in errors.
pub fn load_rules<R: Read>(reader: R, origin: &str) -> Result<LoadedRules, RulesError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let read_error = |source: csv::Error| RulesError::Read {
        origin: origin.to_string(),
        source,
    };

    let headers = csv_reader.headers().map_err(read_error)?.clone();
    let position = |name: &str| headers.iter().position(|h| h == name);

    let missing: Vec<String> = COLUMNS
        .into_iter()
        .filter(|&c| position(c).is_none())
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(RulesError::MissingColumns {
            origin: origin.to_string(),
            missing,
        });
    }

    let [calendar, title, location, category, tags] = COLUMNS.map(|c| position(c).unwrap_or(0));
    let tags_is_last = tags + 1 == headers.len();

    let mut loaded = LoadedRules::default();
    for (idx, record) in csv_reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map_or(idx as u64 + 2, |p| p.line());
                warn!("{}:{}: skipping rule row: {}", origin, line, e);
                loaded.skipped.push(RuleRowError {
                    line,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let line = record.position().map_or(idx as u64 + 2, |p| p.line());
        let field = |i: usize| record.get(i).unwrap_or_default();

        let raw_tags = if tags_is_last && record.len() > headers.len() {
            record.iter().skip(tags).collect::<Vec<_>>().join(",")
        } else {
            field(tags).to_string()
        };

        let rule = Rule::new(field(calendar))
            .with_title(field(title))
            .with_location(field(location))
            .with_category(field(category))
            .with_tags(parse_tags(&raw_tags));

        if let Err(e) = rule.validate() {
            warn!("{}:{}: skipping rule row: {}", origin, line, e);
            loaded.skipped.push(RuleRowError {
                line,
                reason: e.to_string(),
            });
            continue;
        }

        debug!("{}:{}: rule for '{}'", origin, line, rule.calendar);
        loaded.rules.push(rule);
    }

    Ok(loaded)
}

/// Splits a tags cell into trimmed, non-empty tags.
pub fn parse_tags(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    let raw = raw
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(raw);

    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolves a rules path relative to the directory of the config file.
pub fn resolve_rules_path(path: &Path, config_path: &Path) -> PathBuf {
    let path = crate::config::expand_home(path);
    if path.is_absolute() {
        return path;
    }
    match config_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(path),
        _ => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(data: &str) -> LoadedRules {
        load_rules(data.as_bytes(), "test.csv").unwrap()
    }

    #[test]
    fn parses_rows_in_order() {
        let loaded = load(
            "calendar,title,location,category,tags\n\
             all entertainment,,,entertainment,\n\
             Swing, Swing Night , Savannah Center,,\n",
        );

        assert!(loaded.skipped.is_empty());
        assert_eq!(loaded.rules.len(), 2);
        assert_eq!(
            loaded.rules[0],
            Rule::new("all entertainment").with_category("entertainment")
        );
        assert_eq!(loaded.rules[1].title, "Swing Night");
        assert_eq!(loaded.rules[1].location, "Savannah Center");
    }

    #[test]
    fn columns_can_be_reordered() {
        let loaded = load("tags,calendar,category,location,title\n\"dance,swing\",dances,,,\n");
        assert_eq!(loaded.rules[0].calendar, "dances");
        assert_eq!(loaded.rules[0].tags, vec!["dance", "swing"]);
    }

    #[test]
    fn single_quoted_tags_are_rejoined() {
        let loaded = load("calendar,title,location,category,tags\ndances,,,,'dance, swing'\n");
        assert_eq!(loaded.rules[0].tags, vec!["dance", "swing"]);
    }

    #[test]
    fn missing_columns_are_fatal() {
        let err = load_rules("calendar,title\nmusic,Jazz\n".as_bytes(), "bad.csv").unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"rules file bad.csv is missing column(s): location, category, tags");
    }

    #[test]
    fn blank_calendar_rows_are_skipped() {
        let loaded = load(
            "calendar,title,location,category,tags\n\
             ,Bingo,,,\n\
             music,,,music,\n",
        );

        assert_eq!(loaded.rules.len(), 1);
        assert_eq!(loaded.skipped.len(), 1);
        assert_eq!(loaded.skipped[0].line, 2);
    }

    #[test]
    fn empty_file_has_no_rules() {
        let loaded = load("calendar,title,location,category,tags\n");
        assert!(loaded.rules.is_empty());
    }

    #[test]
    fn tag_cells() {
        assert_eq!(parse_tags("'dance,swing'"), vec!["dance", "swing"]);
        assert_eq!(parse_tags(" dance , , swing "), vec!["dance", "swing"]);
        assert_eq!(parse_tags("''"), Vec::<String>::new());
        assert_eq!(parse_tags(""), Vec::<String>::new());
        assert_eq!(parse_tags("'solo"), vec!["'solo"]);
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search_terms.csv");
        std::fs::write(&path, "calendar,title,location,category,tags\nmusic,,,music,\n").unwrap();

        let loaded = load_rules_file(&path).unwrap();
        assert_eq!(loaded.rules, vec![Rule::new("music").with_category("music")]);

        let err = load_rules_file(&dir.path().join("absent.csv")).unwrap_err();
        assert!(err.to_string().contains("absent.csv"));
    }

    #[test]
    fn relative_rules_path_follows_config_dir() {
        let config = Path::new("/etc/feedcal/config.toml");
        assert_eq!(
            resolve_rules_path(Path::new("search_terms.csv"), config),
            PathBuf::from("/etc/feedcal/search_terms.csv")
        );
        assert_eq!(
            resolve_rules_path(Path::new("/srv/rules.csv"), config),
            PathBuf::from("/srv/rules.csv")
        );
        assert_eq!(
            resolve_rules_path(Path::new("rules.csv"), Path::new("config.toml")),
            PathBuf::from("rules.csv")
        );
    }
}
