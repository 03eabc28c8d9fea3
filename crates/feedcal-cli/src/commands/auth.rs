//! Authentication commands.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::{FeedcalConfig, GoogleSettings, expand_home};
use crate::error::{ClientError, ClientResult};

/// Run the Google authentication flow.
///
/// Resolves credentials from CLI flags, a `--credentials-file`, or
/// `config.toml`, then runs the OAuth 2.0 PKCE flow.
///
/// When credentials are provided via CLI or `--credentials-file`, they are
/// persisted to `config_path` so later `sync` runs find them.
pub async fn google(
    client_id: Option<String>,
    client_secret: Option<String>,
    credentials_file: Option<PathBuf>,
    force: bool,
    config: &FeedcalConfig,
    config_path: &Path,
) -> ClientResult<()> {
    use feedcal_providers::google::{GoogleConfig, GoogleStore, OAuthCredentials};

    let (final_client_id, final_client_secret, source) = resolve_google_credentials(
        client_id,
        client_secret,
        credentials_file,
        config.google.as_ref(),
    )?;

    let credentials = OAuthCredentials::new(&final_client_id, &final_client_secret);
    credentials
        .validate()
        .map_err(|e| ClientError::Config(format!("invalid Google credentials: {}", e)))?;

    let mut google_config = GoogleConfig::new(credentials);
    if let Some(ref google_settings) = config.google
        && let Some(ref path) = google_settings.token_path
    {
        google_config = google_config.with_token_path(expand_home(path));
    }

    let store = GoogleStore::new(google_config)?;

    if store.is_authenticated() && !force {
        save_credentials(config_path, &final_client_id, &final_client_secret, &source);
        println!("Already authenticated with Google Calendar.");
        println!("Use --force to re-authenticate.");
        return Ok(());
    }

    println!("Starting Google Calendar authentication...");
    println!();
    println!("A browser window will open for you to authorize access.");
    println!("If the browser doesn't open, check the terminal for a URL to copy.");
    println!();

    store.authenticate().await?;

    save_credentials(config_path, &final_client_id, &final_client_secret, &source);

    info!("Google authentication successful");
    println!();
    println!("Authentication successful!");
    println!("You can now run: feedcal sync --dry-run");

    Ok(())
}

/// Where the credentials were resolved from.
#[derive(Debug, PartialEq)]
enum CredentialSource {
    /// From CLI flags (--client-id/--client-secret or --credentials-file)
    Cli,
    /// From config.toml (already persisted)
    Config,
}

/// Persists CLI-provided credentials, reporting but not failing on errors.
fn save_credentials(
    config_path: &Path,
    client_id: &str,
    client_secret: &str,
    source: &CredentialSource,
) {
    if *source == CredentialSource::Config {
        return;
    }
    match save_credentials_to_config(config_path, client_id, client_secret) {
        Ok(()) => println!("Credentials saved to {}", config_path.display()),
        Err(e) => warn!(
            "could not save credentials to {}: {}",
            config_path.display(),
            e
        ),
    }
}

/// Writes `client_id` and `client_secret` under `[google]`, keeping the rest
/// of the file (comments and formatting included) intact.
fn save_credentials_to_config(
    config_path: &Path,
    client_id: &str,
    client_secret: &str,
) -> Result<(), String> {
    let content = if config_path.exists() {
        std::fs::read_to_string(config_path).map_err(|e| e.to_string())?
    } else {
        String::new()
    };

    let mut doc = content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|e| format!("could not parse config for writing: {}", e))?;

    if !doc.contains_key("google") {
        doc["google"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    let google = doc["google"]
        .as_table_mut()
        .ok_or_else(|| "`google` is not a table".to_string())?;
    google["client_id"] = toml_edit::value(client_id);
    google["client_secret"] = toml_edit::value(client_secret);

    if let Some(parent) = config_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("could not create {}: {}", parent.display(), e))?;
    }

    std::fs::write(config_path, doc.to_string()).map_err(|e| e.to_string())?;
    info!("credentials saved to {}", config_path.display());
    Ok(())
}

/// Resolves Google credentials from multiple sources.
///
/// Priority (highest to lowest):
/// 1. CLI `--client-id` + `--client-secret`
/// 2. CLI `--credentials-file` (Google Cloud Console JSON)
/// 3. `config.toml` `[google]` section (client_id + client_secret, with secret resolution)
fn resolve_google_credentials(
    cli_client_id: Option<String>,
    cli_client_secret: Option<String>,
    cli_credentials_file: Option<PathBuf>,
    config_google: Option<&GoogleSettings>,
) -> ClientResult<(String, String, CredentialSource)> {
    use feedcal_providers::google::OAuthCredentials;

    if let (Some(id), Some(secret)) = (&cli_client_id, &cli_client_secret) {
        return Ok((id.clone(), secret.clone(), CredentialSource::Cli));
    }

    if let Some(ref path) = cli_credentials_file {
        let creds = OAuthCredentials::from_file(path).map_err(|e| {
            ClientError::Config(format!(
                "failed to load credentials from {}: {}",
                path.display(),
                e
            ))
        })?;
        return Ok((creds.client_id, creds.client_secret, CredentialSource::Cli));
    }

    if let Some(google) = config_google
        && google.client_id.is_some()
        && google.client_secret.is_some()
    {
        let creds = google.resolve_credentials().map_err(|e| {
            ClientError::Config(format!(
                "failed to resolve Google credentials from config: {}",
                e
            ))
        })?;
        return Ok((creds.client_id, creds.client_secret, CredentialSource::Config));
    }

    if cli_client_id.is_some() || cli_client_secret.is_some() {
        return Err(ClientError::Config(
            "both --client-id and --client-secret are required when providing credentials directly"
                .to_string(),
        ));
    }

    Err(ClientError::Config(format!(
        "Google credentials are required. Provide via:\n  \
         - client_id + client_secret in {}\n  \
         - --client-id and --client-secret flags\n  \
         - --credentials-file flag (path to Google Cloud Console JSON)\n  \
         - GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET env vars",
        FeedcalConfig::default_path().display()
    )))
}
