//! OAuth 2.0 authorization code flow with PKCE and a loopback redirect.
//!
//! 1. Generate a code verifier, its S256 challenge and a random state.
//! 2. Bind a listener on 127.0.0.1 and open the consent page in a browser.
//! 3. Read the `code` and `state` from the redirect request.
//! 4. Exchange the code and verifier for tokens.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ProviderError, ProviderResult};

use super::config::{GoogleConfig, OAuthCredentials};
use super::tokens::TokenInfo;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Verifier entropy in bytes, before encoding.
const CODE_VERIFIER_BYTES: usize = 32;

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

const CALLBACK_PATH: &str = "/callback";

/// Response body of the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Client for Google's OAuth endpoints.
#[derive(Debug)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    token_url: String,
    http_client: reqwest::Client,
}

impl OAuthClient {
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ProviderError::internal(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            credentials: config.credentials.clone(),
            token_url: config.token_url.clone(),
            http_client,
        })
    }

    /// Runs the interactive flow and returns fresh tokens.
    ///
    /// Blocks the calling thread while waiting for the browser redirect.
    pub async fn authorize(
        &self,
        scopes: &[String],
        port_range: (u16, u16),
    ) -> ProviderResult<TokenInfo> {
        let pkce = PkceFlow::new();
        let (listener, port) = bind_loopback(port_range)?;
        let redirect_uri = format!("http://127.0.0.1:{}{}", port, CALLBACK_PATH);
        let auth_url = pkce.auth_url(&self.credentials.client_id, &redirect_uri, scopes);

        info!("opening browser for Google authorization");
        debug!("authorization URL: {}", auth_url);
        if let Err(e) = open::that(&auth_url) {
            warn!("failed to open browser: {}", e);
            eprintln!("\nOpen this URL in your browser to continue:\n\n{}\n", auth_url);
        }

        let callback = wait_for_callback(listener)?;
        if callback.state != pkce.state {
            return Err(ProviderError::authentication(
                "OAuth state mismatch, refusing the authorization code",
            ));
        }

        let response = self
            .token_request(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("code", callback.code.as_str()),
                ("code_verifier", pkce.verifier.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .await?;

        info!("obtained Google tokens");
        Ok(TokenInfo::new(
            response.access_token,
            response.refresh_token,
            response.expires_in,
            scopes.to_vec(),
        ))
    }

    /// Trades a refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> ProviderResult<TokenResponse> {
        let response = self
            .token_request(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await?;
        debug!("refreshed Google access token");
        Ok(response)
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> ProviderResult<TokenResponse> {
        let response = self
            .http_client
            .post(&self.token_url)
            .form(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // the token endpoint answers 400 invalid_grant for revoked or expired grants
        if !status.is_success() {
            return Err(ProviderError::authentication(format!(
                "token request failed ({}): {}",
                status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid token response: {}", e))
        })
    }
}

fn bind_loopback(port_range: (u16, u16)) -> ProviderResult<(TcpListener, u16)> {
    (port_range.0..=port_range.1)
        .find_map(|port| {
            TcpListener::bind(("127.0.0.1", port))
                .ok()
                .map(|listener| (listener, port))
        })
        .inspect(|(_, port)| debug!("loopback listener on port {}", port))
        .ok_or_else(|| {
            ProviderError::configuration(format!(
                "no free port between {} and {}",
                port_range.0, port_range.1
            ))
        })
}

fn wait_for_callback(listener: TcpListener) -> ProviderResult<CallbackParams> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            if let Some(result) = answer_callback(stream) {
                let _ = tx.send(result);
                return;
            }
        }
    });

    match rx.recv_timeout(CALLBACK_TIMEOUT) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(ProviderError::authentication(
            "timed out waiting for the OAuth redirect",
        )),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(ProviderError::internal("OAuth callback listener stopped"))
        }
    }
}

/// Reads one request and replies to the browser.
///
/// Returns `None` for requests that are not the redirect (favicon and such).
fn answer_callback(mut stream: TcpStream) -> Option<ProviderResult<CallbackParams>> {
    let mut request_line = String::new();
    BufReader::new(&stream).read_line(&mut request_line).ok()?;

    let result = CallbackParams::from_request_line(&request_line)?;
    let page = match result {
        Ok(_) => "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n\
            <html><body><h1>feedcal is authorized</h1>\
            <p>You can close this window.</p></body></html>",
        Err(_) => "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\n\r\n\
            <html><body><h1>Authorization failed</h1>\
            <p>Check the terminal for details.</p></body></html>",
    };
    let _ = stream.write_all(page.as_bytes());
    let _ = stream.flush();

    Some(result)
}

/// The parameters Google appends to the redirect URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

impl CallbackParams {
    /// Parses an HTTP request line such as
    /// `GET /callback?code=...&state=... HTTP/1.1`.
    pub fn from_request_line(line: &str) -> Option<ProviderResult<Self>> {
        let mut parts = line.split_whitespace();
        if parts.next()? != "GET" {
            return None;
        }
        let target = parts.next()?;
        let url = Url::parse(&format!("http://127.0.0.1{}", target)).ok()?;
        if url.path() != CALLBACK_PATH {
            return None;
        }

        let mut code = None;
        let mut state = None;
        let mut error = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            return Some(Err(ProviderError::authentication(format!(
                "authorization denied: {}",
                error
            ))));
        }

        Some(match code {
            Some(code) => Ok(Self {
                code,
                state: state.unwrap_or_default(),
            }),
            None => Err(ProviderError::authentication(
                "redirect carried no authorization code",
            )),
        })
    }
}

/// PKCE values for one authorization attempt (RFC 7636).
#[derive(Debug)]
pub struct PkceFlow {
    pub verifier: String,
    pub challenge: String,
    /// Anti-CSRF value echoed back in the redirect.
    pub state: String,
}

impl PkceFlow {
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_BYTES);
        let challenge = Self::challenge_for(&verifier);
        Self {
            verifier,
            challenge,
            state: random_token(16),
        }
    }

    fn challenge_for(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }

    /// Builds the consent page URL. Requests offline access so a refresh
    /// token is issued.
    pub fn auth_url(&self, client_id: &str, redirect_uri: &str, scopes: &[String]) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            GOOGLE_AUTH_URL,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes.join(" ")),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(bytes: usize) -> String {
    let mut rng = rand::rng();
    let raw: Vec<u8> = (0..bytes).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(raw)
}
