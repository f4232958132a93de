//! Google OAuth 2.0 credentials for the channel-owner tools
//!
//! Client secrets are the JSON downloaded from the Google Cloud console. The
//! token cache is a JSON [`Credential`] that is refreshed and rewritten in
//! place whenever the access token has expired.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::clients::read_json;
use crate::errors::ApiError;

pub const AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_REDIRECT_URI: &str = "http://localhost";
const TOKEN_EXPIRY_BUFFER_SECS: i64 = 60;

pub const SCOPES: [&str; 5] = [
    "https://www.googleapis.com/auth/youtube",
    "https://www.googleapis.com/auth/youtube.readonly",
    "https://www.googleapis.com/auth/youtube.force-ssl",
    "https://www.googleapis.com/auth/yt-analytics.readonly",
    "https://www.googleapis.com/auth/yt-analytics-monetary.readonly",
];

const NOT_AUTHENTICATED: &str =
    "YouTube OAuth is not configured. Run setup_youtube_oauth and then complete_youtube_oauth with the authorization code.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

fn default_token_uri() -> String {
    TOKEN_URI.to_string()
}

impl Credential {
    /// A credential without an expiry never goes stale.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expiry {
            Some(expiry) => expiry
                .checked_sub_signed(Duration::seconds(TOKEN_EXPIRY_BUFFER_SECS))
                .is_some_and(|deadline| now < deadline),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    AUTH_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    pub fn parse(raw: &str) -> Result<Self, ApiError> {
        let file: ClientSecretsFile = serde_json::from_str(raw)
            .map_err(|err| ApiError::decode(format!("invalid client secrets file: {err}")))?;
        file.installed.or(file.web).ok_or_else(|| {
            ApiError::decode("client secrets file has neither an 'installed' nor a 'web' section")
        })
    }

    pub fn redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_REDIRECT_URI)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CredentialManager {
    http: reqwest::Client,
    credentials_path: PathBuf,
    token_path: PathBuf,
}

impl CredentialManager {
    pub fn new(http: reqwest::Client, credentials_path: PathBuf, token_path: PathBuf) -> Self {
        Self {
            http,
            credentials_path,
            token_path,
        }
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    pub async fn client_secret(&self) -> Result<ClientSecret, ApiError> {
        match tokio::fs::read_to_string(&self.credentials_path).await {
            Ok(raw) => ClientSecret::parse(&raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ApiError::not_found(
                format!(
                    "client secrets file not found at {}",
                    self.credentials_path.display()
                ),
            )),
            Err(err) => Err(err.into()),
        }
    }

    /// Reads the token cache. A missing file is `Ok(None)`.
    pub async fn load(&self) -> Result<Option<Credential>, ApiError> {
        let raw = match tokio::fs::read_to_string(&self.token_path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let credential = serde_json::from_str(&raw)
            .map_err(|err| ApiError::decode(format!("token cache is not valid JSON: {err}")))?;
        Ok(Some(credential))
    }

    pub async fn persist(&self, credential: &Credential) -> Result<(), ApiError> {
        if let Some(parent) = self.token_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let encoded = serde_json::to_vec_pretty(credential)
            .map_err(|err| ApiError::decode(format!("cannot encode credential: {err}")))?;
        tokio::fs::write(&self.token_path, encoded).await?;
        Ok(())
    }

    /// Returns a usable bearer token, refreshing the cached one if needed.
    pub async fn access_token(&self) -> Result<String, ApiError> {
        let credential = self
            .load()
            .await?
            .ok_or_else(|| ApiError::auth(NOT_AUTHENTICATED))?;

        if credential.is_valid_at(Utc::now()) {
            return Ok(credential.access_token);
        }

        let refreshed = self.refresh(credential).await?;
        Ok(refreshed.access_token)
    }

    pub async fn refresh(&self, credential: Credential) -> Result<Credential, ApiError> {
        let Some(refresh_token) = credential.refresh_token.clone() else {
            warn!("cached YouTube token expired and has no refresh token");
            return Err(ApiError::auth(NOT_AUTHENTICATED));
        };

        let response = self
            .http
            .post(&credential.token_uri)
            .form(&[
                ("client_id", credential.client_id.as_str()),
                ("client_secret", credential.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;
        let token = decode_token(read_json(response).await?)?;

        let refreshed = Credential {
            access_token: token.access_token,
            refresh_token: token.refresh_token.or(Some(refresh_token)),
            expiry: expiry_after(Utc::now(), token.expires_in),
            ..credential
        };
        self.persist(&refreshed).await?;
        info!("YouTube OAuth token refreshed");
        Ok(refreshed)
    }

    pub fn authorization_url(&self, secret: &ClientSecret) -> Result<String, ApiError> {
        let mut url = Url::parse(&secret.auth_uri)
            .map_err(|err| ApiError::decode(format!("invalid auth_uri: {err}")))?;
        url.query_pairs_mut()
            .append_pair("client_id", &secret.client_id)
            .append_pair("redirect_uri", secret.redirect_uri())
            .append_pair("response_type", "code")
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        Ok(url.into())
    }

    /// Trades an authorization code for tokens and writes the cache.
    pub async fn exchange_code(&self, code: &str) -> Result<Credential, ApiError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ApiError::validation("authorization code must not be empty"));
        }
        let secret = self.client_secret().await?;

        let response = self
            .http
            .post(&secret.token_uri)
            .form(&[
                ("code", code),
                ("client_id", secret.client_id.as_str()),
                ("client_secret", secret.client_secret.as_str()),
                ("redirect_uri", secret.redirect_uri()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;
        let token = decode_token(read_json(response).await?)?;

        let scopes = token
            .scope
            .map(|scope| scope.split_whitespace().map(str::to_string).collect())
            .unwrap_or_else(|| SCOPES.iter().map(|scope| scope.to_string()).collect());
        let credential = Credential {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expiry: expiry_after(Utc::now(), token.expires_in),
            token_uri: secret.token_uri,
            client_id: secret.client_id,
            client_secret: secret.client_secret,
            scopes,
        };
        self.persist(&credential).await?;
        info!(path = %self.token_path.display(), "YouTube OAuth token stored");
        Ok(credential)
    }

    /// `true` when a cached credential is usable now or can be refreshed.
    pub async fn is_authenticated(&self) -> bool {
        match self.load().await {
            Ok(Some(credential)) => {
                credential.is_valid_at(Utc::now()) || credential.refresh_token.is_some()
            }
            Ok(None) => false,
            Err(err) => {
                warn!(error = %err, "unreadable YouTube token cache");
                false
            }
        }
    }

    /// Deletes the token cache. Returns whether a file was removed.
    pub async fn revoke(&self) -> Result<bool, ApiError> {
        match tokio::fs::remove_file(&self.token_path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// `None` when the lifetime is absent or does not fit in a timestamp.
fn expiry_after(now: DateTime<Utc>, expires_in: Option<i64>) -> Option<DateTime<Utc>> {
    expires_in
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
}

fn decode_token(body: serde_json::Value) -> Result<TokenResponse, ApiError> {
    serde_json::from_value(body)
        .map_err(|err| ApiError::decode(format!("unexpected token response: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(expiry: Option<DateTime<Utc>>, refresh_token: Option<&str>) -> Credential {
        Credential {
            access_token: "ya29.cached".to_string(),
            refresh_token: refresh_token.map(str::to_string),
            expiry,
            token_uri: TOKEN_URI.to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            scopes: vec![SCOPES[0].to_string()],
        }
    }

    fn manager(dir: &tempfile::TempDir) -> CredentialManager {
        CredentialManager::new(
            reqwest::Client::new(),
            dir.path().join("credentials.json"),
            dir.path().join("nested").join("token.json"),
        )
    }

    #[test]
    fn validity_honours_expiry_buffer() {
        let now = Utc::now();
        assert!(credential(Some(now + Duration::seconds(120)), None).is_valid_at(now));
        assert!(!credential(Some(now + Duration::seconds(30)), None).is_valid_at(now));
        assert!(credential(None, None).is_valid_at(now));
    }

    #[test]
    fn token_lifetime_out_of_range_means_no_expiry() {
        let now = Utc::now();
        assert_eq!(expiry_after(now, Some(3600)), Some(now + Duration::seconds(3600)));
        assert_eq!(expiry_after(now, None), None);
        assert_eq!(expiry_after(now, Some(i64::MAX)), None);
        assert_eq!(expiry_after(now, Some(i64::MIN)), None);
    }

    #[test]
    fn client_secret_accepts_installed_or_web() {
        let installed = ClientSecret::parse(
            r#"{"installed":{"client_id":"a","client_secret":"b","redirect_uris":["http://localhost:8080"]}}"#,
        )
        .expect("installed");
        assert_eq!(installed.redirect_uri(), "http://localhost:8080");
        assert_eq!(installed.token_uri, TOKEN_URI);

        let web = ClientSecret::parse(r#"{"web":{"client_id":"c","client_secret":"d"}}"#)
            .expect("web");
        assert_eq!(web.client_id, "c");
        assert_eq!(web.redirect_uri(), DEFAULT_REDIRECT_URI);

        assert!(ClientSecret::parse(r#"{"other":{}}"#).is_err());
    }

    #[tokio::test]
    async fn cached_token_round_trips_through_the_cache_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = manager(&dir);
        assert_eq!(manager.load().await.expect("load"), None);
        assert!(!manager.is_authenticated().await);

        let stored = credential(Some(Utc::now() + Duration::hours(1)), Some("1//refresh"));
        manager.persist(&stored).await.expect("persist");

        assert_eq!(manager.load().await.expect("load"), Some(stored));
        assert_eq!(
            manager.access_token().await.expect("valid token"),
            "ya29.cached"
        );
        assert!(manager.is_authenticated().await);
    }

    #[tokio::test]
    async fn expired_token_without_refresh_token_requires_setup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = manager(&dir);
        manager
            .persist(&credential(Some(Utc::now() - Duration::hours(1)), None))
            .await
            .expect("persist");

        let err = manager.access_token().await.expect_err("expired");
        assert!(matches!(err, ApiError::Auth { .. }));
        assert!(err.to_string().contains("setup_youtube_oauth"));
    }

    #[tokio::test]
    async fn revoke_removes_the_cache_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = manager(&dir);
        manager
            .persist(&credential(None, None))
            .await
            .expect("persist");

        assert!(manager.revoke().await.expect("first revoke"));
        assert!(!manager.revoke().await.expect("second revoke"));
        assert!(!manager.token_path().exists());
    }

    #[test]
    fn authorization_url_requests_offline_access() {
        let dir = tempfile::tempdir().expect("tempdir");
        let secret = ClientSecret::parse(r#"{"installed":{"client_id":"abc","client_secret":"s"}}"#)
            .expect("secret");
        let url = manager(&dir).authorization_url(&secret).expect("url");

        assert!(url.starts_with(AUTH_URI));
        assert!(url.contains("client_id=abc"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("yt-analytics.readonly"));
    }

    #[tokio::test]
    async fn exchange_requires_a_code_and_client_secrets() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = manager(&dir);

        let err = manager.exchange_code("  ").await.expect_err("empty code");
        assert!(err.is_local());

        let err = manager.exchange_code("4/abc").await.expect_err("no secrets");
        assert!(matches!(err, ApiError::NotFound { .. }));
    }
}
