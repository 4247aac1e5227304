//! Service-account authentication for Google Drive.
//!
//! A [`Credential`] is loaded from the JSON key file Google issues for a
//! service account. Access tokens are minted with the OAuth2 JWT-bearer
//! grant: the client signs an RS256 assertion with the account's private
//! key and exchanges it at the key's token endpoint.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use drivekeep_common::{Error, Result, SensitiveString};

/// OAuth2 token endpoint used when the key file does not name one.
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// Grant type for signed service-account assertions.
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Key files Google issues for service accounts carry this `type`.
const SERVICE_ACCOUNT_TYPE: &str = "service_account";
/// Lifetime of a signed assertion (the maximum Google accepts).
const ASSERTION_LIFETIME_SECS: i64 = 3600;

const USER_AGENT: &str = concat!("drivekeep/", env!("CARGO_PKG_VERSION"));

/// Service-account key file contents.
#[derive(Debug, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub client_email: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: SensitiveString,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Parse a key file.
    ///
    /// # Errors
    /// - `CredentialInvalid` if the JSON is malformed or is not a
    ///   service-account key
    pub fn from_json(json: &str) -> Result<Self> {
        let key: Self = serde_json::from_str(json)
            .map_err(|e| Error::CredentialInvalid(format!("Malformed key file: {}", e)))?;

        if key.key_type != SERVICE_ACCOUNT_TYPE {
            return Err(Error::CredentialInvalid(format!(
                "Expected a '{}' key, found '{}'",
                SERVICE_ACCOUNT_TYPE, key.key_type
            )));
        }
        if key.client_email.trim().is_empty() {
            return Err(Error::CredentialInvalid(
                "Key file has no client_email".to_string(),
            ));
        }
        if key.private_key.is_empty() {
            return Err(Error::CredentialInvalid(
                "Key file has no private_key".to_string(),
            ));
        }

        Ok(key)
    }
}

/// Bearer token with expiration tracking.
#[derive(Debug, Clone)]
pub struct Tokens {
    /// Access token for API requests.
    pub access_token: SensitiveString,
    /// When the access token expires.
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Check if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        // Consider expired if less than 5 minutes remaining
        self.expires_at < Utc::now() + Duration::minutes(5)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Authenticated handle for one process run.
///
/// Tokens are minted lazily on first use and re-minted when they near
/// expiry. Key material and tokens never appear in `Debug` output or logs.
pub struct Credential {
    client_email: String,
    key_id: Option<String>,
    signing_key: EncodingKey,
    token_uri: String,
    scopes: Vec<String>,
    http: Client,
    tokens: tokio::sync::RwLock<Option<Tokens>>,
}

impl Credential {
    /// Load a key file and scope it.
    ///
    /// Reads the file and nothing else; no network call is made.
    ///
    /// # Errors
    /// - `CredentialNotFound` if the file does not exist
    /// - `CredentialInvalid` if the key is malformed or not RSA
    pub fn from_file(path: &Path, scopes: &[String]) -> Result<Self> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::CredentialNotFound(path.display().to_string()));
            }
            Err(e) => {
                return Err(Error::CredentialInvalid(format!(
                    "Cannot read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        Self::from_key(ServiceAccountKey::from_json(&json)?, scopes)
    }

    /// Build a handle from a parsed key.
    pub fn from_key(key: ServiceAccountKey, scopes: &[String]) -> Result<Self> {
        if scopes.is_empty() {
            return Err(Error::InvalidInput(
                "At least one scope is required".to_string(),
            ));
        }

        let signing_key = EncodingKey::from_rsa_pem(key.private_key.expose().as_bytes())
            .map_err(|e| {
                Error::CredentialInvalid(format!("Private key is not a valid RSA PEM: {}", e))
            })?;

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Service(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client_email: key.client_email,
            key_id: key.private_key_id,
            signing_key,
            token_uri: key.token_uri,
            scopes: scopes.to_vec(),
            http,
            tokens: tokio::sync::RwLock::new(None),
        })
    }

    /// Service-account email the credential acts as.
    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// HTTP client used for token requests; API clients reuse it.
    pub fn http_client(&self) -> &Client {
        &self.http
    }

    /// Sign a JWT-bearer assertion issued at `now`.
    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: self.scopes.join(" "),
            aud: self.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        encode(&header, &claims, &self.signing_key)
            .map_err(|e| Error::CredentialInvalid(format!("Failed to sign assertion: {}", e)))
    }

    /// Get a valid access token, minting a new one if necessary.
    ///
    /// # Errors
    /// - `CredentialInvalid` if the token endpoint rejects the key
    /// - `Service` on transport failure
    pub async fn access_token(&self) -> Result<SensitiveString> {
        let tokens = self.tokens.read().await;
        if let Some(current) = tokens.as_ref().filter(|t| !t.is_expired()) {
            return Ok(current.access_token.clone());
        }
        drop(tokens);

        let mut tokens = self.tokens.write().await;

        // Double-check after acquiring write lock
        if let Some(current) = tokens.as_ref().filter(|t| !t.is_expired()) {
            return Ok(current.access_token.clone());
        }

        tracing::info!(account = %self.client_email, "Requesting access token");

        let fresh = self.request_token().await?;
        let access_token = fresh.access_token.clone();
        *tokens = Some(fresh);

        Ok(access_token)
    }

    /// Replace the cached tokens.
    pub async fn update_tokens(&self, tokens: Tokens) {
        *self.tokens.write().await = Some(tokens);
    }

    async fn request_token(&self) -> Result<Tokens> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;

        let response = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| Error::Service(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::CredentialInvalid(format!(
                "Token request rejected: {} - {}",
                status,
                body.trim()
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Service(format!(
                "Token request failed: {} - {}",
                status,
                body.trim()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Service(format!("Failed to parse token response: {}", e)))?;

        let expires_in = token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);

        Ok(Tokens {
            access_token: SensitiveString::new(token.access_token),
            expires_at: now + Duration::seconds(expires_in),
        })
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("client_email", &self.client_email)
            .field("scopes", &self.scopes)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}
