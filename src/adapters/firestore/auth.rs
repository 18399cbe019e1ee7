//! Service-account authentication for the Firestore REST API.

use crate::error::StoreError;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
// Refresh this long before the token actually expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

fn default_token_uri() -> String {
    String::from("https://oauth2.googleapis.com/token")
}

/// The fields of a service-account key file this crate needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccount {
    pub async fn from_file(path: &Path) -> Result<Self, StoreError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| StoreError::Auth(format!("{}: {}", path.display(), e)))?;
        serde_json::from_slice(&data)
            .map_err(|e| StoreError::Auth(format!("{}: {}", path.display(), e)))
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Hands out OAuth access tokens, exchanging a fresh signed assertion when
/// the cached token is close to expiry.
pub struct TokenProvider {
    http: reqwest::Client,
    account: ServiceAccount,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(http: reqwest::Client, account: ServiceAccount) -> Self {
        Self {
            http,
            account,
            cached: Mutex::new(None),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.account.project_id
    }

    pub async fn access_token(&self) -> Result<String, StoreError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + REFRESH_MARGIN {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.exchange().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    fn assertion(&self, now: i64) -> Result<String, StoreError> {
        let claims = claims(&self.account, now);
        let key = EncodingKey::from_rsa_pem(self.account.private_key.as_bytes())
            .map_err(|e| StoreError::Auth(format!("invalid private key: {}", e)))?;
        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| StoreError::Auth(format!("failed to sign assertion: {}", e)))
    }

    async fn exchange(&self) -> Result<CachedToken, StoreError> {
        let assertion = self.assertion(chrono::Utc::now().timestamp())?;
        let response = self
            .http
            .post(&self.account.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| StoreError::Auth(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Auth(format!("token exchange {}: {}", status, body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Auth(e.to_string()))?;
        debug!("Obtained access token valid for {}s", token.expires_in);

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }
}

fn claims(account: &ServiceAccount, now: i64) -> Claims<'_> {
    Claims {
        iss: &account.client_email,
        scope: DATASTORE_SCOPE,
        aud: &account.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    }
}
