//! Apple Search Ads credentials and client-secret JWT signing.

use std::fmt;
use std::sync::Arc;

use base64::Engine as _;
use chrono::Duration;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use kwt_core::Clock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const CLIENT_ID_VAR: &str = "APPLE_SEARCH_ADS_CLIENT_ID";
pub const TEAM_ID_VAR: &str = "APPLE_SEARCH_ADS_TEAM_ID";
pub const KEY_ID_VAR: &str = "APPLE_SEARCH_ADS_KEY_ID";
pub const PRIVATE_KEY_VAR: &str = "APPLE_SEARCH_ADS_PRIVATE_KEY";

pub const TOKEN_AUDIENCE: &str = "https://appleid.apple.com";
pub const TOKEN_TTL_SECS: i64 = 86_400;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingVariables(Vec<&'static str>),
    #[error("invalid private key format: expected a PEM block (optionally base64-encoded)")]
    InvalidPrivateKey,
    #[error("signing client secret: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Signed bearer token. `Debug` never shows the value.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BearerToken(<{} bytes>)", self.0.len())
    }
}

/// Boundary between the pipeline and whatever produces API credentials.
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> Result<BearerToken, AuthError>;
}

#[derive(Clone)]
pub struct AppleSearchAdsCredentials {
    pub client_id: String,
    pub team_id: String,
    pub key_id: String,
    pub private_key_pem: String,
}

impl fmt::Debug for AppleSearchAdsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppleSearchAdsCredentials")
            .field("client_id", &self.client_id)
            .field("team_id", &self.team_id)
            .field("key_id", &self.key_id)
            .field("private_key_pem", &"<redacted>")
            .finish()
    }
}

impl AppleSearchAdsCredentials {
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Empty values count as missing. Every missing name is reported at once.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AuthError> {
        let mut missing = Vec::new();
        let mut read = |name: &'static str| match lookup(name).filter(|v| !v.trim().is_empty()) {
            Some(value) => value,
            None => {
                missing.push(name);
                String::new()
            }
        };
        let client_id = read(CLIENT_ID_VAR);
        let team_id = read(TEAM_ID_VAR);
        let key_id = read(KEY_ID_VAR);
        let private_key = read(PRIVATE_KEY_VAR);
        if !missing.is_empty() {
            return Err(AuthError::MissingVariables(missing));
        }

        Ok(Self {
            client_id,
            team_id,
            key_id,
            private_key_pem: decode_private_key(&private_key)?,
        })
    }
}

/// Accepts either a PEM block or the base64 encoding of one.
pub fn decode_private_key(value: &str) -> Result<String, AuthError> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    let pem = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| value.to_string());

    let pem = pem.trim().to_string();
    if !pem.starts_with("-----BEGIN") {
        return Err(AuthError::InvalidPrivateKey);
    }
    Ok(pem)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSecretClaims {
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// ES256 client-secret signer for the Search Ads OAuth flow.
pub struct JwtTokenProvider {
    credentials: AppleSearchAdsCredentials,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl JwtTokenProvider {
    pub fn new(credentials: AppleSearchAdsCredentials, clock: Arc<dyn Clock>) -> Self {
        Self {
            credentials,
            clock,
            ttl: Duration::seconds(TOKEN_TTL_SECS),
        }
    }

    pub fn claims(&self) -> ClientSecretClaims {
        let iat = self.clock.now().timestamp();
        ClientSecretClaims {
            sub: self.credentials.client_id.clone(),
            aud: TOKEN_AUDIENCE.to_string(),
            iat,
            exp: iat + self.ttl.num_seconds(),
            iss: self.credentials.team_id.clone(),
        }
    }
}

impl TokenProvider for JwtTokenProvider {
    fn bearer_token(&self) -> Result<BearerToken, AuthError> {
        let key = EncodingKey::from_ec_pem(self.credentials.private_key_pem.as_bytes())?;
        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.credentials.key_id.clone());
        let claims = self.claims();
        let token = encode(&header, &claims, &key)?;
        debug!(key_id = %self.credentials.key_id, exp = claims.exp, "signed client secret");
        Ok(BearerToken::new(token))
    }
}
