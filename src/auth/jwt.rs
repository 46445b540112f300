use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::User;

const DEFAULT_ACCESS_TTL_SECS: i64 = 60 * 60; // 1 hour
const DEFAULT_REFRESH_TTL_SECS: i64 = 30 * 24 * 60 * 60; // 30 days

/// The two credential classes. Access tokens authenticate individual
/// requests; refresh tokens mint new pairs and are additionally pinned to
/// the user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
        }
    }

    /// Reads signing secrets (required) and TTL overrides (optional) from
    /// the environment.
    pub fn from_env() -> Result<Self> {
        let access_secret = std::env::var("SHOWREEL_ACCESS_TOKEN_SECRET")
            .map_err(|_| Error::Config("SHOWREEL_ACCESS_TOKEN_SECRET is not set".to_string()))?;
        let refresh_secret = std::env::var("SHOWREEL_REFRESH_TOKEN_SECRET")
            .map_err(|_| Error::Config("SHOWREEL_REFRESH_TOKEN_SECRET is not set".to_string()))?;

        let mut config = Self::new(access_secret, refresh_secret);

        if let Some(ttl) = ttl_from_env("SHOWREEL_ACCESS_TOKEN_TTL_SECS")? {
            config.access_ttl_secs = ttl;
        }
        if let Some(ttl) = ttl_from_env("SHOWREEL_REFRESH_TOKEN_TTL_SECS")? {
            config.refresh_ttl_secs = ttl;
        }

        Ok(config)
    }

    fn secret(&self, kind: TokenKind) -> &str {
        match kind {
            TokenKind::Access => &self.access_secret,
            TokenKind::Refresh => &self.refresh_secret,
        }
    }

    fn ttl_secs(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        }
    }
}

fn ttl_from_env(name: &str) -> Result<Option<i64>> {
    match std::env::var(name) {
        Ok(raw) => {
            let secs: i64 = raw
                .parse()
                .map_err(|_| Error::Config(format!("{name} must be an integer")))?;
            if secs <= 0 {
                return Err(Error::Config(format!("{name} must be positive")));
            }
            Ok(Some(secs))
        }
        Err(_) => Ok(None),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub username: String,
    pub token_type: String,
    /// Unique per issuance, so two tokens minted in the same second never
    /// collide (rotation relies on byte-inequality of successive tokens)
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs a time-bound HS256 token for the given user.
pub fn sign_token(config: &AuthConfig, kind: TokenKind, user: &User) -> Result<String> {
    let secret = config.secret(kind);
    if secret.is_empty() {
        return Err(Error::Config("token signing secret is empty".to_string()));
    }

    let now = Utc::now();
    let claims = Claims {
        sub: user.id.clone(),
        username: user.username.clone(),
        token_type: kind.as_str().to_string(),
        jti: uuid::Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(config.ttl_secs(kind))).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error::Config(format!("failed to sign token: {e}")))
}

/// Decodes and verifies a token of the expected kind. An access token
/// presented where a refresh token is expected (or vice versa) is invalid
/// even when the signature checks out.
pub fn decode_token(config: &AuthConfig, kind: TokenKind, token: &str) -> Result<Claims> {
    let secret = config.secret(kind);
    if secret.is_empty() {
        return Err(Error::Config("token signing secret is empty".to_string()));
    }

    let mut validation = Validation::default();
    validation.leeway = 0;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => Error::TokenExpired,
        _ => Error::Unauthorized,
    })?;

    if data.claims.token_type != kind.as_str() {
        return Err(Error::Unauthorized);
    }

    Ok(data.claims)
}
