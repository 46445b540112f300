//! Session lifecycle: pair issuance, rotation, and teardown.
//!
//! One refresh token is live per user at any moment. Issuing a pair
//! overwrites the stored value, which invalidates every previously issued
//! refresh token; rotation additionally demands that the presented token
//! is byte-equal to the stored one, so a stale token replayed after
//! rotation is rejected even though its signature still verifies.

use serde::Serialize;

use super::jwt::{AuthConfig, TokenKind, decode_token, sign_token};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::User;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues a fresh access/refresh pair and pins the refresh token to the
/// user row. LoggedOut/Rotated -> LoggedIn.
pub fn issue_pair(store: &dyn Store, config: &AuthConfig, user: &User) -> Result<TokenPair> {
    let access_token = sign_token(config, TokenKind::Access, user)?;
    let refresh_token = sign_token(config, TokenKind::Refresh, user)?;

    store.set_refresh_token(&user.id, Some(&refresh_token))?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Resolves an access token to its user. Fails `Unauthorized` on a bad
/// signature, expiry, wrong token class, or a user that no longer exists.
pub fn verify_access(store: &dyn Store, config: &AuthConfig, token: &str) -> Result<User> {
    let claims = decode_token(config, TokenKind::Access, token)?;

    store
        .get_user(&claims.sub)?
        .ok_or(Error::Unauthorized)
}

/// Exchanges a refresh token for a new pair, invalidating the presented
/// token. The byte-equality check against the stored value is what defeats
/// replay of an already-rotated token.
pub fn rotate_refresh(
    store: &dyn Store,
    config: &AuthConfig,
    presented: &str,
) -> Result<(User, TokenPair)> {
    let claims = decode_token(config, TokenKind::Refresh, presented)?;

    let user = store
        .get_user(&claims.sub)?
        .ok_or(Error::Unauthorized)?;

    match &user.refresh_token {
        Some(current) if current == presented => {}
        _ => return Err(Error::Unauthorized),
    }

    let pair = issue_pair(store, config, &user)?;
    Ok((user, pair))
}

/// Clears the stored refresh token. LoggedIn -> LoggedOut.
pub fn logout(store: &dyn Store, user_id: &str) -> Result<()> {
    store.set_refresh_token(user_id, None)
}
