use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{
        HeaderMap, StatusCode,
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::session::verify_access;
use crate::error::Error;
use crate::server::AppState;
use crate::types::User;

/// Extractor that requires a valid access token (Bearer header or
/// `accessToken` cookie) resolving to an existing user.
pub struct CurrentUser(pub User);

/// Extractor for routes that adapt to the viewer but accept anonymous
/// access. A present-but-invalid token is still rejected.
pub struct MaybeUser(pub Option<User>);

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidToken,
    TokenExpired,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InvalidScheme => (StatusCode::UNAUTHORIZED, "Invalid authorization scheme"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid access token"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Access token expired"),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({
            "statusCode": status.as_u16(),
            "success": false,
            "message": message,
            "errors": [],
        });

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                "WWW-Authenticate",
                "Bearer realm=\"showreel\"".parse().unwrap(),
            );
        }

        response
    }
}

impl From<Error> for AuthError {
    fn from(err: Error) -> Self {
        match err {
            Error::TokenExpired => AuthError::TokenExpired,
            Error::Unauthorized | Error::NotFound => AuthError::InvalidToken,
            _ => AuthError::InternalError,
        }
    }
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_access_token(&parts.headers)?.ok_or(AuthError::MissingAuth)?;

        let user = verify_access(state.store.as_ref(), &state.auth, &token)?;
        Ok(CurrentUser(user))
    }
}

impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = extract_access_token(&parts.headers)? else {
            return Ok(MaybeUser(None));
        };

        let user = verify_access(state.store.as_ref(), &state.auth, &token)?;
        Ok(MaybeUser(Some(user)))
    }
}

/// Pulls the access token from `Authorization: Bearer <token>` or, failing
/// that, the `accessToken` cookie.
fn extract_access_token(headers: &HeaderMap) -> Result<Option<String>, AuthError> {
    if let Some(header) = headers.get(AUTHORIZATION) {
        let header = header.to_str().map_err(|_| AuthError::InvalidToken)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidScheme)?;

        if token.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }
        return Ok(Some(token.to_string()));
    }

    Ok(cookie_value(headers, "accessToken"))
}

/// Reads a single cookie from the Cookie header, if present.
#[must_use]
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get(COOKIE)?.to_str().ok()?;

    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_value_parses_multiple_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            "accessToken=abc123; refreshToken=def456".parse().unwrap(),
        );

        assert_eq!(
            cookie_value(&headers, "accessToken"),
            Some("abc123".to_string())
        );
        assert_eq!(
            cookie_value(&headers, "refreshToken"),
            Some("def456".to_string())
        );
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer header-token".parse().unwrap());
        headers.insert(COOKIE, "accessToken=cookie-token".parse().unwrap());

        let token = extract_access_token(&headers).unwrap();
        assert_eq!(token, Some("header-token".to_string()));
    }

    #[test]
    fn test_non_bearer_scheme_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().unwrap());

        assert!(matches!(
            extract_access_token(&headers),
            Err(AuthError::InvalidScheme)
        ));
    }
}
