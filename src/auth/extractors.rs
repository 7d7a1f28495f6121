use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tracing::warn;

use super::jwt::TokenService;
use crate::{error::AppError, state::AppState};

/// Verified identity of the caller. Only obtainable through a valid bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub i64);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(&parts.headers, &state.tokens).map(AuthUser)
    }
}

/// Expects exactly `Authorization: Bearer <token>`.
pub(crate) fn authenticate(headers: &HeaderMap, tokens: &TokenService) -> Result<i64, AppError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        warn!("missing Authorization header");
        return Err(AppError::Unauthenticated);
    };

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.split_once(' '))
        .filter(|(scheme, token)| *scheme == "Bearer" && !token.is_empty() && !token.contains(' '))
        .map(|(_, token)| token)
        .ok_or_else(|| {
            warn!("malformed Authorization header");
            AppError::Unauthenticated
        })?;

    tokens.verify(token).map_err(|e| {
        warn!(reason = %e, "token rejected");
        AppError::Unauthenticated
    })
}
