use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use crate::{
    error::AppError,
    models::User,
    routes::AppState,
    services::accounts,
};

/// Pulls the key out of `Authorization: Token <key>` (or `Bearer <key>`)
pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, key) = value.trim().split_once(' ')?;
    let key = key.trim();
    let known_scheme =
        scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer");
    (known_scheme && !key.is_empty()).then_some(key)
}

/// The authenticated caller; rejects with 401 when the token is missing or unknown
pub struct AuthUser(pub User);

#[async_trait::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let key = token_from_headers(&parts.headers).ok_or_else(|| {
            AppError::Unauthorized("Authentication credentials were not provided.".to_string())
        })?;
        let user = accounts::authenticate(state.store.as_ref(), key).await?;
        Ok(AuthUser(user))
    }
}

/// An authenticated staff caller; rejects non-staff users with 403
pub struct StaffUser(pub User);

#[async_trait::async_trait]
impl FromRequestParts<AppState> for StaffUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_staff {
            tracing::warn!(username = %user.username, "Non-staff write attempt");
            return Err(AppError::Forbidden(
                "You do not have permission to perform this action.".to_string(),
            ));
        }
        Ok(StaffUser(user))
    }
}
