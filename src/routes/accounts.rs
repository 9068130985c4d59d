use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    middleware::AuthUser,
    routes::AppState,
    services::accounts::{self, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse},
};

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let Json(request) = body?;
    let registered = accounts::register(state.store.as_ref(), request).await?;
    Ok((StatusCode::CREATED, Json(registered)))
}

/// Exchanges username/password for an API token
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let Json(request) = body?;
    let token = accounts::login(state.store.as_ref(), request).await?;
    Ok(Json(token))
}

pub async fn logout(State(state): State<AppState>, AuthUser(user): AuthUser) -> AppResult<StatusCode> {
    accounts::logout(state.store.as_ref(), &user).await?;
    Ok(StatusCode::OK)
}
