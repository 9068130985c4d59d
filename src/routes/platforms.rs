use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    middleware::StaffUser,
    models::{NewPlatform, Platform, PlatformDetail},
    routes::AppState,
    services::catalog,
};

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<Platform>>> {
    let platforms = catalog::list_platforms(state.store.as_ref()).await?;
    Ok(Json(platforms))
}

pub async fn create(
    State(state): State<AppState>,
    StaffUser(_admin): StaffUser,
    body: Result<Json<NewPlatform>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Platform>)> {
    let Json(platform) = body?;
    let created = catalog::create_platform(state.store.as_ref(), platform).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Platform with the titles it streams
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<PlatformDetail>> {
    let platform = catalog::get_platform(state.store.as_ref(), id).await?;
    Ok(Json(platform))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    StaffUser(_admin): StaffUser,
    body: Result<Json<NewPlatform>, JsonRejection>,
) -> AppResult<Json<Platform>> {
    let Json(platform) = body?;
    let updated = catalog::update_platform(state.store.as_ref(), id, platform).await?;
    Ok(Json(updated))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    StaffUser(_admin): StaffUser,
) -> AppResult<StatusCode> {
    catalog::delete_platform(state.store.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
