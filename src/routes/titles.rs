use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    middleware::StaffUser,
    models::{NewTitle, Title},
    routes::AppState,
    services::catalog,
};

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<Title>>> {
    let titles = catalog::list_titles(state.store.as_ref()).await?;
    Ok(Json(titles))
}

pub async fn create(
    State(state): State<AppState>,
    StaffUser(_admin): StaffUser,
    body: Result<Json<NewTitle>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Title>)> {
    let Json(title) = body?;
    let created = catalog::create_title(state.store.as_ref(), title).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn detail(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Title>> {
    let title = catalog::get_title(state.store.as_ref(), id).await?;
    Ok(Json(title))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    StaffUser(_admin): StaffUser,
    body: Result<Json<NewTitle>, JsonRejection>,
) -> AppResult<Json<Title>> {
    let Json(title) = body?;
    let updated = catalog::update_title(state.store.as_ref(), id, title).await?;
    Ok(Json(updated))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    StaffUser(_admin): StaffUser,
) -> AppResult<StatusCode> {
    catalog::delete_title(state.store.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
