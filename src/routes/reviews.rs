use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    middleware::{AuthUser, RequestId},
    models::{Review, ReviewChanges},
    routes::AppState,
    services::reviews::{self, ReviewSubmission},
};

#[derive(Debug, Deserialize)]
pub struct ReviewQuery {
    username: Option<String>,
}

/// Handler for review submission on a title
///
/// Authentication is resolved before the body, so an anonymous caller gets
/// 401 even when the body is malformed.
pub async fn submit(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(title_id): Path<i64>,
    reviewer: Result<AuthUser, AppError>,
    body: Result<Json<ReviewSubmission>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Review>)> {
    tracing::info!(
        request_id = %request_id,
        title_id,
        "Processing review submission"
    );

    let AuthUser(reviewer) = reviewer?;
    let Json(submission) = body?;
    let review =
        reviews::submit_review(state.store.as_ref(), title_id, Some(&reviewer), submission)
            .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn list_for_title(
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
) -> AppResult<Json<Vec<Review>>> {
    let reviews = reviews::list_title_reviews(state.store.as_ref(), title_id).await?;
    Ok(Json(reviews))
}

/// All reviews, optionally narrowed with `?username=`
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ReviewQuery>,
) -> AppResult<Json<Vec<Review>>> {
    let reviews = reviews::list_reviews(state.store.as_ref(), query.username).await?;
    Ok(Json(reviews))
}

pub async fn detail(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Review>> {
    let review = reviews::get_review(state.store.as_ref(), id).await?;
    Ok(Json(review))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AuthUser(actor): AuthUser,
    body: Result<Json<ReviewChanges>, JsonRejection>,
) -> AppResult<Json<Review>> {
    let Json(changes) = body?;
    let review = reviews::update_review(state.store.as_ref(), id, &actor, changes).await?;
    Ok(Json(review))
}

/// Deactivates the review; the row is kept
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AuthUser(actor): AuthUser,
) -> AppResult<StatusCode> {
    reviews::deactivate_review(state.store.as_ref(), id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}
