use serde::Deserialize;
use serde_json::Value;

use crate::{
    db::CatalogStore,
    error::{AppError, AppResult, FieldErrors},
    models::{
        review::MAX_COMMENT_CHARS, NewReview, Rating, Review, ReviewChanges, ReviewFilter, User,
    },
};

/// Body of a review submission
///
/// `rating` is kept as raw JSON so a missing or mistyped value is reported
/// against the field instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ReviewSubmission {
    #[serde(default)]
    pub rating: Option<Value>,
    #[serde(default)]
    pub comment: Option<String>,
}

fn validate_rating(rating: Option<&Value>, errors: &mut FieldErrors) -> Option<Rating> {
    let value = match rating {
        None | Some(Value::Null) => {
            errors.add("rating", "This field is required.");
            return None;
        }
        Some(value) => value,
    };
    let Some(number) = value.as_i64() else {
        errors.add("rating", "A valid integer is required.");
        return None;
    };
    match Rating::try_from(number) {
        Ok(rating) => Some(rating),
        Err(AppError::Validation(fields)) => {
            errors.merge(fields);
            None
        }
        Err(_) => {
            errors.add("rating", "Invalid rating.");
            None
        }
    }
}

fn validate_comment(comment: Option<&str>, errors: &mut FieldErrors) {
    if let Some(comment) = comment {
        if comment.chars().count() > MAX_COMMENT_CHARS {
            errors.add(
                "comment",
                format!(
                    "Ensure this field has no more than {} characters.",
                    MAX_COMMENT_CHARS
                ),
            );
        }
    }
}

/// Submits a review and folds its rating into the title aggregate
///
/// Rejections (no reviewer, bad rating or comment, unknown title, repeat
/// reviewer) leave the store untouched. The duplicate check, aggregate
/// update and insert run as one atomic store operation.
pub async fn submit_review(
    store: &dyn CatalogStore,
    title_id: i64,
    reviewer: Option<&User>,
    submission: ReviewSubmission,
) -> AppResult<Review> {
    let reviewer = reviewer.ok_or_else(|| {
        AppError::Unauthorized("Authentication credentials were not provided.".to_string())
    })?;

    let mut errors = FieldErrors::new();
    validate_comment(submission.comment.as_deref(), &mut errors);
    let rating = validate_rating(submission.rating.as_ref(), &mut errors);
    let Some(rating) = rating else {
        return Err(AppError::Validation(errors));
    };
    errors.into_result()?;

    let result = store
        .record_review(NewReview {
            title_id,
            reviewer_id: reviewer.id,
            reviewer: reviewer.username.clone(),
            rating,
            comment: submission.comment,
        })
        .await;

    match &result {
        Ok(review) => tracing::info!(
            review_id = review.id,
            title_id,
            reviewer = %reviewer.username,
            rating = %rating,
            "Review submitted"
        ),
        Err(AppError::DuplicateReview { .. }) => tracing::warn!(
            title_id,
            reviewer = %reviewer.username,
            "Rejected repeat review"
        ),
        Err(_) => {}
    }

    result
}

/// Lists every review of a title
pub async fn list_title_reviews(store: &dyn CatalogStore, title_id: i64) -> AppResult<Vec<Review>> {
    if store.get_title(title_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Title {} does not exist", title_id)));
    }
    store.list_reviews(ReviewFilter::for_title(title_id)).await
}

/// Lists all reviews, optionally only those written by `username`
pub async fn list_reviews(store: &dyn CatalogStore, username: Option<String>) -> AppResult<Vec<Review>> {
    store
        .list_reviews(ReviewFilter {
            title_id: None,
            username,
        })
        .await
}

pub async fn get_review(store: &dyn CatalogStore, id: i64) -> AppResult<Review> {
    store
        .get_review(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Review {} does not exist", id)))
}

/// Loads a review the actor is allowed to modify: its author or staff
async fn review_for_edit(store: &dyn CatalogStore, id: i64, actor: &User) -> AppResult<Review> {
    let review = get_review(store, id).await?;
    if review.reviewer_id != actor.id && !actor.is_staff {
        return Err(AppError::Forbidden(
            "You do not have permission to modify this review.".to_string(),
        ));
    }
    Ok(review)
}

/// Edits the comment or active flag of a review; the rating stays fixed
pub async fn update_review(
    store: &dyn CatalogStore,
    id: i64,
    actor: &User,
    changes: ReviewChanges,
) -> AppResult<Review> {
    let mut errors = FieldErrors::new();
    validate_comment(changes.comment.as_deref(), &mut errors);
    errors.into_result()?;

    review_for_edit(store, id, actor).await?;
    let review = store
        .update_review(id, changes)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Review {} does not exist", id)))?;

    tracing::info!(review_id = id, actor = %actor.username, "Review updated");
    Ok(review)
}

/// Deactivates a review. The row stays so `number_rating` keeps matching the
/// review count.
pub async fn deactivate_review(store: &dyn CatalogStore, id: i64, actor: &User) -> AppResult<()> {
    review_for_edit(store, id, actor).await?;
    store
        .update_review(
            id,
            ReviewChanges {
                comment: None,
                active: Some(false),
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Review {} does not exist", id)))?;

    tracing::info!(review_id = id, actor = %actor.username, "Review deactivated");
    Ok(())
}
