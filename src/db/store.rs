use crate::{
    error::AppResult,
    models::{
        AuthToken, NewPlatform, NewReview, NewTitle, NewUser, Platform, Review, ReviewChanges,
        ReviewFilter, Title, User,
    },
};

/// Persistence abstraction for the catalog, reviews and accounts
///
/// Lookups return `Ok(None)` for missing rows and leave the choice of error to
/// the caller. Writes that target a missing row return `Ok(None)`/`Ok(false)`
/// in the same way. Two implementations exist: [`super::PgStore`] for
/// production and [`super::MemoryStore`] for tests and local runs.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_platforms(&self) -> AppResult<Vec<Platform>>;

    async fn get_platform(&self, id: i64) -> AppResult<Option<Platform>>;

    /// Whether another platform (other than `except`) already uses `name`
    async fn platform_name_taken(&self, name: &str, except: Option<i64>) -> AppResult<bool>;

    async fn create_platform(&self, platform: NewPlatform) -> AppResult<Platform>;

    async fn update_platform(&self, id: i64, platform: NewPlatform)
        -> AppResult<Option<Platform>>;

    /// Deletes the platform along with its titles and their reviews
    async fn delete_platform(&self, id: i64) -> AppResult<bool>;

    /// Lists titles, optionally only those of one platform
    async fn list_titles(&self, platform_id: Option<i64>) -> AppResult<Vec<Title>>;

    async fn get_title(&self, id: i64) -> AppResult<Option<Title>>;

    /// Inserts a title with an empty rating aggregate
    async fn create_title(&self, title: NewTitle) -> AppResult<Title>;

    /// Replaces the writable fields, leaving aggregates and `created_at` alone
    async fn update_title(&self, id: i64, title: NewTitle) -> AppResult<Option<Title>>;

    /// Deletes the title along with its reviews
    async fn delete_title(&self, id: i64) -> AppResult<bool>;

    async fn list_reviews(&self, filter: ReviewFilter) -> AppResult<Vec<Review>>;

    async fn get_review(&self, id: i64) -> AppResult<Option<Review>>;

    /// Atomically checks the one-review-per-reviewer rule, folds the rating
    /// into the title aggregate and inserts the review.
    ///
    /// Fails with `NotFound` if the title is gone and `DuplicateReview` if the
    /// reviewer already reviewed it; in both cases nothing is written.
    async fn record_review(&self, review: NewReview) -> AppResult<Review>;

    /// Applies comment/active changes and refreshes `updated_at`
    async fn update_review(&self, id: i64, changes: ReviewChanges) -> AppResult<Option<Review>>;

    async fn create_user(&self, user: NewUser) -> AppResult<User>;

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>>;

    async fn email_taken(&self, email: &str) -> AppResult<bool>;

    async fn user_for_token(&self, key: &str) -> AppResult<Option<User>>;

    /// Returns the user's existing token, or stores `candidate` if they have none
    async fn issue_token(&self, candidate: AuthToken) -> AppResult<AuthToken>;

    async fn delete_token(&self, user_id: i64) -> AppResult<bool>;
}
