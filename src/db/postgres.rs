use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};

use crate::{
    error::{AppError, AppResult, FieldErrors},
    models::{
        AuthToken, NewPlatform, NewReview, NewTitle, NewUser, Platform, Review, ReviewChanges,
        ReviewFilter, Title, User,
    },
};

use super::CatalogStore;

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the embedded schema migrations
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const PLATFORM_COLUMNS: &str = "id, name, about, website";

const TITLE_COLUMNS: &str = "id, platform_id, name, description, active, release_year, \
     created_at, avg_rating, number_rating";

const REVIEW_SELECT: &str = "SELECT r.id, r.title_id, r.reviewer_id, u.username AS reviewer, \
     r.rating, r.comment, r.active, r.created_at, r.updated_at \
     FROM reviews r JOIN users u ON u.id = r.reviewer_id";

const USER_COLUMNS: &str = "id, username, email, password_hash, is_staff, date_joined";

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

fn platform_write_error(error: sqlx::Error) -> AppError {
    if is_unique_violation(&error) {
        FieldErrors::single("name", "A platform with this name already exists.")
    } else {
        AppError::Database(error)
    }
}

fn title_write_error(error: sqlx::Error) -> AppError {
    if is_foreign_key_violation(&error) {
        FieldErrors::single("platform_id", "Platform does not exist.")
    } else {
        AppError::Database(error)
    }
}

/// Field and message for a unique violation on `users`, keyed by constraint name
fn user_conflict(constraint: Option<&str>) -> (&'static str, &'static str) {
    match constraint {
        Some("users_email_key") => ("email", "Email already exists."),
        _ => ("username", "A user with that username already exists."),
    }
}

fn user_write_error(error: sqlx::Error) -> AppError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            let (field, message) = user_conflict(db.constraint());
            FieldErrors::single(field, message)
        }
        _ => AppError::Database(error),
    }
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_review(&self, id: i64) -> AppResult<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(&format!("{} WHERE r.id = $1", REVIEW_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(review)
    }

    /// Locks the title row for the rest of the transaction
    async fn lock_title(tx: &mut Transaction<'_, Postgres>, id: i64) -> AppResult<Option<Title>> {
        let title = sqlx::query_as::<_, Title>(&format!(
            "SELECT {} FROM titles WHERE id = $1 FOR UPDATE",
            TITLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(title)
    }
}

#[async_trait::async_trait]
impl CatalogStore for PgStore {
    async fn list_platforms(&self) -> AppResult<Vec<Platform>> {
        let platforms = sqlx::query_as::<_, Platform>(&format!(
            "SELECT {} FROM platforms ORDER BY id",
            PLATFORM_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(platforms)
    }

    async fn get_platform(&self, id: i64) -> AppResult<Option<Platform>> {
        let platform = sqlx::query_as::<_, Platform>(&format!(
            "SELECT {} FROM platforms WHERE id = $1",
            PLATFORM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(platform)
    }

    async fn platform_name_taken(&self, name: &str, except: Option<i64>) -> AppResult<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM platforms WHERE name = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(name)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn create_platform(&self, platform: NewPlatform) -> AppResult<Platform> {
        let created = sqlx::query_as::<_, Platform>(&format!(
            "INSERT INTO platforms (name, about, website) VALUES ($1, $2, $3) RETURNING {}",
            PLATFORM_COLUMNS
        ))
        .bind(platform.name)
        .bind(platform.about)
        .bind(platform.website)
        .fetch_one(&self.pool)
        .await
        .map_err(platform_write_error)?;

        tracing::info!(platform_id = created.id, "Platform created");
        Ok(created)
    }

    async fn update_platform(
        &self,
        id: i64,
        platform: NewPlatform,
    ) -> AppResult<Option<Platform>> {
        let updated = sqlx::query_as::<_, Platform>(&format!(
            "UPDATE platforms SET name = $2, about = $3, website = $4 WHERE id = $1 RETURNING {}",
            PLATFORM_COLUMNS
        ))
        .bind(id)
        .bind(platform.name)
        .bind(platform.about)
        .bind(platform.website)
        .fetch_optional(&self.pool)
        .await
        .map_err(platform_write_error)?;
        Ok(updated)
    }

    async fn delete_platform(&self, id: i64) -> AppResult<bool> {
        // Titles and reviews go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM platforms WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_titles(&self, platform_id: Option<i64>) -> AppResult<Vec<Title>> {
        let titles = sqlx::query_as::<_, Title>(&format!(
            "SELECT {} FROM titles WHERE ($1::BIGINT IS NULL OR platform_id = $1) ORDER BY id",
            TITLE_COLUMNS
        ))
        .bind(platform_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(titles)
    }

    async fn get_title(&self, id: i64) -> AppResult<Option<Title>> {
        let title = sqlx::query_as::<_, Title>(&format!(
            "SELECT {} FROM titles WHERE id = $1",
            TITLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(title)
    }

    async fn create_title(&self, title: NewTitle) -> AppResult<Title> {
        let created = sqlx::query_as::<_, Title>(&format!(
            "INSERT INTO titles (platform_id, name, description, active, release_year) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            TITLE_COLUMNS
        ))
        .bind(title.platform_id)
        .bind(title.name)
        .bind(title.description)
        .bind(title.active)
        .bind(title.release_year)
        .fetch_one(&self.pool)
        .await
        .map_err(title_write_error)?;

        tracing::info!(title_id = created.id, platform_id = created.platform_id, "Title created");
        Ok(created)
    }

    async fn update_title(&self, id: i64, title: NewTitle) -> AppResult<Option<Title>> {
        let updated = sqlx::query_as::<_, Title>(&format!(
            "UPDATE titles SET platform_id = $2, name = $3, description = $4, active = $5, \
             release_year = $6 WHERE id = $1 RETURNING {}",
            TITLE_COLUMNS
        ))
        .bind(id)
        .bind(title.platform_id)
        .bind(title.name)
        .bind(title.description)
        .bind(title.active)
        .bind(title.release_year)
        .fetch_optional(&self.pool)
        .await
        .map_err(title_write_error)?;
        Ok(updated)
    }

    async fn delete_title(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM titles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_reviews(&self, filter: ReviewFilter) -> AppResult<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            "{} WHERE ($1::BIGINT IS NULL OR r.title_id = $1) \
             AND ($2::TEXT IS NULL OR u.username = $2) ORDER BY r.id",
            REVIEW_SELECT
        ))
        .bind(filter.title_id)
        .bind(filter.username)
        .fetch_all(&self.pool)
        .await?;
        Ok(reviews)
    }

    async fn get_review(&self, id: i64) -> AppResult<Option<Review>> {
        self.fetch_review(id).await
    }

    async fn record_review(&self, review: NewReview) -> AppResult<Review> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent submissions for the same title
        let title = Self::lock_title(&mut tx, review.title_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Title {} does not exist", review.title_id))
            })?;

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM reviews WHERE title_id = $1 AND reviewer_id = $2")
                .bind(review.title_id)
                .bind(review.reviewer_id)
                .fetch_optional(&mut *tx)
                .await?;
        if existing.is_some() {
            return Err(AppError::DuplicateReview {
                title_id: review.title_id,
                reviewer: review.reviewer,
            });
        }

        let folded = title.aggregate().fold(review.rating);
        sqlx::query("UPDATE titles SET avg_rating = $2, number_rating = $3 WHERE id = $1")
            .bind(title.id)
            .bind(folded.avg_rating)
            .bind(folded.number_rating)
            .execute(&mut *tx)
            .await?;

        let reviewer = review.reviewer.clone();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO reviews (title_id, reviewer_id, rating, comment) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(review.title_id)
        .bind(review.reviewer_id)
        .bind(i16::from(review.rating.value()))
        .bind(review.comment)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::DuplicateReview {
                    title_id: review.title_id,
                    reviewer: reviewer.clone(),
                }
            } else {
                AppError::Database(e)
            }
        })?;

        let created = sqlx::query_as::<_, Review>(&format!("{} WHERE r.id = $1", REVIEW_SELECT))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn update_review(&self, id: i64, changes: ReviewChanges) -> AppResult<Option<Review>> {
        let updated: Option<i64> = sqlx::query_scalar(
            "UPDATE reviews SET comment = COALESCE($2, comment), active = COALESCE($3, active), \
             updated_at = NOW() WHERE id = $1 RETURNING id",
        )
        .bind(id)
        .bind(changes.comment)
        .bind(changes.active)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(id) => self.fetch_review(id).await,
            None => Ok(None),
        }
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let created = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password_hash, is_staff) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.is_staff)
        .fetch_one(&self.pool)
        .await
        .map_err(user_write_error)?;
        Ok(created)
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn email_taken(&self, email: &str) -> AppResult<bool> {
        let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(taken)
    }

    async fn user_for_token(&self, key: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT u.id, u.username, u.email, u.password_hash, u.is_staff, u.date_joined \
             FROM auth_tokens t JOIN users u ON u.id = t.user_id WHERE t.key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn issue_token(&self, candidate: AuthToken) -> AppResult<AuthToken> {
        sqlx::query(
            "INSERT INTO auth_tokens (key, user_id, created_at) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(&candidate.key)
        .bind(candidate.user_id)
        .bind(candidate.created_at)
        .execute(&self.pool)
        .await?;

        let token = sqlx::query_as::<_, AuthToken>(
            "SELECT key, user_id, created_at FROM auth_tokens WHERE user_id = $1",
        )
        .bind(candidate.user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(token)
    }

    async fn delete_token(&self, user_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
