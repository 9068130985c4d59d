use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult, FieldErrors},
    models::{
        AuthToken, NewPlatform, NewReview, NewTitle, NewUser, Platform, Review, ReviewChanges,
        ReviewFilter, Title, User,
    },
};

use super::CatalogStore;

/// In-process store used by tests and `STORAGE=memory` runs
///
/// Every table lives behind one lock, so a review submission holds the write
/// guard across the duplicate check, the aggregate fold and the insert.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    platforms: BTreeMap<i64, Platform>,
    titles: BTreeMap<i64, Title>,
    reviews: BTreeMap<i64, Review>,
    users: BTreeMap<i64, User>,
    tokens: HashMap<String, AuthToken>,
    platform_ids: Sequence,
    title_ids: Sequence,
    review_ids: Sequence,
    user_ids: Sequence,
}

/// Monotonic id generator, starting at 1
#[derive(Default)]
struct Sequence(i64);

impl Sequence {
    fn next(&mut self) -> i64 {
        self.0 += 1;
        self.0
    }
}

impl MemoryInner {
    fn remove_title(&mut self, id: i64) -> bool {
        if self.titles.remove(&id).is_none() {
            return false;
        }
        self.reviews.retain(|_, review| review.title_id != id);
        true
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CatalogStore for MemoryStore {
    async fn list_platforms(&self) -> AppResult<Vec<Platform>> {
        let inner = self.inner.read().await;
        Ok(inner.platforms.values().cloned().collect())
    }

    async fn get_platform(&self, id: i64) -> AppResult<Option<Platform>> {
        let inner = self.inner.read().await;
        Ok(inner.platforms.get(&id).cloned())
    }

    async fn platform_name_taken(&self, name: &str, except: Option<i64>) -> AppResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner
            .platforms
            .values()
            .any(|p| p.name == name && Some(p.id) != except))
    }

    async fn create_platform(&self, platform: NewPlatform) -> AppResult<Platform> {
        let mut inner = self.inner.write().await;
        if inner.platforms.values().any(|p| p.name == platform.name) {
            return Err(FieldErrors::single(
                "name",
                "A platform with this name already exists.",
            ));
        }

        let created = Platform {
            id: inner.platform_ids.next(),
            name: platform.name,
            about: platform.about,
            website: platform.website,
        };
        inner.platforms.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_platform(
        &self,
        id: i64,
        platform: NewPlatform,
    ) -> AppResult<Option<Platform>> {
        let mut inner = self.inner.write().await;
        if inner
            .platforms
            .values()
            .any(|p| p.name == platform.name && p.id != id)
        {
            return Err(FieldErrors::single(
                "name",
                "A platform with this name already exists.",
            ));
        }

        let Some(existing) = inner.platforms.get_mut(&id) else {
            return Ok(None);
        };
        existing.name = platform.name;
        existing.about = platform.about;
        existing.website = platform.website;
        Ok(Some(existing.clone()))
    }

    async fn delete_platform(&self, id: i64) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        if inner.platforms.remove(&id).is_none() {
            return Ok(false);
        }

        let title_ids: Vec<i64> = inner
            .titles
            .values()
            .filter(|t| t.platform_id == id)
            .map(|t| t.id)
            .collect();
        for title_id in title_ids {
            inner.remove_title(title_id);
        }
        Ok(true)
    }

    async fn list_titles(&self, platform_id: Option<i64>) -> AppResult<Vec<Title>> {
        let inner = self.inner.read().await;
        Ok(inner
            .titles
            .values()
            .filter(|t| platform_id.map_or(true, |id| t.platform_id == id))
            .cloned()
            .collect())
    }

    async fn get_title(&self, id: i64) -> AppResult<Option<Title>> {
        let inner = self.inner.read().await;
        Ok(inner.titles.get(&id).cloned())
    }

    async fn create_title(&self, title: NewTitle) -> AppResult<Title> {
        let mut inner = self.inner.write().await;
        if !inner.platforms.contains_key(&title.platform_id) {
            return Err(FieldErrors::single("platform_id", "Platform does not exist."));
        }

        let created = Title {
            id: inner.title_ids.next(),
            platform_id: title.platform_id,
            name: title.name,
            description: title.description,
            active: title.active,
            release_year: title.release_year,
            created_at: Utc::now(),
            avg_rating: 0.0,
            number_rating: 0,
        };
        inner.titles.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_title(&self, id: i64, title: NewTitle) -> AppResult<Option<Title>> {
        let mut inner = self.inner.write().await;
        if !inner.platforms.contains_key(&title.platform_id) {
            return Err(FieldErrors::single("platform_id", "Platform does not exist."));
        }

        let Some(existing) = inner.titles.get_mut(&id) else {
            return Ok(None);
        };
        existing.platform_id = title.platform_id;
        existing.name = title.name;
        existing.description = title.description;
        existing.active = title.active;
        existing.release_year = title.release_year;
        Ok(Some(existing.clone()))
    }

    async fn delete_title(&self, id: i64) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.remove_title(id))
    }

    async fn list_reviews(&self, filter: ReviewFilter) -> AppResult<Vec<Review>> {
        let inner = self.inner.read().await;
        Ok(inner
            .reviews
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn get_review(&self, id: i64) -> AppResult<Option<Review>> {
        let inner = self.inner.read().await;
        Ok(inner.reviews.get(&id).cloned())
    }

    async fn record_review(&self, review: NewReview) -> AppResult<Review> {
        let mut inner = self.inner.write().await;

        let Some(title) = inner.titles.get(&review.title_id) else {
            return Err(AppError::NotFound(format!(
                "Title {} does not exist",
                review.title_id
            )));
        };
        let aggregate = title.aggregate();

        if inner
            .reviews
            .values()
            .any(|r| r.title_id == review.title_id && r.reviewer_id == review.reviewer_id)
        {
            return Err(AppError::DuplicateReview {
                title_id: review.title_id,
                reviewer: review.reviewer,
            });
        }

        let folded = aggregate.fold(review.rating);
        let now = Utc::now();
        let created = Review {
            id: inner.review_ids.next(),
            title_id: review.title_id,
            reviewer_id: review.reviewer_id,
            reviewer: review.reviewer,
            rating: i16::from(review.rating.value()),
            comment: review.comment,
            active: true,
            created_at: now,
            updated_at: now,
        };

        // Both writes happen under the same guard, so no reader sees one without the other.
        if let Some(title) = inner.titles.get_mut(&created.title_id) {
            title.avg_rating = folded.avg_rating;
            title.number_rating = folded.number_rating;
        }
        inner.reviews.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_review(&self, id: i64, changes: ReviewChanges) -> AppResult<Option<Review>> {
        let mut inner = self.inner.write().await;
        let Some(review) = inner.reviews.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(comment) = changes.comment {
            review.comment = Some(comment);
        }
        if let Some(active) = changes.active {
            review.active = active;
        }
        review.updated_at = Utc::now();
        Ok(Some(review.clone()))
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let mut inner = self.inner.write().await;
        let mut errors = FieldErrors::new();
        if inner.users.values().any(|u| u.username == user.username) {
            errors.add("username", "A user with that username already exists.");
        }
        if inner.users.values().any(|u| u.email == user.email) {
            errors.add("email", "Email already exists.");
        }
        errors.into_result()?;

        let created = User {
            id: inner.user_ids.next(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            is_staff: user.is_staff,
            date_joined: Utc::now(),
        };
        inner.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn email_taken(&self, email: &str) -> AppResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().any(|u| u.email == email))
    }

    async fn user_for_token(&self, key: &str) -> AppResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .tokens
            .get(key)
            .and_then(|token| inner.users.get(&token.user_id))
            .cloned())
    }

    async fn issue_token(&self, candidate: AuthToken) -> AppResult<AuthToken> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner
            .tokens
            .values()
            .find(|t| t.user_id == candidate.user_id)
        {
            return Ok(existing.clone());
        }

        inner.tokens.insert(candidate.key.clone(), candidate.clone());
        Ok(candidate)
    }

    async fn delete_token(&self, user_id: i64) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.tokens.len();
        inner.tokens.retain(|_, t| t.user_id != user_id);
        Ok(inner.tokens.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rating;

    async fn seed(store: &MemoryStore) -> (Platform, Title, User) {
        let platform = store
            .create_platform(NewPlatform {
                name: "Netflix".to_string(),
                about: "Streaming service".to_string(),
                website: "https://netflix.com".to_string(),
            })
            .await
            .unwrap();
        let title = store
            .create_title(NewTitle {
                platform_id: platform.id,
                name: "Dark".to_string(),
                description: "Time travel in a small town".to_string(),
                active: true,
                release_year: 2017,
            })
            .await
            .unwrap();
        let user = store
            .create_user(NewUser {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: "x".to_string(),
                is_staff: false,
            })
            .await
            .unwrap();
        (platform, title, user)
    }

    fn submission(title: &Title, user: &User, rating: i64) -> NewReview {
        NewReview {
            title_id: title.id,
            reviewer_id: user.id,
            reviewer: user.username.clone(),
            rating: Rating::try_from(rating).unwrap(),
            comment: None,
        }
    }

    #[tokio::test]
    async fn test_delete_platform_cascades_to_titles_and_reviews() {
        let store = MemoryStore::new();
        let (platform, title, user) = seed(&store).await;
        store.record_review(submission(&title, &user, 5)).await.unwrap();

        assert!(store.delete_platform(platform.id).await.unwrap());
        assert!(store.get_title(title.id).await.unwrap().is_none());
        assert!(store
            .list_reviews(ReviewFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_record_review_rejects_duplicate_without_writes() {
        let store = MemoryStore::new();
        let (_, title, user) = seed(&store).await;
        store.record_review(submission(&title, &user, 4)).await.unwrap();

        let err = store
            .record_review(submission(&title, &user, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateReview { .. }));

        let title = store.get_title(title.id).await.unwrap().unwrap();
        assert_eq!(title.avg_rating, 4.0);
        assert_eq!(title.number_rating, 1);
    }

    #[tokio::test]
    async fn test_update_title_keeps_aggregate() {
        let store = MemoryStore::new();
        let (platform, title, user) = seed(&store).await;
        store.record_review(submission(&title, &user, 3)).await.unwrap();

        let updated = store
            .update_title(
                title.id,
                NewTitle {
                    platform_id: platform.id,
                    name: "Dark (2017)".to_string(),
                    description: "Renamed".to_string(),
                    active: false,
                    release_year: 2017,
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "Dark (2017)");
        assert_eq!(updated.avg_rating, 3.0);
        assert_eq!(updated.number_rating, 1);
        assert_eq!(updated.created_at, title.created_at);
    }

    #[tokio::test]
    async fn test_issue_token_is_get_or_create() {
        let store = MemoryStore::new();
        let (_, _, user) = seed(&store).await;

        let first = store
            .issue_token(AuthToken {
                key: "a".repeat(40),
                user_id: user.id,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let second = store
            .issue_token(AuthToken {
                key: "b".repeat(40),
                user_id: user.id,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        assert_eq!(first.key, second.key);
        assert_eq!(
            store.user_for_token(&first.key).await.unwrap().map(|u| u.id),
            Some(user.id)
        );
        assert!(store.delete_token(user.id).await.unwrap());
        assert!(store.user_for_token(&first.key).await.unwrap().is_none());
    }
}
