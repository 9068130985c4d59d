use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, FieldErrors};

/// Longest accepted review comment, in characters
pub const MAX_COMMENT_CHARS: usize = 200;

/// A review score, always within 1..=5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = AppError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(FieldErrors::single(
                "rating",
                format!(
                    "Rating must be between {} and {}.",
                    Self::MIN,
                    Self::MAX
                ),
            ))
        }
    }
}

impl Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One reviewer's rating and comment for a title
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Review {
    pub id: i64,
    pub title_id: i64,
    pub reviewer_id: i64,
    /// Reviewer's username
    pub reviewer: String,
    pub rating: i16,
    pub comment: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated submission, ready to be folded into a title
#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub title_id: i64,
    pub reviewer_id: i64,
    pub reviewer: String,
    pub rating: Rating,
    pub comment: Option<String>,
}

/// Fields an author may change after submission. The rating is fixed once
/// folded into the title aggregate.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct ReviewChanges {
    pub comment: Option<String>,
    pub active: Option<bool>,
}

/// Narrows a review listing
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct ReviewFilter {
    pub title_id: Option<i64>,
    pub username: Option<String>,
}

impl ReviewFilter {
    pub fn for_title(title_id: i64) -> Self {
        Self {
            title_id: Some(title_id),
            username: None,
        }
    }

    pub fn matches(&self, review: &Review) -> bool {
        self.title_id.map_or(true, |id| review.title_id == id)
            && self
                .username
                .as_deref()
                .map_or(true, |name| review.reviewer == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_accepts_bounds() {
        assert_eq!(Rating::try_from(1).unwrap().value(), 1);
        assert_eq!(Rating::try_from(5).unwrap().value(), 5);
    }

    #[test]
    fn test_rating_rejects_out_of_range() {
        for value in [0, 6, -1, 255] {
            match Rating::try_from(value) {
                Err(AppError::Validation(fields)) => assert!(fields.get("rating").is_some()),
                other => panic!("expected validation error for {}, got {:?}", value, other),
            }
        }
    }

    #[test]
    fn test_review_filter_matches() {
        let now = Utc::now();
        let review = Review {
            id: 1,
            title_id: 10,
            reviewer_id: 3,
            reviewer: "alice".to_string(),
            rating: 4,
            comment: None,
            active: true,
            created_at: now,
            updated_at: now,
        };

        assert!(ReviewFilter::default().matches(&review));
        assert!(ReviewFilter::for_title(10).matches(&review));
        assert!(!ReviewFilter::for_title(11).matches(&review));

        let by_bob = ReviewFilter {
            title_id: None,
            username: Some("bob".to_string()),
        };
        assert!(!by_bob.matches(&review));
    }
}
