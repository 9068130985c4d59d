use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Rating;

/// A watchable work (movie or show) listed on a platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Title {
    pub id: i64,
    pub platform_id: i64,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub release_year: i32,
    /// Set once on insert
    pub created_at: DateTime<Utc>,
    /// Running rating, 0 while the title has no reviews
    pub avg_rating: f64,
    /// Number of reviews folded into `avg_rating`
    pub number_rating: i32,
}

impl Title {
    pub fn aggregate(&self) -> RatingAggregate {
        RatingAggregate {
            avg_rating: self.avg_rating,
            number_rating: self.number_rating,
        }
    }
}

/// Writable title fields, used for both create and full update.
/// Aggregates and the creation timestamp are never client-writable.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NewTitle {
    pub platform_id: i64,
    pub name: String,
    pub description: String,
    #[serde(default = "default_active")]
    pub active: bool,
    pub release_year: i32,
}

fn default_active() -> bool {
    true
}

/// The derived rating pair stored on a title
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RatingAggregate {
    pub avg_rating: f64,
    pub number_rating: i32,
}

impl RatingAggregate {
    /// Folds one new rating into the aggregate.
    ///
    /// The first rating becomes the average outright. Every later rating is
    /// averaged with the *current* average, so the result is a two-point
    /// average rather than the cumulative mean: ratings 4, 2, 1 give 2.0,
    /// not 2.33. Intermediate values are dyadic rationals, which `f64`
    /// represents exactly.
    pub fn fold(self, rating: Rating) -> Self {
        let rating = f64::from(rating.value());
        let avg_rating = if self.number_rating == 0 {
            rating
        } else {
            (self.avg_rating + rating) / 2.0
        };

        Self {
            avg_rating,
            number_rating: self.number_rating + 1,
        }
    }
}
