pub mod platform;
pub mod review;
pub mod title;
pub mod user;

pub use platform::{NewPlatform, Platform, PlatformDetail};
pub use review::{NewReview, Rating, Review, ReviewChanges, ReviewFilter};
pub use title::{NewTitle, RatingAggregate, Title};
pub use user::{AuthToken, NewUser, User};
