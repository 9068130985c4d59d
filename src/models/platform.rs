use serde::{Deserialize, Serialize};

use super::Title;

/// A streaming service offering zero or more titles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Platform {
    pub id: i64,
    /// Unique display name (e.g., "Netflix")
    pub name: String,
    /// Free-text description of the service
    pub about: String,
    pub website: String,
}

/// A platform together with the titles it streams
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlatformDetail {
    #[serde(flatten)]
    pub platform: Platform,
    pub watchlist: Vec<Title>,
}

/// Writable platform fields, used for both create and full update
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NewPlatform {
    pub name: String,
    pub about: String,
    pub website: String,
}
