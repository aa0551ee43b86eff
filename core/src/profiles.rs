use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user profile as the upstream client hands it over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub name: Option<String>,
    pub biography: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub joined: Option<DateTime<Utc>>,
    pub tweets_count: Option<u64>,
    pub followers_count: Option<u64>,
    pub following_count: Option<u64>,
    pub likes_count: Option<u64>,
    pub listed_count: Option<u64>,
    pub is_verified: Option<bool>,
    pub is_private: Option<bool>,
    pub avatar: Option<String>,
    pub banner: Option<String>,
}

/// Normalized profile returned by `get_profile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub bio: String,
    pub location: String,
    pub website: String,
    /// RFC 3339 timestamp, empty when unknown
    pub join_date: String,
    pub metrics: ProfileMetrics,
    pub is_verified: bool,
    pub is_private: bool,
    pub avatar_url: String,
    pub banner_url: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMetrics {
    pub post_count: u64,
    pub followers: u64,
    pub following: u64,
    pub likes: u64,
    pub listed: u64,
}

/// Reduced profile used for follower/following listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub bio: String,
    pub is_verified: bool,
    pub avatar_url: String,
    pub followers: u64,
    pub following: u64,
}
