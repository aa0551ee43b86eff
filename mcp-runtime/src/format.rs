//! Pure mapping from upstream records to the normalized shapes returned to
//! the agent. Total: missing upstream fields become empty values.

use chrono::{DateTime, SecondsFormat, Utc};
use perch_core::posts::{Post, PostAuthor, PostMetrics, Tweet};
use perch_core::profiles::{Profile, ProfileMetrics, ProfileSummary, UserProfile};

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

pub fn format_post(tweet: &Tweet) -> Post {
    Post {
        id: text(&tweet.id),
        text: text(&tweet.text),
        author: PostAuthor {
            id: text(&tweet.user_id),
            username: text(&tweet.username),
            display_name: text(&tweet.name),
        },
        created_at: timestamp(tweet.created_at),
        metrics: PostMetrics {
            likes: tweet.likes.unwrap_or_default(),
            reposts: tweet.retweets.unwrap_or_default(),
            replies: tweet.replies.unwrap_or_default(),
            views: tweet.views.unwrap_or_default(),
        },
        urls: tweet.urls.clone(),
        hashtags: tweet.hashtags.clone(),
        is_repost: tweet.is_retweet.unwrap_or(false),
        is_reply: tweet.is_reply.unwrap_or(false),
    }
}

pub fn format_posts(tweets: &[Tweet]) -> Vec<Post> {
    tweets.iter().map(format_post).collect()
}

pub fn format_profile(profile: &UserProfile) -> Profile {
    Profile {
        id: text(&profile.user_id),
        username: text(&profile.username),
        display_name: text(&profile.name),
        bio: text(&profile.biography),
        location: text(&profile.location),
        website: text(&profile.website),
        join_date: timestamp(profile.joined),
        metrics: ProfileMetrics {
            post_count: profile.tweets_count.unwrap_or_default(),
            followers: profile.followers_count.unwrap_or_default(),
            following: profile.following_count.unwrap_or_default(),
            likes: profile.likes_count.unwrap_or_default(),
            listed: profile.listed_count.unwrap_or_default(),
        },
        is_verified: profile.is_verified.unwrap_or(false),
        is_private: profile.is_private.unwrap_or(false),
        avatar_url: text(&profile.avatar),
        banner_url: text(&profile.banner),
    }
}

pub fn format_profile_summary(profile: &UserProfile) -> ProfileSummary {
    ProfileSummary {
        id: text(&profile.user_id),
        username: text(&profile.username),
        display_name: text(&profile.name),
        bio: text(&profile.biography),
        is_verified: profile.is_verified.unwrap_or(false),
        avatar_url: text(&profile.avatar),
        followers: profile.followers_count.unwrap_or_default(),
        following: profile.following_count.unwrap_or_default(),
    }
}

/// Trends are already plain strings; blank entries are dropped.
pub fn format_trends(trends: Vec<String>) -> Vec<String> {
    trends
        .into_iter()
        .map(|trend| trend.trim().to_string())
        .filter(|trend| !trend.is_empty())
        .collect()
}
