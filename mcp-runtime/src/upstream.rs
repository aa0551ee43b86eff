//! Seam between the dispatch layer and the platform client.
//!
//! Everything behind [`UpstreamClient`] and [`Connector`] is a black box to
//! the rest of the runtime: handlers only see domain records, lazy sequences
//! and [`UpstreamError`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use perch_core::auth::{ApiKeyCredentials, PasswordCredentials};
use perch_core::posts::{Page, PostResponse, Tweet};
use perch_core::profiles::UserProfile;
use thiserror::Error;

use crate::media::MediaAttachment;

/// Items produced on demand by the upstream, possibly without end.
pub type LazySequence<'a, T> = BoxStream<'a, Result<T, UpstreamError>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    Decode(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Rejected(String),
    #[error("{0}")]
    Unsupported(String),
}

impl UpstreamError {
    /// Human description carried by the error, `None` when it has none.
    pub fn description(&self) -> Option<&str> {
        let raw = match self {
            UpstreamError::Api { message, .. } => message,
            UpstreamError::Transport(message)
            | UpstreamError::Decode(message)
            | UpstreamError::NotFound(message)
            | UpstreamError::Rejected(message)
            | UpstreamError::Unsupported(message) => message,
        };
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Latest,
    Top,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Latest => "latest",
            SearchMode::Top => "top",
        }
    }
}

/// A post ready for submission. Media is already decoded and validated.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub text: String,
    pub reply_to: Option<String>,
    pub quote_of: Option<String>,
    pub media: Vec<MediaAttachment>,
    pub hide_link_preview: bool,
}

/// Authenticated platform operations.
///
/// Methods returning [`LazySequence`] must not fetch anything until the
/// stream is polled, and must fetch further pages only as items are pulled.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    fn user_tweets<'a>(&'a self, username: &'a str) -> LazySequence<'a, Tweet>;

    /// `Ok(None)` when the platform has no such user.
    async fn profile(&self, username: &str) -> Result<Option<UserProfile>, UpstreamError>;

    fn search<'a>(&'a self, query: &'a str, mode: SearchMode) -> LazySequence<'a, Tweet>;

    async fn like(&self, tweet_id: &str) -> Result<(), UpstreamError>;

    async fn unlike(&self, tweet_id: &str) -> Result<(), UpstreamError>;

    async fn retweet(&self, tweet_id: &str) -> Result<(), UpstreamError>;

    async fn unretweet(&self, tweet_id: &str) -> Result<(), UpstreamError>;

    async fn send_post(&self, draft: PostDraft) -> Result<PostResponse, UpstreamError>;

    async fn trends(&self) -> Result<Vec<String>, UpstreamError>;

    fn followers<'a>(&'a self, username: &'a str) -> LazySequence<'a, UserProfile>;

    fn following<'a>(&'a self, username: &'a str) -> LazySequence<'a, UserProfile>;

    async fn home_timeline(&self, count: usize) -> Result<Vec<Tweet>, UpstreamError>;

    async fn following_timeline(&self, count: usize) -> Result<Vec<Tweet>, UpstreamError>;

    async fn list_tweets(&self, list_id: &str, count: usize) -> Result<Page<Tweet>, UpstreamError>;

    async fn follow(&self, username: &str) -> Result<(), UpstreamError>;

    async fn unfollow(&self, username: &str) -> Result<(), UpstreamError>;
}

/// Produces an authenticated [`UpstreamClient`] from one credential tier.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn login_with_password(
        &self,
        creds: &PasswordCredentials,
    ) -> Result<Arc<dyn UpstreamClient>, UpstreamError>;

    async fn login_with_api_keys(
        &self,
        creds: &ApiKeyCredentials,
    ) -> Result<Arc<dyn UpstreamClient>, UpstreamError>;
}
