//! Recording doubles for [`UpstreamClient`] and [`Connector`].

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::{StreamExt, stream};
use perch_core::auth::{ApiKeyCredentials, PasswordCredentials};
use perch_core::posts::{Page, PostResponse, Tweet};
use perch_core::profiles::UserProfile;
use serde_json::json;

use crate::upstream::{
    Connector, LazySequence, PostDraft, SearchMode, UpstreamClient, UpstreamError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    UserTweets(String),
    Profile(String),
    Search { query: String, mode: SearchMode },
    Like(String),
    Unlike(String),
    Retweet(String),
    Unretweet(String),
    SendPost {
        text: String,
        reply_to: Option<String>,
        quote_of: Option<String>,
        media: usize,
    },
    Trends,
    Followers(String),
    Following(String),
    HomeTimeline(usize),
    FollowingTimeline(usize),
    ListTweets { list_id: String, count: usize },
    Follow(String),
    Unfollow(String),
}

#[derive(Default)]
struct Inner {
    calls: Mutex<Vec<Call>>,
    tweets: Vec<Tweet>,
    profiles: Vec<UserProfile>,
    trends: Vec<String>,
    endless: bool,
    read_error: Option<UpstreamError>,
    fail_post_at: Option<(usize, String)>,
    post_error_at: Option<(usize, UpstreamError)>,
    post_without_id_at: Option<usize>,
    posts_sent: AtomicUsize,
    next_id: AtomicU64,
    pulled: Arc<AtomicUsize>,
}

/// In-memory client. Clones share the call log.
#[derive(Clone, Default)]
pub struct FakeClient {
    inner: Arc<Inner>,
}

pub fn tweet(id: u64, day: u32) -> Tweet {
    Tweet {
        id: Some(id.to_string()),
        text: Some(format!("tweet {id}")),
        user_id: Some("100".to_string()),
        username: Some("alice".to_string()),
        name: Some("Alice".to_string()),
        created_at: Utc.with_ymd_and_hms(2024, 6, day, 9, 0, 0).single(),
        ..Tweet::default()
    }
}

pub fn profile(username: &str) -> UserProfile {
    UserProfile {
        user_id: Some(format!("id-{username}")),
        username: Some(username.to_string()),
        name: Some(username.to_uppercase()),
        followers_count: Some(3),
        ..UserProfile::default()
    }
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn configure(mut self, apply: impl FnOnce(&mut Inner)) -> Self {
        let inner = Arc::get_mut(&mut self.inner).expect("configure before sharing the fake");
        apply(inner);
        self
    }

    pub fn with_tweets(self, tweets: Vec<Tweet>) -> Self {
        self.configure(|inner| inner.tweets = tweets)
    }

    pub fn with_profile(self, profile: UserProfile) -> Self {
        self.configure(|inner| inner.profiles.push(profile))
    }

    pub fn with_trends(self, trends: &[&str]) -> Self {
        self.configure(|inner| inner.trends = trends.iter().map(|t| t.to_string()).collect())
    }

    /// Lazy sequences never end; every item is dated 2024-06-01.
    pub fn endless(self) -> Self {
        self.configure(|inner| inner.endless = true)
    }

    pub fn failing_reads(self, err: UpstreamError) -> Self {
        self.configure(|inner| inner.read_error = Some(err))
    }

    /// The `step`-th post (1-based) comes back with an `errors` body.
    pub fn failing_post_at(self, step: usize, message: &str) -> Self {
        let message = message.to_string();
        self.configure(|inner| inner.fail_post_at = Some((step, message)))
    }

    /// The `step`-th post (1-based) fails with `err` instead of a response.
    pub fn post_error_at(self, step: usize, err: UpstreamError) -> Self {
        self.configure(|inner| inner.post_error_at = Some((step, err)))
    }

    pub fn post_without_id_at(self, step: usize) -> Self {
        self.configure(|inner| inner.post_without_id_at = Some(step))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.calls.lock().unwrap().clone()
    }

    /// Items pulled out of lazy sequences so far.
    pub fn pulled(&self) -> usize {
        self.inner.pulled.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.inner.calls.lock().unwrap().push(call);
    }

    fn read_result(&self) -> Result<(), UpstreamError> {
        match &self.inner.read_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn lazy<T, F>(&self, finite: Vec<T>, make: F) -> LazySequence<'static, T>
    where
        T: Send + 'static,
        F: Fn(u64) -> T + Send + 'static,
    {
        if let Some(err) = self.inner.read_error.clone() {
            return stream::iter(vec![Err(err)]).boxed();
        }
        let pulled = Arc::clone(&self.inner.pulled);
        if self.inner.endless {
            stream::iter(1_u64..)
                .map(move |n| {
                    pulled.fetch_add(1, Ordering::SeqCst);
                    Ok(make(n))
                })
                .boxed()
        } else {
            stream::iter(finite)
                .map(move |item| {
                    pulled.fetch_add(1, Ordering::SeqCst);
                    Ok(item)
                })
                .boxed()
        }
    }

    fn tweet_stream(&self) -> LazySequence<'static, Tweet> {
        self.lazy(self.inner.tweets.clone(), |n| tweet(n, 1))
    }

    fn profile_stream(&self) -> LazySequence<'static, UserProfile> {
        self.lazy(self.inner.profiles.clone(), |n| profile(&format!("user{n}")))
    }

    /// Ignores the requested count, like upstreams that over-deliver.
    fn bounded_tweets(&self) -> Result<Vec<Tweet>, UpstreamError> {
        self.read_result()?;
        if self.inner.endless {
            return Ok((1..=200).map(|n| tweet(n, 1)).collect());
        }
        Ok(self.inner.tweets.clone())
    }
}

#[async_trait]
impl UpstreamClient for FakeClient {
    fn user_tweets<'a>(&'a self, username: &'a str) -> LazySequence<'a, Tweet> {
        self.record(Call::UserTweets(username.to_string()));
        self.tweet_stream()
    }

    async fn profile(&self, username: &str) -> Result<Option<UserProfile>, UpstreamError> {
        self.record(Call::Profile(username.to_string()));
        self.read_result()?;
        Ok(self
            .inner
            .profiles
            .iter()
            .find(|p| p.username.as_deref() == Some(username))
            .cloned())
    }

    fn search<'a>(&'a self, query: &'a str, mode: SearchMode) -> LazySequence<'a, Tweet> {
        self.record(Call::Search {
            query: query.to_string(),
            mode,
        });
        self.tweet_stream()
    }

    async fn like(&self, tweet_id: &str) -> Result<(), UpstreamError> {
        self.record(Call::Like(tweet_id.to_string()));
        self.read_result()
    }

    async fn unlike(&self, tweet_id: &str) -> Result<(), UpstreamError> {
        self.record(Call::Unlike(tweet_id.to_string()));
        self.read_result()
    }

    async fn retweet(&self, tweet_id: &str) -> Result<(), UpstreamError> {
        self.record(Call::Retweet(tweet_id.to_string()));
        self.read_result()
    }

    async fn unretweet(&self, tweet_id: &str) -> Result<(), UpstreamError> {
        self.record(Call::Unretweet(tweet_id.to_string()));
        self.read_result()
    }

    async fn send_post(&self, draft: PostDraft) -> Result<PostResponse, UpstreamError> {
        self.record(Call::SendPost {
            text: draft.text.clone(),
            reply_to: draft.reply_to.clone(),
            quote_of: draft.quote_of.clone(),
            media: draft.media.len(),
        });
        let step = self.inner.posts_sent.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((fail_step, err)) = &self.inner.post_error_at {
            if *fail_step == step {
                return Err(err.clone());
            }
        }
        if let Some((fail_step, message)) = &self.inner.fail_post_at {
            if *fail_step == step {
                return Ok(PostResponse::new(json!({ "errors": [{ "message": message }] })));
            }
        }
        if self.inner.post_without_id_at == Some(step) {
            return Ok(PostResponse::new(json!({ "data": {} })));
        }
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PostResponse::new(
            json!({ "data": { "id": id.to_string(), "text": draft.text } }),
        ))
    }

    async fn trends(&self) -> Result<Vec<String>, UpstreamError> {
        self.record(Call::Trends);
        self.read_result()?;
        Ok(self.inner.trends.clone())
    }

    fn followers<'a>(&'a self, username: &'a str) -> LazySequence<'a, UserProfile> {
        self.record(Call::Followers(username.to_string()));
        self.profile_stream()
    }

    fn following<'a>(&'a self, username: &'a str) -> LazySequence<'a, UserProfile> {
        self.record(Call::Following(username.to_string()));
        self.profile_stream()
    }

    async fn home_timeline(&self, count: usize) -> Result<Vec<Tweet>, UpstreamError> {
        self.record(Call::HomeTimeline(count));
        self.bounded_tweets()
    }

    async fn following_timeline(&self, count: usize) -> Result<Vec<Tweet>, UpstreamError> {
        self.record(Call::FollowingTimeline(count));
        self.bounded_tweets()
    }

    async fn list_tweets(&self, list_id: &str, count: usize) -> Result<Page<Tweet>, UpstreamError> {
        self.record(Call::ListTweets {
            list_id: list_id.to_string(),
            count,
        });
        Ok(Page::new(self.bounded_tweets()?, Some("cursor-2".to_string())))
    }

    async fn follow(&self, username: &str) -> Result<(), UpstreamError> {
        self.record(Call::Follow(username.to_string()));
        self.read_result()
    }

    async fn unfollow(&self, username: &str) -> Result<(), UpstreamError> {
        self.record(Call::Unfollow(username.to_string()));
        self.read_result()
    }
}

pub fn password_credentials() -> PasswordCredentials {
    PasswordCredentials {
        username: "perch_bot".to_string(),
        password: "hunter2".to_string(),
        email: Some("bot@example.com".to_string()),
    }
}

pub fn api_key_credentials() -> ApiKeyCredentials {
    ApiKeyCredentials {
        api_key: "key".to_string(),
        api_secret_key: "secret".to_string(),
        access_token: "token".to_string(),
        access_token_secret: "token-secret".to_string(),
    }
}

pub struct FakeConnector {
    client: FakeClient,
    password_error: Option<UpstreamError>,
    api_key_error: Option<UpstreamError>,
    attempts: Mutex<Vec<&'static str>>,
}

impl FakeConnector {
    pub fn succeeding() -> Self {
        Self {
            client: FakeClient::new(),
            password_error: None,
            api_key_error: None,
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_password() -> Self {
        Self {
            password_error: Some(UpstreamError::Rejected("bad password".to_string())),
            ..Self::succeeding()
        }
    }

    pub fn failing_both() -> Self {
        Self {
            api_key_error: Some(UpstreamError::Rejected("bad keys".to_string())),
            ..Self::failing_password()
        }
    }

    pub fn with_client(self, client: FakeClient) -> Self {
        Self { client, ..self }
    }

    pub fn attempts(&self) -> Vec<&'static str> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn login_with_password(
        &self,
        _creds: &PasswordCredentials,
    ) -> Result<Arc<dyn UpstreamClient>, UpstreamError> {
        self.attempts.lock().unwrap().push("password");
        match &self.password_error {
            Some(err) => Err(err.clone()),
            None => Ok(Arc::new(self.client.clone())),
        }
    }

    async fn login_with_api_keys(
        &self,
        _creds: &ApiKeyCredentials,
    ) -> Result<Arc<dyn UpstreamClient>, UpstreamError> {
        self.attempts.lock().unwrap().push("api_keys");
        match &self.api_key_error {
            Some(err) => Err(err.clone()),
            None => Ok(Arc::new(self.client.clone())),
        }
    }
}
