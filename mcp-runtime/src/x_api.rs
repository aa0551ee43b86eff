//! [`UpstreamClient`] over the X REST API with OAuth 1.0a user context.
//!
//! Reads and writes go through API v2. Media is uploaded with the v1.1
//! chunked upload flow (INIT, APPEND, FINALIZE, STATUS) and trends come from
//! the v1.1 trends endpoint, which v2 has no counterpart for.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use perch_core::auth::{
    ApiKeyCredentials, PasswordCredentials, authorization_header, oauth_nonce, percent_encode,
};
use perch_core::posts::{Page, PostResponse, Tweet};
use perch_core::profiles::UserProfile;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, multipart};
use serde_json::{Value, json};
use tracing::{debug, info};
use url::Url;

use crate::media::MediaAttachment;
use crate::upstream::{
    Connector, LazySequence, PostDraft, SearchMode, UpstreamClient, UpstreamError,
};

pub const DEFAULT_API_BASE_URL: &str = "https://api.twitter.com";
pub const DEFAULT_UPLOAD_BASE_URL: &str = "https://upload.twitter.com";

const PAGE_SIZE: usize = 100;
const UPLOAD_CHUNK_BYTES: usize = 4 * 1024 * 1024;
const MAX_STATUS_POLLS: usize = 30;
const WORLDWIDE_WOEID: &str = "1";

const TWEET_FIELDS: &str = "created_at,public_metrics,entities,referenced_tweets,author_id";
const USER_FIELDS: &str = "created_at,description,entities,location,url,public_metrics,verified,protected,profile_image_url";

#[derive(Debug, Clone)]
pub struct XApiConfig {
    pub api_base_url: String,
    pub upload_base_url: String,
}

impl Default for XApiConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            upload_base_url: DEFAULT_UPLOAD_BASE_URL.to_string(),
        }
    }
}

pub struct XApiConnector {
    http: reqwest::Client,
    config: XApiConfig,
}

impl XApiConnector {
    pub fn new(config: XApiConfig) -> Self {
        Self {
            http: crate::util::client(),
            config,
        }
    }
}

#[async_trait]
impl Connector for XApiConnector {
    async fn login_with_password(
        &self,
        _creds: &PasswordCredentials,
    ) -> Result<Arc<dyn UpstreamClient>, UpstreamError> {
        Err(UpstreamError::Unsupported(
            "password login is not available over the X REST API".to_string(),
        ))
    }

    async fn login_with_api_keys(
        &self,
        creds: &ApiKeyCredentials,
    ) -> Result<Arc<dyn UpstreamClient>, UpstreamError> {
        let mut client = XApiClient {
            http: self.http.clone(),
            config: self.config.clone(),
            creds: creds.clone(),
            user_id: String::new(),
        };
        let me = client.get_json("/2/users/me", &[]).await?;
        let user_id = me
            .pointer("/data/id")
            .and_then(Value::as_str)
            .ok_or_else(|| UpstreamError::Decode("users/me returned no user id".to_string()))?;
        client.user_id = user_id.to_string();
        let username = me
            .pointer("/data/username")
            .and_then(Value::as_str)
            .unwrap_or_default();
        info!(
            user_id = %client.user_id,
            username,
            "X API session established"
        );
        Ok(Arc::new(client))
    }
}

enum Body {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
    Multipart(multipart::Form),
}

fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
    raw.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn encode_pairs(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn join_url(base: &str, path: &str) -> Result<String, UpstreamError> {
    let base = Url::parse(base)
        .map_err(|e| UpstreamError::Transport(format!("invalid base URL '{base}': {e}")))?;
    base.join(path)
        .map(String::from)
        .map_err(|e| UpstreamError::Transport(format!("invalid request path '{path}': {e}")))
}

/// Human message from an API error body: `detail`, `title` or the first
/// `errors[].message`.
fn error_message(body: &Value) -> Option<String> {
    ["detail", "title"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .or_else(|| {
            body.get("errors")
                .and_then(Value::as_array)
                .and_then(|errors| errors.first())
                .and_then(|first| first.get("message").and_then(Value::as_str))
        })
        .map(str::to_string)
}

pub struct XApiClient {
    http: reqwest::Client,
    config: XApiConfig,
    creds: ApiKeyCredentials,
    user_id: String,
}

impl XApiClient {
    fn api_url(&self, path: &str) -> Result<String, UpstreamError> {
        join_url(&self.config.api_base_url, path)
    }

    fn upload_url(&self) -> Result<String, UpstreamError> {
        join_url(&self.config.upload_base_url, "/1.1/media/upload.json")
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
        body: Body,
    ) -> Result<Value, UpstreamError> {
        let mut signed_params = query.to_vec();
        if let Body::Form(form) = &body {
            signed_params.extend(form.iter().cloned());
        }
        let authorization = authorization_header(
            &self.creds,
            method.as_str(),
            url,
            &signed_params,
            &oauth_nonce(),
            Utc::now().timestamp(),
        )
        .ok_or_else(|| UpstreamError::Transport("Failed to sign request".to_string()))?;

        let target = if query.is_empty() {
            url.to_string()
        } else {
            format!("{url}?{}", encode_pairs(query))
        };
        debug!(method = %method, url = %url, "X API request");
        let request = self
            .http
            .request(method, &target)
            .header(AUTHORIZATION, authorization);
        let request = match body {
            Body::Empty => request,
            Body::Json(value) => request.json(&value),
            Body::Form(form) => request
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(encode_pairs(&form)),
            Body::Multipart(form) => request.multipart(form),
        };

        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;
        let parsed = if text.trim().is_empty() {
            Ok(Value::Null)
        } else {
            serde_json::from_str::<Value>(&text)
        };

        if !status.is_success() {
            let message = parsed
                .ok()
                .as_ref()
                .and_then(error_message)
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_default();
            return Err(UpstreamError::Api {
                status: status.as_u16(),
                message,
            });
        }
        parsed.map_err(|e| UpstreamError::Decode(format!("invalid JSON from X API: {e}")))
    }

    async fn get_json(&self, path: &str, query: &[(String, String)]) -> Result<Value, UpstreamError> {
        let url = self.api_url(path)?;
        self.send(Method::GET, &url, query, Body::Empty).await
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value, UpstreamError> {
        let url = self.api_url(path)?;
        self.send(Method::POST, &url, &[], Body::Json(body)).await
    }

    async fn delete(&self, path: &str) -> Result<Value, UpstreamError> {
        let url = self.api_url(path)?;
        self.send(Method::DELETE, &url, &[], Body::Empty).await
    }

    async fn lookup_user(&self, username: &str) -> Result<Option<Value>, UpstreamError> {
        let path = format!("/2/users/by/username/{}", percent_encode(username));
        let query = pairs(&[("user.fields", USER_FIELDS)]);
        match self.get_json(&path, &query).await {
            Ok(body) => Ok(body.get("data").filter(|data| data.is_object()).cloned()),
            Err(UpstreamError::Api { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn user_id_for(&self, username: &str) -> Result<String, UpstreamError> {
        self.lookup_user(username)
            .await?
            .and_then(|user| user.get("id").and_then(Value::as_str).map(str::to_string))
            .ok_or_else(|| UpstreamError::NotFound(format!("User @{username} not found")))
    }

    /// Cursor-paginated read. A page is fetched only once the items of the
    /// previous one have all been pulled.
    fn paginate<'a, T>(
        &'a self,
        path: String,
        query: Vec<(String, String)>,
        cursor_param: &'static str,
        parse: fn(&Value) -> Result<Page<T>, UpstreamError>,
    ) -> LazySequence<'a, T>
    where
        T: Send + 'a,
    {
        stream::unfold(PageState::new(), move |mut state: PageState<T>| {
            let path = path.clone();
            let mut query = query.clone();
            async move {
                loop {
                    if let Some(item) = state.buffer.pop_front() {
                        return Some((Ok(item), state));
                    }
                    if state.done {
                        return None;
                    }
                    if let Some(cursor) = &state.cursor {
                        query.retain(|(key, _)| key != cursor_param);
                        query.push((cursor_param.to_string(), cursor.clone()));
                    }
                    match self.get_json(&path, &query).await.and_then(|body| parse(&body)) {
                        Ok(page) => {
                            state.pages += 1;
                            debug!(
                                path = %path,
                                page = state.pages,
                                items = page.items.len(),
                                "fetched page"
                            );
                            state.done = page.next_cursor.is_none() || page.items.is_empty();
                            state.cursor = page.next_cursor;
                            state.buffer.extend(page.items);
                        }
                        Err(err) => {
                            state.done = true;
                            return Some((Err(err), state));
                        }
                    }
                }
            }
        })
        .boxed()
    }

    /// Paginated read below `/2/users/{id}/…`, resolving the id on first pull.
    fn user_paginated<'a, T>(
        &'a self,
        username: &'a str,
        suffix: &'static str,
        query: Vec<(String, String)>,
        parse: fn(&Value) -> Result<Page<T>, UpstreamError>,
    ) -> LazySequence<'a, T>
    where
        T: Send + 'a,
    {
        stream::once(async move { self.user_id_for(username).await })
            .map(move |resolved| match resolved {
                Ok(id) => self.paginate(
                    format!("/2/users/{id}/{suffix}"),
                    query.clone(),
                    "pagination_token",
                    parse,
                ),
                Err(err) => stream::iter(vec![Err(err)]).boxed(),
            })
            .flatten()
            .boxed()
    }

    async fn timeline(&self, count: usize) -> Result<Vec<Tweet>, UpstreamError> {
        let path = format!("/2/users/{}/timelines/reverse_chronological", self.user_id);
        let query = tweet_query(count.clamp(1, PAGE_SIZE));
        let body = self.get_json(&path, &query).await?;
        Ok(tweets_page(&body)?.items)
    }

    async fn upload_media(&self, media: &MediaAttachment) -> Result<String, UpstreamError> {
        let url = self.upload_url()?;
        let total_bytes = media.bytes.len().to_string();
        let init = self
            .send(
                Method::POST,
                &url,
                &[],
                Body::Form(pairs(&[
                    ("command", "INIT"),
                    ("total_bytes", &total_bytes),
                    ("media_type", &media.mime_type),
                    ("media_category", media.category.upload_category()),
                ])),
            )
            .await?;
        let media_id = init
            .get("media_id_string")
            .and_then(Value::as_str)
            .ok_or_else(|| UpstreamError::Decode("media upload INIT returned no media id".to_string()))?
            .to_string();

        for (index, chunk) in media.bytes.chunks(UPLOAD_CHUNK_BYTES).enumerate() {
            let form = multipart::Form::new()
                .text("command", "APPEND")
                .text("media_id", media_id.clone())
                .text("segment_index", index.to_string())
                .part("media", multipart::Part::bytes(chunk.to_vec()));
            self.send(Method::POST, &url, &[], Body::Multipart(form)).await?;
        }

        let finalized = self
            .send(
                Method::POST,
                &url,
                &[],
                Body::Form(pairs(&[("command", "FINALIZE"), ("media_id", &media_id)])),
            )
            .await?;
        self.await_processing(&url, &media_id, finalized).await?;
        debug!(media_id = %media_id, bytes = media.bytes.len(), "media uploaded");
        Ok(media_id)
    }

    /// Videos and gifs are processed asynchronously after FINALIZE.
    async fn await_processing(
        &self,
        url: &str,
        media_id: &str,
        mut body: Value,
    ) -> Result<(), UpstreamError> {
        for _ in 0..MAX_STATUS_POLLS {
            let Some(info) = body.get("processing_info") else {
                return Ok(());
            };
            match info.get("state").and_then(Value::as_str) {
                None | Some("succeeded") => return Ok(()),
                Some("failed") => {
                    let message = info
                        .pointer("/error/message")
                        .and_then(Value::as_str)
                        .unwrap_or("media processing failed");
                    return Err(UpstreamError::Rejected(message.to_string()));
                }
                Some(_) => {}
            }
            let wait = info
                .get("check_after_secs")
                .and_then(Value::as_u64)
                .unwrap_or(1)
                .clamp(1, 10);
            tokio::time::sleep(Duration::from_secs(wait)).await;
            let query = pairs(&[("command", "STATUS"), ("media_id", media_id)]);
            body = self.send(Method::GET, url, &query, Body::Empty).await?;
        }
        Err(UpstreamError::Rejected(
            "media processing did not finish in time".to_string(),
        ))
    }
}

struct PageState<T> {
    buffer: VecDeque<T>,
    cursor: Option<String>,
    done: bool,
    pages: usize,
}

impl<T> PageState<T> {
    fn new() -> Self {
        Self {
            buffer: VecDeque::new(),
            cursor: None,
            done: false,
            pages: 0,
        }
    }
}

fn tweet_query(max_results: usize) -> Vec<(String, String)> {
    vec![
        ("max_results".to_string(), max_results.to_string()),
        ("tweet.fields".to_string(), TWEET_FIELDS.to_string()),
        ("expansions".to_string(), "author_id".to_string()),
        ("user.fields".to_string(), "username,name".to_string()),
    ]
}

fn user_query() -> Vec<(String, String)> {
    pairs(&[("max_results", "100"), ("user.fields", USER_FIELDS)])
}

fn str_field(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn count_field(value: &Value, pointer: &str) -> Option<u64> {
    value.pointer(pointer).and_then(Value::as_u64)
}

fn time_field(value: &Value, pointer: &str) -> Option<DateTime<Utc>> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

fn next_token(body: &Value) -> Option<String> {
    str_field(body, "/meta/next_token").filter(|token| !token.is_empty())
}

fn tweet_from_v2(raw: &Value, authors: &HashMap<String, (Option<String>, Option<String>)>) -> Tweet {
    let user_id = str_field(raw, "/author_id");
    let (username, name) = user_id
        .as_ref()
        .and_then(|id| authors.get(id).cloned())
        .unwrap_or_default();
    let referenced = |kind: &str| {
        raw.get("referenced_tweets")
            .and_then(Value::as_array)
            .map(|refs| {
                refs.iter()
                    .any(|r| r.get("type").and_then(Value::as_str) == Some(kind))
            })
    };
    let entity_list = |key: &str, field: &str| -> Vec<String> {
        raw.pointer(&format!("/entities/{key}"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        item.get(field)
                            .or_else(|| item.get("url"))
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    })
                    .collect()
            })
            .unwrap_or_default()
    };

    Tweet {
        id: str_field(raw, "/id"),
        text: str_field(raw, "/text"),
        user_id,
        username,
        name,
        created_at: time_field(raw, "/created_at"),
        likes: count_field(raw, "/public_metrics/like_count"),
        retweets: count_field(raw, "/public_metrics/retweet_count"),
        replies: count_field(raw, "/public_metrics/reply_count"),
        views: count_field(raw, "/public_metrics/impression_count"),
        urls: entity_list("urls", "expanded_url"),
        hashtags: entity_list("hashtags", "tag"),
        is_retweet: referenced("retweeted"),
        is_reply: referenced("replied_to"),
    }
}

fn tweets_page(body: &Value) -> Result<Page<Tweet>, UpstreamError> {
    let authors: HashMap<String, (Option<String>, Option<String>)> = body
        .pointer("/includes/users")
        .and_then(Value::as_array)
        .map(|users| {
            users
                .iter()
                .filter_map(|user| {
                    let id = str_field(user, "/id")?;
                    Some((id, (str_field(user, "/username"), str_field(user, "/name"))))
                })
                .collect()
        })
        .unwrap_or_default();
    let items = match body.get("data") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(raw)) => raw.iter().map(|t| tweet_from_v2(t, &authors)).collect(),
        Some(_) => {
            return Err(UpstreamError::Decode(
                "expected a list of tweets in 'data'".to_string(),
            ));
        }
    };
    Ok(Page::new(items, next_token(body)))
}

fn profile_from_v2(raw: &Value) -> UserProfile {
    let website = str_field(raw, "/entities/url/urls/0/expanded_url").or_else(|| str_field(raw, "/url"));
    UserProfile {
        user_id: str_field(raw, "/id"),
        username: str_field(raw, "/username"),
        name: str_field(raw, "/name"),
        biography: str_field(raw, "/description"),
        location: str_field(raw, "/location"),
        website: website.filter(|url| !url.is_empty()),
        joined: time_field(raw, "/created_at"),
        tweets_count: count_field(raw, "/public_metrics/tweet_count"),
        followers_count: count_field(raw, "/public_metrics/followers_count"),
        following_count: count_field(raw, "/public_metrics/following_count"),
        likes_count: count_field(raw, "/public_metrics/like_count"),
        listed_count: count_field(raw, "/public_metrics/listed_count"),
        is_verified: raw.get("verified").and_then(Value::as_bool),
        is_private: raw.get("protected").and_then(Value::as_bool),
        avatar: str_field(raw, "/profile_image_url"),
        banner: None,
    }
}

fn profiles_page(body: &Value) -> Result<Page<UserProfile>, UpstreamError> {
    let items = match body.get("data") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(raw)) => raw.iter().map(profile_from_v2).collect(),
        Some(_) => {
            return Err(UpstreamError::Decode(
                "expected a list of users in 'data'".to_string(),
            ));
        }
    };
    Ok(Page::new(items, next_token(body)))
}

fn trend_names(body: &Value) -> Vec<String> {
    body.pointer("/0/trends")
        .and_then(Value::as_array)
        .map(|trends| {
            trends
                .iter()
                .filter_map(|trend| trend.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl UpstreamClient for XApiClient {
    fn user_tweets<'a>(&'a self, username: &'a str) -> LazySequence<'a, Tweet> {
        self.user_paginated(username, "tweets", tweet_query(PAGE_SIZE), tweets_page)
    }

    async fn profile(&self, username: &str) -> Result<Option<UserProfile>, UpstreamError> {
        Ok(self.lookup_user(username).await?.as_ref().map(profile_from_v2))
    }

    fn search<'a>(&'a self, query: &'a str, mode: SearchMode) -> LazySequence<'a, Tweet> {
        let sort_order = match mode {
            SearchMode::Latest => "recency",
            SearchMode::Top => "relevancy",
        };
        let mut params = tweet_query(PAGE_SIZE);
        params.push(("query".to_string(), query.to_string()));
        params.push(("sort_order".to_string(), sort_order.to_string()));
        self.paginate(
            "/2/tweets/search/recent".to_string(),
            params,
            "next_token",
            tweets_page,
        )
    }

    async fn like(&self, tweet_id: &str) -> Result<(), UpstreamError> {
        let path = format!("/2/users/{}/likes", self.user_id);
        self.post_json(&path, json!({ "tweet_id": tweet_id })).await?;
        Ok(())
    }

    async fn unlike(&self, tweet_id: &str) -> Result<(), UpstreamError> {
        let path = format!("/2/users/{}/likes/{}", self.user_id, percent_encode(tweet_id));
        self.delete(&path).await?;
        Ok(())
    }

    async fn retweet(&self, tweet_id: &str) -> Result<(), UpstreamError> {
        let path = format!("/2/users/{}/retweets", self.user_id);
        self.post_json(&path, json!({ "tweet_id": tweet_id })).await?;
        Ok(())
    }

    async fn unretweet(&self, tweet_id: &str) -> Result<(), UpstreamError> {
        let path = format!("/2/users/{}/retweets/{}", self.user_id, percent_encode(tweet_id));
        self.delete(&path).await?;
        Ok(())
    }

    async fn send_post(&self, draft: PostDraft) -> Result<PostResponse, UpstreamError> {
        let mut media_ids = Vec::with_capacity(draft.media.len());
        for media in &draft.media {
            media_ids.push(self.upload_media(media).await?);
        }
        if draft.hide_link_preview {
            debug!("link preview suppression is not supported by the v2 tweet endpoint");
        }

        let mut body = json!({ "text": draft.text });
        if let Some(parent) = &draft.reply_to {
            body["reply"] = json!({ "in_reply_to_tweet_id": parent });
        }
        if let Some(quoted) = &draft.quote_of {
            body["quote_tweet_id"] = json!(quoted);
        }
        if !media_ids.is_empty() {
            body["media"] = json!({ "media_ids": media_ids });
        }
        Ok(PostResponse::new(self.post_json("/2/tweets", body).await?))
    }

    async fn trends(&self) -> Result<Vec<String>, UpstreamError> {
        let query = pairs(&[("id", WORLDWIDE_WOEID)]);
        let body = self.get_json("/1.1/trends/place.json", &query).await?;
        Ok(trend_names(&body))
    }

    fn followers<'a>(&'a self, username: &'a str) -> LazySequence<'a, UserProfile> {
        self.user_paginated(username, "followers", user_query(), profiles_page)
    }

    fn following<'a>(&'a self, username: &'a str) -> LazySequence<'a, UserProfile> {
        self.user_paginated(username, "following", user_query(), profiles_page)
    }

    async fn home_timeline(&self, count: usize) -> Result<Vec<Tweet>, UpstreamError> {
        self.timeline(count).await
    }

    async fn following_timeline(&self, count: usize) -> Result<Vec<Tweet>, UpstreamError> {
        self.timeline(count).await
    }

    async fn list_tweets(&self, list_id: &str, count: usize) -> Result<Page<Tweet>, UpstreamError> {
        let path = format!("/2/lists/{}/tweets", percent_encode(list_id));
        let body = self
            .get_json(&path, &tweet_query(count.clamp(1, PAGE_SIZE)))
            .await?;
        tweets_page(&body)
    }

    async fn follow(&self, username: &str) -> Result<(), UpstreamError> {
        let target = self.user_id_for(username).await?;
        let path = format!("/2/users/{}/following", self.user_id);
        self.post_json(&path, json!({ "target_user_id": target })).await?;
        Ok(())
    }

    async fn unfollow(&self, username: &str) -> Result<(), UpstreamError> {
        let target = self.user_id_for(username).await?;
        let path = format!("/2/users/{}/following/{target}", self.user_id);
        self.delete(&path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{api_key_credentials, password_credentials};

    #[test]
    fn parses_v2_tweet_page_with_authors() {
        let body = json!({
            "data": [{
                "id": "1800",
                "text": "release day #rust",
                "author_id": "12",
                "created_at": "2024-06-01T10:00:00.000Z",
                "public_metrics": { "like_count": 5, "retweet_count": 1, "reply_count": 2, "impression_count": 90 },
                "entities": {
                    "urls": [{ "url": "https://t.co/a", "expanded_url": "https://example.com/a" }],
                    "hashtags": [{ "tag": "rust" }]
                },
                "referenced_tweets": [{ "type": "replied_to", "id": "1799" }]
            }],
            "includes": { "users": [{ "id": "12", "username": "alice", "name": "Alice" }] },
            "meta": { "next_token": "abc" }
        });

        let page = tweets_page(&body).unwrap();
        assert_eq!(page.next_cursor.as_deref(), Some("abc"));
        let tweet = &page.items[0];
        assert_eq!(tweet.username.as_deref(), Some("alice"));
        assert_eq!(tweet.likes, Some(5));
        assert_eq!(tweet.views, Some(90));
        assert_eq!(tweet.urls, vec!["https://example.com/a".to_string()]);
        assert_eq!(tweet.hashtags, vec!["rust".to_string()]);
        assert_eq!(tweet.is_reply, Some(true));
        assert_eq!(tweet.is_retweet, Some(false));
        assert_eq!(
            tweet.created_on(),
            chrono::NaiveDate::from_ymd_opt(2024, 6, 1)
        );
    }

    #[test]
    fn empty_result_page_has_no_cursor() {
        let page = tweets_page(&json!({ "meta": { "result_count": 0 } })).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.next_cursor, None);
        assert!(tweets_page(&json!({ "data": "nope" })).is_err());
    }

    #[test]
    fn parses_v2_user() {
        let raw = json!({
            "id": "12",
            "username": "alice",
            "name": "Alice",
            "description": "builder",
            "url": "https://t.co/x",
            "entities": { "url": { "urls": [{ "expanded_url": "https://alice.dev" }] } },
            "created_at": "2010-01-02T03:04:05.000Z",
            "protected": false,
            "verified": true,
            "public_metrics": { "followers_count": 10, "following_count": 4, "tweet_count": 99, "listed_count": 1, "like_count": 7 }
        });
        let profile = profile_from_v2(&raw);
        assert_eq!(profile.website.as_deref(), Some("https://alice.dev"));
        assert_eq!(profile.tweets_count, Some(99));
        assert_eq!(profile.likes_count, Some(7));
        assert_eq!(profile.is_verified, Some(true));
        assert!(profile.joined.is_some());
    }

    #[test]
    fn error_message_prefers_detail() {
        assert_eq!(
            error_message(&json!({ "title": "Forbidden", "detail": "You are not permitted" })),
            Some("You are not permitted".to_string())
        );
        assert_eq!(
            error_message(&json!({ "errors": [{ "code": 187, "message": "Status is a duplicate." }] })),
            Some("Status is a duplicate.".to_string())
        );
        assert_eq!(error_message(&json!({})), None);
    }

    #[test]
    fn trends_and_urls() {
        let body = json!([{ "trends": [{ "name": "#rust" }, { "name": "AI" }] }]);
        assert_eq!(trend_names(&body), vec!["#rust".to_string(), "AI".to_string()]);
        assert_eq!(
            join_url("https://api.twitter.com", "/2/users/me").unwrap(),
            "https://api.twitter.com/2/users/me"
        );
        assert_eq!(
            encode_pairs(&pairs(&[("query", "rust lang"), ("max_results", "10")])),
            "query=rust%20lang&max_results=10"
        );
    }

    #[tokio::test]
    async fn password_tier_is_unsupported() {
        let connector = XApiConnector::new(XApiConfig::default());
        let result = connector.login_with_password(&password_credentials()).await;
        assert!(matches!(result, Err(UpstreamError::Unsupported(_))));
    }

    fn connector_for(server: &wiremock::MockServer) -> XApiConnector {
        XApiConnector::new(XApiConfig {
            api_base_url: server.uri(),
            upload_base_url: server.uri(),
        })
    }

    #[tokio::test]
    async fn api_key_login_signs_users_me() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/2/users/me"))
            .and(wiremock::matchers::header_exists("authorization"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(
                serde_json::json!({ "data": { "id": "42", "username": "perch_bot" } }),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let result = connector_for(&server)
            .login_with_api_keys(&api_key_credentials())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn api_key_login_without_user_id_fails() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/2/users/me"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "data": {} })),
            )
            .mount(&server)
            .await;

        let result = connector_for(&server)
            .login_with_api_keys(&api_key_credentials())
            .await;
        assert!(matches!(result, Err(UpstreamError::Decode(_))));
    }

    #[tokio::test]
    async fn api_key_login_maps_rejection_to_api_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/2/users/me"))
            .respond_with(
                wiremock::ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({ "title": "Unauthorized" })),
            )
            .mount(&server)
            .await;

        let result = connector_for(&server)
            .login_with_api_keys(&api_key_credentials())
            .await;
        assert!(matches!(
            result,
            Err(UpstreamError::Api { status: 401, message }) if message == "Unauthorized"
        ));
    }
}
