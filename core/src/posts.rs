use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A post as the upstream client hands it over. Any field may be missing;
/// normalization into [`Post`] fills the gaps with defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: Option<String>,
    pub text: Option<String>,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub likes: Option<u64>,
    pub retweets: Option<u64>,
    pub replies: Option<u64>,
    pub views: Option<u64>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    pub is_retweet: Option<bool>,
    pub is_reply: Option<bool>,
}

impl Tweet {
    /// Calendar day (UTC) the post was created on.
    pub fn created_on(&self) -> Option<NaiveDate> {
        self.created_at.map(|ts| ts.date_naive())
    }
}

/// Normalized post returned to the calling agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub text: String,
    pub author: PostAuthor,
    /// RFC 3339 timestamp, empty when the upstream omitted it
    pub created_at: String,
    pub metrics: PostMetrics,
    pub urls: Vec<String>,
    pub hashtags: Vec<String>,
    pub is_repost: bool,
    pub is_reply: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostAuthor {
    pub id: String,
    pub username: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMetrics {
    pub likes: u64,
    pub reposts: u64,
    pub replies: u64,
    pub views: u64,
}

/// One page of a cursor-paginated upstream response.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }
}

/// Raw body returned by a create-post call.
///
/// Upstreams differ in where they put the new identifier and may answer a
/// rejected post with a success status and an `errors` array, so the body is
/// kept verbatim and inspected here.
#[derive(Debug, Clone, PartialEq)]
pub struct PostResponse {
    body: Value,
}

const CREATED_ID_POINTERS: [&str; 4] = [
    "/data/id",
    "/data/create_tweet/tweet_results/result/rest_id",
    "/id_str",
    "/id",
];

impl PostResponse {
    pub fn new(body: Value) -> Self {
        Self { body }
    }

    /// Identifier of the created post, if the body carries one.
    pub fn created_id(&self) -> Option<String> {
        CREATED_ID_POINTERS.iter().find_map(|pointer| {
            match self.body.pointer(pointer) {
                Some(Value::String(id)) if !id.trim().is_empty() => Some(id.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            }
        })
    }

    /// Failure reported inside the body. A body that carries a created id is
    /// never a failure, even when it also lists soft warnings.
    pub fn failure(&self) -> Option<String> {
        if self.created_id().is_some() {
            return None;
        }
        let first = self
            .body
            .get("errors")
            .and_then(Value::as_array)
            .and_then(|errors| errors.first())?;
        let message = ["message", "detail", "title"]
            .iter()
            .find_map(|key| first.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .unwrap_or("post was rejected");
        Some(message.to_string())
    }
}
