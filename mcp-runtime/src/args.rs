//! Coercion of the untyped argument bag into one typed request per tool.
//! Nothing past [`ToolRequest::parse`] sees a raw `Value`.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::error::ToolError;
use crate::media::{MediaInput, parse_media_list};
use crate::thread::{MIN_THREAD_LENGTH, ThreadItem};
use crate::tools::ToolName;
use crate::upstream::SearchMode;

pub const DEFAULT_COUNT: usize = 10;
pub const MAX_COUNT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeAction {
    Like,
    Unlike,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetweetAction {
    Retweet,
    Undo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowAction {
    Follow,
    Unfollow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    Followers,
    Following,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timeline {
    Home,
    Following,
    User(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimelineKind {
    Home,
    Following,
    User,
}

const SEARCH_MODES: &[(&str, SearchMode)] = &[("latest", SearchMode::Latest), ("top", SearchMode::Top)];
const LIKE_ACTIONS: &[(&str, LikeAction)] = &[("like", LikeAction::Like), ("unlike", LikeAction::Unlike)];
const RETWEET_ACTIONS: &[(&str, RetweetAction)] =
    &[("retweet", RetweetAction::Retweet), ("undo", RetweetAction::Undo)];
const FOLLOW_ACTIONS: &[(&str, FollowAction)] =
    &[("follow", FollowAction::Follow), ("unfollow", FollowAction::Unfollow)];
const RELATIONSHIPS: &[(&str, Relationship)] = &[
    ("followers", Relationship::Followers),
    ("following", Relationship::Following),
];
const TIMELINE_KINDS: &[(&str, TimelineKind)] = &[
    ("home", TimelineKind::Home),
    ("following", TimelineKind::Following),
    ("user", TimelineKind::User),
];

#[derive(Debug, Clone, PartialEq)]
pub enum PlatformRequest {
    GetTweets {
        username: String,
        count: usize,
        date: Option<NaiveDate>,
    },
    GetProfile {
        username: String,
    },
    SearchTweets {
        query: String,
        mode: SearchMode,
        count: usize,
        date: Option<NaiveDate>,
    },
    LikeTweet {
        tweet_id: String,
        action: LikeAction,
    },
    Retweet {
        tweet_id: String,
        action: RetweetAction,
    },
    PostTweet {
        text: String,
        reply_to: Option<String>,
        quote_of: Option<String>,
        media: Vec<MediaInput>,
        hide_link_preview: bool,
    },
    GetTrends,
    GetUserRelationships {
        username: String,
        relationship: Relationship,
        count: usize,
    },
    GetTimeline {
        timeline: Timeline,
        count: usize,
    },
    GetListTweets {
        list_id: String,
        count: usize,
    },
    FollowUser {
        username: String,
        action: FollowAction,
    },
    CreateThread {
        items: Vec<ThreadItem>,
    },
}

/// A parsed tool call. Session status is answered by the dispatcher itself,
/// everything else is a request against the platform.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    SessionStatus,
    Platform(PlatformRequest),
}

impl ToolRequest {
    pub fn parse(tool: ToolName, args: &Map<String, Value>) -> Result<Self, ToolError> {
        let request = match tool {
            ToolName::GetTweets => PlatformRequest::GetTweets {
                username: required_username(args, "username")?,
                count: coerce_count(args),
                date: arg_optional_date(args, "date")?,
            },
            ToolName::GetProfile => PlatformRequest::GetProfile {
                username: required_username(args, "username")?,
            },
            ToolName::SearchTweets => PlatformRequest::SearchTweets {
                query: required_string(args, "query")?.trim().to_string(),
                mode: arg_choice(args, "mode", SEARCH_MODES)?,
                count: coerce_count(args),
                date: arg_optional_date(args, "date")?,
            },
            ToolName::LikeTweet => PlatformRequest::LikeTweet {
                tweet_id: required_string(args, "tweet_id")?.trim().to_string(),
                action: arg_choice(args, "action", LIKE_ACTIONS)?,
            },
            ToolName::Retweet => PlatformRequest::Retweet {
                tweet_id: required_string(args, "tweet_id")?.trim().to_string(),
                action: arg_choice(args, "action", RETWEET_ACTIONS)?,
            },
            ToolName::PostTweet => PlatformRequest::PostTweet {
                text: required_string(args, "text")?,
                reply_to: arg_optional_string(args, "reply_to_tweet_id")?,
                quote_of: arg_optional_string(args, "quote_tweet_id")?,
                media: parse_media_list(args.get("media"), "media")?,
                hide_link_preview: arg_bool(args, "hide_link_preview", false)?,
            },
            ToolName::GetTrends => PlatformRequest::GetTrends,
            ToolName::GetUserRelationships => PlatformRequest::GetUserRelationships {
                username: required_username(args, "username")?,
                relationship: arg_choice(args, "relationship_type", RELATIONSHIPS)?,
                count: coerce_count(args),
            },
            ToolName::GetTimeline => {
                let timeline = match arg_choice(args, "timeline_type", TIMELINE_KINDS)? {
                    TimelineKind::Home => Timeline::Home,
                    TimelineKind::Following => Timeline::Following,
                    TimelineKind::User => match arg_optional_string(args, "username")? {
                        Some(raw) => Timeline::User(normalize_username(&raw, "username")?),
                        None => {
                            return Err(ToolError::validation(
                                "username",
                                "'username' is required when timeline_type is 'user'",
                            ));
                        }
                    },
                };
                PlatformRequest::GetTimeline {
                    timeline,
                    count: coerce_count(args),
                }
            }
            ToolName::GetListTweets => PlatformRequest::GetListTweets {
                list_id: required_string(args, "list_id")?.trim().to_string(),
                count: coerce_count(args),
            },
            ToolName::FollowUser => PlatformRequest::FollowUser {
                username: required_username(args, "username")?,
                action: arg_choice(args, "action", FOLLOW_ACTIONS)?,
            },
            ToolName::CreateThread => PlatformRequest::CreateThread {
                items: thread_items(args, "tweets")?,
            },
            ToolName::GetSessionStatus => return Ok(ToolRequest::SessionStatus),
        };
        Ok(ToolRequest::Platform(request))
    }
}

/// Presence check run before typed parsing: strings must be non-blank after
/// trimming, arrays non-empty, and nothing may be null.
pub fn check_required(args: &Map<String, Value>, required: &[&str]) -> Result<(), ToolError> {
    for key in required {
        let present = match args.get(*key) {
            None | Some(Value::Null) => false,
            Some(Value::String(v)) => !v.trim().is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        };
        if !present {
            return Err(ToolError::validation(
                *key,
                format!("Missing required argument '{key}'"),
            ));
        }
    }
    Ok(())
}

/// `count` as a number or numeric string, 10 when absent or non-numeric,
/// clamped to 1..=50. Fractions are truncated.
pub fn coerce_count(args: &Map<String, Value>) -> usize {
    let parsed = match args.get("count") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(raw)) => raw.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) if n.is_finite() => {
            let truncated = n.trunc();
            if truncated < 1.0 {
                1
            } else if truncated >= MAX_COUNT as f64 {
                MAX_COUNT
            } else {
                truncated as usize
            }
        }
        _ => DEFAULT_COUNT,
    }
}

/// Trim and strip one leading `@`. Case is preserved.
pub fn normalize_username(raw: &str, field: &str) -> Result<String, ToolError> {
    let trimmed = raw.trim();
    let handle = trimmed.strip_prefix('@').unwrap_or(trimmed).trim();
    if handle.is_empty() {
        return Err(ToolError::validation(
            field,
            format!("'{field}' must contain a username"),
        ));
    }
    Ok(handle.to_string())
}

fn required_username(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    normalize_username(&required_string(args, key)?, key)
}

/// Enum argument; absent or null selects the first choice.
fn arg_choice<T: Copy>(
    args: &Map<String, Value>,
    key: &str,
    choices: &[(&str, T)],
) -> Result<T, ToolError> {
    let allowed = || {
        choices
            .iter()
            .map(|(name, _)| format!("'{name}'"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    match args.get(key) {
        None | Some(Value::Null) => choices.first().map(|(_, value)| *value).ok_or_else(|| {
            ToolError::validation(key, format!("'{key}' has no allowed values"))
        }),
        Some(Value::String(raw)) => {
            let raw = raw.trim();
            choices
                .iter()
                .find(|(name, _)| *name == raw)
                .map(|(_, value)| *value)
                .ok_or_else(|| {
                    ToolError::validation(
                        key,
                        format!("Invalid {key} '{raw}'. Allowed values: {}", allowed()),
                    )
                })
        }
        Some(_) => Err(ToolError::validation(
            key,
            format!("'{key}' must be one of {}", allowed()),
        )),
    }
}

fn arg_bool(args: &Map<String, Value>, key: &str, default: bool) -> Result<bool, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(v)) => Ok(*v),
        Some(_) => Err(ToolError::validation(key, format!("'{key}' must be a boolean"))),
    }
}

fn required_string(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    let value = args
        .get(key)
        .ok_or_else(|| ToolError::validation(key, format!("Missing required argument '{key}'")))?;
    match value {
        Value::String(v) if !v.trim().is_empty() => Ok(v.clone()),
        Value::String(_) => Err(ToolError::validation(key, format!("'{key}' must not be empty"))),
        _ => Err(ToolError::validation(key, format!("'{key}' must be a string"))),
    }
}

fn arg_optional_string(args: &Map<String, Value>, key: &str) -> Result<Option<String>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(v)) if v.trim().is_empty() => Ok(None),
        Some(Value::String(v)) => Ok(Some(v.trim().to_string())),
        Some(_) => Err(ToolError::validation(key, format!("'{key}' must be a string"))),
    }
}

fn arg_optional_date(args: &Map<String, Value>, key: &str) -> Result<Option<NaiveDate>, ToolError> {
    let Some(raw) = arg_optional_string(args, key)? else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| ToolError::validation(key, format!("'{key}' must be a date in YYYY-MM-DD format")))
}

fn thread_items(args: &Map<String, Value>, key: &str) -> Result<Vec<ThreadItem>, ToolError> {
    let items = args
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| ToolError::validation(key, format!("'{key}' must be an array of tweets")))?;
    if items.len() < MIN_THREAD_LENGTH {
        return Err(ToolError::validation(
            key,
            format!("A thread needs at least {MIN_THREAD_LENGTH} tweets"),
        ));
    }

    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let field = format!("{key}[{index}]");
        let obj = item
            .as_object()
            .ok_or_else(|| ToolError::validation(&field, format!("'{field}' must be an object")))?;
        let text = match obj.get("text") {
            Some(Value::String(text)) if !text.trim().is_empty() => text.clone(),
            _ => {
                return Err(ToolError::validation(
                    format!("{field}.text"),
                    format!("'{field}.text' is required"),
                ));
            }
        };
        let media = parse_media_list(obj.get("media"), &format!("{field}.media"))?;
        out.push(ThreadItem { text, media });
    }
    Ok(out)
}
