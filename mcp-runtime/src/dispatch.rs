use std::sync::Arc;

use chrono::{NaiveDate, SecondsFormat};
use perch_core::error::GENERIC_FAILURE_MESSAGE;
use perch_core::posts::Tweet;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::args::{
    FollowAction, LikeAction, PlatformRequest, Relationship, RetweetAction, Timeline, ToolRequest,
    check_required,
};
use crate::collector::{Collected, Source, collect, collect_filtered};
use crate::error::ToolError;
use crate::format::{format_posts, format_profile, format_profile_summary, format_trends};
use crate::media::decode_all;
use crate::session::SessionManager;
use crate::thread::create_thread;
use crate::tools::{ToolDefinition, find_tool};
use crate::upstream::{PostDraft, UpstreamClient, UpstreamError};

/// One named invocation as received from the transport.
#[derive(Debug, Clone, Default)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Serialized as pretty-printed JSON.
    Json(Value),
    /// Confirmation or "nothing found" text, sent as is.
    Message(String),
}

/// The uniform reply to every tool call: one text item, flagged on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub text: String,
    pub is_error: bool,
}

impl Envelope {
    pub fn success(output: ToolOutput) -> Self {
        let text = match output {
            ToolOutput::Json(value) => to_pretty_json(&value),
            ToolOutput::Message(message) => message,
        };
        Self {
            text,
            is_error: false,
        }
    }

    pub fn failure(message: &str) -> Self {
        let message = message.trim();
        let message = if message.is_empty() {
            GENERIC_FAILURE_MESSAGE
        } else {
            message
        };
        Self {
            text: format!("Error: {message}"),
            is_error: true,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut payload = json!({
            "content": [{ "type": "text", "text": self.text }]
        });
        if self.is_error {
            payload["isError"] = Value::Bool(true);
        }
        payload
    }
}

fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Routes tool calls to handlers over the shared session.
#[derive(Clone)]
pub struct Dispatcher {
    session: Arc<SessionManager>,
}

impl Dispatcher {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Never fails: every outcome, including unknown tools, is an envelope.
    pub async fn dispatch(&self, call: ToolCall) -> Envelope {
        let Some(tool) = find_tool(&call.name) else {
            let err = ToolError::UnknownTool(call.name);
            warn!(code = err.code(), error = %err, "tool call rejected");
            return Envelope::failure(&err.to_string());
        };

        let name = tool.name.as_str();
        debug!(tool = name, "dispatching tool call");
        match self.run(tool, &call.arguments).await {
            Ok(output) => Envelope::success(output),
            Err(err) => {
                warn!(tool = name, code = err.code(), error = %err, "tool call failed");
                Envelope::failure(&err.envelope_message(tool.failure_message))
            }
        }
    }

    async fn run(
        &self,
        tool: &ToolDefinition,
        args: &Map<String, Value>,
    ) -> Result<ToolOutput, ToolError> {
        check_required(args, tool.required)?;
        let request = ToolRequest::parse(tool.name, args)?;

        if tool.requires_session && !self.session.is_authenticated() {
            return Err(ToolError::NotReady);
        }
        match request {
            ToolRequest::SessionStatus => Ok(self.session_status()),
            ToolRequest::Platform(request) => {
                let client = self.session.current_handle().ok_or(ToolError::NotReady)?;
                handle(client.as_ref(), request).await
            }
        }
    }

    fn session_status(&self) -> ToolOutput {
        let session = self.session.session();
        ToolOutput::Json(json!({
            "state": self.session.state().as_str(),
            "loginTier": session.map(|s| s.tier().as_str()),
            "authenticatedAt": session.map(|s| {
                s.authenticated_at().to_rfc3339_opts(SecondsFormat::Secs, true)
            }),
        }))
    }
}

fn on_day(date: Option<NaiveDate>) -> impl Fn(&Tweet) -> bool {
    move |tweet| date.is_none_or(|day| tweet.created_on() == Some(day))
}

fn day_suffix(date: Option<NaiveDate>) -> String {
    date.map(|day| format!(" on {day}")).unwrap_or_default()
}

fn posts_or(collected: Collected<Tweet>, empty: impl FnOnce() -> String) -> ToolOutput {
    debug!(
        returned = collected.items.len(),
        exhausted = collected.exhausted,
        "posts collected"
    );
    if collected.is_empty() {
        ToolOutput::Message(empty())
    } else {
        ToolOutput::Json(json!(format_posts(&collected.items)))
    }
}

async fn handle(
    client: &dyn UpstreamClient,
    request: PlatformRequest,
) -> Result<ToolOutput, ToolError> {
    let output = match request {
        PlatformRequest::GetTweets {
            username,
            count,
            date,
        } => {
            let source = Source::Lazy(client.user_tweets(&username));
            let tweets = collect_filtered(source, count, on_day(date)).await?;
            posts_or(tweets, || {
                format!("No tweets found for @{username}{}", day_suffix(date))
            })
        }
        PlatformRequest::GetProfile { username } => match client.profile(&username).await? {
            Some(profile) => ToolOutput::Json(json!(format_profile(&profile))),
            None => ToolOutput::Message(format!("Profile not found for @{username}")),
        },
        PlatformRequest::SearchTweets {
            query,
            mode,
            count,
            date,
        } => {
            let source = Source::Lazy(client.search(&query, mode));
            let tweets = collect_filtered(source, count, on_day(date)).await?;
            posts_or(tweets, || {
                format!("No tweets found for query \"{query}\"{}", day_suffix(date))
            })
        }
        PlatformRequest::LikeTweet { tweet_id, action } => match action {
            LikeAction::Like => {
                client.like(&tweet_id).await?;
                ToolOutput::Message(format!("Successfully liked tweet {tweet_id}"))
            }
            LikeAction::Unlike => {
                client.unlike(&tweet_id).await?;
                ToolOutput::Message(format!("Successfully unliked tweet {tweet_id}"))
            }
        },
        PlatformRequest::Retweet { tweet_id, action } => match action {
            RetweetAction::Retweet => {
                client.retweet(&tweet_id).await?;
                ToolOutput::Message(format!("Successfully retweeted tweet {tweet_id}"))
            }
            RetweetAction::Undo => {
                client.unretweet(&tweet_id).await?;
                ToolOutput::Message(format!("Successfully undid retweet of tweet {tweet_id}"))
            }
        },
        PlatformRequest::PostTweet {
            text,
            reply_to,
            quote_of,
            media,
            hide_link_preview,
        } => {
            let draft = PostDraft {
                text,
                reply_to: reply_to.clone(),
                quote_of: quote_of.clone(),
                media: decode_all(&media, "media")?,
                hide_link_preview,
            };
            let response = client.send_post(draft).await?;
            if let Some(reason) = response.failure() {
                return Err(UpstreamError::Rejected(reason).into());
            }
            let id = response
                .created_id()
                .map(|id| format!(" (id: {id})"))
                .unwrap_or_default();
            let message = match (reply_to, quote_of) {
                (Some(parent), _) => format!("Successfully posted reply to tweet {parent}{id}"),
                (None, Some(quoted)) => format!("Successfully posted quote of tweet {quoted}{id}"),
                (None, None) => format!("Successfully posted tweet{id}"),
            };
            ToolOutput::Message(message)
        }
        PlatformRequest::GetTrends => {
            let trends = format_trends(client.trends().await?);
            if trends.is_empty() {
                ToolOutput::Message("No trends found".to_string())
            } else {
                ToolOutput::Json(json!(trends))
            }
        }
        PlatformRequest::GetUserRelationships {
            username,
            relationship,
            count,
        } => {
            let (source, label) = match relationship {
                Relationship::Followers => (client.followers(&username), "followers"),
                Relationship::Following => (client.following(&username), "followed accounts"),
            };
            let profiles = collect(Source::Lazy(source), count).await?.into_items();
            if profiles.is_empty() {
                ToolOutput::Message(format!("No {label} found for @{username}"))
            } else {
                let summaries: Vec<_> = profiles.iter().map(format_profile_summary).collect();
                ToolOutput::Json(json!(summaries))
            }
        }
        PlatformRequest::GetTimeline { timeline, count } => {
            let (source, label) = match &timeline {
                Timeline::Home => (
                    Source::from(client.home_timeline(count).await?),
                    "home timeline".to_string(),
                ),
                Timeline::Following => (
                    Source::from(client.following_timeline(count).await?),
                    "following timeline".to_string(),
                ),
                Timeline::User(username) => (
                    Source::Lazy(client.user_tweets(username)),
                    format!("timeline of @{username}"),
                ),
            };
            let tweets = collect(source, count).await?;
            posts_or(tweets, || format!("No tweets found in {label}"))
        }
        PlatformRequest::GetListTweets { list_id, count } => {
            let page = client.list_tweets(&list_id, count).await?;
            let tweets = collect(Source::from(page), count).await?;
            posts_or(tweets, || format!("No tweets found in list {list_id}"))
        }
        PlatformRequest::FollowUser { username, action } => match action {
            FollowAction::Follow => {
                client.follow(&username).await?;
                ToolOutput::Message(format!("Successfully followed @{username}"))
            }
            FollowAction::Unfollow => {
                client.unfollow(&username).await?;
                ToolOutput::Message(format!("Successfully unfollowed @{username}"))
            }
        },
        PlatformRequest::CreateThread { items } => {
            let thread = create_thread(client, &items).await?;
            ToolOutput::Message(format!(
                "Successfully created thread with {} tweets. Thread root: {}",
                thread.len(),
                thread.root().unwrap_or_default()
            ))
        }
    };
    Ok(output)
}
