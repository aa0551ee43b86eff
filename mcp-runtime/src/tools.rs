use std::sync::LazyLock;

use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    GetTweets,
    GetProfile,
    SearchTweets,
    LikeTweet,
    Retweet,
    PostTweet,
    GetTrends,
    GetUserRelationships,
    GetTimeline,
    GetListTweets,
    FollowUser,
    CreateThread,
    GetSessionStatus,
}

impl ToolName {
    pub const ALL: [ToolName; 13] = [
        ToolName::GetTweets,
        ToolName::GetProfile,
        ToolName::SearchTweets,
        ToolName::LikeTweet,
        ToolName::Retweet,
        ToolName::PostTweet,
        ToolName::GetTrends,
        ToolName::GetUserRelationships,
        ToolName::GetTimeline,
        ToolName::GetListTweets,
        ToolName::FollowUser,
        ToolName::CreateThread,
        ToolName::GetSessionStatus,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::GetTweets => "get_tweets",
            ToolName::GetProfile => "get_profile",
            ToolName::SearchTweets => "search_tweets",
            ToolName::LikeTweet => "like_tweet",
            ToolName::Retweet => "retweet",
            ToolName::PostTweet => "post_tweet",
            ToolName::GetTrends => "get_trends",
            ToolName::GetUserRelationships => "get_user_relationships",
            ToolName::GetTimeline => "get_timeline",
            ToolName::GetListTweets => "get_list_tweets",
            ToolName::FollowUser => "follow_user",
            ToolName::CreateThread => "create_thread",
            ToolName::GetSessionStatus => "get_session_status",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }
}

/// Static metadata for one tool. Handlers live in `dispatch`.
#[derive(Debug)]
pub struct ToolDefinition {
    pub name: ToolName,
    pub description: &'static str,
    /// Checked present and non-empty before anything else runs.
    pub required: &'static [&'static str],
    pub requires_session: bool,
    /// Envelope message for upstream errors that carry no description.
    pub failure_message: &'static str,
    pub input_schema: Value,
}

static TOOLS: LazyLock<Vec<ToolDefinition>> = LazyLock::new(tool_definitions);

pub fn tools() -> &'static [ToolDefinition] {
    &TOOLS
}

pub fn find_tool(name: &str) -> Option<&'static ToolDefinition> {
    let name = ToolName::parse(name)?;
    TOOLS.iter().find(|tool| tool.name == name)
}

fn count_schema() -> Value {
    json!({
        "type": "number",
        "description": "Number of items to return (default 10, max 50)",
        "minimum": 1,
        "maximum": 50,
        "default": 10
    })
}

fn media_schema() -> Value {
    json!({
        "type": "array",
        "description": "Up to 4 images, or a single gif or video",
        "items": {
            "type": "object",
            "properties": {
                "data": { "type": "string", "description": "Base64 encoded file contents" },
                "media_type": {
                    "type": "string",
                    "enum": ["image/jpeg", "image/png", "image/webp", "image/gif", "video/mp4", "video/quicktime"]
                }
            },
            "required": ["data", "media_type"]
        }
    })
}

fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: ToolName::GetTweets,
            description: "Fetch recent tweets from a user, optionally only those posted on one day.",
            required: &["username"],
            requires_session: true,
            failure_message: "Failed to fetch tweets",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "username": { "type": "string", "description": "Handle, with or without @" },
                    "count": count_schema(),
                    "date": { "type": "string", "description": "Only tweets from this day (YYYY-MM-DD, UTC)" }
                },
                "required": ["username"]
            }),
        },
        ToolDefinition {
            name: ToolName::GetProfile,
            description: "Get a user's profile information.",
            required: &["username"],
            requires_session: true,
            failure_message: "Failed to fetch profile",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "username": { "type": "string", "description": "Handle, with or without @" }
                },
                "required": ["username"]
            }),
        },
        ToolDefinition {
            name: ToolName::SearchTweets,
            description: "Search for tweets by keyword, hashtag or search operators.",
            required: &["query"],
            requires_session: true,
            failure_message: "Failed to search tweets",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "mode": { "type": "string", "enum": ["latest", "top"], "default": "latest" },
                    "count": count_schema(),
                    "date": { "type": "string", "description": "Only tweets from this day (YYYY-MM-DD, UTC)" }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: ToolName::LikeTweet,
            description: "Like or unlike a tweet.",
            required: &["tweet_id"],
            requires_session: true,
            failure_message: "Failed to update like",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "tweet_id": { "type": "string" },
                    "action": { "type": "string", "enum": ["like", "unlike"], "default": "like" }
                },
                "required": ["tweet_id"]
            }),
        },
        ToolDefinition {
            name: ToolName::Retweet,
            description: "Retweet a tweet or undo a retweet.",
            required: &["tweet_id"],
            requires_session: true,
            failure_message: "Failed to update retweet",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "tweet_id": { "type": "string" },
                    "action": { "type": "string", "enum": ["retweet", "undo"], "default": "retweet" }
                },
                "required": ["tweet_id"]
            }),
        },
        ToolDefinition {
            name: ToolName::PostTweet,
            description: "Post a tweet, optionally as a reply or quote, with media attachments.",
            required: &["text"],
            requires_session: true,
            failure_message: "Failed to post tweet",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" },
                    "reply_to_tweet_id": { "type": "string" },
                    "quote_tweet_id": { "type": "string" },
                    "media": media_schema(),
                    "hide_link_preview": { "type": "boolean", "default": false }
                },
                "required": ["text"]
            }),
        },
        ToolDefinition {
            name: ToolName::GetTrends,
            description: "Get current trending topics.",
            required: &[],
            requires_session: true,
            failure_message: "Failed to fetch trends",
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolDefinition {
            name: ToolName::GetUserRelationships,
            description: "List a user's followers or the accounts they follow.",
            required: &["username", "relationship_type"],
            requires_session: true,
            failure_message: "Failed to fetch relationships",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "username": { "type": "string" },
                    "relationship_type": { "type": "string", "enum": ["followers", "following"] },
                    "count": count_schema()
                },
                "required": ["username", "relationship_type"]
            }),
        },
        ToolDefinition {
            name: ToolName::GetTimeline,
            description: "Get the home timeline, the following timeline, or a user's timeline.",
            required: &["timeline_type"],
            requires_session: true,
            failure_message: "Failed to fetch timeline",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "timeline_type": { "type": "string", "enum": ["home", "following", "user"] },
                    "username": { "type": "string", "description": "Required when timeline_type is user" },
                    "count": count_schema()
                },
                "required": ["timeline_type"]
            }),
        },
        ToolDefinition {
            name: ToolName::GetListTweets,
            description: "Get tweets from a list.",
            required: &["list_id"],
            requires_session: true,
            failure_message: "Failed to fetch list tweets",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "list_id": { "type": "string" },
                    "count": count_schema()
                },
                "required": ["list_id"]
            }),
        },
        ToolDefinition {
            name: ToolName::FollowUser,
            description: "Follow or unfollow a user.",
            required: &["username"],
            requires_session: true,
            failure_message: "Failed to update follow",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "username": { "type": "string" },
                    "action": { "type": "string", "enum": ["follow", "unfollow"], "default": "follow" }
                },
                "required": ["username"]
            }),
        },
        ToolDefinition {
            name: ToolName::CreateThread,
            description: "Post a thread: each tweet replies to the previous one.",
            required: &["tweets"],
            requires_session: true,
            failure_message: "Failed to create thread",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "tweets": {
                        "type": "array",
                        "minItems": 2,
                        "items": {
                            "type": "object",
                            "properties": {
                                "text": { "type": "string" },
                                "media": media_schema()
                            },
                            "required": ["text"]
                        }
                    }
                },
                "required": ["tweets"]
            }),
        },
        ToolDefinition {
            name: ToolName::GetSessionStatus,
            description: "Report the state of the upstream session.",
            required: &[],
            requires_session: false,
            failure_message: "Failed to read session status",
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
    ]
}
