use tracing::{debug, info, warn};

use crate::error::ToolError;
use crate::media::{MediaInput, decode_all};
use crate::upstream::{PostDraft, UpstreamClient};

pub const MIN_THREAD_LENGTH: usize = 2;

const STEP_FAILURE_MESSAGE: &str = "Failed to post tweet";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadItem {
    pub text: String,
    pub media: Vec<MediaInput>,
}

/// Created post ids in submission order; the first is the thread root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadResult {
    pub ids: Vec<String>,
}

impl ThreadResult {
    pub fn root(&self) -> Option<&str> {
        self.ids.first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Submit `items` in order, each one replying to the post created by the
/// step before it.
///
/// Stops at the first failed step. Posts created before that step stay
/// published.
pub async fn create_thread(
    client: &dyn UpstreamClient,
    items: &[ThreadItem],
) -> Result<ThreadResult, ToolError> {
    if items.len() < MIN_THREAD_LENGTH {
        return Err(ToolError::validation(
            "tweets",
            format!("A thread needs at least {MIN_THREAD_LENGTH} tweets"),
        ));
    }

    let total = items.len();
    let mut ids: Vec<String> = Vec::with_capacity(total);
    for (index, item) in items.iter().enumerate() {
        let step = index + 1;
        let step_failed = |reason: String| {
            warn!(step, total, reason = %reason, "thread step failed");
            ToolError::ThreadStep {
                step,
                total,
                reason,
            }
        };

        let media = decode_all(&item.media, &format!("tweets[{index}].media"))
            .map_err(|err| step_failed(err.to_string()))?;
        let draft = PostDraft {
            text: item.text.clone(),
            reply_to: ids.last().cloned(),
            media,
            ..PostDraft::default()
        };

        let response = client.send_post(draft).await.map_err(|err| {
            step_failed(err.description().unwrap_or(STEP_FAILURE_MESSAGE).to_string())
        })?;
        if let Some(reason) = response.failure() {
            return Err(step_failed(reason));
        }
        let id = response
            .created_id()
            .ok_or_else(|| step_failed("response carried no tweet id".to_string()))?;
        debug!(step, total, id = %id, "thread step posted");
        ids.push(id);
    }

    let result = ThreadResult { ids };
    info!(total, root = ?result.root(), "thread created");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaCategory;
    use crate::testing::{Call, FakeClient};
    use crate::upstream::UpstreamError;

    fn item(text: &str) -> ThreadItem {
        ThreadItem {
            text: text.to_string(),
            media: Vec::new(),
        }
    }

    #[tokio::test]
    async fn each_step_replies_to_the_previous_id() {
        let client = FakeClient::new();
        let result = create_thread(&client, &[item("A"), item("B"), item("C")])
            .await
            .unwrap();

        assert_eq!(result.ids, vec!["1", "2", "3"]);
        assert_eq!(result.root(), Some("1"));
        assert_eq!(
            client.calls(),
            vec![
                Call::SendPost {
                    text: "A".to_string(),
                    reply_to: None,
                    quote_of: None,
                    media: 0
                },
                Call::SendPost {
                    text: "B".to_string(),
                    reply_to: Some("1".to_string()),
                    quote_of: None,
                    media: 0
                },
                Call::SendPost {
                    text: "C".to_string(),
                    reply_to: Some("2".to_string()),
                    quote_of: None,
                    media: 0
                },
            ]
        );
    }

    #[tokio::test]
    async fn failure_at_step_two_stops_the_thread() {
        let client = FakeClient::new().failing_post_at(2, "Status is a duplicate.");
        let err = create_thread(&client, &[item("A"), item("B"), item("C")])
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Failed to post tweet 2 of 3 in thread: Status is a duplicate."
        );
        assert_eq!(client.calls().len(), 2);
    }

    #[tokio::test]
    async fn upstream_error_without_text_gets_a_fallback_reason() {
        let client = FakeClient::new().post_error_at(
            2,
            UpstreamError::Api {
                status: 500,
                message: String::new(),
            },
        );
        let err = create_thread(&client, &[item("A"), item("B"), item("C")])
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Failed to post tweet 2 of 3 in thread: Failed to post tweet"
        );
        assert_eq!(client.calls().len(), 2);
    }

    #[tokio::test]
    async fn upstream_error_text_is_kept_as_the_reason() {
        let client = FakeClient::new()
            .post_error_at(1, UpstreamError::Transport("connection reset".to_string()));
        let err = create_thread(&client, &[item("A"), item("B")])
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            ToolError::ThreadStep { step: 1, total: 2, reason } if reason == "connection reset"
        ));
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn missing_created_id_is_a_step_failure() {
        let client = FakeClient::new().post_without_id_at(1);
        let err = create_thread(&client, &[item("A"), item("B")])
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ThreadStep { step: 1, total: 2, .. }));
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn single_item_is_rejected_before_any_call() {
        let client = FakeClient::new();
        let err = create_thread(&client, &[item("only")]).await.unwrap_err();
        assert!(matches!(err, ToolError::Validation { .. }));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn bad_media_fails_at_its_own_step() {
        let client = FakeClient::new();
        let broken = ThreadItem {
            text: "B".to_string(),
            media: vec![MediaInput {
                data: "%%%".to_string(),
                mime_type: "image/png".to_string(),
                category: MediaCategory::Image,
            }],
        };
        let err = create_thread(&client, &[item("A"), broken, item("C")])
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ThreadStep { step: 2, .. }));
        assert_eq!(client.calls().len(), 1);
    }
}
