use std::fmt;

use base64::Engine;
use serde_json::Value;
use thiserror::Error;

use crate::error::ToolError;

pub const MAX_IMAGES_PER_POST: usize = 4;
const IMAGE_MAX_BYTES: usize = 5 * 1024 * 1024;
const GIF_MAX_BYTES: usize = 15 * 1024 * 1024;
const VIDEO_MAX_BYTES: usize = 512 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCategory {
    Image,
    Gif,
    Video,
}

impl MediaCategory {
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        match mime_type {
            "image/jpeg" | "image/png" | "image/webp" => Some(MediaCategory::Image),
            "image/gif" => Some(MediaCategory::Gif),
            "video/mp4" | "video/quicktime" => Some(MediaCategory::Video),
            _ => None,
        }
    }

    pub fn max_bytes(self) -> usize {
        match self {
            MediaCategory::Image => IMAGE_MAX_BYTES,
            MediaCategory::Gif => GIF_MAX_BYTES,
            MediaCategory::Video => VIDEO_MAX_BYTES,
        }
    }

    /// Category name the upload endpoint expects.
    pub fn upload_category(self) -> &'static str {
        match self {
            MediaCategory::Image => "tweet_image",
            MediaCategory::Gif => "tweet_gif",
            MediaCategory::Video => "tweet_video",
        }
    }

    fn label(self) -> &'static str {
        match self {
            MediaCategory::Image => "image",
            MediaCategory::Gif => "gif",
            MediaCategory::Video => "video",
        }
    }
}

/// Media argument as received: still base64, structure already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInput {
    pub data: String,
    pub mime_type: String,
    pub category: MediaCategory,
}

/// Decoded media bytes for one submission. Dropped once the call returns.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaAttachment {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub category: MediaCategory,
}

impl fmt::Debug for MediaAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaAttachment")
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .field("category", &self.category)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("media data is not valid base64")]
    InvalidBase64,
    #[error("media data is empty")]
    Empty,
    #[error("{category} is {size} bytes, limit is {limit} bytes")]
    TooLarge {
        category: &'static str,
        size: usize,
        limit: usize,
    },
}

impl MediaInput {
    /// Size the payload decodes to, read off the encoded length.
    fn decoded_size(&self) -> usize {
        self.data.trim().trim_end_matches('=').len() * 3 / 4
    }

    pub fn decode(&self) -> Result<MediaAttachment, MediaError> {
        let limit = self.category.max_bytes();
        let too_large = |size| MediaError::TooLarge {
            category: self.category.label(),
            size,
            limit,
        };
        let expected = self.decoded_size();
        if expected > limit {
            return Err(too_large(expected));
        }

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(self.data.trim())
            .map_err(|_| MediaError::InvalidBase64)?;
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        if bytes.len() > limit {
            return Err(too_large(bytes.len()));
        }
        Ok(MediaAttachment {
            bytes,
            mime_type: self.mime_type.clone(),
            category: self.category,
        })
    }
}

/// Decode every attachment of one post, naming the failing item.
pub fn decode_all(inputs: &[MediaInput], field: &str) -> Result<Vec<MediaAttachment>, ToolError> {
    inputs
        .iter()
        .enumerate()
        .map(|(index, input)| {
            input.decode().map_err(|err| {
                let item = format!("{field}[{index}]");
                ToolError::validation(item.clone(), format!("{item}: {err}"))
            })
        })
        .collect()
}

/// Parse and structurally validate a `media` argument array.
pub fn parse_media_list(value: Option<&Value>, field: &str) -> Result<Vec<MediaInput>, ToolError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    if value.is_null() {
        return Ok(Vec::new());
    }
    let items = value.as_array().ok_or_else(|| {
        ToolError::validation(field, format!("'{field}' must be an array of media objects"))
    })?;

    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        out.push(parse_media_item(item, &format!("{field}[{index}]"))?);
    }
    validate_media_mix(&out, field)?;
    Ok(out)
}

fn parse_media_item(item: &Value, field: &str) -> Result<MediaInput, ToolError> {
    let obj = item
        .as_object()
        .ok_or_else(|| ToolError::validation(field, format!("'{field}' must be an object")))?;

    let raw_data = obj
        .get("data")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|data| !data.is_empty())
        .ok_or_else(|| {
            ToolError::validation(
                format!("{field}.data"),
                format!("'{field}.data' must be a non-empty base64 string"),
            )
        })?;

    // Accept `data:<mime>;base64,<payload>` and take the mime from it when
    // media_type is absent.
    let (data, url_mime) = match raw_data.strip_prefix("data:") {
        Some(rest) => match rest.split_once(";base64,") {
            Some((mime, payload)) => (payload.to_string(), Some(mime.to_string())),
            None => {
                return Err(ToolError::validation(
                    format!("{field}.data"),
                    format!("'{field}.data' data URL must be base64 encoded"),
                ));
            }
        },
        None => (raw_data.to_string(), None),
    };

    let mime_type = obj
        .get("media_type")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or(url_mime)
        .map(|mime| mime.trim().to_ascii_lowercase())
        .filter(|mime| !mime.is_empty())
        .ok_or_else(|| {
            ToolError::validation(
                format!("{field}.media_type"),
                format!("'{field}.media_type' is required"),
            )
        })?;

    let category = MediaCategory::from_mime(&mime_type).ok_or_else(|| {
        ToolError::validation(
            format!("{field}.media_type"),
            format!(
                "Unsupported media type '{mime_type}'. Use image/jpeg, image/png, image/webp, image/gif, video/mp4 or video/quicktime"
            ),
        )
    })?;

    Ok(MediaInput {
        data,
        mime_type,
        category,
    })
}

fn validate_media_mix(items: &[MediaInput], field: &str) -> Result<(), ToolError> {
    let images = items
        .iter()
        .filter(|item| item.category == MediaCategory::Image)
        .count();
    let animated = items.len() - images;

    if animated > 0 && items.len() > 1 {
        return Err(ToolError::validation(
            field,
            "A gif or video must be the only attachment of a tweet",
        ));
    }
    if images > MAX_IMAGES_PER_POST {
        return Err(ToolError::validation(
            field,
            format!("At most {MAX_IMAGES_PER_POST} images can be attached to a tweet"),
        ));
    }
    Ok(())
}
