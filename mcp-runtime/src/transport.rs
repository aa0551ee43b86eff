//! MCP message framing over a byte stream.
//!
//! Clients either send `Content-Length` framed messages (LSP style) or one
//! JSON document per line. Both are accepted on the same stream, and every
//! reply is written back in the framing of the message it answers.

use std::io;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    ContentLength,
    Newline,
}

/// One decoded message. An undecodable body is kept as `Err` so the server
/// can answer it with a parse error and keep reading.
#[derive(Debug)]
pub struct Frame {
    pub framing: Framing,
    pub payload: Result<Value, String>,
}

impl Frame {
    fn parse(framing: Framing, bytes: &[u8]) -> Self {
        let payload =
            serde_json::from_slice(bytes).map_err(|e| format!("Invalid JSON payload: {e}"));
        Self { framing, payload }
    }
}

/// Read the next frame. `Ok(None)` on a clean end of input.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut in_headers = false;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if !in_headers {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }

        let trimmed = line.trim();
        if !in_headers {
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('{') || trimmed.starts_with('[') || !trimmed.contains(':') {
                return Ok(Some(Frame::parse(Framing::Newline, trimmed.as_bytes())));
            }
            in_headers = true;
        }

        if trimmed.is_empty() {
            break;
        }
        if let Some((name, raw_len)) = trimmed.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                let parsed = raw_len.trim().parse::<usize>().map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidData, "Invalid Content-Length header")
                })?;
                content_length = Some(parsed);
            }
        }
    }

    let content_length = content_length.ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "Missing Content-Length header")
    })?;
    let mut payload = vec![0_u8; content_length];
    reader.read_exact(&mut payload).await?;
    Ok(Some(Frame::parse(Framing::ContentLength, &payload)))
}

pub async fn write_frame<W>(writer: &mut W, framing: Framing, value: &Value) -> Result<(), io::Error>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to serialize JSON: {e}"),
        )
    })?;
    match framing {
        Framing::ContentLength => {
            let header = format!(
                "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
                body.len()
            );
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
        Framing::Newline => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
    }
    writer.flush().await
}
