//! DAP wire transport — Content-Length framed JSON over async streams.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::DapError;

/// Write one DAP message (header plus JSON body) to the stream.
pub async fn write_message<W>(writer: &mut W, value: &serde_json::Value) -> Result<(), DapError>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value).map_err(|e| DapError::Transport(e.to_string()))?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer
        .write_all(header.as_bytes())
        .await
        .map_err(|e| DapError::Transport(e.to_string()))?;
    writer
        .write_all(&body)
        .await
        .map_err(|e| DapError::Transport(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| DapError::Transport(e.to_string()))?;
    Ok(())
}

/// Read one DAP message from the stream.
///
/// Returns `Ok(None)` on clean end-of-stream (adapter closed the pipe
/// between messages). A stream that ends mid-message is a transport error.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<serde_json::Value>, DapError>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut first_line = true;

    loop {
        let mut line = String::new();
        let n = reader
            .read_line(&mut line)
            .await
            .map_err(|e| DapError::Transport(e.to_string()))?;
        if n == 0 {
            if first_line {
                return Ok(None);
            }
            return Err(DapError::Transport("stream ended inside header".into()));
        }
        first_line = false;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }
        if let Some(value) = trimmed.strip_prefix("Content-Length:") {
            let value = value.trim();
            content_length = Some(value.parse::<usize>().map_err(|e| {
                DapError::Transport(format!("invalid Content-Length value '{value}': {e}"))
            })?);
        }
        // Other header fields are permitted by the protocol and ignored.
    }

    let length = content_length
        .ok_or_else(|| DapError::Transport("missing Content-Length header".into()))?;

    let mut body = vec![0u8; length];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| DapError::Transport(format!("short body read: {e}")))?;

    serde_json::from_slice(&body)
        .map_err(|e| DapError::InvalidResponse(format!("JSON parse error: {e}")))
}
