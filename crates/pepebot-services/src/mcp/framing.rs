//! Stdio frame codec for MCP JSON-RPC.
//!
//! Two framings are observed in the wild:
//!
//! - **header** mode: `Content-Length: N\r\n\r\n` followed by exactly N
//!   bytes of JSON (the LSP-style framing),
//! - **line** mode: one JSON object per newline.
//!
//! Writing always follows the pinned [`FramingMode`]. Reading is
//! tolerant of either: if the first non-blank line begins with `{` it
//! is taken as a complete line-mode frame, otherwise header lines are
//! parsed until a blank line and exactly `Content-Length` bytes are
//! read.

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Which framing a stdio client writes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingMode {
    /// `Content-Length` header framing.
    Header,
    /// Newline-delimited JSON.
    Line,
}

/// Write one frame in the given mode.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    mode: FramingMode,
    payload: &str,
) -> std::io::Result<()> {
    match mode {
        FramingMode::Header => {
            let header = format!("Content-Length: {}\r\n\r\n", payload.len());
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(payload.as_bytes()).await?;
        }
        FramingMode::Line => {
            writer.write_all(payload.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
    }
    writer.flush().await
}

/// Read one frame, auto-detecting the framing.
///
/// Returns `Ok(None)` on clean EOF. Blank lines between frames are
/// skipped. Unknown header lines are ignored; a header block without
/// `Content-Length` is an error.
pub async fn read_frame<R: AsyncBufReadExt + Unpin>(
    reader: &mut R,
) -> std::io::Result<Option<String>> {
    // Find the first non-blank line.
    let first = loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            break trimmed.to_string();
        }
    };

    // Line mode: a JSON object on its own line.
    if first.starts_with('{') {
        return Ok(Some(first));
    }

    // Header mode: collect headers until the blank separator line.
    let mut content_length: Option<usize> = parse_content_length(&first);
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "eof inside frame headers",
            ));
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }
        if content_length.is_none() {
            content_length = parse_content_length(trimmed);
        }
    }

    let length = content_length.ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "frame headers missing Content-Length",
        )
    })?;

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    String::from_utf8(body)
        .map(Some)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

fn parse_content_length(line: &str) -> Option<usize> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    value.trim().parse().ok()
}
