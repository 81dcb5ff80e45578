//! Header-delimited framing for the SLCore JSON-RPC channel.
//!
//! Every message is `Content-Length: N\r\n\r\n{json}` over the engine's
//! stdin/stdout. [`FrameReader`] yields raw message bodies and leaves JSON
//! parsing to the transport, so a body that is not valid JSON is a protocol
//! fault that can be answered, not a broken stream.

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Maximum frame size (64 MiB). Rule descriptions and file listings can be large.
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

const CONTENT_LENGTH: &str = "Content-Length";

/// Parse one header line, returning the length if it is a `Content-Length` header.
///
/// Header names are matched case-insensitively; other headers (e.g. `Content-Type`)
/// yield `Ok(None)`.
fn parse_content_length(line: &str) -> Result<Option<usize>> {
    let Some((key, value)) = line.split_once(':') else {
        bail!("malformed header line: {line:?}");
    };
    if !key.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
        return Ok(None);
    }
    let len = value
        .trim()
        .parse()
        .with_context(|| format!("invalid {CONTENT_LENGTH} value: {:?}", value.trim()))?;
    Ok(Some(len))
}

/// Reads framed message bodies from an async reader.
pub struct FrameReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read the next message body.
    ///
    /// Returns `Ok(None)` on a clean end-of-stream (EOF before any header byte).
    /// Returns `Err` on malformed headers, oversized frames, or EOF mid-frame;
    /// none of those can be resynchronised, so callers treat them as fatal.
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(content_length) = self.read_headers().await? else {
            return Ok(None);
        };

        if content_length > MAX_FRAME_BYTES {
            bail!("{CONTENT_LENGTH} {content_length} exceeds maximum {MAX_FRAME_BYTES}");
        }

        let mut body = vec![0u8; content_length];
        self.reader
            .read_exact(&mut body)
            .await
            .context("reading frame body")?;
        Ok(Some(body))
    }

    async fn read_headers(&mut self) -> Result<Option<usize>> {
        let mut content_length = None;
        let mut line = String::new();
        let mut started = false;

        loop {
            line.clear();
            let bytes_read = self
                .reader
                .read_line(&mut line)
                .await
                .context("reading header line")?;

            if bytes_read == 0 {
                if started {
                    bail!("unexpected EOF while reading headers");
                }
                return Ok(None);
            }
            started = true;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }
            if let Some(len) = parse_content_length(trimmed)? {
                content_length = Some(len);
            }
        }

        match content_length {
            Some(len) => Ok(Some(len)),
            None => bail!("missing {CONTENT_LENGTH} header"),
        }
    }
}

/// Writes framed JSON messages to an async writer.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Serialize `msg` and write it with its `Content-Length` header, then flush.
    pub async fn write_frame(&mut self, msg: &serde_json::Value) -> Result<()> {
        let body = serde_json::to_vec(msg).context("serializing JSON-RPC message")?;
        let header = format!("{CONTENT_LENGTH}: {}\r\n\r\n", body.len());

        self.writer
            .write_all(header.as_bytes())
            .await
            .context("writing frame header")?;
        self.writer
            .write_all(&body)
            .await
            .context("writing frame body")?;
        self.writer.flush().await.context("flushing frame")?;
        Ok(())
    }

    /// Shut down the underlying writer, closing the engine's stdin.
    pub async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await.context("closing writer")
    }
}
