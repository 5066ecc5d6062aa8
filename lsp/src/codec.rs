//! JSON-RPC framing codec.
//!
//! The analysis server frames every message as
//! `Content-Length: N\r\n\r\n{json}`, whether it is reached over a child
//! process pipe or a TCP socket. [`MessageReader`] and [`MessageWriter`]
//! are therefore generic over any async byte stream.

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Upper bound on a single message body. Scope dumps of large workspaces
/// can run to megabytes; anything beyond this is a protocol fault.
const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// Reads framed JSON-RPC messages from an async byte stream.
pub struct MessageReader<R> {
    input: BufReader<R>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: BufReader::new(input),
        }
    }

    /// Read the next message.
    ///
    /// `Ok(None)` means the peer closed the stream between messages (clean
    /// shutdown). EOF inside a header block or a body is an error, as are
    /// missing or malformed `Content-Length` headers and oversized bodies.
    pub async fn read_message(&mut self) -> Result<Option<serde_json::Value>> {
        let Some(body_len) = self.read_header_block().await? else {
            return Ok(None);
        };

        if body_len > MAX_MESSAGE_BYTES {
            bail!("Content-Length {body_len} exceeds maximum {MAX_MESSAGE_BYTES}");
        }

        let mut body = vec![0u8; body_len];
        self.input
            .read_exact(&mut body)
            .await
            .context("reading message body")?;

        let value = serde_json::from_slice(&body).context("parsing JSON-RPC message")?;
        Ok(Some(value))
    }

    /// Consume headers up to the blank separator line and return the
    /// announced body length, or `None` on EOF before any header byte.
    async fn read_header_block(&mut self) -> Result<Option<usize>> {
        let mut body_len: Option<usize> = None;
        let mut line = String::new();
        let mut in_block = false;

        loop {
            line.clear();
            let n = self
                .input
                .read_line(&mut line)
                .await
                .context("reading header line")?;

            if n == 0 {
                // EOF between messages is a clean shutdown; EOF after a
                // header line has started a block is a truncated peer.
                if in_block {
                    bail!("unexpected EOF inside message headers");
                }
                return Ok(None);
            }
            in_block = true;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }

            // The protocol writes "Content-Length"; be liberal about case.
            if let Some((name, value)) = trimmed.split_once(':')
                && name.trim().eq_ignore_ascii_case("Content-Length")
            {
                body_len = Some(
                    value
                        .trim()
                        .parse()
                        .context("invalid Content-Length value")?,
                );
            }
            // Other headers (Content-Type) carry no information we need.
        }

        match body_len {
            Some(len) => Ok(Some(len)),
            None => bail!("missing Content-Length header"),
        }
    }
}

/// Writes framed JSON-RPC messages to an async byte stream.
pub struct MessageWriter<W> {
    output: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    /// Serialize `msg` and write it with its `Content-Length` header.
    /// The header counts bytes, not characters.
    pub async fn write_message(&mut self, msg: &serde_json::Value) -> Result<()> {
        let body = serde_json::to_vec(msg).context("serializing JSON-RPC message")?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());

        self.output
            .write_all(header.as_bytes())
            .await
            .context("writing message header")?;
        self.output
            .write_all(&body)
            .await
            .context("writing message body")?;
        self.output.flush().await.context("flushing message")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_then_reads_back() {
        let msg = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "pascal/dumpScope",
            "params": { "textDocument": { "uri": "file:///unit1.pas" } }
        });

        let mut buf = Vec::new();
        MessageWriter::new(&mut buf).write_message(&msg).await.unwrap();

        let mut reader = MessageReader::new(buf.as_slice());
        assert_eq!(reader.read_message().await.unwrap().unwrap(), msg);
    }

    #[tokio::test]
    async fn reads_consecutive_messages() {
        let first = serde_json::json!({"jsonrpc": "2.0", "id": 1});
        let second = serde_json::json!({"jsonrpc": "2.0", "id": 2});

        let mut buf = Vec::new();
        let mut writer = MessageWriter::new(&mut buf);
        writer.write_message(&first).await.unwrap();
        writer.write_message(&second).await.unwrap();

        let mut reader = MessageReader::new(buf.as_slice());
        assert_eq!(reader.read_message().await.unwrap().unwrap(), first);
        assert_eq!(reader.read_message().await.unwrap().unwrap(), second);
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clean_eof_is_none() {
        let mut reader = MessageReader::new(b"".as_slice());
        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eof_inside_headers_is_an_error() {
        let mut reader = MessageReader::new(b"Content-Length: 10\r\n".as_slice());
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn missing_content_length_is_an_error() {
        let frame = b"Content-Type: application/vscode-jsonrpc\r\n\r\n{}";
        let mut reader = MessageReader::new(frame.as_slice());
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn non_numeric_content_length_is_an_error() {
        let frame = b"Content-Length: many\r\n\r\n";
        let mut reader = MessageReader::new(frame.as_slice());
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn header_name_is_case_insensitive() {
        let body = r#"{"jsonrpc":"2.0","id":7}"#;
        let frame = format!("content-length: {}\r\n\r\n{body}", body.len());
        let mut reader = MessageReader::new(frame.as_bytes());
        assert_eq!(reader.read_message().await.unwrap().unwrap()["id"], 7);
    }

    #[tokio::test]
    async fn extra_headers_are_ignored() {
        let body = r#"{"jsonrpc":"2.0","id":7}"#;
        let frame = format!(
            "Content-Type: application/vscode-jsonrpc; charset=utf-8\r\nContent-Length: {}\r\n\r\n{body}",
            body.len(),
        );
        let mut reader = MessageReader::new(frame.as_bytes());
        assert_eq!(reader.read_message().await.unwrap().unwrap()["id"], 7);
    }

    #[tokio::test]
    async fn truncated_body_is_an_error() {
        let frame = b"Content-Length: 64\r\n\r\n{\"jsonrpc\"";
        let mut reader = MessageReader::new(frame.as_slice());
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_before_reading() {
        let frame = format!("Content-Length: {}\r\n\r\n", MAX_MESSAGE_BYTES + 1);
        let mut reader = MessageReader::new(frame.as_bytes());
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn body_with_garbage_json_is_an_error() {
        let body = b"unit Foo; interface implementation end.";
        let mut frame = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
        frame.extend_from_slice(body);
        let mut reader = MessageReader::new(frame.as_slice());
        assert!(reader.read_message().await.is_err());
    }

    #[tokio::test]
    async fn content_length_counts_bytes_not_chars() {
        // "ß" is two bytes in UTF-8.
        let msg = serde_json::json!({"unit": "Straße"});
        let mut buf = Vec::new();
        MessageWriter::new(&mut buf).write_message(&msg).await.unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        let body = serde_json::to_vec(&msg).unwrap();
        assert!(text.starts_with(&format!("Content-Length: {}\r\n\r\n", body.len())));

        let mut reader = MessageReader::new(buf.as_slice());
        assert_eq!(reader.read_message().await.unwrap().unwrap()["unit"], "Straße");
    }
}
