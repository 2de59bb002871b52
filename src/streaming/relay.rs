//! Upstream SSE → client SSE relay
//!
//! The upstream body is consumed line by line. Every `data: ` line is written
//! to the client as its own frame the moment it is complete; everything else
//! (comments, `event:` lines, blank separators) is dropped. Failures never
//! escape the stream: they become one terminal error event.

use crate::backends::UpstreamClient;
use crate::models::chat::UpstreamPayload;
use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use serde::Serialize;
use std::convert::Infallible;
use std::fmt::Display;
use std::io;
use std::time::Duration;

pub const DATA_PREFIX: &str = "data: ";

/// Longest upstream line held while waiting for its terminator.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Synthetic terminal event sent when the upstream fails mid-stream.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: &'static str,
    pub code: &'static str,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                error_type: "proxy_error",
                code: "nim_api_error",
            },
        }
    }

    /// `data: {"error": {"message": ..., "type": ..., "code": ...}}` followed by
    /// a blank line, with a space after every `,` and `:` separator.
    pub fn to_sse_frame(&self) -> Bytes {
        let mut frame = DATA_PREFIX.as_bytes().to_vec();
        let mut serializer = serde_json::Serializer::with_formatter(&mut frame, SpacedFormatter);
        if let Err(e) = self.serialize(&mut serializer) {
            tracing::error!("Failed to serialize error event: {}", e);
        }
        frame.extend_from_slice(b"\n\n");
        Bytes::from(frame)
    }
}

/// Single-line JSON with `", "` and `": "` separators.
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

/// Open the upstream stream for `payload` and relay it.
///
/// The connection is opened on first poll and lives exactly as long as the
/// returned stream; dropping it (client gone) drops the upstream response.
pub fn relay(
    client: UpstreamClient,
    payload: UpstreamPayload,
    idle_timeout: Option<Duration>,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send {
    async_stream::stream! {
        let response = match client.open_stream(&payload).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Failed to open upstream stream: {}", e);
                yield Ok(ErrorEnvelope::new(e.to_string()).to_sse_frame());
                return;
            }
        };

        let frames = relay_frames(response.bytes_stream(), idle_timeout);
        tokio::pin!(frames);

        while let Some(frame) = frames.next().await {
            yield frame;
        }

        tracing::debug!("Upstream stream finished");
    }
}

/// Relay an already-open upstream body.
pub fn relay_frames<S, E>(
    body: S,
    idle_timeout: Option<Duration>,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    async_stream::stream! {
        let mut lines = LineBuffer::default();

        tokio::pin!(body);

        loop {
            let next = match idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, body.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        tracing::error!("Upstream stream idle for {}s, giving up", limit.as_secs_f32());
                        let message = format!("upstream sent no data for {}s", limit.as_secs_f32());
                        yield Ok(ErrorEnvelope::new(message).to_sse_frame());
                        return;
                    }
                },
                None => body.next().await,
            };

            match next {
                Some(Ok(chunk)) => {
                    for line in lines.push(&chunk) {
                        if let Some(frame) = sse_frame(&line) {
                            yield Ok(frame);
                        }
                    }

                    if lines.pending_len() > MAX_LINE_BYTES {
                        tracing::error!("Upstream line exceeds {} bytes, giving up", MAX_LINE_BYTES);
                        let message = format!("upstream line exceeds {} bytes", MAX_LINE_BYTES);
                        yield Ok(ErrorEnvelope::new(message).to_sse_frame());
                        return;
                    }
                }
                Some(Err(e)) => {
                    tracing::error!("Stream error: {}", e);
                    yield Ok(ErrorEnvelope::new(e.to_string()).to_sse_frame());
                    return;
                }
                None => break,
            }
        }

        if let Some(line) = lines.finish() {
            if let Some(frame) = sse_frame(&line) {
                yield Ok(frame);
            }
        }
    }
}

fn sse_frame(line: &str) -> Option<Bytes> {
    line.starts_with(DATA_PREFIX)
        .then(|| Bytes::from(format!("{}\n\n", line)))
}

/// Splits a byte stream into lines. Bytes are kept until a full line is seen,
/// so a multi-byte character split across chunks decodes correctly.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        // `pending` never holds a newline between calls, so only the new bytes are scanned.
        let mut scan_from = self.pending.len();
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut line_start = 0;
        while let Some(offset) = self.pending[scan_from..].iter().position(|b| *b == b'\n') {
            let end = scan_from + offset;
            lines.push(decode_line(&self.pending[line_start..end]));
            line_start = end + 1;
            scan_from = line_start;
        }
        self.pending.drain(..line_start);
        lines
    }

    fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whatever is left once the upstream closes, if anything.
    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(decode_line(&rest))
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::io;

    fn chunks(parts: &[&str]) -> Vec<Result<Bytes, io::Error>> {
        parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
            .collect()
    }

    async fn collect_frames(
        body: impl Stream<Item = Result<Bytes, io::Error>> + Send + 'static,
        idle_timeout: Option<Duration>,
    ) -> Vec<String> {
        relay_frames(body, idle_timeout)
            .map(|frame| match frame {
                Ok(bytes) => String::from_utf8(bytes.to_vec()).unwrap(),
                Err(never) => match never {},
            })
            .collect()
            .await
    }

    fn error_body(frame: &str) -> serde_json::Value {
        let data = frame
            .strip_prefix(DATA_PREFIX)
            .and_then(|f| f.strip_suffix("\n\n"))
            .unwrap();
        serde_json::from_str(data).unwrap()
    }

    #[tokio::test]
    async fn test_forwards_data_lines_in_order() {
        let body = stream::iter(chunks(&["data: {\"id\":1}\n\ndata: [DONE]\n\n"]));
        let frames = collect_frames(body, None).await;
        assert_eq!(frames, vec!["data: {\"id\":1}\n\n", "data: [DONE]\n\n"]);
    }

    #[tokio::test]
    async fn test_drops_lines_without_prefix() {
        let body = stream::iter(chunks(&[
            ": keep-alive\n",
            "event: ping\n",
            "data: {\"id\":1}\n",
            "\n",
            "data:{\"no_space\":true}\n",
            "retry: 1000\n",
        ]));
        let frames = collect_frames(body, None).await;
        assert_eq!(frames, vec!["data: {\"id\":1}\n\n"]);
    }

    #[tokio::test]
    async fn test_reassembles_lines_split_across_chunks() {
        let body = stream::iter(chunks(&["da", "ta: {\"id\"", ":1}\n", "\ndata: [DO", "NE]\n\n"]));
        let frames = collect_frames(body, None).await;
        assert_eq!(frames, vec!["data: {\"id\":1}\n\n", "data: [DONE]\n\n"]);
    }

    #[tokio::test]
    async fn test_normalizes_crlf_terminators() {
        let body = stream::iter(chunks(&["data: {\"id\":1}\r\n\r\ndata: [DONE]\r\n\r\n"]));
        let frames = collect_frames(body, None).await;
        assert_eq!(frames, vec!["data: {\"id\":1}\n\n", "data: [DONE]\n\n"]);
    }

    #[tokio::test]
    async fn test_flushes_unterminated_last_line() {
        let body = stream::iter(chunks(&["data: {\"id\":1}\n", "data: [DONE]"]));
        let frames = collect_frames(body, None).await;
        assert_eq!(frames, vec!["data: {\"id\":1}\n\n", "data: [DONE]\n\n"]);
    }

    #[tokio::test]
    async fn test_multibyte_character_split_across_chunks() {
        let text = "data: {\"content\":\"héllo\"}\n";
        let bytes = text.as_bytes();
        let split = text.find('é').unwrap() + 1;
        let body = stream::iter(vec![
            Ok::<_, io::Error>(Bytes::copy_from_slice(&bytes[..split])),
            Ok(Bytes::copy_from_slice(&bytes[split..])),
        ]);
        let frames = collect_frames(body, None).await;
        assert_eq!(frames, vec!["data: {\"content\":\"héllo\"}\n\n"]);
    }

    #[tokio::test]
    async fn test_read_error_emits_single_terminal_event() {
        let mut parts = chunks(&["data: {\"id\":1}\n\n"]);
        parts.push(Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")));
        parts.extend(chunks(&["data: {\"id\":2}\n\n"]));

        let frames = collect_frames(stream::iter(parts), None).await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], "data: {\"id\":1}\n\n");

        let error = error_body(&frames[1]);
        assert_eq!(error["error"]["type"], "proxy_error");
        assert_eq!(error["error"]["code"], "nim_api_error");
        assert_eq!(error["error"]["message"], "connection reset");
    }

    #[tokio::test]
    async fn test_partial_line_is_discarded_on_error() {
        let mut parts = chunks(&["data: {\"trunc"]);
        parts.push(Err(io::Error::new(io::ErrorKind::UnexpectedEof, "eof")));

        let frames = collect_frames(stream::iter(parts), None).await;
        assert_eq!(frames.len(), 1);
        assert_eq!(error_body(&frames[0])["error"]["message"], "eof");
    }

    #[tokio::test]
    async fn test_idle_timeout_ends_stream_with_error() {
        let body = stream::iter(chunks(&["data: {\"id\":1}\n\n"]))
            .chain(stream::pending::<Result<Bytes, io::Error>>());

        let frames = collect_frames(body, Some(Duration::from_millis(50))).await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], "data: {\"id\":1}\n\n");
        assert_eq!(error_body(&frames[1])["error"]["code"], "nim_api_error");
    }

    #[test]
    fn test_error_envelope_frame() {
        let frame = ErrorEnvelope::new("boom").to_sse_frame();
        assert_eq!(
            frame,
            Bytes::from(
                "data: {\"error\": {\"message\": \"boom\", \"type\": \"proxy_error\", \"code\": \"nim_api_error\"}}\n\n"
            )
        );
    }

    #[test]
    fn test_error_envelope_escapes_message() {
        let frame = ErrorEnvelope::new("bad \"quote\", colon: here").to_sse_frame();
        let text = std::str::from_utf8(&frame).unwrap();
        assert_eq!(
            error_body(text)["error"]["message"],
            "bad \"quote\", colon: here"
        );
    }

    #[tokio::test]
    async fn test_oversized_line_ends_stream_with_error() {
        let mut parts = chunks(&["data: {\"id\":1}\n"]);
        let unterminated = format!("data: {}", "x".repeat(MAX_LINE_BYTES));
        parts.push(Ok(Bytes::from(unterminated)));
        parts.extend(chunks(&["\ndata: [DONE]\n"]));

        let frames = collect_frames(stream::iter(parts), None).await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], "data: {\"id\":1}\n\n");
        let error = error_body(&frames[1]);
        assert_eq!(error["error"]["code"], "nim_api_error");
        assert!(error["error"]["message"].as_str().unwrap().contains("exceeds"));
    }

    #[test]
    fn test_line_buffer_many_lines_in_one_chunk() {
        let mut buffer = LineBuffer::default();
        let chunk = "data: x\n".repeat(10_000);
        let lines = buffer.push(chunk.as_bytes());
        assert_eq!(lines.len(), 10_000);
        assert!(lines.iter().all(|l| l == "data: x"));
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn test_line_buffer_keeps_incomplete_tail() {
        let mut buffer = LineBuffer::default();
        assert_eq!(buffer.push(b"one\ntw"), vec!["one".to_string()]);
        assert_eq!(buffer.push(b"o\r\n"), vec!["two".to_string()]);
        assert_eq!(buffer.finish(), None);
    }
}
