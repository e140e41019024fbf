//! Line framing for streamed HTTP bodies.
//!
//! Providers stream newline-delimited payloads (NDJSON for Ollama, SSE
//! `data:` lines for OpenAI-compatible APIs). A network chunk can end in the
//! middle of a line or a multi-byte character, so bytes are buffered until a
//! full line is available.

use futures::{Stream, StreamExt};
use lumen_core::{AppError, AppResult};

/// Convert a byte stream into a stream of complete, non-blank, trimmed lines.
///
/// A transport error is yielded once and ends the stream.
pub(crate) fn stream_lines<S, B, E>(byte_stream: S) -> impl Stream<Item = AppResult<String>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    futures::stream::unfold(
        (Box::pin(byte_stream), Vec::<u8>::new(), false),
        |(mut stream, mut buffer, finished)| async move {
            if finished {
                return None;
            }

            loop {
                if let Some(newline_pos) = buffer.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=newline_pos).collect();
                    let line = String::from_utf8_lossy(&raw).trim().to_string();
                    if !line.is_empty() {
                        return Some((Ok(line), (stream, buffer, false)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(bytes)) => buffer.extend_from_slice(bytes.as_ref()),
                    Some(Err(e)) => {
                        let err = AppError::Llm(format!("Stream read error: {}", e));
                        return Some((Err(err), (stream, buffer, true)));
                    }
                    None => {
                        let rest = String::from_utf8_lossy(&buffer).trim().to_string();
                        buffer.clear();
                        if rest.is_empty() {
                            return None;
                        }
                        return Some((Ok(rest), (stream, buffer, true)));
                    }
                }
            }
        },
    )
}
