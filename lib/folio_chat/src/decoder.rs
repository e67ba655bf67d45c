//! Incremental decoding of `text/event-stream` chat replies.

use futures::stream::{Stream, StreamExt};

use crate::payload::extract_fragment;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Callback receiving each fragment as soon as it is decoded.
pub type ChunkCallback<'a> = &'a mut dyn FnMut(&str);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Done,
}

/// Splits raw bytes into lines, keeping the trailing partial line buffered.
///
/// Splitting happens on bytes so a multi-byte character cut in half by a read
/// boundary is decoded once both halves arrived.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        for (index, byte) in self.pending.iter().enumerate() {
            if *byte == b'\n' || *byte == b'\r' {
                lines.push(String::from_utf8_lossy(&self.pending[start..index]).into_owned());
                start = index + 1;
            }
        }
        self.pending.drain(..start);

        lines
    }

    fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.pending).into_owned())
        }
    }
}

/// Accumulates assistant text out of `data:` lines.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    lines: LineBuffer,
    text: String,
    done: bool,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one read worth of bytes. Returns `true` once the `[DONE]`
    /// sentinel was seen; later input is ignored.
    pub fn feed(&mut self, bytes: &[u8], on_chunk: &mut dyn FnMut(&str)) -> bool {
        if self.done {
            return true;
        }

        for line in self.lines.push(bytes) {
            if self.handle_line(&line, on_chunk) == Flow::Done {
                self.done = true;
                break;
            }
        }

        self.done
    }

    /// Processes the buffered partial line, if any, and returns the trimmed text.
    pub fn finish(mut self, on_chunk: &mut dyn FnMut(&str)) -> String {
        if !self.done {
            let lines = std::mem::take(&mut self.lines);
            if let Some(line) = lines.finish() {
                self.handle_line(&line, on_chunk);
            }
        }

        self.text.trim().to_string()
    }

    fn handle_line(&mut self, line: &str, on_chunk: &mut dyn FnMut(&str)) -> Flow {
        let line = line.trim_end();
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            if !line.is_empty() {
                log::trace!("skipping non-data line: {line}");
            }
            return Flow::Continue;
        };

        let payload = payload.trim();
        if payload.is_empty() {
            return Flow::Continue;
        }
        if payload == DONE_SENTINEL {
            return Flow::Done;
        }

        match extract_fragment(payload) {
            Some(fragment) => {
                log::trace!("fragment: {fragment:?}");
                self.text.push_str(&fragment);
                on_chunk(&fragment);
            }
            None => log::debug!("no text in payload: {payload}"),
        }

        Flow::Continue
    }
}

/// Drains an event stream into assistant text, calling `on_chunk` for each
/// fragment in wire order.
///
/// The stream is owned by this function and dropped on every exit path. Read
/// errors of the underlying stream are returned as is; malformed lines are
/// skipped.
pub async fn read_event_stream<S, B, E>(
    stream: S,
    on_chunk: Option<ChunkCallback<'_>>,
) -> Result<String, E>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    let mut ignore = |_: &str| {};
    let on_chunk: &mut dyn FnMut(&str) = match on_chunk {
        Some(callback) => callback,
        None => &mut ignore,
    };

    let mut stream = Box::pin(stream);
    let mut decoder = EventStreamDecoder::new();

    while let Some(bytes) = stream.next().await {
        let bytes = bytes?;
        if decoder.feed(bytes.as_ref(), on_chunk) {
            log::debug!("stream terminated by sentinel");
            return Ok(decoder.finish(on_chunk));
        }
    }

    Ok(decoder.finish(on_chunk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::stream;
    use std::convert::Infallible;

    fn collect(parts: Vec<&'static str>) -> (String, Vec<String>) {
        let mut chunks = Vec::new();
        let mut on_chunk = |chunk: &str| chunks.push(chunk.to_string());
        let input = stream::iter(parts.into_iter().map(Ok::<_, Infallible>));

        let text = match block_on(read_event_stream(input, Some(&mut on_chunk))) {
            Ok(text) => text,
            Err(never) => match never {},
        };

        (text, chunks)
    }

    #[test]
    fn accumulates_fragments_until_done() {
        let (text, chunks) = collect(vec![
            "data: {\"response\":\"Hel\"}\n\ndata: {\"response\":\"lo\"}\n\ndata: [DONE]\n\n",
        ]);

        assert_eq!(text, "Hello");
        assert_eq!(chunks, vec!["Hel", "lo"]);
    }

    #[test]
    fn empty_payload_is_ignored() {
        let (text, chunks) = collect(vec!["data: \n\n"]);

        assert_eq!(text, "");
        assert!(chunks.is_empty());
    }

    #[test]
    fn partial_lines_are_joined_across_reads() {
        let (text, chunks) = collect(vec![
            "data: {\"choices\":[{\"delta\":",
            "{\"content\":\"Hi\"}}]}\r\n\r\nda",
            "ta: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\r\n",
        ]);

        assert_eq!(text, "Hi there");
        assert_eq!(chunks, vec!["Hi", " there"]);
    }

    #[test]
    fn input_after_sentinel_is_ignored() {
        let (text, chunks) = collect(vec!["data: one\ndata: [DONE]\ndata: two\n", "data: three\n"]);

        assert_eq!(text, "one");
        assert_eq!(chunks, vec!["one"]);
    }

    #[test]
    fn trailing_line_without_terminator_is_processed() {
        let (text, chunks) = collect(vec!["event: message\n: keep-alive\ndata: tail"]);

        assert_eq!(text, "tail");
        assert_eq!(chunks, vec!["tail"]);
    }

    #[test]
    fn indented_data_lines_are_not_events() {
        let mut decoder = EventStreamDecoder::new();
        let mut chunks = Vec::new();

        decoder.feed(b"   data: indented\ndata: kept\n", &mut |chunk| {
            chunks.push(chunk.to_string())
        });

        assert_eq!(chunks, vec!["kept"]);
        assert_eq!(decoder.finish(&mut |_| {}), "kept");
    }

    #[test]
    fn multibyte_characters_survive_split_reads() {
        let mut decoder = EventStreamDecoder::new();
        let line = "data: caf\u{e9}\n".as_bytes();
        let (head, tail) = line.split_at(line.len() - 2);

        decoder.feed(head, &mut |_| {});
        decoder.feed(tail, &mut |_| {});

        assert_eq!(decoder.finish(&mut |_| {}), "caf\u{e9}");
    }

    #[test]
    fn read_errors_are_propagated() {
        let input = stream::iter(vec![Ok("data: partial\n"), Err("connection reset")]);

        let result = block_on(read_event_stream(input, None));

        assert_eq!(result, Err("connection reset"));
    }
}
