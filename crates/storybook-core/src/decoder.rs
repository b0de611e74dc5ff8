use std::collections::VecDeque;
use std::fmt;

use futures::stream::{self, Stream, StreamExt as _};
use tracing::{trace, warn};

use crate::errors::StreamReadError;
use crate::frame::Frame;
use crate::wire::RECORD_TAG;

/// Counters describing what a decoder has seen so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Records decoded into frames.
    pub frames: u64,
    /// Tagged records whose payload was not a valid frame.
    pub malformed: u64,
    /// Records without the expected tag.
    pub noise: u64,
}

/// Incremental decoder for the record stream of one run.
///
/// Chunks can be split anywhere, including inside a multi-byte character or
/// inside the record terminator; the decoded frame sequence does not depend
/// on how the input was chunked.
#[derive(Debug)]
pub struct FrameDecoder {
    tag: String,
    // Bytes that do not form a complete UTF-8 sequence yet.
    bytes: Vec<u8>,
    // Decoded text after the last complete record.
    text: String,
    // Offset in `text` where the terminator search resumes.
    scan_from: usize,
    finished: bool,
    stats: DecoderStats,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_tag(RECORD_TAG)
    }

    /// Creates a decoder that only accepts records starting with `tag`.
    pub fn with_tag(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            bytes: Vec::new(),
            text: String::new(),
            scan_from: 0,
            finished: false,
            stats: DecoderStats::default(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Feeds one chunk and returns every frame completed by it.
    ///
    /// An empty chunk is a no-op. Chunks fed after [`finish`](Self::finish)
    /// are ignored.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        if chunk.is_empty() || self.finished {
            return Vec::new();
        }
        self.bytes.extend_from_slice(chunk);
        self.decode_text(false);
        self.drain_records()
    }

    /// Flushes the trailing partial record at end of stream.
    ///
    /// Calling it again returns nothing.
    pub fn finish(&mut self) -> Vec<Frame> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        self.decode_text(true);
        let mut frames = self.drain_records();
        let rest = std::mem::take(&mut self.text);
        self.scan_from = 0;
        if let Some(frame) = self.parse_record(&rest) {
            frames.push(frame);
        }
        frames
    }

    fn decode_text(&mut self, flush: bool) {
        let mut consumed = 0;
        while consumed < self.bytes.len() {
            match std::str::from_utf8(&self.bytes[consumed..]) {
                Ok(valid) => {
                    self.text.push_str(valid);
                    consumed = self.bytes.len();
                }
                Err(err) => {
                    let valid_len = err.valid_up_to();
                    self.text.push_str(&String::from_utf8_lossy(
                        &self.bytes[consumed..consumed + valid_len],
                    ));
                    consumed += valid_len;
                    match err.error_len() {
                        Some(invalid_len) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            consumed += invalid_len;
                        }
                        None if flush => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            consumed = self.bytes.len();
                        }
                        // Incomplete sequence at the end; wait for more bytes.
                        None => break,
                    }
                }
            }
        }
        self.bytes.drain(..consumed);
    }

    fn drain_records(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some((idx, len)) = find_terminator(self.text.as_bytes(), self.scan_from) {
            let record = self.text[..idx].to_owned();
            self.text.drain(..idx + len);
            self.scan_from = 0;
            if let Some(frame) = self.parse_record(&record) {
                frames.push(frame);
            }
        }
        // A terminator is at most four bytes; anything before that was searched.
        self.scan_from = self.text.len().saturating_sub(3);
        frames
    }

    fn parse_record(&mut self, record: &str) -> Option<Frame> {
        let record = record.trim_start_matches(['\r', '\n']);
        if record.trim().is_empty() {
            return None;
        }
        let Some(payload) = record.strip_prefix(self.tag.as_str()) else {
            self.stats.noise += 1;
            trace!(tag = %self.tag, "ignoring untagged record");
            return None;
        };
        match serde_json::from_str::<Frame>(payload) {
            Ok(frame) => {
                self.stats.frames += 1;
                Some(frame)
            }
            Err(err) => {
                self.stats.malformed += 1;
                warn!(error = %err, "dropping malformed record");
                None
            }
        }
    }
}

fn find_terminator(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if buf[i..].starts_with(b"\r\n\r\n") {
            return Some((i, 4));
        }
        i += 1;
    }
    None
}

/// Lazily decodes a byte stream into frames.
///
/// Frames decoded from one chunk are all yielded before the next chunk is
/// pulled. The first error from `bytes` is yielded and ends the stream; at a
/// clean end of input the decoder's trailing partial record is flushed.
pub fn decode_stream<S, B, E>(
    bytes: S,
    decoder: FrameDecoder,
) -> impl Stream<Item = Result<Frame, StreamReadError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    struct State<S> {
        bytes: std::pin::Pin<Box<S>>,
        decoder: FrameDecoder,
        pending: VecDeque<Frame>,
        done: bool,
    }

    stream::unfold(
        State {
            bytes: Box::pin(bytes),
            decoder,
            pending: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(frame) = state.pending.pop_front() {
                    return Some((Ok(frame), state));
                }
                if state.done {
                    return None;
                }
                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        let frames = state.decoder.feed(chunk.as_ref());
                        state.pending.extend(frames);
                    }
                    Some(Err(err)) => {
                        state.done = true;
                        return Some((Err(StreamReadError::read(err.to_string())), state));
                    }
                    None => {
                        state.done = true;
                        let frames = state.decoder.finish();
                        state.pending.extend(frames);
                    }
                }
            }
        },
    )
}
