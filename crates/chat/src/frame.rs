//! Line-level decoding of a server-sent event body.
//!
//! The decoder is fed raw byte chunks as they arrive and yields the frames
//! each chunk completes. Partial lines, including split UTF-8 sequences, are
//! held back until their terminating newline shows up.

/// Marker that introduces a data line.
pub const DATA_PREFIX: &str = "data: ";

/// Payload that signals the end of the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One meaningful line of the response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Payload of a data line, prefix stripped. Never blank.
    Data(String),
    /// The `[DONE]` sentinel. Not JSON, never parsed.
    Done,
}

/// Longest line the decoder buffers before giving up on it.
pub const MAX_LINE_BYTES: usize = 1 << 20;

/// Incremental frame decoder for one connection.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no newline.
    scanned: usize,
    max_line_bytes: usize,
    /// Set while dropping the rest of an oversized line.
    discarding: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that drops any line longer than `max_line_bytes`.
    pub fn with_max_line(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line_bytes,
            discarding: false,
        }
    }

    /// Buffers `chunk` and returns the frames it completed, lazily.
    ///
    /// Frames not pulled from the iterator stay buffered and are returned by
    /// the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Frames<'_> {
        self.buffer.extend_from_slice(chunk);
        Frames { decoder: self }
    }

    /// Flushes a final line that arrived without a trailing newline.
    pub fn finish(&mut self) -> Option<Frame> {
        let line = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) || line.is_empty() {
            return None;
        }
        decode_line(&line)
    }

    /// Bytes waiting for a line terminator.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    fn next_frame(&mut self) -> Option<Frame> {
        loop {
            let Some(offset) = self.buffer[self.scanned..]
                .iter()
                .position(|byte| *byte == b'\n')
            else {
                self.scanned = self.buffer.len();
                if self.buffer.len() > self.max_line_bytes {
                    tracing::warn!(
                        pending = self.buffer.len(),
                        limit = self.max_line_bytes,
                        "discarding oversized stream line"
                    );
                    self.buffer.clear();
                    self.scanned = 0;
                    self.discarding = true;
                }
                return None;
            };

            let newline = self.scanned + offset;
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            self.scanned = 0;

            if std::mem::take(&mut self.discarding) {
                continue;
            }
            if newline > self.max_line_bytes {
                tracing::warn!(
                    length = newline,
                    limit = self.max_line_bytes,
                    "discarding oversized stream line"
                );
                continue;
            }
            if let Some(frame) = decode_line(&line[..newline]) {
                return Some(frame);
            }
        }
    }
}

/// Frames completed by one [`FrameDecoder::feed`] call.
pub struct Frames<'a> {
    decoder: &'a mut FrameDecoder,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.decoder.next_frame()
    }
}

fn decode_line(raw: &[u8]) -> Option<Frame> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let line = String::from_utf8_lossy(raw);

    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        if !line.is_empty() {
            tracing::trace!(line = %line, "skipping non-data line");
        }
        return None;
    };

    if payload.trim() == DONE_SENTINEL {
        return Some(Frame::Done);
    }
    if payload.trim().is_empty() {
        return None;
    }

    Some(Frame::Data(payload.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(payload: &str) -> Frame {
        Frame::Data(payload.to_string())
    }

    #[test]
    fn splits_lines_and_strips_prefix() {
        let mut decoder = FrameDecoder::new();
        let frames: Vec<_> = decoder
            .feed(b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\n")
            .collect();
        assert_eq!(frames, vec![data("{\"a\":1}"), data("{\"b\":2}")]);
    }

    #[test]
    fn done_sentinel_is_a_distinct_frame() {
        let mut decoder = FrameDecoder::new();
        let frames: Vec<_> = decoder.feed(b"data: [DONE]\n").collect();
        assert_eq!(frames, vec![Frame::Done]);
    }

    #[test]
    fn ignores_unprefixed_and_blank_lines() {
        let mut decoder = FrameDecoder::new();
        let frames: Vec<_> = decoder
            .feed(b"event: ping\nid: 4\ndata: \ndata:    \n: comment\ndata: x\n")
            .collect();
        assert_eq!(frames, vec![data("x")]);
    }

    #[test]
    fn holds_partial_line_until_newline_arrives() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.feed(b"data: {\"type\":\"tok").count(), 0);
        assert!(decoder.pending_bytes() > 0);

        let frames: Vec<_> = decoder.feed(b"en\"}\ndata: [DO").collect();
        assert_eq!(frames, vec![data("{\"type\":\"token\"}")]);

        let frames: Vec<_> = decoder.feed(b"NE]\n").collect();
        assert_eq!(frames, vec![Frame::Done]);
        assert_eq!(decoder.pending_bytes(), 0);
    }

    #[test]
    fn reassembles_utf8_split_across_chunks() {
        let line = "data: 안녕\n".as_bytes();
        // Split inside the first Hangul syllable.
        let (head, tail) = line.split_at(8);

        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.feed(head).count(), 0);
        let frames: Vec<_> = decoder.feed(tail).collect();
        assert_eq!(frames, vec![data("안녕")]);
    }

    #[test]
    fn strips_carriage_returns() {
        let mut decoder = FrameDecoder::new();
        let frames: Vec<_> = decoder.feed(b"data: hi\r\n\r\ndata: [DONE]\r\n").collect();
        assert_eq!(frames, vec![data("hi"), Frame::Done]);
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.feed(b"data: tail").count(), 0);
        assert_eq!(decoder.finish(), Some(data("tail")));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn unread_frames_survive_until_next_feed() {
        let mut decoder = FrameDecoder::new();
        let first = decoder.feed(b"data: a\ndata: b\n").next();
        assert_eq!(first, Some(data("a")));

        let rest: Vec<_> = decoder.feed(b"").collect();
        assert_eq!(rest, vec![data("b")]);
    }

    #[test]
    fn byte_at_a_time_feeding_yields_every_frame() {
        let body = b"data: {\"a\":1}\r\n\ndata: [DONE]\n";
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for byte in body {
            frames.extend(decoder.feed(std::slice::from_ref(byte)));
        }
        assert_eq!(frames, vec![data("{\"a\":1}"), Frame::Done]);
        assert_eq!(decoder.pending_bytes(), 0);
    }

    #[test]
    fn oversized_line_is_dropped_without_leaking_its_tail() {
        let mut decoder = FrameDecoder::with_max_line(16);
        assert_eq!(decoder.feed(b"data: 0123456789abcdef").count(), 0);
        assert_eq!(decoder.pending_bytes(), 0);

        // Rest of the same line, even though it looks like a data line.
        let frames: Vec<_> = decoder.feed(b"data: leak\ndata: ok\n").collect();
        assert_eq!(frames, vec![data("ok")]);

        let frames: Vec<_> = decoder
            .feed(b"data: 0123456789abcdef\ndata: [DONE]\n")
            .collect();
        assert_eq!(frames, vec![Frame::Done]);
    }

    #[test]
    fn finish_drops_an_oversized_tail() {
        let mut decoder = FrameDecoder::with_max_line(8);
        assert_eq!(decoder.feed(b"data: far too long").count(), 0);
        assert_eq!(decoder.finish(), None);
        assert_eq!(decoder.feed(b"data: x\n").collect::<Vec<_>>(), vec![data("x")]);
    }
}
