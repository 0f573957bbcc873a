use bytes::BytesMut;
use t3_frame::{LineMessage, Stream, Timestamp};
use tracing::debug;

/// Reassembles raw output chunks into bounded-length line messages.
///
/// Every message is stamped with the timestamp of the chunk that completed
/// it. A line reaching `max_line_length` without a newline is emitted as is
/// and accumulation restarts; when the very next byte is the newline that
/// would have ended it, that newline is consumed without emitting an empty
/// message. No input byte other than line-terminating newlines is dropped.
#[derive(Debug)]
pub struct LineFramer {
    stream: Stream,
    buf: BytesMut,
    max_line_length: usize,
    just_split: bool,
    splits: u64,
}

impl LineFramer {
    pub fn new(stream: Stream, max_line_length: usize) -> Self {
        assert!(max_line_length > 0, "max_line_length must be positive");
        Self {
            stream,
            buf: BytesMut::with_capacity(max_line_length),
            max_line_length,
            just_split: false,
            splits: 0,
        }
    }

    /// Feed one chunk read at `timestamp` and collect the completed lines.
    pub fn push(&mut self, chunk: &[u8], timestamp: Timestamp) -> Vec<LineMessage> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while !rest.is_empty() {
            if self.just_split {
                self.just_split = false;
                if rest[0] == b'\n' {
                    rest = &rest[1..];
                    continue;
                }
            }

            let room = self.max_line_length - self.buf.len();
            let window = &rest[..rest.len().min(room)];

            match window.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.buf.extend_from_slice(&window[..pos]);
                    lines.push(LineMessage::new(timestamp, self.buf.split().freeze()));
                    rest = &rest[pos + 1..];
                }
                None => {
                    self.buf.extend_from_slice(window);
                    rest = &rest[window.len()..];
                    if self.buf.len() == self.max_line_length {
                        self.splits += 1;
                        debug!(
                            stream = %self.stream,
                            max = self.max_line_length,
                            "line exceeds maximum length; splitting"
                        );
                        lines.push(LineMessage::new(timestamp, self.buf.split().freeze()));
                        self.just_split = true;
                    }
                }
            }
        }

        lines
    }

    /// Flush an unterminated trailing line at end of input.
    pub fn finish(&mut self, timestamp: Timestamp) -> Option<LineMessage> {
        self.just_split = false;
        if self.buf.is_empty() {
            return None;
        }
        Some(LineMessage::new(timestamp, self.buf.split().freeze()))
    }

    /// Bytes accumulated towards the current line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Number of times an overlong line was split so far.
    pub fn splits(&self) -> u64 {
        self.splits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> Timestamp {
        Timestamp::from_parts(secs, 0).unwrap()
    }

    fn texts(lines: &[LineMessage]) -> Vec<&[u8]> {
        lines.iter().map(|l| l.text.as_ref()).collect()
    }

    #[test]
    fn splits_chunk_on_newlines() {
        let mut framer = LineFramer::new(Stream::Stdout, 4096);
        let lines = framer.push(b"one\ntwo\nthree", ts(1));

        assert_eq!(texts(&lines), vec![&b"one"[..], b"two"]);
        assert_eq!(framer.pending(), 5);
    }

    #[test]
    fn line_spanning_reads_takes_completing_timestamp() {
        let mut framer = LineFramer::new(Stream::Stdout, 4096);
        assert!(framer.push(b"Hello, stdout! ", ts(1)).is_empty());

        let lines = framer.push(b"Goodbye, stdout!\n", ts(2));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text.as_ref(), b"Hello, stdout! Goodbye, stdout!");
        assert_eq!(lines[0].timestamp, ts(2));
    }

    #[test]
    fn empty_lines_are_preserved() {
        let mut framer = LineFramer::new(Stream::Stderr, 4096);
        let lines = framer.push(b"a\n\n\nb\n", ts(1));
        assert_eq!(texts(&lines), vec![&b"a"[..], b"", b"", b"b"]);
    }

    #[test]
    fn overlong_line_is_split_without_loss() {
        let mut framer = LineFramer::new(Stream::Stdout, 4);
        let lines = framer.push(b"abcdefghij\n", ts(1));

        assert_eq!(texts(&lines), vec![&b"abcd"[..], b"efgh", b"ij"]);
        assert_eq!(framer.splits(), 2);
        let joined: Vec<u8> = lines.iter().flat_map(|l| l.text.iter().copied()).collect();
        assert_eq!(joined, b"abcdefghij");
    }

    #[test]
    fn split_is_flushed_as_soon_as_limit_is_reached() {
        let mut framer = LineFramer::new(Stream::Stdout, 4);
        let lines = framer.push(b"abcd", ts(1));

        assert_eq!(texts(&lines), vec![&b"abcd"[..]]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn newline_right_after_split_ends_that_line() {
        let mut framer = LineFramer::new(Stream::Stdout, 4);
        let mut lines = framer.push(b"abcd", ts(1));
        lines.extend(framer.push(b"\nnext\n", ts(2)));

        assert_eq!(texts(&lines), vec![&b"abcd"[..], b"next"]);
    }

    #[test]
    fn exact_length_line_then_blank_line() {
        let mut framer = LineFramer::new(Stream::Stdout, 4);
        let lines = framer.push(b"abcd\n\n", ts(1));

        assert_eq!(texts(&lines), vec![&b"abcd"[..], b""]);
    }

    #[test]
    fn finish_flushes_partial_line_once() {
        let mut framer = LineFramer::new(Stream::Stderr, 4096);
        assert!(framer.push(b"no newline", ts(1)).is_empty());

        let last = framer.finish(ts(3)).unwrap();
        assert_eq!(last.text.as_ref(), b"no newline");
        assert_eq!(last.timestamp, ts(3));
        assert!(framer.finish(ts(4)).is_none());
    }

    #[test]
    fn bytes_are_not_reinterpreted() {
        let mut framer = LineFramer::new(Stream::Stdout, 4096);
        let lines = framer.push(b"\xff\xfe\r\n", ts(1));
        assert_eq!(lines[0].text.as_ref(), b"\xff\xfe\r");
    }
}
