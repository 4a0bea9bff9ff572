// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pure 8-byte-header frame decoder for the runtime's multiplexed attach/logs
//! stream. Decoupled from socket I/O so arbitrary chunk boundaries can be
//! exercised in tests.

use bytes::{Buf, BytesMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
}

impl StreamKind {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(StreamKind::Stdin),
            1 => Some(StreamKind::Stdout),
            2 => Some(StreamKind::Stderr),
            _ => None,
        }
    }
}

/// Buffers raw bytes until a full header-plus-payload frame is available.
///
/// Header is 8 bytes: byte 0 is the stream kind, bytes 4..8 are the payload
/// length as a big-endian u32. A receiver buffers until >= 8 header bytes,
/// then waits for the full payload, then yields and repeats.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    /// Feed newly read bytes into the decoder.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pull the next complete frame out of the buffer, if one is available.
    /// Call repeatedly after each `push` until it returns `None`.
    pub fn next_frame(&mut self) -> Option<(StreamKind, Vec<u8>)> {
        if self.buffer.len() < 8 {
            return None;
        }

        let kind_byte = self.buffer[0];
        let len = u32::from_be_bytes([
            self.buffer[4],
            self.buffer[5],
            self.buffer[6],
            self.buffer[7],
        ]) as usize;

        if self.buffer.len() < 8 + len {
            return None;
        }

        self.buffer.advance(8);
        let payload = self.buffer.split_to(len).to_vec();

        match StreamKind::from_byte(kind_byte) {
            Some(kind) => Some((kind, payload)),
            // Unknown stream kind byte: drop this frame's payload and recurse
            // rather than corrupt the stream's framing alignment.
            None => self.next_frame(),
        }
    }
}

/// Incrementally reassembles newline-delimited JSON text, handing back only
/// complete lines.
#[derive(Debug, Default)]
pub struct JsonAccumulator {
    tail: String,
}

impl JsonAccumulator {
    pub fn new() -> Self {
        Self { tail: String::new() }
    }

    /// Append a chunk of stdout text and return every newline-terminated line
    /// that begins with `{`, in arrival order. Never emits the unterminated
    /// remainder; it stays buffered as the new tail.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.tail.push_str(text);
        if !self.tail.contains('\n') {
            return Vec::new();
        }

        let mut parts: Vec<String> = self.tail.split('\n').map(|s| s.to_string()).collect();
        self.tail = parts.pop().unwrap_or_default();

        parts
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| line.starts_with('{'))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(kind: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![kind, 0, 0, 0];
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn decodes_single_frame() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&frame(1, b"hello"));
        let (kind, payload) = decoder.next_frame().unwrap();
        assert_eq!(kind, StreamKind::Stdout);
        assert_eq!(payload, b"hello");
        assert!(decoder.next_frame().is_none());
    }

    #[test]
    fn decodes_across_arbitrary_chunk_boundaries() {
        let raw = frame(2, b"diagnostic output line");
        let mut decoder = FrameDecoder::new();
        for byte in &raw {
            decoder.push(&[*byte]);
        }
        let (kind, payload) = decoder.next_frame().unwrap();
        assert_eq!(kind, StreamKind::Stderr);
        assert_eq!(payload, b"diagnostic output line");
    }

    #[test]
    fn waits_for_full_payload_before_yielding() {
        let raw = frame(1, b"0123456789");
        let mut decoder = FrameDecoder::new();
        decoder.push(&raw[..8]);
        assert!(decoder.next_frame().is_none());
        decoder.push(&raw[8..]);
        assert!(decoder.next_frame().is_some());
    }

    #[test]
    fn decodes_multiple_frames_in_one_push() {
        let mut raw = frame(1, b"first");
        raw.extend(frame(1, b"second"));
        let mut decoder = FrameDecoder::new();
        decoder.push(&raw);
        let (_, first) = decoder.next_frame().unwrap();
        let (_, second) = decoder.next_frame().unwrap();
        assert_eq!(first, b"first");
        assert_eq!(second, b"second");
        assert!(decoder.next_frame().is_none());
    }

    #[test]
    fn json_accumulator_only_emits_complete_lines() {
        let mut acc = JsonAccumulator::new();
        let lines = acc.push("{\"id\":1,\"resu");
        assert!(lines.is_empty());
        let lines = acc.push("lt\":true}\n{\"id\":2}\n{\"partial");
        assert_eq!(lines, vec!["{\"id\":1,\"result\":true}", "{\"id\":2}"]);
    }

    #[test]
    fn json_accumulator_ignores_non_object_lines() {
        let mut acc = JsonAccumulator::new();
        let lines = acc.push("plain text log line\n{\"id\":1}\n");
        assert_eq!(lines, vec!["{\"id\":1}"]);
    }
}
