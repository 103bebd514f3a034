//! Stream framing for the Meshtastic serial API.
//!
//! Every protobuf on the wire is prefixed with a 4 byte header:
//!
//!   `0x94 0xC3 <len_hi> <len_lo> <protobuf bytes>`
//!
//! The radio interleaves these frames with plain-text debug console output, so the
//! decoder realigns on the magic bytes and discards anything in between.
use bytes::{Buf, BytesMut};

pub const START1: u8 = 0x94;
pub const START2: u8 = 0xC3;
/// Largest protobuf the firmware will emit or accept in one frame.
pub const MAX_FRAME_SIZE: usize = 512;

/// Incremental decoder: feed arbitrary chunks with [`StreamFramer::push`], then drain
/// complete frames with [`StreamFramer::next_frame`].
#[derive(Debug, Default)]
pub struct StreamFramer {
    buf: BytesMut,
}

impl StreamFramer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(1024),
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes waiting for the rest of a frame (or for a header to appear).
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Extract the next complete frame payload, if one is buffered.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            // Realign to the first START1 byte
            match self.buf.iter().position(|&b| b == START1) {
                Some(0) => {}
                Some(pos) => self.buf.advance(pos),
                None => {
                    self.buf.clear();
                    return None;
                }
            }
            if self.buf.len() < 4 {
                return None;
            }
            if self.buf[1] != START2 {
                self.buf.advance(1);
                continue;
            }
            let declared = ((self.buf[2] as usize) << 8) | (self.buf[3] as usize);
            if declared == 0 || declared > MAX_FRAME_SIZE {
                // Corrupt header; skip the magic byte and rescan
                self.buf.advance(1);
                continue;
            }
            if self.buf.len() < 4 + declared {
                return None;
            }
            self.buf.advance(4);
            return Some(self.buf.split_to(declared).to_vec());
        }
    }
}

/// Prefix a protobuf payload with the stream header.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 4);
    out.push(START1);
    out.push(START2);
    out.push(((payload.len() >> 8) & 0xFF) as u8);
    out.push((payload.len() & 0xFF) as u8);
    out.extend_from_slice(payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_concatenated_frames() {
        let mut framer = StreamFramer::new();
        let mut wire = encode_frame(&[1, 2, 3]);
        wire.extend(encode_frame(&[4, 5]));
        framer.push(&wire);
        assert_eq!(framer.next_frame(), Some(vec![1, 2, 3]));
        assert_eq!(framer.next_frame(), Some(vec![4, 5]));
        assert_eq!(framer.next_frame(), None);
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn skips_console_text_between_frames() {
        let mut framer = StreamFramer::new();
        framer.push(b"INFO  | 12:00:01 boot\r\n");
        framer.push(&encode_frame(&[9, 9]));
        assert_eq!(framer.next_frame(), Some(vec![9, 9]));
    }

    #[test]
    fn waits_for_partial_frame() {
        let mut framer = StreamFramer::new();
        let wire = encode_frame(&[7; 10]);
        framer.push(&wire[..6]);
        assert_eq!(framer.next_frame(), None);
        framer.push(&wire[6..]);
        assert_eq!(framer.next_frame(), Some(vec![7; 10]));
    }

    #[test]
    fn rejects_oversized_header_and_resyncs() {
        let mut framer = StreamFramer::new();
        // declared length 0xFFFF is beyond MAX_FRAME_SIZE
        framer.push(&[START1, START2, 0xFF, 0xFF]);
        framer.push(&encode_frame(&[42]));
        assert_eq!(framer.next_frame(), Some(vec![42]));
    }

    #[test]
    fn lone_start_byte_is_not_a_header() {
        let mut framer = StreamFramer::new();
        framer.push(&[START1, 0x00]);
        framer.push(&encode_frame(&[1]));
        assert_eq!(framer.next_frame(), Some(vec![1]));
    }
}
