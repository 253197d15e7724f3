//! Frame accumulator for COBS-encoded report streams
//!
//! Report frames are delimited by 0x00. Bytes are buffered until a
//! delimiter arrives and the complete frame is handed out with the
//! delimiter still attached, which is what `corncobs::decode_buf` expects.

use crate::config::protocol::{FRAME_DELIMITER, MAX_FRAME_SIZE};
use heapless::Vec;

/// Accumulates incoming bytes and extracts complete COBS frames.
pub struct FrameAccumulator {
    buffer: Vec<u8, MAX_FRAME_SIZE>,
    /// Set once the current frame overflowed; bytes are skipped until the next delimiter
    overflowed: bool,
    discarded: u32,
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            overflowed: false,
            discarded: 0,
        }
    }

    /// Push a byte into the accumulator.
    ///
    /// Returns `Some(frame)` (delimiter included) when a delimiter closes a
    /// non-empty frame that fit in the buffer.
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8, MAX_FRAME_SIZE>> {
        if byte != FRAME_DELIMITER {
            if !self.overflowed && self.buffer.push(byte).is_err() {
                self.overflowed = true;
            }
            return None;
        }

        if self.overflowed {
            // Resynchronise on the delimiter
            self.buffer.clear();
            self.overflowed = false;
            self.discarded += 1;
            log::warn!("Report frame exceeded {} bytes, discarded", MAX_FRAME_SIZE);
            return None;
        }

        if self.buffer.is_empty() {
            // Leading or repeated delimiter
            return None;
        }

        let mut frame = core::mem::take(&mut self.buffer);
        if frame.push(FRAME_DELIMITER).is_err() {
            // No room for the delimiter: frame is over length once re-terminated
            self.discarded += 1;
            return None;
        }
        Some(frame)
    }

    /// Discard any partial frame
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
    }

    /// True when no partial frame is in progress
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && !self.overflowed
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Frames dropped for exceeding the buffer
    pub fn discarded(&self) -> u32 {
        self.discarded
    }
}

impl Default for FrameAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
