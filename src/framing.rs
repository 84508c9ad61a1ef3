//! Frame extractor
//!
//! Turns an arbitrarily chunked byte stream from the console into complete
//! protocol frames. Handles running status, SysEx, extended-parameter
//! (NRPN) sequences that arrive as several control changes, and note-on /
//! note-off pairs that the console emits for a single state change.
//!
//! One extractor belongs to one console connection; call [`FrameExtractor::reset`]
//! when the connection goes away.

use bytes::{Buf, Bytes, BytesMut};
use std::fmt;
use tracing::{debug, trace};

use crate::format::format_hex;
use crate::protocol::{NRPN_MSB, SYSEX_END, SYSEX_START};

/// One complete protocol message, status byte always included
#[derive(Clone, PartialEq, Eq)]
pub struct RawFrame(Bytes);

impl RawFrame {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn status(&self) -> u8 {
        self.0.first().copied().unwrap_or(0)
    }

    /// Data bytes following the status byte
    pub fn data(&self) -> &[u8] {
        self.0.get(1..).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawFrame[{}]", format_hex(&self.0))
    }
}

/// Result of one extraction attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// A complete frame and the number of buffered bytes it consumed
    Frame { frame: RawFrame, consumed: usize },
    /// Bytes consumed without producing a frame (resynchronisation)
    Skip(usize),
    /// More bytes are needed
    Incomplete,
}

/// Stateful demultiplexer from bytes to frames
#[derive(Debug, Default)]
pub struct FrameExtractor {
    /// Bytes received but not yet consumed by a frame
    pending: BytesMut,
    /// Most recent channel-voice status byte, for running status
    running_status: Option<u8>,
    /// A note-on was emitted before its note-off could be seen
    note_off_expected: bool,
}

impl FrameExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop buffered bytes and running status
    pub fn reset(&mut self) {
        self.pending.clear();
        self.running_status = None;
        self.note_off_expected = false;
    }

    /// Number of buffered bytes waiting for completion
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Append a chunk and return every frame that is now complete
    ///
    /// Never blocks: leftover bytes stay buffered until the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        self.pending.extend_from_slice(chunk);

        let mut frames = Vec::new();
        loop {
            let pending = std::mem::take(&mut self.pending);
            let outcome = self.extract(&pending);
            self.pending = pending;

            match outcome {
                Extraction::Frame { frame, consumed } => {
                    trace!("Frame {:?} ({} bytes consumed)", frame, consumed);
                    self.pending.advance(consumed);
                    frames.push(frame);
                }
                Extraction::Skip(consumed) => {
                    self.pending.advance(consumed);
                }
                Extraction::Incomplete => break,
            }
        }
        frames
    }

    /// Try to take one frame from the start of `buf`
    ///
    /// Updates running status as a side effect, so the caller must drop the
    /// consumed bytes before calling again.
    pub fn extract(&mut self, buf: &[u8]) -> Extraction {
        let Some(&first) = buf.first() else {
            return Extraction::Incomplete;
        };

        if first >= 0x80 {
            if first < 0xF8 {
                self.note_off_expected = false;
            }
            return self.extract_with_status(first, &buf[1..], 1);
        }

        let Some(status) = self.running_status else {
            debug!("Orphan data byte {:02X} without status, skipping", first);
            return Extraction::Skip(1);
        };

        if self.note_off_expected {
            match buf {
                [_] => return Extraction::Incomplete,
                [_, 0x00, ..] => {
                    trace!("Dropping note-off paired with previous note-on");
                    self.note_off_expected = false;
                    return Extraction::Skip(2);
                }
                _ => self.note_off_expected = false,
            }
        }

        self.extract_with_status(status, buf, 0)
    }

    /// `data` starts right after the status byte; `header` is 1 when the
    /// status byte itself is in the buffer, 0 under running status.
    fn extract_with_status(&mut self, status: u8, data: &[u8], header: usize) -> Extraction {
        match status >> 4 {
            0x8..=0xE => {
                self.running_status = Some(status);

                let available = data.iter().take_while(|b| **b < 0x80).count();
                let interrupted = available < data.len();
                let data = &data[..available];

                match channel_message_len(status, data) {
                    Some(len) if data.len() >= len => {
                        // a lone note-on may still be followed by its note-off
                        self.note_off_expected = status >> 4 == 0x9 && len == 2 && data[1] != 0;

                        let mut frame = Vec::with_capacity(len + 1);
                        frame.push(status);
                        frame.extend_from_slice(&data[..len]);
                        Extraction::Frame {
                            frame: RawFrame::new(frame),
                            consumed: header + len,
                        }
                    }
                    _ if interrupted => {
                        debug!(
                            "Message {:02X} truncated after {} data bytes, dropping",
                            status,
                            data.len()
                        );
                        Extraction::Skip(header + data.len())
                    }
                    _ => Extraction::Incomplete,
                }
            }
            _ if status == SYSEX_START => {
                self.running_status = None;
                extract_sysex(data)
            }
            _ if status >= 0xF8 => {
                trace!("Skipping real-time byte {:02X}", status);
                Extraction::Skip(1)
            }
            _ => {
                debug!("Unsupported status byte {:02X}, skipping", status);
                self.running_status = None;
                Extraction::Skip(1)
            }
        }
    }
}

/// Number of data bytes the channel message takes, given the data bytes
/// buffered so far; `None` while that cannot be decided yet
fn channel_message_len(status: u8, data: &[u8]) -> Option<usize> {
    match status >> 4 {
        0xC | 0xD => Some(1),
        0xB if data.first() == Some(&NRPN_MSB) => Some(6),
        0xB if data.is_empty() => None,
        0x9 => note_on_len(data),
        _ => Some(2),
    }
}

/// A note-on followed by its note-off (`NOTE 00` under running status) is
/// one frame
fn note_on_len(data: &[u8]) -> Option<usize> {
    match data {
        [] | [_] => None,
        [_, 0x00, ..] => Some(2),
        [_, _, _, 0x00, ..] => Some(4),
        _ => Some(2),
    }
}

/// `data` starts right after the 0xF0 byte
fn extract_sysex(data: &[u8]) -> Extraction {
    for (i, &byte) in data.iter().enumerate() {
        if byte == SYSEX_END {
            let mut frame = Vec::with_capacity(i + 2);
            frame.push(SYSEX_START);
            frame.extend_from_slice(&data[..=i]);
            return Extraction::Frame {
                frame: RawFrame::new(frame),
                consumed: i + 2,
            };
        }
        if (0x80..0xF8).contains(&byte) {
            debug!(
                "SysEx interrupted by status {:02X} after {} bytes, dropping",
                byte,
                i + 1
            );
            return Extraction::Skip(i + 1);
        }
    }
    Extraction::Incomplete
}
