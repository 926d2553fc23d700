//! Byte-fed HDLC frame reader.
//!
//! The reader is a state machine over the raw transport bytes: it hunts for
//! an opening flag, accumulates a frame, and emits it when the closing flag
//! arrives with a good length and check sequence. Anything malformed is
//! dropped and the reader resynchronises on the next flag, so the stream
//! stays useful after noise, aborts, or over-long frames.
//!
//! Two framing styles exist in the field. With octet stuffing enabled the
//! payload is made transparent (`7D`-escapes) and every raw `0x7E` is a
//! frame boundary. Without stuffing (the mode most meters push in) a `0x7E`
//! inside the information field is plain payload: the declared frame length
//! tells the reader how many bytes belong to the frame, and only the byte
//! after the last one can close it.

use alloc::vec::Vec;

use log::{debug, trace};

use crate::frame::HdlcFrame;

const FLAG_SEQUENCE: u8 = 0x7E;
const CONTROL_ESCAPE: u8 = 0x7D;
const ESCAPE_MASK: u8 = 0x20;

/// Transparency-mode substitution: `7D 5E` becomes `7E`, `7D 5D` becomes
/// `7D`.
#[derive(Debug, Default)]
struct Destuffer {
    escaped: bool,
}

impl Destuffer {
    /// Feed one raw byte; returns the destuffed byte, or `None` while an
    /// escape is pending.
    fn feed(&mut self, byte: u8) -> Option<u8> {
        if self.escaped {
            self.escaped = false;
            Some(byte ^ ESCAPE_MASK)
        } else if byte == CONTROL_ESCAPE {
            self.escaped = true;
            None
        } else {
            Some(byte)
        }
    }

    /// True when the previous byte was a control escape. A flag in this
    /// state is an abort sequence.
    fn pending(&self) -> bool {
        self.escaped
    }
}

#[derive(Debug)]
enum State {
    /// Scanning for the flag that opens a frame.
    Hunt,
    /// Accumulating a frame between flags.
    InFrame { frame: HdlcFrame, destuffer: Destuffer },
    /// Frame given up; bytes are ignored until the next flag.
    Drop,
}

/// Stateful reader turning arbitrarily chunked input into validated frames.
///
/// Feeding any partition of a byte sequence emits the same frames as
/// feeding it whole; partial frames are carried across [`read`] calls.
///
/// [`read`]: HdlcFrameReader::read
#[derive(Debug)]
pub struct HdlcFrameReader {
    use_octet_stuffing: bool,
    state: State,
}

impl HdlcFrameReader {
    /// `use_octet_stuffing` selects transparency-mode framing; most meter
    /// deployments push without it and rely on the length field.
    pub fn new(use_octet_stuffing: bool) -> Self {
        Self { use_octet_stuffing, state: State::Hunt }
    }

    /// Feed a chunk of raw bytes and collect every frame completed by it.
    pub fn read(&mut self, buffer: &[u8]) -> Vec<HdlcFrame> {
        let mut frames = Vec::new();
        for &byte in buffer {
            self.push_byte(byte, &mut frames);
        }
        frames
    }

    fn push_byte(&mut self, byte: u8, frames: &mut Vec<HdlcFrame>) {
        let state = core::mem::replace(&mut self.state, State::Hunt);
        self.state = match state {
            State::Hunt => {
                if byte == FLAG_SEQUENCE {
                    trace!("opening flag found, leaving hunt mode");
                    Self::open_frame()
                } else {
                    State::Hunt
                }
            }
            State::Drop => {
                if byte == FLAG_SEQUENCE {
                    Self::open_frame()
                } else {
                    State::Drop
                }
            }
            State::InFrame { frame, destuffer } => {
                self.frame_byte(frame, destuffer, byte, frames)
            }
        };
    }

    fn open_frame() -> State {
        State::InFrame { frame: HdlcFrame::new(), destuffer: Destuffer::default() }
    }

    /// A flag is payload rather than a boundary only in length-field
    /// framing, while the declared frame length has not been reached.
    fn flag_is_payload(&self, frame: &HdlcFrame) -> bool {
        !self.use_octet_stuffing
            && frame.header().frame_length().is_some_and(|length| frame.len() < length)
    }

    fn frame_byte(
        &self,
        mut frame: HdlcFrame,
        mut destuffer: Destuffer,
        byte: u8,
        frames: &mut Vec<HdlcFrame>,
    ) -> State {
        if byte == FLAG_SEQUENCE && !self.flag_is_payload(&frame) {
            if destuffer.pending() {
                debug!("abort sequence received, discarding {} bytes", frame.len());
                return Self::open_frame();
            }
            if frame.is_empty() {
                // A run of flags between frames opens nothing.
                return State::InFrame { frame, destuffer };
            }
            if frame.is_expected_length() && frame.is_good_fcs() && frame.header().is_type3() {
                trace!("frame received, {} bytes", frame.len());
                frames.push(frame);
            } else {
                debug!(
                    "discarding {} bytes at closing flag: bad length or check sequence",
                    frame.len()
                );
            }
            // The closing flag doubles as the opener of the next frame.
            return Self::open_frame();
        }

        let destuffed = if self.use_octet_stuffing {
            match destuffer.feed(byte) {
                Some(byte) => byte,
                None => return State::InFrame { frame, destuffer },
            }
        } else {
            byte
        };

        if let Err(error) = frame.append(destuffed) {
            debug!("discarding frame: {error}");
            return State::Drop;
        }
        if frame.header().frame_length().is_some_and(|length| frame.len() > length) {
            debug!("discarding frame: accumulation ran past the declared length");
            return State::Drop;
        }
        State::InFrame { frame, destuffer }
    }
}

impl Default for HdlcFrameReader {
    fn default() -> Self {
        Self::new(false)
    }
}
