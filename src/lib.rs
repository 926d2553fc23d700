//! Decoder for smart-meter telemetry pushed on the HAN port of DLMS/COSEM
//! meters.
//!
//! The crate is split along the wire layers:
//!
//! - [`HdlcFrameReader`] turns an arbitrarily chunked byte stream into
//!   validated ISO/IEC 13239 type-3 HDLC frames ([`HdlcFrame`]), handling
//!   flag hunting, optional octet stuffing, abort sequences, and
//!   CRC-16/X-25 validation ([`Crc16`]).
//! - [`decode_information`] parses a frame's information field into a
//!   [`DataNotification`]: LLC prefix, APDU tag, long invoke id, COSEM
//!   date-time, and the tagged value tree ([`Data`]).
//! - [`decode_frame_content`] flattens the notification body into a mapping
//!   of dotted OBIS codes to typed values ([`ObisElement`]).
//!
//! The framing layer recovers locally from malformed input: bad frames are
//! discarded and the reader resynchronises on the next flag, so a noisy
//! serial line keeps producing frames. Decoding errors are surfaced through
//! [`Error`].
//!
//! ```
//! use han_decoder::HdlcFrameReader;
//!
//! let mut reader = HdlcFrameReader::new(false);
//! let chunk = [
//!     0x7e, 0xa0, 0x0c, 0x01, 0x02, 0x01, 0x10, 0x27, 0xa0, 0x02, 0x01,
//!     0xe7, 0xde, 0x7e,
//! ];
//! let frames = reader.read(&chunk);
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].information(), Some(&[0x02, 0x01][..]));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use core::fmt;
use core::num::NonZeroUsize;

mod crc;
mod data;
mod data_notification;
mod frame;
mod llc;
mod obis_code;
mod obis_list;
mod reader;

pub use crc::{Crc16, GOOD_FCS};
pub use data::{ClockStatus, Data, DataType, Date, DateTime, Time};
pub use data_notification::{
    DataNotification, LongInvokeIdAndPriority, Priority, ProcessingOption, ServiceClass,
    decode_information,
};
pub use frame::{HdlcFrame, HdlcFrameHeader, MAX_FRAME_LENGTH};
pub use llc::LlcHeader;
pub use obis_code::ObisCode;
pub use obis_list::{LIST_VERSION_KEY, ObisElement, decode_frame_content, obis_elements};
pub use reader::HdlcFrameReader;

/// Errors produced while accumulating frames or decoding their content.
///
/// Framing-layer variants (`FrameTooLong`, `InvalidAddress`) are handled
/// inside [`HdlcFrameReader`] by discarding the frame and resynchronising;
/// callers only see them when driving [`HdlcFrame::append`] directly.
/// APDU-layer variants surface from the decode entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Frame accumulation exceeded [`MAX_FRAME_LENGTH`].
    FrameTooLong,
    /// An address field ran past four bytes without a terminator bit.
    InvalidAddress,
    /// The information field does not start with the `E6 E7 00` LLC prefix.
    InvalidLlc,
    /// The APDU tag is not a data-notification (`0x0F`).
    UnsupportedApdu(u8),
    /// The notification body contains an unknown DLMS data type tag.
    UnknownDataTag(u8),
    /// The input ended before the structure it declared.
    Incomplete(Option<NonZeroUsize>),
    /// Malformed wire data.
    InvalidFormat,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::FrameTooLong => write!(f, "frame exceeds {MAX_FRAME_LENGTH} bytes"),
            Error::InvalidAddress => write!(f, "HDLC address field has no terminator"),
            Error::InvalidLlc => write!(f, "information field has no LLC response prefix"),
            Error::UnsupportedApdu(tag) => write!(f, "unsupported APDU tag 0x{tag:02x}"),
            Error::UnknownDataTag(tag) => write!(f, "unknown DLMS data type tag 0x{tag:02x}"),
            Error::Incomplete(Some(n)) => write!(f, "truncated input, needs {n} more bytes"),
            Error::Incomplete(None) => write!(f, "truncated input"),
            Error::InvalidFormat => write!(f, "invalid format"),
        }
    }
}

impl core::error::Error for Error {}

impl<I> nom::error::ParseError<I> for Error {
    fn from_error_kind(_input: I, _kind: nom::error::ErrorKind) -> Self {
        Error::InvalidFormat
    }

    fn append(_input: I, _kind: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

pub(crate) fn map_nom_error<I, O>(result: nom::IResult<I, O, Error>) -> Result<(I, O), Error> {
    match result {
        Ok(output) => Ok(output),
        Err(nom::Err::Incomplete(nom::Needed::Size(needed))) => Err(Error::Incomplete(Some(needed))),
        Err(nom::Err::Incomplete(nom::Needed::Unknown)) => Err(Error::Incomplete(None)),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(e),
    }
}
