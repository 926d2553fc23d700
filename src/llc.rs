//! LLC PDU prefix of the information field.

use nom::Parser;
use nom::number::streaming::u8;

use crate::{Error, map_nom_error};

const DSAP_RESPONSE: u8 = 0xE6;
const SSAP_RESPONSE: u8 = 0xE7;

/// The three-byte logical link control prefix (`E6 E7 00`) carried by every
/// pushed notification: destination SAP, source SAP, quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlcHeader {
    pub dsap: u8,
    pub ssap: u8,
    pub quality: u8,
}

impl LlcHeader {
    /// Parse and validate the prefix, returning the remaining input.
    ///
    /// Only the meter-to-client response form is accepted; anything else is
    /// [`Error::InvalidLlc`].
    pub fn parse(input: &[u8]) -> Result<(&[u8], Self), Error> {
        let (input, (dsap, ssap, quality)) = map_nom_error((u8, u8, u8).parse(input))?;
        if dsap != DSAP_RESPONSE || ssap != SSAP_RESPONSE || quality != 0x00 {
            return Err(Error::InvalidLlc);
        }
        Ok((input, Self { dsap, ssap, quality }))
    }
}
