//! The DLMS data-notification APDU pushed by the meter.

use nom::{
    IResult, Parser,
    multi::length_value,
    number::streaming::{be_u32, u8},
};

use crate::llc::LlcHeader;
use crate::{Data, DateTime, Error, map_nom_error};

/// APDU tag of a DataNotification.
const APDU_TAG_DATA_NOTIFICATION: u8 = 0x0F;

/// The 32-bit Long-Invoke-Id-And-Priority field: a 24-bit invoke id plus
/// priority, service class, and processing flags in the top byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongInvokeIdAndPriority(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceClass {
    Confirmed,
    Unconfirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingOption {
    ContinueOnError,
    BreakOnError,
}

impl LongInvokeIdAndPriority {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self, Error> {
        let (input, id) = be_u32(input)?;
        Ok((input, Self(id)))
    }

    pub fn priority(&self) -> Priority {
        if (self.0 & (1 << 31)) == 0 { Priority::Normal } else { Priority::High }
    }

    pub fn service_class(&self) -> ServiceClass {
        if (self.0 & (1 << 30)) == 0 { ServiceClass::Unconfirmed } else { ServiceClass::Confirmed }
    }

    pub fn processing_option(&self) -> ProcessingOption {
        if (self.0 & (1 << 29)) == 0 {
            ProcessingOption::ContinueOnError
        } else {
            ProcessingOption::BreakOnError
        }
    }

    pub fn self_descriptive(&self) -> bool {
        (self.0 & (1 << 28)) != 0
    }

    pub fn invoke_id(&self) -> u32 {
        self.0 & 0x00ff_ffff
    }
}

/// A decoded data-notification: invoke id, the meter's timestamp, and the
/// notification body holding the measurement list.
#[derive(Debug, Clone, PartialEq)]
pub struct DataNotification {
    pub(crate) long_invoke_id_and_priority: LongInvokeIdAndPriority,
    pub(crate) date_time: DateTime,
    pub(crate) notification_body: Data,
}

impl DataNotification {
    /// Parse the APDU: tag, invoke id, length-prefixed date-time, body.
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self, Error> {
        let (input, tag) = u8(input)?;
        if tag != APDU_TAG_DATA_NOTIFICATION {
            return Err(nom::Err::Failure(Error::UnsupportedApdu(tag)));
        }
        let (input, long_invoke_id_and_priority) = LongInvokeIdAndPriority::parse(input)?;
        let (input, date_time) = length_value(u8, DateTime::parse).parse(input)?;
        let (input, notification_body) = Data::parse(input)?;
        Ok((input, Self { long_invoke_id_and_priority, date_time, notification_body }))
    }

    pub fn long_invoke_id_and_priority(&self) -> LongInvokeIdAndPriority {
        self.long_invoke_id_and_priority
    }

    pub fn priority(&self) -> Priority {
        self.long_invoke_id_and_priority.priority()
    }

    pub fn service_class(&self) -> ServiceClass {
        self.long_invoke_id_and_priority.service_class()
    }

    pub fn processing_option(&self) -> ProcessingOption {
        self.long_invoke_id_and_priority.processing_option()
    }

    pub fn self_descriptive(&self) -> bool {
        self.long_invoke_id_and_priority.self_descriptive()
    }

    pub fn invoke_id(&self) -> u32 {
        self.long_invoke_id_and_priority.invoke_id()
    }

    pub fn date_time(&self) -> &DateTime {
        &self.date_time
    }

    pub fn notification_body(&self) -> &Data {
        &self.notification_body
    }
}

/// Decode a frame's information field: LLC prefix, then the
/// data-notification APDU.
///
/// This is the entry point for the bytes in [`HdlcFrame::information`].
///
/// [`HdlcFrame::information`]: crate::HdlcFrame::information
pub fn decode_information(information: &[u8]) -> Result<DataNotification, Error> {
    let (input, _llc) = LlcHeader::parse(information)?;
    let (_input, notification) = map_nom_error(DataNotification::parse(input))?;
    Ok(notification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    // Kamstrup example: 10 second list, three phases, four quadrants.
    const NO_LIST_1_THREE_PHASE: &str = concat!(
        "e6e700",                     // LLC: dsap, ssap, quality
        "0f",                         // APDU tag: data-notification
        "00000000",                   // long-invoke-id-and-priority
        "0c07d0010106162100ff800001", // date-time, length-prefixed
        "0219",                       // structure of 0x19 elements
        "0a0e4b616d73747275705f5630303031",
        "09060101000005ff",
        "0a1035373036353637303030303030303030",
        "09060101600101ff",
        "0a12303030303030303030303030303030303030",
        "09060101010700ff0600000000",
        "09060101020700ff0600000000",
        "09060101030700ff0600000000",
        "09060101040700ff0600000000",
        "090601011f0700ff0600000000",
        "09060101330700ff0600000000",
        "09060101470700ff0600000000",
        "09060101200700ff120000",
        "09060101340700ff120000",
        "09060101480700ff120000",
    );

    #[test]
    fn test_invoke_id_bit_fields() {
        let id = LongInvokeIdAndPriority(0xf0ff_ffff);
        assert_eq!(id.priority(), Priority::High);
        assert_eq!(id.service_class(), ServiceClass::Confirmed);
        assert_eq!(id.processing_option(), ProcessingOption::BreakOnError);
        assert!(id.self_descriptive());
        assert_eq!(id.invoke_id(), 0x00ff_ffff);

        let id = LongInvokeIdAndPriority(0x4000_0042);
        assert_eq!(id.priority(), Priority::Normal);
        assert_eq!(id.service_class(), ServiceClass::Confirmed);
        assert_eq!(id.processing_option(), ProcessingOption::ContinueOnError);
        assert!(!id.self_descriptive());
        assert_eq!(id.invoke_id(), 0x42);
    }

    #[test]
    fn test_decode_three_phase_list() {
        let information = hex::decode(NO_LIST_1_THREE_PHASE).unwrap();
        let notification = decode_information(&information).unwrap();

        assert_eq!(notification.invoke_id(), 0);
        assert_eq!(notification.priority(), Priority::Normal);
        assert_eq!(notification.date_time().to_string(), "2000-01-01T22:33:00");
        assert!(notification.date_time().clock_status().is_some());

        let Data::Structure(items) = notification.notification_body() else {
            panic!("body is not a structure");
        };
        assert_eq!(items.len(), 0x19);
        assert_eq!(items[0], Data::VisibleString("Kamstrup_V0001".to_string()));
        assert_eq!(items[6], Data::DoubleLongUnsigned(0));
    }

    #[test]
    fn test_decode_rejects_bad_llc() {
        let information = hex::decode(NO_LIST_1_THREE_PHASE).unwrap();
        let mut broken = information.clone();
        broken[1] = 0xe6;
        assert_eq!(decode_information(&broken), Err(Error::InvalidLlc));
    }

    #[test]
    fn test_decode_rejects_unsupported_apdu() {
        // A get-response tag instead of a data-notification.
        let information = [0xe6, 0xe7, 0x00, 0xc4, 0x01, 0x02];
        assert_eq!(decode_information(&information), Err(Error::UnsupportedApdu(0xc4)));
    }

    #[test]
    fn test_decode_truncated_apdu() {
        let information = hex::decode(NO_LIST_1_THREE_PHASE).unwrap();
        let result = decode_information(&information[..information.len() - 4]);
        assert!(matches!(result, Err(Error::Incomplete(_))));
    }
}
