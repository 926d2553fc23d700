//! Projection of a notification body into OBIS-keyed measurements.
//!
//! Vendor push lists are flat structures alternating a six-byte
//! `octet_string` (the OBIS code) with the measurement value, optionally
//! led by an unlabeled version string and padded with `null_data` elements.
//! This module flattens that shape into ordered elements and a keyed map.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::{Data, DateTime, Error, ObisCode, decode_information};

/// Map key for the unlabeled version string leading vendor lists.
pub const LIST_VERSION_KEY: &str = "list_version";

/// One measurement from a notification body: the OBIS code (absent for
/// unlabeled entries), the wire type name, and the decoded value.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ObisElement {
    pub obis: Option<ObisCode>,
    pub value_type: &'static str,
    pub value: Data,
}

impl ObisElement {
    fn new(obis: Option<ObisCode>, value: &Data) -> Self {
        // The type reflects the wire tag even when the value is
        // reinterpreted below.
        let value_type = value.type_name();
        Self { obis, value_type, value: reinterpret_rtc(value) }
    }
}

/// A 12-byte octet string in a value slot carries an encoded date-time
/// (the RTC entry, e.g. OBIS `0.1.1.0.0.255`); surface it decoded when it
/// parses as one, verbatim otherwise.
fn reinterpret_rtc(value: &Data) -> Data {
    if let Data::OctetString(bytes) = value {
        if bytes.len() == 12 {
            if let Ok((_, date_time)) = DateTime::parse(bytes) {
                return Data::DateTime(date_time);
            }
        }
    }
    value.clone()
}

/// Flatten a notification body into ordered elements.
///
/// A six-byte `octet_string` starts a labeled pair with the following
/// element as its value; any other element stands alone with no OBIS code.
/// `null_data` padding produces no elements. The declared structure length
/// counts padding and codes, so it is not re-validated here.
pub fn obis_elements(body: &Data) -> Result<Vec<ObisElement>, Error> {
    let Data::Structure(items) = body else {
        return Err(Error::InvalidFormat);
    };

    let mut elements = Vec::new();
    let mut items = items.iter();
    while let Some(item) = items.next() {
        match item {
            Data::Null => continue,
            Data::OctetString(bytes) if bytes.len() == 6 => {
                let obis = ObisCode::from_bytes(bytes).ok_or(Error::InvalidFormat)?;
                let value = items.next().ok_or(Error::Incomplete(None))?;
                elements.push(ObisElement::new(Some(obis), value));
            }
            value => elements.push(ObisElement::new(None, value)),
        }
    }
    Ok(elements)
}

/// Decode a frame's information field into a mapping keyed by dotted OBIS
/// codes (`"A.B.C.D.E.F"`), with unlabeled entries under
/// [`LIST_VERSION_KEY`].
///
/// Unknown OBIS codes pass through; the projector is schema-neutral.
pub fn decode_frame_content(information: &[u8]) -> Result<BTreeMap<String, ObisElement>, Error> {
    let notification = decode_information(information)?;
    let elements = obis_elements(notification.notification_body())?;

    let mut decoded = BTreeMap::new();
    for element in elements {
        let key = match element.obis {
            Some(obis) => obis.to_string(),
            None => String::from(LIST_VERSION_KEY),
        };
        decoded.insert(key, element);
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    // Captured single-phase Kamstrup pushes (Norwegian list 1 and list 2).
    const NO_LIST_1_SINGLE_PHASE: &str = concat!(
        "e6e700",
        "0f",
        "00000000",
        "0c07e60111010c2c28ff800000",
        "0219",
        "0a0e4b616d73747275705f5630303031",                     // list version
        "09060101000005ff", "0a1035373035373035373035373035373032", // GS1 number
        "09060101600101ff", "0a1236383631313131424e323432313031303430", // meter type
        "09060101010700ff", "0600000768",                       // P14
        "09060101020700ff", "0600000000",                       // P23
        "09060101030700ff", "0600000000",                       // Q12
        "09060101040700ff", "06000001ed",                       // Q34
        "090601011f0700ff", "0600000380",                       // IL1
        "00000000",
        "09060101200700ff", "1200e1",                           // UL1
        "00000000",
    );

    const NO_LIST_2_SINGLE_PHASE: &str = concat!(
        "e6e700",
        "0f",
        "00000000",
        "0c07e50b1803000019ff800000",
        "0223",
        "0a0e4b616d73747275705f5630303031",
        "09060101000005ff", "0a1035373035373035373035373035373032",
        "09060101600101ff", "0a1236383631313131424e323432313031303430",
        "09060101010700ff", "0600002742",
        "09060101020700ff", "0600000000",
        "09060101030700ff", "0600000000",
        "09060101040700ff", "0600000117",
        "090601011f0700ff", "06000011a0", "00000000",
        "09060101200700ff", "1200df", "00000000",
        "09060001010000ff", "090c07e50b1803000019ff800000",     // RTC
        "09060101010800ff", "0600762ee2",                       // A14
        "09060101020800ff", "0600000000",                       // A23
        "09060101030800ff", "06000035a3",                       // R12
        "09060101040800ff", "0600116b53",                       // R34
    );

    #[test]
    fn test_elements_of_list_1() {
        let information = hex::decode(NO_LIST_1_SINGLE_PHASE).unwrap();
        let notification = decode_information(&information).unwrap();

        assert_eq!(notification.date_time().to_string(), "2022-01-17T12:44:40");
        let Data::Structure(items) = notification.notification_body() else {
            panic!("body is not a structure");
        };
        assert_eq!(items.len(), 0x19);

        let elements = obis_elements(notification.notification_body()).unwrap();
        // Null padding produces no elements.
        assert_eq!(elements.len(), 9);

        assert_eq!(elements[0].obis, None);
        assert_eq!(elements[0].value_type, "visible_string");
        assert_eq!(elements[0].value, Data::VisibleString("Kamstrup_V0001".into()));

        assert_eq!(elements[1].obis, Some(ObisCode::new(1, 1, 0, 0, 5, 255)));
        assert_eq!(elements[1].value, Data::VisibleString("5705705705705702".into()));

        assert_eq!(elements[2].obis, Some(ObisCode::new(1, 1, 96, 1, 1, 255)));
        assert_eq!(elements[2].value, Data::VisibleString("6861111BN242101040".into()));

        assert_eq!(elements[3].obis, Some(ObisCode::new(1, 1, 1, 7, 0, 255)));
        assert_eq!(elements[3].value_type, "double_long_unsigned");
        assert_eq!(elements[3].value, Data::DoubleLongUnsigned(1896));

        assert_eq!(elements[4].value, Data::DoubleLongUnsigned(0));
        assert_eq!(elements[5].value, Data::DoubleLongUnsigned(0));
        assert_eq!(elements[6].value, Data::DoubleLongUnsigned(493));
        assert_eq!(elements[7].value, Data::DoubleLongUnsigned(896));

        assert_eq!(elements[8].obis, Some(ObisCode::new(1, 1, 32, 7, 0, 255)));
        assert_eq!(elements[8].value_type, "long_unsigned");
        assert_eq!(elements[8].value, Data::LongUnsigned(225));
    }

    #[test]
    fn test_elements_of_list_2_with_rtc() {
        let information = hex::decode(NO_LIST_2_SINGLE_PHASE).unwrap();
        let notification = decode_information(&information).unwrap();

        assert_eq!(notification.date_time().to_string(), "2021-11-24T00:00:25");

        let elements = obis_elements(notification.notification_body()).unwrap();
        assert_eq!(elements.len(), 14);

        assert_eq!(elements[3].value, Data::DoubleLongUnsigned(10050));
        assert_eq!(elements[6].value, Data::DoubleLongUnsigned(279));
        assert_eq!(elements[7].value, Data::DoubleLongUnsigned(4512));
        assert_eq!(elements[8].value, Data::LongUnsigned(223));

        // The RTC slot keeps its wire type but decodes to a date-time.
        let rtc = &elements[9];
        assert_eq!(rtc.obis, Some(ObisCode::new(0, 1, 1, 0, 0, 255)));
        assert_eq!(rtc.value_type, "octet_string");
        let Data::DateTime(stamp) = &rtc.value else {
            panic!("RTC was not reinterpreted: {:?}", rtc.value);
        };
        assert_eq!(stamp.to_string(), "2021-11-24T00:00:25");

        assert_eq!(elements[10].value, Data::DoubleLongUnsigned(7_745_250));
        assert_eq!(elements[11].value, Data::DoubleLongUnsigned(0));
        assert_eq!(elements[12].value, Data::DoubleLongUnsigned(13_731));
        assert_eq!(elements[13].value, Data::DoubleLongUnsigned(1_141_587));
    }

    #[test]
    fn test_decode_frame_content_mapping() {
        let information = hex::decode(NO_LIST_1_SINGLE_PHASE).unwrap();
        let decoded = decode_frame_content(&information).unwrap();

        assert_eq!(decoded.len(), 9);
        assert_eq!(
            decoded[LIST_VERSION_KEY].value,
            Data::VisibleString("Kamstrup_V0001".into())
        );

        let power = &decoded["1.1.1.7.0.255"];
        assert_eq!(power.value_type, "double_long_unsigned");
        assert_eq!(power.value, Data::DoubleLongUnsigned(1896));

        let voltage = &decoded["1.1.32.7.0.255"];
        assert_eq!(voltage.value_type, "long_unsigned");
        assert_eq!(voltage.value, Data::LongUnsigned(225));
    }

    #[test]
    fn test_unparseable_12_byte_octet_string_stays_verbatim() {
        // Hour 0x30 is out of range, so this is not a date-time.
        let bytes = vec![0x07, 0xe5, 0x0b, 0x18, 0x03, 0x30, 0x00, 0x19, 0xff, 0x80, 0x00, 0x00];
        let body = Data::Structure(vec![
            Data::OctetString(vec![0, 1, 1, 0, 0, 255]),
            Data::OctetString(bytes.clone()),
        ]);

        let elements = obis_elements(&body).unwrap();
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].value_type, "octet_string");
        assert_eq!(elements[0].value, Data::OctetString(bytes));
    }

    #[test]
    fn test_obis_code_missing_value() {
        let body = Data::Structure(vec![Data::OctetString(vec![1, 1, 1, 7, 0, 255])]);
        assert_eq!(obis_elements(&body), Err(Error::Incomplete(None)));
    }

    #[test]
    fn test_body_must_be_structure() {
        assert_eq!(obis_elements(&Data::LongUnsigned(1)), Err(Error::InvalidFormat));
    }
}
