//! DLMS data types: the tagged value tree carried in notification bodies
//! and the COSEM date-time encoding.

use alloc::{string::String, vec::Vec};
use core::convert::TryFrom;
use core::fmt;

use derive_try_from_primitive::TryFromPrimitive;
use nom::{
    IResult, Parser,
    multi::length_count,
    number::streaming::{be_f32, be_f64, be_i16, be_i32, be_i64, be_u16, be_u32, be_u64, i8, u8},
};
#[cfg(feature = "serde")]
use serde::{Serialize, Serializer};

use crate::Error;

/// Wire tags of the data types this crate decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
#[non_exhaustive]
#[rustfmt::skip]
pub enum DataType {
  Null               =  0,
  Structure          =  2,
  DoubleLong         =  5,
  DoubleLongUnsigned =  6,
  OctetString        =  9,
  VisibleString      = 10,
  Utf8String         = 12,
  Integer            = 15,
  Long               = 16,
  Unsigned           = 17,
  LongUnsigned       = 18,
  Long64             = 20,
  Long64Unsigned     = 21,
  Enum               = 22,
  Float32            = 23,
  Float64            = 24,
  DateTime           = 25,
  Date               = 26,
  Time               = 27,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Date {
    pub(crate) year: u16,
    pub(crate) month: u8,
    pub(crate) day_of_month: u8,
    pub(crate) day_of_week: u8,
}

impl Date {
    fn parse(input: &[u8]) -> IResult<&[u8], Self, Error> {
        let (input, (year, month, day_of_month, day_of_week)) =
            (be_u16, u8, u8, u8).parse(input)?;
        Ok((input, Self { year, month, day_of_month, day_of_week }))
    }

    /// Wildcard fields (`0xFFFF` year, `0xFF` others) are kept verbatim.
    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day_of_month(&self) -> u8 {
        self.day_of_month
    }

    pub fn day_of_week(&self) -> u8 {
        self.day_of_week
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day_of_month)
    }
}

impl fmt::Debug for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Date").field(&format_args!("{self}")).finish()
    }
}

#[cfg(feature = "serde")]
impl Serialize for Date {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Time {
    pub(crate) hour: Option<u8>,
    pub(crate) minute: Option<u8>,
    pub(crate) second: Option<u8>,
    pub(crate) hundredth: Option<u8>,
}

/// Decode one time-of-day byte: `0xFF` is the "not specified" wildcard,
/// anything past `max` is malformed.
fn time_component(byte: u8, max: u8) -> Result<Option<u8>, nom::Err<Error>> {
    match byte {
        0xff => Ok(None),
        value if value <= max => Ok(Some(value)),
        _ => Err(nom::Err::Failure(Error::InvalidFormat)),
    }
}

impl Time {
    fn parse(input: &[u8]) -> IResult<&[u8], Self, Error> {
        let (input, (hour, minute, second, hundredth)) = (u8, u8, u8, u8).parse(input)?;
        let time = Self {
            hour: time_component(hour, 23)?,
            minute: time_component(minute, 59)?,
            second: time_component(second, 59)?,
            hundredth: time_component(hundredth, 99)?,
        };
        Ok((input, time))
    }

    /// `None` means "not specified" (`0xFF` on the wire).
    pub fn hour(&self) -> Option<u8> {
        self.hour
    }

    pub fn minute(&self) -> Option<u8> {
        self.minute
    }

    pub fn second(&self) -> Option<u8> {
        self.second
    }

    pub fn hundredth(&self) -> Option<u8> {
        self.hundredth
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hour.unwrap_or(0),
            self.minute.unwrap_or(0),
            self.second.unwrap_or(0),
        )?;
        if let Some(hundredth) = self.hundredth {
            write!(f, ".{hundredth:02}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Time").field(&format_args!("{self}")).finish()
    }
}

#[cfg(feature = "serde")]
impl Serialize for Time {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Clock status byte of a COSEM date-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct ClockStatus(pub(crate) u8);

impl ClockStatus {
    fn bit(self, index: u8) -> bool {
        self.0 & (1 << index) != 0
    }

    /// The raw status byte.
    pub fn raw(self) -> u8 {
        self.0
    }

    /// The clock lost its setting (e.g. power down past the reserve).
    pub fn invalid_value(self) -> bool {
        self.bit(0)
    }

    pub fn doubtful_value(self) -> bool {
        self.bit(1)
    }

    pub fn different_clock_base(self) -> bool {
        self.bit(2)
    }

    pub fn invalid_clock_status(self) -> bool {
        self.bit(3)
    }

    pub fn daylight_saving_active(self) -> bool {
        self.bit(7)
    }
}

/// A 12-byte COSEM date-time: date, time, UTC deviation in minutes, and the
/// clock status byte. Deviation `0x8000` and status `0xFF` mean "not
/// specified" and decode to `None`.
#[derive(Clone, PartialEq, Eq)]
pub struct DateTime {
    pub(crate) date: Date,
    pub(crate) time: Time,
    pub(crate) offset_minutes: Option<i16>,
    pub(crate) clock_status: Option<ClockStatus>,
}

/// Wire sentinel for an unspecified UTC deviation.
const NO_DEVIATION: i16 = 0x8000u16 as i16;
/// Wire sentinel for an unspecified clock status.
const NO_CLOCK_STATUS: u8 = 0xFF;

impl DateTime {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self, Error> {
        let (input, date) = Date::parse(input)?;
        let (input, time) = Time::parse(input)?;
        let (input, deviation) = be_i16(input)?;
        let (input, status) = u8(input)?;

        let offset_minutes = if deviation == NO_DEVIATION { None } else { Some(deviation) };
        let clock_status =
            if status == NO_CLOCK_STATUS { None } else { Some(ClockStatus(status)) };

        Ok((input, Self { date, time, offset_minutes, clock_status }))
    }

    pub fn date(&self) -> &Date {
        &self.date
    }

    pub fn time(&self) -> &Time {
        &self.time
    }

    /// Deviation of local time from UTC in minutes.
    pub fn offset_minutes(&self) -> Option<i16> {
        self.offset_minutes
    }

    pub fn clock_status(&self) -> Option<&ClockStatus> {
        self.clock_status.as_ref()
    }

    #[cfg(feature = "chrono-conversions")]
    /// Convert to a [`chrono::NaiveDateTime`].
    ///
    /// Returns `None` when any date or time-of-day field is a wildcard or
    /// out of range for a calendar date.
    pub fn to_chrono(&self) -> Option<chrono::NaiveDateTime> {
        let date = chrono::NaiveDate::from_ymd_opt(
            i32::from(self.date.year),
            u32::from(self.date.month),
            u32::from(self.date.day_of_month),
        )?;
        let time = chrono::NaiveTime::from_hms_milli_opt(
            u32::from(self.time.hour?),
            u32::from(self.time.minute?),
            u32::from(self.time.second?),
            u32::from(self.time.hundredth.unwrap_or(0)) * 10,
        )?;
        Some(date.and_time(time))
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T{}", self.date, self.time)?;

        if let Some(deviation) = self.offset_minutes {
            // Deviation counts minutes behind UTC, so the printed zone sign
            // flips.
            let (sign, minutes) = if deviation > 0 { ('-', deviation) } else { ('+', -deviation) };
            write!(f, "{sign}{:02}:{:02}", minutes / 60, minutes % 60)?;
        }

        Ok(())
    }
}

impl fmt::Debug for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DateTime").field(&format_args!("{self}")).finish()
    }
}

#[cfg(feature = "serde")]
impl Serialize for DateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// A decoded DLMS data value.
///
/// `Structure` owns its children, so a notification body decodes into a
/// tree. Unknown wire tags fail the parse with [`Error::UnknownDataTag`].
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Data {
    Null,
    OctetString(Vec<u8>),
    VisibleString(String),
    Utf8String(String),
    Integer(i8),
    Unsigned(u8),
    Long(i16),
    LongUnsigned(u16),
    DoubleLong(i32),
    DoubleLongUnsigned(u32),
    Long64(i64),
    Long64Unsigned(u64),
    Float32(f32),
    Float64(f64),
    DateTime(DateTime),
    Date(Date),
    Time(Time),
    Structure(Vec<Data>),
    Enum(u8),
}

impl Data {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self, Error> {
        let (input, data_type) = u8(input)?;
        let data_type = DataType::try_from(data_type)
            .map_err(|tag| nom::Err::Failure(Error::UnknownDataTag(tag)))?;
        Ok(match data_type {
            DataType::Null => (input, Data::Null),
            DataType::Structure => {
                let (input, structure) = length_count(u8, Self::parse).parse(input)?;
                (input, Data::Structure(structure))
            }
            DataType::OctetString => {
                let (input, bytes) = length_count(u8, u8).parse(input)?;
                (input, Data::OctetString(bytes))
            }
            DataType::VisibleString => {
                let (input, bytes) = length_count(u8, u8).parse(input)?;
                let string = String::from_utf8(bytes)
                    .map_err(|_| nom::Err::Failure(Error::InvalidFormat))?;
                (input, Data::VisibleString(string))
            }
            DataType::Utf8String => {
                let (input, bytes) = length_count(u8, u8).parse(input)?;
                let string = String::from_utf8(bytes)
                    .map_err(|_| nom::Err::Failure(Error::InvalidFormat))?;
                (input, Data::Utf8String(string))
            }
            DataType::Integer => {
                let (input, n) = i8(input)?;
                (input, Data::Integer(n))
            }
            DataType::Unsigned => {
                let (input, n) = u8(input)?;
                (input, Data::Unsigned(n))
            }
            DataType::Long => {
                let (input, n) = be_i16(input)?;
                (input, Data::Long(n))
            }
            DataType::LongUnsigned => {
                let (input, n) = be_u16(input)?;
                (input, Data::LongUnsigned(n))
            }
            DataType::DoubleLong => {
                let (input, n) = be_i32(input)?;
                (input, Data::DoubleLong(n))
            }
            DataType::DoubleLongUnsigned => {
                let (input, n) = be_u32(input)?;
                (input, Data::DoubleLongUnsigned(n))
            }
            DataType::Long64 => {
                let (input, n) = be_i64(input)?;
                (input, Data::Long64(n))
            }
            DataType::Long64Unsigned => {
                let (input, n) = be_u64(input)?;
                (input, Data::Long64Unsigned(n))
            }
            DataType::Enum => {
                let (input, n) = u8(input)?;
                (input, Data::Enum(n))
            }
            DataType::Float32 => {
                let (input, n) = be_f32(input)?;
                (input, Data::Float32(n))
            }
            DataType::Float64 => {
                let (input, n) = be_f64(input)?;
                (input, Data::Float64(n))
            }
            DataType::DateTime => {
                let (input, date_time) = DateTime::parse(input)?;
                (input, Data::DateTime(date_time))
            }
            DataType::Date => {
                let (input, date) = Date::parse(input)?;
                (input, Data::Date(date))
            }
            DataType::Time => {
                let (input, time) = Time::parse(input)?;
                (input, Data::Time(time))
            }
        })
    }

    /// The DLMS name of the wire type, as used in decoded mappings.
    pub fn type_name(&self) -> &'static str {
        match self {
            Data::Null => "null_data",
            Data::OctetString(_) => "octet_string",
            Data::VisibleString(_) => "visible_string",
            Data::Utf8String(_) => "utf8_string",
            Data::Integer(_) => "integer",
            Data::Unsigned(_) => "unsigned",
            Data::Long(_) => "long",
            Data::LongUnsigned(_) => "long_unsigned",
            Data::DoubleLong(_) => "double_long",
            Data::DoubleLongUnsigned(_) => "double_long_unsigned",
            Data::Long64(_) => "long64",
            Data::Long64Unsigned(_) => "long64_unsigned",
            Data::Float32(_) => "float32",
            Data::Float64(_) => "float64",
            Data::DateTime(_) => "date_time",
            Data::Date(_) => "date",
            Data::Time(_) => "time",
            Data::Structure(_) => "structure",
            Data::Enum(_) => "enum",
        }
    }
}
