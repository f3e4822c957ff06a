//! Wire-level type tags and the host types they convert to.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A wire-level type tag as carried by every dataform.
///
/// Serialised as its numeric code so dumps round-trip unchanged. Codes the
/// crate does not know about are kept as `Unknown` and treated as unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum DataType {
    Void,
    Bool,
    Char,
    Short,
    Int,
    Long,
    Date,
    Month,
    Time,
    Minute,
    Second,
    DateTime,
    Timestamp,
    NanoTime,
    NanoTimestamp,
    Float,
    Double,
    Symbol,
    String,
    Uuid,
    Any,
    DateHour,
    DateMinute,
    IpAddr,
    Int128,
    Blob,
    Complex,
    Point,
    Duration,
    Decimal32,
    Decimal64,
    Decimal128,
    /// Symbol vectors sent with their dictionary inline.
    SymbolExtended,
    Unknown(u8),
}

impl DataType {
    /// Numeric wire code of this tag.
    pub fn code(self) -> u8 {
        match self {
            Self::Void => 0,
            Self::Bool => 1,
            Self::Char => 2,
            Self::Short => 3,
            Self::Int => 4,
            Self::Long => 5,
            Self::Date => 6,
            Self::Month => 7,
            Self::Time => 8,
            Self::Minute => 9,
            Self::Second => 10,
            Self::DateTime => 11,
            Self::Timestamp => 12,
            Self::NanoTime => 13,
            Self::NanoTimestamp => 14,
            Self::Float => 15,
            Self::Double => 16,
            Self::Symbol => 17,
            Self::String => 18,
            Self::Uuid => 19,
            Self::Any => 25,
            Self::DateHour => 28,
            Self::DateMinute => 29,
            Self::IpAddr => 30,
            Self::Int128 => 31,
            Self::Blob => 32,
            Self::Complex => 34,
            Self::Point => 35,
            Self::Duration => 36,
            Self::Decimal32 => 37,
            Self::Decimal64 => 38,
            Self::Decimal128 => 39,
            Self::SymbolExtended => 145,
            Self::Unknown(code) => code,
        }
    }

    /// The host type values of this tag convert to.
    ///
    /// `None` means the tag is unsupported: scalars fail to convert and whole
    /// vectors/columns of this tag are rejected.
    pub fn host_type(self) -> Option<HostType> {
        let host = match self {
            Self::Bool => HostType::Bool,
            Self::Char
            | Self::Symbol
            | Self::SymbolExtended
            | Self::String
            | Self::Blob
            | Self::Uuid
            | Self::IpAddr
            | Self::Int128
            | Self::Complex
            | Self::Point
            | Self::Decimal128 => HostType::String,
            Self::Short => HostType::Int16,
            Self::Int => HostType::Int32,
            Self::Long => HostType::Int64,
            Self::Float => HostType::Float32,
            Self::Double | Self::Decimal32 | Self::Decimal64 => HostType::Float64,
            Self::Date
            | Self::Month
            | Self::Time
            | Self::Minute
            | Self::Second
            | Self::DateTime
            | Self::DateHour
            | Self::DateMinute
            | Self::Timestamp
            | Self::NanoTime
            | Self::NanoTimestamp => HostType::Timestamp,
            Self::Void | Self::Any | Self::Duration | Self::Unknown(_) => return None,
        };
        Some(host)
    }

    pub fn is_supported(self) -> bool {
        self.host_type().is_some()
    }

    /// Upper-case name as the database prints it.
    pub fn name(self) -> &'static str {
        match self {
            Self::Void => "VOID",
            Self::Bool => "BOOL",
            Self::Char => "CHAR",
            Self::Short => "SHORT",
            Self::Int => "INT",
            Self::Long => "LONG",
            Self::Date => "DATE",
            Self::Month => "MONTH",
            Self::Time => "TIME",
            Self::Minute => "MINUTE",
            Self::Second => "SECOND",
            Self::DateTime => "DATETIME",
            Self::Timestamp => "TIMESTAMP",
            Self::NanoTime => "NANOTIME",
            Self::NanoTimestamp => "NANOTIMESTAMP",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::Symbol => "SYMBOL",
            Self::String => "STRING",
            Self::Uuid => "UUID",
            Self::Any => "ANY",
            Self::DateHour => "DATEHOUR",
            Self::DateMinute => "DATEMINUTE",
            Self::IpAddr => "IPADDR",
            Self::Int128 => "INT128",
            Self::Blob => "BLOB",
            Self::Complex => "COMPLEX",
            Self::Point => "POINT",
            Self::Duration => "DURATION",
            Self::Decimal32 => "DECIMAL32",
            Self::Decimal64 => "DECIMAL64",
            Self::Decimal128 => "DECIMAL128",
            Self::SymbolExtended => "SYMBOL_EXTENDED",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<u8> for DataType {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Void,
            1 => Self::Bool,
            2 => Self::Char,
            3 => Self::Short,
            4 => Self::Int,
            5 => Self::Long,
            6 => Self::Date,
            7 => Self::Month,
            8 => Self::Time,
            9 => Self::Minute,
            10 => Self::Second,
            11 => Self::DateTime,
            12 => Self::Timestamp,
            13 => Self::NanoTime,
            14 => Self::NanoTimestamp,
            15 => Self::Float,
            16 => Self::Double,
            17 => Self::Symbol,
            18 => Self::String,
            19 => Self::Uuid,
            25 => Self::Any,
            28 => Self::DateHour,
            29 => Self::DateMinute,
            30 => Self::IpAddr,
            31 => Self::Int128,
            32 => Self::Blob,
            34 => Self::Complex,
            35 => Self::Point,
            36 => Self::Duration,
            37 => Self::Decimal32,
            38 => Self::Decimal64,
            39 => Self::Decimal128,
            145 => Self::SymbolExtended,
            other => Self::Unknown(other),
        }
    }
}

impl From<DataType> for u8 {
    fn from(tag: DataType) -> Self {
        tag.code()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "UNKNOWN({})", code),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Primitive host types a typed column can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostType {
    Bool,
    String,
    Float64,
    Float32,
    Int64,
    Int32,
    Int16,
    Timestamp,
}

impl HostType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::String => "string",
            Self::Float64 => "float64",
            Self::Float32 => "float32",
            Self::Int64 => "int64",
            Self::Int32 => "int32",
            Self::Int16 => "int16",
            Self::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
