//! Raw wire values as delivered by the client library, before any conversion.

use serde::{Deserialize, Serialize};

/// One undecoded cell of a dataform.
///
/// The variant reflects the wire encoding, not the logical type: temporal tags
/// travel as `Int`/`Long` counts, UUIDs and IP addresses as 128-bit words, and
/// nulls as the per-tag sentinel rather than as a distinct variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawValue {
    /// Payload of a VOID scalar (a script that returns nothing).
    Void,
    /// BOOL and CHAR cells.
    Byte(i8),
    /// SHORT cells.
    Short(i16),
    /// INT cells, and the 32-bit temporal counts (DATE, MONTH, TIME, MINUTE,
    /// SECOND, DATETIME, DATEHOUR, DATEMINUTE).
    Int(i32),
    /// LONG cells, and TIMESTAMP, NANOTIME and NANOTIMESTAMP counts.
    Long(i64),
    /// FLOAT cells.
    Float(f32),
    /// DOUBLE cells.
    Double(f64),
    /// STRING and SYMBOL cells. Also BLOB when the client already decoded it.
    Str(String),
    /// BLOB cells as raw bytes.
    Blob(Vec<u8>),
    /// UUID, IPADDR and INT128 cells. Dumped as a decimal string.
    Bits128(#[serde(with = "as_text")] u128),
    /// COMPLEX (real, imaginary) and POINT (x, y) cells.
    Double2(f64, f64),
    /// DECIMAL32 cells: `value / 10^scale`.
    Decimal32 { scale: u32, value: i32 },
    /// DECIMAL64 cells: `value / 10^scale`.
    Decimal64 { scale: u32, value: i64 },
    /// DECIMAL128 cells: `value / 10^scale`. The value is dumped as a decimal
    /// string.
    Decimal128 {
        scale: u32,
        #[serde(with = "as_text")]
        value: i128,
    },
}

/// Serde codec writing a value through its `Display` form.
///
/// Dataforms are internally tagged, and serde buffers tagged content in a form
/// that cannot carry 128-bit integers.
mod as_text {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(D::Error::custom)
    }
}

impl RawValue {
    /// Short name of the wire encoding, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Byte(_) => "byte",
            Self::Short(_) => "short",
            Self::Int(_) => "int",
            Self::Long(_) => "long",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::Str(_) => "string",
            Self::Blob(_) => "blob",
            Self::Bits128(_) => "bits128",
            Self::Double2(_, _) => "double2",
            Self::Decimal32 { .. } => "decimal32",
            Self::Decimal64 { .. } => "decimal64",
            Self::Decimal128 { .. } => "decimal128",
        }
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        Self::Byte(b as i8)
    }
}

impl From<i16> for RawValue {
    fn from(v: i16) -> Self {
        Self::Short(v)
    }
}

impl From<i32> for RawValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f32> for RawValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}
