//! Conversion of tagged wire values into host values.
//!
//! Every supported tag has a fixed host type (see [`DataType::host_type`]) and a
//! fixed null sentinel (see [`null_sentinel`]). Conversion of one value has
//! three outcomes:
//!
//! - `Ok(Some(value))`: converted to the tag's host type
//! - `Ok(None)`: the raw value is the tag's null sentinel
//! - `Err(ConversionError)`: unsupported tag, or a raw encoding the tag cannot hold
//!
//! Vector conversion isolates failures per element: a failing element becomes
//! a null cell and its siblings are unaffected. Only an unsupported tag fails
//! the vector as a whole.
//!
//! Sentinel comparison cannot tell a legitimate value equal to the sentinel
//! apart from null (an empty STRING is the common case). That ambiguity is part
//! of the wire format and is deliberately left in place.

use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tracing::debug;

use crate::types::{ColumnValues, DataType, HostType, HostValue, RawValue, Scalar, TypedColumn, Vector};

const NANOS_PER_SEC: i64 = 1_000_000_000;
const SECS_PER_DAY: i64 = 86_400;

/// Widest scale a DECIMAL128 can carry; narrower decimals are held to the same bound.
pub const MAX_DECIMAL_SCALE: u32 = 38;

/// Conversion errors. Localised: callers drop the offending element or column.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("unsupported data type {data_type}")]
    UnsupportedType { data_type: DataType },

    #[error("cannot convert {found} value to {data_type}")]
    Mismatch {
        data_type: DataType,
        found: &'static str,
    },

    #[error("{data_type} value {value} is out of range")]
    OutOfRange { data_type: DataType, value: i64 },

    #[error("{data_type} scale {scale} exceeds 38")]
    ScaleOutOfRange { data_type: DataType, scale: u32 },
}

/// The raw value meaning "no data" for `data_type`, if the tag is supported.
///
/// For the decimal tags only the unscaled value is significant; the scale of
/// the returned sentinel is always zero.
pub fn null_sentinel(data_type: DataType) -> Option<RawValue> {
    let sentinel = match data_type {
        DataType::Bool | DataType::Char => RawValue::Byte(i8::MIN),
        DataType::Short => RawValue::Short(i16::MIN),
        DataType::Int
        | DataType::Date
        | DataType::Month
        | DataType::Time
        | DataType::Minute
        | DataType::Second
        | DataType::DateTime
        | DataType::DateHour
        | DataType::DateMinute => RawValue::Int(i32::MIN),
        DataType::Long | DataType::Timestamp | DataType::NanoTime | DataType::NanoTimestamp => {
            RawValue::Long(i64::MIN)
        }
        DataType::Float => RawValue::Float(-f32::MAX),
        DataType::Double => RawValue::Double(-f64::MAX),
        DataType::Symbol | DataType::SymbolExtended | DataType::String => {
            RawValue::Str(String::new())
        }
        DataType::Blob => RawValue::Blob(Vec::new()),
        DataType::Uuid | DataType::IpAddr | DataType::Int128 => RawValue::Bits128(0),
        DataType::Complex | DataType::Point => RawValue::Double2(-f64::MAX, -f64::MAX),
        DataType::Decimal32 => RawValue::Decimal32 { scale: 0, value: i32::MIN },
        DataType::Decimal64 => RawValue::Decimal64 { scale: 0, value: i64::MIN },
        DataType::Decimal128 => RawValue::Decimal128 { scale: 0, value: i128::MIN },
        DataType::Void | DataType::Any | DataType::Duration | DataType::Unknown(_) => return None,
    };
    Some(sentinel)
}

/// Whether `raw` is the null sentinel of `data_type`.
pub fn is_null(data_type: DataType, raw: &RawValue) -> bool {
    let Some(sentinel) = null_sentinel(data_type) else {
        return false;
    };
    match (raw, &sentinel) {
        (RawValue::Decimal32 { value, .. }, RawValue::Decimal32 { value: null, .. }) => value == null,
        (RawValue::Decimal64 { value, .. }, RawValue::Decimal64 { value: null, .. }) => value == null,
        (RawValue::Decimal128 { value, .. }, RawValue::Decimal128 { value: null, .. }) => value == null,
        // BLOB is read as text, so an empty string is the same "no data"
        (RawValue::Str(s), RawValue::Blob(_)) => s.is_empty(),
        _ => *raw == sentinel,
    }
}

/// Convert one raw value of `data_type`.
pub fn convert_value(data_type: DataType, raw: &RawValue) -> Result<Option<HostValue>, ConversionError> {
    let host_type = data_type
        .host_type()
        .ok_or(ConversionError::UnsupportedType { data_type })?;

    if is_null(data_type, raw) {
        return Ok(None);
    }
    check_scale(data_type, raw)?;

    let mismatch = || ConversionError::Mismatch {
        data_type,
        found: raw.kind(),
    };

    let value = match host_type {
        HostType::Bool => match raw {
            RawValue::Byte(b) => HostValue::Bool(*b != 0),
            _ => return Err(mismatch()),
        },
        HostType::Int16 => match raw {
            RawValue::Short(v) => HostValue::Int16(*v),
            _ => return Err(mismatch()),
        },
        HostType::Int32 => match raw {
            RawValue::Int(v) => HostValue::Int32(*v),
            RawValue::Short(v) => HostValue::Int32(i32::from(*v)),
            _ => return Err(mismatch()),
        },
        HostType::Int64 => match raw {
            RawValue::Long(v) => HostValue::Int64(*v),
            RawValue::Int(v) => HostValue::Int64(i64::from(*v)),
            RawValue::Short(v) => HostValue::Int64(i64::from(*v)),
            _ => return Err(mismatch()),
        },
        HostType::Float32 => match raw {
            RawValue::Float(v) => HostValue::Float32(*v),
            _ => return Err(mismatch()),
        },
        HostType::Float64 => match raw {
            RawValue::Double(v) => HostValue::Float64(*v),
            RawValue::Float(v) => HostValue::Float64(f64::from(*v)),
            RawValue::Decimal32 { scale, value } => HostValue::Float64(unscale(*value as f64, *scale)),
            RawValue::Decimal64 { scale, value } => HostValue::Float64(unscale(*value as f64, *scale)),
            _ => return Err(mismatch()),
        },
        HostType::String => HostValue::String(to_text(data_type, raw).ok_or_else(mismatch)?),
        HostType::Timestamp => HostValue::Timestamp(to_timestamp(data_type, raw)?),
    };

    Ok(Some(value))
}

/// Convert a scalar dataform.
pub fn convert_scalar(scalar: &Scalar) -> Result<Option<HostValue>, ConversionError> {
    convert_value(scalar.data_type, &scalar.value)
}

/// Convert a vector element-wise into a typed column body.
///
/// Null and unconvertible elements leave a `None` cell in place; the result
/// always has the same length as the input.
pub fn convert_vector(vector: &Vector) -> Result<ColumnValues, ConversionError> {
    let data_type = vector.data_type;
    let host_type = data_type
        .host_type()
        .ok_or(ConversionError::UnsupportedType { data_type })?;

    let mut values = ColumnValues::with_capacity(host_type, vector.len());
    for (index, raw) in vector.values.iter().enumerate() {
        match convert_value(data_type, raw) {
            Ok(cell) => {
                if let Err(rejected) = values.push(cell) {
                    debug!(index, %data_type, host_type = %rejected.host_type(), "element host type mismatch");
                    values.push_null();
                }
            }
            Err(e) => {
                debug!(index, %data_type, error = %e, "element conversion failed");
                values.push_null();
            }
        }
    }
    Ok(values)
}

/// Convert a vector into a named column.
pub fn convert_column(name: &str, vector: &Vector) -> Result<TypedColumn, ConversionError> {
    Ok(TypedColumn::new(name, convert_vector(vector)?))
}

fn check_scale(data_type: DataType, raw: &RawValue) -> Result<(), ConversionError> {
    match raw {
        RawValue::Decimal32 { scale, .. } | RawValue::Decimal64 { scale, .. } | RawValue::Decimal128 { scale, .. }
            if *scale > MAX_DECIMAL_SCALE =>
        {
            Err(ConversionError::ScaleOutOfRange {
                data_type,
                scale: *scale,
            })
        }
        _ => Ok(()),
    }
}

fn unscale(value: f64, scale: u32) -> f64 {
    value / 10f64.powi(scale as i32)
}

fn to_text(data_type: DataType, raw: &RawValue) -> Option<String> {
    let text = match (data_type, raw) {
        (DataType::Char, RawValue::Byte(c)) => char::from(*c as u8).to_string(),
        (DataType::Symbol | DataType::SymbolExtended | DataType::String, RawValue::Str(s)) => s.clone(),
        (DataType::Blob, RawValue::Blob(bytes)) => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => hex::encode(bytes),
        },
        (DataType::Blob, RawValue::Str(s)) => s.clone(),
        (DataType::Uuid, RawValue::Bits128(bits)) => uuid::Uuid::from_u128(*bits).to_string(),
        (DataType::IpAddr, RawValue::Bits128(bits)) => format_ip(*bits),
        (DataType::Int128, RawValue::Bits128(bits)) => format!("{:032x}", bits),
        (DataType::Complex, RawValue::Double2(re, im)) => {
            if im.is_sign_negative() {
                format!("{}{}i", re, im)
            } else {
                format!("{}+{}i", re, im)
            }
        }
        (DataType::Point, RawValue::Double2(x, y)) => format!("({}, {})", x, y),
        (DataType::Decimal128, RawValue::Decimal128 { scale, value }) => format_decimal(*value, *scale),
        _ => return None,
    };
    Some(text)
}

fn format_ip(bits: u128) -> String {
    if bits >> 32 == 0 {
        Ipv4Addr::from(bits as u32).to_string()
    } else {
        Ipv6Addr::from(bits).to_string()
    }
}

/// Exact decimal rendering of an unscaled integer.
fn format_decimal(value: i128, scale: u32) -> String {
    let digits = value.unsigned_abs().to_string();
    let sign = if value < 0 { "-" } else { "" };
    let scale = scale as usize;
    if scale == 0 {
        return format!("{}{}", sign, digits);
    }
    let padded = format!("{:0>width$}", digits, width = scale + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - scale);
    format!("{}{}.{}", sign, int_part, frac_part)
}

fn to_timestamp(data_type: DataType, raw: &RawValue) -> Result<DateTime<Utc>, ConversionError> {
    let mismatch = ConversionError::Mismatch {
        data_type,
        found: raw.kind(),
    };
    let count = match raw {
        RawValue::Int(v) => i64::from(*v),
        RawValue::Long(v) => *v,
        _ => return Err(mismatch),
    };
    let out_of_range = ConversionError::OutOfRange {
        data_type,
        value: count,
    };

    let timestamp = match data_type {
        DataType::Date => count.checked_mul(SECS_PER_DAY).and_then(|s| from_seconds(s, 0)),
        DataType::Month => from_month_count(count),
        DataType::Time | DataType::Timestamp => {
            from_seconds(count.div_euclid(1_000), (count.rem_euclid(1_000) * 1_000_000) as u32)
        }
        DataType::Second | DataType::DateTime => from_seconds(count, 0),
        DataType::Minute | DataType::DateMinute => count.checked_mul(60).and_then(|s| from_seconds(s, 0)),
        DataType::DateHour => count.checked_mul(3_600).and_then(|s| from_seconds(s, 0)),
        DataType::NanoTime | DataType::NanoTimestamp => from_seconds(
            count.div_euclid(NANOS_PER_SEC),
            count.rem_euclid(NANOS_PER_SEC) as u32,
        ),
        _ => return Err(mismatch),
    };

    timestamp.ok_or(out_of_range)
}

fn from_seconds(secs: i64, nanos: u32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, nanos)
}

/// MONTH values count months since January of year 0.
fn from_month_count(count: i64) -> Option<DateTime<Utc>> {
    let year = i32::try_from(count.div_euclid(12)).ok()?;
    let month = count.rem_euclid(12) as u32 + 1;
    let date = NaiveDate::from_ymd_opt(year, month, 1)?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}
