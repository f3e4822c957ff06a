//! Statically-typed, null-aware columns produced by conversion.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::data_type::HostType;

/// A single converted cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HostValue {
    /// BOOL.
    Bool(bool),
    /// Text, and every tag rendered as text: CHAR, SYMBOL, STRING, BLOB,
    /// UUID, IPADDR, INT128, POINT, COMPLEX and DECIMAL128.
    String(String),
    /// DOUBLE, DECIMAL32 and DECIMAL64.
    Float64(f64),
    /// FLOAT.
    Float32(f32),
    /// LONG.
    Int64(i64),
    /// INT.
    Int32(i32),
    /// SHORT.
    Int16(i16),
    /// Every temporal tag, anchored at the Unix epoch in UTC.
    Timestamp(DateTime<Utc>),
}

impl HostValue {
    /// The host type this value belongs to.
    pub fn host_type(&self) -> HostType {
        match self {
            Self::Bool(_) => HostType::Bool,
            Self::String(_) => HostType::String,
            Self::Float64(_) => HostType::Float64,
            Self::Float32(_) => HostType::Float32,
            Self::Int64(_) => HostType::Int64,
            Self::Int32(_) => HostType::Int32,
            Self::Int16(_) => HostType::Int16,
            Self::Timestamp(_) => HostType::Timestamp,
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::String(v) => f.write_str(v),
            Self::Float64(v) => write!(f, "{}", v),
            Self::Float32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

/// Render an optional cell for display. Null renders as the empty string.
pub fn stringify(value: Option<&HostValue>) -> String {
    value.map(ToString::to_string).unwrap_or_default()
}

/// Homogeneous cell storage. `None` marks a null or unconvertible cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnValues {
    Bool(Vec<Option<bool>>),
    String(Vec<Option<String>>),
    Float64(Vec<Option<f64>>),
    Float32(Vec<Option<f32>>),
    Int64(Vec<Option<i64>>),
    Int32(Vec<Option<i32>>),
    Int16(Vec<Option<i16>>),
    Timestamp(Vec<Option<DateTime<Utc>>>),
}

impl ColumnValues {
    /// Empty storage for `host_type` with room for `capacity` cells.
    pub fn with_capacity(host_type: HostType, capacity: usize) -> Self {
        match host_type {
            HostType::Bool => Self::Bool(Vec::with_capacity(capacity)),
            HostType::String => Self::String(Vec::with_capacity(capacity)),
            HostType::Float64 => Self::Float64(Vec::with_capacity(capacity)),
            HostType::Float32 => Self::Float32(Vec::with_capacity(capacity)),
            HostType::Int64 => Self::Int64(Vec::with_capacity(capacity)),
            HostType::Int32 => Self::Int32(Vec::with_capacity(capacity)),
            HostType::Int16 => Self::Int16(Vec::with_capacity(capacity)),
            HostType::Timestamp => Self::Timestamp(Vec::with_capacity(capacity)),
        }
    }

    /// The host type every cell shares, fixed at construction.
    pub fn host_type(&self) -> HostType {
        match self {
            Self::Bool(_) => HostType::Bool,
            Self::String(_) => HostType::String,
            Self::Float64(_) => HostType::Float64,
            Self::Float32(_) => HostType::Float32,
            Self::Int64(_) => HostType::Int64,
            Self::Int32(_) => HostType::Int32,
            Self::Int16(_) => HostType::Int16,
            Self::Timestamp(_) => HostType::Timestamp,
        }
    }

    /// Number of cells, nulls included.
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::String(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::Timestamp(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a cell.
    ///
    /// `None` always succeeds. A value of another host type is handed back
    /// unchanged and nothing is appended.
    pub fn push(&mut self, value: Option<HostValue>) -> Result<(), HostValue> {
        let Some(value) = value else {
            self.push_null();
            return Ok(());
        };
        match (self, value) {
            (Self::Bool(v), HostValue::Bool(x)) => v.push(Some(x)),
            (Self::String(v), HostValue::String(x)) => v.push(Some(x)),
            (Self::Float64(v), HostValue::Float64(x)) => v.push(Some(x)),
            (Self::Float32(v), HostValue::Float32(x)) => v.push(Some(x)),
            (Self::Int64(v), HostValue::Int64(x)) => v.push(Some(x)),
            (Self::Int32(v), HostValue::Int32(x)) => v.push(Some(x)),
            (Self::Int16(v), HostValue::Int16(x)) => v.push(Some(x)),
            (Self::Timestamp(v), HostValue::Timestamp(x)) => v.push(Some(x)),
            (_, other) => return Err(other),
        }
        Ok(())
    }

    /// Append a null cell. Never changes the host type.
    pub fn push_null(&mut self) {
        match self {
            Self::Bool(v) => v.push(None),
            Self::String(v) => v.push(None),
            Self::Float64(v) => v.push(None),
            Self::Float32(v) => v.push(None),
            Self::Int64(v) => v.push(None),
            Self::Int32(v) => v.push(None),
            Self::Int16(v) => v.push(None),
            Self::Timestamp(v) => v.push(None),
        }
    }

    /// Cell at `index`. Outer `None` is out of bounds, inner `None` is null.
    pub fn get(&self, index: usize) -> Option<Option<HostValue>> {
        let cell = match self {
            Self::Bool(v) => v.get(index)?.map(HostValue::Bool),
            Self::String(v) => v.get(index)?.clone().map(HostValue::String),
            Self::Float64(v) => v.get(index)?.map(HostValue::Float64),
            Self::Float32(v) => v.get(index)?.map(HostValue::Float32),
            Self::Int64(v) => v.get(index)?.map(HostValue::Int64),
            Self::Int32(v) => v.get(index)?.map(HostValue::Int32),
            Self::Int16(v) => v.get(index)?.map(HostValue::Int16),
            Self::Timestamp(v) => v.get(index)?.map(HostValue::Timestamp),
        };
        Some(cell)
    }

    /// Cells in order, `None` for null.
    pub fn iter(&self) -> impl Iterator<Item = Option<HostValue>> + '_ {
        (0..self.len()).map(move |i| self.get(i).flatten())
    }

    /// Number of null cells.
    pub fn null_count(&self) -> usize {
        self.iter().filter(Option::is_none).count()
    }
}

/// A named column of one host type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypedColumn {
    pub name: String,
    pub values: ColumnValues,
}

impl TypedColumn {
    pub fn new(name: impl Into<String>, values: ColumnValues) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn host_type(&self) -> HostType {
        self.values.host_type()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A named table of typed columns, the shape handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub name: String,
    pub fields: Vec<TypedColumn>,
}

impl Frame {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_fields(name: impl Into<String>, fields: Vec<TypedColumn>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&TypedColumn> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Length of the first column; zero for a frame without fields.
    pub fn row_count(&self) -> usize {
        self.fields.first().map(TypedColumn::len).unwrap_or(0)
    }
}

/// One entry of a flat value list: display text plus the typed value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuePair {
    pub text: String,
    pub value: Option<HostValue>,
}

impl ValuePair {
    /// Pair `value` with its display text; null pairs with the empty string.
    pub fn new(value: Option<HostValue>) -> Self {
        Self {
            text: stringify(value.as_ref()),
            value,
        }
    }
}
