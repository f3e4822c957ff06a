//! Shared types: wire tags, raw dataforms and converted columns.

mod column;
mod data_type;
mod dataform;
mod raw;

pub use column::{stringify, ColumnValues, Frame, HostValue, TypedColumn, ValuePair};
pub use data_type::{DataType, HostType};
pub use dataform::{DataForm, Dictionary, Matrix, Scalar, Table, Vector};
pub use raw::RawValue;
