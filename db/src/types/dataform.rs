//! Tagged, self-describing result values returned by the database.

use serde::{Deserialize, Serialize};

use super::data_type::DataType;
use super::raw::RawValue;

/// A single tagged value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scalar {
    pub data_type: DataType,
    pub value: RawValue,
}

impl Scalar {
    pub fn new(data_type: DataType, value: impl Into<RawValue>) -> Self {
        Self {
            data_type,
            value: value.into(),
        }
    }
}

/// A homogeneous sequence of raw values sharing one tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub data_type: DataType,
    pub values: Vec<RawValue>,
}

impl Vector {
    pub fn new(data_type: DataType, values: Vec<RawValue>) -> Self {
        Self { data_type, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Named columns of equal length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub column_names: Vec<String>,
    pub columns: Vec<Vector>,
}

impl Table {
    /// Builds a table from `(name, column)` pairs, preserving their order.
    pub fn new(columns: Vec<(String, Vector)>) -> Self {
        let (column_names, columns) = columns.into_iter().unzip();
        Self {
            column_names,
            columns,
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(Vector::len).unwrap_or(0)
    }

    pub fn column(&self, index: usize) -> Option<(&str, &Vector)> {
        let name = self.column_names.get(index)?;
        let column = self.columns.get(index)?;
        Some((name.as_str(), column))
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Vector)> {
        self.column_names
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter())
    }
}

/// Row-major matrix. Received but never transformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub columns: usize,
    pub data: Vector,
}

/// Key/value mapping. Received but never transformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dictionary {
    pub keys: Vector,
    pub values: Vector,
}

/// The result of a script execution or of a table snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "lowercase")]
pub enum DataForm {
    Scalar(Scalar),
    Vector(Vector),
    Pair(Vector),
    Set(Vector),
    Table(Table),
    Matrix(Matrix),
    Dictionary(Dictionary),
}

impl DataForm {
    /// Lower-case name of the dataform kind, for logs and errors.
    pub fn form_name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Vector(_) => "vector",
            Self::Pair(_) => "pair",
            Self::Set(_) => "set",
            Self::Table(_) => "table",
            Self::Matrix(_) => "matrix",
            Self::Dictionary(_) => "dictionary",
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        Table::new(vec![
            (
                "id".to_string(),
                Vector::new(DataType::Int, vec![RawValue::Int(1), RawValue::Int(2)]),
            ),
            (
                "sym".to_string(),
                Vector::new(DataType::Symbol, vec!["a".into(), "b".into()]),
            ),
        ])
    }

    #[test]
    fn test_table_shape() {
        let table = sample_table();
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.row_count(), 2);
        let (name, column) = table.column(1).unwrap();
        assert_eq!(name, "sym");
        assert_eq!(column.data_type, DataType::Symbol);
        assert!(table.column(2).is_none());
    }

    #[test]
    fn test_empty_table_has_no_rows() {
        let table = Table::new(vec![]);
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.columns().count(), 0);
    }

    #[test]
    fn test_dataform_json_shape() {
        let form = DataForm::Scalar(Scalar::new(DataType::Int, 1));
        let json = serde_json::to_value(&form).unwrap();
        assert_eq!(json["form"], "scalar");
        assert_eq!(json["data_type"], 4);
        assert_eq!(json["value"]["int"], 1);

        let back: DataForm = serde_json::from_value(json).unwrap();
        assert_eq!(back, form);
    }

    #[test]
    fn test_table_dump_parses() {
        let json = r#"{
            "form": "table",
            "column_names": ["price"],
            "columns": [{"data_type": 16, "values": [{"double": 1.5}, {"double": 2.5}]}]
        }"#;
        let form: DataForm = serde_json::from_str(json).unwrap();
        let table = form.as_table().unwrap();
        assert_eq!(table.column_names, vec!["price"]);
        assert_eq!(table.columns[0].values[1], RawValue::Double(2.5));
    }
}
