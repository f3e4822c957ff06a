//! Transformation of dataforms into frames and flat value lists.

use tracing::{debug, error};

use crate::convert::{convert_column, convert_scalar, convert_vector};
use crate::error::DatasourceError;
use crate::types::{ColumnValues, DataForm, Frame, Table, ValuePair, Vector};

/// Transform a result into a named frame of typed columns.
///
/// Only tables have a column structure. A column whose tag cannot be converted
/// is logged and left out; the remaining columns keep their source order and
/// names.
pub fn transform_to_table(dataform: &DataForm, label: &str) -> Result<Frame, DatasourceError> {
    match dataform {
        DataForm::Table(table) => Ok(table_to_frame(table, label)),
        other => Err(DatasourceError::UnsupportedDataform {
            form: other.form_name(),
        }),
    }
}

fn table_to_frame(table: &Table, label: &str) -> Frame {
    let mut frame = Frame::new(label);
    for (name, column) in table.columns() {
        match convert_column(name, column) {
            Ok(field) => frame.fields.push(field),
            Err(e) => error!(column = name, error = %e, "column transform error"),
        }
    }
    debug!(
        label,
        source_columns = table.column_count(),
        columns = frame.fields.len(),
        rows = frame.row_count(),
        "transformed table"
    );
    frame
}

/// Transform a result into a flat list of display/value pairs.
///
/// Scalars give one pair; vectors, pairs and sets give one pair per element; a
/// table must have exactly one column, which is flattened the same way.
pub fn transform_to_values(dataform: &DataForm) -> Result<Vec<ValuePair>, DatasourceError> {
    match dataform {
        DataForm::Scalar(scalar) => {
            let value = convert_scalar(scalar).map_err(|source| DatasourceError::UnsupportedColumn {
                column: "scalar".to_string(),
                source,
            })?;
            Ok(vec![ValuePair::new(value)])
        }
        DataForm::Vector(vector) | DataForm::Pair(vector) | DataForm::Set(vector) => {
            vector_to_values(dataform.form_name(), vector)
        }
        DataForm::Table(table) => table_to_values(table),
        DataForm::Matrix(_) | DataForm::Dictionary(_) => Err(DatasourceError::UnsupportedDataform {
            form: dataform.form_name(),
        }),
    }
}

fn table_to_values(table: &Table) -> Result<Vec<ValuePair>, DatasourceError> {
    if table.column_count() > 1 {
        return Err(DatasourceError::AmbiguousSelection {
            columns: table.column_count(),
        });
    }
    match table.column(0) {
        Some((name, column)) => vector_to_values(name, column),
        None => Ok(Vec::new()),
    }
}

fn vector_to_values(name: &str, vector: &Vector) -> Result<Vec<ValuePair>, DatasourceError> {
    let values = convert_vector(vector).map_err(|source| DatasourceError::UnsupportedColumn {
        column: name.to_string(),
        source,
    })?;
    Ok(pairs(&values))
}

fn pairs(values: &ColumnValues) -> Vec<ValuePair> {
    values.iter().map(ValuePair::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, Dictionary, HostType, HostValue, Matrix, RawValue, Scalar};

    fn int_vector(values: &[i32]) -> Vector {
        Vector::new(DataType::Int, values.iter().map(|v| RawValue::Int(*v)).collect())
    }

    fn three_column_table() -> Table {
        Table::new(vec![
            ("id".to_string(), int_vector(&[1, 2])),
            (
                "blob_of_any".to_string(),
                Vector::new(DataType::Any, vec![RawValue::Int(0), RawValue::Int(0)]),
            ),
            (
                "price".to_string(),
                Vector::new(DataType::Double, vec![RawValue::Double(1.5), RawValue::Double(-f64::MAX)]),
            ),
        ])
    }

    #[test]
    fn test_table_drops_unsupported_column_only() {
        let frame = transform_to_table(&DataForm::Table(three_column_table()), "Response A").unwrap();

        assert_eq!(frame.name, "Response A");
        assert_eq!(frame.field_names(), vec!["id", "price"]);
        assert_eq!(frame.fields[0].values, ColumnValues::Int32(vec![Some(1), Some(2)]));
        assert_eq!(frame.fields[1].values, ColumnValues::Float64(vec![Some(1.5), None]));
    }

    #[test]
    fn test_table_preserves_column_order() {
        let table = Table::new(vec![
            ("z".to_string(), int_vector(&[1])),
            ("a".to_string(), Vector::new(DataType::Symbol, vec!["x".into()])),
            ("m".to_string(), Vector::new(DataType::Bool, vec![true.into()])),
        ]);
        let frame = transform_to_table(&DataForm::Table(table), "r").unwrap();
        assert_eq!(frame.field_names(), vec!["z", "a", "m"]);
        assert_eq!(frame.fields[2].host_type(), HostType::Bool);
    }

    #[test]
    fn test_table_with_all_columns_unsupported_is_empty_frame() {
        let table = Table::new(vec![(
            "v".to_string(),
            Vector::new(DataType::Void, vec![RawValue::Void]),
        )]);
        let frame = transform_to_table(&DataForm::Table(table), "r").unwrap();
        assert!(frame.fields.is_empty());
    }

    #[test]
    fn test_non_table_in_table_mode_is_unsupported() {
        let scalar = DataForm::Scalar(Scalar::new(DataType::Int, 1));
        let err = transform_to_table(&scalar, "r").unwrap_err();
        assert!(matches!(err, DatasourceError::UnsupportedDataform { form: "scalar" }));
    }

    #[test]
    fn test_values_rejects_multi_column_table() {
        let table = Table::new(vec![
            ("a".to_string(), int_vector(&[1])),
            ("b".to_string(), int_vector(&[2])),
        ]);
        let err = transform_to_values(&DataForm::Table(table)).unwrap_err();
        assert!(matches!(err, DatasourceError::AmbiguousSelection { columns: 2 }));
    }

    #[test]
    fn test_values_from_single_column_table() {
        let table = Table::new(vec![(
            "sym".to_string(),
            Vector::new(DataType::Symbol, vec!["AAPL".into(), "".into(), "MSFT".into()]),
        )]);
        let values = transform_to_values(&DataForm::Table(table)).unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0].text, "AAPL");
        assert_eq!(values[0].value, Some(HostValue::String("AAPL".to_string())));
        assert_eq!(values[1].text, "");
        assert_eq!(values[1].value, None);
        assert_eq!(values[2].text, "MSFT");
    }

    #[test]
    fn test_values_from_empty_table() {
        let values = transform_to_values(&DataForm::Table(Table::new(vec![]))).unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn test_values_single_column_unsupported_tag() {
        let table = Table::new(vec![(
            "d".to_string(),
            Vector::new(DataType::Duration, vec![RawValue::Int(1)]),
        )]);
        let err = transform_to_values(&DataForm::Table(table)).unwrap_err();
        assert!(matches!(err, DatasourceError::UnsupportedColumn { ref column, .. } if column == "d"));
    }

    #[test]
    fn test_values_from_scalar() {
        let values = transform_to_values(&DataForm::Scalar(Scalar::new(DataType::Int, 1))).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].text, "1");
        assert_eq!(values[0].value, Some(HostValue::Int32(1)));
    }

    #[test]
    fn test_values_from_null_scalar() {
        let values =
            transform_to_values(&DataForm::Scalar(Scalar::new(DataType::Long, i64::MIN))).unwrap();
        assert_eq!(values, vec![ValuePair { text: String::new(), value: None }]);
    }

    #[test]
    fn test_values_from_vector_pair_and_set() {
        let vector = int_vector(&[3, i32::MIN, 5]);
        for form in [
            DataForm::Vector(vector.clone()),
            DataForm::Pair(vector.clone()),
            DataForm::Set(vector.clone()),
        ] {
            let values = transform_to_values(&form).unwrap();
            let texts: Vec<_> = values.iter().map(|v| v.text.as_str()).collect();
            assert_eq!(texts, vec!["3", "", "5"], "form {}", form.form_name());
        }
    }

    #[test]
    fn test_values_rejects_matrix_and_dictionary() {
        let matrix = DataForm::Matrix(Matrix {
            rows: 1,
            columns: 1,
            data: int_vector(&[1]),
        });
        let dictionary = DataForm::Dictionary(Dictionary {
            keys: int_vector(&[1]),
            values: int_vector(&[2]),
        });
        for form in [matrix, dictionary] {
            let err = transform_to_values(&form).unwrap_err();
            assert!(matches!(err, DatasourceError::UnsupportedDataform { .. }));
        }
    }
}
