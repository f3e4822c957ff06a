use std::error::Error;

use ddb::{ValuePair, transform_to_values};
use serde::Serialize;

use super::ValuesCmd;
use crate::commands::{Execute, load_dataform};

/// Result of the values command execution
#[derive(Debug, Serialize)]
pub struct ValuesResult {
    pub source: String,
    pub form: String,
    pub values: Vec<ValuePair>,
}

impl Execute for ValuesCmd {
    type Output = ValuesResult;

    fn execute(self) -> Result<Self::Output, Box<dyn Error>> {
        let dataform = load_dataform(&self.dump)?;
        let values = transform_to_values(&dataform)?;
        Ok(ValuesResult {
            source: self.dump.display().to_string(),
            form: dataform.form_name().to_string(),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::dump;
    use ddb::{DataForm, DataType, HostValue, RawValue, Table, Vector};
    use rstest::rstest;

    fn run(dataform: &DataForm) -> Result<ValuesResult, Box<dyn Error>> {
        let file = dump(dataform);
        ValuesCmd {
            dump: file.path().to_path_buf(),
        }
        .execute()
    }

    #[rstest]
    fn test_vector_values() {
        let vector = Vector::new(DataType::Long, vec![1i64.into(), i64::MIN.into(), 3i64.into()]);
        let result = run(&DataForm::Vector(vector)).unwrap();

        assert_eq!(result.form, "vector");
        let texts: Vec<_> = result.values.iter().map(|v| v.text.as_str()).collect();
        assert_eq!(texts, vec!["1", "", "3"]);
        assert_eq!(result.values[1].value, None);
        assert_eq!(result.values[2].value, Some(HostValue::Int64(3)));
    }

    #[rstest]
    fn test_decimal128_vector_values() {
        let vector = Vector::new(
            DataType::Decimal128,
            vec![
                RawValue::Decimal128 { scale: 2, value: -123_456 },
                RawValue::Decimal128 { scale: 0, value: i128::MIN },
                RawValue::Decimal128 { scale: 0, value: i128::MAX },
            ],
        );
        let result = run(&DataForm::Vector(vector)).unwrap();

        let texts: Vec<_> = result.values.iter().map(|v| v.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["-1234.56", "", "170141183460469231731687303715884105727"]
        );
    }

    #[rstest]
    fn test_single_column_table() {
        let table = Table::new(vec![(
            "sym".to_string(),
            Vector::new(DataType::Symbol, vec!["a".into(), "b".into()]),
        )]);
        let result = run(&DataForm::Table(table)).unwrap();
        assert_eq!(result.values.len(), 2);
    }

    #[rstest]
    fn test_multi_column_table_is_ambiguous() {
        let table = Table::new(vec![
            ("a".to_string(), Vector::new(DataType::Int, vec![1.into()])),
            ("b".to_string(), Vector::new(DataType::Int, vec![2.into()])),
        ]);
        let err = run(&DataForm::Table(table)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ambiguous column selection: table contains 2 columns"
        );
    }
}
