//! Reading datasets from CSV and writing scored datasets back out.

pub mod export;
mod normalizer;
mod parser;

use std::io::Read;
use std::path::Path;

use crate::engine::{Dataset, DatasetError};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("inconsistent dataset: {0}")]
    Dataset(#[from] DatasetError),
}

pub struct DatasetLoader;

impl DatasetLoader {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Dataset, IngestError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Dataset, IngestError> {
        let (columns, rows) = parser::parse_table(reader)?.into_typed();
        let dataset = Dataset::new(columns, rows)?;
        tracing::debug!(
            rows = dataset.row_count(),
            columns = dataset.columns().len(),
            "dataset loaded"
        );
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CellValue, ColumnKind};
    use chrono::TimeZone;
    use std::io::Cursor;

    #[test]
    fn infers_column_kinds_and_missing_cells() {
        let dataset = DatasetLoader::from_reader(Cursor::new(
            "date,region,conversion_rate,notes\n\
             2025-09-01,north,0.10,\n\
             2025-09-02,south,,\n\
             2025-09-03,east,0.30,\n",
        ))
        .expect("dataset loads");

        let kinds: Vec<_> = dataset.columns().iter().map(|column| column.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ColumnKind::Text,
                ColumnKind::Text,
                ColumnKind::Numeric,
                ColumnKind::Numeric
            ]
        );
        assert_eq!(
            dataset.cell(1, "conversion_rate"),
            Some(&CellValue::Missing)
        );
        assert_eq!(
            dataset.cell(2, "conversion_rate"),
            Some(&CellValue::Number(0.30))
        );
        assert_eq!(
            dataset.cell(0, "region"),
            Some(&CellValue::Text("north".to_string()))
        );
    }

    #[test]
    fn headers_are_cleaned() {
        let dataset = DatasetLoader::from_reader(Cursor::new(
            "\u{feff}Conversion   Rate , sessions\n0.1,100\n",
        ))
        .expect("dataset loads");

        assert!(dataset.column("Conversion Rate").is_some());
        assert!(dataset.column("sessions").is_some());
    }

    #[test]
    fn one_text_cell_makes_the_column_text() {
        let dataset = DatasetLoader::from_reader(Cursor::new("value\n1\n2\nthree\n"))
            .expect("dataset loads");
        assert_eq!(dataset.columns()[0].kind, ColumnKind::Text);
        assert_eq!(
            dataset.cell(0, "value"),
            Some(&CellValue::Text("1".to_string()))
        );
    }

    #[test]
    fn header_only_input_has_no_rows() {
        let dataset =
            DatasetLoader::from_reader(Cursor::new("conversion_rate\n")).expect("dataset loads");
        assert!(dataset.is_empty());
    }

    #[test]
    fn ragged_rows_are_csv_errors() {
        let err = DatasetLoader::from_reader(Cursor::new("a,b\n1,2\n3\n")).expect_err("ragged");
        assert!(matches!(err, IngestError::Csv(_)));
    }

    #[test]
    fn duplicate_headers_are_rejected() {
        let err = DatasetLoader::from_reader(Cursor::new("rate, rate\n1,2\n")).expect_err("dup");
        assert!(matches!(
            err,
            IngestError::Dataset(DatasetError::DuplicateColumn(_))
        ));
    }

    #[test]
    fn export_writes_header_and_empty_missing_cells() {
        let dataset = DatasetLoader::from_reader(Cursor::new("region,rate\nnorth,0.1\nsouth,\n"))
            .expect("dataset loads");

        let csv = export::to_csv_string(&dataset).expect("export");

        assert_eq!(csv, "region,rate\nnorth,0.1\nsouth,\n");
    }

    #[test]
    fn annotated_file_names_carry_a_utc_timestamp() {
        let timestamp = chrono::Utc
            .with_ymd_and_hms(2025, 9, 24, 10, 30, 0)
            .single()
            .expect("valid timestamp");
        assert_eq!(
            export::annotated_file_name(timestamp),
            "annotated_2025-09-24T10:30:00Z.csv"
        );
    }
}
