use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single cell of a tabular dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Missing,
}

impl CellValue {
    /// Finite numeric payload; NaN and infinities count as missing.
    pub fn as_finite(&self) -> Option<f64> {
        match self {
            CellValue::Number(value) if value.is_finite() => Some(*value),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(value) => write!(f, "{value}"),
            CellValue::Text(value) => f.write_str(value),
            CellValue::Missing => Ok(()),
        }
    }
}

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Numeric,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatasetError {
    #[error("column '{0}' is declared more than once")]
    DuplicateColumn(String),
    #[error("row {row} has {found} cells but the dataset declares {expected} columns")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("row {row} holds text in numeric column '{column}'")]
    TypeMismatch { row: usize, column: String },
    #[error("derived column '{column}' has {found} values for {expected} rows")]
    DerivedLength {
        column: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Ordered rows sharing one fixed set of columns.
///
/// Rows are stored positionally against `columns`, so every row carries
/// exactly the same column set for the lifetime of the value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: Vec<Vec<CellValue>>,
}

impl Dataset {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<CellValue>>) -> Result<Self, DatasetError> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(DatasetError::DuplicateColumn(column.name.clone()));
            }
        }

        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(DatasetError::RaggedRow {
                    row: index,
                    expected: columns.len(),
                    found: row.len(),
                });
            }

            for (column, cell) in columns.iter().zip(row) {
                if column.kind == ColumnKind::Numeric && matches!(cell, CellValue::Text(_)) {
                    return Err(DatasetError::TypeMismatch {
                        row: index,
                        column: column.name.clone(),
                    });
                }
            }
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn numeric_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(|column| column.kind == ColumnKind::Numeric)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&CellValue> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|cells| &cells[index])
    }

    /// Finite values of a numeric column, `None` where the cell is missing.
    ///
    /// Returns `None` when the column is absent or not numeric.
    pub fn numeric_values(&self, column: &str) -> Option<Vec<Option<f64>>> {
        let index = self.column_index(column)?;
        if self.columns[index].kind != ColumnKind::Numeric {
            return None;
        }

        Some(self.rows.iter().map(|row| row[index].as_finite()).collect())
    }

    /// Copy of the dataset with the derived scoring columns appended.
    ///
    /// A column that already carries one of the derived names is overwritten
    /// in place so re-scoring an exported file does not duplicate columns.
    /// Every derived vector must hold exactly one value per row.
    pub fn with_derived_columns(
        &self,
        derived: &DerivedColumns,
    ) -> Result<Dataset, DatasetError> {
        let mut columns = self.columns.clone();
        let mut rows = self.rows.clone();

        let numbers = |values: &[f64]| -> Vec<CellValue> {
            values.iter().map(|value| CellValue::Number(*value)).collect()
        };
        let entries = [
            (
                ANOMALY_SCORE_COLUMN,
                ColumnKind::Numeric,
                numbers(&derived.anomaly_score),
            ),
            (
                IMPACT_PROXY_COLUMN,
                ColumnKind::Numeric,
                numbers(&derived.impact_proxy),
            ),
            (SCORE_COLUMN, ColumnKind::Numeric, numbers(&derived.score)),
            (
                CONFIDENCE_BAND_COLUMN,
                ColumnKind::Text,
                derived
                    .confidence_band
                    .iter()
                    .map(|band| CellValue::Text(band.to_string()))
                    .collect(),
            ),
        ];

        for (name, _, values) in &entries {
            if values.len() != rows.len() {
                return Err(DatasetError::DerivedLength {
                    column: *name,
                    expected: rows.len(),
                    found: values.len(),
                });
            }
        }

        for (name, kind, values) in entries {
            match columns.iter().position(|column| column.name == name) {
                Some(index) => {
                    columns[index].kind = kind;
                    for (row, value) in rows.iter_mut().zip(values) {
                        row[index] = value;
                    }
                }
                None => {
                    columns.push(Column {
                        name: name.to_string(),
                        kind,
                    });
                    for (row, value) in rows.iter_mut().zip(values) {
                        row.push(value);
                    }
                }
            }
        }

        Ok(Dataset { columns, rows })
    }
}

pub const ANOMALY_SCORE_COLUMN: &str = "anomaly_score";
pub const IMPACT_PROXY_COLUMN: &str = "impact_proxy";
pub const SCORE_COLUMN: &str = "score";
pub const CONFIDENCE_BAND_COLUMN: &str = "confidence_band";

/// Per-row outputs of a scoring run, one entry per dataset row.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedColumns {
    pub anomaly_score: Vec<f64>,
    pub impact_proxy: Vec<f64>,
    pub score: Vec<f64>,
    pub confidence_band: Vec<&'static str>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(
            vec![Column::text("region"), Column::numeric("revenue")],
            vec![
                vec![CellValue::Text("north".into()), CellValue::Number(10.0)],
                vec![CellValue::Text("south".into()), CellValue::Missing],
            ],
        )
        .expect("valid dataset")
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = Dataset::new(
            vec![Column::numeric("a"), Column::numeric("b")],
            vec![vec![CellValue::Number(1.0)]],
        )
        .expect_err("ragged row rejected");
        assert_eq!(
            err,
            DatasetError::RaggedRow {
                row: 0,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn rejects_text_in_numeric_column() {
        let err = Dataset::new(
            vec![Column::numeric("a")],
            vec![vec![CellValue::Text("n/a".into())]],
        )
        .expect_err("type mismatch rejected");
        assert!(matches!(err, DatasetError::TypeMismatch { row: 0, .. }));
    }

    #[test]
    fn rejects_duplicate_columns() {
        let err = Dataset::new(vec![Column::numeric("a"), Column::text("a")], Vec::new())
            .expect_err("duplicate rejected");
        assert_eq!(err, DatasetError::DuplicateColumn("a".to_string()));
    }

    #[test]
    fn numeric_values_treat_non_finite_as_missing() {
        let dataset = Dataset::new(
            vec![Column::numeric("a")],
            vec![
                vec![CellValue::Number(f64::NAN)],
                vec![CellValue::Number(f64::INFINITY)],
                vec![CellValue::Number(2.5)],
            ],
        )
        .expect("valid dataset");
        assert_eq!(
            dataset.numeric_values("a"),
            Some(vec![None, None, Some(2.5)])
        );
        assert_eq!(dataset.numeric_values("missing"), None);
    }

    #[test]
    fn derived_columns_leave_source_untouched() {
        let dataset = sample();
        let derived = DerivedColumns {
            anomaly_score: vec![0.0, 1.0],
            impact_proxy: vec![0.5, 0.0],
            score: vec![0.35, 0.3],
            confidence_band: vec!["Low", "High"],
        };

        let augmented = dataset
            .with_derived_columns(&derived)
            .expect("one value per row");

        assert_eq!(dataset.columns().len(), 2);
        assert_eq!(augmented.columns().len(), 6);
        assert_eq!(
            augmented.cell(1, CONFIDENCE_BAND_COLUMN),
            Some(&CellValue::Text("High".into()))
        );

        let rescored = augmented
            .with_derived_columns(&derived)
            .expect("one value per row");
        assert_eq!(rescored.columns().len(), 6);
        assert_eq!(rescored, augmented);
    }

    #[test]
    fn short_derived_column_is_rejected() {
        let derived = DerivedColumns {
            anomaly_score: vec![0.0, 1.0],
            impact_proxy: vec![0.5],
            score: vec![0.35, 0.3],
            confidence_band: vec!["Low", "High"],
        };

        let err = sample()
            .with_derived_columns(&derived)
            .expect_err("short vector rejected");

        assert_eq!(
            err,
            DatasetError::DerivedLength {
                column: IMPACT_PROXY_COLUMN,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn missing_cells_are_reported_as_missing() {
        let dataset = sample();

        assert!(dataset
            .cell(1, "revenue")
            .is_some_and(CellValue::is_missing));
        assert!(!dataset
            .cell(0, "revenue")
            .is_some_and(CellValue::is_missing));
        assert_eq!(dataset.cell(5, "revenue"), None);
    }
}
