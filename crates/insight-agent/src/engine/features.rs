use super::dataset::Dataset;
use super::stats::median;
use super::EngineError;

/// Numeric-only, fully imputed view of a dataset used for outlier scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Selects the numeric columns and replaces every missing cell with the
    /// median of the present values in its column (0 for an all-missing
    /// column).
    pub fn prepare(dataset: &Dataset) -> Result<Self, EngineError> {
        if dataset.is_empty() {
            return Err(EngineError::NoRows);
        }

        let columns: Vec<String> = dataset
            .numeric_columns()
            .map(|column| column.name.clone())
            .collect();
        if columns.is_empty() {
            return Err(EngineError::NoNumericColumns);
        }

        let mut rows = vec![Vec::with_capacity(columns.len()); dataset.row_count()];
        for name in &columns {
            let values = dataset.numeric_values(name).unwrap_or_default();
            let fill = median(values.iter().flatten().copied()).unwrap_or(0.0);
            for (row, value) in rows.iter_mut().zip(&values) {
                row.push(value.unwrap_or(fill));
            }
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub(crate) fn value(&self, row: usize, column: usize) -> f64 {
        self.rows[row][column]
    }
}
