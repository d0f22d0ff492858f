use std::io::Read;

use super::normalizer::{non_empty, normalize_header};
use crate::engine::{CellValue, Column, ColumnKind};

/// Raw table as read from a CSV source, before typing.
#[derive(Debug)]
pub(crate) struct RawTable {
    pub(crate) headers: Vec<String>,
    pub(crate) records: Vec<Vec<String>>,
}

pub(crate) fn parse_table<R: Read>(reader: R) -> Result<RawTable, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()?
        .iter()
        .map(normalize_header)
        .collect();

    let mut records = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        records.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawTable { headers, records })
}

impl RawTable {
    /// Types every column and converts the cells.
    ///
    /// A column is numeric when each non-empty cell parses as `f64`; a column
    /// with no values at all is numeric as well.
    pub(crate) fn into_typed(self) -> (Vec<Column>, Vec<Vec<CellValue>>) {
        let kinds: Vec<ColumnKind> = (0..self.headers.len())
            .map(|index| infer_kind(&self.records, index))
            .collect();

        let columns = self
            .headers
            .into_iter()
            .zip(&kinds)
            .map(|(name, kind)| Column { name, kind: *kind })
            .collect();

        let rows = self
            .records
            .into_iter()
            .map(|record| {
                record
                    .iter()
                    .zip(&kinds)
                    .map(|(raw, kind)| convert_cell(raw, *kind))
                    .collect()
            })
            .collect();

        (columns, rows)
    }
}

fn infer_kind(records: &[Vec<String>], index: usize) -> ColumnKind {
    let numeric = records
        .iter()
        .filter_map(|record| record.get(index).and_then(|raw| non_empty(raw)))
        .all(|value| value.parse::<f64>().is_ok());

    if numeric {
        ColumnKind::Numeric
    } else {
        ColumnKind::Text
    }
}

fn convert_cell(raw: &str, kind: ColumnKind) -> CellValue {
    match (non_empty(raw), kind) {
        (None, _) => CellValue::Missing,
        (Some(value), ColumnKind::Numeric) => value
            .parse::<f64>()
            .map(CellValue::Number)
            .unwrap_or(CellValue::Missing),
        (Some(value), ColumnKind::Text) => CellValue::Text(value.to_string()),
    }
}
