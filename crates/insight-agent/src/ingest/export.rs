use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

use super::IngestError;
use crate::engine::Dataset;

/// Writes `dataset` with a header row. Missing cells are left empty.
pub fn write_csv<W: Write>(dataset: &Dataset, writer: W) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(dataset.columns().iter().map(|column| column.name.as_str()))?;
    for row in dataset.rows() {
        csv_writer.write_record(row.iter().map(ToString::to_string))?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn to_csv_string(dataset: &Dataset) -> Result<String, IngestError> {
    let mut buffer = Vec::new();
    write_csv(dataset, &mut buffer)?;
    String::from_utf8(buffer).map_err(|err| {
        IngestError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    })
}

pub fn annotated_file_name(timestamp: DateTime<Utc>) -> String {
    format!(
        "annotated_{}.csv",
        timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// Writes the dataset into `directory` under [`annotated_file_name`].
pub fn export_annotated(
    dataset: &Dataset,
    directory: &Path,
    timestamp: DateTime<Utc>,
) -> Result<PathBuf, IngestError> {
    std::fs::create_dir_all(directory)?;
    let path = directory.join(annotated_file_name(timestamp));
    let file = std::fs::File::create(&path)?;
    write_csv(dataset, file)?;
    tracing::info!(path = %path.display(), rows = dataset.row_count(), "annotated dataset exported");
    Ok(path)
}
