use crate::engine::{
    CellValue, Column, Dataset, DetectorError, FeatureMatrix, InsightEngine, OutlierDetector,
};

/// `rows` rows of `conversion_rate` around 0.10 with a spike at `spike_row`.
pub(super) fn conversion_dataset(rows: usize, spike_row: usize, spike_value: f64) -> Dataset {
    let regions = ["north", "south", "east", "west"];
    let data = (0..rows)
        .map(|row| {
            let rate = if row == spike_row {
                spike_value
            } else {
                [0.09, 0.10, 0.11][row % 3]
            };
            vec![
                CellValue::Text(regions[row % regions.len()].to_string()),
                CellValue::Number(rate),
                CellValue::Number(1000.0 + (row % 5) as f64 * 10.0),
            ]
        })
        .collect();

    Dataset::new(
        vec![
            Column::text("region"),
            Column::numeric("conversion_rate"),
            Column::numeric("sessions"),
        ],
        data,
    )
    .expect("valid conversion dataset")
}

/// Detector returning scripted raw scores.
pub(super) struct ScriptedDetector(pub(super) Vec<f64>);

impl OutlierDetector for ScriptedDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn raw_scores(&self, _matrix: &FeatureMatrix) -> Result<Vec<f64>, DetectorError> {
        Ok(self.0.clone())
    }
}

pub(super) struct BrokenDetector;

impl OutlierDetector for BrokenDetector {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn raw_scores(&self, _matrix: &FeatureMatrix) -> Result<Vec<f64>, DetectorError> {
        Err(DetectorError::Failed("numerical failure".to_string()))
    }
}

pub(super) fn scripted_engine(raw: Vec<f64>) -> InsightEngine {
    InsightEngine::with_detector(Box::new(ScriptedDetector(raw)))
}
