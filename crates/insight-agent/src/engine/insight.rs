use std::collections::BTreeMap;

use serde::Serialize;

use super::confidence::ConfidenceBand;

/// A scored, ranked row selected for human attention.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    /// 1-based position in the ranked output.
    pub rank: usize,
    /// Position of the row in the source dataset.
    pub row_index: usize,
    pub metric: Option<String>,
    pub value: Option<f64>,
    pub impact_proxy: f64,
    pub anomaly_score: f64,
    pub score: f64,
    pub confidence_band: ConfidenceBand,
    /// Values of the caller's segment columns for this row.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub segments: BTreeMap<String, String>,
}

impl Insight {
    pub fn metric_label(&self) -> &str {
        self.metric.as_deref().unwrap_or("the selected metric")
    }
}
