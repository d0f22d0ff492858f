use std::fmt;

use serde::Serialize;

/// Non-fatal condition met during a run. The run still completes; the
/// affected stage or row fell back to a safe default.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineWarning {
    /// The supplied policy was rejected and the default policy applied.
    PolicyFallback { reason: String },
    /// A requested action kind has no template and was dropped.
    UnknownAction { action: String },
    /// The outlier model failed; every anomaly score is 0 for this run.
    AnomalyScoringFailed { detector: String, reason: String },
    /// No metric was selected and the dataset has none to default to.
    NoMetricSelected,
    /// The metric column is absent or not numeric; impact is 0 everywhere.
    MetricUnavailable { metric: String },
    /// These rows had no computable impact and were scored as 0.
    ImpactRowsDegraded { metric: String, rows: Vec<usize> },
    /// A segment column named by the caller does not exist.
    UnknownSegment { column: String },
}

impl fmt::Display for EngineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineWarning::PolicyFallback { reason } => {
                write!(f, "policy rejected, defaults applied: {reason}")
            }
            EngineWarning::UnknownAction { action } => {
                write!(f, "unknown action '{action}' ignored")
            }
            EngineWarning::AnomalyScoringFailed { detector, reason } => {
                write!(f, "anomaly detection skipped ({detector}): {reason}")
            }
            EngineWarning::NoMetricSelected => {
                write!(f, "no primary metric selected; impact scoring skipped")
            }
            EngineWarning::MetricUnavailable { metric } => {
                write!(
                    f,
                    "metric '{metric}' is missing or not a numeric column; impact set to 0"
                )
            }
            EngineWarning::ImpactRowsDegraded { metric, rows } => write!(
                f,
                "{} row(s) without a usable '{metric}' value scored with zero impact",
                rows.len()
            ),
            EngineWarning::UnknownSegment { column } => {
                write!(f, "segment column '{column}' not found")
            }
        }
    }
}
