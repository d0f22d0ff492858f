#[cfg(feature = "outlier-model")]
mod forest;

#[cfg(feature = "outlier-model")]
pub use forest::IsolationForest;

use serde::Serialize;

use super::diagnostics::EngineWarning;
use super::features::FeatureMatrix;
use super::stats::min_max_normalize;

/// Outlier models are not fitted on fewer rows than this.
pub const MIN_MODEL_ROWS: usize = 20;

/// Capability that turns a feature matrix into raw per-row anomaly
/// magnitudes, higher meaning more anomalous.
pub trait OutlierDetector: Send + Sync {
    fn name(&self) -> &'static str;

    fn raw_scores(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>, DetectorError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DetectorError {
    #[error("detector returned {found} scores for {expected} rows")]
    LengthMismatch { expected: usize, found: usize },
    #[error("detector produced a non-finite score for row {row}")]
    NonFinite { row: usize },
    #[error("detector failed: {0}")]
    Failed(String),
}

/// Stand-in used whenever no outlier model may run; scores every row 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDetector;

impl OutlierDetector for NoopDetector {
    fn name(&self) -> &'static str {
        "none"
    }

    fn raw_scores(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>, DetectorError> {
        Ok(vec![0.0; matrix.row_count()])
    }
}

/// Detector shipped with this build, if any.
pub fn default_detector() -> Option<Box<dyn OutlierDetector>> {
    #[cfg(feature = "outlier-model")]
    {
        Some(Box::new(IsolationForest::default()))
    }
    #[cfg(not(feature = "outlier-model"))]
    {
        None
    }
}

/// How the anomaly stage produced its scores for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AnomalyMode {
    Model { detector: String },
    Degraded { reason: DegradedReason },
}

impl AnomalyMode {
    pub fn is_degraded(&self) -> bool {
        matches!(self, AnomalyMode::Degraded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum DegradedReason {
    ModelUnavailable,
    TooFewRows { rows: usize, minimum: usize },
    ScoringFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyScores {
    /// One value per row in `[0, 1]`.
    pub scores: Vec<f64>,
    pub mode: AnomalyMode,
    pub warning: Option<EngineWarning>,
}

/// Anomaly stage bound to the detector chosen for this run.
pub struct AnomalyScorer<'a> {
    detector: &'a dyn OutlierDetector,
    degraded: Option<DegradedReason>,
}

impl<'a> AnomalyScorer<'a> {
    /// Picks the detector once, before any scoring: the available model for
    /// datasets of at least [`MIN_MODEL_ROWS`] rows, the no-op otherwise.
    pub fn select(available: Option<&'a dyn OutlierDetector>, rows: usize) -> Self {
        match available {
            None => Self {
                detector: &NoopDetector,
                degraded: Some(DegradedReason::ModelUnavailable),
            },
            Some(_) if rows < MIN_MODEL_ROWS => Self {
                detector: &NoopDetector,
                degraded: Some(DegradedReason::TooFewRows {
                    rows,
                    minimum: MIN_MODEL_ROWS,
                }),
            },
            Some(detector) => Self {
                detector,
                degraded: None,
            },
        }
    }

    pub fn score(&self, matrix: &FeatureMatrix) -> AnomalyScores {
        if let Some(reason) = &self.degraded {
            tracing::info!(?reason, "advanced anomaly detection skipped");
            return AnomalyScores {
                scores: vec![0.0; matrix.row_count()],
                mode: AnomalyMode::Degraded {
                    reason: reason.clone(),
                },
                warning: None,
            };
        }

        match self.checked_raw_scores(matrix) {
            Ok(raw) => AnomalyScores {
                scores: min_max_normalize(&raw),
                mode: AnomalyMode::Model {
                    detector: self.detector.name().to_string(),
                },
                warning: None,
            },
            Err(error) => {
                tracing::warn!(detector = self.detector.name(), %error, "anomaly detection failed");
                AnomalyScores {
                    scores: vec![0.0; matrix.row_count()],
                    mode: AnomalyMode::Degraded {
                        reason: DegradedReason::ScoringFailed,
                    },
                    warning: Some(EngineWarning::AnomalyScoringFailed {
                        detector: self.detector.name().to_string(),
                        reason: error.to_string(),
                    }),
                }
            }
        }
    }

    fn checked_raw_scores(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>, DetectorError> {
        let raw = self.detector.raw_scores(matrix)?;
        if raw.len() != matrix.row_count() {
            return Err(DetectorError::LengthMismatch {
                expected: matrix.row_count(),
                found: raw.len(),
            });
        }
        if let Some(row) = raw.iter().position(|value| !value.is_finite()) {
            return Err(DetectorError::NonFinite { row });
        }
        Ok(raw)
    }
}
