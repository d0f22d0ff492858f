//! Policy-driven scoring and decision drafting.
//!
//! A run reads a dataset snapshot and a [`Policy`], scores every row for
//! anomaly and business impact, ranks the rows, bands their confidence and
//! drafts proposals for the top rows. Each stage is a pure function of its
//! inputs; failures are contained to the row or stage where they happen and
//! reported as [`EngineWarning`]s. Only structurally empty input is an error.

pub mod anomaly;
pub mod confidence;
pub mod dataset;
pub mod diagnostics;
pub mod drafting;
pub mod features;
pub mod impact;
pub mod insight;
pub mod policy;
pub mod ranking;
mod stats;

#[cfg(test)]
mod tests;

pub use anomaly::{
    AnomalyMode, AnomalyScorer, DegradedReason, DetectorError, NoopDetector, OutlierDetector,
    MIN_MODEL_ROWS,
};
pub use confidence::ConfidenceBand;
pub use dataset::{CellValue, Column, ColumnKind, Dataset, DatasetError, DerivedColumns};
pub use diagnostics::EngineWarning;
pub use drafting::{Proposal, ProposalKind, ProposalStatus};
pub use features::FeatureMatrix;
pub use insight::Insight;
pub use policy::{
    ActionKind, ConfidenceThresholds, Constraints, Direction, Objectives, Policy, PolicyBuilder,
    PolicyError, PolicyResolution, RankingWeights, Thresholds,
};
pub use stats::EPSILON;

#[cfg(feature = "outlier-model")]
pub use anomaly::IsolationForest;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Structurally invalid input; the caller must skip scoring.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("dataset has no rows to score")]
    NoRows,
    #[error("dataset has no numeric columns to score")]
    NoNumericColumns,
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// Caller-side parameters of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightRequest {
    /// Metric chosen by the caller; overrides `objectives.primary_metric`.
    pub metric: Option<String>,
    /// Informational grouping columns echoed on each insight.
    pub segments: Vec<String>,
    pub top_k: usize,
}

impl InsightRequest {
    pub fn new(top_k: usize) -> Self {
        Self {
            metric: None,
            segments: Vec::new(),
            top_k,
        }
    }

    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self
    }

    pub fn with_segments<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.segments = segments.into_iter().map(Into::into).collect();
        self
    }
}

/// Everything a run produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightRun {
    pub metric: Option<String>,
    pub segments: Vec<String>,
    pub anomaly_mode: AnomalyMode,
    pub insights: Vec<Insight>,
    pub proposals: Vec<Proposal>,
    #[serde(skip)]
    pub augmented: Dataset,
    pub warnings: Vec<EngineWarning>,
}

impl InsightRun {
    pub fn proposals_for(&self, insight: &Insight) -> impl Iterator<Item = &Proposal> {
        let rank = insight.rank;
        self.proposals
            .iter()
            .filter(move |proposal| proposal.insight_rank == rank)
    }
}

/// Entry point of the scoring pipeline. Holds the outlier-detection
/// capability chosen when the engine is built.
pub struct InsightEngine {
    detector: Option<Box<dyn OutlierDetector>>,
}

impl Default for InsightEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InsightEngine {
    /// Engine using the detector this build ships with, if any.
    pub fn new() -> Self {
        Self {
            detector: anomaly::default_detector(),
        }
    }

    pub fn with_detector(detector: Box<dyn OutlierDetector>) -> Self {
        Self {
            detector: Some(detector),
        }
    }

    /// Engine that always takes the degraded anomaly path.
    pub fn without_outlier_model() -> Self {
        Self { detector: None }
    }

    pub fn has_outlier_model(&self) -> bool {
        self.detector.is_some()
    }

    /// Resolves a decoded policy document, then runs.
    ///
    /// A rejected policy never fails the run: the default policy is used and
    /// the reason leads the run's warnings.
    pub fn analyze(
        &self,
        dataset: &Dataset,
        request: &InsightRequest,
        policy_document: &Value,
    ) -> Result<InsightRun, EngineError> {
        let PolicyResolution {
            policy,
            mut warnings,
        } = Policy::resolve(policy_document);
        let mut run = self.run(dataset, request, &policy)?;
        warnings.append(&mut run.warnings);
        run.warnings = warnings;
        Ok(run)
    }

    pub fn run(
        &self,
        dataset: &Dataset,
        request: &InsightRequest,
        policy: &Policy,
    ) -> Result<InsightRun, EngineError> {
        let matrix = FeatureMatrix::prepare(dataset)?;
        let mut warnings = Vec::new();

        let anomaly = AnomalyScorer::select(self.detector.as_deref(), matrix.row_count())
            .score(&matrix);
        warnings.extend(anomaly.warning);

        let metric = resolve_metric(dataset, request, policy);
        let impact = impact::score_impact(dataset, metric.as_deref());
        warnings.extend(impact.warning);

        let scores =
            ranking::composite_scores(&anomaly.scores, &impact.proxies, policy.ranking());
        let thresholds = &policy.thresholds().anomaly_confidence;
        let bands: Vec<ConfidenceBand> = anomaly
            .scores
            .iter()
            .map(|score| ConfidenceBand::classify(*score, thresholds))
            .collect();

        let segments = known_segments(dataset, &request.segments, &mut warnings);

        let insights: Vec<Insight> = ranking::select_top_k(&scores, request.top_k)
            .into_iter()
            .enumerate()
            .map(|(position, row)| Insight {
                rank: position + 1,
                row_index: row,
                metric: metric.clone(),
                value: metric
                    .as_deref()
                    .and_then(|name| dataset.cell(row, name))
                    .and_then(CellValue::as_finite),
                impact_proxy: impact.proxies[row],
                anomaly_score: anomaly.scores[row],
                score: scores[row],
                confidence_band: bands[row],
                segments: segment_values(dataset, row, &segments),
            })
            .collect();

        let proposals: Vec<Proposal> = insights
            .iter()
            .flat_map(|insight| drafting::draft_proposals(insight, policy))
            .collect();

        let augmented = dataset.with_derived_columns(&DerivedColumns {
            anomaly_score: anomaly.scores.clone(),
            impact_proxy: impact.proxies,
            score: scores,
            confidence_band: bands.iter().map(|band| band.label()).collect(),
        })?;

        for warning in &warnings {
            tracing::warn!(%warning, "insight run degraded");
        }
        tracing::debug!(
            rows = dataset.row_count(),
            insights = insights.len(),
            proposals = proposals.len(),
            "insight run complete"
        );

        Ok(InsightRun {
            metric,
            segments,
            anomaly_mode: anomaly.mode,
            insights,
            proposals,
            augmented,
            warnings,
        })
    }
}

/// Caller's metric, then the policy objective, then the first numeric column.
fn resolve_metric(dataset: &Dataset, request: &InsightRequest, policy: &Policy) -> Option<String> {
    request
        .metric
        .clone()
        .filter(|metric| !metric.trim().is_empty())
        .or_else(|| policy.objectives().primary_metric.clone())
        .or_else(|| dataset.numeric_columns().next().map(|column| column.name.clone()))
}

fn known_segments(
    dataset: &Dataset,
    requested: &[String],
    warnings: &mut Vec<EngineWarning>,
) -> Vec<String> {
    requested
        .iter()
        .filter(|column| {
            let known = dataset.column(column).is_some();
            if !known {
                warnings.push(EngineWarning::UnknownSegment {
                    column: column.to_string(),
                });
            }
            known
        })
        .cloned()
        .collect()
}

fn segment_values(dataset: &Dataset, row: usize, segments: &[String]) -> BTreeMap<String, String> {
    segments
        .iter()
        .filter_map(|column| {
            dataset
                .cell(row, column)
                .map(|cell| (column.clone(), cell.to_string()))
        })
        .collect()
}
