//! Request-level facade over the engine, shared by the HTTP router and the
//! command-line front door.

mod router;

pub use router::insights_router;

use std::io::Cursor;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AnalysisConfig;
use crate::engine::{
    AnomalyMode, EngineError, EngineWarning, Insight, InsightEngine, InsightRequest, InsightRun,
    Proposal,
};
use crate::ingest::{export, DatasetLoader, IngestError};

/// One analysis request: CSV text plus optional run parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeCsvRequest {
    pub csv: String,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub segments: Vec<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Policy document for this request; the service default applies when absent.
    #[serde(default)]
    pub policy: Option<Value>,
    #[serde(default)]
    pub include_annotated_csv: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsightReport {
    pub metric: Option<String>,
    pub segments: Vec<String>,
    pub anomaly_mode: AnomalyMode,
    pub insights: Vec<Insight>,
    pub proposals: Vec<Proposal>,
    pub warnings: Vec<EngineWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated_csv: Option<String>,
}

impl InsightReport {
    fn from_run(run: InsightRun, annotated_csv: Option<String>) -> Self {
        Self {
            metric: run.metric,
            segments: run.segments,
            anomaly_mode: run.anomaly_mode,
            insights: run.insights,
            proposals: run.proposals,
            warnings: run.warnings,
            annotated_csv,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InsightServiceError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Engine plus the defaults applied to requests that leave options unset.
pub struct InsightService {
    engine: Arc<InsightEngine>,
    config: AnalysisConfig,
    default_policy: Value,
}

impl InsightService {
    pub fn new(engine: Arc<InsightEngine>, config: AnalysisConfig, default_policy: Value) -> Self {
        Self {
            engine,
            config,
            default_policy,
        }
    }

    /// Builds the engine the configuration asks for.
    pub fn from_config(config: AnalysisConfig, default_policy: Value) -> Self {
        let engine = if config.outlier_model_enabled {
            InsightEngine::new()
        } else {
            InsightEngine::without_outlier_model()
        };
        if !engine.has_outlier_model() {
            tracing::info!("outlier model unavailable; anomaly scores will be zero");
        }
        Self::new(Arc::new(engine), config, default_policy)
    }

    pub fn engine(&self) -> &InsightEngine {
        &self.engine
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn analyze_csv(
        &self,
        request: AnalyzeCsvRequest,
    ) -> Result<InsightReport, InsightServiceError> {
        let AnalyzeCsvRequest {
            csv,
            metric,
            segments,
            top_k,
            policy,
            include_annotated_csv,
        } = request;

        let dataset = DatasetLoader::from_reader(Cursor::new(csv.into_bytes()))?;
        let mut run_request = InsightRequest::new(top_k.unwrap_or(self.config.default_top_k))
            .with_segments(segments);
        run_request.metric = metric;

        let policy = policy.as_ref().unwrap_or(&self.default_policy);
        let run = self.engine.analyze(&dataset, &run_request, policy)?;

        let annotated_csv = if include_annotated_csv {
            Some(export::to_csv_string(&run.augmented)?)
        } else {
            None
        };

        Ok(InsightReport::from_run(run, annotated_csv))
    }
}
