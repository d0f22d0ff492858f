use crate::infra::load_policy_document;
use chrono::{NaiveDate, Utc};
use clap::Args;
use insight_agent::config::{AnalysisConfig, AppConfig};
use insight_agent::engine::{
    AnomalyMode, CellValue, Column, Dataset, DatasetError, InsightRequest, InsightRun,
    ProposalStatus,
};
use insight_agent::error::AppError;
use insight_agent::ingest::{export, DatasetLoader, IngestError};
use insight_agent::service::InsightService;
use insight_agent::telemetry::{self, LogSink};
use std::fmt::Write as _;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct AnalyzeArgs {
    /// CSV file to score
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Metric column to score for impact (defaults to the policy objective)
    #[arg(long)]
    pub(crate) metric: Option<String>,
    /// Segment column echoed on every insight; repeatable
    #[arg(long = "segment")]
    pub(crate) segments: Vec<String>,
    /// Number of insights to report
    #[arg(long)]
    pub(crate) top_k: Option<usize>,
    /// JSON or YAML policy document (defaults to INSIGHT_POLICY_PATH)
    #[arg(long)]
    pub(crate) policy: Option<PathBuf>,
    /// Directory receiving the annotated CSV
    #[arg(long)]
    pub(crate) export: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Rows in the synthetic dataset
    #[arg(long, default_value_t = 30)]
    pub(crate) rows: usize,
    /// Conversion rate planted in the middle row
    #[arg(long, default_value_t = 0.30)]
    pub(crate) spike: f64,
    /// Number of insights to report
    #[arg(long)]
    pub(crate) top_k: Option<usize>,
    /// JSON or YAML policy document (defaults to INSIGHT_POLICY_PATH)
    #[arg(long)]
    pub(crate) policy: Option<PathBuf>,
}

pub(crate) fn run_analyze(args: AnalyzeArgs) -> Result<(), AppError> {
    let AnalyzeArgs {
        csv,
        metric,
        segments,
        top_k,
        policy,
        export: export_dir,
    } = args;

    let analysis = init_reporting()?;
    let dataset = DatasetLoader::from_path(&csv)?;

    let mut request = InsightRequest::new(top_k.unwrap_or(analysis.default_top_k))
        .with_segments(segments);
    request.metric = metric;

    println!("Insight report for {}", csv.display());
    let run = score(&dataset, &request, policy, analysis)?;
    print!("{}", render_report(&run));

    if let Some(directory) = export_dir {
        let path = export::export_annotated(&run.augmented, &directory, Utc::now())?;
        println!("\nAnnotated dataset written to {}", path.display());
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        rows,
        spike,
        top_k,
        policy,
    } = args;

    let analysis = init_reporting()?;
    let dataset = synthetic_conversion_dataset(rows, spike).map_err(IngestError::from)?;
    let request = InsightRequest::new(top_k.unwrap_or(analysis.default_top_k))
        .with_metric("conversion_rate")
        .with_segments(["region"]);

    println!(
        "Insight agent demo: {} rows of conversion_rate around 0.10, spike {:.2} at row {}",
        dataset.row_count(),
        spike,
        dataset.row_count() / 2
    );
    let run = score(&dataset, &request, policy, analysis)?;
    print!("{}", render_report(&run));
    Ok(())
}

fn init_reporting() -> Result<AnalysisConfig, AppError> {
    let config = AppConfig::load()?;
    telemetry::init_with_sink(&config.telemetry, LogSink::Stderr)?;
    Ok(config.analysis)
}

fn score(
    dataset: &Dataset,
    request: &InsightRequest,
    policy_override: Option<PathBuf>,
    analysis: AnalysisConfig,
) -> Result<InsightRun, AppError> {
    let policy_path = policy_override.or_else(|| analysis.policy_path.clone());
    let policy = load_policy_document(policy_path.as_deref());
    let service = InsightService::from_config(analysis, serde_json::Value::Null);
    Ok(service.engine().analyze(dataset, request, &policy)?)
}

/// `rows` daily observations whose conversion rate sits around 0.10, with
/// `spike` planted in the middle row.
pub(crate) fn synthetic_conversion_dataset(
    rows: usize,
    spike: f64,
) -> Result<Dataset, DatasetError> {
    const OFFSETS: [f64; 5] = [-0.01, 0.0, 0.01, -0.005, 0.005];
    const REGIONS: [&str; 4] = ["north", "south", "east", "west"];

    let rows = rows.max(1);
    let spike_row = rows / 2;
    let start = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap_or(NaiveDate::MIN);

    let data = (0..rows)
        .map(|row| {
            let rate = if row == spike_row {
                spike
            } else {
                0.10 + OFFSETS[row % OFFSETS.len()]
            };
            let date = start + chrono::Duration::days(row as i64);
            vec![
                CellValue::Text(date.format("%Y-%m-%d").to_string()),
                CellValue::Text(REGIONS[row % REGIONS.len()].to_string()),
                CellValue::Number(1_000.0 + (row % 7) as f64 * 25.0),
                CellValue::Number(rate),
            ]
        })
        .collect();

    Dataset::new(
        vec![
            Column::text("date"),
            Column::text("region"),
            Column::numeric("sessions"),
            Column::numeric("conversion_rate"),
        ],
        data,
    )
}

pub(crate) fn render_report(run: &InsightRun) -> String {
    let mut out = String::new();

    let mode = match &run.anomaly_mode {
        AnomalyMode::Model { detector } => format!("model ({detector})"),
        AnomalyMode::Degraded { reason } => format!("degraded ({reason:?})"),
    };
    let _ = writeln!(
        out,
        "Metric: {} | anomaly detection: {}",
        run.metric.as_deref().unwrap_or("none"),
        mode
    );

    for insight in &run.insights {
        let _ = writeln!(out, "\nInsight #{} (row {})", insight.rank, insight.row_index);
        let value = insight
            .value
            .map(|value| format!("{value}"))
            .unwrap_or_else(|| "n/a".to_string());
        let _ = writeln!(
            out,
            "  {} = {} | impact {:+.1}% | anomaly {:.2} | {} confidence | score {:.3}",
            insight.metric_label(),
            value,
            insight.impact_proxy * 100.0,
            insight.anomaly_score,
            insight.confidence_band,
            insight.score
        );
        if !insight.segments.is_empty() {
            let segments: Vec<String> = insight
                .segments
                .iter()
                .map(|(column, value)| format!("{column}={value}"))
                .collect();
            let _ = writeln!(out, "  Segments: {}", segments.join(", "));
        }
        let _ = writeln!(out, "  Proposed actions (drafts):");
        for proposal in run.proposals_for(insight) {
            let status = match proposal.status {
                ProposalStatus::AwaitingApproval => "awaiting approval",
                ProposalStatus::Draft => "draft",
            };
            let _ = writeln!(out, "    - [{}, {}] {}", proposal.kind, status, proposal.text);
        }
    }

    if !run.warnings.is_empty() {
        let _ = writeln!(out, "\nWarnings:");
        for warning in &run.warnings {
            let _ = writeln!(out, "  - {warning}");
        }
    }

    out
}
