use crate::cli::ServeArgs;
use crate::infra::{load_policy_document, AppState};
use crate::routes::with_insight_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use insight_agent::config::AppConfig;
use insight_agent::error::AppError;
use insight_agent::service::InsightService;
use insight_agent::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let policy = load_policy_document(config.analysis.policy_path.as_deref());
    let insight_service = Arc::new(InsightService::from_config(
        config.analysis.clone(),
        policy,
    ));

    let app = with_insight_routes(insight_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        top_k = config.analysis.default_top_k,
        outlier_model = config.analysis.outlier_model_enabled,
        "insight agent ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
