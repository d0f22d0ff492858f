use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::json;

use super::{AnalyzeCsvRequest, InsightService, InsightServiceError};
use crate::ingest::IngestError;

/// Router exposing the insight pipeline over HTTP.
pub fn insights_router(service: Arc<InsightService>) -> Router {
    Router::new()
        .route("/api/v1/insights", post(analyze_handler))
        .with_state(service)
}

pub(crate) async fn analyze_handler(
    State(service): State<Arc<InsightService>>,
    axum::Json(request): axum::Json<AnalyzeCsvRequest>,
) -> Response {
    // Model fitting is CPU bound; keep it off the async workers.
    let outcome = tokio::task::spawn_blocking(move || service.analyze_csv(request)).await;
    let result = match outcome {
        Ok(result) => result,
        Err(error) => {
            tracing::error!(error = %error, "insight analysis task aborted");
            let payload = json!({
                "error": "insight analysis did not complete",
            });
            return (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response();
        }
    };

    match result {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(InsightServiceError::Engine(error)) => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Err(InsightServiceError::Ingest(
            error @ (IngestError::Csv(_) | IngestError::Dataset(_)),
        )) => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
        Err(other) => {
            tracing::error!(error = %other, "insight request failed");
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::engine::InsightEngine;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn router_with(engine: InsightEngine) -> Router {
        insights_router(Arc::new(InsightService::new(
            Arc::new(engine),
            AnalysisConfig::default(),
            Value::Null,
        )))
    }

    async fn post_json(payload: Value) -> (StatusCode, Value) {
        post_json_to(router_with(InsightEngine::without_outlier_model()), payload).await
    }

    async fn post_json_to(router: Router, payload: Value) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/insights")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request builds"),
            )
            .await
            .expect("router responds");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let body = serde_json::from_slice(&bytes).expect("json body");
        (status, body)
    }

    #[tokio::test]
    async fn ranks_rows_and_drafts_proposals() {
        let (status, body) = post_json(json!({
            "csv": "region,conversion_rate\nnorth,0.10\nsouth,0.11\neast,0.40\nwest,0.09\n",
            "segments": ["region"],
            "top_k": 2,
            "policy": { "constraints": { "disallow": ["draft_task"] } }
        }))
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metric"], "conversion_rate");
        assert_eq!(body["anomaly_mode"]["mode"], "degraded");
        assert_eq!(body["anomaly_mode"]["reason"]["cause"], "model_unavailable");
        assert_eq!(body["insights"][0]["row_index"], 2);
        assert_eq!(body["insights"][0]["segments"]["region"], "east");
        let kinds: Vec<&str> = body["proposals"]
            .as_array()
            .expect("proposal list")
            .iter()
            .filter_map(|proposal| proposal["kind"].as_str())
            .collect();
        assert!(kinds.contains(&"draft_alert"));
        assert!(!kinds.contains(&"draft_task"));
        assert!(body.get("annotated_csv").is_none());
    }

    #[cfg(feature = "outlier-model")]
    #[tokio::test]
    async fn model_backed_requests_score_off_the_runtime() {
        let mut csv = String::from("region,sessions,conversion_rate\n");
        for row in 0..25 {
            let rate = if row == 12 { 0.30 } else { 0.10 };
            csv.push_str(&format!("r{},{},{}\n", row % 4, 1_000 + row * 10, rate));
        }

        let (status, body) = post_json_to(
            router_with(InsightEngine::new()),
            json!({ "csv": csv, "metric": "conversion_rate", "top_k": 3 }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["anomaly_mode"]["mode"], "model");
        assert_eq!(body["anomaly_mode"]["detector"], "isolation_forest");
        assert_eq!(body["insights"][0]["row_index"], 12);
    }

    #[tokio::test]
    async fn policy_fallback_is_reported_as_warning() {
        let (status, body) = post_json(json!({
            "csv": "conversion_rate\n0.1\n0.2\n",
            "policy": { "thresholds": { "anomaly_confidence": { "high": 2.0 } } }
        }))
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["warnings"][0]["kind"], "policy_fallback");
    }

    #[tokio::test]
    async fn empty_input_is_unprocessable() {
        let (status, body) = post_json(json!({ "csv": "region\nnorth\n" })).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "dataset has no numeric columns to score");
    }

    #[tokio::test]
    async fn malformed_csv_is_a_bad_request() {
        let (status, body) = post_json(json!({ "csv": "a,b\n1,2\n3\n" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]
            .as_str()
            .expect("error message")
            .starts_with("invalid CSV data"));
    }
}
