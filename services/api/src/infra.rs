use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Reads a policy document, YAML for `.yaml`/`.yml` files and JSON otherwise.
///
/// A missing path yields an empty document. An unreadable or malformed file
/// is reported on stderr and also yields an empty document, so every
/// default policy value applies.
pub(crate) fn load_policy_document(path: Option<&Path>) -> Value {
    let Some(path) = path else {
        return Value::Null;
    };

    let parsed = std::fs::read_to_string(path)
        .map_err(|err| err.to_string())
        .and_then(|raw| decode_policy(path, &raw));

    match parsed {
        Ok(document) => {
            tracing::info!(path = %path.display(), "policy document loaded");
            document
        }
        Err(err) => {
            eprintln!(
                "policy file '{}' could not be used ({err}); default policy applies",
                path.display()
            );
            tracing::warn!(path = %path.display(), error = %err, "policy document ignored");
            Value::Null
        }
    }
}

fn decode_policy(path: &Path, raw: &str) -> Result<Value, String> {
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    if is_yaml {
        serde_yaml::from_str::<Value>(raw).map_err(|err| err.to_string())
    } else {
        serde_json::from_str::<Value>(raw).map_err(|err| err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_agent::engine::{ActionKind, Policy};
    use serde_json::json;

    fn scratch_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("insight-agent-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).expect("scratch file written");
        path
    }

    #[test]
    fn absent_path_is_an_empty_document() {
        assert_eq!(load_policy_document(None), Value::Null);
    }

    #[test]
    fn json_policy_files_are_decoded() {
        let path = scratch_file("policy.json", r#"{"thresholds":{"impact_minimum":0.05}}"#);
        let document = load_policy_document(Some(&path));
        std::fs::remove_file(&path).ok();

        assert_eq!(document, json!({ "thresholds": { "impact_minimum": 0.05 } }));
    }

    const YAML_POLICY: &str = "\
objectives:
  primary_metric: conversion_rate
constraints:
  approvals_required: true
  disallow:
    - delete_records
    - send_external_email
    - draft_task
";

    #[test]
    fn yaml_policy_files_keep_their_disallow_list() {
        let path = scratch_file("policy.yaml", YAML_POLICY);
        let document = load_policy_document(Some(&path));
        std::fs::remove_file(&path).ok();

        assert_eq!(
            document["constraints"]["disallow"],
            json!(["delete_records", "send_external_email", "draft_task"])
        );

        let resolution = Policy::resolve(&document);
        assert!(resolution.warnings.is_empty());
        assert!(resolution
            .policy
            .constraints()
            .disallow
            .contains("delete_records"));
        assert_eq!(
            resolution.policy.objectives().primary_metric.as_deref(),
            Some("conversion_rate")
        );
        assert_eq!(resolution.policy.effective_actions(), &[ActionKind::DraftAlert]);
    }

    #[test]
    fn malformed_yaml_falls_back_to_empty() {
        let path = scratch_file("broken.yml", "constraints: [disallow");
        let document = load_policy_document(Some(&path));
        std::fs::remove_file(&path).ok();
        assert_eq!(document, Value::Null);
    }

    #[test]
    fn malformed_or_missing_files_fall_back_to_empty() {
        let path = scratch_file("broken.json", "thresholds: [");
        let document = load_policy_document(Some(&path));
        std::fs::remove_file(&path).ok();
        assert_eq!(document, Value::Null);

        let missing = std::env::temp_dir().join("insight-agent-does-not-exist.json");
        assert_eq!(load_policy_document(Some(&missing)), Value::Null);
    }
}
