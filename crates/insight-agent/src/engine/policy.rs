use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::diagnostics::EngineWarning;

/// Closed set of action kinds the drafter knows how to template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    DraftAlert,
    DraftTask,
}

impl ActionKind {
    pub const ALL: [ActionKind; 2] = [ActionKind::DraftAlert, ActionKind::DraftTask];

    pub fn identifier(self) -> &'static str {
        match self {
            ActionKind::DraftAlert => "draft_alert",
            ActionKind::DraftTask => "draft_task",
        }
    }

    pub fn from_identifier(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.identifier() == value.trim())
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

/// Desired movement of the primary metric. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Increase,
    Decrease,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Objectives {
    pub primary_metric: Option<String>,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Constraints {
    pub disallow: BTreeSet<String>,
    pub approvals_required: bool,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            disallow: BTreeSet::new(),
            approvals_required: true,
        }
    }
}

/// Cut-points for the confidence bands, `high >= medium`, both in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceThresholds {
    pub high: f64,
    pub medium: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high: 0.8,
            medium: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    pub anomaly_confidence: ConfidenceThresholds,
    pub impact_minimum: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            anomaly_confidence: ConfidenceThresholds::default(),
            impact_minimum: 0.02,
        }
    }
}

/// Linear weights for the composite score; they need not sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankingWeights {
    pub weight_impact: f64,
    pub weight_confidence: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            weight_impact: 0.7,
            weight_confidence: 0.3,
        }
    }
}

/// Validated, fully defaulted policy governing one scoring run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Policy {
    objectives: Objectives,
    constraints: Constraints,
    thresholds: Thresholds,
    requested_actions: Vec<String>,
    ranking: RankingWeights,
    effective_actions: Vec<ActionKind>,
}

impl Default for Policy {
    fn default() -> Self {
        PolicyBuilder::new().build_unchecked().0
    }
}

impl Policy {
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::new()
    }

    /// Decodes a structured policy value, substituting the default policy
    /// when the value is malformed or fails validation.
    pub fn resolve(document: &Value) -> PolicyResolution {
        let outcome =
            PolicyBuilder::from_value(document).and_then(PolicyBuilder::build_reporting);

        match outcome {
            Ok((policy, warnings)) => PolicyResolution { policy, warnings },
            Err(error) => {
                tracing::warn!(%error, "policy rejected; falling back to defaults");
                PolicyResolution {
                    policy: Policy::default(),
                    warnings: vec![EngineWarning::PolicyFallback {
                        reason: error.to_string(),
                    }],
                }
            }
        }
    }

    pub fn objectives(&self) -> &Objectives {
        &self.objectives
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn ranking(&self) -> &RankingWeights {
        &self.ranking
    }

    pub fn requested_actions(&self) -> &[String] {
        &self.requested_actions
    }

    /// Requested actions that are known and not disallowed, in request order.
    pub fn effective_actions(&self) -> &[ActionKind] {
        &self.effective_actions
    }

    pub fn approvals_required(&self) -> bool {
        self.constraints.approvals_required
    }
}

/// Policy produced by [`Policy::resolve`] together with the non-fatal
/// conditions met while resolving it.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyResolution {
    pub policy: Policy,
    pub warnings: Vec<EngineWarning>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    #[error("policy document must be a mapping")]
    NotAMapping,
    #[error("policy document is malformed: {0}")]
    Malformed(String),
    #[error("{name} must be a finite value in [0, 1], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },
    #[error("anomaly_confidence.high ({high}) must not be below medium ({medium})")]
    InvertedThresholds { high: f64, medium: f64 },
    #[error("impact_minimum must be a finite non-negative value, got {0}")]
    InvalidImpactMinimum(f64),
    #[error("ranking.{name} must be a finite non-negative weight, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },
}

/// Collects policy options and applies every default in one place.
#[derive(Debug, Clone, Default)]
pub struct PolicyBuilder {
    primary_metric: Option<String>,
    direction: Option<Direction>,
    disallow: Option<Vec<String>>,
    approvals_required: Option<bool>,
    high: Option<f64>,
    medium: Option<f64>,
    impact_minimum: Option<f64>,
    actions: Option<Vec<String>>,
    weight_impact: Option<f64>,
    weight_confidence: Option<f64>,
}

impl PolicyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a decoded policy document; `null` counts as an empty document.
    pub fn from_value(document: &Value) -> Result<Self, PolicyError> {
        let raw = match document {
            Value::Null => RawPolicy::default(),
            Value::Object(_) => RawPolicy::deserialize(document)
                .map_err(|err| PolicyError::Malformed(err.to_string()))?,
            _ => return Err(PolicyError::NotAMapping),
        };

        let objectives = raw.objectives.unwrap_or_default();
        let constraints = raw.constraints.unwrap_or_default();
        let thresholds = raw.thresholds.unwrap_or_default();
        let confidence = thresholds.anomaly_confidence.unwrap_or_default();
        let ranking = raw.ranking.unwrap_or_default();

        Ok(Self {
            primary_metric: objectives.primary_metric,
            direction: objectives.direction,
            disallow: constraints.disallow,
            approvals_required: constraints.approvals_required,
            high: confidence.high,
            medium: confidence.medium,
            impact_minimum: thresholds.impact_minimum,
            actions: raw.actions,
            weight_impact: ranking.weight_impact,
            weight_confidence: ranking.weight_confidence,
        })
    }

    pub fn primary_metric(mut self, metric: impl Into<String>) -> Self {
        self.primary_metric = Some(metric.into());
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn disallow<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disallow = Some(actions.into_iter().map(Into::into).collect());
        self
    }

    pub fn approvals_required(mut self, required: bool) -> Self {
        self.approvals_required = Some(required);
        self
    }

    pub fn confidence_thresholds(mut self, high: f64, medium: f64) -> Self {
        self.high = Some(high);
        self.medium = Some(medium);
        self
    }

    pub fn impact_minimum(mut self, minimum: f64) -> Self {
        self.impact_minimum = Some(minimum);
        self
    }

    pub fn actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = Some(actions.into_iter().map(Into::into).collect());
        self
    }

    pub fn ranking_weights(mut self, weight_impact: f64, weight_confidence: f64) -> Self {
        self.weight_impact = Some(weight_impact);
        self.weight_confidence = Some(weight_confidence);
        self
    }

    pub fn build(self) -> Result<Policy, PolicyError> {
        self.build_reporting().map(|(policy, _)| policy)
    }

    fn build_reporting(self) -> Result<(Policy, Vec<EngineWarning>), PolicyError> {
        let (policy, warnings) = self.build_unchecked();
        validate(&policy)?;
        Ok((policy, warnings))
    }

    fn build_unchecked(self) -> (Policy, Vec<EngineWarning>) {
        let defaults = Thresholds::default();
        let weights = RankingWeights::default();

        let requested_actions = self.actions.unwrap_or_else(|| {
            ActionKind::ALL
                .iter()
                .map(|kind| kind.identifier().to_string())
                .collect()
        });
        let disallow: BTreeSet<String> = self
            .disallow
            .unwrap_or_default()
            .into_iter()
            .map(|action| action.trim().to_string())
            .collect();

        let mut warnings = Vec::new();
        let mut effective_actions = Vec::new();
        for requested in &requested_actions {
            if disallow.contains(requested.trim()) {
                continue;
            }
            match ActionKind::from_identifier(requested) {
                Some(kind) if !effective_actions.contains(&kind) => effective_actions.push(kind),
                Some(_) => {}
                None => warnings.push(EngineWarning::UnknownAction {
                    action: requested.clone(),
                }),
            }
        }

        let policy = Policy {
            objectives: Objectives {
                primary_metric: self.primary_metric.filter(|metric| !metric.trim().is_empty()),
                direction: self.direction.unwrap_or_default(),
            },
            constraints: Constraints {
                disallow,
                approvals_required: self.approvals_required.unwrap_or(true),
            },
            thresholds: Thresholds {
                anomaly_confidence: ConfidenceThresholds {
                    high: self.high.unwrap_or(defaults.anomaly_confidence.high),
                    medium: self.medium.unwrap_or(defaults.anomaly_confidence.medium),
                },
                impact_minimum: self.impact_minimum.unwrap_or(defaults.impact_minimum),
            },
            requested_actions,
            ranking: RankingWeights {
                weight_impact: self.weight_impact.unwrap_or(weights.weight_impact),
                weight_confidence: self.weight_confidence.unwrap_or(weights.weight_confidence),
            },
            effective_actions,
        };

        (policy, warnings)
    }
}

fn validate(policy: &Policy) -> Result<(), PolicyError> {
    let ConfidenceThresholds { high, medium } = policy.thresholds.anomaly_confidence;
    for (name, value) in [
        ("anomaly_confidence.high", high),
        ("anomaly_confidence.medium", medium),
    ] {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(PolicyError::ThresholdOutOfRange { name, value });
        }
    }
    if high < medium {
        return Err(PolicyError::InvertedThresholds { high, medium });
    }

    let minimum = policy.thresholds.impact_minimum;
    if !minimum.is_finite() || minimum < 0.0 {
        return Err(PolicyError::InvalidImpactMinimum(minimum));
    }

    for (name, value) in [
        ("weight_impact", policy.ranking.weight_impact),
        ("weight_confidence", policy.ranking.weight_confidence),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(PolicyError::InvalidWeight { name, value });
        }
    }

    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct RawPolicy {
    #[serde(default)]
    objectives: Option<RawObjectives>,
    #[serde(default)]
    constraints: Option<RawConstraints>,
    #[serde(default)]
    thresholds: Option<RawThresholds>,
    #[serde(default)]
    actions: Option<Vec<String>>,
    #[serde(default)]
    ranking: Option<RawRanking>,
}

#[derive(Debug, Default, Deserialize)]
struct RawObjectives {
    #[serde(default)]
    primary_metric: Option<String>,
    #[serde(default)]
    direction: Option<Direction>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConstraints {
    #[serde(default)]
    disallow: Option<Vec<String>>,
    #[serde(default)]
    approvals_required: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct RawThresholds {
    #[serde(default)]
    anomaly_confidence: Option<RawConfidence>,
    #[serde(default)]
    impact_minimum: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfidence {
    #[serde(default)]
    high: Option<f64>,
    #[serde(default)]
    medium: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRanking {
    #[serde(default)]
    weight_impact: Option<f64>,
    #[serde(default)]
    weight_confidence: Option<f64>,
}
