use std::fmt;

use serde::{Serialize, Serializer};

use super::insight::Insight;
use super::policy::{ActionKind, Policy};

/// What a proposal drafts: an action from the policy, or observation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProposalKind {
    Observation,
    Action(ActionKind),
}

impl ProposalKind {
    pub fn identifier(self) -> &'static str {
        match self {
            ProposalKind::Observation => "observation",
            ProposalKind::Action(kind) => kind.identifier(),
        }
    }
}

impl fmt::Display for ProposalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl Serialize for ProposalKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.identifier())
    }
}

/// Lifecycle marker for a proposal. Neither state means the action ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Draft,
    AwaitingApproval,
}

/// Drafted, never-executed action description attached to an insight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Proposal {
    pub insight_rank: usize,
    pub row_index: usize,
    pub kind: ProposalKind,
    pub text: String,
    pub approvals_required: bool,
    pub status: ProposalStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObservationReason {
    BelowImpactMinimum,
    NoPermittedActions,
}

impl ActionKind {
    /// Draft text for this action kind about one insight.
    pub fn render(self, insight: &Insight) -> String {
        match self {
            ActionKind::DraftAlert => format!(
                "Alert: Potential shift detected in {} (row {}, impact {:+.1}%, {} confidence). \
                 Please review attached rows and confidence band.",
                insight.metric_label(),
                insight.row_index,
                insight.impact_proxy * 100.0,
                insight.confidence_band,
            ),
            ActionKind::DraftTask => format!(
                "Task: Investigate drivers for the shift in {}; segment analysis and validate \
                 data quality.",
                insight.metric_label(),
            ),
        }
    }
}

impl ObservationReason {
    fn render(self) -> &'static str {
        match self {
            ObservationReason::BelowImpactMinimum => {
                "Observation only: below impact threshold; monitoring continues."
            }
            ObservationReason::NoPermittedActions => {
                "Observation only: no actions are permitted by policy; monitoring continues."
            }
        }
    }
}

/// Proposals for one insight.
///
/// Rows under the impact minimum, and actionable rows when the policy
/// permits no action, produce exactly one observation-only proposal.
pub fn draft_proposals(insight: &Insight, policy: &Policy) -> Vec<Proposal> {
    let approvals_required = policy.approvals_required();
    let status = if approvals_required {
        ProposalStatus::AwaitingApproval
    } else {
        ProposalStatus::Draft
    };
    let proposal = |kind: ProposalKind, text: String| Proposal {
        insight_rank: insight.rank,
        row_index: insight.row_index,
        kind,
        text,
        approvals_required,
        status,
    };

    let actionable = insight.impact_proxy.abs() >= policy.thresholds().impact_minimum;
    if actionable && !policy.effective_actions().is_empty() {
        return policy
            .effective_actions()
            .iter()
            .filter(|kind| !policy.constraints().disallow.contains(kind.identifier()))
            .map(|kind| proposal(ProposalKind::Action(*kind), kind.render(insight)))
            .collect();
    }

    let reason = if actionable {
        ObservationReason::NoPermittedActions
    } else {
        ObservationReason::BelowImpactMinimum
    };
    vec![proposal(ProposalKind::Observation, reason.render().to_string())]
}
