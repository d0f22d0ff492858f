use std::fmt;

use serde::Serialize;

use super::policy::ConfidenceThresholds;

/// Ordinal confidence derived from a row's anomaly score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ConfidenceBand {
    Low,
    Medium,
    High,
}

impl ConfidenceBand {
    pub fn label(self) -> &'static str {
        match self {
            ConfidenceBand::Low => "Low",
            ConfidenceBand::Medium => "Medium",
            ConfidenceBand::High => "High",
        }
    }

    pub fn classify(anomaly_score: f64, thresholds: &ConfidenceThresholds) -> Self {
        if anomaly_score >= thresholds.high {
            ConfidenceBand::High
        } else if anomaly_score >= thresholds.medium {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

impl fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_follow_default_cut_points() {
        let thresholds = ConfidenceThresholds::default();
        assert_eq!(ConfidenceBand::classify(0.95, &thresholds), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::classify(0.8, &thresholds), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::classify(0.6, &thresholds), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::classify(0.59, &thresholds), ConfidenceBand::Low);
    }

    #[test]
    fn moving_thresholds_shifts_bands() {
        let strict = ConfidenceThresholds {
            high: 0.95,
            medium: 0.9,
        };
        let lenient = ConfidenceThresholds {
            high: 0.5,
            medium: 0.2,
        };

        assert_eq!(ConfidenceBand::classify(0.7, &strict), ConfidenceBand::Low);
        assert_eq!(ConfidenceBand::classify(0.7, &lenient), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::classify(0.3, &lenient), ConfidenceBand::Medium);
    }

    #[test]
    fn zero_scores_are_low_whenever_medium_is_positive() {
        let thresholds = ConfidenceThresholds {
            high: 0.01,
            medium: 0.001,
        };
        assert_eq!(ConfidenceBand::classify(0.0, &thresholds), ConfidenceBand::Low);
    }
}
