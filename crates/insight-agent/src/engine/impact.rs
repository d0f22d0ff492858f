use super::dataset::Dataset;
use super::diagnostics::EngineWarning;
use super::stats::{median, EPSILON};

#[derive(Debug, Clone, PartialEq)]
pub struct ImpactScores {
    /// Signed relative deviation from the baseline, one value per row.
    pub proxies: Vec<f64>,
    /// Robust baseline the proxies are measured against, when computable.
    pub baseline: Option<f64>,
    pub warning: Option<EngineWarning>,
}

impl ImpactScores {
    fn zeroed(rows: usize, warning: Option<EngineWarning>) -> Self {
        Self {
            proxies: vec![0.0; rows],
            baseline: None,
            warning,
        }
    }
}

/// Scores each row's metric value against the column median.
///
/// The median is replaced by the median absolute value (plus epsilon) when it
/// is exactly zero. Rows without a usable value, and rows whose proxy is not
/// finite, score 0 and are reported in a single warning.
pub fn score_impact(dataset: &Dataset, metric: Option<&str>) -> ImpactScores {
    let rows = dataset.row_count();

    let Some(metric) = metric else {
        return ImpactScores::zeroed(rows, Some(EngineWarning::NoMetricSelected));
    };

    let Some(values) = dataset.numeric_values(metric) else {
        tracing::debug!(
            metric,
            present = dataset.column(metric).is_some(),
            "metric column unusable; impact defaults to zero"
        );
        return ImpactScores::zeroed(
            rows,
            Some(EngineWarning::MetricUnavailable {
                metric: metric.to_string(),
            }),
        );
    };

    let Some(baseline) = robust_baseline(&values) else {
        return ImpactScores::zeroed(
            rows,
            Some(EngineWarning::ImpactRowsDegraded {
                metric: metric.to_string(),
                rows: (0..rows).collect(),
            }),
        );
    };

    let denominator = baseline.abs() + EPSILON;
    let mut degraded = Vec::new();
    let proxies = values
        .iter()
        .enumerate()
        .map(|(row, value)| {
            match value.map(|value| (value - baseline) / denominator) {
                Some(proxy) if proxy.is_finite() => proxy,
                _ => {
                    degraded.push(row);
                    0.0
                }
            }
        })
        .collect();

    let warning = (!degraded.is_empty()).then(|| EngineWarning::ImpactRowsDegraded {
        metric: metric.to_string(),
        rows: degraded,
    });

    ImpactScores {
        proxies,
        baseline: Some(baseline),
        warning,
    }
}

fn robust_baseline(values: &[Option<f64>]) -> Option<f64> {
    let present = || values.iter().flatten().copied();
    let center = median(present())?;
    if center != 0.0 {
        return Some(center);
    }

    median(present().map(f64::abs)).map(|spread| spread + EPSILON)
}
