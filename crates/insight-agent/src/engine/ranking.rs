use super::policy::RankingWeights;

/// `weight_impact * |impact_proxy| + weight_confidence * anomaly_score` per row.
pub fn composite_scores(
    anomaly_scores: &[f64],
    impact_proxies: &[f64],
    weights: &RankingWeights,
) -> Vec<f64> {
    anomaly_scores
        .iter()
        .zip(impact_proxies)
        .map(|(anomaly, impact)| {
            let score = weights.weight_impact * impact.abs() + weights.weight_confidence * anomaly;
            if score.is_finite() {
                score
            } else {
                0.0
            }
        })
        .collect()
}

/// Row indices of the `k` highest scores, best first.
///
/// `k` is clamped into `1..=scores.len()`. Equal scores keep their original
/// row order.
pub fn select_top_k(scores: &[f64], k: usize) -> Vec<usize> {
    if scores.is_empty() {
        return Vec::new();
    }

    let k = k.clamp(1, scores.len());
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));
    order.truncate(k);
    order
}
