use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{DetectorError, OutlierDetector};
use crate::engine::features::FeatureMatrix;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Seeded isolation forest. Rows that are isolated by fewer random splits
/// receive higher scores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolationForest {
    trees: usize,
    max_samples: usize,
    seed: u64,
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self {
            trees: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

impl IsolationForest {
    pub fn new(trees: usize, max_samples: usize, seed: u64) -> Self {
        Self {
            trees,
            max_samples,
            seed,
        }
    }

    pub fn with_seed(self, seed: u64) -> Self {
        Self { seed, ..self }
    }
}

impl OutlierDetector for IsolationForest {
    fn name(&self) -> &'static str {
        "isolation_forest"
    }

    fn raw_scores(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>, DetectorError> {
        let rows = matrix.row_count();
        if rows == 0 {
            return Ok(Vec::new());
        }
        if self.trees == 0 || self.max_samples == 0 {
            return Err(DetectorError::Failed(
                "forest needs at least one tree and one sample".to_string(),
            ));
        }

        let sample_size = self.max_samples.min(rows);
        let height_limit = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let forest: Vec<Node> = (0..self.trees)
            .map(|_| {
                let sample = rand::seq::index::sample(&mut rng, rows, sample_size).into_vec();
                grow(matrix, sample, 0, height_limit, &mut rng)
            })
            .collect();

        let normalizer = average_path_length(sample_size);
        let scores = (0..rows)
            .map(|row| {
                let total: f64 = forest
                    .iter()
                    .map(|tree| path_length(tree, matrix, row))
                    .sum();
                let mean = total / forest.len() as f64;
                let exponent = if normalizer > 0.0 {
                    -mean / normalizer
                } else {
                    0.0
                };
                2f64.powf(exponent)
            })
            .collect();

        Ok(scores)
    }
}

enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

fn grow(
    matrix: &FeatureMatrix,
    sample: Vec<usize>,
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= height_limit || sample.len() <= 1 {
        return Node::Leaf { size: sample.len() };
    }

    let candidates: Vec<(usize, f64, f64)> = (0..matrix.column_count())
        .filter_map(|feature| {
            let (lo, hi) = sample.iter().fold(
                (f64::INFINITY, f64::NEG_INFINITY),
                |(lo, hi), row| {
                    let value = matrix.value(*row, feature);
                    (lo.min(value), hi.max(value))
                },
            );
            (hi > lo).then_some((feature, lo, hi))
        })
        .collect();

    if candidates.is_empty() {
        return Node::Leaf { size: sample.len() };
    }

    let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
    // Interpolated rather than `gen_range(lo..hi)`: `hi - lo` may overflow.
    let t: f64 = rng.gen();
    let threshold = lo * (1.0 - t) + hi * t;

    let (left, right): (Vec<usize>, Vec<usize>) = sample
        .into_iter()
        .partition(|row| matrix.value(*row, feature) < threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(grow(matrix, left, depth + 1, height_limit, rng)),
        right: Box::new(grow(matrix, right, depth + 1, height_limit, rng)),
    }
}

fn path_length(tree: &Node, matrix: &FeatureMatrix, row: usize) -> f64 {
    let mut node = tree;
    let mut depth = 0.0;
    loop {
        match node {
            Node::Leaf { size } => return depth + average_path_length(*size),
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                node = if matrix.value(row, *feature) < *threshold {
                    left
                } else {
                    right
                };
                depth += 1.0;
            }
        }
    }
}

/// Expected path length of an unsuccessful search in a binary search tree
/// built from `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::dataset::{CellValue, Column, Dataset};

    fn matrix_with_outlier() -> FeatureMatrix {
        let mut rows: Vec<Vec<CellValue>> = (0..40)
            .map(|row| {
                let jitter = (row % 5) as f64 * 0.01;
                vec![
                    CellValue::Number(0.10 + jitter),
                    CellValue::Number(100.0 + (row % 7) as f64),
                ]
            })
            .collect();
        rows[17] = vec![CellValue::Number(0.95), CellValue::Number(480.0)];

        let dataset = Dataset::new(
            vec![Column::numeric("conversion_rate"), Column::numeric("sessions")],
            rows,
        )
        .expect("valid dataset");
        FeatureMatrix::prepare(&dataset).expect("matrix builds")
    }

    #[test]
    fn isolates_the_planted_outlier() {
        let matrix = matrix_with_outlier();
        let scores = IsolationForest::default()
            .raw_scores(&matrix)
            .expect("forest scores");

        let (top, _) = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .expect("non-empty scores");
        assert_eq!(top, 17);
        assert!(scores.iter().all(|score| (0.0..=1.0).contains(score)));
    }

    #[test]
    fn fixed_seed_is_reproducible() {
        let matrix = matrix_with_outlier();
        let first = IsolationForest::default().raw_scores(&matrix).expect("scores");
        let second = IsolationForest::default().raw_scores(&matrix).expect("scores");
        assert_eq!(first, second);
    }

    #[test]
    fn explicit_parameters_reproduce_the_default() {
        assert_eq!(IsolationForest::new(100, 256, 42), IsolationForest::default());
        assert_eq!(
            IsolationForest::new(10, 8, 3).with_seed(42),
            IsolationForest::new(10, 8, 42)
        );
    }

    #[test]
    fn reseeded_forest_still_isolates_the_outlier() {
        let matrix = matrix_with_outlier();
        let reseeded = IsolationForest::default()
            .with_seed(7)
            .raw_scores(&matrix)
            .expect("scores");
        let baseline = IsolationForest::default().raw_scores(&matrix).expect("scores");

        let (top, _) = reseeded
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .expect("non-empty scores");
        assert_eq!(top, 17);
        assert_ne!(reseeded, baseline);
    }

    #[test]
    fn empty_forest_is_a_detector_failure() {
        let err = IsolationForest::new(0, 256, 42)
            .raw_scores(&matrix_with_outlier())
            .expect_err("no trees");
        assert!(matches!(err, DetectorError::Failed(_)));
    }

    #[test]
    fn constant_features_score_uniformly() {
        let dataset = Dataset::new(
            vec![Column::numeric("flat")],
            (0..25).map(|_| vec![CellValue::Number(3.0)]).collect(),
        )
        .expect("valid dataset");
        let matrix = FeatureMatrix::prepare(&dataset).expect("matrix builds");

        let scores = IsolationForest::default().raw_scores(&matrix).expect("scores");

        assert!(scores.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[test]
    fn extreme_magnitudes_do_not_panic() {
        let dataset = Dataset::new(
            vec![Column::numeric("wide")],
            (0..30)
                .map(|row| {
                    let value = if row % 2 == 0 { f64::MAX } else { -f64::MAX };
                    vec![CellValue::Number(value)]
                })
                .collect(),
        )
        .expect("valid dataset");
        let matrix = FeatureMatrix::prepare(&dataset).expect("matrix builds");

        let scores = IsolationForest::default().raw_scores(&matrix).expect("scores");

        assert!(scores.iter().all(|score| score.is_finite()));
    }

    #[test]
    fn path_length_normalizer_matches_known_values() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!((average_path_length(256) - 10.2448).abs() < 1e-3);
    }
}
