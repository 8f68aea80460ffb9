//! Anomaly scores from a fitted isolation forest.
//!
//! Scores follow the scikit-learn convention: `score_samples` lies in
//! `[-1, 0)` and lower means more anomalous; `decision_function` shifts it by
//! the forest offset so that negative values are outliers.

use crate::core::error::{AnomalyzeError, Result};
use crate::core::types::{FeatureIndex, Prediction, RowIndex};
use crate::dataset::FeatureMatrix;
use crate::tree::{expected_path_length, IsolationForest, IsolationTreeView};
use ndarray::{Array1, ArrayView1};
use rayon::prelude::*;
use std::cmp::Ordering;

/// Depth of the leaf reached by `sample` plus `c(n_leaf)` for the training
/// samples left unseparated in it. `sample` uses tree-local feature ids.
pub fn path_length<T: IsolationTreeView>(tree: &T, sample: &ArrayView1<'_, f64>) -> Result<f64> {
    path_length_through(tree, sample, None)
}

fn path_length_through<T: IsolationTreeView>(
    tree: &T,
    sample: &ArrayView1<'_, f64>,
    columns: Option<&[FeatureIndex]>,
) -> Result<f64> {
    let path = tree.decision_path_through(sample, columns)?;
    let leaf = *path
        .last()
        .ok_or_else(|| AnomalyzeError::internal("empty decision path"))?;
    Ok((path.len() - 1) as f64 + expected_path_length(tree.sample_count(leaf)))
}

/// Path length averaged over the trees of the forest, per sample.
pub fn mean_path_lengths<T: IsolationTreeView>(
    forest: &IsolationForest<T>,
    features: &FeatureMatrix,
) -> Result<Array1<f64>> {
    forest.check_matrix(features)?;
    let values = features.values();
    let num_trees = forest.num_trees() as f64;

    let lengths = (0..features.num_samples())
        .into_par_iter()
        .map(|row| -> Result<f64> {
            let sample = values.row(row);
            let mut total = 0.0;
            for (index, tree) in forest.trees().iter().enumerate() {
                total += path_length_through(tree, &sample, forest.feature_subset(index))?;
            }
            Ok(total / num_trees)
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok(Array1::from(lengths))
}

/// Raw anomaly score `-2^(-E[h(x)] / c(max_samples))`.
pub fn score_samples<T: IsolationTreeView>(
    forest: &IsolationForest<T>,
    features: &FeatureMatrix,
) -> Result<Array1<f64>> {
    let normalizer = expected_path_length(forest.max_samples());
    let lengths = mean_path_lengths(forest, features)?;
    Ok(lengths.mapv(|h| {
        if normalizer > 0.0 {
            -(2f64.powf(-h / normalizer))
        } else {
            // a single training sample per tree isolates nothing
            -1.0
        }
    }))
}

/// `score_samples` minus the forest offset; negative values are outliers.
pub fn decision_function<T: IsolationTreeView>(
    forest: &IsolationForest<T>,
    features: &FeatureMatrix,
) -> Result<Array1<f64>> {
    let offset = forest.offset();
    Ok(score_samples(forest, features)? - offset)
}

/// Inlier / outlier label per sample.
pub fn predict<T: IsolationTreeView>(
    forest: &IsolationForest<T>,
    features: &FeatureMatrix,
) -> Result<Vec<Prediction>> {
    let decisions = decision_function(forest, features)?;
    Ok(decisions
        .iter()
        .map(|&d| {
            if d < 0.0 {
                Prediction::Outlier
            } else {
                Prediction::Inlier
            }
        })
        .collect())
}

fn ranked(scores: &[f64], descending: bool) -> Vec<RowIndex> {
    let mut rows: Vec<RowIndex> = (0..scores.len()).filter(|&i| !scores[i].is_nan()).collect();
    rows.sort_by(|&a, &b| {
        let order = scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal);
        if descending {
            order.reverse()
        } else {
            order
        }
    });
    rows
}

/// Rows of the `k` lowest scores (most anomalous first). Ties keep row order;
/// NaN scores are ignored.
pub fn most_anomalous(scores: &[f64], k: usize) -> Vec<RowIndex> {
    let mut rows = ranked(scores, false);
    rows.truncate(k);
    rows
}

/// Rows of the `k` highest scores (least anomalous first). Ties keep row
/// order; NaN scores are ignored.
pub fn least_anomalous(scores: &[f64], k: usize) -> Vec<RowIndex> {
    let mut rows = ranked(scores, true);
    rows.truncate(k);
    rows
}
