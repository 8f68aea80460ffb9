//! Isolation path attribution.
//!
//! Every split a sample passes on its way from the root to its leaf shrinks the
//! expected remaining path length by `c(n_parent) - 1 - c(n_child)`. That
//! reduction is credited to the split feature, summed along the path, and
//! averaged over the trees of the forest.
//!
//! Trees are processed as independent tasks on a rayon pool. Each task returns
//! its own partial sums, which are reduced pairwise; nothing is shared mutably
//! between tasks.

use crate::attribution::importance::ImportanceTable;
use crate::config::AttributionConfig;
use crate::core::error::{AnomalyzeError, Result};
use crate::core::types::AbsentPolicy;
use crate::dataset::FeatureMatrix;
use crate::tree::{expected_path_lengths, IsolationForest, IsolationTree, IsolationTreeView};
use ndarray::{Array2, ArrayView2, Zip};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Path totals of one or more trees.
struct PathTotals {
    gains: Array2<f64>,
    visits: Array2<u32>,
}

impl PathTotals {
    fn zeros(num_samples: usize, num_features: usize) -> Self {
        PathTotals {
            gains: Array2::zeros((num_samples, num_features)),
            visits: Array2::zeros((num_samples, num_features)),
        }
    }

    fn merge(mut self, other: PathTotals) -> Self {
        self.gains += &other.gains;
        self.visits += &other.visits;
        self
    }
}

/// Computes and caches the importance table of one forest over one matrix.
///
/// The attributor is either uncomputed (holding only its inputs) or computed
/// (also holding the cached table). [`compute`](Self::compute) always
/// recomputes from scratch; [`filter`](Self::filter) computes on first use.
#[derive(Debug)]
pub struct IsolationPathAttributor<'a, T: IsolationTreeView = IsolationTree> {
    forest: &'a IsolationForest<T>,
    features: &'a FeatureMatrix,
    config: AttributionConfig,
    importances: Option<ImportanceTable>,
}

impl<'a, T: IsolationTreeView> IsolationPathAttributor<'a, T> {
    /// Attributor with the default configuration.
    pub fn new(forest: &'a IsolationForest<T>, features: &'a FeatureMatrix) -> Self {
        Self::with_config(forest, features, AttributionConfig::default())
    }

    pub fn with_config(
        forest: &'a IsolationForest<T>,
        features: &'a FeatureMatrix,
        config: AttributionConfig,
    ) -> Self {
        IsolationPathAttributor {
            forest,
            features,
            config,
            importances: None,
        }
    }

    pub fn config(&self) -> &AttributionConfig {
        &self.config
    }

    /// Whether a table has been computed and cached.
    pub fn is_computed(&self) -> bool {
        self.importances.is_some()
    }

    /// The cached table, if computed.
    pub fn importances(&self) -> Option<&ImportanceTable> {
        self.importances.as_ref()
    }

    /// Consumes the attributor, returning the cached table.
    pub fn into_importances(self) -> Option<ImportanceTable> {
        self.importances
    }

    /// Computes the importance table and caches it.
    pub fn compute(&mut self) -> Result<&ImportanceTable> {
        let never = AtomicBool::new(false);
        self.compute_with_cancel(&never)
    }

    /// Like [`compute`](Self::compute), but gives up once `cancel` is set.
    ///
    /// On cancellation partial results are discarded and a previously cached
    /// table is left untouched.
    pub fn compute_with_cancel(&mut self, cancel: &AtomicBool) -> Result<&ImportanceTable> {
        match compute_table(self.forest, self.features, &self.config, cancel) {
            Ok(table) => Ok(&*self.importances.insert(table)),
            Err(e) => {
                if e.is_recoverable() {
                    log::info!("attribution stopped ({}): {}", e.category(), e);
                } else {
                    log::error!("attribution failed ({}): {}", e.category(), e);
                }
                Err(e)
            }
        }
    }

    /// Finite importances of the given features, computing the table first
    /// if needed.
    pub fn filter<S: AsRef<str>>(&mut self, features: &[S]) -> Result<BTreeMap<String, Vec<f64>>> {
        if let Some(table) = &self.importances {
            return table.filter(features);
        }
        self.compute()?.filter(features)
    }
}

/// One-shot attribution with the default configuration.
pub fn compute_importances<T: IsolationTreeView>(
    forest: &IsolationForest<T>,
    features: &FeatureMatrix,
) -> Result<ImportanceTable> {
    compute_table(
        forest,
        features,
        &AttributionConfig::default(),
        &AtomicBool::new(false),
    )
}

fn compute_table<T: IsolationTreeView>(
    forest: &IsolationForest<T>,
    features: &FeatureMatrix,
    config: &AttributionConfig,
    cancel: &AtomicBool,
) -> Result<ImportanceTable> {
    forest.check_matrix(features)?;

    let num_samples = features.num_samples();
    let num_features = features.num_features();
    let names = features.feature_names().to_vec();

    if num_samples == 0 {
        log::debug!("empty feature matrix, returning an empty importance table");
        return Ok(ImportanceTable::empty(names));
    }

    let start = Instant::now();
    let num_threads = config.effective_num_threads();
    let values = features.values();

    let task = |(index, tree): (usize, &T)| -> Result<PathTotals> {
        if cancel.load(Ordering::Relaxed) {
            return Err(AnomalyzeError::cancelled("attribution cancelled between trees"));
        }
        tree_totals(forest, index, tree, &values, num_features)
    };

    let totals = if num_threads <= 1 {
        forest
            .trees()
            .iter()
            .enumerate()
            .map(task)
            .try_fold(PathTotals::zeros(num_samples, num_features), |acc, partial| {
                partial.map(|p| acc.merge(p))
            })?
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| AnomalyzeError::internal(format!("failed to create thread pool: {}", e)))?;
        pool.install(|| {
            forest
                .trees()
                .par_iter()
                .enumerate()
                .map(task)
                .try_reduce(
                    || PathTotals::zeros(num_samples, num_features),
                    |a, b| Ok(a.merge(b)),
                )
        })?
    };

    if cancel.load(Ordering::Relaxed) {
        return Err(AnomalyzeError::cancelled("attribution cancelled before averaging"));
    }

    let num_trees = forest.num_trees() as f64;
    let mut averaged = totals.gains / num_trees;
    if config.absent_policy == AbsentPolicy::Absent {
        Zip::from(&mut averaged)
            .and(&totals.visits)
            .for_each(|value, &visits| {
                if visits == 0 {
                    *value = f64::NAN;
                }
            });
    }

    log::info!(
        "Computed isolation path importances for {} samples x {} features over {} trees in {:.2?} ({} threads)",
        num_samples,
        num_features,
        forest.num_trees(),
        start.elapsed(),
        num_threads
    );

    ImportanceTable::new(names, averaged)
}

fn tree_totals<T: IsolationTreeView>(
    forest: &IsolationForest<T>,
    index: usize,
    tree: &T,
    values: &ArrayView2<'_, f64>,
    num_features: usize,
) -> Result<PathTotals> {
    let mut totals = PathTotals::zeros(values.nrows(), num_features);

    let counts: Vec<usize> = (0..tree.num_nodes()).map(|n| tree.sample_count(n)).collect();
    let c = expected_path_lengths(&counts);

    // Trees trained on a feature subset read their columns through it.
    let subset = forest.feature_subset(index);

    for (row, sample) in values.outer_iter().enumerate() {
        let path = tree.decision_path_through(&sample, subset)?;
        for step in path.windows(2) {
            let (parent, child) = (step[0], step[1]);
            let split = tree.split_feature(parent).ok_or_else(|| {
                AnomalyzeError::internal(format!("node {} on a decision path has no split", parent))
            })?;
            let feature = forest.global_feature(index, split);
            totals.gains[[row, feature]] += c[parent] - 1.0 - c[child];
            totals.visits[[row, feature]] += 1;
        }
    }

    log::debug!("tree {}: attributed {} samples", index, values.nrows());
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::expected_path_length;
    use approx::assert_abs_diff_eq;

    fn stump(feature: usize, root: usize, left: usize, right: usize) -> IsolationTree {
        let mut tree = IsolationTree::new(root);
        tree.split_node(0, feature, 0.5, left, right).unwrap();
        tree
    }

    fn matrix(rows: Vec<Vec<f64>>) -> FeatureMatrix {
        FeatureMatrix::from_rows(vec!["f0", "f1"], rows).unwrap()
    }

    fn sequential() -> AttributionConfig {
        AttributionConfig {
            num_threads: 1,
            ..AttributionConfig::default()
        }
    }

    #[test]
    fn test_single_split_gain() {
        let forest = IsolationForest::builder()
            .tree(stump(0, 10, 3, 7))
            .n_features(2)
            .build()
            .unwrap();
        let features = matrix(vec![vec![0.0, 9.0]]);

        let mut attributor = IsolationPathAttributor::with_config(&forest, &features, sequential());
        assert!(!attributor.is_computed());
        let table = attributor.compute().unwrap();

        let expected = expected_path_length(10) - 1.0 - expected_path_length(3);
        assert_abs_diff_eq!(table.get(0, "f0").unwrap(), expected, epsilon = 1e-12);
        assert_eq!(table.get(0, "f1"), Some(0.0));
        assert!(attributor.is_computed());
    }

    #[test]
    fn test_right_branch() {
        let forest = IsolationForest::builder()
            .tree(stump(1, 10, 3, 7))
            .n_features(2)
            .build()
            .unwrap();
        let features = matrix(vec![vec![0.0, 0.9], vec![0.0, f64::NAN]]);
        let table = compute_importances(&forest, &features).unwrap();

        let expected = expected_path_length(10) - 1.0 - expected_path_length(7);
        assert_abs_diff_eq!(table.get(0, "f1").unwrap(), expected, epsilon = 1e-12);
        assert_abs_diff_eq!(table.get(1, "f1").unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_two_trees_are_averaged() {
        let forest = IsolationForest::builder()
            .trees(vec![stump(0, 10, 3, 7), stump(1, 10, 3, 7)])
            .n_features(2)
            .build()
            .unwrap();
        let features = matrix(vec![vec![0.0, 0.0]]);
        let table = IsolationPathAttributor::with_config(&forest, &features, sequential())
            .compute()
            .unwrap()
            .clone();

        let single = expected_path_length(10) - 1.0 - expected_path_length(3);
        assert_abs_diff_eq!(table.get(0, "f0").unwrap(), single / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(table.get(0, "f1").unwrap(), single / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_repeated_feature_on_path_adds_up() {
        let mut tree = IsolationTree::new(16);
        let (left, _) = tree.split_node(0, 0, 5.0, 10, 6).unwrap();
        tree.split_node(left, 0, 1.0, 4, 6).unwrap();
        let forest = IsolationForest::builder().tree(tree).n_features(2).build().unwrap();

        let features = matrix(vec![vec![0.0, 0.0]]);
        let table = compute_importances(&forest, &features).unwrap();
        let expected = (expected_path_length(16) - 1.0 - expected_path_length(10))
            + (expected_path_length(10) - 1.0 - expected_path_length(4));
        assert_abs_diff_eq!(table.get(0, "f0").unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_feature_subsets_map_to_global_columns() {
        // local feature 0 of this tree is global feature 1
        let forest = IsolationForest::builder()
            .tree(stump(0, 10, 3, 7))
            .feature_subsets(vec![vec![1]])
            .n_features(2)
            .build()
            .unwrap();
        let features = matrix(vec![vec![100.0, 0.0], vec![0.0, 100.0]]);
        let table = compute_importances(&forest, &features).unwrap();

        let left = expected_path_length(10) - 1.0 - expected_path_length(3);
        let right = expected_path_length(10) - 1.0 - expected_path_length(7);
        assert_eq!(table.get(0, "f0"), Some(0.0));
        assert_abs_diff_eq!(table.get(0, "f1").unwrap(), left, epsilon = 1e-12);
        assert_abs_diff_eq!(table.get(1, "f1").unwrap(), right, epsilon = 1e-12);
    }

    #[test]
    fn test_absent_policy() {
        let forest = IsolationForest::builder()
            .tree(stump(0, 10, 3, 7))
            .n_features(2)
            .build()
            .unwrap();
        let features = matrix(vec![vec![0.0, 0.0], vec![1.0, 0.0]]);
        let config = AttributionConfig {
            num_threads: 1,
            absent_policy: AbsentPolicy::Absent,
        };

        let mut attributor = IsolationPathAttributor::with_config(&forest, &features, config);
        let table = attributor.compute().unwrap();
        assert!(table.get(0, "f1").unwrap().is_nan());

        let filtered = attributor.filter(&["f0", "f1"]).unwrap();
        assert_eq!(filtered["f0"].len(), 2);
        assert!(!filtered.contains_key("f1"));
    }

    #[test]
    fn test_filter_computes_on_demand() {
        let forest = IsolationForest::builder()
            .tree(stump(0, 10, 3, 7))
            .n_features(2)
            .build()
            .unwrap();
        let features = matrix(vec![vec![0.0, 0.0]]);
        let mut attributor = IsolationPathAttributor::new(&forest, &features);
        let filtered = attributor.filter(&["f0"]).unwrap();
        assert_eq!(filtered["f0"].len(), 1);
        assert!(attributor.is_computed());
    }

    #[test]
    fn test_compute_is_idempotent() {
        let forest = IsolationForest::builder()
            .trees(vec![stump(0, 10, 3, 7), stump(1, 10, 2, 8), stump(0, 10, 5, 5)])
            .n_features(2)
            .build()
            .unwrap();
        let features = matrix(vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.2, 0.7]]);

        let mut attributor = IsolationPathAttributor::with_config(&forest, &features, sequential());
        let first = attributor.compute().unwrap().clone();
        let second = attributor.compute().unwrap().clone();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_matrix() {
        let forest = IsolationForest::builder()
            .tree(stump(0, 10, 3, 7))
            .n_features(2)
            .build()
            .unwrap();
        let features = matrix(Vec::new());
        let table = compute_importances(&forest, &features).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.num_features(), 2);
    }

    #[test]
    fn test_mismatched_width() {
        let forest = IsolationForest::builder()
            .tree(stump(0, 10, 3, 7))
            .n_features(3)
            .build()
            .unwrap();
        let features = matrix(vec![vec![0.0, 0.0]]);
        assert!(matches!(
            compute_importances(&forest, &features),
            Err(AnomalyzeError::InputMismatch { .. })
        ));
    }

    #[test]
    fn test_cancelled_keeps_previous_table() {
        let forest = IsolationForest::builder()
            .tree(stump(0, 10, 3, 7))
            .n_features(2)
            .build()
            .unwrap();
        let features = matrix(vec![vec![0.0, 0.0]]);
        let mut attributor = IsolationPathAttributor::with_config(&forest, &features, sequential());
        let before = attributor.compute().unwrap().clone();

        let cancel = AtomicBool::new(true);
        assert!(matches!(
            attributor.compute_with_cancel(&cancel),
            Err(AnomalyzeError::Cancelled { .. })
        ));
        assert_eq!(attributor.importances(), Some(&before));
    }
}
