//! Fitted isolation forest.
//!
//! The forest is an explicit, typed record of what a fitting routine produced:
//! an ordered set of trees, optional per-tree feature subsets (feature
//! bagging), the per-tree training sample count used as the score normalizer,
//! and the width and names of the feature space the trees were trained on.

use crate::config::ScoringConfig;
use crate::core::constants::DEFAULT_SCORE_OFFSET;
use crate::core::error::{AnomalyzeError, Result};
use crate::{ensure, shape_error};
use crate::core::types::FeatureIndex;
use crate::dataset::FeatureMatrix;
use crate::tree::tree::{IsolationTree, IsolationTreeView, TreeArrays};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Ensemble of fitted isolation trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest<T = IsolationTree> {
    trees: Vec<T>,
    feature_subsets: Option<Vec<Vec<FeatureIndex>>>,
    max_samples: usize,
    n_features: usize,
    feature_names: Option<Vec<String>>,
    offset: f64,
}

/// Builder for [`IsolationForest`].
#[derive(Debug, Clone)]
pub struct ForestBuilder<T = IsolationTree> {
    trees: Vec<T>,
    feature_subsets: Option<Vec<Vec<FeatureIndex>>>,
    max_samples: Option<usize>,
    n_features: Option<usize>,
    feature_names: Option<Vec<String>>,
    offset: f64,
}

impl<T> Default for ForestBuilder<T> {
    fn default() -> Self {
        ForestBuilder {
            trees: Vec::new(),
            feature_subsets: None,
            max_samples: None,
            n_features: None,
            feature_names: None,
            offset: DEFAULT_SCORE_OFFSET,
        }
    }
}

impl<T: IsolationTreeView> ForestBuilder<T> {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one tree
    pub fn tree(mut self, tree: T) -> Self {
        self.trees.push(tree);
        self
    }

    /// Append several trees
    pub fn trees<I: IntoIterator<Item = T>>(mut self, trees: I) -> Self {
        self.trees.extend(trees);
        self
    }

    /// Global feature indices used by each tree, in tree order
    pub fn feature_subsets(mut self, subsets: Vec<Vec<FeatureIndex>>) -> Self {
        self.feature_subsets = Some(subsets);
        self
    }

    /// Training samples per tree (defaults to the first tree's root count)
    pub fn max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = Some(max_samples);
        self
    }

    /// Width of the full feature space (defaults to the number of names, or
    /// one past the highest split feature)
    pub fn n_features(mut self, n_features: usize) -> Self {
        self.n_features = Some(n_features);
        self
    }

    /// Names of the features the forest was trained on
    pub fn feature_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Offset subtracted by the decision function
    pub fn offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Take the offset from a scoring configuration
    pub fn scoring_config(self, config: &ScoringConfig) -> Self {
        self.offset(config.offset)
    }

    /// Build and validate the forest
    pub fn build(self) -> Result<IsolationForest<T>> {
        let max_samples = match self.max_samples {
            Some(m) => m,
            None => self
                .trees
                .first()
                .map(|t| t.sample_count(t.root_id()))
                .unwrap_or(0),
        };

        let n_features = match (self.n_features, &self.feature_names) {
            (Some(n), _) => n,
            (None, Some(names)) => names.len(),
            (None, None) => match &self.feature_subsets {
                Some(subsets) => subsets.iter().flatten().max().map_or(0, |m| m + 1),
                None => self
                    .trees
                    .iter()
                    .filter_map(max_split_feature)
                    .max()
                    .map_or(0, |m| m + 1),
            },
        };

        let forest = IsolationForest {
            trees: self.trees,
            feature_subsets: self.feature_subsets,
            max_samples,
            n_features,
            feature_names: self.feature_names,
            offset: self.offset,
        };
        forest.validate()?;
        Ok(forest)
    }
}

fn max_split_feature<T: IsolationTreeView>(tree: &T) -> Option<FeatureIndex> {
    (0..tree.num_nodes())
        .filter_map(|node| tree.split_feature(node))
        .max()
}

impl<T: IsolationTreeView> IsolationForest<T> {
    /// Start building a forest
    pub fn builder() -> ForestBuilder<T> {
        ForestBuilder::new()
    }

    /// Trees in ensemble order
    pub fn trees(&self) -> &[T] {
        &self.trees
    }

    /// Number of trees
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Per-tree feature subsets, if the forest used feature bagging
    pub fn feature_subsets(&self) -> Option<&[Vec<FeatureIndex>]> {
        self.feature_subsets.as_deref()
    }

    /// Feature subset of one tree
    pub fn feature_subset(&self, tree: usize) -> Option<&[FeatureIndex]> {
        self.feature_subsets
            .as_ref()
            .and_then(|subsets| subsets.get(tree))
            .map(Vec::as_slice)
    }

    /// Training samples per tree
    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    /// Width of the full feature space
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Names of the training features, if known
    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    /// Decision function offset
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Maps a tree-local split feature to its global feature index.
    #[inline]
    pub fn global_feature(&self, tree: usize, local: FeatureIndex) -> FeatureIndex {
        match self.feature_subset(tree) {
            Some(subset) => subset[local],
            None => local,
        }
    }

    /// Checks that the forest is internally consistent.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.trees.is_empty(), shape_error!("forest has no trees"));
        ensure!(
            self.n_features > 0,
            shape_error!("forest has a zero-width feature space")
        );
        ensure!(
            self.max_samples > 0,
            AnomalyzeError::invalid_parameter("max_samples", "0", "must be at least 1")
        );
        if let Some(names) = &self.feature_names {
            if names.len() != self.n_features {
                return Err(shape_error!(
                    "{} feature names for {} features",
                    names.len(),
                    self.n_features
                ));
            }
        }
        if let Some(subsets) = &self.feature_subsets {
            if subsets.len() != self.trees.len() {
                return Err(shape_error!(
                    "{} feature subsets for {} trees",
                    subsets.len(),
                    self.trees.len()
                ));
            }
            if let Some(&bad) = subsets.iter().flatten().find(|&&f| f >= self.n_features) {
                return Err(AnomalyzeError::input_mismatch(
                    format!("feature subset indices below {}", self.n_features),
                    format!("index {}", bad),
                ));
            }
        }

        for (i, tree) in self.trees.iter().enumerate() {
            let width = self
                .feature_subset(i)
                .map_or(self.n_features, <[FeatureIndex]>::len);
            validate_tree(tree, width).map_err(|e| match e {
                AnomalyzeError::Shape { message } => {
                    shape_error!("tree {}: {}", i, message)
                }
                other => other,
            })?;
        }

        Ok(())
    }

    /// Checks that `matrix` lines up with the feature space of the forest.
    ///
    /// With stored feature names the columns must match them exactly and in
    /// order; otherwise only the column count is compared.
    pub fn check_matrix(&self, matrix: &FeatureMatrix) -> Result<()> {
        match &self.feature_names {
            Some(names) if names.as_slice() != matrix.feature_names() => {
                Err(AnomalyzeError::input_mismatch(
                    format!("features [{}]", names.join(", ")),
                    format!("features [{}]", matrix.feature_names().join(", ")),
                ))
            }
            None if matrix.num_features() != self.n_features => {
                Err(AnomalyzeError::input_mismatch(
                    format!("{} features", self.n_features),
                    format!("{} features", matrix.num_features()),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Reorders `matrix` columns into the training feature order.
    ///
    /// Extra columns are dropped; missing ones raise a schema error.
    pub fn align(&self, matrix: &FeatureMatrix) -> Result<FeatureMatrix> {
        match &self.feature_names {
            Some(names) => matrix.select(names),
            None => {
                self.check_matrix(matrix)?;
                Ok(matrix.clone())
            }
        }
    }
}

fn validate_tree<T: IsolationTreeView>(tree: &T, width: usize) -> Result<()> {
    let n = tree.num_nodes();
    if n == 0 {
        return Err(AnomalyzeError::shape("tree has no nodes"));
    }
    if tree.root_id() >= n {
        return Err(shape_error!("root id {} out of range", tree.root_id()));
    }

    for node in 0..n {
        match (tree.left_child(node), tree.right_child(node)) {
            (None, None) => {}
            (Some(l), Some(r)) => {
                if l >= n || r >= n {
                    return Err(shape_error!(
                        "node {} has children out of range",
                        node
                    ));
                }
                match tree.split_feature(node) {
                    Some(f) if f < width => {}
                    Some(f) => {
                        return Err(shape_error!(
                            "node {} splits on feature {} of {}",
                            node, f, width
                        ))
                    }
                    None => {
                        return Err(shape_error!(
                            "internal node {} has no split feature",
                            node
                        ))
                    }
                }
                if tree.split_threshold(node).is_none() {
                    return Err(shape_error!(
                        "internal node {} has no threshold",
                        node
                    ));
                }
            }
            _ => {
                return Err(shape_error!(
                    "node {} has exactly one child",
                    node
                ))
            }
        }
    }
    Ok(())
}

impl<T> IsolationForest<T>
where
    T: IsolationTreeView + Serialize + for<'de> Deserialize<'de>,
{
    /// Serialize to bincode
    pub fn to_bincode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from bincode and validate
    pub fn from_bincode(bytes: &[u8]) -> Result<Self> {
        let forest: Self = bincode::deserialize(bytes)?;
        forest.validate()?;
        Ok(forest)
    }
}

/// Forest in the attribute layout of a fitted scikit-learn `IsolationForest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestArrays {
    /// One array-layout tree per estimator
    pub estimators: Vec<TreeArrays>,
    /// `estimators_features_`
    #[serde(default)]
    pub estimators_features: Option<Vec<Vec<FeatureIndex>>>,
    /// `max_samples_`
    pub max_samples: usize,
    /// `n_features_in_`
    pub n_features_in: usize,
    /// `feature_names_in_`
    #[serde(default)]
    pub feature_names_in: Option<Vec<String>>,
    /// `offset_`
    #[serde(default = "default_offset")]
    pub offset: f64,
}

fn default_offset() -> f64 {
    DEFAULT_SCORE_OFFSET
}

impl IsolationForest<IsolationTree> {
    /// Builds a forest from its array layout.
    pub fn from_arrays(arrays: ForestArrays) -> Result<Self> {
        let trees = arrays
            .estimators
            .iter()
            .map(IsolationTree::from_arrays)
            .collect::<Result<Vec<_>>>()?;

        let forest = IsolationForest {
            trees,
            feature_subsets: arrays.estimators_features,
            max_samples: arrays.max_samples,
            n_features: arrays.n_features_in,
            feature_names: arrays.feature_names_in,
            offset: arrays.offset,
        };
        forest.validate()?;
        Ok(forest)
    }

    /// Exports the forest to its array layout.
    pub fn to_arrays(&self) -> ForestArrays {
        ForestArrays {
            estimators: self.trees.iter().map(IsolationTree::to_arrays).collect(),
            estimators_features: self.feature_subsets.clone(),
            max_samples: self.max_samples,
            n_features_in: self.n_features,
            feature_names_in: self.feature_names.clone(),
            offset: self.offset,
        }
    }

    /// Parses a forest exported from scikit-learn as JSON.
    pub fn from_sklearn_json(json: &str) -> Result<Self> {
        let arrays: ForestArrays = serde_json::from_str(json)?;
        let forest = Self::from_arrays(arrays)?;
        log::info!(
            "Loaded isolation forest: {} trees, {} features, max_samples={}",
            forest.num_trees(),
            forest.n_features(),
            forest.max_samples()
        );
        Ok(forest)
    }

    /// Serializes the forest as JSON in the scikit-learn array layout.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_arrays())?)
    }

    /// Reads a forest JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_sklearn_json(&content)
    }

    /// Writes the forest as a JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn stump(feature: FeatureIndex) -> IsolationTree {
        let mut tree = IsolationTree::new(8);
        tree.split_node(0, feature, 0.5, 2, 6).unwrap();
        tree
    }

    #[test]
    fn test_builder_defaults() {
        let forest = IsolationForest::builder()
            .tree(stump(0))
            .tree(stump(2))
            .build()
            .unwrap();
        assert_eq!(forest.num_trees(), 2);
        assert_eq!(forest.max_samples(), 8);
        assert_eq!(forest.n_features(), 3);
        assert_eq!(forest.offset(), -0.5);
        assert!(forest.feature_names().is_none());
    }

    #[test]
    fn test_empty_forest_rejected() {
        let result = IsolationForest::<IsolationTree>::builder().n_features(2).build();
        assert!(matches!(result, Err(AnomalyzeError::Shape { .. })));
    }

    #[test]
    fn test_split_feature_outside_space() {
        let result = IsolationForest::builder().tree(stump(3)).n_features(2).build();
        assert!(matches!(result, Err(AnomalyzeError::Shape { .. })));
    }

    #[test]
    fn test_feature_subsets() {
        let forest = IsolationForest::builder()
            .trees(vec![stump(0), stump(1)])
            .feature_subsets(vec![vec![2, 0], vec![1, 3]])
            .n_features(4)
            .build()
            .unwrap();
        assert_eq!(forest.global_feature(0, 0), 2);
        assert_eq!(forest.global_feature(1, 1), 3);

        let bad = IsolationForest::builder()
            .tree(stump(0))
            .feature_subsets(vec![vec![5]])
            .n_features(4)
            .build();
        assert!(matches!(bad, Err(AnomalyzeError::InputMismatch { .. })));

        // local index beyond the subset width
        let narrow = IsolationForest::builder()
            .tree(stump(1))
            .feature_subsets(vec![vec![0]])
            .n_features(4)
            .build();
        assert!(matches!(narrow, Err(AnomalyzeError::Shape { .. })));
    }

    #[test]
    fn test_check_matrix() {
        let forest = IsolationForest::builder()
            .tree(stump(1))
            .feature_names(["area", "intensity"])
            .build()
            .unwrap();

        let good = FeatureMatrix::from_rows(vec!["area", "intensity"], vec![vec![1.0, 2.0]]).unwrap();
        assert!(forest.check_matrix(&good).is_ok());

        let swapped =
            FeatureMatrix::from_rows(vec!["intensity", "area"], vec![vec![2.0, 1.0]]).unwrap();
        assert!(matches!(
            forest.check_matrix(&swapped),
            Err(AnomalyzeError::InputMismatch { .. })
        ));

        let aligned = forest.align(&swapped).unwrap();
        assert_eq!(aligned, good);

        let unnamed = IsolationForest::builder().tree(stump(1)).n_features(2).build().unwrap();
        let wide = FeatureMatrix::new(
            vec!["a".into(), "b".into(), "c".into()],
            array![[0.0, 0.0, 0.0]],
        )
        .unwrap();
        assert!(matches!(
            unnamed.check_matrix(&wide),
            Err(AnomalyzeError::InputMismatch { .. })
        ));
    }

    #[test]
    fn test_sklearn_json() {
        let json = r#"{
            "estimators": [{
                "children_left": [1, -1, -1],
                "children_right": [2, -1, -1],
                "feature": [1, -2, -2],
                "threshold": [0.25, -2.0, -2.0],
                "n_node_samples": [256, 3, 253]
            }],
            "estimators_features": [[0, 1]],
            "max_samples": 256,
            "n_features_in": 2,
            "feature_names_in": ["Cells_AreaShape_Area", "Nuclei_Intensity_Mean"]
        }"#;

        let forest = IsolationForest::from_sklearn_json(json).unwrap();
        assert_eq!(forest.num_trees(), 1);
        assert_eq!(forest.max_samples(), 256);
        assert_eq!(forest.offset(), -0.5);
        assert_eq!(forest.trees()[0].sample_count(2), 253);

        let restored = IsolationForest::from_sklearn_json(&forest.to_json().unwrap()).unwrap();
        assert_eq!(restored, forest);
    }

    #[test]
    fn test_bincode_round_trip() {
        let forest = IsolationForest::builder()
            .trees(vec![stump(0), stump(1)])
            .offset(-0.42)
            .build()
            .unwrap();
        let bytes = forest.to_bincode().unwrap();
        assert_eq!(IsolationForest::from_bincode(&bytes).unwrap(), forest);
    }
}
