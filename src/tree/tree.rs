//! Fitted isolation tree structure.
//!
//! [`IsolationTreeView`] is the read-only capability the attributor and the
//! scorer need: node-level introspection plus root-to-leaf routing. The arena
//! [`IsolationTree`] is the concrete representation shipped with the crate and
//! can be built node by node or imported from the array layout used by
//! scikit-learn's `tree_` objects.

use crate::core::constants::{ROOT_NODE, TREE_LEAF, TREE_UNDEFINED};
use crate::core::error::{AnomalyzeError, Result};
use crate::shape_error;
use crate::core::types::{FeatureIndex, NodeIndex};
use crate::tree::node::TreeNode;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Read-only view of a fitted isolation tree.
///
/// Node accessors take a node id in `0..num_nodes()`.
pub trait IsolationTreeView: Send + Sync {
    /// Root node id
    fn root_id(&self) -> NodeIndex {
        ROOT_NODE
    }

    /// Number of nodes
    fn num_nodes(&self) -> usize;

    /// Left child of `node`, `None` for leaves
    fn left_child(&self, node: NodeIndex) -> Option<NodeIndex>;

    /// Right child of `node`, `None` for leaves
    fn right_child(&self, node: NodeIndex) -> Option<NodeIndex>;

    /// Tree-local split feature of `node`, `None` for leaves
    fn split_feature(&self, node: NodeIndex) -> Option<FeatureIndex>;

    /// Split threshold of `node`, `None` for leaves
    fn split_threshold(&self, node: NodeIndex) -> Option<f64>;

    /// Number of training samples routed through `node`
    fn sample_count(&self, node: NodeIndex) -> usize;

    /// Whether `node` is a leaf
    fn is_leaf(&self, node: NodeIndex) -> bool {
        self.left_child(node).is_none() && self.right_child(node).is_none()
    }

    /// Nodes visited from the root to the leaf reached by `sample`, both included.
    ///
    /// A sample goes left when `sample[feature] <= threshold` and right
    /// otherwise, so NaN values always go right. `sample` is indexed with the
    /// tree-local feature ids.
    fn decision_path(&self, sample: &ArrayView1<'_, f64>) -> Result<Vec<NodeIndex>> {
        self.decision_path_through(sample, None)
    }

    /// Like [`decision_path`](Self::decision_path) for a full-width sample of a
    /// tree trained on a feature subset: tree-local feature `f` reads
    /// `sample[columns[f]]`.
    fn decision_path_through(
        &self,
        sample: &ArrayView1<'_, f64>,
        columns: Option<&[FeatureIndex]>,
    ) -> Result<Vec<NodeIndex>> {
        let mut path = Vec::new();
        let mut node = self.root_id();

        loop {
            if node >= self.num_nodes() {
                return Err(AnomalyzeError::index_out_of_bounds(node, self.num_nodes()));
            }
            if path.len() >= self.num_nodes() {
                return Err(AnomalyzeError::internal("tree traversal did not reach a leaf"));
            }
            path.push(node);

            if self.is_leaf(node) {
                return Ok(path);
            }

            let (feature, threshold) = match (self.split_feature(node), self.split_threshold(node)) {
                (Some(f), Some(t)) => (f, t),
                _ => {
                    return Err(AnomalyzeError::internal(format!(
                        "internal node {} has no split",
                        node
                    )))
                }
            };
            let column = match columns {
                Some(columns) => *columns.get(feature).ok_or_else(|| {
                    AnomalyzeError::input_mismatch(
                        format!("a column for tree feature {}", feature),
                        format!("{} mapped columns", columns.len()),
                    )
                })?,
                None => feature,
            };
            let value = *sample.get(column).ok_or_else(|| {
                AnomalyzeError::input_mismatch(
                    format!("at least {} features", column + 1),
                    format!("{} features", sample.len()),
                )
            })?;

            let next = if value <= threshold {
                self.left_child(node)
            } else {
                self.right_child(node)
            };
            node = next.ok_or_else(|| {
                AnomalyzeError::internal(format!("internal node {} is missing a child", node))
            })?;
        }
    }

    /// Leaf reached by `sample`.
    fn leaf_for(&self, sample: &ArrayView1<'_, f64>) -> Result<NodeIndex> {
        let path = self.decision_path(sample)?;
        path.last()
            .copied()
            .ok_or_else(|| AnomalyzeError::internal("empty decision path"))
    }
}

/// Parallel-array tree layout (`children_left`, `children_right`, `feature`,
/// `threshold`, `n_node_samples`), with `-1` marking a missing child and `-2`
/// an undefined feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeArrays {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub n_node_samples: Vec<usize>,
}

/// Isolation tree stored as a node arena (index 0 is the root).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    nodes: Vec<TreeNode>,
    max_depth: usize,
}

impl IsolationTree {
    /// Creates a tree with a single root leaf holding `sample_count` samples.
    pub fn new(sample_count: usize) -> Self {
        IsolationTree {
            nodes: vec![TreeNode::new_leaf(sample_count, 0, None)],
            max_depth: 0,
        }
    }

    /// Returns the number of leaf nodes in the tree.
    pub fn num_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Returns the tree depth (maximum depth of any node).
    pub fn depth(&self) -> usize {
        self.max_depth
    }

    /// Returns the node at `index`.
    pub fn node(&self, index: NodeIndex) -> Option<&TreeNode> {
        self.nodes.get(index)
    }

    /// All nodes in arena order.
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Returns the root node of the tree.
    pub fn root(&self) -> &TreeNode {
        &self.nodes[ROOT_NODE]
    }

    /// Highest tree-local feature index used by any split.
    pub fn max_split_feature(&self) -> Option<FeatureIndex> {
        self.nodes.iter().filter_map(TreeNode::split_feature).max()
    }

    /// Splits a leaf into an internal node with two new leaf children.
    pub fn split_node(
        &mut self,
        node_index: NodeIndex,
        split_feature: FeatureIndex,
        split_threshold: f64,
        left_sample_count: usize,
        right_sample_count: usize,
    ) -> Result<(NodeIndex, NodeIndex)> {
        let node = self
            .nodes
            .get(node_index)
            .ok_or_else(|| AnomalyzeError::index_out_of_bounds(node_index, self.nodes.len()))?;

        if !node.is_leaf() {
            return Err(AnomalyzeError::invalid_parameter(
                "node_index",
                node_index.to_string(),
                "cannot split a non-leaf node",
            ));
        }

        let child_depth = node.depth() + 1;
        self.max_depth = self.max_depth.max(child_depth);

        let left_child_index = self.nodes.len();
        let right_child_index = left_child_index + 1;

        self.nodes
            .push(TreeNode::new_leaf(left_sample_count, child_depth, Some(node_index)));
        self.nodes
            .push(TreeNode::new_leaf(right_sample_count, child_depth, Some(node_index)));
        self.nodes[node_index].set_split(
            left_child_index,
            right_child_index,
            split_feature,
            split_threshold,
        );

        Ok((left_child_index, right_child_index))
    }

    /// Builds a tree from the parallel-array layout.
    pub fn from_arrays(arrays: &TreeArrays) -> Result<Self> {
        let n = arrays.children_left.len();
        if n == 0 {
            return Err(AnomalyzeError::shape("tree has no nodes"));
        }
        for (name, len) in [
            ("children_right", arrays.children_right.len()),
            ("feature", arrays.feature.len()),
            ("threshold", arrays.threshold.len()),
            ("n_node_samples", arrays.n_node_samples.len()),
        ] {
            if len != n {
                return Err(shape_error!(
                    "{} has {} entries, children_left has {}",
                    name, len, n
                ));
            }
        }

        let child = |raw: i64, node: usize| -> Result<Option<NodeIndex>> {
            match raw {
                TREE_LEAF => Ok(None),
                c if c >= 0 && (c as usize) < n => Ok(Some(c as usize)),
                c => Err(shape_error!(
                    "node {} has invalid child id {}",
                    node, c
                )),
            }
        };

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let left = child(arrays.children_left[i], i)?;
            let right = child(arrays.children_right[i], i)?;
            let node = match (left, right) {
                (None, None) => TreeNode::new_leaf(arrays.n_node_samples[i], 0, None),
                (Some(l), Some(r)) => {
                    let feature = arrays.feature[i];
                    if feature < 0 {
                        return Err(shape_error!(
                            "internal node {} has undefined split feature",
                            i
                        ));
                    }
                    TreeNode::new_internal(
                        l,
                        r,
                        None,
                        feature as FeatureIndex,
                        arrays.threshold[i],
                        arrays.n_node_samples[i],
                        0,
                    )
                }
                _ => {
                    return Err(shape_error!(
                        "node {} has exactly one child",
                        i
                    ))
                }
            };
            nodes.push(node);
        }

        let mut tree = IsolationTree {
            nodes,
            max_depth: 0,
        };
        tree.link_parents()?;
        Ok(tree)
    }

    /// Exports the tree to the parallel-array layout.
    pub fn to_arrays(&self) -> TreeArrays {
        let id = |c: Option<NodeIndex>| c.map_or(TREE_LEAF, |c| c as i64);
        TreeArrays {
            children_left: self.nodes.iter().map(|n| id(n.left_child())).collect(),
            children_right: self.nodes.iter().map(|n| id(n.right_child())).collect(),
            feature: self
                .nodes
                .iter()
                .map(|n| n.split_feature().map_or(TREE_UNDEFINED, |f| f as i64))
                .collect(),
            threshold: self
                .nodes
                .iter()
                .map(|n| n.split_threshold().unwrap_or(TREE_UNDEFINED as f64))
                .collect(),
            n_node_samples: self.nodes.iter().map(TreeNode::sample_count).collect(),
        }
    }

    // Walks from the root assigning parents and depths; every node must be
    // reached exactly once.
    fn link_parents(&mut self) -> Result<()> {
        let n = self.nodes.len();
        let mut seen = vec![false; n];
        let mut stack = vec![(ROOT_NODE, None, 0usize)];
        self.max_depth = 0;

        while let Some((index, parent, depth)) = stack.pop() {
            if seen[index] {
                return Err(shape_error!(
                    "node {} is reachable along more than one path",
                    index
                ));
            }
            seen[index] = true;
            self.max_depth = self.max_depth.max(depth);

            let node = &mut self.nodes[index];
            node.set_parent(parent);
            node.set_depth(depth);
            if let (Some(l), Some(r)) = (node.left_child(), node.right_child()) {
                stack.push((r, Some(index), depth + 1));
                stack.push((l, Some(index), depth + 1));
            }
        }

        if let Some(orphan) = seen.iter().position(|s| !s) {
            return Err(shape_error!(
                "node {} is not reachable from the root",
                orphan
            ));
        }
        Ok(())
    }

    /// Validates the tree structure consistency.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(AnomalyzeError::shape("tree has no nodes"));
        }
        if self.root().parent().is_some() {
            return Err(AnomalyzeError::shape("root node has a parent"));
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                continue;
            }
            let (left, right) = match (node.left_child(), node.right_child()) {
                (Some(l), Some(r)) => (l, r),
                _ => {
                    return Err(shape_error!(
                        "internal node {} is missing a child",
                        i
                    ))
                }
            };
            if left >= self.nodes.len() || right >= self.nodes.len() {
                return Err(shape_error!(
                    "node {} has invalid child indices",
                    i
                ));
            }
            if self.nodes[left].parent() != Some(i) || self.nodes[right].parent() != Some(i) {
                return Err(shape_error!(
                    "children of node {} do not point back to it",
                    i
                ));
            }
            if node.split_feature().is_none() || node.split_threshold().is_none() {
                return Err(shape_error!("internal node {} has no split", i));
            }
        }

        Ok(())
    }
}

impl IsolationTreeView for IsolationTree {
    fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn left_child(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.nodes[node].left_child()
    }

    fn right_child(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.nodes[node].right_child()
    }

    fn split_feature(&self, node: NodeIndex) -> Option<FeatureIndex> {
        self.nodes[node].split_feature()
    }

    fn split_threshold(&self, node: NodeIndex) -> Option<f64> {
        self.nodes[node].split_threshold()
    }

    fn sample_count(&self, node: NodeIndex) -> usize {
        self.nodes[node].sample_count()
    }
}

impl fmt::Display for IsolationTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IsolationTree(nodes={}, leaves={}, depth={}, samples={})",
            self.nodes.len(),
            self.num_leaves(),
            self.max_depth,
            self.nodes.first().map_or(0, TreeNode::sample_count)
        )
    }
}
