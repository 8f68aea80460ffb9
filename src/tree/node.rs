//! Isolation tree node.
//!
//! A node is either a leaf or an internal node carrying a split on one
//! feature. Every node records how many training samples reached it, which is
//! all the path-length arithmetic needs.

use crate::core::types::{FeatureIndex, NodeIndex};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tree node representation supporting both internal and leaf nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Left child node index (for internal nodes only)
    left_child: Option<NodeIndex>,
    /// Right child node index (for internal nodes only)
    right_child: Option<NodeIndex>,
    /// Parent node index (None for root node)
    parent: Option<NodeIndex>,
    /// Split feature index, local to the tree's feature subset (internal nodes only)
    split_feature: Option<FeatureIndex>,
    /// Split threshold value (internal nodes only)
    split_threshold: Option<f64>,
    /// Number of training samples routed through this node
    sample_count: usize,
    /// Node depth in the tree
    depth: usize,
}

impl TreeNode {
    /// Creates a new leaf node.
    pub fn new_leaf(sample_count: usize, depth: usize, parent: Option<NodeIndex>) -> Self {
        TreeNode {
            left_child: None,
            right_child: None,
            parent,
            split_feature: None,
            split_threshold: None,
            sample_count,
            depth,
        }
    }

    /// Creates a new internal node with split information.
    pub fn new_internal(
        left_child: NodeIndex,
        right_child: NodeIndex,
        parent: Option<NodeIndex>,
        split_feature: FeatureIndex,
        split_threshold: f64,
        sample_count: usize,
        depth: usize,
    ) -> Self {
        TreeNode {
            left_child: Some(left_child),
            right_child: Some(right_child),
            parent,
            split_feature: Some(split_feature),
            split_threshold: Some(split_threshold),
            sample_count,
            depth,
        }
    }

    /// Returns true if this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.left_child.is_none() && self.right_child.is_none()
    }

    /// Returns the left child node index (for internal nodes).
    pub fn left_child(&self) -> Option<NodeIndex> {
        self.left_child
    }

    /// Returns the right child node index (for internal nodes).
    pub fn right_child(&self) -> Option<NodeIndex> {
        self.right_child
    }

    /// Returns the parent node index.
    pub fn parent(&self) -> Option<NodeIndex> {
        self.parent
    }

    /// Returns the split feature index (for internal nodes).
    pub fn split_feature(&self) -> Option<FeatureIndex> {
        self.split_feature
    }

    /// Returns the split threshold value (for internal nodes).
    pub fn split_threshold(&self) -> Option<f64> {
        self.split_threshold
    }

    /// Returns the number of training samples that reached this node.
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Returns the node depth in the tree.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeIndex>) {
        self.parent = parent;
    }

    pub(crate) fn set_depth(&mut self, depth: usize) {
        self.depth = depth;
    }

    /// Converts this node from leaf to internal node with the given split.
    pub fn set_split(
        &mut self,
        left_child: NodeIndex,
        right_child: NodeIndex,
        split_feature: FeatureIndex,
        split_threshold: f64,
    ) {
        self.left_child = Some(left_child);
        self.right_child = Some(right_child);
        self.split_feature = Some(split_feature);
        self.split_threshold = Some(split_threshold);
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.split_feature, self.split_threshold) {
            (Some(feature), Some(threshold)) if !self.is_leaf() => write!(
                f,
                "Internal(feature={}, threshold={:.4}, samples={}, depth={})",
                feature, threshold, self.sample_count, self.depth
            ),
            _ => write!(f, "Leaf(samples={}, depth={})", self.sample_count, self.depth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_leaf_node() {
        let node = TreeNode::new_leaf(12, 2, Some(0));

        assert!(node.is_leaf());
        assert_eq!(node.sample_count(), 12);
        assert_eq!(node.depth(), 2);
        assert_eq!(node.parent(), Some(0));
        assert!(node.left_child().is_none());
        assert!(node.split_feature().is_none());
    }

    #[test]
    fn test_new_internal_node() {
        let node = TreeNode::new_internal(1, 2, None, 5, 2.5, 256, 0);

        assert!(!node.is_leaf());
        assert_eq!(node.left_child(), Some(1));
        assert_eq!(node.right_child(), Some(2));
        assert_eq!(node.split_feature(), Some(5));
        assert_eq!(node.split_threshold(), Some(2.5));
        assert_eq!(node.sample_count(), 256);
    }

    #[test]
    fn test_set_split() {
        let mut node = TreeNode::new_leaf(10, 1, Some(0));
        node.set_split(3, 4, 1, -0.75);

        assert!(!node.is_leaf());
        assert_eq!(node.left_child(), Some(3));
        assert_eq!(node.right_child(), Some(4));
        assert_eq!(node.split_threshold(), Some(-0.75));
        assert_eq!(node.sample_count(), 10);
    }

    #[test]
    fn test_display() {
        assert_eq!(TreeNode::new_leaf(3, 1, Some(0)).to_string(), "Leaf(samples=3, depth=1)");
        assert!(TreeNode::new_internal(1, 2, None, 0, 0.5, 8, 0)
            .to_string()
            .starts_with("Internal(feature=0"));
    }
}
