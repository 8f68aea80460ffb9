//! Fitted isolation trees and forests.
//!
//! Trees are not grown here; they come from an external fitting routine and
//! are either assembled node by node with [`IsolationTree::split_node`] or
//! imported from the scikit-learn array layout. Anything implementing
//! [`IsolationTreeView`] can be used by the attributor and the scorer.

pub mod forest;
pub mod node;
pub mod path_length;
pub mod tree;

pub use forest::{ForestArrays, ForestBuilder, IsolationForest};
pub use node::TreeNode;
pub use path_length::{expected_path_length, expected_path_lengths, split_gain};
pub use tree::{IsolationTree, IsolationTreeView, TreeArrays};
