//! Expected path length of an unsuccessful binary-search-tree lookup.
//!
//! `c(n)` is the average depth at which a point is isolated in a random
//! binary tree grown over `n` points. It normalizes path lengths into anomaly
//! scores and measures how much isolation a single split buys.

use crate::core::constants::EULER_GAMMA;
use ndarray::Array1;

/// `c(n)` for a node holding `n` training samples.
///
/// ```
/// use anomalyze::tree::expected_path_length;
///
/// assert_eq!(expected_path_length(1), 0.0);
/// assert_eq!(expected_path_length(2), 1.0);
/// assert!((expected_path_length(10) - 3.7488).abs() < 1e-3);
/// ```
pub fn expected_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Vectorized `c(n)` over a slice of node sizes.
pub fn expected_path_lengths(sizes: &[usize]) -> Array1<f64> {
    sizes.iter().map(|&n| expected_path_length(n)).collect()
}

/// Reduction in expected remaining path length when a sample moves from a
/// node of `parent` samples into a child of `child` samples.
#[inline]
pub fn split_gain(parent: usize, child: usize) -> f64 {
    expected_path_length(parent) - 1.0 - expected_path_length(child)
}
