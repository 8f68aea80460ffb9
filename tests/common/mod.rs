//! Common test utilities for anomalyze integration tests.

#![allow(dead_code)]

use anomalyze::*;
use ndarray::{Array2, Axis};
use rand::prelude::*;
use rand::seq::index;
use std::collections::BTreeSet;

/// Feature columns of the synthetic profiles
pub const FEATURES: [&str; 4] = [
    "Cells_AreaShape_Area",
    "Cells_Intensity_MeanIntensity_DNA",
    "Nuclei_Texture_Contrast_AGP",
    "Cytoplasm_Correlation_RNA_ER",
];

/// Single-cell table with `cells_per_well` cells in every (plate, well) pair.
pub fn cell_table(plates: &[&str], wells: &[&str], cells_per_well: usize, seed: u64) -> Table {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = plates.len() * wells.len() * cells_per_well;

    let mut plate_col = Vec::with_capacity(n);
    let mut well_col = Vec::with_capacity(n);
    let mut site_col = Vec::with_capacity(n);
    let mut object_col = Vec::with_capacity(n);
    let mut features: Vec<Vec<f64>> = vec![Vec::with_capacity(n); FEATURES.len()];

    for plate in plates {
        for well in wells {
            for cell in 0..cells_per_well {
                plate_col.push(plate.to_string());
                well_col.push(well.to_string());
                site_col.push((cell % 9 + 1) as i64);
                object_col.push((cell / 9 + 1) as i64);
                for column in features.iter_mut() {
                    column.push(rng.gen_range(-3.0..3.0));
                }
            }
        }
    }

    let mut builder = Table::builder()
        .text("Metadata_Plate", plate_col)
        .text("Metadata_Well", well_col)
        .int("Metadata_Site", site_col)
        .int("Metadata_ObjectNumber", object_col);
    for (name, values) in FEATURES.iter().zip(features) {
        builder = builder.float(*name, values);
    }
    builder.build().unwrap()
}

/// Same rows in a seeded random order.
pub fn shuffled(table: &Table, seed: u64) -> Table {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows: Vec<usize> = (0..table.num_rows()).collect();
    rows.shuffle(&mut rng);
    table.take(&rows).unwrap()
}

/// Hashed identity keys of the rows of `table`.
pub fn row_keys(table: &Table) -> BTreeSet<String> {
    table
        .key_strings(
            &[
                "Metadata_Plate",
                "Metadata_Well",
                "Metadata_Site",
                "Metadata_ObjectNumber",
            ],
            "|",
        )
        .unwrap()
        .into_iter()
        .collect()
}

/// Standard normal-ish data with one planted outlier at `outlier_row`.
pub fn planted_outlier(
    num_samples: usize,
    num_features: usize,
    outlier_row: usize,
    outlier_feature: usize,
    seed: u64,
) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = Array2::from_shape_fn((num_samples, num_features), |_| {
        (0..6).map(|_| rng.gen_range(-1.0..1.0)).sum::<f64>()
    });
    data[[outlier_row, outlier_feature]] = 50.0;
    data
}

fn grow(
    tree: &mut IsolationTree,
    node: usize,
    data: &Array2<f64>,
    rows: Vec<usize>,
    depth: usize,
    max_depth: usize,
    rng: &mut StdRng,
) {
    if rows.len() <= 1 || depth >= max_depth {
        return;
    }

    for _ in 0..data.ncols() * 2 {
        let feature = rng.gen_range(0..data.ncols());
        let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
            (lo.min(data[[r, feature]]), hi.max(data[[r, feature]]))
        });
        if lo >= hi {
            continue;
        }

        let threshold = rng.gen_range(lo..hi);
        let (left, right): (Vec<usize>, Vec<usize>) =
            rows.iter().partition(|&&r| data[[r, feature]] <= threshold);
        let (l, r) = tree
            .split_node(node, feature, threshold, left.len(), right.len())
            .unwrap();
        grow(tree, l, data, left, depth + 1, max_depth, rng);
        grow(tree, r, data, right, depth + 1, max_depth, rng);
        return;
    }
}

/// Fits a forest of random isolation trees on `data`.
///
/// With `features_per_tree`, every tree sees a random subset of the columns.
pub fn fit_forest(
    data: &Array2<f64>,
    feature_names: &[&str],
    num_trees: usize,
    max_samples: usize,
    features_per_tree: Option<usize>,
    seed: u64,
) -> IsolationForest {
    let mut rng = StdRng::seed_from_u64(seed);
    let max_samples = max_samples.min(data.nrows());
    let max_depth = (max_samples as f64).log2().ceil() as usize;

    let mut trees = Vec::with_capacity(num_trees);
    let mut subsets = Vec::with_capacity(num_trees);
    for _ in 0..num_trees {
        let rows = index::sample(&mut rng, data.nrows(), max_samples).into_vec();
        let mut columns: Vec<usize> = match features_per_tree {
            Some(k) => index::sample(&mut rng, data.ncols(), k).into_vec(),
            None => (0..data.ncols()).collect(),
        };
        columns.sort_unstable();

        let local = data.select(Axis(0), &rows).select(Axis(1), &columns);
        let mut tree = IsolationTree::new(max_samples);
        grow(&mut tree, 0, &local, (0..max_samples).collect(), 0, max_depth, &mut rng);
        trees.push(tree);
        subsets.push(columns);
    }

    let mut builder = IsolationForest::builder()
        .trees(trees)
        .max_samples(max_samples)
        .feature_names(feature_names.iter().copied());
    if features_per_tree.is_some() {
        builder = builder.feature_subsets(subsets);
    }
    builder.build().unwrap()
}

/// Names `f0, f1, ...`
pub fn feature_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("f{}", i)).collect()
}

/// One-split tree on `feature` with the given node sizes.
pub fn stump(feature: usize, root: usize, left: usize, right: usize) -> IsolationTree {
    let mut tree = IsolationTree::new(root);
    tree.split_node(0, feature, 0.0, left, right).unwrap();
    tree
}
