//! Dense, named feature matrix.

use crate::core::error::{AnomalyzeError, Result};
use crate::shape_error;
use crate::core::types::{FeatureIndex, RowIndex};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Rows are samples (aligned to the source table), columns are named features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    feature_names: Vec<String>,
    values: Array2<f64>,
}

impl FeatureMatrix {
    /// Create a matrix; `feature_names` must be unique and match the column count.
    pub fn new(feature_names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if feature_names.len() != values.ncols() {
            return Err(shape_error!(
                "{} feature names for a matrix with {} columns",
                feature_names.len(),
                values.ncols()
            ));
        }

        let mut seen = HashSet::with_capacity(feature_names.len());
        if let Some(duplicate) = feature_names.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(AnomalyzeError::invalid_parameter(
                "feature_names",
                duplicate.clone(),
                "feature names must be unique",
            ));
        }

        Ok(FeatureMatrix {
            feature_names,
            values,
        })
    }

    /// Create a matrix from row vectors; every row must have one value per feature.
    pub fn from_rows<S: Into<String>>(feature_names: Vec<S>, rows: Vec<Vec<f64>>) -> Result<Self> {
        let feature_names: Vec<String> = feature_names.into_iter().map(Into::into).collect();
        let width = feature_names.len();

        if let Some((i, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != width) {
            return Err(shape_error!(
                "row {} has {} values, expected {}",
                i,
                row.len(),
                width
            ));
        }

        let num_rows = rows.len();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let values = Array2::from_shape_vec((num_rows, width), flat)
            .map_err(|e| AnomalyzeError::shape(e.to_string()))?;

        Self::new(feature_names, values)
    }

    /// Number of samples (rows)
    pub fn num_samples(&self) -> usize {
        self.values.nrows()
    }

    /// Number of features (columns)
    pub fn num_features(&self) -> usize {
        self.values.ncols()
    }

    /// Whether the matrix has no rows
    pub fn is_empty(&self) -> bool {
        self.num_samples() == 0
    }

    /// Feature names in column order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Column position of a feature
    pub fn position(&self, name: &str) -> Option<FeatureIndex> {
        self.feature_names.iter().position(|n| n == name)
    }

    /// Raw values
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// One sample
    pub fn row(&self, row: RowIndex) -> ArrayView1<'_, f64> {
        self.values.row(row)
    }

    /// New matrix with columns reordered (or subset) to `names`.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<FeatureMatrix> {
        let mut positions = Vec::with_capacity(names.len());
        let mut missing = Vec::new();

        for name in names {
            match self.position(name.as_ref()) {
                Some(p) => positions.push(p),
                None => missing.push(name.as_ref().to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(AnomalyzeError::Schema { missing });
        }

        Self::new(
            names.iter().map(|n| n.as_ref().to_string()).collect(),
            self.values.select(Axis(1), &positions),
        )
    }
}
