//! Per-sample, per-feature isolation contributions.

use crate::core::error::{AnomalyzeError, Result};
use crate::shape_error;
use crate::core::types::RowIndex;
use ndarray::{concatenate, Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Rows are samples (aligned to the feature matrix), columns are features.
///
/// A NaN cell means the feature never took part in isolating that sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportanceTable {
    feature_names: Vec<String>,
    values: Array2<f64>,
}

impl ImportanceTable {
    /// Create a table; one name per column.
    pub fn new(feature_names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if feature_names.len() != values.ncols() {
            return Err(shape_error!(
                "{} feature names for {} importance columns",
                feature_names.len(),
                values.ncols()
            ));
        }
        Ok(ImportanceTable {
            feature_names,
            values,
        })
    }

    /// Zero-row table over `feature_names`.
    pub fn empty(feature_names: Vec<String>) -> Self {
        let width = feature_names.len();
        ImportanceTable {
            feature_names,
            values: Array2::zeros((0, width)),
        }
    }

    pub fn num_samples(&self) -> usize {
        self.values.nrows()
    }

    pub fn num_features(&self) -> usize {
        self.values.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.num_samples() == 0
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    /// All values of one feature, in sample order.
    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.position(name).map(|p| self.values.column(p))
    }

    /// One cell.
    pub fn get(&self, row: RowIndex, name: &str) -> Option<f64> {
        let p = self.position(name)?;
        self.values.get((row, p)).copied()
    }

    /// Mean of the finite values of every feature; NaN when a feature has none.
    pub fn feature_means(&self) -> Array1<f64> {
        self.values
            .columns()
            .into_iter()
            .map(|column| {
                let (sum, count) = column
                    .iter()
                    .filter(|v| v.is_finite())
                    .fold((0.0_f64, 0usize), |(s, c), v| (s + v, c + 1));
                if count == 0 {
                    f64::NAN
                } else {
                    sum / count as f64
                }
            })
            .collect()
    }

    /// The `k` features with the largest finite contribution for one sample,
    /// largest first.
    pub fn top_features(&self, row: RowIndex, k: usize) -> Result<Vec<(String, f64)>> {
        if row >= self.num_samples() {
            return Err(AnomalyzeError::index_out_of_bounds(row, self.num_samples()));
        }

        let mut ranked: Vec<(usize, f64)> = self
            .values
            .row(row)
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(p, v)| (self.feature_names[p].clone(), v))
            .collect())
    }

    /// Stack tables with identical feature columns.
    pub fn concat(tables: &[ImportanceTable]) -> Result<ImportanceTable> {
        let first = tables
            .first()
            .ok_or_else(|| AnomalyzeError::shape("no importance tables to concatenate"))?;

        if let Some(other) = tables.iter().find(|t| t.feature_names != first.feature_names) {
            return Err(AnomalyzeError::input_mismatch(
                format!("features [{}]", first.feature_names.join(", ")),
                format!("features [{}]", other.feature_names.join(", ")),
            ));
        }

        let views: Vec<_> = tables.iter().map(|t| t.values.view()).collect();
        let values = concatenate(Axis(0), &views).map_err(|e| AnomalyzeError::shape(e.to_string()))?;
        Ok(ImportanceTable {
            feature_names: first.feature_names.clone(),
            values,
        })
    }

    /// Finite values of each requested feature, in sample order.
    ///
    /// Non-finite cells are dropped and features left with no values are
    /// omitted from the result. Unknown feature names are a schema error.
    pub fn filter<S: AsRef<str>>(&self, features: &[S]) -> Result<BTreeMap<String, Vec<f64>>> {
        let mut positions = Vec::with_capacity(features.len());
        let mut missing = Vec::new();
        for name in features.iter().map(AsRef::as_ref) {
            match self.position(name) {
                Some(p) => positions.push((name, p)),
                None => missing.push(name.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(AnomalyzeError::Schema { missing });
        }

        let mut result = BTreeMap::new();
        for (name, p) in positions {
            let values: Vec<f64> = self
                .values
                .column(p)
                .iter()
                .copied()
                .filter(|v| v.is_finite())
                .collect();
            if !values.is_empty() {
                result.insert(name.to_string(), values);
            }
        }
        Ok(result)
    }
}

/// Free-function form of [`ImportanceTable::filter`].
pub fn filter<S: AsRef<str>>(
    table: &ImportanceTable,
    features: &[S],
) -> Result<BTreeMap<String, Vec<f64>>> {
    table.filter(features)
}
