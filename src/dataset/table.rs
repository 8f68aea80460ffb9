//! Columnar tabular dataset.
//!
//! A [`Table`] is the in-memory form of one per-plate dataset: named, typed
//! columns of equal length. Columns whose name starts with the metadata prefix
//! (`Metadata` by default) are identifiers; every other column is a numeric
//! morphology feature. Tables are never mutated by the library; row selection
//! and concatenation always produce a new table.

use crate::core::error::{AnomalyzeError, Result};
use crate::shape_error;
use crate::core::types::RowIndex;
use crate::dataset::matrix::FeatureMatrix;
use ndarray::Array2;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Typed storage of one column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// 64-bit signed integers
    Int(Vec<i64>),
    /// 64-bit floats
    Float(Vec<f64>),
    /// UTF-8 strings
    Text(Vec<String>),
}

impl ColumnData {
    /// Number of values stored
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    /// Whether the column holds no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn type_name(&self) -> &'static str {
        match self {
            ColumnData::Int(_) => "int",
            ColumnData::Float(_) => "float",
            ColumnData::Text(_) => "text",
        }
    }

    fn take(&self, rows: &[RowIndex]) -> ColumnData {
        match self {
            ColumnData::Int(v) => ColumnData::Int(rows.iter().map(|&r| v[r]).collect()),
            ColumnData::Float(v) => ColumnData::Float(rows.iter().map(|&r| v[r]).collect()),
            ColumnData::Text(v) => ColumnData::Text(rows.iter().map(|&r| v[r].clone()).collect()),
        }
    }

    fn extend_from(&mut self, other: &ColumnData) -> bool {
        match (self, other) {
            (ColumnData::Int(a), ColumnData::Int(b)) => a.extend_from_slice(b),
            (ColumnData::Float(a), ColumnData::Float(b)) => a.extend_from_slice(b),
            (ColumnData::Text(a), ColumnData::Text(b)) => a.extend(b.iter().cloned()),
            _ => return false,
        }
        true
    }
}

/// A borrowed cell value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    /// Integer cell
    Int(i64),
    /// Float cell
    Float(f64),
    /// Text cell
    Text(&'a str),
}

impl Value<'_> {
    /// Numeric view of the value (text is not numeric)
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Int(v) => Some(v as f64),
            Value::Float(v) => Some(v),
            Value::Text(_) => None,
        }
    }
}

/// Key rendering for floats: shortest round-trip digits, fixed notation with
/// a trailing `.0` for integral values, scientific notation (`1e-05`,
/// `1.5e+16`) when the decimal exponent is below -4 or at least 16, and
/// `nan` / `inf` for non-finite values. Keys hash the same as in existing
/// sample sets.
impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
            Value::Float(v) => write_float_key(f, v),
        }
    }
}

fn write_float_key(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    if v.is_nan() {
        return f.write_str("nan");
    }
    if v.is_infinite() {
        return f.write_str(if v > 0.0 { "inf" } else { "-inf" });
    }

    // `{:e}` yields the shortest digits, e.g. "1.5e16" or "1e-5"
    let scientific = format!("{:e}", v);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if (-4..16).contains(&exponent) {
        if v.fract() == 0.0 {
            write!(f, "{:.1}", v)
        } else {
            write!(f, "{}", v)
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        write!(f, "{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    /// Create a column from typed data
    pub fn new<S: Into<String>>(name: S, data: ColumnData) -> Self {
        Column {
            name: name.into(),
            data,
        }
    }

    /// Integer column
    pub fn int<S: Into<String>>(name: S, values: Vec<i64>) -> Self {
        Self::new(name, ColumnData::Int(values))
    }

    /// Float column
    pub fn float<S: Into<String>>(name: S, values: Vec<f64>) -> Self {
        Self::new(name, ColumnData::Float(values))
    }

    /// Text column
    pub fn text<S: Into<String>, T: Into<String>>(name: S, values: Vec<T>) -> Self {
        Self::new(
            name,
            ColumnData::Text(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Column name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Typed storage
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the column is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the column can be used as a feature
    pub fn is_numeric(&self) -> bool {
        !matches!(self.data, ColumnData::Text(_))
    }

    /// Cell at `row`
    pub fn value(&self, row: RowIndex) -> Result<Value<'_>> {
        if row >= self.len() {
            return Err(AnomalyzeError::index_out_of_bounds(row, self.len()));
        }
        Ok(match &self.data {
            ColumnData::Int(v) => Value::Int(v[row]),
            ColumnData::Float(v) => Value::Float(v[row]),
            ColumnData::Text(v) => Value::Text(&v[row]),
        })
    }
}

/// Columnar table with a fixed schema.
#[derive(Debug, Clone)]
pub struct Table {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    num_rows: usize,
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Table {
    /// Create a table; all columns must have the same length and distinct names.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let num_rows = columns.first().map(Column::len).unwrap_or(0);
        let mut index = HashMap::with_capacity(columns.len());

        for (position, column) in columns.iter().enumerate() {
            if column.len() != num_rows {
                return Err(shape_error!(
                    "column '{}' has {} rows, expected {}",
                    column.name(),
                    column.len(),
                    num_rows
                ));
            }
            if index.insert(column.name().to_string(), position).is_some() {
                return Err(AnomalyzeError::invalid_parameter(
                    "columns",
                    column.name(),
                    "column names must be unique",
                ));
            }
        }

        Ok(Table {
            columns,
            index,
            num_rows,
        })
    }

    /// Start building a table column by column
    pub fn builder() -> TableBuilder {
        TableBuilder::default()
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of columns
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Column names in schema order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    /// Whether a column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    /// Fails with a schema error naming every column that is not present.
    pub fn require_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        let missing: Vec<String> = names
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| !self.has_column(name))
            .map(str::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AnomalyzeError::Schema { missing })
        }
    }

    fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&Column>> {
        self.require_columns(names)?;
        Ok(names
            .iter()
            .map(|name| &self.columns[self.index[name.as_ref()]])
            .collect())
    }

    /// Cell by row and column name
    pub fn value(&self, row: RowIndex, name: &str) -> Result<Value<'_>> {
        self.column(name)
            .ok_or_else(|| AnomalyzeError::schema([name]))?
            .value(row)
    }

    /// Concatenated string rendering of `columns` for one row.
    pub fn key_string<S: AsRef<str>>(&self, row: RowIndex, columns: &[S], separator: &str) -> Result<String> {
        let columns = self.resolve(columns)?;
        render_key(&columns, row, separator)
    }

    /// Concatenated string rendering of `columns` for every row.
    pub fn key_strings<S: AsRef<str>>(&self, columns: &[S], separator: &str) -> Result<Vec<String>> {
        let columns = self.resolve(columns)?;
        (0..self.num_rows)
            .map(|row| render_key(&columns, row, separator))
            .collect()
    }

    /// Row indices grouped by the rendered values of `columns`, ordered by key.
    pub fn group_rows<S: AsRef<str>>(&self, columns: &[S]) -> Result<BTreeMap<Vec<String>, Vec<RowIndex>>> {
        let columns = self.resolve(columns)?;
        let mut groups: BTreeMap<Vec<String>, Vec<RowIndex>> = BTreeMap::new();

        for row in 0..self.num_rows {
            let key = columns
                .iter()
                .map(|column| column.value(row).map(|v| v.to_string()))
                .collect::<Result<Vec<_>>>()?;
            groups.entry(key).or_default().push(row);
        }

        Ok(groups)
    }

    /// New table holding the given rows, in the given order.
    pub fn take(&self, rows: &[RowIndex]) -> Result<Table> {
        if let Some(&bad) = rows.iter().find(|&&r| r >= self.num_rows) {
            return Err(AnomalyzeError::index_out_of_bounds(bad, self.num_rows));
        }

        let columns = self
            .columns
            .iter()
            .map(|column| Column::new(column.name.clone(), column.data.take(rows)))
            .collect();

        Table::new(columns)
    }

    /// Stack tables with identical schemas (names, order and types).
    pub fn concat(tables: &[Table]) -> Result<Table> {
        let Some(first) = tables.first() else {
            return Table::new(Vec::new());
        };

        let mut columns = first.columns.clone();
        for table in &tables[1..] {
            if table.column_names() != first.column_names() {
                return Err(AnomalyzeError::input_mismatch(
                    format!("columns {:?}", first.column_names()),
                    format!("columns {:?}", table.column_names()),
                ));
            }
            for (target, source) in columns.iter_mut().zip(&table.columns) {
                if !target.data.extend_from(&source.data) {
                    return Err(AnomalyzeError::input_mismatch(
                        format!("{} column '{}'", target.data.type_name(), target.name),
                        format!("{} column", source.data.type_name()),
                    ));
                }
            }
        }

        Table::new(columns)
    }

    /// Names of metadata columns (prefixed with `prefix`)
    pub fn metadata_columns(&self, prefix: &str) -> Vec<&str> {
        self.columns
            .iter()
            .map(Column::name)
            .filter(|name| name.starts_with(prefix))
            .collect()
    }

    /// Names of feature columns (everything not prefixed with `prefix`)
    pub fn feature_columns(&self, prefix: &str) -> Vec<&str> {
        self.columns
            .iter()
            .map(Column::name)
            .filter(|name| !name.starts_with(prefix))
            .collect()
    }

    /// Dense feature matrix over `names`, in that order.
    pub fn feature_matrix<S: AsRef<str>>(&self, names: &[S]) -> Result<FeatureMatrix> {
        let columns = self.resolve(names)?;
        let mut values = Array2::zeros((self.num_rows, columns.len()));
        for (j, column) in columns.iter().enumerate() {
            let mut target = values.column_mut(j);
            match &column.data {
                ColumnData::Int(v) => {
                    for (cell, &x) in target.iter_mut().zip(v) {
                        *cell = x as f64;
                    }
                }
                ColumnData::Float(v) => {
                    for (cell, &x) in target.iter_mut().zip(v) {
                        *cell = x;
                    }
                }
                ColumnData::Text(_) => {
                    return Err(AnomalyzeError::invalid_parameter(
                        "feature column",
                        column.name(),
                        "feature columns must be numeric",
                    ))
                }
            }
        }

        FeatureMatrix::new(
            columns.iter().map(|c| c.name().to_string()).collect(),
            values,
        )
    }
}

fn render_key(columns: &[&Column], row: RowIndex, separator: &str) -> Result<String> {
    let mut key = String::new();
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            key.push_str(separator);
        }
        key.push_str(&column.value(row)?.to_string());
    }
    Ok(key)
}

/// Fluent table construction.
#[derive(Debug, Default)]
pub struct TableBuilder {
    columns: Vec<Column>,
}

impl TableBuilder {
    /// Add an integer column
    pub fn int<S: Into<String>>(mut self, name: S, values: Vec<i64>) -> Self {
        self.columns.push(Column::int(name, values));
        self
    }

    /// Add a float column
    pub fn float<S: Into<String>>(mut self, name: S, values: Vec<f64>) -> Self {
        self.columns.push(Column::float(name, values));
        self
    }

    /// Add a text column
    pub fn text<S: Into<String>, T: Into<String>>(mut self, name: S, values: Vec<T>) -> Self {
        self.columns.push(Column::text(name, values));
        self
    }

    /// Validate and build the table
    pub fn build(self) -> Result<Table> {
        Table::new(self.columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plate() -> Table {
        Table::builder()
            .text("Metadata_Plate", vec!["P1", "P1", "P2"])
            .text("Metadata_Well", vec!["A01", "A02", "A01"])
            .int("Metadata_Site", vec![1, 1, 2])
            .float("Metadata_ObjectNumber", vec![3.0, 4.0, 5.0])
            .float("Nuclei_AreaShape_Area", vec![10.5, 11.0, 9.25])
            .int("Cells_Count", vec![7, 8, 9])
            .build()
            .unwrap()
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let result = Table::builder()
            .int("a", vec![1, 2])
            .int("b", vec![1])
            .build();
        assert!(matches!(result, Err(AnomalyzeError::Shape { .. })));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = Table::builder().int("a", vec![1]).int("a", vec![2]).build();
        assert!(matches!(result, Err(AnomalyzeError::InvalidParameter { .. })));
    }

    #[test]
    fn test_require_columns_lists_all_missing() {
        let table = plate();
        match table.require_columns(&["Metadata_Plate", "Metadata_Foo", "Bar"]) {
            Err(AnomalyzeError::Schema { missing }) => {
                assert_eq!(missing, vec!["Metadata_Foo".to_string(), "Bar".to_string()])
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_key_strings_rendering() {
        let table = plate();
        let keys = table
            .key_strings(
                &["Metadata_Plate", "Metadata_Well", "Metadata_Site", "Metadata_ObjectNumber"],
                "",
            )
            .unwrap();
        assert_eq!(keys, vec!["P1A0113.0", "P1A0214.0", "P2A0125.0"]);

        let keys = table.key_strings(&["Metadata_Plate", "Metadata_Site"], "|").unwrap();
        assert_eq!(keys[2], "P2|2");
        assert_eq!(
            table.key_string(1, &["Metadata_Well", "Cells_Count"], "").unwrap(),
            "A028"
        );
    }

    #[test]
    fn test_float_rendering() {
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Float(-3.0).to_string(), "-3.0");
        assert_eq!(Value::Float(f64::NAN).to_string(), "nan");
        assert_eq!(Value::Float(f64::NEG_INFINITY).to_string(), "-inf");
        assert_eq!(Value::Float(-0.0).to_string(), "-0.0");
    }

    #[test]
    fn test_float_rendering_exponent_range() {
        let cases = [
            (1e-5, "1e-05"),
            (1.5e-7, "1.5e-07"),
            (-2.5e-10, "-2.5e-10"),
            (0.0001, "0.0001"),
            (123.5, "123.5"),
            (2.0, "2.0"),
            (1e15, "1000000000000000.0"),
            (1e16, "1e+16"),
            (1.5e16, "1.5e+16"),
            (1e22, "1e+22"),
            (1.7976931348623157e308, "1.7976931348623157e+308"),
            (5e-324, "5e-324"),
        ];
        for (value, expected) in cases {
            assert_eq!(Value::Float(value).to_string(), expected, "{:e}", value);
        }
    }

    #[test]
    fn test_group_rows() {
        let table = plate();
        let groups = table.group_rows(&["Metadata_Plate", "Metadata_Well"]).unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[&vec!["P1".to_string(), "A01".to_string()]], vec![0]);
    }

    #[test]
    fn test_take_and_concat() {
        let table = plate();
        let subset = table.take(&[2, 0]).unwrap();
        assert_eq!(subset.num_rows(), 2);
        assert_eq!(subset.value(0, "Metadata_Plate").unwrap(), Value::Text("P2"));
        assert_eq!(table.num_rows(), 3);

        let stacked = Table::concat(&[table.clone(), subset]).unwrap();
        assert_eq!(stacked.num_rows(), 5);
        assert_eq!(stacked.value(4, "Cells_Count").unwrap(), Value::Int(7));

        assert!(table.take(&[3]).is_err());
    }

    #[test]
    fn test_concat_rejects_schema_mismatch() {
        let other = Table::builder().int("x", vec![1]).build().unwrap();
        assert!(matches!(
            Table::concat(&[plate(), other]),
            Err(AnomalyzeError::InputMismatch { .. })
        ));
    }

    #[test]
    fn test_metadata_feature_split() {
        let table = plate();
        assert_eq!(table.metadata_columns("Metadata").len(), 4);
        assert_eq!(
            table.feature_columns("Metadata"),
            vec!["Nuclei_AreaShape_Area", "Cells_Count"]
        );
    }

    #[test]
    fn test_feature_matrix() {
        let table = plate();
        let features = table.feature_columns("Metadata");
        let matrix = table.feature_matrix(&features).unwrap();
        assert_eq!(matrix.num_samples(), 3);
        assert_eq!(matrix.num_features(), 2);
        assert_eq!(matrix.values()[[2, 0]], 9.25);
        assert_eq!(matrix.values()[[1, 1]], 8.0);

        assert!(matches!(
            table.feature_matrix(&["Metadata_Plate"]),
            Err(AnomalyzeError::InvalidParameter { .. })
        ));
        assert!(matches!(
            table.feature_matrix(&["Missing"]),
            Err(AnomalyzeError::Schema { .. })
        ));
    }
}
