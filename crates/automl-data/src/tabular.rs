//! In-memory tabular data keyed by sample key.
//!
//! [`TabularData`] is a mapping from a string sample key to an ordered row
//! of values, with a [`Header`] assigning each column position a name.
//! Values are stored as `f64` for numeric columns; categorical columns
//! (notably the label column) are stored as strings alongside a parallel
//! numeric encoding is left to the caller (see [`crate::package::DataPackage`]).

use crate::error::{EngineError, EngineResult};
use std::collections::BTreeMap;

/// Declared type of a column. Only used for documentation/round-tripping;
/// no component in this crate branches on it beyond CSV formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// An ordered, named list of columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    names: Vec<String>,
}

impl Header {
    pub fn new(names: Vec<String>) -> EngineResult<Self> {
        let mut seen = std::collections::HashSet::new();
        for name in &names {
            if !seen.insert(name.clone()) {
                return Err(EngineError::DataInvalid(format!(
                    "duplicate column name: {name}"
                )));
            }
        }
        Ok(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// A row of string-valued cells for one sample key.
pub type Row = Vec<String>;

/// A mapping from sample key to an ordered row of values, with a shared
/// [`Header`]. Rows are stored in a `BTreeMap` so iteration order is
/// deterministic (sample-key lexical order), which keeps CSV round-trips
/// and test fixtures stable.
#[derive(Debug, Clone)]
pub struct TabularData {
    header: Header,
    rows: BTreeMap<String, Row>,
}

impl TabularData {
    /// Build a table from a header and a list of `(sample_key, row)` pairs.
    /// Rows with the wrong width are rejected; sample keys must be unique.
    pub fn new(header: Header, rows: Vec<(String, Row)>) -> EngineResult<Self> {
        let mut map = BTreeMap::new();
        for (key, row) in rows {
            if row.len() != header.len() {
                return Err(EngineError::DataInvalid(format!(
                    "row for sample key '{key}' has {} values, header declares {}",
                    row.len(),
                    header.len()
                )));
            }
            if map.insert(key.clone(), row).is_some() {
                return Err(EngineError::DataInvalid(format!(
                    "duplicate sample key: {key}"
                )));
            }
        }
        Ok(Self { header, rows: map })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn sample_keys(&self) -> impl Iterator<Item = &String> {
        self.rows.keys()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, key: &str) -> Option<&Row> {
        self.rows.get(key)
    }

    /// The value of `column` for `key`, or `None` if either is unknown.
    pub fn cell(&self, key: &str, column: &str) -> Option<&str> {
        let idx = self.header.index_of(column)?;
        self.rows.get(key).map(|row| row[idx].as_str())
    }

    /// Read `column` as `f64` for `key`. Returns `None` on a missing key,
    /// unknown column, or an unparsable value.
    pub fn numeric_cell(&self, key: &str, column: &str) -> Option<f64> {
        self.cell(key, column)?.parse().ok()
    }

    /// Build a new table keeping only the named columns, in the order given.
    pub fn feature_subset(&self, names: &[String]) -> EngineResult<TabularData> {
        let indices: Vec<usize> = names
            .iter()
            .map(|n| {
                self.header
                    .index_of(n)
                    .ok_or_else(|| EngineError::DataInvalid(format!("unknown column: {n}")))
            })
            .collect::<EngineResult<_>>()?;
        let header = Header::new(names.to_vec())?;
        let rows = self
            .rows
            .iter()
            .map(|(k, row)| {
                let subset: Row = indices.iter().map(|&i| row[i].clone()).collect();
                (k.clone(), subset)
            })
            .collect();
        TabularData::new(header, rows)
    }

    /// Build a new table keeping only the named sample keys.
    pub fn sample_subset(&self, keys: &[String]) -> EngineResult<TabularData> {
        let rows = keys
            .iter()
            .filter_map(|k| self.rows.get(k).map(|row| (k.clone(), row.clone())))
            .collect();
        TabularData::new(self.header.clone(), rows)
    }

    /// Insert or overwrite a row for `key`. Used by synthetic-sample
    /// generation (oversampling) to append rows without reconstructing
    /// the whole table.
    pub fn with_row(&self, key: String, row: Row) -> EngineResult<TabularData> {
        if row.len() != self.header.len() {
            return Err(EngineError::DataInvalid(format!(
                "row for sample key '{key}' has {} values, header declares {}",
                row.len(),
                self.header.len()
            )));
        }
        let mut rows = self.rows.clone();
        rows.insert(key, row);
        Ok(Self {
            header: self.header.clone(),
            rows,
        })
    }

    /// Build a table excluding the named sample keys.
    pub fn without_keys(&self, drop: &std::collections::HashSet<String>) -> TabularData {
        let rows: BTreeMap<String, Row> = self
            .rows
            .iter()
            .filter(|(k, _)| !drop.contains(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self {
            header: self.header.clone(),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> TabularData {
        let header = Header::new(vec!["f1".into(), "f2".into()]).unwrap();
        TabularData::new(
            header,
            vec![
                ("a/Scan-1".into(), vec!["1.0".into(), "2.0".into()]),
                ("b/Scan-1".into(), vec!["3.0".into(), "4.0".into()]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn rejects_duplicate_header_names() {
        assert!(Header::new(vec!["x".into(), "x".into()]).is_err());
    }

    #[test]
    fn rejects_row_width_mismatch() {
        let header = Header::new(vec!["f1".into(), "f2".into()]).unwrap();
        let result = TabularData::new(header, vec![("a".into(), vec!["1.0".into()])]);
        assert!(result.is_err());
    }

    #[test]
    fn feature_subset_keeps_only_named_columns() {
        let table = fixture();
        let subset = table.feature_subset(&["f2".to_string()]).unwrap();
        assert_eq!(subset.header().names(), &["f2".to_string()]);
        assert_eq!(subset.cell("a/Scan-1", "f2"), Some("2.0"));
    }

    #[test]
    fn sample_subset_keeps_only_named_keys() {
        let table = fixture();
        let subset = table.sample_subset(&["a/Scan-1".to_string()]).unwrap();
        assert_eq!(subset.len(), 1);
        assert!(subset.row("b/Scan-1").is_none());
    }

    #[test]
    fn numeric_cell_parses_value() {
        let table = fixture();
        assert_eq!(table.numeric_cell("a/Scan-1", "f1"), Some(1.0));
        assert_eq!(table.numeric_cell("missing", "f1"), None);
    }
}
