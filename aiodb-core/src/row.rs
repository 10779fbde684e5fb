//! Row: an immutable snapshot of one result row, accessible by position or name.
//!
//! Mirrors `tank_core::RowLabeled` (one value slice plus a shared column-name
//! slice) but keeps the original `aio-databases` `Record` semantics: name lookup
//! is a linear first match, and a `Row` compares equal to any same-length value
//! sequence, not just another `Row`.

use crate::Value;
use std::sync::Arc;

/// Column selector accepted by [`Row::get`]: a position or a name.
#[derive(Debug, Clone)]
pub enum ColumnIndex {
    Position(usize),
    Name(String),
}

impl From<usize> for ColumnIndex {
    fn from(v: usize) -> Self {
        ColumnIndex::Position(v)
    }
}
impl From<&str> for ColumnIndex {
    fn from(v: &str) -> Self {
        ColumnIndex::Name(v.to_owned())
    }
}
impl From<String> for ColumnIndex {
    fn from(v: String) -> Self {
        ColumnIndex::Name(v)
    }
}

/// One fetched row: values in column order plus the column names they belong to.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Build a row from a shared column-name list and its value tuple.
    ///
    /// Panics if the lengths don't match — adapters are expected to always
    /// produce matching description/value pairs from the driver.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        assert_eq!(
            columns.len(),
            values.len(),
            "column/value count mismatch building a Row"
        );
        Self { columns, values }
    }

    /// Build a row from an ordered sequence of `(name, value)` pairs, preserving
    /// insertion order (the `from_dict` constructor).
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (columns, values): (Vec<String>, Vec<Value>) =
            pairs.into_iter().map(|(k, v)| (k.into(), v.into())).unzip();
        Self {
            columns: columns.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }

    pub fn items(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Look up a value by position or by first-matching column name.
    pub fn get(&self, index: impl Into<ColumnIndex>) -> Option<&Value> {
        match index.into() {
            ColumnIndex::Position(i) => self.values.get(i),
            ColumnIndex::Name(name) => self
                .columns
                .iter()
                .position(|c| *c == name)
                .map(|i| &self.values[i]),
        }
    }
}

impl std::ops::Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl PartialEq<[Value]> for Row {
    fn eq(&self, other: &[Value]) -> bool {
        self.values == other
    }
}

impl PartialEq<Vec<Value>> for Row {
    fn eq(&self, other: &Vec<Value>) -> bool {
        self.values == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_dict_round_trips_in_insertion_order() {
        let row = Row::from_pairs([("b", Value::from(2)), ("a", Value::from(1))]);
        assert_eq!(
            row.items().collect::<Vec<_>>(),
            vec![("b", &Value::Int64(2)), ("a", &Value::Int64(1))]
        );
        assert_eq!(row[0], Value::Int64(2));
        assert_eq!(row[1], Value::Int64(1));
    }

    #[test]
    fn name_lookup_resolves_first_match() {
        let row = Row::new(
            Arc::from(vec!["id".to_string(), "id".to_string()]),
            vec![Value::Int64(1), Value::Int64(2)],
        );
        assert_eq!(row.get("id"), Some(&Value::Int64(1)));
        assert_eq!(row.get(1), Some(&Value::Int64(2)));
    }

    #[test]
    fn equals_a_bare_value_slice() {
        let row = Row::from_pairs([("a", Value::from(1)), ("b", Value::from(2))]);
        assert_eq!(row, vec![Value::Int64(1), Value::Int64(2)]);
    }
}
