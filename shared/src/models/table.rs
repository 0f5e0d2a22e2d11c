//! In-memory tabular view over an analysis result

use std::cmp::Ordering;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::coercion::coerce_opt;
use crate::types::Cell;

/// Exact name of the net profit column produced by the profitability engine
pub const NET_PROFIT_COLUMN: &str = "Net Kar";

/// Exact name of the per-unit profit column
pub const UNIT_PROFIT_COLUMN: &str = "Birim Kar";

/// Columns the dashboard recognizes by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticColumn {
    /// Name contains both "stok" and "ismi"
    ProductName,
    /// Name contains "miktar" or "satis"
    Quantity,
    /// Named exactly "Net Kar"
    NetProfit,
    /// Named exactly "Birim Kar"
    UnitProfit,
}

impl SemanticColumn {
    pub fn matches(&self, column_name: &str) -> bool {
        match self {
            SemanticColumn::ProductName => {
                let folded = fold_name(column_name);
                folded.contains("stok") && folded.contains("ismi")
            }
            SemanticColumn::Quantity => {
                let folded = fold_name(column_name);
                folded.contains("miktar") || folded.contains("satis")
            }
            SemanticColumn::NetProfit => column_name == NET_PROFIT_COLUMN,
            SemanticColumn::UnitProfit => column_name == UNIT_PROFIT_COLUMN,
        }
    }
}

/// Lowercase a column name, folding the Turkish letters that would otherwise
/// break substring matching (`İ` lowercases to `i` + combining dot).
fn fold_name(name: &str) -> String {
    name.chars()
        .flat_map(|c| match c {
            'İ' | 'I' | 'ı' => vec!['i'],
            'Ş' | 'ş' => vec!['s'],
            other => other.to_lowercase().collect(),
        })
        .collect()
}

#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("Column '{column}' has {actual} cells, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Column {
    name: String,
    cells: Vec<Cell>,
}

/// Rows × named columns, column order preserved for display
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabularView {
    columns: Vec<Column>,
    row_count: usize,
}

impl TabularView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a view from `(name, cells)` pairs; all columns must have the same length
    pub fn from_columns<N, I>(columns: I) -> Result<Self, TableError>
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Vec<Cell>)>,
    {
        let mut view = Self::new();
        for (name, cells) in columns {
            view.push_column(name, cells)?;
        }
        Ok(view)
    }

    /// Append a column. The first column fixes the row count of an empty view.
    pub fn push_column(
        &mut self,
        name: impl Into<String>,
        cells: Vec<Cell>,
    ) -> Result<(), TableError> {
        let name = name.into();
        if self.columns.iter().any(|c| c.name == name) {
            return Err(TableError::DuplicateColumn(name));
        }
        if self.columns.is_empty() && self.row_count == 0 {
            self.row_count = cells.len();
        } else if cells.len() != self.row_count {
            return Err(TableError::ColumnLength {
                column: name,
                expected: self.row_count,
                actual: cells.len(),
            });
        }
        self.columns.push(Column { name, cells });
        Ok(())
    }

    /// Rebuild a view from row mappings.
    ///
    /// Columns are the union of keys in first-seen order; a row lacking a
    /// key gets a missing cell there.
    pub fn from_rows(rows: &[RowRecord]) -> Self {
        let mut names: Vec<&str> = Vec::new();
        for row in rows {
            for (name, _) in row.iter() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        let columns = names
            .iter()
            .map(|name| Column {
                name: (*name).to_string(),
                cells: rows
                    .iter()
                    .map(|row| row.get(name).cloned().unwrap_or_default())
                    .collect(),
            })
            .collect();

        Self {
            columns,
            row_count: rows.len(),
        }
    }

    /// Flatten the view into row mappings (inverse of [`TabularView::from_rows`])
    pub fn to_rows(&self) -> Vec<RowRecord> {
        (0..self.row_count)
            .map(|i| {
                self.columns
                    .iter()
                    .map(|c| (c.name.clone(), c.cells[i].clone()))
                    .collect()
            })
            .collect()
    }

    pub fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn column(&self, name: &str) -> Option<&[Cell]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.cells.as_slice())
    }

    /// Name of the first column recognized as `kind`
    pub fn find_semantic(&self, kind: SemanticColumn) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| kind.matches(&c.name))
            .map(|c| c.name.as_str())
    }

    pub fn semantic_column(&self, kind: SemanticColumn) -> Option<&[Cell]> {
        self.find_semantic(kind).and_then(|name| self.column(name))
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        self.column(column).and_then(|cells| cells.get(row))
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        (index < self.row_count).then_some(Row { view: self, index })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        (0..self.row_count).map(move |index| Row { view: self, index })
    }

    pub fn filter<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(Row<'_>) -> bool,
    {
        let keep: Vec<usize> = self.rows().filter(|r| predicate(*r)).map(|r| r.index).collect();
        self.take_rows(&keep)
    }

    /// Stable sort on the coerced values of `column`.
    ///
    /// Rows whose cell does not coerce go last in either direction; an
    /// unknown column leaves the order untouched.
    pub fn sort_by(&self, column: &str, descending: bool) -> Self {
        let Some(cells) = self.column(column) else {
            return self.clone();
        };
        let keys: Vec<Option<f64>> = cells.iter().map(coerce_opt).collect();

        let mut order: Vec<usize> = (0..self.row_count).collect();
        order.sort_by(|&a, &b| match (keys[a], keys[b]) {
            (Some(x), Some(y)) => {
                let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
                if descending {
                    ord.reverse()
                } else {
                    ord
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        self.take_rows(&order)
    }

    pub fn head(&self, n: usize) -> Self {
        let keep: Vec<usize> = (0..self.row_count.min(n)).collect();
        self.take_rows(&keep)
    }

    pub fn nlargest(&self, n: usize, column: &str) -> Self {
        self.sort_by(column, true).head(n)
    }

    pub fn nsmallest(&self, n: usize, column: &str) -> Self {
        self.sort_by(column, false).head(n)
    }

    fn take_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    cells: indices.iter().map(|&i| c.cells[i].clone()).collect(),
                })
                .collect(),
            row_count: indices.len(),
        }
    }
}

/// Borrowed view of one row
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    view: &'a TabularView,
    index: usize,
}

impl<'a> Row<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self, column: &str) -> Option<&'a Cell> {
        self.view.cell(self.index, column)
    }

    pub fn semantic(&self, kind: SemanticColumn) -> Option<&'a Cell> {
        self.view
            .find_semantic(kind)
            .and_then(|name| self.view.cell(self.index, name))
    }
}

/// One persisted row: column name to cell, in column order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowRecord {
    entries: Vec<(String, Cell)>,
}

impl RowRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the cell for `column`
    pub fn insert(&mut self, column: impl Into<String>, cell: Cell) {
        let column = column.into();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = cell,
            None => self.entries.push((column, cell)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.entries.iter().map(|(name, cell)| (name.as_str(), cell))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lenient conversion from a JSON object; any value becomes some cell
    pub fn from_json_object(object: &serde_json::Map<String, serde_json::Value>) -> Self {
        object
            .iter()
            .map(|(name, value)| (name.clone(), Cell::from_json(value)))
            .collect()
    }
}

impl FromIterator<(String, Cell)> for RowRecord {
    fn from_iter<T: IntoIterator<Item = (String, Cell)>>(iter: T) -> Self {
        let mut row = RowRecord::new();
        for (name, cell) in iter {
            row.insert(name, cell);
        }
        row
    }
}

impl Serialize for RowRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, cell) in &self.entries {
            map.serialize_entry(name, cell)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RowRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = RowRecord;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of column names to cells")
            }

            fn visit_map<A>(self, mut access: A) -> Result<RowRecord, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut row = RowRecord::new();
                while let Some((name, value)) = access.next_entry::<String, serde_json::Value>()? {
                    row.insert(name, Cell::from_json(&value));
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}
