//! Time-indexed tables and series
//!
//! Every dataset in this library is indexed by strictly increasing, unique
//! UTC timestamps. [`TimeFrame`] is a table of named `f64` columns over such
//! an index, [`TimeSeries`] a single column. Undefined cells are `f64::NAN`;
//! combining sources is always an inner join on the index followed by
//! dropping rows that still contain undefined cells.

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, Axis};

use crate::error::{GraphError, Result};

/// Validate that a timestamp index is strictly increasing.
fn check_index(index: &[DateTime<Utc>]) -> Result<()> {
    for pair in index.windows(2) {
        if pair[1] <= pair[0] {
            return Err(GraphError::UnorderedIndex(pair[1]));
        }
    }
    Ok(())
}

/// Time-indexed table of named columns
#[derive(Debug, Clone, PartialEq)]
pub struct TimeFrame {
    index: Vec<DateTime<Utc>>,
    columns: Vec<String>,
    values: Array2<f64>,
}

impl TimeFrame {
    /// Create a frame from an index, column names and a rows-by-columns
    /// value matrix.
    pub fn new(
        index: Vec<DateTime<Utc>>,
        columns: Vec<String>,
        values: Array2<f64>,
    ) -> Result<Self> {
        check_index(&index)?;
        if values.nrows() != index.len() {
            return Err(GraphError::LengthMismatch {
                expected: index.len(),
                got: values.nrows(),
            });
        }
        if values.ncols() != columns.len() {
            return Err(GraphError::LengthMismatch {
                expected: columns.len(),
                got: values.ncols(),
            });
        }
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(GraphError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Self {
            index,
            columns,
            values,
        })
    }

    /// Create a frame from named column vectors sharing one index.
    pub fn from_columns(
        index: Vec<DateTime<Utc>>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self> {
        let n_rows = index.len();
        let names: Vec<String> = columns.iter().map(|(name, _)| name.clone()).collect();
        let mut values = Array2::from_elem((n_rows, columns.len()), f64::NAN);
        for (c, (_, column)) in columns.into_iter().enumerate() {
            if column.len() != n_rows {
                return Err(GraphError::LengthMismatch {
                    expected: n_rows,
                    got: column.len(),
                });
            }
            for (r, value) in column.into_iter().enumerate() {
                values[[r, c]] = value;
            }
        }
        Self::new(index, names, values)
    }

    /// Frame with no rows and no columns.
    pub fn empty() -> Self {
        Self {
            index: Vec::new(),
            columns: Vec::new(),
            values: Array2::zeros((0, 0)),
        }
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> ndarray::ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// First timestamp of the index, if any.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.index.first().copied()
    }

    /// Last timestamp of the index, if any.
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.index.last().copied()
    }

    fn column_position(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| GraphError::MissingColumn(name.to_string()))
    }

    /// Project a single named column.
    pub fn column(&self, name: &str) -> Result<TimeSeries> {
        let position = self.column_position(name)?;
        Ok(TimeSeries {
            index: self.index.clone(),
            values: self.values.column(position).to_owned(),
        })
    }

    /// Project a subset of columns, in the requested order.
    pub fn select(&self, names: &[String]) -> Result<TimeFrame> {
        let positions = names
            .iter()
            .map(|name| self.column_position(name))
            .collect::<Result<Vec<_>>>()?;
        let values = self.values.select(Axis(1), &positions);
        TimeFrame::new(self.index.clone(), names.to_vec(), values)
    }

    /// Rename every column by prepending `prefix`.
    pub fn with_prefix(&self, prefix: &str) -> TimeFrame {
        let columns = self
            .columns
            .iter()
            .map(|name| format!("{}{}", prefix, name))
            .collect();
        Self {
            index: self.index.clone(),
            columns,
            values: self.values.clone(),
        }
    }

    /// Rows within `[from_t, to_t]`, both bounds inclusive; an open bound
    /// defaults to the corresponding end of the index.
    pub fn slice_window(
        &self,
        from_t: Option<DateTime<Utc>>,
        to_t: Option<DateTime<Utc>>,
    ) -> TimeFrame {
        let lo = match from_t {
            Some(t) => self.index.partition_point(|ts| *ts < t),
            None => 0,
        };
        let hi = match to_t {
            Some(t) => self.index.partition_point(|ts| *ts <= t),
            None => self.index.len(),
        };
        let (lo, hi) = (lo.min(self.index.len()), hi.max(lo));
        Self {
            index: self.index[lo..hi].to_vec(),
            columns: self.columns.clone(),
            values: self.values.slice(ndarray::s![lo..hi, ..]).to_owned(),
        }
    }

    /// Keep rows whose timestamp appears in `keep` (which must be sorted).
    pub fn filter_index(&self, keep: &[DateTime<Utc>]) -> TimeFrame {
        let rows: Vec<usize> = self
            .index
            .iter()
            .enumerate()
            .filter(|(_, ts)| keep.binary_search(ts).is_ok())
            .map(|(r, _)| r)
            .collect();
        self.take_rows(&rows)
    }

    /// Drop rows containing any undefined (NaN) cell.
    pub fn drop_undefined(&self) -> TimeFrame {
        let rows: Vec<usize> = self
            .values
            .axis_iter(Axis(0))
            .enumerate()
            .filter(|(_, row)| row.iter().all(|v| !v.is_nan()))
            .map(|(r, _)| r)
            .collect();
        self.take_rows(&rows)
    }

    /// Inner join on the time index. Column names must be disjoint; use a
    /// slug prefix on one side when joining a source with itself.
    pub fn inner_join(&self, other: &TimeFrame) -> Result<TimeFrame> {
        for name in other.columns() {
            if self.columns.contains(name) {
                return Err(GraphError::DuplicateColumn(name.clone()));
            }
        }

        let mut left_rows = Vec::new();
        let mut right_rows = Vec::new();
        let mut index = Vec::new();
        let (mut l, mut r) = (0, 0);
        while l < self.index.len() && r < other.index.len() {
            match self.index[l].cmp(&other.index[r]) {
                std::cmp::Ordering::Less => l += 1,
                std::cmp::Ordering::Greater => r += 1,
                std::cmp::Ordering::Equal => {
                    index.push(self.index[l]);
                    left_rows.push(l);
                    right_rows.push(r);
                    l += 1;
                    r += 1;
                }
            }
        }

        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());

        let n_rows = index.len();
        let mut values = Array2::from_elem((n_rows, columns.len()), f64::NAN);
        for (out, &row) in left_rows.iter().enumerate() {
            for c in 0..self.n_cols() {
                values[[out, c]] = self.values[[row, c]];
            }
        }
        for (out, &row) in right_rows.iter().enumerate() {
            for c in 0..other.n_cols() {
                values[[out, self.n_cols() + c]] = other.values[[row, c]];
            }
        }

        TimeFrame::new(index, columns, values)
    }

    fn take_rows(&self, rows: &[usize]) -> TimeFrame {
        let index = rows.iter().map(|&r| self.index[r]).collect();
        Self {
            index,
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), rows),
        }
    }
}

/// Single time-indexed column of values
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    index: Vec<DateTime<Utc>>,
    values: Array1<f64>,
}

impl TimeSeries {
    /// Create a series from an index and matching values.
    pub fn new(index: Vec<DateTime<Utc>>, values: Array1<f64>) -> Result<Self> {
        check_index(&index)?;
        if values.len() != index.len() {
            return Err(GraphError::LengthMismatch {
                expected: index.len(),
                got: values.len(),
            });
        }
        Ok(Self { index, values })
    }

    /// Create a series from an index and a plain vector.
    pub fn from_vec(index: Vec<DateTime<Utc>>, values: Vec<f64>) -> Result<Self> {
        Self::new(index, Array1::from_vec(values))
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn values(&self) -> ndarray::ArrayView1<'_, f64> {
        self.values.view()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.index.first().copied()
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.index.last().copied()
    }

    /// Value at `t`, if that timestamp is present.
    pub fn get(&self, t: DateTime<Utc>) -> Option<f64> {
        self.index
            .binary_search(&t)
            .ok()
            .map(|position| self.values[position])
    }

    /// Iterate over `(timestamp, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.index
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }

    /// Values within `[from_t, to_t]`, both bounds inclusive.
    pub fn slice_window(
        &self,
        from_t: Option<DateTime<Utc>>,
        to_t: Option<DateTime<Utc>>,
    ) -> TimeSeries {
        let lo = match from_t {
            Some(t) => self.index.partition_point(|ts| *ts < t),
            None => 0,
        };
        let hi = match to_t {
            Some(t) => self.index.partition_point(|ts| *ts <= t),
            None => self.index.len(),
        };
        let (lo, hi) = (lo.min(self.index.len()), hi.max(lo));
        Self {
            index: self.index[lo..hi].to_vec(),
            values: self.values.slice(ndarray::s![lo..hi]).to_owned(),
        }
    }

    /// Keep entries whose timestamp appears in `keep` (which must be
    /// sorted).
    pub fn filter_index(&self, keep: &[DateTime<Utc>]) -> TimeSeries {
        let mut index = Vec::new();
        let mut values = Vec::new();
        for (ts, value) in self.iter() {
            if keep.binary_search(&ts).is_ok() {
                index.push(ts);
                values.push(value);
            }
        }
        Self {
            index,
            values: Array1::from_vec(values),
        }
    }

    /// Re-order the series onto `index`; every requested timestamp must be
    /// present.
    pub fn reindex(&self, index: &[DateTime<Utc>]) -> Result<TimeSeries> {
        let values = index
            .iter()
            .map(|&ts| self.get(ts).ok_or(GraphError::MissingTimestamp(ts)))
            .collect::<Result<Vec<_>>>()?;
        TimeSeries::from_vec(index.to_vec(), values)
    }

    /// Drop undefined (NaN) entries.
    pub fn drop_undefined(&self) -> TimeSeries {
        let mut index = Vec::new();
        let mut values = Vec::new();
        for (ts, value) in self.iter() {
            if !value.is_nan() {
                index.push(ts);
                values.push(value);
            }
        }
        Self {
            index,
            values: Array1::from_vec(values),
        }
    }

    /// Promote the series to a one-column frame.
    pub fn to_frame(&self, name: &str) -> TimeFrame {
        TimeFrame {
            index: self.index.clone(),
            columns: vec![name.to_string()],
            values: self.values.clone().insert_axis(Axis(1)),
        }
    }
}
