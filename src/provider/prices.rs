//! Price providers and derivations
//!
//! A CSV-backed daily bar source plus the derivation chain used to build
//! supervised targets from it: n-period differences, per-column
//! quantization, and {-1, 1} movement labels.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::data::frame::TimeFrame;
use crate::data::loader::{bars_to_frame, load_bars};
use crate::error::{GraphError, Result};
use crate::provider::{DataCache, Provider, ProviderHandle};

/// Daily OHLCV bars read from a CSV file
pub struct CsvBarProvider {
    path: PathBuf,
    cache: DataCache,
}

impl CsvBarProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: DataCache::new(),
        }
    }
}

impl Provider for CsvBarProvider {
    fn fetch(&self) -> Result<TimeFrame> {
        let bars = load_bars(&self.path)?;
        Ok(bars_to_frame(&bars)?.drop_undefined())
    }

    fn cache(&self) -> &DataCache {
        &self.cache
    }
}

/// `values[t] - values[t - periods]` with NaN for the warm-up rows.
fn diff_values(values: &[f64], periods: usize) -> Vec<f64> {
    values
        .iter()
        .enumerate()
        .map(|(r, value)| {
            if r < periods {
                f64::NAN
            } else {
                value - values[r - periods]
            }
        })
        .collect()
}

fn column_vectors(frame: &TimeFrame) -> Vec<(String, Vec<f64>)> {
    frame
        .columns()
        .iter()
        .enumerate()
        .map(|(c, name)| (name.clone(), frame.values().column(c).to_vec()))
        .collect()
}

/// n-period differences of every upstream column
pub struct DiffProvider {
    inner: ProviderHandle,
    periods: usize,
    cache: DataCache,
}

impl DiffProvider {
    pub fn new(inner: ProviderHandle, periods: usize) -> Self {
        Self {
            inner,
            periods,
            cache: DataCache::new(),
        }
    }
}

impl Provider for DiffProvider {
    fn fetch(&self) -> Result<TimeFrame> {
        if self.periods == 0 {
            return Err(GraphError::InvalidArgument(
                "diff periods must be positive".to_string(),
            ));
        }
        let frame = self.inner.get_data(None, None)?;
        let columns = column_vectors(&frame)
            .into_iter()
            .map(|(name, values)| (name, diff_values(&values, self.periods)))
            .collect();
        Ok(TimeFrame::from_columns(frame.index().to_vec(), columns)?.drop_undefined())
    }

    fn cache(&self) -> &DataCache {
        &self.cache
    }
}

/// Per-column binning of an upstream provider
///
/// A value in `(edges[i], edges[i + 1]]` maps to `labels[i]`; values outside
/// every interval become undefined and their rows are dropped. Only columns
/// present in `bins` are emitted, in the upstream column order.
pub struct QuantizedProvider {
    inner: ProviderHandle,
    bins: HashMap<String, Vec<f64>>,
    labels: HashMap<String, Vec<f64>>,
    cache: DataCache,
}

impl QuantizedProvider {
    pub fn new(
        inner: ProviderHandle,
        bins: HashMap<String, Vec<f64>>,
        labels: HashMap<String, Vec<f64>>,
    ) -> Self {
        Self {
            inner,
            bins,
            labels,
            cache: DataCache::new(),
        }
    }
}

/// Map a value into its interval label; NaN when out of range.
fn quantize(value: f64, edges: &[f64], labels: &[f64]) -> f64 {
    if value.is_nan() {
        return f64::NAN;
    }
    for i in 0..labels.len() {
        if value > edges[i] && value <= edges[i + 1] {
            return labels[i];
        }
    }
    f64::NAN
}

impl Provider for QuantizedProvider {
    fn fetch(&self) -> Result<TimeFrame> {
        let frame = self.inner.get_data(None, None)?;

        let mut columns = Vec::new();
        for (name, values) in column_vectors(&frame) {
            let Some(edges) = self.bins.get(&name) else {
                continue;
            };
            let labels = self
                .labels
                .get(&name)
                .ok_or_else(|| GraphError::InvalidArgument(format!("no labels for column {name}")))?;
            if edges.len() != labels.len() + 1 {
                return Err(GraphError::InvalidArgument(format!(
                    "column {name} needs {} labels for {} bin edges",
                    edges.len().saturating_sub(1),
                    edges.len()
                )));
            }
            let quantized = values
                .into_iter()
                .map(|value| quantize(value, edges, labels))
                .collect();
            columns.push((name, quantized));
        }

        Ok(TimeFrame::from_columns(frame.index().to_vec(), columns)?.drop_undefined())
    }

    fn cache(&self) -> &DataCache {
        &self.cache
    }
}

/// Sign-of-difference movement labels over every upstream column
///
/// `-1.0` when the n-period difference is non-positive, `1.0` when it is
/// positive. Warm-up rows are dropped.
pub struct MovementProvider {
    inner: ProviderHandle,
    periods: usize,
    cache: DataCache,
}

impl MovementProvider {
    pub fn new(inner: ProviderHandle, periods: usize) -> Self {
        Self {
            inner,
            periods,
            cache: DataCache::new(),
        }
    }
}

impl Provider for MovementProvider {
    fn fetch(&self) -> Result<TimeFrame> {
        if self.periods == 0 {
            return Err(GraphError::InvalidArgument(
                "movement periods must be positive".to_string(),
            ));
        }
        let frame = self.inner.get_data(None, None)?;
        let columns = column_vectors(&frame)
            .into_iter()
            .map(|(name, values)| {
                let movement = diff_values(&values, self.periods)
                    .into_iter()
                    .map(|diff| {
                        if diff.is_nan() {
                            f64::NAN
                        } else if diff > 0.0 {
                            1.0
                        } else {
                            -1.0
                        }
                    })
                    .collect();
                (name, movement)
            })
            .collect();
        Ok(TimeFrame::from_columns(frame.index().to_vec(), columns)?.drop_undefined())
    }

    fn cache(&self) -> &DataCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::tests::days;
    use crate::data::loader::{save_bars, Bar};
    use crate::provider::MemoryProvider;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn close_frame(values: Vec<f64>) -> TimeFrame {
        TimeFrame::from_columns(days(values.len()), vec![("close".to_string(), values)]).unwrap()
    }

    #[test]
    fn test_csv_bar_provider_loads_sorted_bars() {
        let bars: Vec<Bar> = (0..3)
            .rev()
            .map(|i| Bar {
                date: NaiveDate::from_ymd_opt(2021, 1, 1 + i).unwrap(),
                open: 1.0 + i as f64,
                high: 2.0 + i as f64,
                low: 0.5 + i as f64,
                close: 1.5 + i as f64,
                adj_close: 1.4 + i as f64,
                volume: 100.0,
            })
            .collect();

        let dir = tempdir().unwrap();
        let path = dir.path().join("bars.csv");
        save_bars(&bars, &path).unwrap();

        let provider = CsvBarProvider::new(&path);
        let frame = provider.get_data(None, None).unwrap();
        assert_eq!(frame.index(), &days(3)[..]);
        assert_eq!(
            frame.column("close").unwrap().values().to_vec(),
            vec![1.5, 2.5, 3.5]
        );
    }

    #[test]
    fn test_diff_drops_warmup_rows() {
        let inner = MemoryProvider::handle(close_frame(vec![1.0, 4.0, 9.0, 16.0]));
        let provider = DiffProvider::new(inner, 1);

        let frame = provider.get_data(None, None).unwrap();
        assert_eq!(frame.index(), &days(4)[1..]);
        assert_eq!(
            frame.column("close").unwrap().values().to_vec(),
            vec![3.0, 5.0, 7.0]
        );
    }

    #[test]
    fn test_quantized_maps_intervals_and_drops_outliers() {
        let inner = MemoryProvider::handle(close_frame(vec![-2.0, -0.5, 0.5, 9.0]));
        let mut bins = HashMap::new();
        bins.insert("close".to_string(), vec![-1.0, 0.0, 1.0]);
        let mut labels = HashMap::new();
        labels.insert("close".to_string(), vec![-1.0, 1.0]);

        let provider = QuantizedProvider::new(inner, bins, labels);
        let frame = provider.get_data(None, None).unwrap();

        // -2.0 and 9.0 fall outside the intervals and are dropped.
        assert_eq!(frame.index(), &days(4)[1..3]);
        assert_eq!(
            frame.column("close").unwrap().values().to_vec(),
            vec![-1.0, 1.0]
        );
    }

    #[test]
    fn test_movement_labels_are_signs() {
        let inner = MemoryProvider::handle(close_frame(vec![2.0, 3.0, 3.0, 1.0]));
        let provider = MovementProvider::new(inner, 1);

        let frame = provider.get_data(None, None).unwrap();
        // Flat differences count as non-positive movement.
        assert_eq!(
            frame.column("close").unwrap().values().to_vec(),
            vec![1.0, -1.0, -1.0]
        );
    }
}
