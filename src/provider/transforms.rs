//! Lagged feature expansion
//!
//! Wraps a provider and emits shifted copies of its columns so models can
//! consume past values as features. Lag `k` of column `close` is named
//! `close_lagged_k`; lag 0 keeps the original name. Leading cells are
//! undefined and survive until alignment drops them.

use std::collections::HashMap;

use crate::data::frame::TimeFrame;
use crate::error::Result;
use crate::provider::{DataCache, Provider, ProviderHandle};

enum LagSpec {
    /// The same lag set for every upstream column
    Uniform(Vec<usize>),
    /// Explicit lag sets per column; absent columns are not emitted
    PerColumn(HashMap<String, Vec<usize>>),
}

/// Shifted-column view of an upstream provider
pub struct LaggedProvider {
    inner: ProviderHandle,
    lags: LagSpec,
    cache: DataCache,
}

impl LaggedProvider {
    /// Apply the same lag set to every upstream column.
    pub fn new(inner: ProviderHandle, lags: Vec<usize>) -> Self {
        Self {
            inner,
            lags: LagSpec::Uniform(lags),
            cache: DataCache::new(),
        }
    }

    /// Apply explicit lag sets per column; other columns are dropped.
    pub fn by_column(inner: ProviderHandle, lags: HashMap<String, Vec<usize>>) -> Self {
        Self {
            inner,
            lags: LagSpec::PerColumn(lags),
            cache: DataCache::new(),
        }
    }

    fn lags_for(&self, column: &str) -> Option<&[usize]> {
        match &self.lags {
            LagSpec::Uniform(lags) => Some(lags),
            LagSpec::PerColumn(map) => map.get(column).map(Vec::as_slice),
        }
    }
}

fn shift(values: &[f64], lag: usize) -> Vec<f64> {
    values
        .iter()
        .enumerate()
        .map(|(r, _)| if r < lag { f64::NAN } else { values[r - lag] })
        .collect()
}

impl Provider for LaggedProvider {
    fn fetch(&self) -> Result<TimeFrame> {
        let frame = self.inner.get_data(None, None)?;

        let mut columns = Vec::new();
        for (c, name) in frame.columns().iter().enumerate() {
            let Some(lags) = self.lags_for(name) else {
                continue;
            };
            let values = frame.values().column(c).to_vec();
            for &lag in lags {
                let lagged_name = if lag > 0 {
                    format!("{name}_lagged_{lag}")
                } else {
                    name.clone()
                };
                columns.push((lagged_name, shift(&values, lag)));
            }
        }

        TimeFrame::from_columns(frame.index().to_vec(), columns)
    }

    fn cache(&self) -> &DataCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::tests::days;
    use crate::provider::MemoryProvider;

    fn sample() -> ProviderHandle {
        MemoryProvider::handle(
            TimeFrame::from_columns(
                days(4),
                vec![
                    ("close".to_string(), vec![1.0, 2.0, 3.0, 4.0]),
                    ("volume".to_string(), vec![10.0, 20.0, 30.0, 40.0]),
                ],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_uniform_lags_emit_shifted_columns() {
        let provider = LaggedProvider::new(sample(), vec![0, 1]);
        let frame = provider.get_data(None, None).unwrap();

        assert_eq!(
            frame.columns(),
            &[
                "close".to_string(),
                "close_lagged_1".to_string(),
                "volume".to_string(),
                "volume_lagged_1".to_string(),
            ]
        );

        let lagged = frame.column("close_lagged_1").unwrap();
        assert!(lagged.values()[0].is_nan());
        assert_eq!(lagged.values()[1], 1.0);
        assert_eq!(lagged.values()[3], 3.0);
    }

    #[test]
    fn test_per_column_lags_drop_other_columns() {
        let mut lags = HashMap::new();
        lags.insert("close".to_string(), vec![2]);

        let provider = LaggedProvider::by_column(sample(), lags);
        let frame = provider.get_data(None, None).unwrap();

        assert_eq!(frame.columns(), &["close_lagged_2".to_string()]);
        assert!(frame.values()[[1, 0]].is_nan());
        assert_eq!(frame.values()[[2, 0]], 1.0);
    }
}
