//! Feature providers
//!
//! A provider supplies a time-indexed table of named columns. Implementors
//! only define [`Provider::fetch`]; windowed access, the whole-history memo
//! and range helpers are provided. Providers are shared across models via
//! [`ProviderHandle`] and hold no state besides their memo.

mod indicators;
mod prices;
mod transforms;

pub use indicators::{BollingerProvider, MacdProvider, RsiProvider, SmaProvider};
pub use prices::{CsvBarProvider, DiffProvider, MovementProvider, QuantizedProvider};
pub use transforms::LaggedProvider;

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::data::frame::{TimeFrame, TimeSeries};
use crate::error::{GraphError, Result};

/// Shared reference to a provider
pub type ProviderHandle = Rc<dyn Provider>;

/// Whole-history memo owned by each provider
#[derive(Debug, Default)]
pub struct DataCache {
    slot: RefCell<Option<Rc<TimeFrame>>>,
}

impl DataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached table, computing it once via `fetch` if absent.
    pub fn get_or_fetch(
        &self,
        fetch: impl FnOnce() -> Result<TimeFrame>,
    ) -> Result<Rc<TimeFrame>> {
        if let Some(frame) = self.slot.borrow().as_ref() {
            return Ok(Rc::clone(frame));
        }
        let frame = Rc::new(fetch()?);
        debug!(rows = frame.n_rows(), "populated provider cache");
        *self.slot.borrow_mut() = Some(Rc::clone(&frame));
        Ok(frame)
    }

    /// Drop the memo; the next access recomputes.
    pub fn clear(&self) {
        *self.slot.borrow_mut() = None;
    }

    pub fn is_populated(&self) -> bool {
        self.slot.borrow().is_some()
    }
}

/// Source of a time-indexed table of named columns
pub trait Provider {
    /// Build the complete table for this source. Must be deterministic;
    /// failures propagate unchanged.
    fn fetch(&self) -> Result<TimeFrame>;

    /// The provider's whole-history memo.
    fn cache(&self) -> &DataCache;

    /// The full table, filtered to `[from_t, to_t]` inclusive. Open bounds
    /// default to the table's own extent. The full table is computed once
    /// and reused for every subsequent call until [`Provider::clear_cache`].
    fn get_data(
        &self,
        from_t: Option<DateTime<Utc>>,
        to_t: Option<DateTime<Utc>>,
    ) -> Result<TimeFrame> {
        let full = self.cache().get_or_fetch(|| self.fetch())?;
        Ok(full.slice_window(from_t, to_t))
    }

    /// First and last timestamp of the full table.
    fn get_date_range(&self) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let full = self.cache().get_or_fetch(|| self.fetch())?;
        match (full.start(), full.end()) {
            (Some(start), Some(end)) => Ok((start, end)),
            _ => Err(GraphError::EmptyWindow("provider table")),
        }
    }

    /// Invalidate the memo, forcing recomputation on the next access.
    fn clear_cache(&self) {
        self.cache().clear();
    }
}

/// Provider over a table already held in memory. Useful for research
/// experiments on prepared frames and as a test fixture.
pub struct MemoryProvider {
    frame: TimeFrame,
    cache: DataCache,
}

impl MemoryProvider {
    pub fn new(frame: TimeFrame) -> Self {
        Self {
            frame,
            cache: DataCache::new(),
        }
    }

    /// Wrap a frame directly into a shared handle.
    pub fn handle(frame: TimeFrame) -> ProviderHandle {
        Rc::new(Self::new(frame))
    }
}

impl Provider for MemoryProvider {
    fn fetch(&self) -> Result<TimeFrame> {
        Ok(self.frame.clone())
    }

    fn cache(&self) -> &DataCache {
        &self.cache
    }
}

/// Project a single provider column over a window.
pub fn provider_series(
    provider: &dyn Provider,
    from_t: Option<DateTime<Utc>>,
    to_t: Option<DateTime<Utc>>,
    column: &str,
) -> Result<TimeSeries> {
    provider.get_data(from_t, to_t)?.column(column)
}

/// Resolve a provider over a window into a feature table. Columns are
/// selected by the provider's own names first; the slug prefix is applied
/// to every remaining column afterwards.
pub fn provider_dataset(
    provider: &dyn Provider,
    from_t: Option<DateTime<Utc>>,
    to_t: Option<DateTime<Utc>>,
    columns: Option<&[String]>,
    slug: Option<&str>,
) -> Result<TimeFrame> {
    let mut dataset = provider.get_data(from_t, to_t)?;

    if let Some(columns) = columns {
        dataset = dataset.select(columns)?;
    }
    if let Some(slug) = slug {
        dataset = dataset.with_prefix(slug);
    }

    Ok(dataset)
}
