//! # model_graph — composable prediction graphs over market data
//!
//! This library lets a researcher declare a directed acyclic graph of
//! time-indexed data sources ("providers") and predictive models, then
//! evaluate that graph lazily over arbitrary time windows:
//!
//! - Providers supply time-indexed tables with whole-history caching
//! - Models consume provider columns and other models' predictions as
//!   features, with automatic inner-join alignment on the time index
//! - Fit, predict and measure operate over `[from_t, to_t]` windows and
//!   recurse through the graph
//! - A selection model trains a meta-classifier to pick, per time step,
//!   among sibling candidate models
//!
//! # Modules
//!
//! - `data` - time-indexed frames/series and CSV loading
//! - `provider` - the provider contract plus price, lag and indicator
//!   sources
//! - `model` - the model graph: composition, alignment, selection, layers
//! - `ml` - estimators and evaluation metrics
//!
//! # Example
//!
//! ```rust,no_run
//! use model_graph::model::{EstimatorModel, Model};
//! use model_graph::ml::KnnClassifier;
//! use model_graph::provider::{CsvBarProvider, MovementProvider, Provider, SmaProvider};
//! use std::rc::Rc;
//!
//! # fn main() -> model_graph::Result<()> {
//! let prices = Rc::new(CsvBarProvider::new("data/spy.csv"));
//! let (from_t, to_t) = prices.get_date_range()?;
//!
//! let sma = Rc::new(SmaProvider::new(prices.clone(), 14));
//! let movement = Rc::new(MovementProvider::new(prices, 1));
//!
//! let mut model = EstimatorModel::classification(|| KnnClassifier::new(5));
//! model
//!     .add_input_features(sma, None, None)
//!     .set_output_feature(movement, "close");
//!
//! model.fit_by_time(from_t, to_t)?;
//! let report = model.measure_by_time(from_t, to_t)?;
//! println!("accuracy: {}", report["accuracy"]);
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod error;
pub mod ml;
pub mod model;
pub mod provider;

// Re-export commonly used types
pub use data::{TimeFrame, TimeSeries};
pub use error::{GraphError, Result};
pub use ml::Estimator;
pub use model::{
    handle, model_layers, EstimatorModel, Model, ModelHandle, OutputType, SelectionModel,
};
pub use provider::{provider_dataset, provider_series, DataCache, Provider, ProviderHandle};
