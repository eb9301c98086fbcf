//! Model composition over time-indexed sources
//!
//! A model node consumes providers and other models' predictions as
//! features, consumes exactly one target source as output, and exposes
//! fit/predict/measure over a time window. Nodes are shared through
//! [`ModelHandle`]s, so one feature model can feed several downstream
//! models; evaluation is lazy and synchronous, with repeated sub-model
//! work absorbed only by provider-level caching.

pub mod adapter;
pub mod graph;
pub mod selection;

pub use adapter::EstimatorModel;
pub use graph::{ensure_acyclic, model_layers};
pub use selection::SelectionModel;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::frame::{TimeFrame, TimeSeries};
use crate::error::{GraphError, Result};
use crate::ml::metrics;
use crate::provider::{provider_dataset, provider_series, ProviderHandle};

/// Kind of supervised target a model produces; fixed per model kind and
/// deciding which metrics a measurement reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputType {
    Classification,
    Regression,
}

/// Shared reference to a model node
pub type ModelHandle = Rc<RefCell<dyn Model>>;

/// Wrap a concrete model into a shared handle.
pub fn handle<M: Model + 'static>(model: M) -> ModelHandle {
    Rc::new(RefCell::new(model))
}

/// Provider used as a raw feature source, optionally column-filtered and
/// column-prefixed
pub struct FeatureInput {
    pub provider: ProviderHandle,
    pub columns: Option<Vec<String>>,
    pub slug: Option<String>,
}

/// Nested model whose prediction stream becomes a feature column
pub struct ModelInput {
    pub model: ModelHandle,
    pub slug: Option<String>,
}

/// Supervised target source: a provider column or another model's
/// predictions. A single tagged value, so the two can never be set at once.
pub enum Target {
    Feature {
        provider: ProviderHandle,
        column: String,
    },
    Model(ModelHandle),
}

/// Graph-facing state shared by every model kind
#[derive(Default)]
pub struct ModelSpec {
    input_features: Vec<FeatureInput>,
    input_models: Vec<ModelInput>,
    target: Option<Target>,
}

impl ModelSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input_features(&self) -> &[FeatureInput] {
        &self.input_features
    }

    pub fn input_models(&self) -> &[ModelInput] {
        &self.input_models
    }

    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    pub fn push_feature(
        &mut self,
        provider: ProviderHandle,
        columns: Option<Vec<String>>,
        slug: Option<&str>,
    ) {
        self.input_features.push(FeatureInput {
            provider,
            columns,
            slug: slug.map(str::to_string),
        });
    }

    pub fn push_model(&mut self, model: ModelHandle, slug: Option<&str>) {
        self.input_models.push(ModelInput {
            model,
            slug: slug.map(str::to_string),
        });
    }

    pub fn set_target_feature(&mut self, provider: ProviderHandle, column: &str) {
        self.target = Some(Target::Feature {
            provider,
            column: column.to_string(),
        });
    }

    pub fn set_target_model(&mut self, model: ModelHandle) {
        self.target = Some(Target::Model(model));
    }

    /// Reset the fitted state of every nested input model. Provider caches
    /// have an independent lifecycle and are left alone.
    pub fn reset_input_models(&self) {
        for input in &self.input_models {
            input.model.borrow_mut().reset();
        }
    }
}

/// Resolve a nested model's predictions over a window.
pub fn model_series(
    model: &ModelHandle,
    from_t: DateTime<Utc>,
    to_t: DateTime<Utc>,
) -> Result<TimeSeries> {
    model.borrow().predict_by_time(from_t, to_t)
}

/// Resolve a nested model's predictions as a one-column feature table.
pub fn model_dataset(
    model: &ModelHandle,
    from_t: DateTime<Utc>,
    to_t: DateTime<Utc>,
    slug: Option<&str>,
) -> Result<TimeFrame> {
    Ok(model_series(model, from_t, to_t)?.to_frame(slug.unwrap_or("prediction")))
}

/// A node in the model graph
///
/// Implementors supply the numeric obligations (`fit`, `predict`, `reset`)
/// and the shared [`ModelSpec`]; window-based training, prediction,
/// measurement and dataset resolution are provided.
pub trait Model {
    fn output_type(&self) -> OutputType;

    fn spec(&self) -> &ModelSpec;

    fn spec_mut(&mut self) -> &mut ModelSpec;

    /// Train internal state from an aligned, dense feature table and a
    /// label series on the same index.
    fn fit(&mut self, x: &TimeFrame, y: &TimeSeries) -> Result<()>;

    /// One prediction per input row, in row order.
    fn predict(&self, x: &TimeFrame) -> Result<Array1<f64>>;

    /// Discard fitted state, recursively through nested input models.
    fn reset(&mut self);

    /// Append a provider as a raw feature source.
    fn add_input_features(
        &mut self,
        provider: ProviderHandle,
        columns: Option<Vec<String>>,
        slug: Option<&str>,
    ) -> &mut Self
    where
        Self: Sized,
    {
        self.spec_mut().push_feature(provider, columns, slug);
        self
    }

    /// Append a nested model's prediction stream as a feature source.
    fn add_input_model(&mut self, model: ModelHandle, slug: Option<&str>) -> &mut Self
    where
        Self: Sized,
    {
        self.spec_mut().push_model(model, slug);
        self
    }

    /// Use a provider column as the supervised target, replacing any
    /// previously configured target.
    fn set_output_feature(&mut self, provider: ProviderHandle, column: &str) -> &mut Self
    where
        Self: Sized,
    {
        self.spec_mut().set_target_feature(provider, column);
        self
    }

    /// Use another model's predictions as the supervised target, replacing
    /// any previously configured target.
    fn set_output_model(&mut self, model: ModelHandle) -> &mut Self
    where
        Self: Sized,
    {
        self.spec_mut().set_target_model(model);
        self
    }

    /// Resolve the multi-source input table for a window: every feature
    /// source and nested model is evaluated, inner-joined on the time
    /// index, and rows with undefined cells are dropped.
    fn input_dataset(&self, from_t: DateTime<Utc>, to_t: DateTime<Utc>) -> Result<TimeFrame> {
        graph::ensure_inputs_acyclic(self.spec())?;

        let mut parts = Vec::new();
        for input in self.spec().input_features() {
            parts.push(provider_dataset(
                input.provider.as_ref(),
                Some(from_t),
                Some(to_t),
                input.columns.as_deref(),
                input.slug.as_deref(),
            )?);
        }
        for input in self.spec().input_models() {
            parts.push(model_dataset(
                &input.model,
                from_t,
                to_t,
                input.slug.as_deref(),
            )?);
        }

        let mut parts = parts.into_iter();
        let Some(mut joined) = parts.next() else {
            return Ok(TimeFrame::empty());
        };
        for part in parts {
            joined = joined.inner_join(&part)?;
        }

        let dense = joined.drop_undefined();
        debug!(
            rows = dense.n_rows(),
            columns = dense.n_cols(),
            "resolved input dataset"
        );
        Ok(dense)
    }

    /// Resolve the supervised target for a window.
    fn output_dataset(&self, from_t: DateTime<Utc>, to_t: DateTime<Utc>) -> Result<TimeSeries> {
        match self.spec().target() {
            Some(Target::Model(model)) => model_series(model, from_t, to_t),
            Some(Target::Feature { provider, column }) => {
                provider_series(provider.as_ref(), Some(from_t), Some(to_t), column)
            }
            None => Err(GraphError::NoOutputConfigured),
        }
    }

    /// Resolve inputs and target over the window, intersect them on the
    /// time index, and train. Inputs and target may have different native
    /// cadences (lagged features drop early rows), so the intersection is
    /// applied symmetrically before the estimator sees a row.
    fn fit_by_time(&mut self, from_t: DateTime<Utc>, to_t: DateTime<Utc>) -> Result<()> {
        let x = self.input_dataset(from_t, to_t)?;
        let y = self.output_dataset(from_t, to_t)?;

        let x = x.filter_index(y.index());
        let y = y.reindex(x.index())?;

        debug!(rows = x.n_rows(), "fitting on aligned window");
        self.fit(&x, &y)
    }

    /// Resolve inputs over the window, predict, and re-attach the input
    /// index. The target is neither needed nor consulted.
    fn predict_by_time(&self, from_t: DateTime<Utc>, to_t: DateTime<Utc>) -> Result<TimeSeries> {
        let x = self.input_dataset(from_t, to_t)?;
        let raw = self.predict(&x)?;
        TimeSeries::new(x.index().to_vec(), raw)
    }

    /// Predict over the window, align the true target to the predicted
    /// index, and report metrics: accuracy and F1 for classification, MAE,
    /// MSE and R² for regression.
    fn measure_by_time(
        &self,
        from_t: DateTime<Utc>,
        to_t: DateTime<Utc>,
    ) -> Result<HashMap<String, f64>> {
        let predicted = self.predict_by_time(from_t, to_t)?;
        let expected = self
            .output_dataset(from_t, to_t)?
            .filter_index(predicted.index())
            .reindex(predicted.index())?;

        let mut report = HashMap::new();
        match self.output_type() {
            OutputType::Classification => {
                report.insert(
                    "accuracy".to_string(),
                    metrics::accuracy(expected.values(), predicted.values())?,
                );
                report.insert(
                    "f1_score".to_string(),
                    metrics::f1_score(expected.values(), predicted.values(), 1.0)?,
                );
            }
            OutputType::Regression => {
                report.insert(
                    "mae".to_string(),
                    metrics::mae(expected.values(), predicted.values())?,
                );
                report.insert(
                    "mse".to_string(),
                    metrics::mse(expected.values(), predicted.values())?,
                );
                report.insert(
                    "r2_score".to_string(),
                    metrics::r2_score(expected.values(), predicted.values())?,
                );
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::tests::days;
    use crate::ml::{ConstantClassifier, KnnRegressor};
    use crate::provider::{LaggedProvider, MemoryProvider};

    fn frame_of(
        index: Vec<DateTime<Utc>>,
        name: &str,
        values: Vec<f64>,
    ) -> TimeFrame {
        TimeFrame::from_columns(index, vec![(name.to_string(), values)]).unwrap()
    }

    #[test]
    fn test_input_dataset_is_empty_without_sources() {
        let model = EstimatorModel::regression(|| KnnRegressor::new(1));
        let index = days(3);
        let dataset = model.input_dataset(index[0], index[2]).unwrap();
        assert!(dataset.is_empty());
        assert_eq!(dataset.n_cols(), 0);
    }

    #[test]
    fn test_input_dataset_is_dense_over_source_intersection() {
        let index = days(6);
        let a = MemoryProvider::handle(frame_of(
            index[..5].to_vec(),
            "a",
            vec![1.0, 2.0, f64::NAN, 4.0, 5.0],
        ));
        let b = MemoryProvider::handle(frame_of(
            index[1..].to_vec(),
            "b",
            vec![10.0, 20.0, 30.0, 40.0, 50.0],
        ));

        let mut model = EstimatorModel::regression(|| KnnRegressor::new(1));
        model
            .add_input_features(a, None, None)
            .add_input_features(b, None, None);

        let dataset = model.input_dataset(index[0], index[5]).unwrap();
        assert_eq!(dataset.index(), &[index[1], index[3], index[4]]);
        assert!(dataset.values().iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_output_configuration_is_exclusive() {
        let index = days(3);
        let provider = MemoryProvider::handle(frame_of(index.clone(), "y", vec![1.0, 2.0, 3.0]));
        let nested = handle(EstimatorModel::regression(|| KnnRegressor::new(1)));

        let mut model = EstimatorModel::regression(|| KnnRegressor::new(1));
        model.set_output_feature(provider.clone(), "y");
        model.set_output_model(nested);
        assert!(matches!(model.spec().target(), Some(Target::Model(_))));

        model.set_output_feature(provider, "y");
        assert!(matches!(model.spec().target(), Some(Target::Feature { .. })));
    }

    #[test]
    fn test_output_dataset_requires_configuration() {
        let model = EstimatorModel::regression(|| KnnRegressor::new(1));
        let index = days(2);
        assert!(matches!(
            model.output_dataset(index[0], index[1]),
            Err(GraphError::NoOutputConfigured)
        ));
    }

    #[test]
    fn test_fit_predict_with_shifted_target() {
        let index = days(10);
        let closes: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let prices = MemoryProvider::handle(frame_of(index.clone(), "close", closes));

        // Current and one-day-lagged price as features.
        let features: ProviderHandle = Rc::new(LaggedProvider::new(prices, vec![0, 1]));
        // Next-day close as the target, defined on the first nine days.
        let target = MemoryProvider::handle(frame_of(
            index[..9].to_vec(),
            "close_next",
            (2..=10).map(|i| i as f64).collect(),
        ));

        let mut model = EstimatorModel::regression(|| KnnRegressor::new(1));
        model
            .add_input_features(features, None, None)
            .set_output_feature(target, "close_next");

        model.fit_by_time(index[0], index[9]).unwrap();

        // The lag makes the input dense from day 1; prediction carries the
        // input index regardless of the target's extent.
        let predicted = model.predict_by_time(index[0], index[9]).unwrap();
        assert_eq!(predicted.index(), &index[1..]);

        // Over the trained days the memorizing regressor is exact.
        let report = model.measure_by_time(index[1], index[8]).unwrap();
        assert!(report["mae"] < 1e-10);
        assert!(report["mse"] < 1e-10);
        assert!((report["r2_score"] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_measure_constant_classifier() {
        let index = days(4);
        let features = MemoryProvider::handle(frame_of(
            index.clone(),
            "f",
            vec![0.0, 1.0, 2.0, 3.0],
        ));
        let labels = MemoryProvider::handle(frame_of(
            index.clone(),
            "label",
            vec![1.0, 1.0, -1.0, 1.0],
        ));

        let mut model = EstimatorModel::classification(|| ConstantClassifier::new(1.0));
        model
            .add_input_features(features, None, None)
            .set_output_feature(labels, "label");

        model.fit_by_time(index[0], index[3]).unwrap();
        let report = model.measure_by_time(index[0], index[3]).unwrap();

        assert!((report["accuracy"] - 0.75).abs() < 1e-10);
        // precision 0.75, recall 1.0
        assert!((report["f1_score"] - 6.0 / 7.0).abs() < 1e-10);
    }

    #[test]
    fn test_nested_model_prediction_feeds_parent() {
        let index = days(4);
        let features = MemoryProvider::handle(frame_of(
            index.clone(),
            "f",
            vec![0.0, 1.0, 2.0, 3.0],
        ));
        let labels = MemoryProvider::handle(frame_of(
            index.clone(),
            "label",
            vec![1.0, 1.0, 1.0, 1.0],
        ));

        let mut inner = EstimatorModel::classification(|| ConstantClassifier::new(1.0));
        inner.add_input_features(features.clone(), None, None);
        let inner = handle(inner);

        let mut outer = EstimatorModel::classification(|| ConstantClassifier::new(1.0));
        outer
            .add_input_features(features, None, None)
            .add_input_model(inner, Some("upstream"))
            .set_output_feature(labels, "label");

        let dataset = outer.input_dataset(index[0], index[3]).unwrap();
        assert_eq!(
            dataset.columns(),
            &["f".to_string(), "upstream".to_string()]
        );
        assert_eq!(dataset.column("upstream").unwrap().values().to_vec(), vec![1.0; 4]);
    }
}
