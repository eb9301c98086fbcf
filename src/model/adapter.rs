//! Estimator-to-model adapter
//!
//! Lifts any [`Estimator`] into the model graph. The adapter holds a
//! factory closure and an output-type tag; `reset` rebuilds the estimator
//! from the factory so `fit` always starts untrained.

use ndarray::Array1;

use crate::data::frame::{TimeFrame, TimeSeries};
use crate::error::{GraphError, Result};
use crate::ml::Estimator;
use crate::model::{handle, Model, ModelHandle, ModelSpec, OutputType};

/// Model node backed by a numeric estimator
pub struct EstimatorModel<E: Estimator> {
    spec: ModelSpec,
    output_type: OutputType,
    build: Box<dyn Fn() -> E>,
    estimator: E,
}

impl<E: Estimator + 'static> EstimatorModel<E> {
    /// Create a node with the given output type and estimator factory.
    pub fn new(output_type: OutputType, build: impl Fn() -> E + 'static) -> Self {
        let estimator = build();
        Self {
            spec: ModelSpec::new(),
            output_type,
            build: Box::new(build),
            estimator,
        }
    }

    pub fn classification(build: impl Fn() -> E + 'static) -> Self {
        Self::new(OutputType::Classification, build)
    }

    pub fn regression(build: impl Fn() -> E + 'static) -> Self {
        Self::new(OutputType::Regression, build)
    }

    /// Move the node into a shared graph handle.
    pub fn into_handle(self) -> ModelHandle {
        handle(self)
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }
}

impl<E: Estimator> Model for EstimatorModel<E> {
    fn output_type(&self) -> OutputType {
        self.output_type
    }

    fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    fn spec_mut(&mut self) -> &mut ModelSpec {
        &mut self.spec
    }

    fn fit(&mut self, x: &TimeFrame, y: &TimeSeries) -> Result<()> {
        self.reset();
        if x.n_rows() != y.len() {
            return Err(GraphError::LengthMismatch {
                expected: x.n_rows(),
                got: y.len(),
            });
        }
        self.estimator.fit(x.values(), y.values())
    }

    fn predict(&self, x: &TimeFrame) -> Result<Array1<f64>> {
        let raw = self.estimator.predict(x.values())?;
        if raw.len() != x.n_rows() {
            return Err(GraphError::LengthMismatch {
                expected: x.n_rows(),
                got: raw.len(),
            });
        }
        Ok(raw)
    }

    fn reset(&mut self) {
        self.spec.reset_input_models();
        self.estimator = (self.build)();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::tests::days;
    use crate::ml::KnnClassifier;

    fn training_pair() -> (TimeFrame, TimeSeries) {
        let index = days(4);
        let x = TimeFrame::from_columns(
            index.clone(),
            vec![("f".to_string(), vec![0.0, 1.0, 2.0, 3.0])],
        )
        .unwrap();
        let y = TimeSeries::from_vec(index, vec![-1.0, 1.0, -1.0, 1.0]).unwrap();
        (x, y)
    }

    #[test]
    fn test_fit_then_predict_delegates_to_estimator() {
        let (x, y) = training_pair();
        let mut model = EstimatorModel::classification(|| KnnClassifier::new(1));

        model.fit(&x, &y).unwrap();
        let predictions = model.predict(&x).unwrap();
        assert_eq!(predictions.to_vec(), y.values().to_vec());
    }

    #[test]
    fn test_reset_rebuilds_the_estimator() {
        let (x, y) = training_pair();
        let mut model = EstimatorModel::classification(|| KnnClassifier::new(1));

        model.fit(&x, &y).unwrap();
        model.reset();
        assert!(matches!(
            model.predict(&x),
            Err(GraphError::NotFitted)
        ));
    }

    #[test]
    fn test_fit_rejects_misaligned_rows() {
        let (x, y) = training_pair();
        let short = y.filter_index(&x.index()[..2]);
        let mut model = EstimatorModel::classification(|| KnnClassifier::new(1));

        assert!(matches!(
            model.fit(&x, &short),
            Err(GraphError::LengthMismatch { .. })
        ));
    }
}
