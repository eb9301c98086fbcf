//! Per-step model selection
//!
//! Given K candidate models, which one would have been correct at each
//! instant — and can a meta-classifier learn to predict that choice from
//! the raw features? Fitting derives a meta-label per timestamp as the
//! index of the first candidate (in declared order) whose prediction
//! equals the true label; prediction dispatches each row to the candidate
//! the meta model picks.

use chrono::{DateTime, Utc};
use ndarray::Array1;
use tracing::debug;

use crate::data::frame::{TimeFrame, TimeSeries};
use crate::error::{GraphError, Result};
use crate::ml::metrics::labels_equal;
use crate::model::{Model, ModelHandle, ModelSpec, OutputType};

/// Model that dispatches per time step to one of its candidates
///
/// Candidate ordering is semantically significant: meta-labels are assigned
/// by first exact match, not by any quality measure. Candidates are assumed
/// independently trained; only the meta model's fitted state is owned here.
pub struct SelectionModel {
    spec: ModelSpec,
    candidates: Vec<ModelHandle>,
    meta: ModelHandle,
}

impl SelectionModel {
    pub fn new(candidates: Vec<ModelHandle>, meta: ModelHandle) -> Self {
        Self {
            spec: ModelSpec::new(),
            candidates,
            meta,
        }
    }

    pub fn candidates(&self) -> &[ModelHandle] {
        &self.candidates
    }

    pub fn meta_model(&self) -> &ModelHandle {
        &self.meta
    }

    /// Every candidate's prediction stream over `[from_t, to_t]`, in
    /// declared order.
    fn candidate_predictions(
        &self,
        from_t: DateTime<Utc>,
        to_t: DateTime<Utc>,
    ) -> Result<Vec<TimeSeries>> {
        self.candidates
            .iter()
            .map(|candidate| candidate.borrow().predict_by_time(from_t, to_t))
            .collect()
    }
}

/// First-match meta-labels: for each label timestamp, the index of the
/// first candidate stream predicting exactly that label. Unmatched
/// timestamps are dropped; a timestamp absent from any candidate stream is
/// a fatal lookup error.
fn derive_meta_labels(
    y: &TimeSeries,
    candidate_predictions: &[TimeSeries],
) -> Result<(Vec<DateTime<Utc>>, Vec<f64>)> {
    let mut index = Vec::new();
    let mut labels = Vec::new();

    for (ts, truth) in y.iter() {
        let mut matched = None;
        for (candidate, predictions) in candidate_predictions.iter().enumerate() {
            let prediction = predictions
                .get(ts)
                .ok_or(GraphError::MissingTimestamp(ts))?;
            if labels_equal(prediction, truth) {
                matched = Some(candidate as f64);
                break;
            }
        }
        if let Some(label) = matched {
            index.push(ts);
            labels.push(label);
        }
    }

    Ok((index, labels))
}

impl Model for SelectionModel {
    fn output_type(&self) -> OutputType {
        OutputType::Classification
    }

    fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    fn spec_mut(&mut self) -> &mut ModelSpec {
        &mut self.spec
    }

    fn fit(&mut self, x: &TimeFrame, y: &TimeSeries) -> Result<()> {
        self.reset();

        let from_t = y.start().ok_or(GraphError::EmptyWindow("training labels"))?;
        let to_t = y.end().ok_or(GraphError::EmptyWindow("training labels"))?;
        let candidate_predictions = self.candidate_predictions(from_t, to_t)?;

        let (index, labels) = derive_meta_labels(y, &candidate_predictions)?;
        debug!(
            matched = index.len(),
            total = y.len(),
            "derived selection meta-labels"
        );

        let meta_x = x.filter_index(&index);
        let meta_y = TimeSeries::from_vec(index, labels)?.reindex(meta_x.index())?;
        self.meta.borrow_mut().fit(&meta_x, &meta_y)
    }

    fn predict(&self, x: &TimeFrame) -> Result<Array1<f64>> {
        if x.is_empty() {
            return Ok(Array1::from_vec(Vec::new()));
        }

        let chosen = self.meta.borrow().predict(x)?;
        let from_t = x.start().ok_or(GraphError::EmptyWindow("prediction window"))?;
        let to_t = x.end().ok_or(GraphError::EmptyWindow("prediction window"))?;
        let candidate_predictions = self.candidate_predictions(from_t, to_t)?;

        let mut predictions = Vec::with_capacity(x.n_rows());
        for (row, &ts) in x.index().iter().enumerate() {
            let candidate = chosen[row].round() as i64;
            if candidate < 0 || candidate as usize >= self.candidates.len() {
                return Err(GraphError::SelectionOutOfRange(candidate));
            }
            let prediction = candidate_predictions[candidate as usize]
                .get(ts)
                .ok_or(GraphError::MissingTimestamp(ts))?;
            predictions.push(prediction);
        }

        Ok(Array1::from_vec(predictions))
    }

    /// Resets nested input models and the meta model. Candidates keep
    /// their independently managed fitted state.
    fn reset(&mut self) {
        self.spec.reset_input_models();
        self.meta.borrow_mut().reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::tests::days;
    use crate::ml::{ConstantClassifier, KnnClassifier};
    use crate::model::{handle, EstimatorModel};
    use crate::provider::{MemoryProvider, ProviderHandle};

    fn feature_provider(index: &[DateTime<Utc>]) -> ProviderHandle {
        let values = (0..index.len()).map(|i| i as f64).collect();
        MemoryProvider::handle(
            TimeFrame::from_columns(index.to_vec(), vec![("f".to_string(), values)]).unwrap(),
        )
    }

    /// Candidate that always predicts `label`, fed by `features`.
    fn constant_candidate(features: &ProviderHandle, label: f64) -> ModelHandle {
        let mut model = EstimatorModel::classification(move || ConstantClassifier::new(label));
        model.add_input_features(features.clone(), None, None);
        handle(model)
    }

    fn selection_fixture(labels: Vec<f64>) -> (SelectionModel, Vec<DateTime<Utc>>) {
        let index = days(labels.len());
        let features = feature_provider(&index);
        let label_provider = MemoryProvider::handle(
            TimeFrame::from_columns(index.clone(), vec![("label".to_string(), labels)]).unwrap(),
        );

        let candidates = vec![
            constant_candidate(&features, 1.0),
            constant_candidate(&features, -1.0),
        ];
        let meta = handle(EstimatorModel::classification(|| KnnClassifier::new(1)));

        let mut model = SelectionModel::new(candidates, meta);
        model
            .add_input_features(features, None, None)
            .set_output_feature(label_provider, "label");
        (model, index)
    }

    #[test]
    fn test_meta_labels_use_first_match_in_declared_order() {
        let index = days(2);
        // Both candidates predict 1.0 at every timestamp; the first must
        // win whenever the truth is 1.0.
        let first = TimeSeries::from_vec(index.clone(), vec![1.0, 1.0]).unwrap();
        let second = TimeSeries::from_vec(index.clone(), vec![1.0, -1.0]).unwrap();
        let y = TimeSeries::from_vec(index.clone(), vec![1.0, -1.0]).unwrap();

        let (ts, labels) = derive_meta_labels(&y, &[first, second]).unwrap();
        assert_eq!(ts, index);
        assert_eq!(labels, vec![0.0, 1.0]);
    }

    #[test]
    fn test_unmatched_timestamps_are_dropped() {
        let index = days(3);
        let only = TimeSeries::from_vec(index.clone(), vec![1.0, 1.0, 1.0]).unwrap();
        let y = TimeSeries::from_vec(index.clone(), vec![1.0, 0.0, 1.0]).unwrap();

        let (ts, labels) = derive_meta_labels(&y, &[only]).unwrap();
        assert_eq!(ts, vec![index[0], index[2]]);
        assert_eq!(labels, vec![0.0, 0.0]);
    }

    #[test]
    fn test_missing_candidate_timestamp_is_fatal() {
        let index = days(3);
        let short = TimeSeries::from_vec(index[..2].to_vec(), vec![1.0, 1.0]).unwrap();
        let y = TimeSeries::from_vec(index, vec![1.0, 1.0, 1.0]).unwrap();

        assert!(matches!(
            derive_meta_labels(&y, &[short]),
            Err(GraphError::MissingTimestamp(_))
        ));
    }

    #[test]
    fn test_selection_learns_alternating_labels() {
        let (mut model, index) = selection_fixture(vec![1.0, -1.0, 1.0, -1.0]);

        model.fit_by_time(index[0], index[3]).unwrap();

        // The meta model saw labels [0, 1, 0, 1] and, memorizing, repeats
        // them on the training features.
        let x = model.input_dataset(index[0], index[3]).unwrap();
        let meta_out = model.meta_model().borrow().predict(&x).unwrap();
        assert_eq!(meta_out.to_vec(), vec![0.0, 1.0, 0.0, 1.0]);

        // Dispatching through the candidates reproduces the true labels.
        let predicted = model.predict_by_time(index[0], index[3]).unwrap();
        assert_eq!(predicted.values().to_vec(), vec![1.0, -1.0, 1.0, -1.0]);

        let report = model.measure_by_time(index[0], index[3]).unwrap();
        assert!((report["accuracy"] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_out_of_range_meta_output_is_rejected() {
        let index = days(2);
        let features = feature_provider(&index);
        // A meta model that names a candidate index that does not exist.
        let meta = handle(EstimatorModel::classification(|| {
            ConstantClassifier::new(5.0)
        }));

        let mut model = SelectionModel::new(vec![constant_candidate(&features, 1.0)], meta);
        model.add_input_features(features, None, None);

        let x = model.input_dataset(index[0], index[1]).unwrap();
        assert!(matches!(
            model.predict(&x),
            Err(GraphError::SelectionOutOfRange(5))
        ));
    }
}
