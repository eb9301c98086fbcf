//! Graph traversal utilities
//!
//! Layer decomposition for multi-stage training and the cycle guard used
//! before any recursive resolution. Node identity is the shared handle's
//! allocation, so one model reachable through several branches is the same
//! node everywhere.

use std::collections::HashSet;

use crate::error::{GraphError, Result};
use crate::model::{ModelHandle, ModelSpec};

type NodeId = *const ();

fn node_id(model: &ModelHandle) -> NodeId {
    std::rc::Rc::as_ptr(model) as NodeId
}

fn visit(
    model: &ModelHandle,
    path: &mut Vec<NodeId>,
    done: &mut HashSet<NodeId>,
) -> Result<()> {
    let id = node_id(model);
    if done.contains(&id) {
        return Ok(());
    }
    if path.contains(&id) {
        return Err(GraphError::CycleDetected);
    }

    path.push(id);
    let children: Vec<ModelHandle> = model
        .borrow()
        .spec()
        .input_models()
        .iter()
        .map(|input| input.model.clone())
        .collect();
    for child in &children {
        visit(child, path, done)?;
    }
    path.pop();
    done.insert(id);

    Ok(())
}

/// Fail with [`GraphError::CycleDetected`] if the input-model graph under
/// `root` contains a cycle.
pub fn ensure_acyclic(root: &ModelHandle) -> Result<()> {
    let mut path = Vec::new();
    let mut done = HashSet::new();
    visit(root, &mut path, &mut done)
}

/// Cycle guard over a node's declared inputs, for use from within the node
/// itself (which has no handle to its own allocation). Any cycle involving
/// the node is reachable from its children and shows up as a repeated
/// handle on the search path.
pub(crate) fn ensure_inputs_acyclic(spec: &ModelSpec) -> Result<()> {
    let mut path = Vec::new();
    let mut done = HashSet::new();
    for input in spec.input_models() {
        visit(&input.model, &mut path, &mut done)?;
    }
    Ok(())
}

/// Breadth-first depth classes of the input-model graph under `root`.
///
/// The returned layers are ordered deepest first: layer 0 holds the models
/// with no nested inputs, the final layer is `[root]`. Fitting layer by
/// layer therefore trains every dependency before its consumers. A model
/// reachable through several branches at different depths appears once per
/// depth.
pub fn model_layers(root: &ModelHandle) -> Result<Vec<Vec<ModelHandle>>> {
    ensure_acyclic(root)?;

    let mut current = vec![root.clone()];
    let mut layers = vec![current.clone()];
    loop {
        let mut next = Vec::new();
        for model in &current {
            next.extend(
                model
                    .borrow()
                    .spec()
                    .input_models()
                    .iter()
                    .map(|input| input.model.clone()),
            );
        }
        if next.is_empty() {
            break;
        }
        layers.push(next.clone());
        current = next;
    }
    layers.reverse();

    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::ConstantClassifier;
    use crate::model::{handle, EstimatorModel, Model};

    fn leaf() -> ModelHandle {
        handle(EstimatorModel::classification(|| ConstantClassifier::new(1.0)))
    }

    fn with_inputs(inputs: &[&ModelHandle]) -> ModelHandle {
        let mut model = EstimatorModel::classification(|| ConstantClassifier::new(1.0));
        for input in inputs {
            model.add_input_model((*input).clone(), None);
        }
        handle(model)
    }

    #[test]
    fn test_layers_order_deepest_first() {
        let deep = leaf();
        let mid = with_inputs(&[&deep]);
        let root = with_inputs(&[&mid]);

        let layers = model_layers(&root).unwrap();
        assert_eq!(layers.len(), 3);
        assert!(std::rc::Rc::ptr_eq(&layers[0][0], &deep));
        assert!(std::rc::Rc::ptr_eq(&layers[1][0], &mid));
        assert!(std::rc::Rc::ptr_eq(&layers[2][0], &root));
    }

    #[test]
    fn test_shared_model_appears_once_per_depth() {
        let shared = leaf();
        let mid = with_inputs(&[&shared]);
        // Root reaches `shared` both directly (depth 1) and via mid
        // (depth 2).
        let root = with_inputs(&[&mid, &shared]);

        let layers = model_layers(&root).unwrap();
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0].len(), 1);
        assert_eq!(layers[1].len(), 2);
        let occurrences = layers
            .iter()
            .flatten()
            .filter(|m| std::rc::Rc::ptr_eq(m, &shared))
            .count();
        assert_eq!(occurrences, 2);
    }

    #[test]
    fn test_cycle_is_detected() {
        let a = leaf();
        let b = with_inputs(&[&a]);
        a.borrow_mut().spec_mut().push_model(b.clone(), None);

        assert!(matches!(
            model_layers(&b),
            Err(GraphError::CycleDetected)
        ));
        assert!(matches!(
            ensure_acyclic(&a),
            Err(GraphError::CycleDetected)
        ));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let shared = leaf();
        let left = with_inputs(&[&shared]);
        let right = with_inputs(&[&shared]);
        let root = with_inputs(&[&left, &right]);

        assert!(ensure_acyclic(&root).is_ok());
        let layers = model_layers(&root).unwrap();
        assert_eq!(layers.len(), 3);
    }
}
