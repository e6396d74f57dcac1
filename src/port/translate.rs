//! Checkpoint translation into a pre-allocated destination model
//!
//! Values are copied by exact name. Conv1D weights are transposed first; every
//! other tensor must already have the destination shape. Nothing is rolled
//! back on failure.

use super::rules::TransposeRules;
use crate::error::{PortError, Result};
use crate::model::ParameterStore;
use crate::tensor::{Parameter, StateDict};
use log::{debug, info};
use std::collections::{HashMap, HashSet};

/// Counts from a completed translation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortSummary {
    /// Tensors copied (including transposed ones)
    pub copied: usize,
    /// Tensors copied through a transpose
    pub transposed: usize,
}

/// Copy every source tensor into the destination parameter of the same name.
///
/// Source order is preserved, so on error every tensor before the offending
/// one has already been written. Destination shapes and trainability flags
/// never change.
pub fn translate<S: ParameterStore + ?Sized>(
    source: &StateDict,
    destination: &mut S,
    rules: &TransposeRules,
) -> Result<PortSummary> {
    let mut slots: HashMap<String, &mut Parameter> = destination.named_parameters_mut().into_iter().collect();
    let mut summary = PortSummary::default();

    for (name, tensor) in source.iter() {
        let slot = slots
            .get_mut(name)
            .ok_or_else(|| PortError::NameNotFound { name: name.to_string() })?;

        let transpose = rules.requires_transpose(name);
        let incoming_shape = if transpose {
            tensor.transposed_shape()
        } else {
            tensor.shape().to_vec()
        };
        if incoming_shape.as_slice() != slot.shape() {
            return Err(PortError::ShapeMismatch {
                name: name.to_string(),
                source_shape: tensor.shape().to_vec(),
                destination_shape: slot.shape().to_vec(),
            });
        }

        if transpose {
            slot.value.copy_from(&tensor.transpose())?;
            summary.transposed += 1;
        } else {
            slot.value.copy_from(tensor)?;
        }
        summary.copied += 1;
        debug!("Copied {} {:?}{}", name, slot.shape(), if transpose { " (transposed)" } else { "" });
    }

    info!(
        "Loaded {} tensors ({} transposed) from checkpoint",
        summary.copied, summary.transposed
    );
    Ok(summary)
}

/// Destination parameters that `source` does not provide, in destination order.
///
/// `translate` leaves these at their initial values.
pub fn unmatched_destination_names<S: ParameterStore + ?Sized>(source: &StateDict, destination: &S) -> Vec<String> {
    let provided: HashSet<&str> = source.names().collect();
    destination
        .parameter_names()
        .into_iter()
        .filter(|name| !provided.contains(name.as_str()))
        .collect()
}
