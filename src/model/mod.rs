//! Destination model: the GPT-2 parameter layout a checkpoint is ported into
//!
//! Each transformer block owns its attention projections through a
//! [`Projection`] slot that can be swapped for a LoRA-wrapped layer in place.

mod gpt;
mod linear;

pub use gpt::{Attention, Block, GptModel, LayerNorm, Mlp};
pub use linear::{Linear, Projection, INIT_STD};

use crate::tensor::Parameter;
use std::collections::HashMap;

/// A named, mutable collection of parameters that can receive a checkpoint
pub trait ParameterStore {
    fn named_parameters(&self) -> Vec<(String, &Parameter)>;

    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Parameter)>;

    fn parameter_names(&self) -> Vec<String> {
        self.named_parameters().into_iter().map(|(name, _)| name).collect()
    }
}

impl ParameterStore for HashMap<String, Parameter> {
    fn named_parameters(&self) -> Vec<(String, &Parameter)> {
        self.iter().map(|(name, p)| (name.clone(), p)).collect()
    }

    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Parameter)> {
        self.iter_mut().map(|(name, p)| (name.clone(), p)).collect()
    }
}
