//! Tensors, trainable parameters, and ordered parameter mappings
//!
//! GPT-2 checkpoints only hold 1-D (biases, layer norms) and 2-D (embeddings,
//! linear maps) tensors, so storage is a nalgebra matrix and the logical shape
//! is kept alongside it. A 1-D tensor of length n lives in an n × 1 column.

use crate::error::{PortError, Result};
use nalgebra::DMatrix;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// A 1-D or 2-D block of `f32` values
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    values: DMatrix<f32>,
}

/// Storage dimensions (rows, cols) for a logical shape
fn storage_dims(shape: &[usize]) -> Result<(usize, usize)> {
    match *shape {
        [n] => Ok((n, 1)),
        [rows, cols] => Ok((rows, cols)),
        _ => Err(PortError::InvalidShape(format!(
            "only 1-D and 2-D tensors are supported, got {:?}",
            shape
        ))),
    }
}

impl Tensor {
    /// Wrap a matrix as a 2-D tensor
    pub fn from_matrix(values: DMatrix<f32>) -> Self {
        let shape = vec![values.nrows(), values.ncols()];
        Self { shape, values }
    }

    /// Build a tensor from row-major data
    pub fn from_vec(shape: &[usize], data: Vec<f32>) -> Result<Self> {
        let (rows, cols) = storage_dims(shape)?;
        if data.len() != rows * cols {
            return Err(PortError::InvalidShape(format!(
                "shape {:?} needs {} values, got {}",
                shape,
                rows * cols,
                data.len()
            )));
        }
        Ok(Self {
            shape: shape.to_vec(),
            values: DMatrix::from_row_slice(rows, cols, &data),
        })
    }

    pub fn zeros(shape: &[usize]) -> Result<Self> {
        Self::filled(shape, 0.0)
    }

    pub fn filled(shape: &[usize], value: f32) -> Result<Self> {
        let (rows, cols) = storage_dims(shape)?;
        Ok(Self {
            shape: shape.to_vec(),
            values: DMatrix::from_element(rows, cols, value),
        })
    }

    /// Sample every entry from N(0, std²)
    pub fn random_normal<R: Rng + ?Sized>(shape: &[usize], std: f32, rng: &mut R) -> Result<Self> {
        let (rows, cols) = storage_dims(shape)?;
        let normal = Normal::new(0.0, std)
            .map_err(|e| PortError::InvalidShape(format!("bad init std {}: {}", std, e)))?;
        Ok(Self {
            shape: shape.to_vec(),
            values: DMatrix::from_fn(rows, cols, |_, _| normal.sample(&mut *rng)),
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Backing matrix (n × 1 for 1-D tensors)
    pub fn matrix(&self) -> &DMatrix<f32> {
        &self.values
    }

    /// Shape after swapping the two axes (unchanged for 1-D)
    pub fn transposed_shape(&self) -> Vec<usize> {
        let mut shape = self.shape.clone();
        shape.reverse();
        shape
    }

    /// Swap the two axes of a 2-D tensor; a 1-D tensor is returned as is
    pub fn transpose(&self) -> Self {
        if self.shape.len() == 1 {
            return self.clone();
        }
        Self::from_matrix(self.values.transpose())
    }

    /// Overwrite values in place from a tensor of identical shape
    pub fn copy_from(&mut self, other: &Tensor) -> Result<()> {
        if self.shape != other.shape {
            return Err(PortError::InvalidShape(format!(
                "cannot copy {:?} into {:?}",
                other.shape, self.shape
            )));
        }
        self.values.copy_from(&other.values);
        Ok(())
    }

    /// Values in row-major order
    pub fn to_vec(&self) -> Vec<f32> {
        let (rows, cols) = self.values.shape();
        let mut out = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                out.push(self.values[(r, c)]);
            }
        }
        out
    }

    /// Largest absolute elementwise difference, or `None` if shapes differ
    pub fn max_abs_diff(&self, other: &Tensor) -> Option<f32> {
        if self.shape != other.shape {
            return None;
        }
        Some(
            self.values
                .iter()
                .zip(other.values.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f32::max),
        )
    }
}

/// A tensor plus its trainability flag
#[derive(Debug, Clone)]
pub struct Parameter {
    pub value: Tensor,
    pub requires_grad: bool,
}

impl Parameter {
    /// New trainable parameter
    pub fn new(value: Tensor) -> Self {
        Self { value, requires_grad: true }
    }

    pub fn shape(&self) -> &[usize] {
        self.value.shape()
    }

    pub fn numel(&self) -> usize {
        self.value.numel()
    }

    pub fn freeze(&mut self) {
        self.requires_grad = false;
    }
}

/// Insertion-ordered name → tensor mapping with unique keys
#[derive(Debug, Clone, Default)]
pub struct StateDict {
    entries: Vec<(String, Tensor)>,
    index: HashMap<String, usize>,
}

impl StateDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; duplicate names are rejected
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) -> Result<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(PortError::DuplicateParameter { name });
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push((name, tensor));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), t))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of scalar values
    pub fn numel(&self) -> usize {
        self.entries.iter().map(|(_, t)| t.numel()).sum()
    }

    /// Remove an entry, keeping the order of the rest
    pub fn remove(&mut self, name: &str) -> Option<Tensor> {
        let i = self.index.remove(name)?;
        let (_, tensor) = self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(tensor)
    }

    /// SHA-256 over names, shapes and row-major values, in order
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (name, tensor) in &self.entries {
            hasher.update(name.as_bytes());
            for dim in tensor.shape() {
                hasher.update((*dim as u64).to_le_bytes());
            }
            for val in tensor.to_vec() {
                hasher.update(val.to_le_bytes());
            }
        }
        hex::encode(hasher.finalize())
    }
}
