//! LoRA-wrapped linear layer
//!
//! The wrapped layer keeps its original weight and bias frozen and adds a
//! trainable low-rank correction:
//!
//! `y = linear(x) + scale · (x · A) · B`, with `scale = alpha / rank`
//!
//! A is `in × rank`, drawn from N(0, 1/rank); B is `rank × out`, all zeros.
//! The correction is therefore exactly zero until B is trained.

use crate::error::{PortError, Result};
use crate::model::Linear;
use crate::tensor::{Parameter, Tensor};
use nalgebra::DMatrix;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Adapter hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoraConfig {
    /// Inner dimension of the A · B factorization
    pub rank: usize,
    /// Correction magnitude; the applied scale is alpha / rank
    pub alpha: f32,
}

impl Default for LoraConfig {
    fn default() -> Self {
        Self { rank: 16, alpha: 16.0 }
    }
}

impl LoraConfig {
    pub fn validate(&self) -> Result<()> {
        validate_rank(self.rank)
    }

    pub fn scale(&self) -> f32 {
        self.alpha / self.rank as f32
    }
}

/// Rank must be at least 1
pub fn validate_rank(rank: usize) -> Result<()> {
    if rank < 1 {
        return Err(PortError::InvalidRank { rank });
    }
    Ok(())
}

/// A frozen linear layer plus trainable low-rank factors
#[derive(Debug, Clone)]
pub struct LoraLinear {
    linear: Linear,
    /// in × rank
    a: Parameter,
    /// rank × out
    b: Parameter,
    config: LoraConfig,
}

impl LoraLinear {
    /// Wrap `linear`, freezing it and attaching fresh A/B factors
    pub fn wrap<R: Rng + ?Sized>(mut linear: Linear, rank: usize, alpha: f32, rng: &mut R) -> Result<Self> {
        validate_rank(rank)?;
        let (in_dim, out_dim) = (linear.in_features(), linear.out_features());
        linear.freeze();

        let std = 1.0 / (rank as f32).sqrt();
        let a = Parameter::new(Tensor::random_normal(&[in_dim, rank], std, rng)?);
        let b = Parameter::new(Tensor::zeros(&[rank, out_dim])?);

        Ok(Self {
            linear,
            a,
            b,
            config: LoraConfig { rank, alpha },
        })
    }

    /// Original layer output plus the scaled low-rank correction
    pub fn forward(&self, x: &DMatrix<f32>) -> Result<DMatrix<f32>> {
        let base = self.linear.forward(x)?;
        let correction = (x * self.a.value.matrix()) * self.b.value.matrix();
        Ok(base + correction * self.scale())
    }

    pub fn rank(&self) -> usize {
        self.config.rank
    }

    pub fn alpha(&self) -> f32 {
        self.config.alpha
    }

    /// alpha / rank
    pub fn scale(&self) -> f32 {
        self.config.scale()
    }

    pub fn in_features(&self) -> usize {
        self.linear.in_features()
    }

    pub fn out_features(&self) -> usize {
        self.linear.out_features()
    }

    /// The frozen original layer
    pub fn linear(&self) -> &Linear {
        &self.linear
    }

    pub fn lora_a(&self) -> &Parameter {
        &self.a
    }

    pub fn lora_a_mut(&mut self) -> &mut Parameter {
        &mut self.a
    }

    pub fn lora_b(&self) -> &Parameter {
        &self.b
    }

    pub fn lora_b_mut(&mut self) -> &mut Parameter {
        &mut self.b
    }

    /// in × rank + rank × out
    pub fn trainable_parameter_count(&self) -> usize {
        self.a.numel() + self.b.numel()
    }

    /// `scale · (A · B)ᵀ`, laid out like the base weight (`out × in`)
    pub fn delta_weight(&self) -> Tensor {
        let ab = self.a.value.matrix() * self.b.value.matrix();
        Tensor::from_matrix(ab.transpose() * self.scale())
    }

    /// Base weight with the correction folded in; the adapter is unchanged
    pub fn merged_weight(&self) -> Tensor {
        let merged = self.linear.weight.value.matrix() + self.delta_weight().matrix();
        Tensor::from_matrix(merged)
    }

    /// Consume the adapter, returning the original layer with merged weights
    pub fn into_merged(self) -> Result<Linear> {
        let merged = self.merged_weight();
        let mut linear = self.linear;
        linear.weight.value.copy_from(&merged)?;
        Ok(linear)
    }

    pub fn named_parameters(&self, prefix: &str) -> Vec<(String, &Parameter)> {
        let mut out = self.linear.named_parameters(&format!("{}.linear", prefix));
        out.push((format!("{}.lora.A", prefix), &self.a));
        out.push((format!("{}.lora.B", prefix), &self.b));
        out
    }

    pub fn named_parameters_mut(&mut self, prefix: &str) -> Vec<(String, &mut Parameter)> {
        let mut out = self.linear.named_parameters_mut(&format!("{}.linear", prefix));
        out.push((format!("{}.lora.A", prefix), &mut self.a));
        out.push((format!("{}.lora.B", prefix), &mut self.b));
        out
    }

    pub fn summary(&self) -> String {
        format!(
            "LoRA | dims={}x{} | rank={} | alpha={:.1} | scale={:.3} | trainable={}",
            self.in_features(),
            self.out_features(),
            self.rank(),
            self.alpha(),
            self.scale(),
            self.trainable_parameter_count(),
        )
    }
}
