//! Linear layers and the swappable projection slot
//!
//! Weights follow the destination convention: `out_features × in_features`,
//! applied as `y = x · Wᵀ + b` on a `batch × in_features` input.

use crate::error::{PortError, Result};
use crate::lora::LoraLinear;
use crate::tensor::{Parameter, Tensor};
use nalgebra::DMatrix;
use rand::Rng;

/// Standard deviation used for GPT-2 weight init
pub const INIT_STD: f32 = 0.02;

/// Affine map with an `out × in` weight and an optional bias
#[derive(Debug, Clone)]
pub struct Linear {
    pub weight: Parameter,
    pub bias: Option<Parameter>,
}

impl Default for Linear {
    fn default() -> Self {
        Self {
            weight: Parameter::new(Tensor::from_matrix(DMatrix::zeros(0, 0))),
            bias: None,
        }
    }
}

impl Linear {
    /// Normal(0, 0.02) weight, zero bias
    pub fn new<R: Rng + ?Sized>(
        in_features: usize,
        out_features: usize,
        bias: bool,
        rng: &mut R,
    ) -> Result<Self> {
        let weight = Tensor::random_normal(&[out_features, in_features], INIT_STD, rng)?;
        let bias = if bias {
            Some(Parameter::new(Tensor::zeros(&[out_features])?))
        } else {
            None
        };
        Ok(Self {
            weight: Parameter::new(weight),
            bias,
        })
    }

    pub fn in_features(&self) -> usize {
        self.weight.value.matrix().ncols()
    }

    pub fn out_features(&self) -> usize {
        self.weight.value.matrix().nrows()
    }

    /// `x · Wᵀ + b` for `x` of shape `batch × in_features`
    pub fn forward(&self, x: &DMatrix<f32>) -> Result<DMatrix<f32>> {
        if x.ncols() != self.in_features() {
            return Err(PortError::InvalidShape(format!(
                "linear expects {} input features, got {}",
                self.in_features(),
                x.ncols()
            )));
        }
        let mut y = x * self.weight.value.matrix().transpose();
        if let Some(bias) = &self.bias {
            let b = bias.value.matrix();
            for (c, mut col) in y.column_iter_mut().enumerate() {
                col.add_scalar_mut(b[c]);
            }
        }
        Ok(y)
    }

    pub fn freeze(&mut self) {
        self.weight.freeze();
        if let Some(bias) = &mut self.bias {
            bias.freeze();
        }
    }

    pub fn named_parameters(&self, prefix: &str) -> Vec<(String, &Parameter)> {
        let mut out = vec![(format!("{}.weight", prefix), &self.weight)];
        if let Some(bias) = &self.bias {
            out.push((format!("{}.bias", prefix), bias));
        }
        out
    }

    pub fn named_parameters_mut(&mut self, prefix: &str) -> Vec<(String, &mut Parameter)> {
        let mut out = vec![(format!("{}.weight", prefix), &mut self.weight)];
        if let Some(bias) = &mut self.bias {
            out.push((format!("{}.bias", prefix), bias));
        }
        out
    }
}

/// A block's projection: either the plain layer or its LoRA-wrapped form
#[derive(Debug, Clone)]
pub enum Projection {
    Plain(Linear),
    LowRank(Box<LoraLinear>),
}

impl Projection {
    pub fn forward(&self, x: &DMatrix<f32>) -> Result<DMatrix<f32>> {
        match self {
            Projection::Plain(linear) => linear.forward(x),
            Projection::LowRank(lora) => lora.forward(x),
        }
    }

    pub fn in_features(&self) -> usize {
        match self {
            Projection::Plain(linear) => linear.in_features(),
            Projection::LowRank(lora) => lora.in_features(),
        }
    }

    pub fn out_features(&self) -> usize {
        match self {
            Projection::Plain(linear) => linear.out_features(),
            Projection::LowRank(lora) => lora.out_features(),
        }
    }

    pub fn is_adapted(&self) -> bool {
        matches!(self, Projection::LowRank(_))
    }

    pub fn as_lora(&self) -> Option<&LoraLinear> {
        match self {
            Projection::LowRank(lora) => Some(lora.as_ref()),
            Projection::Plain(_) => None,
        }
    }

    pub fn named_parameters(&self, prefix: &str) -> Vec<(String, &Parameter)> {
        match self {
            Projection::Plain(linear) => linear.named_parameters(prefix),
            Projection::LowRank(lora) => lora.named_parameters(prefix),
        }
    }

    pub fn named_parameters_mut(&mut self, prefix: &str) -> Vec<(String, &mut Parameter)> {
        match self {
            Projection::Plain(linear) => linear.named_parameters_mut(prefix),
            Projection::LowRank(lora) => lora.named_parameters_mut(prefix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_linear_layout() {
        let mut rng = StdRng::seed_from_u64(1);
        let linear = Linear::new(8, 24, true, &mut rng).unwrap();
        assert_eq!(linear.weight.shape(), &[24, 8]);
        assert_eq!(linear.bias.as_ref().unwrap().shape(), &[24]);
        assert_eq!(linear.in_features(), 8);
        assert_eq!(linear.out_features(), 24);

        let names: Vec<String> = linear.named_parameters("attn.c_attn").into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["attn.c_attn.weight", "attn.c_attn.bias"]);
    }

    #[test]
    fn test_linear_forward() {
        let mut linear = Linear {
            weight: Parameter::new(Tensor::from_vec(&[2, 3], vec![1.0, 0.0, 2.0, 0.0, 1.0, -1.0]).unwrap()),
            bias: Some(Parameter::new(Tensor::from_vec(&[2], vec![0.5, -0.5]).unwrap())),
        };
        let x = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 0.0, 0.0, 1.0]);
        let y = linear.forward(&x).unwrap();
        assert_eq!(y.shape(), (2, 2));
        assert_eq!(y[(0, 0)], 7.5);
        assert_eq!(y[(0, 1)], -1.5);
        assert_eq!(y[(1, 0)], 2.5);
        assert_eq!(y[(1, 1)], -1.5);

        linear.bias = None;
        let y = linear.forward(&x).unwrap();
        assert_eq!(y[(0, 0)], 7.0);
    }

    #[test]
    fn test_linear_forward_rejects_wrong_width() {
        let mut rng = StdRng::seed_from_u64(1);
        let linear = Linear::new(4, 4, false, &mut rng).unwrap();
        let x = DMatrix::zeros(1, 5);
        assert!(matches!(linear.forward(&x), Err(PortError::InvalidShape(_))));
    }

    #[test]
    fn test_freeze() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut linear = Linear::new(4, 4, true, &mut rng).unwrap();
        assert!(linear.weight.requires_grad);
        linear.freeze();
        assert!(!linear.weight.requires_grad);
        assert!(!linear.bias.as_ref().unwrap().requires_grad);
    }
}
