//! GPT-2 parameter layout in the Linear (`out × in`) convention
//!
//! Only the parameters are modelled here. Names match the HuggingFace
//! `GPT2LMHeadModel` state dict so a checkpoint can be matched by exact name.

use super::linear::{Linear, Projection, INIT_STD};
use super::ParameterStore;
use crate::config::GptConfig;
use crate::error::Result;
use crate::tensor::{Parameter, StateDict, Tensor};
use rand::Rng;

/// Layer norm scale and shift
#[derive(Debug, Clone)]
pub struct LayerNorm {
    pub weight: Parameter,
    pub bias: Parameter,
}

impl LayerNorm {
    pub fn new(dim: usize) -> Result<Self> {
        Ok(Self {
            weight: Parameter::new(Tensor::filled(&[dim], 1.0)?),
            bias: Parameter::new(Tensor::zeros(&[dim])?),
        })
    }

    fn named_parameters<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a Parameter)>) {
        out.push((format!("{}.weight", prefix), &self.weight));
        out.push((format!("{}.bias", prefix), &self.bias));
    }

    fn named_parameters_mut<'a>(&'a mut self, prefix: &str, out: &mut Vec<(String, &'a mut Parameter)>) {
        out.push((format!("{}.weight", prefix), &mut self.weight));
        out.push((format!("{}.bias", prefix), &mut self.bias));
    }
}

/// Causal self-attention projections
#[derive(Debug, Clone)]
pub struct Attention {
    /// Fused QKV input projection: emb → 3·emb
    pub c_attn: Projection,
    /// Output projection: emb → emb
    pub c_proj: Projection,
}

/// Feed-forward projections
#[derive(Debug, Clone)]
pub struct Mlp {
    /// Expansion: emb → 4·emb
    pub c_fc: Linear,
    /// Projection back: 4·emb → emb
    pub c_proj: Linear,
}

/// One transformer block
#[derive(Debug, Clone)]
pub struct Block {
    pub ln_1: LayerNorm,
    pub attn: Attention,
    pub ln_2: LayerNorm,
    pub mlp: Mlp,
}

impl Block {
    pub fn new<R: Rng + ?Sized>(config: &GptConfig, rng: &mut R) -> Result<Self> {
        let d = config.emb_dim;
        Ok(Self {
            ln_1: LayerNorm::new(d)?,
            attn: Attention {
                c_attn: Projection::Plain(Linear::new(d, 3 * d, config.qkv_bias, rng)?),
                c_proj: Projection::Plain(Linear::new(d, d, true, rng)?),
            },
            ln_2: LayerNorm::new(d)?,
            mlp: Mlp {
                c_fc: Linear::new(d, config.ffn_dim(), true, rng)?,
                c_proj: Linear::new(config.ffn_dim(), d, true, rng)?,
            },
        })
    }

    fn named_parameters<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a Parameter)>) {
        self.ln_1.named_parameters(&format!("{}.ln_1", prefix), out);
        out.extend(self.attn.c_attn.named_parameters(&format!("{}.attn.c_attn", prefix)));
        out.extend(self.attn.c_proj.named_parameters(&format!("{}.attn.c_proj", prefix)));
        self.ln_2.named_parameters(&format!("{}.ln_2", prefix), out);
        out.extend(self.mlp.c_fc.named_parameters(&format!("{}.mlp.c_fc", prefix)));
        out.extend(self.mlp.c_proj.named_parameters(&format!("{}.mlp.c_proj", prefix)));
    }

    fn named_parameters_mut<'a>(&'a mut self, prefix: &str, out: &mut Vec<(String, &'a mut Parameter)>) {
        self.ln_1.named_parameters_mut(&format!("{}.ln_1", prefix), out);
        out.extend(self.attn.c_attn.named_parameters_mut(&format!("{}.attn.c_attn", prefix)));
        out.extend(self.attn.c_proj.named_parameters_mut(&format!("{}.attn.c_proj", prefix)));
        self.ln_2.named_parameters_mut(&format!("{}.ln_2", prefix), out);
        out.extend(self.mlp.c_fc.named_parameters_mut(&format!("{}.mlp.c_fc", prefix)));
        out.extend(self.mlp.c_proj.named_parameters_mut(&format!("{}.mlp.c_proj", prefix)));
    }
}

/// GPT-2 language model parameters
#[derive(Debug, Clone)]
pub struct GptModel {
    config: GptConfig,
    /// Token embedding (vocab × emb)
    pub wte: Parameter,
    /// Position embedding (context × emb)
    pub wpe: Parameter,
    pub blocks: Vec<Block>,
    pub ln_f: LayerNorm,
    /// Output head (vocab × emb), no bias
    pub lm_head: Parameter,
}

impl GptModel {
    /// Allocate every parameter with GPT-2 initialization
    pub fn new<R: Rng + ?Sized>(config: GptConfig, rng: &mut R) -> Result<Self> {
        let d = config.emb_dim;
        let wte = Tensor::random_normal(&[config.vocab_size, d], INIT_STD, rng)?;
        let wpe = Tensor::random_normal(&[config.context_length, d], INIT_STD, rng)?;
        let blocks = (0..config.n_layers)
            .map(|_| Block::new(&config, rng))
            .collect::<Result<Vec<_>>>()?;
        let lm_head = Tensor::random_normal(&[config.vocab_size, d], INIT_STD, rng)?;
        Ok(Self {
            wte: Parameter::new(wte),
            wpe: Parameter::new(wpe),
            blocks,
            ln_f: LayerNorm::new(d)?,
            lm_head: Parameter::new(lm_head),
            config,
        })
    }

    pub fn config(&self) -> &GptConfig {
        &self.config
    }

    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn block_mut(&mut self, index: usize) -> Option<&mut Block> {
        self.blocks.get_mut(index)
    }

    /// Total number of scalar parameters
    pub fn parameter_count(&self) -> usize {
        self.named_parameters().iter().map(|(_, p)| p.numel()).sum()
    }

    /// Number of scalar parameters with `requires_grad` set
    pub fn trainable_parameter_count(&self) -> usize {
        self.named_parameters()
            .iter()
            .filter(|(_, p)| p.requires_grad)
            .map(|(_, p)| p.numel())
            .sum()
    }

    /// Disable gradients on every parameter
    pub fn freeze_all(&mut self) {
        for (_, param) in self.named_parameters_mut() {
            param.freeze();
        }
    }

    /// Snapshot of current values, in parameter order
    pub fn state_dict(&self) -> Result<StateDict> {
        let mut sd = StateDict::new();
        for (name, param) in self.named_parameters() {
            sd.insert(name, param.value.clone())?;
        }
        Ok(sd)
    }
}

impl ParameterStore for GptModel {
    fn named_parameters(&self) -> Vec<(String, &Parameter)> {
        let mut out = vec![
            ("transformer.wte.weight".to_string(), &self.wte),
            ("transformer.wpe.weight".to_string(), &self.wpe),
        ];
        for (i, block) in self.blocks.iter().enumerate() {
            block.named_parameters(&format!("transformer.h.{}", i), &mut out);
        }
        self.ln_f.named_parameters("transformer.ln_f", &mut out);
        out.push(("lm_head.weight".to_string(), &self.lm_head));
        out
    }

    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Parameter)> {
        let mut out = vec![
            ("transformer.wte.weight".to_string(), &mut self.wte),
            ("transformer.wpe.weight".to_string(), &mut self.wpe),
        ];
        for (i, block) in self.blocks.iter_mut().enumerate() {
            block.named_parameters_mut(&format!("transformer.h.{}", i), &mut out);
        }
        self.ln_f.named_parameters_mut("transformer.ln_f", &mut out);
        out.push(("lm_head.weight".to_string(), &mut self.lm_head));
        out
    }
}
