//! Batch LoRA application over a GPT-2 model
//!
//! Freezes the whole model, then swaps each selected attention projection
//! for its wrapped form. Afterwards the only trainable parameters are the
//! A/B factors that were just attached.

use super::adapter::{validate_rank, LoraLinear};
use crate::error::{PortError, Result};
use crate::model::{GptModel, Projection};
use log::{debug, info};
use rand::Rng;
use std::fmt;

/// Which attention projection of a block to adapt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectionKind {
    /// `attn.c_attn` (fused QKV input projection)
    AttnInput,
    /// `attn.c_proj` (attention output projection)
    AttnOutput,
}

impl ProjectionKind {
    pub fn module_name(&self) -> &'static str {
        match self {
            ProjectionKind::AttnInput => "attn.c_attn",
            ProjectionKind::AttnOutput => "attn.c_proj",
        }
    }
}

/// A single projection slot selected for adaptation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoraTarget {
    pub block: usize,
    pub kind: ProjectionKind,
}

impl LoraTarget {
    pub fn new(block: usize, kind: ProjectionKind) -> Self {
        Self { block, kind }
    }

    /// Input then output projection of every block, in block order
    pub fn attention(n_layers: usize) -> Vec<Self> {
        (0..n_layers)
            .flat_map(|block| {
                [
                    Self::new(block, ProjectionKind::AttnInput),
                    Self::new(block, ProjectionKind::AttnOutput),
                ]
            })
            .collect()
    }

    /// Parameter-name prefix of the selected slot
    pub fn path(&self) -> String {
        format!("transformer.h.{}.{}", self.block, self.kind.module_name())
    }
}

impl fmt::Display for LoraTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Freeze every parameter of `model`, then wrap each target in order.
///
/// Stops at the first missing or already adapted target; targets before it
/// stay wrapped and the model should be discarded.
pub fn apply_lora<R: Rng + ?Sized>(
    model: &mut GptModel,
    targets: &[LoraTarget],
    rank: usize,
    alpha: f32,
    rng: &mut R,
) -> Result<()> {
    validate_rank(rank)?;
    model.freeze_all();

    for target in targets {
        let block = model
            .block_mut(target.block)
            .ok_or_else(|| PortError::TargetNotFound { target: target.path() })?;
        let slot = match target.kind {
            ProjectionKind::AttnInput => &mut block.attn.c_attn,
            ProjectionKind::AttnOutput => &mut block.attn.c_proj,
        };
        let original = match &mut *slot {
            Projection::Plain(linear) => std::mem::take(linear),
            Projection::LowRank(_) => {
                return Err(PortError::AlreadyAdapted { target: target.path() })
            }
        };
        let wrapped = LoraLinear::wrap(original, rank, alpha, rng)?;
        debug!("Wrapped {}: {}", target, wrapped.summary());
        *slot = Projection::LowRank(Box::new(wrapped));
    }

    info!(
        "LoRA added. Total trainable params: {:.2} M parameters.",
        model.trainable_parameter_count() as f64 / 1e6
    );
    Ok(())
}
