//! LoRA: low-rank adaptation of frozen linear layers
//!
//! `LoraLinear` wraps a single layer; `apply_lora` freezes a whole model and
//! wraps its selected attention projections in place.

mod adapter;
mod apply;

pub use adapter::{validate_rank, LoraConfig, LoraLinear};
pub use apply::{apply_lora, LoraTarget, ProjectionKind};
