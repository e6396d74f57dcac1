//! gpt2-port: GPT-2 checkpoint port with low-rank adaptation
//!
//! Copies a GPT-2 checkpoint stored in the Conv1D (`in × out`) convention
//! into a model laid out in the Linear (`out × in`) convention, then
//! optionally wraps the attention projections with LoRA adapters so that
//! only the low-rank factors remain trainable.

pub mod config;
pub mod error;
pub mod lora;
pub mod model;
pub mod port;
pub mod pretrained;
pub mod tensor;

pub use config::{GptConfig, ModelType};
pub use error::{PortError, Result};
pub use lora::{apply_lora, LoraConfig, LoraLinear, LoraTarget, ProjectionKind};
pub use model::{GptModel, Linear, ParameterStore, Projection};
pub use port::{translate, unmatched_destination_names, PortSummary, TransposeRules};
pub use pretrained::{from_pretrained, synthetic_checkpoint, PretrainedOptions};
pub use tensor::{Parameter, StateDict, Tensor};
