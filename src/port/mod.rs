//! Checkpoint port: copy a Conv1D-layout GPT-2 checkpoint into the model

mod rules;
mod translate;

pub use rules::{TransposeRules, GPT2_CONV1D_WEIGHTS};
pub use translate::{translate, unmatched_destination_names, PortSummary};
