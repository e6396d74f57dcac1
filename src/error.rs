//! Errors raised while building, porting, or adapting a model
//!
//! Every variant is fatal to the current construction attempt. A model that
//! produced one of these mid-way must be discarded and rebuilt.

/// Port and adapter errors
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Parameter '{name}' not found in destination model")]
    NameNotFound { name: String },

    #[error("Shape mismatch for parameter '{name}': {source_shape:?} (source) vs {destination_shape:?} (destination)")]
    ShapeMismatch {
        name: String,
        source_shape: Vec<usize>,
        destination_shape: Vec<usize>,
    },

    #[error("Invalid LoRA rank {rank}: rank must be at least 1")]
    InvalidRank { rank: usize },

    #[error("LoRA target not found in model: {target}")]
    TargetNotFound { target: String },

    #[error("LoRA target already adapted: {target}")]
    AlreadyAdapted { target: String },

    #[error("Duplicate parameter name: {name}")]
    DuplicateParameter { name: String },

    #[error("Unknown model type: {0}")]
    UnknownModelType(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid tensor shape: {0}")]
    InvalidShape(String),
}

pub type Result<T> = std::result::Result<T, PortError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message_names_both_shapes() {
        let err = PortError::ShapeMismatch {
            name: "transformer.wte.weight".into(),
            source_shape: vec![50257, 768],
            destination_shape: vec![50257, 1024],
        };
        let msg = err.to_string();
        assert!(msg.contains("transformer.wte.weight"));
        assert!(msg.contains("[50257, 768]"));
        assert!(msg.contains("[50257, 1024]"));
    }

    #[test]
    fn test_invalid_rank_message_carries_value() {
        let err = PortError::InvalidRank { rank: 0 };
        assert!(err.to_string().contains('0'));
    }
}
