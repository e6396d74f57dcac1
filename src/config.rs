//! GPT-2 model configuration
//!
//! Four size presets share the same vocabulary, context length, dropout rates
//! and QKV bias flag. Callers may override any field through a JSON object;
//! their values win over the preset.

use crate::error::{PortError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Supported GPT-2 checkpoint sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelType {
    /// 124M parameters
    Gpt2,
    /// 355M parameters
    Gpt2Medium,
    /// 774M parameters
    Gpt2Large,
    /// 1.5B parameters
    Gpt2Xl,
}

impl ModelType {
    pub const ALL: [ModelType; 4] = [
        ModelType::Gpt2,
        ModelType::Gpt2Medium,
        ModelType::Gpt2Large,
        ModelType::Gpt2Xl,
    ];

    /// Checkpoint identifier, e.g. "gpt2-medium"
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Gpt2 => "gpt2",
            ModelType::Gpt2Medium => "gpt2-medium",
            ModelType::Gpt2Large => "gpt2-large",
            ModelType::Gpt2Xl => "gpt2-xl",
        }
    }

    /// (emb_dim, n_layers, n_heads)
    fn dims(&self) -> (usize, usize, usize) {
        match self {
            ModelType::Gpt2 => (768, 12, 12),
            ModelType::Gpt2Medium => (1024, 24, 16),
            ModelType::Gpt2Large => (1280, 36, 20),
            ModelType::Gpt2Xl => (1600, 48, 25),
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self> {
        ModelType::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| PortError::UnknownModelType(s.to_string()))
    }
}

/// Hyperparameters that fix the destination model's parameter layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GptConfig {
    /// Embedding (hidden) dimension
    pub emb_dim: usize,
    /// Number of transformer blocks
    pub n_layers: usize,
    /// Number of attention heads
    pub n_heads: usize,
    /// 50,000 BPE merges + 256 byte tokens + <|endoftext|>
    pub vocab_size: usize,
    /// Maximum sequence length
    pub context_length: usize,
    /// Attention dropout probability
    pub attn_pdrop: f64,
    /// Embedding dropout probability
    pub embd_pdrop: f64,
    /// Residual dropout probability
    pub resid_pdrop: f64,
    /// Whether the fused QKV projection carries a bias
    pub qkv_bias: bool,
}

impl GptConfig {
    /// Preset configuration for a model type
    pub fn preset(model_type: ModelType) -> Self {
        let (emb_dim, n_layers, n_heads) = model_type.dims();
        Self {
            emb_dim,
            n_layers,
            n_heads,
            vocab_size: 50257,
            context_length: 1024,
            attn_pdrop: 0.1,
            embd_pdrop: 0.1,
            resid_pdrop: 0.1,
            qkv_bias: true,
        }
    }

    /// Preset merged with user overrides, then validated
    pub fn for_model(model_type: ModelType, overrides: Option<&Map<String, Value>>) -> Result<Self> {
        let config = Self::preset(model_type);
        let config = match overrides {
            Some(overrides) => config.merged(overrides)?,
            None => config,
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides key by key; unknown keys are rejected
    pub fn merged(&self, overrides: &Map<String, Value>) -> Result<Self> {
        let mut fields = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            other => {
                return Err(PortError::Config(format!(
                    "config serialized to non-object: {}",
                    other
                )))
            }
        };
        for (key, value) in overrides {
            if !fields.contains_key(key) {
                return Err(PortError::Config(format!("unknown config key '{}'", key)));
            }
            fields.insert(key.clone(), value.clone());
        }
        Ok(serde_json::from_value(Value::Object(fields))?)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("emb_dim", self.emb_dim),
            ("n_layers", self.n_layers),
            ("n_heads", self.n_heads),
            ("vocab_size", self.vocab_size),
            ("context_length", self.context_length),
        ] {
            if value == 0 {
                return Err(PortError::Config(format!("{} must be at least 1", name)));
            }
        }
        if self.emb_dim % self.n_heads != 0 {
            return Err(PortError::Config(format!(
                "emb_dim ({}) must be divisible by n_heads ({})",
                self.emb_dim, self.n_heads
            )));
        }
        for (name, p) in [
            ("attn_pdrop", self.attn_pdrop),
            ("embd_pdrop", self.embd_pdrop),
            ("resid_pdrop", self.resid_pdrop),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(PortError::Config(format!("{} must be in [0, 1], got {}", name, p)));
            }
        }
        Ok(())
    }

    pub fn head_dim(&self) -> usize {
        self.emb_dim / self.n_heads
    }

    /// Feed-forward hidden width (4 × emb_dim)
    pub fn ffn_dim(&self) -> usize {
        4 * self.emb_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn overrides(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_presets() {
        let small = GptConfig::preset(ModelType::Gpt2);
        assert_eq!((small.emb_dim, small.n_layers, small.n_heads), (768, 12, 12));
        assert_eq!(small.vocab_size, 50257);
        assert_eq!(small.context_length, 1024);
        assert!(small.qkv_bias);

        let xl = GptConfig::preset(ModelType::Gpt2Xl);
        assert_eq!((xl.emb_dim, xl.n_layers, xl.n_heads), (1600, 48, 25));
        assert_eq!(xl.head_dim(), 64);

        for model_type in ModelType::ALL {
            GptConfig::preset(model_type).validate().unwrap();
        }
    }

    #[test]
    fn test_model_type_round_trip_through_str() {
        for model_type in ModelType::ALL {
            assert_eq!(model_type.as_str().parse::<ModelType>().unwrap(), model_type);
        }
        assert!(matches!(
            "gpt3".parse::<ModelType>(),
            Err(PortError::UnknownModelType(_))
        ));
    }

    #[test]
    fn test_overrides_win() {
        let o = overrides(json!({ "n_layers": 2, "qkv_bias": false, "attn_pdrop": 0.0 }));
        let config = GptConfig::for_model(ModelType::Gpt2Medium, Some(&o)).unwrap();
        assert_eq!(config.n_layers, 2);
        assert!(!config.qkv_bias);
        assert_eq!(config.attn_pdrop, 0.0);
        assert_eq!(config.emb_dim, 1024);
    }

    #[test]
    fn test_unknown_override_key_rejected() {
        let o = overrides(json!({ "hidden_size": 16 }));
        let err = GptConfig::for_model(ModelType::Gpt2, Some(&o)).unwrap_err();
        assert!(matches!(err, PortError::Config(_)));
    }

    #[test]
    fn test_bad_override_type_rejected() {
        let o = overrides(json!({ "n_layers": "two" }));
        let err = GptConfig::for_model(ModelType::Gpt2, Some(&o)).unwrap_err();
        assert!(matches!(err, PortError::Json(_)));
    }

    #[test]
    fn test_validation() {
        let o = overrides(json!({ "emb_dim": 100 }));
        assert!(GptConfig::for_model(ModelType::Gpt2, Some(&o)).is_err());

        let o = overrides(json!({ "n_layers": 0 }));
        assert!(GptConfig::for_model(ModelType::Gpt2, Some(&o)).is_err());

        let o = overrides(json!({ "resid_pdrop": 1.5 }));
        assert!(GptConfig::for_model(ModelType::Gpt2, Some(&o)).is_err());
    }
}
