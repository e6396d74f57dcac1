//! Transposition table for the GPT-2 Conv1D convention
//!
//! OpenAI's GPT-2 checkpoints store each linear sublayer as a Conv1D with an
//! `in × out` weight. The destination model uses `out × in`, so exactly these
//! four weights must be transposed on the way in.

/// Suffixes of the Conv1D weights: attention input, attention output,
/// feed-forward expansion, feed-forward projection
pub const GPT2_CONV1D_WEIGHTS: [&str; 4] = [
    "attn.c_attn.weight",
    "attn.c_proj.weight",
    "mlp.c_fc.weight",
    "mlp.c_proj.weight",
];

/// Closed suffix table deciding which parameters are copied transposed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransposeRules {
    suffixes: &'static [&'static str],
}

impl TransposeRules {
    /// Table for HuggingFace GPT-2 checkpoints
    pub const fn gpt2() -> Self {
        Self {
            suffixes: &GPT2_CONV1D_WEIGHTS,
        }
    }

    pub fn suffixes(&self) -> &'static [&'static str] {
        self.suffixes
    }

    pub fn requires_transpose(&self, name: &str) -> bool {
        self.suffixes.iter().any(|suffix| name.ends_with(suffix))
    }
}

impl Default for TransposeRules {
    fn default() -> Self {
        Self::gpt2()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpt2_table() {
        let rules = TransposeRules::gpt2();
        assert_eq!(rules.suffixes().len(), 4);
        assert!(rules.requires_transpose("transformer.h.0.attn.c_attn.weight"));
        assert!(rules.requires_transpose("transformer.h.11.attn.c_proj.weight"));
        assert!(rules.requires_transpose("transformer.h.3.mlp.c_fc.weight"));
        assert!(rules.requires_transpose("transformer.h.3.mlp.c_proj.weight"));
    }

    #[test]
    fn test_non_conv1d_names_copy_as_is() {
        let rules = TransposeRules::gpt2();
        for name in [
            "transformer.h.0.attn.c_attn.bias",
            "transformer.h.0.mlp.c_proj.bias",
            "transformer.wte.weight",
            "transformer.wpe.weight",
            "transformer.h.0.ln_1.weight",
            "lm_head.weight",
        ] {
            assert!(!rules.requires_transpose(name), "{}", name);
        }
    }
}
