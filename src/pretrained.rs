//! Model construction from a pretrained GPT-2 checkpoint
//!
//! Builds the configured model, ports the checkpoint into it, and optionally
//! attaches LoRA adapters to every attention projection.

use crate::config::{GptConfig, ModelType};
use crate::error::Result;
use crate::lora::{apply_lora, LoraConfig, LoraTarget};
use crate::model::{GptModel, ParameterStore};
use crate::port::{translate, unmatched_destination_names, TransposeRules};
use crate::tensor::StateDict;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value};

/// Options for [`from_pretrained`]
#[derive(Debug, Clone)]
pub struct PretrainedOptions {
    pub model_type: ModelType,
    /// Config fields to override on top of the preset
    pub overrides: Option<Map<String, Value>>,
    pub use_lora: bool,
    pub lora_rank: usize,
    pub lora_alpha: f32,
    /// Seed for parameter and adapter init; entropy when unset
    pub seed: Option<u64>,
    /// Log the final configuration
    pub verbose: bool,
}

impl PretrainedOptions {
    pub fn new(model_type: ModelType) -> Self {
        let lora = LoraConfig::default();
        Self {
            model_type,
            overrides: None,
            use_lora: false,
            lora_rank: lora.rank,
            lora_alpha: lora.alpha,
            seed: None,
            verbose: false,
        }
    }

    pub fn with_overrides(mut self, overrides: Map<String, Value>) -> Self {
        self.overrides = Some(overrides);
        self
    }

    pub fn with_lora(mut self, rank: usize, alpha: f32) -> Self {
        self.use_lora = true;
        self.lora_rank = rank;
        self.lora_alpha = alpha;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn config(&self) -> Result<GptConfig> {
        GptConfig::for_model(self.model_type, self.overrides.as_ref())
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

/// Build a model of `options.model_type` and load `source` into it.
///
/// Any error leaves nothing usable behind; call again from scratch.
pub fn from_pretrained(source: &StateDict, options: &PretrainedOptions) -> Result<GptModel> {
    let config = options.config()?;
    if options.verbose {
        info!("Configuration: {:?}", config);
    }

    let mut rng = options.rng();
    let mut model = GptModel::new(config, &mut rng)?;
    info!(
        "Initialized {} with {:.2} M parameters.",
        options.model_type,
        model.parameter_count() as f64 / 1e6
    );

    translate(source, &mut model, &TransposeRules::gpt2())?;
    let unmatched = unmatched_destination_names(source, &model);
    if !unmatched.is_empty() {
        warn!(
            "{} destination parameters not in checkpoint, left at init: {:?}",
            unmatched.len(),
            unmatched
        );
    }
    info!("Loaded weights from {} checkpoint successfully", options.model_type);

    if options.use_lora {
        let targets = LoraTarget::attention(model.config().n_layers);
        apply_lora(&mut model, &targets, options.lora_rank, options.lora_alpha, &mut rng)?;
    }
    Ok(model)
}

/// Random checkpoint in the source (Conv1D) layout for `config`.
///
/// Names and order match a HuggingFace `GPT2LMHeadModel` state dict.
pub fn synthetic_checkpoint<R: Rng + ?Sized>(config: &GptConfig, rng: &mut R) -> Result<StateDict> {
    let reference = GptModel::new(config.clone(), rng)?;
    let rules = TransposeRules::gpt2();
    let mut sd = StateDict::new();
    for (name, param) in reference.named_parameters() {
        let tensor = if rules.requires_transpose(&name) {
            param.value.transpose()
        } else {
            param.value.clone()
        };
        sd.insert(name, tensor)?;
    }
    Ok(sd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PortError;
    use serde_json::json;

    fn small_overrides() -> Map<String, Value> {
        match json!({
            "emb_dim": 24,
            "n_layers": 2,
            "vocab_size": 30,
            "context_length": 12
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn small_options() -> PretrainedOptions {
        PretrainedOptions::new(ModelType::Gpt2)
            .with_overrides(small_overrides())
            .with_seed(11)
    }

    #[test]
    fn test_defaults() {
        let options = PretrainedOptions::new(ModelType::Gpt2Large);
        assert!(!options.use_lora);
        assert_eq!(options.lora_rank, 16);
        assert_eq!(options.lora_alpha, 16.0);
        assert_eq!(options.config().unwrap().emb_dim, 1280);
    }

    #[test]
    fn test_synthetic_checkpoint_uses_conv1d_layout() {
        let config = small_options().config().unwrap();
        let sd = synthetic_checkpoint(&config, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(sd.get("transformer.h.0.attn.c_attn.weight").unwrap().shape(), &[24, 72]);
        assert_eq!(sd.get("transformer.h.0.mlp.c_proj.weight").unwrap().shape(), &[96, 24]);
        assert_eq!(sd.get("transformer.wte.weight").unwrap().shape(), &[30, 24]);
        assert_eq!(sd.names().next(), Some("transformer.wte.weight"));
    }

    #[test]
    fn test_from_pretrained_ports_values() {
        let options = small_options();
        let config = options.config().unwrap();
        let source = synthetic_checkpoint(&config, &mut StdRng::seed_from_u64(3)).unwrap();

        let model = from_pretrained(&source, &options).unwrap();
        assert_eq!(model.config(), &config);
        assert_eq!(model.trainable_parameter_count(), model.parameter_count());

        let rules = TransposeRules::gpt2();
        for (name, param) in model.named_parameters() {
            let src = source.get(&name).unwrap();
            let diff = if rules.requires_transpose(&name) {
                param.value.max_abs_diff(&src.transpose())
            } else {
                param.value.max_abs_diff(src)
            };
            assert_eq!(diff, Some(0.0), "{}", name);
        }
    }

    #[test]
    fn test_from_pretrained_with_lora() {
        let options = small_options().with_lora(4, 8.0);
        let config = options.config().unwrap();
        let source = synthetic_checkpoint(&config, &mut StdRng::seed_from_u64(3)).unwrap();

        let model = from_pretrained(&source, &options).unwrap();
        let d = config.emb_dim;
        let per_block = (d * 4 + 4 * 3 * d) + (d * 4 + 4 * d);
        assert_eq!(model.trainable_parameter_count(), config.n_layers * per_block);

        let lora = model.block(1).unwrap().attn.c_proj.as_lora().unwrap();
        assert_eq!(lora.rank(), 4);
        assert_eq!(lora.scale(), 2.0);
        // Ported weight survives inside the wrapper
        let ported = source.get("transformer.h.1.attn.c_proj.weight").unwrap().transpose();
        assert_eq!(lora.linear().weight.value, ported);
    }

    #[test]
    fn test_from_pretrained_rejects_mismatched_checkpoint() {
        let source = synthetic_checkpoint(
            &small_options().config().unwrap(),
            &mut StdRng::seed_from_u64(3),
        )
        .unwrap();
        // Same layout but a wider model
        let mut wider = small_overrides();
        wider.insert("emb_dim".into(), json!(36));
        let options = PretrainedOptions::new(ModelType::Gpt2).with_overrides(wider);

        let err = from_pretrained(&source, &options).unwrap_err();
        match err {
            PortError::ShapeMismatch { name, .. } => assert_eq!(name, "transformer.wte.weight"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_from_pretrained_rejects_deeper_checkpoint() {
        let mut deeper = small_overrides();
        deeper.insert("n_layers".into(), json!(3));
        let deeper_config = GptConfig::for_model(ModelType::Gpt2, Some(&deeper)).unwrap();
        let source = synthetic_checkpoint(&deeper_config, &mut StdRng::seed_from_u64(3)).unwrap();

        let err = from_pretrained(&source, &small_options()).unwrap_err();
        match err {
            PortError::NameNotFound { name } => assert_eq!(name, "transformer.h.2.ln_1.weight"),
            other => panic!("unexpected error: {}", other),
        }
    }
}
