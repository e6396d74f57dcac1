//! gpt2-port CLI: port a GPT-2 checkpoint and attach LoRA adapters
//!
//! Commands:
//!   gpt2-port presets : list model size presets
//!   gpt2-port port    : port a synthetic checkpoint, optionally with LoRA
//!
//! Checkpoint files are not read here; `port` builds a random checkpoint in
//! the GPT-2 Conv1D layout and runs it through the same path a real one takes.

use gpt2_port::{
    from_pretrained, synthetic_checkpoint, GptConfig, ModelType, PretrainedOptions, Projection,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Map, Value};
use std::env;
use std::process;

fn print_usage() {
    println!(
        r#"
╔══════════════════════════════════════════════════════════════╗
║        gpt2-port: GPT-2 checkpoint port + LoRA               ║
╚══════════════════════════════════════════════════════════════╝

Usage: gpt2-port <command> [options]

Commands:
  presets                                               List model size presets
  port <model-type> [--layers N] [--lora RANK ALPHA]    Port a synthetic checkpoint
       [--config JSON] [--seed S] [--verbose]
  help                                                  Show this message

Model types: gpt2, gpt2-medium, gpt2-large, gpt2-xl

Examples:
  gpt2-port presets
  gpt2-port port gpt2 --layers 2
  gpt2-port port gpt2-medium --layers 4 --lora 16 16
  gpt2-port port gpt2 --config '{{"n_layers": 2, "qkv_bias": false}}'
"#
    );
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        return;
    }

    let outcome = match args[1].as_str() {
        "presets" => {
            cmd_presets();
            Ok(())
        }
        "port" => cmd_port(&args[2..]),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => Err(format!("Unknown command: {}", other)),
    };

    if let Err(e) = outcome {
        eprintln!("  Error: {}", e);
        process::exit(1);
    }
}

fn cmd_presets() {
    println!("\n  {:<12} {:>8} {:>8} {:>8} {:>10}", "model", "emb_dim", "layers", "heads", "vocab");
    println!("  {}", "-".repeat(50));
    for model_type in ModelType::ALL {
        let c = GptConfig::preset(model_type);
        println!(
            "  {:<12} {:>8} {:>8} {:>8} {:>10}",
            model_type.as_str(),
            c.emb_dim,
            c.n_layers,
            c.n_heads,
            c.vocab_size
        );
    }
}

/// Parsed `port` arguments
struct PortArgs {
    model_type: ModelType,
    layers: Option<usize>,
    lora: Option<(usize, f32)>,
    overrides: Map<String, Value>,
    seed: u64,
    verbose: bool,
}

fn parse_port_args(args: &[String]) -> Result<PortArgs, String> {
    let model_type = args
        .first()
        .ok_or("Usage: gpt2-port port <model-type> [--layers N] [--lora RANK ALPHA]")?
        .parse::<ModelType>()
        .map_err(|e| e.to_string())?;

    let mut parsed = PortArgs {
        model_type,
        layers: None,
        lora: None,
        overrides: Map::new(),
        seed: 0,
        verbose: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--layers" => {
                parsed.layers = Some(parse_value(args.get(i + 1), "--layers")?);
                i += 2;
            }
            "--lora" => {
                let rank = parse_value(args.get(i + 1), "--lora RANK")?;
                let alpha = parse_value(args.get(i + 2), "--lora ALPHA")?;
                parsed.lora = Some((rank, alpha));
                i += 3;
            }
            "--config" => {
                let text = args.get(i + 1).ok_or("--config needs a JSON object")?;
                parsed.overrides.extend(overrides_from_json(text)?);
                i += 2;
            }
            "--seed" => {
                parsed.seed = parse_value(args.get(i + 1), "--seed")?;
                i += 2;
            }
            "--verbose" => {
                parsed.verbose = true;
                i += 1;
            }
            other => return Err(format!("Unknown option: {}", other)),
        }
    }
    Ok(parsed)
}

fn parse_value<T: std::str::FromStr>(arg: Option<&String>, what: &str) -> Result<T, String> {
    let raw = arg.ok_or_else(|| format!("{} needs a value", what))?;
    raw.parse()
        .map_err(|_| format!("{} must be a number, got '{}'", what, raw))
}

fn cmd_port(args: &[String]) -> Result<(), String> {
    let parsed = parse_port_args(args)?;

    let mut options = PretrainedOptions::new(parsed.model_type)
        .with_seed(parsed.seed)
        .verbose(parsed.verbose);
    let mut overrides = parsed.overrides;
    if let Some(layers) = parsed.layers {
        overrides.insert("n_layers".to_string(), json!(layers));
    }
    if !overrides.is_empty() {
        options = options.with_overrides(overrides);
    }
    if let Some((rank, alpha)) = parsed.lora {
        options = options.with_lora(rank, alpha);
    }

    let config = options.config().map_err(|e| e.to_string())?;
    println!("\n  Building synthetic {} checkpoint ({} layers)...", parsed.model_type, config.n_layers);
    let mut rng = StdRng::seed_from_u64(parsed.seed.wrapping_add(1));
    let checkpoint = synthetic_checkpoint(&config, &mut rng).map_err(|e| e.to_string())?;
    println!("  Checkpoint: {} tensors, {} values", checkpoint.len(), checkpoint.numel());

    let model = from_pretrained(&checkpoint, &options).map_err(|e| e.to_string())?;
    let total = model.parameter_count();
    let trainable = model.trainable_parameter_count();

    println!("\n  Ported model:");
    println!("  {}", "-".repeat(60));
    println!("  Parameters:  {:>14} ({:.2} M)", total, total as f64 / 1e6);
    println!(
        "  Trainable:   {:>14} ({:.3}%)",
        trainable,
        100.0 * trainable as f64 / total.max(1) as f64
    );
    for (i, block) in model.blocks.iter().enumerate() {
        for (name, slot) in [("attn.c_attn", &block.attn.c_attn), ("attn.c_proj", &block.attn.c_proj)] {
            if let Projection::LowRank(lora) = slot {
                println!("  h.{}.{:<12} {}", i, name, lora.summary());
            }
        }
    }
    let state = model.state_dict().map_err(|e| e.to_string())?;
    println!("  Fingerprint: {}", state.fingerprint());
    Ok(())
}

fn overrides_from_json(text: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(text).map_err(|e| e.to_string())? {
        Value::Object(map) => Ok(map),
        _ => Err("--config must be a JSON object".to_string()),
    }
}
