use criterion::{criterion_group, criterion_main, Criterion};
use gpt2_port::{
    apply_lora, synthetic_checkpoint, translate, GptConfig, GptModel, Linear, LoraLinear, LoraTarget,
    ModelType, Tensor, TransposeRules,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn bench_config() -> GptConfig {
    GptConfig {
        emb_dim: 128,
        n_layers: 4,
        n_heads: 4,
        vocab_size: 1000,
        context_length: 128,
        ..GptConfig::preset(ModelType::Gpt2)
    }
}

fn bench_port(c: &mut Criterion) {
    let config = bench_config();
    let mut rng = StdRng::seed_from_u64(0);
    let checkpoint = synthetic_checkpoint(&config, &mut rng).unwrap();
    let mut model = GptModel::new(config.clone(), &mut rng).unwrap();
    let rules = TransposeRules::gpt2();

    c.bench_function("translate_128d_4layers", |b| {
        b.iter(|| translate(&checkpoint, &mut model, &rules).unwrap())
    });

    c.bench_function("apply_lora_128d_4layers_rank8", |b| {
        b.iter(|| {
            let mut fresh = model.clone();
            apply_lora(&mut fresh, &LoraTarget::attention(4), 8, 16.0, &mut rng).unwrap();
            fresh
        })
    });
}

fn bench_forward(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(1);
    let plain = Linear::new(768, 768, true, &mut rng).unwrap();
    let wrapped = LoraLinear::wrap(plain.clone(), 16, 16.0, &mut rng).unwrap();
    let x = Tensor::random_normal(&[8, 768], 1.0, &mut rng).unwrap();

    c.bench_function("linear_forward_768_batch8", |b| {
        b.iter(|| plain.forward(x.matrix()).unwrap())
    });

    c.bench_function("lora_forward_768_rank16_batch8", |b| {
        b.iter(|| wrapped.forward(x.matrix()).unwrap())
    });
}

criterion_group!(benches, bench_port, bench_forward);
criterion_main!(benches);
