//! Benchmarks for pipeline execution.

use brickflow::bricks::builtin::IdentityBrick;
use brickflow::bricks::BrickRegistry;
use brickflow::context::{BrickArgsContext, OutputKey};
use brickflow::pipeline::{BrickConfig, Pipeline, PipelineRuntime, RunOptions};
use brickflow::template::{render_args, ApiVersion, Expression};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::sync::Arc;

fn identity_pipeline(len: usize) -> Pipeline {
    let steps = (0..len)
        .map(|i| {
            let previous = if i == 0 {
                Expression::var("@input.seed")
            } else {
                Expression::var(format!("@step{}.value", i - 1))
            };
            BrickConfig::new(IdentityBrick::ID)
                .with_config(json!({"value": previous, "index": i}))
                .with_output_key(OutputKey::new(format!("step{i}")).expect("valid output key"))
        })
        .collect();
    Pipeline::new(steps).expect("valid pipeline")
}

fn pipeline_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime");
    let registry = Arc::new(BrickRegistry::new());
    registry.register(Arc::new(IdentityBrick));
    let runtime = PipelineRuntime::new(registry);

    let mut group = c.benchmark_group("run_pipeline");
    for len in [1, 10, 50] {
        let pipeline = identity_pipeline(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &pipeline, |b, pipeline| {
            b.iter(|| {
                rt.block_on(async {
                    let options = RunOptions::default();
                    let ctxt = BrickArgsContext::with_input(json!({"seed": 42}));
                    black_box(runtime.run_pipeline(pipeline, ctxt, &options).await)
                })
            });
        });
    }
    group.finish();
}

fn render_benchmark(c: &mut Criterion) {
    let ctxt = BrickArgsContext::with_input(json!({"user": {"name": "Ada", "tags": ["a", "b"]}}));
    let args = json!({
        "greeting": Expression::mustache("Hello {{ @input.user.name | upper }}"),
        "first": Expression::var("@input.user.tags[0]"),
        "nested": {"list": [Expression::var("@input.user.name"), "literal"]},
    });

    c.bench_function("render_args_v3", |b| {
        b.iter(|| black_box(render_args(black_box(&args), &ctxt, ApiVersion::V3)));
    });
}

criterion_group!(benches, pipeline_benchmark, render_benchmark);
criterion_main!(benches);
