use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use futures_util::FutureExt;
use serde_json::{Value, json};
use workflow::step::from_fn;
use workflow::{
    Container, InMemoryJournal, RunOptions, Step, StepError, StepResponse, Workflow, WorkflowData,
    WorkflowEngine,
};

fn passthrough(name: &'static str) -> impl Step {
    from_fn(name, |v: Value, _ctx| {
        async move { Ok(StepResponse::compensate_with_output(v)) }.boxed()
    })
}

fn failing(name: &'static str) -> impl Step {
    from_fn(name, |_v: Value, _ctx| {
        async move { Err::<StepResponse<Value, Value>, _>(StepError::Service("down".into())) }
            .boxed()
    })
}

fn linear_workflow(steps: usize) -> Workflow<Value, Value> {
    let mut builder = Workflow::builder("bench-linear");
    for i in 0..steps {
        builder = builder.step(format!("s{i}"), passthrough("passthrough"));
    }
    builder.build().unwrap()
}

fn bench_run_ten_steps(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let wf = linear_workflow(10);
    let container = Arc::new(Container::new());

    c.bench_function("engine/run_10_steps", |b| {
        b.iter(|| {
            rt.block_on(async {
                wf.run(json!({ "id": 1 }), RunOptions::new(container.clone()))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_run_with_transforms(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let wf = Workflow::<Value, Value>::builder("bench-transforms")
        .step("a", passthrough("a"))
        .transform("shaped", &["input", "a"], |data: &WorkflowData| {
            let a: Value = data.get("a")?;
            Ok(json!({ "wrapped": a }))
        })
        .step("b", passthrough("b"))
        .build()
        .unwrap();
    let container = Arc::new(Container::new());

    c.bench_function("engine/run_with_transform", |b| {
        b.iter(|| {
            rt.block_on(async {
                wf.run(json!([1, 2, 3]), RunOptions::new(container.clone()))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_compensation_sweep(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut builder = Workflow::<Value, Value>::builder("bench-sweep");
    for i in 0..10 {
        builder = builder.step(format!("s{i}"), passthrough("passthrough"));
    }
    let wf = builder.step("fail", failing("fail")).build().unwrap();
    let container = Arc::new(Container::new());

    c.bench_function("engine/compensate_10_steps", |b| {
        b.iter(|| {
            rt.block_on(async {
                wf.run(json!(null), RunOptions::new(container.clone()))
                    .await
                    .unwrap_err();
            });
        });
    });
}

fn bench_journaled_run(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let wf = linear_workflow(5);
    let container = Arc::new(Container::new());

    c.bench_function("engine/journaled_run_5_steps", |b| {
        b.iter(|| {
            rt.block_on(async {
                let engine = WorkflowEngine::with_journal(Arc::new(InMemoryJournal::new()));
                engine
                    .run(&wf, json!({}), RunOptions::new(container.clone()))
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_run_ten_steps,
    bench_run_with_transforms,
    bench_compensation_sweep,
    bench_journaled_run,
);
criterion_main!(benches);
