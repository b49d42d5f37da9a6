//! Benchmarks for the sequencer and the retry controller.

use contentflow::cancellation::CancellationToken;
use contentflow::core::{ContentJob, ContentRequest, JobStatus, StageOutput};
use contentflow::errors::StageError;
use contentflow::pipeline::{ContentPipeline, PipelineBuilder};
use contentflow::retry::{Retrier, RetryPolicy};
use contentflow::stages::{FnStage, Stage};
use contentflow::store::InMemoryJobRepository;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::time::Duration;

fn stage(name: &str, status: JobStatus, output: StageOutput) -> Arc<dyn Stage> {
    Arc::new(FnStage::new(name, status, move |_job: &ContentJob| {
        Ok(output.clone())
    }))
}

fn pipeline() -> ContentPipeline {
    PipelineBuilder::new("bench")
        .stage(stage("research", JobStatus::Researching, StageOutput::empty()))
        .stage(stage("plan", JobStatus::Planning, StageOutput::empty()))
        .stage(stage("write", JobStatus::Writing, StageOutput::draft("draft")))
        .stage(stage("edit", JobStatus::Editing, StageOutput::content("content")))
        .build()
        .unwrap()
}

fn sequencer_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let pipeline = pipeline();
    let repository = InMemoryJobRepository::new();
    let token = CancellationToken::new();

    c.bench_function("four_stage_run", |b| {
        b.to_async(&runtime).iter(|| async {
            let job = ContentJob::new(ContentRequest::new("AI adoption"));
            black_box(pipeline.run(job, &repository, &token).await.unwrap())
        });
    });
}

fn retry_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let retrier = Retrier::new(
        RetryPolicy::new()
            .with_max_attempts(3)
            .with_initial_delay(Duration::ZERO)
            .with_jitter(false),
    );

    c.bench_function("retry_success_first_attempt", |b| {
        b.to_async(&runtime).iter(|| async {
            let outcome = retrier
                .run_if(|| async { Ok::<_, StageError>(42) }, StageError::is_retryable)
                .await
                .unwrap();
            black_box(outcome)
        });
    });
}

criterion_group!(benches, sequencer_benchmark, retry_benchmark);
criterion_main!(benches);
