//! Benchmarks for report aggregation and template expansion.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shipflow::context::Context;
use shipflow::core::{StageType, SubPhase};
use shipflow::report::Report;

fn populated_report(results_per_stage: usize) -> Report {
    let report = Report::new();
    report.start();
    for stage in StageType::ALL {
        for (index, result) in report
            .new_reports(stage, results_per_stage)
            .into_iter()
            .enumerate()
        {
            result.add_log(format!("{stage} step {index}"));
            result.set_progress(0.5);
        }
    }
    report.finish();
    report
}

fn report_benchmark(c: &mut Criterion) {
    let report = populated_report(32);

    c.bench_function("report_progress", |b| {
        b.iter(|| black_box(report.progress(black_box(StageType::Upload), SubPhase::Intra)));
    });

    c.bench_function("report_render", |b| {
        b.iter(|| black_box(report.render(false)));
    });
}

fn context_benchmark(c: &mut Criterion) {
    let parent = std::sync::Arc::new(Context::new());
    parent.bind_value("TASK_NAME", "game");
    parent.bind_value("VERSION", "1.0.3");
    let ctx = Context::new();
    ctx.bind_value("CONFIG_NAME", "windows");
    ctx.set_parent(parent);
    ctx.cache_callbacks();

    c.bench_function("context_expand", |b| {
        b.iter(|| black_box(ctx.expand(black_box("$TASK_NAME-$VERSION-$CONFIG_NAME.zip"))));
    });
}

criterion_group!(benches, report_benchmark, context_benchmark);
criterion_main!(benches);
