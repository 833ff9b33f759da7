use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::sync::Arc;
use weft_engine::expr::{Compute, Literal};
use weft_engine::{Controller, Executable, Instruction, Template, WithParam};
use weft_model::node::mock::{MockNode, MockTreeBuilder};
use weft_model::{NamePattern, NullReceiver, Sequence};

/// A self-recursive countdown template invoked in tail position; the drain
/// loop keeps native stack depth constant however deep it goes.
fn countdown_executable(depth: i64) -> Executable<MockNode> {
    let mut builder = Executable::builder();
    builder.named_template(
        Template::builder()
            .named("countdown")
            .param("n", true)
            .body(Instruction::If {
                test: Compute::new("$n > 0", |ctx| {
                    Ok(Sequence::boolean(
                        ctx.local(0).as_integer().unwrap_or(0) > 0,
                    ))
                }),
                then: Box::new(Instruction::CallTemplate {
                    name: "countdown".into(),
                    params: vec![WithParam::new(
                        "n",
                        Compute::new("$n - 1", |ctx| {
                            Ok(Sequence::integer(ctx.local(0).as_integer().unwrap_or(0) - 1))
                        }),
                    )],
                }),
            })
            .build(),
    );
    builder.rule(
        None,
        Arc::new(NamePattern::element("doc")),
        1,
        None,
        Template::builder()
            .body(Instruction::CallTemplate {
                name: "countdown".into(),
                params: vec![WithParam::new("n", Arc::new(Literal::integer(depth)))],
            })
            .build(),
    );
    builder.build().expect("build")
}

fn bench_tail_recursion(c: &mut Criterion) {
    let mut group = c.benchmark_group("tail_recursion");
    for depth in [1_000i64, 10_000, 100_000] {
        let executable = countdown_executable(depth);
        let root = MockTreeBuilder::new()
            .start_element("doc")
            .end_element()
            .build()
            .root();
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                let mut out = NullReceiver;
                Controller::new(&executable)
                    .transform(root.clone(), &mut out)
                    .expect("transform");
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tail_recursion);
criterion_main!(benches);
