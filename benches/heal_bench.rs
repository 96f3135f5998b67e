use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion, SamplingMode};

use jsonheal::{Healer, Options};

fn truncated_doc(items: usize) -> String {
    let mut doc = String::from("Here is the result you asked for: {\"items\":[");
    for i in 0..items {
        doc.push_str(&format!(
            "{{\"id\":{i},\"name\":\"item-{i}\",\"tags\":[\"a\",\"b\"]}},"
        ));
    }
    doc.push_str(&format!("{{\"id\":{items},\"name\":\"item-{items}"));
    doc
}

fn bench_heal(c: &mut Criterion) {
    let mut group = c.benchmark_group("heal");
    group.sampling_mode(SamplingMode::Flat);
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(2));

    let doc = truncated_doc(500);
    let schema = Arc::new(serde_json::json!({
        "required": ["items", "total"],
        "properties": {"total": {"default": 0}}
    }));

    group.bench_function("chunked_500_items", |b| {
        b.iter(|| {
            let mut healer = Healer::with_schema(Arc::clone(&schema), Options::default());
            let mut total = 0usize;
            let mut start = 0usize;
            while start < doc.len() {
                let mut end = usize::min(start + 64, doc.len());
                while end < doc.len() && !doc.is_char_boundary(end) {
                    end += 1;
                }
                total += healer.process(black_box(&doc[start..end])).len();
                start = end;
            }
            total += healer.finish().len();
            black_box(total);
        })
    });

    group.bench_function("single_chunk_500_items", |b| {
        b.iter(|| {
            let mut healer = Healer::new(Options::default());
            let mut total = healer.process(black_box(&doc)).len();
            total += healer.finish().len();
            black_box(total);
        })
    });

    group.finish();
}

criterion_group!(benches, bench_heal);
criterion_main!(benches);
