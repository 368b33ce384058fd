use criterion::{Criterion, criterion_group, criterion_main};
use retain::{Shared, Unique};

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("shared/clone_drop", |b| {
        let value = Shared::new(0u32);

        b.iter(|| value.clone());
    });

    c.bench_function("shared/lock", |b| {
        let value = Shared::new(0u32);
        let weak = value.downgrade();

        b.iter(|| weak.lock());
    });

    c.bench_function("shared/new_inline", |b| {
        b.iter(|| Shared::new(0u32));
    });

    c.bench_function("shared/adopt", |b| {
        b.iter(|| Shared::adopt(Box::new(0u32)));
    });

    c.bench_function("unique/new_drop", |b| {
        b.iter(|| Unique::new(0u32));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
