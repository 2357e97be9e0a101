//! Benchmarks for argument checks and wrapper overhead

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use winffi::kernel32::{self, CreateFileOptions};
use winffi::testutil::FakeKernel;
use winffi::{checks, validate, Catalog, Check, Handle, Value};

/// Benchmark single-argument validation per check kind
fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");

    let handle = Value::from(Handle::new(0x44));
    group.bench_function("handle", |b| {
        b.iter(|| validate("hFile", black_box(&handle), Check::Handle))
    });

    let text = Value::from("C:\\temp\\some\\longer\\path\\file.txt");
    group.bench_function("text", |b| {
        b.iter(|| validate("lpFileName", black_box(&text), checks::TEXT))
    });

    let allowed = [2, 1, 4, 3, 5];
    let disposition = Value::Integer(5);
    group.bench_function("one_of", |b| {
        b.iter(|| {
            validate(
                "dwCreationDisposition",
                black_box(&disposition),
                Check::OneOf(&allowed),
            )
        })
    });

    for &size in &[16usize, 1024, 65536] {
        let bytes = Value::from(vec![b'a'; size]);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("utf8_{}_bytes", size), |b| {
            b.iter(|| validate("lpBuffer", black_box(&bytes), Check::Utf8))
        });
    }

    group.finish();
}

/// Benchmark a full wrapper call against the simulated kernel
fn bench_wrappers(c: &mut Criterion) {
    let kernel = FakeKernel::new();
    let lib = kernel.library();
    let access = lib.constant("GENERIC_WRITE").unwrap_or_default();
    let file = kernel32::create_file(&lib, "bench.txt", access, CreateFileOptions::default())
        .expect("create bench file");

    c.bench_function("write_file_16_bytes", |b| {
        b.iter(|| kernel32::write_file(&lib, &file, black_box("0123456789abcdef"), None))
    });

    c.bench_function("create_event_and_close", |b| {
        b.iter(|| {
            let event = kernel32::create_event(&lib, false, false, None, None).unwrap();
            event.close(&lib).unwrap();
        })
    });
}

/// Benchmark parsing the bundled constants header
fn bench_catalog(c: &mut Criterion) {
    c.bench_function("catalog_bundled", |b| b.iter(|| black_box(Catalog::bundled())));
}

criterion_group!(benches, bench_validate, bench_wrappers, bench_catalog);
criterion_main!(benches);
