use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

/// Smooth 64x64x64 volume: separable cumulative sums over shaped noise.
fn smooth_volume(n: usize) -> Vec<f64> {
    let mut seed = 1u32;
    let mut field = vec![0.0f64; n * n * n];
    for value in field.iter_mut().skip(1) {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345) & 0x7FFF_FFFF;
        let u = seed as f64 / (1u64 << 31) as f64;
        *value = (2.0 * u - 1.0).powi(9);
    }
    for i in 1..field.len() {
        field[i] += field[i - 1];
    }
    field
}

fn codec(c: &mut Criterion) {
    let n = 64usize;
    let field_f64 = smooth_volume(n);
    let field_f32: Vec<f32> = field_f64.iter().map(|&v| v as f32).collect();
    let dims = n as u32;

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Elements(field_f64.len() as u64));

    group.bench_function("encode_f32", |b| {
        b.iter(|| fpz::compress(black_box(&field_f32), dims, dims, dims, 1).unwrap())
    });
    group.bench_function("encode_f64", |b| {
        b.iter(|| fpz::compress(black_box(&field_f64), dims, dims, dims, 1).unwrap())
    });

    let compressed_f32 = fpz::compress(&field_f32, dims, dims, dims, 1).unwrap();
    let compressed_f64 = fpz::compress(&field_f64, dims, dims, dims, 1).unwrap();

    group.bench_function("decode_f32", |b| {
        b.iter(|| fpz::decompress_f32(black_box(&compressed_f32)).unwrap())
    });
    group.bench_function("decode_f64", |b| {
        b.iter(|| fpz::decompress_f64(black_box(&compressed_f64)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, codec);
criterion_main!(benches);
