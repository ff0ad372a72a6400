/// Winograd Convolution Benchmarks
///
/// Compares the direct convolution against both Winograd geometries on the
/// feature-map shapes used by the equivalence tests, and measures the stages
/// of the transform pipeline separately.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use winoflow_core::{
    batched_tile_matmul, conv2d_direct, transform_filter, transform_input, ExecutionContext,
    Padding, Tensor, TileGeometry, WinogradConfig, WinogradConv2d,
};

struct BenchConfig {
    name: &'static str,
    batch: usize,
    height: usize,
    width: usize,
    in_channels: usize,
    out_channels: usize,
}

const SHAPES: &[BenchConfig] = &[
    BenchConfig {
        name: "32x32_c32_k16",
        batch: 1,
        height: 32,
        width: 32,
        in_channels: 32,
        out_channels: 16,
    },
    BenchConfig {
        name: "61x67_c31_k37",
        batch: 1,
        height: 61,
        width: 67,
        in_channels: 31,
        out_channels: 37,
    },
    BenchConfig {
        name: "b3_64x64_c32_k32",
        batch: 3,
        height: 64,
        width: 64,
        in_channels: 32,
        out_channels: 32,
    },
];

fn random(rng: &mut StdRng, shape: &[usize]) -> Tensor<f32> {
    let n = shape.iter().product::<usize>();
    Tensor::from_vec((0..n).map(|_| rng.gen::<f32>()).collect(), shape).unwrap()
}

fn operands(config: &BenchConfig) -> (Tensor<f32>, Tensor<f32>, Tensor<f32>) {
    let mut rng = StdRng::seed_from_u64(42);
    (
        random(
            &mut rng,
            &[config.batch, config.height, config.width, config.in_channels],
        ),
        random(&mut rng, &[config.out_channels, config.in_channels, 3, 3]),
        random(&mut rng, &[config.out_channels]),
    )
}

fn bench_conv2d(c: &mut Criterion) {
    let mut group = c.benchmark_group("conv2d_3x3_same");
    group.sample_size(20);

    for config in SHAPES {
        let (input, filter, bias) = operands(config);
        let macs = config.batch
            * config.height
            * config.width
            * config.in_channels
            * config.out_channels
            * 9;
        group.throughput(Throughput::Elements(macs as u64));

        group.bench_with_input(BenchmarkId::new("direct", config.name), config, |b, _| {
            b.iter(|| {
                conv2d_direct(
                    black_box(&input),
                    black_box(&filter),
                    Some(&bias),
                    &Padding::same(),
                )
                .unwrap()
            })
        });

        for geometry in TileGeometry::ALL {
            let ctx = ExecutionContext::stream()
                .unwrap()
                .with_config(WinogradConfig::new().with_geometry(geometry));
            let conv = WinogradConv2d::new(*ctx.config());
            let id = BenchmarkId::new(geometry.to_string(), config.name);
            group.bench_with_input(id, config, |b, _| {
                b.iter(|| {
                    conv.run(&ctx, black_box(&input), &filter, &bias, &Padding::same())
                        .unwrap()
                })
            });

            let prepared = conv.prepare_filter(&filter).unwrap();
            let id = BenchmarkId::new(format!("{geometry}_prepared"), config.name);
            group.bench_with_input(id, config, |b, _| {
                b.iter(|| {
                    conv.run_prepared(&ctx, black_box(&input), &prepared, &bias, &Padding::same())
                        .unwrap()
                })
            });
        }
    }

    group.finish();
}

fn bench_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("winograd_stages");
    let config = &SHAPES[1];
    let (input, filter, _) = operands(config);
    let padding = Padding::same();

    for geometry in TileGeometry::ALL {
        group.bench_function(BenchmarkId::new("filter_transform", geometry), |b| {
            b.iter(|| transform_filter(black_box(&filter), geometry).unwrap())
        });
        group.bench_function(BenchmarkId::new("input_transform", geometry), |b| {
            b.iter(|| transform_input(black_box(&input), &padding, geometry).unwrap())
        });

        let u = transform_filter(&filter, geometry).unwrap();
        let (v, _) = transform_input(&input, &padding, geometry).unwrap();
        group.bench_function(BenchmarkId::new("batched_matmul", geometry), |b| {
            b.iter(|| batched_tile_matmul(black_box(&u), black_box(&v)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_conv2d, bench_stages);
criterion_main!(benches);
