//! Criterion benchmarks for the per-frame hot path.
//!
//! At the sensor's 9 fps these are far from a bottleneck; the numbers are
//! a baseline for running many emulated cameras on one host.
//!
//! Run with: cargo bench --bench encode

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use fake_lepton::{
    camera::{CameraSpec, Frame, PixelRange},
    hotspot::parse_hotspots,
    source::GeneratedSource,
    telemetry::{decode_frame, encode_frame},
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn lepton_frame() -> Frame {
    let camera = CameraSpec::default();
    let mut source = GeneratedSource::with_seed(&camera, PixelRange::new(3000, 4000), 1, 7);
    source.next().cloned().unwrap_or_else(|| Frame::new(160, 120))
}

fn wire_encoding(c: &mut Criterion) {
    let camera = CameraSpec::default();
    let frame = lepton_frame();
    let mut buffer = BytesMut::with_capacity(camera.frame_size());

    let mut group = c.benchmark_group("wire");
    group.throughput(Throughput::Bytes(camera.frame_size() as u64));

    group.bench_function("encode_frame", |b| {
        b.iter(|| {
            buffer.clear();
            encode_frame(black_box(&frame), &mut buffer);
        });
    });

    buffer.clear();
    encode_frame(&frame, &mut buffer);
    let encoded = buffer.clone().freeze();
    let mut decoded = Frame::new(160, 120);
    group.bench_function("decode_frame", |b| {
        b.iter(|| decode_frame(black_box(&encoded), &mut decoded).unwrap());
    });

    group.finish();
}

fn frame_synthesis(c: &mut Criterion) {
    let camera = CameraSpec::default();
    let mut group = c.benchmark_group("synthesis");

    group.bench_function("generate", |b| {
        let mut source =
            GeneratedSource::with_seed(&camera, PixelRange::new(3000, 4000), u32::MAX, 7);
        b.iter(|| black_box(source.next().map(|f| f.mean())));
    });

    let hotspots = parse_hotspots(
        r#"[{"shapeType":"circle","x":40,"y":30,"width":50,"height":40,"minTemp":5000,"maxTemp":6000},
            {"shapeType":"rectangle","x":100,"y":60,"width":30,"height":30,"minTemp":4500,"maxTemp":4500}]"#,
    )
    .unwrap();
    let mut frame = lepton_frame();
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    group.bench_function("paint_hotspots", |b| {
        b.iter(|| fake_lepton::hotspot::paint_all(black_box(&hotspots), &mut frame, &mut rng));
    });

    group.finish();
}

criterion_group!(benches, wire_encoding, frame_synthesis);
criterion_main!(benches);
