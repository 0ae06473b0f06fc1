use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pixelfield_core::codec::{
    pack_color_plane, pack_fingerprint_plane, slice_region, unpack_color_plane,
    unpack_fingerprint_plane,
};
use pixelfield_core::grid::{GridDims, Region};

fn bench_pack_color_plane(c: &mut Criterion) {
    let dims = GridDims::default();
    let values: Vec<u8> = (0..dims.cell_count()).map(|i| (i % 16) as u8).collect();

    c.bench_function("pack_color_plane_1M_cells", |b| {
        b.iter(|| black_box(pack_color_plane(black_box(&values), 4)))
    });
}

fn bench_unpack_color_plane(c: &mut Criterion) {
    let dims = GridDims::default();
    let values: Vec<u8> = (0..dims.cell_count()).map(|i| (i % 16) as u8).collect();
    let packed = pack_color_plane(&values, 4);

    c.bench_function("unpack_color_plane_1M_cells", |b| {
        b.iter(|| black_box(unpack_color_plane(black_box(&packed), dims.cell_count(), 4)))
    });
}

fn bench_fingerprint_roundtrip(c: &mut Criterion) {
    let dims = GridDims::default();
    let values: Vec<u64> = (0..dims.cell_count() as u64).collect();
    let packed = pack_fingerprint_plane(&values);

    c.bench_function("unpack_fingerprint_plane_1M_cells", |b| {
        b.iter(|| black_box(unpack_fingerprint_plane(black_box(&packed), dims.cell_count())))
    });
}

fn bench_slice_region(c: &mut Criterion) {
    let dims = GridDims::default();
    let plane: Vec<u8> = (0..dims.cell_count()).map(|i| (i % 16) as u8).collect();
    let region = Region::new(400, 400, 200, 200);

    c.bench_function("slice_region_200x200", |b| {
        b.iter(|| black_box(slice_region(black_box(&plane), dims.width as usize, region)))
    });
}

criterion_group!(
    benches,
    bench_pack_color_plane,
    bench_unpack_color_plane,
    bench_fingerprint_roundtrip,
    bench_slice_region
);
criterion_main!(benches);
