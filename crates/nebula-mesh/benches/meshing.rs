use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use glam::DVec3;
use nebula_cubesphere::root_patches;
use nebula_mesh::{
    CpuVertexGenerator, ExtractionRegion, SimpleCubesExtractor, SurfaceExtractor,
    TransvoxelExtractor, VertexGenConfig,
};
use nebula_terrain::{PlanetHeight, SphereDensity, TerrainHeightConfig};

fn bench_transvoxel_sphere(c: &mut Criterion) {
    let region = ExtractionRegion::covering(DVec3::splat(-6.0), DVec3::splat(6.0), 0.5);
    let field = SphereDensity {
        center: DVec3::ZERO,
        radius: 3.0,
    };
    let extractor = TransvoxelExtractor::default();
    c.bench_function("transvoxel_sphere_24", |bencher| {
        bencher.iter(|| black_box(extractor.extract(black_box(&region), &field)))
    });
}

fn bench_simple_cubes_sphere(c: &mut Criterion) {
    let region = ExtractionRegion::covering(DVec3::splat(-6.0), DVec3::splat(6.0), 0.5);
    let field = SphereDensity {
        center: DVec3::ZERO,
        radius: 3.0,
    };
    c.bench_function("simple_cubes_sphere_24", |bencher| {
        bencher.iter(|| black_box(SimpleCubesExtractor.extract(black_box(&region), &field)))
    });
}

fn bench_patch_generation(c: &mut Criterion) {
    let height = Arc::new(PlanetHeight::new(TerrainHeightConfig::default()));
    let patch = root_patches()[4];
    let transform = patch.create_transform().unwrap();
    for caching in [false, true] {
        let config = VertexGenConfig {
            resolution: 33,
            enable_vertex_caching: caching,
            ..Default::default()
        };
        let mut generator = CpuVertexGenerator::new(config, height.clone()).unwrap();
        let name = if caching {
            "patch_33_cached"
        } else {
            "patch_33_uncached"
        };
        c.bench_function(name, |bencher| {
            bencher.iter(|| black_box(generator.generate(&patch, &transform, [0; 4], 0.0)))
        });
    }
}

criterion_group!(
    benches,
    bench_transvoxel_sphere,
    bench_simple_cubes_sphere,
    bench_patch_generation
);
criterion_main!(benches);
