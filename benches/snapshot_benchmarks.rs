//! Snapshot performance benchmarks
//!
//! Measures scanning extension roots, diffing snapshots and resolving paths.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ext_reload::extension::{
    ChangeSet, ExtensionResolver, PathFilter, Snapshot, SnapshotBuilder,
};
use std::fs;
use std::hint::black_box;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Lay out `extensions` directory extensions of `files` files each
fn populate(root: &Path, extensions: usize, files: usize) {
    for e in 0..extensions {
        let dir = root.join(format!("ext_{e}"));
        fs::create_dir_all(dir.join("__pycache__")).unwrap();
        fs::write(dir.join("__boot.ext"), "setup").unwrap();
        for f in 0..files {
            fs::write(dir.join(format!("module_{f}.ext")), "").unwrap();
            fs::write(dir.join("__pycache__").join(format!("module_{f}.pyc")), "").unwrap();
        }
    }
}

fn synthetic_snapshot(count: usize, secs: u64) -> Snapshot {
    (0..count)
        .map(|i| {
            (
                PathBuf::from(format!("exts/ext_{}/module_{i}.ext", i % 50)),
                SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
            )
        })
        .collect()
}

fn benchmark_snapshot_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_build");

    for extensions in [10, 100] {
        let dir = TempDir::new().unwrap();
        populate(dir.path(), extensions, 10);
        let roots = vec![dir.path().to_path_buf()];

        group.bench_with_input(
            BenchmarkId::from_parameter(extensions),
            &roots,
            |b, roots| {
                let mut builder = SnapshotBuilder::default();
                b.iter(|| black_box(builder.build(roots)));
            },
        );
    }

    group.finish();
}

fn benchmark_snapshot_diff(c: &mut Criterion) {
    let old = synthetic_snapshot(5_000, 10);
    let mut new = synthetic_snapshot(5_000, 10);
    new.extend([(
        PathBuf::from("exts/ext_1/module_1.ext"),
        SystemTime::UNIX_EPOCH + Duration::from_secs(20),
    )]);

    c.bench_function("diff_unchanged", |b| {
        b.iter(|| black_box(ChangeSet::between(&old, &old)))
    });
    c.bench_function("diff_one_update", |b| {
        b.iter(|| black_box(ChangeSet::between(&old, &new)))
    });
}

fn benchmark_resolution(c: &mut Criterion) {
    let resolver = ExtensionResolver::new(vec![PathBuf::from("exts")]);
    let filter = PathFilter::default();
    let deep = Path::new("exts/ext_7/wallet/db/models/user.ext");

    c.bench_function("resolve_subfile", |b| {
        b.iter(|| black_box(resolver.resolve(black_box(deep), true)))
    });
    c.bench_function("filter_accept", |b| {
        b.iter(|| black_box(filter.accept(black_box(deep))))
    });
}

criterion_group!(
    benches,
    benchmark_snapshot_build,
    benchmark_snapshot_diff,
    benchmark_resolution
);

criterion_main!(benches);
