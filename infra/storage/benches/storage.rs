use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use fhub_domain::Permissions;
use fhub_storage::{Cache, CacheUpdate, FileType, LocalStorage, Stat, Storage};
use std::hint::black_box;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

// ============================================================================
// Benchmark: Path Resolution & Sandbox Validation
// ============================================================================

fn bench_path_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("path_resolution");

    let temp = TempDir::new().unwrap();
    let rt = tokio::runtime::Runtime::new().unwrap();
    let storage = rt.block_on(async {
        LocalStorage::builder().datadir(temp.path()).create(true).connect().await.unwrap()
    });
    rt.block_on(storage.mkdir("foo")).unwrap();

    group.bench_function("simple_path", |b| {
        b.iter(|| {
            black_box(rt.block_on(storage.resolve("test.dat")).unwrap());
        });
    });

    group.bench_function("existing_dir", |b| {
        b.iter(|| {
            black_box(rt.block_on(storage.resolve("foo")).unwrap());
        });
    });

    group.bench_function("nested_missing_path", |b| {
        b.iter(|| {
            black_box(rt.block_on(storage.resolve("foo/bar/baz/test.dat")).unwrap());
        });
    });

    group.bench_function("rejected_traversal", |b| {
        b.iter(|| {
            black_box(rt.block_on(storage.resolve("../../etc/passwd")).is_err());
        });
    });

    group.finish();
}

// ============================================================================
// Benchmark: Atomic Writes & Reads
// ============================================================================

fn bench_file_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_operations");
    group.measurement_time(Duration::from_secs(10));

    let temp = TempDir::new().unwrap();
    let rt = tokio::runtime::Runtime::new().unwrap();
    let storage = rt.block_on(async {
        LocalStorage::builder().datadir(temp.path()).create(true).connect().await.unwrap()
    });

    for (name, size) in [("1KB", 1024_usize), ("64KB", 64 * 1024), ("1MB", 1024 * 1024)] {
        let data = vec![0x5a_u8; size];
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("put", name), &data, |b, data| {
            b.iter(|| {
                rt.block_on(storage.file_put_contents("bench.dat", black_box(data))).unwrap();
            });
        });

        rt.block_on(storage.file_put_contents("read.dat", &data)).unwrap();
        group.bench_function(BenchmarkId::new("get", name), |b| {
            b.iter(|| {
                black_box(rt.block_on(storage.file_get_contents("read.dat")).unwrap());
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Metadata Cache
// ============================================================================

fn bench_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache");

    let cache = Cache::new("bench::");
    let stat = Stat { kind: FileType::File, size: 10, mtime: SystemTime::UNIX_EPOCH };
    for dir in 0..20 {
        for file in 0..50 {
            cache.put(
                &format!("dir{dir}/file{file}.txt"),
                CacheUpdate::from_stat(&stat, "text/plain", Permissions::ALL),
            );
        }
    }

    group.bench_function("get", |b| {
        b.iter(|| black_box(cache.get("dir10/file25.txt")));
    });

    group.bench_function("contents", |b| {
        b.iter(|| black_box(cache.contents("dir10")));
    });

    group.bench_function("folder_size", |b| {
        b.iter(|| black_box(cache.calculate_folder_size("")));
    });

    group.finish();
}

criterion_group!(benches, bench_path_resolution, bench_file_operations, bench_cache);

criterion_main!(benches);
