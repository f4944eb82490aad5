//! Bounded store read-path benchmarks.
//!
//! Measures the staged (pooled segment) and zero-copy (file region) read
//! paths over a sealed spill file, with immediate recycling so the pool
//! never stalls the drain.

#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use flux_buffer::DataType;
use flux_core::SubpartitionId;
use flux_exchange::{BoundedStore, ReadResult, StoreConfig};

const UNIT_BYTES: usize = 16 * 1024;
const UNITS: u32 = 256;

fn sealed_store(dir: &tempfile::TempDir) -> BoundedStore {
    let store = BoundedStore::create(
        SubpartitionId::new(1),
        &dir.path().join("bench.spill"),
        StoreConfig::new().with_segment_bytes(UNIT_BYTES as u32),
    )
    .expect("create store");

    let payload = vec![0xa5u8; UNIT_BYTES];
    for _ in 0..UNITS {
        store
            .write_unit(DataType::DataBuffer, false, &payload)
            .expect("write unit");
    }
    store.finish_write().expect("seal store");
    store
}

fn bench_staged_reads(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = sealed_store(&dir);

    let mut group = c.benchmark_group("bounded_store");
    group.throughput(Throughput::Bytes(u64::from(UNITS) * UNIT_BYTES as u64));

    group.bench_function(BenchmarkId::new("staged", UNITS), |b| {
        b.iter(|| {
            let reader = store.create_reader(None).expect("create reader");
            let mut units = 0u32;
            loop {
                match reader.next_unit().expect("read unit") {
                    ReadResult::Unit(unit) => {
                        units += 1;
                        drop(unit);
                    }
                    ReadResult::Finished => break,
                    ReadResult::NotYet => unreachable!("immediate recycle"),
                }
            }
            assert_eq!(units, UNITS);
        });
    });

    group.bench_function(BenchmarkId::new("regions", UNITS), |b| {
        b.iter(|| {
            let reader = store.create_reader(None).expect("create reader");
            let mut units = 0u32;
            loop {
                match reader.next_region().expect("read region") {
                    ReadResult::Unit(unit) => {
                        units += 1;
                        drop(unit);
                    }
                    ReadResult::Finished => break,
                    ReadResult::NotYet => unreachable!("regions bypass the pool"),
                }
            }
            assert_eq!(units, UNITS);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_staged_reads);
criterion_main!(benches);
