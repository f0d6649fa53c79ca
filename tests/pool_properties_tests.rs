//! Behavioural properties of the memory pool
//!
//! Each test pins down one guarantee of acquire/release/drain/snapshot;
//! the proptest block at the end checks the ownership and accounting
//! invariants over random acquire/release sequences.

mod common;

use std::collections::HashMap;
use std::ptr::NonNull;

use chunkpool::{MemoryKind, MemoryStats, PoolUsage};
use common::{dummy_pool, seed_available};
use proptest::prelude::*;

#[test]
fn test_best_fit_selects_smallest_sufficient_chunk() {
    let pool = dummy_pool();
    let ptrs = seed_available(&pool, MemoryKind::Host, &[50, 200]);
    let allocs = pool.backend().stats().allocs();
    let stats = pool.snapshot();

    let ptr = pool.acquire_host(100).unwrap();

    assert_eq!(ptr, ptrs[1], "the 200-byte chunk should be reused");
    assert_eq!(pool.backend().stats().allocs(), allocs, "no backend call on a hit");
    assert_eq!(pool.snapshot(), stats);
    pool.release(Some(ptr));
}

#[test]
fn test_fallback_grows_largest_undersized_chunk() {
    let pool = dummy_pool();
    let ptrs = seed_available(&pool, MemoryKind::Host, &[10, 40]);
    let before = pool.snapshot();

    let ptr = pool.acquire_host(100).unwrap();
    let after = pool.snapshot();

    assert_eq!(after.host_mallocs, before.host_mallocs + 1);
    assert_eq!(after.host_size, before.host_size + 60);
    assert!(!pool.backend().is_live(ptrs[1]), "40-byte region must be replaced");
    assert!(pool.backend().is_live(ptrs[0]), "10-byte chunk stays available");
    assert!(pool.backend().is_live(ptr));

    let usage = pool.usage();
    assert_eq!(usage.available_chunks, 1);
    assert_eq!(usage.available_bytes, 10);
    assert_eq!(usage.allocated_bytes, 100);
    pool.release(Some(ptr));
}

#[test]
fn test_fresh_chunk_only_when_no_kind_match() {
    let pool = dummy_pool();
    seed_available(&pool, MemoryKind::Device, &[4096]);
    let before = pool.snapshot();

    let host = pool.acquire_host(16).unwrap();

    let after = pool.snapshot();
    assert_eq!(after.host_mallocs, before.host_mallocs + 1);
    assert_eq!(after.host_size, before.host_size + 16);
    assert_eq!(after.device_mallocs, before.device_mallocs);
    assert_eq!(pool.usage().chunks(), 2);
    pool.release(Some(host));
}

#[test]
fn test_round_trip_is_a_pool_hit() {
    let pool = dummy_pool();
    for kind in [MemoryKind::Host, MemoryKind::Device] {
        let first = pool.acquire(777, kind);
        pool.release(first);
        let stats = pool.snapshot();
        let allocs = pool.backend().stats().allocs();

        let second = pool.acquire(777, kind);
        assert_eq!(first, second);
        assert_eq!(pool.snapshot(), stats);
        assert_eq!(pool.backend().stats().allocs(), allocs);
        pool.release(second);
    }
}

#[test]
fn test_zero_size_leaves_pool_untouched() {
    let pool = dummy_pool();
    seed_available(&pool, MemoryKind::Host, &[8]);
    let usage = pool.usage();
    let stats = pool.snapshot();

    assert!(pool.acquire_host(0).is_none());
    assert!(pool.acquire_device(0).is_none());
    pool.release(pool.acquire_device(0));

    assert_eq!(pool.usage(), usage);
    assert_eq!(pool.snapshot(), stats);
}

#[test]
fn test_kind_isolation() {
    let pool = dummy_pool();
    let host = seed_available(&pool, MemoryKind::Host, &[10, 100, 1000]);
    let device = seed_available(&pool, MemoryKind::Device, &[10, 100, 1000]);

    for size in [5, 50, 500, 5000] {
        let d = pool.acquire_device(size).unwrap();
        let h = pool.acquire_host(size).unwrap();
        assert!(!host.contains(&d), "device request served from host chunk");
        assert!(!device.contains(&h), "host request served from device chunk");
        pool.release(Some(d));
        pool.release(Some(h));
    }
}

#[test]
fn test_statistics_accumulate_growth_deltas() {
    let pool = dummy_pool();

    // fresh (+100), hit, grow (+150), hit, grow (+50)
    let a = pool.acquire_device(100);
    pool.release(a);
    let a = pool.acquire_device(80);
    pool.release(a);
    let a = pool.acquire_device(250);
    pool.release(a);
    let a = pool.acquire_device(250);
    pool.release(a);
    let a = pool.acquire_device(300);
    pool.release(a);

    let stats = pool.snapshot();
    assert_eq!(stats.device_mallocs, 3);
    assert_eq!(stats.device_size, 300);
    assert_eq!(stats.host_mallocs, 0);
    assert_eq!(stats.host_size, 0);
    assert_eq!(pool.backend().stats().device_allocs, 3);
    assert_eq!(pool.usage().chunks(), 1);
}

#[test]
fn test_statistics_survive_drain() {
    let mut pool = dummy_pool();
    let a = pool.acquire_host(64);
    let b = pool.acquire_device(32);
    pool.release(a);
    pool.release(b);
    let stats = pool.snapshot();

    pool.drain();
    assert_eq!(pool.snapshot(), stats);
    assert_eq!(pool.usage(), PoolUsage::default());
    assert_eq!(pool.backend().live_regions(), 0);

    // Refill after drain keeps accumulating
    let c = pool.acquire_host(64);
    pool.release(c);
    pool.drain();
    let expected = MemoryStats {
        host_size: 128,
        host_mallocs: 2,
        device_size: 32,
        device_mallocs: 1,
    };
    assert_eq!(pool.snapshot(), expected);
}

#[test]
#[should_panic(expected = "memory leak detected")]
fn test_drain_detects_leak() {
    let mut pool = dummy_pool();
    let a = pool.acquire_host(16);
    let _b = pool.acquire_device(16);
    pool.release(a);
    pool.drain();
}

#[test]
#[should_panic(expected = "not allocated from this pool")]
fn test_release_of_address_from_other_pool_panics() {
    let pool = dummy_pool();
    let other = dummy_pool();
    let ptr = other.acquire_host(16);
    pool.release(ptr);
}

#[test]
fn test_address_is_stable_while_lent() {
    let pool = dummy_pool();
    let held = pool.acquire_host(64).unwrap();

    // Churn that grows other chunks must not move the held one
    for size in [16, 128, 1024, 4096] {
        let tmp = pool.acquire_host(size);
        pool.release(tmp);
    }
    assert!(pool.backend().is_live(held));
    pool.release(Some(held));

    // Released chunk is reused in place
    assert_eq!(pool.acquire_host(64), Some(held));
}

#[derive(Debug, Clone)]
enum Op {
    Acquire { size: usize, device: bool },
    Release(prop::sample::Index),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0usize..512, any::<bool>()).prop_map(|(size, device)| Op::Acquire { size, device }),
        2 => any::<prop::sample::Index>().prop_map(Op::Release),
    ]
}

fn kind_of(device: bool) -> MemoryKind {
    if device {
        MemoryKind::Device
    } else {
        MemoryKind::Host
    }
}

proptest! {
    #[test]
    fn test_random_sequences_keep_invariants(ops in prop::collection::vec(op_strategy(), 1..120)) {
        let mut pool = dummy_pool();
        let mut outstanding: Vec<(NonNull<u8>, MemoryKind)> = Vec::new();
        let mut region_kind: HashMap<usize, MemoryKind> = HashMap::new();
        let mut last_bytes = 0usize;

        for op in ops {
            match op {
                Op::Acquire { size, device } => {
                    let kind = kind_of(device);
                    match pool.acquire(size, kind) {
                        None => prop_assert_eq!(size, 0),
                        Some(ptr) => {
                            prop_assert!(size > 0);
                            prop_assert!(pool.backend().is_live(ptr));
                            prop_assert!(outstanding.iter().all(|(p, _)| *p != ptr), "address lent twice");
                            let previous = region_kind.insert(ptr.as_ptr() as usize, kind);
                            prop_assert!(previous.map_or(true, |k| k == kind), "chunk changed kind");
                            outstanding.push((ptr, kind));
                        }
                    }
                }
                Op::Release(index) => {
                    if !outstanding.is_empty() {
                        let (ptr, _) = outstanding.swap_remove(index.index(outstanding.len()));
                        pool.release(Some(ptr));
                    }
                }
            }

            // Every chunk sits in exactly one set and owns exactly one region
            let usage = pool.usage();
            prop_assert_eq!(usage.allocated_chunks, outstanding.len());
            prop_assert_eq!(usage.chunks(), pool.backend().live_regions());

            // Chunks never shrink, so the total capacity never drops
            prop_assert!(usage.bytes() >= last_bytes);
            last_bytes = usage.bytes();

            // Every growth is one backend allocation, and capacity is the sum of deltas
            let stats = pool.snapshot();
            let backend = pool.backend().stats();
            prop_assert_eq!(stats.host_mallocs as usize, backend.host_allocs);
            prop_assert_eq!(stats.device_mallocs as usize, backend.device_allocs);
            prop_assert_eq!(stats.host_size + stats.device_size, usage.bytes());
        }

        for (ptr, _) in outstanding.drain(..) {
            pool.release(Some(ptr));
        }
        let stats = pool.snapshot();
        prop_assert_eq!(pool.available_bytes(MemoryKind::Host), stats.host_size);
        prop_assert_eq!(pool.available_bytes(MemoryKind::Device), stats.device_size);

        pool.drain();
        prop_assert_eq!(pool.backend().live_regions(), 0);
        prop_assert_eq!(pool.snapshot(), stats);
    }
}
