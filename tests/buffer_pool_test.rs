//! Black-box tests against `incdb::pager::BufferPool`'s public surface.

use incdb::error::DbError;
use incdb::pager::{Allocator, BufferPool};

fn pool(name: &str, pool_size: usize) -> BufferPool {
    let path = std::env::temp_dir().join(format!("incdb-pool-it-{}.db", name));
    let alloc = Allocator::new(path, 64, 16).unwrap();
    BufferPool::new(alloc, pool_size)
}

/// Scenario S2 (spec §8): with F=2, new(P1), new(P2), unpin(P1), pin(P3)
/// must evict P1; pin(P1) again must be served after unpin(P2).
#[test]
fn scenario_s2_end_to_end() {
    let mut bp = pool("s2", 2);
    let p1 = bp.new_pages(1).unwrap();
    let _p2 = bp.new_pages(1).unwrap();
    bp.unpin(p1, false).unwrap();

    let p3 = bp.new_pages(1).unwrap();
    assert!(bp.get_page(p1).is_err());
    assert!(bp.get_page(p3).is_ok());
}

#[test]
fn writes_survive_eviction_round_trip() {
    let mut bp = pool("roundtrip", 1);
    let p = bp.new_pages(1).unwrap();
    bp.get_page_mut(p).unwrap()[0] = 42;
    bp.unpin(p, true).unwrap();

    // Force an eviction by pinning a second page in a one-frame pool.
    let q = bp.new_pages(1).unwrap();
    bp.unpin(q, false).unwrap();

    bp.pin(p, false).unwrap();
    assert_eq!(bp.get_page(p).unwrap()[0], 42);
}

#[test]
fn freeing_a_pinned_page_is_rejected() {
    let mut bp = pool("pinned-free", 2);
    let p = bp.new_pages(1).unwrap();
    assert!(matches!(bp.free_page(p), Err(DbError::NotPinned)));
}
