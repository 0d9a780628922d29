//! Black-box tests against `incdb::query`'s `Count` and `EquiJoin`.

use std::sync::{Arc, RwLock};

use incdb::ftrie::View;
use incdb::heap::HeapFile;
use incdb::pager::{Allocator, BufferPool};
use incdb::query::{Count, EquiJoin, Op, Query, Sink};
use incdb::relation::Relation;
use incdb::types::Pod;

fn pool(name: &str) -> Pod<BufferPool> {
    let path = std::env::temp_dir().join(format!("incdb-query-it-{}.db", name));
    let alloc = Allocator::new(path, 8192, 8192).unwrap();
    Arc::new(RwLock::new(BufferPool::new(alloc, 512)))
}

fn build_rst(pool: Pod<BufferPool>) -> Vec<Relation> {
    let mut r = Relation::create(pool.clone(), 0, 1).unwrap();
    r.insert(7, 4).unwrap();
    r.insert(8, 4).unwrap();

    let mut s = Relation::create(pool.clone(), 1, 2).unwrap();
    for z in 0..4 {
        s.insert(4, z).unwrap();
    }

    let mut t = Relation::create(pool, 0, 2).unwrap();
    for z in 0..3 {
        t.insert(7, z).unwrap();
    }
    t.insert(8, 3).unwrap();
    t.insert(8, 4).unwrap();

    vec![r, s, t]
}

/// Scenario S6 (spec §8): update(R, Insert, 9, 4) changes nothing (no
/// matching T-tuple for x=9); update(T, Insert, 9, 0) then adds exactly 1.
#[test]
fn scenario_s6_incremental_count() {
    let pool = pool("s6");
    let mut q = Count::create(build_rst(pool), 3, false);
    q.recompute().unwrap();
    assert_eq!(q.count(), 4);

    q.update(0, Op::Insert, 9, 4).unwrap();
    assert_eq!(q.count(), 4);

    q.update(2, Op::Insert, 9, 0).unwrap();
    assert_eq!(q.count(), 5);
}

#[test]
fn count_update_with_out_of_range_table_is_a_no_op() {
    let pool = pool("out-of-range");
    let mut q = Count::create(build_rst(pool), 3, false);
    q.recompute().unwrap();
    let before = q.count();

    q.update(99, Op::Insert, 1, 2).unwrap();
    assert_eq!(q.count(), before);
}

#[test]
fn naive_count_matches_incremental_after_same_updates() {
    let pool_a = pool("naive-a");
    let pool_b = pool("naive-b");

    let mut incremental = Count::create(build_rst(pool_a), 3, false);
    incremental.recompute().unwrap();
    let mut naive = Count::create(build_rst(pool_b), 3, true);
    naive.update(0, Op::Insert, 1, 1).unwrap();

    for (table, op, x, y) in [
        (0, Op::Insert, 9, 4),
        (2, Op::Insert, 9, 0),
        (1, Op::Insert, 4, 9),
    ] {
        incremental.update(table, op, x, y).unwrap();
        naive.update(table, op, x, y).unwrap();
    }

    assert_eq!(incremental.count(), naive.count());
}

#[test]
fn equijoin_view_recompute_matches_s5() {
    let pool = pool("equijoin-recompute");
    let view = View::create(pool.clone(), 3).unwrap();
    let mut q = EquiJoin::create(build_rst(pool), 3, Sink::View(view));
    q.recompute().unwrap();

    let tuples = match q.sink_mut() {
        Sink::View(v) => v.scan_tuples().unwrap(),
        _ => unreachable!(),
    };
    assert_eq!(tuples, vec![vec![7, 4, 0], vec![7, 4, 1], vec![7, 4, 2], vec![8, 4, 3]]);
}

#[test]
fn equijoin_heap_sink_reflects_every_update() {
    let pool = pool("equijoin-heap");
    let heap = HeapFile::create(pool.clone()).unwrap();
    let mut q = EquiJoin::create(build_rst(pool), 3, Sink::Heap(heap));
    q.recompute().unwrap();

    q.update(2, Op::Insert, 9, 0).unwrap();
    q.update(0, Op::Insert, 9, 4).unwrap();

    match q.sink_mut() {
        Sink::Heap(h) => assert_eq!(h.scan_all(3).unwrap().len(), 5),
        _ => unreachable!(),
    }
}
