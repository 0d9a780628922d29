//! Black-box tests against `incdb::leapfrog::LeapfrogTriejoin`.

use std::sync::{Arc, RwLock};

use incdb::leapfrog::LeapfrogTriejoin;
use incdb::pager::{Allocator, BufferPool};
use incdb::relation::Relation;
use incdb::trie::TrieCursor;
use incdb::types::Pod;

fn pool(name: &str) -> Pod<BufferPool> {
    let path = std::env::temp_dir().join(format!("incdb-leapfrog-it-{}.db", name));
    let alloc = Allocator::new(path, 8192, 8192).unwrap();
    Arc::new(RwLock::new(BufferPool::new(alloc, 512)))
}

fn drain_tuples(cur: &mut dyn TrieCursor, width: usize) -> Vec<Vec<i32>> {
    fn rec(cur: &mut dyn TrieCursor, width: usize, prefix: &mut Vec<i32>, out: &mut Vec<Vec<i32>>) {
        cur.open().unwrap();
        while !cur.at_end() {
            prefix.push(cur.key());
            if prefix.len() == width {
                out.push(prefix.clone());
            } else {
                rec(cur, width, prefix, out);
            }
            prefix.pop();
            cur.next().unwrap();
        }
        cur.up().unwrap();
    }
    let mut out = Vec::new();
    rec(cur, width, &mut Vec::new(), &mut out);
    out
}

/// Scenario S5 (spec §8), driven from outside the crate.
#[test]
fn scenario_s5_three_way_join() {
    let pool = pool("s5");
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

    let cursors: Vec<Box<dyn TrieCursor>> =
        vec![Box::new(r.scan().unwrap()), Box::new(s.scan().unwrap()), Box::new(t.scan().unwrap())];
    let mut join = LeapfrogTriejoin::new(3, cursors);

    assert_eq!(
        drain_tuples(&mut join, 3),
        vec![vec![7, 4, 0], vec![7, 4, 1], vec![7, 4, 2], vec![8, 4, 3]]
    );
}

#[test]
fn disjoint_relations_join_to_nothing() {
    let pool = pool("disjoint");
    let mut r = Relation::create(pool.clone(), 0, 1).unwrap();
    r.insert(1, 2).unwrap();
    let mut s = Relation::create(pool, 0, 1).unwrap();
    s.insert(3, 4).unwrap();

    let cursors: Vec<Box<dyn TrieCursor>> = vec![Box::new(r.scan().unwrap()), Box::new(s.scan().unwrap())];
    let mut join = LeapfrogTriejoin::new(2, cursors);
    assert_eq!(drain_tuples(&mut join, 2), Vec::<Vec<i32>>::new());
}
