//! Black-box tests against the fractal trie's `View` wrapper
//! (`incdb::ftrie::View`), the materialised-view index behind `EquiJoin`.

use std::sync::{Arc, RwLock};

use incdb::ftrie::node::Message;
use incdb::ftrie::{MsgKind, View};
use incdb::pager::{Allocator, BufferPool};
use incdb::types::Pod;

fn pool(name: &str) -> Pod<BufferPool> {
    let path = std::env::temp_dir().join(format!("incdb-ftrie-it-{}.db", name));
    let alloc = Allocator::new(path, 8192, 4096).unwrap();
    Arc::new(RwLock::new(BufferPool::new(alloc, 256)))
}

fn msg(kind: MsgKind, key: Vec<i32>) -> Message {
    Message { kind, key }
}

#[test]
fn view_survives_many_inserts_in_one_batch() {
    let pool = pool("many-inserts");
    let mut v = View::create(pool, 2).unwrap();

    let inserts: Vec<Message> = (0..2000)
        .map(|i| msg(MsgKind::Insert, vec![i, i * 2]))
        .collect();
    v.log(inserts).unwrap();

    let tuples = v.scan_tuples().unwrap();
    assert_eq!(tuples.len(), 2000);
    assert_eq!(tuples[0], vec![0, 0]);
    assert_eq!(tuples[1999], vec![1999, 3998]);
}

#[test]
fn duplicate_key_in_one_batch_keeps_last_message() {
    let pool = pool("dup-key");
    let mut v = View::create(pool, 1).unwrap();

    v.log(vec![
        msg(MsgKind::Insert, vec![5]),
        msg(MsgKind::Delete, vec![5]),
    ])
    .unwrap();

    assert_eq!(v.scan_tuples().unwrap(), Vec::<Vec<i32>>::new());
}

#[test]
fn clear_empties_a_populated_view() {
    let pool = pool("clear");
    let mut v = View::create(pool, 1).unwrap();
    v.log((0..500).map(|i| msg(MsgKind::Insert, vec![i])).collect()).unwrap();
    assert_eq!(v.scan_tuples().unwrap().len(), 500);

    v.clear().unwrap();
    assert_eq!(v.scan_tuples().unwrap(), Vec::<Vec<i32>>::new());
}

#[test]
fn insert_then_delete_across_separate_batches() {
    let pool = pool("insert-then-delete");
    let mut v = View::create(pool, 1).unwrap();
    v.log(vec![msg(MsgKind::Insert, vec![1])]).unwrap();
    v.log(vec![msg(MsgKind::Delete, vec![1])]).unwrap();
    assert_eq!(v.scan_tuples().unwrap(), Vec::<Vec<i32>>::new());
}
