//! The nested buffered (fractal) trie (§4.7): an arbitrary-depth trie over
//! full `width`-wide tuples, used as the output view's set index. Branch
//! nodes carry one message buffer per child; a buffer is flushed to its
//! child only once it would overflow, amortising write cost. Unlike the
//! B+-Trie, balance relies solely on split/merge (no redistribution).
//! Grounded on `ftree.h`/`ftrie.cpp`'s `flush`/`split`/`merge`.

pub mod node;
pub mod view;

use log::debug;

use crate::error::DbResult;
use crate::pager::BufferPool;
use crate::trie::btrie::{Siblings, LEFT_SIB, NO_SIBS, RIGHT_SIB};
use crate::types::{PageId, INVALID_PAGE};
use node::{buffer_capacity, FTrieNode, Message};

pub use node::MsgKind;
pub use view::View;

/// A propagation diff returned by `flush` to its caller, analogous to the
/// B+-Trie's `Diff` but carrying the new (key, child) slots a split
/// produced, since a single flush batch can cascade into more than one new
/// sibling.
#[derive(Clone, Debug)]
pub enum FDiff {
    Nothing,
    Change,
    Split(Vec<(Vec<i32>, PageId)>),
    Merge(Siblings),
}

/// Sibling information passed down to a node during flush, mirroring the
/// B+-Trie's `Family` but with `width`-wide keys.
#[derive(Clone, Debug, Default)]
pub struct Family {
    pub sibs: Siblings,
    pub left_key: Vec<i32>,
    pub right_key: Vec<i32>,
}

fn load_node(pool: &mut BufferPool, nid: PageId, width: usize) -> DbResult<FTrieNode> {
    pool.pin(nid, false)?;
    FTrieNode::decode(pool.get_page(nid)?, width)
}

fn store_node(pool: &mut BufferPool, nid: PageId, node: &FTrieNode) -> DbResult<()> {
    node.encode(pool.get_page_mut(nid)?);
    Ok(())
}

/// Creates a new, empty leaf of the given tuple width.
pub fn new_leaf(pool: &mut BufferPool, width: usize) -> DbResult<PageId> {
    let nid = pool.new_pages(1)?;
    store_node(pool, nid, &FTrieNode::new_leaf(width))?;
    pool.unpin(nid, true)?;
    Ok(nid)
}

/// Merges two buffers already sorted ascending by key, de-duplicating by
/// key with `incoming` (the logically later batch) winning ties.
fn merge_messages(existing: Vec<Message>, incoming: Vec<Message>) -> Vec<Message> {
    let mut out = Vec::with_capacity(existing.len() + incoming.len());
    let (mut i, mut j) = (0, 0);
    while i < existing.len() && j < incoming.len() {
        match existing[i].key.cmp(&incoming[j].key) {
            std::cmp::Ordering::Less => {
                out.push(existing[i].clone());
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(incoming[j].clone());
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(incoming[j].clone());
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&existing[i..]);
    out.extend_from_slice(&incoming[j..]);
    out
}

fn child_family(node: &FTrieNode, idx: usize) -> Family {
    let mut fam = Family::default();
    if idx > 0 {
        fam.sibs |= LEFT_SIB;
        fam.left_key = node.key_at(idx - 1).to_vec();
    }
    if idx < node.count() {
        fam.sibs |= RIGHT_SIB;
        fam.right_key = node.key_at(idx).to_vec();
    }
    fam
}

fn insert_new_slots(node: &mut FTrieNode, child_idx: usize, new_slots: &[(Vec<i32>, PageId)]) {
    if let FTrieNode::Branch { children, keys, buffers, .. } = node {
        let mut pos = child_idx;
        for (k, pid) in new_slots {
            keys.insert(pos, k.clone());
            children.insert(pos + 1, *pid);
            buffers.insert(pos + 1, Vec::new());
            pos += 1;
        }
    }
}

/// Removes the slot made obsolete by a child merge, adopting the vacated
/// child's buffer into the survivor. Returns the now-unreferenced page id
/// for the caller to free.
fn remove_slot_after_merge(node: &mut FTrieNode, idx: usize, side: Siblings) -> PageId {
    match node {
        FTrieNode::Branch { children, keys, buffers, .. } => {
            if side == RIGHT_SIB {
                let freed = children[idx + 1];
                let absorbed = buffers.remove(idx + 1);
                keys.remove(idx);
                children.remove(idx + 1);
                buffers[idx] = merge_messages(std::mem::take(&mut buffers[idx]), absorbed);
                freed
            } else {
                let freed = children[idx];
                let absorbed = buffers.remove(idx);
                keys.remove(idx - 1);
                children.remove(idx);
                buffers[idx - 1] = merge_messages(std::mem::take(&mut buffers[idx - 1]), absorbed);
                freed
            }
        }
        FTrieNode::Leaf { .. } => unreachable!("remove_slot_after_merge on a leaf"),
    }
}

fn apply_diff(pool: &mut BufferPool, node: &mut FTrieNode, idx: usize, diff: FDiff) -> DbResult<bool> {
    match diff {
        FDiff::Nothing | FDiff::Change => Ok(false),
        FDiff::Split(new_slots) => {
            insert_new_slots(node, idx, &new_slots);
            Ok(false)
        }
        FDiff::Merge(side) => {
            let freed = remove_slot_after_merge(node, idx, side);
            pool.free_page(freed)?;
            Ok(true)
        }
    }
}

fn merge_ftrie_nodes(into: &mut FTrieNode, that: &FTrieNode, part: &[i32]) {
    match (into, that) {
        (FTrieNode::Leaf { records, .. }, FTrieNode::Leaf { records: other, .. }) => {
            records.extend(other.iter().cloned());
        }
        (
            FTrieNode::Branch { children, keys, buffers, .. },
            FTrieNode::Branch { children: oc, keys: ok, buffers: ob, .. },
        ) => {
            keys.push(part.to_vec());
            keys.extend(ok.iter().cloned());
            children.extend(oc.iter().cloned());
            buffers.extend(ob.iter().cloned());
        }
        _ => unreachable!("merge between a leaf and a branch"),
    }
}

/// Splits `node` (resident at `nid`) per §4.7/§4.3's fixed pivot policy:
/// pivot at `count/2`; a leaf's separator is the last key of the lower
/// half, a branch's separator is the pivot key itself (lifted up, not
/// duplicated in either half).
fn split_node(pool: &mut BufferPool, nid: PageId, node: &mut FTrieNode, width: usize) -> DbResult<(PageId, Vec<i32>)> {
    let new_pid = pool.new_pages(1)?;

    let (mut new_node, sep_key) = match node {
        FTrieNode::Leaf { records, .. } => {
            let pivot = records.len() / 2;
            let upper = records.split_off(pivot);
            let sep = records.last().unwrap().clone();
            (FTrieNode::Leaf { width, prev: INVALID_PAGE, next: INVALID_PAGE, records: upper }, sep)
        }
        FTrieNode::Branch { children, keys, buffers, .. } => {
            let pivot = keys.len() / 2;
            let sep = keys[pivot].clone();
            let upper_children = children.split_off(pivot + 1);
            let upper_keys = keys.split_off(pivot + 1);
            keys.truncate(pivot);
            let upper_buffers = buffers.split_off(pivot + 1);
            buffers.truncate(pivot + 1);
            (
                FTrieNode::Branch {
                    width,
                    prev: INVALID_PAGE,
                    next: INVALID_PAGE,
                    children: upper_children,
                    keys: upper_keys,
                    buffers: upper_buffers,
                },
                sep,
            )
        }
    };

    new_node.set_prev(nid);
    new_node.set_next(node.next());
    node.set_next(new_pid);

    if new_node.next() != INVALID_PAGE {
        let nbr_id = new_node.next();
        let mut nbr = load_node(pool, nbr_id, width)?;
        nbr.set_prev(new_pid);
        store_node(pool, nbr_id, &nbr)?;
        pool.unpin(nbr_id, true)?;
    }

    store_node(pool, new_pid, &new_node)?;
    pool.unpin(new_pid, true)?;
    debug!("ftrie: split {} into {}", nid, new_pid);
    Ok((new_pid, sep_key))
}

/// Attempts to merge `node` (resident at `nid`) with a same-parent sibling
/// named in `family`, left first. Only merges if the combined contents fit
/// the survivor's capacity (no redistribution is attempted, per §4.7/§9).
fn try_merge_sibling(
    pool: &mut BufferPool,
    nid: PageId,
    node: &mut FTrieNode,
    family: &Family,
    width: usize,
    page_size: usize,
) -> DbResult<Option<Siblings>> {
    let is_branch = !node.is_leaf();

    if family.sibs.contains(LEFT_SIB) {
        let left_pid = node.prev();
        let mut left = load_node(pool, left_pid, width)?;
        let combined = node.count() + left.count() + if is_branch { 1 } else { 0 };
        if combined <= left.capacity(page_size) {
            merge_ftrie_nodes(&mut left, node, &family.left_key);
            left.set_next(node.next());
            if left.next() != INVALID_PAGE {
                let nbr_id = left.next();
                let mut nbr = load_node(pool, nbr_id, width)?;
                nbr.set_prev(left_pid);
                store_node(pool, nbr_id, &nbr)?;
                pool.unpin(nbr_id, true)?;
            }
            store_node(pool, left_pid, &left)?;
            pool.unpin(left_pid, true)?;
            debug!("ftrie: merge {} into left {}", nid, left_pid);
            return Ok(Some(LEFT_SIB));
        }
        pool.unpin(left_pid, false)?;
    }

    if family.sibs.contains(RIGHT_SIB) {
        let right_pid = node.next();
        let right = load_node(pool, right_pid, width)?;
        let combined = node.count() + right.count() + if is_branch { 1 } else { 0 };
        if combined <= node.capacity(page_size) {
            merge_ftrie_nodes(node, &right, &family.right_key);
            node.set_next(right.next());
            if node.next() != INVALID_PAGE {
                let nbr_id = node.next();
                let mut nbr = load_node(pool, nbr_id, width)?;
                nbr.set_prev(nid);
                store_node(pool, nbr_id, &nbr)?;
                pool.unpin(nbr_id, true)?;
            }
            pool.unpin(right_pid, false)?;
            debug!("ftrie: merge right {} into {}", right_pid, nid);
            return Ok(Some(RIGHT_SIB));
        }
        pool.unpin(right_pid, false)?;
    }

    Ok(None)
}

/// Shared tail logic for every flush path: split while over capacity, else
/// try to merge with a sibling while under-occupied, else just persist.
fn finalize_node(
    pool: &mut BufferPool,
    nid: PageId,
    node: &mut FTrieNode,
    family: Family,
    width: usize,
    page_size: usize,
    any_change: bool,
) -> DbResult<FDiff> {
    let mut final_slots = Vec::new();
    while node.count() > node.capacity(page_size) {
        let (new_pid, sep_key) = split_node(pool, nid, node, width)?;
        final_slots.push((sep_key, new_pid));
    }
    if !final_slots.is_empty() {
        store_node(pool, nid, node)?;
        pool.unpin(nid, true)?;
        return Ok(FDiff::Split(final_slots));
    }

    if !any_change {
        store_node(pool, nid, node)?;
        pool.unpin(nid, false)?;
        return Ok(FDiff::Nothing);
    }

    if node.is_under_occupied(page_size) {
        if let Some(side) = try_merge_sibling(pool, nid, node, &family, width, page_size)? {
            if side == LEFT_SIB {
                pool.unpin(nid, false)?;
            } else {
                store_node(pool, nid, node)?;
                pool.unpin(nid, true)?;
            }
            return Ok(FDiff::Merge(side));
        }
    }

    store_node(pool, nid, node)?;
    pool.unpin(nid, true)?;
    Ok(FDiff::Change)
}

fn flush_leaf(
    pool: &mut BufferPool,
    nid: PageId,
    mut node: FTrieNode,
    family: Family,
    incoming: Vec<Message>,
    width: usize,
    page_size: usize,
) -> DbResult<FDiff> {
    let mut cur_pid = nid;
    let mut new_slots = Vec::new();
    let mut changed = false;

    for msg in incoming {
        loop {
            let pos = node.find_key(&msg.key, 0);
            let present = pos < node.count() && node.key_at(pos) == msg.key.as_slice();

            match msg.kind {
                MsgKind::Delete => {
                    if present {
                        if let FTrieNode::Leaf { records, .. } = &mut node {
                            records.remove(pos);
                        }
                        changed = true;
                    }
                    break;
                }
                MsgKind::Insert => {
                    if present {
                        break;
                    }
                    if node.is_full(page_size) {
                        let (new_pid, sep_key) = split_node(pool, cur_pid, &mut node, width)?;
                        new_slots.push((sep_key.clone(), new_pid));
                        store_node(pool, cur_pid, &node)?;
                        if msg.key > sep_key {
                            pool.unpin(cur_pid, true)?;
                            cur_pid = new_pid;
                            node = load_node(pool, cur_pid, width)?;
                        }
                        continue;
                    }
                    if let FTrieNode::Leaf { records, .. } = &mut node {
                        records.insert(pos, msg.key.clone());
                    }
                    changed = true;
                    break;
                }
            }
        }
    }

    if !new_slots.is_empty() {
        store_node(pool, cur_pid, &node)?;
        pool.unpin(cur_pid, true)?;
        return Ok(FDiff::Split(new_slots));
    }

    finalize_node(pool, cur_pid, &mut node, family, width, page_size, changed)
}

fn flush_branch(
    pool: &mut BufferPool,
    nid: PageId,
    mut node: FTrieNode,
    family: Family,
    incoming: Vec<Message>,
    width: usize,
    page_size: usize,
) -> DbResult<FDiff> {
    let mut any_change = !incoming.is_empty();

    if !incoming.is_empty() {
        let mut runs: Vec<(usize, Vec<Message>)> = Vec::new();
        for msg in incoming {
            let cidx = node.find_key(&msg.key, 0);
            if let Some(last) = runs.last_mut() {
                if last.0 == cidx {
                    last.1.push(msg);
                    continue;
                }
            }
            runs.push((cidx, vec![msg]));
        }

        for (cidx, msgs) in runs {
            if let FTrieNode::Branch { buffers, .. } = &mut node {
                let existing = std::mem::take(&mut buffers[cidx]);
                buffers[cidx] = merge_messages(existing, msgs);
            }
        }
    }

    let buf_cap = buffer_capacity(page_size, width);
    let mut idx = 0;
    while idx < node.count() + 1 {
        let over = matches!(&node, FTrieNode::Branch { buffers, .. } if buffers[idx].len() > buf_cap);
        if over {
            let pending = match &mut node {
                FTrieNode::Branch { buffers, .. } => std::mem::take(&mut buffers[idx]),
                _ => unreachable!(),
            };
            let child_pid = node.child_at(idx);
            let fam = child_family(&node, idx);
            let diff = flush(pool, child_pid, width, fam, pending)?;
            let removed = apply_diff(pool, &mut node, idx, diff)?;
            any_change = true;
            if removed {
                continue;
            }
        }
        idx += 1;
    }

    finalize_node(pool, nid, &mut node, family, width, page_size, any_change)
}

/// Logs `incoming` (sorted ascending by key, at most one message per key)
/// against the node at `nid`, cascading splits/merges as needed.
pub fn flush(pool: &mut BufferPool, nid: PageId, width: usize, family: Family, incoming: Vec<Message>) -> DbResult<FDiff> {
    debug!("ftrie: flush {} messages into {}", incoming.len(), nid);
    let node = load_node(pool, nid, width)?;
    let page_size = pool.page_size();
    match node {
        FTrieNode::Leaf { .. } => flush_leaf(pool, nid, node, family, incoming, width, page_size),
        FTrieNode::Branch { .. } => flush_branch(pool, nid, node, family, incoming, width, page_size),
    }
}

/// Forces every pending buffer in the subtree rooted at `nid` down to its
/// leaves, regardless of whether it has reached its flush threshold. Not
/// part of the lazy hot path; used by `View::flush_all` to make the
/// materialised view inspectable (debug dumps, tests).
fn drain_subtree(pool: &mut BufferPool, nid: PageId, family: Family, width: usize, page_size: usize) -> DbResult<FDiff> {
    let mut node = load_node(pool, nid, width)?;
    if node.is_leaf() {
        pool.unpin(nid, false)?;
        return Ok(FDiff::Nothing);
    }

    let mut any_change = false;
    let mut idx = 0;
    while idx < node.count() + 1 {
        let pending = match &mut node {
            FTrieNode::Branch { buffers, .. } => std::mem::take(&mut buffers[idx]),
            _ => unreachable!(),
        };

        let mut removed = false;
        if !pending.is_empty() {
            any_change = true;
            let child_pid = node.child_at(idx);
            let fam = child_family(&node, idx);
            let diff = flush(pool, child_pid, width, fam, pending)?;
            removed = apply_diff(pool, &mut node, idx, diff)?;
        }

        if !removed {
            let child_pid = node.child_at(idx);
            let fam = child_family(&node, idx);
            let gdiff = drain_subtree(pool, child_pid, fam, width, page_size)?;
            if !matches!(gdiff, FDiff::Nothing) {
                any_change = true;
            }
            removed = apply_diff(pool, &mut node, idx, gdiff)?;
        }

        if removed {
            continue;
        }
        idx += 1;
    }

    finalize_node(pool, nid, &mut node, family, width, page_size, any_change)
}

/// Collapses a root that has become a lone-child branch with no pending
/// messages to its sole child, freeing the vacated page (§4.7, "Root
/// maintenance").
fn collapse_root(pool: &mut BufferPool, root: PageId, width: usize) -> DbResult<PageId> {
    let node = load_node(pool, root, width)?;
    pool.unpin(root, false)?;
    match node {
        FTrieNode::Branch { children, keys, buffers, .. }
            if keys.is_empty() && buffers.iter().all(|b| b.is_empty()) =>
        {
            let child = children[0];
            pool.free_page(root)?;
            Ok(child)
        }
        _ => Ok(root),
    }
}

fn free_subtree(pool: &mut BufferPool, nid: PageId, width: usize) -> DbResult<()> {
    let node = load_node(pool, nid, width)?;
    pool.unpin(nid, false)?;
    if let FTrieNode::Branch { children, .. } = &node {
        for &c in children {
            free_subtree(pool, c, width)?;
        }
    }
    pool.free_page(nid)?;
    Ok(())
}

/// Given a leftmost child and a run of (key, child) slots produced by one
/// or more splits, builds one or more chained branch pages at a single
/// level (each holding at most `branch_capacity` keys) and returns the
/// leftmost page id, plus any spillover slots the caller must chain into
/// another level above (recursively invoking this helper again) if the
/// slots didn't fit in one page. Grounded on `ftree.h`'s
/// `static page_id branch(int width, page_id leftPID, std::vector<int> slots)`.
pub fn build_branch_chain(
    pool: &mut BufferPool,
    width: usize,
    left: PageId,
    slots: &[(Vec<i32>, PageId)],
) -> DbResult<(PageId, Vec<(Vec<i32>, PageId)>)> {
    if slots.is_empty() {
        return Ok((left, Vec::new()));
    }

    let cap = node::branch_capacity(pool.page_size(), width).max(1);
    let mut chunk_left = left;
    let mut first_pid = INVALID_PAGE;
    let mut prev_pid = INVALID_PAGE;
    let mut spillover = Vec::new();
    let mut idx = 0;

    while idx < slots.len() {
        let end = (idx + cap).min(slots.len());
        let chunk = &slots[idx..end];

        let children: Vec<PageId> = std::iter::once(chunk_left).chain(chunk.iter().map(|(_, p)| *p)).collect();
        let keys: Vec<Vec<i32>> = chunk.iter().map(|(k, _)| k.clone()).collect();
        let buffers = vec![Vec::new(); children.len()];

        let pid = pool.new_pages(1)?;
        let node = FTrieNode::Branch { width, prev: prev_pid, next: INVALID_PAGE, children, keys, buffers };
        store_node(pool, pid, &node)?;
        pool.unpin(pid, true)?;

        if prev_pid != INVALID_PAGE {
            let mut prev_node = load_node(pool, prev_pid, width)?;
            prev_node.set_next(pid);
            store_node(pool, prev_pid, &prev_node)?;
            pool.unpin(prev_pid, true)?;
            spillover.push((chunk[0].0.clone(), pid));
        } else {
            first_pid = pid;
        }

        chunk_left = chunk.last().unwrap().1;
        prev_pid = pid;
        idx = end;
    }

    Ok((first_pid, spillover))
}

/// Dumps the subtree rooted at `nid` to the `trace!` log: one line per node
/// giving its tag, occupancy, and sibling links, its keys, and for a branch
/// each child's pending buffer length. Grounded on `ftrie.cpp`'s
/// `debugPrint`; kept out of the release hot path, used by tests to eyeball
/// a tree's shape after a sequence of flushes/splits/merges.
#[cfg(test)]
pub fn debug_print(pool: &mut BufferPool, nid: PageId, width: usize) -> DbResult<()> {
    use log::trace;

    let node = load_node(pool, nid, width)?;
    let fmt_link = |p: PageId| if p == INVALID_PAGE { "x".to_string() } else { p.to_string() };

    match &node {
        FTrieNode::Leaf { records, prev, next, .. } => {
            trace!(
                "leaf {} (occ {}/{}) <{}|{}>: {:?}",
                nid,
                records.len(),
                node.capacity(pool.page_size()),
                fmt_link(*prev),
                fmt_link(*next),
                records,
            );
            pool.unpin(nid, false)?;
        }
        FTrieNode::Branch { children, keys, buffers, prev, next } => {
            trace!(
                "branch {} (occ {}/{}) <{}|{}>: keys {:?} buffers {:?}",
                nid,
                keys.len(),
                node.capacity(pool.page_size()),
                fmt_link(*prev),
                fmt_link(*next),
                keys,
                buffers.iter().map(|b| b.len()).collect::<Vec<_>>(),
            );
            let children = children.clone();
            pool.unpin(nid, false)?;
            for c in children {
                debug_print(pool, c, width)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PAGE_SIZE;
    use crate::pager::Allocator;
    use std::sync::{Arc, RwLock};

    fn pool(name: &str) -> Arc<RwLock<BufferPool>> {
        let path = std::env::temp_dir().join(format!("small-db-ftrie-{}.db", name));
        let alloc = Allocator::new(path, PAGE_SIZE, 4096).unwrap();
        Arc::new(RwLock::new(BufferPool::new(alloc, 512)))
    }

    fn insert(key: Vec<i32>) -> Message {
        Message { kind: MsgKind::Insert, key }
    }
    fn delete(key: Vec<i32>) -> Message {
        Message { kind: MsgKind::Delete, key }
    }

    #[test]
    fn leaf_insert_and_delete() {
        let pool = pool("leaf");
        let mut p = pool.write().unwrap();
        let nid = new_leaf(&mut p, 2).unwrap();

        let diff = flush(
            &mut p,
            nid,
            2,
            Family::default(),
            vec![insert(vec![1, 1]), insert(vec![2, 2]), insert(vec![3, 3])],
        )
        .unwrap();
        assert!(matches!(diff, FDiff::Change));

        let diff = flush(&mut p, nid, 2, Family::default(), vec![delete(vec![2, 2])]).unwrap();
        assert!(matches!(diff, FDiff::Change));

        let node = load_node(&mut p, nid, 2).unwrap();
        p.unpin(nid, false).unwrap();
        match node {
            FTrieNode::Leaf { records, .. } => {
                assert_eq!(records, vec![vec![1, 1], vec![3, 3]]);
            }
            _ => panic!("expected leaf"),
        }
    }

    #[test]
    fn duplicate_key_in_one_batch_keeps_last_message() {
        let pool = pool("dup");
        let mut p = pool.write().unwrap();
        let nid = new_leaf(&mut p, 1).unwrap();

        // View::log is responsible for deduping before calling flush; here
        // we exercise flush_leaf directly with an already-deduped batch
        // representing "insert then delete the same key" collapsing to
        // just the delete (the caller's responsibility, matching P4).
        flush(&mut p, nid, 1, Family::default(), vec![insert(vec![5])]).unwrap();
        flush(&mut p, nid, 1, Family::default(), vec![delete(vec![5])]).unwrap();

        let node = load_node(&mut p, nid, 1).unwrap();
        p.unpin(nid, false).unwrap();
        match node {
            FTrieNode::Leaf { records, .. } => assert!(records.is_empty()),
            _ => panic!("expected leaf"),
        }
    }

    #[test]
    fn view_survives_many_inserts_and_reports_exact_content() {
        let pool = pool("view");
        let mut v = view::View::create(pool, 1).unwrap();

        let msgs: Vec<Message> = (0..200).map(|k| insert(vec![k])).collect();
        v.log(msgs).unwrap();

        let tuples = v.scan_tuples().unwrap();
        let expected: Vec<Vec<i32>> = (0..200).map(|k| vec![k]).collect();
        assert_eq!(tuples, expected);
    }

    #[test]
    fn view_delete_after_insert_removes_tuple() {
        let pool = pool("view-del");
        let mut v = view::View::create(pool, 1).unwrap();
        v.log((0..50).map(|k| insert(vec![k])).collect()).unwrap();
        v.log(vec![delete(vec![10]), delete(vec![20])]).unwrap();

        let tuples = v.scan_tuples().unwrap();
        let expected: Vec<Vec<i32>> =
            (0..50).filter(|k| *k != 10 && *k != 20).map(|k| vec![k]).collect();
        assert_eq!(tuples, expected);
    }

    #[test]
    fn clear_empties_the_view() {
        let pool = pool("clear");
        let mut v = view::View::create(pool, 1).unwrap();
        v.log((0..50).map(|k| insert(vec![k])).collect()).unwrap();
        v.clear().unwrap();
        assert_eq!(v.scan_tuples().unwrap(), Vec::<Vec<i32>>::new());
    }

    #[test]
    fn debug_print_walks_a_flushed_view_without_error() {
        let pool = pool("debug-print");
        let mut v = view::View::create(pool.clone(), 1).unwrap();
        v.log((0..500).map(|k| insert(vec![k])).collect()).unwrap();

        let mut p = pool.write().unwrap();
        debug_print(&mut p, v.root(), 1).unwrap();
    }
}
