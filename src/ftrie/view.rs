//! The materialised-view wrapper around a fractal trie root (§4.7, "Root
//! maintenance"): owns the root page id and rebuilds it after a flush
//! reports a split, or collapses it after a flush empties it down to a
//! single child.

use crate::error::DbResult;
use crate::pager::BufferPool;
use crate::types::{Pod, PageId, INVALID_PAGE};

use super::node::{FTrieNode, Message};
use super::{build_branch_chain, collapse_root, drain_subtree, flush, free_subtree, new_leaf, Family, FDiff};

pub struct View {
    pool: Pod<BufferPool>,
    root: PageId,
    width: usize,
}

impl View {
    pub fn create(pool: Pod<BufferPool>, width: usize) -> DbResult<Self> {
        let root = {
            let mut p = pool.write().expect("buffer pool lock poisoned");
            new_leaf(&mut p, width)?
        };
        Ok(View { pool, root, width })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn root(&self) -> PageId {
        self.root
    }

    fn apply_root_diff(&mut self, pool: &mut BufferPool, diff: FDiff) -> DbResult<()> {
        match diff {
            FDiff::Split(new_slots) => {
                let (mut new_root, mut pending) = build_branch_chain(pool, self.width, self.root, &new_slots)?;
                while !pending.is_empty() {
                    let (r2, sp2) = build_branch_chain(pool, self.width, new_root, &pending)?;
                    new_root = r2;
                    pending = sp2;
                }
                self.root = new_root;
            }
            FDiff::Merge(_) => unreachable!("the view's root has no parent to report a merge to"),
            FDiff::Nothing | FDiff::Change => {}
        }
        self.root = collapse_root(pool, self.root, self.width)?;
        Ok(())
    }

    /// Applies a batch of inserts/deletes to the view. Messages are sorted
    /// and de-duplicated here (keeping the logically later message per
    /// key), since `flush` requires sorted, unique-key input (§4.7 P4).
    pub fn log(&mut self, mut msgs: Vec<Message>) -> DbResult<()> {
        if msgs.is_empty() {
            return Ok(());
        }
        msgs.sort_by(|a, b| a.key.cmp(&b.key));
        let mut deduped: Vec<Message> = Vec::with_capacity(msgs.len());
        for m in msgs {
            if let Some(last) = deduped.last() {
                if last.key == m.key {
                    deduped.pop();
                }
            }
            deduped.push(m);
        }

        let mut pool = self.pool.write().expect("buffer pool lock poisoned");
        let diff = flush(&mut pool, self.root, self.width, Family::default(), deduped)?;
        self.apply_root_diff(&mut pool, diff)
    }

    /// Forces every buffered message in the tree down to its leaves, so
    /// `scan_tuples` sees a fully up-to-date materialisation. Not part of
    /// the normal hot path (lazy flush already keeps `log` amortised).
    pub fn flush_all(&mut self) -> DbResult<()> {
        let mut pool = self.pool.write().expect("buffer pool lock poisoned");
        let page_size = pool.page_size();
        let diff = drain_subtree(&mut pool, self.root, Family::default(), self.width, page_size)?;
        self.apply_root_diff(&mut pool, diff)
    }

    /// Clears the view back to a single empty leaf, freeing every page of
    /// the previous tree.
    pub fn clear(&mut self) -> DbResult<()> {
        let mut pool = self.pool.write().expect("buffer pool lock poisoned");
        free_subtree(&mut pool, self.root, self.width)?;
        self.root = new_leaf(&mut pool, self.width)?;
        Ok(())
    }

    /// Returns every tuple currently in the view, ascending lexicographic
    /// order, after forcing a full flush.
    pub fn scan_tuples(&mut self) -> DbResult<Vec<Vec<i32>>> {
        self.flush_all()?;
        let mut pool = self.pool.write().expect("buffer pool lock poisoned");

        let mut pid = self.root;
        loop {
            let node = load(&mut pool, pid, self.width)?;
            pool.unpin(pid, false)?;
            match node {
                FTrieNode::Leaf { .. } => break,
                FTrieNode::Branch { children, .. } => pid = children[0],
            }
        }

        let mut out = Vec::new();
        loop {
            let node = load(&mut pool, pid, self.width)?;
            pool.unpin(pid, false)?;
            match node {
                FTrieNode::Leaf { records, next, .. } => {
                    out.extend(records);
                    if next == INVALID_PAGE {
                        break;
                    }
                    pid = next;
                }
                FTrieNode::Branch { .. } => unreachable!("leaf chain must only contain leaves"),
            }
        }
        Ok(out)
    }
}

fn load(pool: &mut BufferPool, nid: PageId, width: usize) -> DbResult<FTrieNode> {
    pool.pin(nid, false)?;
    FTrieNode::decode(pool.get_page(nid)?, width)
}
