//! The relation (table) layer (§4.4): a two-column relation stored as a
//! nested B+-Trie, fixing the physical outer/inner column assignment to
//! the lower/higher of the relation's two global join depths regardless
//! of the order the caller's `insert`/`remove` arguments arrive in.

use crate::db::HandyRwLock;
use crate::error::DbResult;
use crate::pager::BufferPool;
use crate::trie::btrie::{self, Family, Propagate, NO_SIBS};
use crate::trie::node::BTrieNode;
use crate::trie::{BTrieCursor, SingletonCursor};
use crate::types::{PageId, Pod};

/// Collapses a lone-empty leaf or a one-child branch at `root` to its
/// surviving child, freeing the vacated page. Used after a removal may
/// have emptied an inner tree, and again by the relation after an outer
/// deletion returns (§4.4).
fn collapse_root(pool: &mut BufferPool, root: PageId) -> DbResult<PageId> {
    pool.pin(root, false)?;
    let node = BTrieNode::decode(pool.get_page(root)?)?;
    pool.unpin(root, false)?;

    match node {
        BTrieNode::Branch { children, keys, .. } if keys.is_empty() => {
            let child = children[0];
            pool.free_page(root)?;
            Ok(child)
        }
        _ => Ok(root),
    }
}

fn is_empty_leaf(pool: &mut BufferPool, root: PageId) -> DbResult<bool> {
    pool.pin(root, false)?;
    let node = BTrieNode::decode(pool.get_page(root)?)?;
    pool.unpin(root, false)?;
    Ok(matches!(node, BTrieNode::Leaf { records, .. } if records.is_empty()))
}

/// A two-column relation: an outer B+-Trie over the column at
/// `min(order1, order2)`, whose leaf slots point to inner B+-Tries over
/// the column at `max(order1, order2)`.
pub struct Relation {
    pool: Pod<BufferPool>,
    outer_root: PageId,
    order1: usize,
    order2: usize,
    reversed: bool,
}

impl Relation {
    /// Creates a fresh, empty relation participating at global depths
    /// `order1` and `order2`.
    pub fn create(pool: Pod<BufferPool>, order1: usize, order2: usize) -> DbResult<Self> {
        let outer_root = {
            let mut p = pool.wl();
            btrie::new_leaf(&mut p, 2)?
        };
        Ok(Relation { pool, outer_root, order1, order2, reversed: order1 > order2 })
    }

    fn normalize(&self, x: i32, y: i32) -> (i32, i32) {
        if self.reversed { (y, x) } else { (x, y) }
    }

    /// Inserts row `(x, y)`. Returns `true` iff the row did not already
    /// exist.
    pub fn insert(&mut self, x: i32, y: i32) -> DbResult<bool> {
        let (ox, oy) = self.normalize(x, y);
        let mut pool = self.pool.wl();

        let (diff, leaf, pos) = btrie::reserve(&mut pool, self.outer_root, ox, NO_SIBS)?;

        if diff.prop == Propagate::Nothing {
            // ox already present: descend into its existing inner trie.
            let rec = btrie::read_record(&mut pool, leaf, pos)?;
            let inner_root = rec[1] as PageId;
            let (idiff, _, _) = btrie::reserve(&mut pool, inner_root, oy, NO_SIBS)?;

            if idiff.prop == Propagate::Nothing {
                return Ok(false);
            }
            if idiff.prop == Propagate::Split {
                let new_root = btrie::new_branch(&mut pool, inner_root, idiff.key, idiff.pid)?;
                btrie::write_record(&mut pool, leaf, pos, vec![ox, new_root as i32])?;
            }
            return Ok(true);
        }

        // ox is a brand-new outer slot: give it a fresh one-row inner trie.
        if diff.prop == Propagate::Split {
            self.outer_root = btrie::new_branch(&mut pool, self.outer_root, diff.key, diff.pid)?;
        }

        let inner_root = btrie::new_leaf(&mut pool, 1)?;
        btrie::reserve(&mut pool, inner_root, oy, NO_SIBS)?;
        btrie::write_record(&mut pool, leaf, pos, vec![ox, inner_root as i32])?;
        Ok(true)
    }

    /// Removes row `(x, y)` if present. Returns `true` iff a row was
    /// actually removed.
    pub fn remove(&mut self, x: i32, y: i32) -> DbResult<bool> {
        let (ox, oy) = self.normalize(x, y);
        let mut pool = self.pool.wl();
        let mut removed = false;

        {
            let removed_ref = &mut removed;
            let mut predicate = move |pool: &mut BufferPool, leaf: PageId, pos: usize| -> DbResult<bool> {
                let rec = btrie::read_record(pool, leaf, pos)?;
                let inner_root = rec[1] as PageId;

                let mut innermost = |_: &mut BufferPool, _: PageId, _: usize| Ok(true);
                let idiff = btrie::delete_if(pool, inner_root, oy, Family::default(), &mut innermost)?;

                if idiff.prop == Propagate::Nothing {
                    *removed_ref = false;
                    return Ok(false);
                }
                *removed_ref = true;

                let new_root = collapse_root(pool, inner_root)?;
                if is_empty_leaf(pool, new_root)? {
                    pool.free_page(new_root)?;
                    Ok(true)
                } else {
                    btrie::write_record(pool, leaf, pos, vec![ox, new_root as i32])?;
                    Ok(false)
                }
            };
            btrie::delete_if(&mut pool, self.outer_root, ox, Family::default(), &mut predicate)?;
        }

        self.outer_root = collapse_root(&mut pool, self.outer_root)?;
        Ok(removed)
    }

    /// A trie cursor scanning every row of this relation.
    pub fn scan(&self) -> DbResult<BTrieCursor> {
        Ok(BTrieCursor::new(self.pool.clone(), self.outer_root, self.order1, self.order2))
    }

    /// A cursor behaving as the scan of a relation containing exactly the
    /// row `(x, y)`, used by incremental `update` for the changed relation.
    pub fn singleton(&self, x: i32, y: i32) -> SingletonCursor {
        SingletonCursor::new(self.order1, x, self.order2, y)
    }

    pub fn order1(&self) -> usize {
        self.order1
    }

    pub fn order2(&self) -> usize {
        self.order2
    }
}
