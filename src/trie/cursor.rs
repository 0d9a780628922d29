//! The polymorphic trie-cursor contract (§4.5) and the B+-Trie cursor that
//! implements it over one nested relation. A cursor carries an implicit
//! current depth `d` starting at -1; `open`/`up` move between depths,
//! `next`/`seek` move within a depth, and `key`/`at_end` report state at
//! the current depth.
//!
//! Column ordering. A relation participates at exactly two depths in a
//! shared global ordering (its `order1`/`order2`); every other depth is a
//! "passthrough" the cursor must count through without touching its own
//! data — `open`/`up` just move the depth counter, `key` returns
//! [`NEG_INF`], and `at_end` stays `false`.

use crate::db::HandyRwLock;
use crate::error::DbResult;
use crate::trie::btrie;
use crate::types::{PageId, Pod, INVALID_PAGE};

/// Sentinel returned by `key()` at a passthrough depth, or before a cursor
/// has opened its first real depth. Chosen so it never collides with a
/// real two's-complement minimum that could be stored (records hold
/// ordinary relation integers, not `i32::MIN`).
pub const NEG_INF: i32 = i32::MIN;
/// Sentinel returned by `key()` once a depth has been exhausted.
pub const POS_INF: i32 = i32::MAX;

/// A cursor over one relation or sub-expression, consumed by the leapfrog
/// triejoin (§4.6). `open`/`up`/`next`/`seek` return `Err` only for I/O or
/// corruption failures from the underlying pager; navigating past the end
/// is reported through `at_end`, not an error, except that `open` at an
/// already-ended depth is a contract violation the caller must avoid (the
/// leapfrog operator never does; see its `search` loop).
pub trait TrieCursor {
    fn open(&mut self) -> DbResult<()>;
    fn up(&mut self) -> DbResult<()>;
    fn next(&mut self) -> DbResult<()>;
    fn seek(&mut self, key: i32) -> DbResult<()>;
    fn key(&self) -> i32;
    fn at_end(&self) -> bool;
    fn at_valid_depth(&self) -> bool;
}

/// Navigation state for one physical B+-Trie level (the outer trie, or the
/// inner trie once opened). Per the pinning discipline, exactly the
/// current leaf is pinned while the cursor sits at this level.
struct Level {
    root: PageId,
    leaf: PageId,
    pos: usize,
    ended: bool,
}

impl Level {
    fn closed() -> Self {
        Level { root: INVALID_PAGE, leaf: INVALID_PAGE, pos: 0, ended: true }
    }
}

/// A trie cursor over one nested relation (outer trie over X, each leaf
/// slot pointing to an inner trie over Y). Grounded on `btrie_iterator.cpp`:
/// the cursor remembers only the page it is currently positioned at (here,
/// re-deriving ancestry via [`btrie::find`] from the level's root rather
/// than threading an explicit parent stack — functionally equivalent for
/// `seek`, which always re-establishes a root-to-leaf path).
pub struct BTrieCursor {
    pool: Pod<crate::pager::BufferPool>,
    outer_root: PageId,
    /// Global depths (ascending) at which this relation's two columns
    /// appear: `cols[0]` is the depth of the outer (first) column, `cols[1]`
    /// the depth of the inner (second) column.
    cols: [usize; 2],
    depth: i32,
    outer: Level,
    inner: Level,
}

impl BTrieCursor {
    pub fn new(pool: Pod<crate::pager::BufferPool>, outer_root: PageId, col0: usize, col1: usize) -> Self {
        assert!(col0 != col1);
        let cols = if col0 < col1 { [col0, col1] } else { [col1, col0] };
        BTrieCursor {
            pool,
            outer_root,
            cols,
            depth: -1,
            outer: Level::closed(),
            inner: Level::closed(),
        }
    }

    fn outer_col_depth(&self) -> usize {
        // The outer (X) column is always the lower of the two, since the
        // relation layer normalises storage so order1 < order2 internally
        // -- see `crate::relation`.
        self.cols[0]
    }

    fn inner_col_depth(&self) -> usize {
        self.cols[1]
    }

    fn open_level_leftmost(&mut self, root: PageId) -> DbResult<Level> {
        let mut pool = self.pool.wl();
        let (leaf, pos) = btrie::find(&mut pool, root, NEG_INF)?;
        let count = btrie::leaf_count(&mut pool, leaf)?;
        Ok(Level { root, leaf, pos, ended: pos >= count })
    }

    fn close_level(level: &mut Level) {
        *level = Level::closed();
    }
}

impl TrieCursor for BTrieCursor {
    fn open(&mut self) -> DbResult<()> {
        debug_assert!(!self.at_end(), "open() on an ended cursor");
        self.depth += 1;
        let d = self.depth as usize;

        if d == self.outer_col_depth() {
            self.outer = self.open_level_leftmost(self.outer_root)?;
        } else if d == self.inner_col_depth() {
            let rec = {
                let mut pool = self.pool.wl();
                btrie::read_record(&mut pool, self.outer.leaf, self.outer.pos)?
            };
            let inner_root = rec[1] as PageId;
            self.inner = self.open_level_leftmost(inner_root)?;
        }
        Ok(())
    }

    fn up(&mut self) -> DbResult<()> {
        let d = self.depth as usize;
        if self.depth >= 0 && d == self.inner_col_depth() {
            Self::close_level(&mut self.inner);
        } else if self.depth >= 0 && d == self.outer_col_depth() {
            Self::close_level(&mut self.outer);
        }
        self.depth -= 1;
        Ok(())
    }

    fn next(&mut self) -> DbResult<()> {
        if !self.at_valid_depth() {
            return Ok(());
        }
        let inner_depth = self.depth as usize == self.inner_col_depth();
        let level = if inner_depth { &mut self.inner } else { &mut self.outer };
        if level.ended {
            return Ok(());
        }

        let mut pool = self.pool.wl();
        level.pos += 1;
        let count = btrie::leaf_count(&mut pool, level.leaf)?;
        if level.pos >= count {
            let nxt = btrie::leaf_next(&mut pool, level.leaf)?;
            if nxt == INVALID_PAGE {
                level.ended = true;
            } else {
                level.leaf = nxt;
                level.pos = 0;
                let count = btrie::leaf_count(&mut pool, level.leaf)?;
                level.ended = level.pos >= count;
            }
        }
        Ok(())
    }

    fn seek(&mut self, key: i32) -> DbResult<()> {
        if !self.at_valid_depth() {
            return Ok(());
        }
        if self.key() >= key {
            return Ok(());
        }
        let inner_depth = self.depth as usize == self.inner_col_depth();
        let root = if inner_depth { self.inner.root } else { self.outer.root };

        let mut pool = self.pool.wl();
        let (leaf, pos) = btrie::find(&mut pool, root, key)?;
        let count = btrie::leaf_count(&mut pool, leaf)?;
        let level = if inner_depth { &mut self.inner } else { &mut self.outer };
        level.leaf = leaf;
        level.pos = pos;
        level.ended = pos >= count;
        Ok(())
    }

    fn key(&self) -> i32 {
        if !self.at_valid_depth() {
            return NEG_INF;
        }
        let inner_depth = self.depth as usize == self.inner_col_depth();
        let level = if inner_depth { &self.inner } else { &self.outer };
        if level.ended {
            return POS_INF;
        }
        // `key` must not block on pool I/O errors (the trait has no
        // fallible accessor); the record was already validated present by
        // the last `open`/`next`/`seek`, so re-reading it cannot fail
        // short of corruption, which panics here same as elsewhere in the
        // trie layer.
        let mut pool = self.pool.wl();
        let rec = btrie::read_record(&mut pool, level.leaf, level.pos)
            .expect("cursor leaf slot vanished underneath a live cursor");
        rec[0]
    }

    fn at_end(&self) -> bool {
        if !self.at_valid_depth() {
            return false;
        }
        let inner_depth = self.depth as usize == self.inner_col_depth();
        if inner_depth { self.inner.ended } else { self.outer.ended }
    }

    fn at_valid_depth(&self) -> bool {
        self.depth >= 0
            && (self.depth as usize == self.outer_col_depth()
                || self.depth as usize == self.inner_col_depth())
    }
}
