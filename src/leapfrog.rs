//! Leapfrog triejoin (§4.6): a multi-way equi-join over trie cursors,
//! itself exposed as a trie cursor so joins compose. Transliterated from
//! `leapfrog_triejoin.cpp`'s `open`/`up`/`next`/`seek`/`init`/`search`: the
//! iterators below `mJoinSize` (here `join_size`) are split each time the
//! depth changes into an active set (cursors with real data at this depth)
//! and a dormant set (passthrough cursors), the active set sorted
//! ascending by key, and `search` leapfrogs the round-robin pointer until
//! every active cursor agrees on a key or one of them ends.

use crate::error::DbResult;
use crate::trie::{TrieCursor, NEG_INF};

pub struct LeapfrogTriejoin {
    join_size: usize,
    depth: i32,
    next_iter: usize,
    cur_key: i32,
    ended: bool,
    active: Vec<Box<dyn TrieCursor>>,
    dormant: Vec<Box<dyn TrieCursor>>,
}

impl LeapfrogTriejoin {
    /// Joins `iters` according to the global column ordering's first
    /// `join_size` depths. Every global column that appears in the join
    /// must have at least one iterator carrying real data at that depth;
    /// this is a precondition, not checked here (mirrors the source).
    pub fn new(join_size: usize, iters: Vec<Box<dyn TrieCursor>>) -> Self {
        LeapfrogTriejoin {
            join_size,
            depth: -1,
            next_iter: 0,
            cur_key: NEG_INF,
            ended: false,
            active: Vec::new(),
            dormant: iters,
        }
    }

    fn init(&mut self) -> DbResult<()> {
        self.ended = false;
        let mut new_active = Vec::with_capacity(self.active.len() + self.dormant.len());
        let mut new_dormant = Vec::with_capacity(self.active.len() + self.dormant.len());

        for it in self.active.drain(..) {
            self.ended |= it.at_end();
            if it.at_valid_depth() {
                new_active.push(it);
            } else {
                new_dormant.push(it);
            }
        }
        for it in self.dormant.drain(..) {
            self.ended |= it.at_end();
            if it.at_valid_depth() {
                new_active.push(it);
            } else {
                new_dormant.push(it);
            }
        }

        new_active.sort_by_key(|it| it.key());
        self.active = new_active;
        self.dormant = new_dormant;
        self.next_iter = 0;
        self.search()
    }

    /// Advances all active cursors until their keys all match, or one of
    /// them ends.
    fn search(&mut self) -> DbResult<()> {
        let num = self.active.len();
        debug_assert!(num > 0, "leapfrog join needs at least one active cursor per valid depth");

        let prev = (self.next_iter + num - 1) % num;
        let mut max_key = self.active[prev].key();

        loop {
            let next_key = self.active[self.next_iter].key();
            if next_key == max_key {
                self.cur_key = next_key;
                return Ok(());
            }

            self.active[self.next_iter].seek(max_key)?;
            if self.active[self.next_iter].at_end() {
                self.ended = true;
                return Ok(());
            }
            max_key = self.active[self.next_iter].key();
            self.next_iter = (self.next_iter + 1) % num;
        }
    }

    fn advance_matched(&mut self, seek_to: Option<i32>) -> DbResult<()> {
        if !self.at_valid_depth() || self.at_end() {
            return Ok(());
        }
        match seek_to {
            Some(k) => self.active[self.next_iter].seek(k)?,
            None => self.active[self.next_iter].next()?,
        }
        if self.active[self.next_iter].at_end() {
            self.ended = true;
        } else {
            self.next_iter = (self.next_iter + 1) % self.active.len();
            self.search()?;
        }
        Ok(())
    }
}

impl TrieCursor for LeapfrogTriejoin {
    fn open(&mut self) -> DbResult<()> {
        self.depth += 1;
        if !self.at_valid_depth() {
            return Ok(());
        }
        debug_assert!(!self.ended, "open() on an ended leapfrog join");

        for it in self.active.iter_mut() {
            it.open()?;
        }
        for it in self.dormant.iter_mut() {
            it.open()?;
        }
        self.init()
    }

    fn up(&mut self) -> DbResult<()> {
        self.depth -= 1;
        if !self.at_valid_depth() {
            return Ok(());
        }
        for it in self.active.iter_mut() {
            it.up()?;
        }
        for it in self.dormant.iter_mut() {
            it.up()?;
        }
        self.init()
    }

    fn next(&mut self) -> DbResult<()> {
        self.advance_matched(None)
    }

    fn seek(&mut self, key: i32) -> DbResult<()> {
        self.advance_matched(Some(key))
    }

    fn key(&self) -> i32 {
        if !self.at_valid_depth() {
            return NEG_INF;
        }
        self.cur_key
    }

    fn at_end(&self) -> bool {
        self.at_valid_depth() && self.ended
    }

    fn at_valid_depth(&self) -> bool {
        self.depth >= 0 && (self.depth as usize) < self.join_size
    }
}
