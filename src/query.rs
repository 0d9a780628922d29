//! Query orchestration (§4.8): the two supported query shapes, `Count` and
//! `EquiJoin`, each in an incremental and a naïve variant. Grounded on
//! `query.h`/`incremental_count.h`/`naive_count.h`/`incremental_equijoin.h`/
//! `naive_equijoin.h`: a query owns the relations it joins over, and reacts
//! to `update(table, op, x, y)` either by rebuilding from scratch (naïve) or
//! by joining a singleton cursor for the changed relation against full
//! scans of the rest and folding the resulting delta into its output
//! (incremental).

use crate::error::DbResult;
use crate::ftrie::node::Message;
use crate::ftrie::{MsgKind, View};
use crate::heap::HeapFile;
use crate::relation::Relation;
use crate::trie::TrieCursor;
use crate::leapfrog::LeapfrogTriejoin;

/// The kind of change a `Query::update` call applies to one relation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Insert,
    Delete,
}

/// A live query over a fixed set of relations, kept up to date as the
/// relations themselves change.
pub trait Query {
    /// Applies `op(x, y)` to `relations[table]` and folds the change into
    /// this query's output. `table` out of range is not an error: it is
    /// treated the same as a call that touched nothing (mirrors the
    /// source's "table not found ⇒ no change" behaviour).
    fn update(&mut self, table: usize, op: Op, x: i32, y: i32) -> DbResult<()>;

    /// Rebuilds the query's output from the current contents of every
    /// relation, ignoring any incremental state.
    fn recompute(&mut self) -> DbResult<()>;
}

fn apply_op(relations: &mut [Relation], table: usize, op: Op, x: i32, y: i32) -> DbResult<bool> {
    match relations.get_mut(table) {
        Some(rel) => match op {
            Op::Insert => rel.insert(x, y),
            Op::Delete => rel.remove(x, y),
        },
        None => Ok(false),
    }
}

fn full_scan_cursors(relations: &[Relation]) -> DbResult<Vec<Box<dyn TrieCursor>>> {
    relations.iter().map(|rel| Ok(Box::new(rel.scan()?) as Box<dyn TrieCursor>)).collect()
}

fn delta_cursors(relations: &[Relation], table: usize, x: i32, y: i32) -> DbResult<Vec<Box<dyn TrieCursor>>> {
    relations
        .iter()
        .enumerate()
        .map(|(i, rel)| {
            if i == table {
                Ok(Box::new(rel.singleton(x, y)) as Box<dyn TrieCursor>)
            } else {
                Ok(Box::new(rel.scan()?) as Box<dyn TrieCursor>)
            }
        })
        .collect()
}

/// Walks a join to its full depth, depth-first, collecting one width-wide
/// tuple per leaf reached. Shared by both query shapes.
fn drain_tuples(cur: &mut dyn TrieCursor, width: usize) -> DbResult<Vec<Vec<i32>>> {
    let mut out = Vec::new();
    let mut prefix = Vec::with_capacity(width);
    drain_rec(cur, width, &mut prefix, &mut out)?;
    Ok(out)
}

fn drain_rec(
    cur: &mut dyn TrieCursor,
    width: usize,
    prefix: &mut Vec<i32>,
    out: &mut Vec<Vec<i32>>,
) -> DbResult<()> {
    cur.open()?;
    while !cur.at_end() {
        prefix.push(cur.key());
        if prefix.len() == width {
            out.push(prefix.clone());
        } else {
            drain_rec(cur, width, prefix, out)?;
        }
        prefix.pop();
        cur.next()?;
    }
    cur.up()?;
    Ok(())
}

/// Same traversal as `drain_tuples`, but only counts leaves reached —
/// `Count` never needs the tuples themselves.
fn count_leaves(cur: &mut dyn TrieCursor, width: usize) -> DbResult<usize> {
    fn rec(cur: &mut dyn TrieCursor, depth: usize, width: usize) -> DbResult<usize> {
        cur.open()?;
        let mut n = 0;
        while !cur.at_end() {
            n += if depth + 1 == width { 1 } else { rec(cur, depth + 1, width)? };
            cur.next()?;
        }
        cur.up()?;
        Ok(n)
    }
    rec(cur, 0, width)
}

/// A running count of the natural join's size (§4.8 "Count").
pub struct Count {
    relations: Vec<Relation>,
    width: usize,
    naive: bool,
    count: i64,
}

impl Count {
    pub fn create(relations: Vec<Relation>, width: usize, naive: bool) -> Self {
        Count { relations, width, naive, count: 0 }
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    fn update_incremental(&mut self, table: usize, op: Op, x: i32, y: i32) -> DbResult<()> {
        let cursors = delta_cursors(&self.relations, table, x, y)?;
        let mut join = LeapfrogTriejoin::new(self.width, cursors);
        let delta = count_leaves(&mut join, self.width)? as i64;
        match op {
            Op::Insert => self.count += delta,
            Op::Delete => self.count -= delta,
        }
        Ok(())
    }
}

impl Query for Count {
    fn update(&mut self, table: usize, op: Op, x: i32, y: i32) -> DbResult<()> {
        let changed = apply_op(&mut self.relations, table, op, x, y)?;
        if self.naive {
            return self.recompute();
        }
        if !changed {
            return Ok(());
        }
        self.update_incremental(table, op, x, y)
    }

    fn recompute(&mut self) -> DbResult<()> {
        let cursors = full_scan_cursors(&self.relations)?;
        let mut join = LeapfrogTriejoin::new(self.width, cursors);
        self.count = count_leaves(&mut join, self.width)? as i64;
        Ok(())
    }
}

/// The materialisation sink behind an `EquiJoin`: a fractal-trie view for
/// the incremental variant, a heap file for the naïve one.
pub enum Sink {
    View(View),
    Heap(HeapFile),
}

/// A materialised equi-join of a fixed set of relations (§4.8 "EquiJoin").
pub struct EquiJoin {
    relations: Vec<Relation>,
    width: usize,
    sink: Sink,
}

impl EquiJoin {
    pub fn create(relations: Vec<Relation>, width: usize, sink: Sink) -> Self {
        EquiJoin { relations, width, sink }
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut Sink {
        &mut self.sink
    }

    fn update_incremental(&mut self, table: usize, op: Op, x: i32, y: i32) -> DbResult<()> {
        let cursors = delta_cursors(&self.relations, table, x, y)?;
        let mut join = LeapfrogTriejoin::new(self.width, cursors);
        let tuples = drain_tuples(&mut join, self.width)?;

        let kind = match op {
            Op::Insert => MsgKind::Insert,
            Op::Delete => MsgKind::Delete,
        };
        let msgs = tuples.into_iter().map(|key| Message { kind, key }).collect();

        match &mut self.sink {
            Sink::View(view) => view.log(msgs),
            Sink::Heap(_) => unreachable!("the heap sink only ever takes the naive path"),
        }
    }
}

impl Query for EquiJoin {
    fn update(&mut self, table: usize, op: Op, x: i32, y: i32) -> DbResult<()> {
        let changed = apply_op(&mut self.relations, table, op, x, y)?;
        if matches!(self.sink, Sink::Heap(_)) {
            return self.recompute();
        }
        if !changed {
            return Ok(());
        }
        self.update_incremental(table, op, x, y)
    }

    fn recompute(&mut self) -> DbResult<()> {
        let cursors = full_scan_cursors(&self.relations)?;
        let mut join = LeapfrogTriejoin::new(self.width, cursors);
        let tuples = drain_tuples(&mut join, self.width)?;

        match &mut self.sink {
            Sink::View(view) => {
                view.clear()?;
                let msgs = tuples.into_iter().map(|key| Message { kind: MsgKind::Insert, key }).collect();
                view.log(msgs)
            }
            Sink::Heap(heap) => {
                heap.clear()?;
                for t in &tuples {
                    heap.append(t)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PAGE_SIZE;
    use crate::pager::{Allocator, BufferPool};
    use std::sync::{Arc, RwLock};

    fn pool(name: &str) -> Arc<RwLock<BufferPool>> {
        let path = std::env::temp_dir().join(format!("small-db-query-{}.db", name));
        let alloc = Allocator::new(path, PAGE_SIZE, 8192).unwrap();
        Arc::new(RwLock::new(BufferPool::new(alloc, 512)))
    }

    // R(x,y), S(y,z), T(x,z); global depths x=0, y=1, z=2.
    fn build_rst(pool: Arc<RwLock<BufferPool>>) -> Vec<Relation> {
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

    #[test]
    fn count_recompute_matches_s5_join_size() {
        let pool = pool("count-recompute");
        let rels = build_rst(pool);
        let mut q = Count::create(rels, 3, false);
        q.recompute().unwrap();
        assert_eq!(q.count(), 4);
    }

    /// Scenario S6: update(R, Insert, 9, 4) changes nothing (no matching
    /// T-tuple for x=9); a subsequent update(T, Insert, 9, 0) adds exactly 1.
    #[test]
    fn scenario_s6_incremental_count() {
        let pool = pool("count-s6");
        let rels = build_rst(pool);
        let mut q = Count::create(rels, 3, false);
        q.recompute().unwrap();
        assert_eq!(q.count(), 4);

        q.update(0, Op::Insert, 9, 4).unwrap();
        assert_eq!(q.count(), 4);

        q.update(2, Op::Insert, 9, 0).unwrap();
        assert_eq!(q.count(), 5);
    }

    #[test]
    fn naive_count_recomputes_every_update() {
        let pool = pool("count-naive");
        let rels = build_rst(pool);
        let mut q = Count::create(rels, 3, true);
        q.update(0, Op::Insert, 9, 4).unwrap();
        assert_eq!(q.count(), 4);
        q.update(2, Op::Insert, 9, 0).unwrap();
        assert_eq!(q.count(), 5);
    }

    #[test]
    fn equijoin_view_matches_s5_tuples() {
        let pool = pool("equijoin-view");
        let rels = build_rst(pool.clone());
        let view = View::create(pool, 3).unwrap();
        let mut q = EquiJoin::create(rels, 3, Sink::View(view));
        q.recompute().unwrap();

        let tuples = match q.sink_mut() {
            Sink::View(v) => v.scan_tuples().unwrap(),
            _ => unreachable!(),
        };
        assert_eq!(
            tuples,
            vec![vec![7, 4, 0], vec![7, 4, 1], vec![7, 4, 2], vec![8, 4, 3]]
        );
    }

    #[test]
    fn equijoin_view_incremental_update_adds_one_tuple() {
        let pool = pool("equijoin-incremental");
        let rels = build_rst(pool.clone());
        let view = View::create(pool, 3).unwrap();
        let mut q = EquiJoin::create(rels, 3, Sink::View(view));
        q.recompute().unwrap();

        q.update(2, Op::Insert, 9, 0).unwrap();
        q.update(0, Op::Insert, 9, 4).unwrap();

        let tuples = match q.sink_mut() {
            Sink::View(v) => v.scan_tuples().unwrap(),
            _ => unreachable!(),
        };
        assert_eq!(
            tuples,
            vec![vec![7, 4, 0], vec![7, 4, 1], vec![7, 4, 2], vec![8, 4, 3], vec![9, 4, 0]]
        );
    }

    #[test]
    fn equijoin_heap_sink_is_rebuilt_on_every_update() {
        let pool = pool("equijoin-heap");
        let rels = build_rst(pool.clone());
        let heap = HeapFile::create(pool).unwrap();
        let mut q = EquiJoin::create(rels, 3, Sink::Heap(heap));
        q.recompute().unwrap();

        q.update(2, Op::Insert, 9, 0).unwrap();
        q.update(0, Op::Insert, 9, 4).unwrap();

        let rows = match q.sink_mut() {
            Sink::Heap(h) => h.scan_all(3).unwrap(),
            _ => unreachable!(),
        };
        assert_eq!(rows.len(), 5);
        assert!(rows.contains(&vec![9, 4, 0]));
    }
}
