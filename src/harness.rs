//! The CSV-driven external harness (§6.2): replays plain `x,y` relation
//! loads and `table,x,y` query updates from a reader, timing the latter.
//! Grounded on `test_bed.h`/`test_bed.cpp`'s `TestBed::runFile`: a single
//! operation (`Insert` or `Delete`) applies to every line of an update
//! file, and the first line that fails to parse silently ends the read —
//! the source surfaces no parse errors, and neither do we.

use std::io::BufRead;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::error::DbResult;
use crate::query::{Op, Query};
use crate::relation::Relation;

fn split_csv(line: &str) -> Vec<&str> {
    line.trim().split(',').collect()
}

fn parse_update_line(line: &str) -> Option<(usize, i32, i32)> {
    let parts = split_csv(line);
    if parts.len() != 3 {
        return None;
    }
    let table = parts[0].trim().parse().ok()?;
    let x = parts[1].trim().parse().ok()?;
    let y = parts[2].trim().parse().ok()?;
    Some((table, x, y))
}

fn parse_load_line(line: &str) -> Option<(i32, i32)> {
    let parts = split_csv(line);
    if parts.len() != 2 {
        return None;
    }
    let x = parts[0].trim().parse().ok()?;
    let y = parts[1].trim().parse().ok()?;
    Some((x, y))
}

/// Replays `table,x,y` lines from `reader` against `query` as `op`,
/// stopping at the first line that fails to parse. Returns the wall-clock
/// time spent inside `Query::update` across the whole run, matching the
/// source's `runFile`, which returns cumulative elapsed milliseconds rather
/// than a per-line figure.
pub fn run_updates<Q: Query, R: BufRead>(query: &mut Q, op: Op, reader: R) -> DbResult<Duration> {
    let mut elapsed = Duration::ZERO;

    for line in reader.lines() {
        let line = line?;
        let Some((table, x, y)) = parse_update_line(&line) else {
            warn!("harness: stopping at unparsable update line {:?}", line);
            break;
        };

        let start = Instant::now();
        query.update(table, op, x, y)?;
        elapsed += start.elapsed();
        info!("harness: applied {:?} to table {} ({}, {})", op, table, x, y);
    }

    Ok(elapsed)
}

/// Loads `x,y` lines from `reader` straight into `relation`, stopping at
/// the first line that fails to parse. Used to seed a relation's initial
/// contents before a query starts observing it (§6.2's "plain relation
/// loads" format).
pub fn load_relation<R: BufRead>(relation: &mut Relation, reader: R) -> DbResult<usize> {
    let mut loaded = 0;

    for line in reader.lines() {
        let line = line?;
        let Some((x, y)) = parse_load_line(&line) else {
            warn!("harness: stopping at unparsable load line {:?}", line);
            break;
        };
        relation.insert(x, y)?;
        loaded += 1;
    }

    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PAGE_SIZE;
    use crate::pager::{Allocator, BufferPool};
    use crate::query::Count;
    use std::io::Cursor;
    use std::sync::{Arc, RwLock};

    fn pool(name: &str) -> Arc<RwLock<BufferPool>> {
        let path = std::env::temp_dir().join(format!("small-db-harness-{}.db", name));
        let alloc = Allocator::new(path, PAGE_SIZE, 4096).unwrap();
        Arc::new(RwLock::new(BufferPool::new(alloc, 256)))
    }

    #[test]
    fn load_relation_stops_at_first_bad_line() {
        let pool = pool("load");
        let mut rel = Relation::create(pool, 0, 1).unwrap();
        let data = "1,2\n3,4\nnot a row\n5,6\n";
        let loaded = load_relation(&mut rel, Cursor::new(data)).unwrap();
        assert_eq!(loaded, 2);

        let mut cur = rel.scan().unwrap();
        use crate::trie::TrieCursor;
        cur.open().unwrap();
        assert_eq!(cur.key(), 1);
    }

    #[test]
    fn run_updates_feeds_each_line_to_the_query() {
        let pool = pool("updates");
        let r = Relation::create(pool.clone(), 0, 1).unwrap();
        let s = Relation::create(pool.clone(), 1, 2).unwrap();
        let t = Relation::create(pool, 0, 2).unwrap();
        let mut q = Count::create(vec![r, s, t], 3, false);
        q.recompute().unwrap();
        assert_eq!(q.count(), 0);

        let data = "0,9,4\n2,9,0\n";
        run_updates(&mut q, Op::Insert, Cursor::new(data)).unwrap();
        assert_eq!(q.count(), 1);
    }

    #[test]
    fn run_updates_stops_at_first_bad_line() {
        let pool = pool("updates-bad");
        let r = Relation::create(pool.clone(), 0, 1).unwrap();
        let s = Relation::create(pool.clone(), 1, 2).unwrap();
        let t = Relation::create(pool, 0, 2).unwrap();
        let mut q = Count::create(vec![r, s, t], 3, false);

        let data = "0,9,4\ngarbage\n2,9,0\n";
        run_updates(&mut q, Op::Insert, Cursor::new(data)).unwrap();
        q.recompute().unwrap();
        assert_eq!(q.count(), 0);
    }
}
