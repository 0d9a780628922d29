//! The heap file (§3 DATA MODEL "Heap File", §4.8 "Naïve alternative"): an
//! append-only singly-linked list of pages, used only as the naïve
//! equijoin's materialisation sink. Grounded on `heap_file.h`/`heap_file.cpp`:
//! each page holds a record count, a next-page pointer, and a flat run of
//! integers; `append` spills into a fresh page once the current one is
//! full, `clear` frees every page but the first, leaving it empty.

use log::debug;

use crate::error::DbResult;
use crate::pager::BufferPool;
use crate::types::{PageId, Pod, INVALID_PAGE};

/// count, next.
const HEADER_LEN: usize = 4 + 4;

fn read_i32(buf: &[u8], off: usize) -> i32 {
    i32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}
fn write_i32(buf: &mut [u8], off: usize, v: i32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}
fn read_pid(buf: &[u8], off: usize) -> PageId {
    u32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}
fn write_pid(buf: &mut [u8], off: usize, v: PageId) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

fn page_cap(page_size: usize) -> usize {
    (page_size - HEADER_LEN) / 4
}

fn new_page(pool: &mut BufferPool) -> DbResult<PageId> {
    let pid = pool.new_pages(1)?;
    {
        let buf = pool.get_page_mut(pid)?;
        write_i32(buf, 0, 0);
        write_pid(buf, 4, INVALID_PAGE);
    }
    pool.unpin(pid, true)?;
    Ok(pid)
}

/// An append-only materialisation sink for the naïve equijoin's replayed
/// join output. Unlike the B+-Trie and fractal trie, a heap file has no
/// lookup structure at all: it exists purely to give `recompute` somewhere
/// to pour tuples that mirrors the original's "naïve" baseline.
pub struct HeapFile {
    pool: Pod<BufferPool>,
    first: PageId,
    last: PageId,
}

impl HeapFile {
    pub fn create(pool: Pod<BufferPool>) -> DbResult<Self> {
        let first = {
            let mut p = pool.write().expect("buffer pool lock poisoned");
            new_page(&mut p)?
        };
        Ok(HeapFile { pool, first, last: first })
    }

    /// Appends `data` to the end of the file, spilling into a freshly
    /// allocated page first if it would not fit in the current last page.
    pub fn append(&mut self, data: &[i32]) -> DbResult<()> {
        let mut pool = self.pool.write().expect("buffer pool lock poisoned");
        let cap = page_cap(pool.page_size());

        pool.pin(self.last, false)?;
        let count = read_i32(pool.get_page(self.last)?, 0) as usize;

        if count + data.len() > cap {
            pool.unpin(self.last, false)?;
            let new_pid = new_page(&mut pool)?;

            pool.pin(self.last, false)?;
            {
                let buf = pool.get_page_mut(self.last)?;
                write_pid(buf, 4, new_pid);
            }
            pool.unpin(self.last, true)?;

            self.last = new_pid;
            pool.pin(self.last, false)?;
        }

        let count = read_i32(pool.get_page(self.last)?, 0) as usize;
        {
            let buf = pool.get_page_mut(self.last)?;
            let off = HEADER_LEN + count * 4;
            for (i, v) in data.iter().enumerate() {
                write_i32(buf, off + i * 4, *v);
            }
            write_i32(buf, 0, (count + data.len()) as i32);
        }
        pool.unpin(self.last, true)?;
        Ok(())
    }

    /// Frees every page but the first, and empties that one.
    pub fn clear(&mut self) -> DbResult<()> {
        let mut pool = self.pool.write().expect("buffer pool lock poisoned");

        while self.first != self.last {
            pool.pin(self.first, false)?;
            let next = read_pid(pool.get_page(self.first)?, 4);
            pool.unpin(self.first, false)?;
            pool.free_page(self.first)?;
            self.first = next;
        }

        pool.pin(self.first, false)?;
        {
            let buf = pool.get_page_mut(self.first)?;
            write_i32(buf, 0, 0);
            write_pid(buf, 4, INVALID_PAGE);
        }
        pool.unpin(self.first, true)?;
        debug!("heap file: cleared, retaining page {}", self.first);
        Ok(())
    }

    /// Returns every integer appended so far, in append order, grouped into
    /// `width`-wide records. The naïve query itself never reads its own
    /// heap file back; this exists for tests and diagnostics.
    pub fn scan_all(&mut self, width: usize) -> DbResult<Vec<Vec<i32>>> {
        let mut pool = self.pool.write().expect("buffer pool lock poisoned");
        let mut out = Vec::new();
        let mut pid = self.first;
        loop {
            pool.pin(pid, false)?;
            let buf = pool.get_page(pid)?;
            let count = read_i32(buf, 0) as usize;
            let next = read_pid(buf, 4);
            let mut flat = Vec::with_capacity(count);
            for i in 0..count {
                flat.push(read_i32(buf, HEADER_LEN + i * 4));
            }
            pool.unpin(pid, false)?;

            out.extend(flat.chunks(width).map(|c| c.to_vec()));
            if next == INVALID_PAGE {
                break;
            }
            pid = next;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PAGE_SIZE;
    use crate::pager::Allocator;
    use std::sync::{Arc, RwLock};

    fn pool(name: &str) -> Pod<BufferPool> {
        let path = std::env::temp_dir().join(format!("small-db-heap-{}.db", name));
        let alloc = Allocator::new(path, PAGE_SIZE, 4096).unwrap();
        Arc::new(RwLock::new(BufferPool::new(alloc, 64)))
    }

    #[test]
    fn append_and_scan_round_trip() {
        let p = pool("roundtrip");
        let mut h = HeapFile::create(p).unwrap();
        for i in 0..500 {
            h.append(&[i, i * 2]).unwrap();
        }
        let records = h.scan_all(2).unwrap();
        assert_eq!(records.len(), 500);
        assert_eq!(records[499], vec![499, 998]);
    }

    #[test]
    fn clear_empties_but_keeps_one_page() {
        let p = pool("clear");
        let mut h = HeapFile::create(p).unwrap();
        for i in 0..500 {
            h.append(&[i]).unwrap();
        }
        h.clear().unwrap();
        assert_eq!(h.scan_all(1).unwrap(), Vec::<Vec<i32>>::new());
        assert_eq!(h.first, h.last);
    }
}
