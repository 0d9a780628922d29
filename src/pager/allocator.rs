use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bit_vec::BitVec;
use log::{debug, error};

use crate::error::{DbError, DbResult};
use crate::types::PageId;

/// A paged file allocator: owns a contiguous backing file of `num_pages`
/// fixed-size pages and a space bitmap kept entirely in RAM (the bitmap is
/// never persisted; the file is anonymous to the allocator and truncated at
/// construction, per the storage layer's design notes).
pub struct Allocator {
    path: PathBuf,
    file: File,
    page_size: usize,
    num_pages: usize,
    space_map: BitVec,
}

impl Allocator {
    /// Creates (or truncates) the backing file at `path` and starts with an
    /// empty bitmap.
    pub fn new<P: AsRef<Path>>(
        path: P,
        page_size: usize,
        num_pages: usize,
    ) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len((page_size * num_pages) as u64)?;

        Ok(Self {
            path,
            file,
            page_size,
            num_pages,
            space_map: BitVec::from_elem(num_pages, false),
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the first page id of a run of `n` contiguous free pages,
    /// marking them allocated. `n = 0` is accepted and returns a
    /// valid-but-zero-length run without touching the bitmap.
    pub fn allocate(&mut self, n: usize) -> DbResult<PageId> {
        if n == 0 {
            return Ok(0);
        }

        let mut run_start = None;
        let mut run_len = 0;
        for i in 0..self.num_pages {
            if !self.space_map[i] {
                if run_len == 0 {
                    run_start = Some(i);
                }
                run_len += 1;
                if run_len == n {
                    let start = run_start.unwrap();
                    for bit in start..start + n {
                        self.space_map.set(bit, true);
                    }
                    debug!("allocator: allocated [{}, {}) ", start, start + n);
                    return Ok(start as PageId);
                }
            } else {
                run_len = 0;
                run_start = None;
            }
        }

        error!("allocator exhausted: no run of {} free pages", n);
        Err(DbError::NoSpace)
    }

    /// Clears the bits for `[p0, p0+n)`. Idempotent; never validates
    /// whether the bits were previously set.
    pub fn free(&mut self, p0: PageId, n: usize) {
        let start = p0 as usize;
        for bit in start..start + n {
            if bit < self.num_pages {
                self.space_map.set(bit, false);
            }
        }
        debug!("allocator: freed [{}, {})", start, start + n);
    }

    /// Reads exactly `page_size` bytes from page `p` into `buf`.
    pub fn read(&mut self, p: PageId, buf: &mut [u8]) -> DbResult<()> {
        if buf.len() != self.page_size {
            return Err(DbError::IoError(format!(
                "read buffer size {} does not match page size {}",
                buf.len(),
                self.page_size
            )));
        }
        self.file
            .seek(SeekFrom::Start(p as u64 * self.page_size as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    /// Writes exactly `page_size` bytes from `buf` to page `p`.
    pub fn write(&mut self, p: PageId, buf: &[u8]) -> DbResult<()> {
        if buf.len() != self.page_size {
            return Err(DbError::IoError(format!(
                "write buffer size {} does not match page size {}",
                buf.len(),
                self.page_size
            )));
        }
        self.file
            .seek(SeekFrom::Start(p as u64 * self.page_size as u64))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    /// Renders the space bitmap as a string of `0`/`1` characters, first
    /// page first. Used by tests and diagnostics only.
    pub fn debug_bitmap(&self) -> String {
        self.space_map
            .iter()
            .map(|b| if b { '1' } else { '0' })
            .collect()
    }
}

impl Drop for Allocator {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocator(name: &str, num_pages: usize) -> Allocator {
        let path = std::env::temp_dir().join(format!("small-db-alloc-{}.db", name));
        Allocator::new(path, 64, num_pages).unwrap()
    }

    #[test]
    fn scenario_s1() {
        let mut a = allocator("s1", 10);
        assert_eq!(a.allocate(3).unwrap(), 0);
        assert_eq!(a.allocate(4).unwrap(), 3);
        a.free(3, 2);
        assert_eq!(a.allocate(1).unwrap(), 3);
        assert_eq!(a.allocate(1).unwrap(), 4);
        assert_eq!(a.debug_bitmap(), "1111111000");
    }

    #[test]
    fn allocate_zero_is_noop() {
        let mut a = allocator("zero", 4);
        assert_eq!(a.allocate(0).unwrap(), 0);
        assert_eq!(a.debug_bitmap(), "0000");
    }

    #[test]
    fn exhaustion_fails() {
        let mut a = allocator("exhaustion", 4);
        assert_eq!(a.allocate(4).unwrap(), 0);
        assert!(matches!(a.allocate(1), Err(DbError::NoSpace)));
    }

    #[test]
    fn read_write_round_trip() {
        let mut a = allocator("rw", 4);
        let p = a.allocate(1).unwrap();
        let mut buf = vec![7u8; 64];
        a.write(p, &buf).unwrap();
        buf.fill(0);
        a.read(p, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 7));
    }
}
