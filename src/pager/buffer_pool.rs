use std::collections::HashMap;

use log::{debug, error};

use super::allocator::Allocator;
use super::frame::Frame;
use super::replacer::Replacer;
use crate::error::{DbError, DbResult};
use crate::types::{FrameId, PageId};

/// Fixed-count frame array over a single `Allocator`, with per-frame pin
/// count and dirty bit, and LRU eviction over unpinned frames. Grounded on
/// `BufMgr`/`Frame`/`Replacer` in the original source: `pin` finds a
/// resident frame or evicts the LRU victim; `unpin` releases a reference and
/// may make the frame eligible for eviction again.
pub struct BufferPool {
    allocator: Allocator,
    frames: Vec<Frame>,
    page_table: HashMap<PageId, FrameId>,
    replacer: Replacer,
    free_list: Vec<FrameId>,
}

impl BufferPool {
    pub fn new(allocator: Allocator, pool_size: usize) -> Self {
        let page_size = allocator.page_size();
        let frames = (0..pool_size).map(|_| Frame::new(page_size)).collect();
        let free_list = (0..pool_size).rev().collect();

        Self {
            allocator,
            frames,
            page_table: HashMap::new(),
            replacer: Replacer::new(pool_size),
            free_list,
        }
    }

    fn find_frame(&mut self) -> DbResult<FrameId> {
        if let Some(fid) = self.free_list.pop() {
            return Ok(fid);
        }
        self.replacer.pick_victim().ok_or_else(|| {
            error!("buffer pool exhausted: no unpinned frame to evict");
            DbError::NoFreeFrame
        })
    }

    /// Pins page `p`, making its bytes resident and incrementing its pin
    /// count. If `p` is not already resident, a victim frame is found (or
    /// the page is loaded fresh): dirty victims are written back first, and
    /// the frame is either zeroed (`empty = true`) or loaded from the
    /// allocator.
    pub fn pin(&mut self, p: PageId, empty: bool) -> DbResult<()> {
        if let Some(&fid) = self.page_table.get(&p) {
            self.replacer.frame_pinned(fid);
            self.frames[fid].pin();
            return Ok(());
        }

        let fid = self.find_frame()?;

        if !self.frames[fid].is_empty() {
            let old_page = self.frames[fid].page_id();
            if self.frames[fid].is_dirty() {
                self.allocator.write(old_page, self.frames[fid].buf())?;
            }
            self.page_table.remove(&old_page);
            debug!("buffer pool: evicted page {} from frame {}", old_page, fid);
        }

        self.frames[fid].set_page(p);
        if empty {
            self.frames[fid].buf_mut().iter_mut().for_each(|b| *b = 0);
        } else {
            self.allocator.read(p, self.frames[fid].buf_mut())?;
        }

        self.page_table.insert(p, fid);
        self.frames[fid].pin();
        debug!("buffer pool: pinned page {} in frame {}", p, fid);
        Ok(())
    }

    /// Decrements `p`'s pin count, marking the frame dirty iff `dirty`. Once
    /// the pin count reaches zero the frame rejoins the LRU list.
    pub fn unpin(&mut self, p: PageId, dirty: bool) -> DbResult<()> {
        let fid = *self.page_table.get(&p).ok_or(DbError::NotPinned)?;
        if !self.frames[fid].is_pinned() {
            return Err(DbError::NotPinned);
        }

        if dirty {
            self.frames[fid].mark();
        }
        self.frames[fid].unpin();

        if !self.frames[fid].is_pinned() {
            self.replacer.frame_unpinned(fid);
        }
        debug!("buffer pool: unpinned page {} (dirty={})", p, dirty);
        Ok(())
    }

    /// Allocates a contiguous run of `n` pages and pins the first one as
    /// empty, returning its page id.
    pub fn new_pages(&mut self, n: usize) -> DbResult<PageId> {
        let p = self.allocator.allocate(n)?;
        self.pin(p, true)?;
        Ok(p)
    }

    /// Requires pin count 0. Writes back `p` if dirty, evicts it from the
    /// buffer pool, and returns the page to the allocator.
    pub fn free_page(&mut self, p: PageId) -> DbResult<()> {
        let fid = *self.page_table.get(&p).ok_or(DbError::BadPageId)?;
        if self.frames[fid].is_pinned() {
            return Err(DbError::NotPinned);
        }

        if self.frames[fid].is_dirty() {
            self.allocator.write(p, self.frames[fid].buf())?;
        }

        // The frame is resident and unpinned, hence currently in the LRU
        // list; remove it before freeing so it is not picked as a victim
        // for a page id that no longer exists.
        self.replacer.frame_pinned(fid);
        self.frames[fid].free();
        self.page_table.remove(&p);
        self.free_list.push(fid);

        self.allocator.free(p, 1);
        debug!("buffer pool: freed page {}", p);
        Ok(())
    }

    /// Requires pin count 0. Writes back `p` if dirty and clears the dirty
    /// bit, without evicting it from the pool.
    pub fn flush_page(&mut self, p: PageId) -> DbResult<()> {
        let fid = *self.page_table.get(&p).ok_or(DbError::BadPageId)?;
        if self.frames[fid].is_pinned() {
            return Err(DbError::NotPinned);
        }
        if self.frames[fid].is_dirty() {
            self.allocator.write(p, self.frames[fid].buf())?;
            self.frames[fid].clean();
        }
        Ok(())
    }

    /// Borrows the bytes of a resident page. The caller must hold a pin on
    /// `p`; there is no separate lifetime-bound guard because the pool is
    /// always accessed through a shared lock (see `crate::db::Database`).
    pub fn get_page(&self, p: PageId) -> DbResult<&[u8]> {
        let &fid = self.page_table.get(&p).ok_or(DbError::BadPageId)?;
        Ok(self.frames[fid].buf())
    }

    pub fn get_page_mut(&mut self, p: PageId) -> DbResult<&mut [u8]> {
        let &fid = self.page_table.get(&p).ok_or(DbError::BadPageId)?;
        Ok(self.frames[fid].buf_mut())
    }

    pub fn page_size(&self) -> usize {
        self.allocator.page_size()
    }

    pub fn debug_bitmap(&self) -> String {
        self.allocator.debug_bitmap()
    }

    #[cfg(test)]
    pub fn pin_count(&self, p: PageId) -> u32 {
        match self.page_table.get(&p) {
            Some(&fid) => self.frames[fid].pin_count(),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::allocator::Allocator;

    fn pool(name: &str, pool_size: usize) -> BufferPool {
        let path =
            std::env::temp_dir().join(format!("small-db-pool-{}.db", name));
        let alloc = Allocator::new(path, 64, 16).unwrap();
        BufferPool::new(alloc, pool_size)
    }

    #[test]
    fn scenario_s2() {
        let mut bp = pool("s2", 2);
        let p1 = bp.new_pages(1).unwrap();
        let p2 = bp.new_pages(1).unwrap();
        bp.unpin(p1, false).unwrap();

        // Pinning p3 should evict p1 (the LRU, unpinned frame).
        let p3 = bp.new_pages(1).unwrap();
        assert!(bp.get_page(p1).is_err());
        assert!(bp.get_page(p3).is_ok());

        bp.unpin(p2, false).unwrap();
        // Re-pinning p1 is served after p2 is unpinned (p2 becomes the new
        // victim ahead of p3, which is still pinned).
        bp.pin(p1, true).unwrap();
        assert!(bp.get_page(p1).is_ok());
    }

    #[test]
    fn unpin_without_pin_fails() {
        let mut bp = pool("unpin-fail", 2);
        assert!(matches!(bp.unpin(0, false), Err(DbError::NotPinned)));
    }

    #[test]
    fn exhaustion_when_all_pinned() {
        let mut bp = pool("exhaustion", 1);
        bp.new_pages(1).unwrap();
        assert!(matches!(bp.new_pages(1), Err(DbError::NoFreeFrame)));
    }
}
