//! Compile-time constants governing the storage core, mirroring
//! `include/dim.h`'s `Dim::PAGE_SIZE` / `Dim::NUM_PAGES` / pool size.

/// Size in bytes of one page on disk and in a frame.
pub const PAGE_SIZE: usize = 8192;

/// Total number of pages the backing file is truncated to at construction.
pub const NUM_PAGES: usize = 300_000;

/// Number of frames in the buffer pool.
pub const POOL_SIZE: usize = 1_000;
