use std::mem;
use std::path::Path;
use std::sync::{Once, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::LevelFilter;

use crate::config;
use crate::error::DbResult;
use crate::pager::{Allocator, BufferPool};
use crate::types::Pod;

/// A handy shortcut to replace the `RwLock` `write()/read().unwrap()`
/// pattern with `wl()`/`rl()`.
///
/// copied from the buffer-pool singleton idiom this crate grew out of.
pub trait HandyRwLock<T> {
    fn wl(&self) -> RwLockWriteGuard<'_, T>;
    fn rl(&self) -> RwLockReadGuard<'_, T>;
}

impl<T> HandyRwLock<T> for RwLock<T> {
    fn wl(&self) -> RwLockWriteGuard<'_, T> {
        self.write().unwrap()
    }

    fn rl(&self) -> RwLockReadGuard<'_, T> {
        self.read().unwrap()
    }
}

/// Installs a `log`/`env_logger` subscriber once per process, matching the
/// format the teacher crate used (`[level - target] [file:line] message`).
pub fn init_log() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let _ = env_logger::Builder::new()
            .format(|buf, record| {
                use std::io::Write;
                writeln!(
                    buf,
                    "[{} - {}] [{}:{}] {}",
                    record.level(),
                    record.target(),
                    record.file().unwrap_or("?"),
                    record.line().unwrap_or(0),
                    record.args(),
                )
            })
            .filter_level(LevelFilter::Info)
            .parse_default_env()
            .try_init();
    });
}

/// The database context: the paged backing file and its buffer pool. Per
/// the storage layer's design note, this is offered as an explicit,
/// constructible value (no mandatory process-wide global) while still
/// providing a `Database::global()` convenience singleton, in the style of
/// the teacher crate's `Unique::global()`, for callers that just want one.
pub struct Database {
    pool: Pod<BufferPool>,
}

impl Database {
    /// Opens (creating/truncating) the backing file at `path` with the
    /// default page size / page count / pool size from `crate::config`.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let allocator =
            Allocator::new(path, config::PAGE_SIZE, config::NUM_PAGES)?;
        let pool = BufferPool::new(allocator, config::POOL_SIZE);
        Ok(Self {
            pool: std::sync::Arc::new(RwLock::new(pool)),
        })
    }

    pub fn pool(&self) -> Pod<BufferPool> {
        self.pool.clone()
    }

    pub fn global() -> &'static Self {
        static mut SINGLETON: *mut Database = 0 as *mut Database;
        static ONCE: Once = Once::new();

        ONCE.call_once(|| {
            init_log();
            let path = std::env::temp_dir().join("small-db-global.db");
            let db = Database::open(path)
                .expect("failed to open the global database instance");

            unsafe {
                SINGLETON = mem::transmute(Box::new(db));
            }
        });

        unsafe { SINGLETON.as_ref().unwrap() }
    }
}
