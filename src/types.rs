use std::sync::{Arc, RwLock};

use crate::error::DbError;

// Type alias, not a new type, cannot define methods on it
pub type Pod<T> = Arc<RwLock<T>>;

// Define a new type, can define methods on it, but different with the
// underlying type, so the original methods cannot be used
// pub struct Pod<T>(Arc<RwLock<T>>);

pub type ResultPod<T> = Result<Pod<T>, DbError>;
pub type SimpleResult = Result<(), DbError>;

/// A page id is a non-negative integer identifying one page in the backing
/// file. `INVALID_PAGE` is the sentinel meaning "none".
pub type PageId = u32;

pub const INVALID_PAGE: PageId = u32::MAX;

/// A frame id indexes into the buffer pool's fixed frame array.
pub type FrameId = usize;

pub const INVALID_FRAME: FrameId = usize::MAX;
