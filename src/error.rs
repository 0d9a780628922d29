use std::{error::Error, fmt, io};

/// Error taxonomy for the storage core: resource exhaustion, contract
/// violation, I/O failure, and structural corruption. All failures abort the
/// current public operation and are surfaced to the caller; none are
/// retried internally.
#[derive(Debug)]
pub enum DbError {
    /// The allocator found no contiguous run of the requested length.
    NoSpace,
    /// The buffer pool has no unpinned frame to evict.
    NoFreeFrame,
    /// `unpin` was called on a page that is not resident, or already has a
    /// pin count of zero.
    NotPinned,
    /// A page id referenced a page outside the allocated range, or a
    /// sentinel was used where a real page id was required.
    BadPageId,
    /// A short read/write, a seek failure, or an open failure.
    IoError(String),
    /// A loaded page violated a structural invariant (unrecognised node
    /// tag, impossible slot count, etc).
    Corrupt(String),
    /// A contract violation that is neither a bad page id nor a pin
    /// mismatch, e.g. opening a database that is already open.
    AlreadyOpen,
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DbError::NoSpace => write!(f, "allocator has no space left"),
            DbError::NoFreeFrame => write!(f, "buffer pool has no free frame"),
            DbError::NotPinned => write!(f, "page is not pinned"),
            DbError::BadPageId => write!(f, "bad page id"),
            DbError::IoError(s) => write!(f, "io error: {}", s),
            DbError::Corrupt(s) => write!(f, "corrupt page: {}", s),
            DbError::AlreadyOpen => write!(f, "database is already open"),
        }
    }
}

impl Error for DbError {
    fn description(&self) -> &str {
        match self {
            DbError::NoSpace => "no space",
            DbError::NoFreeFrame => "no free frame",
            DbError::NotPinned => "not pinned",
            DbError::BadPageId => "bad page id",
            DbError::IoError(_) => "io error",
            DbError::Corrupt(_) => "corrupt",
            DbError::AlreadyOpen => "already open",
        }
    }
}

impl From<io::Error> for DbError {
    fn from(e: io::Error) -> Self {
        DbError::IoError(e.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
