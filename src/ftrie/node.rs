//! The fractal (buffered) trie node (§4.7, DATA MODEL "Fractal Trie Node"):
//! a branch/leaf node whose page budget is split once, by page size and
//! record width, into a slot region (sized `floor(sqrt(S))` integers) and a
//! message region (the rest), the message region further divided into one
//! buffer per child on a branch. Grounded on `ftree.h`'s `SPACE` /
//! `SLOT_SPACE` / `TXN_SPACE` split and `txnSpacePerChild`.

use crate::error::{DbError, DbResult};
use crate::types::{PageId, INVALID_PAGE};

const TAG_BRANCH: u8 = 0;
const TAG_LEAF: u8 = 1;
/// tag, count, width, prev, next.
const HEADER_LEN: usize = 1 + 4 + 4 + 4 + 4;

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

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MsgKind {
    Insert,
    Delete,
}

/// One pending change to a `width`-wide key, destined for a child buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub kind: MsgKind,
    pub key: Vec<i32>,
}

/// Returns the number of 4-byte integers this page format has available
/// once the fixed header is subtracted.
fn total_ints(page_size: usize) -> usize {
    (page_size - HEADER_LEN) / 4
}

/// The slot-region size in integers: `floor(sqrt(S))`, per the DATA MODEL.
pub fn slot_region_ints(page_size: usize) -> usize {
    (total_ints(page_size) as f64).sqrt() as usize
}

fn message_region_ints(page_size: usize) -> usize {
    total_ints(page_size) - slot_region_ints(page_size)
}

/// Maximum number of records a leaf of the given key `width` can hold.
pub fn leaf_capacity(page_size: usize, width: usize) -> usize {
    slot_region_ints(page_size) / width
}

/// Maximum number of keys (so `keys+1` children) a branch of the given key
/// `width` can hold: the slot region holds one leftmost child pointer plus
/// `N` (key, child) pairs.
pub fn branch_capacity(page_size: usize, width: usize) -> usize {
    let slots = slot_region_ints(page_size);
    if slots <= 1 {
        return 0;
    }
    (slots - 1) / (width + 1)
}

/// Maximum number of pending messages one child's buffer can hold on a
/// branch with the given key `width`, once the message region is divided
/// evenly across `branch_capacity + 1` children.
pub fn buffer_capacity(page_size: usize, width: usize) -> usize {
    let children = branch_capacity(page_size, width) + 1;
    let per_child = message_region_ints(page_size) / children;
    if per_child <= 1 {
        return 0;
    }
    (per_child - 1) / (width + 1)
}

#[derive(Clone, Debug)]
pub enum FTrieNode {
    Leaf {
        width: usize,
        prev: PageId,
        next: PageId,
        /// Sorted ascending lexicographically, de-duplicated, each of
        /// length `width`.
        records: Vec<Vec<i32>>,
    },
    Branch {
        width: usize,
        prev: PageId,
        next: PageId,
        /// `children.len() == keys.len() + 1`.
        children: Vec<PageId>,
        /// Strictly ascending lexicographically, each of length `width`.
        keys: Vec<Vec<i32>>,
        /// One sorted, de-duplicated buffer of pending messages per
        /// child, `buffers.len() == children.len()`.
        buffers: Vec<Vec<Message>>,
    },
}

fn cmp_key(a: &[i32], b: &[i32]) -> std::cmp::Ordering {
    a.cmp(b)
}

impl FTrieNode {
    pub fn new_leaf(width: usize) -> Self {
        FTrieNode::Leaf { width, prev: INVALID_PAGE, next: INVALID_PAGE, records: Vec::new() }
    }

    pub fn new_branch(width: usize, left: PageId, key: Vec<i32>, right: PageId) -> Self {
        FTrieNode::Branch {
            width,
            prev: INVALID_PAGE,
            next: INVALID_PAGE,
            children: vec![left, right],
            keys: vec![key],
            buffers: vec![Vec::new(), Vec::new()],
        }
    }

    pub fn width(&self) -> usize {
        match self {
            FTrieNode::Leaf { width, .. } | FTrieNode::Branch { width, .. } => *width,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, FTrieNode::Leaf { .. })
    }

    pub fn count(&self) -> usize {
        match self {
            FTrieNode::Leaf { records, .. } => records.len(),
            FTrieNode::Branch { keys, .. } => keys.len(),
        }
    }

    pub fn prev(&self) -> PageId {
        match self {
            FTrieNode::Leaf { prev, .. } | FTrieNode::Branch { prev, .. } => *prev,
        }
    }
    pub fn next(&self) -> PageId {
        match self {
            FTrieNode::Leaf { next, .. } | FTrieNode::Branch { next, .. } => *next,
        }
    }
    pub fn set_prev(&mut self, p: PageId) {
        match self {
            FTrieNode::Leaf { prev, .. } | FTrieNode::Branch { prev, .. } => *prev = p,
        }
    }
    pub fn set_next(&mut self, p: PageId) {
        match self {
            FTrieNode::Leaf { next, .. } | FTrieNode::Branch { next, .. } => *next = p,
        }
    }

    pub fn capacity(&self, page_size: usize) -> usize {
        match self {
            FTrieNode::Leaf { width, .. } => leaf_capacity(page_size, *width),
            FTrieNode::Branch { width, .. } => branch_capacity(page_size, *width),
        }
    }

    pub fn is_full(&self, page_size: usize) -> bool {
        self.count() >= self.capacity(page_size)
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn is_under_occupied(&self, page_size: usize) -> bool {
        self.count() <= self.capacity(page_size) / 2
    }

    /// The smallest index `i` with `key_at(i) >= key` (lexicographic),
    /// searching from `from`.
    pub fn find_key(&self, key: &[i32], from: usize) -> usize {
        let (mut lo, mut hi) = (from, self.count());
        while lo < hi {
            let m = lo + (hi - lo) / 2;
            if cmp_key(key, self.key_at(m)) != std::cmp::Ordering::Greater {
                hi = m;
            } else {
                lo = m + 1;
            }
        }
        lo
    }

    pub fn key_at(&self, i: usize) -> &[i32] {
        match self {
            FTrieNode::Leaf { records, .. } => &records[i],
            FTrieNode::Branch { keys, .. } => &keys[i],
        }
    }

    pub fn child_at(&self, i: usize) -> PageId {
        match self {
            FTrieNode::Branch { children, .. } => children[i],
            FTrieNode::Leaf { .. } => panic!("child_at on leaf node"),
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        for b in buf.iter_mut() {
            *b = 0;
        }
        match self {
            FTrieNode::Leaf { width, prev, next, records } => {
                buf[0] = TAG_LEAF;
                write_i32(buf, 1, records.len() as i32);
                write_i32(buf, 5, *width as i32);
                write_pid(buf, 9, *prev);
                write_pid(buf, 13, *next);
                let mut off = HEADER_LEN;
                for rec in records {
                    for v in rec {
                        write_i32(buf, off, *v);
                        off += 4;
                    }
                }
            }
            FTrieNode::Branch { width, prev, next, children, keys, buffers } => {
                buf[0] = TAG_BRANCH;
                write_i32(buf, 1, keys.len() as i32);
                write_i32(buf, 5, *width as i32);
                write_pid(buf, 9, *prev);
                write_pid(buf, 13, *next);
                let mut off = HEADER_LEN;
                write_pid(buf, off, children[0]);
                off += 4;
                for (i, k) in keys.iter().enumerate() {
                    for v in k {
                        write_i32(buf, off, *v);
                        off += 4;
                    }
                    write_pid(buf, off, children[i + 1]);
                    off += 4;
                }
                for buffer in buffers {
                    write_i32(buf, off, buffer.len() as i32);
                    off += 4;
                    for msg in buffer {
                        write_i32(buf, off, if msg.kind == MsgKind::Insert { 0 } else { 1 });
                        off += 4;
                        for v in &msg.key {
                            write_i32(buf, off, *v);
                            off += 4;
                        }
                    }
                }
            }
        }
    }

    /// Decodes a node of the given `width` from `buf`. Unlike the B+-Trie,
    /// the fractal-trie header does not store enough to self-describe
    /// without `width` since branch buffers need it to size each message;
    /// callers already know `width` (it is fixed per view) so they pass it
    /// in rather than it being re-derived here.
    pub fn decode(buf: &[u8], width: usize) -> DbResult<Self> {
        let count = read_i32(buf, 1) as usize;
        let stored_width = read_i32(buf, 5) as usize;
        if stored_width != width {
            return Err(DbError::Corrupt(format!(
                "fractal trie node width mismatch: expected {}, found {}",
                width, stored_width
            )));
        }
        let prev = read_pid(buf, 9);
        let next = read_pid(buf, 13);

        match buf[0] {
            TAG_LEAF => {
                let mut records = Vec::with_capacity(count);
                let mut off = HEADER_LEN;
                for _ in 0..count {
                    let mut rec = Vec::with_capacity(width);
                    for _ in 0..width {
                        rec.push(read_i32(buf, off));
                        off += 4;
                    }
                    records.push(rec);
                }
                Ok(FTrieNode::Leaf { width, prev, next, records })
            }
            TAG_BRANCH => {
                let mut off = HEADER_LEN;
                let mut children = Vec::with_capacity(count + 1);
                let mut keys = Vec::with_capacity(count);
                children.push(read_pid(buf, off));
                off += 4;
                for _ in 0..count {
                    let mut k = Vec::with_capacity(width);
                    for _ in 0..width {
                        k.push(read_i32(buf, off));
                        off += 4;
                    }
                    keys.push(k);
                    children.push(read_pid(buf, off));
                    off += 4;
                }
                let mut buffers = Vec::with_capacity(count + 1);
                for _ in 0..=count {
                    let n = read_i32(buf, off) as usize;
                    off += 4;
                    let mut msgs = Vec::with_capacity(n);
                    for _ in 0..n {
                        let kind = if read_i32(buf, off) == 0 { MsgKind::Insert } else { MsgKind::Delete };
                        off += 4;
                        let mut k = Vec::with_capacity(width);
                        for _ in 0..width {
                            k.push(read_i32(buf, off));
                            off += 4;
                        }
                        msgs.push(Message { kind, key: k });
                        off += 0;
                    }
                    buffers.push(msgs);
                }
                Ok(FTrieNode::Branch { width, prev, next, children, keys, buffers })
            }
            t => Err(DbError::Corrupt(format!("unrecognised fractal trie node tag {}", t))),
        }
    }
}
