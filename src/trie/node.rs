use crate::config::PAGE_SIZE;
use crate::error::{DbError, DbResult};
use crate::types::{PageId, INVALID_PAGE};

/// On-disk header shared by every B+-Trie node, branch or leaf alike:
/// a one-byte tag, a slot count, and the previous/next page ids that thread
/// the intra-level doubly linked list (per the DATA MODEL: every node, not
/// just leaves, carries these sibling links).
const TAG_BRANCH: u8 = 0;
const TAG_LEAF: u8 = 1;
const HEADER_LEN: usize = 1 + 4 + 4 + 4 + 4; // tag, count, prev, next, stride

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

/// A decoded B+-Trie node. Branch and leaf nodes share a page layout with an
/// overlapping body; per the design notes, each kind is modelled here as a
/// distinct variant rather than relying on union field type-punning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BTrieNode {
    Leaf {
        stride: usize,
        prev: PageId,
        next: PageId,
        /// Sorted ascending by `records[i][0]`, each of length `stride`.
        records: Vec<Vec<i32>>,
    },
    Branch {
        prev: PageId,
        next: PageId,
        /// `children.len() == keys.len() + 1`.
        children: Vec<PageId>,
        keys: Vec<i32>,
    },
}

impl BTrieNode {
    pub fn new_leaf(stride: usize) -> Self {
        BTrieNode::Leaf {
            stride,
            prev: INVALID_PAGE,
            next: INVALID_PAGE,
            records: Vec::new(),
        }
    }

    pub fn new_branch(left: PageId, key: i32, right: PageId) -> Self {
        BTrieNode::Branch {
            prev: INVALID_PAGE,
            next: INVALID_PAGE,
            children: vec![left, right],
            keys: vec![key],
        }
    }

    pub fn count(&self) -> usize {
        match self {
            BTrieNode::Leaf { records, .. } => records.len(),
            BTrieNode::Branch { keys, .. } => keys.len(),
        }
    }

    pub fn prev(&self) -> PageId {
        match self {
            BTrieNode::Leaf { prev, .. } | BTrieNode::Branch { prev, .. } => *prev,
        }
    }

    pub fn next(&self) -> PageId {
        match self {
            BTrieNode::Leaf { next, .. } | BTrieNode::Branch { next, .. } => *next,
        }
    }

    pub fn set_prev(&mut self, p: PageId) {
        match self {
            BTrieNode::Leaf { prev, .. } | BTrieNode::Branch { prev, .. } => *prev = p,
        }
    }

    pub fn set_next(&mut self, p: PageId) {
        match self {
            BTrieNode::Leaf { next, .. } | BTrieNode::Branch { next, .. } => *next = p,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, BTrieNode::Leaf { .. })
    }

    /// Capacity in slots, derived from the page size (per DATA MODEL, "0 <=
    /// N <= Cap, derived from page size").
    pub fn capacity(&self) -> usize {
        match self {
            BTrieNode::Leaf { stride, .. } => {
                (PAGE_SIZE - HEADER_LEN) / (stride * 4)
            }
            BTrieNode::Branch { .. } => (PAGE_SIZE - HEADER_LEN - 4) / 8,
        }
    }

    pub fn is_full(&self) -> bool {
        self.count() >= self.capacity()
    }

    pub fn is_under_occupied(&self) -> bool {
        self.count() <= self.capacity() / 2
    }

    /// The smallest index `i` with `key_at(i) >= key`, or `count()` if none.
    pub fn find_key(&self, key: i32) -> usize {
        let (mut lo, mut hi) = (0usize, self.count());
        while lo < hi {
            let m = lo + (hi - lo) / 2;
            if key <= self.key_at(m) {
                hi = m;
            } else {
                lo = m + 1;
            }
        }
        lo
    }

    pub fn key_at(&self, i: usize) -> i32 {
        match self {
            BTrieNode::Leaf { records, .. } => records[i][0],
            BTrieNode::Branch { keys, .. } => keys[i],
        }
    }

    /// The child page id for a branch descent at slot index `i` (the child
    /// to the left of `keys[i]`, or the rightmost child when `i ==
    /// count()`).
    pub fn child_at(&self, i: usize) -> PageId {
        match self {
            BTrieNode::Branch { children, .. } => children[i],
            BTrieNode::Leaf { .. } => panic!("child_at on leaf node"),
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        for b in buf.iter_mut() {
            *b = 0;
        }
        match self {
            BTrieNode::Leaf {
                stride,
                prev,
                next,
                records,
            } => {
                buf[0] = TAG_LEAF;
                write_i32(buf, 1, records.len() as i32);
                write_pid(buf, 5, *prev);
                write_pid(buf, 9, *next);
                write_i32(buf, 13, *stride as i32);
                let mut off = HEADER_LEN;
                for rec in records {
                    for v in rec {
                        write_i32(buf, off, *v);
                        off += 4;
                    }
                }
            }
            BTrieNode::Branch {
                prev,
                next,
                children,
                keys,
            } => {
                buf[0] = TAG_BRANCH;
                write_i32(buf, 1, keys.len() as i32);
                write_pid(buf, 5, *prev);
                write_pid(buf, 9, *next);
                let mut off = HEADER_LEN;
                write_pid(buf, off, children[0]);
                off += 4;
                for (i, k) in keys.iter().enumerate() {
                    write_i32(buf, off, *k);
                    write_pid(buf, off + 4, children[i + 1]);
                    off += 8;
                }
            }
        }
    }

    pub fn decode(buf: &[u8]) -> DbResult<Self> {
        let count = read_i32(buf, 1) as usize;
        let prev = read_pid(buf, 5);
        let next = read_pid(buf, 9);

        match buf[0] {
            TAG_LEAF => {
                let stride = read_i32(buf, 13) as usize;
                let mut records = Vec::with_capacity(count);
                let mut off = HEADER_LEN;
                for _ in 0..count {
                    let mut rec = Vec::with_capacity(stride);
                    for _ in 0..stride {
                        rec.push(read_i32(buf, off));
                        off += 4;
                    }
                    records.push(rec);
                }
                Ok(BTrieNode::Leaf {
                    stride,
                    prev,
                    next,
                    records,
                })
            }
            TAG_BRANCH => {
                let mut off = HEADER_LEN;
                let mut children = Vec::with_capacity(count + 1);
                let mut keys = Vec::with_capacity(count);
                children.push(read_pid(buf, off));
                off += 4;
                for _ in 0..count {
                    keys.push(read_i32(buf, off));
                    children.push(read_pid(buf, off + 4));
                    off += 8;
                }
                Ok(BTrieNode::Branch {
                    prev,
                    next,
                    children,
                    keys,
                })
            }
            t => Err(DbError::Corrupt(format!("unrecognised node tag {}", t))),
        }
    }
}
