//! The nested B+-Trie index (§4.3) and its cursor (§4.5): a two-level
//! B+-tree over a two-column relation, plus the polymorphic trie-cursor
//! contract shared with the singleton cursor and the leapfrog triejoin.

pub mod btrie;
pub mod cursor;
pub mod node;
pub mod singleton;

pub use cursor::{BTrieCursor, TrieCursor, NEG_INF, POS_INF};
pub use singleton::SingletonCursor;
