//! A static, char-wise Double-Array Trie.
//!
//! This crate provides [`DoubleArrayTrie`], which encodes a sorted set of string
//! keys into two parallel `i32` arrays (`base` and `check`). Lookups walk the
//! arrays one symbol at a time and recover the key's position in the sorted input,
//! which also indexes an optional parallel collection of values.
//!
//! The trie is built once and is read-only afterwards. It can be persisted as a
//! versioned binary snapshot with [`DoubleArrayTrie::store`] and restored with
//! [`DoubleArrayTrie::load`].
//!
//! # Quick start
//!
//! ```
//! use darts_trie::DoubleArrayTrie;
//!
//! let trie = DoubleArrayTrie::build(&["a", "ab", "abc", "b", "bc"]).unwrap();
//! assert_eq!(trie.index_of("abc"), Some(2));
//! assert_eq!(trie.index_of("abcd"), None);
//!
//! let trie = DoubleArrayTrie::build_with_values(&["one", "two"], vec![1, 2]).unwrap();
//! assert_eq!(trie.get_value("two"), Some(&2));
//! ```

#![warn(missing_docs)]

mod array;
mod build;
mod code_map;
mod config;
mod node;
mod search;
mod serial;

#[cfg(test)]
mod proptests;

use std::fmt;

use thiserror::Error;

use crate::array::ArrayStore;

pub use code_map::{decode_key, encode_key, symbol_char, symbol_code, TERMINAL_CODE};
pub use config::{ConfigError, TrieConfig};
pub use search::Lookup;
pub use serial::{FORMAT_VERSION, MAGIC};

/// Errors that can occur while building a trie.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum BuildError {
    /// No keys were supplied.
    #[error("cannot build a trie from an empty key set")]
    EmptyInput,

    /// A key is not strictly greater than its predecessor.
    #[error("keys are not strictly increasing at index {index}: {previous:?} >= {current:?}")]
    Ordering {
        /// Position of the offending key.
        index: usize,
        /// The key preceding it.
        previous: String,
        /// The offending key.
        current: String,
    },

    /// The values collection does not have one entry per key.
    #[error("expected {keys} values, got {values}")]
    ValueShape {
        /// Number of keys.
        keys: usize,
        /// Number of values supplied.
        values: usize,
    },

    /// The key set does not fit in the `i32` state space, or the arrays
    /// could not be allocated.
    #[error("trie requires {required} slots, beyond the i32 index space or available memory")]
    Capacity {
        /// Number of slots or keys that would be needed.
        required: usize,
    },

    /// The build configuration is out of range.
    #[error("invalid build config: {0}")]
    Config(#[from] ConfigError),
}

/// Errors that can occur while searching a trie restored from untrusted data.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SearchError {
    /// A transition led to a slot whose contents cannot occur in a valid trie.
    #[error("corrupted trie structure at slot {index}")]
    Corrupted {
        /// The array slot that failed validation.
        index: usize,
    },
}

/// Errors that can occur while storing or loading a snapshot.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Reading or writing the underlying file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The data does not start with the snapshot magic number.
    #[error("invalid magic number")]
    InvalidMagic,

    /// The snapshot was written by an unsupported format version.
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    /// The data ends before the snapshot is complete.
    #[error("truncated snapshot")]
    Truncated,

    /// The snapshot body could not be encoded or decoded.
    #[error("snapshot codec error: {0}")]
    Decode(#[from] bincode::Error),

    /// The snapshot decoded but its fields contradict each other.
    #[error("inconsistent snapshot: {0}")]
    Inconsistent(String),
}

/// A static double-array trie over string keys, with an optional value per key.
///
/// `V` is the type of the parallel values collection. Tries built from keys
/// alone use the default `V = ()` and never return values.
#[derive(Clone, Debug, PartialEq)]
pub struct DoubleArrayTrie<V = ()> {
    pub(crate) array: ArrayStore,
    pub(crate) keys: Vec<Vec<u32>>,
    pub(crate) values: Option<Vec<V>>,
    pub(crate) progress: usize,
    pub(crate) next_check_pos: usize,
}

impl<V> DoubleArrayTrie<V> {
    /// Returns the number of keys stored in the trie.
    pub fn key_size(&self) -> usize {
        self.keys.len()
    }

    /// Returns the number of keys stored in the trie.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if the trie holds no keys. A built trie is never empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// One past the highest array slot in use.
    pub fn size(&self) -> usize {
        self.array.size
    }

    /// Physical length of the `base`/`check` arrays.
    pub fn alloc_size(&self) -> usize {
        self.array.alloc_size()
    }

    /// Number of keys placed as leaves during the build.
    pub fn progress(&self) -> usize {
        self.progress
    }

    /// The `base` array. `base[0]` holds the root's child offset.
    pub fn base(&self) -> &[i32] {
        &self.array.base
    }

    /// The `check` array. A zero entry marks a free slot.
    pub fn check(&self) -> &[i32] {
        &self.array.check
    }

    /// The values supplied at build time, aligned with the key indices.
    pub fn values(&self) -> Option<&[V]> {
        self.values.as_deref()
    }

    /// Returns the key stored at `index`.
    pub fn key(&self, index: usize) -> Option<String> {
        self.keys.get(index).and_then(|codes| decode_key(codes))
    }

    /// Iterates over the stored keys in key index order.
    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.keys.iter().filter_map(|codes| decode_key(codes))
    }
}

impl<V> fmt::Display for DoubleArrayTrie<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[size: {}, alloc_size: {}, key_size: {}, progress: {}]",
            self.size(),
            self.alloc_size(),
            self.key_size(),
            self.progress
        )
    }
}
