use tracing::warn;

use crate::code_map::{symbol_code, TERMINAL_CODE};
use crate::{DoubleArrayTrie, SearchError};

/// Outcome of walking the trie with a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup {
    /// The query is a stored key with this key index.
    Found(usize),
    /// Every symbol of the query has a transition, but the query is only a
    /// proper prefix of longer stored keys.
    Prefix,
    /// Some symbol of the query has no transition, or the query is empty.
    Missing,
}

impl<V> DoubleArrayTrie<V> {
    /// Follows `code` out of the state with offset `begin`.
    ///
    /// Returns the target slot, or `None` if no such transition exists.
    #[inline]
    fn transition(&self, begin: i32, code: u32) -> Option<usize> {
        let idx = begin as usize + code as usize;
        match self.array.check.get(idx) {
            Some(&owner) if owner == begin => Some(idx),
            _ => None,
        }
    }

    /// Walks the trie with `key` and classifies the result.
    ///
    /// Distinguishes a stored key from a key that is only a prefix of stored
    /// keys and from a key that leaves the trie. Never panics, even on tries
    /// restored from damaged snapshots.
    ///
    /// # Errors
    /// [`SearchError::Corrupted`] if the arrays contain a transition that a
    /// valid build cannot produce.
    pub fn lookup(&self, key: &str) -> Result<Lookup, SearchError> {
        if key.is_empty() {
            return Ok(Lookup::Missing);
        }
        let base = &self.array.base;
        let mut begin = match base.first() {
            Some(&root) if root > 0 => root,
            _ => return Err(SearchError::Corrupted { index: 0 }),
        };

        for c in key.chars() {
            let Some(idx) = self.transition(begin, symbol_code(c)) else {
                return Ok(Lookup::Missing);
            };
            begin = base[idx];
            if begin <= 0 {
                // Only terminal slots hold leaves.
                return Err(SearchError::Corrupted { index: idx });
            }
        }

        let Some(idx) = self.transition(begin, TERMINAL_CODE) else {
            return Ok(Lookup::Prefix);
        };
        let leaf = base[idx];
        if leaf >= 0 {
            return Ok(Lookup::Prefix);
        }
        let index = (-(leaf as i64) - 1) as usize;
        if index >= self.keys.len() {
            return Err(SearchError::Corrupted { index: idx });
        }
        Ok(Lookup::Found(index))
    }

    /// Exact match search. Returns the key index if `key` is stored.
    pub fn exact_match(&self, key: &str) -> Option<usize> {
        match self.lookup(key) {
            Ok(Lookup::Found(index)) => Some(index),
            Ok(_) => None,
            Err(e) => {
                warn!(target: "darts_trie::search", error = %e, key, "lookup hit a corrupted slot");
                None
            }
        }
    }

    /// Returns the key index of `key`, i.e. its position in the sorted input.
    #[inline]
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.exact_match(key)
    }

    /// Returns true if `key` is stored in the trie.
    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.exact_match(key).is_some()
    }

    /// Returns the value stored for `key`.
    ///
    /// `None` if the trie was built without values or `key` is not stored.
    pub fn get_value(&self, key: &str) -> Option<&V> {
        let values = self.values.as_ref()?;
        values.get(self.exact_match(key)?)
    }
}
