use std::time::Instant;

use tracing::{debug, info};

use crate::array::{try_resize, ArrayStore};
use crate::code_map::encode_keys;
use crate::node::{self, Node};
use crate::{BuildError, DoubleArrayTrie, TrieConfig};

/// Largest slot index representable in the `i32` arrays.
const MAX_INDEX: usize = i32::MAX as usize;

/// A sibling group whose children are still being encoded.
struct Frame {
    begin: usize,
    siblings: Vec<Node>,
    cursor: usize,
}

/// Mutable construction state shared by every offset search.
struct Builder<'a> {
    keys: &'a [Vec<u32>],
    config: &'a TrieConfig,
    array: ArrayStore,
    /// Offsets already handed to a sibling group. Each state owns a unique
    /// offset, otherwise `check` could not tell two groups apart.
    used: Vec<bool>,
    /// Keys placed as leaves so far.
    progress: usize,
    /// Lowest slot known to be free from earlier scans.
    next_check_pos: usize,
}

impl<'a> Builder<'a> {
    fn new(keys: &'a [Vec<u32>], config: &'a TrieConfig) -> Result<Self, BuildError> {
        let array = ArrayStore::with_capacity(config.initial_capacity)?;
        let mut used = Vec::new();
        try_resize(&mut used, config.initial_capacity, false)?;
        Ok(Self {
            keys,
            config,
            array,
            used,
            progress: 0,
            next_check_pos: 0,
        })
    }

    /// Grow fast while many keys are unplaced, tapering to the minimum rate.
    fn growth_rate(&self) -> f64 {
        let rate = self.keys.len() as f64 / (self.progress + 1) as f64;
        rate.max(self.config.min_growth_rate)
    }

    /// Finds the lowest offset at which every sibling's slot is free, claims
    /// those slots and returns the offset.
    ///
    /// `siblings` must be non-empty and ascending by code.
    fn place(&mut self, siblings: &[Node]) -> Result<usize, BuildError> {
        let first = siblings[0].code as usize;
        let last = siblings[siblings.len() - 1].code as usize;

        // Pre-incremented below, so `begin = pos - first` is always >= 1.
        let mut pos = if self.next_check_pos > first {
            self.next_check_pos - 1
        } else {
            first
        };
        let mut first_free = true;
        let mut occupied = 0usize;

        let begin = 'scan: loop {
            pos += 1;
            let begin = pos - first;
            let end = begin + last + 1;
            if end > MAX_INDEX {
                return Err(BuildError::Capacity { required: end });
            }

            if !self.array.is_free(pos) {
                occupied += 1;
                continue;
            }
            if first_free {
                self.next_check_pos = pos;
                first_free = false;
            }

            let rate = self.growth_rate();
            if self.array.reserve(end, rate)? {
                debug!(
                    target: "darts_trie::build",
                    alloc_size = self.array.alloc_size(),
                    progress = self.progress,
                    rate,
                    "grew arrays"
                );
                try_resize(&mut self.used, self.array.alloc_size(), false)?;
            }
            if self.used[begin] {
                continue;
            }

            for sibling in &siblings[1..] {
                if !self.array.is_free(begin + sibling.code as usize) {
                    continue 'scan;
                }
            }
            break begin;
        };

        self.array.mark_used(begin + last + 1);

        let span = pos - self.next_check_pos + 1;
        if occupied as f64 / span as f64 >= self.config.occupancy_threshold {
            self.next_check_pos = pos;
        }

        self.used[begin] = true;
        for sibling in siblings {
            self.array.check[begin + sibling.code as usize] = begin as i32;
        }
        Ok(begin)
    }

    /// Encodes the whole key range depth-first and returns the root offset.
    ///
    /// Uses an explicit stack so the call depth does not grow with key length.
    fn solve(&mut self) -> Result<usize, BuildError> {
        let mut siblings = Vec::new();
        node::fetch(self.keys, &Node::root(self.keys.len()), &mut siblings)?;
        let root = self.place(&siblings)?;

        let mut stack = vec![Frame {
            begin: root,
            siblings,
            cursor: 0,
        }];
        let mut children = Vec::new();

        while let Some(frame) = stack.last_mut() {
            let Some(&node) = frame.siblings.get(frame.cursor) else {
                stack.pop();
                continue;
            };
            frame.cursor += 1;
            let slot = frame.begin + node.code as usize;

            node::fetch(self.keys, &node, &mut children)?;
            if children.is_empty() {
                self.array.base[slot] = -(node.left as i32) - 1;
                self.progress += 1;
            } else {
                let begin = self.place(&children)?;
                self.array.base[slot] = begin as i32;
                stack.push(Frame {
                    begin,
                    siblings: std::mem::take(&mut children),
                    cursor: 0,
                });
            }
        }
        Ok(root)
    }
}

/// Shared build path: validates, encodes, solves and compacts.
pub(crate) fn build_trie<V>(
    keys: &[impl AsRef<str>],
    values: Option<Vec<V>>,
    config: &TrieConfig,
) -> Result<DoubleArrayTrie<V>, BuildError> {
    config.validate()?;
    if keys.is_empty() {
        return Err(BuildError::EmptyInput);
    }
    if let Some(values) = &values {
        if values.len() != keys.len() {
            return Err(BuildError::ValueShape {
                keys: keys.len(),
                values: values.len(),
            });
        }
    }
    if keys.len() > MAX_INDEX {
        return Err(BuildError::Capacity {
            required: keys.len(),
        });
    }

    let start = Instant::now();
    let encoded = encode_keys(keys)?;

    let mut builder = Builder::new(&encoded, config)?;
    let root = builder.solve()?;
    debug!(target: "darts_trie::build", root, "placed root siblings");
    builder.array.base[0] = root as i32;
    builder.array.shrink();

    let Builder {
        array,
        progress,
        next_check_pos,
        ..
    } = builder;

    info!(
        target: "darts_trie::build",
        keys = encoded.len(),
        size = array.size,
        progress,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "built double-array trie"
    );

    Ok(DoubleArrayTrie {
        array,
        keys: encoded,
        values,
        progress,
        next_check_pos,
    })
}

impl DoubleArrayTrie {
    /// Builds a trie from keys sorted in strictly ascending order.
    ///
    /// Each key `keys[i]` gets key index `i`.
    ///
    /// # Errors
    /// - [`BuildError::EmptyInput`] if `keys` is empty.
    /// - [`BuildError::Ordering`] if a key is not greater than its predecessor.
    pub fn build(keys: &[impl AsRef<str>]) -> Result<Self, BuildError> {
        Self::build_with_config(keys, &TrieConfig::default())
    }

    /// Like [`build`](Self::build) with explicit construction settings.
    pub fn build_with_config(
        keys: &[impl AsRef<str>],
        config: &TrieConfig,
    ) -> Result<Self, BuildError> {
        build_trie(keys, None, config)
    }

    /// Sorts the keys ascending, then builds as [`build`](Self::build) does.
    ///
    /// Key indices refer to positions in the sorted order. Duplicate keys are
    /// still rejected.
    pub fn build_sorted(keys: &[impl AsRef<str>]) -> Result<Self, BuildError> {
        Self::build_sorted_with_config(keys, &TrieConfig::default())
    }

    /// Like [`build_sorted`](Self::build_sorted) with explicit construction settings.
    pub fn build_sorted_with_config(
        keys: &[impl AsRef<str>],
        config: &TrieConfig,
    ) -> Result<Self, BuildError> {
        let mut sorted: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
        sorted.sort_unstable();
        build_trie(&sorted, None, config)
    }
}

impl<V> DoubleArrayTrie<V> {
    /// Builds a trie from sorted keys and one value per key.
    ///
    /// # Errors
    /// - [`BuildError::ValueShape`] if `values.len() != keys.len()`.
    /// - Any error [`DoubleArrayTrie::build`] returns.
    pub fn build_with_values(keys: &[impl AsRef<str>], values: Vec<V>) -> Result<Self, BuildError> {
        Self::build_with_values_and_config(keys, values, &TrieConfig::default())
    }

    /// Like [`build_with_values`](Self::build_with_values) with explicit construction settings.
    pub fn build_with_values_and_config(
        keys: &[impl AsRef<str>],
        values: Vec<V>,
        config: &TrieConfig,
    ) -> Result<Self, BuildError> {
        build_trie(keys, Some(values), config)
    }
}
