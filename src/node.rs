use crate::code_map::{decode_key, TERMINAL_CODE};
use crate::BuildError;

/// A node of the key-range tree walked during construction.
///
/// `code` is the symbol leading into the node, `depth` is the index into the
/// key's code sequence its children are read from, and `[left, right)` is the
/// range of keys sharing this node as an ancestor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Node {
    pub(crate) code: u32,
    pub(crate) depth: usize,
    pub(crate) left: usize,
    pub(crate) right: usize,
}

impl Node {
    /// The synthetic root spanning all `key_count` keys.
    pub(crate) fn root(key_count: usize) -> Self {
        Self {
            code: TERMINAL_CODE,
            depth: 0,
            left: 0,
            right: key_count,
        }
    }
}

/// Enumerates the children of `parent`, appending them to `children`.
///
/// Keys that end exactly at `parent.depth` produce a terminal child (code 0).
/// Leaves `children` empty when `parent` is a leaf.
pub(crate) fn fetch(
    keys: &[Vec<u32>],
    parent: &Node,
    children: &mut Vec<Node>,
) -> Result<(), BuildError> {
    children.clear();
    let mut prev = TERMINAL_CODE;

    for (i, key) in keys
        .iter()
        .enumerate()
        .take(parent.right)
        .skip(parent.left)
    {
        if key.len() < parent.depth {
            continue;
        }
        let cur = key.get(parent.depth).copied().unwrap_or(TERMINAL_CODE);

        if prev > cur {
            return Err(BuildError::Ordering {
                index: i,
                previous: keys
                    .get(i.wrapping_sub(1))
                    .and_then(|k| decode_key(k))
                    .unwrap_or_default(),
                current: decode_key(key).unwrap_or_default(),
            });
        }
        if cur == prev && !children.is_empty() {
            continue;
        }

        if let Some(last) = children.last_mut() {
            last.right = i;
        }
        children.push(Node {
            code: cur,
            depth: parent.depth + 1,
            left: i,
            right: i,
        });
        prev = cur;
    }

    if let Some(last) = children.last_mut() {
        last.right = parent.right;
    }
    Ok(())
}
