use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::array::ArrayStore;
use crate::{DoubleArrayTrie, PersistError};

/// Magic bytes at the start of every snapshot.
pub const MAGIC: &[u8; 4] = b"DATR";

/// Snapshot format version written by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// Magic (4 bytes) + little-endian version (4 bytes).
pub(crate) const HEADER_SIZE: usize = 8;

/// Borrowed snapshot body, in on-disk field order.
#[derive(Serialize)]
struct SnapshotRef<'a, V> {
    check: &'a [i32],
    base: &'a [i32],
    size: u64,
    alloc_size: u64,
    key_size: u64,
    keys: &'a [Vec<u32>],
    progress: u64,
    next_check_pos: u64,
    values: Option<&'a [V]>,
}

/// Owned snapshot body, in on-disk field order.
#[derive(Deserialize)]
struct Snapshot<V> {
    check: Vec<i32>,
    base: Vec<i32>,
    size: u64,
    alloc_size: u64,
    key_size: u64,
    keys: Vec<Vec<u32>>,
    progress: u64,
    next_check_pos: u64,
    values: Option<Vec<V>>,
}

fn to_usize(value: u64, field: &str) -> Result<usize, PersistError> {
    usize::try_from(value)
        .map_err(|_| PersistError::Inconsistent(format!("{field} {value} exceeds usize")))
}

impl<V> Snapshot<V> {
    /// Checks that the fields describe a trie this crate could have built.
    fn into_trie(self) -> Result<DoubleArrayTrie<V>, PersistError> {
        let size = to_usize(self.size, "size")?;
        let alloc_size = to_usize(self.alloc_size, "alloc_size")?;
        let key_size = to_usize(self.key_size, "key_size")?;

        if self.check.len() != self.base.len() {
            return Err(PersistError::Inconsistent(format!(
                "check has {} slots but base has {}",
                self.check.len(),
                self.base.len()
            )));
        }
        if self.check.is_empty() {
            return Err(PersistError::Inconsistent("arrays are empty".into()));
        }
        if alloc_size != self.check.len() {
            return Err(PersistError::Inconsistent(format!(
                "alloc_size {alloc_size} does not match array length {}",
                self.check.len()
            )));
        }
        if size == 0 || size > alloc_size {
            return Err(PersistError::Inconsistent(format!(
                "size {size} outside 1..={alloc_size}"
            )));
        }
        if key_size != self.keys.len() {
            return Err(PersistError::Inconsistent(format!(
                "key_size {key_size} does not match {} stored keys",
                self.keys.len()
            )));
        }
        if let Some(values) = &self.values {
            if values.len() != key_size {
                return Err(PersistError::Inconsistent(format!(
                    "{} values for {key_size} keys",
                    values.len()
                )));
            }
        }

        Ok(DoubleArrayTrie {
            array: ArrayStore {
                base: self.base,
                check: self.check,
                size,
            },
            keys: self.keys,
            values: self.values,
            progress: to_usize(self.progress, "progress")?,
            next_check_pos: to_usize(self.next_check_pos, "next_check_pos")?,
        })
    }
}

/// bincode reports short input as an I/O error; surface it as truncation.
fn decode_error(err: bincode::Error) -> PersistError {
    if let bincode::ErrorKind::Io(e) = err.as_ref() {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            return PersistError::Truncated;
        }
    }
    PersistError::Decode(err)
}

impl<V: Serialize> DoubleArrayTrie<V> {
    /// Writes the snapshot envelope (header + body) to `writer`.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), PersistError> {
        writer.write_all(MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;

        let snapshot = SnapshotRef {
            check: &self.array.check,
            base: &self.array.base,
            size: self.array.size as u64,
            alloc_size: self.array.alloc_size() as u64,
            key_size: self.keys.len() as u64,
            keys: &self.keys,
            progress: self.progress as u64,
            next_check_pos: self.next_check_pos as u64,
            values: self.values.as_deref(),
        };
        bincode::serialize_into(&mut writer, &snapshot)?;
        Ok(())
    }

    /// Serializes the trie to a byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PersistError> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.array.alloc_size() * 8);
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Writes the trie to `path`, replacing any existing file.
    pub fn store(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        debug!(
            target: "darts_trie::serial",
            path = %path.display(),
            keys = self.keys.len(),
            size = self.array.size,
            "stored snapshot"
        );
        Ok(())
    }
}

impl<V: DeserializeOwned> DoubleArrayTrie<V> {
    /// Reads a snapshot envelope from `reader`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::InvalidMagic`] if the magic bytes don't match.
    /// Returns [`PersistError::UnsupportedVersion`] for other format versions.
    /// Returns [`PersistError::Truncated`] if the input ends early.
    /// Returns [`PersistError::Inconsistent`] if the decoded fields disagree.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self, PersistError> {
        let mut header = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                PersistError::Truncated
            } else {
                PersistError::Io(e)
            }
        })?;

        if &header[0..4] != MAGIC {
            return Err(PersistError::InvalidMagic);
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&header[4..8]);
        let version = u32::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(PersistError::UnsupportedVersion(version));
        }

        let snapshot: Snapshot<V> = bincode::deserialize_from(reader).map_err(decode_error)?;
        snapshot.into_trie()
    }

    /// Deserializes a trie from a byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PersistError> {
        Self::read_from(bytes)
    }

    /// Loads a trie previously written with [`store`](Self::store).
    ///
    /// Either the whole snapshot loads or an error is returned.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let path = path.as_ref();
        let trie = Self::read_from(BufReader::new(File::open(path)?))?;
        debug!(
            target: "darts_trie::serial",
            path = %path.display(),
            keys = trie.keys.len(),
            size = trie.array.size,
            "loaded snapshot"
        );
        Ok(trie)
    }
}
