//! Ordered Index Store: a persistent B+Tree keyed by typed `Value` tuples.
//!
//! Every index — the implicit primary-key index and every user-created
//! secondary index — is backed by one of these trees. The PK index stores
//! an encoded row as its leaf payload; a secondary index stores an encoded
//! set of PK key-tuples. The tree itself is agnostic to what the payload
//! means, which is what lets both kinds of index share one implementation.

mod node;

pub use node::{BTreeNode, NodeType};

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use bincode::config::{self, Config as BincodeConfig};
use bincode::serde::{decode_from_slice, encode_to_vec};
use common::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use types::{SqlType, Value};

pub const PAGE_SIZE: usize = 4096;

/// Logical identifier for a page within a single index file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId(pub u64);

fn bincode_config() -> impl BincodeConfig {
    config::legacy()
}

/// A persistent B+Tree index backing one `(table, column)` pair.
///
/// Keys are `Vec<Value>` (a single column's value, boxed in a vector to
/// allow future composite keys); every key in a given tree shares the
/// same declared `SqlType`, checked on every operation.
#[derive(Debug)]
pub struct BTreeIndex {
    name: String,
    key_type: SqlType,
    root_page_id: PageId,
    file: File,
    num_pages: u64,
}

impl BTreeIndex {
    /// Create a new, empty index file at `path`.
    pub fn create(path: &Path, name: impl Into<String>, key_type: SqlType) -> DbResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let mut index = Self {
            name: name.into(),
            key_type,
            root_page_id: PageId(0),
            file,
            num_pages: 0,
        };

        let root_page = index.allocate_page()?;
        let root_node = BTreeNode::new_leaf();
        index.write_node(root_page, &root_node)?;
        index.root_page_id = root_page;

        Ok(index)
    }

    /// Open an existing index file.
    pub fn open(path: &Path, name: impl Into<String>, key_type: SqlType) -> DbResult<Self> {
        if !path.exists() {
            return Err(DbError::StorageCorrupt(format!(
                "index file does not exist: {}",
                path.display()
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let file_len = file.metadata()?.len();
        if file_len == 0 || file_len % PAGE_SIZE as u64 != 0 {
            return Err(DbError::StorageCorrupt(format!(
                "index file '{}' has an invalid length ({} bytes)",
                path.display(),
                file_len
            )));
        }
        let num_pages = file_len / PAGE_SIZE as u64;

        let mut index = Self {
            name: name.into(),
            key_type,
            root_page_id: PageId(0),
            file,
            num_pages,
        };
        // Validate the root page decodes cleanly; a truncated or
        // corrupted first page fails structurally right away.
        index.read_node(PageId(0))?;
        Ok(index)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn check_key(&self, key: &[Value]) -> DbResult<()> {
        for v in key {
            if v.sql_type() != self.key_type {
                return Err(DbError::KeyTypeMismatch {
                    index: self.name.clone(),
                    expected: self.key_type,
                    found: v.sql_type(),
                });
            }
        }
        Ok(())
    }

    /// Point lookup: returns the payload stored for `key`, if any.
    pub fn get(&mut self, key: &[Value]) -> DbResult<Option<Vec<u8>>> {
        self.check_key(key)?;
        let leaf_page_id = self.find_leaf(key)?;
        match self.read_node(leaf_page_id)? {
            BTreeNode::Leaf { entries, .. } => {
                Ok(entries.into_iter().find(|(k, _)| k == key).map(|(_, v)| v))
            }
            BTreeNode::Internal { .. } => {
                Err(DbError::StorageCorrupt("find_leaf returned non-leaf node".into()))
            }
        }
    }

    /// Upsert: replaces any prior payload stored under `key`.
    pub fn put(&mut self, key: Vec<Value>, value: Vec<u8>) -> DbResult<()> {
        self.check_key(&key)?;
        // Remove a prior entry for this key first so put() is a true
        // upsert rather than accumulating duplicate leaf entries.
        self.delete_entry(&key)?;
        let result = self.insert_recursive(self.root_page_id, key, value)?;

        if let Some((new_key, new_child_page)) = result {
            let new_root_page = self.allocate_page()?;
            let new_root = BTreeNode::Internal {
                keys: vec![new_key],
                children: vec![self.root_page_id, new_child_page],
            };
            self.write_node(new_root_page, &new_root)?;
            self.root_page_id = new_root_page;
        }
        self.file.sync_data()?;
        Ok(())
    }

    /// Delete the entry stored under `key`, if any. Returns whether a
    /// matching entry was removed.
    pub fn delete(&mut self, key: &[Value]) -> DbResult<bool> {
        self.check_key(key)?;
        let deleted = self.delete_entry(key)?;
        self.file.sync_data()?;
        Ok(deleted)
    }

    fn delete_entry(&mut self, key: &[Value]) -> DbResult<bool> {
        let leaf_page_id = self.find_leaf(key)?;
        let mut leaf = self.read_node(leaf_page_id)?;

        match &mut leaf {
            BTreeNode::Leaf { entries, .. } => {
                let original_len = entries.len();
                entries.retain(|(k, _)| k != key);
                let deleted = entries.len() < original_len;
                if deleted {
                    self.write_node(leaf_page_id, &leaf)?;
                }
                Ok(deleted)
            }
            BTreeNode::Internal { .. } => {
                Err(DbError::StorageCorrupt("find_leaf returned non-leaf node".into()))
            }
        }
    }

    /// Ascending range scan with independently inclusive/exclusive bounds.
    pub fn range(
        &mut self,
        low: Option<(&[Value], bool)>,
        high: Option<(&[Value], bool)>,
    ) -> DbResult<Vec<(Vec<Value>, Vec<u8>)>> {
        if let Some((k, _)) = low {
            self.check_key(k)?;
        }
        if let Some((k, _)) = high {
            self.check_key(k)?;
        }

        let start_key = low.map(|(k, _)| k).unwrap_or(&[]);
        let mut leaf_page_id = self.find_leaf(start_key)?;
        let mut results = Vec::new();

        loop {
            let leaf = self.read_node(leaf_page_id)?;
            match leaf {
                BTreeNode::Leaf { entries, next_leaf } => {
                    for (k, v) in entries {
                        if let Some((lo, inclusive)) = low {
                            let below = if inclusive {
                                k.as_slice() < lo
                            } else {
                                k.as_slice() <= lo
                            };
                            if below {
                                continue;
                            }
                        }
                        if let Some((hi, inclusive)) = high {
                            let past = if inclusive {
                                k.as_slice() > hi
                            } else {
                                k.as_slice() >= hi
                            };
                            if past {
                                return Ok(results);
                            }
                        }
                        results.push((k, v));
                    }
                    match next_leaf {
                        Some(next) => leaf_page_id = next,
                        None => break,
                    }
                }
                BTreeNode::Internal { .. } => {
                    return Err(DbError::StorageCorrupt("expected leaf node in range scan".into()));
                }
            }
        }

        Ok(results)
    }

    /// Full ascending scan of every entry in the index.
    pub fn full_scan(&mut self) -> DbResult<Vec<(Vec<Value>, Vec<u8>)>> {
        self.range(None, None)
    }

    /// Flush any pending writes to disk.
    pub fn flush(&mut self) -> DbResult<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    // ---- Private helpers ----

    fn find_leaf(&mut self, key: &[Value]) -> DbResult<PageId> {
        let mut current = self.root_page_id;
        loop {
            match self.read_node(current)? {
                BTreeNode::Internal { keys, children } => {
                    let idx = keys.partition_point(|k| k.as_slice() <= key);
                    current = children[idx];
                }
                BTreeNode::Leaf { .. } => return Ok(current),
            }
        }
    }

    fn insert_recursive(
        &mut self,
        page_id: PageId,
        key: Vec<Value>,
        value: Vec<u8>,
    ) -> DbResult<Option<(Vec<Value>, PageId)>> {
        let node = self.read_node(page_id)?;

        match node {
            BTreeNode::Internal { keys, children } => {
                let idx = keys.partition_point(|k| k.as_slice() <= key.as_slice());
                let child_page = children[idx];
                let split_result = self.insert_recursive(child_page, key, value)?;

                if let Some((new_key, new_child)) = split_result {
                    let mut new_keys = keys;
                    let mut new_children = children;
                    new_keys.insert(idx, new_key);
                    new_children.insert(idx + 1, new_child);

                    if new_keys.len() > Self::max_internal_keys() {
                        let (left, split_key, right) = Self::split_internal(new_keys, new_children);
                        self.write_node(page_id, &left)?;
                        let right_page = self.allocate_page()?;
                        self.write_node(right_page, &right)?;
                        return Ok(Some((split_key, right_page)));
                    }
                    self.write_node(
                        page_id,
                        &BTreeNode::Internal {
                            keys: new_keys,
                            children: new_children,
                        },
                    )?;
                }
                Ok(None)
            }
            BTreeNode::Leaf {
                mut entries,
                next_leaf,
            } => {
                let idx = entries.partition_point(|(k, _)| k.as_slice() <= key.as_slice());
                entries.insert(idx, (key, value));

                if entries.len() > Self::max_leaf_entries() {
                    let (left_entries, split_key, right_entries) = Self::split_leaf(entries);
                    let right_page = self.allocate_page()?;
                    self.write_node(
                        page_id,
                        &BTreeNode::Leaf {
                            entries: left_entries,
                            next_leaf: Some(right_page),
                        },
                    )?;
                    self.write_node(
                        right_page,
                        &BTreeNode::Leaf {
                            entries: right_entries,
                            next_leaf,
                        },
                    )?;
                    return Ok(Some((split_key, right_page)));
                }

                self.write_node(page_id, &BTreeNode::Leaf { entries, next_leaf })?;
                Ok(None)
            }
        }
    }

    fn split_leaf(
        entries: Vec<(Vec<Value>, Vec<u8>)>,
    ) -> (Vec<(Vec<Value>, Vec<u8>)>, Vec<Value>, Vec<(Vec<Value>, Vec<u8>)>) {
        let mid = entries.len() / 2;
        let (left, right) = entries.split_at(mid);
        let split_key = right[0].0.clone();
        (left.to_vec(), split_key, right.to_vec())
    }

    fn split_internal(
        keys: Vec<Vec<Value>>,
        children: Vec<PageId>,
    ) -> (BTreeNode, Vec<Value>, BTreeNode) {
        let mid = keys.len() / 2;
        let left_keys = keys[..mid].to_vec();
        let left_children = children[..=mid].to_vec();
        let split_key = keys[mid].clone();
        let right_keys = keys[mid + 1..].to_vec();
        let right_children = children[mid + 1..].to_vec();

        (
            BTreeNode::Internal {
                keys: left_keys,
                children: left_children,
            },
            split_key,
            BTreeNode::Internal {
                keys: right_keys,
                children: right_children,
            },
        )
    }

    fn max_leaf_entries() -> usize {
        100
    }

    fn max_internal_keys() -> usize {
        100
    }

    fn allocate_page(&mut self) -> DbResult<PageId> {
        let page_id = PageId(self.num_pages);
        self.num_pages += 1;
        let offset = page_id.0 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&[0u8; PAGE_SIZE])?;
        Ok(page_id)
    }

    fn read_node(&mut self, page_id: PageId) -> DbResult<BTreeNode> {
        let offset = page_id.0 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; PAGE_SIZE];
        self.file
            .read_exact(&mut buffer)
            .map_err(|e| DbError::StorageCorrupt(format!("short read at page {}: {e}", page_id.0)))?;

        let (node, _): (BTreeNode, usize) = decode_from_slice(&buffer, bincode_config())
            .map_err(|e| DbError::StorageCorrupt(format!("failed to decode btree node: {e}")))?;

        Ok(node)
    }

    fn write_node(&mut self, page_id: PageId, node: &BTreeNode) -> DbResult<()> {
        let bytes = encode_to_vec(node, bincode_config())
            .map_err(|e| DbError::Storage(format!("failed to encode btree node: {e}")))?;

        if bytes.len() > PAGE_SIZE {
            return Err(DbError::Storage(format!(
                "btree node too large: {} bytes (max {PAGE_SIZE})",
                bytes.len(),
            )));
        }

        let mut buffer = vec![0u8; PAGE_SIZE];
        buffer[..bytes.len()].copy_from_slice(&bytes);

        let offset = page_id.0 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&buffer)?;
        Ok(())
    }
}
