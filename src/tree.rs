//! Normalized records and tree assembly.
//!
//! Both volume readers emit the same flat, ID-keyed record tuples; this
//! module namespaces identifiers across volumes, links records into a rooted
//! tree in two passes, and computes folder sizes on demand. It is the sole
//! hand-off point to any presentation layer.

use chrono::NaiveDateTime;
use log::warn;
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Display, Write};

/// The source filesystem of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsKind {
    Ntfs,
    Fat32,
}

impl Display for FsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsKind::Ntfs => write!(f, "NTFS"),
            FsKind::Fat32 => write!(f, "FAT32"),
        }
    }
}

/// A record identifier, namespaced by a per-volume sequence number so that
/// identifiers stay unique when several volumes are merged into one tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    /// Volume sequence number assigned in discovery order.
    pub volume: u32,
    /// Identifier native to the volume (MFT record id, or a FAT32 walk
    /// counter).
    pub entry: u64,
}

impl RecordId {
    pub fn new(volume: u32, entry: u64) -> Self {
        RecordId { volume, entry }
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.volume, self.entry)
    }
}

/// One normalized entry of the presentation interface.
///
/// `attributes` is `None` only for volume roots; a file with no set flags
/// still carries `Some` with an empty list. `size` is the file's own byte
/// size; folder totals are computed by [`Tree::total_size`].
#[derive(Debug, Clone)]
pub struct Record {
    pub id: RecordId,
    pub name: String,
    pub is_folder: bool,
    pub parent: Option<RecordId>,
    pub size: u64,
    pub created: Option<NaiveDateTime>,
    pub modified: Option<NaiveDateTime>,
    pub content: Option<String>,
    pub attributes: Option<Vec<&'static str>>,
    pub file_system: FsKind,
    /// Total size of the containing volume in bytes.
    pub volume_size: u64,
}

/// A rooted, multiply-linked tree over a flat record list.
#[derive(Debug)]
pub struct Tree {
    records: HashMap<RecordId, Record>,
    children: HashMap<RecordId, Vec<RecordId>>,
    roots: Vec<RecordId>,
}

impl Tree {
    /// Assembles the tree in two passes: one creating all nodes, one
    /// attaching children to parents. A record whose parent equals itself is
    /// left unattached, guarding against malformed self-references; a record
    /// whose parent is absent (filtered out or corrupt) simply stays
    /// unreachable from the roots.
    pub fn build(flat: Vec<Record>) -> Tree {
        let mut records = HashMap::new();
        let mut roots = Vec::new();

        for record in flat {
            if record.parent.is_none() {
                roots.push(record.id);
            }
            if records.insert(record.id, record).is_some() {
                warn!("duplicate record identifier; keeping the later record");
            }
        }

        let mut children: HashMap<RecordId, Vec<RecordId>> = HashMap::new();
        let mut ids: Vec<RecordId> = records.keys().copied().collect();
        ids.sort();
        for id in ids {
            let parent = records[&id].parent;
            if let Some(parent) = parent {
                if parent == id {
                    warn!("record {} is its own parent; skipping the link", id);
                    continue;
                }
                if records.contains_key(&parent) {
                    children.entry(parent).or_default().push(id);
                }
            }
        }

        Tree {
            records,
            children,
            roots,
        }
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(&id)
    }

    pub fn children(&self, id: RecordId) -> &[RecordId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn roots(&self) -> &[RecordId] {
        &self.roots
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Total size of a subtree: a file contributes its own size, a folder
    /// the recursive sum of its children. Idempotent; revisited nodes (which
    /// only occur on corrupt parent links) count once.
    pub fn total_size(&self, id: RecordId) -> u64 {
        let mut visited = HashSet::new();
        self.total_size_rec(id, &mut visited)
    }

    fn total_size_rec(&self, id: RecordId, visited: &mut HashSet<RecordId>) -> u64 {
        if !visited.insert(id) {
            return 0;
        }
        let Some(record) = self.records.get(&id) else {
            return 0;
        };
        if !record.is_folder {
            return record.size;
        }
        self.children(id)
            .iter()
            .map(|&child| self.total_size_rec(child, visited))
            .sum()
    }

    /// Renders the tree with box-drawing connectors, one root per volume.
    pub fn display_tree(&self) -> String {
        let mut out = String::new();
        for &root in &self.roots {
            self.display_rec(root, "", true, true, &mut out);
        }
        out
    }

    fn display_rec(&self, id: RecordId, prefix: &str, is_last: bool, is_root: bool, out: &mut String) {
        let Some(record) = self.records.get(&id) else {
            return;
        };

        if is_root {
            writeln!(out, "{}", record.name).unwrap();
        } else {
            let connector = if is_last { "└── " } else { "├── " };
            writeln!(out, "{}{}{}", prefix, connector, record.name).unwrap();
        }

        let child_prefix = if is_root {
            String::new()
        } else {
            format!("{}{}", prefix, if is_last { "    " } else { "│   " })
        };

        let children = self.children(id);
        for (i, &child) in children.iter().enumerate() {
            self.display_rec(child, &child_prefix, i == children.len() - 1, false, out);
        }
    }
}
