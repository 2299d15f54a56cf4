//! Case-insensitive path lookup over the directory tree.
//!
//! Keys are FQDNs: lower-cased, `/`-joined directory names from the root.
//! The root itself is `""`, a root child named `Images` is `/images`.
//! Directories that are archived, or sit below an archived directory, are
//! left out, so a drop never lands in them.

use std::collections::HashMap;

use crate::tree::{DirectoryNode, DirectoryTree};
use crate::types::{Destination, DirectoryRecord, RecordId};

/// FQDN of the root.
pub const ROOT_FQDN: &str = "";

/// Appends lower-cased `segments` to `prefix`.
pub fn fqdn_join<S: AsRef<str>>(prefix: &str, segments: &[S]) -> String {
    let mut fqdn = String::from(prefix);
    for segment in segments {
        fqdn.push('/');
        fqdn.push_str(&segment.as_ref().to_lowercase());
    }
    fqdn
}

/// FQDN of a materialized root-to-node path.
pub fn fqdn_of_path(path: &[DirectoryRecord]) -> String {
    let names: Vec<&str> = path.iter().map(|r| r.file_name.as_str()).collect();
    fqdn_join(ROOT_FQDN, &names)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathIndex {
    by_fqdn: HashMap<String, DirectoryRecord>,
    fqdn_by_id: HashMap<RecordId, String>,
}

impl PathIndex {
    /// Indexes every non-archived directory reachable from the root.
    ///
    /// Siblings whose names differ only in case share an FQDN; the later one
    /// in natural order wins and the other's subtree is left out, so every
    /// indexed path runs through indexed parents.
    pub fn build(tree: &DirectoryTree) -> Self {
        let mut index = Self::default();
        let Some(root) = tree.root() else {
            return index;
        };

        let mut worklist = indexed_children(tree, root);
        worklist.reverse();
        while let Some(node) = worklist.pop() {
            let Some(record) = node.record.as_ref() else {
                continue;
            };
            let fqdn = fqdn_of_path(&node.path);
            index.by_fqdn.insert(fqdn.clone(), record.clone());
            index.fqdn_by_id.insert(record.id.clone(), fqdn);

            let mut children = indexed_children(tree, node);
            children.reverse();
            worklist.extend(children);
        }
        index
    }

    pub fn lookup(&self, fqdn: &str) -> Option<&DirectoryRecord> {
        self.by_fqdn.get(fqdn)
    }

    /// True for the root and for every indexed directory.
    pub fn contains(&self, fqdn: &str) -> bool {
        fqdn == ROOT_FQDN || self.by_fqdn.contains_key(fqdn)
    }

    /// FQDN of a destination, or `None` if it is not indexed.
    pub fn fqdn_of(&self, destination: &Destination) -> Option<&str> {
        match destination {
            Destination::Root => Some(ROOT_FQDN),
            Destination::Folder(id) => self.fqdn_by_id.get(id).map(String::as_str),
        }
    }

    /// Destination for an FQDN, or `None` if nothing lives there yet.
    pub fn destination_for(&self, fqdn: &str) -> Option<Destination> {
        if fqdn == ROOT_FQDN {
            return Some(Destination::Root);
        }
        self.by_fqdn.get(fqdn).map(|r| Destination::Folder(r.id.clone()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DirectoryRecord)> {
        self.by_fqdn.iter().map(|(fqdn, record)| (fqdn.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.by_fqdn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fqdn.is_empty()
    }
}

/// Children of `node` that get indexed, in natural order.
fn indexed_children<'t>(tree: &'t DirectoryTree, node: &'t DirectoryNode) -> Vec<&'t DirectoryNode> {
    let mut kept: Vec<&DirectoryNode> = Vec::new();
    let mut slot_by_name: HashMap<String, usize> = HashMap::new();
    for child in tree.children(node) {
        let Some(record) = child.record.as_ref() else {
            continue;
        };
        // Everything below an archived directory is archived too
        if record.archived {
            continue;
        }
        let key = record.file_name.to_lowercase();
        match slot_by_name.get(&key) {
            Some(&slot) => {
                if let Some(previous) = kept[slot].record.as_ref() {
                    log::debug!(
                        "PathIndex: '{}' and '{}' share a path, keeping {} and skipping {}",
                        previous.file_name,
                        record.file_name,
                        record.id,
                        previous.id
                    );
                }
                kept[slot] = child;
            }
            None => {
                slot_by_name.insert(key, kept.len());
                kept.push(child);
            }
        }
    }
    kept
}
