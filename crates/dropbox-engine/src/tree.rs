//! Directory tree reconstruction from the flat, parent-pointer directory list.
//!
//! The API returns every directory of a scope as a flat list where each record
//! points at its parent. This module rebuilds the hierarchy and, for each
//! directory, the materialized root-to-node path. The tree is rebuilt from
//! scratch on every fetch; nothing is patched in place.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::errors::TreeError;
use crate::types::{DirectoryRecord, RecordId};

/// Key of a node in the tree: the synthetic root or a directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Root,
    Directory(RecordId),
}

/// A directory plus its derived position in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryNode {
    /// `None` only for the root sentinel
    pub record: Option<DirectoryRecord>,
    /// Records from a root child down to and including this directory
    pub path: Vec<DirectoryRecord>,
    /// Direct children, in natural name order
    pub subdirectories: Vec<RecordId>,
}

impl DirectoryNode {
    pub fn id(&self) -> Option<&RecordId> {
        self.record.as_ref().map(|r| &r.id)
    }

    /// True if this directory or any ancestor is archived.
    pub fn has_archived_ancestor(&self) -> bool {
        self.path.iter().any(|r| r.archived)
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

/// The rebuilt hierarchy, keyed by node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryTree {
    nodes: HashMap<NodeKey, DirectoryNode>,
    /// Directories whose ancestor chain ends in a parent that is not in the list
    orphans: Vec<RecordId>,
}

impl DirectoryTree {
    /// Builds the tree from every directory of the scope, archived included.
    ///
    /// Uses an explicit worklist, so deep hierarchies can't overflow the stack.
    /// Directories not reachable from the root are either orphans (kept out of
    /// the tree and logged) or part of a parent cycle (reported as an error).
    pub fn build(directories: &[DirectoryRecord]) -> Result<Self, TreeError> {
        let mut by_id: HashMap<&RecordId, &DirectoryRecord> = HashMap::with_capacity(directories.len());
        for record in directories {
            match by_id.entry(&record.id) {
                Entry::Occupied(_) => {
                    log::warn!("DirectoryTree: duplicate directory id {}, keeping the first", record.id);
                }
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
            }
        }

        // Group by parent; the root bucket is keyed by `None`
        let mut children: HashMap<Option<&RecordId>, Vec<&DirectoryRecord>> = HashMap::new();
        for &record in by_id.values() {
            children.entry(record.folder.as_ref()).or_default().push(record);
        }
        for group in children.values_mut() {
            group.sort_by(|a, b| {
                alphanumeric_sort::compare_str(a.file_name.to_lowercase(), b.file_name.to_lowercase())
                    .then_with(|| a.file_name.cmp(&b.file_name))
                    .then_with(|| a.id.cmp(&b.id))
            });
        }

        let mut nodes = HashMap::with_capacity(by_id.len() + 1);
        let root_children = child_ids(children.get(&None));
        let mut worklist: Vec<(Vec<DirectoryRecord>, &DirectoryRecord)> = children
            .get(&None)
            .map(|group| group.iter().rev().map(|r| (Vec::new(), *r)).collect())
            .unwrap_or_default();
        nodes.insert(
            NodeKey::Root,
            DirectoryNode {
                record: None,
                path: Vec::new(),
                subdirectories: root_children,
            },
        );

        while let Some((parent_path, record)) = worklist.pop() {
            let mut path = parent_path;
            path.push(record.clone());
            let kids = children.get(&Some(&record.id));
            if let Some(group) = kids {
                for child in group.iter().rev() {
                    worklist.push((path.clone(), *child));
                }
            }
            nodes.insert(
                NodeKey::Directory(record.id.clone()),
                DirectoryNode {
                    record: Some(record.clone()),
                    path,
                    subdirectories: child_ids(kids),
                },
            );
        }

        let orphans = classify_unreached(&by_id, &nodes)?;
        Ok(Self { nodes, orphans })
    }

    pub fn root(&self) -> Option<&DirectoryNode> {
        self.nodes.get(&NodeKey::Root)
    }

    pub fn get(&self, id: &RecordId) -> Option<&DirectoryNode> {
        self.nodes.get(&NodeKey::Directory(id.clone()))
    }

    pub fn node(&self, key: &NodeKey) -> Option<&DirectoryNode> {
        self.nodes.get(key)
    }

    /// Direct child nodes of `node`.
    pub fn children<'a>(&'a self, node: &'a DirectoryNode) -> impl Iterator<Item = &'a DirectoryNode> + 'a {
        node.subdirectories.iter().filter_map(|id| self.get(id))
    }

    /// Directory nodes, root excluded, in no particular order.
    pub fn directories(&self) -> impl Iterator<Item = &DirectoryNode> {
        self.nodes.values().filter(|n| n.record.is_some())
    }

    /// Number of directories in the tree, root excluded.
    pub fn len(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn orphans(&self) -> &[RecordId] {
        &self.orphans
    }
}

fn child_ids(group: Option<&Vec<&DirectoryRecord>>) -> Vec<RecordId> {
    group
        .map(|g| g.iter().map(|r| r.id.clone()).collect())
        .unwrap_or_default()
}

/// Sorts directories the walk never reached into orphans, or fails on a cycle.
fn classify_unreached(
    by_id: &HashMap<&RecordId, &DirectoryRecord>,
    nodes: &HashMap<NodeKey, DirectoryNode>,
) -> Result<Vec<RecordId>, TreeError> {
    let mut orphans = Vec::new();
    let mut settled: HashSet<&RecordId> = HashSet::new();

    for &id in by_id.keys() {
        if settled.contains(id) || nodes.contains_key(&NodeKey::Directory(id.clone())) {
            continue;
        }
        let mut chain: Vec<&RecordId> = vec![id];
        let mut seen: HashSet<&RecordId> = HashSet::from([id]);
        let mut current = id;
        // Unreached directories always have a parent: root children are walked first
        while let Some(parent) = by_id.get(current).and_then(|r| r.folder.as_ref()) {
            if settled.contains(parent) {
                break;
            }
            if !by_id.contains_key(parent) {
                log::warn!("DirectoryTree: directory {} points at missing parent {}", current, parent);
                break;
            }
            if !seen.insert(parent) {
                return Err(TreeError::Cycle {
                    directory_id: parent.clone(),
                });
            }
            chain.push(parent);
            current = parent;
        }
        for member in chain {
            if settled.insert(member) {
                orphans.push(member.clone());
            }
        }
    }

    if !orphans.is_empty() {
        orphans.sort();
        log::warn!("DirectoryTree: {} orphaned directories left out of the tree", orphans.len());
    }
    Ok(orphans)
}
