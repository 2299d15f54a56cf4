//! Tests for DirectoryTree reconstruction.

use std::collections::HashMap;

use crate::errors::TreeError;
use crate::test_support::{archived_dir, dir, init_logging};
use crate::tree::{DirectoryTree, NodeKey};
use crate::types::{DirectoryRecord, RecordId};

/// Images/{Sub/{Deep}, Icons}, Docs, Archive(archived)/Old
fn sample_directories() -> Vec<DirectoryRecord> {
    vec![
        dir("deep", "Deep", Some("sub")),
        dir("images", "Images", None),
        dir("sub", "Sub", Some("images")),
        dir("icons", "Icons", Some("images")),
        dir("docs", "Docs", None),
        archived_dir("archive", "Archive", None),
        dir("old", "Old", Some("archive")),
    ]
}

fn names(path: &[DirectoryRecord]) -> Vec<&str> {
    path.iter().map(|r| r.file_name.as_str()).collect()
}

#[test]
fn test_empty_list_has_only_root() {
    let tree = DirectoryTree::build(&[]).unwrap();
    assert!(tree.is_empty());
    let root = tree.root().unwrap();
    assert!(root.record.is_none());
    assert!(root.path.is_empty());
    assert!(root.subdirectories.is_empty());
}

#[test]
fn test_paths_are_materialized_root_to_node() {
    let tree = DirectoryTree::build(&sample_directories()).unwrap();

    assert_eq!(tree.len(), 7);
    assert_eq!(names(&tree.get(&RecordId::from("images")).unwrap().path), vec!["Images"]);
    assert_eq!(
        names(&tree.get(&RecordId::from("deep")).unwrap().path),
        vec!["Images", "Sub", "Deep"]
    );
    assert_eq!(
        names(&tree.get(&RecordId::from("old")).unwrap().path),
        vec!["Archive", "Old"]
    );
}

#[test]
fn test_path_is_parent_path_plus_self() {
    let directories = sample_directories();
    let tree = DirectoryTree::build(&directories).unwrap();

    for node in tree.directories() {
        let record = node.record.as_ref().unwrap();
        let parent_key = match &record.folder {
            Some(parent) => NodeKey::Directory(parent.clone()),
            None => NodeKey::Root,
        };
        let parent = tree.node(&parent_key).unwrap();
        let mut expected = parent.path.clone();
        expected.push(record.clone());
        assert_eq!(node.path, expected, "path of {}", record.file_name);
    }
}

#[test]
fn test_every_directory_is_in_exactly_one_subdirectory_list() {
    let directories = sample_directories();
    let tree = DirectoryTree::build(&directories).unwrap();

    let mut seen: HashMap<RecordId, usize> = HashMap::new();
    let root = tree.root().unwrap();
    for id in &root.subdirectories {
        *seen.entry(id.clone()).or_default() += 1;
    }
    for node in tree.directories() {
        for id in &node.subdirectories {
            *seen.entry(id.clone()).or_default() += 1;
        }
    }

    assert_eq!(seen.len(), directories.len());
    assert!(seen.values().all(|count| *count == 1));
}

#[test]
fn test_subdirectories_in_natural_order() {
    let directories = vec![
        dir("a", "Folder 10", None),
        dir("b", "Folder 2", None),
        dir("c", "Folder 1", None),
    ];
    let tree = DirectoryTree::build(&directories).unwrap();
    let root = tree.root().unwrap();
    let ordered: Vec<&str> = tree.children(root).map(|n| n.record.as_ref().unwrap().file_name.as_str()).collect();
    assert_eq!(ordered, vec!["Folder 1", "Folder 2", "Folder 10"]);
}

#[test]
fn test_archived_ancestor_is_detected() {
    let tree = DirectoryTree::build(&sample_directories()).unwrap();
    assert!(tree.get(&RecordId::from("old")).unwrap().has_archived_ancestor());
    assert!(tree.get(&RecordId::from("archive")).unwrap().has_archived_ancestor());
    assert!(!tree.get(&RecordId::from("deep")).unwrap().has_archived_ancestor());
}

#[test]
fn test_rebuild_is_idempotent() {
    let directories = sample_directories();
    let first = DirectoryTree::build(&directories).unwrap();
    let mut reversed = directories.clone();
    reversed.reverse();
    let second = DirectoryTree::build(&reversed).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_orphans_are_left_out() {
    init_logging();
    let directories = vec![
        dir("images", "Images", None),
        dir("lost", "Lost", Some("deleted-parent")),
        dir("lost-child", "Child", Some("lost")),
    ];
    let tree = DirectoryTree::build(&directories).unwrap();

    assert_eq!(tree.len(), 1);
    assert!(tree.get(&RecordId::from("lost")).is_none());
    assert!(tree.get(&RecordId::from("lost-child")).is_none());
    assert_eq!(tree.orphans(), &[RecordId::from("lost"), RecordId::from("lost-child")]);
}

#[test]
fn test_parent_cycle_is_reported() {
    init_logging();
    let directories = vec![
        dir("images", "Images", None),
        dir("a", "A", Some("b")),
        dir("b", "B", Some("a")),
    ];
    let err = DirectoryTree::build(&directories).unwrap_err();
    let TreeError::Cycle { directory_id } = err;
    assert!(directory_id == RecordId::from("a") || directory_id == RecordId::from("b"));
}

#[test]
fn test_self_parent_is_a_cycle() {
    let directories = vec![dir("loop", "Loop", Some("loop"))];
    assert_eq!(
        DirectoryTree::build(&directories),
        Err(TreeError::Cycle {
            directory_id: RecordId::from("loop")
        })
    );
}

#[test]
fn test_branch_hanging_off_a_cycle_is_reported() {
    let directories = vec![
        dir("a", "A", Some("b")),
        dir("b", "B", Some("a")),
        dir("leaf", "Leaf", Some("a")),
    ];
    assert!(DirectoryTree::build(&directories).is_err());
}

#[test]
fn test_duplicate_ids_keep_first() {
    init_logging();
    let directories = vec![dir("x", "First", None), dir("x", "Second", None)];
    let tree = DirectoryTree::build(&directories).unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.get(&RecordId::from("x")).unwrap().record.as_ref().unwrap().file_name, "First");
}

#[test]
fn test_deep_hierarchy_does_not_recurse() {
    let depth = 1_000;
    let mut directories = vec![dir("d0", "level0", None)];
    for i in 1..depth {
        directories.push(dir(&format!("d{i}"), &format!("level{i}"), Some(&format!("d{}", i - 1))));
    }
    let tree = DirectoryTree::build(&directories).unwrap();
    let deepest = tree.get(&RecordId::new(format!("d{}", depth - 1))).unwrap();
    assert_eq!(deepest.depth(), depth);
}
