//! Drop planning: classify each dropped file as safe or colliding.
//!
//! Planning only reads. It never creates folders or touches existing
//! records, so a failed lookup or a cancelled prompt leaves no trace.

use std::collections::HashSet;

use crate::errors::ImportError;
use crate::path_index::{PathIndex, fqdn_join};
use crate::store::{AssetStore, load_existing_files};
use crate::types::{AssetScope, Destination, DroppedFile, FileRecord, NameMatch, RecordId};

/// Splits a relative path such as `/Images/Sub/doc.txt` into its folder
/// segments and the file name.
///
/// The leading `/` is optional and empty segments are ignored.
pub fn split_relative_path(relative_path: &str) -> (Vec<String>, Option<String>) {
    let mut segments: Vec<String> = relative_path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let leaf = segments.pop();
    (segments, leaf)
}

/// One dropped file and what planning found out about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    pub file: DroppedFile,
    /// Folders between the destination and the file, original casing
    pub folder_segments: Vec<String>,
    /// Existing non-archived records with the same name in the target folder
    pub collisions: Vec<RecordId>,
}

impl PlannedFile {
    pub fn is_safe(&self) -> bool {
        self.collisions.is_empty()
    }
}

/// Result of planning one drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropPlan {
    pub destination: Destination,
    /// FQDN of `destination` when the plan was made
    pub destination_fqdn: String,
    /// Every dropped file, in input order
    pub files: Vec<PlannedFile>,
    /// Existing records that collide, one entry per record
    pub duplicates: Vec<FileRecord>,
}

impl DropPlan {
    pub fn has_conflicts(&self) -> bool {
        !self.duplicates.is_empty()
    }

    pub fn safe(&self) -> impl Iterator<Item = &PlannedFile> {
        self.files.iter().filter(|f| f.is_safe())
    }

    pub fn colliding(&self) -> impl Iterator<Item = &PlannedFile> {
        self.files.iter().filter(|f| !f.is_safe())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Classifies every file of a drop onto `destination`.
///
/// A file whose target folder does not exist yet is safe: the folder will be
/// created fresh. Otherwise the collaborator is asked for non-archived entries
/// with the same name in that folder. When a relative path is present, its
/// last component is the file name.
pub async fn plan_drop<S: AssetStore>(
    store: &S,
    scope: &AssetScope,
    index: &PathIndex,
    destination: &Destination,
    files: Vec<DroppedFile>,
    name_match: NameMatch,
) -> Result<DropPlan, ImportError> {
    let destination_fqdn = match index.fqdn_of(destination) {
        Some(fqdn) => fqdn.to_string(),
        None => {
            let folder_id = destination.folder_id().cloned().unwrap_or_default();
            log::warn!("plan_drop: destination {} is not in the path index", destination);
            return Err(ImportError::DestinationUnavailable { folder_id });
        }
    };

    let mut planned = Vec::with_capacity(files.len());
    let mut duplicates: Vec<FileRecord> = Vec::new();
    let mut seen: HashSet<RecordId> = HashSet::new();

    for mut file in files {
        let (segments, leaf) = file.relative_path.as_deref().map(split_relative_path).unwrap_or_default();
        if let Some(leaf) = leaf
            && leaf != file.name
        {
            log::warn!(
                "plan_drop: relative path {:?} ends in '{}', not '{}'; using the path's name",
                file.relative_path,
                leaf,
                file.name
            );
            file.name = leaf;
        }
        let candidate = fqdn_join(&destination_fqdn, &segments);

        let collisions = match index.destination_for(&candidate) {
            None => {
                log::debug!("plan_drop: '{}' goes to new folder {}", file.name, candidate);
                Vec::new()
            }
            Some(folder) => {
                let existing = load_existing_files(store, scope, &file.name, &folder, name_match)
                    .await
                    .map_err(|e| ImportError::ConflictQuery {
                        file_name: file.name.clone(),
                        message: e.to_string(),
                    })?;
                let mut ids = Vec::with_capacity(existing.len());
                for record in existing {
                    ids.push(record.id.clone());
                    if seen.insert(record.id.clone()) {
                        duplicates.push(record);
                    }
                }
                ids
            }
        };

        if !collisions.is_empty() {
            log::debug!("plan_drop: '{}' collides with {} existing entries", file.name, collisions.len());
        }
        planned.push(PlannedFile {
            file,
            folder_segments: segments,
            collisions,
        });
    }

    log::info!(
        "plan_drop: {} files onto {}, {} duplicates",
        planned.len(),
        destination,
        duplicates.len()
    );
    Ok(DropPlan {
        destination: destination.clone(),
        destination_fqdn,
        files: planned,
        duplicates,
    })
}
