//! Single-entry operations that refuse to create a name collision.
//!
//! Create, rename, move and unarchive first look for a non-archived entry
//! with the same name in the target folder. On a hit they show a coded toast
//! and return without calling the store. Archiving never conflicts.

use crate::errors::{CollisionCode, ImportError};
use crate::events::{EventSink, ImportEvent, Notice};
use crate::store::{AssetStore, load_existing_files};
use crate::types::{AssetScope, Destination, FileRecord, NameMatch, RecordId};

pub struct FileOps<'a, S: AssetStore> {
    store: &'a S,
    scope: &'a AssetScope,
    sink: &'a dyn EventSink,
    name_match: NameMatch,
}

impl<'a, S: AssetStore> FileOps<'a, S> {
    pub fn new(store: &'a S, scope: &'a AssetScope, sink: &'a dyn EventSink, name_match: NameMatch) -> Self {
        Self {
            store,
            scope,
            sink,
            name_match,
        }
    }

    pub async fn create_folder(&self, parent: &Destination, name: &str) -> Result<FileRecord, ImportError> {
        self.ensure_free(name, parent, None, CollisionCode::DropboxFileExists)
            .await?;
        self.store
            .create_folder(self.scope, parent, name)
            .await
            .map_err(|e| {
                self.report(ImportError::FolderCreation {
                    name: name.to_string(),
                    message: e.to_string(),
                })
            })
    }

    pub async fn rename(&self, record: &FileRecord, new_name: &str) -> Result<FileRecord, ImportError> {
        let folder = record.parent_destination();
        self.ensure_free(new_name, &folder, Some(&record.id), CollisionCode::DropboxFileExists)
            .await?;
        log::debug!("FileOps: renaming {} '{}' to '{}'", record.id, record.file_name, new_name);
        self.store
            .rename_file(&record.id, new_name)
            .await
            .map_err(|e| self.report(e.into()))
    }

    pub async fn move_to(&self, record: &FileRecord, destination: &Destination) -> Result<FileRecord, ImportError> {
        self.ensure_free(&record.file_name, destination, Some(&record.id), CollisionCode::DropboxMoveConflict)
            .await?;
        log::debug!("FileOps: moving {} '{}' to {}", record.id, record.file_name, destination);
        self.store
            .move_file(&record.id, destination)
            .await
            .map_err(|e| self.report(e.into()))
    }

    /// Archives or restores `record`. Only restoring is collision-checked.
    pub async fn set_archived(&self, record: &FileRecord, archived: bool) -> Result<FileRecord, ImportError> {
        if !archived {
            let folder = record.parent_destination();
            self.ensure_free(
                &record.file_name,
                &folder,
                Some(&record.id),
                CollisionCode::DropboxUnarchiveConflict,
            )
            .await?;
        }
        self.store
            .archive_file(&record.id, archived)
            .await
            .map_err(|e| self.report(e.into()))
    }

    async fn ensure_free(
        &self,
        name: &str,
        folder: &Destination,
        own_id: Option<&RecordId>,
        code: CollisionCode,
    ) -> Result<(), ImportError> {
        let existing = load_existing_files(self.store, self.scope, name, folder, self.name_match)
            .await
            .map_err(|e| {
                self.report(ImportError::ConflictQuery {
                    file_name: name.to_string(),
                    message: e.to_string(),
                })
            })?;

        if existing.iter().any(|r| Some(&r.id) != own_id) {
            log::info!("FileOps: '{}' already exists in {}, refusing ({})", name, folder, code.as_str());
            return Err(self.report(ImportError::NameCollision {
                code,
                name: name.to_string(),
            }));
        }
        Ok(())
    }

    fn report(&self, err: ImportError) -> ImportError {
        self.sink.emit(ImportEvent::Notice(Notice::for_error(&err)));
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryAssetStore, StoreCall};
    use crate::test_support::{RecordingSink, scope};

    fn collision_notices(sink: &RecordingSink) -> Vec<CollisionCode> {
        sink.notices()
            .into_iter()
            .filter_map(|n| match n {
                Notice::NameCollision { code, .. } => Some(code),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_rename_onto_existing_name_is_refused() {
        let store = InMemoryAssetStore::new();
        store.add_file("notes.txt", None);
        let draft = store.add_file("draft.txt", None);
        let sink = RecordingSink::default();
        let scope = scope();
        let ops = FileOps::new(&store, &scope, &sink, NameMatch::Exact);

        let err = ops.rename(&draft, "notes.txt").await.unwrap_err();

        assert_eq!(
            err,
            ImportError::NameCollision {
                code: CollisionCode::DropboxFileExists,
                name: "notes.txt".to_string()
            }
        );
        assert_eq!(collision_notices(&sink), vec![CollisionCode::DropboxFileExists]);
        assert_eq!(store.count_calls(|c| matches!(c, StoreCall::Rename { .. })), 0);
    }

    #[tokio::test]
    async fn test_rename_to_own_name_is_allowed() {
        let store = InMemoryAssetStore::new();
        let notes = store.add_file("notes.txt", None);
        let sink = RecordingSink::default();
        let scope = scope();
        let ops = FileOps::new(&store, &scope, &sink, NameMatch::CaseInsensitive);

        let renamed = ops.rename(&notes, "Notes.txt").await.unwrap();
        assert_eq!(renamed.file_name, "Notes.txt");
        assert!(sink.notices().is_empty());
    }

    #[tokio::test]
    async fn test_move_conflict_uses_move_code() {
        let store = InMemoryAssetStore::new();
        let docs = store.add_folder("Docs", None);
        store.add_file("a.txt", Some(&docs.id));
        let loose = store.add_file("a.txt", None);
        let sink = RecordingSink::default();
        let scope = scope();
        let ops = FileOps::new(&store, &scope, &sink, NameMatch::Exact);

        let err = ops.move_to(&loose, &Destination::Folder(docs.id.clone())).await.unwrap_err();
        assert!(matches!(
            err,
            ImportError::NameCollision {
                code: CollisionCode::DropboxMoveConflict,
                ..
            }
        ));
        assert_eq!(store.count_calls(|c| matches!(c, StoreCall::Move { .. })), 0);
        assert_eq!(store.record(&loose.id).unwrap().folder, None);
    }

    #[tokio::test]
    async fn test_move_into_free_folder() {
        let store = InMemoryAssetStore::new();
        let docs = store.add_folder("Docs", None);
        let loose = store.add_file("a.txt", None);
        let sink = RecordingSink::default();
        let scope = scope();
        let ops = FileOps::new(&store, &scope, &sink, NameMatch::Exact);

        let moved = ops.move_to(&loose, &Destination::Folder(docs.id.clone())).await.unwrap();
        assert_eq!(moved.folder, Some(docs.id));
    }

    #[tokio::test]
    async fn test_unarchive_conflict_and_archive_never_conflicts() {
        let store = InMemoryAssetStore::new();
        let old = store.add_file("report.pdf", None);
        let sink = RecordingSink::default();
        let scope = scope();
        let ops = FileOps::new(&store, &scope, &sink, NameMatch::Exact);

        let old = ops.set_archived(&old, true).await.unwrap();
        assert!(old.archived);
        store.add_file("report.pdf", None);

        let err = ops.set_archived(&old, false).await.unwrap_err();
        assert!(matches!(
            err,
            ImportError::NameCollision {
                code: CollisionCode::DropboxUnarchiveConflict,
                ..
            }
        ));
        assert!(store.record(&old.id).unwrap().archived);
        assert_eq!(collision_notices(&sink), vec![CollisionCode::DropboxUnarchiveConflict]);
    }

    #[tokio::test]
    async fn test_create_folder_checks_siblings() {
        let store = InMemoryAssetStore::new();
        store.add_folder("Images", None);
        let sink = RecordingSink::default();
        let scope = scope();
        let ops = FileOps::new(&store, &scope, &sink, NameMatch::Exact);

        assert!(ops.create_folder(&Destination::Root, "Images").await.is_err());
        let created = ops.create_folder(&Destination::Root, "Icons").await.unwrap();
        assert!(created.is_directory);
        assert_eq!(store.count_calls(|c| matches!(c, StoreCall::CreateFolder { .. })), 1);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_reported_as_banner() {
        let store = InMemoryAssetStore::new();
        let notes = store.add_file("notes.txt", None);
        store.fail_listing(1);
        let sink = RecordingSink::default();
        let scope = scope();
        let ops = FileOps::new(&store, &scope, &sink, NameMatch::Exact);

        let err = ops.rename(&notes, "other.txt").await.unwrap_err();
        assert!(matches!(err, ImportError::ConflictQuery { .. }));
        let notices = sink.notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].is_banner());
    }
}
